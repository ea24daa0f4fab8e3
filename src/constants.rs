//! Protocol constants and configuration values

/// Default FastAGI port Asterisk connects to (`agi://host:4573/...`).
pub const DEFAULT_FASTAGI_PORT: u16 = 4573;

/// Leading token of every well-formed success reply.
pub const SUCCESS_MARKER: &str = "200";

/// Prefix of the result code token in a reply line.
pub const RESULT_PREFIX: &str = "result=";

/// Conventional key prefix of environment headers sent by Asterisk.
pub const ENV_KEY_PREFIX: &str = "agi_";

/// Commands and replies are single newline-terminated lines.
pub const LINE_TERMINATOR: &str = "\n";

/// Maximum accepted length of a single protocol line (64KB).
/// No legitimate AGI command or reply comes close; longer lines indicate
/// a desynchronized or hostile peer.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Default per-operation timeout for one command/reply round trip.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;

/// Default hard deadline applied to each accepted connection. A silent or
/// malicious peer cannot hold a worker past this bound.
pub const DEFAULT_CONNECTION_DEADLINE_MS: u64 = 30_000;

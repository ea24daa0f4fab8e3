//! AGI session: one call-control conversation bound to one transport

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    command::validate_no_newlines,
    constants::{DEFAULT_COMMAND_TIMEOUT_MS, LINE_TERMINATOR, MAX_LINE_LENGTH},
    error::{AgiError, AgiResult},
    protocol::{parse_env_line, AgiReply},
};

type BoxedReader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Transport halves, guarded together by the session mutex.
struct SessionIo {
    reader: BoxedReader,
    writer: BoxedWriter,
}

/// Read one newline-terminated line, without the terminator.
///
/// Returns [`AgiError::ConnectionClosed`] on EOF (including EOF mid-line)
/// and [`AgiError::LineTooLong`] when the line exceeds [`MAX_LINE_LENGTH`].
async fn read_protocol_line(reader: &mut BoxedReader) -> AgiResult<String> {
    let mut line = Vec::new();

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Err(AgiError::ConnectionClosed);
        }

        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                line.extend_from_slice(&available[..pos]);
                reader.consume(pos + 1);
                break;
            }
            None => {
                let chunk = available.len();
                line.extend_from_slice(available);
                reader.consume(chunk);
            }
        }

        if line.len() > MAX_LINE_LENGTH {
            return Err(AgiError::LineTooLong {
                limit: MAX_LINE_LENGTH,
            });
        }
    }

    if line.len() > MAX_LINE_LENGTH {
        return Err(AgiError::LineTooLong {
            limit: MAX_LINE_LENGTH,
        });
    }

    String::from_utf8(line).map_err(|_| AgiError::InvalidResponse {
        line: "<invalid UTF-8>".to_string(),
    })
}

/// Read the environment header block: `key: value` lines terminated by one
/// blank line. Later duplicate keys overwrite earlier ones.
async fn read_environment(reader: &mut BoxedReader) -> AgiResult<HashMap<String, String>> {
    let mut env = HashMap::new();

    loop {
        let line = read_protocol_line(reader).await?;
        match parse_env_line(&line)? {
            Some((key, value)) => {
                env.insert(key, value);
            }
            None => break,
        }
    }

    Ok(env)
}

/// One AGI conversation with the switch.
///
/// The environment block is read synchronously during construction; no
/// command may execute before it has loaded. All command/reply round trips
/// go through [`execute`](Self::execute), serialized by an internal mutex so
/// concurrent callers on the same session can never interleave one command's
/// write with another command's reply.
///
/// ```rust,no_run
/// use asterisk_agi_tokio::{AgiResult, AgiSession};
///
/// #[tokio::main]
/// async fn main() -> AgiResult<()> {
///     // Classic AGI: Asterisk spawned this process and speaks over stdio.
///     let session = AgiSession::from_stdio().await?;
///     session.answer().await?;
///     session.stream_file("welcome", "0123456789*#").await?;
///     session.hangup().await?;
///     Ok(())
/// }
/// ```
pub struct AgiSession {
    io: Mutex<SessionIo>,
    env: HashMap<String, String>,
    debug_mode: AtomicBool,
    /// Per-operation timeout in milliseconds.
    timeout_ms: AtomicU64,
    closed: AtomicBool,
    cancel: CancellationToken,
}

impl std::fmt::Debug for AgiSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgiSession")
            .field("env_keys", &self.env.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl AgiSession {
    /// Wrap a transport and read the environment block.
    ///
    /// Fails with [`AgiError::MalformedEnvironment`] if any non-blank header
    /// line lacks the `key: value` separator; the session is never
    /// constructed in that case.
    pub async fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> AgiResult<Self> {
        Self::with_cancellation(reader, writer, CancellationToken::new()).await
    }

    pub(crate) async fn with_cancellation(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
        cancel: CancellationToken,
    ) -> AgiResult<Self> {
        let mut reader: BoxedReader = BufReader::new(Box::new(reader));
        let env = read_environment(&mut reader).await?;

        Ok(Self {
            io: Mutex::new(SessionIo {
                reader,
                writer: Box::new(writer),
            }),
            env,
            debug_mode: AtomicBool::new(false),
            timeout_ms: AtomicU64::new(DEFAULT_COMMAND_TIMEOUT_MS),
            closed: AtomicBool::new(false),
            cancel,
        })
    }

    /// Build a session from an accepted FastAGI connection.
    pub async fn from_tcp(stream: TcpStream) -> AgiResult<Self> {
        let (read_half, write_half) = stream.into_split();
        Self::new(read_half, write_half).await
    }

    /// Build a session over this process's stdin/stdout (classic AGI, where
    /// Asterisk spawns the script directly).
    pub async fn from_stdio() -> AgiResult<Self> {
        Self::new(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Send one fully formatted command line and read its reply.
    ///
    /// The session lock is held through the entire send-and-receive cycle:
    /// at most one command is in flight, and replies are consumed in the
    /// order commands were sent. The read is bounded by the per-operation
    /// timeout (see [`set_timeout`](Self::set_timeout)).
    pub async fn execute(&self, command: &str) -> AgiResult<AgiReply> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AgiError::SessionClosed);
        }
        validate_no_newlines(command, "command")?;

        let timeout_ms = self.timeout_ms.load(Ordering::Relaxed);
        let debug_mode = self.debug_mode.load(Ordering::Relaxed);

        let mut io = self.io.lock().await;

        if debug_mode {
            debug!(command, "AGI command");
        }

        io.writer.write_all(command.as_bytes()).await?;
        io.writer.write_all(LINE_TERMINATOR.as_bytes()).await?;
        io.writer.flush().await?;

        let line = match timeout(
            Duration::from_millis(timeout_ms),
            read_protocol_line(&mut io.reader),
        )
        .await
        {
            Ok(read) => read?,
            Err(_) => return Err(AgiError::Timeout { timeout_ms }),
        };
        drop(io);

        if debug_mode {
            debug!(reply = %line, "AGI reply");
        }

        AgiReply::parse(&line)
    }

    /// Read an environment value by key. An absent key yields an empty
    /// value, never an error.
    pub fn env(&self, key: &str) -> &str {
        self.env.get(key).map(String::as_str).unwrap_or("")
    }

    /// The full environment mapping read at session start.
    pub fn environment(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Enable or disable diagnostic logging of commands and replies.
    /// Protocol bytes are never altered.
    pub fn set_debug(&self, enabled: bool) {
        self.debug_mode.store(enabled, Ordering::Relaxed);
    }

    /// Whether diagnostic logging is enabled.
    pub fn debug_enabled(&self) -> bool {
        self.debug_mode.load(Ordering::Relaxed)
    }

    /// Set the per-operation timeout for one command/reply round trip
    /// (default: 30 seconds).
    pub fn set_timeout(&self, duration: Duration) {
        self.timeout_ms
            .store(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Current per-operation timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed))
    }

    /// Cancellation scope associated with this session. Cancelled on
    /// [`close`](Self::close), and by the server when shutting down or when
    /// the session deadline fires.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Close the session. Idempotent; cancels the session's cancellation
    /// scope. Further [`execute`](Self::execute) calls fail with
    /// [`AgiError::SessionClosed`].
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.cancel.cancel();
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;

    /// Session over a scripted input; written commands land in a duplex
    /// stream we can read back.
    async fn scripted_session(input: &str) -> (AgiSession, tokio::io::DuplexStream) {
        let (write_half, inspect) = tokio::io::duplex(64 * 1024);
        let session = AgiSession::new(Cursor::new(input.as_bytes().to_vec()), write_half)
            .await
            .expect("session construction");
        (session, inspect)
    }

    #[tokio::test]
    async fn reads_environment_block() {
        let input = "agi_network: yes\nagi_network_script: demo.agi\n\n";
        let (session, _inspect) = scripted_session(input).await;

        assert_eq!(session.env("agi_network"), "yes");
        assert_eq!(session.env("agi_network_script"), "demo.agi");
        assert_eq!(session.env("agi_absent"), "");
        assert_eq!(session.environment().len(), 2);
    }

    #[tokio::test]
    async fn environment_stops_at_blank_line() {
        // Lines after the blank terminator belong to the command phase.
        let input = "agi_channel: SIP/100-1\n\n200 result=1\n";
        let (session, _inspect) = scripted_session(input).await;

        assert_eq!(session.environment().len(), 1);
        let reply = session.execute("ANSWER").await.unwrap();
        assert_eq!(reply.result, 1);
    }

    #[tokio::test]
    async fn malformed_environment_aborts_construction() {
        let input = "invalid line\n\n";
        let (write_half, _inspect) = tokio::io::duplex(1024);
        let err = AgiSession::new(Cursor::new(input.as_bytes().to_vec()), write_half)
            .await
            .unwrap_err();
        assert!(matches!(err, AgiError::MalformedEnvironment { .. }));
    }

    #[tokio::test]
    async fn duplicate_env_keys_overwrite() {
        let input = "agi_language: en\nagi_language: fr\n\n";
        let (session, _inspect) = scripted_session(input).await;
        assert_eq!(session.env("agi_language"), "fr");
    }

    #[tokio::test]
    async fn execute_writes_command_and_parses_reply() {
        let input = "\n200 result=1 (hello)\n";
        let (session, mut inspect) = scripted_session(input).await;

        let reply = session.execute("GET VARIABLE test").await.unwrap();
        assert_eq!(reply.status, 1);
        assert_eq!(reply.result, 1);
        assert_eq!(reply.data, "hello");

        let mut sent = vec![0u8; 64];
        let n = inspect.read(&mut sent).await.unwrap();
        assert_eq!(&sent[..n], b"GET VARIABLE test\n");
    }

    #[tokio::test]
    async fn execute_rejects_newline_injection() {
        let input = "\n200 result=0\n";
        let (session, _inspect) = scripted_session(input).await;

        let err = session.execute("ANSWER\nHANGUP").await.unwrap_err();
        assert!(matches!(err, AgiError::CommandInvalid { .. }));

        // The transport was never touched; the scripted reply is still there.
        let reply = session.execute("ANSWER").await.unwrap();
        assert_eq!(reply.result, 0);
    }

    #[tokio::test]
    async fn execute_surfaces_protocol_error() {
        let input = "\n510 Invalid or unknown command\n";
        let (session, _inspect) = scripted_session(input).await;

        let err = session.execute("BOGUS").await.unwrap_err();
        assert!(matches!(err, AgiError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn execute_after_close_fails_deterministically() {
        let input = "\n200 result=0\n";
        let (session, _inspect) = scripted_session(input).await;

        session.close();
        session.close(); // idempotent
        assert!(session.is_closed());
        assert!(session.cancellation().is_cancelled());

        let err = session.execute("ANSWER").await.unwrap_err();
        assert!(matches!(err, AgiError::SessionClosed));
    }

    #[tokio::test]
    async fn execute_times_out_on_silent_peer() {
        // Duplex with no peer output: the reply read must hit the timeout.
        let (client, server) = tokio::io::duplex(1024);
        let (server_read, mut server_write) = tokio::io::split(server);

        server_write.write_all(b"\n").await.unwrap(); // empty environment
        server_write.flush().await.unwrap();

        let (client_read, client_write) = tokio::io::split(client);
        let session = AgiSession::new(client_read, client_write).await.unwrap();
        session.set_timeout(Duration::from_millis(50));

        let err = session.execute("ANSWER").await.unwrap_err();
        assert!(matches!(err, AgiError::Timeout { timeout_ms: 50 }));
        drop(server_read);
    }

    #[tokio::test]
    async fn eof_during_reply_is_connection_closed() {
        let input = "\n";
        let (session, _inspect) = scripted_session(input).await;

        let err = session.execute("ANSWER").await.unwrap_err();
        assert!(matches!(err, AgiError::ConnectionClosed));
    }

    #[tokio::test]
    async fn oversized_line_rejected() {
        let input = format!("\n{}\n", "x".repeat(MAX_LINE_LENGTH + 1));
        let (session, _inspect) = scripted_session(&input).await;

        let err = session.execute("ANSWER").await.unwrap_err();
        assert!(matches!(err, AgiError::LineTooLong { .. }));
    }

    #[tokio::test]
    async fn concurrent_executes_never_interleave() {
        const CALLERS: usize = 8;
        const ROUNDS: usize = 10;

        let (client, server) = tokio::io::duplex(64 * 1024);
        let (server_read, mut server_write) = tokio::io::split(server);

        // Fake switch: environment, then one reply per received command line.
        let responder = tokio::spawn(async move {
            server_write.write_all(b"agi_network: yes\n\n").await.unwrap();
            server_write.flush().await.unwrap();

            let mut reader = tokio::io::BufReader::new(server_read);
            let mut line = String::new();
            for _ in 0..CALLERS * ROUNDS {
                line.clear();
                let n = reader.read_line(&mut line).await.unwrap();
                assert!(n > 0, "command stream ended early");
                // A complete command line; interleaved writes would produce
                // garbage here.
                let seq = line
                    .trim()
                    .strip_prefix("VERBOSE msg-")
                    .and_then(|s| s.split(' ').next())
                    .and_then(|s| s.parse::<usize>().ok())
                    .expect("well-formed command line");
                server_write
                    .write_all(format!("200 result={}\n", seq).as_bytes())
                    .await
                    .unwrap();
                server_write.flush().await.unwrap();
            }
        });

        let (client_read, client_write) = tokio::io::split(client);
        let session = Arc::new(AgiSession::new(client_read, client_write).await.unwrap());

        let mut tasks = Vec::new();
        for caller in 0..CALLERS {
            let session = Arc::clone(&session);
            tasks.push(tokio::spawn(async move {
                for round in 0..ROUNDS {
                    let seq = caller * ROUNDS + round;
                    let reply = session
                        .execute(&format!("VERBOSE msg-{} 1", seq))
                        .await
                        .unwrap();
                    // The mutex pairs each reply with its own command.
                    assert_eq!(reply.result as usize, seq);
                }
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }
        responder.await.unwrap();
    }
}

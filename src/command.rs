//! Command line construction and argument quoting

use crate::error::{AgiError, AgiResult};

/// Validate that a user-provided string contains no newline characters.
///
/// AGI commands are line-delimited; embedded newlines would allow injection
/// of arbitrary protocol commands.
pub(crate) fn validate_no_newlines(s: &str, context: &str) -> AgiResult<()> {
    if s.contains('\n') || s.contains('\r') {
        return Err(AgiError::command_invalid(format!(
            "{} must not contain newlines",
            context
        )));
    }
    Ok(())
}

/// Backslash-escape `\` and `"` for use inside a quoted AGI argument.
pub fn escape_arg(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Reverse [`escape_arg`]: unescape `\"` and `\\` sequences.
pub fn unescape_arg(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('"' | '\\')) => out.push(next),
                Some(next) => {
                    out.push(c);
                    out.push(next);
                }
                None => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Quote an argument if it needs quoting.
///
/// Arguments containing a space or a double quote are wrapped in double
/// quotes with internal `\` and `"` backslash-escaped; anything else is
/// passed through verbatim.
pub fn quote_arg(s: &str) -> String {
    if s.contains(' ') || s.contains('"') {
        format!("\"{}\"", escape_arg(s))
    } else {
        s.to_string()
    }
}

/// Join command parts into a single wire line with proper quoting.
pub fn join_command(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| quote_arg(p))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a command line into its components, honoring quotes and escapes.
pub fn split_command(cmd: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in cmd.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }

        match c {
            '\\' => escaped = true,
            '"' => in_quotes = !in_quotes,
            ' ' if !in_quotes => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

/// Builder for AGI command lines not covered by the typed
/// [`AgiSession`](crate::AgiSession) methods.
///
/// Produces the single-line wire format with arguments quoted as needed.
///
/// ```
/// use asterisk_agi_tokio::CommandBuilder;
///
/// let cmd = CommandBuilder::new("EXEC")
///     .arg("Playback")
///     .arg("tt-monkeys rest")
///     .build();
/// assert_eq!(cmd, "EXEC Playback \"tt-monkeys rest\"");
/// ```
#[derive(Debug)]
pub struct CommandBuilder {
    line: String,
}

impl CommandBuilder {
    /// Start building a command with the given application name.
    pub fn new(application: &str) -> Self {
        Self {
            line: application.to_string(),
        }
    }

    /// Append one argument, quoted if it contains spaces or quotes.
    pub fn arg(mut self, arg: &str) -> Self {
        self.line.push(' ');
        self.line.push_str(&quote_arg(arg));
        self
    }

    /// Append one argument verbatim, without quoting.
    ///
    /// Use for pre-formatted tokens like numeric fields.
    pub fn raw_arg(mut self, arg: &str) -> Self {
        self.line.push(' ');
        self.line.push_str(arg);
        self
    }

    /// Build the command line.
    pub fn build(self) -> String {
        self.line
    }
}

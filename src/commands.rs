//! Typed convenience operations over [`AgiSession::execute`]
//!
//! Each operation is a thin format-and-call wrapper: it builds one command
//! line, runs one round trip, and maps the reply's `result`/`data` fields to
//! a typed value. The `-1` result (hangup or expired wait) is translated
//! into an empty successful value, never an error — only malformed replies
//! and transport faults are errors.

use crate::command::escape_arg;
use crate::error::AgiResult;
use crate::session::AgiSession;

/// Always-quoted argument, as Asterisk expects for escape-digit sets and
/// free-text values (an empty set must still be sent as `""`).
fn quoted(s: &str) -> String {
    format!("\"{}\"", escape_arg(s))
}

impl AgiSession {
    /// `ANSWER` — answer the channel.
    pub async fn answer(&self) -> AgiResult<()> {
        self.execute("ANSWER").await?;
        Ok(())
    }

    /// `HANGUP` — hang up the channel.
    pub async fn hangup(&self) -> AgiResult<()> {
        self.execute("HANGUP").await?;
        Ok(())
    }

    /// `NOOP` — no operation; useful for diagnostics.
    pub async fn noop(&self) -> AgiResult<()> {
        self.execute("NOOP").await?;
        Ok(())
    }

    /// `VERBOSE` — write a message to the Asterisk verbose log.
    pub async fn verbose(&self, message: &str, level: u8) -> AgiResult<()> {
        self.execute(&format!("VERBOSE {} {}", quoted(message), level))
            .await?;
        Ok(())
    }

    /// `CHANNEL STATUS` — numeric status of the current channel.
    pub async fn channel_status(&self) -> AgiResult<i32> {
        let reply = self.execute("CHANNEL STATUS").await?;
        Ok(reply.result)
    }

    /// `EXEC` — run a dialplan application. Options are joined with commas,
    /// matching dialplan argument syntax.
    pub async fn exec(&self, application: &str, options: &[&str]) -> AgiResult<i32> {
        let command = if options.is_empty() {
            format!("EXEC {}", application)
        } else {
            format!("EXEC {} {}", application, quoted(&options.join(",")))
        };
        let reply = self.execute(&command).await?;
        Ok(reply.result)
    }

    /// `GET VARIABLE` — read a channel variable. `None` when the variable
    /// is not set.
    pub async fn get_variable(&self, name: &str) -> AgiResult<Option<String>> {
        let reply = self.execute(&format!("GET VARIABLE {}", name)).await?;
        if reply.result == 1 {
            Ok(Some(reply.data))
        } else {
            Ok(None)
        }
    }

    /// `SET VARIABLE` — set a channel variable.
    pub async fn set_variable(&self, name: &str, value: &str) -> AgiResult<()> {
        self.execute(&format!("SET VARIABLE {} {}", name, quoted(value)))
            .await?;
        Ok(())
    }

    /// `STREAM FILE` — play a sound file, interruptible by the given escape
    /// digits. Returns the digit that interrupted playback, if any.
    pub async fn stream_file(
        &self,
        filename: &str,
        escape_digits: &str,
    ) -> AgiResult<Option<char>> {
        let reply = self
            .execute(&format!("STREAM FILE {} {}", filename, quoted(escape_digits)))
            .await?;
        Ok(reply.digit())
    }

    /// `GET OPTION` — like [`stream_file`](Self::stream_file) with a
    /// post-playback digit wait. `None` on timeout or hangup.
    pub async fn get_option(
        &self,
        filename: &str,
        escape_digits: &str,
        timeout_ms: u32,
    ) -> AgiResult<Option<char>> {
        let reply = self
            .execute(&format!(
                "GET OPTION {} {} {}",
                filename,
                quoted(escape_digits),
                timeout_ms
            ))
            .await?;
        Ok(reply.digit())
    }

    /// `WAIT FOR DIGIT` — wait up to `timeout_ms` for one DTMF digit
    /// (`-1` waits forever). `None` on timeout or hangup.
    pub async fn wait_for_digit(&self, timeout_ms: i32) -> AgiResult<Option<char>> {
        let reply = self
            .execute(&format!("WAIT FOR DIGIT {}", timeout_ms))
            .await?;
        Ok(reply.digit())
    }

    /// `GET DATA` — play a prompt and collect digits. Returns the reply's
    /// data payload (possibly empty; `timeout` when the wait expired).
    pub async fn get_data(
        &self,
        filename: &str,
        timeout_ms: u32,
        max_digits: u32,
    ) -> AgiResult<String> {
        let reply = self
            .execute(&format!("GET DATA {} {} {}", filename, timeout_ms, max_digits))
            .await?;
        Ok(reply.data)
    }

    /// `SAY NUMBER` — say a number, interruptible. Returns the interrupting
    /// digit, `None` on completion, timeout, or hangup.
    pub async fn say_number(&self, number: i64, escape_digits: &str) -> AgiResult<Option<char>> {
        let reply = self
            .execute(&format!("SAY NUMBER {} {}", number, quoted(escape_digits)))
            .await?;
        Ok(reply.digit())
    }

    /// `SAY DIGITS` — say a digit string, interruptible.
    pub async fn say_digits(&self, digits: &str, escape_digits: &str) -> AgiResult<Option<char>> {
        let reply = self
            .execute(&format!("SAY DIGITS {} {}", digits, quoted(escape_digits)))
            .await?;
        Ok(reply.digit())
    }

    /// `SAY DATETIME` — say a unix timestamp, interruptible.
    pub async fn say_datetime(
        &self,
        timestamp: i64,
        escape_digits: &str,
        format: &str,
        timezone: &str,
    ) -> AgiResult<Option<char>> {
        let reply = self
            .execute(&format!(
                "SAY DATETIME {} {} {} {}",
                timestamp,
                quoted(escape_digits),
                format,
                timezone
            ))
            .await?;
        Ok(reply.digit())
    }

    /// `RECORD FILE` — record channel audio to a file. Returns the digit
    /// that stopped the recording, `None` on timeout or hangup.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_file(
        &self,
        filename: &str,
        format: &str,
        escape_digits: &str,
        timeout_ms: i32,
        offset: i32,
        beep: bool,
        silence_s: u32,
    ) -> AgiResult<Option<char>> {
        let mut command = format!(
            "RECORD FILE {} {} {} {} {}",
            filename,
            format,
            quoted(escape_digits),
            timeout_ms,
            offset
        );
        if beep {
            command.push_str(" BEEP");
        }
        if silence_s > 0 {
            command.push_str(&format!(" s={}", silence_s));
        }
        let reply = self.execute(&command).await?;
        Ok(reply.digit())
    }

    /// `DATABASE GET` — read a value from the Asterisk database. `None`
    /// when the key does not exist.
    pub async fn database_get(&self, family: &str, key: &str) -> AgiResult<Option<String>> {
        let reply = self
            .execute(&format!("DATABASE GET {} {}", family, key))
            .await?;
        if reply.result == 1 {
            Ok(Some(reply.data))
        } else {
            Ok(None)
        }
    }

    /// `DATABASE PUT` — store a value in the Asterisk database.
    pub async fn database_put(&self, family: &str, key: &str, value: &str) -> AgiResult<()> {
        self.execute(&format!("DATABASE PUT {} {} {}", family, key, quoted(value)))
            .await?;
        Ok(())
    }

    /// `DATABASE DEL` — delete a key from the Asterisk database.
    pub async fn database_del(&self, family: &str, key: &str) -> AgiResult<()> {
        self.execute(&format!("DATABASE DEL {} {}", family, key))
            .await?;
        Ok(())
    }

    /// `SEND TEXT` — send text on channels that support it.
    pub async fn send_text(&self, text: &str) -> AgiResult<()> {
        self.execute(&format!("SEND TEXT {}", quoted(text))).await?;
        Ok(())
    }

    /// `SEND IMAGE` — send an image on channels that support it.
    pub async fn send_image(&self, image: &str) -> AgiResult<()> {
        self.execute(&format!("SEND IMAGE {}", image)).await?;
        Ok(())
    }

    /// `RECEIVE CHAR` — receive one character on channels that support it.
    /// `None` on timeout or hangup.
    pub async fn receive_char(&self, timeout_ms: u32) -> AgiResult<Option<char>> {
        let reply = self
            .execute(&format!("RECEIVE CHAR {}", timeout_ms))
            .await?;
        Ok(reply.digit())
    }

    /// `RECEIVE TEXT` — receive text on channels that support it.
    pub async fn receive_text(&self, timeout_ms: u32) -> AgiResult<String> {
        let reply = self
            .execute(&format!("RECEIVE TEXT {}", timeout_ms))
            .await?;
        Ok(reply.data)
    }

    /// `SET MUSIC` — start or stop music on hold.
    pub async fn set_music(&self, on: bool, class: &str) -> AgiResult<()> {
        let state = if on { "ON" } else { "OFF" };
        let command = if class.is_empty() {
            format!("SET MUSIC {}", state)
        } else {
            format!("SET MUSIC {} {}", state, class)
        };
        self.execute(&command).await?;
        Ok(())
    }

    /// `SET CALLERID` — set the caller id for the channel.
    pub async fn set_caller_id(&self, number: &str) -> AgiResult<()> {
        self.execute(&format!("SET CALLERID {}", number)).await?;
        Ok(())
    }

    /// `SET CONTEXT` — set the dialplan context to continue in.
    pub async fn set_context(&self, context: &str) -> AgiResult<()> {
        self.execute(&format!("SET CONTEXT {}", context)).await?;
        Ok(())
    }

    /// `SET EXTENSION` — set the dialplan extension to continue at.
    pub async fn set_extension(&self, extension: &str) -> AgiResult<()> {
        self.execute(&format!("SET EXTENSION {}", extension)).await?;
        Ok(())
    }

    /// `SET PRIORITY` — set the dialplan priority to continue at.
    pub async fn set_priority(&self, priority: i32) -> AgiResult<()> {
        self.execute(&format!("SET PRIORITY {}", priority)).await?;
        Ok(())
    }
}

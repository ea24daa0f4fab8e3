//! AGI wire protocol parsing: reply lines and environment headers

use crate::constants::{RESULT_PREFIX, SUCCESS_MARKER};
use crate::error::{AgiError, AgiResult};

/// Parsed result of one AGI reply line.
///
/// Every well-formed reply has the shape `200 result=<integer>[ (<data>)]`.
/// The meaning of `result` is command-specific: `0`/`1` are generic success,
/// `-1` conventionally means the call hung up or the wait timed out, and
/// positive values may encode a DTMF digit as its ASCII code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgiReply {
    /// `1` for a structurally valid success line.
    pub status: i32,
    /// Integer outcome code, faithfully as sent (including `-1`).
    pub result: i32,
    /// Optional parenthesized payload, unwrapped. Empty if absent.
    pub data: String,
    /// Original reply line (trailing whitespace trimmed), for diagnostics.
    pub raw: String,
}

impl AgiReply {
    /// Parse one reply line.
    ///
    /// The line must start with the literal `200` success marker followed
    /// by exactly one space; any other prefix is
    /// [`AgiError::InvalidResponse`]. The token after the marker must be
    /// `result=<integer>`, otherwise [`AgiError::UnparseableResult`]. A
    /// partially populated reply is never returned.
    pub fn parse(line: &str) -> AgiResult<Self> {
        let line = line.trim_end();

        let Some(remainder) = line
            .strip_prefix(SUCCESS_MARKER)
            .and_then(|r| r.strip_prefix(' '))
        else {
            return Err(AgiError::InvalidResponse {
                line: line.to_string(),
            });
        };

        let (code_token, rest) = match remainder.split_once(' ') {
            Some((code, rest)) => (code, Some(rest)),
            None => (remainder, None),
        };

        let result = code_token
            .strip_prefix(RESULT_PREFIX)
            .and_then(|code| code.parse::<i32>().ok())
            .ok_or_else(|| AgiError::UnparseableResult {
                line: line.to_string(),
            })?;

        let data = match rest {
            Some(rest) => {
                let rest = rest.trim();
                rest.strip_prefix('(')
                    .and_then(|inner| inner.strip_suffix(')'))
                    .unwrap_or(rest)
                    .to_string()
            }
            None => String::new(),
        };

        Ok(Self {
            status: 1,
            result,
            data,
            raw: line.to_string(),
        })
    }

    /// `true` when the reply carries the conventional hangup-or-timeout
    /// result of `-1`.
    pub fn is_hangup_or_timeout(&self) -> bool {
        self.result == -1
    }

    /// Interpret a positive `result` as a DTMF digit (its ASCII code).
    ///
    /// `None` for `0` (no input) and `-1` (hangup or timeout).
    pub fn digit(&self) -> Option<char> {
        u32::try_from(self.result)
            .ok()
            .filter(|&code| code > 0)
            .and_then(char::from_u32)
    }
}

/// Coarse classification of an integer result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    /// `0` or a positive result.
    Success,
    /// `-1` — the call hung up or the requested wait expired. The protocol
    /// does not distinguish the two causes.
    Hangup,
    /// Any other negative result.
    Error,
}

impl ResultCode {
    /// Classify a raw `result` value.
    pub fn from_result(result: i32) -> Self {
        match result {
            0 => ResultCode::Success,
            -1 => ResultCode::Hangup,
            r if r > 0 => ResultCode::Success,
            _ => ResultCode::Error,
        }
    }
}

/// Parse one environment header line.
///
/// Returns `Ok(None)` for the blank line that terminates the block, and
/// `Ok(Some((key, value)))` for a `key: value` line with both sides trimmed.
/// A non-blank line without a `:` separator is
/// [`AgiError::MalformedEnvironment`].
pub(crate) fn parse_env_line(line: &str) -> AgiResult<Option<(String, String)>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let Some((key, value)) = line.split_once(':') else {
        return Err(AgiError::MalformedEnvironment {
            line: line.to_string(),
        });
    };

    Ok(Some((key.trim().to_string(), value.trim().to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_reply() {
        let reply = AgiReply::parse("200 result=1\n").unwrap();
        assert_eq!(reply.status, 1);
        assert_eq!(reply.result, 1);
        assert_eq!(reply.data, "");
        assert_eq!(reply.raw, "200 result=1");
    }

    #[test]
    fn parse_reply_with_parenthesized_data() {
        let reply = AgiReply::parse("200 result=1 (hello)").unwrap();
        assert_eq!(reply.status, 1);
        assert_eq!(reply.result, 1);
        assert_eq!(reply.data, "hello");
        assert_eq!(reply.raw, "200 result=1 (hello)");
    }

    #[test]
    fn parse_reply_with_bare_data() {
        let reply = AgiReply::parse("200 result=1 endpos=12288").unwrap();
        assert_eq!(reply.result, 1);
        assert_eq!(reply.data, "endpos=12288");
    }

    #[test]
    fn parse_negative_result() {
        let reply = AgiReply::parse("200 result=-1").unwrap();
        assert_eq!(reply.result, -1);
        assert!(reply.is_hangup_or_timeout());
        assert_eq!(reply.digit(), None);
    }

    #[test]
    fn digit_from_ascii_result() {
        let reply = AgiReply::parse("200 result=53").unwrap();
        assert_eq!(reply.digit(), Some('5'));

        let reply = AgiReply::parse("200 result=35").unwrap();
        assert_eq!(reply.digit(), Some('#'));

        let reply = AgiReply::parse("200 result=0").unwrap();
        assert_eq!(reply.digit(), None);
    }

    #[test]
    fn non_success_marker_is_protocol_error() {
        for line in ["500 invalid command", "510 Invalid or unknown command", "HANGUP", ""] {
            let err = AgiReply::parse(line).unwrap_err();
            assert!(
                matches!(err, AgiError::InvalidResponse { .. }),
                "line: {line:?}, err: {err:?}"
            );
        }
    }

    #[test]
    fn marker_requires_exactly_one_space() {
        // Fused marker or a bare "200" never reaches result parsing.
        for line in ["200result=1", "200"] {
            let err = AgiReply::parse(line).unwrap_err();
            assert!(
                matches!(err, AgiError::InvalidResponse { .. }),
                "line: {line:?}, err: {err:?}"
            );
        }
        // A second space leaves an empty result token.
        let err = AgiReply::parse("200  result=1").unwrap_err();
        assert!(matches!(err, AgiError::UnparseableResult { .. }));
    }

    #[test]
    fn missing_or_bad_result_code_is_protocol_error() {
        for line in ["200 result=", "200 result=abc", "200 ok"] {
            let err = AgiReply::parse(line).unwrap_err();
            assert!(
                matches!(err, AgiError::UnparseableResult { .. }),
                "line: {line:?}, err: {err:?}"
            );
        }
    }

    #[test]
    fn result_and_data_round_trip() {
        // Re-deriving the line from the parsed fields yields the same
        // semantic content.
        for line in ["200 result=1 (hello)", "200 result=-1", "200 result=0"] {
            let reply = AgiReply::parse(line).unwrap();
            let rebuilt = if reply.data.is_empty() {
                format!("200 result={}", reply.result)
            } else {
                format!("200 result={} ({})", reply.result, reply.data)
            };
            assert_eq!(rebuilt, line);
        }
    }

    #[test]
    fn result_code_classification() {
        assert_eq!(ResultCode::from_result(0), ResultCode::Success);
        assert_eq!(ResultCode::from_result(49), ResultCode::Success);
        assert_eq!(ResultCode::from_result(-1), ResultCode::Hangup);
        assert_eq!(ResultCode::from_result(-2), ResultCode::Error);
    }

    #[test]
    fn env_line_parsing() {
        assert_eq!(
            parse_env_line("agi_network: yes\n").unwrap(),
            Some(("agi_network".to_string(), "yes".to_string()))
        );
        assert_eq!(parse_env_line("\n").unwrap(), None);
        assert_eq!(parse_env_line("   ").unwrap(), None);
        assert!(matches!(
            parse_env_line("no separator here").unwrap_err(),
            AgiError::MalformedEnvironment { .. }
        ));
    }

    #[test]
    fn env_value_may_contain_colons() {
        assert_eq!(
            parse_env_line("agi_request: agi://localhost:4573/demo").unwrap(),
            Some((
                "agi_request".to_string(),
                "agi://localhost:4573/demo".to_string()
            ))
        );
    }
}

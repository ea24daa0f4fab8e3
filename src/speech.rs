//! Speech-engine (MRCP) operations
//!
//! Wrappers for the `SPEECH ...` AGI command family used with speech
//! recognition and synthesis engines such as UniMRCP.

use crate::command::escape_arg;
use crate::error::{AgiError, AgiResult};
use crate::session::AgiSession;

/// Parameters for a `SPEECH RECOGNIZE` request.
///
/// Option pairs are appended as `key=value` tokens in the order given.
#[derive(Debug, Clone, Default)]
pub struct SpeechRecognize {
    /// Grammar name or inline grammar reference.
    pub grammar: String,
    /// Recognition timeout in milliseconds, if bounded.
    pub timeout_ms: Option<u32>,
    /// Engine-specific `key=value` options.
    pub options: Vec<(String, String)>,
    /// Channel variable to receive the recognition result.
    pub result_var: Option<String>,
    /// Channel variable to receive the completion cause.
    pub completion_var: Option<String>,
}

/// Parameters for a `SPEECH SYNTHESIZE` request.
#[derive(Debug, Clone, Default)]
pub struct SpeechSynthesize {
    /// Text to synthesize.
    pub text: String,
    /// Engine-specific `key=value` options.
    pub options: Vec<(String, String)>,
    /// Channel variable to receive the synthesis result.
    pub result_var: Option<String>,
}

impl AgiSession {
    /// `SPEECH CREATE` — allocate a speech object for this channel.
    pub async fn speech_create(&self) -> AgiResult<()> {
        self.execute("SPEECH CREATE").await?;
        Ok(())
    }

    /// `SPEECH DESTROY` — release the channel's speech object.
    pub async fn speech_destroy(&self) -> AgiResult<()> {
        self.execute("SPEECH DESTROY").await?;
        Ok(())
    }

    /// `SPEECH LOAD GRAMMAR` — load a grammar from a path.
    pub async fn speech_load_grammar(&self, grammar: &str, path: &str) -> AgiResult<()> {
        self.execute(&format!("SPEECH LOAD GRAMMAR {} {}", grammar, path))
            .await?;
        Ok(())
    }

    /// `SPEECH UNLOAD GRAMMAR` — unload a previously loaded grammar.
    pub async fn speech_unload_grammar(&self, grammar: &str) -> AgiResult<()> {
        self.execute(&format!("SPEECH UNLOAD GRAMMAR {}", grammar))
            .await?;
        Ok(())
    }

    /// `SPEECH ACTIVATE GRAMMAR` — activate a loaded grammar.
    pub async fn speech_activate_grammar(&self, grammar: &str) -> AgiResult<()> {
        self.execute(&format!("SPEECH ACTIVATE GRAMMAR {}", grammar))
            .await?;
        Ok(())
    }

    /// `SPEECH DEACTIVATE GRAMMAR` — deactivate a grammar.
    pub async fn speech_deactivate_grammar(&self, grammar: &str) -> AgiResult<()> {
        self.execute(&format!("SPEECH DEACTIVATE GRAMMAR {}", grammar))
            .await?;
        Ok(())
    }

    /// `SPEECH SET` — set a speech engine setting.
    pub async fn speech_set(&self, name: &str, value: &str) -> AgiResult<()> {
        self.execute(&format!("SPEECH SET {} {}", name, value))
            .await?;
        Ok(())
    }

    /// `SPEECH RECOGNIZE` — run a recognition request.
    pub async fn speech_recognize(&self, request: &SpeechRecognize) -> AgiResult<()> {
        if request.grammar.is_empty() {
            return Err(AgiError::command_invalid(
                "speech recognition requires a grammar",
            ));
        }

        let mut command = format!("SPEECH RECOGNIZE {}", request.grammar);
        if let Some(timeout_ms) = request.timeout_ms {
            command.push_str(&format!(" {}", timeout_ms));
        }
        for (key, value) in &request.options {
            command.push_str(&format!(" {}={}", key, value));
        }
        if let Some(result_var) = &request.result_var {
            command.push_str(&format!(" '{}'", escape_arg(result_var)));
        }
        if let Some(completion_var) = &request.completion_var {
            command.push_str(&format!(" '{}'", escape_arg(completion_var)));
        }

        self.execute(&command).await?;
        Ok(())
    }

    /// `SPEECH SYNTHESIZE` — run a synthesis request.
    pub async fn speech_synthesize(&self, request: &SpeechSynthesize) -> AgiResult<()> {
        if request.text.is_empty() {
            return Err(AgiError::command_invalid("speech synthesis requires text"));
        }

        let mut command = format!("SPEECH SYNTHESIZE '{}'", escape_arg(&request.text));
        for (key, value) in &request.options {
            command.push_str(&format!(" {}={}", key, value));
        }
        if let Some(result_var) = &request.result_var {
            command.push_str(&format!(" '{}'", escape_arg(result_var)));
        }

        self.execute(&command).await?;
        Ok(())
    }
}

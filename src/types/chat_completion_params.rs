use serde::{Deserialize, Serialize};

use crate::types::Message;

/// Request body for the `chat/completions` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionParams {
    /// The model that should answer.
    pub model: String,

    /// The whole conversation, system message first.
    pub messages: Vec<Message>,

    /// Whether the reply is delivered as server-sent events.
    pub stream: bool,

    /// Sampling temperature.
    pub temperature: f32,

    /// Upper bound on the length of the reply, in tokens.
    pub max_tokens: u32,
}

impl ChatCompletionParams {
    /// Create new non-streaming parameters.
    pub fn new(
        model: impl Into<String>,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
            temperature,
            max_tokens,
        }
    }

    /// Request a streamed reply.
    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn params_serialization() {
        let params = ChatCompletionParams::new(
            "gpt-4o-mini",
            vec![Message::system("Be kind."), Message::user("Hello")],
            0.5,
            100,
        )
        .streaming();

        assert_eq!(
            to_value(&params).unwrap(),
            json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "Be kind."},
                    {"role": "user", "content": "Hello"}
                ],
                "stream": true,
                "temperature": 0.5,
                "max_tokens": 100
            })
        );
    }
}

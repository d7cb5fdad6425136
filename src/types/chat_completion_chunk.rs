use serde::{Deserialize, Serialize};

use crate::types::Role;

/// One `chat.completion.chunk` event of a streamed reply.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Identifier shared by every chunk of one reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The model that produced the chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Incremental updates, one per requested choice.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// The per-choice part of a [`ChatCompletionChunk`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Which choice this update belongs to.
    #[serde(default)]
    pub index: u32,

    /// The new text, if any.
    #[serde(default)]
    pub delta: ChunkDelta,

    /// Set on the final chunk of the choice (`stop`, `length`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Text added to a choice by one chunk.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Present on the first chunk only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// The text fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatCompletionChunk {
    /// The text fragment of the first choice, if it carries any.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
            .filter(|text| !text.is_empty())
    }

    /// The finish reason of the first choice, if this is its final chunk.
    pub fn finish_reason(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.finish_reason.as_deref())
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// The author of a message in the conversation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The fixed instruction that opens every conversation.
    System,

    /// The person typing at the prompt.
    User,

    /// The model.
    Assistant,
}

impl Role {
    /// The wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn role_serialization() {
        assert_eq!(to_value(Role::System).unwrap(), json!("system"));
        assert_eq!(to_value(Role::User).unwrap(), json!("user"));
        assert_eq!(to_value(Role::Assistant).unwrap(), json!("assistant"));
    }

    #[test]
    fn role_deserialization() {
        let role: Role = serde_json::from_value(json!("assistant")).unwrap();
        assert_eq!(role, Role::Assistant);
        assert!(serde_json::from_value::<Role>(json!("tool")).is_err());
    }
}

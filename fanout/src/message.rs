use crate::error::Error;
use serde::{Deserialize, Serialize};

/// The unit of communication exchanged between clients.
///
/// On the wire both inbound and outbound messages use the same shape:
/// `{"user": "...", "message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub user: String,
    #[serde(rename = "message")]
    pub text: String,
}

// Inbound frames are decoded leniently first so that a missing field can be
// reported separately from a payload that isn't JSON at all.
#[derive(Deserialize)]
struct InboundPayload {
    user: Option<String>,
    message: Option<String>,
}

impl Message {
    pub fn new(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            text: text.into(),
        }
    }

    /// Builds the notice broadcast on behalf of a user whose session has ended.
    pub fn departure(user: &str) -> Self {
        Self {
            user: user.to_string(),
            text: format!("User {user} has disconnected"),
        }
    }

    /// Decodes and validates an inbound payload. Both `user` and `message`
    /// must be present and non-empty.
    pub fn from_json(payload: &str) -> Result<Self, Error> {
        let raw: InboundPayload =
            serde_json::from_str(payload).map_err(|e| Error::MalformedPayload(e.to_string()))?;

        let user = raw
            .user
            .filter(|u| !u.is_empty())
            .ok_or(Error::MissingField("user"))?;
        let text = raw
            .message
            .filter(|m| !m.is_empty())
            .ok_or(Error::MissingField("message"))?;

        Ok(Self { user, text })
    }

    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

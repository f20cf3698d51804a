// Session partition key

use super::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of every session token the service accepts.
pub const SESSION_ID_LEN: usize = 32;

/// Opaque per-browser token scoping job visibility. Not authenticated.
///
/// Deserializes through the same length check as [`SessionId::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Accept a caller-supplied token only if it has the expected fixed length.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.chars().count() == SESSION_ID_LEN {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    /// Wrap a token minted by an `IdProvider`, which guarantees the length.
    pub(crate) fn from_generated(raw: String) -> Self {
        debug_assert_eq!(raw.chars().count(), SESSION_ID_LEN);
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = DomainError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        let actual = raw.chars().count();
        if actual == SESSION_ID_LEN {
            Ok(Self(raw))
        } else {
            Err(DomainError::InvalidSessionId {
                expected: SESSION_ID_LEN,
                actual,
            })
        }
    }
}

impl From<SessionId> for String {
    fn from(session: SessionId) -> Self {
        session.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

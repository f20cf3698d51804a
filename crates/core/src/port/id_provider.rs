// ID Provider Port (for deterministic testing)

use crate::domain::{SessionId, JOB_ID_LEN};

/// ID provider interface (allows deterministic IDs in tests)
pub trait IdProvider: Send + Sync {
    /// Generate a short job/file token. Uniqueness is enforced by the caller.
    fn generate_id(&self) -> String;

    /// Mint a fresh session token of the accepted fixed length
    fn generate_session_id(&self) -> SessionId;
}

/// UUID v4 backed provider (production)
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn generate_id(&self) -> String {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(JOB_ID_LEN);
        id
    }

    fn generate_session_id(&self) -> SessionId {
        SessionId::from_generated(uuid::Uuid::new_v4().simple().to_string())
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Hands out a scripted sequence of ids, then falls back to UUIDs.
    /// Scripting repeats lets tests force id collisions.
    pub struct SequenceIdProvider {
        ids: Mutex<VecDeque<String>>,
    }

    impl SequenceIdProvider {
        pub fn new<I, S>(ids: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                ids: Mutex::new(ids.into_iter().map(Into::into).collect()),
            }
        }
    }

    impl IdProvider for SequenceIdProvider {
        fn generate_id(&self) -> String {
            self.ids
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| UuidProvider.generate_id())
        }

        fn generate_session_id(&self) -> SessionId {
            UuidProvider.generate_session_id()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SESSION_ID_LEN;

    #[test]
    fn test_uuid_provider_lengths() {
        assert_eq!(UuidProvider.generate_id().len(), JOB_ID_LEN);
        assert_eq!(
            UuidProvider.generate_session_id().as_str().len(),
            SESSION_ID_LEN
        );
    }
}

//! Hub error type: one enum per failure kind, converted to a failed response
//! frame at the dispatcher boundary. The channel stays open on any of these.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HubError>;

#[derive(Error, Debug)]
pub enum HubError {
    /// Scene/project not open, state-machine mismatch, id not found.
    #[error("{0}")]
    Precondition(String),
    /// Name collision, malformed identifier, type mismatch, invalid logic.
    #[error("{0}")]
    Validation(String),
    /// Lock could not be taken or released, or a global op is blocked by
    /// somebody's edit lock.
    #[error("{0}")]
    Locking(String),
    /// A collaborator (store, scene service, build, execution) failed; the
    /// underlying message is surfaced under the collaborator's name.
    #[error("{collaborator}: {message}")]
    External {
        collaborator: &'static str,
        message: String,
    },
    /// Contract violation inside the hub; logged with its chain, reported
    /// generically.
    #[error("Internal error.")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl HubError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn locking(msg: impl Into<String>) -> Self {
        Self::Locking(msg.into())
    }

    pub fn external(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::External {
            collaborator,
            message: message.into(),
        }
    }

    pub fn internal(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(Box::new(source))
    }

    pub fn cannot_lock() -> Self {
        Self::Locking("Locking failed.".to_string())
    }

    pub fn cannot_unlock() -> Self {
        Self::Locking("Cannot unlock.".to_string())
    }

    /// Human-readable reasons for the wire `messages` list.
    pub fn messages(&self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl From<arhub_data::helpers::NameError> for HubError {
    fn from(e: arhub_data::helpers::NameError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<arhub_data::common::ModelError> for HubError {
    fn from(e: arhub_data::common::ModelError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<arhub_data::math::MathError> for HubError {
    fn from(e: arhub_data::math::MathError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<serde_json::Error> for HubError {
    fn from(e: serde_json::Error) -> Self {
        Self::Validation(format!("Invalid arguments: {e}."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_message_names_collaborator() {
        let e = HubError::external("Project service", "connection refused");
        assert_eq!(e.to_string(), "Project service: connection refused");
    }

    #[test]
    fn internal_hides_detail_from_user() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "instance map hole");
        let e = HubError::internal(io);
        assert_eq!(e.to_string(), "Internal error.");
        assert!(std::error::Error::source(&e).is_some());
    }
}

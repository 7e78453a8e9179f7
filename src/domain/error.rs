use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{field} must not be blank")]
    BlankField { field: &'static str },
    #[error("placeholder `{key}` is defined more than once")]
    DuplicatePlaceholder { key: String },
    #[error("certificate `{certificate_id}` already carries its content hash")]
    AlreadyFinalized { certificate_id: Uuid },
}

impl DomainError {
    pub fn blank(field: &'static str) -> Self {
        Self::BlankField { field }
    }

    /// Rejections caused by caller input rather than by an inconsistent record.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::AlreadyFinalized { .. })
    }
}

// ============================================================================
// Capability Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CapabilityError {
    #[error("Capability name cannot be empty")]
    EmptyName,

    #[error("Member email cannot be empty")]
    EmptyMemberEmail,

    #[error("{0} is already a member of the capability")]
    AlreadyMember(String),

    #[error("{0} is not a member of the capability")]
    NotAMember(String),
}

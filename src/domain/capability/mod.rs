// ============================================================================
// Capability Domain
// ============================================================================
//
// - Events (CapabilityCreated, MemberJoinedCapability, MemberLeftCapability)
// - Errors (CapabilityError)
// - Aggregate (Capability)
// - Repository contract (CapabilityRepository)
//
// ============================================================================

pub mod aggregate;
pub mod errors;
pub mod events;
pub mod repository;

pub use aggregate::*;
pub use errors::*;
pub use events::*;
pub use repository::*;

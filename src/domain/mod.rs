// ============================================================================
// Domain Layer - Inventory and Cart Business Types
// ============================================================================
//
// Plain data shared by both services:
// - Value objects (identifiers, stock rows, cart rows, listings)
// - Errors (the kinds every transport maps from)
// - Audit events (the envelope published to the message bus)
//
// Nothing in here talks to storage or the network.
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod events;

pub use value_objects::*;
pub use errors::*;
pub use events::*;

//! Ephemeral voice channel lifecycle for vcwarden.
//!
//! Creates an owner-bound channel when a member enters a trigger channel,
//! attaches the owner-only lock/unlock control surface, and reclaims managed
//! channels once they empty out. Also hosts the concurrent batch mover used by
//! bulk relocation commands.

pub mod batch_mover;
pub mod control_surface;
pub mod lifecycle;
pub mod ownership;

pub use batch_mover::*;
pub use control_surface::*;
pub use lifecycle::*;
pub use ownership::*;

//! Slash command collaborator for vcwarden.
//!
//! Normalized requests come in from the gateway adapter, pass staff
//! authorization and the per-caller cooldown, are deferred, and then answered
//! with text (chunked where needed) or an info card.

pub mod access;
pub mod catalog;
pub mod dispatcher;
pub mod handlers;
pub mod request;

pub use access::*;
pub use catalog::*;
pub use dispatcher::*;
pub use handlers::*;
pub use request::*;

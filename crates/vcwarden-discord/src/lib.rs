//! Discord gateway adapter for vcwarden, built on serenity.
//!
//! Implements the vcwarden transport traits over serenity's HTTP client and
//! cache, routes gateway events to the voice lifecycle, control surface and
//! command dispatcher, and registers the slash command catalog.

pub mod catalog;
pub mod convert;
pub mod gateway;
pub mod responder;
pub mod transport;

pub use catalog::*;
pub use convert::*;
pub use gateway::*;
pub use responder::*;
pub use transport::*;

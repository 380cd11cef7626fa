//! Foundational types shared across vcwarden crates.
//!
//! Holds snowflake ids, the error taxonomy, the guild transport seams (plus an
//! in-memory implementation), daily window arithmetic, the voice-system policy
//! registry, night-cycle arithmetic, and config file loading.

pub mod channel_policy;
pub mod config;
pub mod error;
pub mod ids;
pub mod memory_transport;
pub mod night_cycle;
pub mod time_utils;
pub mod transport;
pub mod window;

pub use channel_policy::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use memory_transport::InMemoryGuild;
pub use night_cycle::*;
pub use time_utils::*;
pub use transport::*;
pub use window::*;

//! Self-rescheduling daily window controllers.
//!
//! A [`RecurringWindowController`] evaluates its schedule, applies a
//! [`WindowSideEffect`] for the current phase, sleeps until the next boundary
//! and repeats. Mention-permission toggling and reminder posting are both
//! side effects on the same controller.

pub mod controller;
pub mod effect;
pub mod mention;
pub mod reminder;

pub use controller::*;
pub use effect::*;
pub use mention::*;
pub use reminder::*;

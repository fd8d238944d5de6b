//! Shared types and business rules for FinQuest components.
//!
//! Pure logic lives here: grading, the streak state machine, the
//! achievement catalog, and XP policy. Persistence stays in finquestd.

pub mod achievements;
pub mod error;
pub mod grading;
pub mod models;
pub mod streak;
pub mod xp;

pub use error::{FinquestError, Result};

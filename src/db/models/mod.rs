//! Database models split into separate files.
//! This module re-exports individual model modules so imports like
//! `use crate::db::models::*;` work across the crate.

pub mod appointment;
pub mod availability;
pub mod blocked_slot;
pub mod transaction;
pub mod user;

pub use self::appointment::*;
pub use self::availability::*;
pub use self::blocked_slot::*;
pub use self::transaction::*;
pub use self::user::*;

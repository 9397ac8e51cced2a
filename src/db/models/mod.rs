//! Persisted models.

pub mod calendar;

pub use self::calendar::*;

//! Domain records, filters and form rules.

pub mod entities;
pub mod error;
pub mod filter;
pub mod forms;

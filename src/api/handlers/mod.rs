//! API request handlers.

pub mod entries;
pub mod status;
pub mod uploads;

//! Gallery record types.
//!
//! Entries are immutable once the store has assigned their identity and
//! timestamp, so every other module can share them freely by value or `Arc`.

pub mod entry;

pub use entry::{Entry, EntryId, EntryList, NewEntry};

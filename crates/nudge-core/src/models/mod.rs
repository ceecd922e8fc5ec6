//! Data models for Nudge

mod entry;

pub use entry::{fields, Entry, GeoPoint, LocalId, Reminder};

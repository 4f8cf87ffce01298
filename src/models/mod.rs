//! Typed rows of the star schema
//!
//! Each persisted row type implements [`crate::storage::TableRow`], which
//! fixes its Arrow schema and table identity.

pub mod activity;
pub mod catalog;
pub mod songplay;

pub use activity::{NormalizedEvent, TimeRecord, UserRecord};
pub use catalog::{ArtistRecord, SongRecord};
pub use songplay::SongplayRecord;

//! Core data models for the artwork catalog.
//!
//! `Artwork` is the read-time projection served to clients; it is never
//! persisted as a whole. `ArtworkRecordRow` is the editable overlay row kept in
//! SQLite and mapped via `sqlx::FromRow`.

pub mod artwork;
pub mod record;

//! The editable overlay row persisted in the `artworks` table.

use chrono::NaiveDate;
use sqlx::FromRow;

/// User-edited fields for one artwork.
///
/// Empty strings and `None` dates mean "defer to the storage-derived value",
/// except for `painted_location` and `in_progress`, which always win when a
/// row exists.
#[derive(Clone, FromRow, Debug, Default, PartialEq)]
pub struct ArtworkRecordRow {
    /// Artwork identifier (primary key).
    pub id: String,

    pub title: String,

    pub painted_location: String,

    pub start_date: Option<NaiveDate>,

    pub end_date: Option<NaiveDate>,

    pub in_progress: bool,

    pub detalle: String,

    pub bitacora: String,

    pub primary_image: String,
}

impl ArtworkRecordRow {
    /// A row carrying only an id and a title, as written on creation.
    pub fn titled(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }
}

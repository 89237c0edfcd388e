use serde::{Deserialize, Serialize};

/// A folder. Notes reference at most one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: i64,
    pub name: String,
}

/// A tag. Notes reference any number through the `notes_tags` junction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// A hydrated note with its folder and tags inlined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<Folder>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// One row of the notes/folders/tags join. A note with N tags spans N rows;
/// a note without tags spans one row with null tag columns.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NoteRow {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
    pub folder_id: Option<i64>,
    pub folder_name: Option<String>,
    pub tag_id: Option<i64>,
    pub tag_name: Option<String>,
}

/// Filters for listing notes. All filters are optional and combine with AND.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NoteQuery {
    /// Case-insensitive substring of the title.
    pub search_term: Option<String>,
    pub folder_id: Option<i64>,
    /// Only notes carrying this tag. The other tags of a matching note are kept.
    pub tag_id: Option<i64>,
}

/// Parameters for creating a new note.
#[derive(Debug, Default, Clone)]
pub struct CreateNote {
    pub title: String,
    pub content: Option<String>,
    pub folder_id: Option<i64>,
    pub tags: Vec<i64>,
}

/// Partial update of a note. `None` leaves a field untouched.
///
/// `content` and `folder_id` are nullable columns, so `Some(None)` clears
/// them. `tags`, when present, replaces the whole tag set.
#[derive(Debug, Default, Clone)]
pub struct UpdateNote {
    pub title: Option<String>,
    pub content: Option<Option<String>>,
    pub folder_id: Option<Option<i64>>,
    pub tags: Option<Vec<i64>>,
}

impl UpdateNote {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.folder_id.is_none()
            && self.tags.is_none()
    }
}

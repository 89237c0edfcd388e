use crate::{CreateNote, Error, Folder, NoteRow, NoteSelect, Tag, UpdateNote};

/// Database abstraction that works for both SQLite and D1.
///
/// Uses `async_trait` with `?Send` bound for WASM compatibility.
/// The `?Send` is critical - WASM is single-threaded and JS values aren't Send.
#[async_trait::async_trait(?Send)]
pub trait Database {
    /// Run a note selection and return the flat join rows, ordered by note id.
    async fn note_rows(&self, select: &NoteSelect) -> Result<Vec<NoteRow>, Error>;

    /// Insert a note and its tag links as one unit. Returns the new note ID.
    async fn add_note(&self, note: CreateNote) -> Result<i64, Error>;

    /// Apply a patch to a note as one unit, replacing its tag links when the
    /// patch carries tags. Returns false (and writes nothing) if not found.
    async fn update_note(&self, id: i64, update: UpdateNote) -> Result<bool, Error>;

    /// Delete a note and its tag links. Returns true if deleted, false if not found.
    async fn delete_note(&self, id: i64) -> Result<bool, Error>;

    async fn list_folders(&self) -> Result<Vec<Folder>, Error>;

    async fn get_folder(&self, id: i64) -> Result<Option<Folder>, Error>;

    async fn add_folder(&self, name: &str) -> Result<Folder, Error>;

    /// Rename a folder. Returns None if not found.
    async fn rename_folder(&self, id: i64, name: &str) -> Result<Option<Folder>, Error>;

    /// Delete a folder. Notes in it are kept with no folder.
    async fn delete_folder(&self, id: i64) -> Result<bool, Error>;

    async fn list_tags(&self) -> Result<Vec<Tag>, Error>;

    async fn get_tag(&self, id: i64) -> Result<Option<Tag>, Error>;

    async fn add_tag(&self, name: &str) -> Result<Tag, Error>;

    /// Rename a tag. Returns None if not found.
    async fn rename_tag(&self, id: i64, name: &str) -> Result<Option<Tag>, Error>;

    /// Delete a tag and unlink it from every note.
    async fn delete_tag(&self, id: i64) -> Result<bool, Error>;
}

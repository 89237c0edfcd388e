use tracing::{debug, info};

use crate::{
    hydrate, CreateNote, Database, Error, Folder, Note, NoteQuery, NoteSelect, Tag, UpdateNote,
};

/// The main service that contains all business logic.
/// Generic over the database implementation.
pub struct NotefulService<D: Database> {
    db: D,
}

impl<D: Database> NotefulService<D> {
    pub fn new(db: D) -> Self {
        Self { db }
    }

    /// List notes matching the query, hydrated with folder and tags.
    pub async fn list_notes(&self, query: NoteQuery) -> Result<Vec<Note>, Error> {
        let rows = self.db.note_rows(&NoteSelect::Matching(query)).await?;
        debug!(rows = rows.len(), "fetched note rows");
        Ok(hydrate(rows))
    }

    /// Get a note by ID.
    pub async fn get_note(&self, id: i64) -> Result<Option<Note>, Error> {
        let rows = self.db.note_rows(&NoteSelect::ById(id)).await?;
        Ok(hydrate(rows).into_iter().next())
    }

    /// Create a note and return it as stored.
    pub async fn create_note(&self, note: CreateNote) -> Result<Note, Error> {
        let title = required("title", &note.title)?;

        let id = self
            .db
            .add_note(CreateNote {
                title,
                content: note.content,
                folder_id: note.folder_id,
                tags: normalize_tag_ids(note.tags),
            })
            .await?;
        info!(note_id = id, "created note");

        self.get_note(id)
            .await?
            .ok_or_else(|| Error::Internal(format!("note {} missing after insert", id)))
    }

    /// Update a note. Returns None if the note does not exist.
    ///
    /// The title is required on every update; the other fields are only
    /// written when present in the patch.
    pub async fn update_note(&self, id: i64, update: UpdateNote) -> Result<Option<Note>, Error> {
        let title = required("title", update.title.as_deref().unwrap_or_default())?;

        let update = UpdateNote {
            title: Some(title),
            content: update.content,
            folder_id: update.folder_id,
            tags: update.tags.map(normalize_tag_ids),
        };

        if !self.db.update_note(id, update).await? {
            debug!(note_id = id, "update skipped, note not found");
            return Ok(None);
        }
        info!(note_id = id, "updated note");

        self.get_note(id).await
    }

    /// Delete a note by ID. Returns whether a note was removed.
    pub async fn delete_note(&self, id: i64) -> Result<bool, Error> {
        let deleted = self.db.delete_note(id).await?;
        if deleted {
            info!(note_id = id, "deleted note");
        }
        Ok(deleted)
    }

    pub async fn list_folders(&self) -> Result<Vec<Folder>, Error> {
        self.db.list_folders().await
    }

    pub async fn get_folder(&self, id: i64) -> Result<Option<Folder>, Error> {
        self.db.get_folder(id).await
    }

    pub async fn create_folder(&self, name: &str) -> Result<Folder, Error> {
        let name = required("name", name)?;
        let folder = self.db.add_folder(&name).await?;
        info!(folder_id = folder.id, "created folder");
        Ok(folder)
    }

    /// Rename a folder. Returns None if the folder does not exist.
    pub async fn update_folder(&self, id: i64, name: &str) -> Result<Option<Folder>, Error> {
        let name = required("name", name)?;
        self.db.rename_folder(id, &name).await
    }

    pub async fn delete_folder(&self, id: i64) -> Result<bool, Error> {
        self.db.delete_folder(id).await
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>, Error> {
        self.db.list_tags().await
    }

    pub async fn get_tag(&self, id: i64) -> Result<Option<Tag>, Error> {
        self.db.get_tag(id).await
    }

    pub async fn create_tag(&self, name: &str) -> Result<Tag, Error> {
        let name = required("name", name)?;
        let tag = self.db.add_tag(&name).await?;
        info!(tag_id = tag.id, "created tag");
        Ok(tag)
    }

    /// Rename a tag. Returns None if the tag does not exist.
    pub async fn update_tag(&self, id: i64, name: &str) -> Result<Option<Tag>, Error> {
        let name = required("name", name)?;
        self.db.rename_tag(id, &name).await
    }

    pub async fn delete_tag(&self, id: i64) -> Result<bool, Error> {
        self.db.delete_tag(id).await
    }
}

/// Trim a required text field, rejecting blanks.
fn required(field: &str, value: &str) -> Result<String, Error> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Validation(format!(
            "missing `{}` in request body",
            field
        )));
    }
    Ok(value.to_string())
}

fn normalize_tag_ids(mut tags: Vec<i64>) -> Vec<i64> {
    tags.sort_unstable();
    tags.dedup();
    tags
}

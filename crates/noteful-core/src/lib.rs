//! Noteful core library - shared types, traits, and business logic.
//!
//! This crate contains no I/O and can be compiled for any target.

mod db;
mod error;
mod hydrate;
mod migrations;
mod note;
mod query;
mod service;

#[cfg(test)]
mod testing;

pub use db::Database;
pub use error::Error;
pub use hydrate::{flatten, hydrate};
pub use migrations::{
    get_pending_migrations, Migration, CREATE_META_TABLE, MIGRATIONS, SCHEMA_VERSION,
};
pub use note::{CreateNote, Folder, Note, NoteQuery, NoteRow, Tag, UpdateNote};
pub use query::{
    update_note_statement, NoteSelect, SqlValue, Statement, DELETE_NOTE, DELETE_NOTE_TAGS,
    INSERT_NOTE, INSERT_NOTE_TAG, LINK_EXISTING_NOTE_TAG, NOTE_EXISTS,
};
pub use service::NotefulService;

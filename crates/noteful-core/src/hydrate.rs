//! Folding flat join rows into notes.

use std::collections::HashMap;

use crate::{Folder, Note, NoteRow, Tag};

/// Group join rows into notes, one per distinct note id, in order of first
/// appearance.
///
/// Rows of one note are normally adjacent, but scattered rows still merge into
/// the note created by the first of them. Null tag columns contribute no tag,
/// and a tag id already present on the note is not added twice.
pub fn hydrate<I>(rows: I) -> Vec<Note>
where
    I: IntoIterator<Item = NoteRow>,
{
    let mut notes: Vec<Note> = Vec::new();
    let mut positions: HashMap<i64, usize> = HashMap::new();

    for row in rows {
        let NoteRow {
            id,
            title,
            content,
            folder_id,
            folder_name,
            tag_id,
            tag_name,
        } = row;

        let index = match positions.get(&id) {
            Some(&index) => index,
            None => {
                notes.push(Note {
                    id,
                    title,
                    content,
                    folder: folder_id.map(|folder_id| Folder {
                        id: folder_id,
                        name: folder_name.unwrap_or_default(),
                    }),
                    tags: Vec::new(),
                });
                positions.insert(id, notes.len() - 1);
                notes.len() - 1
            }
        };

        if let Some(tag_id) = tag_id {
            let tags = &mut notes[index].tags;
            if !tags.iter().any(|t| t.id == tag_id) {
                tags.push(Tag {
                    id: tag_id,
                    name: tag_name.unwrap_or_default(),
                });
            }
        }
    }

    notes
}

/// The inverse of [`hydrate`]: one row per (note, tag), or a single row with
/// null tag columns for an untagged note.
pub fn flatten(notes: &[Note]) -> Vec<NoteRow> {
    let mut rows = Vec::new();
    for note in notes {
        let base = NoteRow {
            id: note.id,
            title: note.title.clone(),
            content: note.content.clone(),
            folder_id: note.folder.as_ref().map(|f| f.id),
            folder_name: note.folder.as_ref().map(|f| f.name.clone()),
            tag_id: None,
            tag_name: None,
        };

        if note.tags.is_empty() {
            rows.push(base);
            continue;
        }

        for tag in &note.tags {
            rows.push(NoteRow {
                tag_id: Some(tag.id),
                tag_name: Some(tag.name.clone()),
                ..base.clone()
            });
        }
    }
    rows
}

//! In-memory `Database` used by the service tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

use crate::{CreateNote, Database, Error, Folder, NoteRow, NoteSelect, Tag, UpdateNote};

struct StoredNote {
    title: String,
    content: Option<String>,
    folder_id: Option<i64>,
}

#[derive(Default)]
struct State {
    next_id: i64,
    notes: BTreeMap<i64, StoredNote>,
    folders: BTreeMap<i64, String>,
    tags: BTreeMap<i64, String>,
    links: BTreeSet<(i64, i64)>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_refs(&self, folder_id: Option<i64>, tags: &[i64]) -> Result<(), Error> {
        let folder_ok = folder_id.map_or(true, |id| self.folders.contains_key(&id));
        if !folder_ok || tags.iter().any(|id| !self.tags.contains_key(id)) {
            return Err(Error::Database("FOREIGN KEY constraint failed".into()));
        }
        Ok(())
    }

    fn selected(&self, select: &NoteSelect, id: i64, note: &StoredNote) -> bool {
        match select {
            NoteSelect::ById(wanted) => *wanted == id,
            NoteSelect::Matching(query) => {
                // SQLite's LOWER only folds ASCII
                let term_ok = query.search_term.as_deref().map_or(true, |term| {
                    note.title
                        .to_ascii_lowercase()
                        .contains(&term.to_ascii_lowercase())
                });
                let folder_ok = query.folder_id.map_or(true, |f| note.folder_id == Some(f));
                let tag_ok = query
                    .tag_id
                    .map_or(true, |tag| self.links.contains(&(id, tag)));
                term_ok && folder_ok && tag_ok
            }
        }
    }
}

/// Counts every trait call so tests can assert the store was never reached.
pub struct MemoryDatabase {
    state: RefCell<State>,
    calls: Cell<usize>,
}

impl MemoryDatabase {
    /// Folders 1 "Archive", 2 "Drafts"; tags 1 "hot", 2 "cold", 3 "warm".
    pub fn seeded() -> Self {
        let mut state = State::default();
        for name in ["Archive", "Drafts"] {
            let id = state.next_id();
            state.folders.insert(id, name.to_string());
        }
        state.next_id = 0;
        for name in ["hot", "cold", "warm"] {
            let id = state.next_id();
            state.tags.insert(id, name.to_string());
        }
        state.next_id = 100;

        Self {
            state: RefCell::new(state),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    pub fn links_for(&self, note_id: i64) -> Vec<i64> {
        self.state
            .borrow()
            .links
            .iter()
            .filter(|(n, _)| *n == note_id)
            .map(|(_, t)| *t)
            .collect()
    }

    fn hit(&self) {
        self.calls.set(self.calls.get() + 1);
    }
}

#[async_trait::async_trait(?Send)]
impl Database for MemoryDatabase {
    async fn note_rows(&self, select: &NoteSelect) -> Result<Vec<NoteRow>, Error> {
        self.hit();
        let state = self.state.borrow();

        let mut rows = Vec::new();
        for (&id, note) in &state.notes {
            if !state.selected(select, id, note) {
                continue;
            }

            let base = NoteRow {
                id,
                title: note.title.clone(),
                content: note.content.clone(),
                folder_id: note.folder_id,
                folder_name: note.folder_id.and_then(|f| state.folders.get(&f).cloned()),
                tag_id: None,
                tag_name: None,
            };

            let tags: Vec<i64> = state
                .links
                .iter()
                .filter(|(n, _)| *n == id)
                .map(|(_, t)| *t)
                .collect();
            if tags.is_empty() {
                rows.push(base);
                continue;
            }
            for tag_id in tags {
                rows.push(NoteRow {
                    tag_id: Some(tag_id),
                    tag_name: state.tags.get(&tag_id).cloned(),
                    ..base.clone()
                });
            }
        }
        Ok(rows)
    }

    async fn add_note(&self, note: CreateNote) -> Result<i64, Error> {
        self.hit();
        let mut state = self.state.borrow_mut();
        state.check_refs(note.folder_id, &note.tags)?;

        let id = state.next_id();
        state.notes.insert(
            id,
            StoredNote {
                title: note.title,
                content: note.content,
                folder_id: note.folder_id,
            },
        );
        for tag_id in note.tags {
            state.links.insert((id, tag_id));
        }
        Ok(id)
    }

    async fn update_note(&self, id: i64, update: UpdateNote) -> Result<bool, Error> {
        self.hit();
        let mut state = self.state.borrow_mut();
        if !state.notes.contains_key(&id) {
            return Ok(false);
        }
        state.check_refs(
            update.folder_id.flatten(),
            update.tags.as_deref().unwrap_or_default(),
        )?;

        if let Some(note) = state.notes.get_mut(&id) {
            if let Some(title) = update.title {
                note.title = title;
            }
            if let Some(content) = update.content {
                note.content = content;
            }
            if let Some(folder_id) = update.folder_id {
                note.folder_id = folder_id;
            }
        }
        if let Some(tags) = update.tags {
            state.links.retain(|(n, _)| *n != id);
            for tag_id in tags {
                state.links.insert((id, tag_id));
            }
        }
        Ok(true)
    }

    async fn delete_note(&self, id: i64) -> Result<bool, Error> {
        self.hit();
        let mut state = self.state.borrow_mut();
        state.links.retain(|(n, _)| *n != id);
        Ok(state.notes.remove(&id).is_some())
    }

    async fn list_folders(&self) -> Result<Vec<Folder>, Error> {
        self.hit();
        Ok(self
            .state
            .borrow()
            .folders
            .iter()
            .map(|(&id, name)| Folder {
                id,
                name: name.clone(),
            })
            .collect())
    }

    async fn get_folder(&self, id: i64) -> Result<Option<Folder>, Error> {
        self.hit();
        Ok(self.state.borrow().folders.get(&id).map(|name| Folder {
            id,
            name: name.clone(),
        }))
    }

    async fn add_folder(&self, name: &str) -> Result<Folder, Error> {
        self.hit();
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        state.folders.insert(id, name.to_string());
        Ok(Folder {
            id,
            name: name.to_string(),
        })
    }

    async fn rename_folder(&self, id: i64, name: &str) -> Result<Option<Folder>, Error> {
        self.hit();
        let mut state = self.state.borrow_mut();
        Ok(state.folders.get_mut(&id).map(|stored| {
            *stored = name.to_string();
            Folder {
                id,
                name: name.to_string(),
            }
        }))
    }

    async fn delete_folder(&self, id: i64) -> Result<bool, Error> {
        self.hit();
        let mut state = self.state.borrow_mut();
        for note in state.notes.values_mut() {
            if note.folder_id == Some(id) {
                note.folder_id = None;
            }
        }
        Ok(state.folders.remove(&id).is_some())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, Error> {
        self.hit();
        Ok(self
            .state
            .borrow()
            .tags
            .iter()
            .map(|(&id, name)| Tag {
                id,
                name: name.clone(),
            })
            .collect())
    }

    async fn get_tag(&self, id: i64) -> Result<Option<Tag>, Error> {
        self.hit();
        Ok(self.state.borrow().tags.get(&id).map(|name| Tag {
            id,
            name: name.clone(),
        }))
    }

    async fn add_tag(&self, name: &str) -> Result<Tag, Error> {
        self.hit();
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        state.tags.insert(id, name.to_string());
        Ok(Tag {
            id,
            name: name.to_string(),
        })
    }

    async fn rename_tag(&self, id: i64, name: &str) -> Result<Option<Tag>, Error> {
        self.hit();
        let mut state = self.state.borrow_mut();
        Ok(state.tags.get_mut(&id).map(|stored| {
            *stored = name.to_string();
            Tag {
                id,
                name: name.to_string(),
            }
        }))
    }

    async fn delete_tag(&self, id: i64) -> Result<bool, Error> {
        self.hit();
        let mut state = self.state.borrow_mut();
        state.links.retain(|(_, t)| *t != id);
        Ok(state.tags.remove(&id).is_some())
    }
}

//! D1 implementation of the Noteful database trait for Cloudflare Workers.
//!
//! D1 has no interactive transactions, so every multi-statement write is
//! sent as one `batch`, which D1 runs atomically.

use noteful_core::{
    get_pending_migrations, update_note_statement, CreateNote, Database, Error, Folder, NoteRow,
    NoteSelect, SqlValue, Tag, UpdateNote, CREATE_META_TABLE, DELETE_NOTE, DELETE_NOTE_TAGS,
    INSERT_NOTE, LINK_EXISTING_NOTE_TAG, NOTE_EXISTS, SCHEMA_VERSION,
};
use serde::Deserialize;
use wasm_bindgen::JsValue;
use worker::d1::{D1Database, D1PreparedStatement};

/// Links a tag to the note inserted earlier in the same batch. D1 serializes
/// writes, so the highest note id in the batch is the one just inserted.
const LINK_NEW_NOTE_TAG: &str =
    "INSERT INTO notes_tags (note_id, tag_id) SELECT MAX(id), ?1 FROM notes";

/// D1-backed database implementation.
pub struct D1DatabaseWrapper {
    db: D1Database,
}

fn db_err(e: worker::Error) -> Error {
    Error::Database(e.to_string())
}

fn to_js(value: &SqlValue) -> JsValue {
    match value {
        SqlValue::Null => JsValue::NULL,
        SqlValue::Integer(v) => JsValue::from_f64(*v as f64),
        SqlValue::Text(v) => JsValue::from_str(v),
    }
}

fn id_js(id: i64) -> JsValue {
    JsValue::from_f64(id as f64)
}

#[derive(Deserialize)]
struct NoteIdRow {
    id: i64,
}

#[derive(Deserialize)]
struct CountRow {
    count: i64,
}

#[derive(Deserialize)]
struct VersionRow {
    value: String,
}

#[derive(Deserialize)]
struct NamedRow {
    id: i64,
    name: String,
}

impl D1DatabaseWrapper {
    pub fn new(db: D1Database) -> Self {
        Self { db }
    }

    fn prepare(&self, sql: &str, params: &[JsValue]) -> Result<D1PreparedStatement, Error> {
        let stmt = self.db.prepare(sql);
        if params.is_empty() {
            return Ok(stmt);
        }
        stmt.bind(params).map_err(db_err)
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> Result<(), Error> {
        self.prepare(CREATE_META_TABLE, &[])?
            .run()
            .await
            .map_err(db_err)?;

        let current_version = self
            .prepare(
                "SELECT value FROM _noteful_meta WHERE key = 'schema_version'",
                &[],
            )?
            .first::<VersionRow>(None)
            .await
            .map_err(db_err)?
            .and_then(|row| row.value.parse().ok())
            .unwrap_or(0);

        if current_version >= SCHEMA_VERSION {
            return Ok(());
        }

        // Run each statement separately since exec() has issues with multiple statements
        let mut statements = Vec::new();
        for migration in get_pending_migrations(current_version) {
            for sql in migration.statements {
                statements.push(self.prepare(sql, &[])?);
            }
        }
        statements.push(self.prepare(
            "INSERT OR REPLACE INTO _noteful_meta (key, value) VALUES ('schema_version', ?1)",
            &[JsValue::from_str(&SCHEMA_VERSION.to_string())],
        )?);

        self.db.batch(statements).await.map_err(db_err)?;
        Ok(())
    }

    async fn exists(&self, sql: &str, id: i64) -> Result<bool, Error> {
        Ok(self
            .prepare(sql, &[id_js(id)])?
            .first::<CountRow>(None)
            .await
            .map_err(db_err)?
            .map(|r| r.count > 0)
            .unwrap_or(false))
    }

    async fn list_named(&self, table: &str) -> Result<Vec<NamedRow>, Error> {
        let result = self
            .prepare(&format!("SELECT id, name FROM {} ORDER BY id", table), &[])?
            .all()
            .await
            .map_err(db_err)?;
        result.results().map_err(db_err)
    }

    async fn get_named(&self, table: &str, id: i64) -> Result<Option<NamedRow>, Error> {
        self.prepare(
            &format!("SELECT id, name FROM {} WHERE id = ?1", table),
            &[id_js(id)],
        )?
        .first::<NamedRow>(None)
        .await
        .map_err(db_err)
    }

    async fn add_named(&self, table: &str, name: &str) -> Result<NamedRow, Error> {
        self.prepare(
            &format!("INSERT INTO {} (name) VALUES (?1) RETURNING id, name", table),
            &[JsValue::from_str(name)],
        )?
        .first::<NamedRow>(None)
        .await
        .map_err(db_err)?
        .ok_or_else(|| Error::Database(format!("insert into {} returned no row", table)))
    }

    async fn rename_named(
        &self,
        table: &str,
        id: i64,
        name: &str,
    ) -> Result<Option<NamedRow>, Error> {
        self.prepare(
            &format!("UPDATE {} SET name = ?1 WHERE id = ?2 RETURNING id, name", table),
            &[JsValue::from_str(name), id_js(id)],
        )?
        .first::<NamedRow>(None)
        .await
        .map_err(db_err)
    }

    async fn delete_named(&self, table: &str, id: i64) -> Result<bool, Error> {
        let count_sql = format!("SELECT COUNT(*) AS count FROM {} WHERE id = ?1", table);
        if !self.exists(&count_sql, id).await? {
            return Ok(false);
        }

        self.prepare(&format!("DELETE FROM {} WHERE id = ?1", table), &[id_js(id)])?
            .run()
            .await
            .map_err(db_err)?;
        Ok(true)
    }
}

impl From<NamedRow> for Folder {
    fn from(row: NamedRow) -> Self {
        Folder {
            id: row.id,
            name: row.name,
        }
    }
}

impl From<NamedRow> for Tag {
    fn from(row: NamedRow) -> Self {
        Tag {
            id: row.id,
            name: row.name,
        }
    }
}

#[async_trait::async_trait(?Send)]
impl Database for D1DatabaseWrapper {
    async fn note_rows(&self, select: &NoteSelect) -> Result<Vec<NoteRow>, Error> {
        let statement = select.to_statement();
        let params: Vec<JsValue> = statement.params.iter().map(to_js).collect();

        let result = self
            .prepare(&statement.sql, &params)?
            .all()
            .await
            .map_err(db_err)?;

        result.results::<NoteRow>().map_err(db_err)
    }

    async fn add_note(&self, note: CreateNote) -> Result<i64, Error> {
        let mut statements = vec![self.prepare(
            INSERT_NOTE,
            &[
                JsValue::from_str(&note.title),
                to_js(&note.content.clone().into()),
                to_js(&note.folder_id.into()),
            ],
        )?];

        for tag_id in &note.tags {
            statements.push(self.prepare(LINK_NEW_NOTE_TAG, &[id_js(*tag_id)])?);
        }

        let results = self.db.batch(statements).await.map_err(db_err)?;

        let inserted = results
            .first()
            .ok_or_else(|| Error::Database("Failed to insert note".into()))?
            .results::<NoteIdRow>()
            .map_err(db_err)?;

        inserted
            .first()
            .map(|row| row.id)
            .ok_or_else(|| Error::Database("Failed to insert note".into()))
    }

    async fn update_note(&self, id: i64, update: UpdateNote) -> Result<bool, Error> {
        if !self.exists(NOTE_EXISTS, id).await? {
            return Ok(false);
        }

        let mut statements = Vec::new();

        if let Some(statement) = update_note_statement(id, &update) {
            let params: Vec<JsValue> = statement.params.iter().map(to_js).collect();
            statements.push(self.prepare(&statement.sql, &params)?);
        }

        // Replace the whole tag set. The note may be deleted between the
        // existence check and the batch, so links are guarded on the note.
        if let Some(ref tags) = update.tags {
            statements.push(self.prepare(DELETE_NOTE_TAGS, &[id_js(id)])?);
            for tag_id in tags {
                statements.push(
                    self.prepare(LINK_EXISTING_NOTE_TAG, &[id_js(id), id_js(*tag_id)])?,
                );
            }
        }

        if !statements.is_empty() {
            self.db.batch(statements).await.map_err(db_err)?;
        }

        Ok(true)
    }

    async fn delete_note(&self, id: i64) -> Result<bool, Error> {
        if !self.exists(NOTE_EXISTS, id).await? {
            return Ok(false);
        }

        // Delete notes_tags first (foreign key)
        let statements = vec![
            self.prepare(DELETE_NOTE_TAGS, &[id_js(id)])?,
            self.prepare(DELETE_NOTE, &[id_js(id)])?,
        ];
        self.db.batch(statements).await.map_err(db_err)?;

        Ok(true)
    }

    async fn list_folders(&self) -> Result<Vec<Folder>, Error> {
        Ok(self
            .list_named("folders")
            .await?
            .into_iter()
            .map(Folder::from)
            .collect())
    }

    async fn get_folder(&self, id: i64) -> Result<Option<Folder>, Error> {
        Ok(self.get_named("folders", id).await?.map(Folder::from))
    }

    async fn add_folder(&self, name: &str) -> Result<Folder, Error> {
        self.add_named("folders", name).await.map(Folder::from)
    }

    async fn rename_folder(&self, id: i64, name: &str) -> Result<Option<Folder>, Error> {
        Ok(self.rename_named("folders", id, name).await?.map(Folder::from))
    }

    async fn delete_folder(&self, id: i64) -> Result<bool, Error> {
        self.delete_named("folders", id).await
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, Error> {
        Ok(self
            .list_named("tags")
            .await?
            .into_iter()
            .map(Tag::from)
            .collect())
    }

    async fn get_tag(&self, id: i64) -> Result<Option<Tag>, Error> {
        Ok(self.get_named("tags", id).await?.map(Tag::from))
    }

    async fn add_tag(&self, name: &str) -> Result<Tag, Error> {
        self.add_named("tags", name).await.map(Tag::from)
    }

    async fn rename_tag(&self, id: i64, name: &str) -> Result<Option<Tag>, Error> {
        Ok(self.rename_named("tags", id, name).await?.map(Tag::from))
    }

    async fn delete_tag(&self, id: i64) -> Result<bool, Error> {
        self.delete_named("tags", id).await
    }
}

//! SQLite implementation of the Noteful database trait.

use noteful_core::{
    get_pending_migrations, update_note_statement, CreateNote, Database, Error, Folder, NoteRow,
    NoteSelect, SqlValue, Tag, UpdateNote, CREATE_META_TABLE, DELETE_NOTE, DELETE_NOTE_TAGS,
    INSERT_NOTE, INSERT_NOTE_TAG, NOTE_EXISTS, SCHEMA_VERSION,
};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// SQLite-backed database implementation.
pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

fn to_value(value: &SqlValue) -> rusqlite::types::Value {
    match value {
        SqlValue::Null => rusqlite::types::Value::Null,
        SqlValue::Integer(v) => rusqlite::types::Value::Integer(*v),
        SqlValue::Text(v) => rusqlite::types::Value::Text(v.clone()),
    }
}

impl SqliteDatabase {
    /// Open a database at the given path and run any pending migrations.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init(conn)
    }

    /// Open an in-memory database and run migrations.
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, Error> {
        conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_err)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.conn
            .lock()
            .map_err(|_| Error::Internal("sqlite connection lock poisoned".into()))
    }

    /// Current schema version recorded in the database.
    pub fn schema_version(&self) -> Result<i64, Error> {
        let conn = self.conn()?;
        Self::read_schema_version(&conn)
    }

    fn read_schema_version(conn: &Connection) -> Result<i64, Error> {
        let version = conn
            .query_row(
                "SELECT value FROM _noteful_meta WHERE key = 'schema_version'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(db_err)?;
        Ok(version.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    /// Run any pending database migrations.
    fn run_migrations(&self) -> Result<(), Error> {
        let mut conn = self.conn()?;

        conn.execute(CREATE_META_TABLE, []).map_err(db_err)?;

        let current_version = Self::read_schema_version(&conn)?;

        // Already up to date
        if current_version >= SCHEMA_VERSION {
            return Ok(());
        }

        let tx = conn.transaction().map_err(db_err)?;
        for migration in get_pending_migrations(current_version) {
            debug!(version = migration.version, name = migration.name, "applying migration");
            for statement in migration.statements {
                tx.execute(statement, []).map_err(|e| {
                    Error::Database(format!("Migration {} failed: {}", migration.name, e))
                })?;
            }
        }

        tx.execute(
            "INSERT OR REPLACE INTO _noteful_meta (key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION.to_string()],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;

        Ok(())
    }

    fn note_row(row: &Row<'_>) -> rusqlite::Result<NoteRow> {
        Ok(NoteRow {
            id: row.get("id")?,
            title: row.get("title")?,
            content: row.get("content")?,
            folder_id: row.get("folder_id")?,
            folder_name: row.get("folder_name")?,
            tag_id: row.get("tag_id")?,
            tag_name: row.get("tag_name")?,
        })
    }

    // Folders and tags share the same (id, name) shape; these helpers take
    // the table name and a constructor for the entity.

    fn list_named<T>(&self, table: &str, make: fn(i64, String) -> T) -> Result<Vec<T>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT id, name FROM {} ORDER BY id", table))
            .map_err(db_err)?;
        let items = stmt
            .query_map([], |row| Ok(make(row.get(0)?, row.get(1)?)))
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(items)
    }

    fn get_named<T>(
        &self,
        table: &str,
        id: i64,
        make: fn(i64, String) -> T,
    ) -> Result<Option<T>, Error> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT id, name FROM {} WHERE id = ?1", table),
            params![id],
            |row| Ok(make(row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(db_err)
    }

    fn add_named<T>(
        &self,
        table: &str,
        name: &str,
        make: fn(i64, String) -> T,
    ) -> Result<T, Error> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("INSERT INTO {} (name) VALUES (?1) RETURNING id, name", table),
            params![name],
            |row| Ok(make(row.get(0)?, row.get(1)?)),
        )
        .map_err(db_err)
    }

    fn rename_named<T>(
        &self,
        table: &str,
        id: i64,
        name: &str,
        make: fn(i64, String) -> T,
    ) -> Result<Option<T>, Error> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("UPDATE {} SET name = ?1 WHERE id = ?2 RETURNING id, name", table),
            params![name, id],
            |row| Ok(make(row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(db_err)
    }

    fn delete_named(&self, table: &str, id: i64) -> Result<bool, Error> {
        let conn = self.conn()?;
        let rows = conn
            .execute(&format!("DELETE FROM {} WHERE id = ?1", table), params![id])
            .map_err(db_err)?;
        Ok(rows > 0)
    }
}

fn folder(id: i64, name: String) -> Folder {
    Folder { id, name }
}

fn tag(id: i64, name: String) -> Tag {
    Tag { id, name }
}

#[async_trait::async_trait(?Send)]
impl Database for SqliteDatabase {
    async fn note_rows(&self, select: &NoteSelect) -> Result<Vec<NoteRow>, Error> {
        let statement = select.to_statement();
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&statement.sql).map_err(db_err)?;
        let rows = stmt
            .query_map(
                params_from_iter(statement.params.iter().map(to_value)),
                Self::note_row,
            )
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(rows)
    }

    async fn add_note(&self, note: CreateNote) -> Result<i64, Error> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;

        let note_id: i64 = tx
            .query_row(
                INSERT_NOTE,
                params![note.title, note.content, note.folder_id],
                |row| row.get(0),
            )
            .map_err(db_err)?;

        for tag_id in &note.tags {
            tx.execute(INSERT_NOTE_TAG, params![note_id, tag_id])
                .map_err(db_err)?;
        }

        tx.commit().map_err(db_err)?;
        Ok(note_id)
    }

    async fn update_note(&self, id: i64, update: UpdateNote) -> Result<bool, Error> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;

        let count: i64 = tx
            .query_row(NOTE_EXISTS, params![id], |row| row.get(0))
            .map_err(db_err)?;
        if count == 0 {
            return Ok(false);
        }

        if let Some(statement) = update_note_statement(id, &update) {
            tx.execute(
                &statement.sql,
                params_from_iter(statement.params.iter().map(to_value)),
            )
            .map_err(db_err)?;
        }

        // Replace the whole tag set
        if let Some(ref tags) = update.tags {
            tx.execute(DELETE_NOTE_TAGS, params![id]).map_err(db_err)?;
            for tag_id in tags {
                tx.execute(INSERT_NOTE_TAG, params![id, tag_id])
                    .map_err(db_err)?;
            }
        }

        tx.commit().map_err(db_err)?;
        Ok(true)
    }

    async fn delete_note(&self, id: i64) -> Result<bool, Error> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;

        tx.execute(DELETE_NOTE_TAGS, params![id]).map_err(db_err)?;
        let rows = tx.execute(DELETE_NOTE, params![id]).map_err(db_err)?;

        tx.commit().map_err(db_err)?;
        Ok(rows > 0)
    }

    async fn list_folders(&self) -> Result<Vec<Folder>, Error> {
        self.list_named("folders", folder)
    }

    async fn get_folder(&self, id: i64) -> Result<Option<Folder>, Error> {
        self.get_named("folders", id, folder)
    }

    async fn add_folder(&self, name: &str) -> Result<Folder, Error> {
        self.add_named("folders", name, folder)
    }

    async fn rename_folder(&self, id: i64, name: &str) -> Result<Option<Folder>, Error> {
        self.rename_named("folders", id, name, folder)
    }

    async fn delete_folder(&self, id: i64) -> Result<bool, Error> {
        self.delete_named("folders", id)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, Error> {
        self.list_named("tags", tag)
    }

    async fn get_tag(&self, id: i64) -> Result<Option<Tag>, Error> {
        self.get_named("tags", id, tag)
    }

    async fn add_tag(&self, name: &str) -> Result<Tag, Error> {
        self.add_named("tags", name, tag)
    }

    async fn rename_tag(&self, id: i64, name: &str) -> Result<Option<Tag>, Error> {
        self.rename_named("tags", id, name, tag)
    }

    async fn delete_tag(&self, id: i64) -> Result<bool, Error> {
        self.delete_named("tags", id)
    }
}

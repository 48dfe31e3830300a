use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::schema::SCHEMA_SQL;

const IN_MEMORY: &str = ":memory:";

/// Handle to the key-value record store.
///
/// The handle owns an optional connection so the store can be closed and
/// reopened (a rebuild wipes it) without replacing the handle that callers
/// hold.
pub struct RecordStore {
    path: PathBuf,
    pub(crate) conn: Mutex<Option<Connection>>,
}

impl RecordStore {
    /// Opens (creating if needed) the store at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self> {
        let store = Self::closed(db_path);
        store.init()?;
        Ok(store)
    }

    /// A handle that is not yet open; call [`RecordStore::init`] before use.
    pub fn closed(db_path: &Path) -> Self {
        Self {
            path: db_path.to_path_buf(),
            conn: Mutex::new(None),
        }
    }

    /// Store that lives only as long as its connection.
    pub fn in_memory() -> Result<Self> {
        Self::open(Path::new(IN_MEMORY))
    }

    pub fn is_open(&self) -> bool {
        self.lock().map(|g| g.is_some()).unwrap_or(false)
    }

    /// Opens the connection if it is not already open. Idempotent.
    pub fn init(&self) -> Result<()> {
        let mut guard = self.lock()?;
        if guard.is_some() {
            return Ok(());
        }
        *guard = Some(connect(&self.path)?);
        tracing::debug!(path = %self.path.display(), "Opened record store");
        Ok(())
    }

    /// Closes the connection. Closing a closed store is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock()?;
        if let Some(conn) = guard.take() {
            conn.close()
                .map_err(|(_, err)| err)
                .context("Failed to close record store")?;
            tracing::debug!(path = %self.path.display(), "Closed record store");
        }
        Ok(())
    }

    /// Drops every record: close, delete the database files, reopen.
    pub fn reset(&self) -> Result<()> {
        self.close()?;
        if self.path != Path::new(IN_MEMORY) {
            for suffix in ["", "-wal", "-shm"] {
                let mut raw = self.path.as_os_str().to_owned();
                raw.push(suffix);
                let file = PathBuf::from(raw);
                if file.exists() {
                    std::fs::remove_file(&file).with_context(|| {
                        format!("Failed to remove store file: {}", file.display())
                    })?;
                }
            }
        }
        self.init()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Record store lock poisoned"))
    }

    /// Runs `f` against the open connection.
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        let conn = guard
            .as_mut()
            .ok_or_else(|| anyhow!("Record store is not open: {}", self.path.display()))?;
        f(conn)
    }
}

fn connect(path: &Path) -> Result<Connection> {
    if path != Path::new(IN_MEMORY) {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create store parent dir: {}", parent.display())
            })?;
        }
    }

    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open record store: {}", path.display()))?;

    if path != Path::new(IN_MEMORY) {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .context("Failed to enable WAL mode")?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .context("Failed to set synchronous mode")?;
    }
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .context("Failed to set busy timeout")?;
    conn.execute_batch(SCHEMA_SQL)
        .context("Failed to initialize record store schema")?;
    Ok(conn)
}

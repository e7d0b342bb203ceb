use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fnos_proxy_core::{model::PhotoId, traits::MetadataStore};
use parking_lot::Mutex;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use thiserror::Error;
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// `photo` holds one row per file; `user_photo` maps it to the per-user id
/// that the gallery API expects.
const LOOKUP_PREFIX: &str = "SELECT user_photo.id FROM photo \
     LEFT JOIN user_photo ON photo.id = user_photo.photo_id \
     WHERE photo.file_path IN (";

#[derive(Debug, Error)]
pub enum SqliteStoreError {
    #[error("open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("query photos: {0}")]
    Query(#[source] rusqlite::Error),
    #[error("scan photo id: {0}")]
    Scan(#[source] rusqlite::Error),
}

/// Shared handle on the fnOS database. Statements run one at a time on the
/// single connection; callers on async runtimes go through spawn_blocking.
pub struct SqliteMetadataStore {
    conn: Mutex<Connection>,
}

impl SqliteMetadataStore {
    /// Opens the database read-only; the backend remains its only writer.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SqliteStoreError> {
        let path = path.as_ref();
        let open_err = |source| SqliteStoreError::Open {
            path: path.to_path_buf(),
            source,
        };
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(open_err)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(open_err)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

fn lookup_sql(placeholders: usize) -> String {
    let mut sql = String::with_capacity(LOOKUP_PREFIX.len() + placeholders * 3 + 1);
    sql.push_str(LOOKUP_PREFIX);
    for i in 0..placeholders {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push('?');
    }
    sql.push(')');
    sql
}

impl MetadataStore for SqliteMetadataStore {
    type Error = SqliteStoreError;

    fn photo_ids_by_paths(&self, paths: &[String]) -> Result<Vec<PhotoId>, Self::Error> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let sql = lookup_sql(paths.len());
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&sql).map_err(SqliteStoreError::Query)?;
        let rows = stmt
            .query_map(params_from_iter(paths.iter()), |row| {
                row.get::<_, Option<PhotoId>>(0)
            })
            .map_err(SqliteStoreError::Query)?;

        let mut ids = Vec::new();
        for row in rows {
            // NULL means the file has no user_photo row: nothing to resolve.
            if let Some(id) = row.map_err(SqliteStoreError::Scan)? {
                ids.push(id);
            }
        }
        debug!(
            paths = paths.len(),
            ids = ids.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "photo id lookup"
        );
        Ok(ids)
    }
}

//! Connection pool, migrations and the storage context.

use log::{error, info};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use diesel::connection::{Connection, SimpleConnection};
use diesel::r2d2;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::bars::BarRepository;
use crate::errors::IntoCore;
use crate::maintenance::MaintenanceRepository;
use crate::symbols::SymbolRepository;
use stockbase_core::errors::{DatabaseError, Error, Result};

pub mod write_actor;
pub use write_actor::{spawn_writer, WriteHandle};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Create the parent directory and apply file-level pragmas.
pub fn init(db_path: &str) -> Result<String> {
    if let Some(dir) = Path::new(db_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
    }

    let mut conn = SqliteConnection::establish(db_path).into_core()?;
    conn.batch_execute(
        "
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 30000;
            PRAGMA synchronous  = NORMAL;
        ",
    )
    .into_core()?;

    Ok(db_path.to_string())
}

pub fn create_pool(db_path: &str) -> Result<Arc<DbPool>> {
    let manager = ConnectionManager::<SqliteConnection>::new(db_path);
    let pool = r2d2::Pool::builder()
        .max_size(8)
        .min_idle(Some(1))
        .connection_timeout(Duration::from_secs(30))
        .connection_customizer(Box::new(ConnectionCustomizer))
        .build(manager)
        .map_err(|e| DatabaseError::PoolCreationFailed(e.to_string()))?;
    Ok(Arc::new(pool))
}

pub fn run_migrations(pool: &DbPool) -> Result<()> {
    info!("Running database migrations");
    let mut connection = get_connection(pool)?;

    let applied = connection.run_pending_migrations(MIGRATIONS).map_err(|e| {
        error!("Database migration failed: {}", e);
        Error::Database(DatabaseError::MigrationFailed(e.to_string()))
    })?;

    if applied.is_empty() {
        info!("No pending migrations to apply.");
    } else {
        for version in &applied {
            info!("Applied migration {}", version);
        }
    }

    Ok(())
}

pub fn get_connection(pool: &Pool<ConnectionManager<SqliteConnection>>) -> Result<DbConnection> {
    pool.get().into_core()
}

#[derive(Debug)]
struct ConnectionCustomizer;

impl r2d2::CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), r2d2::Error> {
        conn.batch_execute(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 30000;
            PRAGMA synchronous = NORMAL;
        ",
        )
        .map_err(r2d2::Error::QueryError)
    }
}

/// An open store: the reader pool plus the single writer.
///
/// Passed explicitly to whatever needs storage; dropping the last clone
/// stops the writer once its queue drains.
#[derive(Clone)]
pub struct StorageContext {
    db_path: String,
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl StorageContext {
    /// Open (creating if needed) the database at `db_path` and migrate it.
    ///
    /// Must be called inside a Tokio runtime; the writer runs as a task.
    pub fn open(db_path: &str) -> Result<Self> {
        let db_path = init(db_path)?;
        let pool = create_pool(&db_path)?;
        run_migrations(&pool)?;
        let writer = spawn_writer((*pool).clone());
        info!("Opened stock database at {}", db_path);

        Ok(Self {
            db_path,
            pool,
            writer,
        })
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    pub fn pool(&self) -> &Arc<DbPool> {
        &self.pool
    }

    pub fn writer(&self) -> &WriteHandle {
        &self.writer
    }

    pub fn bar_repository(&self) -> BarRepository {
        BarRepository::new(self.pool.clone(), self.writer.clone())
    }

    pub fn symbol_repository(&self) -> SymbolRepository {
        SymbolRepository::new(self.pool.clone(), self.writer.clone())
    }

    pub fn maintenance_repository(&self) -> MaintenanceRepository {
        MaintenanceRepository::new(self.pool.clone(), self.writer.clone())
    }
}

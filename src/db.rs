use crate::config::Config;
use anyhow::Result;
use libsql::{Builder, Connection, Database as LibsqlDatabase};
use std::path::Path;
use std::time::Duration;

const SYSTEM_MIGRATIONS: &[(&str, &str)] =
    &[("system/000_migrations_table.sql", include_str!("migrations/system/000_migrations_table.sql"))];

pub const MEMORY: &str = ":memory:";

/// How the configured connection string is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreMode<'a> {
    Memory,
    Local(&'a str),
    Remote { url: &'a str, auth_token: &'a str },
    Replica { path: &'a str, sync_url: &'a str, auth_token: &'a str },
}

impl<'a> StoreMode<'a> {
    pub fn is_remote_url(s: &str) -> bool {
        ["libsql://", "http://", "https://"].iter().any(|p| s.starts_with(p))
    }

    pub fn resolve(app: &'a crate::config::App) -> Result<Self> {
        let database = app.get_db();
        if database == MEMORY {
            return Ok(StoreMode::Memory);
        }

        if Self::is_remote_url(database) {
            let Some(auth_token) = app.get_auth_token() else {
                anyhow::bail!("auth_token is required for remote database {}", database);
            };
            return Ok(StoreMode::Remote {
                url: database,
                auth_token,
            });
        }

        Ok(match (app.get_sync_url(), app.get_auth_token()) {
            (Some(sync_url), Some(auth_token)) => StoreMode::Replica {
                path: database,
                sync_url,
                auth_token,
            },
            _ => StoreMode::Local(database),
        })
    }
}

/// Long-lived store handle shared by every request.
pub struct Database {
    _db: LibsqlDatabase,
    conn: Connection,
}

impl Database {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    async fn is_migration_applied(conn: &Connection, name: &str) -> Result<bool> {
        let query = "SELECT 1 FROM _migrations WHERE name = ?";
        match conn.query(query, libsql::params![name]).await {
            Ok(mut rows) => Ok(rows.next().await?.is_some()),
            Err(e) => {
                if e.to_string().contains("no such table") {
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn record_migration(conn: &Connection, name: &str) -> Result<()> {
        let query = r#"
            INSERT INTO _migrations (name, applied_at)
            VALUES (?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        "#;
        conn.execute(query, libsql::params![name]).await?;
        Ok(())
    }

    async fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
        if Self::is_migration_applied(conn, name).await? {
            tracing::debug!("migration {} already applied, skipping", name);
            return Ok(());
        }

        tracing::info!("applying migration: {}", name);
        conn.execute_batch(sql)
            .await
            .map_err(|e| anyhow::anyhow!("failed to execute migration {name}: {e}"))?;

        Self::record_migration(conn, name).await?;
        Ok(())
    }

    /// Opens the store named by the config. Relative local paths are placed
    /// under `data_dir`.
    pub async fn new(cfg: &Config, data_dir: &Path) -> Result<Self> {
        let db = match StoreMode::resolve(&cfg.app)? {
            StoreMode::Memory => {
                tracing::info!("[db] running in memory, data is lost on exit");
                Builder::new_local(MEMORY).build().await?
            }
            StoreMode::Local(path) => {
                let path = data_dir.join(path);
                tracing::info!(path = ?path, "[db] running against local file");
                Builder::new_local(&path).build().await?
            }
            StoreMode::Remote { url, auth_token } => {
                tracing::info!(url = %url, "[db] running against remote database");
                Builder::new_remote(url.to_string(), auth_token.to_string())
                    .build()
                    .await?
            }
            StoreMode::Replica {
                path,
                sync_url,
                auth_token,
            } => {
                tracing::info!("[db] running in synced database mode (offline writes)");
                let path = data_dir.join(path);
                let sync_interval = Duration::from_secs(cfg.app.sync_interval_seconds);
                Builder::new_synced_database(&path, sync_url.to_string(), auth_token.to_string())
                    .sync_interval(sync_interval)
                    .build()
                    .await?
            }
        };

        Self::open(db).await
    }

    /// Fresh in-memory store with all migrations applied.
    pub async fn in_memory() -> Result<Self> {
        let db = Builder::new_local(MEMORY).build().await?;
        Self::open(db).await
    }

    async fn open(db: LibsqlDatabase) -> Result<Self> {
        let conn = db.connect()?;
        conn.query("SELECT 1", ()).await?;

        for (filename, sql) in SYSTEM_MIGRATIONS {
            Self::run_migration(&conn, filename, sql).await?;
        }

        for (filename, sql) in crate::books::migrations() {
            Self::run_migration(&conn, filename, sql).await?;
        }

        Ok(Database { _db: db, conn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn app(yaml: &str) -> crate::config::App {
        Config::from_yaml(yaml).unwrap().app
    }

    #[test]
    fn test_resolve_store_mode() {
        let memory = app("app:\n  database: ':memory:'\n  port: 1\n");
        assert_eq!(StoreMode::resolve(&memory).unwrap(), StoreMode::Memory);

        let local = app("app:\n  database: books.db\n  port: 1\n");
        assert_eq!(StoreMode::resolve(&local).unwrap(), StoreMode::Local("books.db"));

        let remote = app("app:\n  database: 'libsql://books.example.io'\n  port: 1\n  auth_token: tok\n");
        assert_eq!(
            StoreMode::resolve(&remote).unwrap(),
            StoreMode::Remote {
                url: "libsql://books.example.io",
                auth_token: "tok"
            }
        );

        let replica = app(
            "app:\n  database: books.db\n  port: 1\n  auth_token: tok\n  sync_url: 'libsql://books.example.io'\n",
        );
        assert_eq!(
            StoreMode::resolve(&replica).unwrap(),
            StoreMode::Replica {
                path: "books.db",
                sync_url: "libsql://books.example.io",
                auth_token: "tok"
            }
        );
    }

    #[test]
    fn test_remote_without_token_is_rejected() {
        let remote = app("app:\n  database: 'https://books.example.io'\n  port: 1\n");
        assert!(StoreMode::resolve(&remote).is_err());
    }

    #[tokio::test]
    async fn test_migrations_are_recorded_once() {
        let db = Database::in_memory().await.unwrap();
        let conn = db.connection();

        for (filename, sql) in crate::books::migrations() {
            Database::run_migration(conn, filename, sql).await.unwrap();
        }

        let mut rows = conn.query("SELECT COUNT(*) FROM _migrations", ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let applied: i64 = row.get(0).unwrap();
        assert_eq!(applied as usize, SYSTEM_MIGRATIONS.len() + crate::books::migrations().len());
    }
}

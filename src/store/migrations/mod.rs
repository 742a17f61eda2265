//! Schema migrations for the SQLite document store.
//!
//! Each version has a pair of files in this directory:
//! - `migration_NN_up.sql` moves the schema from `NN-1` to `NN`
//! - `migration_NN_down.sql` moves it back from `NN` to `NN-1`
//!
//! The applied version lives in the single-row `schema_version` table.

use crate::error::Res;
use anyhow::{bail, Context};
use sqlx::{Executor, SqlitePool};
use tracing::debug;

/// The schema version this build of the store expects.
pub(crate) const CURRENT_VERSION: i32 = 1;

struct Migration {
    version: i32,
    up_sql: &'static str,
    down_sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    up_sql: include_str!("migration_01_up.sql"),
    down_sql: include_str!("migration_01_down.sql"),
}];

/// Creates the `schema_version` table at version 0 if the database does not have one yet, then
/// returns the applied version.
pub(crate) async fn bootstrap(pool: &SqlitePool) -> Res<i32> {
    sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .execute(pool)
        .await
        .context("Failed to create schema_version table")?;

    let row: (Option<i32>,) = sqlx::query_as("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .context("Failed to read schema version")?;

    match row.0 {
        Some(version) => Ok(version),
        None => {
            sqlx::query("INSERT INTO schema_version (version) VALUES (0)")
                .execute(pool)
                .await
                .context("Failed to insert initial schema version")?;
            Ok(0)
        }
    }
}

/// Moves the schema from `current_ver` to `target_ver`, one version at a time, each step in its
/// own transaction together with the `schema_version` update. Fails before running anything if a
/// step is missing.
pub(crate) async fn run(pool: &SqlitePool, current_ver: i32, target_ver: i32) -> Res<()> {
    if current_ver == target_ver {
        debug!("Document store schema already at version {target_ver}");
        return Ok(());
    }

    validate_migrations(current_ver, target_ver)?;

    if current_ver < target_ver {
        for version in (current_ver + 1)..=target_ver {
            debug!("Applying document store migration {version:02} (up)");
            apply(pool, find(version)?.up_sql, version).await?;
        }
    } else {
        for version in (target_ver + 1..=current_ver).rev() {
            debug!("Reverting document store migration {version:02} (down)");
            apply(pool, find(version)?.down_sql, version - 1).await?;
        }
    }

    debug!("Document store schema now at version {target_ver}");
    Ok(())
}

fn find(version: i32) -> Res<&'static Migration> {
    MIGRATIONS
        .iter()
        .find(|m| m.version == version)
        .with_context(|| format!("Migration {version} not found"))
}

async fn apply(pool: &SqlitePool, sql: &str, new_version: i32) -> Res<()> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin migration transaction")?;

    tx.execute(sql)
        .await
        .context("Failed to execute migration SQL")?;

    sqlx::query("UPDATE schema_version SET version = ?")
        .bind(new_version)
        .execute(&mut *tx)
        .await
        .context("Failed to update schema_version")?;

    tx.commit()
        .await
        .context("Failed to commit migration transaction")?;
    Ok(())
}

fn validate_migrations(current_version: i32, target_version: i32) -> Res<()> {
    let (start, end) = if current_version < target_version {
        (current_version + 1, target_version)
    } else {
        (target_version + 1, current_version)
    };
    for version in start..=end {
        if !MIGRATIONS.iter().any(|m| m.version == version) {
            bail!(
                "Migration {version} is missing but required to migrate from version \
                {current_version} to {target_version}"
            );
        }
    }
    Ok(())
}

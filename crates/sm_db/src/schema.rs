//! Catalog schema creation. All `CREATE TABLE` statements live here; one
//! schema version, no migration framework — every statement is
//! `IF NOT EXISTS` so re-opening an existing database is a no-op.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::Result;

pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    create_files_table(pool).await?;
    create_pages_table(pool).await?;
    create_artifacts_table(pool).await?;
    create_text_tables(pool).await?;
    create_thumbnails_table(pool).await?;
    create_embedding_tables(pool).await?;
    create_job_tables(pool).await?;

    info!("catalog schema verified");
    Ok(())
}

async fn create_files_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL UNIQUE,
            size_bytes INTEGER NOT NULL,
            mtime_epoch REAL NOT NULL,
            aspect TEXT NOT NULL DEFAULT 'unknown',
            slide_count INTEGER NOT NULL DEFAULT 0,
            last_scanned_epoch REAL,
            last_scan_error TEXT
        )"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_pages_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS pages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            ordinal INTEGER NOT NULL,
            aspect TEXT NOT NULL DEFAULT 'unknown',
            src_size_bytes INTEGER NOT NULL,
            src_mtime_epoch REAL NOT NULL,
            UNIQUE(file_id, ordinal)
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_pages_file ON pages(file_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_artifacts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS artifacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'missing',
            updated_epoch REAL NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            error_code TEXT,
            error_message TEXT,
            params_json TEXT,
            UNIQUE(page_id, kind)
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_artifacts_page ON artifacts(page_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_artifacts_kind_status ON artifacts(kind, status)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_text_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS page_text (
            page_id INTEGER PRIMARY KEY REFERENCES pages(id) ON DELETE CASCADE,
            raw_text TEXT NOT NULL,
            norm_text TEXT NOT NULL,
            text_sig TEXT NOT NULL,
            updated_epoch REAL NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE VIRTUAL TABLE IF NOT EXISTS fts_pages USING fts5(
            norm_text,
            page_id UNINDEXED,
            tokenize = 'porter unicode61'
        )"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_thumbnails_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS thumbnails (
            page_id INTEGER PRIMARY KEY REFERENCES pages(id) ON DELETE CASCADE,
            aspect TEXT NOT NULL,
            width INTEGER NOT NULL,
            height INTEGER NOT NULL,
            image_path TEXT NOT NULL,
            updated_epoch REAL NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_embedding_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS embedding_cache_text (
            model TEXT NOT NULL,
            text_sig TEXT NOT NULL,
            dim INTEGER NOT NULL,
            vector BLOB NOT NULL,
            created_epoch REAL NOT NULL,
            PRIMARY KEY (model, text_sig)
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS page_text_embedding (
            page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
            model TEXT NOT NULL,
            text_sig TEXT NOT NULL,
            updated_epoch REAL NOT NULL,
            PRIMARY KEY (page_id, model)
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_page_text_embedding_sig ON page_text_embedding(model, text_sig)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS page_image_embedding (
            page_id INTEGER PRIMARY KEY REFERENCES pages(id) ON DELETE CASCADE,
            model TEXT NOT NULL,
            dim INTEGER NOT NULL,
            vector BLOB NOT NULL,
            updated_epoch REAL NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_job_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            library_root TEXT NOT NULL,
            created_epoch REAL NOT NULL,
            started_epoch REAL,
            finished_epoch REAL,
            status TEXT NOT NULL DEFAULT 'created',
            options_json TEXT NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'queued',
            page_id INTEGER REFERENCES pages(id) ON DELETE CASCADE,
            file_id INTEGER REFERENCES files(id) ON DELETE CASCADE,
            priority INTEGER NOT NULL DEFAULT 0,
            started_epoch REAL,
            finished_epoch REAL,
            heartbeat_epoch REAL,
            progress REAL NOT NULL DEFAULT 0,
            message TEXT,
            error_code TEXT,
            error_message TEXT
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_job_status ON tasks(job_id, status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_job_kind ON tasks(job_id, kind)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_heartbeat ON tasks(status, heartbeat_epoch)")
        .execute(pool)
        .await?;

    Ok(())
}

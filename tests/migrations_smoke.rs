use sqlx::Row;

fn database_url() -> Option<String> {
    // Integration tests do not go through the app config; read .env directly.
    dotenvy::dotenv().ok();

    if let Ok(url) = std::env::var("DATABASE_URL") {
        if !url.trim().is_empty() {
            return Some(url);
        }
    }

    let server = std::env::var("POSTGRES_SERVER").unwrap_or_else(|_| "localhost".into());
    let port = std::env::var("POSTGRES_PORT").unwrap_or_else(|_| "5432".into());
    let user = std::env::var("POSTGRES_USER").unwrap_or_else(|_| "examtrack".into());
    let password = std::env::var("POSTGRES_PASSWORD").unwrap_or_default();
    let db = std::env::var("POSTGRES_DB").unwrap_or_else(|_| "examtrack".into());

    Some(format!("postgresql://{user}:{password}@{server}:{port}/{db}"))
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn migrations_create_exam_records() -> anyhow::Result<()> {
    let Some(database_url) = database_url() else {
        anyhow::bail!("DATABASE_URL and POSTGRES_* are not set");
    };

    let pool =
        sqlx::postgres::PgPoolOptions::new().max_connections(1).connect(&database_url).await?;

    let migrations_dir =
        std::env::var("EXAMTRACK_MIGRATIONS_DIR").unwrap_or_else(|_| "migrations".to_string());
    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(&migrations_dir)).await?;
    migrator.run(&pool).await?;

    let row = sqlx::query("SELECT to_regclass('exam_records')::text").fetch_one(&pool).await?;
    let regclass: Option<String> = row.try_get(0)?;
    assert!(regclass.is_some(), "expected exam_records to exist after migrations");

    let columns: Vec<String> = sqlx::query_scalar(
        "SELECT column_name::text FROM information_schema.columns \
         WHERE table_name = 'exam_records'",
    )
    .fetch_all(&pool)
    .await?;
    for column in ["answers", "scores", "tab_switch_count", "last_save_fingerprint"] {
        assert!(columns.iter().any(|name| name == column), "missing column {column}");
    }

    let rejected = sqlx::query(
        "INSERT INTO exam_records (exam_id, student_id_number, created_at, updated_at) \
         VALUES ('smoke', 'abc', NOW(), NOW())",
    )
    .execute(&pool)
    .await;
    assert!(rejected.is_err(), "non-digit student id must violate the check constraint");

    Ok(())
}

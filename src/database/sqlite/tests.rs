use super::*;
use anyhow::Result;
use std::collections::HashSet;
use tempfile::TempDir;

const DIM: usize = 3;

async fn create_test_database() -> Result<(TempDir, VecDatabase)> {
    let temp_dir = TempDir::new()?;
    let database = VecDatabase::open(temp_dir.path().join("guide_vec.db"), DIM).await?;
    Ok((temp_dir, database))
}

fn sample(doc: &str, text: &str, vector: [f32; DIM]) -> (NewChunk, Vec<f32>) {
    (
        NewChunk {
            doc: doc.to_string(),
            heading: None,
            chunk: text.to_string(),
        },
        vector.to_vec(),
    )
}

#[tokio::test]
async fn schema_has_both_tables() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(database.pool())
            .await?;
    let tables: HashSet<&str> = tables.iter().map(|t| t.as_str()).collect();

    assert!(tables.contains("chunks"));
    assert!(tables.contains("vec_chunks"));
    Ok(())
}

#[tokio::test]
async fn open_creates_missing_directories() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("nested").join("deeper").join("x_vec.db");

    let database = VecDatabase::open(&path, DIM).await?;
    assert!(path.exists());
    assert_eq!(database.path(), path.as_path());
    assert_eq!(database.dimension(), DIM);
    database.close().await;
    Ok(())
}

#[tokio::test]
async fn reopening_keeps_data() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("keep_vec.db");

    let database = VecDatabase::open(&path, DIM).await?;
    database
        .insert_chunks(&[sample("/k.md", "kept", [1.0, 0.0, 0.0])])
        .await?;
    database.close().await;

    let reopened = VecDatabase::open(&path, DIM).await?;
    assert_eq!(reopened.count_chunks().await?, 1);
    assert_eq!(reopened.count_vectors().await?, 1);
    Ok(())
}

#[tokio::test]
async fn reopening_with_other_dimension_fails() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("dim_vec.db");

    VecDatabase::open(&path, DIM).await?.close().await;

    let error = VecDatabase::open(&path, DIM + 1)
        .await
        .err()
        .expect("dimension mismatch must be rejected");
    let message = format!("{:#}", error);
    assert!(message.contains("3-dimensional"), "{}", message);
    Ok(())
}

#[tokio::test]
async fn zero_dimension_is_rejected() {
    let temp_dir = TempDir::new().expect("temp dir");
    assert!(
        VecDatabase::open(temp_dir.path().join("z_vec.db"), 0)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn inserted_rows_share_identifiers() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let ids = database
        .insert_chunks(&[
            sample("/g.md", "alpha", [1.0, 0.0, 0.0]),
            sample("/g.md", "beta", [0.0, 1.0, 0.0]),
        ])
        .await?;
    assert_eq!(ids.len(), 2);

    let mut rowids: Vec<i64> = sqlx::query_scalar("SELECT rowid FROM vec_chunks")
        .fetch_all(database.pool())
        .await?;
    rowids.sort_unstable();
    assert_eq!(rowids, ids);

    let report = database.consistency_report().await?;
    assert!(report.is_consistent());
    assert_eq!(report.chunk_count, 2);
    assert_eq!(report.vector_count, 2);
    Ok(())
}

#[tokio::test]
async fn failed_batch_writes_nothing() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let result = database
        .insert_chunks(&[
            sample("/g.md", "good", [1.0, 0.0, 0.0]),
            (
                NewChunk {
                    doc: "/g.md".to_string(),
                    heading: None,
                    chunk: "bad".to_string(),
                },
                vec![1.0],
            ),
        ])
        .await;

    assert!(result.is_err());
    assert_eq!(database.count_chunks().await?, 0);
    assert_eq!(database.count_vectors().await?, 0);
    Ok(())
}

#[tokio::test]
async fn search_on_empty_database_is_empty() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;
    assert!(database.search(&[1.0, 0.0, 0.0], 5).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn search_respects_k() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    database
        .insert_chunks(&[
            sample("/g.md", "a", [1.0, 0.0, 0.0]),
            sample("/g.md", "b", [0.0, 1.0, 0.0]),
            sample("/g.md", "c", [0.0, 0.0, 1.0]),
            sample("/g.md", "d", [1.0, 1.0, 0.0]),
        ])
        .await?;

    assert!(database.search(&[1.0, 0.0, 0.0], 0).await?.is_empty());

    let hits = database.search(&[1.0, 0.0, 0.0], 2).await?;
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk, "a");
    assert!(hits.windows(2).all(|w| w[0].score <= w[1].score));

    let all = database.search(&[1.0, 0.0, 0.0], 50).await?;
    assert_eq!(all.len(), 4);
    assert!(all.windows(2).all(|w| w[0].score <= w[1].score));
    Ok(())
}

#[tokio::test]
async fn search_rejects_wrong_query_dimension() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;
    assert!(database.search(&[1.0, 0.0], 3).await.is_err());
    Ok(())
}

#[tokio::test]
async fn clear_empties_both_tables() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    database
        .insert_chunks(&[
            sample("/g.md", "a", [1.0, 0.0, 0.0]),
            sample("/g.md", "b", [0.0, 1.0, 0.0]),
        ])
        .await?;

    database.clear().await?;
    assert_eq!(database.count_chunks().await?, 0);
    assert_eq!(database.count_vectors().await?, 0);
    assert!(database.documents().await?.is_empty());

    // Index is usable again after being rebuilt
    database
        .insert_chunks(&[sample("/g.md", "again", [0.0, 0.0, 1.0])])
        .await?;
    let hits = database.search(&[0.0, 0.0, 1.0], 1).await?;
    assert_eq!(hits[0].chunk, "again");
    Ok(())
}

#[tokio::test]
async fn clear_on_empty_database_succeeds() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;
    database.clear().await?;
    database.clear().await?;
    assert_eq!(database.count_vectors().await?, 0);
    Ok(())
}

#[test]
fn parses_declared_dimension() {
    assert_eq!(
        parse_vec_dimension(
            "CREATE VIRTUAL TABLE vec_chunks USING vec0(embedding float[384])"
        ),
        Some(384)
    );
    assert_eq!(parse_vec_dimension("float[ 12 ]"), Some(12));
    assert_eq!(parse_vec_dimension("CREATE TABLE chunks(id INTEGER)"), None);
    assert_eq!(parse_vec_dimension("float[abc]"), None);
}

#[test]
fn registration_outcome_is_reported() {
    assert!(register_sqlite_vec().is_ok());
    assert!(register_sqlite_vec().is_ok());
    assert!(check_registration(libsqlite3_sys::SQLITE_OK).is_ok());

    let err = check_registration(libsqlite3_sys::SQLITE_ERROR).expect_err("failed registration");
    assert!(err.to_string().contains("sqlite-vec extension could not be registered"));
}

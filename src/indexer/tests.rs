use super::*;
use crate::config::{EmbeddingConfig, EmbeddingProvider};
use crate::embeddings::{ChunkingConfig, HashingEmbedder};
use tempfile::TempDir;

const DIM: usize = 64;

fn test_config(chunk_size: usize) -> Config {
    Config {
        embedding: EmbeddingConfig {
            provider: EmbeddingProvider::Hashing,
            model: "hashing".to_string(),
            dimension: DIM,
            ..EmbeddingConfig::default()
        },
        chunking: ChunkingConfig {
            chunk_size,
            chunk_overlap: 0,
        },
        ..Config::default()
    }
}

fn create_test_service(chunk_size: usize) -> VecDbService {
    VecDbService::new(test_config(chunk_size), Arc::new(HashingEmbedder::new(DIM)))
        .expect("valid service")
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create dirs");
    }
    std::fs::write(&path, content).expect("write file");
    path
}

#[test]
fn rejects_invalid_chunking() {
    let mut config = test_config(40);
    config.chunking.chunk_overlap = 40;
    assert!(VecDbService::new(config, Arc::new(HashingEmbedder::new(DIM))).is_err());
}

#[test]
fn from_config_uses_hashing_provider() {
    let service = VecDbService::from_config(test_config(40)).expect("service");
    assert_eq!(service.embedder().dimension(), DIM);
    assert_eq!(service.embedder().model_name(), "hashing");
    assert_eq!(service.config().chunking.chunk_size, 40);
}

#[test]
fn db_path_follows_save_path() {
    let service = create_test_service(40);
    assert_eq!(
        service.db_path(Path::new("/docs/a.md"), None),
        PathBuf::from("/docs/a_vec.db")
    );
    assert_eq!(
        service.db_path(Path::new("/docs/a.md"), Some(Path::new("/store"))),
        PathBuf::from("/store/a_vec.db")
    );
}

#[tokio::test]
async fn two_paragraphs_store_two_rows_each() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let md = write(
        temp_dir.path(),
        "pair.md",
        "First paragraph of text.\n\nSecond paragraph of text.",
    );
    let service = create_test_service(40);

    assert_eq!(service.ingest_file(&md, None).await?, 2);

    let status = service.status(&md, None).await?;
    assert!(status.exists);
    assert_eq!(status.chunk_count, 2);
    assert_eq!(status.vector_count, 2);
    assert!(status.consistency.is_consistent());
    assert_eq!(status.db_path, temp_dir.path().join("pair_vec.db"));
    Ok(())
}

#[tokio::test]
async fn build_walks_root_recursively() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let docs = temp_dir.path().join("docs");
    write(&docs, "a.md", "# A\n\nAlpha content here.");
    write(&docs, "nested/b.md", "# B\n\nBeta content here.");
    write(&docs, "notes.txt", "not markdown");
    let store = temp_dir.path().join("store");

    let service = create_test_service(256);
    let report = service.build_vec_db(&docs, Some(&store)).await?;

    assert_eq!(report.total_files, 2);
    assert_eq!(report.total_chunks, 2);
    assert!(report.root.is_absolute());
    let names: Vec<String> = report
        .files
        .iter()
        .map(|f| f.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default())
        .collect();
    assert_eq!(names, vec!["a.md", "b.md"]);
    assert!(report.files.iter().all(|f| f.path.is_absolute()));
    assert!(store.join("a_vec.db").exists());
    assert!(store.join("b_vec.db").exists());
    assert!(!store.join("notes_vec.db").exists());

    let status = service.status(Path::new("a.md"), Some(&store)).await?;
    assert_eq!(status.documents.len(), 1);
    assert_eq!(
        PathBuf::from(&status.documents[0].doc),
        report.files[0].path
    );
    assert_eq!(status.documents[0].chunk_count, 1);
    Ok(())
}

#[tokio::test]
async fn build_fails_for_missing_root() {
    let temp_dir = TempDir::new().expect("temp dir");
    let service = create_test_service(40);
    assert!(
        service
            .build_vec_db(&temp_dir.path().join("absent"), None)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn failing_file_stops_build_and_keeps_earlier_files() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let service = create_test_service(40);
    let a = write(temp_dir.path(), "a.md", "Alpha paragraph about rust.");
    std::fs::write(temp_dir.path().join("b.md"), b"\xff\xfe not utf-8")?;
    write(temp_dir.path(), "c.md", "Gamma paragraph after the failure.");

    let err = service
        .build_vec_db(temp_dir.path(), None)
        .await
        .expect_err("invalid UTF-8 aborts the build");
    assert!(format!("{:#}", err).contains("b.md"), "{:#}", err);

    let status = service.status(&a, None).await?;
    assert!(status.exists);
    assert!(status.chunk_count > 0);
    assert_eq!(status.chunk_count, status.vector_count);

    assert!(!temp_dir.path().join("b_vec.db").exists());
    assert!(!temp_dir.path().join("c_vec.db").exists());
    Ok(())
}

#[tokio::test]
async fn reingesting_doubles_rows() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let md = write(
        temp_dir.path(),
        "twice.md",
        "First paragraph of text.\n\nSecond paragraph of text.",
    );
    let service = create_test_service(40);

    service.ingest_file(&md, None).await?;
    let first = service.status(&md, None).await?;
    service.ingest_file(&md, None).await?;
    let second = service.status(&md, None).await?;

    assert_eq!(second.chunk_count, first.chunk_count * 2);
    assert_eq!(second.vector_count, first.vector_count * 2);
    assert!(second.consistency.is_consistent());
    Ok(())
}

#[tokio::test]
async fn empty_file_creates_storage_unit() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let md = write(temp_dir.path(), "empty.md", "");
    let service = create_test_service(40);

    assert_eq!(service.ingest_file(&md, None).await?, 0);
    assert!(temp_dir.path().join("empty_vec.db").exists());
    Ok(())
}

#[tokio::test]
async fn search_ranks_and_limits() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let md = write(
        temp_dir.path(),
        "guide.md",
        "Install the CUDA toolkit on linux.\n\nBake bread with a sourdough starter.\n\nTune the garden hose pressure.",
    );
    let service = create_test_service(40);
    service.ingest_file(&md, None).await?;

    let hits = service
        .search_vec_db("install cuda toolkit", &md, 2, None)
        .await?;
    assert_eq!(hits.len(), 2);
    assert!(hits[0].chunk.contains("CUDA"));
    assert!(hits.windows(2).all(|w| w[0].score <= w[1].score));
    assert!(hits.iter().all(|h| h.doc.ends_with("guide.md")));

    assert!(service.search_vec_db("cuda", &md, 0, None).await?.is_empty());
    let all = service.search_vec_db("cuda", &md, 10, None).await?;
    assert_eq!(all.len(), 3);
    Ok(())
}

#[tokio::test]
async fn search_empty_storage_unit_returns_nothing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let service = create_test_service(40);

    let hits = service
        .search_vec_db("anything", &temp_dir.path().join("never.md"), DEFAULT_TOP_K, None)
        .await?;
    assert!(hits.is_empty());
    assert!(!temp_dir.path().join("never_vec.db").exists());

    let typo = temp_dir.path().join("no-such-dir").join("guide.md");
    assert!(service.search_vec_db("anything", &typo, 5, None).await?.is_empty());
    assert!(!temp_dir.path().join("no-such-dir").exists());

    let store = temp_dir.path().join("store");
    assert!(
        service
            .search_vec_db("anything", &typo, 5, Some(&store))
            .await?
            .is_empty()
    );
    assert!(!store.exists());
    Ok(())
}

#[tokio::test]
async fn clear_leaves_zero_rows() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let md = write(
        temp_dir.path(),
        "wipe.md",
        "First paragraph of text.\n\nSecond paragraph of text.",
    );
    let service = create_test_service(40);
    service.ingest_file(&md, None).await?;

    let db_path = service.clear_vec_db(&md, None).await?;
    assert_eq!(db_path, temp_dir.path().join("wipe_vec.db"));

    let status = service.status(&md, None).await?;
    assert_eq!(status.chunk_count, 0);
    assert_eq!(status.vector_count, 0);
    assert!(service.search_vec_db("paragraph", &md, 5, None).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn status_does_not_create_database() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let service = create_test_service(40);
    let md = temp_dir.path().join("ghost.md");

    let status = service.status(&md, None).await?;
    assert!(!status.exists);
    assert_eq!(status.chunk_count, 0);
    assert!(!temp_dir.path().join("ghost_vec.db").exists());
    Ok(())
}

#[tokio::test]
async fn status_reports_filesystem_errors() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let service = create_test_service(40);
    let not_a_dir = write(temp_dir.path(), "plain.txt", "just a file");
    let md = temp_dir.path().join("ghost.md");

    let err = service
        .status(&md, Some(&not_a_dir))
        .await
        .expect_err("save path under a regular file cannot be checked");
    assert!(format!("{:#}", err).contains("Failed to check for database"));
    Ok(())
}

#[tokio::test]
async fn headings_are_stored_with_chunks() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let md = write(
        temp_dir.path(),
        "titled.md",
        "# Setup\n\nInstall everything first.\n\n## Linux\n\nUse the package manager.",
    );
    let service = create_test_service(30);
    service.ingest_file(&md, None).await?;

    let database = VecDatabase::open(temp_dir.path().join("titled_vec.db"), DIM).await?;
    let headings: Vec<Option<String>> =
        sqlx::query_scalar("SELECT heading FROM chunks ORDER BY id")
            .fetch_all(database.pool())
            .await?;
    database.close().await;

    assert!(headings.contains(&Some("Setup".to_string())));
    assert_eq!(headings.last(), Some(&Some("Setup > Linux".to_string())));
    Ok(())
}

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::database::sqlite::models::SearchHit;
use crate::indexer::{IngestReport, StoreStatus, VecDbService};

/// Characters of each chunk shown in query output
const PREVIEW_CHARS: usize = 200;

/// Load the configuration from `config_dir`, or the platform default directory
#[inline]
pub fn load_config(config_dir: Option<&Path>) -> Result<Config> {
    let dir = match config_dir {
        Some(dir) => dir.to_path_buf(),
        None => Config::default_dir()?,
    };
    Config::load(&dir).with_context(|| format!("Failed to load configuration from {}", dir.display()))
}

/// Ingest the markdown files under `docs`
#[inline]
pub async fn run_ingest(
    service: &VecDbService,
    docs: &Path,
    save_path: Option<&Path>,
) -> Result<IngestReport> {
    let report = service.build_vec_db(docs, save_path).await?;
    print!("{}", format_ingest_report(&report));
    Ok(report)
}

/// Search one document's database and print the ranked hits
#[inline]
pub async fn run_query(
    service: &VecDbService,
    query: &str,
    md_file: &Path,
    top_k: usize,
    save_path: Option<&Path>,
) -> Result<Vec<SearchHit>> {
    let hits = service
        .search_vec_db(query, md_file, top_k, save_path)
        .await?;
    print!("{}", format_hits(&hits));
    Ok(hits)
}

#[inline]
pub async fn run_clear(
    service: &VecDbService,
    md_file: &Path,
    save_path: Option<&Path>,
) -> Result<PathBuf> {
    let db_path = service.clear_vec_db(md_file, save_path).await?;
    println!("Cleared {}", db_path.display());
    Ok(db_path)
}

#[inline]
pub async fn show_status(
    service: &VecDbService,
    md_file: &Path,
    save_path: Option<&Path>,
) -> Result<StoreStatus> {
    let status = service.status(md_file, save_path).await?;
    print!("{}", format_status(&status));
    Ok(status)
}

/// Serve the vector database tools over stdio until the client disconnects
#[inline]
pub async fn serve_mcp(service: Arc<VecDbService>) -> Result<()> {
    let server = Arc::new(
        crate::mcp::build_server(service)
            .await
            .context("Failed to create MCP server")?,
    );

    info!(
        "MCP server ready with tools: {}",
        server.tool_names().await.join(", ")
    );

    tokio::select! {
        result = Arc::clone(&server).serve_stdio() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt signal, shutting down");
            Ok(())
        }
    }
}

/// `[score] doc` followed by a preview of each chunk
#[inline]
pub fn format_hits(hits: &[SearchHit]) -> String {
    let mut out = String::new();
    for hit in hits {
        let preview: String = hit.chunk.chars().take(PREVIEW_CHARS).collect();
        let _ = writeln!(out, "[{:.4}] {}", hit.score, hit.doc);
        let _ = writeln!(out, "{}...\n", preview);
    }
    out
}

#[inline]
pub fn format_ingest_report(report: &IngestReport) -> String {
    let mut out = String::new();
    for file in &report.files {
        let _ = writeln!(
            out,
            "{} -> {} ({} chunks)",
            file.path.display(),
            file.db_path.display(),
            file.chunks
        );
    }
    let _ = writeln!(
        out,
        "Ingested {} chunks from {} files under {}",
        report.total_chunks,
        report.total_files,
        report.root.display()
    );
    out
}

#[inline]
pub fn format_status(status: &StoreStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Database: {}", status.db_path.display());
    if !status.exists {
        let _ = writeln!(out, "  not created yet");
        return out;
    }

    let _ = writeln!(out, "  chunks:  {}", status.chunk_count);
    let _ = writeln!(out, "  vectors: {}", status.vector_count);
    let _ = writeln!(out, "  {}", status.consistency);
    for document in &status.documents {
        let _ = writeln!(out, "  {} ({} chunks)", document.doc, document.chunk_count);
    }
    out
}

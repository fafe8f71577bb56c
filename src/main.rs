use clap::{CommandFactory, Parser};
use md_vec_mcp::Result;
use md_vec_mcp::commands::{load_config, run_clear, run_ingest, run_query, serve_mcp, show_status};
use md_vec_mcp::indexer::{DEFAULT_TOP_K, VecDbService};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "md-vec-mcp")]
#[command(about = "Chunk, embed and search markdown documents stored in SQLite vector databases")]
#[command(version)]
struct Cli {
    /// Directory walked recursively for markdown files
    #[arg(long, default_value = "docs")]
    docs: PathBuf,
    /// Chunk, embed and store every markdown file under --docs
    #[arg(long)]
    ingest: bool,
    /// Query text searched against the database of --md-file
    #[arg(long)]
    query: Option<String>,
    /// Markdown file whose vector database is queried, cleared or inspected
    #[arg(long)]
    md_file: Option<PathBuf>,
    /// Directory for the vector databases (default: beside each markdown file)
    #[arg(long)]
    save_path: Option<PathBuf>,
    /// Maximum number of search results
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,
    /// Delete every chunk and vector of --md-file
    #[arg(long)]
    clear: bool,
    /// Show counts and consistency of the database of --md-file
    #[arg(long)]
    status: bool,
    /// Start MCP server on stdio
    #[arg(long)]
    serve: bool,
    /// Configuration directory (default: platform config dir)
    #[arg(long)]
    config_dir: Option<PathBuf>,
}

impl Cli {
    fn has_action(&self) -> bool {
        self.serve || self.ingest || self.query.is_some() || self.clear || self.status
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if !cli.has_action() {
        Cli::command().print_help()?;
        return Ok(());
    }

    let config = load_config(cli.config_dir.as_deref())?;
    let service = Arc::new(VecDbService::from_config(config)?);
    let save_path = cli.save_path.as_deref();

    if cli.serve {
        serve_mcp(service).await?;
        return Ok(());
    }

    if cli.ingest {
        run_ingest(&service, &cli.docs, save_path).await?;
    }

    if let Some(query) = &cli.query {
        match &cli.md_file {
            Some(md_file) => {
                run_query(&service, query, md_file, cli.top_k, save_path).await?;
            }
            None => println!("Please specify --md-file to search"),
        }
    }

    if cli.clear {
        match &cli.md_file {
            Some(md_file) => {
                run_clear(&service, md_file, save_path).await?;
            }
            None => println!("Please specify --md-file to clear"),
        }
    }

    if cli.status {
        match &cli.md_file {
            Some(md_file) => {
                show_status(&service, md_file, save_path).await?;
            }
            None => println!("Please specify --md-file to show status"),
        }
    }

    Ok(())
}

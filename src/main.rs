//! git-access - serve or query a git repository
//!
//! # Usage
//! ```bash
//! git-access /path/to/repository                    # Start server
//! git-access /path/to/repository --backend cli      # Use the git executable
//! git-access /path/to/repository last-commit main src/lib.rs
//! git-access /path/to/repository ls main src
//! ```

use std::sync::Arc;

use axum::Router;
use clap::{Parser, Subcommand};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use git_access::cache::{CacheService, DEFAULT_CAPACITY, MemoryCache};
use git_access::git::tree_entry::sort_entries;
use git_access::git::{BackendKind, Repository};
use git_access::routes;
use git_access::settings::Settings;

/// Browse a git repository over HTTP or answer one query and exit
#[derive(Parser)]
#[command(name = "git-access")]
#[command(about = "Read-only git repository access service", long_about = None)]
struct Cli {
    /// Path to the git repository
    #[arg(value_name = "REPO_PATH")]
    repo_path: String,

    /// Port to run the server on
    #[arg(short, long, default_value = "3001")]
    port: u16,

    /// Object access implementation: native (libgit2) or cli (git executable)
    #[arg(short, long, default_value = "native")]
    backend: BackendKind,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the commit that last changed PATH as of REV
    LastCommit { rev: String, path: String },
    /// List a directory as of REV
    Ls {
        rev: String,
        #[arg(default_value = "")]
        path: String,
    },
}

fn last_commit(repo: &Repository, rev: &str, path: &str) -> anyhow::Result<()> {
    let commit = repo.get_commit(rev)?.get_commit_by_path(path)?;
    println!(
        "{} {} {}",
        commit.id(),
        commit.author().when.format("%Y-%m-%d"),
        commit.summary()
    );
    Ok(())
}

fn ls(repo: &Repository, rev: &str, path: &str) -> anyhow::Result<()> {
    let tree = repo.get_tree(rev)?.sub_tree(path)?;
    let mut entries = tree.list_entries()?;
    sort_entries(&mut entries);
    for entry in &entries {
        println!(
            "{:06o} {:<6} {} {:>8}\t{}",
            entry.mode().raw(),
            entry.entry_type().as_str(),
            entry.id(),
            entry.size(),
            entry.name()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing (quieter for production)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Arc::new(Settings::from_env());
    let cache: Arc<dyn CacheService> = Arc::new(MemoryCache::new(DEFAULT_CAPACITY));

    let repo = match Repository::open(&cli.repo_path, settings, cli.backend, Some(cache)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("✗ Failed to open repository: {}", e);
            eprintln!("  Path: {}", cli.repo_path);
            std::process::exit(1);
        }
    };

    if let Ok(branch) = repo.get_default_branch() {
        let key = format!("commits_count:{}:{}", cli.repo_path, branch);
        if let Err(e) = repo.enable_last_commit_cache(&key, &cli.repo_path, &branch) {
            tracing::warn!("last commit cache disabled for {}: {}", cli.repo_path, e);
        }
    }

    match cli.command {
        Some(Commands::LastCommit { rev, path }) => return last_commit(&repo, &rev, &path),
        Some(Commands::Ls { rev, path }) => return ls(&repo, &rev, &path),
        None => {}
    }

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(routes::create_router(repo.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Bind to the port
    let addr = format!("127.0.0.1:{}", cli.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("✗ Failed to bind to port {}: {}", cli.port, e);
            eprintln!("  Try a different port with --port <PORT>");
            std::process::exit(1);
        }
    };

    println!();
    println!("  Repository: {}", repo.path().display());
    println!("  Backend:    {}", cli.backend);
    println!("  Server:     http://{}", addr);
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    // Set up graceful shutdown
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
        println!("\n  Shutting down...");
        repo.close();
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

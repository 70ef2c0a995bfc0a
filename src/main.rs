//! Blame Viewer - line history with per-commit change highlighting
//!
//! # Usage
//! ```bash
//! blame-viewer /path/to/repository             # Serve the blame API
//! blame-viewer /path/to/repository --port 8080 # ...on another port
//! blame-viewer blame src/lib.rs                # Print an annotated file
//! blame-viewer blame src/lib.rs --commit HEAD~3 --repo ../other
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use clap::{Parser, Subcommand};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blame_viewer::blame::{reconcile, BlameResult};
use blame_viewer::git::{BlameBackend, GitRepository};
use blame_viewer::models::{BlamePosition, Line, LinePartStatus};
use blame_viewer::routes::{self, AppState};

/// Blame Viewer - see which commit introduced each part of every line
#[derive(Parser)]
#[command(name = "blame-viewer")]
#[command(about = "Line history with per-commit change highlighting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the git repository to serve
    #[arg(value_name = "REPO_PATH")]
    repo_path: Option<String>,

    /// Port to run the server on
    #[arg(short, long, default_value = "3001")]
    port: u16,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a file annotated with the commit of every line
    Blame {
        /// File to blame, relative to the repository root
        file: String,

        /// Blame the file as of this commit instead of the working copy
        #[arg(short, long)]
        commit: Option<String>,

        /// Repository containing the file
        #[arg(short, long, default_value = ".")]
        repo: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Some(Commands::Blame { file, commit, repo }) => print_blame(&repo, file, commit).await,
        None => {
            let repo_path = cli.repo_path.unwrap_or_else(|| {
                eprintln!("Usage: blame-viewer <REPO_PATH> [--port <PORT>]");
                eprintln!("       blame-viewer blame <FILE> [--commit <ID>] [--repo <PATH>]");
                std::process::exit(1);
            });
            serve(&repo_path, cli.port).await
        }
    }
}

async fn serve(repo_path: &str, port: u16) -> anyhow::Result<()> {
    let repo = match GitRepository::open(repo_path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("✗ Failed to open repository: {}", e);
            eprintln!("  Path: {}", repo_path);
            std::process::exit(1);
        }
    };

    let canonical_path = std::fs::canonicalize(&repo.root)
        .unwrap_or_else(|_| PathBuf::from(repo_path))
        .to_string_lossy()
        .to_string();

    let state = AppState::new(repo).context("reading repository remotes")?;

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(routes::create_router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("127.0.0.1:{}", port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("✗ Failed to bind to port {}: {}", port, e);
            eprintln!("  Try a different port with --port <PORT>");
            std::process::exit(1);
        }
    };

    println!();
    println!("  Blame Viewer");
    println!();
    println!("  Repository: {}", canonical_path);
    println!("  API:        http://{}/api/v1/blame?path=<file>", addr);
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        println!("\n  Shutting down...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn print_blame(repo_path: &str, file: String, commit: Option<String>) -> anyhow::Result<()> {
    let repo = Arc::new(GitRepository::open(repo_path)?);
    let position = BlamePosition::new(file, commit);

    let content = {
        let repo = Arc::clone(&repo);
        let position = position.clone();
        tokio::task::spawn_blocking(move || {
            repo.current_content(&position.file_name, position.commit_id.as_deref())
        })
        .await??
    };
    let result = Arc::new(BlameResult::provisional(position.file_name.clone(), &content));

    reconcile(repo, position.clone(), Arc::clone(&result))
        .await
        .with_context(|| format!("blaming {}", position.file_name))?;

    for line in result.lines()? {
        let Some(block) = result.block_for_line(line.line_number)? else {
            continue;
        };
        let commit = &block.commit;
        println!(
            "{} {:<16} {} {:>5}{} {}",
            commit.short_id().get(..8).unwrap_or(commit.short_id()),
            truncate(&commit.author.name, 16),
            commit.author_date.format("%Y-%m-%d"),
            line.line_number,
            change_marker(&line),
            line.text()
        );
    }
    Ok(())
}

/// `+` for lines the commit wrote entirely, `~` for lines it edited.
fn change_marker(line: &Line) -> char {
    if line.parts.is_empty() {
        ' '
    } else if line.is_new() {
        '+'
    } else if line.parts.iter().any(|p| p.status == LinePartStatus::New) {
        '~'
    } else {
        ' '
    }
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

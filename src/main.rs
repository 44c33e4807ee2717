use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use tokio::io::AsyncWriteExt;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fileshare_client::{
    config::Config,
    dashboard::DashboardOptions,
    notify::TracingSink,
    share::CommandClipboard,
    storage::Database,
    transport::{FileService, HttpFileService},
    Credential, Dashboard, Privacy, Session,
};

/// Manage uploaded files and their share links on a remote file service.
#[derive(Parser, Debug)]
#[command(name = "fileshare", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a bearer token obtained from the service's login flow
    Login {
        #[arg(long)]
        token: String,
    },
    /// Forget the stored token
    Logout,
    /// List uploaded files
    List,
    /// Upload a file
    Upload { path: PathBuf },
    /// Flip a file between public and private
    Toggle { id: String },
    /// Make a file public or private
    Privacy { id: String, target: Privacy },
    /// Delete a file after confirmation
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Print the share link of a public file
    Share {
        id: String,
        /// Also copy the link to the clipboard
        #[arg(long)]
        copy: bool,
    },
    /// Download a shared file without logging in
    FetchShare {
        share_id: String,
        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr, command output to stdout
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer().with_writer(std::io::stderr))
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let config = Config::load()?;

    let db = Database::open(&config.session.data_dir)?;
    let session = Arc::new(Session::persistent(db)?);
    if let Some(ref token) = config.session.token {
        session.set(Credential::new(token.clone()))?;
    }

    let service: Arc<dyn FileService> = Arc::new(HttpFileService::new(
        &config.service.base_url,
        config.connect_timeout(),
    )?);
    let clipboard = Arc::new(CommandClipboard::from_config(
        config.clipboard_command.as_deref(),
    )?);

    let dashboard = Dashboard::new(
        DashboardOptions::from_config(&config),
        Arc::clone(&service),
        Arc::clone(&session),
        Arc::new(TracingSink),
        clipboard,
    );

    match cli.command {
        Command::Login { token } => {
            session.set(Credential::new(token))?;
            let count = dashboard.mount().await?;
            info!(files = count, "Logged in");
        }
        Command::Logout => dashboard.logout(),
        Command::List => {
            dashboard.mount().await?;
            print_files(&dashboard);
        }
        Command::Upload { path } => {
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            dashboard.mount().await?;
            dashboard.upload(&file_name(&path)?, Bytes::from(data)).await?;
            print_files(&dashboard);
        }
        Command::Toggle { id } => {
            dashboard.mount().await?;
            dashboard.toggle_privacy(&id).await?;
            print_share(&dashboard, &id);
        }
        Command::Privacy { id, target } => {
            dashboard.mount().await?;
            dashboard.set_privacy(&id, target).await?;
            print_share(&dashboard, &id);
        }
        Command::Delete { id, yes } => {
            dashboard.mount().await?;
            let mut flow = dashboard.request_delete(&id)?;
            let prompt = flow.prompt().unwrap_or_default();
            if !yes && !confirm(&prompt)? {
                flow.cancel()?;
                info!(file_id = %id, "Delete cancelled");
                return Ok(());
            }
            dashboard.delete(flow.confirm()?).await?;
        }
        Command::Share { id, copy } => {
            dashboard.mount().await?;
            let Some(url) = dashboard.share_url(&id) else {
                bail!("File {id} is not public");
            };
            println!("{url}");
            if copy {
                dashboard.copy_share_link(&id).await;
            }
        }
        Command::FetchShare { share_id, output } => {
            let data = service.fetch_shared(&share_id).await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, &data).await?;
                    info!(bytes = data.len(), path = %path.display(), "Saved shared file");
                }
                None => {
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&data).await?;
                    stdout.flush().await?;
                }
            }
        }
    }

    Ok(())
}

fn file_name(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .with_context(|| format!("{} has no usable file name", path.display()))
}

fn print_files(dashboard: &Dashboard) {
    let view = dashboard.view();
    if view.files.is_empty() {
        println!("No files uploaded yet.");
        return;
    }
    for row in view.files {
        let record = &row.record;
        println!(
            "{}\t{}\t{:?}\t{}\t{}\t{}",
            record.id,
            record.privacy(),
            record.file_type(),
            record.created_at.format("%Y-%m-%d %H:%M"),
            record.filename,
            row.share_url.unwrap_or_default()
        );
    }
}

fn print_share(dashboard: &Dashboard, id: &str) {
    match dashboard.share_url(id) {
        Some(url) => println!("{url}"),
        None => println!("{id} is private"),
    }
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

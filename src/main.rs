use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docportal::loader::UploadedFile;
use docportal::service::{ChatIndexRequest, ChatQuery, PortalApi, PortalService};
use docportal::{api, config, logging};
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(
    name = "docportal",
    version,
    about = "Document analysis, comparison and chat over your own files"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Extract summary and metadata from a PDF.
    Analyze {
        /// PDF to analyze.
        pdf: PathBuf,
    },
    /// Compare two versions of a PDF page by page.
    Compare {
        /// Reference (original) PDF.
        reference: PathBuf,
        /// Actual (revised) PDF.
        actual: PathBuf,
    },
    /// Index files into a fresh session and ask one question.
    Chat {
        /// Files to index (.pdf, .docx, .txt, .md).
        #[arg(long = "file", required = true)]
        files: Vec<PathBuf>,
        /// Question to ask.
        #[arg(long)]
        question: String,
        /// Reuse or name the chat session.
        #[arg(long)]
        session_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // `.env` may carry RUST_LOG and DOCPORTAL_LOG_FILE, so it loads before the subscriber.
    let config = config::init_config().context("failed to load configuration")?;
    logging::init_tracing();
    let service =
        Arc::new(PortalService::new(config.clone()).context("failed to build portal service")?);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(service).await,
        Command::Analyze { pdf } => {
            let metadata = service
                .analyze_document(read_upload(&pdf)?)
                .await
                .map_err(|error| anyhow::anyhow!(error.report()))?;
            print_json(&metadata)
        }
        Command::Compare { reference, actual } => {
            let report = service
                .compare_documents(read_upload(&reference)?, read_upload(&actual)?)
                .await
                .map_err(|error| anyhow::anyhow!(error.report()))?;
            print_json(&report)
        }
        Command::Chat {
            files,
            question,
            session_id,
        } => {
            let files = files
                .iter()
                .map(|path| read_upload(path))
                .collect::<Result<Vec<_>>>()?;
            let indexed = service
                .index_chat(ChatIndexRequest {
                    files,
                    session_id,
                    use_session_dirs: true,
                })
                .await
                .map_err(|error| anyhow::anyhow!(error.report()))?;
            let reply = service
                .query_chat(ChatQuery {
                    question,
                    session_id: indexed.session_id,
                    history: None,
                })
                .await
                .map_err(|error| anyhow::anyhow!(error.report()))?;
            println!("{}", reply.answer);
            Ok(())
        }
    }
}

async fn serve(service: Arc<PortalService>) -> Result<()> {
    let app = api::create_router(service);
    let (listener, port) = bind_listener().await.context("failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn read_upload(path: &Path) -> Result<UploadedFile> {
    UploadedFile::from_path(path).with_context(|| format!("failed to read {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn bind_listener() -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    let config = config::get_config();
    if let Some(port) = config.server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 8080..=8179;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 8080-8179",
    ))
}

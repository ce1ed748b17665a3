mod commands;

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use notesync::{
    AttachmentStore, AuthProvider, CollectionStore, HttpAttachmentStore, HttpGateway, ManualAuth,
    MemoryAttachmentStore, MemoryGateway, NoteService, RemoteGateway, SessionController,
    StoreHandle, SyncConfig, SyncContext,
};

struct Args {
    config_path: Option<PathBuf>,
    offline: bool,
}

fn parse_args() -> Args {
    let mut args = std::env::args().skip(1);
    let mut parsed = Args {
        config_path: None,
        offline: false,
    };

    while let Some(arg) = args.next() {
        if arg == "--config" || arg == "-c" {
            if let Some(path) = args.next() {
                parsed.config_path = Some(PathBuf::from(path));
            }
        } else if arg == "--offline" {
            parsed.offline = true;
        }
    }

    // Default to ~/.config/notesync/config.yaml if it exists
    if parsed.config_path.is_none() {
        if let Some(home) = std::env::var_os("HOME") {
            let mut default_path = PathBuf::from(home);
            default_path.push(".config");
            default_path.push("notesync");
            default_path.push("config.yaml");
            if default_path.exists() {
                parsed.config_path = Some(default_path);
            }
        }
    }

    parsed
}

/// Logs go to ~/.config/notesync/notesync.log, falling back to stderr.
fn init_logging() {
    let log_file_path = std::env::var_os("HOME").map(|home| {
        let mut path = PathBuf::from(home);
        path.push(".config");
        path.push("notesync");
        std::fs::create_dir_all(&path).ok();
        path.push("notesync.log");
        path
    });

    // Default to INFO level, can be overridden with RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_file = log_file_path.as_ref().and_then(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });

    match log_file {
        Some(file) => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
            .init(),
        None => {
            eprintln!("Warning: Could not open log file, logging to stderr");
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = parse_args();

    let config = match &args.config_path {
        Some(path) => SyncConfig::load_from_file(path)?,
        None => SyncConfig::default(),
    }
    .apply_env();

    let auth = Arc::new(ManualAuth::new(config.event_buffer));
    let auth_provider: Arc<dyn AuthProvider> = auth.clone();

    let (gateway, attachments): (Arc<dyn RemoteGateway>, Arc<dyn AttachmentStore>) =
        if args.offline {
            tracing::info!("Running against the in-memory backend");
            (
                Arc::new(MemoryGateway::new(auth_provider.clone())) as Arc<dyn RemoteGateway>,
                Arc::new(MemoryAttachmentStore::new()) as Arc<dyn AttachmentStore>,
            )
        } else {
            let gateway = HttpGateway::new(&config, auth_provider.clone())
                .context("Cannot reach the backend (use --offline to run without one)")?;
            let attachments: Arc<dyn AttachmentStore> = if config.attachments_url.is_some() {
                Arc::new(HttpAttachmentStore::new(&config, auth_provider.clone())?)
            } else {
                Arc::new(MemoryAttachmentStore::new())
            };
            (Arc::new(gateway) as Arc<dyn RemoteGateway>, attachments)
        };

    let store = StoreHandle::spawn(CollectionStore::new(config.event_buffer));
    let ctx = SyncContext::new(gateway, store).with_attachments(attachments);
    let controller = SessionController::spawn(auth_provider, ctx.clone(), config.event_buffer);
    let service = NoteService::new(ctx);

    commands::run(auth, controller, service).await
}

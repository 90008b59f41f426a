//! ZarVault - append-only photo gallery.
//!
//! `serve` runs the daemon; every other command is a client of it.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use zarvault::{
    api::{self, ApiState},
    auth::{self, UploadKey},
    client::{ClientConfig, GalleryClient, DEFAULT_API_URL},
    store::{default_data_dir, EntryStore, SharedStore, StoreConfig},
    sync::{SyncCache, SyncConfig},
    upload::{PipelineConfig, UploadError, UploadPipeline, UploadRequest},
    Entry, HttpBlobSink,
};

/// Append-only photo gallery.
#[derive(Parser)]
#[command(name = "zarvault", about = "Append-only photo gallery", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gallery API daemon.
    Serve {
        /// Address to bind the API server.
        #[arg(long, default_value = "0.0.0.0:7880", env = "ZARVAULT_BIND")]
        bind: String,

        /// Data directory for the database and upload key.
        #[arg(long, env = "ZARVAULT_DATA_DIR")]
        data_dir: Option<PathBuf>,

        /// Blob store endpoint for file uploads. File uploads are disabled without it.
        #[arg(long, env = "ZARVAULT_BLOB_URL")]
        blob_url: Option<String>,
    },

    /// Create the data directory, database and upload signing key.
    Init {
        /// Data directory for the database and upload key.
        #[arg(long, env = "ZARVAULT_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },

    /// Show daemon status.
    Status {
        /// Gallery API URL.
        #[arg(long, env = "ZARVAULT_API_URL", default_value = DEFAULT_API_URL)]
        api_url: String,
    },

    /// List entries, newest first.
    List {
        /// Gallery API URL.
        #[arg(long, env = "ZARVAULT_API_URL", default_value = DEFAULT_API_URL)]
        api_url: String,
    },

    /// Add an image by URL or local file path.
    Add {
        /// Image URL, or path of a local image file to upload.
        source: String,

        /// Optional caption.
        #[arg(long)]
        caption: Option<String>,

        /// Gallery API URL.
        #[arg(long, env = "ZARVAULT_API_URL", default_value = DEFAULT_API_URL)]
        api_url: String,

        /// Blob store endpoint, needed for local files.
        #[arg(long, env = "ZARVAULT_BLOB_URL")]
        blob_url: Option<String>,

        /// Data directory holding the upload key.
        #[arg(long, env = "ZARVAULT_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },

    /// Poll the gallery and print every change.
    Watch {
        /// Gallery API URL.
        #[arg(long, env = "ZARVAULT_API_URL", default_value = DEFAULT_API_URL)]
        api_url: String,

        /// Seconds between polls.
        #[arg(long, default_value_t = 3)]
        interval_secs: u64,
    },

    /// Browse the gallery in the terminal.
    View {
        /// Gallery API URL.
        #[arg(long, env = "ZARVAULT_API_URL", default_value = DEFAULT_API_URL)]
        api_url: String,

        /// Blob store endpoint, needed to add local files.
        #[arg(long, env = "ZARVAULT_BLOB_URL")]
        blob_url: Option<String>,

        /// Data directory holding the upload key and the log file.
        #[arg(long, env = "ZARVAULT_DATA_DIR")]
        data_dir: Option<PathBuf>,

        /// Seconds between polls.
        #[arg(long, default_value_t = 3)]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The viewer owns the terminal, so its logs go to a file.
    let log_file = match &cli.command {
        Commands::View { data_dir, .. } => {
            let dir = data_dir.clone().unwrap_or_else(default_data_dir);
            std::fs::create_dir_all(&dir)?;
            Some(dir.join("view.log"))
        }
        _ => None,
    };
    init_tracing(log_file.as_deref())?;

    match cli.command {
        Commands::Serve {
            bind,
            data_dir,
            blob_url,
        } => {
            run_daemon(&bind, data_dir, blob_url).await?;
        }

        Commands::Init { data_dir } => {
            init_data_dir(data_dir)?;
        }

        Commands::Status { api_url } => {
            show_status(&api_url).await?;
        }

        Commands::List { api_url } => {
            list_entries(&api_url).await?;
        }

        Commands::Add {
            source,
            caption,
            api_url,
            blob_url,
            data_dir,
        } => {
            add_entry(&api_url, &source, caption, blob_url, data_dir).await?;
        }

        Commands::Watch {
            api_url,
            interval_secs,
        } => {
            watch_entries(&api_url, interval_secs).await?;
        }

        Commands::View {
            api_url,
            blob_url,
            data_dir,
            interval_secs,
        } => {
            run_viewer(&api_url, blob_url, data_dir, interval_secs).await?;
        }
    }

    Ok(())
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "zarvault=info,tower_http=info".into());

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    Ok(())
}

fn store_config(data_dir: Option<PathBuf>) -> StoreConfig {
    data_dir.map(StoreConfig::new).unwrap_or_default()
}

/// Blob sink for `blob_url`, signed with the key in `data_dir` if one exists.
fn blob_sink(blob_url: Option<String>, data_dir: &Path) -> Result<Option<HttpBlobSink>> {
    let Some(url) = blob_url else {
        return Ok(None);
    };

    let key = UploadKey::load_optional(&auth::key_path(data_dir))?;
    if key.is_none() {
        tracing::warn!("No upload key found, blob writes will be unsigned (run `zarvault init`)");
    }

    Ok(Some(HttpBlobSink::new(url, key)?))
}

fn client(api_url: &str) -> Result<GalleryClient> {
    Ok(GalleryClient::new(ClientConfig::new(api_url))?)
}

/// Run the API daemon.
async fn run_daemon(bind: &str, data_dir: Option<PathBuf>, blob_url: Option<String>) -> Result<()> {
    let config = store_config(data_dir);
    let store = EntryStore::open(&config)?;

    let sink = blob_sink(blob_url, &config.data_dir)?;
    match &sink {
        Some(sink) => tracing::info!(endpoint = %sink.endpoint(), "File uploads enabled"),
        None => tracing::info!("No blob store configured, file uploads disabled"),
    }

    let state = Arc::new(ApiState::new(
        SharedStore::new(store),
        sink,
        PipelineConfig::default(),
    ));

    api::serve(state, bind).await?;

    Ok(())
}

fn init_data_dir(data_dir: Option<PathBuf>) -> Result<()> {
    let config = store_config(data_dir);
    let store = EntryStore::open(&config)?;

    let key_path = auth::key_path(&config.data_dir);
    let key = match UploadKey::load_optional(&key_path)? {
        Some(key) => {
            println!("Upload key already exists.");
            key
        }
        None => {
            let key = UploadKey::init(&key_path)?;
            println!("Created upload key.");
            key
        }
    };

    println!("Data dir:   {}", config.data_dir.display());
    println!("Database:   {} ({} entries)", config.db_path().display(), store.count()?);
    println!("Key file:   {}", key_path.display());
    println!("Public key: {}", key.public_key());
    println!();
    println!("Authorize the public key on your blob store to enable signed uploads.");

    Ok(())
}

/// Show daemon status via API.
async fn show_status(api_url: &str) -> Result<()> {
    let status = client(api_url)?.status().await?;

    println!("ZarVault Status");
    println!("===============");
    println!("Status:     {}", status.status);
    println!("Entries:    {}", status.entries);
    println!("Blob store: {}", if status.blob_sink { "configured" } else { "none" });

    Ok(())
}

/// List entries via API.
async fn list_entries(api_url: &str) -> Result<()> {
    let entries = client(api_url)?.list_entries().await?;

    if entries.is_empty() {
        println!("No entries yet.");
        return Ok(());
    }

    print_table(&entries);
    Ok(())
}

fn print_table(entries: &[Entry]) {
    println!("{:<18} {:<24} {:<50}", "CREATED", "CAPTION", "IMAGE");
    println!("{}", "-".repeat(94));

    for entry in entries {
        let caption = entry.display_caption().unwrap_or("-");
        println!(
            "{:<18} {:<24} {:<50}",
            entry.display_date(),
            truncate(caption, 24),
            entry.image_ref
        );
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Add an entry through the upload pipeline.
async fn add_entry(
    api_url: &str,
    source: &str,
    caption: Option<String>,
    blob_url: Option<String>,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let data_dir = data_dir.unwrap_or_else(default_data_dir);
    let sink = blob_sink(blob_url, &data_dir)?;
    let pipeline = Arc::new(UploadPipeline::new(sink, client(api_url)?, PipelineConfig::default()));

    let request = UploadRequest::from_operator_input(source, caption.clone()).await?;

    match pipeline.submit(request).await? {
        Ok(entry) => {
            println!("Entry created!");
            println!("ID:      {}", entry.id);
            println!("Image:   {}", entry.image_ref);
            println!("Caption: {}", entry.display_caption().unwrap_or("-"));
            println!("Created: {}", entry.display_date());
            Ok(())
        }
        Err(UploadError::MetadataCommitFailedAfterUpload { url, source }) => {
            eprintln!("The image was uploaded to {url} but saving the entry failed: {source}");
            eprintln!("Retry without uploading again:  {}", retry_hint(&url, caption.as_deref()));
            anyhow::bail!("entry not saved")
        }
        Err(e) => Err(e.into()),
    }
}

/// Command line that records an already-uploaded image.
fn retry_hint(url: &str, caption: Option<&str>) -> String {
    let mut line = format!("zarvault add {}", shell_quote(url));
    if let Some(caption) = caption.map(str::trim).filter(|c| !c.is_empty()) {
        line.push_str(" --caption ");
        line.push_str(&shell_quote(caption));
    }
    line
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Print the gallery every time it changes.
async fn watch_entries(api_url: &str, interval_secs: u64) -> Result<()> {
    let config = SyncConfig {
        interval: Duration::from_secs(interval_secs.max(1)),
        ..Default::default()
    };
    let mut cache = SyncCache::activate(client(api_url)?, config);
    let mut reader = cache.subscribe();

    println!("Watching {api_url} (Ctrl-C to stop)");

    loop {
        tokio::select! {
            snapshot = reader.changed() => {
                let Some(snapshot) = snapshot else { break };
                println!();
                println!("Revision {} - {} entries", snapshot.revision, snapshot.len());
                if !snapshot.is_empty() {
                    print_table(&snapshot.entries);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    cache.deactivate().await;
    let stats = cache.stats();
    tracing::info!(successes = stats.successes, failures = stats.failures, "Stopped watching");

    Ok(())
}

/// Run the interactive viewer.
async fn run_viewer(
    api_url: &str,
    blob_url: Option<String>,
    data_dir: Option<PathBuf>,
    interval_secs: u64,
) -> Result<()> {
    use ratatui::{backend::CrosstermBackend, Terminal};
    use std::io;
    use zarvault::{
        app::App,
        event::{Event, EventHandler},
        tui::Tui,
        update::{update, Command},
    };

    tracing::info!(api_url = %api_url, "Starting viewer");

    let data_dir = data_dir.unwrap_or_else(default_data_dir);
    let client = client(api_url)?;
    let sink = blob_sink(blob_url, &data_dir)?;
    let pipeline = Arc::new(UploadPipeline::new(sink, client.clone(), PipelineConfig::default()));

    let sync_config = SyncConfig {
        interval: Duration::from_secs(interval_secs.max(1)),
        ..Default::default()
    };
    let mut cache = SyncCache::activate(client, sync_config);
    let mut app = App::new(cache.current());

    let backend = CrosstermBackend::new(io::stderr());
    let terminal = Terminal::new(backend)?;
    let events = EventHandler::new(250);

    // Forward snapshots into the event stream
    let snapshot_tx = events.sender();
    let mut reader = cache.subscribe();
    let forwarder = tokio::spawn(async move {
        while let Some(snapshot) = reader.changed().await {
            if snapshot_tx.send(Event::Snapshot(snapshot)).is_err() {
                break;
            }
        }
    });

    let mut tui = Tui::new(terminal, events);
    tui.init()?;

    // Main loop
    let result = async {
        while app.running {
            if app.take_dirty() {
                tui.draw(&mut app)?;
            }

            let event = tui.events.next().await?;
            if let Some(Command::Upload { source, caption }) = update(&mut app, event) {
                let pipeline = Arc::clone(&pipeline);
                let done_tx = tui.events.sender();
                tokio::spawn(async move {
                    let outcome = match UploadRequest::from_operator_input(&source, Some(caption)).await {
                        Ok(request) => match pipeline.submit(request).await {
                            Ok(result) => result.map_err(|e| e.to_string()),
                            Err(e) => Err(format!("upload task failed: {e}")),
                        },
                        Err(e) => Err(e.to_string()),
                    };
                    if let Err(reason) = &outcome {
                        tracing::warn!(error = %reason, "Upload from viewer failed");
                    }
                    let _ = done_tx.send(Event::UploadFinished(outcome));
                });
            }
        }
        Ok::<_, anyhow::Error>(())
    }
    .await;

    tui.exit()?;
    cache.deactivate().await;
    forwarder.abort();

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_hint_keeps_caption() {
        assert_eq!(
            retry_hint("https://blobs.example/abc", None),
            "zarvault add 'https://blobs.example/abc'"
        );
        assert_eq!(
            retry_hint("https://blobs.example/abc", Some("  ")),
            "zarvault add 'https://blobs.example/abc'"
        );
        assert_eq!(
            retry_hint("https://blobs.example/abc", Some(" beach day ")),
            "zarvault add 'https://blobs.example/abc' --caption 'beach day'"
        );
        assert_eq!(
            retry_hint("https://blobs.example/abc", Some("Sam's dog")),
            r"zarvault add 'https://blobs.example/abc' --caption 'Sam'\''s dog'"
        );
    }
}

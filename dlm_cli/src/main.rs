use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use dlm_core::{DownloadManager, ManagerConfig, TransferStatus};

mod terminal_observer;
use terminal_observer::TerminalTransferObserver;

#[derive(Parser)]
#[command(name = "dlm", about = "Resumable download manager")]
struct Args {
    /// URLs to download
    #[arg(required = true)]
    urls: Vec<String>,

    /// Directory downloads are written to
    #[arg(short, long, default_value = "downloads")]
    dir: PathBuf,

    /// Path of the persisted transfer state
    #[arg(short, long, default_value = "downloads.json")]
    state: PathBuf,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = ManagerConfig::default()
        .with_downloads_dir(&args.dir)
        .with_state_path(&args.state);

    let mut manager = match DownloadManager::new(config).await {
        Ok(manager) => manager,
        Err(err) => {
            eprintln!("failed to initialise download manager: {}", err);
            std::process::exit(1);
        }
    };

    let observer = Arc::new(TerminalTransferObserver::new());
    manager.add_observer(observer.clone());

    let mut started = Vec::new();
    for url in &args.urls {
        let filename = filename_from_url(url);
        match manager.start(url, &filename).await {
            Ok(id) => {
                observer.register(&id, &filename);
                started.push(id);
            }
            Err(err) => eprintln!("{}: {}", url, err),
        }
    }

    if started.is_empty() {
        std::process::exit(1);
    }

    // The presentation layer polls; the observer renders the bars.
    let failed = loop {
        let transfers = manager.get_all().await;
        let mine: Vec<_> = started
            .iter()
            .filter_map(|id| transfers.get(id))
            .collect();

        if mine.iter().all(|t| t.status.is_terminal()) {
            break mine.iter().any(|t| t.status == TransferStatus::Error);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    };

    if failed {
        std::process::exit(1);
    }
}

/// Extract the last path segment from a URL as a filename fallback.
fn filename_from_url(url: &str) -> String {
    url.rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or("download")
        .to_string()
}

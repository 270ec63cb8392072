use async_trait::async_trait;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use dlm_core::progress::format_bytes;
use dlm_core::TransferObserver;

/// Renders transfer progress as indicatif terminal bars.
///
/// One `ProgressBar` is created per transfer id. `register` labels the bar
/// with the destination filename as soon as `start` hands back the id; a
/// progress callback arriving first lazily creates the bar with the id as a
/// placeholder label.
pub struct TerminalTransferObserver {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl TerminalTransferObserver {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    /// Label the bar for a newly started transfer.
    pub fn register(&self, id: &str, filename: &str) {
        let mut bars = self.bars.lock().unwrap();
        let pb = bars
            .entry(id.to_string())
            .or_insert_with(|| self.new_bar());
        pb.set_message(filename.to_string());
    }

    fn new_bar(&self) -> ProgressBar {
        let style = ProgressStyle::with_template(
            "[{bar:30.cyan/blue}] {bytes}/{total_bytes} ({binary_bytes_per_sec}) ETA {eta} {msg}",
        )
        .unwrap()
        .progress_chars("=>-");

        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(style);
        pb
    }

    fn with_bar(&self, id: &str, f: impl FnOnce(&ProgressBar)) {
        let mut bars = self.bars.lock().unwrap();
        let pb = bars.entry(id.to_string()).or_insert_with(|| {
            let pb = self.new_bar();
            pb.set_message(id.to_string());
            pb
        });
        f(pb);
    }
}

#[async_trait]
impl TransferObserver for TerminalTransferObserver {
    async fn on_progress(&self, id: &str, _percent: f64, downloaded_bytes: u64, total_bytes: u64) {
        self.with_bar(id, |pb| {
            pb.set_length(total_bytes.max(1));
            pb.set_position(downloaded_bytes);
        });
    }

    async fn on_complete(&self, id: &str, filepath: &Path) {
        let name = filepath
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.to_string());
        self.with_bar(id, |pb| {
            pb.finish_with_message(format!("{} done ({})", name, format_bytes(pb.position())));
        });
    }

    async fn on_error(&self, id: &str, message: &str) {
        self.with_bar(id, |pb| {
            pb.abandon_with_message(format!("Error: {}", message));
        });
    }
}

pub mod config;
pub mod manager;
pub mod progress;
pub mod store;
pub mod transfer;
pub mod types;

pub use config::ManagerConfig;
pub use manager::DownloadManager;
pub use progress::observer::TransferObserver;
pub use store::StateStore;
pub use transfer::transport::{HttpTransport, Transport, TransportResponse};
pub use types::types::{DownloadError, TransferState, TransferStatus};

//! # Gatewayエンドポイント

pub mod admission;
pub mod download_url;
pub mod upload_completed;
pub mod upload_url;
pub mod usage;

pub use admission::handle_admission_check;
pub use download_url::handle_download_url;
pub use upload_completed::handle_upload_completed;
pub use upload_url::handle_upload_url;
pub use usage::handle_usage;

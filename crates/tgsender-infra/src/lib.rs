//! Telegram Sender Infrastructure Library
//!
//! This crate provides the I/O facing components of the pipeline:
//! - Telemetry initialization
//! - Bot API delivery with bounded retries

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "delivery")]
pub mod delivery;

// Re-export commonly used types
#[cfg(feature = "observability-basic")]
pub use telemetry::init_telemetry;

#[cfg(feature = "delivery")]
pub use delivery::{TelegramClient, TelegramClientConfig};

//! Bot API delivery

mod client;

pub use client::{TelegramClient, TelegramClientConfig};

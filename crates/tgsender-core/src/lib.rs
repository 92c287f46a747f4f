//! Telegram Sender Core Library
//!
//! This crate provides the configuration, error types and domain models
//! shared by every stage of the image notification pipeline.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{EnvSettings, RoutingStrategyKind, SenderConfig, SettingsStore};
pub use error::{LogLevel, SenderError, SenderResult};
pub use models::{
    DeliveryMode, DeliveryOutcome, DispatchDecision, GenerationMetadata, ImageSavedEvent,
    RouteReason, RoutingTable, TransferArtifact,
};

//! Telegram Sender Services Layer
//!
//! Routing decisions and per-image dispatch. Hosts depend on this crate
//! only: it re-exports the pieces needed to configure and drive the pipeline.

pub mod dispatcher;
pub mod router;

pub use dispatcher::{DispatchHandle, DispatchReport, Dispatcher};
pub use router::{prompt_triggers_nsfw, route, route_by_tags, Router, RoutingStrategy};

pub use tgsender_core::{
    DeliveryOutcome, DispatchDecision, EnvSettings, GenerationMetadata, ImageSavedEvent,
    RouteReason, RoutingTable, SenderConfig, SettingsStore,
};
pub use tgsender_infra::init_telemetry;
pub use tgsender_plugins::{Classification, NsfwClassifier, NsfwLabel};

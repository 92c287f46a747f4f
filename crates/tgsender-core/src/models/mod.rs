//! Domain models for the notification pipeline

pub mod delivery;
pub mod event;
pub mod metadata;
pub mod routing;

pub use delivery::{DeliveryMode, DeliveryOutcome, TransferArtifact};
pub use event::ImageSavedEvent;
pub use metadata::GenerationMetadata;
pub use routing::{DispatchDecision, RouteReason, RoutingTable};

//! NSFW classifier plugins
//!
//! The router can replace prompt sniffing with an image classifier. This crate
//! defines the classifier abstraction and an HTTP-backed implementation.

pub mod classifier;
pub mod http_classifier;

pub use classifier::{Classification, NsfwClassifier, NsfwLabel};
pub use http_classifier::{HttpNsfwClassifier, HttpNsfwClassifierConfig};

//! Per-image dispatch
//!
//! `on_image_saved` returns as soon as the work is spawned. Metadata
//! extraction and image transforms run on the blocking pool; the photo and
//! the optional full-resolution document are delivered by two independent
//! tasks that share nothing but the read-only configuration.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use tgsender_core::{
    DeliveryMode, DeliveryOutcome, DispatchDecision, GenerationMetadata, ImageSavedEvent,
    RoutingTable, SenderConfig, SenderResult, SettingsStore, TransferArtifact,
};
use tgsender_infra::TelegramClient;
use tgsender_processing::{ImageTransformer, MetadataExtractor, ResizeConstraints};

use crate::router::Router;

/// What happened to one saved image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub dispatch_id: Uuid,
    pub path: PathBuf,
    pub decision: DispatchDecision,
    /// `None` when nothing was routed
    pub photo: Option<DeliveryOutcome>,
    /// `None` unless full-resolution delivery is on and a route was found
    pub document: Option<DeliveryOutcome>,
}

impl DispatchReport {
    fn skipped(dispatch_id: Uuid, path: PathBuf, decision: DispatchDecision) -> Self {
        Self {
            dispatch_id,
            path,
            decision,
            photo: None,
            document: None,
        }
    }
}

/// Handle to a spawned dispatch.
///
/// Awaiting it yields the report, or `None` if the dispatch task panicked.
/// Dropping it does not cancel anything.
#[derive(Debug)]
pub struct DispatchHandle {
    dispatch_id: Uuid,
    join: JoinHandle<DispatchReport>,
}

impl DispatchHandle {
    pub fn dispatch_id(&self) -> Uuid {
        self.dispatch_id
    }
}

impl Future for DispatchHandle {
    type Output = Option<DispatchReport>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let dispatch_id = self.dispatch_id;
        Pin::new(&mut self.join).poll(cx).map(|result| match result {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(dispatch_id = %dispatch_id, error = %e, "Dispatch task failed");
                None
            }
        })
    }
}

struct DispatcherInner {
    config: SenderConfig,
    router: Router,
    client: TelegramClient,
    constraints: ResizeConstraints,
    handle: Handle,
}

/// Entry point called by the host after an image is saved
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.inner.config)
            .field("router", &self.inner.router)
            .finish()
    }
}

impl Dispatcher {
    /// Dispatcher with the router selected by `config`.
    pub fn new(config: SenderConfig, handle: Handle) -> SenderResult<Self> {
        let router = Router::from_config(&config);
        Self::with_router(config, router, handle)
    }

    pub fn with_router(config: SenderConfig, router: Router, handle: Handle) -> SenderResult<Self> {
        let client = TelegramClient::from_sender_config(&config)?;
        let constraints = ResizeConstraints::from_config(&config);

        if !client.is_enabled() {
            tracing::info!("Telegram sending is disabled or the bot token is not set");
        }

        Ok(Self {
            inner: Arc::new(DispatcherInner {
                config,
                router,
                client,
                constraints,
                handle,
            }),
        })
    }

    /// Dispatcher configured from a host settings store.
    ///
    /// Also installs the tracing subscriber unless the host already has one.
    pub fn from_settings(store: &dyn SettingsStore, handle: Handle) -> SenderResult<Self> {
        let config = SenderConfig::from_store(store);
        tgsender_infra::init_telemetry(config.debug_mode);
        Self::new(config, handle)
    }

    pub fn config(&self) -> &SenderConfig {
        &self.inner.config
    }

    /// Fire-and-forget dispatch for a saved image.
    ///
    /// Grid images are ignored and yield `None`. Safe to call from threads
    /// outside the runtime.
    pub fn on_image_saved(&self, event: &ImageSavedEvent) -> Option<DispatchHandle> {
        if event.is_grid() {
            tracing::debug!(path = %event.path().display(), "Ignoring grid image");
            return None;
        }

        let dispatch_id = Uuid::new_v4();
        let inner = self.inner.clone();
        let path = event.path().to_path_buf();
        let join = self
            .inner
            .handle
            .spawn(async move { inner.run(dispatch_id, path).await });

        Some(DispatchHandle { dispatch_id, join })
    }

    /// Run the whole pipeline for `event` and wait for both deliveries.
    ///
    /// Grid images produce a report with no deliveries.
    pub async fn dispatch(&self, event: &ImageSavedEvent) -> DispatchReport {
        let dispatch_id = Uuid::new_v4();
        let path = event.path().to_path_buf();
        if event.is_grid() {
            tracing::debug!(path = %path.display(), "Ignoring grid image");
            return DispatchReport::skipped(dispatch_id, path, DispatchDecision::no_match());
        }
        self.inner.clone().run(dispatch_id, path).await
    }
}

impl DispatcherInner {
    async fn run(self: Arc<Self>, dispatch_id: Uuid, path: PathBuf) -> DispatchReport {
        let span = tracing::info_span!(
            "dispatch",
            dispatch_id = %dispatch_id,
            path = %path.display()
        );
        self.pipeline(dispatch_id, path).instrument(span).await
    }

    async fn pipeline(self: Arc<Self>, dispatch_id: Uuid, path: PathBuf) -> DispatchReport {
        let metadata = self.extract_metadata(&path).await;
        let table = RoutingTable::parse(&self.config.channel_mapping);
        let sending_enabled = self.client.is_enabled();
        let decision = if sending_enabled {
            self.router.decide(&metadata, &table, &path).await
        } else {
            self.router.decide_offline(&metadata, &table)
        };

        let Some(chat_id) = decision.destination().map(str::to_string) else {
            tracing::info!(
                lora_tags = ?metadata.lora_tags,
                "No routing match, image not sent"
            );
            return DispatchReport::skipped(dispatch_id, path, decision);
        };

        tracing::info!(chat_id = %chat_id, reason = ?decision.reason, "Image routed");

        if !sending_enabled {
            tracing::debug!("Sending disabled, skipping transform and delivery");
            let document = self
                .config
                .full_resolution
                .then(DeliveryOutcome::disabled);
            return DispatchReport {
                dispatch_id,
                path,
                decision,
                photo: Some(DeliveryOutcome::disabled()),
                document,
            };
        }

        let document_task = self
            .config
            .full_resolution
            .then(|| self.spawn_document(&path, &chat_id));
        let photo_task = self.spawn_photo(&path, &chat_id);

        let photo = join_outcome(photo_task, DeliveryMode::Photo).await;
        let document = match document_task {
            Some(task) => Some(join_outcome(task, DeliveryMode::Document).await),
            None => None,
        };

        DispatchReport {
            dispatch_id,
            path,
            decision,
            photo: Some(photo),
            document,
        }
    }

    async fn extract_metadata(&self, path: &Path) -> GenerationMetadata {
        let owned = path.to_path_buf();
        match self
            .handle
            .spawn_blocking(move || MetadataExtractor::extract(&owned))
            .await
        {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(error = %e, "Metadata extraction task failed");
                GenerationMetadata::default()
            }
        }
    }

    fn spawn_photo(self: &Arc<Self>, path: &Path, chat_id: &str) -> JoinHandle<DeliveryOutcome> {
        let inner = self.clone();
        let original = path.to_path_buf();
        let chat_id = chat_id.to_string();

        self.handle.spawn(
            async move {
                let source = original.clone();
                let constraints = inner.constraints;
                let artifact = match inner
                    .handle
                    .spawn_blocking(move || ImageTransformer::prepare_photo(&source, &constraints))
                    .await
                {
                    Ok(artifact) => artifact,
                    Err(e) => {
                        tracing::warn!(error = %e, "Image transform task failed, sending original");
                        TransferArtifact::original(&original)
                    }
                };

                inner
                    .client
                    .deliver(&artifact, &chat_id, DeliveryMode::Photo)
                    .await
            }
            .in_current_span(),
        )
    }

    fn spawn_document(
        self: &Arc<Self>,
        path: &Path,
        chat_id: &str,
    ) -> JoinHandle<DeliveryOutcome> {
        let inner = self.clone();
        let artifact = TransferArtifact::original(path);
        let chat_id = chat_id.to_string();

        self.handle.spawn(
            async move {
                inner
                    .client
                    .deliver(&artifact, &chat_id, DeliveryMode::Document)
                    .await
            }
            .in_current_span(),
        )
    }
}

async fn join_outcome(task: JoinHandle<DeliveryOutcome>, mode: DeliveryMode) -> DeliveryOutcome {
    match task.await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(method = mode.method(), error = %e, "Delivery task failed");
            DeliveryOutcome::failed(0, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::RoutingStrategy;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tgsender_plugins::{Classification, NsfwClassifier, NsfwLabel};

    #[derive(Debug, Default)]
    struct CountingClassifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NsfwClassifier for CountingClassifier {
        fn name(&self) -> &str {
            "counting"
        }

        async fn classify(&self, _path: &Path) -> anyhow::Result<Classification> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Classification {
                label: NsfwLabel::Nsfw,
                score: 1.0,
            })
        }
    }

    fn disabled_config() -> SenderConfig {
        SenderConfig {
            channel_mapping: "lora somelora:1001".to_string(),
            ..SenderConfig::default()
        }
    }

    #[tokio::test]
    async fn test_grid_images_are_ignored() {
        let dispatcher = Dispatcher::new(disabled_config(), Handle::current()).unwrap();
        let event = ImageSavedEvent::new("/sd/outputs/grids/grid-0001.png");

        assert!(dispatcher.on_image_saved(&event).is_none());

        let report = dispatcher.dispatch(&event).await;
        assert!(report.photo.is_none());
        assert!(report.document.is_none());
    }

    #[tokio::test]
    async fn test_disabled_sending_routes_without_delivery() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0001-modelX-lora SomeLora.png");
        std::fs::write(&path, b"not really a png").unwrap();

        let config = SenderConfig {
            full_resolution: true,
            ..disabled_config()
        };
        let dispatcher = Dispatcher::new(config, Handle::current()).unwrap();
        let report = dispatcher
            .on_image_saved(&ImageSavedEvent::new(&path))
            .unwrap()
            .await
            .unwrap();

        assert_eq!(report.decision, DispatchDecision::lora_match("1001"));
        assert_eq!(report.photo, Some(DeliveryOutcome::disabled()));
        assert_eq!(report.document, Some(DeliveryOutcome::disabled()));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_disabled_sending_skips_classifier() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0001-modelX-lora SomeLora.png");
        std::fs::write(&path, b"not really a png").unwrap();

        let classifier = Arc::new(CountingClassifier::default());
        let router = Router::new(
            RoutingStrategy::Classifier {
                classifier: classifier.clone(),
                threshold: 0.5,
                fallback_to_tags: true,
            },
            Some("999".to_string()),
        );
        let dispatcher =
            Dispatcher::with_router(disabled_config(), router, Handle::current()).unwrap();
        let report = dispatcher.dispatch(&ImageSavedEvent::new(&path)).await;

        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.decision, DispatchDecision::lora_match("1001"));
        assert_eq!(report.photo, Some(DeliveryOutcome::disabled()));
    }

    #[tokio::test]
    async fn test_unrouted_image_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0001-modelX.png");
        std::fs::write(&path, b"not really a png").unwrap();

        let dispatcher = Dispatcher::new(disabled_config(), Handle::current()).unwrap();
        let report = dispatcher.dispatch(&ImageSavedEvent::new(&path)).await;

        assert_eq!(report.decision, DispatchDecision::no_match());
        assert!(report.photo.is_none());
    }

    #[tokio::test]
    async fn test_from_settings() {
        let mut store = HashMap::new();
        store.insert(
            "telegram_channel_mapping".to_string(),
            "lora a:1".to_string(),
        );
        let dispatcher = Dispatcher::from_settings(&store, Handle::current()).unwrap();
        assert_eq!(dispatcher.config().channel_mapping, "lora a:1");
    }
}

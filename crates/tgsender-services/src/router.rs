//! Destination selection
//!
//! Two strategies share one entry point: prompt sniffing looks for the word
//! "nsfw" in the prompt text, the classifier strategy asks an image
//! classifier instead. Both fall back to LoRA tag matching.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::Arc;

use tgsender_core::constants::NSFW_KEYWORD;
use tgsender_core::{
    DispatchDecision, GenerationMetadata, RoutingStrategyKind, RoutingTable, SenderConfig,
    SenderError,
};
use tgsender_plugins::{HttpNsfwClassifier, HttpNsfwClassifierConfig, NsfwClassifier};

/// Whether the prompt text asks for the NSFW override.
///
/// A mention in the negative prompt is an exclusion request and suppresses
/// the override.
pub fn prompt_triggers_nsfw(metadata: &GenerationMetadata) -> bool {
    metadata.positive_prompt.to_lowercase().contains(NSFW_KEYWORD)
        && !metadata.negative_prompt.to_lowercase().contains(NSFW_KEYWORD)
}

/// First table match for the extracted LoRA tags.
///
/// Tags are tried in extraction order; for each tag the `lora ` keys are
/// tried in table order. A key matches when its name fragment occurs in the
/// lowercased tag.
pub fn route_by_tags(metadata: &GenerationMetadata, table: &RoutingTable) -> DispatchDecision {
    for tag in &metadata.lora_tags {
        let tag = tag.to_lowercase();
        for (fragment, destination) in table.lora_entries() {
            if tag.contains(fragment) {
                return DispatchDecision::lora_match(destination);
            }
        }
    }
    DispatchDecision::no_match()
}

/// Prompt-sniffing route: NSFW override first, then tag matching.
pub fn route(
    metadata: &GenerationMetadata,
    table: &RoutingTable,
    nsfw_destination: Option<&str>,
) -> DispatchDecision {
    if let Some(destination) = non_blank(nsfw_destination) {
        if prompt_triggers_nsfw(metadata) {
            return DispatchDecision::nsfw_override(destination);
        }
    }
    route_by_tags(metadata, table)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// How the NSFW override is detected
#[derive(Clone)]
pub enum RoutingStrategy {
    Prompt,
    Classifier {
        classifier: Arc<dyn NsfwClassifier>,
        threshold: f32,
        /// Use tag routing when the classifier fires but no NSFW channel is set
        fallback_to_tags: bool,
    },
}

impl Debug for RoutingStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RoutingStrategy::Prompt => f.write_str("Prompt"),
            RoutingStrategy::Classifier {
                classifier,
                threshold,
                fallback_to_tags,
            } => f
                .debug_struct("Classifier")
                .field("classifier", &classifier.name())
                .field("threshold", threshold)
                .field("fallback_to_tags", fallback_to_tags)
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Router {
    strategy: RoutingStrategy,
    nsfw_destination: Option<String>,
}

impl Router {
    pub fn new(strategy: RoutingStrategy, nsfw_destination: Option<String>) -> Self {
        Self {
            strategy,
            nsfw_destination: nsfw_destination
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        }
    }

    /// Build the configured strategy.
    ///
    /// The classifier strategy needs a classifier URL; without one, or when
    /// the HTTP client cannot be built, prompt sniffing is used.
    pub fn from_config(config: &SenderConfig) -> Self {
        let strategy = match config.routing_strategy {
            RoutingStrategyKind::Prompt => RoutingStrategy::Prompt,
            RoutingStrategyKind::Classifier => match &config.nsfw_classifier_url {
                Some(url) => match HttpNsfwClassifier::new(HttpNsfwClassifierConfig::new(url)) {
                    Ok(classifier) => RoutingStrategy::Classifier {
                        classifier: Arc::new(classifier),
                        threshold: config.nsfw_threshold,
                        fallback_to_tags: config.nsfw_fallback_to_tags,
                    },
                    Err(e) => {
                        tracing::warn!(error = %e, "NSFW classifier unavailable, using prompt routing");
                        RoutingStrategy::Prompt
                    }
                },
                None => {
                    tracing::warn!("Classifier routing selected without a classifier URL, using prompt routing");
                    RoutingStrategy::Prompt
                }
            },
        };

        Self::new(strategy, config.nsfw_channel.clone())
    }

    pub fn strategy(&self) -> &RoutingStrategy {
        &self.strategy
    }

    pub fn nsfw_destination(&self) -> Option<&str> {
        self.nsfw_destination.as_deref()
    }

    /// Decision without contacting the classifier.
    ///
    /// Used when nothing will be uploaded anyway. The classifier strategy
    /// routes by tags only, since prompt text is not its NSFW signal.
    pub fn decide_offline(
        &self,
        metadata: &GenerationMetadata,
        table: &RoutingTable,
    ) -> DispatchDecision {
        match &self.strategy {
            RoutingStrategy::Prompt => route(metadata, table, self.nsfw_destination()),
            RoutingStrategy::Classifier { .. } => route_by_tags(metadata, table),
        }
    }

    /// Decide where the image at `image` goes.
    pub async fn decide(
        &self,
        metadata: &GenerationMetadata,
        table: &RoutingTable,
        image: &Path,
    ) -> DispatchDecision {
        match &self.strategy {
            RoutingStrategy::Prompt => route(metadata, table, self.nsfw_destination()),
            RoutingStrategy::Classifier {
                classifier,
                threshold,
                fallback_to_tags,
            } => {
                let classification = match classifier.classify(image).await {
                    Ok(classification) => classification,
                    Err(e) => {
                        let err = SenderError::Classifier(format!("{:#}", e));
                        tracing::warn!(
                            classifier = classifier.name(),
                            error = %err,
                            "Classification failed, routing by tags"
                        );
                        return route_by_tags(metadata, table);
                    }
                };

                if !classification.is_nsfw_at(*threshold) {
                    return route_by_tags(metadata, table);
                }

                match self.nsfw_destination() {
                    Some(destination) => DispatchDecision::nsfw_override(destination),
                    None if *fallback_to_tags => route_by_tags(metadata, table),
                    None => {
                        tracing::info!(
                            score = classification.score,
                            "Image classified NSFW but no NSFW channel is configured"
                        );
                        DispatchDecision::no_match()
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tgsender_core::RouteReason;
    use tgsender_plugins::{Classification, NsfwLabel};

    fn metadata(positive: &str, negative: &str, tags: &[&str]) -> GenerationMetadata {
        GenerationMetadata {
            raw_parameters: Some(positive.to_string()),
            lora_tags: tags.iter().map(|t| t.to_string()).collect(),
            positive_prompt: positive.to_string(),
            negative_prompt: negative.to_string(),
        }
    }

    #[derive(Debug)]
    struct FixedClassifier(Option<Classification>);

    #[async_trait]
    impl NsfwClassifier for FixedClassifier {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn classify(&self, _path: &Path) -> anyhow::Result<Classification> {
            self.0.ok_or_else(|| anyhow::anyhow!("classifier offline"))
        }
    }

    fn classifier_router(
        verdict: Option<Classification>,
        nsfw_destination: Option<&str>,
        fallback_to_tags: bool,
    ) -> Router {
        Router::new(
            RoutingStrategy::Classifier {
                classifier: Arc::new(FixedClassifier(verdict)),
                threshold: 0.5,
                fallback_to_tags,
            },
            nsfw_destination.map(str::to_string),
        )
    }

    fn nsfw(score: f32) -> Option<Classification> {
        Some(Classification {
            label: NsfwLabel::Nsfw,
            score,
        })
    }

    #[test]
    fn test_lora_tag_routes_to_table_entry() {
        let table = RoutingTable::parse("lora foo:CHAT1");
        let decision = route(&metadata("a cat", "", &["Foo"]), &table, None);
        assert_eq!(decision, DispatchDecision::lora_match("CHAT1"));
    }

    #[test]
    fn test_tag_order_wins_over_key_order() {
        let table = RoutingTable::parse("lora alpha:1;lora beta:2");
        let decision = route(&metadata("", "", &["beta_v2", "alpha"]), &table, None);
        assert_eq!(decision.destination(), Some("2"));
    }

    #[test]
    fn test_first_matching_key_wins_for_a_tag() {
        let table = RoutingTable::parse("lora style:1;lora animestyle:2");
        let decision = route(&metadata("", "", &["AnimeStyle"]), &table, None);
        assert_eq!(decision.destination(), Some("1"));
    }

    #[test]
    fn test_non_lora_keys_are_ignored() {
        let table = RoutingTable::parse("foo:1;model foo:2");
        let decision = route(&metadata("", "", &["foo"]), &table, None);
        assert_eq!(decision.reason, RouteReason::NoMatch);
        assert_eq!(decision.destination(), None);
    }

    #[test]
    fn test_nsfw_override_beats_lora_match() {
        let table = RoutingTable::parse("lora foo:CHAT1");
        let decision = route(
            &metadata("masterpiece, NSFW woman", "blurry", &["foo"]),
            &table,
            Some("999"),
        );
        assert_eq!(decision, DispatchDecision::nsfw_override("999"));
    }

    #[test]
    fn test_nsfw_in_negative_prompt_suppresses_override() {
        let table = RoutingTable::parse("lora foo:CHAT1");
        let decision = route(
            &metadata("nsfw woman", "nsfw, blurry", &["foo"]),
            &table,
            Some("999"),
        );
        assert_eq!(decision, DispatchDecision::lora_match("CHAT1"));
    }

    #[test]
    fn test_blank_nsfw_destination_disables_override() {
        let table = RoutingTable::default();
        let decision = route(&metadata("nsfw", "", &[]), &table, Some("  "));
        assert_eq!(decision, DispatchDecision::no_match());
    }

    #[tokio::test]
    async fn test_classifier_override() {
        let router = classifier_router(nsfw(0.9), Some("999"), true);
        let decision = router
            .decide(
                &metadata("a cat", "", &["foo"]),
                &RoutingTable::parse("lora foo:1"),
                Path::new("x.png"),
            )
            .await;
        assert_eq!(decision, DispatchDecision::nsfw_override("999"));
    }

    #[tokio::test]
    async fn test_classifier_ignores_prompt_text() {
        let verdict = Some(Classification {
            label: NsfwLabel::Sfw,
            score: 0.99,
        });
        let router = classifier_router(verdict, Some("999"), true);
        let decision = router
            .decide(
                &metadata("nsfw", "", &["foo"]),
                &RoutingTable::parse("lora foo:1"),
                Path::new("x.png"),
            )
            .await;
        assert_eq!(decision, DispatchDecision::lora_match("1"));
    }

    #[tokio::test]
    async fn test_classifier_below_threshold_routes_by_tags() {
        let router = classifier_router(nsfw(0.4), Some("999"), true);
        let decision = router
            .decide(
                &metadata("", "", &["foo"]),
                &RoutingTable::parse("lora foo:1"),
                Path::new("x.png"),
            )
            .await;
        assert_eq!(decision, DispatchDecision::lora_match("1"));
    }

    #[tokio::test]
    async fn test_classifier_without_nsfw_channel() {
        let table = RoutingTable::parse("lora foo:1");
        let meta = metadata("", "", &["foo"]);

        let with_fallback = classifier_router(nsfw(0.9), None, true);
        assert_eq!(
            with_fallback.decide(&meta, &table, Path::new("x.png")).await,
            DispatchDecision::lora_match("1")
        );

        let without_fallback = classifier_router(nsfw(0.9), None, false);
        assert_eq!(
            without_fallback
                .decide(&meta, &table, Path::new("x.png"))
                .await,
            DispatchDecision::no_match()
        );
    }

    #[tokio::test]
    async fn test_classifier_error_routes_by_tags() {
        let router = classifier_router(None, Some("999"), false);
        let decision = router
            .decide(
                &metadata("", "", &["foo"]),
                &RoutingTable::parse("lora foo:1"),
                Path::new("x.png"),
            )
            .await;
        assert_eq!(decision, DispatchDecision::lora_match("1"));
    }

    #[test]
    fn test_decide_offline() {
        let table = RoutingTable::parse("lora foo:1");
        let meta = metadata("nsfw", "", &["foo"]);

        let prompt = Router::new(RoutingStrategy::Prompt, Some("999".to_string()));
        assert_eq!(
            prompt.decide_offline(&meta, &table),
            DispatchDecision::nsfw_override("999")
        );

        let classifier = classifier_router(nsfw(0.9), Some("999"), true);
        assert_eq!(
            classifier.decide_offline(&meta, &table),
            DispatchDecision::lora_match("1")
        );
    }

    #[test]
    fn test_from_config_without_url_uses_prompt() {
        let config = SenderConfig {
            routing_strategy: RoutingStrategyKind::Classifier,
            nsfw_classifier_url: None,
            nsfw_channel: Some("999".to_string()),
            ..SenderConfig::default()
        };
        let router = Router::from_config(&config);
        assert!(matches!(router.strategy(), RoutingStrategy::Prompt));
        assert_eq!(router.nsfw_destination(), Some("999"));
    }

    #[test]
    fn test_from_config_with_url_uses_classifier() {
        let config = SenderConfig {
            routing_strategy: RoutingStrategyKind::Classifier,
            nsfw_classifier_url: Some("http://localhost:9000/classify".to_string()),
            ..SenderConfig::default()
        };
        let router = Router::from_config(&config);
        assert!(matches!(
            router.strategy(),
            RoutingStrategy::Classifier { .. }
        ));
    }
}

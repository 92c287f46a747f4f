//! Configuration module
//!
//! The host application exposes its settings as a key/value store. This module
//! turns that store into a typed, read-only `SenderConfig` that is passed
//! explicitly into the router, transformer and delivery client.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_API_BASE, DEFAULT_CHANNEL_MAPPING, DEFAULT_LANDSCAPE_MAX_WIDTH,
    DEFAULT_NSFW_THRESHOLD, DEFAULT_PORTRAIT_MAX_SIZE, DEFAULT_RETRY_COUNT,
    DEFAULT_RETRY_DELAY_SECS, PLACEHOLDER_BOT_TOKEN,
};

pub const KEY_BOT_TOKEN: &str = "telegram_bot_token";
pub const KEY_CHANNEL_MAPPING: &str = "telegram_channel_mapping";
pub const KEY_NSFW_CHANNEL: &str = "telegram_nsfw_channel";
pub const KEY_FULL_RES: &str = "telegram_full_res";
pub const KEY_DISABLE_SENDING: &str = "telegram_disable_sending";
pub const KEY_DEBUG_MODE: &str = "telegram_debug_mode";
pub const KEY_MAX_SIZE: &str = "telegram_max_size";
pub const KEY_LANDSCAPE_MAX_WIDTH: &str = "telegram_landscape_max_width";
pub const KEY_RETRY_COUNT: &str = "telegram_retry_count";
pub const KEY_RETRY_DELAY: &str = "telegram_retry_delay";
pub const KEY_NSFW_THRESHOLD: &str = "telegram_nsfw_threshold";
pub const KEY_ROUTING_STRATEGY: &str = "telegram_routing_strategy";
pub const KEY_NSFW_CLASSIFIER_URL: &str = "telegram_nsfw_classifier_url";
pub const KEY_NSFW_FALLBACK_TO_TAGS: &str = "telegram_nsfw_fallback_to_tags";
pub const KEY_API_BASE: &str = "telegram_api_base";

/// Read-only key/value lookup provided by the host application.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

impl SettingsStore for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Settings backed by process environment variables.
///
/// Keys are looked up upper-cased (`telegram_bot_token` -> `TELEGRAM_BOT_TOKEN`).
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSettings;

impl EnvSettings {
    /// Load a `.env` file if one is present, then read from the environment.
    pub fn load() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!(error = %e, "No .env file loaded");
        }
        Self
    }
}

impl SettingsStore for EnvSettings {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key.to_uppercase()).ok()
    }
}

/// Which router strategy decides the NSFW override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingStrategyKind {
    /// Look for the NSFW keyword in the prompt text
    #[default]
    Prompt,
    /// Ask an external image classifier
    Classifier,
}

impl FromStr for RoutingStrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prompt" => Ok(RoutingStrategyKind::Prompt),
            "classifier" => Ok(RoutingStrategyKind::Classifier),
            other => Err(format!("Invalid routing strategy: {}", other)),
        }
    }
}

/// Typed sender configuration with every default applied.
#[derive(Clone)]
pub struct SenderConfig {
    pub bot_token: String,
    pub channel_mapping: String,
    pub nsfw_channel: Option<String>,
    pub full_resolution: bool,
    pub disable_sending: bool,
    pub debug_mode: bool,
    pub portrait_max_size: u32,
    pub landscape_max_width: u32,
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub nsfw_threshold: f32,
    pub routing_strategy: RoutingStrategyKind,
    pub nsfw_classifier_url: Option<String>,
    pub nsfw_fallback_to_tags: bool,
    pub api_base: String,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            bot_token: PLACEHOLDER_BOT_TOKEN.to_string(),
            channel_mapping: DEFAULT_CHANNEL_MAPPING.to_string(),
            nsfw_channel: None,
            full_resolution: false,
            disable_sending: false,
            debug_mode: false,
            portrait_max_size: DEFAULT_PORTRAIT_MAX_SIZE,
            landscape_max_width: DEFAULT_LANDSCAPE_MAX_WIDTH,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            nsfw_threshold: DEFAULT_NSFW_THRESHOLD,
            routing_strategy: RoutingStrategyKind::Prompt,
            nsfw_classifier_url: None,
            nsfw_fallback_to_tags: true,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl fmt::Debug for SenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenderConfig")
            .field("bot_token", &"<redacted>")
            .field("channel_mapping", &self.channel_mapping)
            .field("nsfw_channel", &self.nsfw_channel)
            .field("full_resolution", &self.full_resolution)
            .field("disable_sending", &self.disable_sending)
            .field("debug_mode", &self.debug_mode)
            .field("portrait_max_size", &self.portrait_max_size)
            .field("landscape_max_width", &self.landscape_max_width)
            .field("retry_count", &self.retry_count)
            .field("retry_delay", &self.retry_delay)
            .field("nsfw_threshold", &self.nsfw_threshold)
            .field("routing_strategy", &self.routing_strategy)
            .field("nsfw_classifier_url", &self.nsfw_classifier_url)
            .field("nsfw_fallback_to_tags", &self.nsfw_fallback_to_tags)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl SenderConfig {
    /// Build the configuration from the host's settings store.
    ///
    /// Missing keys take their defaults. Values that fail to parse also take
    /// the default and are reported at `warn` level.
    pub fn from_store(store: &dyn SettingsStore) -> Self {
        let defaults = Self::default();

        let retry_count = parsed_or(store, KEY_RETRY_COUNT, defaults.retry_count).max(1);
        let retry_delay_secs = parsed_or(store, KEY_RETRY_DELAY, DEFAULT_RETRY_DELAY_SECS);

        let nsfw_threshold = parsed_or(store, KEY_NSFW_THRESHOLD, defaults.nsfw_threshold);
        let nsfw_threshold = if (0.0..=1.0).contains(&nsfw_threshold) {
            nsfw_threshold
        } else {
            tracing::warn!(
                key = KEY_NSFW_THRESHOLD,
                value = nsfw_threshold,
                "NSFW threshold outside 0..=1, using default"
            );
            defaults.nsfw_threshold
        };

        Self {
            bot_token: store
                .get(KEY_BOT_TOKEN)
                .map(|t| t.trim().to_string())
                .unwrap_or(defaults.bot_token),
            channel_mapping: store
                .get(KEY_CHANNEL_MAPPING)
                .unwrap_or(defaults.channel_mapping),
            nsfw_channel: non_empty(store.get(KEY_NSFW_CHANNEL)),
            full_resolution: flag_or(store, KEY_FULL_RES, defaults.full_resolution),
            disable_sending: flag_or(store, KEY_DISABLE_SENDING, defaults.disable_sending),
            debug_mode: flag_or(store, KEY_DEBUG_MODE, defaults.debug_mode),
            portrait_max_size: parsed_or(store, KEY_MAX_SIZE, defaults.portrait_max_size),
            landscape_max_width: parsed_or(
                store,
                KEY_LANDSCAPE_MAX_WIDTH,
                defaults.landscape_max_width,
            ),
            retry_count,
            retry_delay: Duration::from_secs(retry_delay_secs),
            nsfw_threshold,
            routing_strategy: parsed_or(store, KEY_ROUTING_STRATEGY, defaults.routing_strategy),
            nsfw_classifier_url: non_empty(store.get(KEY_NSFW_CLASSIFIER_URL)),
            nsfw_fallback_to_tags: flag_or(
                store,
                KEY_NSFW_FALLBACK_TO_TAGS,
                defaults.nsfw_fallback_to_tags,
            ),
            api_base: non_empty(store.get(KEY_API_BASE))
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
        }
    }

    pub fn from_env() -> Self {
        Self::from_store(&EnvSettings::load())
    }

    /// Whether uploads may be attempted at all.
    pub fn sending_enabled(&self) -> bool {
        !self.disable_sending
            && !self.bot_token.is_empty()
            && self.bot_token != PLACEHOLDER_BOT_TOKEN
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_or<T>(store: &dyn SettingsStore, key: &str, default: T) -> T
where
    T: FromStr,
{
    match store.get(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key = key, value = %raw, "Invalid setting value, using default");
                default
            }
        },
        None => default,
    }
}

fn flag_or(store: &dyn SettingsStore, key: &str, default: bool) -> bool {
    match store.get(key) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" | "" => false,
            _ => {
                tracing::warn!(key = key, value = %raw, "Invalid boolean setting, using default");
                default
            }
        },
        None => default,
    }
}

//! Constants shared across the sender crates

/// Placeholder value shipped as the default bot token. Sending is disabled
/// while the configured token still equals it.
pub const PLACEHOLDER_BOT_TOKEN: &str = "YOUR_BOT_TOKEN";

pub const DEFAULT_CHANNEL_MAPPING: &str = "lora somelora:CHAT_ID";
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

pub const DEFAULT_PORTRAIT_MAX_SIZE: u32 = 2560;
pub const DEFAULT_LANDSCAPE_MAX_WIDTH: u32 = 5120;

pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;
pub const DEFAULT_NSFW_THRESHOLD: f32 = 0.5;

/// Hard ceiling for photo uploads (Telegram rejects larger `sendPhoto` payloads).
pub const PHOTO_SIZE_LIMIT_BYTES: u64 = 10 * 1024 * 1024;

/// Quality used for every re-encode produced by the transformer.
pub const BASE_JPEG_QUALITY: u8 = 85;
pub const MIN_JPEG_QUALITY: u8 = 30;
pub const JPEG_QUALITY_STEP: u8 = 10;

/// Filename markers for artifacts created by the transformer.
pub const RESIZED_SUFFIX: &str = "_resized";
pub const COMPRESSED_SUFFIX: &str = "_compressed";

/// Path segment the host uses for composite grid images.
pub const GRID_PATH_SEGMENT: &str = "outputs/grids/";

/// Prefix marking LoRA entries in the routing table.
pub const LORA_KEY_PREFIX: &str = "lora ";

pub const NSFW_KEYWORD: &str = "nsfw";

use serde::{Deserialize, Serialize};

/// Generation parameters recovered from a saved image.
///
/// Built once per image by the metadata extractor and never mutated. Every
/// field may be empty: missing metadata is not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Parameter text as embedded in the image, before truncation
    pub raw_parameters: Option<String>,
    /// LoRA names in order of first appearance
    pub lora_tags: Vec<String>,
    pub positive_prompt: String,
    pub negative_prompt: String,
}

impl GenerationMetadata {
    /// Record built from the filename marker when the image carries no text.
    pub fn from_filename_tag(tag: Option<String>) -> Self {
        Self {
            lora_tags: tag.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn has_embedded_parameters(&self) -> bool {
        self.raw_parameters.is_some()
    }
}

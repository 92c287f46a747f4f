use serde::{Deserialize, Serialize};

use crate::constants::LORA_KEY_PREFIX;

/// Mapping from routing key to destination chat, in configuration order.
///
/// Keys are trimmed and lowercased. Built fresh from the configuration text on
/// every dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    entries: Vec<(String, String)>,
}

impl RoutingTable {
    /// Parse `key:destination` pairs separated by `;`.
    ///
    /// Entries without a `:` are skipped, as are entries whose key or
    /// destination is blank. A repeated key replaces the earlier destination
    /// but keeps the earlier position.
    pub fn parse(text: &str) -> Self {
        let mut entries: Vec<(String, String)> = Vec::new();

        for entry in text.split(';') {
            let Some((key, destination)) = entry.split_once(':') else {
                continue;
            };

            let key = key.trim().to_lowercase();
            let destination = destination.trim();
            if key.is_empty() || destination.is_empty() {
                continue;
            }

            match entries.iter_mut().find(|(existing, _)| *existing == key) {
                Some(slot) => slot.1 = destination.to_string(),
                None => entries.push((key, destination.to_string())),
            }
        }

        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.trim().to_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, d)| d.as_str())
    }

    /// LoRA entries as `(name fragment, destination)` in table order.
    pub fn lora_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(key, destination)| {
            key.strip_prefix(LORA_KEY_PREFIX)
                .map(str::trim)
                .filter(|fragment| !fragment.is_empty())
                .map(|fragment| (fragment, destination.as_str()))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Why the router picked (or did not pick) a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteReason {
    LoraMatch,
    NsfwOverride,
    NoMatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchDecision {
    pub destination: Option<String>,
    pub reason: RouteReason,
}

impl DispatchDecision {
    pub fn lora_match(destination: impl Into<String>) -> Self {
        Self {
            destination: Some(destination.into()),
            reason: RouteReason::LoraMatch,
        }
    }

    pub fn nsfw_override(destination: impl Into<String>) -> Self {
        Self {
            destination: Some(destination.into()),
            reason: RouteReason::NsfwOverride,
        }
    }

    pub fn no_match() -> Self {
        Self {
            destination: None,
            reason: RouteReason::NoMatch,
        }
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }
}

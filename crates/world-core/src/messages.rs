//! Player-facing message catalog.
//!
//! Messages are looked up by key and formatted with positional `{0}`,
//! `{1}`, ... placeholders. The built-in English catalog can be overridden
//! per key from a flat TOML file (`KEY = "text"`).

use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;

/// Key of the broadcast sent when the node starts shutting down.
pub const SHUTDOWN_SEC: &str = "SHUTDOWN_SEC";
/// Key of the notice sent to players on a channel the cluster never assigned.
pub const CHANNEL_UNASSIGNED: &str = "CHANNEL_UNASSIGNED";

const DEFAULTS: &[(&str, &str)] = &[
    (SHUTDOWN_SEC, "The server will shut down in {0} seconds!"),
    ("SESSION_LIMIT_REACHED", "The server is full. Please try again later."),
    (CHANNEL_UNASSIGNED, "This channel is not registered with the cluster."),
];

#[derive(Debug, Clone)]
pub struct MessageCatalog {
    entries: HashMap<String, String>,
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self {
            entries: DEFAULTS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl MessageCatalog {
    /// Built-in catalog with `path` applied on top.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let overrides: HashMap<String, String> = toml::from_str(&content)?;
        let mut catalog = Self::default();
        catalog.entries.extend(overrides);
        Ok(catalog)
    }

    /// Raw message text. Unknown keys render as the key itself.
    pub fn get<'a>(&'a self, key: &'a str) -> &'a str {
        self.entries.get(key).map(String::as_str).unwrap_or(key)
    }

    pub fn format(&self, key: &str, args: &[&dyn Display]) -> String {
        let mut text = self.get(key).to_string();
        for (i, arg) in args.iter().enumerate() {
            text = text.replace(&format!("{{{i}}}"), &arg.to_string());
        }
        text
    }
}

use std::collections::HashMap;

use log::{debug, warn};
use tokio::sync::RwLock;

use crate::utils::properties;

/// Languages accepted when no explicit list is configured
pub const DEFAULT_LANGUAGES: [&str; 6] = ["en", "fr", "de", "it", "es", "pt"];

/// Keys added to the catalog for one language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedMessages {
    pub language: String,
    pub keys: Vec<String>,
}

/// Shared, per-language store of translated messages
#[derive(Debug)]
pub struct MessageCatalog {
    valid_languages: Vec<String>,
    messages: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect())
    }
}

impl MessageCatalog {
    pub fn new(valid_languages: Vec<String>) -> Self {
        Self {
            valid_languages,
            messages: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_valid_language(&self, language: &str) -> bool {
        self.valid_languages.iter().any(|l| l == language)
    }

    /// Add the messages of a properties block. Returns `None` when the
    /// language is not supported, in which case nothing is added.
    pub async fn add(&self, language: &str, properties_text: &str) -> Option<AddedMessages> {
        if !self.is_valid_language(language) {
            warn!("Ignoring i18n messages for unsupported language '{}'", language);
            return None;
        }
        let entries = properties::parse(properties_text);
        let keys: Vec<String> = entries.iter().map(|(k, _)| k.clone()).collect();
        let mut messages = self.messages.write().await;
        messages
            .entry(language.to_string())
            .or_default()
            .extend(entries);
        debug!("Added {} message(s) for language '{}'", keys.len(), language);
        Some(AddedMessages {
            language: language.to_string(),
            keys,
        })
    }

    pub async fn remove(&self, added: &AddedMessages) {
        let mut messages = self.messages.write().await;
        if let Some(language) = messages.get_mut(&added.language) {
            for key in &added.keys {
                language.remove(key);
            }
        }
    }

    pub async fn get(&self, language: &str, key: &str) -> Option<String> {
        self.messages
            .read()
            .await
            .get(language)
            .and_then(|m| m.get(key).cloned())
    }

    pub async fn len(&self, language: &str) -> usize {
        self.messages
            .read()
            .await
            .get(language)
            .map(HashMap::len)
            .unwrap_or(0)
    }
}

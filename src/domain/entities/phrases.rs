//! Localized phrases shown to users

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::application::errors::ConfigError;

const BUNDLED_PHRASES: &str = include_str!("../../../data/phrases.yaml");

/// Language of the conversation with the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Ua,
    En,
    Ru,
}

impl Locale {
    pub const ALL: [Locale; 3] = [Locale::Ua, Locale::En, Locale::Ru];

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::Ua => "ua",
            Locale::En => "en",
            Locale::Ru => "ru",
        }
    }

    /// Parse callback data produced by the locale keyboard
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "ua" => Some(Locale::Ua),
            "en" => Some(Locale::En),
            "ru" => Some(Locale::Ru),
            _ => None,
        }
    }

    /// Map a Telegram `language_code` to a locale, falling back to Ukrainian
    pub fn from_language_code(code: Option<&str>) -> Self {
        match code.map(|c| c.split('-').next().unwrap_or(c)) {
            Some("uk") | Some("ua") => Locale::Ua,
            Some("ru") => Locale::Ru,
            Some("en") => Locale::En,
            _ => Locale::Ua,
        }
    }

    /// Language code Telegram expects in `setMyCommands`
    pub fn telegram_code(&self) -> &'static str {
        match self {
            Locale::Ua => "uk",
            Locale::En => "en",
            Locale::Ru => "ru",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One phrase in every supported locale
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MultilingualPhrase {
    pub en: String,
    pub ru: String,
    pub ua: String,
}

impl MultilingualPhrase {
    pub fn get(&self, locale: Locale) -> &str {
        match locale {
            Locale::Ua => &self.ua,
            Locale::En => &self.en,
            Locale::Ru => &self.ru,
        }
    }
}

/// Phrase table keyed by phrase id
#[derive(Debug, Clone, Default)]
pub struct Phrases {
    entries: HashMap<String, MultilingualPhrase>,
}

impl Phrases {
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let entries: HashMap<String, MultilingualPhrase> = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse phrases: {}", e)))?;
        Ok(Self { entries })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Parse(format!("Failed to read phrases: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Phrase table compiled into the binary
    pub fn bundled() -> Result<Self, ConfigError> {
        Self::from_yaml(BUNDLED_PHRASES)
    }

    /// Text of a phrase; unknown ids are returned as-is
    pub fn get<'a>(&'a self, id: &'a str, locale: Locale) -> &'a str {
        match self.entries.get(id) {
            Some(phrase) => phrase.get(locale),
            None => {
                tracing::warn!("Phrase {} not found", id);
                id
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

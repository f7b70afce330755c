//! Application identifiers and the catalog of apps whose reviews can be trained on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::StudioError;

/// Validated application slug (e.g. `honkai-star-rail`).
///
/// Every persisted artifact path is derived from this value, so only
/// lowercase ASCII letters, digits and `-` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppId(String);

impl AppId {
    pub fn parse(raw: &str) -> Result<Self, StudioError> {
        let valid = !raw.is_empty()
            && raw.len() <= 64
            && !raw.starts_with('-')
            && raw
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(StudioError::InvalidAppId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AppId {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AppId {
    type Error = StudioError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AppId> for String {
    fn from(id: AppId) -> Self {
        id.0
    }
}

/// One entry of the application catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppEntry {
    pub slug: String,
    /// Store package id used by the review scraper.
    pub package: String,
    pub name: String,
    pub developer: String,
}

impl AppEntry {
    fn new(slug: &str, package: &str, name: &str, developer: &str) -> Self {
        Self {
            slug: slug.to_string(),
            package: package.to_string(),
            name: name.to_string(),
            developer: developer.to_string(),
        }
    }
}

/// Built-in catalog, used when `studio.toml` does not list any apps.
pub fn default_apps() -> Vec<AppEntry> {
    vec![
        AppEntry::new("spotify", "com.spotify.music", "Spotify", "Spotify Ltd."),
        AppEntry::new(
            "amazon",
            "com.amazon.mShop.android.shopping",
            "Amazon",
            "Amazon Mobile LLC",
        ),
        AppEntry::new(
            "honkai-star-rail",
            "com.HoYoverse.hkrpgoversea",
            "Honkai: Star Rail",
            "Cognosphere PTE. LTD.",
        ),
        AppEntry::new(
            "arena-breakout",
            "com.proximabeta.mf.uamo",
            "Arena Breakout",
            "Level Infinite",
        ),
        AppEntry::new(
            "wuthering-waves",
            "com.kurogame.wutheringwaves.global",
            "Wuthering Waves",
            "KURO GAMES",
        ),
    ]
}

/// Lookup table over the configured apps.
#[derive(Debug, Clone)]
pub struct Catalog {
    apps: Vec<AppEntry>,
}

impl Catalog {
    pub fn new(apps: Vec<AppEntry>) -> Self {
        Self { apps }
    }

    pub fn apps(&self) -> &[AppEntry] {
        &self.apps
    }

    pub fn get(&self, app: &AppId) -> Option<&AppEntry> {
        self.apps.iter().find(|entry| entry.slug == app.as_str())
    }

    /// Resolve an app or fail with the user-facing "not found" error.
    pub fn require(&self, app: &AppId) -> Result<&AppEntry, StudioError> {
        self.get(app)
            .ok_or_else(|| StudioError::UnknownApp(app.to_string()))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(default_apps())
    }
}

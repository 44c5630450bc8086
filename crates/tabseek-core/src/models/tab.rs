use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TabSeekError;

/// Host-assigned tab handle. Unique among open tabs only; the host reuses ids after closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(i64);

impl TabId {
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Storage key: the base-10 rendering of the id.
    #[must_use]
    pub fn storage_key(self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TabId {
    type Err = TabSeekError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        raw.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| TabSeekError::Validation(format!("invalid tab id: {raw}")))
    }
}

/// Tab descriptor as reported by the host tab capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabDescriptor {
    pub id: TabId,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub fav_icon_url: String,
}

impl TabDescriptor {
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        is_eligible_url(&self.url)
    }
}

/// One persisted index entry. Only ever replaced whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabEntry {
    pub id: TabId,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub fav_icon_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_text: Option<String>,
}

impl TabEntry {
    #[must_use]
    pub fn from_descriptor(tab: &TabDescriptor, tab_text: Option<String>) -> Self {
        Self {
            id: tab.id,
            url: tab.url.clone(),
            title: tab.title.clone(),
            fav_icon_url: tab.fav_icon_url.clone(),
            tab_text,
        }
    }
}

/// Window-scoped index read, ordered by ascending tab id.
pub type IndexSnapshot = BTreeMap<TabId, TabEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    Loading,
    Complete,
}

/// Change info delivered with a tab update event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabUpdateChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TabStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl TabUpdateChange {
    #[must_use]
    pub fn complete() -> Self {
        Self {
            status: Some(TabStatus::Complete),
            url: None,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == Some(TabStatus::Complete)
    }
}

/// Only http and https pages are indexed.
#[must_use]
pub fn is_eligible_url(url: &str) -> bool {
    let Some((scheme, rest)) = url.split_once(':') else {
        return false;
    };
    let scheme = scheme.trim().to_ascii_lowercase();
    matches!(scheme.as_str(), "http" | "https") && !rest.is_empty()
}

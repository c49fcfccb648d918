//! Petition records and the wire format of the petitions API

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::Deserialize;

/// A single open petition as seen in one fetch
///
/// Fields are private; a `Petition` is built once per decoded item and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Petition {
    id: i64,
    action: String,
    signature_count: u64,
    opened_at: DateTime<FixedOffset>,
    url: String,
}

impl Petition {
    /// Create a petition record
    pub fn new(
        id: i64,
        action: impl Into<String>,
        signature_count: u64,
        opened_at: DateTime<FixedOffset>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id,
            action: action.into(),
            signature_count,
            opened_at,
            url: url.into(),
        }
    }

    /// Upstream identifier
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Free-text description of what the petition asks for
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Current signature tally
    pub fn signature_count(&self) -> u64 {
        self.signature_count
    }

    /// When the petition opened, in the offset supplied upstream
    pub fn opened_at(&self) -> DateTime<FixedOffset> {
        self.opened_at
    }

    /// Opening time as an RFC 3339 string with whole seconds
    ///
    /// Used as a metric label, so fractional seconds are dropped to keep the
    /// value stable across fetches.
    pub fn opened_at_label(&self) -> String {
        self.opened_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Resource URL of this petition, `{base_url}/petitions/{id}`
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Build the resource URL for a petition id
pub fn petition_url(base_url: &str, id: i64) -> String {
    format!("{}/petitions/{}", base_url, id)
}

/// One page of `GET /petitions.json`
#[derive(Debug, Deserialize)]
pub(crate) struct PetitionsPage {
    #[serde(default)]
    pub links: PageLinks,
    #[serde(default)]
    pub data: Vec<PetitionItem>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageLinks {
    #[serde(default)]
    pub next: Option<String>,
}

impl PageLinks {
    /// The next page link, treating an empty string the same as no link
    pub fn next(&self) -> Option<&str> {
        self.next.as_deref().filter(|next| !next.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PetitionItem {
    pub id: i64,
    pub attributes: PetitionAttributes,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PetitionAttributes {
    pub action: String,
    pub signature_count: u64,
    pub opened_at: DateTime<FixedOffset>,
}

impl PetitionItem {
    pub fn into_petition(self, base_url: &str) -> Petition {
        Petition::new(
            self.id,
            self.attributes.action,
            self.attributes.signature_count,
            self.attributes.opened_at,
            petition_url(base_url, self.id),
        )
    }
}

//! The normalized advisory record produced by extraction
//!
//! `AdvisoryRecord` is what every extractor returns regardless of vendor or
//! fetch strategy. Link and identifier collections are insertion-ordered sets:
//! output order is stable, duplicates and empty strings are impossible.

use crate::fetch::FetchStrategy;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Insertion-ordered set of non-empty strings (exact, case-sensitive dedup)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedSet {
    items: Vec<String>,
    seen: HashSet<String>,
}

impl OrderedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a trimmed value; returns false for empty or duplicate values
    pub fn insert(&mut self, value: impl AsRef<str>) -> bool {
        let value = value.as_ref().trim();
        if value.is_empty() || self.seen.contains(value) {
            return false;
        }
        self.seen.insert(value.to_string());
        self.items.push(value.to_string());
        true
    }

    pub fn extend<I, S>(&mut self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for value in values {
            self.insert(value);
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.seen.contains(value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    pub fn join(&self, separator: &str) -> String {
        self.items.join(separator)
    }
}

impl<S: AsRef<str>> FromIterator<S> for OrderedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = OrderedSet::new();
        set.extend(iter);
        set
    }
}

impl<'a> IntoIterator for &'a OrderedSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl Serialize for OrderedSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

/// Coarse trust label on an extracted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
pub enum Confidence {
    #[default]
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remediation facts extracted from one advisory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdvisoryRecord {
    pub patch_ids: OrderedSet,
    pub fix_version: Option<String>,
    pub affected_versions: Option<String>,
    pub remediation_text: Option<String>,
    pub download_links: OrderedSet,
    /// Links derived from bare identifiers rather than found on the page.
    /// Every entry here is also present in `download_links`; none are verified.
    pub synthesized_links: OrderedSet,
    pub vendor_used: String,
    pub source_strategy: Option<FetchStrategy>,
    confidence: Confidence,
}

impl AdvisoryRecord {
    pub fn new(vendor: impl Into<String>) -> Self {
        Self {
            vendor_used: vendor.into(),
            ..Self::default()
        }
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    /// Sets the confidence label
    ///
    /// `High` is downgraded to `Medium` unless the record carries at least one
    /// patch identifier or download link.
    pub fn set_confidence(&mut self, confidence: Confidence) {
        self.confidence = if confidence == Confidence::High && !self.has_actionable_data() {
            Confidence::Medium
        } else {
            confidence
        };
    }

    /// True when the record names a patch or offers a download
    pub fn has_actionable_data(&self) -> bool {
        !self.patch_ids.is_empty() || !self.download_links.is_empty()
    }

    /// True when nothing recognizable was extracted
    pub fn is_empty(&self) -> bool {
        self.patch_ids.is_empty()
            && self.download_links.is_empty()
            && self.fix_version.is_none()
            && self.affected_versions.is_none()
            && self.remediation_text.is_none()
    }

    pub fn add_link(&mut self, link: impl AsRef<str>) -> bool {
        self.download_links.insert(link)
    }

    /// Adds a link synthesized from an identifier
    pub fn add_synthesized_link(&mut self, link: impl AsRef<str>) {
        let link = link.as_ref();
        if self.download_links.insert(link) {
            self.synthesized_links.insert(link);
        }
    }

    pub fn set_fix_version(&mut self, value: Option<String>) {
        if self.fix_version.is_none() {
            self.fix_version = non_empty(value);
        }
    }

    pub fn set_affected_versions(&mut self, value: Option<String>) {
        if self.affected_versions.is_none() {
            self.affected_versions = non_empty(value);
        }
    }

    pub fn set_remediation_text(&mut self, value: Option<String>) {
        if self.remediation_text.is_none() {
            self.remediation_text = non_empty(value);
        }
    }

    /// Layers a secondary extraction pass on top of this one
    ///
    /// Identifier and link sets are unioned (this record's order first);
    /// scalar fields keep the first non-empty value.
    pub fn merge(&mut self, other: AdvisoryRecord) {
        self.patch_ids.extend(other.patch_ids.iter());
        for link in other.download_links.iter() {
            if other.synthesized_links.contains(link) {
                self.add_synthesized_link(link);
            } else {
                self.add_link(link);
            }
        }
        self.set_fix_version(other.fix_version);
        self.set_affected_versions(other.affected_versions);
        self.set_remediation_text(other.remediation_text);
        if self.vendor_used.is_empty() {
            self.vendor_used = other.vendor_used;
        }
        if self.source_strategy.is_none() {
            self.source_strategy = other.source_strategy;
        }
        if other.confidence > self.confidence {
            self.set_confidence(other.confidence);
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

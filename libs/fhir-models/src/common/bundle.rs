//! FHIR Bundle model
//!
//! Typed view of a Bundle resource. Entries carry a resource and may override
//! the bundle-level base URL; that override decides how entry identifiers are
//! qualified when a bundle is decoded.

use super::error::{Error, Result};
use super::id::IdType;
use super::resource::{Resource, ResourceHandle};
use std::fmt;
use std::str::FromStr;

/// FHIR Bundle
///
/// A container for a collection of resources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bundle {
    /// Logical id of this bundle
    pub id: IdType,

    /// Base URL that entry resources inherit unless the entry overrides it
    pub base: Option<String>,

    /// Indicates the purpose of this bundle - how it was intended to be used
    pub bundle_type: Option<BundleType>,

    /// If search, the total number of matches
    pub total: Option<u32>,

    /// Entries in the bundle, in order
    pub entries: Vec<BundleEntry>,
}

/// Type of Bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleType {
    /// Document Bundle - A set of resources composing a single coherent document
    Document,
    /// Message Bundle - A message (application/response or application/request)
    Message,
    /// Transaction Bundle - A transaction - intended to be processed atomically
    Transaction,
    /// Transaction Response Bundle - Response to a transaction
    TransactionResponse,
    /// History Bundle - A list of resources with history
    History,
    /// Search Results Bundle - Results of a search operation
    Searchset,
    /// Collection Bundle - A set of resources collected for a specific purpose
    Collection,
}

impl BundleType {
    pub fn as_code(&self) -> &'static str {
        match self {
            BundleType::Document => "document",
            BundleType::Message => "message",
            BundleType::Transaction => "transaction",
            BundleType::TransactionResponse => "transaction-response",
            BundleType::History => "history",
            BundleType::Searchset => "searchset",
            BundleType::Collection => "collection",
        }
    }
}

impl FromStr for BundleType {
    type Err = Error;

    fn from_str(code: &str) -> Result<Self> {
        match code {
            "document" => Ok(BundleType::Document),
            "message" => Ok(BundleType::Message),
            "transaction" => Ok(BundleType::Transaction),
            "transaction-response" => Ok(BundleType::TransactionResponse),
            "history" => Ok(BundleType::History),
            "searchset" => Ok(BundleType::Searchset),
            "collection" => Ok(BundleType::Collection),
            other => Err(Error::InvalidFieldValue(format!(
                "unknown bundle type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for BundleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// Entry in the bundle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BundleEntry {
    /// Base URL override for this entry
    pub base: Option<String>,

    /// A resource in this bundle
    pub resource: Option<ResourceHandle>,
}

impl BundleEntry {
    pub fn new(resource: ResourceHandle) -> Self {
        Self {
            base: None,
            resource: Some(resource),
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }
}

impl Bundle {
    /// Create a new Bundle with minimal required fields
    pub fn new(bundle_type: BundleType) -> Self {
        Self {
            bundle_type: Some(bundle_type),
            ..Self::default()
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Check if this is a transaction bundle
    pub fn is_transaction(&self) -> bool {
        matches!(self.bundle_type, Some(BundleType::Transaction))
    }

    /// Check if this is a search result bundle
    pub fn is_searchset(&self) -> bool {
        matches!(self.bundle_type, Some(BundleType::Searchset))
    }

    /// Get the number of entries in the bundle
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Get entries as a slice
    pub fn entries(&self) -> &[BundleEntry] {
        &self.entries
    }

    /// Add an entry to the bundle
    pub fn add_entry(&mut self, entry: BundleEntry) {
        self.entries.push(entry);
    }

    /// Wrap a resource in a new entry and add it; returns the shared handle
    pub fn add_resource(&mut self, resource: Resource) -> ResourceHandle {
        let handle = ResourceHandle::new(resource);
        self.entries.push(BundleEntry::new(handle.clone()));
        handle
    }

    /// Resources of all entries that carry one, in entry order
    pub fn resources(&self) -> Vec<ResourceHandle> {
        self.entries
            .iter()
            .filter_map(|e| e.resource.clone())
            .collect()
    }

    /// Base URL to emit on an entry: its explicit override, or else the base
    /// of the entry resource's identifier when that differs from the bundle base.
    pub fn entry_base_url(&self, entry: &BundleEntry) -> Option<String> {
        if let Some(base) = entry.base.as_deref().filter(|b| !b.trim().is_empty()) {
            return Some(base.to_string());
        }
        let resource = entry.resource.as_ref()?;
        let id = resource.id();
        let resource_base = id.base_url()?;
        let bundle_base = self.base.as_deref().map(|b| b.trim_end_matches('/'));
        if bundle_base == Some(resource_base) {
            None
        } else {
            Some(resource_base.to_string())
        }
    }
}

//! Resource identifiers
//!
//! An [`IdType`] is the logical identity of a resource or the target of a
//! reference. It is made of four optional parts,
//! `[base url]/[resource type]/[id]/_history/[version]`, or it is a local
//! anchor (`#id`) that is only meaningful inside the resource declaring it.

use super::error::{Error, Result};
use std::fmt;

const HISTORY_SEGMENT: &str = "/_history/";

/// Logical identifier of a resource.
///
/// Value type: constructed fresh wherever it is needed, never shared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct IdType {
    base_url: Option<String>,
    resource_type: Option<String>,
    id_part: Option<String>,
    version_part: Option<String>,
}

impl IdType {
    /// Parse an identifier from its textual form.
    ///
    /// Accepts absolute (`http://x/Patient/1/_history/2`), relative
    /// (`Patient/1`), bare (`1`) and local (`#1`) forms. Blank input yields an
    /// empty identifier.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() {
            return Self::default();
        }
        if value.starts_with('#') {
            return Self {
                id_part: Some(value.to_string()),
                ..Self::default()
            };
        }

        let (path, version) = match value.find(HISTORY_SEGMENT) {
            Some(idx) => (&value[..idx], Some(&value[idx + HISTORY_SEGMENT.len()..])),
            None => (value, None),
        };

        // Opaque URNs are ids on their own
        if path.starts_with("urn:") {
            return Self {
                id_part: Some(path.to_string()),
                version_part: version.and_then(non_blank),
                ..Self::default()
            };
        }

        let mut segments = path.rsplitn(3, '/');
        let id_part = segments.next().and_then(non_blank);
        let resource_type = segments.next().and_then(non_blank);
        let base_url = segments.next().and_then(non_blank);

        Self {
            base_url,
            resource_type,
            id_part,
            version_part: version.and_then(non_blank),
        }
    }

    /// Build a fully-qualified identifier from its parts.
    ///
    /// A trailing `/` on the base URL is dropped. The resource type and id part
    /// must not be blank.
    pub fn qualified(
        base_url: &str,
        resource_type: &str,
        id_part: &str,
        version_part: Option<&str>,
    ) -> Result<Self> {
        if is_blank(Some(resource_type)) || is_blank(Some(id_part)) {
            return Err(Error::InvalidId(format!(
                "cannot qualify '{}/{}' with base '{}': type and id are required",
                resource_type, id_part, base_url
            )));
        }
        Ok(Self {
            base_url: non_blank(base_url.trim_end_matches('/')),
            resource_type: Some(resource_type.to_string()),
            id_part: Some(id_part.to_string()),
            version_part: version_part.and_then(non_blank),
        })
    }

    /// Build a relative `type/id` identifier.
    pub fn relative(resource_type: &str, id_part: &str) -> Self {
        Self {
            resource_type: non_blank(resource_type),
            id_part: non_blank(id_part),
            ..Self::default()
        }
    }

    /// Build a local anchor, adding the leading `#` when missing.
    pub fn local(anchor: &str) -> Self {
        let anchor = anchor.trim();
        if anchor.is_empty() {
            return Self::default();
        }
        let value = if anchor.starts_with('#') {
            anchor.to_string()
        } else {
            format!("#{}", anchor)
        };
        Self {
            id_part: Some(value),
            ..Self::default()
        }
    }

    /// Bare numeric id, as issued by the contained-resource anchor counter.
    pub fn from_number(value: u64) -> Self {
        Self {
            id_part: Some(value.to_string()),
            ..Self::default()
        }
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.resource_type.as_deref()
    }

    pub fn id_part(&self) -> Option<&str> {
        self.id_part.as_deref()
    }

    pub fn version_part(&self) -> Option<&str> {
        self.version_part.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.base_url.is_none()
            && self.resource_type.is_none()
            && self.id_part.is_none()
            && self.version_part.is_none()
    }

    /// `true` for `#anchor` identifiers.
    pub fn is_local(&self) -> bool {
        self.base_url.is_none()
            && self.resource_type.is_none()
            && self.id_part.as_deref().is_some_and(|id| id.starts_with('#'))
    }

    pub fn has_id_part(&self) -> bool {
        !is_blank(self.id_part.as_deref())
    }

    pub fn has_base_url(&self) -> bool {
        !is_blank(self.base_url.as_deref())
    }

    pub fn has_version(&self) -> bool {
        !is_blank(self.version_part.as_deref())
    }

    /// Drop the base URL, keep type, id and version.
    pub fn to_unqualified(&self) -> Self {
        Self {
            base_url: None,
            ..self.clone()
        }
    }

    /// Drop the base URL and the version.
    pub fn to_unqualified_versionless(&self) -> Self {
        Self {
            base_url: None,
            version_part: None,
            ..self.clone()
        }
    }

    /// Drop the version only.
    pub fn to_versionless(&self) -> Self {
        Self {
            version_part: None,
            ..self.clone()
        }
    }

    pub fn with_version(mut self, version: Option<&str>) -> Self {
        self.version_part = version.and_then(non_blank);
        self
    }

    /// The textual form, or `None` for an empty identifier.
    pub fn value(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self.to_string())
        }
    }

    /// The id part without a leading `#`.
    pub fn anchor_stripped(&self) -> Option<&str> {
        self.id_part().map(|id| id.strip_prefix('#').unwrap_or(id))
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut written = false;
        for part in [&self.base_url, &self.resource_type, &self.id_part]
            .into_iter()
            .flatten()
        {
            if written {
                f.write_str("/")?;
            }
            f.write_str(part)?;
            written = true;
        }
        if let Some(version) = &self.version_part {
            f.write_str(HISTORY_SEGMENT)?;
            f.write_str(version)?;
        }
        Ok(())
    }
}

impl From<&str> for IdType {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

/// `true` when the value is absent or only whitespace.
pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

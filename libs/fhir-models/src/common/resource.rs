//! Resources and resource identity
//!
//! Resources are shared through [`ResourceHandle`]: cloning a handle yields
//! another pointer to the *same* resource, and [`ResourceKey`] exposes that
//! identity so callers can deduplicate by object rather than by content.

use super::element::{Base, Fields, Value};
use super::id::IdType;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::Arc;

/// A resource instance
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    resource_type: String,
    id: IdType,
    /// Version metadata (`meta.versionId`), kept next to the resource it describes
    version: Option<String>,
    fields: Fields,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: IdType::default(),
            version: None,
            fields: Fields::new(),
        }
    }

    /// Builder-style id assignment; accepts any textual id form
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = IdType::parse(id);
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Builder-style append to a slot
    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.push(name, value);
        self
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn id(&self) -> &IdType {
        &self.id
    }

    pub fn set_id(&mut self, id: IdType) {
        self.id = id;
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn set_version(&mut self, version: Option<String>) {
        self.version = version;
    }

    pub fn values(&self, name: &str) -> &[Value] {
        self.fields.get(name)
    }
}

impl Base for Resource {
    fn type_name(&self) -> &str {
        &self.resource_type
    }

    fn fields(&self) -> &Fields {
        &self.fields
    }

    fn fields_mut(&mut self) -> &mut Fields {
        &mut self.fields
    }
}

/// Opaque identity of a resource object.
///
/// Two keys are equal exactly when they were taken from handles to the same
/// resource. A key stays unique only while some handle to the resource is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceKey(usize);

/// Shared, identity-preserving handle to a resource
#[derive(Clone)]
pub struct ResourceHandle(Arc<RwLock<Resource>>);

impl ResourceHandle {
    pub fn new(resource: Resource) -> Self {
        Self(Arc::new(RwLock::new(resource)))
    }

    /// Shared read access. Recursive, so a resource can be read again while
    /// walking a reference cycle that leads back to it.
    pub fn read(&self) -> RwLockReadGuard<'_, Resource> {
        self.0.read_recursive()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Resource> {
        self.0.write()
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey(Arc::as_ptr(&self.0) as *const () as usize)
    }

    pub fn ptr_eq(&self, other: &ResourceHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn resource_type(&self) -> String {
        self.read().resource_type().to_string()
    }

    pub fn id(&self) -> IdType {
        self.read().id().clone()
    }
}

impl From<Resource> for ResourceHandle {
    fn from(resource: Resource) -> Self {
        Self::new(resource)
    }
}

impl PartialEq for ResourceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

// Handles may form cycles, so Debug never descends into the resource
impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_read() {
            Some(resource) => write!(f, "ResourceHandle({}/{})", resource.resource_type(), resource.id()),
            None => f.write_str("ResourceHandle(<locked>)"),
        }
    }
}

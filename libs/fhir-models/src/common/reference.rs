//! Resource references
//!
//! One reference abstraction covers every model generation: a reference may
//! hold reference text (an [`IdType`]), a resolved target resource, or both.

use super::id::IdType;
use super::resource::ResourceHandle;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reference {
    reference: IdType,
    resource: Option<ResourceHandle>,
    display: Option<String>,
}

impl Reference {
    /// A reference carrying only reference text
    pub fn to_text(reference: &str) -> Self {
        Self {
            reference: IdType::parse(reference),
            ..Self::default()
        }
    }

    /// A reference carrying a resolved target object
    pub fn to_resource(resource: ResourceHandle) -> Self {
        Self {
            resource: Some(resource),
            ..Self::default()
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    pub fn reference(&self) -> &IdType {
        &self.reference
    }

    pub fn set_reference(&mut self, reference: IdType) {
        self.reference = reference;
    }

    pub fn resource(&self) -> Option<&ResourceHandle> {
        self.resource.as_ref()
    }

    pub fn set_resource(&mut self, resource: Option<ResourceHandle>) {
        self.resource = resource;
    }

    pub fn display(&self) -> Option<&str> {
        self.display.as_deref()
    }

    /// Neither reference text, target nor display is set
    pub fn is_empty(&self) -> bool {
        self.reference.is_empty() && self.resource.is_none() && self.display.is_none()
    }
}

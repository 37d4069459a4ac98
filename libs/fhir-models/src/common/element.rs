//! Elements, values and primitives
//!
//! Instances are schema-driven: an [`Element`] is a type name plus named value
//! slots. The structure registry decides which slot names exist for a type and
//! which values each slot admits; this module only stores them.

use super::error::{Error, Result};
use super::reference::Reference;
use super::resource::ResourceHandle;
use std::collections::HashMap;

/// Named value slots of an element or resource.
///
/// Every slot is a list; single-valued children simply hold at most one value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(HashMap<String, Vec<Value>>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values in a slot (empty slice when the slot was never populated)
    pub fn get(&self, name: &str) -> &[Value] {
        self.0.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.0.entry(name.into()).or_default().push(value);
    }

    /// Replace the whole slot. An empty list removes it.
    pub fn set(&mut self, name: impl Into<String>, values: Vec<Value>) {
        let name = name.into();
        if values.is_empty() {
            self.0.remove(&name);
        } else {
            self.0.insert(name, values);
        }
    }

    pub fn remove(&mut self, name: &str) -> Vec<Value> {
        self.0.remove(name).unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.get(name).is_some_and(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    /// Populated slot names, in no particular order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(name, _)| name.as_str())
    }
}

/// Anything with a type name and value slots: composite elements and resources.
pub trait Base {
    fn type_name(&self) -> &str;
    fn fields(&self) -> &Fields;
    fn fields_mut(&mut self) -> &mut Fields;
}

/// A composite datatype instance (or a backbone element such as `Bundle.entry`)
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    type_name: String,
    fields: Fields,
}

impl Element {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Fields::new(),
        }
    }

    /// Builder-style append to a slot
    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.push(name, value);
        self
    }

    pub fn values(&self, name: &str) -> &[Value] {
        self.fields.get(name)
    }
}

impl Base for Element {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn fields(&self) -> &Fields {
        &self.fields
    }

    fn fields_mut(&mut self) -> &mut Fields {
        &mut self.fields
    }
}

/// A single value held in a slot
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Primitive(Primitive),
    Composite(Element),
    Reference(Reference),
    /// An inline resource (bundle entry, operation parameter, contained list)
    Resource(ResourceHandle),
}

impl Value {
    /// Name of the concrete type carried by this value.
    ///
    /// References report `Reference`; the registry maps that onto whichever
    /// reference datatype the active model generation declares.
    pub fn type_name(&self) -> String {
        match self {
            Value::Primitive(p) => p.type_name().to_string(),
            Value::Composite(e) => e.type_name().to_string(),
            Value::Reference(_) => "Reference".to_string(),
            Value::Resource(r) => r.resource_type(),
        }
    }

    pub fn as_primitive(&self) -> Option<&Primitive> {
        match self {
            Value::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&Element> {
        match self {
            Value::Composite(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&ResourceHandle> {
        match self {
            Value::Resource(r) => Some(r),
            _ => None,
        }
    }
}

impl From<Primitive> for Value {
    fn from(value: Primitive) -> Self {
        Value::Primitive(value)
    }
}

impl From<Element> for Value {
    fn from(value: Element) -> Self {
        Value::Composite(value)
    }
}

impl From<Reference> for Value {
    fn from(value: Reference) -> Self {
        Value::Reference(value)
    }
}

impl From<ResourceHandle> for Value {
    fn from(value: ResourceHandle) -> Self {
        Value::Resource(value)
    }
}

/// A primitive value kept in its string form, tagged with its FHIR type name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Primitive {
    type_name: String,
    value: String,
}

impl Primitive {
    pub fn new(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            value: value.into(),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new("string", value)
    }

    pub fn uri(value: impl Into<String>) -> Self {
        Self::new("uri", value)
    }

    pub fn code(value: impl Into<String>) -> Self {
        Self::new("code", value)
    }

    pub fn boolean(value: bool) -> Self {
        Self::new("boolean", value.to_string())
    }

    pub fn integer(value: i64) -> Self {
        Self::new("integer", value.to_string())
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn value_as_string(&self) -> &str {
        &self.value
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self.value.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(Error::InvalidFieldValue(format!(
                "'{}' is not a valid {}",
                other, self.type_name
            ))),
        }
    }

    pub fn as_integer(&self) -> Result<i64> {
        self.value.parse().map_err(|_| {
            Error::InvalidFieldValue(format!("'{}' is not a valid {}", self.value, self.type_name))
        })
    }
}

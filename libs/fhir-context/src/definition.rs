//! Element and child definitions
//!
//! The registry describes every type as an [`ElementDefinition`]; composite
//! types and resources own an ordered list of [`ChildDefinition`]s. A child
//! hands out an [`Accessor`] and a [`Mutator`] so callers can read and write
//! slot values on any instance without knowing its concrete type.

use crate::error::{DataFormatError, Result};
use ferrite_models::{Base, Value};
use heck::ToUpperCamelCase;
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the abstract resource type every resource conforms to
pub const RESOURCE_TYPE: &str = "Resource";

/// Name used for the contained-resources pseudo-element
pub const CONTAINED_ELEMENT: &str = "contained";

/// What kind of structure an [`ElementDefinition`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Primitive,
    Composite,
    Resource,
    /// The reference datatype of the active model generation
    Reference,
    /// Pseudo-element standing for a resource's contained list
    ContainedResources,
}

/// How the active model generation stores contained resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainedRepresentation {
    /// A wrapper composite whose repeating child holds the resources
    Wrapped {
        type_name: Arc<str>,
        child_name: Arc<str>,
    },
    /// A bare list of resources
    Bare,
}

/// Cardinality of a child slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cardinality {
    pub min: u32,
    pub max: Option<u32>, // None = unbounded
}

impl Cardinality {
    pub const ZERO_TO_ONE: Cardinality = Cardinality {
        min: 0,
        max: Some(1),
    };

    pub const ZERO_TO_MANY: Cardinality = Cardinality { min: 0, max: None };

    pub const ONE_TO_ONE: Cardinality = Cardinality {
        min: 1,
        max: Some(1),
    };

    pub const ONE_TO_MANY: Cardinality = Cardinality { min: 1, max: None };

    pub fn is_repeating(&self) -> bool {
        self.max.map_or(true, |max| max > 1)
    }
}

/// Structural description of one type.
#[derive(Debug, Clone)]
pub struct ElementDefinition {
    name: Arc<str>,
    kind: ElementKind,
    is_abstract: bool,
    children: Vec<ChildDefinition>,
    /// Every valid element name (choice expansions included) -> child index
    child_index: HashMap<String, usize>,
    contained: Option<ContainedRepresentation>,
}

/// A resource type's definition; same shape as any composite definition.
pub type ResourceDefinition = ElementDefinition;

impl ElementDefinition {
    pub(crate) fn new(
        name: Arc<str>,
        kind: ElementKind,
        is_abstract: bool,
        children: Vec<ChildDefinition>,
    ) -> Self {
        let mut child_index = HashMap::new();
        for (idx, child) in children.iter().enumerate() {
            child_index.insert(child.element_name.to_string(), idx);
            for (valid_name, _) in &child.valid_names {
                child_index.insert(valid_name.clone(), idx);
            }
        }
        Self {
            name,
            kind,
            is_abstract,
            children,
            child_index,
            contained: None,
        }
    }

    pub(crate) fn contained_pseudo(representation: ContainedRepresentation) -> Self {
        Self {
            name: Arc::from(CONTAINED_ELEMENT),
            kind: ElementKind::ContainedResources,
            is_abstract: false,
            children: Vec::new(),
            child_index: HashMap::new(),
            contained: Some(representation),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn is_resource(&self) -> bool {
        self.kind == ElementKind::Resource
    }

    /// Children in declaration order
    pub fn children(&self) -> &[ChildDefinition] {
        &self.children
    }

    /// Look up a child by element name, including choice expansions
    /// (`value[x]` and `valueQuantity` both find the same child).
    pub fn child_by_name(&self, name: &str) -> Result<&ChildDefinition> {
        self.find_child(name).ok_or_else(|| {
            DataFormatError::UnknownElement {
                owner: self.name.to_string(),
                name: name.to_string(),
            }
            .into()
        })
    }

    pub fn find_child(&self, name: &str) -> Option<&ChildDefinition> {
        self.child_index.get(name).map(|&idx| &self.children[idx])
    }

    /// The contained-list representation, for the contained pseudo-element only
    pub fn contained_representation(&self) -> Option<&ContainedRepresentation> {
        self.contained.as_ref()
    }
}

/// Shape of a child slot as declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildKind {
    /// One declared type
    Declared { type_name: Arc<str> },
    /// Polymorphic slot (`value[x]`) admitting several concrete types
    Choice { types: Vec<Arc<str>> },
    /// The resource's contained list
    ContainedResources,
}

/// One type the slot admits, resolved at seal time
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AdmissibleType {
    pub(crate) name: Arc<str>,
    pub(crate) kind: ElementKind,
    pub(crate) is_abstract: bool,
}

impl AdmissibleType {
    fn admits(&self, value: &Value) -> bool {
        match (self.kind, value) {
            (ElementKind::Primitive, Value::Primitive(p)) => p.type_name() == &*self.name,
            (ElementKind::Composite, Value::Composite(e)) => e.type_name() == &*self.name,
            (ElementKind::Reference, Value::Reference(_)) => true,
            (ElementKind::Resource, Value::Resource(r)) => {
                self.is_abstract || r.resource_type() == &*self.name
            }
            _ => false,
        }
    }
}

/// A named relation from an owning type to its value type(s).
#[derive(Debug, Clone)]
pub struct ChildDefinition {
    element_name: Arc<str>,
    kind: ChildKind,
    cardinality: Cardinality,
    /// (element name, type name) pairs; one per type for choice slots
    valid_names: Vec<(String, Arc<str>)>,
    admissible: Vec<AdmissibleType>,
}

impl ChildDefinition {
    pub(crate) fn sealed(
        element_name: Arc<str>,
        kind: ChildKind,
        cardinality: Cardinality,
        admissible: Vec<AdmissibleType>,
    ) -> Self {
        let valid_names = match &kind {
            ChildKind::Choice { .. } => {
                let prefix = element_name.trim_end_matches("[x]");
                admissible
                    .iter()
                    .map(|ty| {
                        let suffix = if ty.kind == ElementKind::Reference {
                            "Reference".to_string()
                        } else {
                            ty.name.to_upper_camel_case()
                        };
                        (format!("{}{}", prefix, suffix), ty.name.clone())
                    })
                    .collect()
            }
            _ => admissible
                .iter()
                .map(|ty| (element_name.to_string(), ty.name.clone()))
                .collect(),
        };

        Self {
            element_name,
            kind,
            cardinality,
            valid_names,
            admissible,
        }
    }

    /// Declared element name (`value[x]` for choice slots)
    pub fn element_name(&self) -> &str {
        &self.element_name
    }

    /// Key under which instances store this slot's values
    pub fn slot(&self) -> &str {
        self.element_name.trim_end_matches("[x]")
    }

    pub fn kind(&self) -> &ChildKind {
        &self.kind
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn is_choice(&self) -> bool {
        matches!(self.kind, ChildKind::Choice { .. })
    }

    pub fn is_contained(&self) -> bool {
        matches!(self.kind, ChildKind::ContainedResources)
    }

    /// All element names this child answers to
    pub fn valid_child_names(&self) -> impl Iterator<Item = &str> {
        self.valid_names.iter().map(|(name, _)| name.as_str())
    }

    /// Names of the admissible types, in declaration order
    pub fn valid_child_types(&self) -> Vec<String> {
        self.admissible.iter().map(|ty| ty.name.to_string()).collect()
    }

    /// Concrete type behind one of this child's element names
    pub fn type_for_name(&self, name: &str) -> Option<&str> {
        self.valid_names
            .iter()
            .find(|(valid, _)| valid == name)
            .map(|(_, ty)| &**ty)
    }

    /// Element name under which a value of this concrete type is written.
    pub fn name_for_value(&self, value: &Value) -> Result<&str> {
        let idx = self.admissible_index(value)?;
        Ok(&self.valid_names[idx].0)
    }

    pub fn admits(&self, value: &Value) -> bool {
        self.admissible.iter().any(|ty| ty.admits(value))
    }

    pub(crate) fn admissible_index(&self, value: &Value) -> Result<usize> {
        self.admissible
            .iter()
            .position(|ty| ty.admits(value))
            .ok_or_else(|| self.invalid_type(&value.type_name()).into())
    }

    /// Diagnostic for a value whose type this slot does not admit
    pub fn invalid_type(&self, type_name: &str) -> DataFormatError {
        DataFormatError::InvalidChildType {
            element: self.element_name.to_string(),
            type_name: type_name.to_string(),
            expected: if self.is_choice() {
                self.valid_child_types()
            } else {
                Vec::new()
            },
        }
    }

    pub fn accessor(&self) -> Accessor<'_> {
        Accessor { child: self }
    }

    pub fn mutator(&self) -> Mutator<'_> {
        Mutator { child: self }
    }
}

/// Read capability for one child slot
#[derive(Debug, Clone, Copy)]
pub struct Accessor<'d> {
    child: &'d ChildDefinition,
}

impl<'d> Accessor<'d> {
    pub fn values<'t>(&self, target: &'t dyn Base) -> &'t [Value] {
        target.fields().get(self.child.slot())
    }

    pub fn first_value<'t>(&self, target: &'t dyn Base) -> Option<&'t Value> {
        self.values(target).first()
    }

    pub fn is_populated(&self, target: &dyn Base) -> bool {
        !self.values(target).is_empty()
    }
}

/// Write capability for one child slot.
///
/// Every write is checked against the slot's admissible types.
#[derive(Debug, Clone, Copy)]
pub struct Mutator<'d> {
    child: &'d ChildDefinition,
}

impl<'d> Mutator<'d> {
    /// Append a value. Single-valued slots are overwritten instead.
    pub fn add_value(&self, target: &mut dyn Base, value: Value) -> Result<()> {
        self.child.admissible_index(&value)?;
        let slot = self.child.slot();
        if self.child.cardinality.is_repeating() {
            target.fields_mut().push(slot, value);
        } else {
            target.fields_mut().set(slot, vec![value]);
        }
        Ok(())
    }

    /// Replace the slot with at most one value
    pub fn set_value(&self, target: &mut dyn Base, value: Option<Value>) -> Result<()> {
        self.set_values(target, value.into_iter().collect())
    }

    /// Replace the whole slot
    pub fn set_values(&self, target: &mut dyn Base, values: Vec<Value>) -> Result<()> {
        if let Some(max) = self.child.cardinality.max {
            if values.len() > max as usize {
                return Err(DataFormatError::TooManyValues {
                    element: self.child.element_name.to_string(),
                    max,
                }
                .into());
            }
        }
        for value in &values {
            self.child.admissible_index(value)?;
        }
        target.fields_mut().set(self.child.slot(), values);
        Ok(())
    }
}

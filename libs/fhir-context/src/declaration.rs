//! Declarative type schema
//!
//! Model generations describe their types with [`TypeDecl`] and [`ChildDecl`].
//! Declarations refer to other types by name only; the registry resolves and
//! checks those names when it seals.

use crate::definition::{Cardinality, ElementKind};

/// Declaration of one type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub(crate) name: String,
    pub(crate) kind: ElementKind,
    pub(crate) is_abstract: bool,
    pub(crate) children: Vec<ChildDecl>,
}

impl TypeDecl {
    fn new(name: &str, kind: ElementKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            is_abstract: false,
            children: Vec::new(),
        }
    }

    pub fn primitive(name: &str) -> Self {
        Self::new(name, ElementKind::Primitive)
    }

    pub fn composite(name: &str) -> Self {
        Self::new(name, ElementKind::Composite)
    }

    pub fn reference(name: &str) -> Self {
        Self::new(name, ElementKind::Reference)
    }

    pub fn resource(name: &str) -> Self {
        Self::new(name, ElementKind::Resource)
    }

    /// A resource that carries narrative text and a contained list ahead of
    /// its own children
    pub fn domain_resource(name: &str, narrative_type: &str) -> Self {
        Self::resource(name)
            .child(ChildDecl::new("text", narrative_type))
            .child(ChildDecl::contained())
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn child(mut self, child: ChildDecl) -> Self {
        self.children.push(child);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }
}

/// Declaration of one child slot
#[derive(Debug, Clone, PartialEq)]
pub struct ChildDecl {
    pub(crate) name: String,
    pub(crate) shape: ChildShape,
    pub(crate) cardinality: Cardinality,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ChildShape {
    Single(String),
    Choice(Vec<String>),
    Contained,
}

impl ChildDecl {
    /// Optional single-valued child of one type
    pub fn new(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            shape: ChildShape::Single(type_name.to_string()),
            cardinality: Cardinality::ZERO_TO_ONE,
        }
    }

    /// Polymorphic `name[x]` child
    pub fn choice(name: &str, types: &[&str]) -> Self {
        let name = if name.ends_with("[x]") {
            name.to_string()
        } else {
            format!("{}[x]", name)
        };
        Self {
            name,
            shape: ChildShape::Choice(types.iter().map(|t| t.to_string()).collect()),
            cardinality: Cardinality::ZERO_TO_ONE,
        }
    }

    /// The contained-resources slot; its concrete shape comes from the model
    /// generation at seal time
    pub fn contained() -> Self {
        Self {
            name: crate::definition::CONTAINED_ELEMENT.to_string(),
            shape: ChildShape::Contained,
            cardinality: Cardinality::ZERO_TO_MANY,
        }
    }

    pub fn many(mut self) -> Self {
        self.cardinality = Cardinality::ZERO_TO_MANY;
        self
    }

    pub fn required(mut self) -> Self {
        self.cardinality = Cardinality::ONE_TO_ONE;
        self
    }

    pub fn cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }
}

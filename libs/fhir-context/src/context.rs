//! Structure registry
//!
//! [`FhirContext`] is built from the type declarations of one model generation
//! and sealed in a single pass: every child is resolved against the declared
//! types, choice slots are expanded, and the contained-resources slot is bound
//! to the representation the generation uses. A sealed context is immutable
//! and can be shared freely across threads.

use crate::declaration::{ChildShape, TypeDecl};
use crate::definition::{
    AdmissibleType, Cardinality, ChildDefinition, ChildKind, ContainedRepresentation,
    ElementDefinition, ElementKind, ResourceDefinition, RESOURCE_TYPE,
};
use crate::error::{DataFormatError, Error, Result};
use crate::version::{FhirVersion, FhirVersionId};
use ferrite_models::{Element, Resource, ResourceHandle, Value};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

static DSTU1_CONTEXT: OnceCell<Arc<FhirContext>> = OnceCell::new();
static DSTU2_CONTEXT: OnceCell<Arc<FhirContext>> = OnceCell::new();

/// Sealed structure registry for one model generation
#[derive(Debug)]
pub struct FhirContext {
    version: Arc<dyn FhirVersion>,
    definitions: HashMap<String, ElementDefinition>,
    resource_names: Vec<String>,
    contained: ElementDefinition,
    reference_type: Arc<str>,
}

impl FhirContext {
    /// Build and seal a private registry for `version`
    pub fn new(version: Arc<dyn FhirVersion>) -> Result<Self> {
        let decls = version.type_declarations();
        let sealed = Sealer::new(&decls)?.seal(version.contained_type())?;

        let mut resource_names: Vec<String> = sealed
            .definitions
            .values()
            .filter(|d| d.is_resource() && !d.is_abstract())
            .map(|d| d.name().to_string())
            .collect();
        resource_names.sort();

        debug!(
            version = version.name(),
            types = sealed.definitions.len(),
            resources = resource_names.len(),
            contained = ?sealed.representation,
            "Sealed structure registry"
        );

        Ok(Self {
            version,
            definitions: sealed.definitions,
            resource_names,
            contained: ElementDefinition::contained_pseudo(sealed.representation),
            reference_type: sealed.reference_type,
        })
    }

    /// Process-wide registry for a built-in generation, built on first use
    pub fn for_version(id: FhirVersionId) -> Result<Arc<FhirContext>> {
        let cell = match id {
            FhirVersionId::Dstu1 => &DSTU1_CONTEXT,
            FhirVersionId::Dstu2 => &DSTU2_CONTEXT,
        };
        cell.get_or_try_init(|| FhirContext::new(id.definition()).map(Arc::new))
            .cloned()
    }

    pub fn version(&self) -> &dyn FhirVersion {
        self.version.as_ref()
    }

    /// Definition of a registered type
    pub fn definition_for(&self, type_name: &str) -> Result<&ElementDefinition> {
        self.definitions.get(type_name).ok_or_else(|| {
            Error::Configuration(format!(
                "Unknown type '{}' for FHIR version {}",
                type_name,
                self.version.name()
            ))
        })
    }

    /// Definition of a composite datatype met in instance data.
    ///
    /// Unlike [`definition_for`](Self::definition_for), a miss here is a data
    /// problem and not a broken registry.
    pub fn datatype_definition(&self, type_name: &str) -> Result<&ElementDefinition> {
        self.definitions
            .get(type_name)
            .ok_or_else(|| DataFormatError::UnknownDatatype(type_name.to_string()).into())
    }

    /// Definition matching a concrete resource instance
    pub fn resource_definition(&self, resource: &Resource) -> Result<&ResourceDefinition> {
        self.resource_definition_by_name(resource.resource_type())
    }

    /// Definition of a concrete resource type, as named in instance data
    pub fn resource_definition_by_name(&self, name: &str) -> Result<&ResourceDefinition> {
        match self.definitions.get(name) {
            Some(def) if def.is_resource() && !def.is_abstract() => Ok(def),
            _ => Err(DataFormatError::UnknownResourceType(name.to_string()).into()),
        }
    }

    /// Concrete resource type names, sorted
    pub fn resource_types(&self) -> &[String] {
        &self.resource_names
    }

    /// Definition of the type stored under `name` in `child`
    pub fn element_for_child(
        &self,
        child: &ChildDefinition,
        name: &str,
    ) -> Result<&ElementDefinition> {
        if child.is_contained() {
            return Ok(&self.contained);
        }
        let type_name = child.type_for_name(name).ok_or_else(|| {
            Error::from(DataFormatError::UnknownElement {
                owner: child.element_name().to_string(),
                name: name.to_string(),
            })
        })?;
        self.definition_for(type_name)
    }

    /// The contained-resources pseudo-element
    pub fn contained_definition(&self) -> &ElementDefinition {
        &self.contained
    }

    pub fn contained_representation(&self) -> &ContainedRepresentation {
        // contained_pseudo always carries a representation
        self.contained
            .contained_representation()
            .unwrap_or(&ContainedRepresentation::Bare)
    }

    /// Name of this generation's reference datatype
    pub fn reference_type_name(&self) -> &str {
        &self.reference_type
    }

    /// Empty instance of a concrete resource type
    pub fn new_resource(&self, name: &str) -> Result<Resource> {
        let def = self.resource_definition_by_name(name)?;
        Ok(Resource::new(def.name()))
    }

    /// Resources declared in `resource`'s contained list, in order
    pub fn contained_resources(&self, resource: &Resource) -> Result<Vec<ResourceHandle>> {
        let def = self.resource_definition(resource)?;
        let Some(child) = def.children().iter().find(|c| c.is_contained()) else {
            return Ok(Vec::new());
        };

        let values = child.accessor().values(resource);
        let handles = match self.contained_representation() {
            ContainedRepresentation::Bare => values
                .iter()
                .filter_map(|v| v.as_resource().cloned())
                .collect(),
            ContainedRepresentation::Wrapped { child_name, .. } => values
                .iter()
                .filter_map(Value::as_composite)
                .flat_map(|wrapper| wrapper.values(child_name))
                .filter_map(|v| v.as_resource().cloned())
                .collect(),
        };
        Ok(handles)
    }

    /// Replace `resource`'s contained list
    pub fn set_contained_resources(
        &self,
        resource: &mut Resource,
        contained: Vec<ResourceHandle>,
    ) -> Result<()> {
        let def = self.resource_definition(resource)?;
        let Some(child) = def.children().iter().find(|c| c.is_contained()) else {
            if contained.is_empty() {
                return Ok(());
            }
            return Err(DataFormatError::UnknownElement {
                owner: def.name().to_string(),
                name: crate::definition::CONTAINED_ELEMENT.to_string(),
            }
            .into());
        };

        let values: Vec<Value> = contained.into_iter().map(Value::Resource).collect();
        match self.contained_representation() {
            ContainedRepresentation::Bare => child.mutator().set_values(resource, values),
            ContainedRepresentation::Wrapped {
                type_name,
                child_name,
            } => {
                if values.is_empty() {
                    return child.mutator().set_values(resource, Vec::new());
                }
                let mut wrapper = Element::new(type_name.to_string());
                self.definition_for(type_name)?
                    .child_by_name(child_name)?
                    .mutator()
                    .set_values(&mut wrapper, values)?;
                child
                    .mutator()
                    .set_value(resource, Some(Value::Composite(wrapper)))
            }
        }
    }
}

struct Sealed {
    definitions: HashMap<String, ElementDefinition>,
    representation: ContainedRepresentation,
    reference_type: Arc<str>,
}

/// One-shot resolver turning declarations into sealed definitions
struct Sealer<'a> {
    decls: HashMap<&'a str, &'a TypeDecl>,
    order: Vec<&'a TypeDecl>,
}

impl<'a> Sealer<'a> {
    fn new(decls: &'a [TypeDecl]) -> Result<Self> {
        let mut index = HashMap::with_capacity(decls.len());
        for decl in decls {
            if index.insert(decl.name(), decl).is_some() {
                return Err(Error::Configuration(format!(
                    "Type '{}' is declared more than once",
                    decl.name()
                )));
            }
        }
        Ok(Self {
            decls: index,
            order: decls.iter().collect(),
        })
    }

    fn seal(self, contained_type: &str) -> Result<Sealed> {
        let reference_type = self.reference_type()?;
        let representation = self.contained_representation(contained_type)?;

        let mut definitions = HashMap::with_capacity(self.order.len());
        for decl in &self.order {
            let children = decl
                .children
                .iter()
                .map(|child| self.seal_child(decl, child, &representation))
                .collect::<Result<Vec<_>>>()?;
            let name: Arc<str> = Arc::from(decl.name());
            definitions.insert(
                decl.name().to_string(),
                ElementDefinition::new(name, decl.kind, decl.is_abstract, children),
            );
        }

        Ok(Sealed {
            definitions,
            representation,
            reference_type,
        })
    }

    fn reference_type(&self) -> Result<Arc<str>> {
        let mut refs = self
            .order
            .iter()
            .filter(|d| d.kind == ElementKind::Reference);
        match (refs.next(), refs.next()) {
            (Some(decl), None) => Ok(Arc::from(decl.name())),
            (None, _) => Err(Error::Configuration(
                "FHIR version definition declares no reference type".to_string(),
            )),
            (Some(a), Some(b)) => Err(Error::Configuration(format!(
                "FHIR version definition declares more than one reference type: {}, {}",
                a.name(),
                b.name()
            ))),
        }
    }

    fn contained_representation(&self, contained_type: &str) -> Result<ContainedRepresentation> {
        let invalid = || {
            Error::Configuration(format!(
                "FHIR version definition returned invalid contained type: {}",
                contained_type
            ))
        };
        let decl = self.decls.get(contained_type).ok_or_else(invalid)?;

        match decl.kind {
            ElementKind::Resource if decl.is_abstract => Ok(ContainedRepresentation::Bare),
            ElementKind::Composite => match decl.children.as_slice() {
                [child] if child.cardinality.is_repeating() => match &child.shape {
                    ChildShape::Single(ty) if self.is_resource_type(ty) => {
                        Ok(ContainedRepresentation::Wrapped {
                            type_name: Arc::from(decl.name()),
                            child_name: Arc::from(child.name.as_str()),
                        })
                    }
                    _ => Err(invalid()),
                },
                _ => Err(invalid()),
            },
            _ => Err(invalid()),
        }
    }

    fn is_resource_type(&self, name: &str) -> bool {
        self.decls
            .get(name)
            .is_some_and(|d| d.kind == ElementKind::Resource)
    }

    fn admissible(&self, owner: &TypeDecl, child: &str, type_name: &str) -> Result<AdmissibleType> {
        let decl = self.decls.get(type_name).ok_or_else(|| {
            Error::Configuration(format!(
                "{}.{} refers to undeclared type '{}'",
                owner.name(),
                child,
                type_name
            ))
        })?;
        Ok(AdmissibleType {
            name: Arc::from(decl.name()),
            kind: decl.kind,
            is_abstract: decl.is_abstract,
        })
    }

    fn seal_child(
        &self,
        owner: &TypeDecl,
        child: &crate::declaration::ChildDecl,
        representation: &ContainedRepresentation,
    ) -> Result<ChildDefinition> {
        let name: Arc<str> = Arc::from(child.name.as_str());
        let child_def = match &child.shape {
            ChildShape::Single(ty) => {
                let admissible = self.admissible(owner, &child.name, ty)?;
                ChildDefinition::sealed(
                    name,
                    ChildKind::Declared {
                        type_name: admissible.name.clone(),
                    },
                    child.cardinality,
                    vec![admissible],
                )
            }
            ChildShape::Choice(types) => {
                let admissible = types
                    .iter()
                    .map(|ty| self.admissible(owner, &child.name, ty))
                    .collect::<Result<Vec<_>>>()?;
                ChildDefinition::sealed(
                    name,
                    ChildKind::Choice {
                        types: admissible.iter().map(|a| a.name.clone()).collect(),
                    },
                    child.cardinality,
                    admissible,
                )
            }
            ChildShape::Contained => {
                let (holder, cardinality) = match representation {
                    ContainedRepresentation::Bare => (RESOURCE_TYPE, Cardinality::ZERO_TO_MANY),
                    ContainedRepresentation::Wrapped { type_name, .. } => {
                        (&**type_name, Cardinality::ZERO_TO_ONE)
                    }
                };
                let admissible = self.admissible(owner, &child.name, holder)?;
                ChildDefinition::sealed(
                    name,
                    ChildKind::ContainedResources,
                    cardinality,
                    vec![admissible],
                )
            }
        };
        Ok(child_def)
    }
}

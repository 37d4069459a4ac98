//! FHIR structure registry
//!
//! Describes, for every type of a model generation, its children, choice slots
//! and read/write capabilities, independent of any wire syntax. Parsers drive
//! encode and decode entirely through this registry.
//!
//! # Example
//!
//! ```rust
//! use ferrite_context::{FhirContext, FhirVersionId};
//! use ferrite_models::{Primitive, Resource};
//!
//! let ctx = FhirContext::for_version(FhirVersionId::Dstu2)?;
//! let patient = ctx.definition_for("Patient")?;
//! let gender = patient.child_by_name("gender")?;
//!
//! let mut instance = Resource::new("Patient");
//! gender.mutator().add_value(&mut instance, Primitive::code("female").into())?;
//! assert!(gender.accessor().is_populated(&instance));
//! # Ok::<(), ferrite_context::Error>(())
//! ```

pub mod context;
pub mod declaration;
pub mod definition;
pub mod error;
pub mod version;
mod walk;

pub use context::FhirContext;
pub use declaration::{ChildDecl, TypeDecl};
pub use definition::{
    Accessor, Cardinality, ChildDefinition, ChildKind, ContainedRepresentation,
    ElementDefinition, ElementKind, Mutator, ResourceDefinition, CONTAINED_ELEMENT, RESOURCE_TYPE,
};
pub use error::{DataFormatError, Error, Result};
pub use version::{Dstu1, Dstu2, FhirVersion, FhirVersionId};

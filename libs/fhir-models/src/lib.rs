//! FHIR instance model
//!
//! This crate provides the runtime representation of FHIR resources that the
//! structure registry (`ferrite-context`) describes and the parser engine
//! (`ferrite-format`) reads and writes.
//!
//! # Module Organization
//!
//! - `common`: Version-agnostic instance types shared by every model generation
//!
//! # Design Philosophy
//!
//! - **Schema-driven**: instances carry a type name and named value slots; which
//!   slots exist and what they admit is owned by the structure registry
//! - **Identity-preserving**: resources live behind a [`ResourceHandle`] so two
//!   references can point at the *same* resource object
//! - **Explicit version metadata**: a resource's version travels on the resource
//!   itself rather than in an out-of-band metadata map
//!
//! # Example
//!
//! ```rust
//! use ferrite_models::{IdType, Primitive, Reference, Resource, ResourceHandle, Value};
//!
//! let patient = ResourceHandle::new(Resource::new("Patient"));
//! let observation = Resource::new("Observation")
//!     .with_id("obs-1")
//!     .with_value("status", Value::Primitive(Primitive::code("final")))
//!     .with_value("subject", Value::Reference(Reference::to_resource(patient.clone())));
//!
//! assert_eq!(observation.id().id_part(), Some("obs-1"));
//! assert!(IdType::parse("#1").is_local());
//! ```

pub mod common;

// Re-export commonly used types
pub use common::*;

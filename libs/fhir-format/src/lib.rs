//! FHIR parser engine
//!
//! Format-independent encode and decode orchestration on top of the structure
//! registry. The engine:
//! - Collects the resources a resource contains before it is written, keyed by
//!   object identity, with `#1`, `#2`, ... anchors issued in encounter order.
//! - Renders reference text against the contained table and the configured
//!   server base URL.
//! - Qualifies the ids of decoded bundle entries with the bundle or entry base.
//!
//! [`JsonParser`] is the bundled wire format.
//!
//! # Example
//!
//! ```rust
//! use ferrite_context::{FhirContext, FhirVersionId};
//! use ferrite_format::{JsonParser, Parser};
//! use ferrite_models::{Reference, Resource, ResourceHandle};
//!
//! let parser = JsonParser::new(FhirContext::for_version(FhirVersionId::Dstu2)?);
//! let org = ResourceHandle::new(Resource::new("Organization"));
//! let patient = ResourceHandle::new(
//!     Resource::new("Patient")
//!         .with_value("managingOrganization", Reference::to_resource(org).into()),
//! );
//!
//! let json = parser.encode_resource_to_string(&patient)?;
//! assert!(json.contains(r##""reference":"#1""##));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bundle;
pub mod contained;
pub mod error;
pub mod json;
pub mod options;
pub mod parser;
pub mod run;

pub use bundle::{bundle_to_resource, normalize_bundle_ids, resource_to_bundle};
pub use contained::ContainedResources;
pub use error::{FormatError, Result};
pub use json::JsonParser;
pub use options::ParserOptions;
pub use parser::Parser;
pub use run::EncodeRun;

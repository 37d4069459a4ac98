//! FHIR model generations
//!
//! A generation supplies the type declarations the registry is built from and
//! names the type that holds contained resources. The two built-in generations
//! share one catalogue and differ in the reference datatype name and in how the
//! contained list is represented.

use crate::declaration::{ChildDecl, TypeDecl};
use crate::definition::RESOURCE_TYPE;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A model generation the registry can be built for
pub trait FhirVersion: fmt::Debug + Send + Sync {
    /// Human-readable generation name
    fn name(&self) -> &str;

    /// Name of the type that holds contained resources.
    ///
    /// Must be either the abstract resource type (bare list) or a composite
    /// with a single repeating resource child (wrapped list).
    fn contained_type(&self) -> &str;

    /// Every type of this generation
    fn type_declarations(&self) -> Vec<TypeDecl>;
}

/// Built-in model generations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FhirVersionId {
    Dstu1,
    Dstu2,
}

impl FhirVersionId {
    pub fn as_str(&self) -> &'static str {
        match self {
            FhirVersionId::Dstu1 => "DSTU1",
            FhirVersionId::Dstu2 => "DSTU2",
        }
    }

    pub fn definition(&self) -> Arc<dyn FhirVersion> {
        match self {
            FhirVersionId::Dstu1 => Arc::new(Dstu1),
            FhirVersionId::Dstu2 => Arc::new(Dstu2),
        }
    }
}

impl fmt::Display for FhirVersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FhirVersionId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DSTU1" | "0.0.82" => Ok(FhirVersionId::Dstu1),
            "DSTU2" | "1.0.2" => Ok(FhirVersionId::Dstu2),
            _ => Err(crate::Error::Configuration(format!(
                "Unsupported FHIR version: {}",
                s
            ))),
        }
    }
}

/// First generation: `ResourceReference` datatype, contained resources held
/// in a `ContainedDt` wrapper
#[derive(Debug, Clone, Copy, Default)]
pub struct Dstu1;

pub const DSTU1_CONTAINED_TYPE: &str = "ContainedDt";

impl FhirVersion for Dstu1 {
    fn name(&self) -> &str {
        FhirVersionId::Dstu1.as_str()
    }

    fn contained_type(&self) -> &str {
        DSTU1_CONTAINED_TYPE
    }

    fn type_declarations(&self) -> Vec<TypeDecl> {
        let mut decls = catalogue("ResourceReference");
        decls.push(
            TypeDecl::composite(DSTU1_CONTAINED_TYPE)
                .child(ChildDecl::new("resource", RESOURCE_TYPE).many()),
        );
        decls
    }
}

/// Second generation: `Reference` datatype, contained resources held as a
/// bare list
#[derive(Debug, Clone, Copy, Default)]
pub struct Dstu2;

impl FhirVersion for Dstu2 {
    fn name(&self) -> &str {
        FhirVersionId::Dstu2.as_str()
    }

    fn contained_type(&self) -> &str {
        RESOURCE_TYPE
    }

    fn type_declarations(&self) -> Vec<TypeDecl> {
        catalogue("Reference")
    }
}

const PRIMITIVES: &[&str] = &[
    "string", "uri", "code", "id", "boolean", "integer", "decimal", "date", "dateTime", "instant",
];

/// Types shared by the built-in generations
pub fn catalogue(reference: &str) -> Vec<TypeDecl> {
    let mut decls: Vec<TypeDecl> = PRIMITIVES.iter().map(|p| TypeDecl::primitive(p)).collect();

    decls.push(TypeDecl::reference(reference));

    decls.extend([
        TypeDecl::composite("Coding")
            .child(ChildDecl::new("system", "uri"))
            .child(ChildDecl::new("code", "code"))
            .child(ChildDecl::new("display", "string")),
        TypeDecl::composite("CodeableConcept")
            .child(ChildDecl::new("coding", "Coding").many())
            .child(ChildDecl::new("text", "string")),
        TypeDecl::composite("Identifier")
            .child(ChildDecl::new("system", "uri"))
            .child(ChildDecl::new("value", "string")),
        TypeDecl::composite("HumanName")
            .child(ChildDecl::new("text", "string"))
            .child(ChildDecl::new("family", "string").many())
            .child(ChildDecl::new("given", "string").many()),
        TypeDecl::composite("Quantity")
            .child(ChildDecl::new("value", "decimal"))
            .child(ChildDecl::new("unit", "string"))
            .child(ChildDecl::new("system", "uri"))
            .child(ChildDecl::new("code", "code")),
        TypeDecl::composite("Narrative")
            .child(ChildDecl::new("status", "code"))
            .child(ChildDecl::new("div", "string")),
    ]);

    decls.push(TypeDecl::resource(RESOURCE_TYPE).abstract_type());

    decls.extend([
        TypeDecl::domain_resource("Patient", "Narrative")
            .child(ChildDecl::new("identifier", "Identifier").many())
            .child(ChildDecl::new("active", "boolean"))
            .child(ChildDecl::new("name", "HumanName").many())
            .child(ChildDecl::new("gender", "code"))
            .child(ChildDecl::new("birthDate", "date"))
            .child(ChildDecl::new("careProvider", reference).many())
            .child(ChildDecl::new("managingOrganization", reference)),
        TypeDecl::domain_resource("Practitioner", "Narrative")
            .child(ChildDecl::new("identifier", "Identifier").many())
            .child(ChildDecl::new("name", "HumanName"))
            .child(ChildDecl::new("organization", reference)),
        TypeDecl::domain_resource("Organization", "Narrative")
            .child(ChildDecl::new("identifier", "Identifier").many())
            .child(ChildDecl::new("name", "string"))
            .child(ChildDecl::new("partOf", reference)),
        TypeDecl::domain_resource("Observation", "Narrative")
            .child(ChildDecl::new("identifier", "Identifier").many())
            .child(ChildDecl::new("status", "code").required())
            .child(ChildDecl::new("code", "CodeableConcept").required())
            .child(ChildDecl::new("subject", reference))
            .child(ChildDecl::new("performer", reference).many())
            .child(ChildDecl::new("hasMember", reference).many())
            .child(ChildDecl::choice(
                "value",
                &[
                    "Quantity",
                    "CodeableConcept",
                    "string",
                    "boolean",
                    "integer",
                    "dateTime",
                ],
            )),
        TypeDecl::composite("ParametersParameter")
            .child(ChildDecl::new("name", "string").required())
            .child(ChildDecl::choice(
                "value",
                &[
                    "string", "boolean", "integer", "decimal", "uri", "code", "dateTime",
                    "Identifier", "Quantity", "CodeableConcept", "Coding", reference,
                ],
            ))
            .child(ChildDecl::new("resource", RESOURCE_TYPE)),
        TypeDecl::resource("Parameters")
            .child(ChildDecl::new("parameter", "ParametersParameter").many()),
        TypeDecl::composite("BundleEntry")
            .child(ChildDecl::new("base", "uri"))
            .child(ChildDecl::new("resource", RESOURCE_TYPE)),
        TypeDecl::resource("Bundle")
            .child(ChildDecl::new("base", "uri"))
            .child(ChildDecl::new("type", "code"))
            .child(ChildDecl::new("total", "integer"))
            .child(ChildDecl::new("entry", "BundleEntry").many()),
    ]);

    decls
}

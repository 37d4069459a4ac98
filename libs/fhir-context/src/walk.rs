//! Generic walk over populated reference fields
//!
//! Driven entirely by the registry's child definitions, so every registered
//! type is covered without per-type code.

use crate::context::FhirContext;
use crate::definition::ElementDefinition;
use crate::error::Result;
use ferrite_models::{Base, Reference, Resource, Value};

impl FhirContext {
    /// Every populated reference reachable from `resource`, in document order.
    ///
    /// Composite values are descended into. The resource's declared contained
    /// resources are walked one level deep; inline resource values (bundle
    /// entries, parameter resources) are not, since they are encoded on their
    /// own.
    pub fn populated_references(&self, resource: &Resource) -> Result<Vec<Reference>> {
        let mut found = Vec::new();
        self.collect_resource(resource, true, &mut found)?;
        Ok(found)
    }

    fn collect_resource(
        &self,
        resource: &Resource,
        with_contained: bool,
        found: &mut Vec<Reference>,
    ) -> Result<()> {
        let def = self.resource_definition(resource)?;
        for child in def.children() {
            if child.is_contained() {
                if with_contained {
                    for handle in self.contained_resources(resource)? {
                        let contained = handle.read();
                        self.collect_resource(&contained, false, found)?;
                    }
                }
                continue;
            }
            self.collect_values(child.accessor().values(resource), found)?;
        }
        Ok(())
    }

    fn collect_element(
        &self,
        def: &ElementDefinition,
        target: &dyn Base,
        found: &mut Vec<Reference>,
    ) -> Result<()> {
        for child in def.children() {
            self.collect_values(child.accessor().values(target), found)?;
        }
        Ok(())
    }

    fn collect_values(&self, values: &[Value], found: &mut Vec<Reference>) -> Result<()> {
        for value in values {
            match value {
                Value::Reference(reference) if !reference.is_empty() => {
                    found.push(reference.clone());
                }
                Value::Composite(element) => {
                    let def = self.datatype_definition(element.type_name())?;
                    self.collect_element(def, element, found)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{DataFormatError, Error, FhirContext, FhirVersionId};
    use ferrite_models::{Element, Primitive, Reference, Resource, ResourceHandle, Value};

    #[test]
    fn test_finds_references_in_slots_composites_and_choices() {
        let ctx = FhirContext::for_version(FhirVersionId::Dstu2).unwrap();
        let param = Element::new("ParametersParameter")
            .with_value("name", Primitive::string("subject").into())
            .with_value("value", Reference::to_text("Patient/9").into());
        let params = Resource::new("Parameters").with_value("parameter", param.into());
        let refs = ctx.populated_references(&params).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].reference().to_string(), "Patient/9");

        let obs = Resource::new("Observation")
            .with_value("subject", Reference::to_text("Patient/1").into())
            .with_value("performer", Reference::to_text("Practitioner/2").into())
            .with_value("performer", Reference::default().into());
        let refs = ctx.populated_references(&obs).unwrap();
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn test_walks_declared_contained_but_not_inline_resources() {
        let ctx = FhirContext::for_version(FhirVersionId::Dstu1).unwrap();
        let org = ResourceHandle::new(
            Resource::new("Organization")
                .with_id("#1")
                .with_value("partOf", Reference::to_text("#2").into()),
        );
        let mut patient = Resource::new("Patient");
        ctx.set_contained_resources(&mut patient, vec![org]).unwrap();
        assert_eq!(ctx.populated_references(&patient).unwrap().len(), 1);

        let entry = Element::new("BundleEntry").with_value(
            "resource",
            Value::Resource(
                Resource::new("Observation")
                    .with_value("subject", Reference::to_text("Patient/1").into())
                    .into(),
            ),
        );
        let bundle = Resource::new("Bundle").with_value("entry", entry.into());
        assert!(ctx.populated_references(&bundle).unwrap().is_empty());
    }

    #[test]
    fn test_unregistered_composite_is_a_data_error() {
        let ctx = FhirContext::for_version(FhirVersionId::Dstu2).unwrap();
        let patient = Resource::new("Patient").with_value("name", Element::new("Spaceship").into());
        assert!(matches!(
            ctx.populated_references(&patient),
            Err(Error::DataFormat(DataFormatError::UnknownDatatype(_)))
        ));
    }
}

//! JSON reader and writer
//!
//! Walks instances through the structure registry:
//! - Resources carry `resourceType`, `id` and `meta.versionId`.
//! - Choice slots are written under their expanded name (`valueQuantity`).
//! - Repeating slots are arrays, single slots are plain values.
//! - Contained resources are written as a flat `contained` array on the
//!   encoded resource, whatever the generation's in-memory representation.

use crate::error::{FormatError, Result};
use crate::options::ParserOptions;
use crate::parser::Parser;
use crate::run::EncodeRun;
use ferrite_context::{
    ChildDefinition, ChildKind, DataFormatError, ElementDefinition, ElementKind, FhirContext,
    CONTAINED_ELEMENT,
};
use ferrite_models::{
    Base, Element, IdType, Primitive, Reference, Resource, ResourceHandle, Value,
};
use serde_json::{Map, Value as JsonValue};
use std::io::{Read, Write};
use std::sync::Arc;

const NARRATIVE_TYPE: &str = "Narrative";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// The resource a run was started for; writes the contained list
    Root,
    /// An entry of the run's contained list
    Contained,
}

/// JSON parser backed by a structure registry
#[derive(Debug, Clone)]
pub struct JsonParser {
    context: Arc<FhirContext>,
    options: ParserOptions,
}

impl JsonParser {
    pub fn new(context: Arc<FhirContext>) -> Self {
        Self::with_options(context, ParserOptions::default())
    }

    pub fn with_options(context: Arc<FhirContext>, options: ParserOptions) -> Self {
        Self { context, options }
    }

    fn encode_resource(
        &self,
        run: &EncodeRun<'_>,
        handle: &ResourceHandle,
        role: Role,
    ) -> Result<Map<String, JsonValue>> {
        let resource = handle.read();
        let def = self.context.resource_definition(&resource)?;

        let mut obj = Map::new();
        obj.insert(
            "resourceType".to_string(),
            JsonValue::String(def.name().to_string()),
        );

        let id = match role {
            Role::Root => resource
                .id()
                .anchor_stripped()
                .filter(|id| !id.trim().is_empty())
                .map(str::to_string),
            Role::Contained => run.contained_id(handle),
        };
        if let Some(id) = id {
            obj.insert("id".to_string(), JsonValue::String(id));
        }

        if let Some(version) = resource.version().or(resource.id().version_part()) {
            let mut meta = Map::new();
            meta.insert(
                "versionId".to_string(),
                JsonValue::String(version.to_string()),
            );
            obj.insert("meta".to_string(), JsonValue::Object(meta));
        }

        let mut wrote_contained = false;
        for child in def.children() {
            if child.is_contained() {
                if role == Role::Root && !run.contained().is_empty() {
                    let contained = run
                        .contained()
                        .resources()
                        .iter()
                        .map(|c| {
                            self.encode_resource(run, c, Role::Contained)
                                .map(JsonValue::Object)
                        })
                        .collect::<Result<Vec<_>>>()?;
                    obj.insert(CONTAINED_ELEMENT.to_string(), JsonValue::Array(contained));
                    wrote_contained = true;
                }
                continue;
            }
            self.encode_child(run, child, child.accessor().values(&*resource), &mut obj)?;
        }

        if role == Role::Root && !run.contained().is_empty() && !wrote_contained {
            return Err(DataFormatError::UnknownElement {
                owner: def.name().to_string(),
                name: CONTAINED_ELEMENT.to_string(),
            }
            .into());
        }

        Ok(obj)
    }

    fn encode_element(&self, run: &EncodeRun<'_>, element: &Element) -> Result<JsonValue> {
        let def = self.context.datatype_definition(element.type_name())?;
        let mut obj = Map::new();
        for child in def.children() {
            self.encode_child(run, child, child.accessor().values(element), &mut obj)?;
        }
        Ok(JsonValue::Object(obj))
    }

    fn encode_child(
        &self,
        run: &EncodeRun<'_>,
        child: &ChildDefinition,
        values: &[Value],
        obj: &mut Map<String, JsonValue>,
    ) -> Result<()> {
        if values.is_empty() || (run.suppress_narratives() && is_narrative(child)) {
            return Ok(());
        }

        let mut grouped: Vec<(&str, Vec<JsonValue>)> = Vec::new();
        for value in values {
            let name = child.name_for_value(value)?;
            let Some(json) = self.encode_value(run, value)? else {
                continue;
            };
            match grouped.iter_mut().find(|(n, _)| *n == name) {
                Some((_, items)) => items.push(json),
                None => grouped.push((name, vec![json])),
            }
        }

        for (name, mut items) in grouped {
            let json = if child.cardinality().is_repeating() {
                JsonValue::Array(items)
            } else {
                items.swap_remove(0)
            };
            obj.insert(name.to_string(), json);
        }
        Ok(())
    }

    fn encode_value(&self, run: &EncodeRun<'_>, value: &Value) -> Result<Option<JsonValue>> {
        let json = match value {
            Value::Primitive(primitive) => encode_primitive(primitive)?,
            Value::Composite(element) => self.encode_element(run, element)?,
            Value::Reference(reference) => {
                let mut obj = Map::new();
                if let Some(text) = run.reference_text(reference) {
                    obj.insert("reference".to_string(), JsonValue::String(text));
                }
                if let Some(display) = reference.display() {
                    obj.insert("display".to_string(), JsonValue::String(display.to_string()));
                }
                if obj.is_empty() {
                    return Ok(None);
                }
                JsonValue::Object(obj)
            }
            Value::Resource(handle) => {
                // Inline resources resolve their own contained list
                let nested = EncodeRun::new(&self.context, run.options(), handle)?;
                JsonValue::Object(self.encode_resource(&nested, handle, Role::Root)?)
            }
        };
        Ok(Some(json))
    }

    fn decode_resource(
        &self,
        json: &JsonValue,
        expected: Option<&str>,
        role: Role,
    ) -> Result<ResourceHandle> {
        let obj = json
            .as_object()
            .ok_or_else(|| invalid_value("resource", "expected a JSON object for the resource"))?;
        let resource_type = obj
            .get("resourceType")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| invalid_value("resourceType", "missing resourceType property"))?;

        if let Some(expected) = expected {
            if expected != resource_type {
                return Err(DataFormatError::IncorrectResourceType {
                    expected: expected.to_string(),
                    found: resource_type.to_string(),
                }
                .into());
            }
        }

        let def = self.context.resource_definition_by_name(resource_type)?;
        let mut resource = Resource::new(def.name());
        let mut contained = Vec::new();

        for (key, value) in obj {
            match key.as_str() {
                "resourceType" => {}
                "id" => {
                    let id = expect_str(key, value)?;
                    resource.set_id(match role {
                        Role::Contained => IdType::local(id),
                        Role::Root => IdType::parse(id),
                    });
                }
                "meta" => decode_meta(value, &mut resource)?,
                CONTAINED_ELEMENT if def.find_child(key).is_some_and(|c| c.is_contained()) => {
                    for item in expect_array(key, value)? {
                        contained.push(self.decode_resource(item, None, Role::Contained)?);
                    }
                }
                _ => {
                    let child = def.child_by_name(key)?;
                    self.decode_into(child, key, value, &mut resource)?;
                }
            }
        }

        if !contained.is_empty() {
            self.context.set_contained_resources(&mut resource, contained)?;
        }
        Ok(ResourceHandle::new(resource))
    }

    fn decode_into(
        &self,
        child: &ChildDefinition,
        name: &str,
        json: &JsonValue,
        target: &mut dyn Base,
    ) -> Result<()> {
        let def = self.context.element_for_child(child, name)?;
        let values = if child.cardinality().is_repeating() {
            expect_array(name, json)?
                .iter()
                .map(|item| self.decode_value(def, name, item))
                .collect::<Result<Vec<_>>>()?
        } else {
            if json.is_array() {
                return Err(invalid_value(name, "expected a single value but found an array").into());
            }
            if child.accessor().is_populated(target) {
                return Err(DataFormatError::TooManyValues {
                    element: child.element_name().to_string(),
                    max: 1,
                }
                .into());
            }
            vec![self.decode_value(def, name, json)?]
        };
        child.mutator().set_values(target, values)?;
        Ok(())
    }

    fn decode_value(&self, def: &ElementDefinition, name: &str, json: &JsonValue) -> Result<Value> {
        match def.kind() {
            ElementKind::Primitive => {
                let text = primitive_text(def.name(), name, json)?;
                Ok(Primitive::new(def.name(), text).into())
            }
            ElementKind::Composite => {
                let mut element = Element::new(def.name());
                for (key, value) in expect_object(name, json)? {
                    let child = def.child_by_name(key)?;
                    self.decode_into(child, key, value, &mut element)?;
                }
                Ok(element.into())
            }
            ElementKind::Reference => {
                let mut reference = Reference::default();
                for (key, value) in expect_object(name, json)? {
                    match key.as_str() {
                        "reference" => reference.set_reference(IdType::parse(expect_str(key, value)?)),
                        "display" => reference = reference.with_display(expect_str(key, value)?),
                        _ => {
                            return Err(DataFormatError::UnknownElement {
                                owner: def.name().to_string(),
                                name: key.clone(),
                            }
                            .into())
                        }
                    }
                }
                Ok(reference.into())
            }
            ElementKind::Resource => {
                let expected = (!def.is_abstract()).then(|| def.name());
                Ok(Value::Resource(self.decode_resource(json, expected, Role::Root)?))
            }
            ElementKind::ContainedResources => Err(DataFormatError::UnknownElement {
                owner: def.name().to_string(),
                name: name.to_string(),
            }
            .into()),
        }
    }
}

impl Parser for JsonParser {
    fn context(&self) -> &FhirContext {
        &self.context
    }

    fn options(&self) -> &ParserOptions {
        &self.options
    }

    fn options_mut(&mut self) -> &mut ParserOptions {
        &mut self.options
    }

    fn read_resource(
        &self,
        resource_type: Option<&str>,
        reader: &mut dyn Read,
    ) -> Result<ResourceHandle> {
        let json: JsonValue = serde_json::from_reader(reader)?;
        self.decode_resource(&json, resource_type, Role::Root)
    }

    fn write_resource(
        &self,
        run: &EncodeRun<'_>,
        resource: &ResourceHandle,
        writer: &mut dyn Write,
    ) -> Result<()> {
        let json = JsonValue::Object(self.encode_resource(run, resource, Role::Root)?);
        let written = if run.options().pretty_print {
            serde_json::to_writer_pretty(&mut *writer, &json)
        } else {
            serde_json::to_writer(&mut *writer, &json)
        };
        written.map_err(|err| {
            if err.is_io() {
                FormatError::Io(err.into())
            } else {
                FormatError::Json(err)
            }
        })
    }
}

fn is_narrative(child: &ChildDefinition) -> bool {
    matches!(child.kind(), ChildKind::Declared { type_name } if &**type_name == NARRATIVE_TYPE)
}

fn encode_primitive(primitive: &Primitive) -> Result<JsonValue> {
    let json = match primitive.type_name() {
        "boolean" => JsonValue::Bool(primitive.as_bool()?),
        "integer" => JsonValue::from(primitive.as_integer()?),
        "decimal" => primitive
            .value_as_string()
            .trim()
            .parse::<serde_json::Number>()
            .map(JsonValue::Number)
            .map_err(|_| {
                invalid_value(
                    "decimal",
                    &format!("'{}' is not a decimal", primitive.value_as_string()),
                )
            })?,
        _ => JsonValue::String(primitive.value_as_string().to_string()),
    };
    Ok(json)
}

fn primitive_text(type_name: &str, name: &str, json: &JsonValue) -> Result<String> {
    let text = match (type_name, json) {
        ("boolean", JsonValue::Bool(b)) => Some(b.to_string()),
        ("integer", JsonValue::Number(n)) if n.is_i64() => Some(n.to_string()),
        ("decimal", JsonValue::Number(n)) => Some(n.to_string()),
        ("boolean" | "integer" | "decimal", _) => None,
        (_, JsonValue::String(s)) => Some(s.clone()),
        _ => None,
    };
    text.ok_or_else(|| {
        invalid_value(
            name,
            &format!("expected a {} value but found {}", type_name, json),
        )
        .into()
    })
}

fn decode_meta(json: &JsonValue, resource: &mut Resource) -> Result<()> {
    for (key, value) in expect_object("meta", json)? {
        match key.as_str() {
            "versionId" => resource.set_version(Some(expect_str(key, value)?.to_string())),
            _ => {
                return Err(DataFormatError::UnknownElement {
                    owner: "meta".to_string(),
                    name: key.clone(),
                }
                .into())
            }
        }
    }
    Ok(())
}

fn invalid_value(element: &str, message: &str) -> DataFormatError {
    DataFormatError::InvalidValue {
        element: element.to_string(),
        message: message.to_string(),
    }
}

fn expect_str<'j>(name: &str, json: &'j JsonValue) -> Result<&'j str> {
    json.as_str()
        .ok_or_else(|| invalid_value(name, "expected a string").into())
}

fn expect_array<'j>(name: &str, json: &'j JsonValue) -> Result<&'j Vec<JsonValue>> {
    json.as_array()
        .ok_or_else(|| invalid_value(name, "expected an array").into())
}

fn expect_object<'j>(name: &str, json: &'j JsonValue) -> Result<&'j Map<String, JsonValue>> {
    json.as_object()
        .ok_or_else(|| invalid_value(name, "expected an object").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_context::FhirVersionId;
    use serde_json::json;

    fn parser(version: FhirVersionId) -> JsonParser {
        JsonParser::new(FhirContext::for_version(version).unwrap())
    }

    fn encode(parser: &JsonParser, resource: Resource) -> JsonValue {
        let out = parser
            .encode_resource_to_string(&ResourceHandle::new(resource))
            .unwrap();
        serde_json::from_str(&out).unwrap()
    }

    #[test]
    fn test_encode_primitives_and_choice() {
        let parser = parser(FhirVersionId::Dstu2);
        let quantity = Element::new("Quantity")
            .with_value("value", Primitive::new("decimal", "70.5").into())
            .with_value("unit", Primitive::string("kg").into());
        let obs = Resource::new("Observation")
            .with_id("o1")
            .with_version("2")
            .with_value("status", Primitive::code("final").into())
            .with_value(
                "code",
                Element::new("CodeableConcept")
                    .with_value("text", Primitive::string("Weight").into())
                    .into(),
            )
            .with_value("value", quantity.into());

        assert_eq!(
            encode(&parser, obs),
            json!({
                "resourceType": "Observation",
                "id": "o1",
                "meta": { "versionId": "2" },
                "status": "final",
                "code": { "text": "Weight" },
                "valueQuantity": { "value": 70.5, "unit": "kg" }
            })
        );
    }

    #[test]
    fn test_encode_repeating_and_boolean() {
        let parser = parser(FhirVersionId::Dstu2);
        let patient = Resource::new("Patient")
            .with_value("active", Primitive::boolean(true).into())
            .with_value(
                "name",
                Element::new("HumanName")
                    .with_value("given", Primitive::string("Ada").into())
                    .into(),
            );
        assert_eq!(
            encode(&parser, patient),
            json!({
                "resourceType": "Patient",
                "active": true,
                "name": [{ "given": ["Ada"] }]
            })
        );
    }

    #[test]
    fn test_suppress_narratives() {
        let mut parser = parser(FhirVersionId::Dstu2);
        let narrative = Element::new("Narrative")
            .with_value("status", Primitive::code("generated").into())
            .with_value("div", Primitive::string("<div>Ada</div>").into());
        let patient = Resource::new("Patient").with_value("text", narrative.into());

        assert!(encode(&parser, patient.clone()).get("text").is_some());
        parser.set_suppress_narratives(true);
        assert!(encode(&parser, patient).get("text").is_none());
    }

    #[test]
    fn test_pretty_print() {
        let mut parser = parser(FhirVersionId::Dstu2);
        parser.set_pretty_print(true);
        let out = parser
            .encode_resource_to_string(&Resource::new("Patient").with_id("1").into())
            .unwrap();
        assert!(out.contains('\n'));
    }

    #[test]
    fn test_decode_rejects_wrong_resource_type() {
        let parser = parser(FhirVersionId::Dstu2);
        let err = parser
            .parse_resource_str(Some("Patient"), r#"{"resourceType":"Organization"}"#)
            .unwrap_err();
        assert_eq!(
            err.data_format(),
            Some(&DataFormatError::IncorrectResourceType {
                expected: "Patient".into(),
                found: "Organization".into(),
            })
        );
    }

    #[test]
    fn test_decode_unknown_element() {
        let parser = parser(FhirVersionId::Dstu2);
        let err = parser
            .parse_resource_str(None, r#"{"resourceType":"Patient","shoeSize":44}"#)
            .unwrap_err();
        assert!(matches!(
            err.data_format(),
            Some(DataFormatError::UnknownElement { name, .. }) if name == "shoeSize"
        ));
    }

    #[test]
    fn test_decode_value_of_wrong_shape() {
        let parser = parser(FhirVersionId::Dstu2);
        let err = parser
            .parse_resource_str(None, r#"{"resourceType":"Patient","active":"yes"}"#)
            .unwrap_err();
        assert!(matches!(
            err.data_format(),
            Some(DataFormatError::InvalidValue { element, .. }) if element == "active"
        ));

        let err = parser
            .parse_resource_str(None, r#"{"resourceType":"Patient","name":{"text":"Ada"}}"#)
            .unwrap_err();
        assert!(err.data_format().is_some());
    }

    #[test]
    fn test_decode_choice_slot_once() {
        let parser = parser(FhirVersionId::Dstu2);
        let handle = parser
            .parse_resource_str(
                None,
                r#"{"resourceType":"Observation","status":"final","valueString":"high"}"#,
            )
            .unwrap();
        let obs = handle.read();
        let value = obs.values("value")[0].as_primitive().unwrap();
        assert_eq!(value.type_name(), "string");
        assert_eq!(value.value_as_string(), "high");

        let err = parser
            .parse_resource_str(
                None,
                r#"{"resourceType":"Observation","valueString":"high","valueBoolean":true}"#,
            )
            .unwrap_err();
        assert!(matches!(
            err.data_format(),
            Some(DataFormatError::TooManyValues { .. })
        ));
    }

    #[test]
    fn test_decode_meta_version_and_contained_ids() {
        let parser = parser(FhirVersionId::Dstu1);
        let handle = parser
            .parse_resource_str(
                None,
                &json!({
                    "resourceType": "Patient",
                    "id": "p1",
                    "meta": { "versionId": "4" },
                    "contained": [{ "resourceType": "Organization", "id": "1" }],
                    "managingOrganization": { "reference": "#1" }
                })
                .to_string(),
            )
            .unwrap();

        let patient = handle.read();
        assert_eq!(patient.id().to_string(), "p1");
        assert_eq!(patient.version(), Some("4"));

        let contained = parser.context().contained_resources(&patient).unwrap();
        assert_eq!(contained.len(), 1);
        assert_eq!(contained[0].id().to_string(), "#1");
    }

    #[test]
    fn test_resource_without_contained_slot_cannot_contain() {
        let parser = parser(FhirVersionId::Dstu2);
        let param = Element::new("ParametersParameter")
            .with_value("name", Primitive::string("who").into())
            .with_value(
                "value",
                Reference::to_resource(Resource::new("Patient").into()).into(),
            );
        let params = Resource::new("Parameters").with_value("parameter", param.into());
        let err = parser
            .encode_resource_to_string(&params.into())
            .unwrap_err();
        assert!(matches!(
            err.data_format(),
            Some(DataFormatError::UnknownElement { name, .. }) if name == "contained"
        ));
    }

    #[test]
    fn test_encode_unregistered_datatype_is_a_data_error() {
        let parser = parser(FhirVersionId::Dstu2);
        let patient = Resource::new("Patient").with_value("name", Element::new("Spaceship").into());
        let err = parser
            .encode_resource_to_string(&patient.into())
            .unwrap_err();
        assert!(matches!(
            err.data_format(),
            Some(DataFormatError::UnknownDatatype(name)) if name == "Spaceship"
        ));
    }
}

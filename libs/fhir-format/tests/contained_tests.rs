use ferrite_context::{FhirContext, FhirVersionId};
use ferrite_format::{ContainedResources, JsonParser, Parser};
use ferrite_models::{Base, Reference, Resource, ResourceHandle};
use serde_json::{json, Value};
use std::sync::Arc;

const VERSIONS: [FhirVersionId; 2] = [FhirVersionId::Dstu1, FhirVersionId::Dstu2];

fn context(version: FhirVersionId) -> Arc<FhirContext> {
    FhirContext::for_version(version).unwrap()
}

fn encode(version: FhirVersionId, resource: &ResourceHandle) -> Value {
    let parser = JsonParser::new(context(version));
    let out = parser.encode_resource_to_string(resource).unwrap();
    serde_json::from_str(&out).unwrap()
}

fn anonymous(resource_type: &str) -> ResourceHandle {
    ResourceHandle::new(Resource::new(resource_type))
}

fn link(from: &ResourceHandle, slot: &str, to: &ResourceHandle) {
    from.write()
        .fields_mut()
        .push(slot, Reference::to_resource(to.clone()).into());
}

fn contained_ids(json: &Value) -> Vec<String> {
    json["contained"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|c| c["id"].as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn test_same_object_is_contained_once() {
    for version in VERSIONS {
        let patient = anonymous("Patient");
        let obs = anonymous("Observation");
        link(&obs, "subject", &patient);
        link(&obs, "performer", &patient);

        let json = encode(version, &obs);
        assert_eq!(contained_ids(&json), vec!["1"], "{version}");
        assert_eq!(json["subject"], json!({ "reference": "#1" }));
        assert_eq!(json["performer"], json!([{ "reference": "#1" }]));
    }
}

#[test]
fn test_equal_but_distinct_objects_are_contained_separately() {
    let obs = anonymous("Observation");
    link(&obs, "subject", &anonymous("Patient"));
    link(&obs, "performer", &anonymous("Patient"));

    let json = encode(FhirVersionId::Dstu2, &obs);
    assert_eq!(contained_ids(&json), vec!["1", "2"]);
    assert_eq!(json["performer"], json!([{ "reference": "#2" }]));
}

#[test]
fn test_anchors_follow_first_encounter_order() {
    let a = anonymous("Patient");
    let b = anonymous("Practitioner");
    let c = anonymous("Practitioner");

    let obs = anonymous("Observation");
    link(&obs, "subject", &a);
    link(&obs, "performer", &b);
    link(&obs, "performer", &c);

    let ctx = context(FhirVersionId::Dstu2);
    let table = ContainedResources::resolve(&ctx, &obs).unwrap();
    let ids: Vec<String> = [&a, &b, &c]
        .iter()
        .map(|r| table.resource_id(r).unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["1", "2", "3"]);

    // Same objects, different traversal order
    let reordered = anonymous("Observation");
    link(&reordered, "subject", &c);
    link(&reordered, "performer", &b);
    link(&reordered, "performer", &a);

    let table = ContainedResources::resolve(&ctx, &reordered).unwrap();
    assert_eq!(table.resource_id(&c).unwrap().to_string(), "1");
    assert_eq!(table.resource_id(&a).unwrap().to_string(), "3");

    let json = encode(FhirVersionId::Dstu2, &reordered);
    assert_eq!(contained_ids(&json), vec!["1", "2", "3"]);
}

#[test]
fn test_nested_targets_are_contained_depth_first() {
    let org = anonymous("Organization");
    let patient = anonymous("Patient");
    link(&patient, "managingOrganization", &org);
    let practitioner = anonymous("Practitioner");

    let obs = anonymous("Observation");
    link(&obs, "subject", &patient);
    link(&obs, "performer", &practitioner);

    let json = encode(FhirVersionId::Dstu1, &obs);
    assert_eq!(contained_ids(&json), vec!["1", "2", "3"]);
    assert_eq!(json["subject"]["reference"], "#1");
    assert_eq!(json["performer"][0]["reference"], "#3");

    let contained = json["contained"].as_array().unwrap();
    assert_eq!(contained[0]["managingOrganization"]["reference"], "#2");
    assert!(contained.iter().all(|c| c.get("contained").is_none()));
}

#[test]
fn test_resource_with_external_id_is_not_contained() {
    let org = anonymous("Organization");
    let patient = ResourceHandle::new(
        Resource::new("Patient").with_id("http://example.com/fhir/Patient/5"),
    );
    link(&patient, "managingOrganization", &org);

    let obs = anonymous("Observation");
    link(&obs, "subject", &patient);

    let ctx = context(FhirVersionId::Dstu2);
    let table = ContainedResources::resolve(&ctx, &obs).unwrap();
    assert!(table.is_empty());
    assert!(!table.contains(&org));

    let json = encode(FhirVersionId::Dstu2, &obs);
    assert!(json.get("contained").is_none());
    assert_eq!(
        json["subject"]["reference"],
        "http://example.com/fhir/Patient/5"
    );
}

#[test]
fn test_resource_with_local_id_keeps_it() {
    let org = ResourceHandle::new(Resource::new("Organization").with_id("#acme"));
    let patient = anonymous("Patient");
    link(&patient, "managingOrganization", &org);

    let json = encode(FhirVersionId::Dstu2, &patient);
    assert_eq!(contained_ids(&json), vec!["acme"]);
    assert_eq!(json["managingOrganization"]["reference"], "#acme");
}

#[test]
fn test_declared_anchor_is_reused() {
    for version in VERSIONS {
        let ctx = context(version);
        let org = ResourceHandle::new(Resource::new("Organization").with_id("#7"));
        let unused = ResourceHandle::new(Resource::new("Organization").with_id("#8"));
        let practitioner = anonymous("Practitioner");

        let mut patient = Resource::new("Patient")
            .with_value("careProvider", Reference::to_resource(practitioner.clone()).into())
            .with_value("managingOrganization", Reference::to_text("#7").into());
        ctx.set_contained_resources(&mut patient, vec![org.clone(), unused.clone()])
            .unwrap();
        let patient = ResourceHandle::new(patient);

        let table = ContainedResources::resolve(&ctx, &patient).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.resource_id(&org).unwrap().to_string(), "#7");
        assert_eq!(table.resource_id(&practitioner).unwrap().to_string(), "1");
        assert!(!table.contains(&unused));

        let json = encode(version, &patient);
        assert_eq!(contained_ids(&json), vec!["1", "7"]);
        assert_eq!(json["managingOrganization"]["reference"], "#7");
        assert_eq!(json["careProvider"][0]["reference"], "#1");
    }
}

#[test]
fn test_declared_anchors_are_never_reissued() {
    let ctx = context(FhirVersionId::Dstu2);
    let declared = ResourceHandle::new(Resource::new("Organization").with_id("#1"));
    let fresh = anonymous("Practitioner");

    let mut patient = Resource::new("Patient")
        .with_value("careProvider", Reference::to_resource(fresh.clone()).into())
        .with_value("managingOrganization", Reference::to_text("#1").into());
    ctx.set_contained_resources(&mut patient, vec![declared.clone()])
        .unwrap();
    let patient = ResourceHandle::new(patient);

    let table = ContainedResources::resolve(&ctx, &patient).unwrap();
    assert_eq!(table.resource_id(&fresh).unwrap().to_string(), "2");
    assert_eq!(table.resource_id(&declared).unwrap().to_string(), "#1");
}

#[test]
fn test_declared_resource_linked_by_object_keeps_its_anchor() {
    for version in VERSIONS {
        let ctx = context(version);
        let org = ResourceHandle::new(Resource::new("Organization").with_id("#7"));

        let mut obs = Resource::new("Observation")
            .with_value("subject", Reference::to_resource(org.clone()).into())
            .with_value("performer", Reference::to_text("#7").into());
        ctx.set_contained_resources(&mut obs, vec![org.clone()])
            .unwrap();
        let obs = ResourceHandle::new(obs);

        let table = ContainedResources::resolve(&ctx, &obs).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.resource_id(&org).unwrap().to_string(), "#7");

        let json = encode(version, &obs);
        assert_eq!(contained_ids(&json), vec!["7"]);
        assert_eq!(json["subject"]["reference"], "#7");
        assert_eq!(json["performer"][0]["reference"], "#7");
    }
}

#[test]
fn test_declared_resource_linked_only_by_object() {
    let ctx = context(FhirVersionId::Dstu2);
    let org = ResourceHandle::new(Resource::new("Organization").with_id("#7"));
    let mut patient = Resource::new("Patient")
        .with_value("managingOrganization", Reference::to_resource(org.clone()).into());
    ctx.set_contained_resources(&mut patient, vec![org.clone()])
        .unwrap();
    let patient = ResourceHandle::new(patient);

    let table = ContainedResources::resolve(&ctx, &patient).unwrap();
    assert_eq!(table.resource_id(&org).unwrap().to_string(), "#7");
}

#[test]
fn test_unreferenced_declared_anchor_is_not_held_back() {
    let ctx = context(FhirVersionId::Dstu2);
    let unused = ResourceHandle::new(Resource::new("Organization").with_id("#1"));
    let fresh = anonymous("Practitioner");

    let mut patient = Resource::new("Patient")
        .with_value("careProvider", Reference::to_resource(fresh.clone()).into());
    ctx.set_contained_resources(&mut patient, vec![unused.clone()])
        .unwrap();
    let patient = ResourceHandle::new(patient);

    let table = ContainedResources::resolve(&ctx, &patient).unwrap();
    assert_eq!(table.resource_id(&fresh).unwrap().to_string(), "1");
    assert!(!table.contains(&unused));

    let json = encode(FhirVersionId::Dstu2, &patient);
    assert_eq!(contained_ids(&json), vec!["1"]);
    assert_eq!(json["careProvider"][0]["reference"], "#1");
}

#[test]
fn test_unresolvable_anchor_is_left_alone() {
    let patient = ResourceHandle::new(
        Resource::new("Patient")
            .with_value("managingOrganization", Reference::to_text("#nowhere").into()),
    );
    let json = encode(FhirVersionId::Dstu2, &patient);
    assert!(json.get("contained").is_none());
    assert_eq!(json["managingOrganization"]["reference"], "#nowhere");
}

#[test]
fn test_mutual_references_terminate() {
    for version in VERSIONS {
        let a = anonymous("Patient");
        let b = anonymous("Organization");
        link(&a, "managingOrganization", &b);
        link(&b, "partOf", &a);

        let obs = anonymous("Observation");
        link(&obs, "subject", &a);

        let ctx = context(version);
        let table = ContainedResources::resolve(&ctx, &obs).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.resource_id(&a).unwrap().to_string(), "1");
        assert_eq!(table.resource_id(&b).unwrap().to_string(), "2");

        let json = encode(version, &obs);
        assert_eq!(contained_ids(&json), vec!["1", "2"]);
        assert_eq!(json["contained"][1]["partOf"]["reference"], "#1");
    }
}

#[test]
fn test_reference_back_to_root_is_not_contained() {
    let practitioner = anonymous("Practitioner");
    let patient = ResourceHandle::new(Resource::new("Patient").with_id("p1"));
    link(&patient, "careProvider", &practitioner);
    link(&practitioner, "organization", &patient);

    let ctx = context(FhirVersionId::Dstu2);
    let table = ContainedResources::resolve(&ctx, &patient).unwrap();
    assert_eq!(table.len(), 1);
    assert!(!table.contains(&patient));

    let json = encode(FhirVersionId::Dstu2, &patient);
    assert_eq!(json["contained"][0]["organization"]["reference"], "p1");
}

#[test]
fn test_server_base_strips_version_only_on_that_server() {
    let mut parser = JsonParser::new(context(FhirVersionId::Dstu2));
    parser.set_server_base_url(Some("http://example.com/fhir"));

    let obs = ResourceHandle::new(
        Resource::new("Observation")
            .with_value(
                "subject",
                Reference::to_text("http://example.com/fhir/Patient/1/_history/4").into(),
            )
            .with_value(
                "performer",
                Reference::to_text("http://elsewhere.org/Practitioner/2/_history/1").into(),
            ),
    );
    let json: Value =
        serde_json::from_str(&parser.encode_resource_to_string(&obs).unwrap()).unwrap();
    assert_eq!(json["subject"]["reference"], "Patient/1");
    assert_eq!(
        json["performer"][0]["reference"],
        "Practitioner/2/_history/1"
    );
}

#[test]
fn test_concurrent_encodes_share_one_parser() {
    let parser = Arc::new(JsonParser::new(context(FhirVersionId::Dstu2)));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let parser = Arc::clone(&parser);
            std::thread::spawn(move || {
                let obs = anonymous("Observation");
                for _ in 0..=i {
                    link(&obs, "performer", &anonymous("Practitioner"));
                }
                let json: Value =
                    serde_json::from_str(&parser.encode_resource_to_string(&obs).unwrap())
                        .unwrap();
                (i, contained_ids(&json))
            })
        })
        .collect();

    for handle in handles {
        let (i, ids) = handle.join().unwrap();
        let expected: Vec<String> = (1..=i + 1).map(|n| n.to_string()).collect();
        assert_eq!(ids, expected);
    }
}

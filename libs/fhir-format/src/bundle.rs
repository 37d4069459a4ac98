//! Bundle identifier normalization and typed bundle conversion
//!
//! Everything here goes through the registry's accessors and mutators, so it
//! works for any model generation that declares a `Bundle` with `base` and
//! `entry` children.

use crate::error::Result;
use ferrite_context::{DataFormatError, FhirContext};
use ferrite_models::{
    Bundle, BundleEntry, BundleType, Element, IdType, Primitive, ResourceHandle, Value,
};
use tracing::debug;

pub const BUNDLE_TYPE: &str = "Bundle";

fn first_string(values: &[Value]) -> Option<String> {
    values
        .first()
        .and_then(Value::as_primitive)
        .map(|p| p.value_as_string().trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Qualify the ids of a decoded bundle and its entry resources.
///
/// The bundle id is combined with the bundle base. Each entry resource id is
/// combined with the entry base, or the bundle base when the entry has none;
/// a missing version is taken from the resource's own version. Resources
/// without an id part are left alone. Anything that is not a bundle is
/// returned untouched.
pub fn normalize_bundle_ids(context: &FhirContext, handle: &ResourceHandle) -> Result<()> {
    let mut bundle = handle.write();
    let def = context.resource_definition(&bundle)?;
    if def.name() != BUNDLE_TYPE {
        return Ok(());
    }

    let base = first_string(def.child_by_name("base")?.accessor().values(&*bundle));

    if let Some(base) = base.as_deref() {
        let id = bundle.id().clone();
        if let Some(id_part) = id.id_part().filter(|_| id.has_id_part()) {
            let version = id.version_part().or(bundle.version()).map(str::to_string);
            let qualified = IdType::qualified(base, def.name(), id_part, version.as_deref())?;
            bundle.set_id(qualified);
        }
    }

    let entry_child = def.child_by_name("entry")?;
    let entry_def = context.element_for_child(entry_child, "entry")?;
    let entry_base = entry_def.child_by_name("base")?.accessor();
    let entry_resource = entry_def.child_by_name("resource")?.accessor();

    let mut rewritten = 0usize;
    for entry in entry_child.accessor().values(&*bundle) {
        let Value::Composite(entry) = entry else {
            continue;
        };
        let Some(base) = first_string(entry_base.values(entry)).or_else(|| base.clone()) else {
            continue;
        };
        let Some(resource) = entry_resource.first_value(entry).and_then(Value::as_resource) else {
            continue;
        };

        let mut resource = resource.write();
        let id = resource.id().clone();
        let Some(id_part) = id.id_part().filter(|_| id.has_id_part()) else {
            continue;
        };
        let version = id.version_part().or(resource.version()).map(str::to_string);
        let qualified = IdType::qualified(
            &base,
            resource.resource_type(),
            id_part,
            version.as_deref(),
        )?;
        resource.set_id(qualified);
        rewritten += 1;
    }

    debug!(
        base = base.as_deref().unwrap_or(""),
        entries = rewritten,
        "Normalized bundle identifiers"
    );
    Ok(())
}

/// Build the Bundle resource for a typed bundle
pub fn bundle_to_resource(context: &FhirContext, bundle: &Bundle) -> Result<ResourceHandle> {
    let mut resource = context.new_resource(BUNDLE_TYPE)?;
    resource.set_id(bundle.id.clone());
    let def = context.resource_definition_by_name(BUNDLE_TYPE)?;

    if let Some(base) = bundle.base.as_deref() {
        def.child_by_name("base")?
            .mutator()
            .set_value(&mut resource, Some(Primitive::uri(base).into()))?;
    }
    if let Some(bundle_type) = bundle.bundle_type {
        def.child_by_name("type")?
            .mutator()
            .set_value(&mut resource, Some(Primitive::code(bundle_type.as_code()).into()))?;
    }
    if let Some(total) = bundle.total {
        def.child_by_name("total")?
            .mutator()
            .set_value(&mut resource, Some(Primitive::integer(total.into()).into()))?;
    }

    let entry_child = def.child_by_name("entry")?;
    let entry_def = context.element_for_child(entry_child, "entry")?;
    for entry in &bundle.entries {
        let mut element = Element::new(entry_def.name());
        if let Some(base) = bundle.entry_base_url(entry) {
            entry_def
                .child_by_name("base")?
                .mutator()
                .set_value(&mut element, Some(Primitive::uri(base).into()))?;
        }
        if let Some(handle) = &entry.resource {
            entry_def
                .child_by_name("resource")?
                .mutator()
                .set_value(&mut element, Some(Value::Resource(handle.clone())))?;
        }
        entry_child
            .mutator()
            .add_value(&mut resource, Value::Composite(element))?;
    }

    Ok(ResourceHandle::new(resource))
}

/// Read the typed view of a Bundle resource
pub fn resource_to_bundle(context: &FhirContext, handle: &ResourceHandle) -> Result<Bundle> {
    let resource = handle.read();
    let def = context.resource_definition(&resource)?;
    if def.name() != BUNDLE_TYPE {
        return Err(DataFormatError::IncorrectResourceType {
            expected: BUNDLE_TYPE.to_string(),
            found: def.name().to_string(),
        }
        .into());
    }

    let bundle_type = first_string(def.child_by_name("type")?.accessor().values(&*resource))
        .map(|code| {
            code.parse::<BundleType>()
                .map_err(|err| invalid_value("type", err.to_string()))
        })
        .transpose()?;

    let total = def
        .child_by_name("total")?
        .accessor()
        .first_value(&*resource)
        .and_then(Value::as_primitive)
        .map(|p| {
            p.as_integer()
                .ok()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| invalid_value("total", format!("'{}' is not a count", p.value_as_string())))
        })
        .transpose()?;

    let entry_child = def.child_by_name("entry")?;
    let entry_def = context.element_for_child(entry_child, "entry")?;
    let entry_base = entry_def.child_by_name("base")?.accessor();
    let entry_resource = entry_def.child_by_name("resource")?.accessor();

    let entries = entry_child
        .accessor()
        .values(&*resource)
        .iter()
        .filter_map(Value::as_composite)
        .map(|entry| BundleEntry {
            base: first_string(entry_base.values(entry)),
            resource: entry_resource
                .first_value(entry)
                .and_then(Value::as_resource)
                .cloned(),
        })
        .collect();

    Ok(Bundle {
        id: resource.id().clone(),
        base: first_string(def.child_by_name("base")?.accessor().values(&*resource)),
        bundle_type,
        total,
        entries,
    })
}

fn invalid_value(element: &str, message: String) -> DataFormatError {
    DataFormatError::InvalidValue {
        element: element.to_string(),
        message,
    }
}

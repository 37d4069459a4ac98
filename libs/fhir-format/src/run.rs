//! Call-scoped encode state
//!
//! An [`EncodeRun`] is created for each resource a parser writes and dropped
//! when the write finishes, so one parser can serve concurrent encodes without
//! sharing the contained table between them.

use crate::contained::ContainedResources;
use crate::error::Result;
use crate::options::ParserOptions;
use ferrite_context::FhirContext;
use ferrite_models::{Reference, ResourceHandle};

#[derive(Debug)]
pub struct EncodeRun<'p> {
    options: &'p ParserOptions,
    contained: ContainedResources,
}

impl<'p> EncodeRun<'p> {
    /// Resolve the contained resources of `root` and start a run for it
    pub fn new(
        context: &FhirContext,
        options: &'p ParserOptions,
        root: &ResourceHandle,
    ) -> Result<Self> {
        Ok(Self {
            options,
            contained: ContainedResources::resolve(context, root)?,
        })
    }

    pub fn options(&self) -> &ParserOptions {
        self.options
    }

    pub fn contained(&self) -> &ContainedResources {
        &self.contained
    }

    pub fn suppress_narratives(&self) -> bool {
        self.options.suppress_narratives
    }

    /// Id to write on a contained resource: its table identifier without `#`
    pub fn contained_id(&self, resource: &ResourceHandle) -> Option<String> {
        self.contained
            .resource_id(resource)
            .and_then(|id| id.anchor_stripped())
            .map(str::to_string)
    }

    /// Reference text to write for `reference`.
    ///
    /// References without an id part point at their resolved target: the
    /// target's contained anchor if it is contained, else its own id. Otherwise
    /// the base is dropped; so is the version when the base is the configured
    /// server base.
    pub fn reference_text(&self, reference: &Reference) -> Option<String> {
        let id = reference.reference();

        if !id.has_id_part() {
            if let Some(target) = reference.resource() {
                if let Some(contained_id) = self.contained.resource_id(target) {
                    if !contained_id.is_empty() {
                        return Some(if contained_id.is_local() {
                            contained_id.to_string()
                        } else {
                            format!("#{}", contained_id)
                        });
                    }
                }
                let target_id = target.id();
                if target_id.has_id_part() {
                    return target_id.value();
                }
            }
            return id.value();
        }

        let on_server = match (self.options.server_base(), id.base_url()) {
            (Some(server), Some(base)) => server == base.trim_end_matches('/'),
            _ => false,
        };
        if on_server {
            id.to_unqualified_versionless().value()
        } else {
            id.to_unqualified().value()
        }
    }
}

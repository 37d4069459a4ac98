//! Contained-resource resolution
//!
//! Before a resource is written, every resource reachable from it through
//! references that should travel inline is collected into a
//! [`ContainedResources`] table. The table lives for one encode call only.

use crate::error::Result;
use ferrite_context::FhirContext;
use ferrite_models::{IdType, ResourceHandle, ResourceKey};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Identity-keyed table of the resources contained by one encoded resource.
///
/// Resources are kept in insertion order; each is addressed by the identifier
/// it was registered under. Numeric anchors are issued from 1 upwards and are
/// never reused within one table.
#[derive(Debug)]
pub struct ContainedResources {
    next_contained_id: u64,
    resources: Vec<ResourceHandle>,
    ids: Vec<IdType>,
    index: HashMap<ResourceKey, usize>,
    /// Anchors in use or reserved, without the leading `#`
    anchors: HashSet<String>,
}

impl Default for ContainedResources {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainedResources {
    pub fn new() -> Self {
        Self {
            next_contained_id: 1,
            resources: Vec::new(),
            ids: Vec::new(),
            index: HashMap::new(),
            anchors: HashSet::new(),
        }
    }

    /// Collect everything `root` contains.
    ///
    /// Resolved reference targets whose own id is absent or local are added
    /// and walked in turn; targets with any other id stay external. A resource
    /// from the root's declared contained list keeps its declared anchor,
    /// whether it is reached through a resolved target or through reference
    /// text of the form `#anchor`.
    ///
    /// Anchors are assigned once the walk is done, so only declared anchors
    /// that end up in the table are kept out of the numbering.
    pub fn resolve(context: &FhirContext, root: &ResourceHandle) -> Result<Self> {
        let declared = {
            let resource = root.read();
            context.contained_resources(&resource)?
        };

        let mut lookup = HashMap::with_capacity(declared.len());
        let mut anchors = HashMap::with_capacity(declared.len());
        for handle in declared {
            let id = handle.id();
            let Some(anchor) = id.anchor_stripped().filter(|a| !a.trim().is_empty()) else {
                continue;
            };
            let anchor = IdType::local(anchor);
            anchors.insert(handle.key(), anchor.clone());
            lookup.insert(anchor.to_string(), handle.clone());
        }

        let mut resolver = Resolver {
            context,
            root: root.key(),
            lookup,
            anchors,
            visited: HashSet::from([root.key()]),
            found: Vec::new(),
            seen: HashSet::new(),
        };
        resolver.contain(root)?;
        Ok(resolver.into_table())
    }

    /// Register a resource, reusing its local id or issuing the next anchor.
    /// Returns the identifier the resource is registered under.
    pub fn add_contained(&mut self, resource: &ResourceHandle) -> &IdType {
        if let Some(&idx) = self.index.get(&resource.key()) {
            return &self.ids[idx];
        }

        let own = resource.id();
        let id = match own.anchor_stripped() {
            Some(anchor) if own.is_local() && !self.anchors.contains(anchor) => own.clone(),
            _ => self.issue_anchor(),
        };
        self.insert(id, resource)
    }

    /// Register a resource under an identifier chosen by the caller
    pub fn add_contained_with_id(&mut self, id: IdType, resource: &ResourceHandle) -> &IdType {
        if let Some(&idx) = self.index.get(&resource.key()) {
            return &self.ids[idx];
        }
        self.insert(id, resource)
    }

    fn issue_anchor(&mut self) -> IdType {
        loop {
            let candidate = self.next_contained_id;
            self.next_contained_id += 1;
            if !self.anchors.contains(&candidate.to_string()) {
                return IdType::from_number(candidate);
            }
        }
    }

    fn insert(&mut self, id: IdType, resource: &ResourceHandle) -> &IdType {
        if let Some(anchor) = id.anchor_stripped() {
            self.anchors.insert(anchor.to_string());
        }
        trace!(anchor = %id, resource_type = %resource.resource_type(), "Contained resource");

        let idx = self.resources.len();
        self.index.insert(resource.key(), idx);
        self.resources.push(resource.clone());
        self.ids.push(id);
        &self.ids[idx]
    }

    /// Identifier `resource` was registered under, if it is contained
    pub fn resource_id(&self, resource: &ResourceHandle) -> Option<&IdType> {
        self.index.get(&resource.key()).map(|&idx| &self.ids[idx])
    }

    pub fn contains(&self, resource: &ResourceHandle) -> bool {
        self.index.contains_key(&resource.key())
    }

    /// Contained resources in insertion order
    pub fn resources(&self) -> &[ResourceHandle] {
        &self.resources
    }

    /// `(resource, identifier)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&ResourceHandle, &IdType)> {
        self.resources.iter().zip(self.ids.iter())
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Depth-first walk state for one resolution
struct Resolver<'c> {
    context: &'c FhirContext,
    root: ResourceKey,
    /// Declared contained resources not yet matched, keyed by `#anchor`
    lookup: HashMap<String, ResourceHandle>,
    /// Declared anchor of each declared contained resource
    anchors: HashMap<ResourceKey, IdType>,
    visited: HashSet<ResourceKey>,
    /// Resources to contain in first-encounter order, with their declared anchor
    found: Vec<(ResourceHandle, Option<IdType>)>,
    seen: HashSet<ResourceKey>,
}

impl Resolver<'_> {
    fn contain(&mut self, current: &ResourceHandle) -> Result<()> {
        let references = {
            let resource = current.read();
            self.context.populated_references(&resource)?
        };

        for reference in references {
            if let Some(target) = reference.resource() {
                if target.key() == self.root {
                    trace!("Reference back to the encoded resource left in place");
                    continue;
                }
                if let Some(anchor) = self.anchors.get(&target.key()).cloned() {
                    self.lookup.remove(&anchor.to_string());
                    self.record(target, Some(anchor));
                    self.descend(target)?;
                    continue;
                }
                let id = target.id();
                if !id.is_empty() && !id.is_local() {
                    continue;
                }
                self.record(target, None);
                self.descend(target)?;
            } else if reference.reference().is_local() {
                let anchor = reference.reference().to_string();
                if let Some(target) = self.lookup.remove(&anchor) {
                    trace!(anchor = %anchor, "Matched declared contained resource");
                    self.record(&target, Some(reference.reference().clone()));
                    self.descend(&target)?;
                }
            }
        }
        Ok(())
    }

    fn record(&mut self, target: &ResourceHandle, anchor: Option<IdType>) {
        if self.seen.insert(target.key()) {
            self.found.push((target.clone(), anchor));
        }
    }

    fn descend(&mut self, target: &ResourceHandle) -> Result<()> {
        if !self.visited.insert(target.key()) {
            trace!(resource_type = %target.resource_type(), "Reference cycle cut");
            return Ok(());
        }
        self.contain(target)
    }

    /// Declared anchors win, then a target's own local id in encounter order;
    /// everything else is numbered around them.
    fn into_table(self) -> ContainedResources {
        let mut table = ContainedResources::new();
        for anchor in self.found.iter().filter_map(|(_, anchor)| anchor.as_ref()) {
            if let Some(stripped) = anchor.anchor_stripped() {
                table.anchors.insert(stripped.to_string());
            }
        }

        let ids: Vec<Option<IdType>> = self
            .found
            .iter()
            .map(|(resource, anchor)| {
                if anchor.is_some() {
                    return anchor.clone();
                }
                let own = resource.id();
                let stripped = own.anchor_stripped().filter(|_| own.is_local())?;
                table
                    .anchors
                    .insert(stripped.to_string())
                    .then(|| own.clone())
            })
            .collect();

        for ((resource, _), id) in self.found.iter().zip(ids) {
            let id = id.unwrap_or_else(|| table.issue_anchor());
            table.insert(id, resource);
        }
        table
    }
}

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::event::{Event, ResourceKey};

/// Event field read as the resource membership when decoding snapshots.
pub const DEFAULT_RESOURCE_FIELD: &str = "resource_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub key: ResourceKey,
    #[serde(default)]
    pub label: String,
}

impl Resource {
    pub fn new(key: &str, label: &str) -> Self {
        Self {
            key: ResourceKey::new(key),
            label: label.to_string(),
        }
    }

    pub fn display_name(&self) -> &str {
        if self.label.trim().is_empty() {
            self.key.as_str()
        } else {
            &self.label
        }
    }
}

/// Parses `key:label` pairs separated by commas, e.g.
/// `room-a:Room A, room-b:Room B`. A bare key uses itself as the label.
pub fn parse_resource_list(raw: &str) -> Vec<Resource> {
    let mut out: Vec<Resource> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let (key, label) = item
            .split_once(':')
            .map(|(k, v)| (k.trim(), v.trim()))
            .unwrap_or((item, item));
        if key.is_empty() {
            warn!(item, "resource entry without a key; skipping");
            continue;
        }
        if out.iter().any(|existing| existing.key.as_str() == key) {
            warn!(key, "duplicate resource key; keeping the first");
            continue;
        }
        out.push(Resource::new(key, label));
    }
    out
}

/// Events belonging to `resource`, by scalar equality or set membership.
pub fn events_for_resource<'a, I>(events: I, resource: &Resource) -> Vec<&'a Event>
where
    I: IntoIterator<Item = &'a Event>,
{
    events
        .into_iter()
        .filter(|event| event.resource_keys.contains(&resource.key))
        .collect()
}

/// One filtered view per resource, or a single implicit view holding every
/// event when no resources are configured.
#[tracing::instrument(skip_all, fields(events = events.len(), resources = resources.len()))]
pub fn resource_views<'e, 'r>(
    events: &'e [Event],
    resources: &'r [Resource],
) -> Vec<(Option<&'r Resource>, Vec<&'e Event>)> {
    if resources.is_empty() {
        return vec![(None, events.iter().collect())];
    }

    resources
        .iter()
        .map(|resource| {
            let filtered = events_for_resource(events, resource);
            debug!(resource = %resource.key, events = filtered.len(), "filtered resource view");
            (Some(resource), filtered)
        })
        .collect()
}

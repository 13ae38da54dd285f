use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::event::{Event, EventId, ResourceKeys};
use crate::resource::DEFAULT_RESOURCE_FIELD;
use crate::state::{EventSource, overlaps};
use crate::window::DateRange;

pub const EVENTS_FILE: &str = "events.jsonl";

/// Read-only view over an events snapshot stored as JSON lines.
#[derive(Debug)]
pub struct DataStore {
    pub events_path: PathBuf,
    pub resource_field: String,
}

impl DataStore {
    /// Opens `path` directly, or `<path>/events.jsonl` when it is a directory.
    #[tracing::instrument(skip(path))]
    pub fn open(path: &Path, resource_field: &str) -> anyhow::Result<Self> {
        let events_path = if path.is_dir() {
            path.join(EVENTS_FILE)
        } else {
            path.to_path_buf()
        };
        if !events_path.exists() {
            return Err(anyhow!("events file not found: {}", events_path.display()));
        }

        let resource_field = if resource_field.trim().is_empty() {
            DEFAULT_RESOURCE_FIELD.to_string()
        } else {
            resource_field.trim().to_string()
        };

        info!(
            events = %events_path.display(),
            resource_field = %resource_field,
            "opened datastore"
        );

        Ok(Self {
            events_path,
            resource_field,
        })
    }

    /// Every event in the snapshot. A later line with the same id replaces
    /// the earlier one in place.
    #[tracing::instrument(skip(self))]
    pub fn load_events(&self) -> anyhow::Result<Vec<Event>> {
        let records = load_jsonl(&self.events_path)
            .with_context(|| format!("failed to load {}", self.events_path.display()))?;

        let mut order: Vec<EventId> = Vec::new();
        let mut by_id: BTreeMap<EventId, Event> = BTreeMap::new();
        for (line, record) in records {
            let event = decode_event(record, &self.resource_field).with_context(|| {
                format!("failed parsing {} line {}", self.events_path.display(), line)
            })?;
            if by_id.contains_key(&event.id) {
                warn!(id = %event.id, line, "duplicate event id; later record wins");
            } else {
                order.push(event.id.clone());
            }
            by_id.insert(event.id.clone(), event);
        }

        let out = order
            .into_iter()
            .filter_map(|id| by_id.remove(&id))
            .collect::<Vec<_>>();
        debug!(count = out.len(), "loaded events");
        Ok(out)
    }
}

impl EventSource for DataStore {
    #[tracing::instrument(skip(self))]
    fn fetch(&self, range: &DateRange) -> anyhow::Result<Vec<Event>> {
        let events = self.load_events()?;
        let total = events.len();
        let kept = events
            .into_iter()
            .filter(|event| overlaps(event, range))
            .collect::<Vec<_>>();
        debug!(total, kept = kept.len(), "filtered events to range");
        Ok(kept)
    }
}

/// Lifts the configured resource field out of the open attribute map.
fn decode_event(mut record: Value, resource_field: &str) -> anyhow::Result<Event> {
    let Some(object) = record.as_object_mut() else {
        return Err(anyhow!("event record must be a JSON object"));
    };
    let keys = object
        .remove(resource_field)
        .map(|value| ResourceKeys::from_value(&value))
        .unwrap_or_default();

    let mut event: Event = serde_json::from_value(record)?;
    if !keys.is_empty() {
        event.resource_keys = keys;
    }
    Ok(event)
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<(usize, Value)>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }

        let value: Value = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push((idx + 1, value));
    }

    Ok(out)
}

use crate::tags::cache::{MemoryValueCache, PreviousValueCache};
use crate::tags::range::{validate, Validation};
use crate::tags::scaler::scale_value;
use crate::tags::structures::{now_millis, Quality, Tag, TagKey, TagUpdate, TagValue};
use dashmap::DashMap; // Using DashMap for concurrent R/W access
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Which value the range validator sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidateOn {
    /// Validate the raw reading and scale the accepted value afterwards.
    #[default]
    Raw,
    /// Scale first and validate the engineering value.
    Scaled,
}

#[derive(Debug, Clone)]
struct TagEntry {
    config: Arc<Tag>,
    value: TagValue,
}

/// Registry of tag configurations and current values, keyed by device and tag.
/// Runs each raw sample through scaling and range validation.
#[derive(Clone)] // Clone provides cheap Arc clones
pub struct TagEngine {
    tags: Arc<DashMap<TagKey, TagEntry>>,
    previous: Arc<dyn PreviousValueCache>,
    validate_on: ValidateOn,
}

impl TagEngine {
    pub fn new() -> Self {
        Self::with_cache(Arc::new(MemoryValueCache::new()), ValidateOn::default())
    }

    pub fn with_cache(previous: Arc<dyn PreviousValueCache>, validate_on: ValidateOn) -> Self {
        TagEngine {
            tags: Arc::new(DashMap::new()),
            previous,
            validate_on,
        }
    }

    pub fn validate_on(&self) -> ValidateOn {
        self.validate_on
    }

    /// Add or replace a tag definition.
    pub fn register_tag(&self, tag: Tag) {
        let key = tag.key();
        let config = Arc::new(tag);
        match self.tags.get_mut(&key) {
            Some(mut entry) => entry.config = config,
            None => {
                self.tags.insert(
                    key,
                    TagEntry {
                        config,
                        value: TagValue::bad(Quality::Initializing),
                    },
                );
            }
        }
    }

    /// Replace the whole configuration generation.
    ///
    /// Tags missing from `tags` are removed along with their previous values;
    /// tags still present keep their current and previous values.
    pub fn load_tags(&self, tags: Vec<Tag>) {
        let keep: HashSet<TagKey> = tags.iter().map(Tag::key).collect();
        let stale: Vec<TagKey> = self
            .tags
            .iter()
            .filter(|entry| !keep.contains(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        for key in stale {
            self.tags.remove(&key);
            self.previous.remove(&key);
        }
        for tag in tags {
            self.register_tag(tag);
        }
    }

    /// Get a snapshot of a tag's value.
    pub fn read_tag(&self, key: &TagKey) -> Option<TagValue> {
        self.tags.get(key).map(|entry| entry.value.clone())
    }

    /// Get the configuration a tag is currently evaluated with.
    pub fn get_tag_details(&self, key: &TagKey) -> Option<Arc<Tag>> {
        self.tags.get(key).map(|entry| Arc::clone(&entry.config))
    }

    /// Previous accepted value, in the space the validator runs in.
    pub fn previous_value(&self, key: &TagKey) -> Option<Decimal> {
        self.previous.get(key)
    }

    /// Overwrite the current value without evaluation, e.g. to flag a comm failure.
    pub fn update_tag_value(&self, key: &TagKey, new_value: TagValue) -> bool {
        match self.tags.get_mut(key) {
            Some(mut entry) => {
                entry.value = new_value;
                true // Update successful
            }
            None => false, // Tag not found
        }
    }

    /// Get a list of all registered tag keys.
    pub fn get_all_tag_paths(&self) -> Vec<TagKey> {
        self.tags.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Snapshot of every tag's configuration and current value.
    pub fn get_all_tags(&self) -> Vec<(Arc<Tag>, TagValue)> {
        self.tags
            .iter()
            .map(|entry| (Arc::clone(&entry.config), entry.value.clone()))
            .collect()
    }

    /// Scale and validate one raw sample. Returns `None` for unknown tags.
    pub fn process(&self, key: &TagKey, raw: Option<Decimal>) -> Option<TagUpdate> {
        let Some(config) = self.get_tag_details(key) else {
            debug!(tag = %key, "sample for unregistered tag ignored");
            return None;
        };

        let mut outcome = Validation::default();
        let mut emitted = None;
        self.previous.update(key, &mut |previous| {
            let candidate = match self.validate_on {
                ValidateOn::Raw => raw,
                ValidateOn::Scaled => raw.map(|r| scale_value(&config, r)),
            };
            outcome = validate(config.range.as_ref(), previous, candidate);
            emitted = match self.validate_on {
                ValidateOn::Raw => outcome.accepted.map(|v| scale_value(&config, v)),
                ValidateOn::Scaled => outcome.accepted,
            };
            // Committed under the cache entry lock so current and previous values stay in step.
            if let Some(value) = emitted {
                self.update_tag_value(key, TagValue::good(value));
            }
            outcome.accepted
        });

        if raw.is_some() && outcome.accepted.is_none() {
            debug!(tag = %key, raw = ?raw, "reading rejected, no value emitted");
        }

        // The side value is archived unscaled.
        let side_value = outcome.side_value.and(raw);

        Some(TagUpdate {
            device_id: key.device_id.clone(),
            tag_id: key.tag_id.clone(),
            value: emitted,
            side_value,
            persist: outcome.persist,
            timestamp: now_millis(),
        })
    }
}

impl Default for TagEngine {
    fn default() -> Self {
        Self::new()
    }
}

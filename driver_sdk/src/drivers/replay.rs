use crate::drivers::traits::{DeviceDriver, DriverConfig, DriverResult, TagRequest};
use crate::tags::structures::Tag;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

struct Sequence {
    samples: Vec<Value>,
    cursor: usize,
}

/// Driver that replays each tag's configured `samples`, wrapping around at the end.
pub struct ReplayDriver {
    config: DriverConfig,
    sequences: Mutex<HashMap<String, Sequence>>,
    connected: AtomicBool,
}

impl ReplayDriver {
    pub fn new(config: DriverConfig, tags: &[Tag]) -> Self {
        let sequences = tags
            .iter()
            .filter(|tag| tag.device_id == config.id && !tag.samples.is_empty())
            .map(|tag| {
                (
                    tag.driver_address().to_string(),
                    Sequence {
                        samples: tag.samples.clone(),
                        cursor: 0,
                    },
                )
            })
            .collect();
        ReplayDriver {
            config,
            sequences: Mutex::new(sequences),
            connected: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl DeviceDriver for ReplayDriver {
    fn config(&self) -> &DriverConfig {
        &self.config
    }

    async fn connect(&self) -> DriverResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        info!("Replay driver '{}' connected", self.config.id);
        Ok(())
    }

    async fn disconnect(&self) -> DriverResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        info!("Replay driver '{}' disconnected", self.config.id);
        Ok(())
    }

    async fn check_status(&self) -> DriverResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(format!("Driver '{}' is not connected", self.config.id).into())
        }
    }

    async fn read_tags(&self, tags: &[TagRequest]) -> DriverResult<HashMap<String, Value>> {
        self.check_status().await?;

        let mut sequences = self
            .sequences
            .lock()
            .map_err(|_| format!("Driver '{}' sample state poisoned", self.config.id))?;
        let mut results = HashMap::with_capacity(tags.len());
        for request in tags {
            match sequences.get_mut(&request.address) {
                Some(seq) => {
                    let sample = seq.samples[seq.cursor].clone();
                    seq.cursor = (seq.cursor + 1) % seq.samples.len();
                    results.insert(request.address.clone(), sample);
                }
                None => debug!("No samples configured for address '{}'", request.address),
            }
        }
        Ok(results)
    }
}

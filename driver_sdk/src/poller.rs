//! Polling loop: drivers → tag engine → sink.

use crate::drivers::traits::{DeviceDriver, TagRequest};
use crate::sinks::ValueSink;
use crate::tags::engine::TagEngine;
use crate::tags::ingest::parse_raw;
use crate::tags::structures::{Quality, TagKey, TagValue};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{interval, Duration, Instant};
use tracing::{error, info, warn};

pub type DriverMap = HashMap<String, Arc<dyn DeviceDriver + Send + Sync>>;

/// Poll one device once and publish the results. Returns the number of
/// updates handed to the sink.
pub async fn poll_device(
    engine: &TagEngine,
    driver: &(dyn DeviceDriver + Send + Sync),
    sink: &dyn ValueSink,
) -> usize {
    let device_id = driver.config().id.clone();
    let keys: Vec<TagKey> = engine
        .get_all_tag_paths()
        .into_iter()
        .filter(|key| key.device_id == device_id)
        .collect();
    if keys.is_empty() {
        return 0;
    }

    // Several tags may share one address; it is read once and fed to each.
    let mut by_address: HashMap<String, Vec<TagKey>> = HashMap::new();
    for key in &keys {
        if let Some(tag) = engine.get_tag_details(key) {
            by_address
                .entry(tag.driver_address().to_string())
                .or_default()
                .push(key.clone());
        }
    }
    let requests: Vec<TagRequest> = by_address
        .keys()
        .map(|address| TagRequest {
            address: address.clone(),
        })
        .collect();

    let results = match driver.read_tags(&requests).await {
        Ok(results) => results,
        Err(e) => {
            error!("Failed to read tags from driver '{}': {}", device_id, e);
            for key in &keys {
                engine.update_tag_value(key, TagValue::bad(Quality::CommFailure));
            }
            return 0;
        }
    };

    let mut published = 0;
    for (address, sample) in results {
        let Some(tag_keys) = by_address.get(&address) else {
            warn!("Driver '{}' returned unknown address '{}'", device_id, address);
            continue;
        };
        let raw = match parse_raw(&sample) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(device = %device_id, address = %address, "{}", e);
                for key in tag_keys {
                    engine.update_tag_value(key, TagValue::bad(Quality::Bad));
                }
                continue;
            }
        };
        for key in tag_keys {
            let Some(update) = engine.process(key, raw) else {
                continue;
            };
            if let Err(e) = sink.publish(&update).await {
                error!(tag = %key, "Failed to publish update: {}", e);
                continue;
            }
            published += 1;
        }
    }
    published
}

/// Poll every driver at its configured rate, forever.
pub async fn run_poller(engine: Arc<TagEngine>, drivers: Arc<DriverMap>, sink: Arc<dyn ValueSink>) {
    info!("Polling task started for {} drivers.", drivers.len());

    // Store last poll time for each driver
    let mut last_poll_times: HashMap<String, Instant> = HashMap::new();
    let base_interval = Duration::from_millis(100); // Check every 100ms which drivers are due
    let mut tick_interval = interval(base_interval);

    loop {
        tick_interval.tick().await;
        let now = Instant::now();

        for (driver_id, driver) in drivers.iter() {
            let poll_duration = Duration::from_millis(driver.config().poll_rate_ms);
            let due = last_poll_times
                .get(driver_id)
                .map_or(true, |last| now.duration_since(*last) >= poll_duration);
            if !due {
                continue;
            }

            let published = poll_device(&engine, driver.as_ref(), sink.as_ref()).await;
            if published > 0 {
                info!("Published {} updates from driver '{}'", published, driver_id);
            }
            // Update last poll time regardless of success/failure to avoid spamming logs on error
            last_poll_times.insert(driver_id.clone(), now);
        }
    }
}

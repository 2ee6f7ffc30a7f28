use async_trait::async_trait;
use driver_sdk::drivers::replay::ReplayDriver;
use driver_sdk::drivers::traits::{DeviceDriver, DriverConfig, DriverResult, TagRequest};
use driver_sdk::poller::{poll_device, run_poller, DriverMap};
use driver_sdk::sinks::{ChannelSink, LogSink, ValueSink};
use driver_sdk::tags::engine::TagEngine;
use driver_sdk::tags::structures::{Active, InvalidAction, Quality, Range, Tag, TagKey};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

fn driver_config(id: &str) -> DriverConfig {
    DriverConfig {
        id: id.to_string(),
        name: format!("{} driver", id),
        poll_rate_ms: 10,
    }
}

fn replay_tag(samples: Vec<Value>) -> Tag {
    Tag {
        device_id: "plc1".to_string(),
        id: "pressure".to_string(),
        range: Some(Range {
            min_value: Some(dec!(0)),
            max_value: Some(dec!(10)),
            active: Active::Discard,
            invalid_action: Some(InvalidAction::Save),
            ..Default::default()
        }),
        samples,
        ..Default::default()
    }
}

struct FailingDriver {
    config: DriverConfig,
}

#[async_trait]
impl DeviceDriver for FailingDriver {
    fn config(&self) -> &DriverConfig {
        &self.config
    }

    async fn connect(&self) -> DriverResult<()> {
        Ok(())
    }

    async fn disconnect(&self) -> DriverResult<()> {
        Ok(())
    }

    async fn check_status(&self) -> DriverResult<()> {
        Err("link down".into())
    }

    async fn read_tags(&self, _tags: &[TagRequest]) -> DriverResult<HashMap<String, Value>> {
        Err("link down".into())
    }
}

#[tokio::test]
async fn test_poll_device_publishes_updates() {
    let tag = replay_tag(vec![json!(4), json!(40), json!("bad"), Value::Null]);
    let engine = TagEngine::new();
    engine.register_tag(tag.clone());
    let driver = ReplayDriver::new(driver_config("plc1"), &[tag.clone()]);
    driver.connect().await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink = ChannelSink::new(tx);

    assert_eq!(poll_device(&engine, &driver, &sink).await, 1);
    let first = rx.recv().await.unwrap();
    assert_eq!(first.value, Some(dec!(4)));

    // Out of range, discarded but archived
    assert_eq!(poll_device(&engine, &driver, &sink).await, 1);
    let second = rx.recv().await.unwrap();
    assert_eq!(second.value, None);
    assert_eq!(second.side_value, Some(dec!(40)));
    assert!(second.persist);

    // Unparsable sample flags the tag, nothing is published
    assert_eq!(poll_device(&engine, &driver, &sink).await, 0);
    assert_eq!(engine.read_tag(&tag.key()).unwrap().quality, Quality::Bad);

    // Null sample still produces a (non-persisted) update
    assert_eq!(poll_device(&engine, &driver, &sink).await, 1);
    assert!(!rx.recv().await.unwrap().persist);
}

#[tokio::test]
async fn test_driver_failure_marks_comm_failure() {
    let tag = replay_tag(vec![]);
    let engine = TagEngine::new();
    engine.register_tag(tag.clone());
    let driver = FailingDriver {
        config: driver_config("plc1"),
    };

    assert_eq!(poll_device(&engine, &driver, &LogSink).await, 0);
    assert_eq!(
        engine.read_tag(&tag.key()).unwrap().quality,
        Quality::CommFailure
    );
}

#[tokio::test]
async fn test_device_without_tags_is_skipped() {
    let engine = TagEngine::new();
    let driver = FailingDriver {
        config: driver_config("empty"),
    };
    assert_eq!(poll_device(&engine, &driver, &LogSink).await, 0);
}

#[tokio::test]
async fn test_run_poller_feeds_sink() {
    let tag = replay_tag(vec![json!(1), json!(2)]);
    let engine = Arc::new(TagEngine::new());
    engine.register_tag(tag.clone());

    let driver = Arc::new(ReplayDriver::new(driver_config("plc1"), &[tag.clone()]));
    driver.connect().await.unwrap();
    let mut drivers = DriverMap::new();
    drivers.insert("plc1".to_string(), driver);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink: Arc<dyn ValueSink> = Arc::new(ChannelSink::new(tx));
    let handle = tokio::spawn(run_poller(Arc::clone(&engine), Arc::new(drivers), sink));

    let first = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
    let second = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
    handle.abort();

    assert_eq!(first.value, Some(dec!(1)));
    assert_eq!(second.value, Some(dec!(2)));
    assert_eq!(
        engine.previous_value(&TagKey::new("plc1", "pressure")),
        Some(dec!(2))
    );
}

#[tokio::test]
async fn test_shared_address_feeds_every_tag() {
    let mut raw = replay_tag(vec![json!(7)]);
    raw.address = Some("40001".to_string());
    let mut doubled = raw.clone();
    doubled.id = "pressure_x2".to_string();
    doubled.multiplier = Some(dec!(2));

    let engine = TagEngine::new();
    engine.register_tag(raw.clone());
    engine.register_tag(doubled.clone());
    let driver = ReplayDriver::new(driver_config("plc1"), &[raw.clone()]);
    driver.connect().await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    assert_eq!(poll_device(&engine, &driver, &ChannelSink::new(tx)).await, 2);

    let mut values: Vec<(String, Option<rust_decimal::Decimal>)> = Vec::new();
    while let Ok(update) = rx.try_recv() {
        values.push((update.tag_id, update.value));
    }
    values.sort();
    assert_eq!(
        values,
        vec![
            ("pressure".to_string(), Some(dec!(7))),
            ("pressure_x2".to_string(), Some(dec!(14))),
        ]
    );
}

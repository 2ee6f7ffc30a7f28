use driver_sdk::tags::cache::{MemoryValueCache, PreviousValueCache};
use driver_sdk::tags::engine::{TagEngine, ValidateOn};
use driver_sdk::tags::structures::{
    Active, Comparator, ConditionMode, InvalidAction, Quality, Range, RangeCondition, Scaling,
    Tag, TagKey, TagValue,
};
use rust_decimal_macros::dec;
use std::sync::Arc;

fn sample_tag(device_id: &str, id: &str) -> Tag {
    Tag {
        device_id: device_id.to_string(),
        id: id.to_string(),
        name: format!("{} on {}", id, device_id),
        ..Default::default()
    }
}

/// 0..100 raw → 0..10 engineering, raw validated against [0, 100] with boundary fallback.
fn level_tag() -> Tag {
    Tag {
        scaling: Some(Scaling {
            min_raw: Some(dec!(0)),
            max_raw: Some(dec!(100)),
            min_value: Some(dec!(0)),
            max_value: Some(dec!(10)),
        }),
        range: Some(Range {
            min_value: Some(dec!(0)),
            max_value: Some(dec!(100)),
            active: Active::Boundary,
            invalid_action: Some(InvalidAction::Save),
            ..Default::default()
        }),
        ..sample_tag("plc1", "level")
    }
}

#[test]
fn register_and_read_tag() {
    let engine = TagEngine::new();
    let tag = sample_tag("plc1", "temp");
    engine.register_tag(tag.clone());

    let read = engine.read_tag(&tag.key()).expect("tag should exist");
    assert_eq!(read.quality, Quality::Initializing);
    assert_eq!(read.value, None);
    assert_eq!(*engine.get_tag_details(&tag.key()).unwrap(), tag);
}

#[test]
fn process_unknown_tag_returns_none() {
    let engine = TagEngine::new();
    assert!(engine.process(&TagKey::new("plc1", "missing"), Some(dec!(1))).is_none());
}

#[test]
fn process_accepts_and_scales() {
    let engine = TagEngine::new();
    let tag = level_tag();
    engine.register_tag(tag.clone());

    let update = engine.process(&tag.key(), Some(dec!(50))).unwrap();
    assert_eq!(update.device_id, "plc1");
    assert_eq!(update.tag_id, "level");
    assert_eq!(update.value, Some(dec!(5)));
    assert_eq!(update.side_value, None);
    assert!(update.persist);

    let current = engine.read_tag(&tag.key()).unwrap();
    assert_eq!(current.value, Some(dec!(5)));
    assert_eq!(current.quality, Quality::Good);
    // The raw accepted value is what is remembered
    assert_eq!(engine.previous_value(&tag.key()), Some(dec!(50)));
}

#[test]
fn process_substitutes_boundary_and_saves_raw() {
    let engine = TagEngine::new();
    let tag = level_tag();
    engine.register_tag(tag.clone());

    let update = engine.process(&tag.key(), Some(dec!(150))).unwrap();
    assert_eq!(update.value, Some(dec!(10)));
    assert_eq!(update.side_value, Some(dec!(150)));
    assert!(update.persist);
    assert_eq!(engine.previous_value(&tag.key()), Some(dec!(100)));
}

#[test]
fn discarded_reading_keeps_previous_state() {
    let engine = TagEngine::new();
    let mut tag = sample_tag("plc1", "flow");
    tag.range = Some(Range {
        min_value: Some(dec!(0)),
        max_value: Some(dec!(10)),
        active: Active::Discard,
        ..Default::default()
    });
    engine.register_tag(tag.clone());

    engine.process(&tag.key(), Some(dec!(4))).unwrap();
    let update = engine.process(&tag.key(), Some(dec!(40))).unwrap();
    assert_eq!(update.value, None);
    assert!(!update.persist);
    assert_eq!(engine.previous_value(&tag.key()), Some(dec!(4)));
    assert_eq!(engine.read_tag(&tag.key()).unwrap().value, Some(dec!(4)));
}

#[test]
fn missing_sample_is_a_no_op() {
    let engine = TagEngine::new();
    let tag = level_tag();
    engine.register_tag(tag.clone());

    let update = engine.process(&tag.key(), None).unwrap();
    assert_eq!(update.value, None);
    assert!(!update.persist);
    assert_eq!(engine.previous_value(&tag.key()), None);
}

#[test]
fn delta_condition_uses_previous_accepted_value() {
    let cache = Arc::new(MemoryValueCache::new());
    let engine = TagEngine::with_cache(cache.clone(), ValidateOn::Raw);
    let mut tag = sample_tag("plc1", "counter");
    tag.range = Some(Range {
        conditions: vec![RangeCondition {
            mode: ConditionMode::Delta,
            condition: Comparator::Range,
            min_value: Some(dec!(0)),
            max_value: Some(dec!(10)),
            value: None,
            default_condition: true,
        }],
        active: Active::Latest,
        ..Default::default()
    });
    engine.register_tag(tag.clone());
    let key = tag.key();

    // No previous value yet: the delta condition cannot be evaluated and the
    // latest policy has nothing to repeat.
    assert_eq!(engine.process(&key, Some(dec!(100))).unwrap().value, None);
    assert!(cache.is_empty());

    cache.set(&key, dec!(100));
    assert_eq!(engine.process(&key, Some(dec!(105))).unwrap().value, Some(dec!(105)));
    // Jump of 50 is rejected; latest repeats 105
    assert_eq!(engine.process(&key, Some(dec!(155))).unwrap().value, Some(dec!(105)));
    // Counter wrapped backwards: also rejected
    assert_eq!(engine.process(&key, Some(dec!(3))).unwrap().value, Some(dec!(105)));
    assert_eq!(engine.process(&key, Some(dec!(110))).unwrap().value, Some(dec!(110)));
}

#[test]
fn validate_on_scaled_checks_engineering_value() {
    let engine = TagEngine::with_cache(Arc::new(MemoryValueCache::new()), ValidateOn::Scaled);
    let mut tag = level_tag();
    // Bounds now expressed in engineering units
    tag.range = Some(Range {
        min_value: Some(dec!(0)),
        max_value: Some(dec!(8)),
        active: Active::Boundary,
        invalid_action: Some(InvalidAction::Save),
        ..Default::default()
    });
    engine.register_tag(tag.clone());

    let update = engine.process(&tag.key(), Some(dec!(90))).unwrap();
    assert_eq!(update.value, Some(dec!(8)));
    // Side value stays in raw units
    assert_eq!(update.side_value, Some(dec!(90)));
    assert_eq!(engine.previous_value(&tag.key()), Some(dec!(8)));
}

#[test]
fn update_tag_value_flags_quality() {
    let engine = TagEngine::new();
    let tag = sample_tag("plc1", "temp");
    engine.register_tag(tag.clone());

    assert!(engine.update_tag_value(&tag.key(), TagValue::bad(Quality::CommFailure)));
    assert_eq!(engine.read_tag(&tag.key()).unwrap().quality, Quality::CommFailure);
    assert!(!engine.update_tag_value(&TagKey::new("plc1", "nope"), TagValue::bad(Quality::Bad)));
}

#[test]
fn list_paths_and_driver_addresses() {
    let engine = TagEngine::new();
    let tag1 = sample_tag("plc1", "a");
    let mut tag2 = sample_tag("plc1", "b");
    tag2.address = Some("40001".to_string());
    let tag3 = sample_tag("plc2", "a");
    engine.register_tag(tag1.clone());
    engine.register_tag(tag2.clone());
    engine.register_tag(tag3.clone());

    let mut paths = engine.get_all_tag_paths();
    paths.sort();
    assert_eq!(paths, vec![tag1.key(), tag2.key(), tag3.key()]);

    assert_eq!(engine.get_tag_details(&tag1.key()).unwrap().driver_address(), "a");
    assert_eq!(engine.get_tag_details(&tag2.key()).unwrap().driver_address(), "40001");
}

#[test]
fn get_all_tags_snapshot() {
    let engine = TagEngine::new();
    engine.register_tag(sample_tag("plc1", "a"));
    engine.register_tag(sample_tag("plc1", "b"));

    let all = engine.get_all_tags();
    assert_eq!(all.len(), 2);
}

//! Property tests for folding change events into a collection

use chrono::{DateTime, Utc};
use livesync::{
    Applied, ChangeEvent, Collection, Fields, Filter, IgnoreReason, OwnerId, Query, Record,
    RecordId,
};
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashSet;

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn record(id: usize, owner: usize, version: i64, value: i64) -> Record {
    let mut fields = Fields::new();
    fields.insert("value".to_string(), json!(value));
    Record::new(
        RecordId::new(format!("r{}", id)),
        Some(OwnerId::new(format!("u{}", owner))),
        fields,
        at(version),
    )
}

fn arb_record() -> impl Strategy<Value = Record> {
    (0..6usize, 0..2usize, 0..20i64, 0..4i64)
        .prop_map(|(id, owner, version, value)| record(id, owner, version, value))
}

fn arb_event() -> impl Strategy<Value = ChangeEvent> {
    prop_oneof![
        arb_record().prop_map(ChangeEvent::Insert),
        arb_record().prop_map(ChangeEvent::Update),
        (0..6usize).prop_map(|id| ChangeEvent::Delete(RecordId::new(format!("r{}", id)))),
    ]
}

fn arb_query() -> impl Strategy<Value = Query> {
    (any::<bool>(), any::<bool>(), proptest::option::of(1..5usize)).prop_map(
        |(scoped, ordered, limit)| {
            let mut query = Query::table("items");
            if scoped {
                query = query.filter(Filter::owner(OwnerId::new("u0")));
            }
            if ordered {
                query = query.newest_first();
            }
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            query
        },
    )
}

fn fold(query: &Query, events: &[ChangeEvent]) -> Collection {
    let mut collection = Collection::new(query);
    for event in events {
        collection.apply(event.clone());
    }
    collection
}

proptest! {
    #[test]
    fn ids_stay_unique(query in arb_query(), events in prop::collection::vec(arb_event(), 0..40)) {
        let collection = fold(&query, &events);
        let ids: HashSet<&RecordId> = collection.iter().map(|r| &r.id).collect();
        prop_assert_eq!(ids.len(), collection.len());
    }

    #[test]
    fn records_always_match_filter(query in arb_query(), events in prop::collection::vec(arb_event(), 0..40)) {
        let collection = fold(&query, &events);
        prop_assert!(collection.iter().all(|r| query.filter.matches(r)));
    }

    #[test]
    fn repeated_update_is_idempotent(
        query in arb_query(),
        events in prop::collection::vec(arb_event(), 0..30),
        update in arb_record(),
    ) {
        let mut once = fold(&query, &events);
        once.apply(ChangeEvent::Update(update.clone()));

        let mut twice = once.clone();
        let second = twice.apply(ChangeEvent::Update(update));

        prop_assert_eq!(once.records(), twice.records());
        prop_assert!(!second.changed());
    }

    #[test]
    fn orphan_events_change_nothing(
        query in arb_query(),
        events in prop::collection::vec(arb_event(), 0..30),
        version in 0..20i64,
        delete in any::<bool>(),
    ) {
        let mut collection = fold(&query, &events);
        let before = collection.records().to_vec();

        let mut orphan = record(0, 0, version, 0);
        orphan.id = RecordId::new("never-seen");
        let event = if delete {
            ChangeEvent::Delete(orphan.id)
        } else {
            ChangeEvent::Update(orphan)
        };

        prop_assert_eq!(collection.apply(event), Applied::Ignored(IgnoreReason::Orphan));
        prop_assert_eq!(collection.records(), before.as_slice());
    }

    #[test]
    fn limit_keeps_most_recent(
        limit in 1..6usize,
        versions in prop::collection::vec(0..10i64, 0..30),
    ) {
        let query = Query::table("items").newest_first().limit(limit);
        let inserts: Vec<Record> = versions
            .iter()
            .enumerate()
            .map(|(id, version)| record(id, 0, *version, 0))
            .collect();

        let mut collection = Collection::new(&query);
        for row in &inserts {
            collection.apply(ChangeEvent::Insert(row.clone()));
            prop_assert!(collection.len() <= limit);
        }

        // Newest first, earlier arrival first among equal versions
        let mut expected = inserts.clone();
        expected.sort_by(|a, b| b.version.cmp(&a.version));
        expected.truncate(limit);

        let kept: Vec<&RecordId> = collection.iter().map(|r| &r.id).collect();
        let wanted: Vec<&RecordId> = expected.iter().map(|r| &r.id).collect();
        prop_assert_eq!(kept, wanted);
    }
}

//! Integration tests for the mentorship views
//! Tests live updates across users sharing one store

use chrono::{TimeDelta, Utc};
use livesync::{CollectionHandle, Fields, MemoryStore, RecordId, RemoteStore, SyncConfig};
use mentorship::{
    CommunityFeed, Dashboard, MentorshipError, Mood, MoodJournal, Session, SessionStatus,
};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn wait_for(mut handle: CollectionHandle, cond: impl Fn(&CollectionHandle) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond(&handle) {
            handle.changed().await;
        }
    })
    .await
    .expect("view never reached the expected state");
}

fn columns(pairs: &[(&str, serde_json::Value)]) -> Fields {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn test_dashboards_of_two_users_stay_separate() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let alice = Dashboard::new(Arc::clone(&store), Session::new("alice"), SyncConfig::default());
    let bob = Dashboard::new(Arc::clone(&store), Session::new("bob"), SyncConfig::default());
    alice.start().await.unwrap();
    bob.start().await.unwrap();

    alice.enroll_in_course("c-python").await.unwrap();
    let when = Utc::now() + TimeDelta::days(2);
    bob.book_mentor("m-7", when, Some("career chat")).await.unwrap();

    assert_eq!(alice.enrollments().unwrap().len(), 1);
    assert!(alice.bookings().unwrap().is_empty());
    assert!(bob.enrollments().unwrap().is_empty());

    let bookings = bob.bookings().unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].status, SessionStatus::Scheduled);
    assert_eq!(bookings[0].notes.as_deref(), Some("career chat"));
    assert_eq!(bookings[0].scheduled_at.timestamp(), when.timestamp());
}

#[tokio::test]
async fn test_mentor_status_change_reaches_dashboard() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let dashboard = Dashboard::new(Arc::clone(&store), Session::new("alice"), SyncConfig::default());
    dashboard.start().await.unwrap();

    let booking = dashboard
        .book_mentor("m-7", Utc::now() + TimeDelta::hours(3), None)
        .await
        .unwrap();

    // The mentor confirms the session from another client
    store
        .update(
            "mentor_bookings",
            &booking.id,
            columns(&[("status", json!("completed"))]),
        )
        .await
        .unwrap();

    let id = booking.id.clone();
    wait_for(dashboard.booking_handle().unwrap(), move |h| {
        h.get(&id)
            .and_then(|r| r.field("status").cloned())
            == Some(json!("completed"))
    })
    .await;
    assert_eq!(dashboard.bookings().unwrap()[0].status, SessionStatus::Completed);
}

#[tokio::test]
async fn test_enrollment_from_another_device_blocks_duplicate() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let laptop = Dashboard::new(Arc::clone(&store), Session::new("alice"), SyncConfig::default());
    let phone = Dashboard::new(Arc::clone(&store), Session::new("alice"), SyncConfig::default());
    laptop.start().await.unwrap();
    phone.start().await.unwrap();

    laptop.enroll_in_course("c-robotics").await.unwrap();
    wait_for(phone.enrollment_handle().unwrap(), |h| h.len() == 1).await;

    assert_eq!(
        phone.enroll_in_course("c-robotics").await,
        Err(MentorshipError::AlreadyEnrolled("c-robotics".to_string()))
    );
}

#[tokio::test]
async fn test_journal_keeps_ten_newest() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let journal = MoodJournal::new(Arc::clone(&store), Session::new("alice"), SyncConfig::default());
    journal.start().await.unwrap();

    for (i, mood) in Mood::ALL.iter().cycle().take(12).enumerate() {
        let note = format!("entry {}", i);
        journal
            .log_mood(*mood, (i % 10 + 1) as u8, Some(note.as_str()), None)
            .await
            .unwrap();
    }

    let entries = journal.entries().unwrap();
    assert_eq!(entries.len(), 10);
    assert_eq!(entries[0].notes.as_deref(), Some("entry 11"));
    assert_eq!(entries[9].notes.as_deref(), Some("entry 2"));
    assert!(entries.windows(2).all(|w| w[0].created_at >= w[1].created_at));
}

#[tokio::test]
async fn test_delete_entry_removes_it_everywhere() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let journal = MoodJournal::new(Arc::clone(&store), Session::new("alice"), SyncConfig::default());
    journal.start().await.unwrap();

    let first = journal.log_mood(Mood::Calm, 3, None, None).await.unwrap();
    let second = journal.log_mood(Mood::Excited, 8, None, None).await.unwrap();

    journal.delete_entry(&first.id).await.unwrap();
    let ids: Vec<RecordId> = journal.entries().unwrap().into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![second.id]);
    assert!(store.row("mood_entries", &first.id).is_none());
}

#[tokio::test]
async fn test_feed_likes_and_moderation() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let author = CommunityFeed::new(Arc::clone(&store), Session::new("alice"), SyncConfig::default());
    let reader = CommunityFeed::new(Arc::clone(&store), Session::new("bob"), SyncConfig::default());
    author.start().await.unwrap();

    let post = author.publish("I built a robot!", false).await.unwrap();
    assert!(author.posts().unwrap().is_empty());

    // A moderator approves the post before bob opens the feed
    store
        .update(
            "community_posts",
            &post.id,
            columns(&[("is_approved", json!(true))]),
        )
        .await
        .unwrap();
    reader.start().await.unwrap();
    assert_eq!(reader.posts().unwrap().len(), 1);
    assert!(reader.my_posts().unwrap().is_empty());

    let liked = reader.like(&post.id).await.unwrap();
    assert_eq!(liked.likes_count, 1);

    let id = post.id.clone();
    wait_for(author.my_posts_handle().unwrap(), move |h| {
        h.get(&id).and_then(|r| r.field("likes_count").cloned()) == Some(json!(1))
    })
    .await;
    assert_eq!(author.my_posts().unwrap()[0].author().map(|o| o.as_str()), Some("alice"));
}

async fn approve(store: &MemoryStore, post: &RecordId) {
    store
        .update("community_posts", post, columns(&[("is_approved", json!(true))]))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_feed_order_follows_creation_not_edits() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let author = CommunityFeed::new(Arc::clone(&store), Session::new("alice"), SyncConfig::default());
    let reader = CommunityFeed::new(Arc::clone(&store), Session::new("bob"), SyncConfig::default());
    author.start().await.unwrap();

    let older = author.publish("older post", false).await.unwrap();
    let newer = author.publish("newer post", false).await.unwrap();
    // Approved in reverse order, so the older post was modified last
    approve(&store, &newer.id).await;
    approve(&store, &older.id).await;

    reader.start().await.unwrap();
    let before: Vec<_> = reader
        .posts()
        .unwrap()
        .into_iter()
        .map(|p| (p.content, p.created_at))
        .collect();
    assert_eq!(before[0].0, "newer post");
    assert_eq!(before[1].0, "older post");
    assert_eq!(before[1].1, older.created_at);

    let liked = reader.like(&older.id).await.unwrap();
    assert_eq!(liked.created_at, older.created_at);

    let after: Vec<_> = reader
        .posts()
        .unwrap()
        .into_iter()
        .map(|p| (p.content, p.created_at))
        .collect();
    assert_eq!(after, before);
    assert_eq!(reader.posts().unwrap()[1].likes_count, 1);
}

#[tokio::test]
async fn test_concurrent_likes_are_all_counted() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let author = CommunityFeed::new(Arc::clone(&store), Session::new("alice"), SyncConfig::default());
    let bob = CommunityFeed::new(Arc::clone(&store), Session::new("bob"), SyncConfig::default());
    let carol = CommunityFeed::new(Arc::clone(&store), Session::new("carol"), SyncConfig::default());
    author.start().await.unwrap();

    let post = author.publish("Our team won the hackathon", false).await.unwrap();
    approve(&store, &post.id).await;
    bob.start().await.unwrap();
    carol.start().await.unwrap();

    // Neither reader sees the other's like before writing its own
    store.pause_delivery();
    let from_bob = bob.like(&post.id).await.unwrap();
    let from_carol = carol.like(&post.id).await.unwrap();
    assert_eq!(from_bob.likes_count, 1);
    assert_eq!(from_carol.likes_count, 2);
    store.resume_delivery();

    let stored = store.row("community_posts", &post.id).unwrap();
    assert_eq!(stored.field("likes_count"), Some(&json!(2)));
    for feed in [&bob, &carol] {
        let id = post.id.clone();
        wait_for(feed.feed_handle().unwrap(), move |h| {
            h.get(&id).and_then(|r| r.field("likes_count").cloned()) == Some(json!(2))
        })
        .await;
    }
}

#[tokio::test]
async fn test_stopped_view_reads_empty() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let journal = MoodJournal::new(Arc::clone(&store), Session::new("alice"), SyncConfig::default());
    journal.start().await.unwrap();
    journal.log_mood(Mood::Confident, 9, None, None).await.unwrap();

    journal.stop();
    assert!(journal.entries().unwrap().is_empty());
    assert!(matches!(
        journal.log_mood(Mood::Sad, 2, None, None).await,
        Err(MentorshipError::Sync(livesync::SyncError::NotActive))
    ));
}

proptest! {
    #[test]
    fn completed_only_at_full_progress(progress in 0u8..=100, position in 0i64..10_000) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let dashboard = Dashboard::new(
                Arc::new(MemoryStore::new()),
                Session::new("alice"),
                SyncConfig::default(),
            );
            dashboard.start().await.unwrap();
            dashboard.enroll_in_course("c-1").await.unwrap();

            let enrollment = dashboard
                .update_course_progress("c-1", progress, position)
                .await
                .unwrap();
            assert_eq!(enrollment.is_completed(), progress == 100);
            assert_eq!(enrollment.progress_percentage, progress);
            assert_eq!(enrollment.last_watched_position, position);
        });
    }
}

//! Integration tests for detection record storage, the processed-once
//! guard, and history pagination.

mod common;

use common::*;
use spotter::core::db::{AppDb, HISTORY_PAGE_SIZE, ProcessedUpdate, User};
use spotter::detection::DEFAULT_CONFIDENCE_THRESHOLD;
use spotter::models::{DetectedObject, DetectionReport};

async fn setup() -> anyhow::Result<(AppDb, User, tempfile::TempDir)> {
    let (db, dir) = create_test_db().await;
    let user = db.add_user(&make_new_user("alice", "alice@example.com")).await?;
    Ok((db, user, dir))
}

fn sample_report() -> DetectionReport {
    DetectionReport {
        objects: vec![DetectedObject {
            id: 1,
            class_id: 18,
            class_name: "dog".to_string(),
            confidence: 0.91,
            bbox: [0.2, 0.3, 0.6, 0.7],
        }],
        total_objects: 1,
        confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
    }
}

#[tokio::test]
async fn test_add_record_starts_unprocessed() -> anyhow::Result<()> {
    let (db, user, _dir) = setup().await?;

    let record = db
        .add_record(&NewDetectionRecord {
            user_id: user.id,
            original_fname: "img.jpg".to_string(),
        })
        .await?;
    assert!(record.id > 0);
    assert!(!record.is_processed());
    assert_eq!(record.processed_fname, None);
    assert_eq!(record.detection_results, None);
    assert_eq!(record.objects_detected, 0);
    assert_eq!(record.processing_time, 0.0);
    assert_eq!(record.processed_at, None);

    Ok(())
}

#[tokio::test]
async fn test_get_record_enforces_ownership() -> anyhow::Result<()> {
    let (db, alice, _dir) = setup().await?;
    let bob = db.add_user(&make_new_user("bob", "bob@example.com")).await?;

    let record = db
        .add_record(&NewDetectionRecord {
            user_id: alice.id,
            original_fname: "img.jpg".to_string(),
        })
        .await?;

    assert!(db.get_record(alice.id, record.id).await?.is_some());
    assert!(db.get_record(bob.id, record.id).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_mark_processed_once() -> anyhow::Result<()> {
    let (db, user, _dir) = setup().await?;
    let record = db
        .add_record(&NewDetectionRecord {
            user_id: user.id,
            original_fname: "img.jpg".to_string(),
        })
        .await?;

    let update = ProcessedUpdate {
        processed_fname: format!("processed_{}.png", record.id),
        report: sample_report(),
        processing_time: 0.42,
    };
    let processed = db.mark_processed(&record, &update).await?;
    assert!(processed.is_processed());
    assert_eq!(processed.objects_detected, 1);
    assert_eq!(processed.processing_time, 0.42);
    assert!(processed.processed_at.is_some());

    let report = processed.detection_results.as_ref().unwrap();
    assert_eq!(report.objects[0].class_name, "dog");

    // The guard makes the second attempt fail rather than overwrite.
    let second = db.mark_processed(&record, &update).await;
    assert!(second.is_err());

    let stored = db.get_record(user.id, record.id).await?.unwrap();
    assert_eq!(stored.processing_time, 0.42);

    Ok(())
}

#[tokio::test]
async fn test_recent_records_newest_first() -> anyhow::Result<()> {
    let (db, user, _dir) = setup().await?;
    for i in 0..8 {
        db.add_record(&NewDetectionRecord {
            user_id: user.id,
            original_fname: format!("img_{i}.jpg"),
        })
        .await?;
    }

    let recent = db.recent_records(user.id, 5).await?;
    assert_eq!(recent.len(), 5);
    assert_eq!(recent[0].original_fname, "img_7.jpg");
    assert_eq!(recent[4].original_fname, "img_3.jpg");

    Ok(())
}

#[tokio::test]
async fn test_history_pagination() -> anyhow::Result<()> {
    let (db, user, _dir) = setup().await?;
    for i in 0..23 {
        db.add_record(&NewDetectionRecord {
            user_id: user.id,
            original_fname: format!("img_{i}.jpg"),
        })
        .await?;
    }

    let first = db.record_page(user.id, 1).await?;
    assert_eq!(first.records.len(), HISTORY_PAGE_SIZE as usize);
    assert_eq!(first.total_pages, 3);
    assert_eq!(first.total_records, 23);
    assert_eq!(first.records[0].original_fname, "img_22.jpg");

    let last = db.record_page(user.id, 3).await?;
    assert_eq!(last.records.len(), 3);
    assert_eq!(last.records[2].original_fname, "img_0.jpg");

    // Page 0 is coerced to the first page; pages past the end are empty.
    let coerced = db.record_page(user.id, 0).await?;
    assert_eq!(coerced.page, 1);
    assert_eq!(coerced.records.len(), HISTORY_PAGE_SIZE as usize);
    let beyond = db.record_page(user.id, 9).await?;
    assert!(beyond.records.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_empty_history_has_one_page() -> anyhow::Result<()> {
    let (db, user, _dir) = setup().await?;

    let page = db.record_page(user.id, 1).await?;
    assert!(page.records.is_empty());
    assert_eq!(page.total_pages, 1);
    assert_eq!(page.total_records, 0);

    Ok(())
}

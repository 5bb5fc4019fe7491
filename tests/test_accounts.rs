//! Integration tests for user accounts, profiles, sessions and password
//! reset tokens.

mod common;

use common::*;
use spotter::core::db::{
    PasswordResetRepository, ProfileRepository, ProfileUpdate, SessionRepository, UserUpdate,
};

#[tokio::test]
async fn test_add_user_creates_profile() -> anyhow::Result<()> {
    let (db, _dir) = create_test_db().await;

    let user = db.add_user(&make_new_user("alice", "alice@example.com")).await?;
    assert!(user.id > 0);
    assert_eq!(user.username, "alice");
    assert!(!user.is_verified);

    let profile = db.get_profile(user.id).await?.expect("profile row missing");
    assert_eq!(profile.user_id, user.id);
    assert_eq!(profile.bio, "");
    assert_eq!(profile.avatar_fname, None);

    Ok(())
}

#[tokio::test]
async fn test_duplicate_email_rejected_case_insensitively() -> anyhow::Result<()> {
    let (db, _dir) = create_test_db().await;

    db.add_user(&make_new_user("alice", "alice@example.com")).await?;
    assert!(db.email_taken("ALICE@Example.COM", None).await?);

    let result = db.add_user(&make_new_user("bob", "Alice@example.com")).await;
    assert!(result.is_err());

    // The owner is allowed to keep their own email on update.
    let alice = db.get_user_by_username("alice").await?.unwrap();
    assert!(!db.email_taken("alice@example.com", Some(alice.id)).await?);

    Ok(())
}

#[tokio::test]
async fn test_update_user_partial_fields() -> anyhow::Result<()> {
    let (db, _dir) = create_test_db().await;
    let user = db.add_user(&make_new_user("alice", "alice@example.com")).await?;

    let birth_date = time::Date::from_calendar_date(1990, time::Month::June, 15)?;
    let updated = db
        .update_user(
            &user,
            &UserUpdate {
                first_name: Some("Alicja".to_string()),
                birth_date: Some(Some(birth_date)),
                ..UserUpdate::default()
            },
        )
        .await?;
    assert_eq!(updated.first_name, "Alicja");
    assert_eq!(updated.birth_date, Some(birth_date));
    // Untouched fields survive.
    assert_eq!(updated.username, "alice");
    assert_eq!(updated.email, "alice@example.com");

    // An explicit null clears the date.
    let cleared = db
        .update_user(
            &updated,
            &UserUpdate {
                birth_date: Some(None),
                ..UserUpdate::default()
            },
        )
        .await?;
    assert_eq!(cleared.birth_date, None);
    assert_eq!(cleared.first_name, "Alicja");

    Ok(())
}

#[tokio::test]
async fn test_password_hash_round_trip() -> anyhow::Result<()> {
    let (db, _dir) = create_test_db().await;
    let user = db.add_user(&make_new_user("alice", "alice@example.com")).await?;

    let hash = db.get_password_hash(user.id).await?;
    assert!(spotter::auth::verify_password(&hash, "hunter2-hunter2")?);
    assert!(!spotter::auth::verify_password(&hash, "wrong-password")?);

    let new_hash = spotter::auth::hash_password("completely-new-pass")?;
    db.set_password_hash(user.id, &new_hash).await?;
    let stored = db.get_password_hash(user.id).await?;
    assert!(spotter::auth::verify_password(&stored, "completely-new-pass")?);

    Ok(())
}

#[tokio::test]
async fn test_profile_update_and_avatar_clear() -> anyhow::Result<()> {
    let (db, _dir) = create_test_db().await;
    let user = db.add_user(&make_new_user("alice", "alice@example.com")).await?;
    let profile = db.get_profile(user.id).await?.unwrap();

    let profile = db
        .update_profile(
            &profile,
            &ProfileUpdate {
                bio: Some("I photograph street dogs.".to_string()),
                website: Some("https://example.com".to_string()),
                avatar_fname: Some(Some("abc.png".to_string())),
                ..ProfileUpdate::default()
            },
        )
        .await?;
    assert_eq!(profile.bio, "I photograph street dogs.");
    assert_eq!(profile.avatar_fname.as_deref(), Some("abc.png"));

    let profile = db
        .update_profile(
            &profile,
            &ProfileUpdate {
                avatar_fname: Some(None),
                ..ProfileUpdate::default()
            },
        )
        .await?;
    assert_eq!(profile.avatar_fname, None);
    assert_eq!(profile.bio, "I photograph street dogs.");

    Ok(())
}

#[tokio::test]
async fn test_session_lifecycle() -> anyhow::Result<()> {
    let (db, _dir) = create_test_db().await;
    let user = db.add_user(&make_new_user("alice", "alice@example.com")).await?;

    let session = db.create_session(user.id).await?;
    let resolved = db.get_session_user(session.token).await?;
    assert_eq!(resolved.map(|u| u.id), Some(user.id));

    db.delete_session(session.token).await?;
    assert!(db.get_session_user(session.token).await?.is_none());

    // Unknown tokens resolve to nothing rather than an error.
    assert!(db.get_session_user(uuid::Uuid::new_v4()).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_expired_session_does_not_resolve() -> anyhow::Result<()> {
    let (db, dir) = create_test_db().await;
    let user = db.add_user(&make_new_user("alice", "alice@example.com")).await?;
    let session = db.create_session(user.id).await?;

    let mut raw = raw_test_db(&dir).await;
    sqlx::query("UPDATE session SET expires_at = '2000-01-01T00:00:00Z' WHERE token = ?1")
        .bind(session.token.to_string())
        .execute(&mut raw)
        .await?;

    assert!(db.get_session_user(session.token).await?.is_none());

    // The stale row is deleted, not just skipped.
    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM session WHERE token = ?1")
        .bind(session.token.to_string())
        .fetch_one(&mut raw)
        .await?;
    assert_eq!(remaining, 0);

    Ok(())
}

#[tokio::test]
async fn test_reset_token_is_single_use() -> anyhow::Result<()> {
    let (db, _dir) = create_test_db().await;
    let user = db.add_user(&make_new_user("alice", "alice@example.com")).await?;

    let token = db.create_reset_token(user.id).await?;
    assert_eq!(db.consume_reset_token(token).await?, Some(user.id));
    assert_eq!(db.consume_reset_token(token).await?, None);
    assert_eq!(db.consume_reset_token(uuid::Uuid::new_v4()).await?, None);

    Ok(())
}

#[tokio::test]
async fn test_expired_reset_token_is_not_redeemable() -> anyhow::Result<()> {
    let (db, dir) = create_test_db().await;
    let user = db.add_user(&make_new_user("alice", "alice@example.com")).await?;
    let token = db.create_reset_token(user.id).await?;

    let mut raw = raw_test_db(&dir).await;
    sqlx::query(
        "UPDATE password_reset_token SET expires_at = '2000-01-01T00:00:00Z' WHERE token = ?1",
    )
    .bind(token.to_string())
    .execute(&mut raw)
    .await?;

    assert_eq!(db.consume_reset_token(token).await?, None);

    Ok(())
}

#[tokio::test]
async fn test_delete_user_cascades() -> anyhow::Result<()> {
    let (db, _dir) = create_test_db().await;
    let user = db.add_user(&make_new_user("alice", "alice@example.com")).await?;
    let user_id = user.id;

    let session = db.create_session(user_id).await?;
    db.add_record(&NewDetectionRecord {
        user_id,
        original_fname: "img.jpg".to_string(),
    })
    .await?;

    db.delete_user(user).await?;

    assert!(db.get_user_by_id(user_id).await?.is_none());
    assert!(db.get_profile(user_id).await?.is_none());
    assert!(db.get_session_user(session.token).await?.is_none());
    assert!(db.recent_records(user_id, 10).await?.is_empty());

    Ok(())
}

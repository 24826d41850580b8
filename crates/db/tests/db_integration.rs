//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `osccai_test`)
//!   `TEST_DB_PASSWORD` (default: `osccai_test`)

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use osccai_common::AppError;
use osccai_db::{
    entities::{community_model, participant, poll, statement, vote},
    map_db_err,
    repositories::{ParticipantRepository, StatementRepository},
    test_utils::{TestDatabase, TestDbConfig},
};
use sea_orm::{ActiveModelTrait, Set};

async fn seed_statement(db: &TestDatabase) -> (String, String) {
    let conn = db.connection();
    let now = Utc::now();

    community_model::ActiveModel {
        id: Set("m1".to_string()),
        owner_id: Set("owner".to_string()),
        name: Set("Riverside".to_string()),
        goal: Set("Clean river".to_string()),
        bio: Set(None),
        active_constitution_id: Set(None),
        published: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(None),
    }
    .insert(conn)
    .await
    .unwrap();

    poll::ActiveModel {
        id: Set("p1".to_string()),
        community_model_id: Set("m1".to_string()),
        title: Set("Parks".to_string()),
        description: Set(None),
        published: Set(true),
        require_auth: Set(false),
        allow_participant_statements: Set(true),
        max_votes_per_participant: Set(None),
        min_votes_before_submission: Set(None),
        max_submissions_per_participant: Set(None),
        min_required_submissions: Set(None),
        completion_message: Set(None),
        deleted: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(None),
    }
    .insert(conn)
    .await
    .unwrap();

    statement::ActiveModel {
        id: Set("s1".to_string()),
        poll_id: Set("p1".to_string()),
        text: Set("More benches".to_string()),
        participant_id: Set(None),
        status: Set(statement::StatementStatus::Approved),
        agree_count: Set(0),
        disagree_count: Set(0),
        pass_count: Set(0),
        is_constitutionable: Set(None),
        gac_score: Set(None),
        priority_score: Set(None),
        last_calculated_at: Set(None),
        deleted: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(None),
    }
    .insert(conn)
    .await
    .unwrap();

    participant::ActiveModel {
        id: Set("pa1".to_string()),
        user_id: Set(None),
        anonymous_id: Set(Some("anon-1".to_string())),
        created_at: Set(now.into()),
    }
    .insert(conn)
    .await
    .unwrap();

    ("s1".to_string(), "pa1".to_string())
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(config.database_url().starts_with("postgres://"));
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_migrations_apply_on_fresh_database() {
    let db = TestDatabase::create_unique().await.unwrap();
    let (statement_id, _) = seed_statement(&db).await;

    let repo = StatementRepository::new(db.shared_connection().await.unwrap());
    let found = repo.get_by_id(&statement_id).await.unwrap();
    assert_eq!(found.agree_count, 0);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_duplicate_vote_is_conflict() {
    let db = TestDatabase::create_unique().await.unwrap();
    let (statement_id, participant_id) = seed_statement(&db).await;
    let now = Utc::now();

    let make_vote = |id: &str| vote::ActiveModel {
        id: Set(id.to_string()),
        statement_id: Set(statement_id.clone()),
        participant_id: Set(participant_id.clone()),
        vote_value: Set(vote::VoteValue::Agree),
        created_at: Set(now.into()),
        updated_at: Set(None),
    };

    make_vote("v1").insert(db.connection()).await.unwrap();
    let err = make_vote("v2")
        .insert(db.connection())
        .await
        .map_err(map_db_err)
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_duplicate_anonymous_participant_is_conflict() {
    let db = TestDatabase::create_unique().await.unwrap();
    seed_statement(&db).await;

    let repo = ParticipantRepository::new(db.shared_connection().await.unwrap());
    let err = repo
        .create(participant::ActiveModel {
            id: Set("pa2".to_string()),
            user_id: Set(None),
            anonymous_id: Set(Some("anon-1".to_string())),
            created_at: Set(Utc::now().into()),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));

    db.drop_database().await.unwrap();
}

#[cfg(test)]
mod tests {
    use crate::{
        db::{
            clean_expired_sessions, create_user_session, get_session_by_token, invalidate_session,
        },
        error::AppError,
        test::test_db::TestDbBuilder,
    };
    use chrono::{Duration, NaiveDateTime, Utc};
    use sqlx::{Pool, Sqlite};
    use uuid::Uuid;

    const SESSION_USER: &str = "test_session_user";

    async fn create_test_session() -> (String, NaiveDateTime, Pool<Sqlite>) {
        let test_db = TestDbBuilder::new()
            .student(SESSION_USER)
            .build()
            .await
            .expect("Failed to build test database");

        let token = format!("test_token_{}", Uuid::new_v4());

        let expires_at = (Utc::now() + Duration::hours(1)).naive_utc();

        (token, expires_at, test_db.pool)
    }

    #[rocket::async_test]
    async fn test_create_and_get_session() {
        let (token, expires_at, pool) = create_test_session().await;

        let session_id = create_user_session(&pool, SESSION_USER, &token, expires_at)
            .await
            .expect("Failed to create session");

        assert!(session_id > 0, "Session ID should be positive");

        let session = get_session_by_token(&pool, &token)
            .await
            .expect("Failed to get session");

        assert_eq!(session.username, SESSION_USER);
        assert_eq!(session.token, token);

        let expires_diff =
            (session.expires_at.and_utc().timestamp() - expires_at.and_utc().timestamp()).abs();
        assert!(
            expires_diff <= 1,
            "Expiration timestamps should match within 1 second"
        );
    }

    #[rocket::async_test]
    async fn test_get_nonexistent_session() {
        let test_db = TestDbBuilder::new()
            .build()
            .await
            .expect("Failed to build test database");

        let result = get_session_by_token(&test_db.pool, "nonexistent_token").await;

        match result {
            Err(AppError::Authentication(msg)) => assert_eq!(msg, "Invalid session token"),
            other => panic!("Expected Authentication error, got {:?}", other.map(|s| s.id)),
        }
    }

    #[rocket::async_test]
    async fn test_session_requires_existing_account() {
        let (token, expires_at, pool) = create_test_session().await;

        let result = create_user_session(&pool, "nobody", &token, expires_at).await;

        assert!(result.is_err(), "Session for unknown account should fail");
    }

    #[rocket::async_test]
    async fn test_invalidate_session() {
        let (token, expires_at, pool) = create_test_session().await;

        create_user_session(&pool, SESSION_USER, &token, expires_at)
            .await
            .expect("Failed to create session");

        let session = get_session_by_token(&pool, &token).await;
        assert!(session.is_ok(), "Session should exist before invalidation");

        invalidate_session(&pool, &token)
            .await
            .expect("Failed to invalidate session");

        let result = get_session_by_token(&pool, &token).await;
        assert!(
            result.is_err(),
            "Session should not exist after invalidation"
        );
    }

    #[rocket::async_test]
    async fn test_clean_expired_sessions() {
        let (_, _, pool) = create_test_session().await;

        let token1 = format!("test_token_expired_{}", Uuid::new_v4());
        let token2 = format!("test_token_soon_{}", Uuid::new_v4());
        let token3 = format!("test_token_later_{}", Uuid::new_v4());

        let expired_at = (Utc::now() - Duration::hours(1)).naive_utc();
        create_user_session(&pool, SESSION_USER, &token1, expired_at)
            .await
            .expect("Failed to create expired session");

        let expires_soon = (Utc::now() + Duration::minutes(1)).naive_utc();
        create_user_session(&pool, SESSION_USER, &token2, expires_soon)
            .await
            .expect("Failed to create expiring soon session");

        let expires_later = (Utc::now() + Duration::days(1)).naive_utc();
        create_user_session(&pool, SESSION_USER, &token3, expires_later)
            .await
            .expect("Failed to create future session");

        let cleaned_count = clean_expired_sessions(&pool)
            .await
            .expect("Failed to clean expired sessions");

        assert_eq!(
            cleaned_count, 1,
            "Should have cleaned exactly 1 expired session"
        );

        assert!(get_session_by_token(&pool, &token1).await.is_err());
        assert!(get_session_by_token(&pool, &token2).await.is_ok());
        assert!(get_session_by_token(&pool, &token3).await.is_ok());
    }

    #[rocket::async_test]
    async fn test_session_validity() {
        let (token, expires_at, pool) = create_test_session().await;

        let expired_token = format!("test_token_expired_{}", Uuid::new_v4());
        let expired_at = (Utc::now() - Duration::hours(1)).naive_utc();

        create_user_session(&pool, SESSION_USER, &expired_token, expired_at)
            .await
            .expect("Failed to create expired session");

        let session = get_session_by_token(&pool, &expired_token)
            .await
            .expect("Should be able to retrieve expired session");

        assert!(!session.is_valid(), "Expired session should be invalid");

        create_user_session(&pool, SESSION_USER, &token, expires_at)
            .await
            .expect("Failed to create valid session");

        let valid_session = get_session_by_token(&pool, &token)
            .await
            .expect("Should be able to retrieve valid session");

        assert!(valid_session.is_valid(), "Future session should be valid");
    }
}

#[cfg(test)]
mod tests {
    use crate::auth::{Permission, Role};
    use crate::db::{
        Registration, authenticate_user, find_user_by_username, get_profile, get_user,
        get_users_by_role, list_profiles, promote_user, register_user, register_user_with_profile,
        update_user_password,
    };
    use crate::error::AppError;
    use crate::test::test_db::{STANDARD_PASSWORD, TestDbBuilder, sample_profile};

    #[rocket::async_test]
    async fn test_register_then_duplicate() {
        let test_db = TestDbBuilder::new().build().await.unwrap();
        let pool = &test_db.pool;

        let first = register_user(pool, "carla", "s3cret!").await.unwrap();
        let second = register_user(pool, "carla", "another").await.unwrap();

        assert_eq!(first, Registration::Created);
        assert_eq!(second, Registration::AlreadyExists);

        // The original password still works after the rejected registration.
        assert!(authenticate_user(pool, "carla", "s3cret!").await.unwrap().is_some());
        assert!(authenticate_user(pool, "carla", "another").await.unwrap().is_none());
    }

    #[rocket::async_test]
    async fn test_new_accounts_are_students() {
        let test_db = TestDbBuilder::new().student("dani").build().await.unwrap();

        let user = get_user(&test_db.pool, "dani").await.unwrap();

        assert_eq!(user.role, Role::Student);
        assert!(user.has_permission(Permission::LogOwnWorkouts));
        assert!(!user.has_permission(Permission::ViewAllProfiles));
        assert!(matches!(
            user.require_permission(Permission::PromoteUsers),
            Err(AppError::Authorization(_))
        ));
        assert!(matches!(
            user.require_all_permissions(&[Permission::LogOwnWorkouts, Permission::ExportAllWorkouts]),
            Err(AppError::Authorization(_))
        ));
    }

    #[rocket::async_test]
    async fn test_register_rejects_blank_credentials() {
        let test_db = TestDbBuilder::new().build().await.unwrap();

        let blank_user = register_user(&test_db.pool, "   ", "password").await;
        let blank_password = register_user(&test_db.pool, "someone", "").await;

        assert!(matches!(blank_user, Err(AppError::Validation(_))));
        assert!(matches!(blank_password, Err(AppError::Validation(_))));
        assert!(
            find_user_by_username(&test_db.pool, "someone")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[rocket::async_test]
    async fn test_authenticate_unknown_user() {
        let test_db = TestDbBuilder::new().student("ana").build().await.unwrap();

        let result = authenticate_user(&test_db.pool, "ghost", STANDARD_PASSWORD)
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[rocket::async_test]
    async fn test_authenticate_returns_current_role() {
        let test_db = TestDbBuilder::new()
            .user_with_password("gil", Role::Admin, "strong_pw")
            .build()
            .await
            .unwrap();

        let user = authenticate_user(&test_db.pool, "gil", "strong_pw")
            .await
            .unwrap()
            .expect("Valid credentials should authenticate");

        assert_eq!(user.username, "gil");
        assert_eq!(user.role, Role::Admin);
        assert!(user.require_permission(Permission::PromoteUsers).is_ok());
    }

    #[rocket::async_test]
    async fn test_passwords_are_not_stored_in_plain_text() {
        let test_db = TestDbBuilder::new().student("ana").build().await.unwrap();

        let stored: String =
            sqlx::query_scalar("SELECT password_hash FROM accounts WHERE username = ?")
                .bind("ana")
                .fetch_one(&test_db.pool)
                .await
                .unwrap();

        assert_ne!(stored, STANDARD_PASSWORD);
        assert!(bcrypt::verify(STANDARD_PASSWORD, &stored).unwrap());
    }

    #[rocket::async_test]
    async fn test_register_with_profile_is_atomic() {
        let test_db = TestDbBuilder::new()
            .student("ana")
            .build()
            .await
            .unwrap();
        let pool = &test_db.pool;

        let created = register_user_with_profile(pool, "eva", "password", &sample_profile("Eva", 4))
            .await
            .unwrap();
        assert_eq!(created, Registration::Created);
        assert_eq!(
            get_profile(pool, "eva").await.unwrap().unwrap().fields.full_name,
            "Eva"
        );

        // Taken username: no profile is written for it.
        let duplicate =
            register_user_with_profile(pool, "ana", "password", &sample_profile("Impostor", 4))
                .await
                .unwrap();
        assert_eq!(duplicate, Registration::AlreadyExists);
        assert!(get_profile(pool, "ana").await.unwrap().is_none());
    }

    #[rocket::async_test]
    async fn test_register_with_invalid_profile_creates_nothing() {
        let test_db = TestDbBuilder::new().build().await.unwrap();

        let mut profile = sample_profile("Fabio", 3);
        profile.weekly_target = 9;

        let result = register_user_with_profile(&test_db.pool, "fabio", "password", &profile).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(
            find_user_by_username(&test_db.pool, "fabio")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[rocket::async_test]
    async fn test_promote_user() {
        let test_db = TestDbBuilder::new()
            .student("ana")
            .student("bruno")
            .build()
            .await
            .unwrap();
        let pool = &test_db.pool;

        promote_user(pool, "bruno").await.unwrap();

        let admins = get_users_by_role(pool, Role::Admin).await.unwrap();
        let students = get_users_by_role(pool, Role::Student).await.unwrap();

        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].username, "bruno");
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].username, "ana");
    }

    #[rocket::async_test]
    async fn test_promote_unknown_user() {
        let test_db = TestDbBuilder::new().build().await.unwrap();

        let result = promote_user(&test_db.pool, "ghost").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[rocket::async_test]
    async fn test_list_profiles_is_not_gated() {
        let test_db = TestDbBuilder::new()
            .student("ana")
            .student("bruno")
            .profile("bruno", sample_profile("Bruno Costa", 2))
            .profile("ana", sample_profile("Ana Lima", 3))
            .build()
            .await
            .unwrap();

        let profiles = list_profiles(&test_db.pool).await.unwrap();

        let usernames: Vec<&str> = profiles.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(usernames, vec!["ana", "bruno"]);
    }

    #[rocket::async_test]
    async fn test_update_password() {
        let test_db = TestDbBuilder::new().student("ana").build().await.unwrap();
        let pool = &test_db.pool;

        update_user_password(pool, "ana", "new_password").await.unwrap();

        assert!(authenticate_user(pool, "ana", STANDARD_PASSWORD).await.unwrap().is_none());
        assert!(authenticate_user(pool, "ana", "new_password").await.unwrap().is_some());
    }
}

#[cfg(test)]
pub mod test_db {
    use crate::auth::Role;
    use crate::database::migrate;
    use crate::db::{append_workout, promote_user, register_user, upsert_profile};
    use crate::error::AppError;
    use crate::models::{NewWorkout, ProfileFields};
    use chrono::NaiveDate;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use std::sync::Once;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        profiles: Vec<(String, ProfileFields)>,
        workouts: Vec<(String, NewWorkout)>,
    }

    pub struct TestUser {
        pub username: String,
        pub role: Role,
        pub password: String,
    }

    pub fn sample_profile(full_name: &str, weekly_target: i64) -> ProfileFields {
        ProfileFields {
            full_name: full_name.to_string(),
            birth_date: NaiveDate::from_ymd_opt(1995, 6, 15).unwrap(),
            weight_kg: 72.5,
            height_cm: 178.0,
            medical_note: String::new(),
            weekly_target,
        }
    }

    pub fn sample_workout(date: &str, exercise: &str, reps: i64, sets: i64, weight_kg: f64) -> NewWorkout {
        NewWorkout {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            routine: "Full body".to_string(),
            exercise: exercise.to_string(),
            reps,
            sets,
            weight_kg,
        }
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn student(mut self, username: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                role: Role::Student,
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn admin(mut self, username: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                role: Role::Admin,
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn user_with_password(mut self, username: &str, role: Role, password: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                role,
                password: password.to_string(),
            });
            self
        }

        pub fn profile(mut self, username: &str, fields: ProfileFields) -> Self {
            self.profiles.push((username.to_string(), fields));
            self
        }

        pub fn workout(mut self, owner: &str, workout: NewWorkout) -> Self {
            self.workouts.push((owner.to_string(), workout));
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder()
                    .parse_filters("debug")
                    .is_test(true)
                    .try_init();
            });

            // One connection that never recycles, otherwise each new
            // connection would open its own empty in-memory database.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?;

            migrate(&pool).await?;

            for user in &self.users {
                register_user(&pool, &user.username, &user.password).await?;
                if user.role == Role::Admin {
                    promote_user(&pool, &user.username).await?;
                }
            }

            for (username, fields) in &self.profiles {
                upsert_profile(&pool, username, fields).await?;
            }

            for (owner, workout) in &self.workouts {
                append_workout(&pool, owner, workout).await?;
            }

            Ok(TestDb { pool })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::test_db::{STANDARD_PASSWORD, TestDb, TestDbBuilder, sample_profile, sample_workout};
    use crate::env::AppConfig;
    use crate::init_rocket;
    use rocket::http::{ContentType, Cookie, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::json;
    use sqlx::{Pool, Sqlite};

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .student("ana")
            .student("bruno")
            .admin("admin_user")
            .profile("ana", sample_profile("Ana Lima", 3))
            .profile("bruno", sample_profile("Bruno Costa", 2))
            .workout("ana", sample_workout("2024-03-04", "Squat", 5, 5, 80.0))
            .workout("ana", sample_workout("2024-03-04", "Bench press", 8, 3, 60.0))
            .workout("ana", sample_workout("2024-03-06", "Deadlift", 5, 3, 100.0))
            .workout("bruno", sample_workout("2024-03-05", "Row", 10, 3, 40.0))
            .build()
            .await
            .expect("Failed to build test database")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, Pool<Sqlite>) {
        let pool = test_db.pool.clone();
        let config = AppConfig {
            database_url: "sqlite::memory:".to_string(),
            report_lines_per_page: 17,
            ..AppConfig::default()
        };

        let rocket = init_rocket(test_db.pool, config).await;
        let client = Client::untracked(rocket)
            .await
            .expect("Failed to build Rocket client");

        (client, pool)
    }

    pub async fn login_test_user(client: &Client, username: &str) -> Vec<Cookie<'static>> {
        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": username,
                    "password": STANDARD_PASSWORD
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);

        response
            .cookies()
            .iter()
            .map(|cookie| cookie.clone().into_owned())
            .collect()
    }
}

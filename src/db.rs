use crate::{
    auth::{DbUser, DbUserSession, Role, User, UserSession},
    error::AppError,
    models::{DbProfile, NewWorkout, Post, Profile, ProfileFields, WorkoutEntry, non_blank},
};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use sqlx::{Executor, Pool, Sqlite};
use tracing::{info, instrument, warn};
use validator::Validate;

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created,
    AlreadyExists,
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

fn require_non_blank(field: &str, value: &str) -> Result<(), AppError> {
    non_blank(value).map_err(|_| AppError::Validation(format!("{} must not be blank", field)))
}

// Credential store

#[instrument(skip_all, fields(username = %username))]
pub async fn register_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Registration, AppError> {
    info!("Registering new user");
    require_non_blank("username", username)?;
    require_non_blank("password", password)?;

    let password_hash = bcrypt::hash(password, HASH_COST)?;

    let res = sqlx::query("INSERT INTO accounts (username, password_hash, role) VALUES (?, ?, ?)")
        .bind(username)
        .bind(password_hash)
        .bind(Role::Student.as_str())
        .execute(pool)
        .await;

    match res {
        Ok(_) => Ok(Registration::Created),
        Err(e) if is_unique_violation(&e) => {
            warn!("Username already exists");
            Ok(Registration::AlreadyExists)
        }
        Err(e) => Err(e.into()),
    }
}

/// Creates the account and its profile together; a taken username writes neither.
#[instrument(skip_all, fields(username = %username))]
pub async fn register_user_with_profile(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
    profile: &ProfileFields,
) -> Result<Registration, AppError> {
    info!("Registering new user with profile");
    require_non_blank("username", username)?;
    require_non_blank("password", password)?;
    profile.validate()?;

    let password_hash = bcrypt::hash(password, HASH_COST)?;

    let mut tx = pool.begin().await?;

    let res = sqlx::query("INSERT INTO accounts (username, password_hash, role) VALUES (?, ?, ?)")
        .bind(username)
        .bind(password_hash)
        .bind(Role::Student.as_str())
        .execute(&mut *tx)
        .await;

    match res {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            warn!("Username already exists");
            tx.rollback().await?;
            return Ok(Registration::AlreadyExists);
        }
        Err(e) => return Err(e.into()),
    }

    write_profile(&mut *tx, username, profile).await?;

    tx.commit().await?;

    Ok(Registration::Created)
}

#[instrument(skip_all, fields(username = %username))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");

    let password_hash: Option<String> =
        sqlx::query_scalar("SELECT password_hash FROM accounts WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;

    let Some(password_hash) = password_hash else {
        return Ok(None);
    };

    match bcrypt::verify(password, &password_hash) {
        Ok(true) => Ok(Some(get_user(pool, username).await?)),
        _ => Ok(None),
    }
}

/// Sets the role to admin. Callers are responsible for checking that the
/// acting user may do this.
#[instrument(skip(pool))]
pub async fn promote_user(pool: &Pool<Sqlite>, username: &str) -> Result<(), AppError> {
    info!("Promoting user to admin");

    let res = sqlx::query("UPDATE accounts SET role = ? WHERE username = ?")
        .bind(Role::Admin.as_str())
        .bind(username)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "User with username {} not found in database",
            username
        )));
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn find_user_by_username(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<User>, AppError> {
    info!("Finding user by username");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT username, role, created_at FROM accounts WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    row.map(User::try_from).transpose()
}

#[instrument(skip(pool))]
pub async fn get_user(pool: &Pool<Sqlite>, username: &str) -> Result<User, AppError> {
    match find_user_by_username(pool, username).await? {
        Some(user) => Ok(user),
        _ => Err(AppError::NotFound(format!(
            "User with username {} not found in database",
            username
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn get_users_by_role(pool: &Pool<Sqlite>, role: Role) -> Result<Vec<User>, AppError> {
    info!(role = %role, "Getting users by role");

    let rows = sqlx::query_as::<_, DbUser>(
        "SELECT username, role, created_at FROM accounts WHERE role = ? ORDER BY username",
    )
    .bind(role.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(User::try_from).collect()
}

#[instrument(skip_all, fields(username = %username))]
pub async fn update_user_password(
    pool: &Pool<Sqlite>,
    username: &str,
    new_password: &str,
) -> Result<(), AppError> {
    info!("Updating user password");
    require_non_blank("password", new_password)?;

    let password_hash = bcrypt::hash(new_password, HASH_COST)?;

    sqlx::query("UPDATE accounts SET password_hash = ? WHERE username = ?")
        .bind(password_hash)
        .bind(username)
        .execute(pool)
        .await?;

    Ok(())
}

// Record store

async fn write_profile<'e, E>(
    executor: E,
    username: &str,
    profile: &ProfileFields,
) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT OR REPLACE INTO profiles
         (username, full_name, birth_date, weight_kg, height_cm, medical_note, weekly_target)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(username)
    .bind(&profile.full_name)
    .bind(profile.birth_date)
    .bind(profile.weight_kg)
    .bind(profile.height_cm)
    .bind(&profile.medical_note)
    .bind(profile.weekly_target)
    .execute(executor)
    .await?;

    Ok(())
}

#[instrument(skip(pool, profile))]
pub async fn upsert_profile(
    pool: &Pool<Sqlite>,
    username: &str,
    profile: &ProfileFields,
) -> Result<(), AppError> {
    info!("Replacing profile");
    require_non_blank("username", username)?;
    profile.validate()?;

    write_profile(pool, username, profile).await
}

#[instrument(skip(pool))]
pub async fn get_profile(pool: &Pool<Sqlite>, username: &str) -> Result<Option<Profile>, AppError> {
    info!("Getting profile");
    let row = sqlx::query_as::<_, DbProfile>("SELECT * FROM profiles WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(Profile::from))
}

/// Every profile row. Not gated here; the API layer checks the caller's role.
#[instrument(skip(pool))]
pub async fn list_profiles(pool: &Pool<Sqlite>) -> Result<Vec<Profile>, AppError> {
    info!("Listing all profiles");
    let rows = sqlx::query_as::<_, DbProfile>("SELECT * FROM profiles ORDER BY username")
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(Profile::from).collect())
}

#[instrument(skip(pool, workout))]
pub async fn append_workout(
    pool: &Pool<Sqlite>,
    owner: &str,
    workout: &NewWorkout,
) -> Result<i64, AppError> {
    info!("Appending workout");
    require_non_blank("owner", owner)?;
    workout.validate()?;

    let res = sqlx::query(
        "INSERT INTO workouts (owner, date, routine, exercise, reps, sets, weight_kg)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(owner)
    .bind(workout.date)
    .bind(&workout.routine)
    .bind(&workout.exercise)
    .bind(workout.reps)
    .bind(workout.sets)
    .bind(workout.weight_kg)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn list_workouts(
    pool: &Pool<Sqlite>,
    owner: &str,
) -> Result<Vec<WorkoutEntry>, AppError> {
    info!("Listing workouts");
    let rows = sqlx::query_as::<_, WorkoutEntry>(
        "SELECT id, owner, date, routine, exercise, reps, sets, weight_kg
         FROM workouts
         WHERE owner = ?
         ORDER BY id",
    )
    .bind(owner)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn list_all_workouts(pool: &Pool<Sqlite>) -> Result<Vec<WorkoutEntry>, AppError> {
    info!("Listing workouts for every owner");
    let rows = sqlx::query_as::<_, WorkoutEntry>(
        "SELECT id, owner, date, routine, exercise, reps, sets, weight_kg
         FROM workouts
         ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// Wall

#[instrument(skip(pool, body))]
pub async fn create_post(
    pool: &Pool<Sqlite>,
    author: &str,
    body: &str,
    date: NaiveDate,
) -> Result<i64, AppError> {
    info!("Creating post");
    require_non_blank("author", author)?;
    require_non_blank("body", body)?;

    let res = sqlx::query("INSERT INTO posts (author, body, date) VALUES (?, ?, ?)")
        .bind(author)
        .bind(body)
        .bind(date)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn list_posts(pool: &Pool<Sqlite>) -> Result<Vec<Post>, AppError> {
    info!("Listing posts");
    let rows = sqlx::query_as::<_, Post>(
        "SELECT id, author, body, date, created_at FROM posts ORDER BY id DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// Sessions

#[instrument(skip(pool, token))]
pub async fn create_user_session(
    pool: &Pool<Sqlite>,
    username: &str,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating user session");

    let res =
        sqlx::query("INSERT INTO user_sessions (username, token, expires_at) VALUES (?, ?, ?)")
            .bind(username)
            .bind(token)
            .bind(expires_at)
            .execute(pool)
            .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<UserSession, AppError> {
    info!("Getting session by token");

    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT id, username, token, created_at, expires_at FROM user_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(UserSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired sessions");

    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

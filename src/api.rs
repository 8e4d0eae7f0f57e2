use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rocket::http::{ContentType, Cookie, CookieJar, SameSite, Status};
use rocket::response::status::Custom;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use rocket::{Request, State, get, post, put};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, Role, SESSION_COOKIE, User, UserSession};
use crate::db::{
    Registration, append_workout, authenticate_user, create_post, create_user_session,
    get_profile, get_users_by_role, invalidate_session, list_all_workouts, list_posts,
    list_profiles, list_workouts, promote_user, register_user_with_profile, update_user_password,
    upsert_profile,
};
use crate::env::AppConfig;
use crate::error::AppError;
use crate::export::{csv_filename, render_report, report_filename, workouts_csv_string};
use crate::models::{NewWorkout, Post, Profile, ProfileFields, WorkoutEntry, non_blank};
use crate::progress::{
    DayStat, WeeklyAttendance, calendar, daily_histogram, week_bounds, weekly_attendance,
};
use crate::validation::{
    ApiError, AppErrorExt, JsonValidateExt, ToValidationResponse, ValidationResponse,
    validate_fields,
};

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]{3,32}$").expect("username pattern is valid"));

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(custom(function = "non_blank"))]
    username: String,
    #[validate(custom(function = "non_blank"))]
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserData>,
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserData {
    pub username: String,
    pub role: String,
    pub created_at: String,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            role: user.role.to_string(),
            created_at: user.created_at.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CreatedResponse {
    pub id: i64,
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<LoginResponse>, ApiError> {
    let validated = login.validate_custom()?;

    match authenticate_user(db, &validated.username, &validated.password)
        .await
        .validate_custom()?
    {
        Some(user) => {
            let token = UserSession::generate_token();
            let expires_at = Utc::now() + chrono::Duration::hours(config.session_hours);

            create_user_session(db, &user.username, &token, expires_at.naive_utc())
                .await
                .validate_custom()?;

            cookies.add_private(
                Cookie::build((SESSION_COOKIE, token))
                    .same_site(SameSite::Lax)
                    .http_only(true)
                    .max_age(rocket::time::Duration::hours(config.session_hours)),
            );

            Ok(Json(LoginResponse {
                success: true,
                user: Some(UserData::from(user)),
                error: None,
            }))
        }
        None => Ok(Json(LoginResponse {
            success: false,
            user: None,
            error: Some("Invalid username or password".to_string()),
        })),
    }
}

#[post("/logout")]
pub async fn api_logout(cookies: &CookieJar<'_>, db: &State<Pool<Sqlite>>) -> Status {
    let token = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        if let Err(e) = invalidate_session(db, &token).await {
            e.log_and_record("Logout");
        }
    }

    cookies.remove_private(SESSION_COOKIE);

    Status::Ok
}

#[derive(Deserialize, Validate)]
pub struct RegistrationRequest {
    #[validate(regex(
        path = *USERNAME_RE,
        message = "Username must be 3-32 letters, digits, '.', '_' or '-'"
    ))]
    username: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    password: String,
    #[validate(nested)]
    profile: ProfileFields,
}

#[post("/register", data = "<registration>")]
pub async fn api_register_user(
    registration: Json<RegistrationRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    let validated = registration.validate_custom()?;

    let outcome = register_user_with_profile(
        db,
        &validated.username,
        &validated.password,
        &validated.profile,
    )
    .await
    .validate_custom()?;

    match outcome {
        Registration::Created => Ok(Status::Created),
        Registration::AlreadyExists => Err(AppError::Conflict(format!(
            "Username {} already exists",
            validated.username
        ))
        .to_validation_response()),
    }
}

#[get("/me")]
pub async fn api_me(user: User) -> Json<UserData> {
    Json(UserData::from(user))
}

#[derive(Deserialize, Validate)]
pub struct PasswordChangeRequest {
    #[validate(custom(function = "non_blank"))]
    current_password: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    new_password: String,
}

#[post("/change-password", data = "<password>")]
pub async fn api_change_password(
    password: Json<PasswordChangeRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    let validated = password.validate_custom()?;

    let is_valid = authenticate_user(db, &user.username, &validated.current_password)
        .await
        .validate_custom()?;

    match is_valid {
        Some(_) => {
            update_user_password(db, &user.username, &validated.new_password)
                .await
                .validate_custom()?;

            Ok(Status::Ok)
        }
        _ => Err(Custom(
            Status::Unauthorized,
            Json(ValidationResponse::with_error(
                "current_password",
                "Current password is incorrect",
            )),
        )),
    }
}

#[get("/profile")]
pub async fn api_get_profile(user: User, db: &State<Pool<Sqlite>>) -> Result<Json<Profile>, Status> {
    user.require_permission(Permission::ViewOwnProfile)?;

    match get_profile(db, &user.username).await? {
        Some(profile) => Ok(Json(profile)),
        None => Err(Status::NotFound),
    }
}

#[put("/profile", data = "<profile>")]
pub async fn api_update_profile(
    profile: Json<ProfileFields>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    user.require_permission(Permission::EditOwnProfile)
        .validate_custom()?;
    let validated = profile.validate_custom()?;

    upsert_profile(db, &user.username, &validated)
        .await
        .validate_custom()?;

    Ok(Status::Ok)
}

#[derive(Deserialize)]
pub struct WorkoutRequest {
    date: Option<NaiveDate>,
    routine: String,
    exercise: String,
    reps: i64,
    sets: i64,
    weight_kg: f64,
}

impl WorkoutRequest {
    fn into_new_workout(self, today: NaiveDate) -> NewWorkout {
        NewWorkout {
            date: self.date.unwrap_or(today),
            routine: self.routine,
            exercise: self.exercise,
            reps: self.reps,
            sets: self.sets,
            weight_kg: self.weight_kg,
        }
    }
}

#[post("/workouts", data = "<workout>")]
pub async fn api_log_workout(
    workout: Json<WorkoutRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<CreatedResponse>>, ApiError> {
    user.require_permission(Permission::LogOwnWorkouts)
        .validate_custom()?;

    let today = Utc::now().date_naive();
    let validated = validate_fields(workout.into_inner().into_new_workout(today))?;

    let id = append_workout(db, &user.username, &validated)
        .await
        .validate_custom()?;

    Ok(Custom(Status::Created, Json(CreatedResponse { id })))
}

#[get("/workouts")]
pub async fn api_get_workouts(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<WorkoutEntry>>, AppError> {
    let workouts = list_workouts(db, &user.username).await?;
    Ok(Json(workouts))
}

#[derive(Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub entries: Vec<WorkoutEntry>,
}

#[get("/workouts/calendar")]
pub async fn api_get_calendar(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<CalendarDay>>, Status> {
    let workouts = list_workouts(db, &user.username).await?;

    let days = calendar(&workouts)
        .into_iter()
        .map(|(date, entries)| CalendarDay { date, entries })
        .collect();

    Ok(Json(days))
}

#[derive(Serialize)]
pub struct ProgressResponse {
    pub days: Vec<DayStat>,
    pub week: Option<WeeklyAttendance>,
}

#[get("/workouts/progress?<week_of>")]
pub async fn api_get_progress(
    week_of: Option<&str>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let week_of = match week_of {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .filter(|day| week_bounds(*day).is_some())
            .ok_or_else(|| {
                Custom(
                    Status::UnprocessableEntity,
                    Json(ValidationResponse::with_error(
                        "week_of",
                        "Expected a date formatted as YYYY-MM-DD within the supported range",
                    )),
                )
            })?,
        None => Utc::now().date_naive(),
    };

    let workouts = list_workouts(db, &user.username)
        .await
        .validate_custom()?;
    let profile = get_profile(db, &user.username).await.validate_custom()?;

    let week = profile
        .and_then(|profile| weekly_attendance(&workouts, week_of, profile.fields.weekly_target));

    Ok(Json(ProgressResponse {
        days: daily_histogram(&workouts),
        week,
    }))
}

#[derive(Deserialize, Validate)]
pub struct PostRequest {
    #[validate(custom(function = "non_blank"))]
    body: String,
}

#[get("/wall")]
pub async fn api_get_wall(_user: User, db: &State<Pool<Sqlite>>) -> Result<Json<Vec<Post>>, AppError> {
    let posts = list_posts(db).await?;
    Ok(Json(posts))
}

#[post("/wall", data = "<post>")]
pub async fn api_create_post(
    post: Json<PostRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<CreatedResponse>>, ApiError> {
    user.require_permission(Permission::PostToWall)
        .validate_custom()?;
    let validated = post.validate_custom()?;

    let id = create_post(db, &user.username, &validated.body, Utc::now().date_naive())
        .await
        .validate_custom()?;

    Ok(Custom(Status::Created, Json(CreatedResponse { id })))
}

/// A file body served as an attachment.
pub struct Download {
    pub filename: String,
    pub content_type: ContentType,
    pub body: String,
}

impl<'r> Responder<'r, 'static> for Download {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        Response::build_from(self.body.respond_to(req)?)
            .header(self.content_type)
            .raw_header(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", self.filename),
            )
            .ok()
    }
}

#[get("/export/workouts.csv?<all>")]
pub async fn api_export_csv(
    all: Option<bool>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Download, Status> {
    let (workouts, filename) = if all.unwrap_or(false) {
        user.require_all_permissions(&[
            Permission::ExportOwnWorkouts,
            Permission::ExportAllWorkouts,
        ])?;
        (list_all_workouts(db).await?, csv_filename(None))
    } else {
        user.require_permission(Permission::ExportOwnWorkouts)?;
        (
            list_workouts(db, &user.username).await?,
            csv_filename(Some(&user.username)),
        )
    };

    Ok(Download {
        filename,
        content_type: ContentType::CSV,
        body: workouts_csv_string(&workouts)?,
    })
}

#[get("/export/report.txt")]
pub async fn api_export_report(
    user: User,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Download, Status> {
    user.require_permission(Permission::ExportOwnWorkouts)?;

    let workouts = list_workouts(db, &user.username).await?;
    let report = render_report(
        &format!("Workouts for {}", user.username),
        &workouts,
        config.report_lines_per_page,
    )?;

    Ok(Download {
        filename: report_filename(&user.username),
        content_type: ContentType::Plain,
        body: report.render(),
    })
}

#[get("/admin/profiles")]
pub async fn api_get_all_profiles(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Profile>>, Status> {
    user.require_permission(Permission::ViewAllProfiles)?;

    let profiles = list_profiles(db).await?;
    Ok(Json(profiles))
}

#[get("/admin/students")]
pub async fn api_get_students(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<UserData>>, Status> {
    user.require_permission(Permission::ViewAllStudents)?;

    let students = get_users_by_role(db, Role::Student).await?;
    Ok(Json(students.into_iter().map(UserData::from).collect()))
}

#[post("/admin/promote/<username>")]
pub async fn api_promote_user(
    username: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Status> {
    user.require_permission(Permission::PromoteUsers)?;

    promote_user(db, username).await?;

    tracing::info!(promoted = %username, by = %user.username, "User promoted to admin");
    Ok(Status::Ok)
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

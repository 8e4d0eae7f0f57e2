use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

pub fn non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("Must not be blank".into()));
    }
    Ok(())
}

pub const EARLIEST_BIRTH_DATE: NaiveDate = match NaiveDate::from_ymd_opt(1900, 1, 1) {
    Some(date) => date,
    None => NaiveDate::MIN,
};

/// Accepts 1900-01-01 up to and including today (UTC).
pub fn valid_birth_date(value: &NaiveDate) -> Result<(), ValidationError> {
    if *value < EARLIEST_BIRTH_DATE || *value > Utc::now().date_naive() {
        return Err(ValidationError::new("birth_date")
            .with_message("Birth date must be between 1900-01-01 and today".into()));
    }
    Ok(())
}

/// Biometric attributes attached to one account. Always written as a whole row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProfileFields {
    #[validate(custom(function = "non_blank"))]
    pub full_name: String,
    #[validate(custom(function = "valid_birth_date"))]
    pub birth_date: NaiveDate,
    #[validate(range(min = 0.0, message = "Weight can't be negative"))]
    pub weight_kg: f64,
    #[validate(range(min = 0.0, message = "Height can't be negative"))]
    pub height_cm: f64,
    #[serde(default)]
    pub medical_note: String,
    #[validate(range(min = 1, max = 7, message = "Weekly target must be between 1 and 7 days"))]
    pub weekly_target: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub username: String,
    #[serde(flatten)]
    pub fields: ProfileFields,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbProfile {
    pub username: String,
    pub full_name: String,
    pub birth_date: NaiveDate,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub medical_note: String,
    pub weekly_target: i64,
}

impl From<DbProfile> for Profile {
    fn from(db: DbProfile) -> Self {
        Self {
            username: db.username,
            fields: ProfileFields {
                full_name: db.full_name,
                birth_date: db.birth_date,
                weight_kg: db.weight_kg,
                height_cm: db.height_cm,
                medical_note: db.medical_note,
                weekly_target: db.weekly_target,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewWorkout {
    pub date: NaiveDate,
    #[validate(custom(function = "non_blank"))]
    pub routine: String,
    #[validate(custom(function = "non_blank"))]
    pub exercise: String,
    #[validate(range(min = 1, message = "At least one rep"))]
    pub reps: i64,
    #[validate(range(min = 1, message = "At least one set"))]
    pub sets: i64,
    #[validate(range(min = 0.0, message = "Weight can't be negative"))]
    pub weight_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkoutEntry {
    pub id: i64,
    pub owner: String,
    pub date: NaiveDate,
    pub routine: String,
    pub exercise: String,
    pub reps: i64,
    pub sets: i64,
    pub weight_kg: f64,
}

impl WorkoutEntry {
    /// Total kilograms moved: reps x sets x weight.
    pub fn volume(&self) -> f64 {
        self.reps as f64 * self.sets as f64 * self.weight_kg
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub author: String,
    pub body: String,
    pub date: NaiveDate,
    pub created_at: NaiveDateTime,
}

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{Permission, Role};
use crate::error::AppError;

/// A login identity. Handlers receive it through the request guard in
/// `authentication.rs`, so there is no process-wide "current user".
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct User {
    pub username: String,
    pub role: Role,
    pub created_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUser {
    pub username: String,
    pub role: String,
    pub created_at: NaiveDateTime,
}

impl TryFrom<DbUser> for User {
    type Error = AppError;

    fn try_from(user: DbUser) -> Result<Self, Self::Error> {
        let role = Role::parse(&user.role).map_err(|e| {
            AppError::Internal(format!("Account {} has a bad role: {}", user.username, e))
        })?;

        Ok(Self {
            username: user.username,
            role,
            created_at: user.created_at,
        })
    }
}

impl User {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    pub fn require_permission(&self, permission: Permission) -> Result<(), AppError> {
        if self.role.has_permission(permission) {
            Ok(())
        } else {
            tracing::warn!(
                username = %self.username,
                role = %self.role.as_str(),
                permission = ?permission,
                "Permission denied"
            );
            Err(AppError::Authorization(format!(
                "{} may not {:?}",
                self.username, permission
            )))
        }
    }

    pub fn require_all_permissions(&self, permissions: &[Permission]) -> Result<(), AppError> {
        match permissions.iter().find(|p| !self.role.has_permission(**p)) {
            None => Ok(()),
            Some(missing) => {
                tracing::warn!(
                    username = %self.username,
                    role = %self.role.as_str(),
                    permissions = ?permissions,
                    "Permission denied (require all)"
                );
                Err(AppError::Authorization(format!(
                    "{} may not {:?}",
                    self.username, missing
                )))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserSession {
    pub id: i64,
    pub username: String,
    pub token: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUserSession {
    pub id: i64,
    pub username: String,
    pub token: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl From<DbUserSession> for UserSession {
    fn from(session: DbUserSession) -> Self {
        Self {
            id: session.id,
            username: session.username,
            token: session.token,
            created_at: session.created_at,
            expires_at: session.expires_at,
        }
    }
}

impl UserSession {
    pub fn generate_token() -> String {
        format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
    }

    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now().naive_utc()
    }
}

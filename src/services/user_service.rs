use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::{hash_password, issue_token, verify_password};
use crate::database::models::user::{User, USER_COLUMNS};
use crate::error::ApiError;
use crate::filter::{FieldKind, Filter, FilterField, FilterOp, ListParams, ListSpec, Page, SortField};
use crate::middleware::AuthUser;
use crate::observer::{Effects, NewActivity, NewNotification};
use crate::services::{is_unique_violation, list_page, required_text};
use crate::types::{Role, UserStatus};

const MIN_PASSWORD_LEN: usize = 8;

pub static USER_LIST: ListSpec = ListSpec {
    select: "SELECT u.*",
    from: "FROM users u",
    base_where: None,
    count: "COUNT(*)",
    filters: &[
        FilterField::new("role", &["u.role"], FilterOp::Eq, FieldKind::OneOf(Role::ALL)),
        FilterField::new("status", &["u.status"], FilterOp::Eq, FieldKind::OneOf(UserStatus::ALL)),
        FilterField::search("search", &["u.email", "u.first_name", "u.last_name"]),
    ],
    sorts: &[
        SortField::new("createdAt", "u.created_at"),
        SortField::new("email", "u.email"),
        SortField::new("lastName", "u.last_name"),
    ],
    default_sort: "createdAt",
    tie_breaker: "u.id",
    default_limit: 20,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct SuspendRequest {
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

pub struct UserService<'a> {
    state: &'a AppState,
}

impl<'a> UserService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<AuthPayload, ApiError> {
        let email = normalize_email(&req.email)?;
        validate_password("password", &req.password)?;
        let first_name = required_text("firstName", &req.first_name, 100)?;
        let last_name = required_text("lastName", &req.last_name, 100)?;
        if req.role == Role::Admin {
            return Err(ApiError::invalid_field("role", "Admin accounts cannot be self-registered"));
        }
        let password_hash = hash_password(&req.password, self.state.config.security.password_hash_cost)?;

        let mut tx = self.state.db.begin().await?;

        let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(&email)
            .fetch_one(&mut *tx)
            .await?;
        if taken {
            return Err(ApiError::conflict("Email is already registered"));
        }

        let user: User = sqlx::query_as(&format!(
            "INSERT INTO users (id, email, password_hash, first_name, last_name, role, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(password_hash)
        .bind(&first_name)
        .bind(&last_name)
        .bind(req.role.as_str())
        .bind(UserStatus::Active.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| if is_unique_violation(&e) { ApiError::conflict("Email is already registered") } else { e.into() })?;

        if req.role == Role::Tutor {
            sqlx::query("INSERT INTO tutor_profiles (user_id) VALUES ($1)")
                .bind(user.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::info!("Registered {} account {}", user.role, user.id);

        let token = issue_token(user.id, req.role, &user.email, &self.state.config.security)?;
        self.state
            .dispatch(Effects::new().activity(
                NewActivity::new(user.id, "user.register", "user", user.id).details(json!({ "role": user.role })),
            ))
            .await;

        Ok(AuthPayload { token, user })
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthPayload, ApiError> {
        let email = req.email.trim().to_lowercase();
        let user: Option<User> = sqlx::query_as(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
            .bind(&email)
            .fetch_optional(self.state.db.pool())
            .await?;

        let user = match user {
            Some(user) if verify_password(&req.password, &user.password_hash)? => user,
            _ => return Err(ApiError::unauthorized("Invalid email or password")),
        };
        if user.status == UserStatus::Suspended {
            return Err(ApiError::forbidden("Account is suspended"));
        }

        let user: User = sqlx::query_as(&format!(
            "UPDATE users SET last_login_at = now() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user.id)
        .fetch_one(self.state.db.pool())
        .await?;

        let role: Role = user.role.parse().map_err(|e: String| {
            tracing::error!("Stored user {} has {}", user.id, e);
            ApiError::internal_server_error("Account is misconfigured")
        })?;
        let token = issue_token(user.id, role, &user.email, &self.state.config.security)?;
        Ok(AuthPayload { token, user })
    }

    pub async fn me(&self, caller: &AuthUser) -> Result<User, ApiError> {
        self.find(caller.id).await?.ok_or_else(|| ApiError::not_found("User not found"))
    }

    pub async fn change_password(&self, caller: &AuthUser, req: ChangePasswordRequest) -> Result<(), ApiError> {
        validate_password("newPassword", &req.new_password)?;
        if req.new_password == req.current_password {
            return Err(ApiError::invalid_field("newPassword", "New password must differ from the current one"));
        }

        let user = self.me(caller).await?;
        if !verify_password(&req.current_password, &user.password_hash)? {
            return Err(ApiError::invalid_field("currentPassword", "Current password is incorrect"));
        }

        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(user.id)
            .bind(hash_password(&req.new_password, self.state.config.security.password_hash_cost)?)
            .execute(self.state.db.pool())
            .await?;

        self.state
            .dispatch(Effects::new().activity(NewActivity::new(user.id, "user.password_change", "user", user.id)))
            .await;
        Ok(())
    }

    pub async fn list(&self, params: &ListParams) -> Result<Page<User>, ApiError> {
        list_page(self.state, Filter::new(&USER_LIST), params).await
    }

    pub async fn suspend(&self, admin: &AuthUser, user_id: Uuid, req: SuspendRequest) -> Result<User, ApiError> {
        let reason = required_text("reason", &req.reason, 500)?;
        if admin.id == user_id {
            return Err(ApiError::conflict("Administrators cannot suspend their own account"));
        }

        let user = self
            .transition(user_id, UserStatus::Active, UserStatus::Suspended, Some(&reason))
            .await?;

        let effects = Effects::new()
            .notify(
                NewNotification::new(user.id, "account.suspended", "Account suspended", format!("Your account was suspended: {}", reason))
                    .about("user", user.id),
            )
            .activity(NewActivity::new(admin.id, "user.suspend", "user", user.id).details(json!({ "reason": reason })));
        self.state.dispatch(effects).await;
        Ok(user)
    }

    pub async fn activate(&self, admin: &AuthUser, user_id: Uuid) -> Result<User, ApiError> {
        let user = self.transition(user_id, UserStatus::Suspended, UserStatus::Active, None).await?;

        let effects = Effects::new()
            .notify(
                NewNotification::new(user.id, "account.activated", "Account reactivated", "Your account is active again")
                    .about("user", user.id),
            )
            .activity(NewActivity::new(admin.id, "user.activate", "user", user.id));
        self.state.dispatch(effects).await;
        Ok(user)
    }

    async fn transition(&self, user_id: Uuid, from: UserStatus, to: UserStatus, reason: Option<&str>) -> Result<User, ApiError> {
        let mut tx = self.state.db.begin().await?;

        let status: Option<String> = sqlx::query_scalar("SELECT status FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        match status {
            None => return Err(ApiError::not_found("User not found")),
            Some(s) if s != from => return Err(ApiError::conflict(format!("User is {}, expected {}", s, from))),
            Some(_) => {}
        }

        let user: User = sqlx::query_as(&format!(
            "UPDATE users SET status = $2, suspended_reason = $3, updated_at = now() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(to.as_str())
        .bind(reason)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(user)
    }

    async fn find(&self, user_id: Uuid) -> Result<Option<User>, ApiError> {
        Ok(sqlx::query_as(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(self.state.db.pool())
            .await?)
    }
}

fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'),
        None => false,
    };
    if !valid || email.len() > 254 || email.contains(char::is_whitespace) {
        return Err(ApiError::invalid_field("email", "A valid email address is required"));
    }
    Ok(email)
}

fn validate_password(field: &str, password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::invalid_field(field, format!("Password must be at least {} characters", MIN_PASSWORD_LEN)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("ada@localhost").is_err());
        assert!(normalize_email("a da@example.com").is_err());
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(validate_password("password", "short").is_err());
        assert!(validate_password("password", "long enough").is_ok());
    }

    #[test]
    fn register_request_uses_camel_case() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "t@example.com",
            "password": "password123",
            "firstName": "Tia",
            "lastName": "Ng",
            "role": "tutor"
        }))
        .unwrap();
        assert_eq!(req.role, Role::Tutor);
        assert_eq!(req.first_name, "Tia");
    }
}

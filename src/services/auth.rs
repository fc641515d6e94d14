use log::info;
use serde::{Deserialize, Serialize};

use crate::api::{Api, ApiRequest};
use crate::error::{AppError, ValidationError};
use crate::lifecycle::Role;
use crate::models::UserAccount;
use crate::session::{Session, SessionUser};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Registration {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.full_name.trim().is_empty() {
            return Err(ValidationError::Required("full name"));
        }
        if self.email.trim().is_empty() {
            return Err(ValidationError::Required("email"));
        }
        if !self.email.contains('@') {
            return Err(ValidationError::InvalidEmail(self.email.clone()));
        }
        if self.password.is_empty() {
            return Err(ValidationError::Required("password"));
        }
        Ok(())
    }
}

/// Token plus the account it was issued for.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub token: String,
    pub user: SessionUser,
}

// Login answers `{token, role, userId}`, register sometimes `{token, user}`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    token: String,
    role: Option<Role>,
    user_id: Option<String>,
    user: Option<AuthUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthUser {
    #[serde(rename = "_id", alias = "id")]
    id: Option<String>,
    full_name: Option<String>,
    email: Option<String>,
    role: Option<Role>,
}

impl AuthResponse {
    fn into_credentials(self, email: &str, full_name: Option<String>, requested: Role) -> Credentials {
        let user = self.user;
        let id = self
            .user_id
            .or_else(|| user.as_ref().and_then(|u| u.id.clone()))
            .unwrap_or_default();
        let role = self
            .role
            .or_else(|| user.as_ref().and_then(|u| u.role))
            .unwrap_or(requested);
        let full_name = user
            .as_ref()
            .and_then(|u| u.full_name.clone())
            .or(full_name);
        let email = user
            .and_then(|u| u.email)
            .unwrap_or_else(|| email.to_string());

        Credentials {
            token: self.token,
            user: SessionUser { id, email, full_name, role },
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    api: Api,
}

impl AuthService {
    pub fn new(api: Api) -> Self {
        AuthService { api }
    }

    pub async fn login(&self, email: &str, password: &str, role: Role) -> Result<Credentials, AppError> {
        if email.trim().is_empty() {
            return Err(ValidationError::Required("email").into());
        }
        if password.is_empty() {
            return Err(ValidationError::Required("password").into());
        }

        let request = ApiRequest::post("/auth/login").json(&serde_json::json!({
            "email": email.trim(),
            "password": password,
            "role": role,
        }))?;
        let response: AuthResponse = self.api.raw(request).await?;
        let credentials = response.into_credentials(email.trim(), None, role);
        info!("Logged in {} as {}", credentials.user.email, credentials.user.role);
        Ok(credentials)
    }

    pub async fn register(&self, registration: &Registration) -> Result<Credentials, AppError> {
        registration.validate()?;
        let request = ApiRequest::post("/auth/register").json(registration)?;
        let response: AuthResponse = self.api.raw(request).await?;
        let credentials = response.into_credentials(
            &registration.email,
            Some(registration.full_name.clone()),
            registration.role,
        );
        info!("Registered {} as {}", credentials.user.email, credentials.user.role);
        Ok(credentials)
    }

    /// Asks the server whether the session token is still good.
    pub async fn verify(&self, session: &Session) -> Result<UserAccount, AppError> {
        Ok(self.api.data(ApiRequest::get("/auth/me").auth(session)).await?)
    }
}

use thiserror::Error;

use crate::lifecycle::{BookingStatus, Role, TransitionError};

/// Failures talking to the remote REST API.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("session expired, please log in again")]
    Unauthorized,

    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// Client-side checks that run before any request is sent.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("{0} is invalid")]
    Invalid(&'static str),

    #[error("{field} cannot exceed {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("price must be greater than 0")]
    NonPositivePrice,

    #[error("add at least one inclusion")]
    NoInclusions,

    #[error("inclusion item cannot be empty")]
    EmptyInclusion,

    #[error("{0} is not a valid email address")]
    InvalidEmail(String),

    #[error("image {name} is {size} bytes, the limit is {limit} bytes")]
    ImageTooLarge { name: String, size: usize, limit: usize },

    #[error("image {name} has unsupported type {content_type}")]
    UnsupportedImage { name: String, content_type: String },

    #[error("select at least one image")]
    NoImages,

    #[error("{date} is in the past")]
    DateInPast { date: chrono::NaiveDate },

    #[error("{date} is too soon, the earliest available date is {earliest}")]
    DateTooSoon {
        date: chrono::NaiveDate,
        earliest: chrono::NaiveDate,
    },

    #[error("unknown time slot {0}")]
    UnknownTimeSlot(String),

    #[error("this package is not available for booking")]
    InactivePackage,

    #[error("a {0} booking cannot be changed")]
    BookingClosed(BookingStatus),
}

/// Everything the bot can run into while handling an update.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("download error: {0}")]
    Download(#[from] teloxide::DownloadError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("please log in first")]
    NotLoggedIn,

    #[error("this is not available to a {0} account")]
    Forbidden(Role),
}

impl AppError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AppError::Api(ApiError::Unauthorized))
    }

    /// Short notice shown to the chat. Transport details stay in the log.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Api(ApiError::Network(_)) => {
                "The service is unreachable right now. Please try again later.".to_string()
            }
            AppError::Api(ApiError::Decode(_)) | AppError::Api(ApiError::Endpoint(_)) => {
                "Something went wrong. Please try again.".to_string()
            }
            AppError::Database(_) | AppError::Telegram(_) | AppError::Download(_) => {
                "Something went wrong. Please try again.".to_string()
            }
            other => capitalize(&other.to_string()),
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_is_shown_as_is() {
        let err = AppError::from(ApiError::Status {
            status: 409,
            message: "Slot already taken".to_string(),
        });
        assert_eq!(err.user_message(), "Slot already taken");
    }

    #[test]
    fn validation_message_is_capitalized() {
        let err = AppError::from(ValidationError::Required("phone"));
        assert_eq!(err.user_message(), "Phone is required");
    }

    #[test]
    fn unauthorized_is_detected() {
        assert!(AppError::from(ApiError::Unauthorized).is_unauthorized());
        assert!(!AppError::NotLoggedIn.is_unauthorized());
    }

    #[test]
    fn forbidden_names_the_role() {
        let err = AppError::Forbidden(Role::User);
        assert_eq!(err.user_message(), "This is not available to a user account");
    }
}

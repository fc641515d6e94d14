use std::collections::BTreeMap;

use log::info;

use crate::api::{Api, ApiRequest};
use crate::error::AppError;
use crate::lifecycle::BookingStatus;
use crate::models::{Booking, Photographer, UserAccount};
use crate::session::Session;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardStats {
    pub users: usize,
    pub photographers: usize,
    pub bookings: usize,
    pub by_status: BTreeMap<BookingStatus, usize>,
}

impl DashboardStats {
    pub fn collect(users: &[UserAccount], photographers: &[Photographer], bookings: &[Booking]) -> Self {
        let mut by_status = BTreeMap::new();
        for booking in bookings {
            *by_status.entry(booking.status).or_insert(0) += 1;
        }
        DashboardStats {
            users: users.len(),
            photographers: photographers.len(),
            bookings: bookings.len(),
            by_status,
        }
    }
}

#[derive(Clone)]
pub struct AdminService {
    api: Api,
}

impl AdminService {
    pub fn new(api: Api) -> Self {
        AdminService { api }
    }

    pub async fn users(&self, session: &Session) -> Result<Vec<UserAccount>, AppError> {
        Ok(self.api.list(ApiRequest::get("/admin/users").auth(session)).await?)
    }

    pub async fn photographers(&self, session: &Session) -> Result<Vec<Photographer>, AppError> {
        Ok(self.api.list(ApiRequest::get("/admin/photographers").auth(session)).await?)
    }

    pub async fn delete_user(&self, session: &Session, user_id: &str) -> Result<(), AppError> {
        self.api
            .send(ApiRequest::delete(format!("/admin/users/{user_id}")).auth(session))
            .await?;
        info!("User {} deleted", user_id);
        Ok(())
    }

    pub async fn delete_photographer(&self, session: &Session, photographer_id: &str) -> Result<(), AppError> {
        self.api
            .send(ApiRequest::delete(format!("/admin/photographers/{photographer_id}")).auth(session))
            .await?;
        info!("Photographer {} deleted", photographer_id);
        Ok(())
    }

    pub async fn stats(&self, session: &Session) -> Result<DashboardStats, AppError> {
        let users = self.users(session).await?;
        let photographers = self.photographers(session).await?;
        let bookings: Vec<Booking> = self.api.list(ApiRequest::get("/bookings").auth(session)).await?;
        Ok(DashboardStats::collect(&users, &photographers, &bookings))
    }
}

/// Users whose name or email contains `term`, ignoring case.
pub fn filter_users<'a>(users: &'a [UserAccount], term: &str) -> Vec<&'a UserAccount> {
    let term = term.trim().to_lowercase();
    users
        .iter()
        .filter(|u| {
            term.is_empty()
                || u.full_name.to_lowercase().contains(&term)
                || u.email.to_lowercase().contains(&term)
        })
        .collect()
}

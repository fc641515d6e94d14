use chrono::NaiveDate;
use log::info;
use serde_json::json;

use crate::api::{Api, ApiRequest};
use crate::error::AppError;
use crate::lifecycle::{self, BookingStatus, Role};
use crate::models::{Booking, NewBooking, PortfolioImage, Reschedule};
use crate::session::Session;

#[derive(Clone)]
pub struct BookingService {
    api: Api,
}

impl BookingService {
    pub fn new(api: Api) -> Self {
        BookingService { api }
    }

    pub async fn create(&self, session: &Session, booking: &NewBooking) -> Result<Booking, AppError> {
        let request = ApiRequest::post("/bookings").auth(session).json(booking)?;
        let created: Booking = self.api.data(request).await?;
        info!(
            "Booking {} created for package {} at {}",
            created.id,
            created.package.id(),
            created.total_price()
        );
        Ok(created)
    }

    pub async fn for_user(&self, session: &Session) -> Result<Vec<Booking>, AppError> {
        Ok(self.api.list(ApiRequest::get("/bookings/user").auth(session)).await?)
    }

    pub async fn for_photographer(&self, session: &Session) -> Result<Vec<Booking>, AppError> {
        Ok(self.api.list(ApiRequest::get("/bookings/photographer").auth(session)).await?)
    }

    pub async fn all(&self, session: &Session) -> Result<Vec<Booking>, AppError> {
        Ok(self.api.list(ApiRequest::get("/bookings").auth(session)).await?)
    }

    /// Bookings visible to the session's role.
    pub async fn visible_to(&self, session: &Session) -> Result<Vec<Booking>, AppError> {
        match session.role() {
            Role::User => self.for_user(session).await,
            Role::Photographer => self.for_photographer(session).await,
            Role::Admin => self.all(session).await,
        }
    }

    /// Moves `booking` to `target` if the session's role may do so. A
    /// rejected transition sends nothing.
    pub async fn set_status(
        &self,
        session: &Session,
        booking: &Booking,
        target: BookingStatus,
    ) -> Result<Booking, AppError> {
        if target == BookingStatus::Cancelled && session.role() == Role::User {
            return self.cancel(session, booking).await;
        }
        lifecycle::check_transition(booking.status, target, session.role())?;

        let request = ApiRequest::put(format!("/bookings/{}", booking.id))
            .auth(session)
            .json(&json!({ "status": target }))?;
        let updated: Booking = self.api.data(request).await?;
        info!(
            "Booking {} moved {} -> {} by {}",
            booking.id, booking.status, updated.status, session.role()
        );
        Ok(updated)
    }

    /// Cancels through the dedicated endpoint a client is allowed to call.
    pub async fn cancel(&self, session: &Session, booking: &Booking) -> Result<Booking, AppError> {
        lifecycle::check_transition(booking.status, BookingStatus::Cancelled, session.role())?;
        let request = ApiRequest::put(format!("/bookings/{}/cancel", booking.id)).auth(session);
        let updated: Booking = self.api.data(request).await?;
        info!("Booking {} cancelled by {}", booking.id, session.role());
        Ok(updated)
    }

    pub async fn reschedule(
        &self,
        session: &Session,
        booking: &Booking,
        date: NaiveDate,
        time_slot: &str,
        today: NaiveDate,
    ) -> Result<Booking, AppError> {
        lifecycle::validate_reschedule(booking.status, date, time_slot, today)?;
        let body = Reschedule {
            date,
            time_slot: time_slot.to_string(),
        };
        let request = ApiRequest::put(format!("/bookings/{}/reschedule", booking.id))
            .auth(session)
            .json(&body)?;
        let updated: Booking = self.api.data(request).await?;
        info!("Booking {} rescheduled to {} {}", booking.id, date, time_slot);
        Ok(updated)
    }

    pub async fn photos(&self, session: &Session, booking_id: &str) -> Result<Vec<PortfolioImage>, AppError> {
        let request = ApiRequest::get(format!("/bookings/{booking_id}/photos")).auth(session);
        Ok(self.api.list(request).await?)
    }
}

/// Upcoming (on or after `today`) and past bookings, in that order.
pub fn split_upcoming(bookings: Vec<Booking>, today: NaiveDate) -> (Vec<Booking>, Vec<Booking>) {
    bookings.into_iter().partition(|b| b.date >= today)
}

pub fn bookings_on(bookings: &[Booking], date: NaiveDate) -> Vec<&Booking> {
    bookings.iter().filter(|b| b.date == date).collect()
}

/// Case-insensitive search over the fields shown in booking lists.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub term: String,
}

impl BookingFilter {
    pub fn new(term: &str) -> Self {
        BookingFilter {
            term: term.trim().to_lowercase(),
        }
    }

    pub fn matches(&self, booking: &Booking) -> bool {
        if self.term.is_empty() {
            return true;
        }
        let hit = |field: &str| field.to_lowercase().contains(&self.term);
        hit(&booking.contact_info.name)
            || booking.photographer_name().is_some_and(hit)
            || hit(&booking.location)
            || booking.package_name().is_some_and(hit)
    }

    pub fn apply<'a>(&self, bookings: &'a [Booking]) -> Vec<&'a Booking> {
        bookings.iter().filter(|b| self.matches(b)).collect()
    }
}

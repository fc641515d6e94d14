//! Per-chat conversation state: which form the chat is filling in and the
//! data collected so far. Lost on restart, unlike the login session.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::error::ValidationError;
use crate::lifecycle::Role;
use crate::models::{Booking, ContactInfo, NewBooking, Package};

/// What the next plain text message from the chat means.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Step {
    #[default]
    Idle,
    LoginCredentials(Role),
    RegisterDetails(Role),
    BookingContact,
    PackageForm,
    PortfolioForm,
    PortfolioUpload(String),
    ProfileBio,
}

/// Choices made so far while booking a session.
#[derive(Debug, Clone, Default)]
pub struct BookingDraft {
    pub photographer_id: Option<String>,
    pub package: Option<Package>,
    pub date: Option<NaiveDate>,
    pub time_slot: Option<String>,
}

impl BookingDraft {
    pub fn for_package(photographer_id: &str, package: Package) -> Self {
        BookingDraft {
            photographer_id: Some(photographer_id.to_string()),
            package: Some(package),
            ..BookingDraft::default()
        }
    }

    pub fn to_request(
        &self,
        contact: ContactInfo,
        notes: Option<String>,
        today: NaiveDate,
    ) -> Result<NewBooking, ValidationError> {
        let photographer = self
            .photographer_id
            .as_deref()
            .ok_or(ValidationError::Required("photographer"))?;
        let package = self.package.as_ref().ok_or(ValidationError::Required("package"))?;
        let date = self.date.ok_or(ValidationError::Required("date"))?;
        let slot = self.time_slot.as_deref().ok_or(ValidationError::Required("time slot"))?;
        NewBooking::for_package(photographer, package, date, slot, contact, notes, today)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dialog {
    pub step: Step,
    pub draft: BookingDraft,
    /// Validated booking waiting for the user to press "Book".
    pub pending: Option<NewBooking>,
    /// Last booking list shown, with the status each booking had then.
    pub bookings: Vec<Booking>,
    pub page: usize,
    pub packages: Vec<Package>,
    pub reschedule: Option<String>,
    pub reschedule_date: Option<NaiveDate>,
}

impl Dialog {
    pub fn booking(&self, id: &str) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn package(&self, id: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.id == id)
    }

    /// Swaps in the server's copy of a booking after a change.
    pub fn replace_booking(&mut self, updated: Booking) {
        match self.bookings.iter_mut().find(|b| b.id == updated.id) {
            Some(slot) => *slot = updated,
            None => self.bookings.push(updated),
        }
    }

    /// Drops any form in progress but keeps the cached lists.
    pub fn abort(&mut self) {
        self.step = Step::Idle;
        self.draft = BookingDraft::default();
        self.pending = None;
        self.reschedule = None;
        self.reschedule_date = None;
    }
}

#[derive(Clone, Default)]
pub struct Dialogs {
    chats: Arc<Mutex<HashMap<i64, Dialog>>>,
}

impl Dialogs {
    /// Runs `f` on the chat's dialog, creating an empty one if needed. The
    /// lock is held only for the closure, never across a request.
    pub async fn update<R>(&self, chat_id: i64, f: impl FnOnce(&mut Dialog) -> R) -> R {
        let mut chats = self.chats.lock().await;
        f(chats.entry(chat_id).or_default())
    }

    #[cfg(test)]
    pub async fn snapshot(&self, chat_id: i64) -> Dialog {
        self.update(chat_id, |dialog| dialog.clone()).await
    }

    pub async fn reset(&self, chat_id: i64) {
        self.chats.lock().await.remove(&chat_id);
    }
}

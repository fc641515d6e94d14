//! Callback data carried by inline buttons, as `prefix:arg:arg`.
//! Telegram caps callback data at 64 bytes, so prefixes stay short.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::lifecycle::{BookingStatus, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarPurpose {
    Book,
    Reschedule,
    Schedule,
}

impl CalendarPurpose {
    fn code(self) -> &'static str {
        match self {
            CalendarPurpose::Book => "b",
            CalendarPurpose::Reschedule => "r",
            CalendarPurpose::Schedule => "s",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "b" => Some(CalendarPurpose::Book),
            "r" => Some(CalendarPurpose::Reschedule),
            "s" => Some(CalendarPurpose::Schedule),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Ignore,
    Abort,
    LoginAs(Role),
    RegisterAs(Role),
    Photographer(String),
    Package { photographer_id: String, package_id: String },
    Month { purpose: CalendarPurpose, month: u32, year: i32 },
    Day { purpose: CalendarPurpose, date: NaiveDate },
    Slot { purpose: CalendarPurpose, index: usize },
    ConfirmBooking,
    BookingPage(usize),
    SetStatus { booking_id: String, status: BookingStatus },
    Reschedule(String),
    Photos(String),
    NewPackage,
    TogglePackage(String),
    DeletePackage(String),
    NewPortfolio,
    UploadTo(String),
    DeleteImage { portfolio_id: String, image_id: String },
    DeleteUser(String),
    DeletePhotographer(String),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Ignore => write!(f, "ignore"),
            Action::Abort => write!(f, "abort"),
            Action::LoginAs(role) => write!(f, "login:{role}"),
            Action::RegisterAs(role) => write!(f, "register:{role}"),
            Action::Photographer(id) => write!(f, "ph:{id}"),
            Action::Package { photographer_id, package_id } => write!(f, "pk:{photographer_id}:{package_id}"),
            Action::Month { purpose, month, year } => write!(f, "cal:{}:{month}:{year}", purpose.code()),
            Action::Day { purpose, date } => write!(f, "day:{}:{}", purpose.code(), date.format("%Y-%m-%d")),
            Action::Slot { purpose, index } => write!(f, "slot:{}:{index}", purpose.code()),
            Action::ConfirmBooking => write!(f, "book"),
            Action::BookingPage(page) => write!(f, "bp:{page}"),
            Action::SetStatus { booking_id, status } => write!(f, "st:{booking_id}:{status}"),
            Action::Reschedule(id) => write!(f, "rs:{id}"),
            Action::Photos(id) => write!(f, "bf:{id}"),
            Action::NewPackage => write!(f, "pn"),
            Action::TogglePackage(id) => write!(f, "pt:{id}"),
            Action::DeletePackage(id) => write!(f, "pd:{id}"),
            Action::NewPortfolio => write!(f, "fn"),
            Action::UploadTo(id) => write!(f, "fu:{id}"),
            Action::DeleteImage { portfolio_id, image_id } => write!(f, "fx:{portfolio_id}:{image_id}"),
            Action::DeleteUser(id) => write!(f, "du:{id}"),
            Action::DeletePhotographer(id) => write!(f, "dp:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownAction(data.to_string());
        let parts: Vec<&str> = data.split(':').collect();
        let purpose = |code: &str| CalendarPurpose::from_code(code).ok_or_else(unknown);

        let action = match parts.as_slice() {
            ["ignore"] => Action::Ignore,
            ["abort"] => Action::Abort,
            ["book"] => Action::ConfirmBooking,
            ["pn"] => Action::NewPackage,
            ["fn"] => Action::NewPortfolio,
            ["login", role] => Action::LoginAs(Role::parse(role).ok_or_else(unknown)?),
            ["register", role] => Action::RegisterAs(Role::parse(role).ok_or_else(unknown)?),
            ["ph", id] => Action::Photographer(id.to_string()),
            ["pk", photographer_id, package_id] => Action::Package {
                photographer_id: photographer_id.to_string(),
                package_id: package_id.to_string(),
            },
            ["cal", code, month, year] => Action::Month {
                purpose: purpose(code)?,
                month: month.parse().map_err(|_| unknown())?,
                year: year.parse().map_err(|_| unknown())?,
            },
            ["day", code, date] => Action::Day {
                purpose: purpose(code)?,
                date: NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| unknown())?,
            },
            ["slot", code, index] => Action::Slot {
                purpose: purpose(code)?,
                index: index.parse().map_err(|_| unknown())?,
            },
            ["bp", page] => Action::BookingPage(page.parse().map_err(|_| unknown())?),
            ["st", id, status] => Action::SetStatus {
                booking_id: id.to_string(),
                status: BookingStatus::parse(status).ok_or_else(unknown)?,
            },
            ["rs", id] => Action::Reschedule(id.to_string()),
            ["bf", id] => Action::Photos(id.to_string()),
            ["pt", id] => Action::TogglePackage(id.to_string()),
            ["pd", id] => Action::DeletePackage(id.to_string()),
            ["fu", id] => Action::UploadTo(id.to_string()),
            ["fx", portfolio_id, image_id] => Action::DeleteImage {
                portfolio_id: portfolio_id.to_string(),
                image_id: image_id.to_string(),
            },
            ["du", id] => Action::DeleteUser(id.to_string()),
            ["dp", id] => Action::DeletePhotographer(id.to_string()),
            _ => return Err(unknown()),
        };
        Ok(action)
    }
}

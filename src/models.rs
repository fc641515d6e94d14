use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::lifecycle::{self, BookingStatus, Role};

pub const DEFAULT_LOCATION: &str = "To be determined";

/// A reference the API either leaves as an id or populates with the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ref<T> {
    Id(String),
    Populated(T),
}

impl<T: HasId> Ref<T> {
    pub fn id(&self) -> &str {
        match self {
            Ref::Id(id) => id,
            Ref::Populated(record) => record.id(),
        }
    }
}

impl<T> Ref<T> {
    pub fn populated(&self) -> Option<&T> {
        match self {
            Ref::Id(_) => None,
            Ref::Populated(record) => Some(record),
        }
    }
}

pub trait HasId {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl ContactInfo {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Required("name"));
        }
        if self.email.trim().is_empty() {
            return Err(ValidationError::Required("email"));
        }
        if !self.email.contains('@') {
            return Err(ValidationError::InvalidEmail(self.email.clone()));
        }
        if self.phone.trim().is_empty() {
            return Err(ValidationError::Required("phone"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Refunded,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotographerSummary {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl HasId for PhotographerSummary {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSummary {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: Option<f64>,
}

impl HasId for PackageSummary {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: String,
    pub contact_info: ContactInfo,
    pub photographer: Ref<PhotographerSummary>,
    pub package: Ref<PackageSummary>,
    #[serde(with = "api_date")]
    pub date: NaiveDate,
    pub time_slot: String,
    #[serde(default)]
    pub location: String,
    // Copied from the package when the booking was made.
    total_price: f64,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: BookingStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn total_price(&self) -> f64 {
        self.total_price
    }

    pub fn photographer_name(&self) -> Option<&str> {
        self.photographer.populated().map(|p| p.full_name.as_str())
    }

    pub fn package_name(&self) -> Option<&str> {
        self.package.populated().map(|p| p.name.as_str())
    }
}

/// Body of `POST /bookings`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub photographer: String,
    pub package: String,
    #[serde(with = "api_date")]
    pub date: NaiveDate,
    pub time_slot: String,
    pub location: String,
    total_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub contact_info: ContactInfo,
}

impl NewBooking {
    /// Builds a booking request for `package`, freezing its current price.
    pub fn for_package(
        photographer_id: &str,
        package: &Package,
        date: NaiveDate,
        time_slot: &str,
        contact_info: ContactInfo,
        notes: Option<String>,
        today: NaiveDate,
    ) -> Result<Self, ValidationError> {
        if !package.is_active {
            return Err(ValidationError::InactivePackage);
        }
        if date < today {
            return Err(ValidationError::DateInPast { date });
        }
        if !lifecycle::is_known_slot(time_slot) {
            return Err(ValidationError::UnknownTimeSlot(time_slot.to_string()));
        }
        contact_info.validate()?;

        Ok(NewBooking {
            photographer: photographer_id.to_string(),
            package: package.id.clone(),
            date,
            time_slot: time_slot.to_string(),
            location: DEFAULT_LOCATION.to_string(),
            total_price: package.price,
            notes: notes.filter(|n| !n.trim().is_empty()),
            contact_info,
        })
    }

    pub fn total_price(&self) -> f64 {
        self.total_price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reschedule {
    #[serde(with = "api_date")]
    pub date: NaiveDate,
    pub time_slot: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub photographer: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

pub const PACKAGE_DESCRIPTION_MAX: usize = 500;

/// Create/update body for a package.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDraft {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub duration: String,
    pub includes: Vec<String>,
    pub is_active: bool,
}

impl PackageDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Required("package name"));
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::Required("description"));
        }
        if self.description.chars().count() > PACKAGE_DESCRIPTION_MAX {
            return Err(ValidationError::TooLong {
                field: "description",
                max: PACKAGE_DESCRIPTION_MAX,
            });
        }
        if !self.price.is_finite() {
            return Err(ValidationError::Invalid("price"));
        }
        if self.price <= 0.0 {
            return Err(ValidationError::NonPositivePrice);
        }
        if self.duration.trim().is_empty() {
            return Err(ValidationError::Required("duration"));
        }
        if self.includes.is_empty() {
            return Err(ValidationError::NoInclusions);
        }
        if self.includes.iter().any(|item| item.trim().is_empty()) {
            return Err(ValidationError::EmptyInclusion);
        }
        Ok(())
    }
}

impl From<&Package> for PackageDraft {
    fn from(package: &Package) -> Self {
        PackageDraft {
            name: package.name.clone(),
            description: package.description.clone(),
            price: package.price,
            duration: package.duration.clone(),
            includes: package.includes.clone(),
            is_active: package.is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioImage {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub upload_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub photographer: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<PortfolioImage>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPortfolio {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
    pub is_published: bool,
}

impl NewPortfolio {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::Required("title"));
        }
        if self.category.trim().is_empty() {
            return Err(ValidationError::Required("category"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
    Pending,
    #[serde(other)]
    Unknown,
}

impl AccountStatus {
    pub fn style(self) -> lifecycle::StatusStyle {
        use lifecycle::StatusStyle;
        match self {
            AccountStatus::Active => StatusStyle { emoji: "🟢", label: "Active", color: "green" },
            AccountStatus::Inactive => StatusStyle { emoji: "🔴", label: "Inactive", color: "red" },
            AccountStatus::Pending => StatusStyle { emoji: "🟡", label: "Pending", color: "yellow" },
            AccountStatus::Unknown => StatusStyle { emoji: "⚪", label: "Unknown", color: "gray" },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub status: AccountStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photographer {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub bookings: Option<u32>,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub status: AccountStatus,
}

/// Fields a photographer may change on their own profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Dates travel as `YYYY-MM-DD`, but stored records may come back as full
/// RFC 3339 timestamps.
pub mod api_date {
    use chrono::{DateTime, NaiveDate};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid date {raw}")))
    }

    pub fn parse(raw: &str) -> Option<NaiveDate> {
        if let Ok(date) = NaiveDate::parse_from_str(raw, FORMAT) {
            return Some(date);
        }
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|timestamp| timestamp.date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn package(price: f64) -> Package {
        serde_json::from_value(json!({
            "_id": "pkg1",
            "name": "Portrait",
            "description": "One hour portrait session",
            "price": price,
            "duration": "1 hour",
            "includes": ["10 edited photos"],
            "isActive": true
        }))
        .unwrap()
    }

    fn contact() -> ContactInfo {
        ContactInfo {
            name: "Ann".to_string(),
            email: "ann@example.com".to_string(),
            phone: "+100200300".to_string(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn booking_accepts_ids_and_populated_refs() {
        let booking: Booking = serde_json::from_value(json!({
            "_id": "b1",
            "contactInfo": {"name": "Ann", "email": "ann@example.com", "phone": "1"},
            "photographer": {"_id": "p1", "fullName": "Max Light"},
            "package": "pkg1",
            "date": "2024-05-20T00:00:00.000Z",
            "timeSlot": "9:00 AM - 11:00 AM",
            "totalPrice": 150,
            "status": "pending",
            "paymentStatus": "escrow"
        }))
        .unwrap();

        assert_eq!(booking.photographer.id(), "p1");
        assert_eq!(booking.photographer_name(), Some("Max Light"));
        assert_eq!(booking.package.id(), "pkg1");
        assert_eq!(booking.package_name(), None);
        assert_eq!(booking.date, day(20));
        assert_eq!(booking.total_price(), 150.0);
        assert_eq!(booking.payment_status, PaymentStatus::Unknown);
        assert_eq!(booking.location, "");
    }

    #[test]
    fn unknown_status_is_a_decode_error() {
        let result: Result<Booking, _> = serde_json::from_value(json!({
            "_id": "b1",
            "contactInfo": {"name": "Ann", "email": "a@b", "phone": "1"},
            "photographer": "p1",
            "package": "pkg1",
            "date": "2024-05-20",
            "timeSlot": "x",
            "totalPrice": 1,
            "status": "archived"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn new_booking_copies_package_price() {
        let request = NewBooking::for_package(
            "p1",
            &package(150.0),
            day(20),
            "1:00 PM - 3:00 PM",
            contact(),
            Some("  ".to_string()),
            day(10),
        )
        .unwrap();

        assert_eq!(request.total_price(), 150.0);
        assert_eq!(request.location, DEFAULT_LOCATION);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "photographer": "p1",
                "package": "pkg1",
                "date": "2024-05-20",
                "timeSlot": "1:00 PM - 3:00 PM",
                "location": "To be determined",
                "totalPrice": 150.0,
                "contactInfo": {"name": "Ann", "email": "ann@example.com", "phone": "+100200300"}
            })
        );
    }

    #[test]
    fn new_booking_requires_contact_details() {
        let mut info = contact();
        info.phone = String::new();
        let err = NewBooking::for_package("p1", &package(150.0), day(20), TIME_SLOT, info, None, day(10));
        assert_eq!(err, Err(ValidationError::Required("phone")));
    }

    #[test]
    fn new_booking_rejects_past_dates_and_inactive_packages() {
        let err = NewBooking::for_package("p1", &package(150.0), day(9), TIME_SLOT, contact(), None, day(10));
        assert_eq!(err, Err(ValidationError::DateInPast { date: day(9) }));

        let mut retired = package(150.0);
        retired.is_active = false;
        let err = NewBooking::for_package("p1", &retired, day(20), TIME_SLOT, contact(), None, day(10));
        assert_eq!(err, Err(ValidationError::InactivePackage));
    }

    const TIME_SLOT: &str = "9:00 AM - 11:00 AM";

    #[test]
    fn package_draft_rules() {
        let valid = PackageDraft::from(&package(99.0));
        assert_eq!(valid.validate(), Ok(()));

        let mut draft = valid.clone();
        draft.price = 0.0;
        assert_eq!(draft.validate(), Err(ValidationError::NonPositivePrice));
        draft.price = f64::INFINITY;
        assert_eq!(draft.validate(), Err(ValidationError::Invalid("price")));
        draft.price = f64::NAN;
        assert_eq!(draft.validate(), Err(ValidationError::Invalid("price")));

        let mut draft = valid.clone();
        draft.description = "x".repeat(PACKAGE_DESCRIPTION_MAX + 1);
        assert_eq!(
            draft.validate(),
            Err(ValidationError::TooLong { field: "description", max: PACKAGE_DESCRIPTION_MAX })
        );

        let mut draft = valid.clone();
        draft.includes.clear();
        assert_eq!(draft.validate(), Err(ValidationError::NoInclusions));

        let mut draft = valid;
        draft.includes.push(" ".to_string());
        assert_eq!(draft.validate(), Err(ValidationError::EmptyInclusion));
    }

    #[test]
    fn portfolio_requires_title_and_category() {
        let mut portfolio = NewPortfolio {
            title: "Weddings".to_string(),
            description: None,
            category: String::new(),
            is_published: true,
        };
        assert_eq!(portfolio.validate(), Err(ValidationError::Required("category")));
        portfolio.category = "wedding".to_string();
        assert_eq!(portfolio.validate(), Ok(()));
    }

    #[test]
    fn api_date_parses_both_forms() {
        assert_eq!(api_date::parse("2024-05-03"), Some(day(3)));
        assert_eq!(api_date::parse("2024-05-03T10:00:00+00:00"), Some(day(3)));
        assert_eq!(api_date::parse("03/05/2024"), None);
    }
}

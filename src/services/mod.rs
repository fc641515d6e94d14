//! One service per REST resource. Services run client-side checks, then make
//! exactly one request; they keep no state of their own.

use std::sync::Arc;

use url::Url;

use crate::api::{Api, Transport};

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod packages;
pub mod photographers;
pub mod portfolio;

#[cfg(test)]
pub(crate) mod fake;

pub use admin::AdminService;
pub use auth::AuthService;
pub use bookings::BookingService;
pub use packages::PackageService;
pub use photographers::PhotographerService;
pub use portfolio::PortfolioService;

#[derive(Clone)]
pub struct Services {
    pub auth: AuthService,
    pub bookings: BookingService,
    pub packages: PackageService,
    pub portfolio: PortfolioService,
    pub photographers: PhotographerService,
    pub admin: AdminService,
}

impl Services {
    /// `base` is the API base URL, used to resolve relative image paths.
    pub fn new(transport: Arc<dyn Transport>, base: Url) -> Self {
        let api = Api::new(transport);
        Services {
            auth: AuthService::new(api.clone()),
            bookings: BookingService::new(api.clone()),
            packages: PackageService::new(api.clone()),
            portfolio: PortfolioService::new(api.clone(), base.clone()),
            photographers: PhotographerService::new(api.clone(), base),
            admin: AdminService::new(api),
        }
    }
}

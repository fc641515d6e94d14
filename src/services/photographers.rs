use log::info;
use url::Url;

use crate::api::{Api, ApiRequest};
use crate::error::AppError;
use crate::models::{Photographer, ProfileUpdate};
use crate::services::portfolio::full_image_url;
use crate::session::Session;

pub const DEFAULT_PROFILE_IMAGE: &str = "https://images.unsplash.com/photo-1568602471122-7832951cc4c5";

/// Browse filters. Photographers that list no categories, or no price,
/// are never filtered out by those criteria.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotographerQuery {
    pub term: Option<String>,
    pub categories: Vec<String>,
    pub price_range: Option<(f64, f64)>,
}

impl PhotographerQuery {
    pub fn matches(&self, photographer: &Photographer) -> bool {
        let term_match = match self.term.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                let hit = |field: &str| field.to_lowercase().contains(&term);
                hit(&photographer.full_name)
                    || photographer.specialty.as_deref().is_some_and(hit)
                    || photographer.location.as_deref().is_some_and(hit)
            }
        };

        let category_match = self.categories.is_empty()
            || photographer.categories.is_empty()
            || photographer.categories.iter().any(|cat| {
                self.categories
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(cat))
            });

        let price_match = match (self.price_range, photographer.price) {
            (Some((min, max)), Some(price)) => price >= min && price <= max,
            _ => true,
        };

        term_match && category_match && price_match
    }

    fn to_request(&self) -> ApiRequest {
        let mut request = ApiRequest::get("/photographers/search");
        if let Some(term) = self.term.as_deref().filter(|t| !t.trim().is_empty()) {
            request = request.query("q", term.trim());
        }
        if !self.categories.is_empty() {
            request = request.query("categories", self.categories.join(","));
        }
        if let Some((min, max)) = self.price_range {
            request = request
                .query("minPrice", min.to_string())
                .query("maxPrice", max.to_string());
        }
        request
    }
}

#[derive(Clone)]
pub struct PhotographerService {
    api: Api,
    base: Url,
}

impl PhotographerService {
    pub fn new(api: Api, base: Url) -> Self {
        PhotographerService { api, base }
    }

    pub async fn all(&self) -> Result<Vec<Photographer>, AppError> {
        let photographers: Vec<Photographer> = self.api.list(ApiRequest::get("/photographers")).await?;
        Ok(photographers
            .into_iter()
            .map(|p| self.with_image(p))
            .collect())
    }

    pub async fn by_id(&self, id: &str) -> Result<Photographer, AppError> {
        let photographer: Photographer = self.api.data(ApiRequest::get(format!("/photographers/{id}"))).await?;
        Ok(self.with_image(photographer))
    }

    /// Server-side search, with the same filter re-applied locally in case
    /// the server ignores some of the parameters.
    pub async fn search(&self, query: &PhotographerQuery) -> Result<Vec<Photographer>, AppError> {
        let found: Vec<Photographer> = self.api.list(query.to_request()).await?;
        Ok(found
            .into_iter()
            .filter(|p| query.matches(p))
            .map(|p| self.with_image(p))
            .collect())
    }

    pub async fn update_profile(&self, session: &Session, update: &ProfileUpdate) -> Result<Photographer, AppError> {
        let request = ApiRequest::put("/photographers/profile").auth(session).json(update)?;
        let updated: Photographer = self.api.data(request).await?;
        info!("Profile of photographer {} updated", updated.id);
        Ok(updated)
    }

    fn with_image(&self, mut photographer: Photographer) -> Photographer {
        photographer.profile_image = Some(match photographer.profile_image.as_deref() {
            None | Some("") => DEFAULT_PROFILE_IMAGE.to_string(),
            Some(path) => full_image_url(&self.base, path),
        });
        photographer
    }
}

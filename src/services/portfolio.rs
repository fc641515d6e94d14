use log::info;
use url::Url;

use crate::api::{Api, ApiRequest, ImageUpload};
use crate::error::{AppError, ValidationError};
use crate::models::{NewPortfolio, Portfolio};
use crate::session::Session;

#[derive(Clone)]
pub struct PortfolioService {
    api: Api,
    base: Url,
}

impl PortfolioService {
    pub fn new(api: Api, base: Url) -> Self {
        PortfolioService { api, base }
    }

    pub async fn mine(&self, session: &Session) -> Result<Vec<Portfolio>, AppError> {
        Ok(self.api.list(ApiRequest::get("/portfolio").auth(session)).await?)
    }

    pub async fn public(&self, photographer_id: &str) -> Result<Vec<Portfolio>, AppError> {
        let request = ApiRequest::get(format!("/portfolio/photographer/{photographer_id}"));
        Ok(self.api.list(request).await?)
    }

    pub async fn create(&self, session: &Session, portfolio: &NewPortfolio) -> Result<Portfolio, AppError> {
        portfolio.validate()?;
        let request = ApiRequest::post("/portfolio").auth(session).json(portfolio)?;
        let created: Portfolio = self.api.data(request).await?;
        info!("Portfolio {} created", created.id);
        Ok(created)
    }

    pub async fn upload_images(
        &self,
        session: &Session,
        portfolio_id: &str,
        images: Vec<ImageUpload>,
    ) -> Result<Portfolio, AppError> {
        if images.is_empty() {
            return Err(ValidationError::NoImages.into());
        }
        for image in &images {
            image.validate()?;
        }
        let count = images.len();
        let request = ApiRequest::post(format!("/portfolio/{portfolio_id}/images"))
            .auth(session)
            .images(images);
        let updated: Portfolio = self.api.data(request).await?;
        info!("Uploaded {} image(s) to portfolio {}", count, portfolio_id);
        Ok(updated)
    }

    pub async fn delete_image(
        &self,
        session: &Session,
        portfolio_id: &str,
        image_id: &str,
    ) -> Result<Portfolio, AppError> {
        let request = ApiRequest::delete(format!("/portfolio/{portfolio_id}/images/{image_id}")).auth(session);
        Ok(self.api.data(request).await?)
    }

    pub fn image_url(&self, path: &str) -> String {
        full_image_url(&self.base, path)
    }
}

/// Resolves an image path relative to the API server root (the base URL
/// minus its `/api` suffix). Absolute URLs pass through.
pub fn full_image_url(base: &Url, path: &str) -> String {
    if path.is_empty() || path.starts_with("http") {
        return path.to_string();
    }
    let root = base.as_str().trim_end_matches('/');
    let root = root.strip_suffix("/api").unwrap_or(root);
    if path.starts_with('/') {
        format!("{root}{path}")
    } else {
        format!("{root}/{path}")
    }
}

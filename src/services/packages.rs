use log::info;
use serde_json::json;

use crate::api::{Api, ApiRequest};
use crate::error::AppError;
use crate::models::{Package, PackageDraft};
use crate::session::Session;

#[derive(Clone)]
pub struct PackageService {
    api: Api,
}

impl PackageService {
    pub fn new(api: Api) -> Self {
        PackageService { api }
    }

    /// Packages of the logged-in photographer, active or not.
    pub async fn mine(&self, session: &Session) -> Result<Vec<Package>, AppError> {
        Ok(self.api.list(ApiRequest::get("/packages").auth(session)).await?)
    }

    pub async fn public(&self, photographer_id: &str) -> Result<Vec<Package>, AppError> {
        let request = ApiRequest::get(format!("/packages/photographer/{photographer_id}"));
        Ok(self.api.list(request).await?)
    }

    pub async fn create(&self, session: &Session, draft: &PackageDraft) -> Result<Package, AppError> {
        draft.validate()?;
        let request = ApiRequest::post("/packages").auth(session).json(draft)?;
        let package: Package = self.api.data(request).await?;
        info!("Package {} created at {}", package.id, package.price);
        Ok(package)
    }

    pub async fn update(
        &self,
        session: &Session,
        package_id: &str,
        draft: &PackageDraft,
    ) -> Result<Package, AppError> {
        draft.validate()?;
        let request = ApiRequest::put(format!("/packages/{package_id}"))
            .auth(session)
            .json(draft)?;
        let package: Package = self.api.data(request).await?;
        info!("Package {} updated", package.id);
        Ok(package)
    }

    pub async fn set_active(
        &self,
        session: &Session,
        package: &Package,
        active: bool,
    ) -> Result<Package, AppError> {
        // Only the flag is sent, so packages saved under older rules can
        // still be hidden.
        let request = ApiRequest::put(format!("/packages/{}", package.id))
            .auth(session)
            .json(&json!({ "isActive": active }))?;
        let updated: Package = self.api.data(request).await?;
        info!("Package {} active: {}", updated.id, updated.is_active);
        Ok(updated)
    }

    pub async fn delete(&self, session: &Session, package_id: &str) -> Result<(), AppError> {
        self.api
            .send(ApiRequest::delete(format!("/packages/{package_id}")).auth(session))
            .await?;
        info!("Package {} deleted", package_id);
        Ok(())
    }
}

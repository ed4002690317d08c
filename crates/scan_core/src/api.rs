//! Collaborator seams and their HTTP implementation.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{ImageId, ProfileId, ScanId},
    error::{ApiErrorBody, ApiException},
    protocol::{
        AnalysisResponse, Barrier, BarrierFilter, GenerateGuideRequest, Guide, ImageInfo,
        ImageUploadResponse, Page, ScanCreate, ScanDetail, ScanListQuery, ScanSummary, ScanUpdate,
        StartAnalysisRequest, WheelchairProfile, WheelchairProfileCreate, WorldModel,
    },
};
use tracing::debug;
use url::Url;

use crate::ingest::CandidateFile;

#[async_trait]
pub trait ScanService: Send + Sync {
    async fn create_scan(&self, request: ScanCreate) -> Result<ScanSummary>;
    async fn list_scans(&self, query: ScanListQuery) -> Result<Page<ScanSummary>>;
    async fn get_scan(&self, scan_id: ScanId) -> Result<ScanDetail>;
    async fn update_scan(&self, scan_id: ScanId, update: ScanUpdate) -> Result<ScanSummary>;
    async fn delete_scan(&self, scan_id: ScanId) -> Result<()>;
    async fn list_images(&self, scan_id: ScanId) -> Result<Vec<ImageInfo>>;
    async fn upload_images(
        &self,
        scan_id: ScanId,
        files: Vec<CandidateFile>,
    ) -> Result<ImageUploadResponse>;
    async fn delete_image(&self, scan_id: ScanId, image_id: ImageId) -> Result<()>;
    async fn reorder_images(&self, scan_id: ScanId, order: Vec<ImageId>)
        -> Result<Vec<ImageInfo>>;
    async fn fetch_image(&self, scan_id: ScanId, image_id: ImageId) -> Result<Vec<u8>>;
}

/// The external analysis backend. Detection itself happens server-side.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn start_analysis(
        &self,
        scan_id: ScanId,
        request: StartAnalysisRequest,
    ) -> Result<AnalysisResponse>;
    async fn get_analysis(&self, scan_id: ScanId) -> Result<AnalysisResponse>;
    async fn list_barriers(&self, scan_id: ScanId, filter: BarrierFilter) -> Result<Vec<Barrier>>;
    async fn list_image_barriers(&self, image_id: ImageId) -> Result<Vec<Barrier>>;
}

#[async_trait]
pub trait GuideService: Send + Sync {
    async fn get_guide(&self, scan_id: ScanId, profile: Option<ProfileId>) -> Result<Guide>;
    async fn generate_guide(&self, scan_id: ScanId, profile: Option<ProfileId>) -> Result<Guide>;
    async fn get_world_model(&self, scan_id: ScanId) -> Result<WorldModel>;
    async fn list_wheelchair_profiles(&self) -> Result<Vec<WheelchairProfile>>;
    async fn create_wheelchair_profile(
        &self,
        profile: WheelchairProfileCreate,
    ) -> Result<WheelchairProfile>;
    async fn get_wheelchair_profile(&self, profile_id: ProfileId) -> Result<WheelchairProfile>;
    async fn delete_wheelchair_profile(&self, profile_id: ProfileId) -> Result<()>;
}

/// JSON-over-HTTP client for the scan backend.
#[derive(Debug, Clone)]
pub struct HttpScanApi {
    http: Client,
    base_url: String,
}

impl HttpScanApi {
    /// `base_url` is the API root, e.g. `http://127.0.0.1:8002/api`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url).with_context(|| format!("invalid api url: {base_url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!("api url must start with http:// or https://"));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Address the binary content of one image is served from.
    pub fn image_url(&self, scan_id: ScanId, image_id: ImageId) -> String {
        self.url(&format!("scans/{scan_id}/images/{image_id}/file"))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body: ApiErrorBody = response.json().await.unwrap_or_default();
        let message = body
            .message()
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        debug!(status = status.as_u16(), %message, "api request rejected");
        Err(ApiException::new(status.as_u16(), message).into())
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        Ok(self.send(request).await?.json().await?)
    }
}

#[async_trait]
impl ScanService for HttpScanApi {
    async fn create_scan(&self, request: ScanCreate) -> Result<ScanSummary> {
        self.send_json(self.http.post(self.url("scans")).json(&request))
            .await
    }

    async fn list_scans(&self, query: ScanListQuery) -> Result<Page<ScanSummary>> {
        self.send_json(self.http.get(self.url("scans")).query(&query))
            .await
    }

    async fn get_scan(&self, scan_id: ScanId) -> Result<ScanDetail> {
        self.send_json(self.http.get(self.url(&format!("scans/{scan_id}"))))
            .await
    }

    async fn update_scan(&self, scan_id: ScanId, update: ScanUpdate) -> Result<ScanSummary> {
        self.send_json(
            self.http
                .patch(self.url(&format!("scans/{scan_id}")))
                .json(&update),
        )
        .await
    }

    async fn delete_scan(&self, scan_id: ScanId) -> Result<()> {
        self.send(self.http.delete(self.url(&format!("scans/{scan_id}"))))
            .await?;
        Ok(())
    }

    async fn list_images(&self, scan_id: ScanId) -> Result<Vec<ImageInfo>> {
        self.send_json(self.http.get(self.url(&format!("scans/{scan_id}/images"))))
            .await
    }

    async fn upload_images(
        &self,
        scan_id: ScanId,
        files: Vec<CandidateFile>,
    ) -> Result<ImageUploadResponse> {
        let mut form = multipart::Form::new();
        for file in files {
            let part = multipart::Part::bytes(file.content.to_vec())
                .file_name(file.name.clone())
                .mime_str(&file.mime_type)
                .with_context(|| format!("invalid mime type for {}", file.name))?;
            form = form.part("files", part);
        }
        self.send_json(
            self.http
                .post(self.url(&format!("scans/{scan_id}/images")))
                .multipart(form),
        )
        .await
    }

    async fn delete_image(&self, scan_id: ScanId, image_id: ImageId) -> Result<()> {
        self.send(
            self.http
                .delete(self.url(&format!("scans/{scan_id}/images/{image_id}"))),
        )
        .await?;
        Ok(())
    }

    async fn reorder_images(
        &self,
        scan_id: ScanId,
        order: Vec<ImageId>,
    ) -> Result<Vec<ImageInfo>> {
        self.send_json(
            self.http
                .post(self.url(&format!("scans/{scan_id}/images/reorder")))
                .json(&order),
        )
        .await
    }

    async fn fetch_image(&self, scan_id: ScanId, image_id: ImageId) -> Result<Vec<u8>> {
        let bytes = self
            .send(self.http.get(self.image_url(scan_id, image_id)))
            .await?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl AnalysisService for HttpScanApi {
    async fn start_analysis(
        &self,
        scan_id: ScanId,
        request: StartAnalysisRequest,
    ) -> Result<AnalysisResponse> {
        self.send_json(
            self.http
                .post(self.url(&format!("scans/{scan_id}/analyze")))
                .json(&request),
        )
        .await
    }

    async fn get_analysis(&self, scan_id: ScanId) -> Result<AnalysisResponse> {
        self.send_json(self.http.get(self.url(&format!("scans/{scan_id}/analysis"))))
            .await
    }

    async fn list_barriers(&self, scan_id: ScanId, filter: BarrierFilter) -> Result<Vec<Barrier>> {
        self.send_json(
            self.http
                .get(self.url(&format!("scans/{scan_id}/analysis/barriers")))
                .query(&filter),
        )
        .await
    }

    async fn list_image_barriers(&self, image_id: ImageId) -> Result<Vec<Barrier>> {
        self.send_json(self.http.get(self.url(&format!("images/{image_id}/barriers"))))
            .await
    }
}

#[async_trait]
impl GuideService for HttpScanApi {
    async fn get_guide(&self, scan_id: ScanId, profile: Option<ProfileId>) -> Result<Guide> {
        let mut request = self.http.get(self.url(&format!("scans/{scan_id}/guide")));
        if let Some(profile) = profile {
            request = request.query(&[("wheelchair_profile_id", profile.to_string())]);
        }
        self.send_json(request).await
    }

    async fn generate_guide(&self, scan_id: ScanId, profile: Option<ProfileId>) -> Result<Guide> {
        self.send_json(
            self.http
                .post(self.url(&format!("scans/{scan_id}/guide")))
                .json(&GenerateGuideRequest {
                    wheelchair_profile_id: profile,
                }),
        )
        .await
    }

    async fn get_world_model(&self, scan_id: ScanId) -> Result<WorldModel> {
        self.send_json(self.http.get(self.url(&format!("scans/{scan_id}/world-model"))))
            .await
    }

    async fn list_wheelchair_profiles(&self) -> Result<Vec<WheelchairProfile>> {
        self.send_json(self.http.get(self.url("wheelchair-profiles")))
            .await
    }

    async fn create_wheelchair_profile(
        &self,
        profile: WheelchairProfileCreate,
    ) -> Result<WheelchairProfile> {
        self.send_json(self.http.post(self.url("wheelchair-profiles")).json(&profile))
            .await
    }

    async fn get_wheelchair_profile(&self, profile_id: ProfileId) -> Result<WheelchairProfile> {
        self.send_json(
            self.http
                .get(self.url(&format!("wheelchair-profiles/{profile_id}"))),
        )
        .await
    }

    async fn delete_wheelchair_profile(&self, profile_id: ProfileId) -> Result<()> {
        self.send(
            self.http
                .delete(self.url(&format!("wheelchair-profiles/{profile_id}"))),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;

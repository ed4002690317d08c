//! In-memory stand-ins for the scan backend.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use shared::{
    domain::{
        AccessibilityRating, AnalysisId, AnalysisStatus, GuideId, ImageId, ProfileId, ScanId,
        ScanStatus, SpaceType,
    },
    error::ApiException,
    protocol::{
        AnalysisResponse, Barrier, BarrierFilter, Guide, ImageInfo, ImageUploadResponse,
        NavigationStep, Page, ScanCreate, ScanDetail, ScanListQuery, ScanSummary, ScanUpdate,
        StartAnalysisRequest, WheelchairProfile, WheelchairProfileCreate, WorldModel,
        WorldModelNode,
    },
};
use tokio::sync::Semaphore;

use crate::{
    api::{AnalysisService, GuideService, ScanService},
    ingest::{CandidateFile, BYTES_PER_MB},
};

#[derive(Debug, Clone)]
pub enum Scripted {
    Status(AnalysisStatus),
    Failed(String),
    NetworkError,
}

pub struct FakeState {
    pub scan: ScanSummary,
    pub images: Vec<ImageInfo>,
    pub script: VecDeque<Scripted>,
    pub last: Option<AnalysisResponse>,
    pub analysis_id: AnalysisId,
    pub start_requests: Vec<StartAnalysisRequest>,
    pub status_queries: u32,
    pub generate_calls: u32,
    pub upload_calls: u32,
    pub server_upload_errors: Vec<String>,
    pub fail_generate: Option<String>,
    pub fail_start: Option<String>,
    pub stored_guide: Option<Guide>,
    pub empty_guide: bool,
    pub profiles: Vec<WheelchairProfile>,
}

pub struct FakeBackend {
    pub state: Mutex<FakeState>,
    pub poll_gate: Option<Arc<Semaphore>>,
}

pub fn scan_summary(id: ScanId) -> ScanSummary {
    ScanSummary {
        id,
        name: "Library".into(),
        description: None,
        location: Some("Plaza Mayor 1".into()),
        status: ScanStatus::Pending,
        image_count: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn analysis_response(
    scan_id: ScanId,
    id: AnalysisId,
    status: AnalysisStatus,
) -> AnalysisResponse {
    AnalysisResponse {
        id,
        scan_id,
        status,
        started_at: Some(Utc::now()),
        completed_at: None,
        error_message: None,
        total_images_analyzed: 0,
        total_barriers_found: 0,
        accessibility_score: None,
    }
}

pub fn jpeg(name: &str, size_mb: u64) -> CandidateFile {
    CandidateFile {
        name: name.to_string(),
        mime_type: "image/jpeg".to_string(),
        size_bytes: size_mb * BYTES_PER_MB,
        content: Arc::from(vec![0xFF_u8, 0xD8, 0xFF]),
    }
}

pub fn guide_with_steps(scan_id: ScanId, steps: usize) -> Guide {
    Guide {
        id: GuideId::new(),
        scan_id,
        title: "Navigation guide".into(),
        summary: format!("{steps} steps"),
        accessibility_score: Some(72.0),
        navigation_steps: (0..steps)
            .map(|i| NavigationStep {
                step_number: i as u32 + 1,
                image_id: ImageId::new(),
                image_url: String::new(),
                title: format!("Step {}", i + 1),
                description: String::new(),
                barriers: Vec::new(),
                alerts: Vec::new(),
                recommendations: Vec::new(),
                accessibility_rating: AccessibilityRating::Accessible,
            })
            .collect(),
        critical_alerts: Vec::new(),
        wheelchair_profile: None,
        created_at: Utc::now(),
    }
}

impl FakeBackend {
    pub fn new(scan_id: ScanId) -> Arc<Self> {
        Self::build(scan_id, None)
    }

    pub fn gated(scan_id: ScanId, gate: Arc<Semaphore>) -> Arc<Self> {
        Self::build(scan_id, Some(gate))
    }

    fn build(scan_id: ScanId, poll_gate: Option<Arc<Semaphore>>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                scan: scan_summary(scan_id),
                images: Vec::new(),
                script: VecDeque::new(),
                last: None,
                analysis_id: AnalysisId::new(),
                start_requests: Vec::new(),
                status_queries: 0,
                generate_calls: 0,
                upload_calls: 0,
                server_upload_errors: Vec::new(),
                fail_generate: None,
                fail_start: None,
                stored_guide: None,
                empty_guide: false,
                profiles: Vec::new(),
            }),
            poll_gate,
        })
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut guard = self.state.lock().expect("fake state lock");
        f(&mut guard)
    }

    pub fn script(&self, items: impl IntoIterator<Item = Scripted>) {
        self.with_state(|state| state.script.extend(items));
    }

    pub fn seed_images(&self, count: usize) {
        self.with_state(|state| {
            for i in 0..count {
                let info = image_info(&format!("seed-{i}.jpg"), BYTES_PER_MB, i as u32);
                state.images.push(info);
            }
            state.scan.status = ScanStatus::Ready;
            state.scan.image_count = state.images.len() as u32;
        });
    }

    pub fn generate_calls(&self) -> u32 {
        self.with_state(|state| state.generate_calls)
    }

    pub fn status_queries(&self) -> u32 {
        self.with_state(|state| state.status_queries)
    }

    fn detail(state: &FakeState) -> ScanDetail {
        ScanDetail {
            scan: state.scan.clone(),
            images: state.images.clone(),
            analysis_result: None,
            has_guide: state.stored_guide.is_some(),
        }
    }
}

fn image_info(name: &str, size: u64, order: u32) -> ImageInfo {
    ImageInfo {
        id: ImageId::new(),
        filename: format!("{order}-{name}"),
        original_filename: name.to_string(),
        file_size: size,
        mime_type: "image/jpeg".into(),
        width: None,
        height: None,
        sequence_order: order,
        user_description: None,
        created_at: Utc::now(),
        barrier_count: 0,
        url: String::new(),
    }
}

#[async_trait]
impl ScanService for FakeBackend {
    async fn create_scan(&self, request: ScanCreate) -> Result<ScanSummary> {
        self.with_state(|state| {
            state.scan.name = request.name;
            Ok(state.scan.clone())
        })
    }

    async fn list_scans(&self, _query: ScanListQuery) -> Result<Page<ScanSummary>> {
        self.with_state(|state| {
            Ok(Page {
                items: vec![state.scan.clone()],
                total: 1,
                limit: 20,
                offset: 0,
            })
        })
    }

    async fn get_scan(&self, scan_id: ScanId) -> Result<ScanDetail> {
        self.with_state(|state| {
            if state.scan.id != scan_id {
                return Err(ApiException::new(404, "Scan not found").into());
            }
            Ok(Self::detail(state))
        })
    }

    async fn update_scan(&self, _scan_id: ScanId, update: ScanUpdate) -> Result<ScanSummary> {
        self.with_state(|state| {
            if let Some(name) = update.name {
                state.scan.name = name;
            }
            Ok(state.scan.clone())
        })
    }

    async fn delete_scan(&self, _scan_id: ScanId) -> Result<()> {
        Ok(())
    }

    async fn list_images(&self, _scan_id: ScanId) -> Result<Vec<ImageInfo>> {
        self.with_state(|state| Ok(state.images.clone()))
    }

    async fn upload_images(
        &self,
        _scan_id: ScanId,
        files: Vec<CandidateFile>,
    ) -> Result<ImageUploadResponse> {
        self.with_state(|state| {
            state.upload_calls += 1;
            let mut response = ImageUploadResponse::default();
            for file in files {
                if let Some(pos) = state
                    .server_upload_errors
                    .iter()
                    .position(|name| *name == file.name)
                {
                    state.server_upload_errors.remove(pos);
                    response.failed += 1;
                    response.errors.push(format!("{}: corrupt image", file.name));
                    continue;
                }
                let order = state.images.len() as u32;
                let info = image_info(&file.name, file.size_bytes, order);
                state.images.push(info.clone());
                response.images.push(info);
                response.uploaded += 1;
            }
            state.scan.image_count = state.images.len() as u32;
            if !state.images.is_empty() {
                state.scan.status = ScanStatus::Ready;
            }
            Ok(response)
        })
    }

    async fn delete_image(&self, _scan_id: ScanId, image_id: ImageId) -> Result<()> {
        self.with_state(|state| {
            let before = state.images.len();
            state.images.retain(|image| image.id != image_id);
            if state.images.len() == before {
                return Err(ApiException::new(404, "Image not found").into());
            }
            for (order, image) in state.images.iter_mut().enumerate() {
                image.sequence_order = order as u32;
            }
            state.scan.image_count = state.images.len() as u32;
            Ok(())
        })
    }

    async fn reorder_images(
        &self,
        _scan_id: ScanId,
        order: Vec<ImageId>,
    ) -> Result<Vec<ImageInfo>> {
        self.with_state(|state| {
            let mut reordered = Vec::with_capacity(order.len());
            for (position, id) in order.iter().enumerate() {
                let mut image = state
                    .images
                    .iter()
                    .find(|image| image.id == *id)
                    .cloned()
                    .ok_or_else(|| anyhow!("unknown image {id}"))?;
                image.sequence_order = position as u32;
                reordered.push(image);
            }
            state.images = reordered.clone();
            Ok(reordered)
        })
    }

    async fn fetch_image(&self, _scan_id: ScanId, _image_id: ImageId) -> Result<Vec<u8>> {
        Ok(vec![0xFF, 0xD8, 0xFF])
    }
}

#[async_trait]
impl AnalysisService for FakeBackend {
    async fn start_analysis(
        &self,
        scan_id: ScanId,
        request: StartAnalysisRequest,
    ) -> Result<AnalysisResponse> {
        self.with_state(|state| {
            if let Some(err) = state.fail_start.take() {
                return Err(anyhow!(err));
            }
            state.start_requests.push(request);
            state.analysis_id = AnalysisId::new();
            state.last = None;
            state.scan.status = ScanStatus::Analyzing;
            Ok(analysis_response(
                scan_id,
                state.analysis_id,
                AnalysisStatus::Pending,
            ))
        })
    }

    async fn get_analysis(&self, scan_id: ScanId) -> Result<AnalysisResponse> {
        if let Some(gate) = &self.poll_gate {
            gate.acquire().await?.forget();
        }
        self.with_state(|state| {
            state.status_queries += 1;
            let mut response = match state.script.pop_front() {
                Some(Scripted::NetworkError) => return Err(anyhow!("connection reset by peer")),
                Some(Scripted::Status(status)) => {
                    analysis_response(scan_id, state.analysis_id, status)
                }
                Some(Scripted::Failed(message)) => {
                    let mut response =
                        analysis_response(scan_id, state.analysis_id, AnalysisStatus::Failed);
                    response.error_message = Some(message);
                    response
                }
                None => match &state.last {
                    Some(last) => last.clone(),
                    None => analysis_response(scan_id, state.analysis_id, AnalysisStatus::Pending),
                },
            };
            if response.status != AnalysisStatus::Pending {
                response.total_images_analyzed = state.images.len() as u32;
            }
            match response.status {
                AnalysisStatus::Completed => state.scan.status = ScanStatus::Completed,
                AnalysisStatus::Failed => state.scan.status = ScanStatus::Failed,
                _ => {}
            }
            state.last = Some(response.clone());
            Ok(response)
        })
    }

    async fn list_barriers(
        &self,
        _scan_id: ScanId,
        _filter: BarrierFilter,
    ) -> Result<Vec<Barrier>> {
        Ok(Vec::new())
    }

    async fn list_image_barriers(&self, _image_id: ImageId) -> Result<Vec<Barrier>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl GuideService for FakeBackend {
    async fn get_guide(&self, _scan_id: ScanId, _profile: Option<ProfileId>) -> Result<Guide> {
        self.with_state(|state| {
            state
                .stored_guide
                .clone()
                .ok_or_else(|| ApiException::new(404, "Guide not found").into())
        })
    }

    async fn generate_guide(&self, scan_id: ScanId, _profile: Option<ProfileId>) -> Result<Guide> {
        self.with_state(|state| {
            state.generate_calls += 1;
            if let Some(err) = state.fail_generate.take() {
                return Err(anyhow!(err));
            }
            let steps = if state.empty_guide { 0 } else { state.images.len() };
            let guide = guide_with_steps(scan_id, steps);
            state.stored_guide = Some(guide.clone());
            Ok(guide)
        })
    }

    /// One node per image in sequence order, available once analysis completed.
    async fn get_world_model(&self, scan_id: ScanId) -> Result<WorldModel> {
        self.with_state(|state| {
            if state.scan.status != ScanStatus::Completed {
                return Err(ApiException::new(404, "World model not found").into());
            }
            let nodes: Vec<WorldModelNode> = state
                .images
                .iter()
                .enumerate()
                .map(|(i, image)| WorldModelNode {
                    id: format!("node_{i}"),
                    image_id: image.id,
                    image_url: image.url.clone(),
                    label: image.original_filename.clone(),
                    space_type: SpaceType::Room,
                    barriers: Vec::new(),
                    accessibility_score: 80.0,
                    features: Default::default(),
                })
                .collect();
            Ok(WorldModel {
                scan_id,
                recommended_path: Some(nodes.iter().map(|node| node.id.clone()).collect()),
                nodes,
                edges: Vec::new(),
            })
        })
    }

    async fn list_wheelchair_profiles(&self) -> Result<Vec<WheelchairProfile>> {
        Ok(self.with_state(|state| state.profiles.clone()))
    }

    async fn create_wheelchair_profile(
        &self,
        profile: WheelchairProfileCreate,
    ) -> Result<WheelchairProfile> {
        let created = WheelchairProfile {
            id: ProfileId::new(),
            name: profile.name,
            description: profile.description,
            width_cm: profile.width_cm,
            length_cm: profile.length_cm,
            min_door_width_cm: profile.min_door_width_cm,
            max_step_height_cm: profile.max_step_height_cm,
            max_slope_percent: profile.max_slope_percent,
            can_handle_gravel: profile.can_handle_gravel,
            can_handle_grass: profile.can_handle_grass,
            wheelchair_type: profile.wheelchair_type,
            is_default: false,
        };
        self.with_state(|state| state.profiles.push(created.clone()));
        Ok(created)
    }

    async fn get_wheelchair_profile(&self, profile_id: ProfileId) -> Result<WheelchairProfile> {
        self.with_state(|state| {
            state
                .profiles
                .iter()
                .find(|profile| profile.id == profile_id)
                .cloned()
                .ok_or_else(|| ApiException::new(404, "Wheelchair profile not found").into())
        })
    }

    async fn delete_wheelchair_profile(&self, profile_id: ProfileId) -> Result<()> {
        self.with_state(|state| {
            let before = state.profiles.len();
            state.profiles.retain(|profile| profile.id != profile_id);
            if state.profiles.len() == before {
                return Err(ApiException::new(404, "Wheelchair profile not found").into());
            }
            Ok(())
        })
    }
}

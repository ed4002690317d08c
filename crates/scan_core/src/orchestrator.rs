//! Scan lifecycle: ingest, analysis, guide generation, tour.
//!
//! The orchestrator is driven from a single task. Poll results arrive on a
//! channel owned by the active [`AnalysisPoller`]; callers pump them with
//! [`ScanOrchestrator::process_next_update`] or
//! [`ScanOrchestrator::run_until_settled`]. Stopping the poller drops that
//! channel, so nothing it had in flight can reach the state machine.

use std::{sync::Arc, time::Duration};

use futures::future::join;
use shared::{
    domain::{AnalysisStatus, GuideId, ImageId, ProfileId, ScanId, ScanStatus},
    protocol::{
        AnalysisResponse, Barrier, BarrierFilter, Guide, ImageInfo, ScanCreate, ScanDetail,
        ScanSummary, ScanUpdate, StartAnalysisRequest, WheelchairProfile, WorldModel,
    },
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::{
    api::{AnalysisService, GuideService, ScanService},
    cache::{CacheKey, Mutation, VersionedCache},
    config::ClientSettings,
    error::{OrchestratorError, Result, ValidationFailure},
    ingest::{
        CandidateFile, FileIdentity, ImageIngestQueue, IngestConfig, Rejection, RejectionReason,
        ValidationOutcome,
    },
    poller::{AnalysisPoller, PollEnvelope, PollerStats},
    tour::{SharedTour, TourController},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrchestratorState {
    Uploading,
    ReadyToAnalyze,
    Analyzing,
    GuideGenerating,
    Touring,
    Failed,
}

impl OrchestratorState {
    pub fn as_str(self) -> &'static str {
        match self {
            OrchestratorState::Uploading => "uploading",
            OrchestratorState::ReadyToAnalyze => "ready_to_analyze",
            OrchestratorState::Analyzing => "analyzing",
            OrchestratorState::GuideGenerating => "guide_generating",
            OrchestratorState::Touring => "touring",
            OrchestratorState::Failed => "failed",
        }
    }

    /// Images are referenced by a running job in these states.
    fn locks_images(self) -> bool {
        matches!(
            self,
            OrchestratorState::Analyzing | OrchestratorState::GuideGenerating
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEvent {
    StateChanged {
        from: OrchestratorState,
        to: OrchestratorState,
    },
    ImagesChanged {
        count: usize,
    },
    Progress(AnalysisResponse),
    AnalysisFailed {
        message: String,
    },
    GuideReady {
        guide_id: GuideId,
        steps: usize,
    },
    TourCompleted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    pub poll_interval: Duration,
    pub ingest: IngestConfig,
    pub wheelchair_profile_id: Option<ProfileId>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            ingest: IngestConfig::default(),
            wheelchair_profile_id: None,
        }
    }
}

impl From<&ClientSettings> for OrchestratorSettings {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            ingest: settings.ingest_config(),
            wheelchair_profile_id: settings.wheelchair_profile_id,
        }
    }
}

/// The three backend collaborators.
#[derive(Clone)]
pub struct ScanServices {
    pub scans: Arc<dyn ScanService>,
    pub analysis: Arc<dyn AnalysisService>,
    pub guides: Arc<dyn GuideService>,
}

impl ScanServices {
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: ScanService + AnalysisService + GuideService + 'static,
    {
        Self {
            scans: backend.clone(),
            analysis: backend.clone(),
            guides: backend,
        }
    }
}

struct ActivePoll {
    poller: AnalysisPoller,
    updates: mpsc::UnboundedReceiver<PollEnvelope>,
}

pub struct ScanOrchestrator {
    scan_id: ScanId,
    services: ScanServices,
    settings: OrchestratorSettings,
    state: OrchestratorState,
    scan: Option<ScanSummary>,
    images: Vec<ImageInfo>,
    queue: ImageIngestQueue,
    detail_cache: VersionedCache<ScanDetail>,
    guide_cache: VersionedCache<Guide>,
    poll: Option<ActivePoll>,
    generation: u64,
    job: Option<AnalysisResponse>,
    error: Option<String>,
    force_next: bool,
    guide: Option<Guide>,
    tour: Option<SharedTour>,
    events: broadcast::Sender<OrchestratorEvent>,
}

impl std::fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("scan_id", &self.scan_id)
            .field("state", &self.state)
            .field("images", &self.images.len())
            .field("polling", &self.is_polling())
            .field("error", &self.error)
            .finish()
    }
}

impl ScanOrchestrator {
    /// A fresh orchestrator for a scan with no images yet.
    pub fn new(scan_id: ScanId, services: ScanServices, settings: OrchestratorSettings) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            scan_id,
            queue: ImageIngestQueue::new(settings.ingest),
            services,
            settings,
            state: OrchestratorState::Uploading,
            scan: None,
            images: Vec::new(),
            detail_cache: VersionedCache::new(),
            guide_cache: VersionedCache::new(),
            poll: None,
            generation: 0,
            job: None,
            error: None,
            force_next: false,
            guide: None,
            tour: None,
            events,
        }
    }

    pub async fn create(
        request: ScanCreate,
        services: ScanServices,
        settings: OrchestratorSettings,
    ) -> Result<Self> {
        let summary = services
            .scans
            .create_scan(request)
            .await
            .map_err(OrchestratorError::Service)?;
        info!(scan_id = %summary.id, name = %summary.name, "scan created");
        let mut orchestrator = Self::new(summary.id, services, settings);
        orchestrator.record(Mutation::CreateScan);
        orchestrator.scan = Some(summary);
        Ok(orchestrator)
    }

    /// Loads an existing scan and resumes from whatever the server reports.
    pub async fn open(
        scan_id: ScanId,
        services: ScanServices,
        settings: OrchestratorSettings,
    ) -> Result<Self> {
        let mut orchestrator = Self::new(scan_id, services, settings);
        orchestrator.refresh().await?;
        orchestrator.resume().await?;
        Ok(orchestrator)
    }

    async fn resume(&mut self) -> Result<()> {
        let status = self
            .scan
            .as_ref()
            .map(|scan| scan.status)
            .unwrap_or(ScanStatus::Pending);
        debug!(
            scan_id = %self.scan_id,
            status = status.as_str(),
            images = self.images.len(),
            "resuming scan"
        );

        match status {
            ScanStatus::Pending | ScanStatus::Uploading | ScanStatus::Ready => {
                if !self.images.is_empty() {
                    self.transition(OrchestratorState::ReadyToAnalyze);
                }
            }
            ScanStatus::Analyzing => {
                self.transition(OrchestratorState::Analyzing);
                self.start_poller();
            }
            ScanStatus::Completed => {
                let scan_id = self.scan_id;
                let profile = self.settings.wheelchair_profile_id;
                let guides = Arc::clone(&self.services.guides);
                let (analysis, guide) = join(
                    self.services.analysis.get_analysis(scan_id),
                    self.guide_cache.get_or_fetch(CacheKey::Guide(scan_id), || {
                        guides.get_guide(scan_id, profile)
                    }),
                )
                .await;
                self.job = match analysis {
                    Ok(job) => Some(job),
                    Err(err) => {
                        warn!(%scan_id, "could not load completed analysis: {err:#}");
                        None
                    }
                };
                match guide {
                    Ok(guide) => {
                        if let Err(err) = self.enter_tour(guide) {
                            warn!(%scan_id, "stored guide unusable: {err}");
                        }
                    }
                    Err(err) => match OrchestratorError::from_service(err, "guide") {
                        OrchestratorError::NotFound { .. } => {
                            info!(%scan_id, "analysis completed but no guide stored");
                            self.transition(OrchestratorState::ReadyToAnalyze);
                        }
                        other => return Err(other),
                    },
                }
            }
            ScanStatus::Failed => {
                let message = match self.services.analysis.get_analysis(self.scan_id).await {
                    Ok(job) => {
                        let message = job.error_message.clone();
                        self.job = Some(job);
                        message
                    }
                    Err(err) => {
                        warn!(scan_id = %self.scan_id, "could not load failed analysis: {err:#}");
                        None
                    }
                };
                self.fail(message.unwrap_or_else(|| "analysis failed".to_string()));
            }
        }
        Ok(())
    }

    pub fn scan_id(&self) -> ScanId {
        self.scan_id
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn scan(&self) -> Option<&ScanSummary> {
        self.scan.as_ref()
    }

    /// Server-confirmed images in sequence order.
    pub fn images(&self) -> &[ImageInfo] {
        &self.images
    }

    pub fn staged(&self) -> &ImageIngestQueue {
        &self.queue
    }

    pub fn job(&self) -> Option<&AnalysisResponse> {
        self.job.as_ref()
    }

    /// Message of the last terminal failure, cleared by `retry()`.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn guide(&self) -> Option<&Guide> {
        self.guide.as_ref()
    }

    pub fn tour(&self) -> Option<SharedTour> {
        self.tour.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.poll
            .as_ref()
            .is_some_and(|active| active.poller.is_active())
    }

    pub fn poller_stats(&self) -> Option<PollerStats> {
        self.poll.as_ref().map(|active| active.poller.stats())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    fn resource(&self) -> String {
        format!("scan {}", self.scan_id)
    }

    fn emit(&self, event: OrchestratorEvent) {
        let _ = self.events.send(event);
    }

    fn transition(&mut self, to: OrchestratorState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        info!(
            scan_id = %self.scan_id,
            from = from.as_str(),
            to = to.as_str(),
            "scan state changed"
        );
        self.emit(OrchestratorEvent::StateChanged { from, to });
    }

    fn record(&mut self, mutation: Mutation) {
        self.detail_cache.apply(mutation);
        self.guide_cache.apply(mutation);
    }

    /// Re-reads the scan detail unless the cached copy is still current.
    pub async fn refresh(&mut self) -> Result<()> {
        let scan_id = self.scan_id;
        let scans = Arc::clone(&self.services.scans);
        let detail = self
            .detail_cache
            .get_or_fetch(CacheKey::ScanDetail(scan_id), || scans.get_scan(scan_id))
            .await
            .map_err(|err| OrchestratorError::from_service(err, format!("scan {scan_id}")))?;
        self.apply_detail(detail);
        Ok(())
    }

    fn apply_detail(&mut self, detail: ScanDetail) {
        let mut images = detail.images;
        images.sort_by_key(|image| image.sequence_order);
        self.queue.sync_committed(images.iter().map(|image| FileIdentity {
            name: image.original_filename.clone(),
            size_bytes: image.file_size,
        }));
        self.images = images;
        self.scan = Some(detail.scan);
    }

    fn ensure_images_mutable(&self, operation: &'static str) -> Result<()> {
        if self.state.locks_images() {
            return Err(OrchestratorError::precondition(operation, self.state));
        }
        Ok(())
    }

    fn settle_after_image_change(&mut self) {
        self.emit(OrchestratorEvent::ImagesChanged {
            count: self.images.len(),
        });
        if self.images.is_empty() && self.state != OrchestratorState::Failed {
            self.clear_tour();
            self.transition(OrchestratorState::Uploading);
        } else if !self.images.is_empty() && self.state == OrchestratorState::Touring {
            // The completed analysis no longer covers the image set.
            self.force_next = true;
            self.clear_tour();
            self.transition(OrchestratorState::ReadyToAnalyze);
        } else if !self.images.is_empty() && self.state == OrchestratorState::Uploading {
            self.transition(OrchestratorState::ReadyToAnalyze);
        }
    }

    fn clear_tour(&mut self) {
        if self.tour.take().is_some() {
            debug!(scan_id = %self.scan_id, "guide superseded by image change");
        }
        self.guide = None;
    }

    /// Validates `files` and adds the accepted ones to the staged set.
    pub fn stage_files(
        &mut self,
        files: impl IntoIterator<Item = CandidateFile>,
    ) -> ValidationOutcome {
        let outcome = self.queue.add(files);
        debug!(
            scan_id = %self.scan_id,
            accepted = outcome.accepted.len(),
            rejected = outcome.rejected.len(),
            duplicates = outcome.duplicates.len(),
            staged = self.queue.len(),
            "files staged"
        );
        outcome
    }

    pub fn unstage(&mut self, index: usize) -> Option<CandidateFile> {
        self.queue.remove(index)
    }

    /// Uploads everything staged. Files the server refuses come back as
    /// a `Validation` error; the rest stay committed.
    pub async fn commit_staged(&mut self) -> Result<Vec<ImageInfo>> {
        let (uploaded, rejected) = self.upload_staged().await?;
        if rejected.is_empty() {
            return Ok(uploaded);
        }
        Err(OrchestratorError::Validation(ValidationFailure {
            committed: uploaded.len(),
            rejected,
            overflow: None,
        }))
    }

    /// Stages and uploads in one step. Accepted files are committed even
    /// when others are rejected; re-ingesting a committed file is a no-op.
    pub async fn ingest_images(
        &mut self,
        files: impl IntoIterator<Item = CandidateFile>,
    ) -> Result<Vec<ImageInfo>> {
        self.ensure_images_mutable("ingest images")?;
        let outcome = self.stage_files(files);
        let (uploaded, server_rejected) = self.upload_staged().await?;

        let mut failure = ValidationFailure {
            committed: uploaded.len(),
            rejected: outcome.rejected,
            overflow: outcome.overflow,
        };
        failure.rejected.extend(server_rejected);
        if failure.is_empty() {
            return Ok(uploaded);
        }
        warn!(
            scan_id = %self.scan_id,
            committed = failure.committed,
            rejected = failure.rejected.len(),
            overflow = failure.overflow.is_some(),
            "some images were not ingested"
        );
        Err(OrchestratorError::Validation(failure))
    }

    async fn upload_staged(&mut self) -> Result<(Vec<ImageInfo>, Vec<Rejection>)> {
        self.ensure_images_mutable("upload images")?;
        if self.queue.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }
        let files = self.queue.pending().to_vec();
        let count = files.len();
        let response = self
            .services
            .scans
            .upload_images(self.scan_id, files)
            .await
            .map_err(|err| OrchestratorError::from_service(err, self.resource()))?;
        self.queue.clear();
        self.record(Mutation::ImagesChanged(self.scan_id));
        info!(
            scan_id = %self.scan_id,
            sent = count,
            uploaded = response.uploaded,
            failed = response.failed,
            "images uploaded"
        );

        let rejected = response
            .errors
            .iter()
            .map(String::as_str)
            .map(server_rejection)
            .collect();
        self.refresh().await?;
        self.settle_after_image_change();
        Ok((response.images, rejected))
    }

    pub async fn delete_image(&mut self, image_id: ImageId) -> Result<()> {
        self.ensure_images_mutable("delete images")?;
        self.services
            .scans
            .delete_image(self.scan_id, image_id)
            .await
            .map_err(|err| OrchestratorError::from_service(err, format!("image {image_id}")))?;
        info!(scan_id = %self.scan_id, %image_id, "image deleted");
        self.record(Mutation::ImagesChanged(self.scan_id));
        self.refresh().await?;
        self.settle_after_image_change();
        Ok(())
    }

    pub async fn reorder_images(&mut self, order: Vec<ImageId>) -> Result<()> {
        self.ensure_images_mutable("reorder images")?;
        self.services
            .scans
            .reorder_images(self.scan_id, order)
            .await
            .map_err(|err| OrchestratorError::from_service(err, self.resource()))?;
        self.record(Mutation::ImagesChanged(self.scan_id));
        self.refresh().await?;
        self.settle_after_image_change();
        Ok(())
    }

    pub async fn update_details(&mut self, update: ScanUpdate) -> Result<()> {
        let summary = self
            .services
            .scans
            .update_scan(self.scan_id, update)
            .await
            .map_err(|err| OrchestratorError::from_service(err, self.resource()))?;
        self.record(Mutation::UpdateScan(self.scan_id));
        self.scan = Some(summary);
        Ok(())
    }

    /// Deletes the scan server-side. Any running poller is stopped first.
    pub async fn delete(mut self) -> Result<()> {
        self.stop_poller();
        self.services
            .scans
            .delete_scan(self.scan_id)
            .await
            .map_err(|err| OrchestratorError::from_service(err, self.resource()))?;
        self.record(Mutation::DeleteScan(self.scan_id));
        info!(scan_id = %self.scan_id, "scan deleted");
        Ok(())
    }

    pub async fn barriers(&self, filter: BarrierFilter) -> Result<Vec<Barrier>> {
        self.services
            .analysis
            .list_barriers(self.scan_id, filter)
            .await
            .map_err(|err| OrchestratorError::from_service(err, self.resource()))
    }

    /// Barriers detected on one of this scan's images.
    pub async fn image_barriers(&self, image_id: ImageId) -> Result<Vec<Barrier>> {
        self.services
            .analysis
            .list_image_barriers(image_id)
            .await
            .map_err(|err| OrchestratorError::from_service(err, format!("image {image_id}")))
    }

    /// The spatial graph built by a completed analysis. `NotFound` until
    /// one exists.
    pub async fn world_model(&self) -> Result<WorldModel> {
        let resource = format!("world model for scan {}", self.scan_id);
        self.services
            .guides
            .get_world_model(self.scan_id)
            .await
            .map_err(|err| OrchestratorError::from_service(err, resource))
    }

    pub async fn wheelchair_profiles(&self) -> Result<Vec<WheelchairProfile>> {
        self.services
            .guides
            .list_wheelchair_profiles()
            .await
            .map_err(OrchestratorError::Service)
    }

    /// Starts a job and the poller bound to it.
    pub async fn start_analysis(&mut self) -> Result<AnalysisResponse> {
        if self.state != OrchestratorState::ReadyToAnalyze
            || self.images.is_empty()
            || self.poll.is_some()
        {
            return Err(OrchestratorError::precondition("start analysis", self.state));
        }

        let force = self.force_next;
        let request = StartAnalysisRequest {
            wheelchair_profile_id: self.settings.wheelchair_profile_id,
            force,
        };
        let job = self
            .services
            .analysis
            .start_analysis(self.scan_id, request)
            .await
            .map_err(|err| OrchestratorError::from_service(err, self.resource()))?;
        self.force_next = false;
        self.record(Mutation::AnalysisStarted(self.scan_id));
        info!(scan_id = %self.scan_id, analysis_id = %job.id, force, "analysis started");

        self.job = Some(job.clone());
        self.error = None;
        self.transition(OrchestratorState::Analyzing);
        self.start_poller();
        Ok(job)
    }

    fn start_poller(&mut self) {
        self.stop_poller();
        self.generation += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        let poller = AnalysisPoller::start(
            self.scan_id,
            self.generation,
            self.settings.poll_interval,
            Arc::clone(&self.services.analysis),
            tx,
        );
        self.poll = Some(ActivePoll {
            poller,
            updates: rx,
        });
    }

    fn stop_poller(&mut self) -> bool {
        match self.poll.take() {
            Some(mut active) => active.poller.stop(),
            None => false,
        }
    }

    /// Waits for the next poll result and applies it. Returns `Ok(false)`
    /// once no poller is running.
    pub async fn process_next_update(&mut self) -> Result<bool> {
        let Some(active) = self.poll.as_mut() else {
            return Ok(false);
        };
        let generation = active.poller.generation();
        let Some(envelope) = active.updates.recv().await else {
            debug!(scan_id = %self.scan_id, generation, "poll channel closed");
            self.poll = None;
            return Ok(false);
        };
        if envelope.generation != generation {
            debug!(
                scan_id = %self.scan_id,
                stale = envelope.generation,
                current = generation,
                "discarding stale poll update"
            );
            return Ok(true);
        }
        self.on_tick(envelope.update.response().clone()).await?;
        Ok(true)
    }

    /// Pumps poll results until polling ends. A terminal failure surfaces
    /// as `TerminalAnalysis` with the orchestrator left in `Failed`.
    pub async fn run_until_settled(&mut self) -> Result<OrchestratorState> {
        while self.process_next_update().await? {}
        if self.state == OrchestratorState::Failed {
            return Err(OrchestratorError::TerminalAnalysis {
                message: self
                    .error
                    .clone()
                    .unwrap_or_else(|| "analysis failed".to_string()),
            });
        }
        Ok(self.state)
    }

    /// Applies one observed job status. Ignored outside `Analyzing`.
    pub async fn on_tick(&mut self, response: AnalysisResponse) -> Result<()> {
        if self.state != OrchestratorState::Analyzing {
            debug!(
                scan_id = %self.scan_id,
                state = self.state.as_str(),
                "ignoring status outside analysis"
            );
            return Ok(());
        }
        self.job = Some(response.clone());

        match response.status {
            AnalysisStatus::Completed => {
                self.stop_poller();
                self.detail_cache.invalidate([
                    CacheKey::ScanDetail(self.scan_id),
                    CacheKey::Analysis(self.scan_id),
                    CacheKey::Barriers(self.scan_id),
                ]);
                self.transition(OrchestratorState::GuideGenerating);
                self.generate_guide().await
            }
            AnalysisStatus::Failed => {
                self.stop_poller();
                let message = response
                    .error_message
                    .unwrap_or_else(|| "analysis failed".to_string());
                warn!(scan_id = %self.scan_id, %message, "analysis failed");
                self.fail(message);
                Ok(())
            }
            AnalysisStatus::Pending | AnalysisStatus::InProgress => {
                debug!(
                    scan_id = %self.scan_id,
                    analyzed = response.total_images_analyzed,
                    barriers = response.total_barriers_found,
                    "analysis progress"
                );
                self.emit(OrchestratorEvent::Progress(response));
                Ok(())
            }
        }
    }

    async fn generate_guide(&mut self) -> Result<()> {
        let profile = self.settings.wheelchair_profile_id;
        match self.services.guides.generate_guide(self.scan_id, profile).await {
            Ok(guide) => {
                self.record(Mutation::GuideGenerated(self.scan_id));
                self.guide_cache
                    .store_fresh(CacheKey::Guide(self.scan_id), guide.clone());
                self.on_guide_ready(guide).map(|_| ())
            }
            Err(err) => {
                warn!(scan_id = %self.scan_id, "guide generation failed: {err:#}");
                self.fail(format!("guide generation failed: {err:#}"));
                Ok(())
            }
        }
    }

    /// Seeds the tour with a freshly generated guide.
    pub fn on_guide_ready(&mut self, guide: Guide) -> Result<SharedTour> {
        if self.state != OrchestratorState::GuideGenerating {
            return Err(OrchestratorError::precondition("present guide", self.state));
        }
        self.enter_tour(guide)
    }

    fn enter_tour(&mut self, guide: Guide) -> Result<SharedTour> {
        let steps = guide.navigation_steps.len();
        let analyzed = self
            .job
            .as_ref()
            .map(|job| job.total_images_analyzed as usize)
            .filter(|count| *count > 0)
            .unwrap_or(self.images.len());
        if steps != analyzed {
            warn!(
                scan_id = %self.scan_id,
                steps,
                analyzed,
                "guide step count differs from analyzed images"
            );
        }

        let guide_id = guide.id;
        let events = self.events.clone();
        let controller = match TourController::new(guide.clone()) {
            Ok(controller) => controller,
            Err(err) => {
                self.fail(err.to_string());
                return Err(err);
            }
        };
        let tour = controller
            .with_completion(move || {
                let _ = events.send(OrchestratorEvent::TourCompleted);
            })
            .into_shared();

        self.guide = Some(guide);
        self.tour = Some(Arc::clone(&tour));
        self.transition(OrchestratorState::Touring);
        self.emit(OrchestratorEvent::GuideReady { guide_id, steps });
        Ok(tour)
    }

    fn fail(&mut self, message: String) {
        self.error = Some(message.clone());
        self.transition(OrchestratorState::Failed);
        self.emit(OrchestratorEvent::AnalysisFailed { message });
    }

    /// From `Failed` back to `ReadyToAnalyze`; the next start forces a
    /// fresh analysis.
    pub fn retry(&mut self) -> Result<()> {
        if self.state != OrchestratorState::Failed {
            return Err(OrchestratorError::precondition("retry", self.state));
        }
        self.error = None;
        self.force_next = true;
        self.transition(OrchestratorState::ReadyToAnalyze);
        Ok(())
    }

    /// Leaves `Analyzing` without waiting for the job, e.g. when the user
    /// navigates away. Returns whether a poller was stopped.
    pub fn abort(&mut self) -> bool {
        let stopped = self.stop_poller();
        if self.state == OrchestratorState::Analyzing {
            self.transition(OrchestratorState::ReadyToAnalyze);
        }
        stopped
    }
}

fn server_rejection(entry: &str) -> Rejection {
    let (file_name, detail) = entry.split_once(": ").unwrap_or(("", entry));
    Rejection {
        file_name: file_name.to_string(),
        reason: RejectionReason::ServerRejected(detail.to_string()),
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;

//! Client-side orchestration for wheelchair accessibility scans: image
//! ingestion, analysis polling, guide generation and the step-by-step tour.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod ingest;
pub mod keyboard;
pub mod orchestrator;
pub mod overlay;
pub mod poller;
pub mod tour;

#[cfg(test)]
mod test_support;

pub use api::{AnalysisService, GuideService, HttpScanApi, ScanService};
pub use cache::{CacheKey, VersionedCache};
pub use config::{load_settings, ClientSettings};
pub use error::{OrchestratorError, ValidationFailure};
pub use ingest::{CandidateFile, ImageIngestQueue, IngestConfig, ValidationOutcome};
pub use keyboard::{KeyboardBinding, KeyboardHub, TourKey, TourView};
pub use orchestrator::{
    OrchestratorEvent, OrchestratorSettings, OrchestratorState, ScanOrchestrator, ScanServices,
};
pub use poller::{AnalysisPoller, PollUpdate};
pub use tour::{SharedTour, TourController};

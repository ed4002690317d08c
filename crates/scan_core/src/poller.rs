//! Recurring analysis-status query bound to one job.
//!
//! At most one status query is outstanding at any time: a tick that fires
//! while the previous query is unresolved is dropped, not queued. Failed
//! queries are logged and the loop keeps going; only a terminal job status
//! ends it. Once stopped, nothing the poller had in flight is delivered.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use shared::{domain::ScanId, protocol::AnalysisResponse};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::api::AnalysisService;

#[derive(Debug, Clone, PartialEq)]
pub enum PollUpdate {
    Progress(AnalysisResponse),
    Terminal(AnalysisResponse),
}

impl PollUpdate {
    pub fn response(&self) -> &AnalysisResponse {
        match self {
            PollUpdate::Progress(response) | PollUpdate::Terminal(response) => response,
        }
    }
}

/// An update tagged with the poller instance that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct PollEnvelope {
    pub generation: u64,
    pub update: PollUpdate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    pub ticks: u64,
    pub queries: u64,
    pub skipped: u64,
    pub transient_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    queries: AtomicU64,
    skipped: AtomicU64,
    transient_errors: AtomicU64,
}

pub struct AnalysisPoller {
    scan_id: ScanId,
    generation: u64,
    active: Arc<AtomicBool>,
    counters: Arc<Counters>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for AnalysisPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisPoller")
            .field("scan_id", &self.scan_id)
            .field("generation", &self.generation)
            .field("active", &self.is_active())
            .finish()
    }
}

impl AnalysisPoller {
    /// Spawns the timer. The first query goes out one `period` after start.
    pub fn start(
        scan_id: ScanId,
        generation: u64,
        period: Duration,
        source: Arc<dyn AnalysisService>,
        updates: mpsc::UnboundedSender<PollEnvelope>,
    ) -> Self {
        let active = Arc::new(AtomicBool::new(true));
        let counters = Arc::new(Counters::default());
        let task = tokio::spawn(run_poll_loop(
            scan_id,
            generation,
            period,
            source,
            updates,
            Arc::clone(&active),
            Arc::clone(&counters),
        ));
        info!(
            %scan_id,
            generation,
            period_ms = period.as_millis() as u64,
            "analysis poller started"
        );
        Self {
            scan_id,
            generation,
            active,
            counters,
            task: Some(task),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// False once stopped or once a terminal status was delivered.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> PollerStats {
        PollerStats {
            ticks: self.counters.ticks.load(Ordering::SeqCst),
            queries: self.counters.queries.load(Ordering::SeqCst),
            skipped: self.counters.skipped.load(Ordering::SeqCst),
            transient_errors: self.counters.transient_errors.load(Ordering::SeqCst),
        }
    }

    /// Cancels the timer and marks anything in flight as stale. Returns
    /// `true` only for the call that actually stopped it.
    pub fn stop(&mut self) -> bool {
        let Some(task) = self.task.take() else {
            return false;
        };
        self.active.store(false, Ordering::SeqCst);
        task.abort();
        info!(scan_id = %self.scan_id, generation = self.generation, "analysis poller stopped");
        true
    }
}

impl Drop for AnalysisPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_poll_loop(
    scan_id: ScanId,
    generation: u64,
    period: Duration,
    source: Arc<dyn AnalysisService>,
    updates: mpsc::UnboundedSender<PollEnvelope>,
    active: Arc<AtomicBool>,
    counters: Arc<Counters>,
) {
    let (result_tx, mut result_rx) = mpsc::channel(1);
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                counters.ticks.fetch_add(1, Ordering::SeqCst);
                if in_flight {
                    counters.skipped.fetch_add(1, Ordering::SeqCst);
                    debug!(%scan_id, generation, "previous status query unresolved; tick skipped");
                    continue;
                }
                in_flight = true;
                counters.queries.fetch_add(1, Ordering::SeqCst);
                let source = Arc::clone(&source);
                let result_tx = result_tx.clone();
                tokio::spawn(async move {
                    let result = source.get_analysis(scan_id).await;
                    let _ = result_tx.send(result).await;
                });
            }
            Some(result) = result_rx.recv() => {
                in_flight = false;
                if !active.load(Ordering::SeqCst) {
                    debug!(%scan_id, generation, "discarding status response after stop");
                    break;
                }
                let response = match result {
                    Ok(response) => response,
                    Err(err) => {
                        counters.transient_errors.fetch_add(1, Ordering::SeqCst);
                        warn!(%scan_id, generation, "analysis status query failed: {err:#}");
                        continue;
                    }
                };
                let terminal = response.status.is_terminal();
                let update = if terminal {
                    PollUpdate::Terminal(response)
                } else {
                    PollUpdate::Progress(response)
                };
                if updates.send(PollEnvelope { generation, update }).is_err() {
                    debug!(%scan_id, generation, "poll consumer gone");
                    break;
                }
                if terminal {
                    active.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/poller_tests.rs"]
mod tests;

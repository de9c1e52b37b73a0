use std::net::IpAddr;
use std::sync::Arc;

use metrics::counter;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::application::repos::{RepoError, VisitTotals, VisitorsRepo};
use crate::cache::{CachedListings, EntityType};
use crate::domain::entities::VisitRecord;
use crate::domain::visitors::{VisitDecision, classify};

const SOURCE: &str = "application::visitors";
const METRIC_RECORDED: &str = "folio_visitor_recorded_total";
const METRIC_SKIPPED: &str = "folio_visitor_skipped_total";
const METRIC_FAILED: &str = "folio_visitor_failed_total";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    Recorded(VisitRecord),
    Bypassed,
    Untrackable,
    Disabled,
    /// Storage rejected the write; the request carries on regardless.
    Failed,
}

/// Counts visits per client address, best effort.
#[derive(Clone)]
pub struct VisitorTracker {
    repo: Arc<dyn VisitorsRepo>,
    bypass: Option<IpAddr>,
    enabled: bool,
}

impl VisitorTracker {
    pub fn new(repo: Arc<dyn VisitorsRepo>, bypass: Option<IpAddr>) -> Self {
        Self {
            repo,
            bypass,
            enabled: true,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub async fn track(&self, forwarded_for: Option<&str>, peer: Option<IpAddr>) -> TrackOutcome {
        if !self.enabled {
            return TrackOutcome::Disabled;
        }

        let ip = match classify(forwarded_for, peer, self.bypass) {
            VisitDecision::Track(ip) => ip,
            VisitDecision::Bypassed => {
                counter!(METRIC_SKIPPED, "reason" => "bypass").increment(1);
                return TrackOutcome::Bypassed;
            }
            VisitDecision::Untrackable => {
                counter!(METRIC_SKIPPED, "reason" => "untrackable").increment(1);
                debug!(
                    target_module = SOURCE,
                    forwarded_for = ?forwarded_for,
                    "Request origin could not be determined; visit not tracked"
                );
                return TrackOutcome::Untrackable;
            }
        };

        let today = OffsetDateTime::now_utc().date();
        match self.repo.record_visit(ip, today).await {
            Ok(record) => {
                counter!(METRIC_RECORDED).increment(1);
                TrackOutcome::Recorded(record)
            }
            Err(err) => {
                counter!(METRIC_FAILED).increment(1);
                warn!(
                    target_module = SOURCE,
                    ip = %ip,
                    error = %err,
                    "Failed to record visit"
                );
                TrackOutcome::Failed
            }
        }
    }
}

/// Aggregate visitor counts, served through the listing cache.
#[derive(Clone)]
pub struct VisitorSummaryService {
    repo: Arc<dyn VisitorsRepo>,
    listings: CachedListings,
}

impl VisitorSummaryService {
    pub fn new(repo: Arc<dyn VisitorsRepo>, listings: CachedListings) -> Self {
        Self { repo, listings }
    }

    pub async fn summary(&self) -> Result<VisitTotals, RepoError> {
        let repo = self.repo.clone();
        self.listings
            .get_or_load(EntityType::VisitRecord, || async move {
                repo.visit_totals().await
            })
            .await
    }
}

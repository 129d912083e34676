use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gateway::{QualificationRequest, QualificationVerdict};

/// Monotonic tag attached to every dispatched qualification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

/// Qualification state surfaced to the session view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum QualificationStatus {
    AwaitingInputs,
    Calculating { request_id: RequestId },
    Ready,
    Unavailable { reason: String },
}

/// A request the caller must dispatch and later hand back to [`QualificationTracker::resolve`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingQualification {
    pub request_id: RequestId,
    pub request: QualificationRequest,
    /// When the caller sent the request; unset until [`QualificationTracker::mark_dispatched`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedVerdict {
    pub request_id: RequestId,
    pub request: QualificationRequest,
    pub verdict: QualificationVerdict,
    /// Set when a newer calculation failed and this result no longer reflects the inputs.
    pub stale: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    Discarded,
}

/// Tracks the latest qualification request for one session.
///
/// Identical inputs never dispatch twice while in flight or once resolved,
/// and only the response for the most recently issued request is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualificationTracker {
    last_issued: u64,
    pending: Option<PendingQualification>,
    latest: Option<CachedVerdict>,
    status: QualificationStatus,
}

impl QualificationTracker {
    pub fn new() -> Self {
        Self {
            last_issued: 0,
            pending: None,
            latest: None,
            status: QualificationStatus::AwaitingInputs,
        }
    }

    pub fn status(&self) -> &QualificationStatus {
        &self.status
    }

    pub fn pending(&self) -> Option<&PendingQualification> {
        self.pending.as_ref()
    }

    pub fn latest(&self) -> Option<&CachedVerdict> {
        self.latest.as_ref()
    }

    /// Records the current inputs; returns a request to dispatch when one is needed.
    pub fn observe(
        &mut self,
        request: Option<QualificationRequest>,
    ) -> Option<PendingQualification> {
        let Some(request) = request else {
            self.pending = None;
            self.status = QualificationStatus::AwaitingInputs;
            return None;
        };

        if self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.request == request)
        {
            return None;
        }

        if let Some(latest) = &self.latest {
            if latest.request == request && !latest.stale {
                self.pending = None;
                self.status = QualificationStatus::Ready;
                return None;
            }
        }

        self.last_issued += 1;
        let pending = PendingQualification {
            request_id: RequestId(self.last_issued),
            request,
            dispatched_at: None,
        };
        self.status = QualificationStatus::Calculating {
            request_id: pending.request_id,
        };
        self.pending = Some(pending.clone());
        Some(pending)
    }

    /// Applies a response if it belongs to the request still awaited; anything else is stale.
    pub fn resolve(
        &mut self,
        request_id: RequestId,
        outcome: Result<QualificationVerdict, String>,
    ) -> Resolution {
        let awaited = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.request_id == request_id);
        if !awaited {
            return Resolution::Discarded;
        }
        let Some(pending) = self.pending.take() else {
            return Resolution::Discarded;
        };

        match outcome {
            Ok(verdict) => {
                self.latest = Some(CachedVerdict {
                    request_id,
                    request: pending.request,
                    verdict,
                    stale: false,
                });
                self.status = QualificationStatus::Ready;
            }
            Err(reason) => {
                if let Some(latest) = self.latest.as_mut() {
                    latest.stale = true;
                }
                self.status = QualificationStatus::Unavailable { reason };
            }
        }
        Resolution::Applied
    }

    /// Stamps the pending request with its dispatch time; an existing stamp is kept.
    pub fn mark_dispatched(&mut self, at: DateTime<Utc>) {
        if let Some(pending) = self.pending.as_mut() {
            pending.dispatched_at.get_or_insert(at);
        }
    }

    /// Gives up on a request dispatched more than `budget` before `now` whose
    /// response never arrived. The same inputs are dispatched again on the next observe.
    pub fn expire(&mut self, now: DateTime<Utc>, budget: Duration) -> bool {
        let overdue = self
            .pending
            .as_ref()
            .and_then(|pending| pending.dispatched_at)
            .and_then(|at| (now - at).to_std().ok())
            .is_some_and(|age| age > budget);
        if !overdue {
            return false;
        }

        self.pending = None;
        if let Some(latest) = self.latest.as_mut() {
            latest.stale = true;
        }
        self.status = QualificationStatus::Unavailable {
            reason: "qualification request did not complete".to_string(),
        };
        true
    }

    /// Drops any in-flight request so late responses are discarded.
    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            self.status = match &self.latest {
                Some(latest) if !latest.stale => QualificationStatus::Ready,
                _ => QualificationStatus::AwaitingInputs,
            };
        }
    }
}

impl Default for QualificationTracker {
    fn default() -> Self {
        Self::new()
    }
}

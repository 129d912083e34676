use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::document::{CertificateDocument, CertificateRenderer, RenderedCertificate};
use super::domain::{Classification, WizardStep};
use super::repository::{ArchiveError, RepositoryError, SessionArchive, SessionRepository};
use super::session::{
    apply, Notice, NoticeKind, SessionError, SessionId, WorkflowAction, WorkflowSession,
};
use super::validation::StepValidation;
use super::wizard::{WizardError, WizardStatus};
use crate::gateway::{
    CertificateGateway, GatewayError, QualificationService, QualificationVerdict, RetryPolicy,
    CERTIFICATE_ENDPOINT, HS_VERIFICATION_ENDPOINT, QUALIFICATION_ENDPOINT,
};
use crate::workflows::certificate::domain::CertificateDraft;
use crate::workflows::origin::{
    HsCode, HsCodeError, RegionalContentCalculator, RegionalContentResult, TradeBloc,
    DEFAULT_THRESHOLD,
};
use crate::workflows::qualification::{
    PendingQualification, QualificationStatus, RequestId, Resolution,
};

const QUALIFICATION_UNAVAILABLE: &str =
    "Qualification service unavailable; showing the last known result.";
const GENERATION_INTERRUPTED: &str =
    "Certificate generation did not complete; the draft can be edited and generated again.";
const MAX_STORE_ATTEMPTS: usize = 3;

/// Tunables for the workflow service.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub bloc: TradeBloc,
    pub default_threshold: f64,
    /// Qualification, HS verification and other idempotent reads.
    pub read_policy: RetryPolicy,
    /// Certificate generation; never retried.
    pub generate_policy: RetryPolicy,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        let timeout = Duration::from_millis(8_000);
        Self {
            bloc: TradeBloc::usmca(),
            default_threshold: DEFAULT_THRESHOLD,
            read_policy: RetryPolicy::idempotent(timeout, Duration::from_millis(250)),
            generate_policy: RetryPolicy::single_attempt(timeout),
        }
    }
}

/// Outbound collaborators the service delegates to.
#[derive(Clone)]
pub struct WorkflowCollaborators {
    pub qualification: Arc<dyn QualificationService>,
    pub certificates: Arc<dyn CertificateGateway>,
    pub renderer: Arc<dyn CertificateRenderer>,
    pub archive: Arc<dyn SessionArchive>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualificationView {
    pub status: QualificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<QualificationVerdict>,
    pub stale: bool,
}

/// Session state as returned to API callers, with derived values filled in.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub revision: u64,
    pub status: WizardStatus,
    pub current_step: WizardStep,
    pub step_label: &'static str,
    pub step_validation: StepValidation,
    pub can_generate: bool,
    pub certificate_data: CertificateDraft,
    pub regional_content: RegionalContentResult,
    pub qualification: QualificationView,
    pub notices: Vec<Notice>,
    pub save_consent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<CertificateDocument>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedCertificate {
    pub session: SessionView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered: Option<RenderedCertificate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedSession {
    pub session_id: SessionId,
    pub path: PathBuf,
}

/// Drives certificate workflow sessions through the reducer and collaborators.
pub struct OriginWorkflowService<R> {
    repository: Arc<R>,
    collaborators: WorkflowCollaborators,
    calculator: RegionalContentCalculator,
    settings: WorkflowSettings,
}

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static PROCESS_STAMP: OnceLock<String> = OnceLock::new();

/// `wf-<process start in hex millis>-<sequence>`, so ids stay unique across restarts.
fn next_session_id() -> SessionId {
    let stamp = PROCESS_STAMP.get_or_init(|| format!("{:x}", Utc::now().timestamp_millis()));
    let id = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SessionId(format!("wf-{stamp}-{id:06}"))
}

impl<R> OriginWorkflowService<R>
where
    R: SessionRepository + 'static,
{
    pub fn new(
        repository: Arc<R>,
        collaborators: WorkflowCollaborators,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            repository,
            collaborators,
            calculator: RegionalContentCalculator::new(settings.bloc.clone()),
            settings,
        }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    pub fn view(&self, session: &WorkflowSession) -> SessionView {
        let wizard = &session.wizard;
        let latest = session.qualification.latest();
        SessionView {
            session_id: session.session_id.clone(),
            revision: session.revision,
            status: wizard.status().clone(),
            current_step: wizard.current_step(),
            step_label: wizard.current_step().label(),
            step_validation: wizard.step_validation(),
            can_generate: wizard.can_generate(),
            certificate_data: wizard.draft().clone(),
            regional_content: session
                .regional_content(&self.calculator, self.settings.default_threshold),
            qualification: QualificationView {
                status: session.qualification.status().clone(),
                verdict: latest.map(|cached| cached.verdict.clone()),
                stale: latest.is_some_and(|cached| cached.stale),
            },
            notices: session.notices.clone(),
            save_consent: session.save_consent,
            certificate: session.certificate.clone(),
        }
    }

    /// Opens a session once a classification (HS code + description) is known.
    pub fn start(&self, classification: Classification) -> Result<SessionView, WorkflowServiceError> {
        let session = WorkflowSession::new(next_session_id(), &classification);
        let stored = self.repository.insert(session)?;
        info!(
            session_id = %stored.session_id,
            hs_code = %classification.hs_code,
            "certificate workflow started"
        );
        Ok(self.view(&stored))
    }

    pub fn get(&self, id: &SessionId) -> Result<SessionView, WorkflowServiceError> {
        let mut session = self.load(id)?;
        let expected = session.revision;
        if !self.expire_abandoned_calls(&mut session, Utc::now()) {
            return Ok(self.view(&session));
        }

        session.revision += 1;
        match self.repository.update(session.clone(), expected) {
            Ok(()) => Ok(self.view(&session)),
            Err(RepositoryError::Conflict) => Ok(self.view(&self.load(id)?)),
            Err(err) => Err(err.into()),
        }
    }

    /// Applies an action, then awaits any qualification refresh it triggered.
    ///
    /// The action is re-applied to a fresh copy when another writer stored the
    /// session between this call's read and write.
    pub async fn apply(
        &self,
        id: &SessionId,
        action: WorkflowAction,
    ) -> Result<SessionView, WorkflowServiceError> {
        let mut attempt = 0;
        let (next, dispatch) = loop {
            attempt += 1;
            let mut current = self.load(id)?;
            let expected = current.revision;
            self.expire_abandoned_calls(&mut current, Utc::now());
            let in_flight = current.qualification.pending().map(|pending| pending.request_id);

            let mut next = apply(current, action.clone())?;
            if matches!(next.wizard.status(), WizardStatus::Abandoned) {
                self.repository.remove(id)?;
                info!(session_id = %id, "certificate workflow abandoned");
                return Ok(self.view(&next));
            }

            let dispatch = next
                .qualification
                .pending()
                .filter(|pending| Some(pending.request_id) != in_flight)
                .cloned();
            next.qualification.mark_dispatched(Utc::now());

            match self.repository.update(next.clone(), expected) {
                Ok(()) => break (next, dispatch),
                Err(RepositoryError::Conflict) if attempt < MAX_STORE_ATTEMPTS => {
                    debug!(session_id = %id, attempt, "session changed concurrently; reapplying action");
                }
                Err(err) => return Err(err.into()),
            }
        };

        match dispatch {
            Some(pending) => self.run_qualification(id, pending).await,
            None => Ok(self.view(&next)),
        }
    }

    async fn run_qualification(
        &self,
        id: &SessionId,
        pending: PendingQualification,
    ) -> Result<SessionView, WorkflowServiceError> {
        let service = self.collaborators.qualification.as_ref();
        let request = &pending.request;
        debug!(
            session_id = %id,
            request_id = pending.request_id.0,
            hs_code = %request.hs_code,
            "dispatching qualification"
        );

        let outcome = self
            .settings
            .read_policy
            .run(QUALIFICATION_ENDPOINT, || service.calculate(request))
            .await
            .map_err(|err| {
                warn!(session_id = %id, error = %err, "qualification service unavailable");
                err.to_string()
            });

        self.resolve_qualification(id, pending.request_id, outcome)
    }

    fn resolve_qualification(
        &self,
        id: &SessionId,
        request_id: RequestId,
        outcome: Result<QualificationVerdict, String>,
    ) -> Result<SessionView, WorkflowServiceError> {
        for _ in 0..MAX_STORE_ATTEMPTS {
            let Some(mut session) = self.repository.fetch(id)? else {
                debug!(session_id = %id, request_id = request_id.0, "session closed before qualification returned");
                return Err(RepositoryError::NotFound.into());
            };
            let expected = session.revision;

            if session.qualification.resolve(request_id, outcome.clone()) == Resolution::Discarded {
                warn!(session_id = %id, request_id = request_id.0, "discarding stale qualification response");
                return Ok(self.view(&session));
            }

            match session.qualification.status() {
                QualificationStatus::Unavailable { .. } => {
                    session.push_notice(Notice::service_unavailable(QUALIFICATION_UNAVAILABLE));
                }
                _ => session.clear_notices(NoticeKind::ServiceUnavailable),
            }
            session.revision += 1;

            match self.repository.update(session.clone(), expected) {
                Ok(()) => return Ok(self.view(&session)),
                Err(RepositoryError::Conflict) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(RepositoryError::Conflict.into())
    }

    /// Checks the draft's HS code with the verification collaborator and records the result.
    pub async fn verify_hs_code(&self, id: &SessionId) -> Result<SessionView, WorkflowServiceError> {
        let session = self.load(id)?;
        let hs_code = HsCode::parse(&session.wizard.draft().product_details.hs_code)?;
        let gateway = self.collaborators.certificates.as_ref();

        let verification = self
            .settings
            .read_policy
            .run(HS_VERIFICATION_ENDPOINT, || gateway.verify_hs_code(&hs_code))
            .await?;
        info!(
            session_id = %id,
            hs_code = %hs_code,
            verified = verification.verified,
            "hs code verification recorded"
        );

        self.store_with_retry(id, |session| {
            session.wizard.edit(|draft| {
                if draft.product_details.parsed_hs_code().as_ref() == Some(&hs_code) {
                    draft.product_details.hs_verification = Some(verification.clone());
                }
            })?;
            Ok(())
        })
    }

    /// Archives the session; requires the user's prior consent.
    pub async fn save(&self, id: &SessionId) -> Result<SavedSession, WorkflowServiceError> {
        let session = self.load(id)?;
        if !session.save_consent {
            return Err(WorkflowServiceError::ConsentRequired);
        }
        let path = self.collaborators.archive.archive(&session).await?;
        info!(session_id = %id, path = %path.display(), "workflow data saved");
        Ok(SavedSession {
            session_id: session.session_id,
            path,
        })
    }

    /// Issues the certificate once every stage validates. Generation is attempted once;
    /// a rendering failure afterwards keeps the certificate and records a notice.
    ///
    /// The draft is frozen before the collaborator is called, so concurrent
    /// generations and edits are refused until this one finishes or fails.
    pub async fn generate(&self, id: &SessionId) -> Result<GeneratedCertificate, WorkflowServiceError> {
        let started_at = Utc::now();
        let reserved = self.store_with_retry(id, |session| {
            self.expire_abandoned_calls(session, started_at);
            session.wizard.begin_generation(started_at)?;
            Ok(())
        })?;

        let draft = reserved.certificate_data;
        let gateway = self.collaborators.certificates.as_ref();
        let record = match self
            .settings
            .generate_policy
            .run(CERTIFICATE_ENDPOINT, || gateway.generate_certificate(&draft))
            .await
        {
            Ok(record) => record,
            Err(err) => {
                warn!(session_id = %id, error = %err, "certificate generation failed");
                if let Err(release) = self.store_with_retry(id, |session| {
                    if session.wizard.generation_started_at() == Some(started_at) {
                        session.wizard.release_generation();
                    }
                    Ok(())
                }) {
                    warn!(session_id = %id, error = %release, "could not release the generation hold");
                }
                return Err(err.into());
            }
        };

        let document = CertificateDocument::assemble(&record, &draft);
        let placeholders = document.placeholder_fields();
        if !placeholders.is_empty() {
            debug!(session_id = %id, fields = ?placeholders, "certificate has placeholder fields");
        }

        let rendered = match self.collaborators.renderer.render(&document) {
            Ok(rendered) => Some(rendered),
            Err(err) => {
                warn!(session_id = %id, error = %err, "certificate generated but rendering failed");
                None
            }
        };
        let certificate_number = document.certificate_number.clone();

        let view = self.store_with_retry(id, |session| {
            if session.wizard.generation_started_at() != Some(started_at) {
                warn!(session_id = %id, certificate_number = %certificate_number, "generation hold was taken over before the certificate was recorded");
                return Err(WizardError::Closed(session.wizard.status().label()).into());
            }
            session
                .wizard
                .mark_generated(certificate_number.clone())?;
            session.qualification.cancel();
            session.certificate = Some(document.clone());
            if rendered.is_none() {
                session.push_notice(Notice::partial_failure(format!(
                    "Certificate {certificate_number} was generated but could not be rendered."
                )));
            }
            Ok(())
        })?;

        info!(session_id = %id, certificate_number = %certificate_number, "certificate generated");
        Ok(GeneratedCertificate {
            session: view,
            rendered,
        })
    }

    /// Drops the session; responses still in flight will find nothing to update.
    pub fn abandon(&self, id: &SessionId) -> Result<(), WorkflowServiceError> {
        self.repository
            .remove(id)?
            .ok_or(RepositoryError::NotFound)?;
        info!(session_id = %id, "certificate workflow abandoned");
        Ok(())
    }

    /// Releases holds left by callers that went away mid-call: a qualification
    /// request or certificate generation older than its retry budget.
    fn expire_abandoned_calls(&self, session: &mut WorkflowSession, now: DateTime<Utc>) -> bool {
        let mut expired = false;
        if session
            .qualification
            .expire(now, self.settings.read_policy.budget())
        {
            warn!(session_id = %session.session_id, "qualification request never completed; it will be dispatched again");
            session.push_notice(Notice::service_unavailable(QUALIFICATION_UNAVAILABLE));
            expired = true;
        }

        let generation_overdue = session
            .wizard
            .generation_started_at()
            .and_then(|started_at| (now - started_at).to_std().ok())
            .is_some_and(|age| age > self.settings.generate_policy.budget());
        if generation_overdue {
            warn!(session_id = %session.session_id, "certificate generation never completed; releasing the draft");
            session.wizard.release_generation();
            session.push_notice(Notice::partial_failure(GENERATION_INTERRUPTED));
            expired = true;
        }
        expired
    }

    fn load(&self, id: &SessionId) -> Result<WorkflowSession, WorkflowServiceError> {
        let session = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(session)
    }

    /// Re-reads and re-applies `mutate` when another writer got there first.
    fn store_with_retry<F>(&self, id: &SessionId, mut mutate: F) -> Result<SessionView, WorkflowServiceError>
    where
        F: FnMut(&mut WorkflowSession) -> Result<(), SessionError>,
    {
        for _ in 0..MAX_STORE_ATTEMPTS {
            let mut session = self.load(id)?;
            let expected = session.revision;
            mutate(&mut session)?;
            session.revision += 1;
            match self.repository.update(session.clone(), expected) {
                Ok(()) => return Ok(self.view(&session)),
                Err(RepositoryError::Conflict) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(RepositoryError::Conflict.into())
    }
}

/// Error raised by the workflow service.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowServiceError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    InvalidHsCode(#[from] HsCodeError),
    #[error("saving workflow data requires the user's consent")]
    ConsentRequired,
}

impl From<WizardError> for WorkflowServiceError {
    fn from(err: WizardError) -> Self {
        Self::Session(SessionError::Wizard(err))
    }
}

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;
use tokio::sync::Notify;

use crate::gateway::{
    CertificateGateway, CertificateRecord, GatewayError, HsVerification, QualificationRequest,
    QualificationService, QualificationVerdict, RetryPolicy, CERTIFICATE_ENDPOINT,
    QUALIFICATION_ENDPOINT,
};
use crate::workflows::certificate::{
    ArchiveError, Authorization, CertificateDocument, CertificateRenderer, Classification,
    CompanyInfo, OriginWorkflowService, PartyInfo, RenderError, RenderedCertificate,
    RepositoryError, SessionArchive, SessionId, SessionRepository, TextCertificateRenderer,
    WorkflowAction, WorkflowCollaborators, WorkflowSession, WorkflowSettings,
};
use crate::workflows::origin::{ComponentOrigin, HsCode, TradeBloc, DEFAULT_THRESHOLD};

pub(super) fn classification() -> Classification {
    Classification {
        hs_code: HsCode::parse("8504.40").expect("valid code"),
        product_description: "Industrial power supply".to_string(),
    }
}

pub(super) fn settings() -> WorkflowSettings {
    let timeout = Duration::from_millis(500);
    WorkflowSettings {
        bloc: TradeBloc::usmca(),
        default_threshold: DEFAULT_THRESHOLD,
        read_policy: RetryPolicy::idempotent(timeout, Duration::from_millis(1)),
        generate_policy: RetryPolicy::single_attempt(timeout),
    }
}

pub(super) fn company_info() -> CompanyInfo {
    CompanyInfo {
        exporter: PartyInfo {
            name: "Norte Power S.A. de C.V.".to_string(),
            address: "Blvd. Industrial 1200, Apodaca, NL".to_string(),
            country: "MX".to_string(),
            tax_id: "NPO120304AB9".to_string(),
        },
        contact_name: "Lucia Vega".to_string(),
        contact_email: "lucia.vega@nortepower.mx".to_string(),
        importer: None,
    }
}

pub(super) fn components() -> Vec<ComponentOrigin> {
    vec![
        ComponentOrigin::new("MX", 55.0, "Transformer core"),
        ComponentOrigin::new("US", 20.0, "Steel housing"),
        ComponentOrigin::new("CN", 25.0, "Capacitors"),
    ]
}

pub(super) fn authorization() -> Authorization {
    Authorization {
        signatory_name: "Lucia Vega".to_string(),
        signatory_title: "Trade Compliance Manager".to_string(),
        signature_date: NaiveDate::from_ymd_opt(2026, 4, 15),
        signature_token: "sig-7f3a".to_string(),
    }
}

/// Actions that fill every stage and walk the wizard to review.
pub(super) fn completing_actions() -> Vec<WorkflowAction> {
    vec![
        WorkflowAction::SetCompanyInfo {
            company_info: company_info(),
        },
        WorkflowAction::Next,
        WorkflowAction::SetProductDetails {
            description: "Industrial power supply, 480V".to_string(),
            hs_code: "8504.40".to_string(),
            blanket_period: None,
        },
        WorkflowAction::Next,
        WorkflowAction::ReplaceComponents {
            components: components(),
        },
        WorkflowAction::SetManufacturingLocation {
            location: "MX".to_string(),
        },
        WorkflowAction::Next,
        WorkflowAction::SetAuthorization {
            authorization: authorization(),
        },
        WorkflowAction::Next,
        WorkflowAction::AcceptDeclaration { accepted: true },
    ]
}

pub(super) fn verdict(threshold: f64, regional: f64) -> QualificationVerdict {
    QualificationVerdict {
        qualified: regional >= threshold,
        threshold_required: Some(threshold),
        regional_content: Some(regional),
        rule_description: Some("Machinery requires 60% regional value content.".to_string()),
        documentation: Vec::new(),
    }
}

type ConcurrentWrite = Box<dyn FnOnce(&mut WorkflowSession) + Send>;

#[derive(Default)]
pub(super) struct MemoryRepository {
    pub(super) sessions: Mutex<HashMap<SessionId, WorkflowSession>>,
    concurrent_write: Mutex<Option<ConcurrentWrite>>,
}

impl MemoryRepository {
    /// Lands `write` as another writer's update just before the next `update` call.
    pub(super) fn write_before_next_update(
        &self,
        write: impl FnOnce(&mut WorkflowSession) + Send + 'static,
    ) {
        *self
            .concurrent_write
            .lock()
            .expect("repository mutex poisoned") = Some(Box::new(write));
    }

    pub(super) fn stored(&self, id: &SessionId) -> Option<WorkflowSession> {
        self.sessions
            .lock()
            .expect("repository mutex poisoned")
            .get(id)
            .cloned()
    }
}

impl SessionRepository for MemoryRepository {
    fn insert(&self, session: WorkflowSession) -> Result<WorkflowSession, RepositoryError> {
        let mut guard = self.sessions.lock().expect("repository mutex poisoned");
        if guard.contains_key(&session.session_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(session.session_id.clone(), session.clone());
        Ok(session)
    }

    fn update(
        &self,
        session: WorkflowSession,
        expected_revision: u64,
    ) -> Result<(), RepositoryError> {
        let concurrent = self
            .concurrent_write
            .lock()
            .expect("repository mutex poisoned")
            .take();
        let mut guard = self.sessions.lock().expect("repository mutex poisoned");
        if let Some(write) = concurrent {
            if let Some(stored) = guard.get_mut(&session.session_id) {
                write(stored);
                stored.revision += 1;
            }
        }
        let current = guard
            .get(&session.session_id)
            .ok_or(RepositoryError::NotFound)?;
        if current.revision != expected_revision {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(session.session_id.clone(), session);
        Ok(())
    }

    fn fetch(&self, id: &SessionId) -> Result<Option<WorkflowSession>, RepositoryError> {
        Ok(self.stored(id))
    }

    fn remove(&self, id: &SessionId) -> Result<Option<WorkflowSession>, RepositoryError> {
        let mut guard = self.sessions.lock().expect("repository mutex poisoned");
        Ok(guard.remove(id))
    }
}

pub(super) struct UnavailableRepository;

impl SessionRepository for UnavailableRepository {
    fn insert(&self, _session: WorkflowSession) -> Result<WorkflowSession, RepositoryError> {
        Err(RepositoryError::Unavailable("session store offline".to_string()))
    }

    fn update(
        &self,
        _session: WorkflowSession,
        _expected_revision: u64,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("session store offline".to_string()))
    }

    fn fetch(&self, _id: &SessionId) -> Result<Option<WorkflowSession>, RepositoryError> {
        Err(RepositoryError::Unavailable("session store offline".to_string()))
    }

    fn remove(&self, _id: &SessionId) -> Result<Option<WorkflowSession>, RepositoryError> {
        Err(RepositoryError::Unavailable("session store offline".to_string()))
    }
}

/// Answers with a verdict, or 503 when `verdict` is `None`.
#[derive(Default)]
pub(super) struct StubQualification {
    pub(super) verdict: Mutex<Option<QualificationVerdict>>,
    pub(super) calls: AtomicUsize,
}

impl StubQualification {
    pub(super) fn answering(verdict: QualificationVerdict) -> Self {
        Self {
            verdict: Mutex::new(Some(verdict)),
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn failing() -> Self {
        Self::default()
    }

    pub(super) fn set_verdict(&self, verdict: Option<QualificationVerdict>) {
        *self.verdict.lock().expect("stub mutex poisoned") = verdict;
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QualificationService for StubQualification {
    async fn calculate(
        &self,
        _request: &QualificationRequest,
    ) -> Result<QualificationVerdict, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdict
            .lock()
            .expect("stub mutex poisoned")
            .clone()
            .ok_or(GatewayError::Status {
                endpoint: QUALIFICATION_ENDPOINT,
                status: 503,
            })
    }
}

/// Holds the first call until a second call arrives, so the first response lands late.
#[derive(Default)]
pub(super) struct GatedQualification {
    gate: Notify,
    calls: AtomicUsize,
}

#[async_trait]
impl QualificationService for GatedQualification {
    async fn calculate(
        &self,
        request: &QualificationRequest,
    ) -> Result<QualificationVerdict, GatewayError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            self.gate.notified().await;
        } else {
            self.gate.notify_one();
        }
        let threshold = if request.manufacturing_location == "US" {
            60.0
        } else {
            75.0
        };
        Ok(verdict(threshold, 75.0))
    }
}

/// Never answers the first call; later calls answer with `verdict`.
pub(super) struct StallingQualification {
    verdict: QualificationVerdict,
    calls: AtomicUsize,
}

impl StallingQualification {
    pub(super) fn answering(verdict: QualificationVerdict) -> Self {
        Self {
            verdict,
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QualificationService for StallingQualification {
    async fn calculate(
        &self,
        _request: &QualificationRequest,
    ) -> Result<QualificationVerdict, GatewayError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            std::future::pending::<()>().await;
        }
        Ok(self.verdict.clone())
    }
}

#[derive(Default)]
pub(super) struct StubCertificates {
    pub(super) fail: bool,
    pub(super) delay: Duration,
    pub(super) generate_calls: AtomicUsize,
}

impl StubCertificates {
    pub(super) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(super) fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub(super) fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CertificateGateway for StubCertificates {
    async fn generate_certificate(
        &self,
        _draft: &crate::workflows::certificate::CertificateDraft,
    ) -> Result<CertificateRecord, GatewayError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(GatewayError::Status {
                endpoint: CERTIFICATE_ENDPOINT,
                status: 503,
            });
        }
        Ok(CertificateRecord {
            certificate_number: Some("USMCA-2026-000321".to_string()),
            ..CertificateRecord::default()
        })
    }

    async fn verify_hs_code(&self, hs_code: &HsCode) -> Result<HsVerification, GatewayError> {
        Ok(HsVerification {
            verified: hs_code.chapter() == "85",
            source: Some("stub".to_string()),
            tariff_info: None,
            alternatives: Vec::new(),
        })
    }
}

pub(super) struct FailingRenderer;

impl CertificateRenderer for FailingRenderer {
    fn render(&self, _document: &CertificateDocument) -> Result<RenderedCertificate, RenderError> {
        Err(RenderError::Unavailable("template store offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryArchive {
    pub(super) saved: Mutex<Vec<SessionId>>,
}

#[async_trait]
impl SessionArchive for MemoryArchive {
    async fn archive(&self, session: &WorkflowSession) -> Result<PathBuf, ArchiveError> {
        self.saved
            .lock()
            .expect("archive mutex poisoned")
            .push(session.session_id.clone());
        Ok(PathBuf::from(format!(
            "memory/{}/usmca_workflow_data.json",
            session.session_id
        )))
    }
}

pub(super) struct Harness {
    pub(super) service: OriginWorkflowService<MemoryRepository>,
    pub(super) repository: Arc<MemoryRepository>,
    pub(super) qualification: Arc<StubQualification>,
    pub(super) certificates: Arc<StubCertificates>,
    pub(super) archive: Arc<MemoryArchive>,
}

pub(super) fn harness_with(
    qualification: StubQualification,
    certificates: StubCertificates,
    renderer: Arc<dyn CertificateRenderer>,
) -> Harness {
    let repository = Arc::new(MemoryRepository::default());
    let qualification = Arc::new(qualification);
    let certificates = Arc::new(certificates);
    let archive = Arc::new(MemoryArchive::default());
    let service = OriginWorkflowService::new(
        repository.clone(),
        WorkflowCollaborators {
            qualification: qualification.clone(),
            certificates: certificates.clone(),
            renderer,
            archive: archive.clone(),
        },
        settings(),
    );
    Harness {
        service,
        repository,
        qualification,
        certificates,
        archive,
    }
}

pub(super) fn harness() -> Harness {
    harness_with(
        StubQualification::answering(verdict(60.0, 75.0)),
        StubCertificates::default(),
        Arc::new(TextCertificateRenderer),
    )
}

pub(super) async fn completed_session(harness: &Harness) -> SessionId {
    let view = harness.service.start(classification()).expect("session starts");
    let id = view.session_id;
    for action in completing_actions() {
        harness
            .service
            .apply(&id, action)
            .await
            .expect("action applies");
    }
    id
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

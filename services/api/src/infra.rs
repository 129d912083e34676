use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;
use usmca_origin::config::AppConfig;
use usmca_origin::error::AppError;
use usmca_origin::gateway::{
    LocalCertificateGateway, ReferenceCatalog, RetryPolicy, TrustApiClient,
};
use usmca_origin::workflows::certificate::{
    JsonFileArchive, RepositoryError, SessionId, SessionRepository, TextCertificateRenderer,
    WorkflowCollaborators, WorkflowSession,
};
use usmca_origin::workflows::origin::{RegionalContentCalculator, TradeBloc};
use usmca_origin::workflows::qualification::{Rulebook, RulebookQualification};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) reference: Arc<dyn ReferenceCatalog>,
    pub(crate) calculator: RegionalContentCalculator,
    pub(crate) rulebook: Arc<Rulebook>,
    pub(crate) default_threshold: f64,
    pub(crate) read_policy: RetryPolicy,
}

#[derive(Default, Clone)]
pub(crate) struct InMemorySessionRepository {
    sessions: Arc<Mutex<HashMap<SessionId, WorkflowSession>>>,
}

impl SessionRepository for InMemorySessionRepository {
    fn insert(&self, session: WorkflowSession) -> Result<WorkflowSession, RepositoryError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|_| RepositoryError::Unavailable("session store poisoned".to_string()))?;
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
        let mut guard = self
            .sessions
            .lock()
            .map_err(|_| RepositoryError::Unavailable("session store poisoned".to_string()))?;
        match guard.get(&session.session_id) {
            None => Err(RepositoryError::NotFound),
            Some(current) if current.revision != expected_revision => {
                Err(RepositoryError::Conflict)
            }
            Some(_) => {
                guard.insert(session.session_id.clone(), session);
                Ok(())
            }
        }
    }

    fn fetch(&self, id: &SessionId) -> Result<Option<WorkflowSession>, RepositoryError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|_| RepositoryError::Unavailable("session store poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    fn remove(&self, id: &SessionId) -> Result<Option<WorkflowSession>, RepositoryError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|_| RepositoryError::Unavailable("session store poisoned".to_string()))?;
        Ok(guard.remove(id))
    }
}

/// Trust API collaborators when a base URL is configured, the offline rulebook otherwise.
pub(crate) fn collaborators(
    config: &AppConfig,
) -> Result<(WorkflowCollaborators, Arc<dyn ReferenceCatalog>), AppError> {
    let archive = Arc::new(JsonFileArchive::new(config.origin.archive_dir.clone()));
    let renderer = Arc::new(TextCertificateRenderer);

    match config.trust_api.base_url.as_deref() {
        Some(base_url) => {
            let client = Arc::new(TrustApiClient::new(base_url, config.trust_api.timeout)?);
            info!(base_url, "using remote trust api");
            let reference: Arc<dyn ReferenceCatalog> = client.clone();
            let collaborators = WorkflowCollaborators {
                qualification: client.clone(),
                certificates: client,
                renderer,
                archive,
            };
            Ok((collaborators, reference))
        }
        None => {
            let (qualification, gateway) =
                offline_collaborators(config.origin.default_threshold, &config.origin.trade_bloc);
            info!("trust api not configured; using the offline rulebook");
            let reference: Arc<dyn ReferenceCatalog> = gateway.clone();
            let collaborators = WorkflowCollaborators {
                qualification,
                certificates: gateway,
                renderer,
                archive,
            };
            Ok((collaborators, reference))
        }
    }
}

pub(crate) fn offline_collaborators(
    default_threshold: f64,
    bloc: &TradeBloc,
) -> (Arc<RulebookQualification>, Arc<LocalCertificateGateway>) {
    let rulebook = Rulebook::with_default_threshold(default_threshold);
    (
        Arc::new(RulebookQualification::new(rulebook.clone(), bloc.clone())),
        Arc::new(LocalCertificateGateway::new(rulebook)),
    )
}

pub(crate) fn parse_threshold(raw: &str) -> Result<f64, String> {
    let value = raw
        .trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .map_err(|err| format!("failed to parse '{raw}' as a percentage ({err})"))?;
    if (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("threshold must be between 0 and 100, got {value}"))
    }
}

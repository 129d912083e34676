use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::document::CertificateDocument;
use super::domain::{Authorization, BlanketPeriod, Classification, CompanyInfo, WizardStep};
use super::validation::ValidationIssue;
use super::wizard::{CertificateWizard, Transition, WizardError};
use crate::gateway::QualificationRequest;
use crate::workflows::origin::{
    ComponentField, ComponentOrigin, ComponentRegistry, RegionalContentCalculator,
    RegionalContentResult, RegistryError,
};
use crate::workflows::qualification::QualificationTracker;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Validation,
    ServiceUnavailable,
    PartialFailure,
}

/// User-facing message attached to the session instead of a blocking alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<WizardStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl Notice {
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::ServiceUnavailable,
            message: message.into(),
            step: None,
            field: None,
        }
    }

    pub fn partial_failure(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::PartialFailure,
            message: message.into(),
            step: None,
            field: None,
        }
    }

    fn from_issue(issue: ValidationIssue) -> Self {
        Self {
            kind: NoticeKind::Validation,
            message: issue.message,
            step: Some(issue.step),
            field: Some(issue.field),
        }
    }
}

/// Edits a caller may apply to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowAction {
    SetCompanyInfo {
        company_info: CompanyInfo,
    },
    SetProductDetails {
        description: String,
        hs_code: String,
        #[serde(default)]
        blanket_period: Option<BlanketPeriod>,
    },
    AddComponent,
    RemoveComponent {
        index: usize,
    },
    UpdateComponent {
        index: usize,
        field: ComponentField,
        value: String,
    },
    ReplaceComponents {
        components: Vec<ComponentOrigin>,
    },
    SetManufacturingLocation {
        location: String,
    },
    SetAuthorization {
        authorization: Authorization,
    },
    AcceptDeclaration {
        accepted: bool,
    },
    SetSaveConsent {
        consent: bool,
    },
    Next,
    Previous,
    DismissNotices,
    Abandon,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Wizard(#[from] WizardError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("a bill of materials needs at least one component")]
    EmptyComponents,
}

/// Serializable state of one certificate workflow; persisted as `usmca_workflow_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSession {
    pub session_id: SessionId,
    /// Identifies this session's archive alongside the id.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub revision: u64,
    pub wizard: CertificateWizard,
    pub qualification: QualificationTracker,
    #[serde(default)]
    pub notices: Vec<Notice>,
    #[serde(default)]
    pub save_consent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<CertificateDocument>,
}

impl WorkflowSession {
    pub fn new(session_id: SessionId, classification: &Classification) -> Self {
        Self {
            session_id,
            created_at: Utc::now(),
            revision: 0,
            wizard: CertificateWizard::new(classification),
            qualification: QualificationTracker::new(),
            notices: Vec::new(),
            save_consent: false,
            certificate: None,
        }
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.wizard.draft().supply_chain.components
    }

    /// Threshold from the latest qualification verdict, else `default_threshold`.
    pub fn threshold(&self, default_threshold: f64) -> f64 {
        self.qualification
            .latest()
            .and_then(|cached| cached.verdict.threshold_required)
            .unwrap_or(default_threshold)
    }

    pub fn regional_content(
        &self,
        calculator: &RegionalContentCalculator,
        default_threshold: f64,
    ) -> RegionalContentResult {
        calculator.calculate(
            self.components().components(),
            self.threshold(default_threshold),
        )
    }

    /// Inputs for the qualification collaborator, once HS code, components and location are all set.
    pub fn qualification_request(&self) -> Option<QualificationRequest> {
        let draft = self.wizard.draft();
        let hs_code = draft.product_details.parsed_hs_code()?;
        let location = draft.supply_chain.manufacturing_location()?;
        let components = draft.supply_chain.components.components();
        let has_origin = components
            .iter()
            .any(|component| !component.country_code().is_empty());
        if !has_origin {
            return None;
        }

        Some(QualificationRequest {
            component_origins: components.to_vec(),
            manufacturing_location: location.to_ascii_uppercase(),
            hs_code: hs_code.digits().to_string(),
        })
    }

    pub fn push_notice(&mut self, notice: Notice) {
        if !self.notices.contains(&notice) {
            self.notices.push(notice);
        }
    }

    pub fn clear_notices(&mut self, kind: NoticeKind) {
        self.notices.retain(|notice| notice.kind != kind);
    }
}

/// Pure reducer: every session change goes through here.
pub fn apply(
    mut session: WorkflowSession,
    action: WorkflowAction,
) -> Result<WorkflowSession, SessionError> {
    match action {
        WorkflowAction::SetCompanyInfo { company_info } => {
            session
                .wizard
                .edit(|draft| draft.company_info = company_info)?;
        }
        WorkflowAction::SetProductDetails {
            description,
            hs_code,
            blanket_period,
        } => {
            session.wizard.edit(|draft| {
                let product = &mut draft.product_details;
                if product.hs_code.trim() != hs_code.trim() {
                    product.hs_verification = None;
                }
                product.description = description;
                product.hs_code = hs_code;
                product.blanket_period = blanket_period;
            })?;
        }
        WorkflowAction::AddComponent => {
            session
                .wizard
                .edit(|draft| draft.supply_chain.components.add_component())?;
        }
        WorkflowAction::RemoveComponent { index } => {
            session
                .wizard
                .edit(|draft| draft.supply_chain.components.remove_component(index))??;
        }
        WorkflowAction::UpdateComponent {
            index,
            field,
            value,
        } => {
            session.wizard.edit(|draft| {
                draft
                    .supply_chain
                    .components
                    .update_component(index, field, &value)
            })??;
        }
        WorkflowAction::ReplaceComponents { components } => {
            if components.is_empty() {
                return Err(SessionError::EmptyComponents);
            }
            session.wizard.edit(|draft| {
                draft.supply_chain.components = ComponentRegistry::from_components(components)
            })?;
        }
        WorkflowAction::SetManufacturingLocation { location } => {
            session.wizard.edit(|draft| {
                let location = location.trim();
                draft.supply_chain.manufacturing_location =
                    (!location.is_empty()).then(|| location.to_ascii_uppercase());
            })?;
        }
        WorkflowAction::SetAuthorization { authorization } => {
            session
                .wizard
                .edit(|draft| draft.authorization = authorization)?;
        }
        WorkflowAction::AcceptDeclaration { accepted } => {
            session
                .wizard
                .edit(|draft| draft.declaration_accepted = accepted)?;
        }
        WorkflowAction::SetSaveConsent { consent } => {
            session.save_consent = consent;
        }
        WorkflowAction::Next => match session.wizard.next()? {
            Transition::Blocked { issues, .. } => {
                session.clear_notices(NoticeKind::Validation);
                for issue in issues {
                    session.push_notice(Notice::from_issue(issue));
                }
            }
            Transition::Advanced { .. } | Transition::AtFinalStep => {
                session.clear_notices(NoticeKind::Validation);
            }
        },
        WorkflowAction::Previous => {
            session.wizard.previous()?;
            session.clear_notices(NoticeKind::Validation);
        }
        WorkflowAction::DismissNotices => session.notices.clear(),
        WorkflowAction::Abandon => {
            session.wizard.abandon()?;
            session.qualification.cancel();
        }
    }

    if session.wizard.status().is_editing() {
        let request = session.qualification_request();
        session.qualification.observe(request);
    }
    session.revision += 1;
    Ok(session)
}

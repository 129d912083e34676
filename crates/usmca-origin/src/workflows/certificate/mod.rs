//! Certificate-of-origin wizard, workflow sessions, and certificate assembly.

pub mod document;
pub mod domain;
pub mod repository;
pub mod router;
pub mod service;
pub mod session;
pub mod validation;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use document::{
    CertificateDocument, CertificateRenderer, PartyBlock, RenderError, RenderedCertificate,
    TextCertificateRenderer, PLACEHOLDER,
};
pub use domain::{
    Authorization, BlanketPeriod, CertificateDraft, Classification, CompanyInfo, PartyInfo,
    ProductDetails, SupplyChain, WizardStep,
};
pub use repository::{
    ArchiveError, JsonFileArchive, RepositoryError, SessionArchive, SessionRepository,
    ARCHIVE_FILE_NAME,
};
pub use router::certificate_router;
pub use service::{
    GeneratedCertificate, OriginWorkflowService, QualificationView, SavedSession, SessionView,
    WorkflowCollaborators, WorkflowServiceError, WorkflowSettings,
};
pub use session::{
    apply, Notice, NoticeKind, SessionError, SessionId, WorkflowAction, WorkflowSession,
};
pub use validation::{validate_all, validate_step, StepValidation, ValidationIssue};
pub use wizard::{CertificateWizard, Transition, WizardError, WizardStatus};

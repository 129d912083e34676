//! Seams to the external trust API: qualification, certificate issuance,
//! HS verification and reference data.

mod client;
mod dto;
mod error;
mod local;
pub mod retry;

use async_trait::async_trait;

pub use client::TrustApiClient;
pub use dto::{
    AuthorizationRecord, BlanketPeriodRecord, CertificateRecord, HsClassificationRecord,
    HsVerification, PartyRecord, ProductRecord, QualificationRequest, QualificationVerdict,
    ReferenceCategory, ReferenceOption,
};
pub use error::GatewayError;
pub use local::LocalCertificateGateway;
pub use retry::RetryPolicy;

use crate::workflows::certificate::CertificateDraft;
use crate::workflows::origin::HsCode;

pub const QUALIFICATION_ENDPOINT: &str = "/api/trust/calculate-qualification";
pub const CERTIFICATE_ENDPOINT: &str = "/api/trust/complete-certificate";
pub const HS_VERIFICATION_ENDPOINT: &str = "/api/trust/verify-hs-code";
pub const REFERENCE_OPTIONS_ENDPOINT: &str = "/api/database-driven-dropdown-options";

/// Resolves whether a product qualifies and which threshold applies.
#[async_trait]
pub trait QualificationService: Send + Sync {
    async fn calculate(
        &self,
        request: &QualificationRequest,
    ) -> Result<QualificationVerdict, GatewayError>;
}

/// Issues certificates and verifies HS classifications.
#[async_trait]
pub trait CertificateGateway: Send + Sync {
    async fn generate_certificate(
        &self,
        draft: &CertificateDraft,
    ) -> Result<CertificateRecord, GatewayError>;

    async fn verify_hs_code(&self, hs_code: &HsCode) -> Result<HsVerification, GatewayError>;
}

/// Source of dropdown reference data.
#[async_trait]
pub trait ReferenceCatalog: Send + Sync {
    async fn options(
        &self,
        category: ReferenceCategory,
    ) -> Result<Vec<ReferenceOption>, GatewayError>;
}

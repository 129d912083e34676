//! Wire shapes of the trust API collaborators. Every field the remote side
//! may omit is an `Option` so gaps surface explicitly instead of as
//! placeholder strings.

use serde::{Deserialize, Serialize};

use crate::workflows::certificate::CertificateDraft;
use crate::workflows::origin::ComponentOrigin;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualificationRequest {
    pub component_origins: Vec<ComponentOrigin>,
    pub manufacturing_location: String,
    pub hs_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualificationVerdict {
    pub qualified: bool,
    #[serde(default)]
    pub threshold_required: Option<f64>,
    #[serde(default)]
    pub regional_content: Option<f64>,
    #[serde(default)]
    pub rule_description: Option<String>,
    #[serde(default)]
    pub documentation: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CertificateRequest<'a> {
    pub action: &'static str,
    #[serde(rename = "certificateData")]
    pub certificate_data: &'a CertificateDraft,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CertificateResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub certificate: Option<CertificateRecord>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartyRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub manufacturing_location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HsClassificationRecord {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Dates stay textual; the remote service is not consistent about formats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlanketPeriodRecord {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    #[serde(default)]
    pub signatory_name: Option<String>,
    #[serde(default)]
    pub signatory_title: Option<String>,
    #[serde(default)]
    pub signature_date: Option<String>,
}

/// Certificate as issued by the generation collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CertificateRecord {
    #[serde(default)]
    pub certificate_number: Option<String>,
    #[serde(default)]
    pub exporter: Option<PartyRecord>,
    #[serde(default)]
    pub importer: Option<PartyRecord>,
    #[serde(default)]
    pub product: Option<ProductRecord>,
    #[serde(default)]
    pub hs_classification: Option<HsClassificationRecord>,
    #[serde(default)]
    pub blanket_period: Option<BlanketPeriodRecord>,
    #[serde(default)]
    pub authorization: Option<AuthorizationRecord>,
    #[serde(default)]
    pub trust_verification: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceCategory {
    Countries,
    ProductCategories,
}

impl ReferenceCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Countries => "countries",
            Self::ProductCategories => "product_categories",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "countries" => Some(Self::Countries),
            "product_categories" => Some(Self::ProductCategories),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceOption {
    pub value: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReferenceOptionsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Vec<ReferenceOption>,
}

#[derive(Debug, Serialize)]
pub(crate) struct HsVerificationRequest<'a> {
    pub hs_code: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HsVerification {
    pub verified: bool,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub tariff_info: Option<serde_json::Value>,
    #[serde(default)]
    pub alternatives: Vec<serde_json::Value>,
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::gateway::HsVerification;
use crate::workflows::origin::{ComponentRegistry, HsCode};

/// Classification result that seeds a new certificate draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub hs_code: HsCode,
    pub product_description: String,
}

/// Ordered stages of the certificate wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    CompanyInfo,
    ProductDetails,
    SupplyChain,
    Authorization,
    ReviewGenerate,
}

impl WizardStep {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::CompanyInfo,
            Self::ProductDetails,
            Self::SupplyChain,
            Self::Authorization,
            Self::ReviewGenerate,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::CompanyInfo => "Company Information",
            Self::ProductDetails => "Product Details",
            Self::SupplyChain => "Supply Chain",
            Self::Authorization => "Authorization",
            Self::ReviewGenerate => "Review & Generate",
        }
    }

    pub const fn number(self) -> u8 {
        match self {
            Self::CompanyInfo => 1,
            Self::ProductDetails => 2,
            Self::SupplyChain => 3,
            Self::Authorization => 4,
            Self::ReviewGenerate => 5,
        }
    }

    pub const fn next(self) -> Option<Self> {
        match self {
            Self::CompanyInfo => Some(Self::ProductDetails),
            Self::ProductDetails => Some(Self::SupplyChain),
            Self::SupplyChain => Some(Self::Authorization),
            Self::Authorization => Some(Self::ReviewGenerate),
            Self::ReviewGenerate => None,
        }
    }

    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::CompanyInfo => None,
            Self::ProductDetails => Some(Self::CompanyInfo),
            Self::SupplyChain => Some(Self::ProductDetails),
            Self::Authorization => Some(Self::SupplyChain),
            Self::ReviewGenerate => Some(Self::Authorization),
        }
    }
}

/// Legal party named on the certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub tax_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyInfo {
    #[serde(default)]
    pub exporter: PartyInfo,
    #[serde(default)]
    pub contact_name: String,
    #[serde(default)]
    pub contact_email: String,
    #[serde(default)]
    pub importer: Option<PartyInfo>,
}

/// Period covered by a blanket certification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlanketPeriod {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetails {
    #[serde(default)]
    pub description: String,
    /// Kept as entered so an invalid code can be reported instead of rejected on input.
    #[serde(default)]
    pub hs_code: String,
    #[serde(default)]
    pub blanket_period: Option<BlanketPeriod>,
    #[serde(default)]
    pub hs_verification: Option<HsVerification>,
}

impl ProductDetails {
    pub fn parsed_hs_code(&self) -> Option<HsCode> {
        HsCode::parse(&self.hs_code).ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplyChain {
    #[serde(default)]
    pub components: ComponentRegistry,
    #[serde(default)]
    pub manufacturing_location: Option<String>,
}

impl SupplyChain {
    pub fn manufacturing_location(&self) -> Option<&str> {
        self.manufacturing_location
            .as_deref()
            .map(str::trim)
            .filter(|location| !location.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    #[serde(default)]
    pub signatory_name: String,
    #[serde(default)]
    pub signatory_title: String,
    #[serde(default)]
    pub signature_date: Option<NaiveDate>,
    #[serde(default)]
    pub signature_token: String,
}

/// All data collected by the wizard for one certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateDraft {
    pub company_info: CompanyInfo,
    pub product_details: ProductDetails,
    pub supply_chain: SupplyChain,
    pub authorization: Authorization,
    pub declaration_accepted: bool,
}

impl CertificateDraft {
    pub fn from_classification(classification: &Classification) -> Self {
        Self {
            company_info: CompanyInfo::default(),
            product_details: ProductDetails {
                description: classification.product_description.clone(),
                hs_code: classification.hs_code.digits().to_string(),
                blanket_period: None,
                hs_verification: None,
            },
            supply_chain: SupplyChain::default(),
            authorization: Authorization::default(),
            declaration_accepted: false,
        }
    }
}

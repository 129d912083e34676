use serde::{Deserialize, Serialize};

use super::domain::{CertificateDraft, PartyInfo, WizardStep};
use crate::workflows::origin::HsCode;

/// A single missing or malformed field reported inline under its section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub step: WizardStep,
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(step: WizardStep, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step,
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result of the per-stage predicates, recomputed after every mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepValidation {
    pub company_info: bool,
    pub product_details: bool,
    pub supply_chain: bool,
    pub authorization: bool,
    pub review_generate: bool,
}

impl StepValidation {
    pub fn evaluate(draft: &CertificateDraft) -> Self {
        let passes = |step| validate_step(step, draft).is_empty();
        Self {
            company_info: passes(WizardStep::CompanyInfo),
            product_details: passes(WizardStep::ProductDetails),
            supply_chain: passes(WizardStep::SupplyChain),
            authorization: passes(WizardStep::Authorization),
            review_generate: passes(WizardStep::ReviewGenerate),
        }
    }

    pub fn get(&self, step: WizardStep) -> bool {
        match step {
            WizardStep::CompanyInfo => self.company_info,
            WizardStep::ProductDetails => self.product_details,
            WizardStep::SupplyChain => self.supply_chain,
            WizardStep::Authorization => self.authorization,
            WizardStep::ReviewGenerate => self.review_generate,
        }
    }

    pub fn all_valid(&self) -> bool {
        WizardStep::ordered().into_iter().all(|step| self.get(step))
    }
}

pub fn validate_step(step: WizardStep, draft: &CertificateDraft) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    match step {
        WizardStep::CompanyInfo => company_issues(draft, &mut issues),
        WizardStep::ProductDetails => product_issues(draft, &mut issues),
        WizardStep::SupplyChain => supply_chain_issues(draft, &mut issues),
        WizardStep::Authorization => authorization_issues(draft, &mut issues),
        WizardStep::ReviewGenerate => {
            if !draft.declaration_accepted {
                issues.push(ValidationIssue::new(
                    step,
                    "declaration_accepted",
                    "the origin declaration must be accepted",
                ));
            }
        }
    }
    issues
}

/// Issues across every stage, in wizard order.
pub fn validate_all(draft: &CertificateDraft) -> Vec<ValidationIssue> {
    WizardStep::ordered()
        .into_iter()
        .flat_map(|step| validate_step(step, draft))
        .collect()
}

fn require(
    issues: &mut Vec<ValidationIssue>,
    step: WizardStep,
    field: &str,
    value: &str,
    label: &str,
) {
    if value.trim().is_empty() {
        issues.push(ValidationIssue::new(step, field, format!("{label} is required")));
    }
}

fn party_issues(
    issues: &mut Vec<ValidationIssue>,
    prefix: &str,
    party: &PartyInfo,
    full: bool,
) {
    let step = WizardStep::CompanyInfo;
    require(issues, step, &format!("{prefix}.name"), &party.name, "name");
    require(issues, step, &format!("{prefix}.country"), &party.country, "country");
    if full {
        require(issues, step, &format!("{prefix}.address"), &party.address, "address");
        require(issues, step, &format!("{prefix}.tax_id"), &party.tax_id, "tax id");
    }
}

fn company_issues(draft: &CertificateDraft, issues: &mut Vec<ValidationIssue>) {
    let step = WizardStep::CompanyInfo;
    let company = &draft.company_info;
    party_issues(issues, "exporter", &company.exporter, true);
    require(issues, step, "contact_name", &company.contact_name, "contact name");

    let email = company.contact_email.trim();
    if email.is_empty() {
        issues.push(ValidationIssue::new(
            step,
            "contact_email",
            "contact email is required",
        ));
    } else if !email.contains('@') {
        issues.push(ValidationIssue::new(
            step,
            "contact_email",
            format!("'{email}' is not an email address"),
        ));
    }

    if let Some(importer) = &company.importer {
        party_issues(issues, "importer", importer, false);
    }
}

fn product_issues(draft: &CertificateDraft, issues: &mut Vec<ValidationIssue>) {
    let step = WizardStep::ProductDetails;
    let product = &draft.product_details;
    require(
        issues,
        step,
        "description",
        &product.description,
        "product description",
    );

    if let Err(err) = HsCode::parse(&product.hs_code) {
        issues.push(ValidationIssue::new(step, "hs_code", err.to_string()));
    }

    if let Some(period) = product.blanket_period {
        if let (Some(start), Some(end)) = (period.start_date, period.end_date) {
            if end < start {
                issues.push(ValidationIssue::new(
                    step,
                    "blanket_period",
                    format!("blanket period ends ({end}) before it starts ({start})"),
                ));
            }
        }
    }
}

fn supply_chain_issues(draft: &CertificateDraft, issues: &mut Vec<ValidationIssue>) {
    let step = WizardStep::SupplyChain;
    let supply_chain = &draft.supply_chain;
    let components = supply_chain.components.components();

    if components.is_empty() {
        issues.push(ValidationIssue::new(
            step,
            "components",
            "at least one component is required",
        ));
    }

    for (index, component) in components.iter().enumerate() {
        let row = index + 1;
        if component.origin_country.trim().is_empty() {
            issues.push(ValidationIssue::new(
                step,
                format!("components[{index}].origin_country"),
                format!("component {row}: origin country is required"),
            ));
        }
        if component.description.trim().is_empty() {
            issues.push(ValidationIssue::new(
                step,
                format!("components[{index}].description"),
                format!("component {row}: description is required"),
            ));
        }
        if !(0.0..=100.0).contains(&component.value_percentage) {
            issues.push(ValidationIssue::new(
                step,
                format!("components[{index}].value_percentage"),
                format!(
                    "component {row}: value {} must be between 0 and 100",
                    component.value_percentage
                ),
            ));
        }
    }

    if !components.is_empty() && supply_chain.components.total_percentage() <= 0.0 {
        issues.push(ValidationIssue::new(
            step,
            "components",
            "component values must total more than 0%",
        ));
    }

    if supply_chain.manufacturing_location().is_none() {
        issues.push(ValidationIssue::new(
            step,
            "manufacturing_location",
            "manufacturing location is required",
        ));
    }
}

fn authorization_issues(draft: &CertificateDraft, issues: &mut Vec<ValidationIssue>) {
    let step = WizardStep::Authorization;
    let authorization = &draft.authorization;
    require(
        issues,
        step,
        "signatory_name",
        &authorization.signatory_name,
        "signatory name",
    );
    require(
        issues,
        step,
        "signatory_title",
        &authorization.signatory_title,
        "signatory title",
    );
    if authorization.signature_date.is_none() {
        issues.push(ValidationIssue::new(
            step,
            "signature_date",
            "signature date is required",
        ));
    }
    require(
        issues,
        step,
        "signature_token",
        &authorization.signature_token,
        "signature",
    );
}

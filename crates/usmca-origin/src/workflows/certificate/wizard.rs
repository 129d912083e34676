use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{CertificateDraft, Classification, WizardStep};
use super::validation::{validate_all, validate_step, StepValidation, ValidationIssue};

/// Lifecycle of a wizard; `Generated` and `Abandoned` are terminal.
///
/// `Generating` holds the draft frozen while the certificate collaborator is called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WizardStatus {
    Editing,
    Generating { started_at: DateTime<Utc> },
    Generated { certificate_number: String },
    Abandoned,
}

impl WizardStatus {
    pub fn is_editing(&self) -> bool {
        matches!(self, Self::Editing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Generated { .. } | Self::Abandoned)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Editing => "editing",
            Self::Generating { .. } => "generating",
            Self::Generated { .. } => "generated",
            Self::Abandoned => "abandoned",
        }
    }
}

/// Outcome of a forward navigation request. Blocking is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Transition {
    Advanced { step: WizardStep },
    Blocked {
        step: WizardStep,
        issues: Vec<ValidationIssue>,
    },
    AtFinalStep,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("certificate workflow is already {0}")]
    Closed(&'static str),
    #[error("certificate cannot be generated: {} field(s) incomplete", .issues.len())]
    Incomplete { issues: Vec<ValidationIssue> },
}

/// Plain-data wizard state: current stage, collected data, per-stage validity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateWizard {
    current_step: WizardStep,
    certificate_data: CertificateDraft,
    step_validation: StepValidation,
    status: WizardStatus,
}

impl CertificateWizard {
    pub fn new(classification: &Classification) -> Self {
        Self::from_draft(CertificateDraft::from_classification(classification))
    }

    pub fn from_draft(certificate_data: CertificateDraft) -> Self {
        let step_validation = StepValidation::evaluate(&certificate_data);
        Self {
            current_step: WizardStep::CompanyInfo,
            certificate_data,
            step_validation,
            status: WizardStatus::Editing,
        }
    }

    pub fn current_step(&self) -> WizardStep {
        self.current_step
    }

    pub fn draft(&self) -> &CertificateDraft {
        &self.certificate_data
    }

    pub fn step_validation(&self) -> StepValidation {
        self.step_validation
    }

    pub fn status(&self) -> &WizardStatus {
        &self.status
    }

    pub fn current_issues(&self) -> Vec<ValidationIssue> {
        validate_step(self.current_step, &self.certificate_data)
    }

    /// Applies `edit` to the draft and re-evaluates every stage predicate.
    pub fn edit<T, F>(&mut self, edit: F) -> Result<T, WizardError>
    where
        F: FnOnce(&mut CertificateDraft) -> T,
    {
        self.ensure_editing()?;
        let outcome = edit(&mut self.certificate_data);
        self.step_validation = StepValidation::evaluate(&self.certificate_data);
        Ok(outcome)
    }

    pub fn next(&mut self) -> Result<Transition, WizardError> {
        self.ensure_editing()?;
        let Some(target) = self.current_step.next() else {
            return Ok(Transition::AtFinalStep);
        };

        if !self.step_validation.get(self.current_step) {
            return Ok(Transition::Blocked {
                step: self.current_step,
                issues: self.current_issues(),
            });
        }

        self.current_step = target;
        Ok(Transition::Advanced { step: target })
    }

    pub fn previous(&mut self) -> Result<WizardStep, WizardError> {
        self.ensure_editing()?;
        if let Some(target) = self.current_step.previous() {
            self.current_step = target;
        }
        Ok(self.current_step)
    }

    pub fn can_generate(&self) -> bool {
        matches!(self.status, WizardStatus::Editing) && self.step_validation.all_valid()
    }

    /// Gate checked before the certificate collaborator is invoked.
    pub fn ensure_generatable(&self) -> Result<(), WizardError> {
        self.ensure_editing()?;
        if self.step_validation.all_valid() {
            return Ok(());
        }
        Err(WizardError::Incomplete {
            issues: validate_all(&self.certificate_data),
        })
    }

    /// Freezes a complete draft for generation. Only one generation may hold the draft.
    pub fn begin_generation(&mut self, started_at: DateTime<Utc>) -> Result<(), WizardError> {
        self.ensure_generatable()?;
        self.status = WizardStatus::Generating { started_at };
        Ok(())
    }

    pub fn generation_started_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            WizardStatus::Generating { started_at } => Some(started_at),
            _ => None,
        }
    }

    /// Returns a frozen draft to editing after a failed or abandoned generation.
    pub fn release_generation(&mut self) -> bool {
        if self.generation_started_at().is_none() {
            return false;
        }
        self.status = WizardStatus::Editing;
        true
    }

    pub fn mark_generated(&mut self, certificate_number: String) -> Result<(), WizardError> {
        if self.generation_started_at().is_none() {
            self.ensure_generatable()?;
        }
        self.status = WizardStatus::Generated { certificate_number };
        Ok(())
    }

    pub fn abandon(&mut self) -> Result<(), WizardError> {
        self.ensure_editing()?;
        self.status = WizardStatus::Abandoned;
        Ok(())
    }

    fn ensure_editing(&self) -> Result<(), WizardError> {
        if !self.status.is_editing() {
            return Err(WizardError::Closed(self.status.label()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::certificate::domain::PartyInfo;
    use crate::workflows::origin::{ComponentField, ComponentOrigin, ComponentRegistry, HsCode};
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn wizard() -> CertificateWizard {
        CertificateWizard::new(&Classification {
            hs_code: HsCode::parse("850440").expect("valid code"),
            product_description: "Static converter".to_string(),
        })
    }

    fn complete(draft: &mut CertificateDraft) {
        draft.company_info.exporter = PartyInfo {
            name: "Norte Components".to_string(),
            address: "Av. Industrial 12, Monterrey".to_string(),
            country: "MX".to_string(),
            tax_id: "NCO120315AB1".to_string(),
        };
        draft.company_info.contact_name = "Lucia Ortega".to_string();
        draft.company_info.contact_email = "lucia@norte.example".to_string();
        draft.supply_chain.components = ComponentRegistry::from_components(vec![
            ComponentOrigin::new("MX", 70.0, "Transformer core"),
            ComponentOrigin::new("CN", 30.0, "Capacitors"),
        ]);
        draft.supply_chain.manufacturing_location = Some("MX".to_string());
        draft.authorization.signatory_name = "Lucia Ortega".to_string();
        draft.authorization.signatory_title = "Trade Compliance Lead".to_string();
        draft.authorization.signature_date = NaiveDate::from_ymd_opt(2026, 3, 2);
        draft.authorization.signature_token = "sig-7f3a".to_string();
        draft.declaration_accepted = true;
    }

    #[test]
    fn next_is_blocked_until_the_stage_validates() {
        let mut wizard = wizard();
        let transition = wizard.next().expect("editable");
        match transition {
            Transition::Blocked { step, issues } => {
                assert_eq!(step, WizardStep::CompanyInfo);
                assert!(!issues.is_empty());
            }
            other => panic!("expected blocked transition, got {other:?}"),
        }
        assert_eq!(wizard.current_step(), WizardStep::CompanyInfo);

        wizard.edit(complete).expect("editable");
        assert_eq!(
            wizard.next().expect("editable"),
            Transition::Advanced {
                step: WizardStep::ProductDetails
            }
        );
    }

    #[test]
    fn previous_keeps_entered_data() {
        let mut wizard = wizard();
        wizard.edit(complete).expect("editable");
        wizard.next().expect("editable");
        wizard.next().expect("editable");
        assert_eq!(wizard.current_step(), WizardStep::SupplyChain);

        assert_eq!(wizard.previous().expect("editable"), WizardStep::ProductDetails);
        assert_eq!(wizard.previous().expect("editable"), WizardStep::CompanyInfo);
        assert_eq!(wizard.previous().expect("editable"), WizardStep::CompanyInfo);
        assert_eq!(wizard.draft().supply_chain.components.len(), 2);
    }

    #[test]
    fn walking_to_the_end_reports_final_step() {
        let mut wizard = wizard();
        wizard.edit(complete).expect("editable");
        for _ in 0..4 {
            assert!(matches!(
                wizard.next().expect("editable"),
                Transition::Advanced { .. }
            ));
        }
        assert_eq!(wizard.current_step(), WizardStep::ReviewGenerate);
        assert_eq!(wizard.next().expect("editable"), Transition::AtFinalStep);
    }

    #[test]
    fn generation_requires_every_stage() {
        let mut wizard = wizard();
        wizard.edit(complete).expect("editable");
        assert!(wizard.can_generate());

        wizard
            .edit(|draft| draft.authorization.signature_token.clear())
            .expect("editable");
        assert!(!wizard.can_generate());
        match wizard.ensure_generatable() {
            Err(WizardError::Incomplete { issues }) => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].field, "signature_token");
            }
            other => panic!("expected incomplete error, got {other:?}"),
        }
    }

    #[test]
    fn terminal_states_reject_mutation() {
        let mut wizard = wizard();
        wizard.edit(complete).expect("editable");
        wizard
            .mark_generated("USMCA-2026-000001".to_string())
            .expect("complete draft generates");

        assert_eq!(
            wizard.next(),
            Err(WizardError::Closed("generated"))
        );
        assert!(wizard.edit(|draft| draft.declaration_accepted = false).is_err());
        assert!(wizard.abandon().is_err());
    }

    #[test]
    fn generation_freezes_the_draft_until_released() {
        let mut wizard = wizard();
        wizard.edit(complete).expect("editable");
        wizard.begin_generation(Utc::now()).expect("complete draft");

        assert!(!wizard.can_generate());
        assert_eq!(
            wizard.edit(|draft| draft.declaration_accepted = false),
            Err(WizardError::Closed("generating"))
        );
        assert_eq!(
            wizard.begin_generation(Utc::now()),
            Err(WizardError::Closed("generating"))
        );

        assert!(wizard.release_generation());
        assert!(!wizard.release_generation());
        assert!(wizard.can_generate());

        wizard.begin_generation(Utc::now()).expect("complete draft");
        wizard
            .mark_generated("USMCA-2026-000002".to_string())
            .expect("held draft generates");
        assert!(wizard.status().is_terminal());
    }

    const REQUIRED_FIELDS: usize = 16;

    fn clear_field(draft: &mut CertificateDraft, field: usize) {
        let company = &mut draft.company_info;
        let authorization = &mut draft.authorization;
        match field {
            0 => company.exporter.name.clear(),
            1 => company.exporter.address.clear(),
            2 => company.exporter.country.clear(),
            3 => company.exporter.tax_id.clear(),
            4 => company.contact_name.clear(),
            5 => company.contact_email.clear(),
            6 => draft.product_details.description.clear(),
            7 => draft.product_details.hs_code.clear(),
            8 => {
                draft
                    .supply_chain
                    .components
                    .update_component(0, ComponentField::Description, "")
                    .expect("first component exists");
            }
            9 => {
                draft
                    .supply_chain
                    .components
                    .update_component(0, ComponentField::OriginCountry, "")
                    .expect("first component exists");
            }
            10 => draft.supply_chain.manufacturing_location = None,
            11 => authorization.signatory_name.clear(),
            12 => authorization.signatory_title.clear(),
            13 => authorization.signature_date = None,
            14 => authorization.signature_token.clear(),
            _ => draft.declaration_accepted = false,
        }
    }

    proptest! {
        #[test]
        fn any_missing_required_field_blocks_generation(
            cleared in proptest::collection::btree_set(0..REQUIRED_FIELDS, 1..=REQUIRED_FIELDS)
        ) {
            let mut wizard = wizard();
            wizard.edit(complete).expect("editable");
            prop_assert!(wizard.can_generate());

            wizard
                .edit(|draft| {
                    for field in &cleared {
                        clear_field(draft, *field);
                    }
                })
                .expect("editable");

            prop_assert!(!wizard.can_generate());
            let blocked = matches!(
                wizard.ensure_generatable(),
                Err(WizardError::Incomplete { ref issues }) if !issues.is_empty()
            );
            prop_assert!(blocked);
            prop_assert!(wizard.begin_generation(Utc::now()).is_err());
        }
    }
}

use async_trait::async_trait;

use super::rulebook::Rulebook;
use crate::gateway::{GatewayError, QualificationRequest, QualificationService, QualificationVerdict};
use crate::workflows::origin::{HsCode, RegionalContentCalculator, TradeBloc};

/// Offline qualification backed by the local rulebook.
#[derive(Debug, Clone)]
pub struct RulebookQualification {
    rulebook: Rulebook,
    calculator: RegionalContentCalculator,
}

impl RulebookQualification {
    pub fn new(rulebook: Rulebook, bloc: TradeBloc) -> Self {
        Self {
            rulebook,
            calculator: RegionalContentCalculator::new(bloc),
        }
    }

    pub fn rulebook(&self) -> &Rulebook {
        &self.rulebook
    }

    pub fn evaluate(
        &self,
        request: &QualificationRequest,
    ) -> Result<QualificationVerdict, GatewayError> {
        let hs_code = HsCode::parse(&request.hs_code)
            .map_err(|err| GatewayError::InvalidRequest(err.to_string()))?;
        let selection = self.rulebook.select(
            &hs_code,
            &request.manufacturing_location,
            self.calculator.bloc(),
        );
        let content = self
            .calculator
            .calculate(&request.component_origins, selection.threshold_required);

        Ok(QualificationVerdict {
            qualified: content.qualified && selection.manufactured_in_bloc,
            threshold_required: Some(selection.threshold_required),
            regional_content: Some(content.regional_content),
            rule_description: Some(selection.rule_description),
            documentation: selection.documentation,
        })
    }
}

impl Default for RulebookQualification {
    fn default() -> Self {
        Self::new(Rulebook::standard(), TradeBloc::usmca())
    }
}

#[async_trait]
impl QualificationService for RulebookQualification {
    async fn calculate(
        &self,
        request: &QualificationRequest,
    ) -> Result<QualificationVerdict, GatewayError> {
        self.evaluate(request)
    }
}

use serde::{Deserialize, Serialize};

use super::domain::{ComponentOrigin, TradeBloc};

/// Threshold applied when no product-specific rule is known.
pub const DEFAULT_THRESHOLD: f64 = 62.5;

const TOTAL_TOLERANCE: f64 = 1e-6;

/// Advisory classification of the declared component total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCompleteness {
    Incomplete,
    Complete,
    ExceedsHundred,
}

impl ContentCompleteness {
    pub fn from_total(total: f64) -> Self {
        if (total - 100.0).abs() <= TOTAL_TOLERANCE {
            Self::Complete
        } else if total > 100.0 {
            Self::ExceedsHundred
        } else {
            Self::Incomplete
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Incomplete => "incomplete",
            Self::Complete => "complete",
            Self::ExceedsHundred => "exceeds 100%",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalContentResult {
    pub regional_content: f64,
    pub non_regional_content: f64,
    pub total: f64,
    pub threshold_required: f64,
    pub qualified: bool,
    pub gap: f64,
    pub completeness: ContentCompleteness,
}

/// Stateless calculator bound to a trade bloc.
#[derive(Debug, Clone, Default)]
pub struct RegionalContentCalculator {
    bloc: TradeBloc,
}

impl RegionalContentCalculator {
    pub fn new(bloc: TradeBloc) -> Self {
        Self { bloc }
    }

    pub fn bloc(&self) -> &TradeBloc {
        &self.bloc
    }

    /// Totals above 100% are reported as-is and flagged, never clamped.
    pub fn calculate(
        &self,
        components: &[ComponentOrigin],
        threshold_required: f64,
    ) -> RegionalContentResult {
        let mut total = 0.0;
        let mut regional_content = 0.0;
        for component in components {
            total += component.value_percentage;
            if self.bloc.contains(&component.origin_country) {
                regional_content += component.value_percentage;
            }
        }

        let qualified = regional_content >= threshold_required;
        let gap = if qualified {
            0.0
        } else {
            threshold_required - regional_content
        };

        RegionalContentResult {
            regional_content,
            non_regional_content: total - regional_content,
            total,
            threshold_required,
            qualified,
            gap,
            completeness: ContentCompleteness::from_total(total),
        }
    }
}

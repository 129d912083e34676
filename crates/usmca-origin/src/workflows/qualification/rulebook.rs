use serde::Serialize;

use crate::workflows::origin::{HsCode, TradeBloc, DEFAULT_THRESHOLD};

/// Regional value content rule for a group of HS chapters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualificationRule {
    pub key: &'static str,
    pub category: &'static str,
    pub chapters: Vec<&'static str>,
    pub threshold_required: f64,
    pub rule_description: &'static str,
    pub documentation: Vec<&'static str>,
}

/// Rule chosen for a product plus the manufacturing-location outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleSelection {
    pub rule_key: &'static str,
    pub threshold_required: f64,
    pub rule_description: String,
    pub documentation: Vec<String>,
    pub manufactured_in_bloc: bool,
}

/// Offline table of chapter-level rules; the first matching chapter wins.
#[derive(Debug, Clone)]
pub struct Rulebook {
    rules: Vec<QualificationRule>,
    fallback: QualificationRule,
}

impl Rulebook {
    pub fn standard() -> Self {
        Self::with_default_threshold(DEFAULT_THRESHOLD)
    }

    pub fn with_default_threshold(default_threshold: f64) -> Self {
        let rules = vec![
            QualificationRule {
                key: "automotive",
                category: "Vehicles & automotive parts",
                chapters: vec!["87"],
                threshold_required: 75.0,
                rule_description: "Automotive goods require 75% regional value content (net cost method).",
                documentation: vec![
                    "Net cost calculation worksheet",
                    "Supplier certifications for core parts",
                    "Steel and aluminum purchase records",
                ],
            },
            QualificationRule {
                key: "machinery_electrical",
                category: "Machinery & electrical equipment",
                chapters: vec!["84", "85"],
                threshold_required: 60.0,
                rule_description: "Machinery and electrical equipment require 60% regional value content (transaction value method).",
                documentation: vec![
                    "Bill of materials with origin per component",
                    "Transaction value invoices",
                ],
            },
            QualificationRule {
                key: "plastics_rubber",
                category: "Plastics & rubber",
                chapters: vec!["39", "40"],
                threshold_required: 60.0,
                rule_description: "Plastics and rubber articles require 60% regional value content (transaction value method).",
                documentation: vec![
                    "Resin and compound supplier declarations",
                    "Transaction value invoices",
                ],
            },
        ];

        let fallback = QualificationRule {
            key: "general",
            category: "General merchandise",
            chapters: Vec::new(),
            threshold_required: default_threshold,
            rule_description: "Goods qualify when regional value content meets the general threshold.",
            documentation: vec!["Bill of materials with origin per component"],
        };

        Self { rules, fallback }
    }

    pub fn rules(&self) -> impl Iterator<Item = &QualificationRule> {
        self.rules.iter().chain(std::iter::once(&self.fallback))
    }

    pub fn rule_for(&self, hs_code: &HsCode) -> &QualificationRule {
        self.rules
            .iter()
            .find(|rule| rule.chapters.iter().any(|chapter| *chapter == hs_code.chapter()))
            .unwrap_or(&self.fallback)
    }

    pub fn select(
        &self,
        hs_code: &HsCode,
        manufacturing_location: &str,
        bloc: &TradeBloc,
    ) -> RuleSelection {
        let rule = self.rule_for(hs_code);
        let manufactured_in_bloc = bloc.contains(manufacturing_location);

        let mut rule_description = format!(
            "HS {} ({}): {}",
            hs_code,
            rule.category,
            rule.rule_description
        );
        if !manufactured_in_bloc {
            rule_description.push_str(&format!(
                " Final manufacturing in {} is outside the trade bloc, so the good cannot qualify.",
                manufacturing_location.trim().to_ascii_uppercase()
            ));
        }

        RuleSelection {
            rule_key: rule.key,
            threshold_required: rule.threshold_required,
            rule_description,
            documentation: rule.documentation.iter().map(|doc| doc.to_string()).collect(),
            manufactured_in_bloc,
        }
    }
}

impl Default for Rulebook {
    fn default() -> Self {
        Self::standard()
    }
}

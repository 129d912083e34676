use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use serde_json::json;

use super::dto::{
    AuthorizationRecord, BlanketPeriodRecord, CertificateRecord, HsClassificationRecord,
    HsVerification, PartyRecord, ProductRecord, ReferenceCategory, ReferenceOption,
};
use super::{CertificateGateway, GatewayError, ReferenceCatalog};
use crate::workflows::certificate::{CertificateDraft, PartyInfo};
use crate::workflows::origin::HsCode;
use crate::workflows::qualification::Rulebook;

const COUNTRIES: &[(&str, &str)] = &[
    ("US", "United States"),
    ("CA", "Canada"),
    ("MX", "Mexico"),
    ("CN", "China"),
    ("DE", "Germany"),
    ("JP", "Japan"),
    ("KR", "South Korea"),
    ("TW", "Taiwan"),
    ("VN", "Vietnam"),
    ("IN", "India"),
];

/// Issues certificates locally when no trust API is configured.
///
/// Numbers carry an issuer stamp taken when the gateway is built, so a restarted
/// process never reissues a number handed out before.
#[derive(Debug)]
pub struct LocalCertificateGateway {
    issuer: String,
    sequence: AtomicU64,
    rulebook: Rulebook,
}

impl LocalCertificateGateway {
    pub fn new(rulebook: Rulebook) -> Self {
        Self::with_issuer(rulebook, format!("{:X}", Utc::now().timestamp_millis()))
    }

    pub fn with_issuer(rulebook: Rulebook, issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            sequence: AtomicU64::new(1),
            rulebook,
        }
    }

    fn next_certificate_number(&self, year: i32) -> String {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("USMCA-{year}-{}-{id:06}", self.issuer)
    }
}

impl Default for LocalCertificateGateway {
    fn default() -> Self {
        Self::new(Rulebook::standard())
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn party_record(party: &PartyInfo) -> PartyRecord {
    PartyRecord {
        name: non_empty(&party.name),
        address: non_empty(&party.address),
        country: non_empty(&party.country),
        tax_id: non_empty(&party.tax_id),
    }
}

#[async_trait]
impl CertificateGateway for LocalCertificateGateway {
    async fn generate_certificate(
        &self,
        draft: &CertificateDraft,
    ) -> Result<CertificateRecord, GatewayError> {
        let authorization = &draft.authorization;
        let year = authorization
            .signature_date
            .map(|date| date.year())
            .unwrap_or_else(|| Utc::now().year());

        let hs_classification = HsCode::parse(&draft.product_details.hs_code)
            .ok()
            .map(|code| HsClassificationRecord {
                description: Some(self.rulebook.rule_for(&code).category.to_string()),
                code: Some(code.to_string()),
            });

        Ok(CertificateRecord {
            certificate_number: Some(self.next_certificate_number(year)),
            exporter: Some(party_record(&draft.company_info.exporter)),
            importer: draft.company_info.importer.as_ref().map(party_record),
            product: Some(ProductRecord {
                description: non_empty(&draft.product_details.description),
                manufacturing_location: draft
                    .supply_chain
                    .manufacturing_location()
                    .map(str::to_string),
            }),
            hs_classification,
            blanket_period: draft.product_details.blanket_period.map(|period| {
                BlanketPeriodRecord {
                    start_date: period.start_date.map(|date| date.to_string()),
                    end_date: period.end_date.map(|date| date.to_string()),
                }
            }),
            authorization: Some(AuthorizationRecord {
                signatory_name: non_empty(&authorization.signatory_name),
                signatory_title: non_empty(&authorization.signatory_title),
                signature_date: authorization.signature_date.map(|date| date.to_string()),
            }),
            trust_verification: Some(json!({ "issuer": "local", "verified": false })),
        })
    }

    async fn verify_hs_code(&self, hs_code: &HsCode) -> Result<HsVerification, GatewayError> {
        let rule = self.rulebook.rule_for(hs_code);
        Ok(HsVerification {
            verified: true,
            source: Some("local_rulebook".to_string()),
            tariff_info: Some(json!({
                "chapter": hs_code.chapter(),
                "heading": hs_code.heading(),
                "category": rule.category,
                "threshold_required": rule.threshold_required,
            })),
            alternatives: Vec::new(),
        })
    }
}

#[async_trait]
impl ReferenceCatalog for LocalCertificateGateway {
    async fn options(
        &self,
        category: ReferenceCategory,
    ) -> Result<Vec<ReferenceOption>, GatewayError> {
        let options = match category {
            ReferenceCategory::Countries => COUNTRIES
                .iter()
                .map(|(code, name)| ReferenceOption {
                    value: code.to_string(),
                    label: name.to_string(),
                    product_count: None,
                })
                .collect(),
            ReferenceCategory::ProductCategories => self
                .rulebook
                .rules()
                .map(|rule| ReferenceOption {
                    value: rule.key.to_string(),
                    label: rule.category.to_string(),
                    product_count: None,
                })
                .collect(),
        };
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::certificate::Classification;
    use chrono::NaiveDate;

    fn draft() -> CertificateDraft {
        let mut draft = CertificateDraft::from_classification(&Classification {
            hs_code: HsCode::parse("870829").expect("valid code"),
            product_description: "Brake assembly".to_string(),
        });
        draft.company_info.exporter.name = "Norte Components".to_string();
        draft.authorization.signature_date = NaiveDate::from_ymd_opt(2026, 5, 4);
        draft
    }

    #[tokio::test]
    async fn certificate_numbers_are_sequential_per_gateway() {
        let gateway = LocalCertificateGateway::with_issuer(Rulebook::standard(), "18F2A");
        let first = gateway.generate_certificate(&draft()).await.expect("issued");
        let second = gateway.generate_certificate(&draft()).await.expect("issued");
        assert_eq!(first.certificate_number.as_deref(), Some("USMCA-2026-18F2A-000001"));
        assert_eq!(second.certificate_number.as_deref(), Some("USMCA-2026-18F2A-000002"));
    }

    #[tokio::test]
    async fn restarted_gateways_do_not_reissue_numbers() {
        let before = LocalCertificateGateway::with_issuer(Rulebook::standard(), "18F2A");
        let after = LocalCertificateGateway::with_issuer(Rulebook::standard(), "18F2B");
        let first = before.generate_certificate(&draft()).await.expect("issued");
        let again = after.generate_certificate(&draft()).await.expect("issued");
        assert_ne!(first.certificate_number, again.certificate_number);

        let stamped = LocalCertificateGateway::default()
            .generate_certificate(&draft())
            .await
            .expect("issued");
        let number = stamped.certificate_number.expect("number issued");
        assert_eq!(number.split('-').count(), 4, "{number}");
    }

    #[tokio::test]
    async fn blank_draft_fields_become_gaps() {
        let gateway = LocalCertificateGateway::default();
        let record = gateway.generate_certificate(&draft()).await.expect("issued");
        let exporter = record.exporter.expect("exporter present");
        assert_eq!(exporter.name.as_deref(), Some("Norte Components"));
        assert_eq!(exporter.address, None);
        assert!(record.importer.is_none());
        assert_eq!(
            record.hs_classification.and_then(|hs| hs.code).as_deref(),
            Some("8708.29")
        );
    }

    #[tokio::test]
    async fn reference_options_cover_bloc_countries_and_rule_categories() {
        let gateway = LocalCertificateGateway::default();
        let countries = gateway
            .options(ReferenceCategory::Countries)
            .await
            .expect("countries");
        assert!(countries.iter().any(|option| option.value == "MX"));

        let categories = gateway
            .options(ReferenceCategory::ProductCategories)
            .await
            .expect("categories");
        assert!(categories.iter().any(|option| option.value == "automotive"));
    }
}

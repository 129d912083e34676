use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::domain::{CertificateDraft, PartyInfo};
use crate::gateway::{CertificateRecord, PartyRecord};
use crate::workflows::origin::ComponentOrigin;

/// Rendered in place of any field neither the issuer nor the draft supplied.
pub const PLACEHOLDER: &str = "[TO BE COMPLETED]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyBlock {
    pub name: String,
    pub address: String,
    pub country: String,
    pub tax_id: String,
}

/// Fully resolved certificate: issuer record first, then draft data, then [`PLACEHOLDER`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateDocument {
    pub certificate_number: String,
    pub exporter: PartyBlock,
    pub importer: PartyBlock,
    pub product_description: String,
    pub hs_code: String,
    pub hs_description: String,
    pub manufacturing_location: String,
    pub blanket_start: String,
    pub blanket_end: String,
    pub components: Vec<ComponentOrigin>,
    pub signatory_name: String,
    pub signatory_title: String,
    pub signature_date: String,
    pub trust_verified: bool,
}

fn resolve(remote: Option<&str>, local: Option<&str>) -> String {
    [remote, local]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(PLACEHOLDER)
        .to_string()
}

fn party_block(remote: Option<&PartyRecord>, local: Option<&PartyInfo>) -> PartyBlock {
    PartyBlock {
        name: resolve(
            remote.and_then(|party| party.name.as_deref()),
            local.map(|party| party.name.as_str()),
        ),
        address: resolve(
            remote.and_then(|party| party.address.as_deref()),
            local.map(|party| party.address.as_str()),
        ),
        country: resolve(
            remote.and_then(|party| party.country.as_deref()),
            local.map(|party| party.country.as_str()),
        ),
        tax_id: resolve(
            remote.and_then(|party| party.tax_id.as_deref()),
            local.map(|party| party.tax_id.as_str()),
        ),
    }
}

impl CertificateDocument {
    pub fn assemble(record: &CertificateRecord, draft: &CertificateDraft) -> Self {
        let product = record.product.as_ref();
        let hs = record.hs_classification.as_ref();
        let period = record.blanket_period.as_ref();
        let local_period = draft.product_details.blanket_period;
        let authorization = record.authorization.as_ref();
        let local_start = local_period
            .and_then(|period| period.start_date)
            .map(|date| date.to_string());
        let local_end = local_period
            .and_then(|period| period.end_date)
            .map(|date| date.to_string());
        let local_signed = draft
            .authorization
            .signature_date
            .map(|date| date.to_string());
        let local_hs = draft
            .product_details
            .parsed_hs_code()
            .map(|code| code.to_string());

        Self {
            certificate_number: resolve(record.certificate_number.as_deref(), None),
            exporter: party_block(
                record.exporter.as_ref(),
                Some(&draft.company_info.exporter),
            ),
            importer: party_block(
                record.importer.as_ref(),
                draft.company_info.importer.as_ref(),
            ),
            product_description: resolve(
                product.and_then(|product| product.description.as_deref()),
                Some(draft.product_details.description.as_str()),
            ),
            hs_code: resolve(
                hs.and_then(|hs| hs.code.as_deref()),
                local_hs.as_deref(),
            ),
            hs_description: resolve(hs.and_then(|hs| hs.description.as_deref()), None),
            manufacturing_location: resolve(
                product.and_then(|product| product.manufacturing_location.as_deref()),
                draft.supply_chain.manufacturing_location(),
            ),
            blanket_start: resolve(
                period.and_then(|period| period.start_date.as_deref()),
                local_start.as_deref(),
            ),
            blanket_end: resolve(
                period.and_then(|period| period.end_date.as_deref()),
                local_end.as_deref(),
            ),
            components: draft.supply_chain.components.components().to_vec(),
            signatory_name: resolve(
                authorization.and_then(|auth| auth.signatory_name.as_deref()),
                Some(draft.authorization.signatory_name.as_str()),
            ),
            signatory_title: resolve(
                authorization.and_then(|auth| auth.signatory_title.as_deref()),
                Some(draft.authorization.signatory_title.as_str()),
            ),
            signature_date: resolve(
                authorization.and_then(|auth| auth.signature_date.as_deref()),
                local_signed.as_deref(),
            ),
            trust_verified: record
                .trust_verification
                .as_ref()
                .and_then(|value| value.get("verified"))
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false),
        }
    }

    pub fn placeholder_fields(&self) -> Vec<&'static str> {
        let fields = [
            ("certificate_number", &self.certificate_number),
            ("exporter.name", &self.exporter.name),
            ("exporter.address", &self.exporter.address),
            ("exporter.country", &self.exporter.country),
            ("exporter.tax_id", &self.exporter.tax_id),
            ("importer.name", &self.importer.name),
            ("importer.address", &self.importer.address),
            ("importer.country", &self.importer.country),
            ("importer.tax_id", &self.importer.tax_id),
            ("product_description", &self.product_description),
            ("hs_code", &self.hs_code),
            ("hs_description", &self.hs_description),
            ("manufacturing_location", &self.manufacturing_location),
            ("blanket_start", &self.blanket_start),
            ("blanket_end", &self.blanket_end),
            ("signatory_name", &self.signatory_name),
            ("signatory_title", &self.signatory_title),
            ("signature_date", &self.signature_date),
        ];
        fields
            .into_iter()
            .filter(|(_, value)| value.as_str() == PLACEHOLDER)
            .map(|(field, _)| field)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedCertificate {
    pub file_name: String,
    pub content_type: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("certificate formatting failed")]
    Format(#[from] std::fmt::Error),
    #[error("renderer unavailable: {0}")]
    Unavailable(String),
}

pub trait CertificateRenderer: Send + Sync {
    fn render(&self, document: &CertificateDocument) -> Result<RenderedCertificate, RenderError>;
}

/// Plain-text rendering of the nine USMCA data elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCertificateRenderer;

fn write_party(out: &mut String, heading: &str, party: &PartyBlock) -> std::fmt::Result {
    writeln!(out, "{heading}")?;
    writeln!(out, "  Name:    {}", party.name)?;
    writeln!(out, "  Address: {}", party.address)?;
    writeln!(out, "  Country: {}", party.country)?;
    writeln!(out, "  Tax ID:  {}", party.tax_id)
}

impl CertificateRenderer for TextCertificateRenderer {
    fn render(&self, document: &CertificateDocument) -> Result<RenderedCertificate, RenderError> {
        let mut out = String::new();
        writeln!(out, "USMCA CERTIFICATION OF ORIGIN")?;
        writeln!(out, "Certificate No.: {}", document.certificate_number)?;
        writeln!(out)?;
        write_party(&mut out, "1. Exporter", &document.exporter)?;
        write_party(&mut out, "2. Importer", &document.importer)?;
        writeln!(out, "3. Description of Good: {}", document.product_description)?;
        writeln!(
            out,
            "4. HS Tariff Classification: {} ({})",
            document.hs_code, document.hs_description
        )?;
        writeln!(
            out,
            "5. Country of Manufacture: {}",
            document.manufacturing_location
        )?;
        writeln!(
            out,
            "6. Blanket Period: {} to {}",
            document.blanket_start, document.blanket_end
        )?;
        writeln!(out, "7. Component Origins:")?;
        for component in &document.components {
            writeln!(
                out,
                "  - {:<4} {:>6.2}%  {}",
                component.country_code(),
                component.value_percentage,
                component.description
            )?;
        }
        writeln!(
            out,
            "8. Authorized Signature: {}, {}",
            document.signatory_name, document.signatory_title
        )?;
        writeln!(out, "9. Date: {}", document.signature_date)?;
        if document.trust_verified {
            writeln!(out, "Verified by issuing authority")?;
        }

        let file_stem = if document.certificate_number == PLACEHOLDER {
            "usmca-certificate".to_string()
        } else {
            document.certificate_number.to_ascii_lowercase()
        };

        Ok(RenderedCertificate {
            file_name: format!("{file_stem}.txt"),
            content_type: "text/plain; charset=utf-8".to_string(),
            body: out,
        })
    }
}

use super::domain::ComponentOrigin;
use super::registry::ComponentRegistry;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

#[derive(Debug)]
pub enum BomImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidPercentage { line: u64, value: String },
    Empty,
}

impl std::fmt::Display for BomImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BomImportError::Io(err) => write!(f, "failed to read bill of materials: {}", err),
            BomImportError::Csv(err) => write!(f, "invalid bill of materials CSV: {}", err),
            BomImportError::InvalidPercentage { line, value } => write!(
                f,
                "line {}: '{}' is not a valid value percentage",
                line, value
            ),
            BomImportError::Empty => write!(f, "bill of materials contains no components"),
        }
    }
}

impl std::error::Error for BomImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BomImportError::Io(err) => Some(err),
            BomImportError::Csv(err) => Some(err),
            BomImportError::InvalidPercentage { .. } | BomImportError::Empty => None,
        }
    }
}

impl From<std::io::Error> for BomImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for BomImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

#[derive(Debug, Deserialize)]
struct BomRow {
    #[serde(rename = "Origin Country")]
    origin_country: String,
    #[serde(rename = "Value Percentage")]
    value_percentage: String,
    #[serde(rename = "Description", default)]
    description: String,
}

/// Reads component origins from a CSV export with
/// `Origin Country`, `Value Percentage`, `Description` columns.
pub struct BomImporter;

impl BomImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<ComponentRegistry, BomImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<ComponentRegistry, BomImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let mut components = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let row: BomRow = record.deserialize(Some(&headers))?;
            if row.origin_country.is_empty() && row.value_percentage.is_empty() {
                continue;
            }

            let cleaned = row.value_percentage.trim_end_matches('%').trim();
            let value_percentage = cleaned
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| BomImportError::InvalidPercentage {
                    line: record.position().map(|pos| pos.line()).unwrap_or_default(),
                    value: row.value_percentage.clone(),
                })?;

            components.push(ComponentOrigin {
                origin_country: row.origin_country,
                value_percentage,
                description: row.description,
            });
        }

        if components.is_empty() {
            return Err(BomImportError::Empty);
        }

        Ok(ComponentRegistry::from_components(components))
    }
}

//! Component origin declarations and the regional value content calculation.

mod bom;
pub mod calculator;
pub mod domain;
pub mod registry;

pub use bom::{BomImportError, BomImporter};
pub use calculator::{
    ContentCompleteness, RegionalContentCalculator, RegionalContentResult, DEFAULT_THRESHOLD,
};
pub use domain::{ComponentOrigin, HsCode, HsCodeError, TradeBloc};
pub use registry::{ComponentField, ComponentRegistry, RegistryError};

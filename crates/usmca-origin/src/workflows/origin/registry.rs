use serde::{Deserialize, Serialize};

use super::domain::ComponentOrigin;

/// Editable field of a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentField {
    OriginCountry,
    ValuePercentage,
    Description,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("component index {index} is out of range (registry holds {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("at least one component must remain in the registry")]
    LastComponent,
}

/// Ordered bill-of-materials origin declaration for a single product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentRegistry {
    components: Vec<ComponentOrigin>,
}

impl ComponentRegistry {
    /// Starts with a single placeholder row, mirroring an empty form.
    pub fn new() -> Self {
        Self {
            components: vec![ComponentOrigin::placeholder()],
        }
    }

    pub fn from_components(components: Vec<ComponentOrigin>) -> Self {
        Self { components }
    }

    pub fn components(&self) -> &[ComponentOrigin] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn add_component(&mut self) -> usize {
        self.components.push(ComponentOrigin::placeholder());
        self.components.len() - 1
    }

    pub fn remove_component(&mut self, index: usize) -> Result<ComponentOrigin, RegistryError> {
        self.check_index(index)?;
        if self.components.len() == 1 {
            return Err(RegistryError::LastComponent);
        }
        Ok(self.components.remove(index))
    }

    pub fn update_component(
        &mut self,
        index: usize,
        field: ComponentField,
        value: &str,
    ) -> Result<(), RegistryError> {
        self.check_index(index)?;
        let component = &mut self.components[index];
        match field {
            ComponentField::OriginCountry => component.origin_country = value.to_string(),
            ComponentField::Description => component.description = value.to_string(),
            ComponentField::ValuePercentage => {
                component.value_percentage = coerce_percentage(value)
            }
        }
        Ok(())
    }

    pub fn total_percentage(&self) -> f64 {
        self.components
            .iter()
            .map(|component| component.value_percentage)
            .sum()
    }

    fn check_index(&self, index: usize) -> Result<(), RegistryError> {
        if index >= self.components.len() {
            return Err(RegistryError::IndexOutOfRange {
                index,
                len: self.components.len(),
            });
        }
        Ok(())
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Unparseable or non-finite input becomes 0; range checks happen at stage validation.
fn coerce_percentage(raw: &str) -> f64 {
    raw.trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registry_holds_one_placeholder() {
        let registry = ComponentRegistry::new();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.components()[0], ComponentOrigin::placeholder());
        assert_eq!(registry.total_percentage(), 0.0);
    }

    #[test]
    fn removing_the_last_component_is_rejected() {
        let mut registry = ComponentRegistry::new();
        assert_eq!(
            registry.remove_component(0),
            Err(RegistryError::LastComponent)
        );

        registry.add_component();
        assert!(registry.remove_component(1).is_ok());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn out_of_range_indices_are_rejected() {
        let mut registry = ComponentRegistry::new();
        assert_eq!(
            registry.update_component(3, ComponentField::Description, "Steel"),
            Err(RegistryError::IndexOutOfRange { index: 3, len: 1 })
        );
        assert_eq!(
            registry.remove_component(1),
            Err(RegistryError::IndexOutOfRange { index: 1, len: 1 })
        );
    }

    #[test]
    fn percentage_updates_are_coerced_to_numbers() {
        let mut registry = ComponentRegistry::new();
        registry
            .update_component(0, ComponentField::ValuePercentage, " 42.5% ")
            .expect("index valid");
        assert_eq!(registry.components()[0].value_percentage, 42.5);

        registry
            .update_component(0, ComponentField::ValuePercentage, "forty")
            .expect("index valid");
        assert_eq!(registry.components()[0].value_percentage, 0.0);

        registry
            .update_component(0, ComponentField::ValuePercentage, "NaN")
            .expect("index valid");
        assert_eq!(registry.components()[0].value_percentage, 0.0);
    }

    #[test]
    fn text_fields_are_stored_verbatim() {
        let mut registry = ComponentRegistry::new();
        registry
            .update_component(0, ComponentField::OriginCountry, "mx")
            .expect("index valid");
        registry
            .update_component(0, ComponentField::Description, "Wiring harness")
            .expect("index valid");

        let component = &registry.components()[0];
        assert_eq!(component.origin_country, "mx");
        assert_eq!(component.country_code(), "MX");
        assert_eq!(component.description, "Wiring harness");
    }
}

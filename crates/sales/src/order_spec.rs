//! Order specification: the quantity map stored in the opportunity's
//! specification cell, and the auto value derived from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use sheetcrm_core::{QuantityBehavior, SystemConfig};

/// Ordered items keyed by their SystemConfig value.
///
/// Stored as a JSON object (`{"sensor":3,"setup":1}`). Older rows carry a
/// comma-separated list of item values; each listed item reads as quantity 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderSpecification {
    items: BTreeMap<String, u32>,
}

impl OrderSpecification {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cell(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Self::default();
        }
        if text.starts_with('{') {
            if let Ok(items) = serde_json::from_str::<BTreeMap<String, u32>>(text) {
                return Self { items }.without_zeroes();
            }
        }
        let items = text
            .split([',', '、'])
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| (item.to_string(), 1))
            .collect();
        Self { items }
    }

    /// JSON form written back to the store; empty specs write an empty cell.
    pub fn to_cell(&self) -> String {
        if self.items.is_empty() {
            return String::new();
        }
        serde_json::to_string(&self.items).unwrap_or_default()
    }

    /// Set the quantity of an item; zero removes it.
    pub fn set(&mut self, item: impl Into<String>, quantity: u32) {
        let item = item.into();
        if quantity == 0 {
            self.items.remove(&item);
        } else {
            self.items.insert(item, quantity);
        }
    }

    pub fn quantity(&self, item: &str) -> u32 {
        self.items.get(item).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.items.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Value implied by configured prices: per-unit items multiply by the
    /// quantity, flat items count once. Unpriced or unknown items add nothing.
    pub fn auto_value(&self, config: &SystemConfig, category: &str) -> f64 {
        self.iter()
            .filter_map(|(value, quantity)| {
                let item = config.item(category, value)?;
                let price = item.price.filter(|p| *p > 0.0)?;
                Some(match item.behavior {
                    Some(QuantityBehavior::PerUnit) => price * f64::from(quantity),
                    _ => price,
                })
            })
            .sum()
    }

    fn without_zeroes(mut self) -> Self {
        self.items.retain(|_, quantity| *quantity > 0);
        self
    }
}

/// Render a value the way the value cell stores it (no separators, no
/// fraction when whole).
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SystemConfig {
        let rows: Vec<Vec<String>> = [
            ["order_specification", "sensor", "Sensor", "1", "", "1,200", "allow_quantity"],
            ["order_specification", "setup", "Setup", "2", "", "5000", "boolean"],
            ["order_specification", "manual", "Manual", "3", "", "", "boolean"],
        ]
        .iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect();
        SystemConfig::from_rows(&rows)
    }

    #[test]
    fn json_cells_parse_and_drop_zero_quantities() {
        let spec = OrderSpecification::from_cell(r#"{"sensor":3,"setup":1,"manual":0}"#);
        assert_eq!(spec.quantity("sensor"), 3);
        assert_eq!(spec.quantity("manual"), 0);
        assert_eq!(spec.to_cell(), r#"{"sensor":3,"setup":1}"#);
    }

    #[test]
    fn legacy_text_cells_read_as_single_items() {
        let spec = OrderSpecification::from_cell("sensor, setup");
        assert_eq!(spec.quantity("sensor"), 1);
        assert_eq!(spec.quantity("setup"), 1);
        assert!(OrderSpecification::from_cell("  ").is_empty());
    }

    #[test]
    fn auto_value_applies_behavior() {
        let mut spec = OrderSpecification::new();
        spec.set("sensor", 3);
        spec.set("setup", 4);
        spec.set("manual", 2);
        spec.set("unknown", 9);
        // 3 x 1200 per unit, setup counted once, unpriced and unknown ignored.
        assert_eq!(spec.auto_value(&config(), "order_specification"), 8600.0);
    }

    #[test]
    fn set_zero_removes_item() {
        let mut spec = OrderSpecification::from_cell(r#"{"sensor":2}"#);
        spec.set("sensor", 0);
        assert!(spec.is_empty());
        assert_eq!(spec.to_cell(), "");
    }

    #[test]
    fn values_format_without_separators() {
        assert_eq!(format_value(8600.0), "8600");
        assert_eq!(format_value(12.5), "12.50");
    }
}

//! SystemConfig option sets.
//!
//! The SystemConfig table maps a category name to an ordered list of options.
//! Most categories are plain enumerations (stages, ratings, sources) whose
//! options carry a display label; order-specification items additionally carry
//! a unit price and a quantity behavior.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::row::{cell, parse_amount};

/// Column layout of the SystemConfig table.
pub mod columns {
    pub const CATEGORY: usize = 0;
    pub const VALUE: usize = 1;
    pub const LABEL: usize = 2;
    pub const ORDER: usize = 3;
    pub const COLOR: usize = 4;
    pub const PRICE: usize = 5;
    pub const BEHAVIOR: usize = 6;
    pub const COUNT: usize = 7;
    pub const LAST: char = 'G';
}

/// Quantity behavior of an order-specification item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityBehavior {
    /// Price is multiplied by the ordered quantity.
    PerUnit,
    /// Price applies once when the item is selected (`boolean` options).
    Flat,
}

impl QuantityBehavior {
    fn from_cell(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "" => None,
            "allow_quantity" | "per_unit" | "quantity" => Some(Self::PerUnit),
            _ => Some(Self::Flat),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigItem {
    pub value: String,
    pub label: String,
    pub order: i64,
    pub color: Option<String>,
    pub price: Option<f64>,
    pub behavior: Option<QuantityBehavior>,
}

impl ConfigItem {
    /// Label shown to users, falling back to the raw value.
    pub fn display(&self) -> &str {
        if self.label.is_empty() {
            &self.value
        } else {
            &self.label
        }
    }
}

/// Snapshot of all SystemConfig categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SystemConfig {
    categories: BTreeMap<String, Vec<ConfigItem>>,
}

impl SystemConfig {
    /// Build from raw rows. Rows without a category or value are skipped;
    /// items keep their configured order (ties keep row order).
    pub fn from_rows(rows: &[Vec<String>]) -> Self {
        let mut categories: BTreeMap<String, Vec<ConfigItem>> = BTreeMap::new();

        for row in rows {
            let category = cell(row, columns::CATEGORY).trim();
            let value = cell(row, columns::VALUE).trim();
            if category.is_empty() || value.is_empty() {
                continue;
            }
            let color = cell(row, columns::COLOR).trim();
            categories
                .entry(category.to_string())
                .or_default()
                .push(ConfigItem {
                    value: value.to_string(),
                    label: cell(row, columns::LABEL).trim().to_string(),
                    order: cell(row, columns::ORDER).trim().parse().unwrap_or(i64::MAX),
                    color: (!color.is_empty()).then(|| color.to_string()),
                    price: parse_amount(cell(row, columns::PRICE)),
                    behavior: QuantityBehavior::from_cell(cell(row, columns::BEHAVIOR)),
                });
        }

        for items in categories.values_mut() {
            items.sort_by_key(|item| item.order);
        }

        Self { categories }
    }

    pub fn items(&self, category: &str) -> &[ConfigItem] {
        self.categories
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn item(&self, category: &str, value: &str) -> Option<&ConfigItem> {
        self.items(category).iter().find(|item| item.value == value)
    }

    /// Display label for `value`, or the value itself when unconfigured.
    /// Blank values render as `N/A`.
    pub fn label<'a>(&'a self, category: &str, value: &'a str) -> &'a str {
        match self.item(category, value) {
            Some(item) => item.display(),
            None if value.is_empty() => "N/A",
            None => value,
        }
    }

    /// First configured value of a category.
    pub fn first_value(&self, category: &str) -> Option<&str> {
        self.items(category).first().map(|item| item.value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn sample() -> SystemConfig {
        SystemConfig::from_rows(&[
            row(&["opportunity_stage", "negotiation", "Negotiation", "2"]),
            row(&["opportunity_stage", "lead", "Lead", "1", "#ccc"]),
            row(&["opportunity_stage", "", "ignored"]),
            row(&["order_specification", "sensor", "Sensor", "1", "", "1,200", "allow_quantity"]),
            row(&["order_specification", "setup", "Setup fee", "2", "", "5000", "boolean"]),
            row(&["", "orphan"]),
        ])
    }

    #[test]
    fn items_follow_configured_order() {
        let config = sample();
        let stages: Vec<_> = config
            .items("opportunity_stage")
            .iter()
            .map(|i| i.value.as_str())
            .collect();
        assert_eq!(stages, vec!["lead", "negotiation"]);
        assert_eq!(config.first_value("opportunity_stage"), Some("lead"));
        assert_eq!(config.first_value("missing"), None);
    }

    #[test]
    fn labels_fall_back_to_value_then_na() {
        let config = sample();
        assert_eq!(config.label("opportunity_stage", "lead"), "Lead");
        assert_eq!(config.label("opportunity_stage", "unknown"), "unknown");
        assert_eq!(config.label("opportunity_stage", ""), "N/A");
    }

    #[test]
    fn order_items_carry_price_and_behavior() {
        let config = sample();
        let sensor = config.item("order_specification", "sensor").unwrap();
        assert_eq!(sensor.price, Some(1200.0));
        assert_eq!(sensor.behavior, Some(QuantityBehavior::PerUnit));
        let setup = config.item("order_specification", "setup").unwrap();
        assert_eq!(setup.behavior, Some(QuantityBehavior::Flat));
    }
}

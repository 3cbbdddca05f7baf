//! Configuration snapshot.
//!
//! One immutable `CrmConfig` is built at startup and handed (as `Arc<CrmConfig>`)
//! to every reader, writer and service. Nothing in the workspace reads
//! configuration from globals.

use serde::{Deserialize, Serialize};

/// Named ranges of the shared workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub companies: String,
    pub contacts: String,
    pub raw_leads: String,
    pub opportunities: String,
    pub opportunity_contacts: String,
    pub interactions: String,
    pub event_logs: String,
    pub system_config: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            companies: "Companies".to_string(),
            contacts: "Contacts".to_string(),
            raw_leads: "RawLeads".to_string(),
            opportunities: "Opportunities".to_string(),
            opportunity_contacts: "OpportunityContacts".to_string(),
            interactions: "Interactions".to_string(),
            event_logs: "EventLogs".to_string(),
            system_config: "SystemConfig".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub opportunities_per_page: usize,
    pub companies_per_page: usize,
    pub raw_leads_per_page: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            opportunities_per_page: 10,
            companies_per_page: 20,
            raw_leads_per_page: 20,
        }
    }
}

/// Pipeline sentinels and defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Stage value that marks an opportunity as won.
    pub won_stage: String,
    /// Stage used when neither the caller nor SystemConfig supplies one.
    pub fallback_stage: String,
    /// Recorder/modifier used when the caller supplies none.
    pub default_modifier: String,
    /// Event type written on system-generated interactions.
    pub system_event_type: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            won_stage: "won".to_string(),
            fallback_stage: "unclassified".to_string(),
            default_modifier: "system".to_string(),
            system_event_type: "system".to_string(),
        }
    }
}

/// SystemConfig category names consulted for labels and option sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryNames {
    pub opportunity_stage: String,
    pub customer_stage: String,
    pub engagement_rating: String,
    pub company_type: String,
    pub opportunity_source: String,
    pub opportunity_type: String,
    pub team_member: String,
    pub order_specification: String,
}

impl Default for CategoryNames {
    fn default() -> Self {
        Self {
            opportunity_stage: "opportunity_stage".to_string(),
            customer_stage: "customer_stage".to_string(),
            engagement_rating: "engagement_rating".to_string(),
            company_type: "company_type".to_string(),
            opportunity_source: "opportunity_source".to_string(),
            opportunity_type: "opportunity_type".to_string(),
            team_member: "team_member".to_string(),
            order_specification: "order_specification".to_string(),
        }
    }
}

/// Cell values of the opportunity status column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusValues {
    pub active: String,
    pub archived: String,
    pub cancelled: String,
}

impl Default for StatusValues {
    fn default() -> Self {
        Self {
            active: "active".to_string(),
            archived: "archived".to_string(),
            cancelled: "cancelled".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrmConfig {
    pub tables: TableNames,
    pub pagination: PaginationConfig,
    pub pipeline: PipelineConfig,
    pub categories: CategoryNames,
    pub statuses: StatusValues,
}

impl CrmConfig {
    /// Defaults overridden by `SHEETCRM_*` environment variables.
    ///
    /// Recognized: `SHEETCRM_WON_STAGE`, `SHEETCRM_FALLBACK_STAGE`,
    /// `SHEETCRM_DEFAULT_MODIFIER`, `SHEETCRM_OPPORTUNITIES_PER_PAGE`,
    /// `SHEETCRM_COMPANIES_PER_PAGE`. Unparseable numbers keep the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = lookup("SHEETCRM_WON_STAGE") {
            config.pipeline.won_stage = v;
        }
        if let Some(v) = lookup("SHEETCRM_FALLBACK_STAGE") {
            config.pipeline.fallback_stage = v;
        }
        if let Some(v) = lookup("SHEETCRM_DEFAULT_MODIFIER") {
            config.pipeline.default_modifier = v;
        }
        if let Some(n) = lookup("SHEETCRM_OPPORTUNITIES_PER_PAGE").and_then(|v| v.parse().ok()) {
            config.pagination.opportunities_per_page = n;
        }
        if let Some(n) = lookup("SHEETCRM_COMPANIES_PER_PAGE").and_then(|v| v.parse().ok()) {
            config.pagination.companies_per_page = n;
        }

        tracing::debug!(
            won_stage = %config.pipeline.won_stage,
            opportunities_per_page = config.pagination.opportunities_per_page,
            "configuration loaded"
        );

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn lookup_overrides_defaults() {
        let env: HashMap<&str, &str> = [
            ("SHEETCRM_WON_STAGE", "closed-won"),
            ("SHEETCRM_OPPORTUNITIES_PER_PAGE", "25"),
            ("SHEETCRM_COMPANIES_PER_PAGE", "many"),
        ]
        .into_iter()
        .collect();

        let config = CrmConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.pipeline.won_stage, "closed-won");
        assert_eq!(config.pagination.opportunities_per_page, 25);
        assert_eq!(config.pagination.companies_per_page, 20);
        assert_eq!(config.pipeline.fallback_stage, "unclassified");
    }

    #[test]
    fn partial_json_keeps_defaults_for_missing_sections() {
        let config: CrmConfig =
            serde_json::from_str(r#"{ "pipeline": { "won_stage": "signed" } }"#).unwrap();
        assert_eq!(config.pipeline.won_stage, "signed");
        assert_eq!(config.pipeline.default_modifier, "system");
        assert_eq!(config.tables, TableNames::default());
    }

    #[test]
    fn status_values_can_be_renamed() {
        let config: CrmConfig =
            serde_json::from_str(r#"{ "statuses": { "archived": "closed" } }"#).unwrap();
        assert_eq!(config.statuses.archived, "closed");
        assert_eq!(config.statuses.active, "active");
        assert_eq!(config.statuses.cancelled, "cancelled");
    }
}

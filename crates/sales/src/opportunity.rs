use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use sheetcrm_core::row::{cell, cell_string, parse_amount};
use sheetcrm_core::time::{first_timestamp, format_timestamp};
use sheetcrm_core::{DomainError, DomainResult, Entity, OpportunityId, StatusValues, SystemConfig};

use crate::order_spec::{OrderSpecification, format_value};

/// Column layout of the Opportunities range (`A:X`, 24 fixed columns).
///
/// Columns 18..=23 were appended after the first 18-column layout; their
/// positions must not move.
pub mod columns {
    pub const ID: usize = 0;
    pub const NAME: usize = 1;
    pub const COMPANY: usize = 2;
    pub const MAIN_CONTACT: usize = 3;
    pub const CONTACT_PHONE: usize = 4;
    pub const ASSIGNEE: usize = 5;
    pub const TYPE: usize = 6;
    pub const SOURCE: usize = 7;
    pub const STAGE: usize = 8;
    pub const CREATED: usize = 9;
    pub const EXPECTED_CLOSE: usize = 10;
    pub const VALUE: usize = 11;
    pub const STATUS: usize = 12;
    pub const FOLDER_LINK: usize = 13;
    pub const UPDATED: usize = 14;
    pub const NOTES: usize = 15;
    pub const LAST_MODIFIER: usize = 16;
    pub const STAGE_HISTORY: usize = 17;
    pub const PARENT_ID: usize = 18;
    pub const PROBABILITY: usize = 19;
    pub const ORDER_SPEC: usize = 20;
    pub const SALES_CHANNEL: usize = 21;
    pub const DEVICE_SCALE: usize = 22;
    pub const VALUE_MODE: usize = 23;
    pub const COUNT: usize = 24;
    pub const LAST: char = 'X';
}

/// Separator between stage-history entries.
const HISTORY_SEPARATOR: char = '\n';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpportunityStatus {
    Active,
    Archived,
    Cancelled,
    Other(String),
}

impl OpportunityStatus {
    /// Status stored in a cell, matched against the configured values.
    pub fn from_cell(text: &str, values: &StatusValues) -> Self {
        let text = text.trim();
        if text == values.active {
            Self::Active
        } else if text == values.archived {
            Self::Archived
        } else if text == values.cancelled {
            Self::Cancelled
        } else {
            Self::Other(text.to_string())
        }
    }

    pub fn to_cell(&self, values: &StatusValues) -> String {
        match self {
            Self::Active => values.active.clone(),
            Self::Archived => values.archived.clone(),
            Self::Cancelled => values.cancelled.clone(),
            Self::Other(text) => text.clone(),
        }
    }

    /// Name used at the API boundary, independent of the stored values.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Cancelled => "cancelled",
            Self::Other(text) => text,
        }
    }
}

impl Serialize for OpportunityStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OpportunityStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::from_cell(&text, &StatusValues::default()))
    }
}

/// Whether the value cell is derived from the order specification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueMode {
    #[default]
    Auto,
    Manual,
}

impl ValueMode {
    pub fn from_cell(text: &str) -> Self {
        if text.trim().eq_ignore_ascii_case("manual") {
            Self::Manual
        } else {
            Self::Auto
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }
}

/// An opportunity row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub row_index: u32,
    pub opportunity_id: OpportunityId,
    pub opportunity_name: String,
    /// Denormalized company name; resolved to a company through its normalized form.
    pub customer_company: String,
    pub main_contact: String,
    pub contact_phone: String,
    pub assignee: String,
    pub opportunity_type: String,
    pub opportunity_source: String,
    pub current_stage: String,
    pub created_time: String,
    pub expected_close_date: String,
    pub opportunity_value: String,
    pub current_status: OpportunityStatus,
    pub drive_folder_link: String,
    pub last_update_time: String,
    pub notes: String,
    pub last_modifier: String,
    pub stage_history: String,
    pub parent_opportunity_id: Option<OpportunityId>,
    pub order_probability: String,
    pub potential_specification: String,
    pub sales_channel: String,
    pub device_scale: String,
    pub value_mode: ValueMode,
}

impl Opportunity {
    pub fn from_row(row: &[String], row_index: u32, statuses: &StatusValues) -> Self {
        use columns::*;
        Self {
            row_index,
            opportunity_id: OpportunityId::new(cell_string(row, ID)),
            opportunity_name: cell_string(row, NAME),
            customer_company: cell_string(row, COMPANY),
            main_contact: cell_string(row, MAIN_CONTACT),
            contact_phone: cell_string(row, CONTACT_PHONE),
            assignee: cell_string(row, ASSIGNEE),
            opportunity_type: cell_string(row, TYPE),
            opportunity_source: cell_string(row, SOURCE),
            current_stage: cell_string(row, STAGE),
            created_time: cell_string(row, CREATED),
            expected_close_date: cell_string(row, EXPECTED_CLOSE),
            opportunity_value: cell_string(row, VALUE),
            current_status: OpportunityStatus::from_cell(cell(row, STATUS), statuses),
            drive_folder_link: cell_string(row, FOLDER_LINK),
            last_update_time: cell_string(row, UPDATED),
            notes: cell_string(row, NOTES),
            last_modifier: cell_string(row, LAST_MODIFIER),
            stage_history: cell_string(row, STAGE_HISTORY),
            parent_opportunity_id: OpportunityId::from_cell(cell(row, PARENT_ID)),
            order_probability: cell_string(row, PROBABILITY),
            potential_specification: cell_string(row, ORDER_SPEC),
            sales_channel: cell_string(row, SALES_CHANNEL),
            device_scale: cell_string(row, DEVICE_SCALE),
            value_mode: ValueMode::from_cell(cell(row, VALUE_MODE)),
        }
    }

    pub fn to_row(&self, statuses: &StatusValues) -> Vec<String> {
        vec![
            self.opportunity_id.to_string(),
            self.opportunity_name.clone(),
            self.customer_company.clone(),
            self.main_contact.clone(),
            self.contact_phone.clone(),
            self.assignee.clone(),
            self.opportunity_type.clone(),
            self.opportunity_source.clone(),
            self.current_stage.clone(),
            self.created_time.clone(),
            self.expected_close_date.clone(),
            self.opportunity_value.clone(),
            self.current_status.to_cell(statuses),
            self.drive_folder_link.clone(),
            self.last_update_time.clone(),
            self.notes.clone(),
            self.last_modifier.clone(),
            self.stage_history.clone(),
            self.parent_opportunity_id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            self.order_probability.clone(),
            self.potential_specification.clone(),
            self.sales_channel.clone(),
            self.device_scale.clone(),
            self.value_mode.as_str().to_string(),
        ]
    }

    /// Own activity time: last update, falling back to creation.
    pub fn self_activity(&self) -> Option<DateTime<Utc>> {
        first_timestamp(&[&self.last_update_time, &self.created_time])
    }

    pub fn is_archived(&self) -> bool {
        self.current_status == OpportunityStatus::Archived
    }

    /// Counts toward a company's open opportunities (neither archived nor cancelled).
    pub fn is_live(&self) -> bool {
        !matches!(
            self.current_status,
            OpportunityStatus::Archived | OpportunityStatus::Cancelled
        )
    }

    /// Numeric value; blank or unparseable cells read as zero.
    pub fn value_amount(&self) -> f64 {
        parse_amount(&self.opportunity_value).unwrap_or(0.0)
    }

    pub fn order_specification(&self) -> OrderSpecification {
        OrderSpecification::from_cell(&self.potential_specification)
    }

    /// `(stage, timestamp)` entries of the stage history, oldest first.
    pub fn stage_history_entries(&self) -> Vec<(&str, &str)> {
        self.stage_history
            .split(HISTORY_SEPARATOR)
            .filter(|entry| !entry.trim().is_empty())
            .map(|entry| entry.rsplit_once('@').unwrap_or((entry, "")))
            .collect()
    }

    fn push_stage_history(&mut self, stage: &str, stamp: &str) {
        if !self.stage_history.is_empty() {
            self.stage_history.push(HISTORY_SEPARATOR);
        }
        self.stage_history.push_str(stage);
        self.stage_history.push('@');
        self.stage_history.push_str(stamp);
    }
}

impl Entity for Opportunity {
    type Id = OpportunityId;

    fn id(&self) -> &OpportunityId {
        &self.opportunity_id
    }

    fn row_index(&self) -> u32 {
        self.row_index
    }
}

/// Caller-supplied fields of a new opportunity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpportunityDraft {
    pub opportunity_name: String,
    pub customer_company: String,
    pub main_contact: String,
    pub contact_phone: String,
    pub assignee: String,
    pub opportunity_type: String,
    pub opportunity_source: String,
    pub current_stage: String,
    pub expected_close_date: String,
    pub opportunity_value: String,
    pub notes: String,
    pub parent_opportunity_id: String,
    pub order_probability: String,
    pub potential_specification: String,
    pub sales_channel: String,
    pub device_scale: String,
}

impl OpportunityDraft {
    /// Build the 24-column record. `company_name` is the canonical name of
    /// the resolved company and `stage` the already-defaulted stage.
    pub fn into_opportunity(
        &self,
        opportunity_id: OpportunityId,
        company_name: &str,
        stage: &str,
        modifier: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Opportunity> {
        let name = self.opportunity_name.trim();
        if name.is_empty() {
            return Err(DomainError::missing_field("opportunity name"));
        }
        let stamp = format_timestamp(now);
        Ok(Opportunity {
            row_index: 0,
            opportunity_id,
            opportunity_name: name.to_string(),
            customer_company: company_name.to_string(),
            main_contact: self.main_contact.clone(),
            contact_phone: self.contact_phone.clone(),
            assignee: self.assignee.clone(),
            opportunity_type: self.opportunity_type.clone(),
            opportunity_source: self.opportunity_source.clone(),
            current_stage: stage.to_string(),
            created_time: stamp.clone(),
            expected_close_date: self.expected_close_date.clone(),
            opportunity_value: self.opportunity_value.clone(),
            current_status: OpportunityStatus::Active,
            drive_folder_link: String::new(),
            last_update_time: stamp,
            notes: self.notes.clone(),
            last_modifier: modifier.to_string(),
            stage_history: String::new(),
            parent_opportunity_id: OpportunityId::from_cell(&self.parent_opportunity_id),
            order_probability: self.order_probability.clone(),
            potential_specification: self.potential_specification.clone(),
            sales_channel: self.sales_channel.clone(),
            device_scale: self.device_scale.clone(),
            value_mode: ValueMode::Auto,
        })
    }
}

/// Partial opportunity update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpportunityPatch {
    pub opportunity_name: Option<String>,
    pub customer_company: Option<String>,
    pub main_contact: Option<String>,
    pub contact_phone: Option<String>,
    pub assignee: Option<String>,
    pub opportunity_type: Option<String>,
    pub opportunity_source: Option<String>,
    pub current_stage: Option<String>,
    pub expected_close_date: Option<String>,
    pub opportunity_value: Option<String>,
    pub current_status: Option<OpportunityStatus>,
    pub drive_folder_link: Option<String>,
    pub notes: Option<String>,
    /// `Some("")` clears the parent link.
    pub parent_opportunity_id: Option<String>,
    pub order_probability: Option<String>,
    pub potential_specification: Option<OrderSpecification>,
    pub sales_channel: Option<String>,
    pub device_scale: Option<String>,
    pub value_mode: Option<ValueMode>,
}

impl OpportunityPatch {
    /// Apply the patch.
    ///
    /// A stage change appends to the stage history. An explicit value without
    /// an explicit mode switches the opportunity to manual valuation; in auto
    /// mode a non-empty order specification recomputes the value from
    /// `config` prices. Parent links are checked separately with
    /// [`check_parent_link`].
    pub fn apply(
        &self,
        opportunity: &mut Opportunity,
        config: &SystemConfig,
        spec_category: &str,
        modifier: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let stamp = format_timestamp(now);

        if let Some(name) = &self.opportunity_name {
            let name = name.trim();
            if name.is_empty() {
                return Err(DomainError::validation("opportunity name cannot be blank"));
            }
            opportunity.opportunity_name = name.to_string();
        }

        if let Some(stage) = &self.current_stage {
            if *stage != opportunity.current_stage {
                opportunity.push_stage_history(stage, &stamp);
                opportunity.current_stage = stage.clone();
            }
        }

        let fields: [(&Option<String>, &mut String); 12] = [
            (&self.customer_company, &mut opportunity.customer_company),
            (&self.main_contact, &mut opportunity.main_contact),
            (&self.contact_phone, &mut opportunity.contact_phone),
            (&self.assignee, &mut opportunity.assignee),
            (&self.opportunity_type, &mut opportunity.opportunity_type),
            (&self.opportunity_source, &mut opportunity.opportunity_source),
            (&self.expected_close_date, &mut opportunity.expected_close_date),
            (&self.drive_folder_link, &mut opportunity.drive_folder_link),
            (&self.notes, &mut opportunity.notes),
            (&self.order_probability, &mut opportunity.order_probability),
            (&self.sales_channel, &mut opportunity.sales_channel),
            (&self.device_scale, &mut opportunity.device_scale),
        ];
        for (patch, target) in fields {
            if let Some(value) = patch {
                *target = value.clone();
            }
        }

        if let Some(status) = &self.current_status {
            opportunity.current_status = status.clone();
        }
        if let Some(parent) = &self.parent_opportunity_id {
            opportunity.parent_opportunity_id = OpportunityId::from_cell(parent);
        }
        if let Some(spec) = &self.potential_specification {
            opportunity.potential_specification = spec.to_cell();
        }

        if let Some(value) = &self.opportunity_value {
            opportunity.opportunity_value = value.replace(',', "").trim().to_string();
            opportunity.value_mode = ValueMode::Manual;
        }
        if let Some(mode) = self.value_mode {
            opportunity.value_mode = mode;
        }
        if opportunity.value_mode == ValueMode::Auto {
            let spec = opportunity.order_specification();
            if !spec.is_empty() {
                opportunity.opportunity_value = format_value(spec.auto_value(config, spec_category));
            }
        }

        opportunity.last_modifier = modifier.to_string();
        opportunity.last_update_time = stamp;
        Ok(())
    }
}

/// Reject a parent link that would make `child` its own ancestor.
///
/// Walks the parent chain of `parent` through `opportunities`; a chain that
/// already loops without passing through `child` is left alone.
pub fn check_parent_link(
    opportunities: &[Opportunity],
    child: &OpportunityId,
    parent: &OpportunityId,
) -> DomainResult<()> {
    if child == parent {
        return Err(DomainError::invariant(format!(
            "opportunity {child} cannot be its own parent"
        )));
    }

    let parents: HashMap<&OpportunityId, &OpportunityId> = opportunities
        .iter()
        .filter_map(|o| o.parent_opportunity_id.as_ref().map(|p| (&o.opportunity_id, p)))
        .collect();

    let mut seen = HashSet::new();
    let mut cursor = Some(parent);
    while let Some(current) = cursor {
        if current == child {
            return Err(DomainError::invariant(format!(
                "linking {child} under {parent} would create a cycle"
            )));
        }
        if !seen.insert(current) {
            break;
        }
        cursor = parents.get(current).copied();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn config() -> SystemConfig {
        let rows = vec![
            ["order_specification", "sensor", "Sensor", "1", "", "1000", "allow_quantity"],
            ["order_specification", "setup", "Setup", "2", "", "500", "boolean"],
        ]
        .into_iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect::<Vec<Vec<String>>>();
        SystemConfig::from_rows(&rows)
    }

    fn draft() -> OpportunityDraft {
        OpportunityDraft {
            opportunity_name: "Line retrofit".to_string(),
            customer_company: "acme".to_string(),
            assignee: "alice".to_string(),
            ..Default::default()
        }
    }

    fn sample() -> Opportunity {
        draft()
            .into_opportunity(OpportunityId::new("OPP1"), "Acme Co., Ltd.", "lead", "alice", now())
            .unwrap()
    }

    fn with_parent(id: &str, parent: Option<&str>) -> Opportunity {
        let mut opp = sample();
        opp.opportunity_id = OpportunityId::new(id);
        opp.parent_opportunity_id = parent.map(OpportunityId::new);
        opp
    }

    #[test]
    fn new_opportunity_uses_canonical_company_and_defaults() {
        let opp = sample();
        assert_eq!(opp.customer_company, "Acme Co., Ltd.");
        assert_eq!(opp.current_status, OpportunityStatus::Active);
        assert_eq!(opp.value_mode, ValueMode::Auto);
        assert_eq!(opp.created_time, opp.last_update_time);

        let row = opp.to_row(&StatusValues::default());
        assert_eq!(row.len(), columns::COUNT);
        assert_eq!(row[columns::STATUS], "active");
        assert_eq!(row[columns::VALUE_MODE], "auto");
    }

    #[test]
    fn eighteen_column_rows_still_parse() {
        let statuses = StatusValues::default();
        let mut row = sample().to_row(&statuses);
        row.truncate(18);
        let opp = Opportunity::from_row(&row, 5, &statuses);
        assert_eq!(opp.parent_opportunity_id, None);
        assert_eq!(opp.value_mode, ValueMode::Auto);
        assert_eq!(opp.row_index, 5);
    }

    #[test]
    fn stage_change_appends_history() {
        let mut opp = sample();
        let patch = OpportunityPatch {
            current_stage: Some("proposal".to_string()),
            ..Default::default()
        };
        patch.apply(&mut opp, &config(), "order_specification", "bob", now()).unwrap();
        patch.apply(&mut opp, &config(), "order_specification", "bob", now()).unwrap();

        assert_eq!(opp.current_stage, "proposal");
        assert_eq!(
            opp.stage_history_entries(),
            vec![("proposal", "2024-06-01T08:00:00.000Z")]
        );
    }

    #[test]
    fn explicit_value_switches_to_manual() {
        let mut opp = sample();
        OpportunityPatch {
            opportunity_value: Some("1,500,000".to_string()),
            potential_specification: Some(OrderSpecification::from_cell(r#"{"sensor":2}"#)),
            ..Default::default()
        }
        .apply(&mut opp, &config(), "order_specification", "bob", now())
        .unwrap();

        assert_eq!(opp.value_mode, ValueMode::Manual);
        assert_eq!(opp.opportunity_value, "1500000");
        assert_eq!(opp.value_amount(), 1_500_000.0);
    }

    #[test]
    fn auto_mode_recomputes_from_specification() {
        let mut opp = sample();
        let mut spec = OrderSpecification::new();
        spec.set("sensor", 3);
        spec.set("setup", 2);
        OpportunityPatch {
            potential_specification: Some(spec),
            ..Default::default()
        }
        .apply(&mut opp, &config(), "order_specification", "bob", now())
        .unwrap();

        assert_eq!(opp.value_mode, ValueMode::Auto);
        assert_eq!(opp.opportunity_value, "3500");
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut opp = sample();
        let result = OpportunityPatch {
            opportunity_name: Some(" ".to_string()),
            ..Default::default()
        }
        .apply(&mut opp, &config(), "order_specification", "bob", now());
        assert!(result.is_err());
    }

    #[test]
    fn live_excludes_archived_and_cancelled() {
        let mut opp = sample();
        assert!(opp.is_live());
        opp.current_status = OpportunityStatus::Cancelled;
        assert!(!opp.is_live());
        assert!(!opp.is_archived());
        opp.current_status = OpportunityStatus::from_cell("archived", &StatusValues::default());
        assert!(opp.is_archived());
    }

    #[test]
    fn status_cells_follow_configured_values() {
        let statuses = StatusValues {
            archived: "closed".to_string(),
            ..Default::default()
        };
        assert_eq!(OpportunityStatus::from_cell(" closed ", &statuses), OpportunityStatus::Archived);
        assert_eq!(
            OpportunityStatus::from_cell("archived", &statuses),
            OpportunityStatus::Other("archived".to_string())
        );

        let mut opp = sample();
        opp.current_status = OpportunityStatus::Archived;
        let row = opp.to_row(&statuses);
        assert_eq!(row[columns::STATUS], "closed");
        assert_eq!(serde_json::to_value(&opp).unwrap()["currentStatus"], "archived");
    }

    #[test]
    fn parent_links_reject_cycles() {
        // OPP1 <- OPP2 <- OPP3
        let tree = vec![
            with_parent("OPP1", None),
            with_parent("OPP2", Some("OPP1")),
            with_parent("OPP3", Some("OPP2")),
        ];
        let id = OpportunityId::new;

        assert!(check_parent_link(&tree, &id("OPP1"), &id("OPP3")).is_err());
        assert!(check_parent_link(&tree, &id("OPP2"), &id("OPP2")).is_err());
        assert!(check_parent_link(&tree, &id("OPP3"), &id("OPP1")).is_ok());
        assert!(check_parent_link(&tree, &id("OPP4"), &id("OPP3")).is_ok());
    }
}

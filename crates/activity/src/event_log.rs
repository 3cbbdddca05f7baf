use chrono::{DateTime, Utc};
use serde::Serialize;

use sheetcrm_core::row::{cell, cell_string};
use sheetcrm_core::time::first_timestamp;
use sheetcrm_core::{CompanyId, Entity, EventLogId, OpportunityId};

/// Column layout of the event-log range (`A:H`).
pub mod columns {
    pub const ID: usize = 0;
    pub const NAME: usize = 1;
    pub const OPPORTUNITY_ID: usize = 2;
    pub const COMPANY_ID: usize = 3;
    pub const CREATOR: usize = 4;
    pub const CREATED: usize = 5;
    pub const LAST_MODIFIED: usize = 6;
    pub const CONTENT: usize = 7;
    pub const COUNT: usize = 8;
    pub const LAST: char = 'H';
}

/// A structured event report filed against a company and/or an opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLog {
    pub row_index: u32,
    pub event_id: EventLogId,
    pub event_name: String,
    pub opportunity_id: Option<OpportunityId>,
    pub company_id: Option<CompanyId>,
    pub creator: String,
    pub created_time: String,
    pub last_modified_time: String,
    pub content: String,
}

impl EventLog {
    pub fn from_row(row: &[String], row_index: u32) -> Self {
        use columns::*;
        Self {
            row_index,
            event_id: EventLogId::new(cell_string(row, ID)),
            event_name: cell_string(row, NAME),
            opportunity_id: OpportunityId::from_cell(cell(row, OPPORTUNITY_ID)),
            company_id: CompanyId::from_cell(cell(row, COMPANY_ID)),
            creator: cell_string(row, CREATOR),
            created_time: cell_string(row, CREATED),
            last_modified_time: cell_string(row, LAST_MODIFIED),
            content: cell_string(row, CONTENT),
        }
    }

    /// Filed against the company alone, with no opportunity attached.
    pub fn is_company_scoped(&self, company_id: &CompanyId) -> bool {
        self.opportunity_id.is_none() && self.company_id.as_ref() == Some(company_id)
    }

    /// Sort key: last modification, falling back to creation.
    pub fn sort_time(&self) -> Option<DateTime<Utc>> {
        first_timestamp(&[&self.last_modified_time, &self.created_time])
    }
}

impl Entity for EventLog {
    type Id = EventLogId;

    fn id(&self) -> &EventLogId {
        &self.event_id
    }

    fn row_index(&self) -> u32 {
        self.row_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn company_scope_requires_no_opportunity() {
        let company = CompanyId::new("COMP1");
        let standalone = EventLog::from_row(&row(&["EVT1", "Visit", "", "COMP1"]), 2);
        let attached = EventLog::from_row(&row(&["EVT2", "Demo", "OPP1", "COMP1"]), 3);

        assert!(standalone.is_company_scoped(&company));
        assert!(!attached.is_company_scoped(&company));
        assert!(!standalone.is_company_scoped(&CompanyId::new("COMP2")));
    }

    #[test]
    fn sort_time_falls_back_to_created() {
        let log = EventLog::from_row(&row(&["EVT1", "Visit", "", "COMP1", "amy", "2024-02-01"]), 2);
        assert_eq!(log.sort_time(), sheetcrm_core::time::parse_timestamp("2024-02-01"));
    }

    #[test]
    fn serializes_camel_case() {
        let log = EventLog::from_row(&row(&["EVT1", "Visit"]), 2);
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["eventName"], "Visit");
        assert!(json["opportunityId"].is_null());
    }
}

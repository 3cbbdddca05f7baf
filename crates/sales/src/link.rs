use chrono::{DateTime, Utc};
use serde::Serialize;

use sheetcrm_core::row::cell_string;
use sheetcrm_core::time::format_timestamp;
use sheetcrm_core::{ContactId, Entity, LinkId, OpportunityId};

/// Column layout of the opportunity-contact range (`A:F`).
pub mod columns {
    pub const ID: usize = 0;
    pub const OPPORTUNITY_ID: usize = 1;
    pub const CONTACT_ID: usize = 2;
    pub const CREATED: usize = 3;
    pub const STATUS: usize = 4;
    pub const CREATOR: usize = 5;
    pub const COUNT: usize = 6;
    pub const LAST: char = 'F';
}

pub const LINK_ACTIVE: &str = "active";

/// Association of a contact with an opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityContactLink {
    pub row_index: u32,
    pub link_id: LinkId,
    pub opportunity_id: OpportunityId,
    pub contact_id: ContactId,
    pub created_time: String,
    pub status: String,
    pub creator: String,
}

impl OpportunityContactLink {
    pub fn new(
        link_id: LinkId,
        opportunity_id: OpportunityId,
        contact_id: ContactId,
        creator: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            row_index: 0,
            link_id,
            opportunity_id,
            contact_id,
            created_time: format_timestamp(now),
            status: LINK_ACTIVE.to_string(),
            creator: creator.to_string(),
        }
    }

    pub fn from_row(row: &[String], row_index: u32) -> Self {
        use columns::*;
        Self {
            row_index,
            link_id: LinkId::new(cell_string(row, ID)),
            opportunity_id: OpportunityId::new(cell_string(row, OPPORTUNITY_ID)),
            contact_id: ContactId::new(cell_string(row, CONTACT_ID)),
            created_time: cell_string(row, CREATED),
            status: cell_string(row, STATUS),
            creator: cell_string(row, CREATOR),
        }
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.link_id.to_string(),
            self.opportunity_id.to_string(),
            self.contact_id.to_string(),
            self.created_time.clone(),
            self.status.clone(),
            self.creator.clone(),
        ]
    }

    pub fn is_active(&self) -> bool {
        let status = self.status.trim();
        status.is_empty() || status == LINK_ACTIVE
    }

    pub fn joins(&self, opportunity_id: &OpportunityId, contact_id: &ContactId) -> bool {
        self.opportunity_id == *opportunity_id && self.contact_id == *contact_id
    }
}

impl Entity for OpportunityContactLink {
    type Id = LinkId;

    fn id(&self) -> &LinkId {
        &self.link_id
    }

    fn row_index(&self) -> u32 {
        self.row_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn new_links_are_active() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let link = OpportunityContactLink::new(
            LinkId::new("LNK-1"),
            OpportunityId::new("OPP1"),
            ContactId::new("CON1"),
            "alice",
            now,
        );
        assert!(link.is_active());
        assert!(link.joins(&OpportunityId::new("OPP1"), &ContactId::new("CON1")));

        let parsed = OpportunityContactLink::from_row(&link.to_row(), 4);
        assert_eq!(parsed.row_index, 4);
        assert_eq!(parsed.status, "active");
    }

    #[test]
    fn blank_status_reads_as_active() {
        let row: Vec<String> = ["LNK-1", "OPP1", "CON1"].iter().map(|c| c.to_string()).collect();
        assert!(OpportunityContactLink::from_row(&row, 2).is_active());
    }
}

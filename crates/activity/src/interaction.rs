use chrono::{DateTime, Utc};
use serde::Serialize;

use sheetcrm_core::row::{cell, cell_string};
use sheetcrm_core::time::{first_timestamp, format_timestamp};
use sheetcrm_core::{CompanyId, DomainError, DomainResult, Entity, InteractionId, OpportunityId};

/// Column layout of the Interactions range (`A:K`).
pub mod columns {
    pub const ID: usize = 0;
    pub const OPPORTUNITY_ID: usize = 1;
    pub const INTERACTION_TIME: usize = 2;
    pub const EVENT_TYPE: usize = 3;
    pub const TITLE: usize = 4;
    pub const SUMMARY: usize = 5;
    pub const PARTICIPANTS: usize = 6;
    pub const NEXT_ACTION: usize = 7;
    pub const RECORDER: usize = 8;
    pub const CREATED: usize = 9;
    pub const COMPANY_ID: usize = 10;
    pub const COUNT: usize = 11;
    pub const LAST: char = 'K';
}

/// What an interaction is recorded against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InteractionSubject {
    Opportunity(OpportunityId),
    Company(CompanyId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub row_index: u32,
    pub interaction_id: InteractionId,
    pub opportunity_id: Option<OpportunityId>,
    pub interaction_time: String,
    pub event_type: String,
    pub event_title: String,
    pub content_summary: String,
    pub participants: String,
    pub next_action: String,
    pub recorder: String,
    pub created_time: String,
    pub company_id: Option<CompanyId>,
}

impl Interaction {
    pub fn from_row(row: &[String], row_index: u32) -> Self {
        use columns::*;
        Self {
            row_index,
            interaction_id: InteractionId::new(cell_string(row, ID)),
            opportunity_id: OpportunityId::from_cell(cell(row, OPPORTUNITY_ID)),
            interaction_time: cell_string(row, INTERACTION_TIME),
            event_type: cell_string(row, EVENT_TYPE),
            event_title: cell_string(row, TITLE),
            content_summary: cell_string(row, SUMMARY),
            participants: cell_string(row, PARTICIPANTS),
            next_action: cell_string(row, NEXT_ACTION),
            recorder: cell_string(row, RECORDER),
            created_time: cell_string(row, CREATED),
            company_id: CompanyId::from_cell(cell(row, COMPANY_ID)),
        }
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.interaction_id.to_string(),
            self.opportunity_id.as_ref().map(ToString::to_string).unwrap_or_default(),
            self.interaction_time.clone(),
            self.event_type.clone(),
            self.event_title.clone(),
            self.content_summary.clone(),
            self.participants.clone(),
            self.next_action.clone(),
            self.recorder.clone(),
            self.created_time.clone(),
            self.company_id.as_ref().map(ToString::to_string).unwrap_or_default(),
        ]
    }

    /// When the interaction happened: its interaction time, else its creation time.
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        first_timestamp(&[&self.interaction_time, &self.created_time])
    }

    pub fn is_about(&self, subject: &InteractionSubject) -> bool {
        match subject {
            InteractionSubject::Opportunity(id) => self.opportunity_id.as_ref() == Some(id),
            InteractionSubject::Company(id) => self.company_id.as_ref() == Some(id),
        }
    }
}

impl Entity for Interaction {
    type Id = InteractionId;

    fn id(&self) -> &InteractionId {
        &self.interaction_id
    }

    fn row_index(&self) -> u32 {
        self.row_index
    }
}

/// An interaction to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInteraction {
    pub subject: InteractionSubject,
    pub event_type: String,
    pub event_title: String,
    pub content_summary: String,
    pub participants: String,
    pub next_action: String,
    pub recorder: String,
    /// Defaults to the creation time.
    pub interaction_time: Option<DateTime<Utc>>,
}

impl NewInteraction {
    pub fn new(
        subject: InteractionSubject,
        event_type: impl Into<String>,
        event_title: impl Into<String>,
        content_summary: impl Into<String>,
        recorder: impl Into<String>,
    ) -> Self {
        Self {
            subject,
            event_type: event_type.into(),
            event_title: event_title.into(),
            content_summary: content_summary.into(),
            participants: String::new(),
            next_action: String::new(),
            recorder: recorder.into(),
            interaction_time: None,
        }
    }

    pub fn into_interaction(self, interaction_id: InteractionId, now: DateTime<Utc>) -> DomainResult<Interaction> {
        if self.event_title.trim().is_empty() {
            return Err(DomainError::missing_field("interaction title"));
        }
        let (opportunity_id, company_id) = match self.subject {
            InteractionSubject::Opportunity(id) => (Some(id), None),
            InteractionSubject::Company(id) => (None, Some(id)),
        };
        let created = format_timestamp(now);
        Ok(Interaction {
            row_index: 0,
            interaction_id,
            opportunity_id,
            interaction_time: self
                .interaction_time
                .map(format_timestamp)
                .unwrap_or_else(|| created.clone()),
            event_type: self.event_type,
            event_title: self.event_title,
            content_summary: self.content_summary,
            participants: self.participants,
            next_action: self.next_action,
            recorder: self.recorder,
            created_time: created,
            company_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 3, 3, 3, 3).unwrap()
    }

    #[test]
    fn company_interactions_leave_opportunity_blank() {
        let interaction = NewInteraction::new(
            InteractionSubject::Company(CompanyId::new("COMP1")),
            "system",
            "Company updated",
            "stage: Lead -> Active",
            "alice",
        )
        .into_interaction(InteractionId::new("INT-1"), now())
        .unwrap();

        let row = interaction.to_row();
        assert_eq!(row.len(), columns::COUNT);
        assert_eq!(row[columns::OPPORTUNITY_ID], "");
        assert_eq!(row[columns::COMPANY_ID], "COMP1");
        assert_eq!(row[columns::INTERACTION_TIME], row[columns::CREATED]);
        assert!(interaction.is_about(&InteractionSubject::Company(CompanyId::new("COMP1"))));
    }

    #[test]
    fn occurred_at_prefers_interaction_time() {
        let row: Vec<String> = ["INT-1", "OPP1", "2024-01-05", "call", "Call", "", "", "", "bob", "2024-01-09"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let interaction = Interaction::from_row(&row, 2);
        assert_eq!(
            interaction.occurred_at(),
            Some(Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap())
        );
        assert_eq!(interaction.company_id, None);
        assert_eq!(interaction.opportunity_id, Some(OpportunityId::new("OPP1")));
    }

    #[test]
    fn title_is_required() {
        let result = NewInteraction::new(
            InteractionSubject::Opportunity(OpportunityId::new("OPP1")),
            "system",
            " ",
            "",
            "alice",
        )
        .into_interaction(InteractionId::new("INT-1"), now());
        assert!(result.is_err());
    }
}

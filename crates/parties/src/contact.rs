use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use sheetcrm_core::row::{cell, cell_string};
use sheetcrm_core::time::format_timestamp;
use sheetcrm_core::{CompanyId, ContactId, DomainError, DomainResult, Entity};

/// Column layout of the Contacts range (`A:M`).
pub mod columns {
    pub const ID: usize = 0;
    pub const SOURCE: usize = 1;
    pub const NAME: usize = 2;
    pub const COMPANY_ID: usize = 3;
    pub const DEPARTMENT: usize = 4;
    pub const POSITION: usize = 5;
    pub const MOBILE: usize = 6;
    pub const PHONE: usize = 7;
    pub const EMAIL: usize = 8;
    pub const CREATED: usize = 9;
    pub const UPDATED: usize = 10;
    pub const CREATOR: usize = 11;
    pub const LAST_MODIFIER: usize = 12;
    pub const COUNT: usize = 13;
    pub const LAST: char = 'M';
}

/// Column layout of the raw-lead range (`A:J`).
pub mod lead_columns {
    pub const CREATED: usize = 0;
    pub const NAME: usize = 1;
    pub const COMPANY: usize = 2;
    pub const POSITION: usize = 3;
    pub const DEPARTMENT: usize = 4;
    pub const PHONE: usize = 5;
    pub const MOBILE: usize = 6;
    pub const EMAIL: usize = 7;
    pub const ADDRESS: usize = 8;
    pub const STATUS: usize = 9;
    pub const COUNT: usize = 10;
    pub const LAST: char = 'J';
}

const MANUAL_MARKER: &str = "MANUAL";
const LEAD_MARKER_PREFIX: &str = "BC-";

/// Where a contact came from: typed in by hand, or filed from a raw-lead row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactSource {
    Manual,
    Lead(u32),
    Other(String),
}

impl ContactSource {
    pub fn from_cell(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() || text == MANUAL_MARKER {
            return Self::Manual;
        }
        match text.strip_prefix(LEAD_MARKER_PREFIX).map(str::parse::<u32>) {
            Some(Ok(row)) => Self::Lead(row),
            _ => Self::Other(text.to_string()),
        }
    }

    pub fn to_cell(&self) -> String {
        match self {
            Self::Manual => MANUAL_MARKER.to_string(),
            Self::Lead(row) => format!("{LEAD_MARKER_PREFIX}{row}"),
            Self::Other(text) => text.clone(),
        }
    }
}

impl Serialize for ContactSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_cell())
    }
}

/// A formal contact row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub row_index: u32,
    pub contact_id: ContactId,
    pub source: ContactSource,
    pub name: String,
    pub company_id: Option<CompanyId>,
    pub department: String,
    pub position: String,
    pub mobile: String,
    pub phone: String,
    pub email: String,
    pub created_time: String,
    pub last_update_time: String,
    pub creator: String,
    pub last_modifier: String,
}

/// Case- and whitespace-folded contact name.
pub fn fold_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl Contact {
    pub fn from_row(row: &[String], row_index: u32) -> Self {
        use columns::*;
        Self {
            row_index,
            contact_id: ContactId::new(cell_string(row, ID)),
            source: ContactSource::from_cell(cell(row, SOURCE)),
            name: cell_string(row, NAME),
            company_id: CompanyId::from_cell(cell(row, COMPANY_ID)),
            department: cell_string(row, DEPARTMENT),
            position: cell_string(row, POSITION),
            mobile: cell_string(row, MOBILE),
            phone: cell_string(row, PHONE),
            email: cell_string(row, EMAIL),
            created_time: cell_string(row, CREATED),
            last_update_time: cell_string(row, UPDATED),
            creator: cell_string(row, CREATOR),
            last_modifier: cell_string(row, LAST_MODIFIER),
        }
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.contact_id.to_string(),
            self.source.to_cell(),
            self.name.clone(),
            self.company_id.as_ref().map(ToString::to_string).unwrap_or_default(),
            self.department.clone(),
            self.position.clone(),
            self.mobile.clone(),
            self.phone.clone(),
            self.email.clone(),
            self.created_time.clone(),
            self.last_update_time.clone(),
            self.creator.clone(),
            self.last_modifier.clone(),
        ]
    }

    /// Natural key match: same company and same folded name.
    pub fn matches(&self, company_id: &CompanyId, name: &str) -> bool {
        self.company_id.as_ref() == Some(company_id) && fold_name(&self.name) == fold_name(name)
    }
}

impl Entity for Contact {
    type Id = ContactId;

    fn id(&self) -> &ContactId {
        &self.contact_id
    }

    fn row_index(&self) -> u32 {
        self.row_index
    }
}

/// Contact details supplied by a workflow: typed in by hand or copied from a raw lead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactDraft {
    pub name: String,
    pub company: String,
    pub phone: String,
    pub mobile: String,
    pub email: String,
    pub position: String,
    pub department: String,
    pub address: String,
    /// Raw-lead row this draft was copied from.
    pub lead_row: Option<u32>,
}

impl ContactDraft {
    pub fn source(&self) -> ContactSource {
        match self.lead_row {
            Some(row) => ContactSource::Lead(row),
            None => ContactSource::Manual,
        }
    }

    /// Build the persisted contact row for `company_id`.
    pub fn into_contact(
        &self,
        contact_id: ContactId,
        company_id: CompanyId,
        modifier: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Contact> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::missing_field("contact name"));
        }
        let stamp = format_timestamp(now);
        Ok(Contact {
            row_index: 0,
            contact_id,
            source: self.source(),
            name: name.to_string(),
            company_id: Some(company_id),
            department: self.department.clone(),
            position: self.position.clone(),
            mobile: self.mobile.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            created_time: stamp.clone(),
            last_update_time: stamp,
            creator: modifier.to_string(),
            last_modifier: modifier.to_string(),
        })
    }
}

/// Partial contact update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactPatch {
    pub source: Option<ContactSource>,
    pub name: Option<String>,
    pub company_id: Option<CompanyId>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub mobile: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl ContactPatch {
    /// Patch that restores every editable field of `contact`.
    pub fn restoring(contact: &Contact) -> Self {
        Self {
            source: Some(contact.source.clone()),
            name: Some(contact.name.clone()),
            company_id: contact.company_id.clone(),
            department: Some(contact.department.clone()),
            position: Some(contact.position.clone()),
            mobile: Some(contact.mobile.clone()),
            phone: Some(contact.phone.clone()),
            email: Some(contact.email.clone()),
        }
    }

    pub fn apply(&self, contact: &mut Contact, modifier: &str, now: DateTime<Utc>) {
        if let Some(source) = &self.source {
            contact.source = source.clone();
        }
        if let Some(company_id) = &self.company_id {
            contact.company_id = Some(company_id.clone());
        }
        let fields: [(&Option<String>, &mut String); 6] = [
            (&self.name, &mut contact.name),
            (&self.department, &mut contact.department),
            (&self.position, &mut contact.position),
            (&self.mobile, &mut contact.mobile),
            (&self.phone, &mut contact.phone),
            (&self.email, &mut contact.email),
        ];
        for (patch, target) in fields {
            if let Some(value) = patch {
                *target = value.clone();
            }
        }
        contact.last_modifier = modifier.to_string();
        contact.last_update_time = format_timestamp(now);
    }
}

/// Processing status of a raw lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadStatus {
    Open,
    Upgraded,
    Filed,
    Linked,
    Other(String),
}

impl LeadStatus {
    pub fn from_cell(text: &str) -> Self {
        match text.trim() {
            "" => Self::Open,
            "upgraded" => Self::Upgraded,
            "filed" => Self::Filed,
            "linked" => Self::Linked,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn to_cell(&self) -> String {
        match self {
            Self::Open => String::new(),
            Self::Upgraded => "upgraded".to_string(),
            Self::Filed => "filed".to_string(),
            Self::Linked => "linked".to_string(),
            Self::Other(text) => text.clone(),
        }
    }
}

impl Serialize for LeadStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_cell())
    }
}

/// A raw lead (business card) row awaiting filing or upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLead {
    pub row_index: u32,
    pub created_time: String,
    pub name: String,
    pub company: String,
    pub position: String,
    pub department: String,
    pub phone: String,
    pub mobile: String,
    pub email: String,
    pub address: String,
    pub status: LeadStatus,
}

impl RawLead {
    pub fn from_row(row: &[String], row_index: u32) -> Self {
        use lead_columns::*;
        Self {
            row_index,
            created_time: cell_string(row, CREATED),
            name: cell_string(row, NAME),
            company: cell_string(row, COMPANY),
            position: cell_string(row, POSITION),
            department: cell_string(row, DEPARTMENT),
            phone: cell_string(row, PHONE),
            mobile: cell_string(row, MOBILE),
            email: cell_string(row, EMAIL),
            address: cell_string(row, ADDRESS),
            status: LeadStatus::from_cell(cell(row, STATUS)),
        }
    }

    /// Contact draft carrying a back-reference to this lead row.
    pub fn to_draft(&self) -> ContactDraft {
        ContactDraft {
            name: self.name.clone(),
            company: self.company.clone(),
            phone: self.phone.clone(),
            mobile: self.mobile.clone(),
            email: self.email.clone(),
            position: self.position.clone(),
            department: self.department.clone(),
            address: self.address.clone(),
            lead_row: Some(self.row_index),
        }
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.created_time.clone(),
            self.name.clone(),
            self.company.clone(),
            self.position.clone(),
            self.department.clone(),
            self.phone.clone(),
            self.mobile.clone(),
            self.email.clone(),
            self.address.clone(),
            self.status.to_cell(),
        ]
    }

    /// Preferred reachable number: mobile, then landline.
    pub fn best_phone(&self) -> &str {
        if self.mobile.trim().is_empty() {
            &self.phone
        } else {
            &self.mobile
        }
    }
}

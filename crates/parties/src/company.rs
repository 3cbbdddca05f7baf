use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sheetcrm_core::row::cell_string;
use sheetcrm_core::time::{first_timestamp, format_timestamp};
use sheetcrm_core::{CompanyId, DomainError, DomainResult, Entity};

use crate::normalize::normalize_company_name;

/// Column layout of the Companies range (`A:M`).
pub mod columns {
    pub const ID: usize = 0;
    pub const NAME: usize = 1;
    pub const PHONE: usize = 2;
    pub const ADDRESS: usize = 3;
    pub const CREATED: usize = 4;
    pub const UPDATED: usize = 5;
    pub const REGION: usize = 6;
    pub const CREATOR: usize = 7;
    pub const LAST_MODIFIER: usize = 8;
    pub const INTRODUCTION: usize = 9;
    pub const TYPE: usize = 10;
    pub const STAGE: usize = 11;
    pub const RATING: usize = 12;
    pub const COUNT: usize = 13;
    pub const LAST: char = 'M';
}

/// A company row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub row_index: u32,
    pub company_id: CompanyId,
    pub company_name: String,
    pub phone: String,
    pub address: String,
    pub created_time: String,
    pub last_update_time: String,
    pub region: String,
    pub creator: String,
    pub last_modifier: String,
    pub introduction: String,
    pub company_type: String,
    pub customer_stage: String,
    pub engagement_rating: String,
}

impl Company {
    pub fn from_row(row: &[String], row_index: u32) -> Self {
        use columns::*;
        Self {
            row_index,
            company_id: CompanyId::new(cell_string(row, ID)),
            company_name: cell_string(row, NAME),
            phone: cell_string(row, PHONE),
            address: cell_string(row, ADDRESS),
            created_time: cell_string(row, CREATED),
            last_update_time: cell_string(row, UPDATED),
            region: cell_string(row, REGION),
            creator: cell_string(row, CREATOR),
            last_modifier: cell_string(row, LAST_MODIFIER),
            introduction: cell_string(row, INTRODUCTION),
            company_type: cell_string(row, TYPE),
            customer_stage: cell_string(row, STAGE),
            engagement_rating: cell_string(row, RATING),
        }
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.company_id.to_string(),
            self.company_name.clone(),
            self.phone.clone(),
            self.address.clone(),
            self.created_time.clone(),
            self.last_update_time.clone(),
            self.region.clone(),
            self.creator.clone(),
            self.last_modifier.clone(),
            self.introduction.clone(),
            self.company_type.clone(),
            self.customer_stage.clone(),
            self.engagement_rating.clone(),
        ]
    }

    /// Natural key of this company.
    pub fn natural_key(&self) -> String {
        normalize_company_name(&self.company_name)
    }

    /// Own activity time: last update, falling back to creation.
    pub fn self_activity(&self) -> Option<DateTime<Utc>> {
        first_timestamp(&[&self.last_update_time, &self.created_time])
    }
}

impl Entity for Company {
    type Id = CompanyId;

    fn id(&self) -> &CompanyId {
        &self.company_id
    }

    fn row_index(&self) -> u32 {
        self.row_index
    }
}

/// Fields of a company created by get-or-create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCompany {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub region: String,
}

impl NewCompany {
    /// Build the persisted row; the row handle is assigned by the store.
    pub fn into_company(
        self,
        company_id: CompanyId,
        modifier: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Company> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::missing_field("company name"));
        }
        let stamp = format_timestamp(now);
        Ok(Company {
            row_index: 0,
            company_id,
            company_name: name,
            phone: self.phone,
            address: self.address,
            created_time: stamp.clone(),
            last_update_time: stamp,
            region: self.region,
            creator: modifier.to_string(),
            last_modifier: modifier.to_string(),
            introduction: String::new(),
            company_type: String::new(),
            customer_stage: String::new(),
            engagement_rating: String::new(),
        })
    }
}

/// Partial company update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanyPatch {
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub region: Option<String>,
    pub introduction: Option<String>,
    pub company_type: Option<String>,
    pub customer_stage: Option<String>,
    pub engagement_rating: Option<String>,
}

impl CompanyPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch and stamp the modifier/update time.
    pub fn apply(&self, company: &mut Company, modifier: &str, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(name) = &self.company_name {
            let name = name.trim();
            if name.is_empty() {
                return Err(DomainError::validation("company name cannot be blank"));
            }
            company.company_name = name.to_string();
        }

        let fields: [(&Option<String>, &mut String); 7] = [
            (&self.phone, &mut company.phone),
            (&self.address, &mut company.address),
            (&self.region, &mut company.region),
            (&self.introduction, &mut company.introduction),
            (&self.company_type, &mut company.company_type),
            (&self.customer_stage, &mut company.customer_stage),
            (&self.engagement_rating, &mut company.engagement_rating),
        ];
        for (patch, target) in fields {
            if let Some(value) = patch {
                *target = value.clone();
            }
        }

        company.last_modifier = modifier.to_string();
        company.last_update_time = format_timestamp(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap()
    }

    fn sample() -> Company {
        NewCompany {
            name: "  Acme Co., Ltd. ".to_string(),
            phone: "02-1234".to_string(),
            ..Default::default()
        }
        .into_company(CompanyId::new("COMP1"), "alice", now())
        .unwrap()
    }

    #[test]
    fn new_company_is_trimmed_and_stamped() {
        let company = sample();
        assert_eq!(company.company_name, "Acme Co., Ltd.");
        assert_eq!(company.natural_key(), "acme");
        assert_eq!(company.created_time, "2024-02-01T09:00:00.000Z");
        assert_eq!(company.creator, "alice");
    }

    #[test]
    fn new_company_requires_a_name() {
        let err = NewCompany::default()
            .into_company(CompanyId::new("COMP1"), "alice", now())
            .unwrap_err();
        assert_eq!(err, DomainError::missing_field("company name"));
    }

    #[test]
    fn row_layout_is_positional() {
        let company = sample();
        let row = company.to_row();
        assert_eq!(row.len(), columns::COUNT);
        assert_eq!(row[columns::ID], "COMP1");
        assert_eq!(row[columns::NAME], "Acme Co., Ltd.");

        let parsed = Company::from_row(&row, 7);
        assert_eq!(parsed.row_index, 7);
        assert_eq!(parsed.company_id, company.company_id);
        assert_eq!(parsed.phone, "02-1234");
    }

    #[test]
    fn short_rows_parse_with_blank_trailing_fields() {
        let row = vec!["COMP9".to_string(), "Globex".to_string()];
        let company = Company::from_row(&row, 3);
        assert_eq!(company.company_name, "Globex");
        assert_eq!(company.engagement_rating, "");
        assert_eq!(company.self_activity(), None);
    }

    #[test]
    fn patch_only_touches_supplied_fields() {
        let mut company = sample();
        let patch = CompanyPatch {
            customer_stage: Some("active".to_string()),
            ..Default::default()
        };
        let later = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        patch.apply(&mut company, "bob", later).unwrap();

        assert_eq!(company.customer_stage, "active");
        assert_eq!(company.phone, "02-1234");
        assert_eq!(company.last_modifier, "bob");
        assert_eq!(company.self_activity(), Some(later));
    }

    #[test]
    fn patch_rejects_blank_rename() {
        let mut company = sample();
        let patch = CompanyPatch {
            company_name: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(patch.apply(&mut company, "bob", now()).is_err());
    }

    #[test]
    fn patch_deserializes_from_camel_case() {
        let patch: CompanyPatch =
            serde_json::from_str(r#"{ "engagementRating": "A" }"#).unwrap();
        assert_eq!(patch.engagement_rating.as_deref(), Some("A"));
        assert!(patch.company_type.is_none());
    }
}

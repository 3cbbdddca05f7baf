//! Won-deal aggregation.
//!
//! Pure computation over an opportunity snapshot. The overview and the
//! distributions cover every won opportunity; the monthly trend and the top
//! deals only cover deals whose close date falls inside the window.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use sheetcrm_core::time::{days_between_ceil, first_timestamp, parse_timestamp};
use sheetcrm_core::{CrmConfig, DomainError, DomainResult, SystemConfig};

use crate::opportunity::Opportunity;

/// Number of deals in the top list.
pub const TOP_DEALS: usize = 20;

const DEFAULT_WINDOW_DAYS: i64 = 365;
const UNCLASSIFIED: &str = "unclassified";

/// Inclusive analysis window: `start` at 00:00:00, `end` at 23:59:59.999 (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SalesWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SalesWindow {
    /// Window from optional ISO dates. Missing end is `now`; missing start
    /// is 365 days before the end.
    pub fn from_iso(start: Option<&str>, end: Option<&str>, now: DateTime<Utc>) -> DomainResult<Self> {
        let end = match end.filter(|s| !s.trim().is_empty()) {
            Some(text) => parse_timestamp(text)
                .ok_or_else(|| DomainError::validation(format!("invalid end date: {text}")))?,
            None => now,
        };
        let start = match start.filter(|s| !s.trim().is_empty()) {
            Some(text) => parse_timestamp(text)
                .ok_or_else(|| DomainError::validation(format!("invalid start date: {text}")))?,
            None => end - Duration::days(DEFAULT_WINDOW_DAYS),
        };
        Self::for_dates(start.date_naive(), end.date_naive())
    }

    pub fn for_dates(start: NaiveDate, end: NaiveDate) -> DomainResult<Self> {
        if start > end {
            return Err(DomainError::validation("start date is after end date"));
        }
        let start = start.and_time(NaiveTime::MIN).and_utc();
        let end = (end.and_time(NaiveTime::MIN) + Duration::days(1) - Duration::milliseconds(1)).and_utc();
        Ok(Self { start, end })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }

    /// `YYYY-MM` keys of every calendar month the window touches, in order.
    pub fn months(&self) -> Vec<String> {
        let (mut year, mut month) = (self.start.year(), self.start.month());
        let last = (self.end.year(), self.end.month());
        let mut keys = Vec::new();
        while (year, month) <= last {
            keys.push(format!("{year:04}-{month:02}"));
            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
        }
        keys
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesOverview {
    pub total_won_value: f64,
    pub total_won_deals: usize,
    pub average_deal_value: f64,
    pub average_sales_cycle_in_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBucket {
    pub month: String,
    pub value: f64,
    pub count: usize,
    pub avg_sales_cycle: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionEntry {
    pub name: String,
    pub value: f64,
    pub count: usize,
}

/// One grouping, ranked two ways.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub by_value: Vec<DistributionEntry>,
    pub by_count: Vec<DistributionEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopDeal {
    #[serde(flatten)]
    pub opportunity: Opportunity,
    pub numeric_value: f64,
    pub won_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesAnalysis {
    pub window: SalesWindow,
    pub overview: SalesOverview,
    pub monthly_trend: Vec<MonthlyBucket>,
    pub source_analysis: Distribution,
    pub type_analysis: Distribution,
    pub assignee_analysis: Distribution,
    pub top_deals: Vec<TopDeal>,
}

/// Close date of a won deal: expected close, falling back to the last update.
pub fn close_date(opportunity: &Opportunity) -> Option<DateTime<Utc>> {
    first_timestamp(&[&opportunity.expected_close_date, &opportunity.last_update_time])
}

/// Sales-cycle length in whole days; needs both created time and expected close.
pub fn sales_cycle_days(opportunity: &Opportunity) -> Option<i64> {
    let created = parse_timestamp(&opportunity.created_time)?;
    let closed = parse_timestamp(&opportunity.expected_close_date)?;
    Some(days_between_ceil(created, closed))
}

#[derive(Default)]
struct CycleAverage {
    total: i64,
    samples: i64,
}

impl CycleAverage {
    fn add(&mut self, days: Option<i64>) {
        if let Some(days) = days {
            self.total += days;
            self.samples += 1;
        }
    }

    fn rounded(&self) -> i64 {
        if self.samples == 0 {
            0
        } else {
            (self.total as f64 / self.samples as f64).round() as i64
        }
    }
}

pub fn analyze(
    opportunities: &[Opportunity],
    system: &SystemConfig,
    config: &CrmConfig,
    window: SalesWindow,
) -> SalesAnalysis {
    let won: Vec<&Opportunity> = opportunities
        .iter()
        .filter(|o| o.current_stage == config.pipeline.won_stage)
        .collect();
    let won_in_window: Vec<(&Opportunity, DateTime<Utc>)> = won
        .iter()
        .filter_map(|o| close_date(o).filter(|at| window.contains(*at)).map(|at| (*o, at)))
        .collect();

    let categories = &config.categories;
    SalesAnalysis {
        window,
        overview: overview(&won),
        monthly_trend: monthly_trend(&won_in_window, &window),
        source_analysis: distribution(&won, system, &categories.opportunity_source, |o| {
            &o.opportunity_source
        }),
        type_analysis: distribution(&won, system, &categories.opportunity_type, |o| {
            &o.opportunity_type
        }),
        assignee_analysis: distribution(&won, system, &categories.team_member, |o| &o.assignee),
        top_deals: top_deals(&won_in_window),
    }
}

fn overview(won: &[&Opportunity]) -> SalesOverview {
    let total_won_value: f64 = won.iter().map(|o| o.value_amount()).sum();
    let mut cycle = CycleAverage::default();
    for opportunity in won {
        cycle.add(sales_cycle_days(opportunity));
    }
    SalesOverview {
        total_won_value,
        total_won_deals: won.len(),
        average_deal_value: if won.is_empty() {
            0.0
        } else {
            total_won_value / won.len() as f64
        },
        average_sales_cycle_in_days: cycle.rounded(),
    }
}

fn monthly_trend(won: &[(&Opportunity, DateTime<Utc>)], window: &SalesWindow) -> Vec<MonthlyBucket> {
    let mut by_month: BTreeMap<String, (f64, usize, CycleAverage)> = BTreeMap::new();
    for (opportunity, closed) in won {
        let key = format!("{:04}-{:02}", closed.year(), closed.month());
        let entry = by_month.entry(key).or_default();
        entry.0 += opportunity.value_amount();
        entry.1 += 1;
        entry.2.add(sales_cycle_days(opportunity));
    }

    window
        .months()
        .into_iter()
        .map(|month| match by_month.get(&month) {
            Some((value, count, cycle)) => MonthlyBucket {
                month,
                value: *value,
                count: *count,
                avg_sales_cycle: cycle.rounded(),
            },
            None => MonthlyBucket {
                month,
                value: 0.0,
                count: 0,
                avg_sales_cycle: 0,
            },
        })
        .collect()
}

fn distribution(
    won: &[&Opportunity],
    system: &SystemConfig,
    category: &str,
    field: impl Fn(&Opportunity) -> &String,
) -> Distribution {
    let mut groups: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for opportunity in won {
        let raw = field(*opportunity).trim();
        let key = if raw.is_empty() { UNCLASSIFIED } else { raw };
        let entry = groups.entry(system.label(category, key).to_string()).or_default();
        entry.0 += opportunity.value_amount();
        entry.1 += 1;
    }

    let entries: Vec<DistributionEntry> = groups
        .into_iter()
        .map(|(name, (value, count))| DistributionEntry { name, value, count })
        .collect();

    let mut by_value = entries.clone();
    by_value.sort_by(|a, b| b.value.total_cmp(&a.value));
    let mut by_count = entries;
    by_count.sort_by(|a, b| b.count.cmp(&a.count));

    Distribution { by_value, by_count }
}

fn top_deals(won: &[(&Opportunity, DateTime<Utc>)]) -> Vec<TopDeal> {
    let mut deals: Vec<TopDeal> = won
        .iter()
        .map(|(opportunity, _)| TopDeal {
            numeric_value: opportunity.value_amount(),
            won_date: [
                &opportunity.expected_close_date,
                &opportunity.last_update_time,
                &opportunity.created_time,
            ]
            .into_iter()
            .find(|s| !s.trim().is_empty())
            .cloned()
            .unwrap_or_default(),
            opportunity: (*opportunity).clone(),
        })
        .collect();
    deals.sort_by(|a, b| b.numeric_value.total_cmp(&a.numeric_value));
    deals.truncate(TOP_DEALS);
    deals
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn won(id: &str, created: &str, close: &str, value: &str) -> Opportunity {
        let mut row = vec![String::new(); crate::opportunity::columns::COUNT];
        row[0] = id.to_string();
        row[1] = format!("deal {id}");
        row[8] = "won".to_string();
        row[9] = created.to_string();
        row[10] = close.to_string();
        row[11] = value.to_string();
        row[12] = "active".to_string();
        Opportunity::from_row(&row, 2, &sheetcrm_core::StatusValues::default())
    }

    fn window(start: &str, end: &str) -> SalesWindow {
        SalesWindow::for_dates(start.parse().unwrap(), end.parse().unwrap()).unwrap()
    }

    fn run(opportunities: &[Opportunity], window: SalesWindow) -> SalesAnalysis {
        analyze(opportunities, &SystemConfig::default(), &CrmConfig::default(), window)
    }

    #[test]
    fn ten_day_cycle_counts_as_ten() {
        let deal = won("OPP1", "2024-01-01", "2024-01-11", "100");
        assert_eq!(sales_cycle_days(&deal), Some(10));

        let analysis = run(&[deal], window("2024-01-01", "2024-01-31"));
        assert_eq!(analysis.overview.average_sales_cycle_in_days, 10);
        assert_eq!(analysis.monthly_trend[0].avg_sales_cycle, 10);
    }

    #[test]
    fn empty_middle_month_still_has_a_bucket() {
        let deals = [
            won("OPP1", "2024-01-01", "2024-01-15", "1,000"),
            won("OPP2", "2024-01-01", "2024-03-10", "500"),
        ];
        let analysis = run(&deals, window("2024-01-01", "2024-03-31"));
        let months: Vec<_> = analysis.monthly_trend.iter().map(|b| b.month.as_str()).collect();
        assert_eq!(months, vec!["2024-01", "2024-02", "2024-03"]);

        let february = &analysis.monthly_trend[1];
        assert_eq!((february.value, february.count, february.avg_sales_cycle), (0.0, 0, 0));
        assert_eq!(analysis.monthly_trend[0].value, 1000.0);
    }

    #[test]
    fn overview_ignores_window_but_trend_and_top_list_do_not() {
        let deals = [
            won("OPP1", "2023-01-01", "2023-02-01", "300"),
            won("OPP2", "2024-05-01", "2024-05-20", "700"),
        ];
        let analysis = run(&deals, window("2024-05-01", "2024-05-31"));
        assert_eq!(analysis.overview.total_won_deals, 2);
        assert_eq!(analysis.overview.total_won_value, 1000.0);
        assert_eq!(analysis.overview.average_deal_value, 500.0);
        assert_eq!(analysis.top_deals.len(), 1);
        assert_eq!(analysis.top_deals[0].numeric_value, 700.0);
        assert_eq!(analysis.monthly_trend[0].count, 1);
    }

    #[test]
    fn close_date_falls_back_to_update_time() {
        let mut deal = won("OPP1", "2024-01-01", "", "10");
        deal.last_update_time = "2024-02-02T10:00:00Z".to_string();
        let analysis = run(&[deal], window("2024-02-01", "2024-02-29"));
        assert_eq!(analysis.monthly_trend[0].count, 1);
        // No expected close date: no cycle sample.
        assert_eq!(analysis.overview.average_sales_cycle_in_days, 0);
        assert_eq!(analysis.top_deals[0].won_date, "2024-02-02T10:00:00Z");
    }

    #[test]
    fn unparseable_values_still_count_as_deals() {
        let deals = [won("OPP1", "", "2024-01-05", "tbd"), won("OPP2", "", "2024-01-06", "")];
        let analysis = run(&deals, window("2024-01-01", "2024-01-31"));
        assert_eq!(analysis.overview.total_won_deals, 2);
        assert_eq!(analysis.overview.total_won_value, 0.0);
        assert_eq!(analysis.monthly_trend[0].count, 2);
    }

    #[test]
    fn distributions_use_labels_and_unclassified() {
        let rows: Vec<Vec<String>> = vec![
            vec!["opportunity_source".into(), "expo".into(), "Trade show".into(), "1".into()],
        ];
        let system = SystemConfig::from_rows(&rows);

        let mut a = won("OPP1", "", "2024-01-05", "100");
        a.opportunity_source = "expo".to_string();
        let mut b = won("OPP2", "", "2024-01-06", "50");
        b.opportunity_source = "expo".to_string();
        let c = won("OPP3", "", "2024-01-07", "900");

        let analysis = analyze(&[a, b, c], &system, &CrmConfig::default(), window("2024-01-01", "2024-01-31"));
        let by_value = &analysis.source_analysis.by_value;
        assert_eq!(by_value[0].name, "unclassified");
        assert_eq!(by_value[0].value, 900.0);
        let by_count = &analysis.source_analysis.by_count;
        assert_eq!(by_count[0].name, "Trade show");
        assert_eq!(by_count[0].count, 2);
    }

    #[test]
    fn top_list_is_capped() {
        let deals: Vec<_> = (0..30)
            .map(|i| won(&format!("OPP{i}"), "", "2024-01-10", &i.to_string()))
            .collect();
        let analysis = run(&deals, window("2024-01-01", "2024-01-31"));
        assert_eq!(analysis.top_deals.len(), TOP_DEALS);
        assert_eq!(analysis.top_deals[0].numeric_value, 29.0);
    }

    #[test]
    fn default_window_spans_a_year_of_whole_days() {
        let now = parse_timestamp("2024-06-15T13:30:00Z").unwrap();
        let window = SalesWindow::from_iso(None, None, now).unwrap();
        assert_eq!(window.start, parse_timestamp("2023-06-16").unwrap());
        assert_eq!(window.end, parse_timestamp("2024-06-15T23:59:59.999Z").unwrap());
        assert!(SalesWindow::from_iso(Some("2024-02-01"), Some("2024-01-01"), now).is_err());
        assert!(SalesWindow::from_iso(Some("soon"), None, now).is_err());
    }

    proptest! {
        #[test]
        fn trend_covers_every_month_and_every_windowed_deal(
            span in 0i64..800,
            offsets in proptest::collection::vec(0i64..800, 0..20),
        ) {
            let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
            let end = start + Duration::days(span);
            let window = SalesWindow::for_dates(start, end).unwrap();
            let deals: Vec<_> = offsets
                .iter()
                .enumerate()
                .map(|(i, d)| {
                    let close = (start + Duration::days(*d)).format("%Y-%m-%d").to_string();
                    won(&format!("OPP{i}"), "2022-12-01", &close, "1")
                })
                .collect();

            let analysis = run(&deals, window);
            let expected_months =
                (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32 + 1;
            prop_assert_eq!(analysis.monthly_trend.len() as i32, expected_months);

            let in_window = offsets.iter().filter(|d| **d <= span).count();
            let bucketed: usize = analysis.monthly_trend.iter().map(|b| b.count).sum();
            prop_assert_eq!(bucketed, in_window);
            prop_assert_eq!(analysis.overview.total_won_deals, offsets.len());
        }
    }
}

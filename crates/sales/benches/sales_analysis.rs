use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use sheetcrm_core::{CrmConfig, StatusValues, SystemConfig};
use sheetcrm_sales::opportunity::columns;
use sheetcrm_sales::{Opportunity, SalesWindow, analyze};

const STAGES: [&str; 4] = ["lead", "proposal", "negotiation", "won"];
const SOURCES: [&str; 3] = ["expo", "referral", ""];

fn opportunities(count: usize) -> Vec<Opportunity> {
    (0..count)
        .map(|i| {
            let mut row = vec![String::new(); columns::COUNT];
            row[columns::ID] = format!("OPP{i}");
            row[columns::NAME] = format!("deal {i}");
            row[columns::ASSIGNEE] = format!("rep{}", i % 7);
            row[columns::SOURCE] = SOURCES[i % SOURCES.len()].to_string();
            row[columns::STAGE] = STAGES[i % STAGES.len()].to_string();
            row[columns::CREATED] = format!("2023-{:02}-{:02}", i % 12 + 1, i % 28 + 1);
            row[columns::EXPECTED_CLOSE] = format!("2024-{:02}-{:02}", i % 12 + 1, i % 28 + 1);
            row[columns::VALUE] = format!("{},000", i % 500 + 1);
            row[columns::STATUS] = "active".to_string();
            Opportunity::from_row(&row, i as u32 + 2, &StatusValues::default())
        })
        .collect()
}

fn bench_analyze(c: &mut Criterion) {
    let system = SystemConfig::default();
    let config = CrmConfig::default();
    let window = SalesWindow::for_dates(
        "2024-01-01".parse().unwrap(),
        "2024-12-31".parse().unwrap(),
    )
    .unwrap();

    let mut group = c.benchmark_group("sales_analysis");
    for size in [100usize, 1_000, 10_000] {
        let data = opportunities(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| analyze(black_box(data), &system, &config, window));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_analyze);
criterion_main!(benches);

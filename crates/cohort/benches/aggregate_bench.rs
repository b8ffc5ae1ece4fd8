use criterion::{black_box, criterion_group, criterion_main, Criterion};
use roas_cohort::{aggregate, prepare, CohortFrame, CohortRow, Day, Level, Metric};

fn sample_frame(rows: usize) -> CohortFrame {
    // 30 days x 8 opt groups x 3 windows x 12 countries, repeated as needed
    let rows = (0..rows)
        .map(|i| {
            let mut row = CohortRow {
                date_idx: (i % 30) as i64,
                opt_group_map: Some(format!("og{}", i % 8)),
                conv_window_map: Some(format!("cw{}", i % 3)),
                country_map: Some(format!("c{}", i % 12)),
                installs: (10 + i % 90) as f64,
                cost: (5 + i % 400) as f64,
                cpi: Some(0.5),
                ..Default::default()
            };
            for metric in Metric::ALL {
                for day in Day::ALL {
                    row.set_metric(metric, day, Some((i % 17) as f64 * 0.01));
                }
            }
            row
        })
        .collect();
    CohortFrame::with_all_columns(rows)
}

fn bench_aggregate(c: &mut Criterion) {
    let frame = sample_frame(20_000);

    for level in Level::ALL {
        c.bench_function(&format!("aggregate_{level}"), |b| {
            b.iter(|| {
                let out = aggregate(black_box(&frame), level);
                black_box(out)
            });
        });
    }
}

fn bench_prepare(c: &mut Criterion) {
    let frame = sample_frame(20_000);

    c.bench_function("prepare_micro", |b| {
        b.iter(|| {
            let out = prepare(black_box(&frame), Level::Micro);
            black_box(out)
        });
    });
}

criterion_group!(cohort_benches, bench_aggregate, bench_prepare);
criterion_main!(cohort_benches);

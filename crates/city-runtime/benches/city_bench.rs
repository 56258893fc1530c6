use criterion::{criterion_group, criterion_main, Criterion};

fn bench_days(c: &mut Criterion) {
    let cfg = city_core::CityConfig::default();
    let mut sim = city_runtime::init_city(&cfg).expect("default scenario is valid");
    c.bench_function("city_day", |b| {
        b.iter(|| {
            let _ = city_runtime::run_ticks(&mut sim, 1);
            sim.drain_events();
        })
    });
}

fn bench_year(c: &mut Criterion) {
    let cfg = city_core::CityConfig::default();
    c.bench_function("city 365 days", |b| {
        b.iter(|| {
            let mut sim = city_runtime::init_city(&cfg).expect("default scenario is valid");
            city_runtime::run_ticks(&mut sim, 365)
        })
    });
}

criterion_group!(benches, bench_days, bench_year);
criterion_main!(benches);

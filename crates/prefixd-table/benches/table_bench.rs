use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use prefixd_core::{IpPrefix, KeyScope, PrefixEntry, PrefixType};
use prefixd_table::{Observed, PrefixTable, PublishedKeys};

fn make_prefix(i: u32) -> IpPrefix {
    IpPrefix::new(IpAddr::V4(Ipv4Addr::from(0x0a00_0000 | (i << 8))), 24).unwrap()
}

fn make_entries(count: u32, prefix_type: PrefixType) -> Vec<PrefixEntry> {
    (0..count)
        .map(|i| PrefixEntry::new(make_prefix(i), prefix_type))
        .collect()
}

fn bench_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("prefix_table");

    for (label, size) in [("1K", 1_000u32), ("10K", 10_000)] {
        let entries = make_entries(size, PrefixType::Bgp);

        group.bench_with_input(BenchmarkId::new("advertise", label), &entries, |b, e| {
            b.iter(|| {
                let mut table = PrefixTable::new();
                table.advertise(e.iter().cloned())
            });
        });

        let mut table = PrefixTable::new();
        table.advertise(entries.iter().cloned());

        group.bench_with_input(BenchmarkId::new("readvertise_noop", label), &entries, |b, e| {
            b.iter(|| table.clone().advertise(e.iter().cloned()));
        });

        group.bench_with_input(BenchmarkId::new("winners", label), &table, |b, t| {
            b.iter(|| t.winners());
        });

        group.bench_with_input(BenchmarkId::new("sync_by_type_half", label), &entries, |b, e| {
            let half: Vec<_> = e.iter().step_by(2).cloned().collect();
            b.iter(|| table.clone().sync_by_type(PrefixType::Bgp, half.iter().cloned()));
        });
    }

    // priority resolution with several clients per prefix
    let mut contested = PrefixTable::new();
    for t in [PrefixType::Bgp, PrefixType::Rib, PrefixType::Default, PrefixType::Vip] {
        contested.advertise(make_entries(1_000, t));
    }
    group.bench_function("winners_contested_1K", |b| {
        b.iter(|| contested.winners());
    });

    group.finish();
}

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("published_keys");
    let scope = KeyScope::new("node-1", "0").unwrap();
    let ttl = Duration::from_secs(300);
    let entries = make_entries(1_000, PrefixType::Bgp);

    group.bench_function("plan_commit_1K", |b| {
        b.iter(|| {
            let now = Instant::now();
            let mut keys = PublishedKeys::new(scope.clone(), ttl);
            for e in &entries {
                if let Some(publication) = keys.plan(e.prefix, Some(e), None, None) {
                    keys.commit(&publication, now);
                }
            }
            keys
        });
    });

    let now = Instant::now();
    let mut keys = PublishedKeys::new(scope.clone(), ttl);
    let mut observed = Vec::new();
    for e in &entries {
        if let Some(publication) = keys.plan(e.prefix, Some(e), None, None) {
            keys.commit(&publication, now);
            observed.push(Observed::new(publication.version, Some(publication.db)));
        }
    }

    group.bench_function("plan_unchanged_1K", |b| {
        b.iter(|| {
            entries
                .iter()
                .zip(&observed)
                .filter(|&(e, o)| keys.plan(e.prefix, Some(e), Some(o), None).is_some())
                .count()
        });
    });

    group.bench_function("refresh_due_1K", |b| {
        b.iter(|| keys.refresh_due(now + ttl));
    });

    group.finish();
}

criterion_group!(benches, bench_table, bench_publish);
criterion_main!(benches);

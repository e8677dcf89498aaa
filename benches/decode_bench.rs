//! Benchmarks for the METAR decoder.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use vatsim_watch::feed::VatsimData;
use vatsim_watch::metar::decode;
use vatsim_watch::watcher::KnownEntities;

const SAMPLE_METARS: &[&str] = &[
    "KJFK 181851Z 24015G25KT 10SM FEW250 M05/M10 A3012 RMK AO2 SLP201",
    "EGLL 181850Z AUTO 27005KT 9999 -RA SCT012 BKN025 12/10 Q1013",
    "METAR LFPG 181830Z 20012KT 4000 BR OVC003 08/07 Q0998 NOSIG",
    "KSFO 181856Z 29018G28KT 10SM FEW008 SCT200 16/11 A2995",
    "RJTT 181900Z 36008KT 9999 FEW030 SCT100 BKN200 22/17 Q1016",
    "CYYZ 181900Z 31010KT 15SM -SN BKN035 OVC080 M03/M08 A3001",
];

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    group.throughput(Throughput::Elements(1));
    group.bench_function("single", |b| b.iter(|| decode(black_box(SAMPLE_METARS[0]))));

    group.throughput(Throughput::Elements(SAMPLE_METARS.len() as u64));
    group.bench_function("batch", |b| {
        b.iter(|| {
            for raw in SAMPLE_METARS {
                let _ = decode(black_box(raw));
            }
        })
    });

    let noise = "lorem ipsum dolor sit amet consectetur adipiscing elit ".repeat(8);
    group.throughput(Throughput::Elements(1));
    group.bench_function("no_match", |b| b.iter(|| decode(black_box(&noise))));

    group.finish();
}

fn bench_render_lines(c: &mut Criterion) {
    let report = decode(SAMPLE_METARS[1]);
    c.bench_function("decoded_text", |b| {
        b.iter(|| black_box(&report).decoded_text())
    });
}

/// A feed with `count` pilots, enough to exercise the diff at network scale.
fn synthetic_feed(count: u64) -> VatsimData {
    let pilots: Vec<String> = (0..count)
        .map(|i| {
            format!(
                r#"{{"cid": {}, "name": "Pilot {}", "callsign": "TST{}", "latitude": 0.0, "longitude": 0.0, "altitude": 0, "groundspeed": 0, "logon_time": "2026-10-18T00:00:00Z"}}"#,
                1_000_000 + i,
                i,
                i
            )
        })
        .collect();
    let json = format!(r#"{{"pilots": [{}]}}"#, pilots.join(","));
    VatsimData::from_json(&json).expect("synthetic feed")
}

fn bench_known_entities(c: &mut Criterion) {
    let feed = synthetic_feed(2000);

    c.bench_function("known_entities_diff_2000", |b| {
        b.iter(|| {
            let mut known = KnownEntities::new(false);
            let first = known.diff(black_box(&feed), &[]);
            let second = known.diff(black_box(&feed), &[]);
            (first.len(), second.len())
        })
    });
}

criterion_group!(benches, bench_decode, bench_render_lines, bench_known_entities);
criterion_main!(benches);

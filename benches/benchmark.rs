use std::hint::black_box;
use std::io::Cursor;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};

use nagcfg::identifier::IdentifierGenerator;
use nagcfg::ingest::{Source, SourceLoader};
use nagcfg::query::Query;
use nagcfg::reader::{Reader, parse_str};
use nagcfg::store::ObjectStore;
use nagcfg::writer::write_all;

// ------------- fixtures -------------
fn services(count: usize) -> String {
    (0..count)
        .map(|i| {
            format!(
                "define service {{\n    use                            generic-service\n    host_name                      host{:04}\n    service_description            check {}\n    check_command                  check_nrpe!load!{}\n}}\n\n",
                i / 10,
                i % 10,
                i
            )
        })
        .collect()
}

fn store(text: &str) -> ObjectStore {
    let mut store = ObjectStore::new();
    let generator = Arc::new(IdentifierGenerator::new());
    Reader::new(Cursor::new(text))
        .with_generator(generator)
        .read_into(&mut store)
        .expect("parse");
    store
}

// ------------- benches -------------
fn parsing(c: &mut Criterion) {
    let text = services(1_000);
    c.bench_function("parse 1000 services", |b| {
        b.iter(|| parse_str(black_box(&text)).expect("parse"))
    });
    c.bench_function("ingest 4 sources of 250 services", |b| {
        let loader = SourceLoader::new(Arc::new(IdentifierGenerator::new()));
        b.iter(|| {
            let sources = (0..4)
                .map(|i| Source::reader(format!("s{i}.cfg"), Cursor::new(services(250))))
                .collect();
            loader.load_store(sources).expect("load")
        })
    });
}

fn searching(c: &mut Criterion) {
    let store = store(&services(1_000));
    let mut pairs = Query::new();
    pairs
        .add_key_pattern("host_name", "^host00[0-4]")
        .and_then(|q| q.add_key_pattern("service_description", "check [37]"))
        .expect("query");
    c.bench_function("search pairs", |b| {
        b.iter(|| pairs.search(black_box(&store), None).expect("search"))
    });
    let mut any = Query::new();
    any.add_pattern("nrpe!load!9").expect("query");
    c.bench_function("search any property", |b| {
        b.iter(|| any.search(black_box(&store), None).expect("search"))
    });
}

fn writing(c: &mut Criterion) {
    let store = store(&services(1_000));
    c.bench_function("write 1000 services sorted", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(256 * 1024);
            write_all(black_box(&store), &mut out, true).expect("write");
            out
        })
    });
}

criterion_group!(benches, parsing, searching, writing);
criterion_main!(benches);

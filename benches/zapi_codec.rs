//! Benchmark for the controller XML codec and placement selection
//!
//! Target: decode a 1K-entry aggregate listing in under 1ms

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use indexmap::IndexMap;
use nas_provisioner::placement::select_pool;
use nas_provisioner::zapi::codec::{from_xml, to_xml};
use nas_provisioner::Element;

fn aggregate_listing(count: usize) -> Element {
    let entries = (0..count).map(|i| {
        Element::new("vserver-aggr-info")
            .with_child_content("aggr-name", format!("aggr{:04}", i))
            .with_child_content("aggr-availsize", (i as u64 * 1_073_741_824).to_string())
    });
    Element::new("results").with_attr("status", "passed").with_child(
        Element::new("attributes").with_child(
            Element::new("vserver-info")
                .with_child(Element::new("vserver-aggr-info-list").with_children(entries)),
        ),
    )
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("zapi_codec");
    group.throughput(Throughput::Elements(1));

    let request = Element::new("volume-create")
        .with_child_content("containing-aggr-name", "aggr0001")
        .with_child_content("junction-path", "/share_4b1a_77_c2")
        .with_child_content("size", "6g")
        .with_child_content("volume", "share_4b1a_77_c2");

    group.bench_function("encode_request", |b| {
        b.iter(|| to_xml(black_box(&request)));
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("zapi_codec");
    group.throughput(Throughput::Elements(1000));

    let xml = to_xml(&aggregate_listing(1000));

    group.bench_function("decode_aggregate_listing", |b| {
        b.iter(|| from_xml(black_box(&xml)));
    });

    group.finish();
}

fn bench_select_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("placement");
    group.throughput(Throughput::Elements(1000));

    let pools: IndexMap<String, u64> = (0..1000u64)
        .map(|i| (format!("aggr{:04}", i), (i * 7919) % 1000 * 1_073_741_824))
        .collect();

    group.bench_function("select_pool", |b| {
        b.iter(|| select_pool(black_box(&pools), "openstack"));
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_select_pool);
criterion_main!(benches);

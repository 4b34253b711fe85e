use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sxd_dom_core::{Config, DeferredStore, Package};

const SIZES: &[usize] = &[100, 1000];

fn wide_package(children: usize, config: Config) -> Package {
    let package = Package::with_config(config);
    {
        let doc = package.as_document();
        let parent = doc.create_element("parent").unwrap();
        doc.root().append_child(parent).unwrap();
        for i in 0..children {
            parent.append_child(doc.create_text(&i.to_string())).unwrap();
        }
    }
    package
}

fn indexed_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexed_access");

    for &size in SIZES {
        for &(label, cache) in &[("cached", true), ("uncached", false)] {
            let config = Config { child_list_cache: cache, ..Config::default() };
            let package = wide_package(size, config);

            group.bench_with_input(BenchmarkId::new(label, size), &size, |b, &size| {
                let doc = package.as_document();
                let list = doc.document_element().unwrap().child_nodes();
                b.iter(|| {
                    for i in 0..size {
                        criterion::black_box(list.item(i));
                    }
                });
            });
        }
    }

    group.finish();
}

fn deferred_store(children: usize) -> DeferredStore {
    let mut store = DeferredStore::new();
    let parent = store.create_element("parent");
    for i in 0..children {
        let child = store.create_element("child");
        store.add_attribute(child, "n", &i.to_string(), true);
        store.append_child(parent, child);
    }
    store.append_root_child(parent);
    store
}

fn deferred_loading(c: &mut Criterion) {
    let mut group = c.benchmark_group("deferred_loading");

    for &size in SIZES {
        group.bench_with_input(BenchmarkId::new("first_child_only", size), &size, |b, &size| {
            b.iter(|| {
                let package = Package::from_deferred(deferred_store(size));
                let doc = package.as_document();
                let parent = doc.document_element().unwrap();
                criterion::black_box(parent.as_node().first_child());
            });
        });

        group.bench_with_input(BenchmarkId::new("every_attribute", size), &size, |b, &size| {
            b.iter(|| {
                let package = Package::from_deferred(deferred_store(size));
                let doc = package.as_document();
                let parent = doc.document_element().unwrap();
                for child in parent.child_nodes() {
                    if let Some(e) = child.element() {
                        criterion::black_box(e.attribute_value("n"));
                    }
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, indexed_access, deferred_loading);
criterion_main!(benches);

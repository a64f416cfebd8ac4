#![allow(dead_code)]

use bindery::{modules, BindErrorKind, Binder, Fields, Injectable, Injector, Marker, ResolveErrorKind};
use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

struct A(Arc<B>, Arc<C>);
struct B(i32);
struct C(Arc<CA>);
struct CA(Arc<CAA>);
struct CAA(Arc<CAAA>);
struct CAAA;

#[derive(Default)]
struct Handler {
    a: Option<Arc<A>>,
    b: Option<Arc<B>>,
}

impl Injectable for Handler {
    fn visit_fields(&mut self, fields: &mut Fields<'_>) -> Result<(), ResolveErrorKind> {
        fields.slot("a", &mut self.a, Marker::Absent)?.slot("b", &mut self.b, Marker::Absent)?;
        Ok(())
    }
}

fn graph(binder: &mut Binder) -> Result<(), BindErrorKind> {
    binder.bind_constructor(|| CAAA)?;
    binder.bind_constructor(CAA)?;
    binder.bind_constructor(CA)?;
    binder.bind_constructor(C)?;
    binder.bind_constructor(|| B(2))?;
    binder.bind_constructor(A)?;
    Ok(())
}

fn transient_graph(binder: &mut Binder) -> Result<(), BindErrorKind> {
    binder.bind_constructor(|| CAAA)?.as_non_singleton()?;
    binder.bind_constructor(CAA)?.as_non_singleton()?;
    binder.bind_constructor(CA)?.as_non_singleton()?;
    binder.bind_constructor(C)?.as_non_singleton()?;
    binder.bind_constructor(|| B(2))?.as_non_singleton()?;
    binder.bind_constructor(A)?.as_non_singleton()?;
    Ok(())
}

fn criterion_benchmark(c: &mut Criterion) {
    let singletons = Injector::create(modules![graph]).unwrap();
    let transients = Injector::create(modules![transient_graph]).unwrap();

    c.bench_function("injector_create", |b| b.iter(|| Injector::create(modules![graph]).unwrap()))
        .bench_function("injector_get_singleton", |b| b.iter(|| singletons.require::<A>().unwrap()))
        .bench_function("injector_get_non_singleton", |b| b.iter(|| transients.require::<A>().unwrap()))
        .bench_function("injector_inject_members", |b| {
            b.iter(|| {
                let mut handler = Handler::default();
                singletons.inject_members(&mut handler).unwrap();
                handler
            })
        })
        .bench_function("injector_inject_and_call", |b| {
            b.iter(|| singletons.inject_and_call(&|a: Arc<A>, b: Option<Arc<B>>| (a, b)).unwrap())
        });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

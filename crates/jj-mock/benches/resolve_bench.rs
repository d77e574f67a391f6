use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use jj_mock::{AttributeMatcher, Handler, Request, RequestMatcher, Resolver, Response};

fn build_resolver(count: usize) -> Resolver {
    let resolver = Resolver::reversed(Handler::new("not_found", |_| async {
        Ok(Response::new(404))
    }));
    for i in 0..count {
        let matcher = RequestMatcher::all(vec![
            RequestMatcher::method("GET"),
            RequestMatcher::path(&format!("/api/v1/endpoint{i}/{{id}}")).unwrap(),
            RequestMatcher::header([("x-tenant", AttributeMatcher::Exists)]),
        ])
        .unwrap();
        let handler = Handler::new(format!("endpoint{i}"), |_| async { Ok(Response::new(200)) });
        matcher.attach(&resolver, handler);
    }
    resolver
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");

    for count in [10, 100, 1000] {
        let resolver = build_resolver(count);
        let app = resolver.default_app().clone();
        group.throughput(Throughput::Elements(1));

        // Oldest handler: every newer one is tried first
        group.bench_with_input(BenchmarkId::new("worst_case", count), &count, |b, _| {
            b.iter(|| {
                let mut request = Request::new("GET", "/api/v1/endpoint0/42")
                    .with_header("x-tenant", "a");
                black_box(resolver.resolve(&mut request, &app))
            })
        });

        group.bench_with_input(BenchmarkId::new("no_match", count), &count, |b, _| {
            b.iter(|| {
                let mut request = Request::new("POST", "/missing");
                black_box(resolver.resolve(&mut request, &app))
            })
        });
    }

    group.finish();
}

fn bench_matcher(c: &mut Criterion) {
    let matcher = RequestMatcher::any(vec![
        RequestMatcher::path_matching(AttributeMatcher::regex(r"^/users/\d+$").unwrap()),
        RequestMatcher::param([("page", AttributeMatcher::contain("1"))]),
    ])
    .unwrap();

    c.bench_function("matcher/regex_or_param", |b| {
        b.iter(|| {
            let mut request = Request::new("GET", "/users/123").with_param("page", "10");
            black_box(matcher.matches(&mut request))
        })
    });
}

criterion_group!(benches, bench_resolve, bench_matcher);
criterion_main!(benches);

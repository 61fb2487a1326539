//! Benchmarks for the read-through cache.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::sync::Arc;

use teachtrack_core::cache::{
    CacheConfig, CacheKey, InMemoryBackend, InMemoryConfig, InvalidationEvent, ReadThroughCache,
};
use teachtrack_core::rbac::{Role, UserId};
use teachtrack_core::tenant::TenantId;

fn bench_key_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_key_build");
    let tenant = TenantId::new("0b6f1c1e-5d4c-4f43-9d0e-1f2a3b4c5d6e");
    let by_id = CacheKey::tenant_by_id(&tenant);
    let by_role = CacheKey::users_by_tenant_role(&tenant, Role::Student);

    group.bench_function("tenant_by_id", |b| b.iter(|| black_box(by_id.build(None))));
    group.bench_function("users_by_role_namespaced", |b| {
        b.iter(|| black_box(by_role.build(Some("teachtrack"))))
    });
    group.finish();
}

fn bench_invalidation_sets(c: &mut Criterion) {
    let mut group = c.benchmark_group("invalidation_keys");
    let tenant = TenantId::new("tenant-1");

    group.bench_function("tenant_renamed", |b| {
        b.iter(|| black_box(InvalidationEvent::tenant_renamed(tenant.clone(), "acme2", "acme").keys()))
    });
    group.bench_function("user_updated", |b| {
        b.iter(|| {
            black_box(InvalidationEvent::user_updated(UserId::new("user-1"), tenant.clone()).keys())
        })
    });
    group.finish();
}

fn bench_read_through(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_through");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let value = json!({"id": "tenant-1", "name": "Acme", "subdomain": "acme", "status": "ACTIVE"});

    for capacity in [100u64, 10_000] {
        let backend = Arc::new(InMemoryBackend::new(InMemoryConfig { max_capacity: capacity }));
        let cache = ReadThroughCache::new(backend, CacheConfig::default());
        let key = CacheKey::tenant_by_subdomain("acme");
        rt.block_on(async {
            cache
                .get_or_populate(&key, || async { Ok(Some(value.clone())) })
                .await
                .unwrap();
        });

        group.bench_with_input(BenchmarkId::new("hit", capacity), &key, |b, key| {
            b.to_async(&rt).iter(|| async {
                black_box(
                    cache
                        .get_or_populate::<serde_json::Value, _, _>(key, || async { Ok(None) })
                        .await
                        .unwrap(),
                )
            })
        });
    }

    let cache = ReadThroughCache::in_memory();
    let key = CacheKey::tenant_by_subdomain("acme");
    let keys = InvalidationEvent::tenant(TenantId::new("tenant-1"), "acme").keys();
    group.bench_function("miss_then_invalidate", |b| {
        b.to_async(&rt).iter(|| async {
            cache
                .get_or_populate(&key, || async { Ok(Some(value.clone())) })
                .await
                .unwrap();
            cache.invalidate(&keys).await.unwrap();
        })
    });
    group.finish();
}

criterion_group!(benches, bench_key_build, bench_invalidation_sets, bench_read_through);
criterion_main!(benches);

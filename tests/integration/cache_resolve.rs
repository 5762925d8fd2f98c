// Cache-backed capability resolution

use crate::common::{ScriptedRunner, all_encoders, context, intel_arc, offline_samples};
use ffcaps::engine::core::CancelFlag;
use ffcaps::engine::hardware::{DeviceId, HardwareFingerprint, PLATFORM_LINUX};
use ffcaps::engine::{
    Accelerator, CacheLookup, CacheMiss, CapabilityCache, Codec, EncoderBenchmark, PowerMode,
    resolve_capabilities,
};
use tempfile::TempDir;

fn vaapi_runner() -> ScriptedRunner {
    ScriptedRunner::new()
        .speed(Accelerator::Vaapi, Codec::Hevc, PowerMode::Normal, 4.0)
        .speed(Accelerator::Software, Codec::H264, PowerMode::Normal, 1.0)
}

#[test]
fn test_miss_probes_and_persists() {
    let temp = TempDir::new().unwrap();
    let cache = CapabilityCache::new(temp.path());
    let runner = vaapi_runner();
    let ctx = context(all_encoders());

    let snap = resolve_capabilities(
        &cache,
        &ctx,
        &offline_samples(temp.path()),
        &EncoderBenchmark::new(&runner),
        &[Accelerator::Vaapi],
        false,
    );

    assert_eq!(snap.best_accelerator, Accelerator::Vaapi);
    assert!(runner.encode_count() > 0);
    assert_eq!(cache.load(&intel_arc()), CacheLookup::Hit(snap));
}

#[test]
fn test_hit_skips_benchmark() {
    let temp = TempDir::new().unwrap();
    let cache = CapabilityCache::new(temp.path());
    let ctx = context(all_encoders());
    let samples = offline_samples(temp.path());

    let first = vaapi_runner();
    let snap = resolve_capabilities(&cache, &ctx, &samples, &EncoderBenchmark::new(&first), &[Accelerator::Vaapi], false);

    let second = ScriptedRunner::new();
    let again = resolve_capabilities(&cache, &ctx, &samples, &EncoderBenchmark::new(&second), &[Accelerator::Vaapi], false);

    assert_eq!(second.encode_count(), 0);
    assert_eq!(again, snap);
}

#[test]
fn test_force_bypasses_cache() {
    let temp = TempDir::new().unwrap();
    let cache = CapabilityCache::new(temp.path());
    let ctx = context(all_encoders());
    let samples = offline_samples(temp.path());

    resolve_capabilities(&cache, &ctx, &samples, &EncoderBenchmark::new(&vaapi_runner()), &[Accelerator::Vaapi], false);

    // GPU now fails every trial
    let broken = ScriptedRunner::new().speed(Accelerator::Software, Codec::Hevc, PowerMode::Normal, 0.5);
    let snap = resolve_capabilities(&cache, &ctx, &samples, &EncoderBenchmark::new(&broken), &[Accelerator::Vaapi], true);

    assert!(broken.encode_count() > 0);
    assert_eq!(snap.best_accelerator, Accelerator::Software);
    assert_eq!(cache.load(&intel_arc()), CacheLookup::Hit(snap));
}

#[test]
fn test_hardware_change_reprobes() {
    let temp = TempDir::new().unwrap();
    let cache = CapabilityCache::new(temp.path());
    let samples = offline_samples(temp.path());

    resolve_capabilities(
        &cache,
        &context(all_encoders()),
        &samples,
        &EncoderBenchmark::new(&vaapi_runner()),
        &[Accelerator::Vaapi],
        false,
    );

    let new_gpu = HardwareFingerprint::new(PLATFORM_LINUX, vec![DeviceId::new("8086", "e20b")]);
    assert!(matches!(
        cache.load(&new_gpu),
        CacheLookup::Miss(CacheMiss::FingerprintMismatch { .. })
    ));

    let ctx = ffcaps::engine::ProbeContext::new(new_gpu.clone(), all_encoders());
    let runner = vaapi_runner();
    let snap = resolve_capabilities(&cache, &ctx, &samples, &EncoderBenchmark::new(&runner), &[Accelerator::Vaapi], false);

    assert!(runner.encode_count() > 0);
    assert_eq!(snap.hardware_fingerprint, "linux|8086:e20b");
    assert!(matches!(cache.load(&new_gpu), CacheLookup::Hit(_)));
    assert!(matches!(cache.load(&intel_arc()), CacheLookup::Miss(_)));
}

#[test]
fn test_cancelled_probe_is_not_cached() {
    let temp = TempDir::new().unwrap();
    let cache = CapabilityCache::new(temp.path());
    let cancel = CancelFlag::new();
    let ctx = context(all_encoders()).with_cancel(cancel.clone());
    let runner = vaapi_runner().cancel_after(1, cancel);

    resolve_capabilities(
        &cache,
        &ctx,
        &offline_samples(temp.path()),
        &EncoderBenchmark::new(&runner),
        &[Accelerator::Vaapi],
        false,
    );

    assert_eq!(cache.load(&intel_arc()), CacheLookup::Miss(CacheMiss::Absent));
}

#[test]
fn test_offline_sample_skips_decode_probe() {
    let temp = TempDir::new().unwrap();
    let cache = CapabilityCache::new(temp.path().join("cache"));
    let runner = vaapi_runner().decodes(Accelerator::Vaapi);

    let snap = resolve_capabilities(
        &cache,
        &context(all_encoders()),
        &offline_samples(temp.path()),
        &EncoderBenchmark::new(&runner),
        &[Accelerator::Vaapi],
        false,
    );

    assert!(runner.decode_calls.borrow().is_empty());
    assert!(!snap.supports_10bit_decode);
}

#[test]
fn test_repeated_loads_are_identical() {
    let temp = TempDir::new().unwrap();
    let cache = CapabilityCache::new(temp.path());
    resolve_capabilities(
        &cache,
        &context(all_encoders()),
        &offline_samples(temp.path()),
        &EncoderBenchmark::new(&vaapi_runner()),
        &[Accelerator::Vaapi],
        false,
    );

    assert_eq!(cache.load(&intel_arc()), cache.load(&intel_arc()));
}

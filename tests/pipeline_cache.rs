//! Pipeline cache behaviour under concurrency, with host-only compilers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;

use gllm_gemm::{
    GemmError, GemmKey, GemmPrecision, GemmProblemDescriptor, GemmResult, GemmSourceOptions, PipelineCache,
    PipelineCompiler,
};

/// Records how many times each key was compiled.
#[derive(Default)]
struct RecordingCompiler {
    calls: AtomicUsize,
    keys: Mutex<Vec<GemmKey>>,
}

impl PipelineCompiler for RecordingCompiler {
    type Pipeline = String;

    fn compile(&self, key: &GemmKey, source: &str, entry_point: &str) -> GemmResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys.lock().unwrap().push(*key);
        // Long enough for racing callers to pile up on the slot.
        std::thread::sleep(Duration::from_millis(20));
        assert!(source.contains(entry_point));
        Ok(format!("{key}"))
    }
}

fn options() -> GemmSourceOptions {
    GemmSourceOptions::new("kernel void gemm() {}", "gemm")
}

#[test]
fn test_concurrent_register_compiles_once() {
    let _ = env_logger::builder().is_test(true).try_init();
    let cache = PipelineCache::new(RecordingCompiler::default(), options());
    let descriptor = GemmProblemDescriptor::new(256, 128, 64, GemmPrecision::BF16);

    let pipelines: Vec<Arc<String>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = &cache;
                // Half the callers spell out the default leading dimensions.
                let descriptor = if i % 2 == 0 {
                    descriptor
                } else {
                    descriptor.with_leading_dimensions(Some(64), Some(128), Some(128))
                };
                s.spawn(move || cache.register(&descriptor).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(cache.compiler().calls.load(Ordering::SeqCst), 1);
    assert!(pipelines.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    let stats = cache.stats();
    assert_eq!(stats.compilations, 1);
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 7);
}

#[test]
fn test_distinct_keys_get_distinct_pipelines() {
    let cache = PipelineCache::new(RecordingCompiler::default(), options());
    let dense = GemmProblemDescriptor::new(64, 64, 64, GemmPrecision::F16);
    let padded = dense.with_leading_dimensions(Some(72), None, None);
    let accumulate = dense.with_load_previous_c(true);

    let a = cache.register(&dense).unwrap();
    let b = cache.register(&padded).unwrap();
    let c = cache.register(&accumulate).unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.compiler().calls.load(Ordering::SeqCst), 3);

    let keys = cache.compiler().keys.lock().unwrap().clone();
    assert_eq!(keys[1].leading_dimensions.a, 72);
    assert!(keys[2].load_previous_c);
}

/// Blocks compilation of keys with `m == 1` until released.
struct GatedCompiler {
    started: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl PipelineCompiler for GatedCompiler {
    type Pipeline = u32;

    fn compile(&self, key: &GemmKey, _source: &str, _entry_point: &str) -> GemmResult<u32> {
        if key.m == 1 {
            self.started.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
        }
        Ok(key.m)
    }
}

#[test]
fn test_slow_compile_does_not_block_other_keys() {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let compiler = GatedCompiler {
        started: Mutex::new(started_tx),
        release: Mutex::new(release_rx),
    };
    let cache = PipelineCache::new(compiler, options());
    let slow = GemmProblemDescriptor::new(1, 8, 8, GemmPrecision::F32);
    let fast = GemmProblemDescriptor::new(2, 8, 8, GemmPrecision::F32);

    std::thread::scope(|s| {
        let handle = s.spawn(|| cache.register(&slow).unwrap());
        started_rx.recv().unwrap();

        // The slow key is mid-compile: lookup misses instead of waiting.
        assert!(cache.lookup(&slow).is_none());
        assert_eq!(*cache.register(&fast).unwrap(), 2);
        assert_eq!(cache.lookup(&fast).as_deref(), Some(&2));

        release_tx.send(()).unwrap();
        assert_eq!(*handle.join().unwrap(), 1);
    });
    assert_eq!(cache.len(), 2);
}

struct FlakyCompiler {
    attempts: AtomicUsize,
}

impl PipelineCompiler for FlakyCompiler {
    type Pipeline = usize;

    fn compile(&self, _key: &GemmKey, _source: &str, _entry_point: &str) -> GemmResult<usize> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt == 0 {
            Err(GemmError::Compilation("out of registers".into()))
        } else {
            Ok(attempt)
        }
    }
}

#[test]
fn test_failed_compile_is_not_cached() {
    let cache = PipelineCache::new(FlakyCompiler { attempts: AtomicUsize::new(0) }, options());
    let descriptor = GemmProblemDescriptor::new(16, 16, 16, GemmPrecision::F16);

    let err = cache.register(&descriptor).unwrap_err();
    assert_eq!(err.to_string(), "kernel compilation failed: out of registers");
    assert!(cache.lookup(&descriptor).is_none());

    // The next request compiles again instead of replaying the error.
    assert_eq!(*cache.register(&descriptor).unwrap(), 1);
    assert_eq!(cache.stats().failures, 1);
    assert_eq!(cache.stats().compilations, 1);
}

/// Fails every compile after a delay long enough for callers to queue up.
#[derive(Default)]
struct SlowFailingCompiler {
    calls: AtomicUsize,
}

impl PipelineCompiler for SlowFailingCompiler {
    type Pipeline = ();

    fn compile(&self, _key: &GemmKey, _source: &str, _entry_point: &str) -> GemmResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        Err(GemmError::Compilation(format!("attempt {call} rejected")))
    }
}

#[test]
fn test_concurrent_register_shares_one_failure() {
    let cache = PipelineCache::new(SlowFailingCompiler::default(), options());
    let descriptor = GemmProblemDescriptor::new(96, 96, 96, GemmPrecision::BF16);
    let start = Barrier::new(8);

    let errors: Vec<GemmError> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (cache, start) = (&cache, &start);
                s.spawn(move || {
                    start.wait();
                    cache.register(&descriptor).unwrap_err()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(cache.compiler().calls.load(Ordering::SeqCst), 1);
    assert!(errors.iter().all(|err| *err == GemmError::Compilation("attempt 0 rejected".into())));
    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.failures, 1);
    assert!(cache.is_empty());

    // Once every waiter has its answer, the key is retried from scratch.
    let err = cache.register(&descriptor).unwrap_err();
    assert_eq!(err, GemmError::Compilation("attempt 1 rejected".into()));
    assert_eq!(cache.compiler().calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_lookup_misses_are_counted_apart_from_compiles() {
    let cache = PipelineCache::new(RecordingCompiler::default(), options());
    let descriptor = GemmProblemDescriptor::new(32, 32, 32, GemmPrecision::F32);

    assert!(cache.lookup(&descriptor).is_none());
    assert!(cache.lookup(&descriptor).is_none());
    cache.register(&descriptor).unwrap();
    assert!(cache.lookup(&descriptor).is_some());

    let stats = cache.stats();
    assert_eq!(stats.lookup_misses, 2);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.compilations, 1);
}

//! Pipeline cache: canonical GEMM descriptor -> compiled kernel.
//!
//! The key space sits behind an `RwLock` that is only held long enough to
//! find or insert a slot. Each slot carries its own compile lock, so a miss
//! compiles exactly once per key while lookups of other keys proceed.
//! Callers that queued behind a failing compile receive its error instead of
//! compiling again.
//!
//! Compiled entries live as long as the cache; nothing is evicted. The slot
//! of a failed key is dropped once its last waiter has returned, so a later
//! `register` starts from scratch.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use std::time::Instant;

use crate::error::{GemmError, GemmResult};
use crate::gemm::descriptor::{GemmKey, GemmProblemDescriptor};
use crate::gemm::source::{create_gemm_source, GemmSourceOptions};

/// Environment variable naming a directory that receives every generated
/// module before it is compiled.
pub const SOURCE_DUMP_ENV: &str = "GLLM_GEMM_SOURCE_DUMP";

/// Turns generated source into a pipeline object.
///
/// Implementations may take a long time (tens to hundreds of milliseconds);
/// the cache guarantees they are called at most once per successfully
/// compiled key.
pub trait PipelineCompiler: Send + Sync {
    type Pipeline: Send + Sync;

    fn compile(&self, key: &GemmKey, source: &str, entry_point: &str) -> GemmResult<Self::Pipeline>;
}

/// Cache settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheConfig {
    /// Write each generated module to `<dir>/gemm_<fingerprint>.metal`.
    pub source_dump_dir: Option<PathBuf>,
}

impl CacheConfig {
    /// Read overrides from the environment (`GLLM_GEMM_SOURCE_DUMP`).
    pub fn from_env() -> Self {
        let source_dump_dir = std::env::var_os(SOURCE_DUMP_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Self { source_dump_dir }
    }
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// `lookup` or `register` calls served by an already compiled pipeline.
    pub hits: u64,
    /// `register` calls that ran the compiler.
    pub misses: u64,
    /// `lookup` calls that found nothing, including keys mid-compile.
    pub lookup_misses: u64,
    /// Successful compilations.
    pub compilations: u64,
    /// Failed compilations. Waiters handed the same error are not counted.
    pub failures: u64,
    /// Compiled entries.
    pub entries: usize,
}

#[derive(Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    lookup_misses: AtomicU64,
    compilations: AtomicU64,
    failures: AtomicU64,
}

struct Slot<P> {
    pipeline: OnceLock<Arc<P>>,
    /// Failed compiles so far. Only bumped while `compiling` is held.
    failed_attempts: AtomicU64,
    /// Compile lock, holding the error of the most recent failed attempt.
    compiling: Mutex<Option<GemmError>>,
}

impl<P> Slot<P> {
    fn new() -> Self {
        Self {
            pipeline: OnceLock::new(),
            failed_attempts: AtomicU64::new(0),
            compiling: Mutex::new(None),
        }
    }
}

/// Owned cache of compiled GEMM pipelines.
pub struct PipelineCache<C: PipelineCompiler> {
    compiler: C,
    source_options: GemmSourceOptions,
    config: CacheConfig,
    slots: RwLock<HashMap<GemmKey, Arc<Slot<C::Pipeline>>>>,
    counters: CacheCounters,
}

impl<C: PipelineCompiler> PipelineCache<C> {
    pub fn new(compiler: C, source_options: GemmSourceOptions) -> Self {
        Self::with_config(compiler, source_options, CacheConfig::default())
    }

    pub fn with_config(compiler: C, source_options: GemmSourceOptions, config: CacheConfig) -> Self {
        Self {
            compiler,
            source_options,
            config,
            slots: RwLock::new(HashMap::new()),
            counters: CacheCounters::default(),
        }
    }

    /// The compiled pipeline for `descriptor`, if one has been registered.
    /// Never compiles and never waits on a compilation in progress.
    pub fn lookup(&self, descriptor: &GemmProblemDescriptor) -> Option<Arc<C::Pipeline>> {
        let key = descriptor.canonicalize();
        let found = self.ready(&key);
        let counter = if found.is_some() { &self.counters.hits } else { &self.counters.lookup_misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// The compiled pipeline for `descriptor`, compiling it first if needed.
    ///
    /// Concurrent calls for the same canonical key compile once and all
    /// receive the same `Arc`, or the same error if that compile fails.
    /// Errors leave the key unregistered; a call made after the failure was
    /// returned compiles again.
    pub fn register(&self, descriptor: &GemmProblemDescriptor) -> GemmResult<Arc<C::Pipeline>> {
        let key = descriptor.canonicalize();
        if let Some(pipeline) = self.ready(&key) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            log::debug!("pipeline cache hit: {key}");
            return Ok(pipeline);
        }

        let slot = self.slot(&key);
        let result = self.compile_once(&key, &slot);
        if result.is_err() {
            self.release_failed(&key, slot);
        }
        result
    }

    fn compile_once(&self, key: &GemmKey, slot: &Slot<C::Pipeline>) -> GemmResult<Arc<C::Pipeline>> {
        let observed_failures = slot.failed_attempts.load(Ordering::Acquire);
        let mut last_failure = slot.compiling.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pipeline) = slot.pipeline.get() {
            // Another caller finished compiling while we waited.
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(pipeline));
        }
        if slot.failed_attempts.load(Ordering::Acquire) != observed_failures {
            // A compile that was in flight when we arrived has failed.
            if let Some(err) = last_failure.as_ref() {
                log::debug!("reusing failed compile result for {key}");
                return Err(err.clone());
            }
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let source = create_gemm_source(key, &self.source_options);
        self.dump_source(key, &source);

        let start = Instant::now();
        match self.compiler.compile(key, &source, &self.source_options.entry_point) {
            Ok(pipeline) => {
                let pipeline = Arc::new(pipeline);
                let stored = Arc::clone(slot.pipeline.get_or_init(|| Arc::clone(&pipeline)));
                self.counters.compilations.fetch_add(1, Ordering::Relaxed);
                log::info!("compiled {key} in {:.1} ms", start.elapsed().as_secs_f64() * 1e3);
                Ok(stored)
            }
            Err(err) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                log::error!("failed to compile {key}: {err}");
                *last_failure = Some(err.clone());
                slot.failed_attempts.fetch_add(1, Ordering::Release);
                Err(err)
            }
        }
    }

    /// Drop the slot of a failed key once no other caller holds it.
    fn release_failed(&self, key: &GemmKey, slot: Arc<Slot<C::Pipeline>>) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let unshared = slots
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, &slot) && Arc::strong_count(&slot) == 2);
        if unshared && slot.pipeline.get().is_none() {
            slots.remove(key);
        }
        // Let go of our handle while the write lock is still held, so the
        // last of several failing waiters sees a count of two.
        drop(slot);
        drop(slots);
    }

    /// Number of slots in the key map, compiled or not.
    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.read_slots().len()
    }

    /// Number of compiled entries.
    pub fn len(&self) -> usize {
        self.read_slots()
            .values()
            .filter(|slot| slot.pipeline.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            compilations: self.counters.compilations.load(Ordering::Relaxed),
            lookup_misses: self.counters.lookup_misses.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn ready(&self, key: &GemmKey) -> Option<Arc<C::Pipeline>> {
        self.read_slots()
            .get(key)
            .and_then(|slot| slot.pipeline.get().cloned())
    }

    fn slot(&self, key: &GemmKey) -> Arc<Slot<C::Pipeline>> {
        if let Some(slot) = self.read_slots().get(key) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(*key).or_insert_with(|| Arc::new(Slot::new())))
    }

    fn read_slots(&self) -> std::sync::RwLockReadGuard<'_, HashMap<GemmKey, Arc<Slot<C::Pipeline>>>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn dump_source(&self, key: &GemmKey, source: &str) {
        let Some(dir) = &self.config.source_dump_dir else {
            return;
        };
        let path = dir.join(format!("gemm_{:016x}.metal", key.fingerprint()));
        let result = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, source));
        match result {
            Ok(()) => log::debug!("dumped source for {key} to {:?}", path),
            Err(e) => log::warn!("failed to dump source for {key} to {:?}: {}", path, e),
        }
    }
}

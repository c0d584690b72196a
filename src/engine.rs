//! `Engine`: the label → source registry views and aggregation are built
//! against, plus the worker-pool sizing (`workers`, `progress`) every
//! parallel driver reads. Grounded on
//! `original_source/gendas/engine.py:Gendas`.
//!
//! An `Engine` is built once (`EngineBuilder`) and is immutable afterward —
//! there is no API to register a source into a live `Engine` — matching
//! the data model's "constructed once" invariant and sidestepping any need
//! for interior mutability in the registry itself.
use crate::aggregate::GroupBy;
use crate::config;
use crate::error::{EngineError, Result};
use crate::intern::{intern, Symbol};
use crate::pool::Executor;
use crate::row::Row;
use crate::source::{MemSource, Partition, RefSeqSource, Source, TabixSource};
use crate::statistics;
use crate::view::{Column, Dataset, RowView};
use fnv::FnvHashMap;
use std::path::Path;
use std::sync::Arc;

pub struct Engine {
    sources: FnvHashMap<Symbol, Arc<dyn Source>>,
    workers: usize,
    progress: usize,
}

impl Engine {
    pub fn source(&self, label: &str) -> Result<Arc<dyn Source>> {
        self.sources
            .get(&intern(label))
            .cloned()
            .ok_or_else(|| EngineError::Schema(format!("no source registered under label '{label}'")))
    }

    pub fn dataset(&self, label: &str) -> Result<Arc<dyn RowView>> {
        Ok(Dataset::new(self.source(label)?))
    }

    pub fn groupby(self: &Arc<Self>, column: Column) -> GroupBy {
        GroupBy::new(self.clone(), column)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn progress(&self) -> usize {
        self.progress
    }

    /// Count `view`'s rows. This is the dataset-wide map/count entry
    /// point named in §5 ("(i) dataset-wide map"): with more than one
    /// worker configured, the scan is driven across `workers` partitions
    /// through the pool in parallel; with one worker it is a plain
    /// sequential scan, matching `_count_seq`/`_count_par` in
    /// `original_source/gendas/engine.py`. A plain dataset/filter's own
    /// `len()` is reused as the fast path when available; a merge-rooted
    /// view (whose `len()` always fails, §4.2/Open Question 2) still
    /// counts correctly by falling back to an actual scan — `count` is
    /// never refused, only `len`.
    pub fn count(&self, view: &Arc<dyn RowView>) -> Result<usize> {
        if self.workers <= 1 {
            return view.len().or_else(|_| Ok(statistics::count(view.iterate(None))));
        }
        Ok(self.map(view, |_row| ())?.len())
    }

    /// Drive `view` across `self.workers` partitions in parallel, applying
    /// `f` to every row (the dataset-wide parallel map driver of §5). Each
    /// partition's rows keep their relative order; partitions are
    /// round-robin interleaved against each other, matching §5's "ordered
    /// per worker but interleaved across workers." Falls back to a plain
    /// single-threaded scan when only one worker is configured. A
    /// panicking `f` surfaces as `EngineError::WorkerFailure` (§7) rather
    /// than being silently dropped.
    pub fn map<T, F>(&self, view: &Arc<dyn RowView>, f: F) -> Result<Vec<T>>
    where
        F: Fn(Row) -> T + Send + Sync + 'static,
        T: Send + 'static,
    {
        if self.workers <= 1 {
            return Ok(view.iterate(None).map(f).collect());
        }
        let f = Arc::new(f);
        let workers = self.workers as u32;
        let mut jobs: Vec<(usize, Box<dyn FnOnce() -> Vec<T> + Send>)> = Vec::new();
        for k in 0..workers {
            let view = view.clone();
            let f = f.clone();
            let partition = Partition::new(k, workers);
            jobs.push((
                1,
                Box::new(move || view.iterate(Some(partition)).map(|row| f(row)).collect()),
            ));
        }
        let partitions = Executor::map_ordered(self.workers, jobs)?;
        Ok(interleave(partitions))
    }
}

/// Round-robin merge of per-partition result vectors: each partition's own
/// order is preserved, but partitions are interleaved against each other
/// rather than concatenated, per §5.
fn interleave<T>(partitions: Vec<Vec<T>>) -> Vec<T> {
    let mut iters: Vec<_> = partitions.into_iter().map(|v| v.into_iter()).collect();
    let mut out = Vec::new();
    loop {
        let mut any = false;
        for it in iters.iter_mut() {
            if let Some(item) = it.next() {
                out.push(item);
                any = true;
            }
        }
        if !any {
            break;
        }
    }
    out
}

/// Builds an `Engine`. Source registration and worker/progress tuning both
/// happen here; `build()` validates and freezes the result.
pub struct EngineBuilder {
    sources: FnvHashMap<Symbol, Arc<dyn Source>>,
    workers: usize,
    progress: usize,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> EngineBuilder {
        let workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        EngineBuilder {
            sources: FnvHashMap::default(),
            workers,
            progress: 20,
        }
    }

    pub fn workers(mut self, workers: usize) -> EngineBuilder {
        self.workers = workers;
        self
    }

    pub fn progress(mut self, progress: usize) -> EngineBuilder {
        self.progress = progress;
        self
    }

    pub fn register(mut self, label: &str, source: Arc<dyn Source>) -> Result<EngineBuilder> {
        let symbol = intern(label);
        if self.sources.contains_key(&symbol) {
            return Err(EngineError::Config(format!("source label '{label}' registered twice")));
        }
        source.set_label(symbol);
        self.sources.insert(symbol, source);
        Ok(self)
    }

    pub fn build(self) -> Result<Arc<Engine>> {
        if self.workers == 0 {
            return Err(EngineError::Config("workers must be at least 1".into()));
        }
        if self.progress == 0 {
            return Err(EngineError::Config("progress must be at least 1".into()));
        }
        log::debug!(
            "engine built with {} source(s), {} worker(s), progress factor {}",
            self.sources.len(),
            self.workers,
            self.progress
        );
        Ok(Arc::new(Engine {
            sources: self.sources,
            workers: self.workers,
            progress: self.progress,
        }))
    }

    /// Build every source named in a config file and register it under its
    /// section name. See `config` for the (deliberately small) file format.
    pub fn from_config(path: &Path) -> Result<EngineBuilder> {
        let mut builder = EngineBuilder::new();
        for entry in config::load(path)? {
            let header: Vec<String> = entry.header.clone();
            let schema = Arc::new(crate::schema::Schema::new(
                &header,
                entry.ctypes.clone(),
                &entry.sequence,
                &entry.begin,
                &entry.end,
            )?);
            let indexed: Vec<&str> = entry.indices.iter().map(|s| s.as_str()).collect();
            let source: Arc<dyn Source> = match entry.kind.as_str() {
                "mem" => Arc::new(MemSource::open(&entry.file, schema, &indexed, false)?),
                "tabix" => Arc::new(TabixSource::open(&entry.file, schema, &indexed, false)?),
                "refseq" => Arc::new(RefSeqSource::open(&entry.file)?),
                other => {
                    return Err(EngineError::Config(format!(
                        "unknown source type '{other}' for section [{}]",
                        entry.label
                    )))
                }
            };
            builder = builder.register(&entry.label, source)?;
        }
        Ok(builder)
    }
}

//! The lazy view algebra: composable, non-buffering views over one or more
//! sources. Every view here is built once and shared via `Arc`, so it can
//! be handed to worker threads for partitioned iteration without copying.
mod merge;
mod slice;

pub use merge::{Merge, MergeDataset, MergeFilter, MergePredicate, MergeView, MultiMerge};
pub use slice::{Slice, SliceDataset};

use crate::error::{EngineError, Result};
use crate::intern::{intern, Symbol};
use crate::row::Row;
use crate::schema::Schema;
use crate::source::{Partition, Source};
use crate::statistics::count;
use std::sync::Arc;

/// A predicate over a single-source row, used by `Filter`.
pub type Predicate = Arc<dyn Fn(&Row) -> bool + Send + Sync>;

/// Every view whose items are single-source `Row`s: `Dataset`, `Filter`,
/// `SliceDataset`, and `MergeDataset` (a merge view indexed down to one
/// participating source).
pub trait RowView: Send + Sync {
    fn iterate<'a>(&'a self, partition: Option<Partition>) -> Box<dyn Iterator<Item = Row> + 'a>;

    /// `Ok(n)` for plain datasets/filters (always a full scan); `Err` for
    /// anything rooted in a merge, per Open Question 2 (SPEC_FULL.md §9).
    fn len(&self) -> Result<usize>;

    /// The schema of the rows this view produces, when defined uniformly
    /// (every `RowView` in this crate has one).
    fn schema(&self) -> Option<&Schema> {
        None
    }

    /// The single source this view's rows are ultimately drawn from, if
    /// one exists. Used by `groupby` to find a source-level group index.
    fn root_source(&self) -> Option<Arc<dyn Source>> {
        None
    }
}

/// A raw, unfiltered view over one registered source.
pub struct Dataset {
    source: Arc<dyn Source>,
}

impl Dataset {
    pub fn new(source: Arc<dyn Source>) -> Arc<Dataset> {
        Arc::new(Dataset { source })
    }
}

impl RowView for Dataset {
    fn iterate<'a>(&'a self, partition: Option<Partition>) -> Box<dyn Iterator<Item = Row> + 'a> {
        self.source.iterate(partition)
    }

    fn len(&self) -> Result<usize> {
        Ok(count(self.source.iterate(None)))
    }

    fn schema(&self) -> Option<&Schema> {
        Some(self.source.schema())
    }

    fn root_source(&self) -> Option<Arc<dyn Source>> {
        Some(self.source.clone())
    }
}

/// A predicate-filtered view over a parent `RowView`. Partitioning forwards
/// to the parent: the predicate is applied after the parent yields its
/// shard, never before.
pub struct Filter {
    parent: Arc<dyn RowView>,
    predicate: Predicate,
}

impl Filter {
    pub fn new(parent: Arc<dyn RowView>, predicate: Predicate) -> Arc<Filter> {
        Arc::new(Filter { parent, predicate })
    }
}

impl RowView for Filter {
    fn iterate<'a>(&'a self, partition: Option<Partition>) -> Box<dyn Iterator<Item = Row> + 'a> {
        let predicate = self.predicate.clone();
        Box::new(self.parent.iterate(partition).filter(move |row| predicate(row)))
    }

    fn len(&self) -> Result<usize> {
        self.parent.len().map(|_| count(self.iterate(None)))
    }

    fn schema(&self) -> Option<&Schema> {
        self.parent.schema()
    }

    fn root_source(&self) -> Option<Arc<dyn Source>> {
        self.parent.root_source()
    }
}

/// A single-column projection of a `RowView`: `Column(parent, label)`
/// yields `parent[label]` for every row. Indexing a merge view by a
/// *source* label produces a `MergeDataset` instead (see `merge.rs`); a
/// `Column` further applied to that `MergeDataset` is how this crate
/// implements what the distilled spec calls `MergeColumnView` — composition
/// of two more primitive views rather than a third dedicated type, since
/// the two give identical semantics here (see DESIGN.md).
pub struct Column {
    parent: Arc<dyn RowView>,
    label: Symbol,
}

impl Column {
    pub fn new(parent: Arc<dyn RowView>, label: &str) -> Result<Column> {
        if let Some(schema) = parent.schema() {
            if !schema.has_column(label) {
                return Err(EngineError::Schema(format!("unknown column '{label}'")));
            }
        }
        Ok(Column {
            parent,
            label: intern(label),
        })
    }

    pub fn label(&self) -> Symbol {
        self.label
    }

    pub fn root_source(&self) -> Option<Arc<dyn Source>> {
        self.parent.root_source()
    }

    pub fn iterate(&self) -> impl Iterator<Item = crate::value::Value> + '_ {
        let label = self.label;
        self.parent
            .iterate(None)
            .map(move |row| row.get(label.as_str()).cloned().expect("schema guarantees every column is present"))
    }

    /// `Ok(n)` only when the parent view can itself be sized; delegating
    /// rather than re-deriving keeps a `Column` over a merge failing the
    /// same way `len(Merge)` does (Open Question 2).
    pub fn len(&self) -> Result<usize> {
        self.parent.len()
    }
}

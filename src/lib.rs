//! segview — a lazy, interval-aware query engine for genomic tabular data.
//!
//! The mental model before the API: a *source* is anything that can answer
//! "give me every row overlapping this (sequence, begin, end) range" and
//! "give me every row" — a block-compressed file, an in-memory table, a
//! reference genome. A *view* composes sources without ever materializing
//! them: projection, filtering, interval-aware joins across sources, and
//! grouped aggregation, where each group's segments are evaluated against
//! a worker pool. Nothing downstream of `Source` ever touches a file
//! handle or a byte offset directly.
//!
//! The pieces, roughly bottom-up:
//!
//! - [`value`] / [`schema`] / [`row`] — the cell, column-layout, and
//!   record types every source and view shares.
//! - [`source`] — the `Source` trait and its three concrete adapters.
//! - [`view`] — the lazy view algebra: `Dataset`, `Filter`, `Column`,
//!   `Merge`, `MultiMerge`, `MergeFilter`, `Slice`.
//! - [`aggregate`] — grouped aggregation over a worker pool.
//! - [`pool`] — the worker pool itself.
//! - [`engine`] — the source registry everything above is built against.
//! - [`config`] / [`statistics`] — ambient support modules.
pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod intern;
pub mod pool;
pub mod row;
pub mod schema;
pub mod source;
pub mod statistics;
pub mod value;
pub mod view;

pub use aggregate::{AggRow, Aggregator, FlattenedAggregate, GroupBy};
pub use engine::{Engine, EngineBuilder};
pub use error::{EngineError, Result};
pub use row::{MergedRow, Row};
pub use schema::Schema;
pub use source::{MemSource, Partition, RefSeqSource, Segment, Source, TabixSource};
pub use value::{ColumnType, Value};
pub use view::{Column, Dataset, Filter, Merge, MergeDataset, MergeFilter, MergeView, MultiMerge, RowView, Slice, SliceDataset};

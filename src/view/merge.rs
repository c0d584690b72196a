//! The merge family: `Merge`, `MultiMerge`, `MergeFilter`, and
//! `MergeDataset` (indexing a merge view down to one participating
//! source's `Row`s). This is the interval-aware inner-join engine.
//!
//! The `begin - 1` widening below is the permanent, documented convention
//! resolved for Open Question 1 (SPEC_FULL.md §4.3/§9): a source's own
//! `query` is inclusive-inclusive on its coordinates, while `Row::begin`/
//! `Row::end` are half-open, so widening the left edge by one converts a
//! half-open row into the inclusive range the source expects.
use crate::error::{EngineError, Result};
use crate::intern::{intern, Symbol};
use crate::row::{MergedRow, Row};
use crate::source::{Partition, Source};
use crate::view::RowView;
use std::sync::Arc;

pub type MergePredicate = Arc<dyn Fn(&MergedRow) -> bool + Send + Sync>;

/// Every view whose items are `MergedRow`s.
pub trait MergeView: Send + Sync {
    fn iterate(&self, partition: Option<Partition>) -> Box<dyn Iterator<Item = MergedRow> + '_>;

    /// The participating sources, left to right in composition order.
    fn sources(&self) -> &[Arc<dyn Source>];

    /// Always fails: a merge view's size is never known without iterating
    /// it (§4.2/§7, `UnsizedView`).
    fn len(&self) -> Result<usize> {
        Err(EngineError::UnsizedView(
            "merge views cannot be sized without iterating them".into(),
        ))
    }
}

fn widened_query<'a>(
    source: &'a Arc<dyn Source>,
    seq: &crate::value::Value,
    begin: i64,
    end: i64,
) -> Box<dyn Iterator<Item = Row> + 'a> {
    source.query(seq, begin - 1, end)
}

/// Which side of a 2-source merge hosts an `on` column, resolved once at
/// construction (left is checked first).
enum Side {
    Left,
    Right,
}

/// The interval-aware inner join of a rooted `RowView` against one plain
/// source.
pub struct Merge {
    left: Arc<dyn RowView>,
    left_source: Arc<dyn Source>,
    right: Arc<dyn Source>,
    on: Vec<(Symbol, Side)>,
    sources: Vec<Arc<dyn Source>>,
}

impl Merge {
    pub fn new(left: Arc<dyn RowView>, right: Arc<dyn Source>, on: Option<&[&str]>) -> Result<Arc<Merge>> {
        let left_source = left.root_source().ok_or_else(|| {
            EngineError::Schema("merge's left side must be rooted in a single source".into())
        })?;
        let mut resolved = Vec::new();
        for &name in on.unwrap_or(&[]) {
            let side = if left_source.schema().has_column(name) {
                Side::Left
            } else if right.schema().has_column(name) {
                Side::Right
            } else {
                return Err(EngineError::Schema(format!(
                    "'on' column '{name}' not found in either merge side"
                )));
            };
            resolved.push((intern(name), side));
        }
        let sources = vec![left_source.clone(), right.clone()];
        Ok(Arc::new(Merge {
            left,
            left_source,
            right,
            on: resolved,
            sources,
        }))
    }

    fn on_matches(&self, left_row: &Row, right_row: &Row) -> bool {
        self.on.iter().all(|(name, side)| {
            let left_value = match side {
                Side::Left => left_row.get(name.as_str()),
                Side::Right => right_row.get(name.as_str()),
            };
            let right_value = match side {
                Side::Left => right_row.get(name.as_str()),
                Side::Right => left_row.get(name.as_str()),
            };
            left_value == right_value
        })
    }
}

impl MergeView for Merge {
    fn iterate(&self, partition: Option<Partition>) -> Box<dyn Iterator<Item = MergedRow> + '_> {
        let left_label = self.left_source.label();
        let right_label = self.right.label();
        Box::new(self.left.iterate(partition).flat_map(move |left_row| {
            let seq = left_row.seq().clone();
            let begin = left_row.begin();
            let end = left_row.end();
            let candidates: Vec<Row> = widened_query(&self.right, &seq, begin, end).collect();
            let left_row = left_row.clone();
            candidates
                .into_iter()
                .filter(move |right_row| self.on_matches(&left_row, right_row))
                .map(move |right_row| {
                    let mut merged = MergedRow::new();
                    merged.push(left_label, left_row.clone());
                    merged.push(right_label, right_row);
                    merged
                })
                .collect::<Vec<_>>()
                .into_iter()
        }))
    }

    fn sources(&self) -> &[Arc<dyn Source>] {
        &self.sources
    }
}

/// Extends an existing `MergeView` with one more plain source, narrowing
/// the coordinate range to the intersection of every participant so far.
/// Each `on` name must be hosted by both the new source and some existing
/// participant (resolved to that participant's index once, here).
pub struct MultiMerge {
    parent: Arc<dyn MergeView>,
    right: Arc<dyn Source>,
    on: Vec<(Symbol, usize)>,
    sources: Vec<Arc<dyn Source>>,
}

impl MultiMerge {
    pub fn new(parent: Arc<dyn MergeView>, right: Arc<dyn Source>, on: Option<&[&str]>) -> Result<Arc<MultiMerge>> {
        let mut resolved = Vec::new();
        for &name in on.unwrap_or(&[]) {
            if !right.schema().has_column(name) {
                return Err(EngineError::Schema(format!(
                    "'on' column '{name}' not found on the source being merged in"
                )));
            }
            let existing = parent
                .sources()
                .iter()
                .position(|s| s.schema().has_column(name))
                .ok_or_else(|| {
                    EngineError::Schema(format!(
                        "'on' column '{name}' not found in any already-merged source"
                    ))
                })?;
            resolved.push((intern(name), existing));
        }
        let mut sources = parent.sources().to_vec();
        sources.push(right.clone());
        Ok(Arc::new(MultiMerge {
            parent,
            right,
            on: resolved,
            sources,
        }))
    }

    fn on_matches(&self, merged: &MergedRow, candidate: &Row) -> bool {
        self.on.iter().all(|(name, existing_index)| {
            let label = self.parent.sources()[*existing_index].label();
            let existing_value = merged.get(label.as_str()).and_then(|r| r.get(name.as_str()));
            let candidate_value = candidate.get(name.as_str());
            existing_value == candidate_value
        })
    }
}

impl MergeView for MultiMerge {
    fn iterate(&self, partition: Option<Partition>) -> Box<dyn Iterator<Item = MergedRow> + '_> {
        let right_label = self.right.label();
        Box::new(self.parent.iterate(partition).flat_map(move |merged| {
            let (seq, begin, end) = intersection(&merged);
            let candidates: Vec<Row> = widened_query(&self.right, &seq, begin, end).collect();
            let merged = merged.clone();
            candidates
                .into_iter()
                .filter(move |candidate| self.on_matches(&merged, candidate))
                .map(move |candidate| {
                    let mut extended = merged.clone();
                    extended.push(right_label, candidate);
                    extended
                })
                .collect::<Vec<_>>()
                .into_iter()
        }))
    }

    fn sources(&self) -> &[Arc<dyn Source>] {
        &self.sources
    }
}

/// `begin* = max(begins)`, `end* = min(ends)` across every row already in
/// `merged`; sequence is taken from the left-most participant (all rows
/// share a sequence by construction, since every join step required
/// overlap on it).
fn intersection(merged: &MergedRow) -> (crate::value::Value, i64, i64) {
    let mut rows = merged.rows();
    let first = rows.next().expect("a MergedRow always has at least one source");
    let mut begin = first.begin();
    let mut end = first.end();
    for row in rows {
        begin = begin.max(row.begin());
        end = end.min(row.end());
    }
    (first.seq().clone(), begin, end)
}

/// A predicate-filtered `MergeView`.
pub struct MergeFilter {
    parent: Arc<dyn MergeView>,
    predicate: MergePredicate,
}

impl MergeFilter {
    pub fn new(parent: Arc<dyn MergeView>, predicate: MergePredicate) -> Arc<MergeFilter> {
        Arc::new(MergeFilter { parent, predicate })
    }
}

impl MergeView for MergeFilter {
    fn iterate(&self, partition: Option<Partition>) -> Box<dyn Iterator<Item = MergedRow> + '_> {
        let predicate = self.predicate.clone();
        Box::new(self.parent.iterate(partition).filter(move |row| predicate(row)))
    }

    fn sources(&self) -> &[Arc<dyn Source>] {
        self.parent.sources()
    }
}

/// A `MergeView` indexed down to one participating source: yields that
/// source's `Row` out of every merged row. Equivalent to the distilled
/// spec's "Column applied to a merged parent selects a nested source row."
pub struct MergeDataset {
    merge: Arc<dyn MergeView>,
    source: Arc<dyn Source>,
}

impl MergeDataset {
    pub fn new(merge: Arc<dyn MergeView>, source_label: &str) -> Result<Arc<MergeDataset>> {
        let source = merge
            .sources()
            .iter()
            .find(|s| s.label().as_str() == source_label)
            .cloned()
            .ok_or_else(|| EngineError::Schema(format!("'{source_label}' is not a participant in this merge")))?;
        Ok(Arc::new(MergeDataset { merge, source }))
    }
}

impl RowView for MergeDataset {
    fn iterate<'a>(&'a self, partition: Option<Partition>) -> Box<dyn Iterator<Item = Row> + 'a> {
        let label = self.source.label();
        Box::new(
            self.merge
                .iterate(partition)
                .map(move |merged| merged.get(label.as_str()).cloned().expect("source is always a participant")),
        )
    }

    fn len(&self) -> Result<usize> {
        // Delegates to the owning merge, which always fails (Open Question 2).
        self.merge.len()
    }

    fn schema(&self) -> Option<&crate::schema::Schema> {
        Some(self.source.schema())
    }

    fn root_source(&self) -> Option<Arc<dyn Source>> {
        Some(self.source.clone())
    }
}

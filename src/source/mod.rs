//! The `Source` trait: the one read contract every concrete adapter
//! implements. Everything above this line in the engine (views, joins,
//! aggregation) only ever talks to sources through these four operations.
mod mem;
mod refseq;
mod tabix;

pub use mem::MemSource;
pub use refseq::{ReferenceSlice, RefSeqSource};
pub use tabix::TabixSource;

use crate::error::Result;
use crate::intern::Symbol;
use crate::row::Row;
use crate::schema::Schema;
use crate::value::Value;

/// One shard of a partitioned iteration: take every ordinal `i` where
/// `i % count == index`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partition {
    pub index: u32,
    pub count: u32,
}

impl Partition {
    pub fn new(index: u32, count: u32) -> Partition {
        assert!(count > 0, "a partition count must be positive");
        assert!(index < count, "partition index must be < count");
        Partition { index, count }
    }

    pub fn includes(&self, ordinal: usize) -> bool {
        (ordinal as u32) % self.count == self.index
    }
}

/// A genomic segment: one `(sequence, begin, end)` triple, half-open on
/// `end`. Used as the unit a `Slice` is built from.
#[derive(Clone, Debug)]
pub struct Segment {
    pub seq: Value,
    pub begin: i64,
    pub end: i64,
}

/// An ordered mapping from a group column's distinct values to the list of
/// segments carrying that value, in the order a source chooses to report
/// them (typically file order). Built once per `(source, column)` pair at
/// `index` time.
pub type GroupIndex = Vec<(Value, Vec<Segment>)>;

/// The abstract read interface every concrete source adapter implements.
/// `Send + Sync` because sources are shared across worker threads via `Arc`.
pub trait Source: Send + Sync {
    /// The label this source was registered under. Panics if called before
    /// an `Engine` has registered it — sources are only ever handed to view
    /// code after registration, so this should never be reachable.
    fn label(&self) -> Symbol;

    /// Set this source's label. Called exactly once, by
    /// `EngineBuilder::register`.
    fn set_label(&self, label: Symbol);

    fn schema(&self) -> &Schema;

    /// Every row, or every row in partition `p` if one is given. Order is
    /// whatever the source considers natural (typically file order); it
    /// need not be sorted by coordinate.
    fn iterate<'a>(&'a self, partition: Option<Partition>) -> Box<dyn Iterator<Item = Row> + 'a>;

    /// Every row whose (sequence, begin, end) overlaps `[begin, end]`,
    /// inclusive on both ends, on this source's own sequence identity.
    fn query<'a>(&'a self, seq: &Value, begin: i64, end: i64) -> Box<dyn Iterator<Item = Row> + 'a>;

    /// Every segment `(seq, begin, end)` this source holds that overlaps
    /// the query range, without materializing full rows. Used to compute
    /// the narrowed coordinate triple at each join/merge step.
    fn intersect<'a>(
        &'a self,
        seq: &Value,
        begin: i64,
        end: i64,
    ) -> Box<dyn Iterator<Item = (Value, i64, i64)> + 'a>;

    /// The group index for `column`, if one was requested when this source
    /// was opened. Returns `Err(IndexMissing)` otherwise.
    fn index(&self, column: Symbol) -> Result<&GroupIndex>;
}

/// Parse one tab-separated record against `schema`, in column order. Shared
/// by the two text-backed adapters (`MemSource`, `TabixSource`).
pub(crate) fn parse_record(schema: &Schema, record: &csv::StringRecord) -> Result<Vec<Value>> {
    schema
        .columns()
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let raw = record.get(i).unwrap_or("");
            schema.ctype(i).parse(raw)
        })
        .collect()
}

/// Build the group index for `column` over a fully materialized row set,
/// preserving first-seen order of each distinct value.
pub(crate) fn build_index(schema: &Schema, rows: &[Row], column: Symbol) -> Result<GroupIndex> {
    use crate::error::EngineError;
    use fnv::FnvHashMap;

    if !schema.has_column(column.as_str()) {
        return Err(EngineError::Schema(format!(
            "cannot index unknown column '{}'",
            column.as_str()
        )));
    }
    let mut by_value: FnvHashMap<String, usize> = FnvHashMap::default();
    let mut index: GroupIndex = Vec::new();
    for row in rows {
        let value = row.get(column.as_str()).cloned().unwrap_or(Value::Str(String::new()));
        let key = value.to_string();
        let slot = match by_value.get(&key) {
            Some(&i) => i,
            None => {
                index.push((value, Vec::new()));
                let i = index.len() - 1;
                by_value.insert(key, i);
                i
            }
        };
        index[slot].1.push(Segment {
            seq: row.seq().clone(),
            begin: row.begin(),
            end: row.end(),
        });
    }
    Ok(index)
}

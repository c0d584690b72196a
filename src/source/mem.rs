//! A fully in-memory source: every row loaded once, kept sorted per
//! sequence for binary-search overlap queries.
//!
//! This stands in for the original's per-sequence interval tree. A sorted
//! vector plus a forward scan from the first candidate is the idiomatic
//! lightweight substitute when an implementation doesn't need true
//! logarithmic insertion (sources here are read-only once built) — see
//! `original_source/gendas/sources.py:IntervalTreeSource`.
use super::{build_index, parse_record, GroupIndex, Partition, Source};
use crate::error::{EngineError, Result};
use crate::intern::Symbol;
use crate::row::Row;
use crate::schema::Schema;
use crate::value::Value;
use fnv::FnvHashMap;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Arc, OnceLock};

pub struct MemSource {
    label: OnceLock<Symbol>,
    schema: Arc<Schema>,
    rows: Vec<Row>,
    /// row indices per sequence, sorted ascending by begin
    by_seq: FnvHashMap<String, Vec<usize>>,
    indices: FnvHashMap<Symbol, GroupIndex>,
}

impl MemSource {
    /// Build a source directly from already-parsed rows (the constructor
    /// used by tests and worked-scenario fixtures).
    pub fn from_rows(schema: Arc<Schema>, rows: Vec<Row>, indexed_columns: &[&str]) -> Result<MemSource> {
        let by_seq = build_seq_index(&rows);
        let mut indices = FnvHashMap::default();
        for &name in indexed_columns {
            let sym = crate::intern::intern(name);
            indices.insert(sym, build_index(&schema, &rows, sym)?);
        }
        Ok(MemSource {
            label: OnceLock::new(),
            schema,
            rows,
            by_seq,
            indices,
        })
    }

    /// Load a plain tab-separated file (no block compression) fully into
    /// memory. Lines starting with `#` are skipped, matching the original's
    /// comment convention (`original_source/gendas/utils.py:_skip_comments`).
    pub fn open(path: &Path, schema: Arc<Schema>, indexed_columns: &[&str], has_header: bool) -> Result<MemSource> {
        let file = std::fs::File::open(path)
            .map_err(|e| EngineError::Config(format!("cannot open {}: {e}", path.display())))?;
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(has_header)
            .comment(Some(b'#'))
            .from_reader(BufReader::new(file));
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|e| EngineError::Config(format!("malformed row in {}: {e}", path.display())))?;
            rows.push(Row::new(schema.clone(), parse_record(&schema, &record)?));
        }
        Self::from_rows(schema, rows, indexed_columns)
    }
}

fn build_seq_index(rows: &[Row]) -> FnvHashMap<String, Vec<usize>> {
    let mut by_seq: FnvHashMap<String, Vec<usize>> = FnvHashMap::default();
    for (i, row) in rows.iter().enumerate() {
        by_seq.entry(row.seq().to_string()).or_default().push(i);
    }
    for indices in by_seq.values_mut() {
        indices.sort_by_key(|&i| rows[i].begin());
    }
    by_seq
}

impl Source for MemSource {
    fn label(&self) -> Symbol {
        *self
            .label
            .get()
            .expect("source used before being registered with an engine")
    }

    fn set_label(&self, label: Symbol) {
        let _ = self.label.set(label);
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn iterate<'a>(&'a self, partition: Option<Partition>) -> Box<dyn Iterator<Item = Row> + 'a> {
        match partition {
            None => Box::new(self.rows.iter().cloned()),
            Some(p) => Box::new(
                self.rows
                    .iter()
                    .enumerate()
                    .filter(move |(i, _)| p.includes(*i))
                    .map(|(_, r)| r.clone()),
            ),
        }
    }

    fn query<'a>(&'a self, seq: &Value, begin: i64, end: i64) -> Box<dyn Iterator<Item = Row> + 'a> {
        let Some(indices) = self.by_seq.get(seq.to_string().as_str()) else {
            return Box::new(std::iter::empty());
        };
        // indices is sorted ascending by begin. The stored interval tree
        // slot is conceptually [begin, end+1), sliced against [begin,end)
        // exactly like the original's `self._trees[sequence][begin:end]`
        // (sources.py:253), so the upper bound is strict on begin: once
        // begin() >= end no later row in the slice can overlap either.
        let upper = indices.partition_point(|&i| self.rows[i].begin() < end);
        Box::new(
            indices[..upper]
                .iter()
                .map(move |&i| &self.rows[i])
                .filter(move |r| r.end() >= begin)
                .cloned(),
        )
    }

    fn intersect<'a>(
        &'a self,
        seq: &Value,
        begin: i64,
        end: i64,
    ) -> Box<dyn Iterator<Item = (Value, i64, i64)> + 'a> {
        Box::new(
            self.query(seq, begin, end)
                .map(|r| (r.seq().clone(), r.begin(), r.end() + 1)),
        )
    }

    fn index(&self, column: Symbol) -> Result<&GroupIndex> {
        self.indices.get(&column).ok_or_else(|| EngineError::IndexMissing {
            source: self.label.get().map(|s| s.as_str().to_string()).unwrap_or_default(),
            column: column.as_str().to_string(),
        })
    }
}

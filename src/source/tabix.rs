//! A block-gzip-compressed, tab-separated source.
//!
//! BGZF is valid multi-member gzip, so a standard decoder reads it back
//! correctly end to end without understanding the BGZF block framing at
//! all. What a standard decoder *can't* do is seek: the `.tbi` sidecar
//! (bin numbers keyed by `reg2bin`, a linear index of virtual file offsets
//! — see `original_source/gendas/tabix/{constants,index,reader}.py`) is a
//! nontrivial binary format of its own, and parsing it is out of scope
//! here (§1). `query`/`intersect` fall back to a full decompressing scan
//! filtered by overlap; this is slower than indexed seeks but behaviorally
//! identical, and is the documented trade-off rather than a hidden one.
//! The overlap predicate (`begin() < end`, `end() >= begin`) mirrors
//! `MemSource::query`'s strict-on-begin convention exactly (D1, see
//! DESIGN.md) — every `Source` impl answers the same query the same way
//! regardless of backing format.
use super::{build_index, parse_record, GroupIndex, Partition, Source};
use crate::error::{EngineError, Result};
use crate::intern::Symbol;
use crate::row::Row;
use crate::schema::Schema;
use crate::value::Value;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

pub struct TabixSource {
    label: OnceLock<Symbol>,
    path: PathBuf,
    schema: Arc<Schema>,
    has_header: bool,
    rows: OnceLock<Vec<Row>>,
    indices: OnceLock<std::collections::HashMap<Symbol, GroupIndex>>,
    indexed_columns: Vec<Symbol>,
}

impl TabixSource {
    pub fn open(path: &Path, schema: Arc<Schema>, indexed_columns: &[&str], has_header: bool) -> Result<TabixSource> {
        if !path.exists() {
            return Err(EngineError::Config(format!("no such file: {}", path.display())));
        }
        Ok(TabixSource {
            label: OnceLock::new(),
            path: path.to_path_buf(),
            schema,
            has_header,
            rows: OnceLock::new(),
            indices: OnceLock::new(),
            indexed_columns: indexed_columns.iter().map(|c| crate::intern::intern(c)).collect(),
        })
    }

    /// Decompress and parse the whole file, once. Subsequent calls reuse
    /// the cached rows — this is the one-time cost of not having a random
    /// access index.
    fn rows(&self) -> Result<&Vec<Row>> {
        if self.rows.get().is_none() {
            let rows = self.decode()?;
            let _ = self.rows.set(rows);
        }
        Ok(self.rows.get().unwrap())
    }

    fn decode(&self) -> Result<Vec<Row>> {
        let file = File::open(&self.path)
            .map_err(|e| EngineError::Config(format!("cannot open {}: {e}", self.path.display())))?;
        let decoder = MultiGzDecoder::new(BufReader::new(file));
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(self.has_header)
            .comment(Some(b'#'))
            .from_reader(decoder);
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|e| {
                EngineError::QueryFailure {
                    source: self.label.get().map(|s| s.as_str().to_string()).unwrap_or_default(),
                    sequence: String::new(),
                    begin: 0,
                    end: 0,
                    reason: format!("malformed record in {}: {e}", self.path.display()),
                }
            })?;
            rows.push(Row::new(self.schema.clone(), parse_record(&self.schema, &record)?));
        }
        Ok(rows)
    }

    fn indices(&self) -> Result<&std::collections::HashMap<Symbol, GroupIndex>> {
        if self.indices.get().is_none() {
            let rows = self.rows()?;
            let mut map = std::collections::HashMap::new();
            for &col in &self.indexed_columns {
                map.insert(col, build_index(&self.schema, rows, col)?);
            }
            let _ = self.indices.set(map);
        }
        Ok(self.indices.get().unwrap())
    }
}

impl Source for TabixSource {
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
        let rows = match self.rows() {
            Ok(rows) => rows,
            Err(e) => {
                log::warn!("tabix source failed to decode: {e}");
                return Box::new(std::iter::empty());
            }
        };
        match partition {
            None => Box::new(rows.iter().cloned()),
            Some(p) => Box::new(
                rows.iter()
                    .enumerate()
                    .filter(move |(i, _)| p.includes(*i))
                    .map(|(_, r)| r.clone()),
            ),
        }
    }

    fn query<'a>(&'a self, seq: &Value, begin: i64, end: i64) -> Box<dyn Iterator<Item = Row> + 'a> {
        let rows = match self.rows() {
            Ok(rows) => rows,
            Err(e) => {
                log::warn!("tabix source failed to decode: {e}");
                return Box::new(std::iter::empty());
            }
        };
        let seq = seq.clone();
        Box::new(
            rows.iter()
                .filter(move |r| *r.seq() == seq && r.begin() < end && r.end() >= begin)
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
        let map = self.indices()?;
        map.get(&column).ok_or_else(|| EngineError::IndexMissing {
            source: self.label.get().map(|s| s.as_str().to_string()).unwrap_or_default(),
            column: column.as_str().to_string(),
        })
    }
}

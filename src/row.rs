//! `Row` and `MergedRow`: the two shapes of record that flow through views.
use crate::error::{EngineError, Result};
use crate::intern::Symbol;
use crate::schema::Schema;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// A window closure used only by reference-sequence rows, see
/// `source::refseq`. `None` for every other kind of source.
type WindowFn = Arc<dyn Fn(i64, i64) -> Result<Value> + Send + Sync>;

/// A single row from one source: a schema plus its cell values, in column
/// order.
#[derive(Clone)]
pub struct Row {
    schema: Arc<Schema>,
    values: Vec<Value>,
    window: Option<WindowFn>,
}

impl Row {
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Row {
        Row {
            schema,
            values,
            window: None,
        }
    }

    pub fn with_window(mut self, window: WindowFn) -> Row {
        self.window = Some(window);
        self
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.index_of(name).map(|i| &self.values[i])
    }

    pub fn seq(&self) -> &Value {
        &self.values[self.schema.seq_col()]
    }

    pub fn begin(&self) -> i64 {
        match &self.values[self.schema.begin_col()] {
            Value::Int(i) => *i,
            _ => unreachable!("schema guarantees the begin column is Int"),
        }
    }

    pub fn end(&self) -> i64 {
        match &self.values[self.schema.end_col()] {
            Value::Int(i) => *i,
            _ => unreachable!("schema guarantees the end column is Int"),
        }
    }

    /// Read bases `[begin + a, end + b)` relative to this row's own bounds.
    /// Only rows produced by a reference-sequence source support this; any
    /// other row returns a `Schema` error.
    pub fn slice(&self, a: i64, b: i64) -> Result<Value> {
        match &self.window {
            Some(f) => f(a, b),
            None => Err(EngineError::Schema(
                "this row does not support windowed slicing (not from a reference sequence source)"
                    .into(),
            )),
        }
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row")
            .field("values", &self.values)
            .field("windowed", &self.window.is_some())
            .finish()
    }
}

/// A row produced by a `Merge`/`MultiMerge`: one source `Row` per
/// participating source, in left-to-right composition order.
#[derive(Clone, Debug, Default)]
pub struct MergedRow(Vec<(Symbol, Row)>);

impl MergedRow {
    pub fn new() -> MergedRow {
        MergedRow(Vec::new())
    }

    pub fn push(&mut self, label: Symbol, row: Row) {
        self.0.push((label, row));
    }

    pub fn get(&self, label: &str) -> Option<&Row> {
        self.0.iter().find(|(l, _)| l.as_str() == label).map(|(_, r)| r)
    }

    pub fn labels(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.0.iter().map(|(l, _)| *l)
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> + '_ {
        self.0.iter().map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ColumnType;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::new(
                &["CHROM".into(), "BEGIN".into(), "END".into()],
                vec![ColumnType::Str, ColumnType::Int, ColumnType::Int],
                "CHROM",
                "BEGIN",
                "END",
            )
            .unwrap(),
        )
    }

    #[test]
    fn row_exposes_coordinates() {
        let row = Row::new(
            schema(),
            vec![Value::Str("1".into()), Value::Int(10), Value::Int(20)],
        );
        assert_eq!(row.begin(), 10);
        assert_eq!(row.end(), 20);
        assert_eq!(row.get("CHROM").unwrap().as_str(), Some("1"));
    }

    #[test]
    fn non_reference_row_rejects_slicing() {
        let row = Row::new(
            schema(),
            vec![Value::Str("1".into()), Value::Int(10), Value::Int(20)],
        );
        assert!(row.slice(-1, 1).is_err());
    }

    #[test]
    fn merged_row_preserves_composition_order() {
        let mut merged = MergedRow::new();
        merged.push(
            crate::intern::intern("variants"),
            Row::new(schema(), vec![Value::Str("1".into()), Value::Int(1), Value::Int(2)]),
        );
        merged.push(
            crate::intern::intern("cadd"),
            Row::new(schema(), vec![Value::Str("1".into()), Value::Int(1), Value::Int(2)]),
        );
        let labels: Vec<_> = merged.labels().map(|s| s.as_str()).collect();
        assert_eq!(labels, vec!["variants", "cadd"]);
    }
}

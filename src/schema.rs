//! Column layout for a single source.
use crate::error::{EngineError, Result};
use crate::intern::{intern, Symbol};
use crate::value::ColumnType;

/// The ordered column layout of a source, plus which three columns carry the
/// (sequence, begin, end) coordinate triple every row is addressed by.
#[derive(Debug)]
pub struct Schema {
    columns: Vec<Symbol>,
    ctypes: Vec<ColumnType>,
    seq_col: usize,
    begin_col: usize,
    end_col: usize,
}

impl Schema {
    pub fn new(
        columns: &[String],
        ctypes: Vec<ColumnType>,
        sequence: &str,
        begin: &str,
        end: &str,
    ) -> Result<Schema> {
        if columns.len() != ctypes.len() {
            return Err(EngineError::Schema(format!(
                "header has {} columns but ctypes lists {}",
                columns.len(),
                ctypes.len()
            )));
        }
        let columns: Vec<Symbol> = columns.iter().map(|c| intern(c)).collect();
        let find = |name: &str| -> Result<usize> {
            columns
                .iter()
                .position(|s| s.as_str() == name)
                .ok_or_else(|| EngineError::Schema(format!("coordinate column '{name}' not found in header")))
        };
        let seq_col = find(sequence)?;
        let begin_col = find(begin)?;
        let end_col = find(end)?;
        if ctypes[begin_col] != ColumnType::Int {
            return Err(EngineError::Schema(format!(
                "begin column '{begin}' must be declared int"
            )));
        }
        if ctypes[end_col] != ColumnType::Int {
            return Err(EngineError::Schema(format!(
                "end column '{end}' must be declared int"
            )));
        }
        Ok(Schema {
            columns,
            ctypes,
            seq_col,
            begin_col,
            end_col,
        })
    }

    pub fn columns(&self) -> &[Symbol] {
        &self.columns
    }

    pub fn ctype(&self, index: usize) -> ColumnType {
        self.ctypes[index]
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|s| s.as_str() == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn seq_col(&self) -> usize {
        self.seq_col
    }

    pub fn begin_col(&self) -> usize {
        self.begin_col
    }

    pub fn end_col(&self) -> usize {
        self.end_col
    }
}

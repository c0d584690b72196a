//! Shared fixture builders for the worked scenarios (spec §8) and the
//! universal-property tests. Every schema here mirrors the tables used in
//! the scenario write-ups: `variants`/`cadd` share `REF`/`ALT` as an
//! equi-join key, `genes`/`exons` carry no join key and are matched purely
//! on interval overlap.
use segview::{ColumnType, MemSource, Row, Schema, Value};
use std::sync::Arc;

/// Route `log` output through `env_logger` for whichever test calls this
/// first; safe to call repeatedly, each test binary only initializes once.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn variants_schema() -> Arc<Schema> {
    Arc::new(
        Schema::new(
            &cols(&["CHR", "BEGIN", "END", "REF", "ALT", "SAMPLE"]),
            vec![
                ColumnType::Str,
                ColumnType::Int,
                ColumnType::Int,
                ColumnType::Str,
                ColumnType::Str,
                ColumnType::Str,
            ],
            "CHR",
            "BEGIN",
            "END",
        )
        .unwrap(),
    )
}

pub fn cadd_schema() -> Arc<Schema> {
    Arc::new(
        Schema::new(
            &cols(&["CHR", "BEGIN", "END", "REF", "ALT", "PHRED"]),
            vec![
                ColumnType::Str,
                ColumnType::Int,
                ColumnType::Int,
                ColumnType::Str,
                ColumnType::Str,
                ColumnType::Float,
            ],
            "CHR",
            "BEGIN",
            "END",
        )
        .unwrap(),
    )
}

pub fn genes_schema() -> Arc<Schema> {
    Arc::new(
        Schema::new(
            &cols(&["CHR", "BEGIN", "END", "STRAND"]),
            vec![ColumnType::Str, ColumnType::Int, ColumnType::Int, ColumnType::Str],
            "CHR",
            "BEGIN",
            "END",
        )
        .unwrap(),
    )
}

pub fn exons_schema() -> Arc<Schema> {
    Arc::new(
        Schema::new(
            &cols(&["CHR", "BEGIN", "END", "GENE"]),
            vec![ColumnType::Str, ColumnType::Int, ColumnType::Int, ColumnType::Str],
            "CHR",
            "BEGIN",
            "END",
        )
        .unwrap(),
    )
}

fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// One variant: a point call at 1-based `pos`, stored as the half-open
/// `[pos - 1, pos)` row every other source shares the convention with.
pub fn variant(schema: &Arc<Schema>, chr: &str, pos: i64, reference: &str, alt: &str, sample: &str) -> Row {
    Row::new(
        schema.clone(),
        vec![
            Value::Str(chr.into()),
            Value::Int(pos - 1),
            Value::Int(pos),
            Value::Str(reference.into()),
            Value::Str(alt.into()),
            Value::Str(sample.into()),
        ],
    )
}

pub fn cadd(schema: &Arc<Schema>, chr: &str, pos: i64, reference: &str, alt: &str, phred: f64) -> Row {
    Row::new(
        schema.clone(),
        vec![
            Value::Str(chr.into()),
            Value::Int(pos - 1),
            Value::Int(pos),
            Value::Str(reference.into()),
            Value::Str(alt.into()),
            Value::Float(phred),
        ],
    )
}

pub fn gene(schema: &Arc<Schema>, chr: &str, begin: i64, end: i64, strand: &str) -> Row {
    Row::new(
        schema.clone(),
        vec![
            Value::Str(chr.into()),
            Value::Int(begin),
            Value::Int(end),
            Value::Str(strand.into()),
        ],
    )
}

pub fn exon(schema: &Arc<Schema>, chr: &str, begin: i64, end: i64, gene_name: &str) -> Row {
    Row::new(
        schema.clone(),
        vec![
            Value::Str(chr.into()),
            Value::Int(begin),
            Value::Int(end),
            Value::Str(gene_name.into()),
        ],
    )
}

pub fn mem(schema: Arc<Schema>, rows: Vec<Row>, indexed: &[&str]) -> Arc<MemSource> {
    Arc::new(MemSource::from_rows(schema, rows, indexed).unwrap())
}

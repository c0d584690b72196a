//! End-to-end coverage for `dataset.merge(RefSeqSource)`: the one join shape
//! not exercised by the worked scenarios (S1-S6), and the specific case
//! where a refseq row's own coordinates must undo the join engine's
//! `begin - 1` query widening before they're used for anything user-visible
//! (SPEC_FULL.md §4.1/§9, DESIGN.md's D1 addendum and Design Decision D3).
mod common;

use common::variants_schema;
use segview::{Dataset, EngineBuilder, Merge, MergeView, RefSeqSource};

/// A driver row covering 1-based position 4 (stored half-open as `[3, 4)`)
/// merged against a reference source must come back reporting exactly that
/// same span, not the join engine's internally widened `[2, 4)` — and
/// `.slice(-1, 1)` on it must read the 3-base trinucleotide around position
/// 4, not a 4-base window.
#[test]
fn merged_refseq_row_reports_true_coordinates_and_slices_a_trinucleotide() {
    let dir = std::env::temp_dir().join(format!("segview-refseq-merge-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    // 1-based: pos1=A pos2=C pos3=G pos4=T pos5=A pos6=C pos7=G pos8=T pos9=A pos10=C
    std::fs::write(dir.join("1"), b"ACGTACGTAC").unwrap();

    let driver_schema = variants_schema();
    let driver_row = common::variant(&driver_schema, "1", 4, "T", "C", "s1");
    let driver = common::mem(driver_schema, vec![driver_row], &[]);

    let refseq = RefSeqSource::open(&dir).unwrap();

    let engine = EngineBuilder::new()
        .workers(1)
        .register("variants", driver)
        .unwrap()
        .register("hg19", std::sync::Arc::new(refseq))
        .unwrap()
        .build()
        .unwrap();

    let left = Dataset::new(engine.source("variants").unwrap());
    let merged = Merge::new(left, engine.source("hg19").unwrap(), None).unwrap();
    let rows: Vec<_> = merged.iterate(None).collect();
    assert_eq!(rows.len(), 1);

    let variant_row = rows[0].get("variants").unwrap();
    let refseq_row = rows[0].get("hg19").unwrap();

    assert_eq!(refseq_row.begin(), variant_row.begin(), "refseq row must report the driver's true begin, not the widened one");
    assert_eq!(refseq_row.end(), variant_row.end(), "refseq row must report the driver's true end");
    assert_eq!(refseq_row.get("SEQ").unwrap().as_str(), Some("T"));

    let trinucleotide = refseq_row.slice(-1, 1).unwrap();
    assert_eq!(trinucleotide.as_str(), Some("GTA"));

    std::fs::remove_dir_all(&dir).ok();
}

//! Universal-property tests (spec §8, properties 1-8). Each test exercises
//! one property directly rather than through a particular worked scenario.
mod common;

use common::*;
use segview::{
    statistics, Aggregator, Column, Dataset, EngineBuilder, EngineError, Filter, FlattenedAggregate, Merge,
    MergeView, MultiMerge, Partition, RowView, Source, Value,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Property 1: `count(D) == len(list(D))` for any non-merge view.
#[test]
fn count_matches_len_for_a_plain_dataset() {
    let schema = variants_schema();
    let rows: Vec<_> = (0..5).map(|i| variant(&schema, "1", 100 + i, "A", "G", "s1")).collect();
    let source = mem(schema, rows, &[]);
    let engine = EngineBuilder::new().workers(1).register("variants", source).unwrap().build().unwrap();
    let dataset = engine.dataset("variants").unwrap();

    assert_eq!(statistics::count(dataset.iterate(None)), dataset.len().unwrap());
}

/// Property 2: `count(D.filter(p))` equals the number of rows of `D`
/// satisfying `p`.
#[test]
fn filtered_count_matches_manual_predicate_count() {
    let schema = variants_schema();
    let rows = vec![
        variant(&schema, "1", 100, "A", "G", "s1"),
        variant(&schema, "1", 101, "A", "G", "s2"),
        variant(&schema, "1", 102, "A", "G", "s1"),
    ];
    let manual = rows.iter().filter(|r| r.get("SAMPLE").unwrap().as_str() == Some("s1")).count();
    let source = mem(schema, rows, &[]);
    let engine = EngineBuilder::new().workers(1).register("variants", source).unwrap().build().unwrap();
    let dataset = engine.dataset("variants").unwrap();
    let filtered = Filter::new(
        dataset,
        Arc::new(|row: &segview::Row| row.get("SAMPLE").unwrap().as_str() == Some("s1")),
    );

    assert_eq!(statistics::count(filtered.iterate(None)), manual);
}

/// Property 3: unpartitioned iteration equals the concatenation (as a
/// multiset) of every shard's iteration, for every partition count.
#[test]
fn partitioned_iteration_is_lossless_for_every_partition_count() {
    let schema = variants_schema();
    let rows: Vec<_> = (0..11).map(|i| variant(&schema, "1", 100 + i, "A", "G", "s1")).collect();
    let source = mem(schema, rows, &[]);
    let engine = EngineBuilder::new().workers(1).register("variants", source).unwrap().build().unwrap();
    let dataset = engine.dataset("variants").unwrap();

    let mut whole: Vec<i64> = dataset.iterate(None).map(|r| r.begin()).collect();
    whole.sort();

    for partitions in 1..=4u32 {
        let mut sharded: Vec<i64> = Vec::new();
        for k in 0..partitions {
            sharded.extend(dataset.iterate(Some(Partition::new(k, partitions))).map(|r| r.begin()));
        }
        sharded.sort();
        assert_eq!(whole, sharded, "mismatch at partition count {partitions}");
    }
}

/// Property 4: every merged row's constituent rows pairwise overlap on
/// sequence and interval, and agree on every `on` column.
#[test]
fn merged_rows_satisfy_overlap_and_equi_join_constraints() {
    let variants = mem(
        variants_schema(),
        vec![
            variant(&variants_schema(), "1", 100, "A", "G", "s1"),
            variant(&variants_schema(), "1", 200, "C", "T", "s2"),
            variant(&variants_schema(), "1", 300, "A", "G", "s3"),
        ],
        &[],
    );
    let cadd = mem(
        cadd_schema(),
        vec![
            cadd(&cadd_schema(), "1", 100, "A", "G", 25.0),
            cadd(&cadd_schema(), "1", 200, "C", "T", 10.0),
        ],
        &[],
    );
    let engine = EngineBuilder::new()
        .workers(1)
        .register("variants", variants)
        .unwrap()
        .register("cadd", cadd)
        .unwrap()
        .build()
        .unwrap();

    let left = Dataset::new(engine.source("variants").unwrap());
    let merge = Merge::new(left, engine.source("cadd").unwrap(), Some(&["REF", "ALT"])).unwrap();

    let merged_rows: Vec<_> = merge.iterate(None).collect();
    assert_eq!(merged_rows.len(), 2);
    for row in &merged_rows {
        let v = row.get("variants").unwrap();
        let c = row.get("cadd").unwrap();
        assert_eq!(v.seq(), c.seq());
        assert!(v.begin() < c.end() && c.begin() < v.end(), "rows must overlap");
        assert_eq!(v.get("REF"), c.get("REF"));
        assert_eq!(v.get("ALT"), c.get("ALT"));
    }
}

/// Property 5: join order does not change the resulting set of merged rows,
/// provided the `on` keys stay consistent.
#[test]
fn three_way_merge_is_order_independent() {
    let variants = mem(
        variants_schema(),
        vec![
            variant(&variants_schema(), "1", 100, "A", "G", "s1"),
            variant(&variants_schema(), "1", 200, "C", "T", "s2"),
        ],
        &[],
    );
    let cadd = mem(
        cadd_schema(),
        vec![
            cadd(&cadd_schema(), "1", 100, "A", "G", 25.0),
            cadd(&cadd_schema(), "1", 200, "C", "T", 10.0),
        ],
        &[],
    );
    let genes = mem(genes_schema(), vec![gene(&genes_schema(), "1", 50, 300, "+")], &[]);
    let engine = EngineBuilder::new()
        .workers(1)
        .register("variants", variants)
        .unwrap()
        .register("cadd", cadd)
        .unwrap()
        .register("genes", genes)
        .unwrap()
        .build()
        .unwrap();

    let summarize = |merge: Arc<dyn MergeView>| -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = merge
            .iterate(None)
            .map(|row| {
                let sample = row.get("variants").unwrap().get("SAMPLE").unwrap().to_string();
                let strand = row.get("genes").unwrap().get("STRAND").unwrap().to_string();
                (sample, strand)
            })
            .collect();
        out.sort();
        out
    };

    let left_a = Dataset::new(engine.source("variants").unwrap());
    let cadd_then_genes = MultiMerge::new(
        Merge::new(left_a, engine.source("cadd").unwrap(), Some(&["REF", "ALT"])).unwrap(),
        engine.source("genes").unwrap(),
        None,
    )
    .unwrap();

    let left_b = Dataset::new(engine.source("variants").unwrap());
    let genes_then_cadd = MultiMerge::new(
        Merge::new(left_b, engine.source("genes").unwrap(), None).unwrap(),
        engine.source("cadd").unwrap(),
        Some(&["REF", "ALT"]),
    )
    .unwrap();

    assert_eq!(summarize(cadd_then_genes), summarize(genes_then_cadd));
}

/// Property 6: the slice handed to an aggregator exposes exactly the rows
/// of each source overlapping some segment of the group, no more and no
/// less — a noise row placed outside every exon must not appear.
#[test]
fn aggregator_slice_excludes_rows_outside_every_segment() {
    let exons = mem(exons_schema(), vec![exon(&exons_schema(), "1", 100, 150, "G1")], &["GENE"]);
    let cadd = mem(
        cadd_schema(),
        vec![
            cadd(&cadd_schema(), "1", 120, "A", "G", 25.0),
            cadd(&cadd_schema(), "1", 500, "C", "T", 99.0),
        ],
        &[],
    );
    let engine = EngineBuilder::new()
        .workers(1)
        .register("exons", exons)
        .unwrap()
        .register("cadd", cadd)
        .unwrap()
        .build()
        .unwrap();

    let column = Column::new(engine.dataset("exons").unwrap(), "GENE").unwrap();
    let groupby = engine.groupby(column);
    let aggregator = Aggregator::RowBuilder(Arc::new(|slice: &segview::Slice, mut row: segview::AggRow| {
        let phreds: Vec<f64> = Column::new(slice.dataset("cadd").unwrap(), "PHRED")
            .unwrap()
            .iterate()
            .map(|v| v.as_float().unwrap())
            .collect();
        row.set(segview::intern::intern("COUNT"), Value::Int(phreds.len() as i64));
        row
    }));

    let rows = groupby.aggregate_seq(aggregator).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("COUNT").unwrap().as_int(), Some(1));
}

/// Property 7: groups absent from an upstream-filtered grouping column are
/// never emitted, even if the source's own index still carries them.
#[test]
fn filtered_grouping_column_suppresses_absent_groups() {
    let exons = mem(
        exons_schema(),
        vec![
            exon(&exons_schema(), "1", 100, 150, "G1"),
            exon(&exons_schema(), "1", 200, 250, "G2"),
        ],
        &["GENE"],
    );
    let engine = EngineBuilder::new().workers(1).register("exons", exons).unwrap().build().unwrap();

    let dataset = engine.dataset("exons").unwrap();
    let filtered = Filter::new(
        dataset,
        Arc::new(|row: &segview::Row| row.get("GENE").unwrap().as_str() != Some("G2")),
    );
    let column = Column::new(filtered, "GENE").unwrap();
    let groupby = engine.groupby(column);
    let rows = groupby
        .aggregate_seq(Aggregator::RowBuilder(Arc::new(|_: &segview::Slice, row: segview::AggRow| row)))
        .unwrap();

    let genes: HashSet<String> = rows.iter().map(|r| r.get("GENE").unwrap().to_string()).collect();
    assert_eq!(genes, HashSet::from(["G1".to_string()]));
}

/// Property 8: the parallel aggregator's results equal the sequential
/// aggregator's results as a set, for any worker count.
#[test]
fn parallel_and_sequential_aggregation_agree_as_a_set() {
    let exons = mem(
        exons_schema(),
        vec![
            exon(&exons_schema(), "1", 100, 150, "G1"),
            exon(&exons_schema(), "1", 200, 250, "G2"),
            exon(&exons_schema(), "1", 300, 350, "G3"),
            exon(&exons_schema(), "1", 400, 450, "G4"),
        ],
        &["GENE"],
    );
    let cadd = mem(
        cadd_schema(),
        vec![
            cadd(&cadd_schema(), "1", 120, "A", "G", 25.0),
            cadd(&cadd_schema(), "1", 210, "C", "T", 10.0),
            cadd(&cadd_schema(), "1", 320, "A", "G", 5.0),
            cadd(&cadd_schema(), "1", 420, "C", "T", 42.0),
        ],
        &[],
    );

    let mk_engine = |workers: usize| {
        EngineBuilder::new()
            .workers(workers)
            .progress(1)
            .register(
                "exons",
                mem(exons_schema(), exons.iterate(None).collect(), &["GENE"]),
            )
            .unwrap()
            .register(
                "cadd",
                mem(cadd_schema(), cadd.iterate(None).collect(), &[]),
            )
            .unwrap()
            .build()
            .unwrap()
    };

    let to_set = |rows: Vec<segview::AggRow>| -> HashSet<(String, String)> {
        rows.into_iter()
            .map(|r| (r.get("GENE").unwrap().to_string(), r.get("MAX").unwrap().to_string()))
            .collect()
    };
    let aggregator_fields = || {
        Aggregator::Fields(vec![(
            "MAX".to_string(),
            Arc::new(|slice: &segview::Slice| {
                let phred = Column::new(slice.dataset("cadd").unwrap(), "PHRED").unwrap();
                statistics::max(phred.iterate()).unwrap()
            }) as Arc<dyn Fn(&segview::Slice) -> Value + Send + Sync>,
        )])
    };

    let sequential_engine = mk_engine(1);
    let sequential_column = Column::new(sequential_engine.dataset("exons").unwrap(), "GENE").unwrap();
    let sequential = sequential_engine.groupby(sequential_column).aggregate_seq(aggregator_fields()).unwrap();

    for workers in [1usize, 2, 4] {
        let engine = mk_engine(workers);
        let column = Column::new(engine.dataset("exons").unwrap(), "GENE").unwrap();
        let stream = engine.groupby(column).aggregate(aggregator_fields()).unwrap();
        let parallel: Vec<_> = FlattenedAggregate::from(stream)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(to_set(parallel), to_set(sequential.clone()), "mismatch at {workers} workers");
    }
}

/// A worker that panics mid-aggregation must surface as
/// `EngineError::WorkerFailure` through the real `GroupBy::aggregate` path,
/// not silently shrink the result set (§7, §4.5).
#[test]
fn a_panicking_aggregator_surfaces_as_worker_failure_not_fewer_rows() {
    let exons = mem(
        exons_schema(),
        vec![
            exon(&exons_schema(), "1", 100, 150, "G1"),
            exon(&exons_schema(), "1", 200, 250, "G2"),
            exon(&exons_schema(), "1", 300, 350, "BOOM"),
            exon(&exons_schema(), "1", 400, 450, "G4"),
        ],
        &["GENE"],
    );
    let engine = EngineBuilder::new()
        .workers(4)
        .progress(1)
        .register("exons", exons)
        .unwrap()
        .build()
        .unwrap();

    let column = Column::new(engine.dataset("exons").unwrap(), "GENE").unwrap();
    let aggregator = Aggregator::RowBuilder(Arc::new(|_: &segview::Slice, row: segview::AggRow| {
        if row.get("GENE").unwrap().as_str() == Some("BOOM") {
            panic!("simulated worker failure");
        }
        row
    }));

    let stream = engine.groupby(column).aggregate(aggregator).unwrap();
    let result = FlattenedAggregate::from(stream).collect::<Result<Vec<_>, _>>();
    assert!(matches!(result, Err(EngineError::WorkerFailure(_))));
}

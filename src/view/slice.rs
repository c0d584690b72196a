//! `Slice` and `SliceDataset`: the per-group read-only view handed to an
//! aggregator callback.
use crate::engine::Engine;
use crate::error::Result;
use crate::row::Row;
use crate::source::{Partition, Segment, Source};
use crate::view::RowView;
use std::sync::{Arc, OnceLock};

/// An ordered list of genomic segments forming one aggregation group. A
/// `Slice` itself carries no rows; `dataset(label)` opens a view over one
/// registered source restricted to these segments.
#[derive(Clone)]
pub struct Slice {
    engine: Arc<Engine>,
    segments: Arc<Vec<Segment>>,
}

impl Slice {
    pub fn new(engine: Arc<Engine>, segments: Vec<Segment>) -> Slice {
        Slice {
            engine,
            segments: Arc::new(segments),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// A view over `source_label` restricted to this slice's segments.
    pub fn dataset(&self, source_label: &str) -> Result<Arc<dyn RowView>> {
        let source = self.engine.source(source_label)?;
        Ok(Arc::new(SliceDataset {
            source,
            segments: self.segments.clone(),
            cache: OnceLock::new(),
        }))
    }
}

/// Rows from one source across every segment of a `Slice`, in segment
/// order, materialized and memoized on the first pass (`iterate` is called
/// at most once for real; every call after that replays the cached rows).
pub struct SliceDataset {
    source: Arc<dyn Source>,
    segments: Arc<Vec<Segment>>,
    cache: OnceLock<Vec<Row>>,
}

impl SliceDataset {
    fn rows(&self) -> &Vec<Row> {
        self.cache.get_or_init(|| {
            let mut rows = Vec::new();
            for segment in self.segments.iter() {
                rows.extend(self.source.query(&segment.seq, segment.begin, segment.end));
            }
            rows
        })
    }
}

impl RowView for SliceDataset {
    fn iterate<'a>(&'a self, _partition: Option<Partition>) -> Box<dyn Iterator<Item = Row> + 'a> {
        // Slices are consumed whole by aggregator callbacks; they are never
        // partitioned further (the group itself is already the unit of
        // parallel work, see `aggregate.rs`).
        Box::new(self.rows().iter().cloned())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.rows().len())
    }

    fn schema(&self) -> Option<&crate::schema::Schema> {
        Some(self.source.schema())
    }

    fn root_source(&self) -> Option<Arc<dyn Source>> {
        Some(self.source.clone())
    }
}

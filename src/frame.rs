use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use tracing::{debug, warn};

use crate::columnar::{FieldVector, TypeTag, decode_column};
use crate::error::SpicedashError;

/// Name given to the single frame produced per query.
pub const FRAME_NAME: &str = "response";

/// One output column. `values` is `None` when the column's type has no
/// frame representation.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameField {
    pub name: String,
    pub tag: TypeTag,
    pub values: Option<FieldVector>,
}

impl FrameField {
    pub fn len(&self) -> usize {
        self.values.as_ref().map_or(0, FieldVector::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The accumulated result of one query, index-aligned with its schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub name: String,
    pub fields: Vec<FrameField>,
}

impl Frame {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    /// Number of rows, taken from the fields that carry values.
    pub fn row_count(&self) -> usize {
        self.fields
            .iter()
            .filter(|f| f.values.is_some())
            .map(FrameField::len)
            .max()
            .unwrap_or(0)
    }

    pub fn field(&self, name: &str) -> Option<&FrameField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldState {
    NotStarted,
    AwaitingBatch,
    Accumulating,
    Complete,
}

/// Folds a query's record batches, in stream order, into one frame.
///
/// Columns are established from the query schema by `begin`, so their element
/// type is fixed before the first batch arrives. Every batch is checked
/// against the established types and fully decoded before anything is
/// appended, which keeps all fields the same length even when a batch fails.
#[derive(Debug)]
pub struct FrameBuilder {
    frame: Frame,
    state: FoldState,
    batches: usize,
    rows: usize,
}

impl FrameBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            frame: Frame::new(name),
            state: FoldState::NotStarted,
            batches: 0,
            rows: 0,
        }
    }

    pub fn state(&self) -> FoldState {
        self.state
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Establish one field per schema field.
    pub fn begin(&mut self, schema: &Schema) -> Result<(), SpicedashError> {
        if self.state != FoldState::NotStarted {
            return Err(SpicedashError::Decode {
                message: format!("frame already started (state {:?})", self.state),
            });
        }

        self.frame.fields = schema
            .fields()
            .iter()
            .map(|field| {
                let tag = TypeTag::from_field(field);
                FrameField {
                    name: field.name().clone(),
                    tag,
                    values: FieldVector::empty_for(tag),
                }
            })
            .collect();
        self.state = FoldState::AwaitingBatch;
        Ok(())
    }

    /// Decode a batch and append it to the established fields. The batch is
    /// dropped once its values are copied.
    pub fn push_batch(&mut self, batch: RecordBatch) -> Result<(), SpicedashError> {
        if self.state != FoldState::AwaitingBatch {
            return Err(SpicedashError::Decode {
                message: format!("cannot accept a batch in state {:?}", self.state),
            });
        }
        if batch.num_columns() != self.frame.fields.len() {
            return Err(SpicedashError::Decode {
                message: format!(
                    "batch has {} columns, expected {}",
                    batch.num_columns(),
                    self.frame.fields.len()
                ),
            });
        }

        self.state = FoldState::Accumulating;
        let decoded = self.decode_batch(&batch);
        // go back to waiting even on failure so the caller can still read
        // the partial frame
        self.state = FoldState::AwaitingBatch;
        let decoded = decoded?;

        for (field, values) in self.frame.fields.iter_mut().zip(decoded) {
            match (field.values.as_mut(), values) {
                (Some(current), Some(values)) => current.append(values)?,
                (None, None) => {}
                _ => {
                    return Err(SpicedashError::Decode {
                        message: format!("field '{}' lost its representation", field.name),
                    });
                }
            }
        }

        self.batches += 1;
        self.rows += batch.num_rows();
        debug!(
            batch = self.batches,
            rows = batch.num_rows(),
            total_rows = self.rows,
            "batch appended"
        );
        Ok(())
    }

    fn decode_batch(&self, batch: &RecordBatch) -> Result<Vec<Option<FieldVector>>, SpicedashError> {
        let schema = batch.schema();
        self.frame
            .fields
            .iter()
            .zip(schema.fields().iter())
            .zip(batch.columns())
            .map(|((established, batch_field), column)| {
                let tag = TypeTag::from_field(batch_field);
                if tag != established.tag {
                    warn!(
                        column = %established.name,
                        expected = %established.tag,
                        found = %tag,
                        "column changed type mid-stream"
                    );
                    return Err(SpicedashError::InconsistentStream {
                        column: established.name.clone(),
                        expected: established.tag.to_string(),
                        found: tag.to_string(),
                    });
                }
                decode_column(tag, column.as_ref())
            })
            .collect()
    }

    /// Mark the stream as drained. No batch is accepted afterwards.
    pub fn finish(&mut self) {
        self.state = FoldState::Complete;
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Hand out the frame, complete or not.
    pub fn into_frame(self) -> Frame {
        self.frame
    }
}

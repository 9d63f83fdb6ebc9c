use std::sync::Arc;

use arrow::array::{ArrayRef, BinaryArray, Int32Array, Int64Array, StringArray, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use spicedash::columnar::{FieldVector, TypeTag, decode_column};
use spicedash::error::SpicedashError;
use spicedash::frame::{FRAME_NAME, FoldState, FrameBuilder};

fn blocks_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("number", DataType::Int64, false),
        Field::new("hash", DataType::Utf8, true),
        Field::new("ts", DataType::Timestamp(TimeUnit::Millisecond, None), true),
    ]))
}

/// A batch of `rows` blocks starting at block number `start`.
fn blocks_batch(schema: &SchemaRef, start: i64, rows: i64) -> RecordBatch {
    let numbers: Vec<i64> = (start..start + rows).collect();
    let hashes: Vec<String> = numbers.iter().map(|n| format!("0x{n:x}")).collect();
    let times: Vec<i64> = numbers.iter().map(|n| 1_700_000_000_000 + n * 12_000).collect();

    RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(numbers)) as ArrayRef,
            Arc::new(StringArray::from(hashes)),
            Arc::new(TimestampMillisecondArray::from(times)),
        ],
    )
    .unwrap()
}

fn decode_alone(batch: &RecordBatch, index: usize) -> FieldVector {
    let tag = TypeTag::from_field(batch.schema().field(index));
    decode_column(tag, batch.column(index).as_ref())
        .unwrap()
        .unwrap()
}

#[test]
fn test_two_batches_accumulate_in_order() {
    let schema = blocks_schema();
    let first = blocks_batch(&schema, 100, 5);
    let second = blocks_batch(&schema, 105, 5);

    let mut builder = FrameBuilder::new(FRAME_NAME);
    builder.begin(&schema).unwrap();
    builder.push_batch(first.clone()).unwrap();
    builder.push_batch(second.clone()).unwrap();
    builder.finish();

    assert_eq!(builder.batches(), 2);
    assert_eq!(builder.rows(), 10);
    let frame = builder.into_frame();
    assert_eq!(frame.name, "response");
    assert_eq!(frame.fields.len(), 3);
    assert_eq!(frame.row_count(), 10);

    for (index, field) in frame.fields.iter().enumerate() {
        assert_eq!(field.len(), 10, "field {}", field.name);
        let mut expected = decode_alone(&first, index);
        expected.append(decode_alone(&second, index)).unwrap();
        assert_eq!(field.values.as_ref(), Some(&expected), "field {}", field.name);
    }

    let numbers = frame.field("number").unwrap();
    assert_eq!(
        numbers.values,
        Some(FieldVector::Int64((100..110).collect()))
    );
}

#[test]
fn test_zero_batches_keeps_every_field() {
    let schema = blocks_schema();
    let mut builder = FrameBuilder::new(FRAME_NAME);
    builder.begin(&schema).unwrap();
    builder.finish();

    let frame = builder.into_frame();
    assert_eq!(frame.fields.len(), 3);
    assert_eq!(frame.row_count(), 0);
    assert!(frame.fields.iter().all(|f| f.is_empty()));
    assert_eq!(frame.fields[0].name, "number");
    assert_eq!(frame.fields[2].tag, TypeTag::Timestamp(TimeUnit::Millisecond));
}

#[test]
fn test_unsupported_field_present_without_values() {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, false),
        Field::new("blob", DataType::Binary, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int32Array::from(vec![1, 2])) as ArrayRef,
            Arc::new(BinaryArray::from(vec![b"x".as_ref(), b"y".as_ref()])),
        ],
    )
    .unwrap();

    let mut builder = FrameBuilder::new(FRAME_NAME);
    builder.begin(&schema).unwrap();
    builder.push_batch(batch).unwrap();
    let frame = builder.into_frame();

    assert_eq!(frame.fields.len(), 2);
    assert_eq!(frame.fields[0].values, Some(FieldVector::Int32(vec![1, 2])));
    assert_eq!(frame.fields[1].tag, TypeTag::Unsupported);
    assert_eq!(frame.fields[1].values, None);
    assert_eq!(frame.row_count(), 2);
}

#[test]
fn test_column_type_change_is_inconsistent_stream() {
    let schema = blocks_schema();
    let first = blocks_batch(&schema, 0, 5);

    let drifted_schema = Arc::new(Schema::new(vec![
        Field::new("number", DataType::Int32, false),
        Field::new("hash", DataType::Utf8, true),
        Field::new("ts", DataType::Timestamp(TimeUnit::Millisecond, None), true),
    ]));
    let drifted = RecordBatch::try_new(
        drifted_schema,
        vec![
            Arc::new(Int32Array::from(vec![5, 6])) as ArrayRef,
            Arc::new(StringArray::from(vec!["0x5", "0x6"])),
            Arc::new(TimestampMillisecondArray::from(vec![0, 0])),
        ],
    )
    .unwrap();

    let mut builder = FrameBuilder::new(FRAME_NAME);
    builder.begin(&schema).unwrap();
    builder.push_batch(first).unwrap();
    let err = builder.push_batch(drifted).unwrap_err();

    match err {
        SpicedashError::InconsistentStream {
            column,
            expected,
            found,
        } => {
            assert_eq!(column, "number");
            assert_eq!(expected, "int64");
            assert_eq!(found, "int32");
        }
        other => panic!("expected inconsistent stream, got {other:?}"),
    }

    // nothing from the rejected batch was appended to any field
    let frame = builder.frame();
    assert!(frame.fields.iter().all(|f| f.len() == 5));
    assert_eq!(builder.rows(), 5);
}

#[test]
fn test_out_of_range_timestamp_keeps_earlier_rows() {
    let schema = blocks_schema();
    let first = blocks_batch(&schema, 0, 3);
    let broken = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(vec![3])) as ArrayRef,
            Arc::new(StringArray::from(vec!["0x3"])),
            Arc::new(TimestampMillisecondArray::from(vec![i64::MAX])),
        ],
    )
    .unwrap();

    let mut builder = FrameBuilder::new(FRAME_NAME);
    builder.begin(&schema).unwrap();
    builder.push_batch(first).unwrap();
    let err = builder.push_batch(broken).unwrap_err();
    assert!(matches!(err, SpicedashError::Decode { .. }), "Got: {err:?}");

    let frame = builder.into_frame();
    assert!(frame.fields.iter().all(|f| f.len() == 3));
}

#[test]
fn test_column_count_mismatch_rejected() {
    let schema = blocks_schema();
    let narrow_schema = Arc::new(Schema::new(vec![Field::new("number", DataType::Int64, false)]));
    let narrow = RecordBatch::try_new(
        narrow_schema,
        vec![Arc::new(Int64Array::from(vec![1])) as ArrayRef],
    )
    .unwrap();

    let mut builder = FrameBuilder::new(FRAME_NAME);
    builder.begin(&schema).unwrap();
    let err = builder.push_batch(narrow).unwrap_err();
    assert!(err.to_string().contains("batch has 1 columns, expected 3"), "Got: {}", err);
}

#[test]
fn test_state_transitions() {
    let schema = blocks_schema();
    let mut builder = FrameBuilder::new(FRAME_NAME);
    assert_eq!(builder.state(), FoldState::NotStarted);

    // a batch before the schema is known is refused
    assert!(builder.push_batch(blocks_batch(&schema, 0, 1)).is_err());

    builder.begin(&schema).unwrap();
    assert_eq!(builder.state(), FoldState::AwaitingBatch);
    assert!(builder.begin(&schema).is_err());

    builder.push_batch(blocks_batch(&schema, 0, 2)).unwrap();
    assert_eq!(builder.state(), FoldState::AwaitingBatch);

    builder.finish();
    assert_eq!(builder.state(), FoldState::Complete);
    assert!(builder.push_batch(blocks_batch(&schema, 2, 2)).is_err());
    assert_eq!(builder.rows(), 2);
}

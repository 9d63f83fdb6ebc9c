use serde_json::{Map, Value, json};

use crate::columnar::FieldVector;
use crate::frame::{Frame, FrameField};
use crate::query::{CheckHealthResult, DataResponse, HealthStatus, QueryDataResponse};

/// Render a frame in the host's data-frame JSON shape: a schema block with
/// one entry per field and a column-major values block.
pub fn frame_to_json(frame: &Frame) -> Value {
    let fields: Vec<Value> = frame.fields.iter().map(field_schema).collect();
    let values: Vec<Value> = frame
        .fields
        .iter()
        .map(|f| f.values.as_ref().map_or(Value::Array(Vec::new()), vector_to_json))
        .collect();

    json!({
        "schema": {
            "name": frame.name,
            "fields": fields,
        },
        "data": {
            "values": values,
        },
    })
}

fn field_schema(field: &FrameField) -> Value {
    let (kind, frame_type) = match &field.values {
        Some(values) => (host_kind(values), values.type_name()),
        None => ("other", "unsupported"),
    };
    json!({
        "name": field.name,
        "type": kind,
        "typeInfo": { "frame": frame_type },
    })
}

/// The host's coarse field kind.
fn host_kind(values: &FieldVector) -> &'static str {
    match values {
        FieldVector::Bool(_) => "boolean",
        FieldVector::String(_) => "string",
        FieldVector::Time(_) => "time",
        _ => "number",
    }
}

/// Column values as a JSON array. Times become epoch milliseconds; floats
/// that JSON cannot carry (NaN, infinities) become null.
pub fn vector_to_json(values: &FieldVector) -> Value {
    let items: Vec<Value> = match values {
        FieldVector::Bool(v) => v.iter().map(|x| json!(x)).collect(),
        FieldVector::UInt8(v) => v.iter().map(|x| json!(x)).collect(),
        FieldVector::UInt16(v) => v.iter().map(|x| json!(x)).collect(),
        FieldVector::UInt32(v) => v.iter().map(|x| json!(x)).collect(),
        FieldVector::UInt64(v) => v.iter().map(|x| json!(x)).collect(),
        FieldVector::Int8(v) => v.iter().map(|x| json!(x)).collect(),
        FieldVector::Int16(v) => v.iter().map(|x| json!(x)).collect(),
        FieldVector::Int32(v) => v.iter().map(|x| json!(x)).collect(),
        FieldVector::Int64(v) => v.iter().map(|x| json!(x)).collect(),
        FieldVector::Float32(v) => v.iter().map(|x| json!(x)).collect(),
        FieldVector::Float64(v) => v.iter().map(|x| json!(x)).collect(),
        FieldVector::String(v) => v.iter().map(|x| json!(x)).collect(),
        FieldVector::Time(v) => v.iter().map(|x| json!(x.timestamp_millis())).collect(),
    };
    Value::Array(items)
}

/// Render one query's response. Partial results carry both frames and the
/// error.
pub fn data_response_to_json(response: &DataResponse) -> Value {
    let mut map = Map::new();
    let status = response.error.as_ref().map_or(200, |e| e.status.code());
    map.insert("status".to_string(), json!(status));
    map.insert(
        "frames".to_string(),
        Value::Array(response.frames.iter().map(frame_to_json).collect()),
    );
    if let Some(error) = &response.error {
        map.insert("error".to_string(), json!(error.message));
        map.insert("errorSource".to_string(), json!(error.status.to_string()));
    }
    Value::Object(map)
}

/// Render a whole request's responses, keyed by ref id.
pub fn query_data_response_to_json(response: &QueryDataResponse) -> Value {
    let results: Map<String, Value> = response
        .responses
        .iter()
        .map(|(ref_id, r)| (ref_id.clone(), data_response_to_json(r)))
        .collect();
    json!({ "results": results })
}

pub fn health_to_json(result: &CheckHealthResult) -> Value {
    let status = match result.status {
        HealthStatus::Ok => "OK",
        HealthStatus::Error => "ERROR",
    };
    json!({
        "status": status,
        "message": result.message,
    })
}

use std::fmt;

use arrow::array::{
    Array, AsArray, BooleanArray, Decimal128Array, Float32Array, Float64Array, Int8Array,
    Int16Array, Int32Array, Int64Array, ListArray, PrimitiveArray, StringArray, UInt8Array,
    UInt16Array, UInt32Array, UInt64Array,
};
use arrow::compute::cast;
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Decimal128Type, Field, Float32Type, Float64Type, Int8Type,
    Int16Type, Int32Type, Int64Type, TimeUnit, UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use arrow::temporal_conversions::{
    timestamp_ms_to_datetime, timestamp_ns_to_datetime, timestamp_s_to_datetime,
    timestamp_us_to_datetime,
};
use chrono::{DateTime, Utc};

use crate::error::SpicedashError;

/// Power of ten every Decimal128 value is divided by, regardless of the
/// scale declared on the column type.
pub const DECIMAL_SCALE: i32 = 1;

/// Separator placed between the elements of a list cell.
pub const LIST_SEPARATOR: &str = ",";

/// Element kind of a list column. Only string and 64-bit integer elements
/// are rendered; everything else renders as an empty cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListElement {
    Utf8,
    Int64,
    Other,
}

/// How a column's raw Arrow representation is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Bool,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal128,
    Utf8,
    Timestamp(TimeUnit),
    List(ListElement),
    Unsupported,
}

impl TypeTag {
    /// Map an Arrow data type to its tag. Anything outside the closed set is
    /// `Unsupported`.
    pub fn from_data_type(data_type: &DataType) -> Self {
        match data_type {
            DataType::Boolean => Self::Bool,
            DataType::UInt8 => Self::UInt8,
            DataType::UInt16 => Self::UInt16,
            DataType::UInt32 => Self::UInt32,
            DataType::UInt64 => Self::UInt64,
            DataType::Int8 => Self::Int8,
            DataType::Int16 => Self::Int16,
            DataType::Int32 => Self::Int32,
            DataType::Int64 => Self::Int64,
            DataType::Float32 => Self::Float32,
            DataType::Float64 => Self::Float64,
            DataType::Decimal128(_, _) => Self::Decimal128,
            DataType::Utf8 => Self::Utf8,
            DataType::Timestamp(unit, _) => Self::Timestamp(*unit),
            DataType::List(item) => Self::List(match item.data_type() {
                DataType::Utf8 => ListElement::Utf8,
                DataType::Int64 => ListElement::Int64,
                _ => ListElement::Other,
            }),
            _ => Self::Unsupported,
        }
    }

    pub fn from_field(field: &Field) -> Self {
        Self::from_data_type(field.data_type())
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::UInt8 => write!(f, "uint8"),
            Self::UInt16 => write!(f, "uint16"),
            Self::UInt32 => write!(f, "uint32"),
            Self::UInt64 => write!(f, "uint64"),
            Self::Int8 => write!(f, "int8"),
            Self::Int16 => write!(f, "int16"),
            Self::Int32 => write!(f, "int32"),
            Self::Int64 => write!(f, "int64"),
            Self::Float32 => write!(f, "float32"),
            Self::Float64 => write!(f, "float64"),
            Self::Decimal128 => write!(f, "decimal128"),
            Self::Utf8 => write!(f, "utf8"),
            Self::Timestamp(unit) => write!(f, "timestamp[{}]", unit_suffix(*unit)),
            Self::List(ListElement::Utf8) => write!(f, "list<utf8>"),
            Self::List(ListElement::Int64) => write!(f, "list<int64>"),
            Self::List(ListElement::Other) => write!(f, "list<other>"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

fn unit_suffix(unit: TimeUnit) -> &'static str {
    match unit {
        TimeUnit::Second => "s",
        TimeUnit::Millisecond => "ms",
        TimeUnit::Microsecond => "us",
        TimeUnit::Nanosecond => "ns",
    }
}

/// Growable, homogeneous output values for one frame field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldVector {
    Bool(Vec<bool>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    String(Vec<String>),
    Time(Vec<DateTime<Utc>>),
}

impl FieldVector {
    /// Empty vector of the element type a tag decodes to. `None` for
    /// unsupported tags, which never get values.
    pub fn empty_for(tag: TypeTag) -> Option<Self> {
        let vector = match tag {
            TypeTag::Bool => Self::Bool(Vec::new()),
            TypeTag::UInt8 => Self::UInt8(Vec::new()),
            TypeTag::UInt16 => Self::UInt16(Vec::new()),
            TypeTag::UInt32 => Self::UInt32(Vec::new()),
            TypeTag::UInt64 => Self::UInt64(Vec::new()),
            TypeTag::Int8 => Self::Int8(Vec::new()),
            TypeTag::Int16 => Self::Int16(Vec::new()),
            TypeTag::Int32 => Self::Int32(Vec::new()),
            TypeTag::Int64 => Self::Int64(Vec::new()),
            TypeTag::Float32 => Self::Float32(Vec::new()),
            TypeTag::Float64 | TypeTag::Decimal128 => Self::Float64(Vec::new()),
            TypeTag::Utf8 | TypeTag::List(_) => Self::String(Vec::new()),
            TypeTag::Timestamp(_) => Self::Time(Vec::new()),
            TypeTag::Unsupported => return None,
        };
        Some(vector)
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::UInt8(v) => v.len(),
            Self::UInt16(v) => v.len(),
            Self::UInt32(v) => v.len(),
            Self::UInt64(v) => v.len(),
            Self::Int8(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::String(v) => v.len(),
            Self::Time(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Host-facing element type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::UInt8(_) => "uint8",
            Self::UInt16(_) => "uint16",
            Self::UInt32(_) => "uint32",
            Self::UInt64(_) => "uint64",
            Self::Int8(_) => "int8",
            Self::Int16(_) => "int16",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Float32(_) => "float32",
            Self::Float64(_) => "float64",
            Self::String(_) => "string",
            Self::Time(_) => "time",
        }
    }

    /// Append every value of `other` onto this vector.
    pub fn append(&mut self, other: FieldVector) -> Result<(), SpicedashError> {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.extend(b),
            (Self::UInt8(a), Self::UInt8(b)) => a.extend(b),
            (Self::UInt16(a), Self::UInt16(b)) => a.extend(b),
            (Self::UInt32(a), Self::UInt32(b)) => a.extend(b),
            (Self::UInt64(a), Self::UInt64(b)) => a.extend(b),
            (Self::Int8(a), Self::Int8(b)) => a.extend(b),
            (Self::Int16(a), Self::Int16(b)) => a.extend(b),
            (Self::Int32(a), Self::Int32(b)) => a.extend(b),
            (Self::Int64(a), Self::Int64(b)) => a.extend(b),
            (Self::Float32(a), Self::Float32(b)) => a.extend(b),
            (Self::Float64(a), Self::Float64(b)) => a.extend(b),
            (Self::String(a), Self::String(b)) => a.extend(b),
            (Self::Time(a), Self::Time(b)) => a.extend(b),
            (current, other) => {
                return Err(SpicedashError::Decode {
                    message: format!(
                        "cannot append {} values to a {} field",
                        other.type_name(),
                        current.type_name()
                    ),
                });
            }
        }
        Ok(())
    }
}

/// A column bound to the concrete array its tag says it is.
enum TypedColumn<'a> {
    Bool(&'a BooleanArray),
    UInt8(&'a UInt8Array),
    UInt16(&'a UInt16Array),
    UInt32(&'a UInt32Array),
    UInt64(&'a UInt64Array),
    Int8(&'a Int8Array),
    Int16(&'a Int16Array),
    Int32(&'a Int32Array),
    Int64(&'a Int64Array),
    Float32(&'a Float32Array),
    Float64(&'a Float64Array),
    Decimal128(&'a Decimal128Array),
    Utf8(&'a StringArray),
    // raw integer values; the unit comes from the field, not the array
    Timestamp(Int64Array, TimeUnit),
    List(&'a ListArray, ListElement),
    Unsupported,
}

impl<'a> TypedColumn<'a> {
    fn bind(tag: TypeTag, column: &'a dyn Array) -> Result<Self, SpicedashError> {
        let typed = match tag {
            TypeTag::Bool => column.as_boolean_opt().map(Self::Bool),
            TypeTag::UInt8 => column.as_primitive_opt::<UInt8Type>().map(Self::UInt8),
            TypeTag::UInt16 => column.as_primitive_opt::<UInt16Type>().map(Self::UInt16),
            TypeTag::UInt32 => column.as_primitive_opt::<UInt32Type>().map(Self::UInt32),
            TypeTag::UInt64 => column.as_primitive_opt::<UInt64Type>().map(Self::UInt64),
            TypeTag::Int8 => column.as_primitive_opt::<Int8Type>().map(Self::Int8),
            TypeTag::Int16 => column.as_primitive_opt::<Int16Type>().map(Self::Int16),
            TypeTag::Int32 => column.as_primitive_opt::<Int32Type>().map(Self::Int32),
            TypeTag::Int64 => column.as_primitive_opt::<Int64Type>().map(Self::Int64),
            TypeTag::Float32 => column.as_primitive_opt::<Float32Type>().map(Self::Float32),
            TypeTag::Float64 => column.as_primitive_opt::<Float64Type>().map(Self::Float64),
            TypeTag::Decimal128 => column
                .as_primitive_opt::<Decimal128Type>()
                .map(Self::Decimal128),
            TypeTag::Utf8 => column.as_string_opt::<i32>().map(Self::Utf8),
            TypeTag::Timestamp(unit) => {
                raw_timestamps(column)?.map(|raw| Self::Timestamp(raw, unit))
            }
            TypeTag::List(element) => column
                .as_list_opt::<i32>()
                .map(|list| Self::List(list, element)),
            TypeTag::Unsupported => Some(Self::Unsupported),
        };

        typed.ok_or_else(|| SpicedashError::Decode {
            message: format!(
                "column of type {} cannot be read as {}",
                column.data_type(),
                tag
            ),
        })
    }

    fn decode(self) -> Result<Option<FieldVector>, SpicedashError> {
        let vector = match self {
            Self::Bool(a) => FieldVector::Bool(a.iter().map(|v| v.unwrap_or_default()).collect()),
            Self::UInt8(a) => FieldVector::UInt8(native_values(a)),
            Self::UInt16(a) => FieldVector::UInt16(native_values(a)),
            Self::UInt32(a) => FieldVector::UInt32(native_values(a)),
            Self::UInt64(a) => FieldVector::UInt64(native_values(a)),
            Self::Int8(a) => FieldVector::Int8(native_values(a)),
            Self::Int16(a) => FieldVector::Int16(native_values(a)),
            Self::Int32(a) => FieldVector::Int32(native_values(a)),
            Self::Int64(a) => FieldVector::Int64(native_values(a)),
            Self::Float32(a) => FieldVector::Float32(native_values(a)),
            Self::Float64(a) => FieldVector::Float64(native_values(a)),
            Self::Decimal128(a) => FieldVector::Float64(
                native_values(a).into_iter().map(decimal_to_f64).collect(),
            ),
            Self::Utf8(a) => FieldVector::String(
                a.iter().map(|v| v.unwrap_or_default().to_string()).collect(),
            ),
            Self::Timestamp(raw, unit) => FieldVector::Time(
                native_values(&raw)
                    .into_iter()
                    .map(|value| timestamp_to_datetime(value, unit))
                    .collect::<Result<_, _>>()?,
            ),
            Self::List(list, element) => FieldVector::String(
                (0..list.len())
                    .map(|row| render_list_row(list, row, element))
                    .collect(),
            ),
            Self::Unsupported => return Ok(None),
        };
        Ok(Some(vector))
    }
}

/// Decode one column of one batch into native values.
///
/// Dispatch is driven entirely by `tag`; a column whose array does not match
/// its tag is a decode error. Null slots decode to the element type's default
/// value. Returns `Ok(None)` for unsupported tags.
///
/// A timestamp outside the range `chrono` can represent for its unit is a
/// `Decode` error for the whole column. The query then stops at that batch
/// and keeps the rows accumulated before it.
pub fn decode_column(
    tag: TypeTag,
    column: &dyn Array,
) -> Result<Option<FieldVector>, SpicedashError> {
    TypedColumn::bind(tag, column)?.decode()
}

/// Convert a raw Decimal128 value using the fixed scale-1 convention.
pub fn decimal_to_f64(raw: i128) -> f64 {
    raw as f64 / 10f64.powi(DECIMAL_SCALE)
}

/// Interpret a raw timestamp integer in the given unit.
pub fn timestamp_to_datetime(value: i64, unit: TimeUnit) -> Result<DateTime<Utc>, SpicedashError> {
    let naive = match unit {
        TimeUnit::Second => timestamp_s_to_datetime(value),
        TimeUnit::Millisecond => timestamp_ms_to_datetime(value),
        TimeUnit::Microsecond => timestamp_us_to_datetime(value),
        TimeUnit::Nanosecond => timestamp_ns_to_datetime(value),
    };
    naive
        .map(|n| n.and_utc())
        .ok_or_else(|| SpicedashError::Decode {
            message: format!(
                "timestamp {value} is out of range for unit {}",
                unit_suffix(unit)
            ),
        })
}

fn native_values<T: ArrowPrimitiveType>(array: &PrimitiveArray<T>) -> Vec<T::Native> {
    array.iter().map(|v| v.unwrap_or_default()).collect()
}

fn raw_timestamps(column: &dyn Array) -> Result<Option<Int64Array>, SpicedashError> {
    if !matches!(column.data_type(), DataType::Timestamp(_, _)) {
        return Ok(None);
    }
    let raw = cast(column, &DataType::Int64).map_err(|e| SpicedashError::Decode {
        message: format!("failed to read raw timestamp values: {e}"),
    })?;
    Ok(raw.as_primitive_opt::<Int64Type>().cloned())
}

fn render_list_row(list: &ListArray, row: usize, element: ListElement) -> String {
    if list.is_null(row) {
        return String::new();
    }
    let values = list.value(row);
    let rendered: Option<Vec<String>> = match element {
        ListElement::Utf8 => values.as_string_opt::<i32>().map(|strings| {
            strings
                .iter()
                .map(|v| v.unwrap_or_default().to_string())
                .collect()
        }),
        ListElement::Int64 => values
            .as_primitive_opt::<Int64Type>()
            .map(|ints| native_values(ints).iter().map(i64::to_string).collect()),
        ListElement::Other => None,
    };
    rendered
        .map(|parts| parts.join(LIST_SEPARATOR))
        .unwrap_or_default()
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed values exchanged with the platform.
//!
//! [`AstarteData`] is a closed tagged union over the fourteen mapping
//! types. Serialization to the wire codec is by tag; deserialization is
//! schema-directed, driven by the [`MappingType`] declared on the mapping
//! the message resolves to.
//!
//! Equality is structural. Doubles compare bit-exact by policy, with NaN
//! never equal to anything, so a round-tripped value compares equal to the
//! original while NaN payload laundering does not go unnoticed.

pub mod object;

pub use object::{object_entries_equal, ObjectEntry, OBJECT_MAX_ENTRIES};

use crate::bson::{BsonDocument, BsonElement, BsonError, BsonSerializer, ELEMENT_INT32};
use crate::interface::MappingType;

/// One typed value, owning its backing storage.
#[derive(Debug, Clone)]
pub enum AstarteData {
    /// Boolean scalar.
    Bool(bool),
    /// UTC timestamp, epoch milliseconds.
    DateTime(i64),
    /// IEEE 754 64-bit float.
    Double(f64),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// UTF-8 string.
    String(String),
    /// Opaque byte sequence.
    Binary(Vec<u8>),
    /// Array of booleans.
    BoolArray(Vec<bool>),
    /// Array of UTC timestamps.
    DateTimeArray(Vec<i64>),
    /// Array of doubles.
    DoubleArray(Vec<f64>),
    /// Array of 32-bit signed integers.
    Int32Array(Vec<i32>),
    /// Array of 64-bit signed integers.
    Int64Array(Vec<i64>),
    /// Array of UTF-8 strings.
    StringArray(Vec<String>),
    /// Array of opaque byte sequences.
    BinaryArray(Vec<Vec<u8>>),
}

impl AstarteData {
    /// The mapping type this value carries.
    pub fn mapping_type(&self) -> MappingType {
        match self {
            AstarteData::Bool(_) => MappingType::Bool,
            AstarteData::DateTime(_) => MappingType::DateTime,
            AstarteData::Double(_) => MappingType::Double,
            AstarteData::Int32(_) => MappingType::Int32,
            AstarteData::Int64(_) => MappingType::Int64,
            AstarteData::String(_) => MappingType::String,
            AstarteData::Binary(_) => MappingType::Binary,
            AstarteData::BoolArray(_) => MappingType::BoolArray,
            AstarteData::DateTimeArray(_) => MappingType::DateTimeArray,
            AstarteData::DoubleArray(_) => MappingType::DoubleArray,
            AstarteData::Int32Array(_) => MappingType::Int32Array,
            AstarteData::Int64Array(_) => MappingType::Int64Array,
            AstarteData::StringArray(_) => MappingType::StringArray,
            AstarteData::BinaryArray(_) => MappingType::BinaryArray,
        }
    }

    /// UTC timestamp constructor, distinguishing datetimes from plain
    /// 64-bit integers.
    pub fn datetime(epoch_millis: i64) -> Self {
        AstarteData::DateTime(epoch_millis)
    }

    /// Datetime-array constructor, distinguishing it from `Int64Array`.
    pub fn datetime_array(epoch_millis: Vec<i64>) -> Self {
        AstarteData::DateTimeArray(epoch_millis)
    }

    /// Append this value to an open document under `key`.
    pub fn serialize_into(&self, ser: &mut BsonSerializer, key: &str) {
        match self {
            AstarteData::Bool(v) => ser.append_boolean(key, *v),
            AstarteData::DateTime(v) => ser.append_datetime(key, *v),
            AstarteData::Double(v) => ser.append_double(key, *v),
            AstarteData::Int32(v) => ser.append_int32(key, *v),
            AstarteData::Int64(v) => ser.append_int64(key, *v),
            AstarteData::String(v) => ser.append_string(key, v),
            AstarteData::Binary(v) => ser.append_binary(key, v),
            AstarteData::BoolArray(v) => ser.append_boolean_array(key, v),
            AstarteData::DateTimeArray(v) => ser.append_datetime_array(key, v),
            AstarteData::DoubleArray(v) => ser.append_double_array(key, v),
            AstarteData::Int32Array(v) => ser.append_int32_array(key, v),
            AstarteData::Int64Array(v) => ser.append_int64_array(key, v),
            AstarteData::StringArray(v) => ser.append_string_array(key, v),
            AstarteData::BinaryArray(v) => ser.append_binary_array(key, v),
        }
    }

    /// Schema-directed decode of one element.
    ///
    /// The element must satisfy `expected`, with one compatibility
    /// exception: an `Int64` (or `Int64Array` element) slot accepts an
    /// encoded int32 and widens it.
    pub fn deserialize(elem: &BsonElement<'_>, expected: MappingType) -> Result<Self, BsonError> {
        if expected.is_array() {
            Self::deserialize_array(elem, expected)
        } else {
            Self::deserialize_scalar(elem, expected)
        }
    }

    fn deserialize_scalar(
        elem: &BsonElement<'_>,
        expected: MappingType,
    ) -> Result<Self, BsonError> {
        match expected {
            MappingType::Bool => Ok(AstarteData::Bool(elem.as_bool()?)),
            MappingType::DateTime => Ok(AstarteData::DateTime(elem.as_datetime()?)),
            MappingType::Double => Ok(AstarteData::Double(elem.as_double()?)),
            MappingType::Int32 => Ok(AstarteData::Int32(elem.as_int32()?)),
            MappingType::Int64 => Ok(AstarteData::Int64(Self::widening_int64(elem)?)),
            MappingType::String => Ok(AstarteData::String(elem.as_str()?.to_string())),
            MappingType::Binary => Ok(AstarteData::Binary(elem.as_binary()?.to_vec())),
            _ => unreachable!("array shapes are handled by deserialize_array"),
        }
    }

    fn deserialize_array(elem: &BsonElement<'_>, expected: MappingType) -> Result<Self, BsonError> {
        let doc = elem.as_array()?;
        let scalar = expected.scalar();

        // First pass: count the elements and reject type mismatches before
        // any storage is allocated.
        let count = Self::check_array_elements(&doc, scalar)?;
        if count == 0 {
            return Ok(Self::empty_array(expected));
        }

        // Second pass: allocate once and fill.
        macro_rules! fill {
            ($variant:ident, $decode:expr) => {{
                let mut out = Vec::with_capacity(count);
                let mut cursor = doc.first_element()?;
                while let Some(inner) = cursor {
                    #[allow(clippy::redundant_closure_call)]
                    out.push($decode(&inner)?);
                    cursor = doc.next_element(&inner)?;
                }
                Ok(AstarteData::$variant(out))
            }};
        }

        match expected {
            MappingType::BoolArray => fill!(BoolArray, |e: &BsonElement<'_>| e.as_bool()),
            MappingType::DateTimeArray => {
                fill!(DateTimeArray, |e: &BsonElement<'_>| e.as_datetime())
            }
            MappingType::DoubleArray => fill!(DoubleArray, |e: &BsonElement<'_>| e.as_double()),
            MappingType::Int32Array => fill!(Int32Array, |e: &BsonElement<'_>| e.as_int32()),
            MappingType::Int64Array => {
                fill!(Int64Array, |e: &BsonElement<'_>| Self::widening_int64(e))
            }
            MappingType::StringArray => {
                fill!(StringArray, |e: &BsonElement<'_>| e
                    .as_str()
                    .map(str::to_string))
            }
            MappingType::BinaryArray => {
                fill!(BinaryArray, |e: &BsonElement<'_>| e
                    .as_binary()
                    .map(<[u8]>::to_vec))
            }
            _ => unreachable!("scalar shapes are handled by deserialize_scalar"),
        }
    }

    /// Count the elements of an array document, checking each element type
    /// against the expected scalar shape.
    fn check_array_elements(
        doc: &BsonDocument<'_>,
        scalar: MappingType,
    ) -> Result<usize, BsonError> {
        let expected_type = scalar.expected_element_type();
        let mut count = 0;
        let mut cursor = doc.first_element()?;
        while let Some(inner) = cursor {
            let compatible = inner.element_type == expected_type
                || (scalar == MappingType::Int64 && inner.element_type == ELEMENT_INT32);
            if !compatible {
                return Err(BsonError::TypeMismatch {
                    expected: expected_type,
                    found: inner.element_type,
                });
            }
            count += 1;
            cursor = doc.next_element(&inner)?;
        }
        Ok(count)
    }

    /// Decode an int64 slot, widening an encoded int32 when present.
    fn widening_int64(elem: &BsonElement<'_>) -> Result<i64, BsonError> {
        if elem.element_type == ELEMENT_INT32 {
            Ok(i64::from(elem.as_int32()?))
        } else {
            elem.as_int64()
        }
    }

    /// Zero-length array value of the given array shape.
    fn empty_array(expected: MappingType) -> Self {
        match expected {
            MappingType::BoolArray => AstarteData::BoolArray(Vec::new()),
            MappingType::DateTimeArray => AstarteData::DateTimeArray(Vec::new()),
            MappingType::DoubleArray => AstarteData::DoubleArray(Vec::new()),
            MappingType::Int32Array => AstarteData::Int32Array(Vec::new()),
            MappingType::Int64Array => AstarteData::Int64Array(Vec::new()),
            MappingType::StringArray => AstarteData::StringArray(Vec::new()),
            MappingType::BinaryArray => AstarteData::BinaryArray(Vec::new()),
            _ => unreachable!("empty_array is only called for array shapes"),
        }
    }
}

/// Bit-exact double comparison with NaN never equal.
fn double_eq(a: f64, b: f64) -> bool {
    !a.is_nan() && !b.is_nan() && a.to_bits() == b.to_bits()
}

impl PartialEq for AstarteData {
    fn eq(&self, other: &Self) -> bool {
        use AstarteData::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a == b,
            (DateTime(a), DateTime(b)) => a == b,
            (Double(a), Double(b)) => double_eq(*a, *b),
            (Int32(a), Int32(b)) => a == b,
            (Int64(a), Int64(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Binary(a), Binary(b)) => a == b,
            (BoolArray(a), BoolArray(b)) => a == b,
            (DateTimeArray(a), DateTimeArray(b)) => a == b,
            (DoubleArray(a), DoubleArray(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| double_eq(*x, *y))
            }
            (Int32Array(a), Int32Array(b)) => a == b,
            (Int64Array(a), Int64Array(b)) => a == b,
            (StringArray(a), StringArray(b)) => a == b,
            (BinaryArray(a), BinaryArray(b)) => a == b,
            _ => false,
        }
    }
}

macro_rules! impl_from {
    ($type:ty, $variant:ident) => {
        impl From<$type> for AstarteData {
            fn from(value: $type) -> Self {
                AstarteData::$variant(value.into())
            }
        }
    };
}

impl_from!(bool, Bool);
impl_from!(f64, Double);
impl_from!(i32, Int32);
impl_from!(i64, Int64);
impl_from!(String, String);
impl_from!(&str, String);
impl_from!(Vec<u8>, Binary);
impl_from!(Vec<bool>, BoolArray);
impl_from!(Vec<f64>, DoubleArray);
impl_from!(Vec<i32>, Int32Array);
impl_from!(Vec<i64>, Int64Array);
impl_from!(Vec<String>, StringArray);
impl_from!(Vec<Vec<u8>>, BinaryArray);

macro_rules! impl_try_from {
    ($type:ty, $variant:ident, $name:literal) => {
        impl TryFrom<AstarteData> for $type {
            type Error = crate::device::Error;

            fn try_from(value: AstarteData) -> Result<Self, Self::Error> {
                match value {
                    AstarteData::$variant(v) => Ok(v),
                    other => Err(crate::device::Error::InvalidParam(format!(
                        "cannot convert {:?} value to {}",
                        other.mapping_type(),
                        $name
                    ))),
                }
            }
        }
    };
}

impl_try_from!(bool, Bool, "bool");
impl_try_from!(f64, Double, "double");
impl_try_from!(i32, Int32, "int32");
impl_try_from!(i64, Int64, "int64");
impl_try_from!(String, String, "string");
impl_try_from!(Vec<u8>, Binary, "binary");
impl_try_from!(Vec<bool>, BoolArray, "bool array");
impl_try_from!(Vec<f64>, DoubleArray, "double array");
impl_try_from!(Vec<i32>, Int32Array, "int32 array");
impl_try_from!(Vec<i64>, Int64Array, "int64 array");
impl_try_from!(Vec<String>, StringArray, "string array");
impl_try_from!(Vec<Vec<u8>>, BinaryArray, "binary array");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::BsonSerializer;

    /// Serialize under "v", then decode the "v" element against `expected`.
    fn round_trip(value: &AstarteData, expected: MappingType) -> Result<AstarteData, BsonError> {
        let mut ser = BsonSerializer::new();
        value.serialize_into(&mut ser, "v");
        ser.end_of_document();
        let bytes = ser.into_document();

        let doc = BsonDocument::parse(&bytes)?;
        let elem = doc.lookup("v")?.expect("v element must be present");
        AstarteData::deserialize(&elem, expected)
    }

    fn samples() -> Vec<AstarteData> {
        vec![
            AstarteData::Bool(true),
            AstarteData::datetime(1_700_000_000_000),
            AstarteData::Double(-0.0),
            AstarteData::Double(f64::MAX),
            AstarteData::Int32(i32::MIN),
            AstarteData::Int64(i64::MAX),
            AstarteData::String("sensor".into()),
            AstarteData::Binary(vec![0, 1, 255]),
            AstarteData::BoolArray(vec![true, false]),
            AstarteData::datetime_array(vec![0, -1, 1_700_000_000_000]),
            AstarteData::DoubleArray(vec![1.5, -2.25]),
            AstarteData::Int32Array(vec![1, -2, 3]),
            AstarteData::Int64Array(vec![i64::MIN, 0]),
            AstarteData::StringArray(vec!["a".into(), "".into()]),
            AstarteData::BinaryArray(vec![vec![1], vec![], vec![2, 3]]),
        ]
    }

    #[test]
    fn test_round_trip_every_mapping_type() {
        for value in samples() {
            let decoded = round_trip(&value, value.mapping_type())
                .expect("round trip should decode cleanly");
            assert_eq!(decoded, value, "round trip must preserve {:?}", value);
        }
    }

    #[test]
    fn test_empty_array_round_trip() {
        let empties = [
            AstarteData::BoolArray(vec![]),
            AstarteData::DateTimeArray(vec![]),
            AstarteData::DoubleArray(vec![]),
            AstarteData::Int32Array(vec![]),
            AstarteData::Int64Array(vec![]),
            AstarteData::StringArray(vec![]),
            AstarteData::BinaryArray(vec![]),
        ];
        for value in empties {
            let decoded = round_trip(&value, value.mapping_type())
                .expect("empty arrays are legal documents");
            assert_eq!(decoded, value);
            assert!(decoded.mapping_type().is_array());
        }
    }

    #[test]
    fn test_int32_widens_into_int64_slot() {
        let decoded = round_trip(&AstarteData::Int32(42), MappingType::Int64)
            .expect("int32 must widen into an int64 slot");
        assert_eq!(decoded, AstarteData::Int64(42));
    }

    #[test]
    fn test_int64_does_not_narrow_into_int32_slot() {
        let err = round_trip(&AstarteData::Int64(42), MappingType::Int32)
            .expect_err("int64 must not narrow into an int32 slot");
        assert!(matches!(err, BsonError::TypeMismatch { .. }));
    }

    #[test]
    fn test_mixed_int_array_widens_per_element() {
        // An array document mixing int32 and int64 elements decodes into an
        // Int64Array with per-element widening.
        let mut inner = BsonSerializer::new();
        inner.append_int32("0", 7);
        inner.append_int64("1", 1 << 40);
        inner.append_int32("2", -7);
        inner.end_of_document();

        let mut ser = BsonSerializer::new();
        ser.append_document("v", inner.document());
        ser.end_of_document();
        let mut bytes = ser.into_document();
        // Rewrite the element type from document to array; the framing is
        // identical.
        bytes[4] = crate::bson::ELEMENT_ARRAY;

        let doc = BsonDocument::parse(&bytes).expect("document should parse");
        let elem = doc.lookup("v").expect("walk ok").expect("v present");
        let decoded = AstarteData::deserialize(&elem, MappingType::Int64Array)
            .expect("mixed array should widen");
        assert_eq!(decoded, AstarteData::Int64Array(vec![7, 1 << 40, -7]));

        let err = AstarteData::deserialize(&elem, MappingType::Int32Array)
            .expect_err("int64 elements must not narrow");
        assert!(matches!(err, BsonError::TypeMismatch { .. }));
    }

    #[test]
    fn test_scalar_type_mismatch_rejected() {
        let err = round_trip(&AstarteData::String("not a number".into()), MappingType::Int32)
            .expect_err("string must not decode as int32");
        assert!(matches!(err, BsonError::TypeMismatch { .. }));

        let err = round_trip(&AstarteData::Double(1.0), MappingType::DoubleArray)
            .expect_err("scalar must not decode as array");
        assert!(matches!(err, BsonError::TypeMismatch { .. }));
    }

    #[test]
    fn test_array_element_type_mismatch_rejected() {
        let err = round_trip(
            &AstarteData::StringArray(vec!["a".into()]),
            MappingType::Int32Array,
        )
        .expect_err("string elements must not decode as int32");
        assert!(matches!(err, BsonError::TypeMismatch { .. }));
    }

    #[test]
    fn test_double_equality_is_bit_exact() {
        assert_eq!(AstarteData::Double(1.5), AstarteData::Double(1.5));
        assert_ne!(AstarteData::Double(0.0), AstarteData::Double(-0.0));
        assert_ne!(
            AstarteData::Double(f64::NAN),
            AstarteData::Double(f64::NAN),
            "NaN never compares equal"
        );
        assert_ne!(
            AstarteData::DoubleArray(vec![f64::NAN]),
            AstarteData::DoubleArray(vec![f64::NAN])
        );
    }

    #[test]
    fn test_equality_discriminates_tags() {
        assert_ne!(AstarteData::Int64(1), AstarteData::DateTime(1));
        assert_ne!(
            AstarteData::Int64Array(vec![1]),
            AstarteData::DateTimeArray(vec![1])
        );
        assert_ne!(AstarteData::Int32(1), AstarteData::Int64(1));
    }

    #[test]
    fn test_conversions() {
        let value: AstarteData = 21.5f64.into();
        assert_eq!(value.mapping_type(), MappingType::Double);
        let back: f64 = value.try_into().expect("double converts back");
        assert_eq!(back, 21.5);

        let value: AstarteData = "tag".into();
        assert!(i32::try_from(value).is_err());

        // Plain i64 converts to Int64, never DateTime.
        let value: AstarteData = 5i64.into();
        assert_eq!(value.mapping_type(), MappingType::Int64);
        assert!(matches!(
            AstarteData::datetime(5).mapping_type(),
            MappingType::DateTime
        ));
    }
}

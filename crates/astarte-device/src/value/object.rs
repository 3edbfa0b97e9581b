// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Object aggregation entries.
//!
//! An object publish carries a record of sibling values: an ordered
//! sequence of `(path component, value)` pairs serialized as one embedded
//! document. Order is not significant on the wire, so object equality is a
//! path bijection; a presence bitset over the right-hand side detects
//! duplicate keys without allocating.

use crate::bson::{BsonElement, BsonError, BsonSerializer};
use crate::device::Error;
use crate::interface::Interface;
use crate::value::AstarteData;
use crate::{debug, error};

/// Protocol limit on the entries of one object publish.
pub const OBJECT_MAX_ENTRIES: usize = 1024;

const BITSET_WORDS: usize = OBJECT_MAX_ENTRIES / 64;

/// One field of an object publish: the last path component and its value.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEntry {
    /// Path component naming the sibling mapping (no `/`).
    pub path: String,
    /// The value for this field.
    pub data: AstarteData,
}

impl ObjectEntry {
    /// Build one entry.
    pub fn new(path: impl Into<String>, data: AstarteData) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }
}

/// Serialize entries as one embedded document under `key`.
pub fn serialize_entries(ser: &mut BsonSerializer, key: &str, entries: &[ObjectEntry]) {
    let mut inner = BsonSerializer::new();
    for entry in entries {
        entry.data.serialize_into(&mut inner, &entry.path);
    }
    inner.end_of_document();
    ser.append_document(key, inner.document());
}

/// Schema-directed decode of an object publish.
///
/// `elem` must be the embedded document element; each inner element key is
/// resolved through the interface against `common_path` and decoded with
/// the mapping's type.
///
/// # Errors
///
/// - `CodecTypeMismatch` / `CodecMalformed` for wire-level problems,
///   including an empty document or more than [`OBJECT_MAX_ENTRIES`]
///   entries.
/// - `InvalidParam` when an entry key does not resolve to a mapping.
pub fn deserialize_entries(
    elem: &BsonElement<'_>,
    interface: &Interface,
    common_path: &str,
) -> Result<Vec<ObjectEntry>, Error> {
    let doc = elem.as_document()?;

    let count = doc.count_elements()?;
    if count == 0 {
        error!("object document for {} is empty", interface.name());
        return Err(BsonError::Malformed {
            reason: "object document has no entries",
        }
        .into());
    }
    if count > OBJECT_MAX_ENTRIES {
        error!(
            "object document for {} has {} entries, over the protocol limit",
            interface.name(),
            count
        );
        return Err(BsonError::Malformed {
            reason: "object document exceeds the entry limit",
        }
        .into());
    }

    let mut entries = Vec::with_capacity(count);
    let mut cursor = doc.first_element()?;
    while let Some(inner) = cursor {
        let mapping = interface
            .mapping_for_object_entry(common_path, inner.name)
            .ok_or_else(|| {
                Error::InvalidParam(format!(
                    "no mapping for object entry {}/{} on {}",
                    common_path,
                    inner.name,
                    interface.name()
                ))
            })?;
        let data = AstarteData::deserialize(&inner, mapping.mapping_type())?;
        entries.push(ObjectEntry::new(inner.name, data));
        cursor = doc.next_element(&inner)?;
    }
    debug!(
        "deserialized {} object entries for {}{}",
        entries.len(),
        interface.name(),
        common_path
    );
    Ok(entries)
}

/// Structural equality of two object payloads.
///
/// Equal iff entry counts match, stay within [`OBJECT_MAX_ENTRIES`], and
/// there is a path bijection under which values compare equal. Wire order
/// is irrelevant; duplicate keys on either side break the bijection.
pub fn object_entries_equal(left: &[ObjectEntry], right: &[ObjectEntry]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    if left.len() > OBJECT_MAX_ENTRIES {
        error!(
            "object comparison over {} entries exceeds the protocol limit",
            left.len()
        );
        return false;
    }

    // Presence bitset over the right-hand entries: each may be matched
    // exactly once. O(n^2) worst case, acceptable under the 1024 cap.
    let mut matched = [0u64; BITSET_WORDS];

    for entry in left {
        let Some(index) = right.iter().position(|r| r.path == entry.path) else {
            return false;
        };
        let (word, bit) = (index / 64, index % 64);
        if matched[word] & (1 << bit) != 0 {
            // The first entry with this key was already consumed, so the
            // left side carries a duplicate.
            return false;
        }
        matched[word] |= 1 << bit;

        if entry.data != right[index].data {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::BsonDocument;
    use crate::interface::{Aggregation, InterfaceType, Mapping, MappingType, Ownership};

    fn aggregate_interface() -> Interface {
        Interface::new(
            "org.example.Aggregate",
            1,
            0,
            Ownership::Server,
            InterfaceType::Datastream,
            Aggregation::Object,
        )
        .expect("interface should build")
        .with_mapping(Mapping::new("/group/a", MappingType::Int32).expect("mapping should build"))
        .expect("mapping should attach")
        .with_mapping(Mapping::new("/group/b", MappingType::Double).expect("mapping should build"))
        .expect("mapping should attach")
        .with_mapping(
            Mapping::new("/group/tags", MappingType::StringArray).expect("mapping should build"),
        )
        .expect("mapping should attach")
    }

    fn entries() -> Vec<ObjectEntry> {
        vec![
            ObjectEntry::new("a", AstarteData::Int32(7)),
            ObjectEntry::new("b", AstarteData::Double(2.5)),
            ObjectEntry::new(
                "tags",
                AstarteData::StringArray(vec!["x".into(), "y".into()]),
            ),
        ]
    }

    #[test]
    fn test_serialize_deserialize_round_trip() {
        let mut ser = BsonSerializer::new();
        serialize_entries(&mut ser, "v", &entries());
        ser.end_of_document();
        let bytes = ser.into_document();

        let doc = BsonDocument::parse(&bytes).expect("document should parse");
        let elem = doc.lookup("v").expect("walk ok").expect("v present");
        let decoded = deserialize_entries(&elem, &aggregate_interface(), "/group")
            .expect("entries should decode against the schema");
        assert_eq!(decoded, entries());
    }

    #[test]
    fn test_unknown_entry_key_rejected() {
        let mut ser = BsonSerializer::new();
        serialize_entries(
            &mut ser,
            "v",
            &[ObjectEntry::new("zz", AstarteData::Int32(1))],
        );
        ser.end_of_document();
        let bytes = ser.into_document();

        let doc = BsonDocument::parse(&bytes).expect("document should parse");
        let elem = doc.lookup("v").expect("walk ok").expect("v present");
        let err = deserialize_entries(&elem, &aggregate_interface(), "/group")
            .expect_err("unknown keys must be rejected");
        assert!(matches!(err, Error::InvalidParam(_)));
    }

    #[test]
    fn test_entry_type_mismatch_rejected() {
        let mut ser = BsonSerializer::new();
        serialize_entries(
            &mut ser,
            "v",
            &[ObjectEntry::new("a", AstarteData::String("oops".into()))],
        );
        ser.end_of_document();
        let bytes = ser.into_document();

        let doc = BsonDocument::parse(&bytes).expect("document should parse");
        let elem = doc.lookup("v").expect("walk ok").expect("v present");
        let err = deserialize_entries(&elem, &aggregate_interface(), "/group")
            .expect_err("mistyped entries must be rejected");
        assert!(matches!(err, Error::CodecTypeMismatch));
    }

    #[test]
    fn test_empty_object_rejected() {
        let mut ser = BsonSerializer::new();
        serialize_entries(&mut ser, "v", &[]);
        ser.end_of_document();
        let bytes = ser.into_document();

        let doc = BsonDocument::parse(&bytes).expect("document should parse");
        let elem = doc.lookup("v").expect("walk ok").expect("v present");
        assert!(matches!(
            deserialize_entries(&elem, &aggregate_interface(), "/group"),
            Err(Error::CodecMalformed)
        ));
    }

    #[test]
    fn test_equality_is_an_equivalence() {
        let a = entries();
        let mut b = entries();
        b.reverse();
        let c: Vec<ObjectEntry> = {
            let mut v = entries();
            v.swap(0, 1);
            v
        };

        // Reflexive, symmetric (via shuffled copies), transitive.
        assert!(object_entries_equal(&a, &a));
        assert!(object_entries_equal(&a, &b));
        assert!(object_entries_equal(&b, &a));
        assert!(object_entries_equal(&b, &c));
        assert!(object_entries_equal(&a, &c));
    }

    #[test]
    fn test_equality_rejects_differences() {
        let a = entries();

        let mut shorter = entries();
        shorter.pop();
        assert!(!object_entries_equal(&a, &shorter));

        let mut renamed = entries();
        renamed[0].path = "z".into();
        assert!(!object_entries_equal(&a, &renamed));

        let mut changed = entries();
        changed[1].data = AstarteData::Double(9.0);
        assert!(!object_entries_equal(&a, &changed));
    }

    #[test]
    fn test_duplicate_keys_compare_unequal() {
        let expected = vec![
            ObjectEntry::new("a", AstarteData::Int32(1)),
            ObjectEntry::new("b", AstarteData::Int32(2)),
        ];
        let received = vec![
            ObjectEntry::new("a", AstarteData::Int32(1)),
            ObjectEntry::new("a", AstarteData::Int32(2)),
        ];
        assert!(!object_entries_equal(&expected, &received));
        assert!(!object_entries_equal(&received, &expected));
    }

    #[test]
    fn test_equality_over_entry_cap_fails() {
        let big: Vec<ObjectEntry> = (0..OBJECT_MAX_ENTRIES + 1)
            .map(|i| ObjectEntry::new(format!("k{}", i), AstarteData::Int32(i as i32)))
            .collect();
        assert!(!object_entries_equal(&big, &big));
    }

    #[test]
    fn test_empty_payloads_compare_equal() {
        assert!(object_entries_equal(&[], &[]));
    }
}

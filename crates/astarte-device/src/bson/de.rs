// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounds-checked document reader.
//!
//! [`BsonDocument`] borrows the received payload and hands out
//! [`BsonElement`] views. Element iteration is offset-based: each parsed
//! element remembers where the next one starts, so walking a document never
//! allocates. All multi-byte values are little-endian.

use super::{
    BsonError, ELEMENT_ARRAY, ELEMENT_BINARY, ELEMENT_BOOLEAN, ELEMENT_DATETIME, ELEMENT_DOCUMENT,
    ELEMENT_DOUBLE, ELEMENT_INT32, ELEMENT_INT64, ELEMENT_STRING, MIN_DOCUMENT_LEN,
};

/// A validated view over one binary document.
#[derive(Debug, Clone, Copy)]
pub struct BsonDocument<'a> {
    bytes: &'a [u8],
}

/// One typed element inside a document.
///
/// `value` holds the raw value bytes exactly as framed on the wire; the
/// typed accessors re-check the element type before decoding.
#[derive(Debug, Clone, Copy)]
pub struct BsonElement<'a> {
    /// Wire element type code.
    pub element_type: u8,
    /// Element key.
    pub name: &'a str,
    value: &'a [u8],
    next_offset: usize,
}

impl<'a> BsonDocument<'a> {
    /// Validate the outer framing of a document.
    ///
    /// Checks the minimum size, that the length prefix matches the buffer
    /// length exactly, and that the final byte is the zero terminator.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, BsonError> {
        if bytes.len() < MIN_DOCUMENT_LEN {
            return Err(BsonError::Malformed {
                reason: "document shorter than minimum",
            });
        }
        let declared = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        if declared != bytes.len() {
            return Err(BsonError::Malformed {
                reason: "length prefix does not match payload size",
            });
        }
        if bytes[bytes.len() - 1] != 0 {
            return Err(BsonError::Malformed {
                reason: "missing document terminator",
            });
        }
        Ok(Self { bytes })
    }

    /// The raw document bytes, length prefix and terminator included.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// First element of the document, `None` when the document is empty.
    pub fn first_element(&self) -> Result<Option<BsonElement<'a>>, BsonError> {
        self.element_at(4)
    }

    /// Element following `current`, `None` at the end of the document.
    pub fn next_element(
        &self,
        current: &BsonElement<'a>,
    ) -> Result<Option<BsonElement<'a>>, BsonError> {
        self.element_at(current.next_offset)
    }

    /// Linear search for the element with the given key.
    pub fn lookup(&self, name: &str) -> Result<Option<BsonElement<'a>>, BsonError> {
        let mut cursor = self.first_element()?;
        while let Some(elem) = cursor {
            if elem.name == name {
                return Ok(Some(elem));
            }
            cursor = self.next_element(&elem)?;
        }
        Ok(None)
    }

    /// Number of elements, walking the whole document once.
    pub fn count_elements(&self) -> Result<usize, BsonError> {
        let mut count = 0;
        let mut cursor = self.first_element()?;
        while let Some(elem) = cursor {
            count += 1;
            cursor = self.next_element(&elem)?;
        }
        Ok(count)
    }

    fn element_at(&self, offset: usize) -> Result<Option<BsonElement<'a>>, BsonError> {
        let bytes = self.bytes;
        if offset >= bytes.len() {
            return Err(BsonError::Truncated { offset });
        }

        let element_type = bytes[offset];
        if element_type == 0 {
            // Terminator: valid only as the very last byte.
            if offset == bytes.len() - 1 {
                return Ok(None);
            }
            return Err(BsonError::Malformed {
                reason: "terminator before end of document",
            });
        }

        let name_start = offset + 1;
        let name_len = bytes[name_start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(BsonError::Truncated { offset: name_start })?;
        let name = std::str::from_utf8(&bytes[name_start..name_start + name_len]).map_err(|_| {
            BsonError::Malformed {
                reason: "element key is not valid UTF-8",
            }
        })?;

        let value_start = name_start + name_len + 1;
        let value_len = Self::value_len(element_type, &bytes[value_start..], value_start)?;
        let value = &bytes[value_start..value_start + value_len];

        Ok(Some(BsonElement {
            element_type,
            name,
            value,
            next_offset: value_start + value_len,
        }))
    }

    /// Size of the value of an element of `element_type` starting at
    /// `rest`, validating internal framing along the way.
    fn value_len(element_type: u8, rest: &[u8], offset: usize) -> Result<usize, BsonError> {
        let need = |n: usize| {
            if rest.len() < n {
                Err(BsonError::Truncated { offset })
            } else {
                Ok(())
            }
        };

        match element_type {
            ELEMENT_DOUBLE | ELEMENT_DATETIME | ELEMENT_INT64 => {
                need(8)?;
                Ok(8)
            }
            ELEMENT_INT32 => {
                need(4)?;
                Ok(4)
            }
            ELEMENT_BOOLEAN => {
                need(1)?;
                if rest[0] > 1 {
                    return Err(BsonError::Malformed {
                        reason: "boolean byte is not 0 or 1",
                    });
                }
                Ok(1)
            }
            ELEMENT_STRING => {
                need(4)?;
                let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
                if len == 0 {
                    return Err(BsonError::Malformed {
                        reason: "string length must include the terminator",
                    });
                }
                need(4 + len)?;
                if rest[4 + len - 1] != 0 {
                    return Err(BsonError::Malformed {
                        reason: "string is not NUL-terminated",
                    });
                }
                Ok(4 + len)
            }
            ELEMENT_BINARY => {
                need(5)?;
                let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
                need(5 + len)?;
                Ok(5 + len)
            }
            ELEMENT_DOCUMENT | ELEMENT_ARRAY => {
                need(4)?;
                let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
                if len < MIN_DOCUMENT_LEN {
                    return Err(BsonError::Malformed {
                        reason: "embedded document shorter than minimum",
                    });
                }
                need(len)?;
                if rest[len - 1] != 0 {
                    return Err(BsonError::Malformed {
                        reason: "embedded document missing terminator",
                    });
                }
                Ok(len)
            }
            _ => Err(BsonError::Malformed {
                reason: "unsupported element type",
            }),
        }
    }
}

impl<'a> BsonElement<'a> {
    /// Decode a double element.
    pub fn as_double(&self) -> Result<f64, BsonError> {
        self.check_type(ELEMENT_DOUBLE)?;
        Ok(f64::from_le_bytes(Self::eight(self.value)))
    }

    /// Decode an int32 element.
    pub fn as_int32(&self) -> Result<i32, BsonError> {
        self.check_type(ELEMENT_INT32)?;
        Ok(i32::from_le_bytes([
            self.value[0],
            self.value[1],
            self.value[2],
            self.value[3],
        ]))
    }

    /// Decode an int64 element.
    pub fn as_int64(&self) -> Result<i64, BsonError> {
        self.check_type(ELEMENT_INT64)?;
        Ok(i64::from_le_bytes(Self::eight(self.value)))
    }

    /// Decode a datetime element into epoch milliseconds.
    pub fn as_datetime(&self) -> Result<i64, BsonError> {
        self.check_type(ELEMENT_DATETIME)?;
        Ok(i64::from_le_bytes(Self::eight(self.value)))
    }

    /// Decode a boolean element.
    pub fn as_bool(&self) -> Result<bool, BsonError> {
        self.check_type(ELEMENT_BOOLEAN)?;
        Ok(self.value[0] != 0)
    }

    /// Decode a string element, without the trailing NUL.
    pub fn as_str(&self) -> Result<&'a str, BsonError> {
        self.check_type(ELEMENT_STRING)?;
        let content = &self.value[4..self.value.len() - 1];
        std::str::from_utf8(content).map_err(|_| BsonError::Malformed {
            reason: "string is not valid UTF-8",
        })
    }

    /// Decode a binary element, subtype byte excluded.
    pub fn as_binary(&self) -> Result<&'a [u8], BsonError> {
        self.check_type(ELEMENT_BINARY)?;
        Ok(&self.value[5..])
    }

    /// View an embedded document element as a document.
    pub fn as_document(&self) -> Result<BsonDocument<'a>, BsonError> {
        self.check_type(ELEMENT_DOCUMENT)?;
        BsonDocument::parse(self.value)
    }

    /// View an array element as its backing document.
    pub fn as_array(&self) -> Result<BsonDocument<'a>, BsonError> {
        self.check_type(ELEMENT_ARRAY)?;
        BsonDocument::parse(self.value)
    }

    fn check_type(&self, expected: u8) -> Result<(), BsonError> {
        if self.element_type != expected {
            return Err(BsonError::TypeMismatch {
                expected,
                found: self.element_type,
            });
        }
        Ok(())
    }

    fn eight(value: &[u8]) -> [u8; 8] {
        let mut out = [0u8; 8];
        out.copy_from_slice(&value[..8]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::BsonSerializer;

    fn sample_document() -> Vec<u8> {
        let mut ser = BsonSerializer::new();
        ser.append_double("d", 1.25);
        ser.append_string("s", "hello");
        ser.append_int32("i", -3);
        ser.append_int64("l", 1 << 40);
        ser.append_boolean("b", true);
        ser.append_datetime("t", 1_700_000_000_000);
        ser.append_binary("bin", &[1, 2, 3]);
        ser.end_of_document();
        ser.into_document()
    }

    #[test]
    fn test_parse_rejects_bad_framing() {
        assert!(BsonDocument::parse(&[]).is_err());
        assert!(BsonDocument::parse(&[4, 0, 0, 0]).is_err());
        // Length prefix larger than payload
        assert!(BsonDocument::parse(&[6, 0, 0, 0, 0]).is_err());
        // Missing terminator
        assert!(BsonDocument::parse(&[5, 0, 0, 0, 1]).is_err());
        // Minimal empty document is fine
        assert!(BsonDocument::parse(&[5, 0, 0, 0, 0]).is_ok());
    }

    #[test]
    fn test_walk_and_decode_every_type() {
        let doc_bytes = sample_document();
        let doc = BsonDocument::parse(&doc_bytes).expect("sample document should parse");
        assert_eq!(doc.count_elements().expect("count should succeed"), 7);

        let d = doc.lookup("d").expect("lookup ok").expect("d present");
        assert_eq!(d.as_double().expect("double decodes"), 1.25);

        let s = doc.lookup("s").expect("lookup ok").expect("s present");
        assert_eq!(s.as_str().expect("string decodes"), "hello");

        let i = doc.lookup("i").expect("lookup ok").expect("i present");
        assert_eq!(i.as_int32().expect("int32 decodes"), -3);

        let l = doc.lookup("l").expect("lookup ok").expect("l present");
        assert_eq!(l.as_int64().expect("int64 decodes"), 1 << 40);

        let b = doc.lookup("b").expect("lookup ok").expect("b present");
        assert!(b.as_bool().expect("bool decodes"));

        let t = doc.lookup("t").expect("lookup ok").expect("t present");
        assert_eq!(t.as_datetime().expect("datetime decodes"), 1_700_000_000_000);

        let bin = doc.lookup("bin").expect("lookup ok").expect("bin present");
        assert_eq!(bin.as_binary().expect("binary decodes"), &[1, 2, 3]);
    }

    #[test]
    fn test_lookup_missing_key() {
        let doc_bytes = sample_document();
        let doc = BsonDocument::parse(&doc_bytes).expect("sample document should parse");
        assert!(doc.lookup("missing").expect("walk succeeds").is_none());
    }

    #[test]
    fn test_typed_accessor_rejects_wrong_type() {
        let doc_bytes = sample_document();
        let doc = BsonDocument::parse(&doc_bytes).expect("sample document should parse");
        let s = doc.lookup("s").expect("lookup ok").expect("s present");

        let err = s.as_int32().expect_err("string is not an int32");
        assert!(matches!(err, BsonError::TypeMismatch { .. }));
    }

    #[test]
    fn test_truncated_element_is_rejected() {
        let mut doc_bytes = sample_document();
        // Cut the document in the middle of an element, fix up the prefix
        // and append a fake terminator.
        doc_bytes.truncate(8);
        doc_bytes.push(0);
        let total = doc_bytes.len() as u32;
        doc_bytes[..4].copy_from_slice(&total.to_le_bytes());

        let doc = BsonDocument::parse(&doc_bytes).expect("outer framing is consistent");
        assert!(doc.first_element().is_err());
    }

    #[test]
    fn test_unsupported_element_type_is_rejected() {
        // Type 0x0A (null) is outside the supported set.
        let doc_bytes = [8u8, 0, 0, 0, 0x0A, b'n', 0, 0];
        let doc = BsonDocument::parse(&doc_bytes).expect("outer framing is consistent");
        assert!(doc.first_element().is_err());
    }

    #[test]
    fn test_nested_array_document() {
        let mut ser = BsonSerializer::new();
        ser.append_string_array("v", &["a".to_string(), "b".to_string()]);
        ser.end_of_document();
        let doc_bytes = ser.into_document();

        let doc = BsonDocument::parse(&doc_bytes).expect("document should parse");
        let v = doc.lookup("v").expect("lookup ok").expect("v present");
        let array = v.as_array().expect("array view");
        assert_eq!(array.count_elements().expect("count should succeed"), 2);

        let first = array
            .first_element()
            .expect("walk succeeds")
            .expect("first element present");
        assert_eq!(first.name, "0");
        assert_eq!(first.as_str().expect("string decodes"), "a");
    }

    #[test]
    fn test_embedded_terminator_rejected() {
        // A stray terminator byte before the declared end.
        let doc_bytes = [9u8, 0, 0, 0, 0, 0x08, b'b', 0, 0];
        let doc = BsonDocument::parse(&doc_bytes).expect("outer framing is consistent");
        assert!(doc.first_element().is_err());
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Append-only document builder.
//!
//! The serializer grows a byte buffer element by element and back-patches
//! the four-byte length prefix when [`BsonSerializer::end_of_document`] is
//! called. Arrays are built as nested documents whose keys are the decimal
//! element indices.

use super::{
    ELEMENT_ARRAY, ELEMENT_BINARY, ELEMENT_BOOLEAN, ELEMENT_DATETIME, ELEMENT_DOCUMENT,
    ELEMENT_DOUBLE, ELEMENT_INT32, ELEMENT_INT64, ELEMENT_STRING, SUBTYPE_GENERIC,
};

/// Builder for one binary document.
///
/// Keys must not contain NUL bytes; they are written as C strings.
pub struct BsonSerializer {
    buf: Vec<u8>,
}

impl BsonSerializer {
    /// Start a new document with a zeroed length prefix.
    pub fn new() -> Self {
        Self { buf: vec![0u8; 4] }
    }

    /// Append a double element.
    pub fn append_double(&mut self, key: &str, value: f64) {
        self.append_header(ELEMENT_DOUBLE, key);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append an int32 element.
    pub fn append_int32(&mut self, key: &str, value: i32) {
        self.append_header(ELEMENT_INT32, key);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append an int64 element.
    pub fn append_int64(&mut self, key: &str, value: i64) {
        self.append_header(ELEMENT_INT64, key);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a UTC datetime element (epoch milliseconds).
    pub fn append_datetime(&mut self, key: &str, epoch_millis: i64) {
        self.append_header(ELEMENT_DATETIME, key);
        self.buf.extend_from_slice(&epoch_millis.to_le_bytes());
    }

    /// Append a boolean element.
    pub fn append_boolean(&mut self, key: &str, value: bool) {
        self.append_header(ELEMENT_BOOLEAN, key);
        self.buf.push(u8::from(value));
    }

    /// Append a string element. The encoded length includes the NUL
    /// terminator.
    pub fn append_string(&mut self, key: &str, value: &str) {
        self.append_header(ELEMENT_STRING, key);
        let encoded_len = value.len() as u32 + 1;
        self.buf.extend_from_slice(&encoded_len.to_le_bytes());
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
    }

    /// Append a binary element with the generic subtype.
    pub fn append_binary(&mut self, key: &str, value: &[u8]) {
        self.append_header(ELEMENT_BINARY, key);
        self.buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
        self.buf.push(SUBTYPE_GENERIC);
        self.buf.extend_from_slice(value);
    }

    /// Append an already-finalized document as an embedded document element.
    pub fn append_document(&mut self, key: &str, document: &[u8]) {
        self.append_header(ELEMENT_DOCUMENT, key);
        self.buf.extend_from_slice(document);
    }

    /// Append an array of doubles.
    pub fn append_double_array(&mut self, key: &str, values: &[f64]) {
        self.append_array(key, values, BsonSerializer::append_double);
    }

    /// Append an array of int32 values.
    pub fn append_int32_array(&mut self, key: &str, values: &[i32]) {
        self.append_array(key, values, BsonSerializer::append_int32);
    }

    /// Append an array of int64 values.
    pub fn append_int64_array(&mut self, key: &str, values: &[i64]) {
        self.append_array(key, values, BsonSerializer::append_int64);
    }

    /// Append an array of datetimes (epoch milliseconds).
    pub fn append_datetime_array(&mut self, key: &str, values: &[i64]) {
        self.append_array(key, values, BsonSerializer::append_datetime);
    }

    /// Append an array of booleans.
    pub fn append_boolean_array(&mut self, key: &str, values: &[bool]) {
        self.append_array(key, values, BsonSerializer::append_boolean);
    }

    /// Append an array of strings.
    pub fn append_string_array(&mut self, key: &str, values: &[String]) {
        let mut inner = BsonSerializer::new();
        let mut index = ArrayKey::new();
        for value in values {
            inner.append_string(index.next(), value);
        }
        inner.end_of_document();
        self.append_raw(ELEMENT_ARRAY, key, inner.document());
    }

    /// Append an array of binary blobs.
    pub fn append_binary_array(&mut self, key: &str, values: &[Vec<u8>]) {
        let mut inner = BsonSerializer::new();
        let mut index = ArrayKey::new();
        for value in values {
            inner.append_binary(index.next(), value);
        }
        inner.end_of_document();
        self.append_raw(ELEMENT_ARRAY, key, inner.document());
    }

    /// Terminate the document and back-patch the length prefix.
    pub fn end_of_document(&mut self) {
        self.buf.push(0);
        let total = self.buf.len() as u32;
        self.buf[..4].copy_from_slice(&total.to_le_bytes());
    }

    /// The serialized document bytes. Only meaningful after
    /// [`end_of_document`](Self::end_of_document).
    pub fn document(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the serializer and return the document bytes.
    pub fn into_document(self) -> Vec<u8> {
        self.buf
    }

    /// Current document size in bytes, terminator included once finalized.
    pub fn document_len(&self) -> usize {
        self.buf.len()
    }

    fn append_header(&mut self, element_type: u8, key: &str) {
        debug_assert!(!key.as_bytes().contains(&0), "BSON keys cannot contain NUL");
        self.buf.push(element_type);
        self.buf.extend_from_slice(key.as_bytes());
        self.buf.push(0);
    }

    fn append_raw(&mut self, element_type: u8, key: &str, raw: &[u8]) {
        self.append_header(element_type, key);
        self.buf.extend_from_slice(raw);
    }

    fn append_array<T: Copy>(
        &mut self,
        key: &str,
        values: &[T],
        mut append: impl FnMut(&mut BsonSerializer, &str, T),
    ) {
        let mut inner = BsonSerializer::new();
        let mut index = ArrayKey::new();
        for &value in values {
            append(&mut inner, index.next(), value);
        }
        inner.end_of_document();
        self.append_raw(ELEMENT_ARRAY, key, inner.document());
    }
}

impl Default for BsonSerializer {
    fn default() -> Self {
        Self::new()
    }
}

/// Reusable formatter for decimal array index keys.
struct ArrayKey {
    text: String,
    next: usize,
}

impl ArrayKey {
    fn new() -> Self {
        Self {
            text: String::with_capacity(4),
            next: 0,
        }
    }

    fn next(&mut self) -> &str {
        use std::fmt::Write as _;
        self.text.clear();
        let _ = write!(self.text, "{}", self.next);
        self.next += 1;
        &self.text
    }
}

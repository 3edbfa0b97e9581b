// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! 128-bit identifiers following RFC 4122.
//!
//! Astarte device identifiers are UUIDs rendered in the URL-safe base64
//! alphabet (22 characters, no padding). Two generation schemes are
//! supported:
//!
//! - **Version 4**: 16 random bytes with the version and variant fields
//!   overwritten.
//! - **Version 5**: SHA-1 over `namespace || data`, truncated to 16 bytes,
//!   with the version and variant fields overwritten (RFC 4122 Sec.4.3).
//!
//! The string form is the canonical 8-4-4-4-12 lowercase hex layout.

use std::fmt;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};

/// Identifier size in bytes.
pub const UUID_LEN: usize = 16;
/// Length of the canonical 8-4-4-4-12 string form.
pub const UUID_STR_LEN: usize = 36;
/// Length of the base64 form (with padding).
pub const UUID_BASE64_LEN: usize = 24;
/// Length of the URL-safe base64 form (no padding).
pub const UUID_BASE64URL_LEN: usize = 22;

// Byte 6 carries the version in its high nibble, byte 8 the variant in its
// two high bits.
const VERSION_BYTE: usize = 6;
const VARIANT_BYTE: usize = 8;

// Hyphen positions in the canonical string form.
const HYPHEN_POSITIONS: [usize; 4] = [8, 13, 18, 23];

/// Error returned when parsing an identifier from its string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseUuidError;

impl fmt::Display for ParseUuidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid UUID string")
    }
}

impl std::error::Error for ParseUuidError {}

/// A 128-bit RFC 4122 identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uuid([u8; UUID_LEN]);

impl Uuid {
    /// Build an identifier from raw bytes, unchanged.
    pub const fn from_bytes(bytes: [u8; UUID_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a version 4 (random) identifier.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Internal`] if the system randomness source
    /// fails, which should never happen on a healthy system.
    pub fn new_v4() -> Result<Self, crate::Error> {
        let mut bytes = [0u8; UUID_LEN];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| crate::Error::Internal("system randomness source failed".into()))?;
        Ok(Self::with_version(bytes, 4))
    }

    /// Generate a version 5 (namespaced) identifier.
    ///
    /// Hashes `namespace || data` with SHA-1 and keeps the first 16 bytes,
    /// then overwrites the version and variant fields. Deterministic:
    /// identical inputs always produce identical identifiers.
    pub fn new_v5(namespace: &Uuid, data: &[u8]) -> Self {
        let mut ctx = digest::Context::new(&digest::SHA1_FOR_LEGACY_USE_ONLY);
        ctx.update(&namespace.0);
        ctx.update(data);
        let sha = ctx.finish();

        let mut bytes = [0u8; UUID_LEN];
        bytes.copy_from_slice(&sha.as_ref()[..UUID_LEN]);
        Self::with_version(bytes, 5)
    }

    /// Parse the canonical 8-4-4-4-12 hex string form.
    ///
    /// Fails on any length other than 36, any non-hex character, or any
    /// misplaced hyphen.
    pub fn parse(input: &str) -> Result<Self, ParseUuidError> {
        if input.len() != UUID_STR_LEN {
            return Err(ParseUuidError);
        }

        let mut bytes = [0u8; UUID_LEN];
        let mut byte_idx = 0;
        let mut high: Option<u8> = None;
        for (pos, ch) in input.bytes().enumerate() {
            if HYPHEN_POSITIONS.contains(&pos) {
                if ch != b'-' {
                    return Err(ParseUuidError);
                }
                continue;
            }
            let nibble = match ch {
                b'0'..=b'9' => ch - b'0',
                b'a'..=b'f' => ch - b'a' + 10,
                b'A'..=b'F' => ch - b'A' + 10,
                _ => return Err(ParseUuidError),
            };
            match high.take() {
                None => high = Some(nibble),
                Some(h) => {
                    bytes[byte_idx] = (h << 4) | nibble;
                    byte_idx += 1;
                }
            }
        }

        Ok(Self(bytes))
    }

    /// Raw identifier bytes.
    pub const fn as_bytes(&self) -> &[u8; UUID_LEN] {
        &self.0
    }

    /// RFC 4648 base64 form, 24 characters including padding.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// RFC 4648 Sec.5 URL and filename safe base64 form, 22 characters, no
    /// padding. This is the wire form of Astarte device identifiers.
    pub fn to_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    /// RFC 4122 version number (high nibble of byte 6).
    pub fn version(&self) -> u8 {
        self.0[VERSION_BYTE] >> 4
    }

    fn with_version(mut bytes: [u8; UUID_LEN], version: u8) -> Self {
        bytes[VERSION_BYTE] = (bytes[VERSION_BYTE] & 0x0F) | (version << 4);
        bytes[VARIANT_BYTE] = (bytes[VARIANT_BYTE] & 0x3F) | 0x80;
        Self(bytes)
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7], b[8], b[9], b[10], b[11], b[12], b[13],
            b[14], b[15]
        )
    }
}

impl std::str::FromStr for Uuid {
    type Err = ParseUuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// RFC 4122 Appendix C DNS namespace.
    const NAMESPACE_DNS: &str = "6ba7b810-9dad-11d1-80b4-00c04fd430c8";

    #[test]
    fn test_parse_format_round_trip() {
        let text = "f81d4fae-7dec-11d0-a765-00a0c91e6bf6";
        let uuid = Uuid::parse(text).expect("canonical string should parse");
        assert_eq!(uuid.to_string(), text);
    }

    #[test]
    fn test_parse_accepts_uppercase_hex() {
        let uuid = Uuid::parse("F81D4FAE-7DEC-11D0-A765-00A0C91E6BF6")
            .expect("uppercase hex should parse");
        assert_eq!(uuid.to_string(), "f81d4fae-7dec-11d0-a765-00a0c91e6bf6");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        // Wrong length
        assert!(Uuid::parse("f81d4fae-7dec-11d0-a765-00a0c91e6bf").is_err());
        assert!(Uuid::parse("").is_err());
        // Misplaced hyphen
        assert!(Uuid::parse("f81d4fae7-dec-11d0-a765-00a0c91e6bf6").is_err());
        // Hyphen replaced by hex digit
        assert!(Uuid::parse("f81d4fae07dec-11d0-a765-00a0c91e6bf6").is_err());
        // Non-hex character
        assert!(Uuid::parse("g81d4fae-7dec-11d0-a765-00a0c91e6bf6").is_err());
    }

    #[test]
    fn test_v4_version_and_variant_bits() {
        for _ in 0..64 {
            let uuid = Uuid::new_v4().expect("v4 generation should succeed");
            assert_eq!(uuid.version(), 4);
            assert_eq!(uuid.as_bytes()[8] & 0xC0, 0x80, "variant bits must be 10");
        }
    }

    #[test]
    fn test_v5_known_vector() {
        // RFC 4122 SHA-1 name-based UUID for "www.example.com" in the DNS
        // namespace.
        let ns = Uuid::parse(NAMESPACE_DNS).expect("DNS namespace should parse");
        let uuid = Uuid::new_v5(&ns, b"www.example.com");
        assert_eq!(uuid.to_string(), "2ed6657d-e927-568b-95e1-2665a8aea6a2");
    }

    #[test]
    fn test_v5_is_deterministic_and_sensitive() {
        let ns = Uuid::parse(NAMESPACE_DNS).expect("DNS namespace should parse");
        let a = Uuid::new_v5(&ns, b"some-hardware-id");
        let b = Uuid::new_v5(&ns, b"some-hardware-id");
        let c = Uuid::new_v5(&ns, b"some-hardware-ic");

        assert_eq!(a, b, "identical inputs must yield identical identifiers");
        assert_ne!(a, c, "different data must flip the output");
        assert_eq!(a.version(), 5);
        assert_eq!(a.as_bytes()[8] & 0xC0, 0x80, "variant bits must be 10");
    }

    #[test]
    fn test_base64_forms() {
        let uuid = Uuid::parse("f81d4fae-7dec-11d0-a765-00a0c91e6bf6")
            .expect("canonical string should parse");

        let b64 = uuid.to_base64();
        assert_eq!(b64.len(), UUID_BASE64_LEN);
        assert!(b64.ends_with('='));

        let b64url = uuid.to_base64url();
        assert_eq!(b64url.len(), UUID_BASE64URL_LEN);
        assert!(!b64url.contains('+') && !b64url.contains('/'));
        assert!(!b64url.ends_with('='));
        // Same alphabet apart from the +/- and /_ substitutions.
        assert_eq!(
            b64url,
            b64.trim_end_matches('=').replace('+', "-").replace('/', "_")
        );
    }
}

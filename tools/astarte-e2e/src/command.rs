// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Command grammar of the control channel.
//!
//! One command per line, whitespace-separated tokens:
//!
//! ```text
//! expect_individual    <iface> <path> <base64-bson> [unix-ms]
//! expect_object        <iface> <path> <base64-bson> [unix-ms]
//! expect_property_set  <iface> <path> <base64-bson>
//! expect_property_unset <iface> <path>
//! send_individual      <iface> <path> <base64-bson> [unix-ms]
//! send_object          <iface> <path> <base64-bson> [unix-ms]
//! send_property_set    <iface> <path> <base64-bson>
//! send_property_unset  <iface> <path>
//! disconnect
//! ```
//!
//! Payloads are full binary documents with a top-level `v` element, exactly
//! as they would travel on the wire.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use astarte_device::bson::BsonDocument;
use astarte_device::value::{object, AstarteData, ObjectEntry};
use astarte_device::Interface;

/// A parse or semantic failure on one command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CommandError {}

/// What the caller should do after a successfully executed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Keep reading commands.
    Continue,
    /// `disconnect` was issued; stop the command stream.
    Disconnect,
}

/// One parsed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ExpectIndividual {
        interface: String,
        path: String,
        payload: Vec<u8>,
        timestamp: Option<i64>,
    },
    ExpectObject {
        interface: String,
        path: String,
        payload: Vec<u8>,
        timestamp: Option<i64>,
    },
    ExpectPropertySet {
        interface: String,
        path: String,
        payload: Vec<u8>,
    },
    ExpectPropertyUnset {
        interface: String,
        path: String,
    },
    SendIndividual {
        interface: String,
        path: String,
        payload: Vec<u8>,
        timestamp: Option<i64>,
    },
    SendObject {
        interface: String,
        path: String,
        payload: Vec<u8>,
        timestamp: Option<i64>,
    },
    SendPropertySet {
        interface: String,
        path: String,
        payload: Vec<u8>,
    },
    SendPropertyUnset {
        interface: String,
        path: String,
    },
    Disconnect,
}

/// Parse one command line.
pub fn parse(line: &str) -> Result<Command, CommandError> {
    let mut tokens = line.split_whitespace();
    let name = tokens
        .next()
        .ok_or_else(|| CommandError::new("empty command line"))?;

    let command = match name {
        "expect_individual" => {
            let (interface, path, payload, timestamp) = data_arguments(&mut tokens, true)?;
            Command::ExpectIndividual {
                interface,
                path,
                payload,
                timestamp,
            }
        }
        "expect_object" => {
            let (interface, path, payload, timestamp) = data_arguments(&mut tokens, true)?;
            Command::ExpectObject {
                interface,
                path,
                payload,
                timestamp,
            }
        }
        "expect_property_set" => {
            let (interface, path, payload, _) = data_arguments(&mut tokens, false)?;
            Command::ExpectPropertySet {
                interface,
                path,
                payload,
            }
        }
        "expect_property_unset" => {
            let (interface, path) = path_arguments(&mut tokens)?;
            Command::ExpectPropertyUnset { interface, path }
        }
        "send_individual" => {
            let (interface, path, payload, timestamp) = data_arguments(&mut tokens, true)?;
            Command::SendIndividual {
                interface,
                path,
                payload,
                timestamp,
            }
        }
        "send_object" => {
            let (interface, path, payload, timestamp) = data_arguments(&mut tokens, true)?;
            Command::SendObject {
                interface,
                path,
                payload,
                timestamp,
            }
        }
        "send_property_set" => {
            let (interface, path, payload, _) = data_arguments(&mut tokens, false)?;
            Command::SendPropertySet {
                interface,
                path,
                payload,
            }
        }
        "send_property_unset" => {
            let (interface, path) = path_arguments(&mut tokens)?;
            Command::SendPropertyUnset { interface, path }
        }
        "disconnect" => Command::Disconnect,
        other => {
            return Err(CommandError::new(format!("unknown command {:?}", other)));
        }
    };

    if let Some(extra) = tokens.next() {
        return Err(CommandError::new(format!(
            "unexpected trailing token {:?}",
            extra
        )));
    }
    Ok(command)
}

fn path_arguments<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
) -> Result<(String, String), CommandError> {
    let interface = tokens
        .next()
        .ok_or_else(|| CommandError::new("missing interface name"))?;
    let path = tokens
        .next()
        .ok_or_else(|| CommandError::new("missing path"))?;
    if !path.starts_with('/') {
        return Err(CommandError::new(format!(
            "path {:?} must start with /",
            path
        )));
    }
    Ok((interface.to_string(), path.to_string()))
}

fn data_arguments<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    with_timestamp: bool,
) -> Result<(String, String, Vec<u8>, Option<i64>), CommandError> {
    let (interface, path) = path_arguments(tokens)?;

    let encoded = tokens
        .next()
        .ok_or_else(|| CommandError::new("missing base64 payload"))?;
    let payload = STANDARD
        .decode(encoded)
        .map_err(|e| CommandError::new(format!("invalid base64 payload: {}", e)))?;
    if payload.is_empty() {
        return Err(CommandError::new("empty payload"));
    }

    let timestamp = if with_timestamp {
        match tokens.next() {
            Some(token) => Some(token.parse::<i64>().map_err(|e| {
                CommandError::new(format!("invalid timestamp {:?}: {}", token, e))
            })?),
            None => None,
        }
    } else {
        None
    };

    Ok((interface, path, payload, timestamp))
}

/// Decode a command payload as one individual value, validated against the
/// mapping at `path`.
pub fn decode_individual(
    interface: &Interface,
    path: &str,
    payload: &[u8],
) -> Result<AstarteData, CommandError> {
    let mapping = interface.mapping(path).ok_or_else(|| {
        CommandError::new(format!(
            "no mapping at {} on interface {}",
            path,
            interface.name()
        ))
    })?;

    let document = BsonDocument::parse(payload)
        .map_err(|e| CommandError::new(format!("invalid BSON document: {}", e)))?;
    let value = document
        .lookup("v")
        .map_err(|e| CommandError::new(format!("invalid BSON document: {}", e)))?
        .ok_or_else(|| CommandError::new("document has no v element"))?;

    AstarteData::deserialize(&value, mapping.mapping_type())
        .map_err(|e| CommandError::new(format!("payload does not match the mapping: {}", e)))
}

/// Decode a command payload as object entries, validated against the
/// interface schema under `path`.
pub fn decode_object(
    interface: &Interface,
    path: &str,
    payload: &[u8],
) -> Result<Vec<ObjectEntry>, CommandError> {
    let document = BsonDocument::parse(payload)
        .map_err(|e| CommandError::new(format!("invalid BSON document: {}", e)))?;
    let value = document
        .lookup("v")
        .map_err(|e| CommandError::new(format!("invalid BSON document: {}", e)))?
        .ok_or_else(|| CommandError::new("document has no v element"))?;

    object::deserialize_entries(&value, interface, path)
        .map_err(|e| CommandError::new(format!("payload does not match the schema: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::test_interfaces;
    use astarte_device::bson::BsonSerializer;

    fn encode(data: &AstarteData) -> String {
        let mut ser = BsonSerializer::new();
        data.serialize_into(&mut ser, "v");
        ser.end_of_document();
        STANDARD.encode(ser.document())
    }

    #[test]
    fn test_parse_expect_individual() {
        let payload = encode(&AstarteData::Double(1.5));
        let line = format!(
            "expect_individual org.ex.Iface /double_endpoint {} 1700000000000",
            payload
        );
        let command = parse(&line).expect("command should parse");
        match command {
            Command::ExpectIndividual {
                interface,
                path,
                timestamp,
                ..
            } => {
                assert_eq!(interface, "org.ex.Iface");
                assert_eq!(path, "/double_endpoint");
                assert_eq!(timestamp, Some(1_700_000_000_000));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_optional_timestamp() {
        let payload = encode(&AstarteData::Double(1.5));
        let line = format!("send_individual org.ex.Iface /p {}", payload);
        match parse(&line).expect("command should parse") {
            Command::SendIndividual { timestamp, .. } => assert_eq!(timestamp, None),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_property_unset_and_disconnect() {
        assert_eq!(
            parse("expect_property_unset org.ex.Props /enable").expect("should parse"),
            Command::ExpectPropertyUnset {
                interface: "org.ex.Props".into(),
                path: "/enable".into(),
            }
        );
        assert_eq!(parse("disconnect").expect("should parse"), Command::Disconnect);
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert!(parse("").is_err());
        assert!(parse("unknown_command a b").is_err());
        assert!(parse("expect_individual org.ex.Iface").is_err());
        assert!(parse("expect_individual org.ex.Iface path QUJD").is_err());
        assert!(parse("expect_individual org.ex.Iface /p not-base64!").is_err());
        assert!(parse("expect_individual org.ex.Iface /p QUJD bad-ts").is_err());
        assert!(parse("disconnect extra").is_err());
        assert!(parse("expect_property_set org.ex.Iface /p QUJD extra").is_err());
    }

    #[test]
    fn test_decode_individual_against_schema() {
        let interfaces = test_interfaces();
        let stream = &interfaces[0];

        let mut ser = BsonSerializer::new();
        AstarteData::Double(21.5).serialize_into(&mut ser, "v");
        ser.end_of_document();
        let data = decode_individual(stream, "/double_endpoint", ser.document())
            .expect("payload should decode");
        assert_eq!(data, AstarteData::Double(21.5));

        // Wrong mapping type.
        assert!(decode_individual(stream, "/integer_endpoint", ser.document()).is_err());
        // Unknown path.
        assert!(decode_individual(stream, "/missing", ser.document()).is_err());
        // Garbage payload.
        assert!(decode_individual(stream, "/double_endpoint", b"garbage").is_err());
    }

    #[test]
    fn test_decode_object_against_schema() {
        let interfaces = test_interfaces();
        let aggregate = &interfaces[2];

        let entries = vec![
            ObjectEntry::new("temperature", AstarteData::Double(21.5)),
            ObjectEntry::new("label", AstarteData::String("probe".into())),
        ];
        let mut ser = BsonSerializer::new();
        object::serialize_entries(&mut ser, "v", &entries);
        ser.end_of_document();

        let decoded = decode_object(aggregate, "/sensors", ser.document())
            .expect("payload should decode");
        assert_eq!(decoded, entries);

        // Unknown entry key.
        let bad = vec![ObjectEntry::new("bogus", AstarteData::Double(1.0))];
        let mut ser = BsonSerializer::new();
        object::serialize_entries(&mut ser, "v", &bad);
        ser.end_of_document();
        assert!(decode_object(aggregate, "/sensors", ser.document()).is_err());
    }
}

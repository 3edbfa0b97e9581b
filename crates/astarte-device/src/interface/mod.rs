// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Interface and mapping descriptors.
//!
//! An [`Interface`] is an immutable, versioned schema declaring a set of
//! typed paths ([`Mapping`]s) together with their delivery semantics. The
//! device declares its interfaces up front; every publish and every inbound
//! message is validated against them.
//!
//! Mapping endpoints may contain `%{parameter}` placeholders; a placeholder
//! matches exactly one non-empty path segment.

mod path;

pub(crate) use path::is_valid_concrete_path;
use path::{endpoint_matches, validate_endpoint};

use crate::bson;
use crate::device::Error;
use crate::transport::QoS;

/// Maximum length of an interface name in characters.
pub const INTERFACE_NAME_MAX_LEN: usize = 128;

/// One of the fourteen shapes a mapping can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingType {
    /// Boolean scalar.
    Bool,
    /// UTC timestamp, int64 epoch milliseconds.
    DateTime,
    /// IEEE 754 64-bit float.
    Double,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// UTF-8 string.
    String,
    /// Opaque byte sequence.
    Binary,
    /// Array of booleans.
    BoolArray,
    /// Array of UTC timestamps.
    DateTimeArray,
    /// Array of doubles.
    DoubleArray,
    /// Array of 32-bit signed integers.
    Int32Array,
    /// Array of 64-bit signed integers.
    Int64Array,
    /// Array of UTF-8 strings.
    StringArray,
    /// Array of opaque byte sequences.
    BinaryArray,
}

impl MappingType {
    /// Whether this is one of the seven array shapes.
    pub fn is_array(self) -> bool {
        matches!(
            self,
            MappingType::BoolArray
                | MappingType::DateTimeArray
                | MappingType::DoubleArray
                | MappingType::Int32Array
                | MappingType::Int64Array
                | MappingType::StringArray
                | MappingType::BinaryArray
        )
    }

    /// The element shape of an array type; identity for scalars.
    pub fn scalar(self) -> MappingType {
        match self {
            MappingType::BoolArray => MappingType::Bool,
            MappingType::DateTimeArray => MappingType::DateTime,
            MappingType::DoubleArray => MappingType::Double,
            MappingType::Int32Array => MappingType::Int32,
            MappingType::Int64Array => MappingType::Int64,
            MappingType::StringArray => MappingType::String,
            MappingType::BinaryArray => MappingType::Binary,
            other => other,
        }
    }

    /// Wire element type this mapping type expects.
    ///
    /// Arrays expect an array element; the per-element check uses the
    /// scalar shape. `Int64` additionally accepts an encoded int32, which
    /// is handled at the decode site.
    pub(crate) fn expected_element_type(self) -> u8 {
        match self {
            MappingType::Bool => bson::ELEMENT_BOOLEAN,
            MappingType::DateTime => bson::ELEMENT_DATETIME,
            MappingType::Double => bson::ELEMENT_DOUBLE,
            MappingType::Int32 => bson::ELEMENT_INT32,
            MappingType::Int64 => bson::ELEMENT_INT64,
            MappingType::String => bson::ELEMENT_STRING,
            MappingType::Binary => bson::ELEMENT_BINARY,
            _ => bson::ELEMENT_ARRAY,
        }
    }
}

/// Which side of the connection originates writes on an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The device publishes, the server consumes.
    Device,
    /// The server publishes, the device consumes.
    Server,
}

/// Whether an interface carries datastreams or properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceType {
    /// Append-only stream of values.
    Datastream,
    /// Set/unset key-value state.
    Property,
}

/// Whether a publish carries one value or a record of sibling values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// One mapping per publish.
    Individual,
    /// All sibling mappings in one document per publish.
    Object,
}

/// Delivery guarantee for a datastream mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reliability {
    /// At most once.
    Unreliable,
    /// At least once.
    Guaranteed,
    /// Exactly once.
    Unique,
}

impl Reliability {
    /// Transport QoS level implementing this guarantee.
    pub fn qos(self) -> QoS {
        match self {
            Reliability::Unreliable => QoS::AtMostOnce,
            Reliability::Guaranteed => QoS::AtLeastOnce,
            Reliability::Unique => QoS::ExactlyOnce,
        }
    }
}

/// Retention policy for a datastream mapping while the device is offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Drop unsent values.
    Discard,
    /// Keep unsent values in memory.
    Volatile,
    /// Keep unsent values in permanent storage.
    Stored,
}

/// One typed path within an interface.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    endpoint: String,
    mapping_type: MappingType,
    reliability: Reliability,
    retention: Retention,
    explicit_timestamp: bool,
    allow_unset: bool,
}

impl Mapping {
    /// Create a mapping with default delivery semantics (unreliable,
    /// discard, no explicit timestamp, no unset).
    ///
    /// # Errors
    ///
    /// `InvalidParam` when the endpoint is not a valid `/`-separated path
    /// or a placeholder is malformed.
    pub fn new(endpoint: &str, mapping_type: MappingType) -> Result<Self, Error> {
        validate_endpoint(endpoint).map_err(|reason| {
            Error::InvalidParam(format!("invalid endpoint {:?}: {}", endpoint, reason))
        })?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            mapping_type,
            reliability: Reliability::Unreliable,
            retention: Retention::Discard,
            explicit_timestamp: false,
            allow_unset: false,
        })
    }

    /// Set the delivery guarantee.
    pub fn reliability(mut self, reliability: Reliability) -> Self {
        self.reliability = reliability;
        self
    }

    /// Set the retention policy.
    pub fn retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    /// Whether publishes carry a caller-supplied timestamp.
    pub fn explicit_timestamp(mut self, explicit: bool) -> Self {
        self.explicit_timestamp = explicit;
        self
    }

    /// Whether the property at this path can be unset.
    pub fn allow_unset(mut self, allow: bool) -> Self {
        self.allow_unset = allow;
        self
    }

    /// The declared endpoint pattern.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The value shape carried at this path.
    pub fn mapping_type(&self) -> MappingType {
        self.mapping_type
    }

    /// The delivery guarantee.
    pub fn reliability_policy(&self) -> Reliability {
        self.reliability
    }

    /// The retention policy.
    pub fn retention_policy(&self) -> Retention {
        self.retention
    }

    /// Whether publishes carry a caller-supplied timestamp.
    pub fn has_explicit_timestamp(&self) -> bool {
        self.explicit_timestamp
    }

    /// Whether the property at this path can be unset.
    pub fn can_unset(&self) -> bool {
        self.allow_unset
    }

    /// Transport QoS for publishes on this mapping.
    pub fn qos(&self) -> QoS {
        self.reliability.qos()
    }
}

/// A versioned schema declaring a set of typed paths.
#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    name: String,
    version_major: u32,
    version_minor: u32,
    ownership: Ownership,
    interface_type: InterfaceType,
    aggregation: Aggregation,
    mappings: Vec<Mapping>,
}

impl Interface {
    /// Create an interface with no mappings.
    ///
    /// # Errors
    ///
    /// `InvalidParam` when the name is not a valid reverse-domain ASCII
    /// identifier of at most 128 characters, or when both version numbers
    /// are zero.
    pub fn new(
        name: &str,
        version_major: u32,
        version_minor: u32,
        ownership: Ownership,
        interface_type: InterfaceType,
        aggregation: Aggregation,
    ) -> Result<Self, Error> {
        Self::validate_name(name)?;
        if version_major == 0 && version_minor == 0 {
            return Err(Error::InvalidParam(format!(
                "interface {} version cannot be 0.0",
                name
            )));
        }
        if interface_type == InterfaceType::Property && aggregation == Aggregation::Object {
            return Err(Error::InvalidParam(format!(
                "property interface {} cannot use object aggregation",
                name
            )));
        }
        Ok(Self {
            name: name.to_string(),
            version_major,
            version_minor,
            ownership,
            interface_type,
            aggregation,
            mappings: Vec::new(),
        })
    }

    /// Add a mapping, validating it against the interface flavor.
    ///
    /// # Errors
    ///
    /// `InvalidParam` when the endpoint duplicates an existing one, when a
    /// property mapping requests an explicit timestamp, when a datastream
    /// mapping allows unset, or when a mapping on an object aggregated
    /// interface disagrees with its siblings on reliability or the
    /// explicit-timestamp flag (one record travels as one publish, so those
    /// settings must be uniform).
    pub fn with_mapping(mut self, mapping: Mapping) -> Result<Self, Error> {
        if self
            .mappings
            .iter()
            .any(|m| m.endpoint == mapping.endpoint)
        {
            return Err(Error::InvalidParam(format!(
                "duplicate endpoint {} on interface {}",
                mapping.endpoint, self.name
            )));
        }
        match self.interface_type {
            InterfaceType::Property => {
                if mapping.explicit_timestamp {
                    return Err(Error::InvalidParam(format!(
                        "property mapping {} cannot have an explicit timestamp",
                        mapping.endpoint
                    )));
                }
            }
            InterfaceType::Datastream => {
                if mapping.allow_unset {
                    return Err(Error::InvalidParam(format!(
                        "datastream mapping {} cannot allow unset",
                        mapping.endpoint
                    )));
                }
            }
        }
        if self.aggregation == Aggregation::Object {
            if let Some(first) = self.mappings.first() {
                if mapping.reliability != first.reliability
                    || mapping.explicit_timestamp != first.explicit_timestamp
                {
                    return Err(Error::InvalidParam(format!(
                        "mapping {} on object interface {} must share the siblings' \
                         reliability and explicit-timestamp settings",
                        mapping.endpoint, self.name
                    )));
                }
            }
        }
        self.mappings.push(mapping);
        Ok(self)
    }

    /// Interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Major version.
    pub fn version_major(&self) -> u32 {
        self.version_major
    }

    /// Minor version.
    pub fn version_minor(&self) -> u32 {
        self.version_minor
    }

    /// Which side originates writes.
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Datastream or property.
    pub fn interface_type(&self) -> InterfaceType {
        self.interface_type
    }

    /// Individual or object aggregation.
    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    /// Declared mappings in registration order.
    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// Resolve a concrete path to its mapping.
    ///
    /// The path must begin with `/`, use `/` as separator and contain no
    /// empty segments. On ambiguous matches the first-registered mapping
    /// wins.
    pub fn mapping(&self, concrete_path: &str) -> Option<&Mapping> {
        if !is_valid_concrete_path(concrete_path) {
            return None;
        }
        self.mappings
            .iter()
            .find(|m| endpoint_matches(&m.endpoint, concrete_path))
    }

    /// Resolve the mapping for one entry of an object publish, given the
    /// common path of the publish and the entry key.
    pub fn mapping_for_object_entry(&self, common_path: &str, key: &str) -> Option<&Mapping> {
        if key.is_empty() || key.contains('/') {
            return None;
        }
        let full = format!("{}/{}", common_path.trim_end_matches('/'), key);
        self.mapping(&full)
    }

    fn validate_name(name: &str) -> Result<(), Error> {
        let invalid = |reason: &str| {
            Err(Error::InvalidParam(format!(
                "invalid interface name {:?}: {}",
                name, reason
            )))
        };

        if name.is_empty() {
            return invalid("empty");
        }
        if name.len() > INTERFACE_NAME_MAX_LEN {
            return invalid("longer than 128 characters");
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
        {
            return invalid("contains characters outside [a-zA-Z0-9._-]");
        }
        if name.starts_with('.') || name.ends_with('.') || name.contains("..") {
            return invalid("malformed domain segments");
        }
        if !name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
        {
            return invalid("must start with a letter");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensors() -> Interface {
        Interface::new(
            "org.example.Sensors",
            0,
            1,
            Ownership::Device,
            InterfaceType::Datastream,
            Aggregation::Individual,
        )
        .expect("interface should build")
        .with_mapping(
            Mapping::new("/temperature", MappingType::Double)
                .expect("mapping should build")
                .reliability(Reliability::Guaranteed)
                .explicit_timestamp(true),
        )
        .expect("mapping should attach")
        .with_mapping(
            Mapping::new("/%{sensor_id}/value", MappingType::Double)
                .expect("mapping should build"),
        )
        .expect("mapping should attach")
    }

    #[test]
    fn test_name_validation() {
        let bad = [
            "",
            ".org.example",
            "org.example.",
            "org..example",
            "org example",
            "0rg.example",
            "org/example",
        ];
        for name in bad {
            assert!(
                Interface::new(
                    name,
                    0,
                    1,
                    Ownership::Device,
                    InterfaceType::Datastream,
                    Aggregation::Individual,
                )
                .is_err(),
                "name {:?} should be rejected",
                name
            );
        }

        let long = format!("org.example.{}", "a".repeat(INTERFACE_NAME_MAX_LEN));
        assert!(Interface::new(
            &long,
            0,
            1,
            Ownership::Device,
            InterfaceType::Datastream,
            Aggregation::Individual,
        )
        .is_err());
    }

    #[test]
    fn test_version_zero_zero_rejected() {
        assert!(Interface::new(
            "org.example.Sensors",
            0,
            0,
            Ownership::Device,
            InterfaceType::Datastream,
            Aggregation::Individual,
        )
        .is_err());
    }

    #[test]
    fn test_exact_path_lookup() {
        let iface = sensors();
        let mapping = iface.mapping("/temperature").expect("path should resolve");
        assert_eq!(mapping.mapping_type(), MappingType::Double);
        assert_eq!(mapping.qos(), QoS::AtLeastOnce);
        assert!(mapping.has_explicit_timestamp());
    }

    #[test]
    fn test_parameterized_path_lookup() {
        let iface = sensors();
        assert!(iface.mapping("/s1/value").is_some());
        assert!(iface.mapping("/some-sensor/value").is_some());
        // A placeholder covers exactly one segment.
        assert!(iface.mapping("/s1/extra/value").is_none());
        assert!(iface.mapping("//value").is_none());
    }

    #[test]
    fn test_invalid_concrete_paths_rejected() {
        let iface = sensors();
        assert!(iface.mapping("temperature").is_none());
        assert!(iface.mapping("/temperature/").is_none());
        assert!(iface.mapping("").is_none());
    }

    #[test]
    fn test_first_registered_mapping_wins() {
        let iface = Interface::new(
            "org.example.Overlap",
            1,
            0,
            Ownership::Device,
            InterfaceType::Datastream,
            Aggregation::Individual,
        )
        .expect("interface should build")
        .with_mapping(Mapping::new("/%{any}/v", MappingType::Int32).expect("mapping should build"))
        .expect("mapping should attach")
        .with_mapping(Mapping::new("/fixed/v", MappingType::Double).expect("mapping should build"))
        .expect("mapping should attach");

        let mapping = iface.mapping("/fixed/v").expect("path should resolve");
        assert_eq!(
            mapping.mapping_type(),
            MappingType::Int32,
            "ambiguous match must go to the first-registered mapping"
        );
    }

    #[test]
    fn test_object_entry_lookup() {
        let iface = Interface::new(
            "org.example.Aggregate",
            1,
            0,
            Ownership::Device,
            InterfaceType::Datastream,
            Aggregation::Object,
        )
        .expect("interface should build")
        .with_mapping(Mapping::new("/group/a", MappingType::Int32).expect("mapping should build"))
        .expect("mapping should attach")
        .with_mapping(Mapping::new("/group/b", MappingType::Bool).expect("mapping should build"))
        .expect("mapping should attach");

        let mapping = iface
            .mapping_for_object_entry("/group", "a")
            .expect("entry should resolve");
        assert_eq!(mapping.mapping_type(), MappingType::Int32);
        assert!(iface.mapping_for_object_entry("/group", "c").is_none());
        assert!(iface.mapping_for_object_entry("/group", "a/b").is_none());
    }

    #[test]
    fn test_flavor_constraints() {
        assert!(Interface::new(
            "org.example.BadProps",
            1,
            0,
            Ownership::Device,
            InterfaceType::Property,
            Aggregation::Object,
        )
        .is_err());

        let props = Interface::new(
            "org.example.Props",
            1,
            0,
            Ownership::Device,
            InterfaceType::Property,
            Aggregation::Individual,
        )
        .expect("interface should build");
        assert!(props
            .clone()
            .with_mapping(
                Mapping::new("/alpha", MappingType::Int32)
                    .expect("mapping should build")
                    .explicit_timestamp(true),
            )
            .is_err());

        let stream = Interface::new(
            "org.example.Stream",
            1,
            0,
            Ownership::Device,
            InterfaceType::Datastream,
            Aggregation::Individual,
        )
        .expect("interface should build");
        assert!(stream
            .with_mapping(
                Mapping::new("/alpha", MappingType::Int32)
                    .expect("mapping should build")
                    .allow_unset(true),
            )
            .is_err());
    }

    #[test]
    fn test_object_interface_requires_uniform_delivery_settings() {
        let base = Interface::new(
            "org.example.Uniform",
            1,
            0,
            Ownership::Device,
            InterfaceType::Datastream,
            Aggregation::Object,
        )
        .expect("interface should build")
        .with_mapping(
            Mapping::new("/group/a", MappingType::Int32)
                .expect("mapping should build")
                .reliability(Reliability::Guaranteed)
                .explicit_timestamp(true),
        )
        .expect("first mapping always attaches");

        // A sibling with a different reliability is rejected.
        assert!(base
            .clone()
            .with_mapping(
                Mapping::new("/group/b", MappingType::Bool)
                    .expect("mapping should build")
                    .reliability(Reliability::Unique)
                    .explicit_timestamp(true),
            )
            .is_err());

        // A sibling disagreeing on the explicit-timestamp flag is rejected.
        assert!(base
            .clone()
            .with_mapping(
                Mapping::new("/group/b", MappingType::Bool)
                    .expect("mapping should build")
                    .reliability(Reliability::Guaranteed),
            )
            .is_err());

        // Matching settings attach fine.
        assert!(base
            .with_mapping(
                Mapping::new("/group/b", MappingType::Bool)
                    .expect("mapping should build")
                    .reliability(Reliability::Guaranteed)
                    .explicit_timestamp(true),
            )
            .is_ok());

        // Individually aggregated interfaces keep per-mapping settings.
        let mixed = Interface::new(
            "org.example.Mixed",
            1,
            0,
            Ownership::Device,
            InterfaceType::Datastream,
            Aggregation::Individual,
        )
        .expect("interface should build")
        .with_mapping(
            Mapping::new("/a", MappingType::Int32)
                .expect("mapping should build")
                .reliability(Reliability::Unreliable),
        )
        .expect("mapping should attach")
        .with_mapping(
            Mapping::new("/b", MappingType::Bool)
                .expect("mapping should build")
                .reliability(Reliability::Unique)
                .explicit_timestamp(true),
        );
        assert!(mixed.is_ok());
    }

    #[test]
    fn test_duplicate_endpoint_rejected() {
        let iface = sensors();
        assert!(iface
            .with_mapping(
                Mapping::new("/temperature", MappingType::Int32).expect("mapping should build")
            )
            .is_err());
    }

    #[test]
    fn test_mapping_type_helpers() {
        assert!(MappingType::StringArray.is_array());
        assert!(!MappingType::String.is_array());
        assert_eq!(MappingType::Int64Array.scalar(), MappingType::Int64);
        assert_eq!(MappingType::Double.scalar(), MappingType::Double);
    }
}

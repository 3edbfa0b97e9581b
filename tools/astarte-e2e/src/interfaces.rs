// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The interface set the harness runs against.
//!
//! Mirrors both directions of every flavor: individually aggregated
//! datastreams, object aggregated datastreams and properties, each in a
//! device-owned and a server-owned variant.

use astarte_device::interface::{
    Aggregation, Interface, InterfaceType, Mapping, MappingType, Ownership, Reliability,
};

fn datastream(name: &str, ownership: Ownership) -> Interface {
    let mappings = [
        ("/double_endpoint", MappingType::Double),
        ("/integer_endpoint", MappingType::Int32),
        ("/longinteger_endpoint", MappingType::Int64),
        ("/boolean_endpoint", MappingType::Bool),
        ("/string_endpoint", MappingType::String),
        ("/binaryblob_endpoint", MappingType::Binary),
        ("/datetime_endpoint", MappingType::DateTime),
        ("/integerarray_endpoint", MappingType::Int32Array),
        ("/stringarray_endpoint", MappingType::StringArray),
    ];

    let mut interface = Interface::new(
        name,
        0,
        1,
        ownership,
        InterfaceType::Datastream,
        Aggregation::Individual,
    )
    .expect("datastream interface should build");
    for (endpoint, mapping_type) in mappings {
        interface = interface
            .with_mapping(
                Mapping::new(endpoint, mapping_type)
                    .expect("endpoint should be valid")
                    .reliability(Reliability::Guaranteed)
                    .explicit_timestamp(true),
            )
            .expect("mapping should attach");
    }
    interface
}

fn aggregate(name: &str, ownership: Ownership) -> Interface {
    Interface::new(
        name,
        0,
        1,
        ownership,
        InterfaceType::Datastream,
        Aggregation::Object,
    )
    .expect("aggregate interface should build")
    .with_mapping(
        Mapping::new("/sensors/temperature", MappingType::Double)
            .expect("endpoint should be valid")
            .reliability(Reliability::Guaranteed)
            .explicit_timestamp(true),
    )
    .expect("mapping should attach")
    .with_mapping(
        Mapping::new("/sensors/label", MappingType::String)
            .expect("endpoint should be valid")
            .reliability(Reliability::Guaranteed)
            .explicit_timestamp(true),
    )
    .expect("mapping should attach")
    .with_mapping(
        Mapping::new("/sensors/samples", MappingType::Int32Array)
            .expect("endpoint should be valid")
            .reliability(Reliability::Guaranteed)
            .explicit_timestamp(true),
    )
    .expect("mapping should attach")
}

fn property(name: &str, ownership: Ownership) -> Interface {
    Interface::new(
        name,
        0,
        1,
        ownership,
        InterfaceType::Property,
        Aggregation::Individual,
    )
    .expect("property interface should build")
    .with_mapping(
        Mapping::new("/enable", MappingType::Bool)
            .expect("endpoint should be valid")
            .allow_unset(true),
    )
    .expect("mapping should attach")
    .with_mapping(
        Mapping::new("/label", MappingType::String)
            .expect("endpoint should be valid")
            .allow_unset(true),
    )
    .expect("mapping should attach")
}

/// All interfaces the harness declares.
pub fn test_interfaces() -> Vec<Interface> {
    vec![
        datastream("org.astarte-platform.e2etest.DeviceDatastream", Ownership::Device),
        datastream("org.astarte-platform.e2etest.ServerDatastream", Ownership::Server),
        aggregate("org.astarte-platform.e2etest.DeviceAggregate", Ownership::Device),
        aggregate("org.astarte-platform.e2etest.ServerAggregate", Ownership::Server),
        property("org.astarte-platform.e2etest.DeviceProperty", Ownership::Device),
        property("org.astarte-platform.e2etest.ServerProperty", Ownership::Server),
    ]
}

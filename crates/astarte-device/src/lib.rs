// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Astarte device library
//!
//! A client-side device library for the Astarte IoT data-delivery platform.
//! A device declares a static set of typed *interfaces*, registers and
//! authenticates through the pairing API, connects to the broker over a
//! publish/subscribe transport and then exchanges BSON-encoded values with
//! the platform.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use astarte_device::interface::{Aggregation, Interface, InterfaceType, Mapping, MappingType, Ownership};
//! use astarte_device::value::AstarteData;
//! use astarte_device::Device;
//! # fn transport() -> Box<dyn astarte_device::transport::Transport> { unimplemented!() }
//! # fn pairing() -> Box<dyn astarte_device::pairing::PairingClient> { unimplemented!() }
//!
//! fn main() -> astarte_device::Result<()> {
//!     let sensors = Interface::new(
//!         "org.example.Sensors", 0, 1,
//!         Ownership::Device, InterfaceType::Datastream, Aggregation::Individual,
//!     )?
//!     .with_mapping(Mapping::new("/temperature", MappingType::Double)?.explicit_timestamp(true))?;
//!
//!     let mut device = Device::builder()
//!         .credential_secret("cN2QrhSyPTBn2-0jNESuuHamE2Zo6CGAcN2QrhSyPTA=")
//!         .interface(sensors)
//!         .pairing(pairing())
//!         .transport(transport())
//!         .build()?;
//!
//!     device.connect()?;
//!     loop {
//!         match device.poll() {
//!             Ok(()) | Err(astarte_device::Error::Timeout) => {}
//!             Err(e) => return Err(e),
//!         }
//!         if device.is_connected() {
//!             device.send_individual(
//!                 "org.example.Sensors", "/temperature",
//!                 AstarteData::Double(21.5), Some(1_700_000_000_000),
//!             )?;
//!         }
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                       Device facade                          |
//! |   builder -> connect/disconnect/poll -> send_* / callbacks   |
//! +--------------------------------------------------------------+
//! |   Connection state machine   |   Typed value model           |
//! |   handshake + backoff        |   14 mapping-type variants    |
//! +--------------------------------------------------------------+
//! |   Introspection / interfaces |   BSON wire codec             |
//! +--------------------------------------------------------------+
//! |   Capabilities: transport, pairing, TLS credentials, store   |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`device`] - Device facade and the public [`Error`] type (start here)
//! - [`interface`] - Interface and mapping descriptors
//! - [`value`] - Typed values exchanged with the platform
//! - [`bson`] - The binary document codec used on the wire
//! - [`connection`] - Connection state machine and reconnection backoff
//! - [`transport`] / [`pairing`] - Capability traits the environment provides

/// The on-wire binary document codec (serializer + bounds-checked reader).
pub mod bson;
/// Connection state machine, handshake sequencing and reconnection backoff.
pub mod connection;
/// PEM/X.509 helpers and the TLS credential store capability.
pub mod crypto;
/// Device facade: builder, connect/poll lifecycle, send operations, dispatch.
pub mod device;
/// Interface, mapping and mapping-type descriptors with endpoint matching.
pub mod interface;
/// The device's declared interface set and its canonical string form.
pub mod introspection;
/// Compile-time configurable logging system (zero-cost when disabled).
pub mod logging;
/// Pairing capability: registration, broker discovery, client certificates.
pub mod pairing;
/// Persisted introspection blob store.
pub mod store;
/// Publish/subscribe transport capability and the in-process test pair.
pub mod transport;
/// 128-bit identifiers (RFC 4122 version 4 and version 5).
pub mod uuid;
/// Typed value model: the tagged union over the 14 mapping types.
pub mod value;

pub use device::{
    ConnectionEvent, DataEvent, Device, DeviceBuilder, DisconnectionEvent, Error, IncomingPayload,
    Result, UnsetEvent,
};
pub use interface::{Aggregation, Interface, InterfaceType, Mapping, MappingType, Ownership};
pub use transport::QoS;
pub use value::{AstarteData, ObjectEntry};

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Device facade
//!
//! [`Device`] is the public surface of the library. It is built through
//! [`DeviceBuilder`], connects with [`Device::connect`], makes progress on
//! [`Device::poll`] and publishes through the four send operations:
//!
//! - [`send_individual`](Device::send_individual) - one datastream value
//! - [`send_object`](Device::send_object) - a record of sibling values
//! - [`set_property`](Device::set_property) - set a device-owned property
//! - [`unset_property`](Device::unset_property) - clear a device-owned property
//!
//! Every operation validates the target interface, the mapping at the path
//! and the value's type before anything touches the wire.
//!
//! ## Threading
//!
//! A `Device` is `Send` but not `Sync`: all state mutation, including
//! inbound dispatch and user callbacks, happens on the thread that calls
//! `poll` (the "poll thread"). Callbacks may call the send operations but
//! must not call back into `poll`.

mod builder;
mod dispatch;

pub use builder::DeviceBuilder;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::bson::BsonSerializer;
use crate::connection::{BackoffContext, ConnectionState};
use crate::crypto::{CredentialKind, TlsCredentials};
use crate::interface::{Aggregation, Interface, InterfaceType, Ownership};
use crate::introspection::Introspection;
use crate::pairing::{BrokerAddress, CertificateCheck, PairingClient};
use crate::store::IntrospectionStore;
use crate::transport::{PublishRequest, QoS, TlsOptions, Transport, TransportEvent};
use crate::value::{AstarteData, ObjectEntry, OBJECT_MAX_ENTRIES};
use crate::{debug, error, info};

use builder::DeviceConfig;

/// Errors returned by device operations.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Caller contract
    // ========================================================================
    /// Bad path, unknown interface, mapping type mismatch or similar.
    InvalidParam(String),
    /// Operation attempted in the wrong connection state.
    NotReady,
    /// `connect` called while a connection attempt is in progress.
    AlreadyConnecting,
    /// `connect` called on a connected device.
    AlreadyConnected,

    // ========================================================================
    // Environment
    // ========================================================================
    /// Underlying publish/subscribe failure.
    Transport(String),
    /// Credential install/remove failure.
    Tls(String),
    /// Pairing exchange failure.
    Pairing(String),

    // ========================================================================
    // Codec
    // ========================================================================
    /// A wire element type does not satisfy the schema.
    CodecTypeMismatch,
    /// Truncated or structurally invalid wire document.
    CodecMalformed,

    // ========================================================================
    // Runtime
    // ========================================================================
    /// Allocation failure reported by the environment.
    OutOfMemory,
    /// The poll tick elapsed without any event. Informational.
    Timeout,
    /// Reached a branch claimed unreachable.
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidParam(msg) => write!(f, "invalid parameter: {}", msg),
            Error::NotReady => write!(f, "device is not ready for this operation"),
            Error::AlreadyConnecting => write!(f, "device is already connecting"),
            Error::AlreadyConnected => write!(f, "device is already connected"),
            Error::Transport(msg) => write!(f, "transport error: {}", msg),
            Error::Tls(msg) => write!(f, "TLS credential error: {}", msg),
            Error::Pairing(msg) => write!(f, "pairing error: {}", msg),
            Error::CodecTypeMismatch => {
                write!(f, "wire element type does not satisfy the schema")
            }
            Error::CodecMalformed => write!(f, "malformed wire document"),
            Error::OutOfMemory => write!(f, "out of memory"),
            Error::Timeout => write!(f, "poll elapsed without events"),
            Error::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Result alias for device operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Delivered when the device completes a connection handshake.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionEvent {
    /// Whether the broker resumed a previous session.
    pub session_present: bool,
}

/// Delivered when the broker session ends.
#[derive(Debug, Clone, Copy)]
pub struct DisconnectionEvent {}

/// The decoded payload of an inbound data message.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingPayload {
    /// One value on an individually aggregated interface.
    Individual {
        /// The decoded value.
        data: AstarteData,
        /// The `t` element, when the message carried one.
        timestamp: Option<i64>,
    },
    /// A record of sibling values on an object aggregated interface.
    Object {
        /// The decoded entries, in wire order.
        entries: Vec<ObjectEntry>,
        /// The `t` element, when the message carried one.
        timestamp: Option<i64>,
    },
}

/// Delivered for every inbound data message, property sets included.
#[derive(Debug, Clone, PartialEq)]
pub struct DataEvent {
    /// Name of the interface the message arrived on.
    pub interface_name: String,
    /// Concrete path within the interface.
    pub path: String,
    /// The decoded payload.
    pub payload: IncomingPayload,
}

/// Delivered when the server unsets a property.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsetEvent {
    /// Name of the property interface.
    pub interface_name: String,
    /// Concrete path of the cleared property.
    pub path: String,
}

/// User callbacks, all invoked from the poll thread.
#[derive(Default)]
pub(crate) struct Callbacks {
    pub(crate) on_connect: Option<Box<dyn FnMut(&ConnectionEvent) + Send>>,
    pub(crate) on_disconnect: Option<Box<dyn FnMut(&DisconnectionEvent) + Send>>,
    pub(crate) on_data: Option<Box<dyn FnMut(DataEvent) + Send>>,
    pub(crate) on_unset: Option<Box<dyn FnMut(UnsetEvent) + Send>>,
}

/// One Astarte device instance.
pub struct Device {
    pub(crate) config: DeviceConfig,
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) pairing: Box<dyn PairingClient>,
    pub(crate) credentials: Arc<dyn TlsCredentials>,
    pub(crate) store: Option<Box<dyn IntrospectionStore>>,
    pub(crate) introspection: Introspection,
    pub(crate) broker: BrokerAddress,
    pub(crate) base_topic: String,
    pub(crate) certificate_pem: Option<String>,
    pub(crate) state: ConnectionState,
    pub(crate) session_present: bool,
    pub(crate) subscription_failure: bool,
    pub(crate) reconnect_at: Instant,
    pub(crate) backoff: BackoffContext,
    pub(crate) callbacks: Callbacks,
    credentials_installed: bool,
}

impl Device {
    /// Start building a device.
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::new()
    }

    /// Arm a connection towards the broker.
    ///
    /// Ensures a valid client certificate (fetching or renewing one through
    /// the pairing API), installs the TLS credentials and asks the
    /// transport for a session. Non-blocking: progress is observed on
    /// subsequent [`poll`](Self::poll) ticks.
    ///
    /// # Errors
    ///
    /// `AlreadyConnecting` / `AlreadyConnected` outside the
    /// `Disconnected` state; `Pairing`, `Tls` or `Transport` when the
    /// respective capability fails.
    pub fn connect(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Disconnected => {}
            ConnectionState::Connected => {
                return Err(Error::AlreadyConnected);
            }
            _ => {
                return Err(Error::AlreadyConnecting);
            }
        }

        self.ensure_certificate()?;

        let tls = self.tls_options();
        let broker = self.broker.clone();
        self.transport.connect(&broker, &tls)?;
        debug!("device connection state -> CONNECTING");
        self.state = ConnectionState::Connecting;
        Ok(())
    }

    /// Request a graceful disconnect.
    ///
    /// # Errors
    ///
    /// `NotReady` when the device is already disconnected.
    pub fn disconnect(&mut self) -> Result<()> {
        if self.state == ConnectionState::Disconnected {
            error!("disconnection request for a disconnected client will be ignored");
            return Err(Error::NotReady);
        }
        self.transport.disconnect()?;
        Ok(())
    }

    /// One cooperative tick: run the connection state machine, wait for
    /// transport activity and dispatch whatever arrived.
    ///
    /// # Errors
    ///
    /// `Timeout` when the tick elapsed idle (informational), `Transport`
    /// on a transport failure.
    pub fn poll(&mut self) -> Result<()> {
        self.connection_step();

        let timeout = if self.state == ConnectionState::Connected {
            self.config.connected_timeout
        } else {
            self.config.connection_timeout
        };
        let events = self.transport.poll(timeout)?;
        if events.is_empty() {
            return Err(Error::Timeout);
        }

        for event in events {
            self.handle_transport_event(event);
        }
        Ok(())
    }

    /// Whether the device currently holds a completed connection.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    /// The `realm/device_id` prefix all topics live under. Empty until the
    /// first certificate has been issued.
    pub fn base_topic(&self) -> &str {
        &self.base_topic
    }

    /// Publish one value on an individually aggregated datastream.
    ///
    /// `timestamp` is epoch milliseconds and only legal on mappings with
    /// an explicit timestamp.
    pub fn send_individual(
        &mut self,
        interface_name: &str,
        path: &str,
        data: AstarteData,
        timestamp: Option<i64>,
    ) -> Result<()> {
        let interface = self.find_interface(interface_name)?;
        Self::require_device_owned(interface)?;
        if interface.interface_type() != InterfaceType::Datastream {
            return Err(Error::InvalidParam(format!(
                "send_individual on property interface {}, use set_property",
                interface_name
            )));
        }
        if interface.aggregation() != Aggregation::Individual {
            return Err(Error::InvalidParam(format!(
                "send_individual on object interface {}, use send_object",
                interface_name
            )));
        }

        let mapping = Self::require_mapping(interface, path)?;
        if data.mapping_type() != mapping.mapping_type() {
            return Err(Error::InvalidParam(format!(
                "value type {:?} does not match mapping {:?} at {}{}",
                data.mapping_type(),
                mapping.mapping_type(),
                interface_name,
                path
            )));
        }
        if timestamp.is_some() && !mapping.has_explicit_timestamp() {
            return Err(Error::InvalidParam(format!(
                "mapping {}{} does not take an explicit timestamp",
                interface_name, path
            )));
        }
        let qos = mapping.qos();
        self.require_connected()?;

        let mut ser = BsonSerializer::new();
        data.serialize_into(&mut ser, "v");
        if let Some(t) = timestamp {
            ser.append_datetime("t", t);
        }
        ser.end_of_document();

        self.publish_message(interface_name, path, ser.into_document(), qos, false)
    }

    /// Publish a record of sibling values on an object aggregated
    /// datastream. `path` is the common path; each entry names one sibling
    /// mapping.
    pub fn send_object(
        &mut self,
        interface_name: &str,
        path: &str,
        entries: &[ObjectEntry],
        timestamp: Option<i64>,
    ) -> Result<()> {
        let interface = self.find_interface(interface_name)?;
        Self::require_device_owned(interface)?;
        if interface.aggregation() != Aggregation::Object
            || interface.interface_type() != InterfaceType::Datastream
        {
            return Err(Error::InvalidParam(format!(
                "send_object requires an object aggregated datastream, got {}",
                interface_name
            )));
        }
        if entries.is_empty() {
            return Err(Error::InvalidParam("object publish with no entries".into()));
        }
        if entries.len() > OBJECT_MAX_ENTRIES {
            return Err(Error::InvalidParam(format!(
                "object publish with {} entries exceeds the {} limit",
                entries.len(),
                OBJECT_MAX_ENTRIES
            )));
        }

        // Delivery settings are uniform across an object interface's
        // mappings (enforced when the interface is built), so take them
        // from the declaration rather than from whatever entry the caller
        // listed first.
        let declared = interface.mappings().first().ok_or_else(|| {
            Error::InvalidParam(format!(
                "object interface {} declares no mappings",
                interface_name
            ))
        })?;
        let qos = declared.qos();
        let explicit_timestamp = declared.has_explicit_timestamp();

        for entry in entries {
            let mapping = interface
                .mapping_for_object_entry(path, &entry.path)
                .ok_or_else(|| {
                    Error::InvalidParam(format!(
                        "no mapping for object entry {}/{} on {}",
                        path, entry.path, interface_name
                    ))
                })?;
            if entry.data.mapping_type() != mapping.mapping_type() {
                return Err(Error::InvalidParam(format!(
                    "entry {} type {:?} does not match mapping {:?}",
                    entry.path,
                    entry.data.mapping_type(),
                    mapping.mapping_type()
                )));
            }
        }
        if timestamp.is_some() && !explicit_timestamp {
            return Err(Error::InvalidParam(format!(
                "object interface {} does not take an explicit timestamp",
                interface_name
            )));
        }
        self.require_connected()?;

        let mut ser = BsonSerializer::new();
        crate::value::object::serialize_entries(&mut ser, "v", entries);
        if let Some(t) = timestamp {
            ser.append_datetime("t", t);
        }
        ser.end_of_document();

        self.publish_message(interface_name, path, ser.into_document(), qos, false)
    }

    /// Set a device-owned property.
    pub fn set_property(
        &mut self,
        interface_name: &str,
        path: &str,
        data: AstarteData,
    ) -> Result<()> {
        let interface = self.find_interface(interface_name)?;
        Self::require_device_owned(interface)?;
        if interface.interface_type() != InterfaceType::Property {
            return Err(Error::InvalidParam(format!(
                "set_property on datastream interface {}",
                interface_name
            )));
        }

        let mapping = Self::require_mapping(interface, path)?;
        if data.mapping_type() != mapping.mapping_type() {
            return Err(Error::InvalidParam(format!(
                "value type {:?} does not match mapping {:?} at {}{}",
                data.mapping_type(),
                mapping.mapping_type(),
                interface_name,
                path
            )));
        }
        self.require_connected()?;

        let mut ser = BsonSerializer::new();
        data.serialize_into(&mut ser, "v");
        ser.end_of_document();

        // Properties always travel exactly-once and retained, so a late
        // subscriber observes the current state.
        self.publish_message(
            interface_name,
            path,
            ser.into_document(),
            QoS::ExactlyOnce,
            true,
        )
    }

    /// Clear a device-owned property. Publishes a zero-length payload.
    pub fn unset_property(&mut self, interface_name: &str, path: &str) -> Result<()> {
        let interface = self.find_interface(interface_name)?;
        Self::require_device_owned(interface)?;
        if interface.interface_type() != InterfaceType::Property {
            return Err(Error::InvalidParam(format!(
                "unset_property on datastream interface {}",
                interface_name
            )));
        }

        let mapping = Self::require_mapping(interface, path)?;
        if !mapping.can_unset() {
            return Err(Error::InvalidParam(format!(
                "mapping {}{} does not allow unset",
                interface_name, path
            )));
        }
        self.require_connected()?;

        self.publish_message(interface_name, path, Vec::new(), QoS::ExactlyOnce, true)
    }

    pub(crate) fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { session_present } => {
                self.on_transport_connected(session_present);
            }
            TransportEvent::Disconnected => {
                self.on_transport_disconnected();
            }
            TransportEvent::SubAck { message_id, failed } => {
                self.on_suback(message_id, failed);
            }
            TransportEvent::Ack { message_id, kind } => {
                debug!("{:?} packet id: {}", kind, message_id);
            }
            TransportEvent::Publish {
                topic,
                payload,
                qos,
                message_id,
            } => {
                debug!(
                    "RECEIVED on topic \"{}\" [ id: {} qos: {} ] payload: {} B",
                    topic,
                    message_id,
                    qos.level(),
                    payload.len()
                );
                if payload.len() > self.config.max_message_size {
                    error!(
                        "discarding {} B message on {}, over the {} B limit",
                        payload.len(),
                        topic,
                        self.config.max_message_size
                    );
                    return;
                }
                if let Err(e) = self.dispatch_publish(&topic, &payload) {
                    error!("inbound message on {} dropped: {}", topic, e);
                }
            }
        }
    }

    fn require_connected(&self) -> Result<()> {
        if self.state != ConnectionState::Connected {
            return Err(Error::NotReady);
        }
        Ok(())
    }

    fn find_interface(&self, name: &str) -> Result<&Interface> {
        self.introspection
            .get(name)
            .ok_or_else(|| Error::InvalidParam(format!("unknown interface {}", name)))
    }

    fn require_device_owned(interface: &Interface) -> Result<()> {
        if interface.ownership() != Ownership::Device {
            return Err(Error::InvalidParam(format!(
                "interface {} is server-owned",
                interface.name()
            )));
        }
        Ok(())
    }

    fn require_mapping<'a>(interface: &'a Interface, path: &str) -> Result<&'a crate::interface::Mapping> {
        interface.mapping(path).ok_or_else(|| {
            Error::InvalidParam(format!(
                "no mapping at path {} on interface {}",
                path,
                interface.name()
            ))
        })
    }

    fn publish_message(
        &mut self,
        interface_name: &str,
        path: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<()> {
        if !path.starts_with('/') {
            return Err(Error::InvalidParam(format!(
                "invalid path {} (must start with /)",
                path
            )));
        }

        let topic = format!("{}/{}{}", self.base_topic, interface_name, path);
        let payload_len = payload.len();
        let message_id = self.transport.publish(PublishRequest {
            topic: topic.clone(),
            payload,
            qos,
            retain,
        })?;

        info!(
            "PUBLISHED on topic \"{}\" [ id: {} qos: {} ], payload: {} B",
            topic,
            message_id,
            qos.level(),
            payload_len
        );
        Ok(())
    }

    /// Make sure a platform-accepted client certificate is installed.
    fn ensure_certificate(&mut self) -> Result<()> {
        let Some(pem) = self.certificate_pem.clone() else {
            return self.acquire_certificate();
        };

        let check = self.pairing.verify_client_certificate(
            self.config.http_timeout,
            &self.config.credential_secret,
            &pem,
        )?;
        match check {
            CertificateCheck::Valid => Ok(()),
            CertificateCheck::Invalid => {
                debug!("client certificate rejected by the platform, renewing");
                self.remove_credentials()?;
                self.acquire_certificate()
            }
        }
    }

    fn acquire_certificate(&mut self) -> Result<()> {
        let certificate = self
            .pairing
            .get_client_certificate(self.config.http_timeout, &self.config.credential_secret)?;

        // The platform returns the base topic in the certificate CN,
        // usually REALM/DEVICE_ID.
        let base_topic = crate::crypto::base_topic_from_certificate(&certificate.certificate_pem)?;

        self.credentials.add(
            self.config.client_cert_tag,
            CredentialKind::Certificate,
            &certificate.certificate_pem,
        )?;
        self.credentials.add(
            self.config.client_cert_tag,
            CredentialKind::PrivateKey,
            &certificate.private_key_pem,
        )?;
        self.credentials_installed = true;

        debug!("device base topic: {}", base_topic);
        self.base_topic = base_topic;
        self.certificate_pem = Some(certificate.certificate_pem);
        Ok(())
    }

    fn remove_credentials(&mut self) -> Result<()> {
        self.credentials
            .delete(self.config.client_cert_tag, CredentialKind::Certificate)?;
        self.credentials
            .delete(self.config.client_cert_tag, CredentialKind::PrivateKey)?;
        self.credentials_installed = false;
        Ok(())
    }

    fn tls_options(&self) -> TlsOptions {
        let mut credential_tags = Vec::new();
        if let Some(ca_tag) = self.config.ca_cert_tag {
            credential_tags.push(ca_tag);
        }
        credential_tags.push(self.config.client_cert_tag);
        TlsOptions {
            credential_tags,
            verify_peer: !self.config.ignore_tls,
            hostname: self.broker.host.clone(),
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if self.state != ConnectionState::Disconnected {
            let _ = self.transport.disconnect();
        }
        if self.credentials_installed {
            for kind in [CredentialKind::Certificate, CredentialKind::PrivateKey] {
                if let Err(e) = self.credentials.delete(self.config.client_cert_tag, kind) {
                    error!("failed removing {:?} credential: {}", kind, e);
                }
            }
        }
    }
}

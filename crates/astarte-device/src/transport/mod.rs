// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publish/subscribe transport capability.
//!
//! The device never talks to the network directly: the environment provides
//! an implementation of [`Transport`] (an MQTT 3.1.1 client in production).
//! The transport owns the protocol details - keepalive, QoS 2 handshakes,
//! TLS - and reports progress through [`TransportEvent`]s returned from
//! [`Transport::poll`].
//!
//! The [`pair`] module provides an in-process transport wired to a
//! scriptable broker half; it exists for the test suites and the e2e
//! harness, not for production use.

pub mod pair;

use std::fmt;
use std::time::Duration;

use crate::crypto::CredentialTag;
use crate::pairing::BrokerAddress;

/// Quality of service for one publish or subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QoS {
    /// Fire and forget.
    AtMostOnce = 0,
    /// Acknowledged delivery, duplicates possible.
    AtLeastOnce = 1,
    /// Exactly-once handshake.
    ExactlyOnce = 2,
}

impl QoS {
    /// The MQTT wire level (0, 1 or 2).
    pub fn level(self) -> u8 {
        self as u8
    }
}

/// TLS settings handed to the transport on connect.
///
/// Credentials are referenced by process-wide tags; the actual key material
/// lives in the [`crate::crypto::TlsCredentials`] store.
#[derive(Debug, Clone)]
pub struct TlsOptions {
    /// Credential tags the transport should load (CA first, then client).
    pub credential_tags: Vec<CredentialTag>,
    /// Whether to require peer verification. Disabled only by the
    /// development toggle.
    pub verify_peer: bool,
    /// Hostname for SNI and peer verification.
    pub hostname: String,
}

/// One outgoing message.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Full topic string.
    pub topic: String,
    /// Payload bytes; empty payloads are legal (property unset).
    pub payload: Vec<u8>,
    /// Delivery guarantee.
    pub qos: QoS,
    /// Broker-side retain flag.
    pub retain: bool,
}

/// Acknowledgement flavor reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    /// PUBACK for a QoS 1 publish.
    Published,
    /// PUBREC for a QoS 2 publish.
    Received,
    /// PUBREL from the peer.
    Released,
    /// PUBCOMP completing a QoS 2 publish.
    Completed,
}

/// Events reported by [`Transport::poll`].
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The broker session is established.
    Connected {
        /// Whether the broker resumed a previous session.
        session_present: bool,
    },
    /// The broker session ended, gracefully or not.
    Disconnected,
    /// An inbound message.
    Publish {
        /// Full topic string.
        topic: String,
        /// Payload bytes.
        payload: Vec<u8>,
        /// Delivery guarantee of the inbound message.
        qos: QoS,
        /// Broker-assigned message identifier.
        message_id: u16,
    },
    /// Result of a subscription request.
    SubAck {
        /// Identifier returned by [`Transport::subscribe`].
        message_id: u16,
        /// Whether the broker rejected the subscription.
        failed: bool,
    },
    /// Acknowledgement for an outgoing publish.
    Ack {
        /// Identifier returned by [`Transport::publish`].
        message_id: u16,
        /// Acknowledgement flavor.
        kind: AckKind,
    },
}

/// Errors surfaced by transport implementations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Operation requires an established session.
    NotConnected,
    /// A session is already established.
    AlreadyConnected,
    /// Session establishment failed.
    ConnectFailed(String),
    /// Send/receive failure on an established session.
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::NotConnected => write!(f, "transport is not connected"),
            TransportError::AlreadyConnected => write!(f, "transport is already connected"),
            TransportError::ConnectFailed(reason) => write!(f, "connect failed: {}", reason),
            TransportError::Io(reason) => write!(f, "transport I/O error: {}", reason),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<TransportError> for crate::device::Error {
    fn from(err: TransportError) -> Self {
        crate::device::Error::Transport(err.to_string())
    }
}

/// The publish/subscribe transport the environment must provide.
///
/// All methods are non-blocking except [`poll`](Self::poll), which waits up
/// to `timeout` for socket activity and drives protocol keepalive.
pub trait Transport: Send {
    /// Arm a session towards the broker. Progress is observed through
    /// [`TransportEvent::Connected`] on subsequent polls.
    fn connect(&mut self, broker: &BrokerAddress, tls: &TlsOptions)
        -> Result<(), TransportError>;

    /// Request a graceful session shutdown.
    fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Subscribe to a topic filter; the result arrives as a
    /// [`TransportEvent::SubAck`] carrying the returned identifier.
    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<u16, TransportError>;

    /// Queue one message for transmission.
    fn publish(&mut self, request: PublishRequest) -> Result<u16, TransportError>;

    /// Wait up to `timeout` for activity, then return the accumulated
    /// events. An empty vector means the tick elapsed idle.
    fn poll(&mut self, timeout: Duration) -> Result<Vec<TransportEvent>, TransportError>;

    /// Whether queued outbound messages are still awaiting transmission or
    /// acknowledgement.
    fn has_pending_outbound(&self) -> bool;
}

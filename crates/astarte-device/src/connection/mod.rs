// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connection state machine.
//!
//! The device moves through a fixed set of states, driven from the poll
//! tick and the transport's connection events:
//!
//! ```text
//! Disconnected --connect()--> Connecting --connected event--> StartHandshake
//!
//! StartHandshake: session resumed with a known introspection? -> Connected
//!                 otherwise subscribe + announce               -> EndHandshake
//! EndHandshake:   subscription denied -> HandshakeError
//!                 all outbound flushed -> Connected (fires the user callback)
//! HandshakeError: wait out the backoff -> StartHandshake
//! Connected:      backoff reset; disconnection event -> Disconnected
//! ```
//!
//! Handshake failures never escape to the caller; they loop through
//! `HandshakeError` with jittered exponential backoff.

mod backoff;

pub use backoff::BackoffContext;

use std::time::Instant;

use crate::device::{ConnectionEvent, Device, DisconnectionEvent};
use crate::interface::Ownership;
use crate::transport::QoS;
use crate::{debug, error, warn};

/// Announced introspection strings beyond this size get a warning log.
const INTROSPECTION_SIZE_WARN: usize = 4096;

/// Connection lifecycle state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No broker session.
    Disconnected,
    /// Session requested, waiting for the transport to report it.
    Connecting,
    /// Session established, handshake not yet started.
    StartHandshake,
    /// Handshake traffic queued, waiting for it to flush.
    EndHandshake,
    /// Handshake failed, waiting out the backoff.
    HandshakeError,
    /// Fully connected, data may flow.
    Connected,
}

impl Device {
    /// One state-machine tick, run at the top of every poll.
    pub(crate) fn connection_step(&mut self) {
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Connecting => {}
            ConnectionState::StartHandshake => self.run_start_handshake(),
            ConnectionState::EndHandshake => self.run_end_handshake(),
            ConnectionState::HandshakeError => self.run_handshake_error(),
            ConnectionState::Connected => self.run_connected(),
        }
    }

    /// Transport reported an established session.
    pub(crate) fn on_transport_connected(&mut self, session_present: bool) {
        debug!("device connection state -> START_HANDSHAKE");
        self.state = ConnectionState::StartHandshake;
        self.session_present = session_present;
    }

    /// Transport reported the end of the session.
    pub(crate) fn on_transport_disconnected(&mut self) {
        debug!("device connection state -> DISCONNECTED");
        self.state = ConnectionState::Disconnected;

        if let Some(callback) = self.callbacks.on_disconnect.as_mut() {
            callback(&DisconnectionEvent {});
        }
    }

    /// Transport reported a subscription result.
    pub(crate) fn on_suback(&mut self, message_id: u16, failed: bool) {
        if failed {
            error!("subscription request {} denied by the broker", message_id);
            self.subscription_failure = true;
        } else {
            debug!("SUBACK packet id: {}", message_id);
        }
    }

    fn run_start_handshake(&mut self) {
        let introspection = self.introspection.canonical_string();
        if introspection.len() > INTROSPECTION_SIZE_WARN {
            warn!("the introspection size is > 4KiB");
        }

        if self.session_present && self.stored_introspection_matches(&introspection) {
            debug!("device connection state -> CONNECTED (session resumed)");
            self.state = ConnectionState::Connected;
            return;
        }

        self.subscription_failure = false;
        if let Err(e) = self.handshake_traffic(&introspection) {
            error!("handshake traffic failed: {}", e);
            debug!("device connection state -> HANDSHAKE_ERROR");
            self.state = ConnectionState::HandshakeError;
            return;
        }

        debug!("device connection state -> END_HANDSHAKE");
        self.state = ConnectionState::EndHandshake;
    }

    fn run_end_handshake(&mut self) {
        if self.subscription_failure {
            error!("subscription request has been denied");
            debug!("device connection state -> HANDSHAKE_ERROR");
            self.state = ConnectionState::HandshakeError;
            return;
        }

        if self.transport.has_pending_outbound() {
            return;
        }

        debug!("device connection state -> CONNECTED");
        self.state = ConnectionState::Connected;

        let introspection = self.introspection.canonical_string();
        self.persist_introspection(&introspection);

        let event = ConnectionEvent {
            session_present: self.session_present,
        };
        if let Some(callback) = self.callbacks.on_connect.as_mut() {
            callback(&event);
        }
    }

    fn run_handshake_error(&mut self) {
        if Instant::now() < self.reconnect_at {
            return;
        }

        self.state = ConnectionState::StartHandshake;

        let delay = self.backoff.next_delay();
        self.reconnect_at = Instant::now() + delay;
        debug!(
            "repeating the handshake, next retry in {}ms",
            delay.as_millis()
        );
    }

    fn run_connected(&mut self) {
        self.backoff.reset();
    }

    /// Subscribe to the server-owned surface and announce the device.
    fn handshake_traffic(&mut self, introspection: &str) -> crate::device::Result<()> {
        let control_topic = format!("{}/control/consumer/properties", self.base_topic);
        debug!("subscribing to: {}", control_topic);
        self.transport.subscribe(&control_topic, QoS::ExactlyOnce)?;

        let server_interfaces: Vec<String> = self
            .introspection
            .iter()
            .filter(|i| i.ownership() == Ownership::Server)
            .map(|i| i.name().to_string())
            .collect();
        for name in server_interfaces {
            let topic = format!("{}/{}/#", self.base_topic, name);
            debug!("subscribing to: {}", topic);
            self.transport.subscribe(&topic, QoS::ExactlyOnce)?;
        }

        debug!("publishing introspection: {}", introspection);
        self.transport.publish(crate::transport::PublishRequest {
            topic: self.base_topic.clone(),
            payload: introspection.as_bytes().to_vec(),
            qos: QoS::ExactlyOnce,
            retain: false,
        })?;

        let empty_cache_topic = format!("{}/control/emptyCache", self.base_topic);
        debug!("sending emptyCache to {}", empty_cache_topic);
        self.transport.publish(crate::transport::PublishRequest {
            topic: empty_cache_topic,
            payload: b"1".to_vec(),
            qos: QoS::ExactlyOnce,
            retain: false,
        })?;

        Ok(())
    }

    /// Whether the persisted introspection matches the current one.
    ///
    /// Without a store, a resumed session is trusted as-is.
    fn stored_introspection_matches(&self, current: &str) -> bool {
        let Some(store) = self.store.as_ref() else {
            return true;
        };
        match store.load() {
            Ok(Some(stored)) => stored == current,
            Ok(None) => false,
            Err(e) => {
                warn!("introspection load failed: {}", e);
                false
            }
        }
    }

    /// Refresh the persisted introspection if it is stale. Failures are
    /// logged and otherwise ignored; the blob is also left untouched when a
    /// resumed-session handshake fails earlier, so a stale copy can survive
    /// a subscription failure.
    fn persist_introspection(&mut self, current: &str) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let stale = match store.load() {
            Ok(Some(stored)) => stored != current,
            Ok(None) => true,
            Err(e) => {
                warn!("introspection load failed: {}", e);
                true
            }
        };
        if stale {
            debug!("introspection requires updating");
            if let Err(e) = store.store(current) {
                warn!("introspection update failed: {}", e);
            }
        }
    }
}

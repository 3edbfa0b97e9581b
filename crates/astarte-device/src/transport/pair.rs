// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process transport pair.
//!
//! [`pair`] returns a device-side [`Transport`] implementation wired to a
//! [`BrokerHandle`] that scripts the broker's behavior: which CONNACK flags
//! to raise, which subscriptions to reject, which messages to push towards
//! the device. Used by the unit tests and the e2e harness.
//!
//! Outgoing publishes sit in a pending set until the next
//! [`Transport::poll`] call "flushes" them, so handshake sequencing that
//! waits on pending outbound traffic is observable tick by tick.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::{
    AckKind, PublishRequest, QoS, TlsOptions, Transport, TransportError, TransportEvent,
};
use crate::pairing::BrokerAddress;

/// One message the device published, as observed by the broker half.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    /// Full topic string.
    pub topic: String,
    /// Payload bytes.
    pub payload: Vec<u8>,
    /// Delivery guarantee requested by the device.
    pub qos: QoS,
    /// Retain flag requested by the device.
    pub retain: bool,
    /// Identifier assigned on the device side.
    pub message_id: u16,
}

/// One subscription request, as observed by the broker half.
#[derive(Debug, Clone)]
pub struct SubscriptionRecord {
    /// Topic filter.
    pub topic: String,
    /// Requested delivery guarantee.
    pub qos: QoS,
    /// Identifier assigned on the device side.
    pub message_id: u16,
}

#[derive(Default)]
struct SharedState {
    to_device: VecDeque<TransportEvent>,
    pending: Vec<PublishedMessage>,
    published: Vec<PublishedMessage>,
    subscriptions: Vec<SubscriptionRecord>,
    session_present: bool,
    fail_subscribes: usize,
    connected: bool,
    next_message_id: u16,
}

struct Shared {
    state: Mutex<SharedState>,
    activity: Condvar,
}

/// Create a connected device-side transport and its scriptable broker half.
pub fn pair() -> (PairTransport, BrokerHandle) {
    let shared = Arc::new(Shared {
        state: Mutex::new(SharedState {
            next_message_id: 1,
            ..SharedState::default()
        }),
        activity: Condvar::new(),
    });
    (
        PairTransport {
            shared: Arc::clone(&shared),
        },
        BrokerHandle { shared },
    )
}

/// Device-side half of the in-process pair.
pub struct PairTransport {
    shared: Arc<Shared>,
}

impl Transport for PairTransport {
    fn connect(
        &mut self,
        _broker: &BrokerAddress,
        _tls: &TlsOptions,
    ) -> Result<(), TransportError> {
        let mut state = self.shared.state.lock();
        if state.connected {
            return Err(TransportError::AlreadyConnected);
        }
        state.connected = true;
        let session_present = state.session_present;
        state
            .to_device
            .push_back(TransportEvent::Connected { session_present });
        self.shared.activity.notify_all();
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut state = self.shared.state.lock();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        state.connected = false;
        state.to_device.push_back(TransportEvent::Disconnected);
        self.shared.activity.notify_all();
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<u16, TransportError> {
        let mut state = self.shared.state.lock();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        let message_id = next_id(&mut state);
        let failed = if state.fail_subscribes > 0 {
            state.fail_subscribes -= 1;
            true
        } else {
            false
        };
        state.subscriptions.push(SubscriptionRecord {
            topic: topic.to_string(),
            qos,
            message_id,
        });
        state
            .to_device
            .push_back(TransportEvent::SubAck { message_id, failed });
        self.shared.activity.notify_all();
        Ok(message_id)
    }

    fn publish(&mut self, request: PublishRequest) -> Result<u16, TransportError> {
        let mut state = self.shared.state.lock();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        let message_id = next_id(&mut state);
        state.pending.push(PublishedMessage {
            topic: request.topic,
            payload: request.payload,
            qos: request.qos,
            retain: request.retain,
            message_id,
        });
        self.shared.activity.notify_all();
        Ok(message_id)
    }

    fn poll(&mut self, timeout: Duration) -> Result<Vec<TransportEvent>, TransportError> {
        let mut state = self.shared.state.lock();

        // Flush queued publishes and acknowledge them, like a broker
        // round-trip completing within one tick.
        let flushed: Vec<PublishedMessage> = state.pending.drain(..).collect();
        for message in flushed {
            let ack = match message.qos {
                QoS::AtMostOnce => None,
                QoS::AtLeastOnce => Some(AckKind::Published),
                QoS::ExactlyOnce => Some(AckKind::Completed),
            };
            if let Some(kind) = ack {
                state.to_device.push_back(TransportEvent::Ack {
                    message_id: message.message_id,
                    kind,
                });
            }
            state.published.push(message);
        }

        if state.to_device.is_empty() {
            self.shared.activity.wait_for(&mut state, timeout);
        }
        Ok(state.to_device.drain(..).collect())
    }

    fn has_pending_outbound(&self) -> bool {
        !self.shared.state.lock().pending.is_empty()
    }
}

fn next_id(state: &mut SharedState) -> u16 {
    let id = state.next_message_id;
    state.next_message_id = state.next_message_id.wrapping_add(1).max(1);
    id
}

/// Scriptable broker half of the in-process pair.
#[derive(Clone)]
pub struct BrokerHandle {
    shared: Arc<Shared>,
}

impl BrokerHandle {
    /// Session-present flag raised on the next CONNACK.
    pub fn set_session_present(&self, present: bool) {
        self.shared.state.lock().session_present = present;
    }

    /// Reject the next `count` subscription requests.
    pub fn fail_next_subscribes(&self, count: usize) {
        self.shared.state.lock().fail_subscribes = count;
    }

    /// Drain the messages the device has published so far.
    pub fn take_published(&self) -> Vec<PublishedMessage> {
        std::mem::take(&mut self.shared.state.lock().published)
    }

    /// Subscription requests observed so far, in order.
    pub fn subscriptions(&self) -> Vec<SubscriptionRecord> {
        self.shared.state.lock().subscriptions.clone()
    }

    /// Push a server-originated message towards the device.
    pub fn push_incoming(&self, topic: &str, payload: Vec<u8>, qos: QoS) {
        let mut state = self.shared.state.lock();
        let message_id = next_id(&mut state);
        state.to_device.push_back(TransportEvent::Publish {
            topic: topic.to_string(),
            payload,
            qos,
            message_id,
        });
        self.shared.activity.notify_all();
    }

    /// Drop the session from the broker side.
    pub fn force_disconnect(&self) {
        let mut state = self.shared.state.lock();
        state.connected = false;
        state.to_device.push_back(TransportEvent::Disconnected);
        self.shared.activity.notify_all();
    }

    /// Whether the device side currently holds a session.
    pub fn is_connected(&self) -> bool {
        self.shared.state.lock().connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broker_address() -> BrokerAddress {
        BrokerAddress::parse("mqtts://broker.localhost:8883").expect("address should parse")
    }

    fn tls_options() -> TlsOptions {
        TlsOptions {
            credential_tags: vec![1],
            verify_peer: true,
            hostname: "broker.localhost".into(),
        }
    }

    #[test]
    fn test_connect_reports_session_present() {
        let (mut transport, broker) = pair();
        broker.set_session_present(true);
        transport
            .connect(&broker_address(), &tls_options())
            .expect("connect should succeed");

        let events = transport
            .poll(Duration::from_millis(1))
            .expect("poll should succeed");
        assert!(matches!(
            events.as_slice(),
            [TransportEvent::Connected {
                session_present: true
            }]
        ));
    }

    #[test]
    fn test_double_connect_rejected() {
        let (mut transport, _broker) = pair();
        transport
            .connect(&broker_address(), &tls_options())
            .expect("connect should succeed");
        assert_eq!(
            transport.connect(&broker_address(), &tls_options()),
            Err(TransportError::AlreadyConnected)
        );
    }

    #[test]
    fn test_operations_require_connection() {
        let (mut transport, _broker) = pair();
        assert_eq!(
            transport.subscribe("a/b", QoS::ExactlyOnce),
            Err(TransportError::NotConnected)
        );
        assert!(transport.disconnect().is_err());
    }

    #[test]
    fn test_publish_pending_until_poll() {
        let (mut transport, broker) = pair();
        transport
            .connect(&broker_address(), &tls_options())
            .expect("connect should succeed");

        transport
            .publish(PublishRequest {
                topic: "t/x".into(),
                payload: b"1".to_vec(),
                qos: QoS::AtLeastOnce,
                retain: false,
            })
            .expect("publish should succeed");
        assert!(transport.has_pending_outbound());

        let events = transport
            .poll(Duration::from_millis(1))
            .expect("poll should succeed");
        assert!(!transport.has_pending_outbound());
        assert!(events
            .iter()
            .any(|e| matches!(e, TransportEvent::Ack { kind: AckKind::Published, .. })));

        let published = broker.take_published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "t/x");
    }

    #[test]
    fn test_scripted_suback_failure() {
        let (mut transport, broker) = pair();
        broker.fail_next_subscribes(1);
        transport
            .connect(&broker_address(), &tls_options())
            .expect("connect should succeed");

        transport
            .subscribe("a/#", QoS::ExactlyOnce)
            .expect("subscribe call itself succeeds");
        transport
            .subscribe("b/#", QoS::ExactlyOnce)
            .expect("subscribe call itself succeeds");

        let events = transport
            .poll(Duration::from_millis(1))
            .expect("poll should succeed");
        let subacks: Vec<bool> = events
            .iter()
            .filter_map(|e| match e {
                TransportEvent::SubAck { failed, .. } => Some(*failed),
                _ => None,
            })
            .collect();
        assert_eq!(subacks, vec![true, false]);
    }

    #[test]
    fn test_incoming_publish_delivery() {
        let (mut transport, broker) = pair();
        transport
            .connect(&broker_address(), &tls_options())
            .expect("connect should succeed");
        let _ = transport.poll(Duration::from_millis(1));

        broker.push_incoming("realm/dev/iface/path", b"payload".to_vec(), QoS::ExactlyOnce);
        let events = transport
            .poll(Duration::from_millis(1))
            .expect("poll should succeed");
        match events.as_slice() {
            [TransportEvent::Publish { topic, payload, .. }] => {
                assert_eq!(topic, "realm/dev/iface/path");
                assert_eq!(payload, b"payload");
            }
            other => panic!("unexpected events {:?}", other),
        }
    }
}

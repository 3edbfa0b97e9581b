// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Device construction.
//!
//! The builder collects the static configuration - interfaces, credential
//! secret, capability implementations, timeouts, backoff bounds - and
//! resolves the broker address through the pairing API on `build`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{Callbacks, ConnectionEvent, DataEvent, Device, DisconnectionEvent, Error, Result,
    UnsetEvent};
use crate::connection::{BackoffContext, ConnectionState};
use crate::crypto::{CredentialTag, MemoryCredentials, TlsCredentials};
use crate::interface::Interface;
use crate::introspection::Introspection;
use crate::pairing::{BrokerAddress, PairingClient, CREDENTIAL_SECRET_LEN};
use crate::store::IntrospectionStore;
use crate::transport::Transport;

/// Static device configuration, fixed after `build`.
#[derive(Debug, Clone)]
pub(crate) struct DeviceConfig {
    pub(crate) credential_secret: String,
    pub(crate) client_cert_tag: CredentialTag,
    pub(crate) ca_cert_tag: Option<CredentialTag>,
    pub(crate) http_timeout: Duration,
    pub(crate) connection_timeout: Duration,
    pub(crate) connected_timeout: Duration,
    pub(crate) max_message_size: usize,
    pub(crate) ignore_tls: bool,
}

/// Builder for a [`Device`].
pub struct DeviceBuilder {
    credential_secret: Option<String>,
    interfaces: Vec<Interface>,
    pairing: Option<Box<dyn PairingClient>>,
    transport: Option<Box<dyn Transport>>,
    credentials: Option<Arc<dyn TlsCredentials>>,
    store: Option<Box<dyn IntrospectionStore>>,
    client_cert_tag: CredentialTag,
    ca_cert_tag: Option<CredentialTag>,
    http_timeout: Duration,
    connection_timeout: Duration,
    connected_timeout: Duration,
    backoff_initial: Duration,
    backoff_max: Duration,
    max_message_size: usize,
    ignore_tls: bool,
    callbacks: Callbacks,
}

impl DeviceBuilder {
    pub(crate) fn new() -> Self {
        Self {
            credential_secret: None,
            interfaces: Vec::new(),
            pairing: None,
            transport: None,
            credentials: None,
            store: None,
            client_cert_tag: 1,
            ca_cert_tag: None,
            http_timeout: Duration::from_secs(10),
            connection_timeout: Duration::from_secs(1),
            connected_timeout: Duration::from_millis(500),
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
            max_message_size: 4096,
            ignore_tls: false,
            callbacks: Callbacks::default(),
        }
    }

    /// The credential secret obtained at registration (44-character
    /// base64 string).
    pub fn credential_secret(mut self, secret: impl Into<String>) -> Self {
        self.credential_secret = Some(secret.into());
        self
    }

    /// Declare one interface. May be called repeatedly.
    pub fn interface(mut self, interface: Interface) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Declare several interfaces at once.
    pub fn interfaces(mut self, interfaces: impl IntoIterator<Item = Interface>) -> Self {
        self.interfaces.extend(interfaces);
        self
    }

    /// The pairing capability.
    pub fn pairing(mut self, pairing: Box<dyn PairingClient>) -> Self {
        self.pairing = Some(pairing);
        self
    }

    /// The transport capability.
    pub fn transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// The TLS credential store. Defaults to an in-memory store.
    pub fn credentials(mut self, credentials: Arc<dyn TlsCredentials>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Enable the persisted-introspection optimization on reconnect.
    pub fn introspection_store(mut self, store: Box<dyn IntrospectionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Credential tag for the client certificate and key. Must not collide
    /// with other devices in the same process.
    pub fn client_cert_tag(mut self, tag: CredentialTag) -> Self {
        self.client_cert_tag = tag;
        self
    }

    /// Credential tag holding the CA certificate, when peer verification
    /// is on.
    pub fn ca_cert_tag(mut self, tag: CredentialTag) -> Self {
        self.ca_cert_tag = Some(tag);
        self
    }

    /// Timeout for pairing HTTP requests.
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Poll timeout while a connection attempt is in progress.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Poll timeout on an established connection.
    pub fn connected_timeout(mut self, timeout: Duration) -> Self {
        self.connected_timeout = timeout;
        self
    }

    /// Reconnection backoff bounds.
    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.backoff_initial = initial;
        self.backoff_max = max;
        self
    }

    /// Largest inbound payload accepted before dispatch.
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Development toggle: skip broker certificate verification.
    pub fn ignore_tls(mut self, ignore: bool) -> Self {
        self.ignore_tls = ignore;
        self
    }

    /// Callback fired when a connection handshake completes.
    pub fn on_connect(mut self, callback: impl FnMut(&ConnectionEvent) + Send + 'static) -> Self {
        self.callbacks.on_connect = Some(Box::new(callback));
        self
    }

    /// Callback fired when the broker session ends.
    pub fn on_disconnect(
        mut self,
        callback: impl FnMut(&DisconnectionEvent) + Send + 'static,
    ) -> Self {
        self.callbacks.on_disconnect = Some(Box::new(callback));
        self
    }

    /// Callback fired for every inbound data message.
    pub fn on_data(mut self, callback: impl FnMut(DataEvent) + Send + 'static) -> Self {
        self.callbacks.on_data = Some(Box::new(callback));
        self
    }

    /// Callback fired when the server unsets a property.
    pub fn on_unset(mut self, callback: impl FnMut(UnsetEvent) + Send + 'static) -> Self {
        self.callbacks.on_unset = Some(Box::new(callback));
        self
    }

    /// Resolve the broker address and assemble the device.
    ///
    /// # Errors
    ///
    /// `InvalidParam` on a missing or malformed configuration value,
    /// `Pairing` when the broker URL exchange fails.
    pub fn build(self) -> Result<Device> {
        let credential_secret = self
            .credential_secret
            .ok_or_else(|| Error::InvalidParam("credential secret not set".into()))?;
        if credential_secret.len() != CREDENTIAL_SECRET_LEN {
            return Err(Error::InvalidParam(format!(
                "credential secret must be {} characters, got {}",
                CREDENTIAL_SECRET_LEN,
                credential_secret.len()
            )));
        }

        let mut pairing = self
            .pairing
            .ok_or_else(|| Error::InvalidParam("pairing client not set".into()))?;
        let transport = self
            .transport
            .ok_or_else(|| Error::InvalidParam("transport not set".into()))?;

        let mut introspection = Introspection::new();
        for interface in self.interfaces {
            introspection.add(interface)?;
        }

        let url = pairing.get_broker_url(self.http_timeout, &credential_secret)?;
        let broker = BrokerAddress::parse(&url)?;

        Ok(Device {
            config: DeviceConfig {
                credential_secret,
                client_cert_tag: self.client_cert_tag,
                ca_cert_tag: self.ca_cert_tag,
                http_timeout: self.http_timeout,
                connection_timeout: self.connection_timeout,
                connected_timeout: self.connected_timeout,
                max_message_size: self.max_message_size,
                ignore_tls: self.ignore_tls,
            },
            transport,
            pairing,
            credentials: self
                .credentials
                .unwrap_or_else(|| Arc::new(MemoryCredentials::new())),
            store: self.store,
            introspection,
            broker,
            base_topic: String::new(),
            certificate_pem: None,
            state: ConnectionState::Disconnected,
            session_present: false,
            subscription_failure: false,
            reconnect_at: Instant::now(),
            backoff: BackoffContext::new(self.backoff_initial, self.backoff_max, true),
            callbacks: self.callbacks,
            credentials_installed: false,
        })
    }
}

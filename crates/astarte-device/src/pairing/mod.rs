// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pairing capability.
//!
//! The pairing API is an HTTPS exchange with the platform; this library
//! only consumes it through the [`PairingClient`] trait. Registration
//! returns the credential secret; connecting needs the broker URL and a
//! signed client certificate.

use std::fmt;
use std::time::Duration;

use crate::device::Error;

/// Characters in the base64 string form of a credential secret.
pub const CREDENTIAL_SECRET_LEN: usize = 44;

/// Broker protocol scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerScheme {
    /// MQTT over TLS, the production configuration.
    Mqtts,
    /// Plain MQTT, development toggle only.
    Mqtt,
}

/// Broker endpoint as returned by the pairing API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    /// Protocol scheme.
    pub scheme: BrokerScheme,
    /// Broker hostname.
    pub host: String,
    /// Broker port.
    pub port: u16,
}

impl BrokerAddress {
    /// Parse a `mqtts://host:port[/...]` or `mqtt://host:port[/...]` URL.
    ///
    /// # Errors
    ///
    /// `Pairing` on any other scheme, a missing host, or a missing or
    /// out-of-range port.
    pub fn parse(url: &str) -> Result<Self, Error> {
        let malformed = || Error::Pairing(format!("malformed broker URL {:?}", url));

        let (scheme, rest) = if let Some(rest) = url.strip_prefix("mqtts://") {
            (BrokerScheme::Mqtts, rest)
        } else if let Some(rest) = url.strip_prefix("mqtt://") {
            (BrokerScheme::Mqtt, rest)
        } else {
            return Err(malformed());
        };

        let authority = rest.split('/').next().unwrap_or_default();
        let (host, port_text) = authority.split_once(':').ok_or_else(malformed)?;
        if host.is_empty() {
            return Err(malformed());
        }
        let port: u16 = port_text.parse().map_err(|_| malformed())?;

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = match self.scheme {
            BrokerScheme::Mqtts => "mqtts",
            BrokerScheme::Mqtt => "mqtt",
        };
        write!(f, "{}://{}:{}", scheme, self.host, self.port)
    }
}

/// A freshly issued client certificate and its private key, both PEM.
#[derive(Debug, Clone)]
pub struct ClientCertificate {
    /// Private key in PEM form.
    pub private_key_pem: String,
    /// Certificate in PEM form.
    pub certificate_pem: String,
}

/// Outcome of a certificate verification round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateCheck {
    /// The platform still accepts the certificate.
    Valid,
    /// The certificate must be re-issued.
    Invalid,
}

/// The pairing HTTP exchange the environment must provide.
pub trait PairingClient: Send {
    /// Register this device, returning its credential secret (44-character
    /// base64 string).
    fn register_device(&mut self, timeout: Duration) -> Result<String, Error>;

    /// The broker URL for this realm, `mqtts://host:port` form.
    fn get_broker_url(&mut self, timeout: Duration, credential_secret: &str)
        -> Result<String, Error>;

    /// Request a freshly signed client certificate.
    fn get_client_certificate(
        &mut self,
        timeout: Duration,
        credential_secret: &str,
    ) -> Result<ClientCertificate, Error>;

    /// Ask the platform whether a certificate is still valid.
    fn verify_client_certificate(
        &mut self,
        timeout: Duration,
        credential_secret: &str,
        certificate_pem: &str,
    ) -> Result<CertificateCheck, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mqtts_url() {
        let addr = BrokerAddress::parse("mqtts://broker.astarte.example:8883/")
            .expect("URL should parse");
        assert_eq!(addr.scheme, BrokerScheme::Mqtts);
        assert_eq!(addr.host, "broker.astarte.example");
        assert_eq!(addr.port, 8883);
        assert_eq!(addr.to_string(), "mqtts://broker.astarte.example:8883");
    }

    #[test]
    fn test_parse_development_mqtt_url() {
        let addr = BrokerAddress::parse("mqtt://localhost:1883").expect("URL should parse");
        assert_eq!(addr.scheme, BrokerScheme::Mqtt);
        assert_eq!(addr.port, 1883);
    }

    #[test]
    fn test_parse_rejects_malformed_urls() {
        let bad = [
            "http://broker:8883",
            "mqtts://",
            "mqtts://broker",
            "mqtts://:8883",
            "mqtts://broker:",
            "mqtts://broker:99999",
            "mqtts://broker:abc",
            "",
        ];
        for url in bad {
            assert!(
                matches!(BrokerAddress::parse(url), Err(Error::Pairing(_))),
                "URL {:?} should be rejected",
                url
            );
        }
    }
}

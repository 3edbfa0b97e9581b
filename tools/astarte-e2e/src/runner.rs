// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Harness runtime.
//!
//! [`Runner::start`] builds a device over the in-process transport pair,
//! moves it onto a dedicated poll thread and wires the device callbacks to
//! the expectation queues. The command side stays on the caller's thread:
//! `expect_*` commands touch only the queues, `send_*` commands are
//! forwarded to the poll thread over a channel, so the device is mutated
//! from exactly one thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use astarte_device::transport::pair::{pair, BrokerHandle};
use astarte_device::value::{object_entries_equal, AstarteData, ObjectEntry};
use astarte_device::{
    DataEvent, Device, Error, IncomingPayload, Interface, UnsetEvent,
};
use astarte_device::pairing::{CertificateCheck, ClientCertificate, PairingClient};

use crate::command::{self, Command, CommandError, LineOutcome};
use crate::idata::{Expected, Idata};

/// Credential secret used by the fixture pairing stub (44-character
/// base64 string, like a real one).
const CREDENTIAL_SECRET: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

/// Client certificate fixture; its CN fixes the base topic to
/// `e2e/2TBn-jNESuuHamE2Zo6CGA`.
const CLIENT_CERT_PEM: &str = include_str!("../fixtures/client_cert.pem");
const CLIENT_KEY_PEM: &str = include_str!("../fixtures/client_key.pem");

/// Pairing stub returning the baked-in broker address and certificate.
struct FixturePairing;

impl PairingClient for FixturePairing {
    fn register_device(&mut self, _timeout: Duration) -> Result<String, Error> {
        Ok(CREDENTIAL_SECRET.to_string())
    }

    fn get_broker_url(&mut self, _timeout: Duration, _secret: &str) -> Result<String, Error> {
        Ok("mqtts://broker.e2e.localhost:8883".into())
    }

    fn get_client_certificate(
        &mut self,
        _timeout: Duration,
        _secret: &str,
    ) -> Result<ClientCertificate, Error> {
        Ok(ClientCertificate {
            private_key_pem: CLIENT_KEY_PEM.into(),
            certificate_pem: CLIENT_CERT_PEM.into(),
        })
    }

    fn verify_client_certificate(
        &mut self,
        _timeout: Duration,
        _secret: &str,
        _certificate_pem: &str,
    ) -> Result<CertificateCheck, Error> {
        Ok(CertificateCheck::Valid)
    }
}

/// Work forwarded from the command thread to the poll thread.
enum SendRequest {
    Individual {
        interface: String,
        path: String,
        data: AstarteData,
        timestamp: Option<i64>,
    },
    Object {
        interface: String,
        path: String,
        entries: Vec<ObjectEntry>,
        timestamp: Option<i64>,
    },
    PropertySet {
        interface: String,
        path: String,
        data: AstarteData,
    },
    PropertyUnset {
        interface: String,
        path: String,
    },
    Shutdown,
}

#[derive(Default)]
struct Flags {
    connected: AtomicBool,
    failed: AtomicBool,
}

impl Flags {
    fn fail(&self, message: &str) {
        eprintln!("[e2e] FAIL: {}", message);
        self.failed.store(true, Ordering::SeqCst);
    }
}

/// A running harness: one device on its poll thread plus the verification
/// state.
pub struct Runner {
    idata: Arc<Idata>,
    sender: Sender<SendRequest>,
    flags: Arc<Flags>,
    poll_thread: Option<JoinHandle<()>>,
    /// Broker half of the transport pair, for scripting inbound traffic.
    pub broker: BrokerHandle,
}

impl Runner {
    /// Build the device, connect it and spawn the poll thread.
    pub fn start(interfaces: Vec<Interface>, idata: Arc<Idata>) -> Result<Self, Error> {
        let (transport, broker) = pair();
        let flags = Arc::new(Flags::default());
        let (sender, receiver) = crossbeam_channel::unbounded();

        let connected_flag = Arc::clone(&flags);
        let data_idata = Arc::clone(&idata);
        let data_flags = Arc::clone(&flags);
        let unset_idata = Arc::clone(&idata);
        let unset_flags = Arc::clone(&flags);

        let mut device = Device::builder()
            .credential_secret(CREDENTIAL_SECRET)
            .interfaces(interfaces)
            .pairing(Box::new(FixturePairing))
            .transport(Box::new(transport))
            .connection_timeout(Duration::from_millis(50))
            .connected_timeout(Duration::from_millis(50))
            .backoff(Duration::from_millis(100), Duration::from_secs(5))
            .on_connect(move |event| {
                eprintln!(
                    "[e2e] device connected (session_present: {})",
                    event.session_present
                );
                connected_flag.connected.store(true, Ordering::SeqCst);
            })
            .on_disconnect(|_| eprintln!("[e2e] device disconnected"))
            .on_data(move |event| verify_data(&data_idata, &data_flags, event))
            .on_unset(move |event| verify_unset(&unset_idata, &unset_flags, event))
            .build()?;

        device.connect()?;
        let poll_flags = Arc::clone(&flags);
        let poll_thread = std::thread::spawn(move || poll_loop(device, receiver, poll_flags));

        Ok(Self {
            idata,
            sender,
            flags,
            poll_thread: Some(poll_thread),
            broker,
        })
    }

    /// Block until the device reports `Connected`, bounded by `timeout`.
    pub fn wait_connected(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.flags.connected.load(Ordering::SeqCst) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    /// Whether any verification step has failed so far.
    pub fn failed(&self) -> bool {
        self.flags.failed.load(Ordering::SeqCst)
    }

    /// Parse and execute one command line.
    pub fn handle_line(&self, line: &str) -> Result<LineOutcome, CommandError> {
        match command::parse(line)? {
            Command::ExpectIndividual {
                interface,
                path,
                payload,
                timestamp,
            } => {
                let iface = self.interface(&interface)?;
                let data = command::decode_individual(iface, &path, &payload)?;
                eprintln!("[e2e] expecting individual on {}{}", interface, path);
                self.push(&interface, Expected::Individual {
                    path,
                    data,
                    timestamp,
                })?;
            }
            Command::ExpectObject {
                interface,
                path,
                payload,
                timestamp,
            } => {
                let iface = self.interface(&interface)?;
                let entries = command::decode_object(iface, &path, &payload)?;
                eprintln!("[e2e] expecting object on {}{}", interface, path);
                self.push(&interface, Expected::Object {
                    path,
                    entries,
                    timestamp,
                })?;
            }
            Command::ExpectPropertySet {
                interface,
                path,
                payload,
            } => {
                let iface = self.interface(&interface)?;
                let data = command::decode_individual(iface, &path, &payload)?;
                eprintln!("[e2e] expecting property set on {}{}", interface, path);
                self.push(&interface, Expected::PropertySet { path, data })?;
            }
            Command::ExpectPropertyUnset { interface, path } => {
                self.interface(&interface)?;
                eprintln!("[e2e] expecting property unset on {}{}", interface, path);
                self.push(&interface, Expected::PropertyUnset { path })?;
            }
            Command::SendIndividual {
                interface,
                path,
                payload,
                timestamp,
            } => {
                let iface = self.interface(&interface)?;
                let data = command::decode_individual(iface, &path, &payload)?;
                self.forward(SendRequest::Individual {
                    interface,
                    path,
                    data,
                    timestamp,
                })?;
            }
            Command::SendObject {
                interface,
                path,
                payload,
                timestamp,
            } => {
                let iface = self.interface(&interface)?;
                let entries = command::decode_object(iface, &path, &payload)?;
                self.forward(SendRequest::Object {
                    interface,
                    path,
                    entries,
                    timestamp,
                })?;
            }
            Command::SendPropertySet {
                interface,
                path,
                payload,
            } => {
                let iface = self.interface(&interface)?;
                let data = command::decode_individual(iface, &path, &payload)?;
                self.forward(SendRequest::PropertySet {
                    interface,
                    path,
                    data,
                })?;
            }
            Command::SendPropertyUnset { interface, path } => {
                self.interface(&interface)?;
                self.forward(SendRequest::PropertyUnset { interface, path })?;
            }
            Command::Disconnect => {
                let _ = self.sender.send(SendRequest::Shutdown);
                return Ok(LineOutcome::Disconnect);
            }
        }
        Ok(LineOutcome::Continue)
    }

    /// Stop the poll thread and report the verdict: `true` when nothing
    /// failed and no expectation is left over.
    pub fn shutdown(mut self) -> bool {
        let _ = self.sender.send(SendRequest::Shutdown);
        if let Some(handle) = self.poll_thread.take() {
            let _ = handle.join();
        }

        let leftovers = self.idata.pending();
        for (interface, count) in &leftovers {
            eprintln!(
                "[e2e] FAIL: {} expectation(s) left over on {}",
                count, interface
            );
        }
        !self.flags.failed.load(Ordering::SeqCst) && leftovers.is_empty()
    }

    fn interface(&self, name: &str) -> Result<&Interface, CommandError> {
        self.idata
            .interface(name)
            .ok_or_else(|| CommandError::new(format!("unknown interface {}", name)))
    }

    fn push(&self, interface: &str, expected: Expected) -> Result<(), CommandError> {
        self.idata.push(interface, expected).map_err(CommandError::new)
    }

    fn forward(&self, request: SendRequest) -> Result<(), CommandError> {
        self.sender
            .send(request)
            .map_err(|_| CommandError::new("poll thread is gone"))
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        let _ = self.sender.send(SendRequest::Shutdown);
        if let Some(handle) = self.poll_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Poll-thread main loop: execute forwarded sends between ticks.
fn poll_loop(mut device: Device, receiver: Receiver<SendRequest>, flags: Arc<Flags>) {
    let mut shutting_down = false;
    loop {
        while let Ok(request) = receiver.try_recv() {
            let result = match request {
                SendRequest::Individual {
                    interface,
                    path,
                    data,
                    timestamp,
                } => device.send_individual(&interface, &path, data, timestamp),
                SendRequest::Object {
                    interface,
                    path,
                    entries,
                    timestamp,
                } => device.send_object(&interface, &path, &entries, timestamp),
                SendRequest::PropertySet {
                    interface,
                    path,
                    data,
                } => device.set_property(&interface, &path, data),
                SendRequest::PropertyUnset { interface, path } => {
                    device.unset_property(&interface, &path)
                }
                SendRequest::Shutdown => {
                    shutting_down = true;
                    match device.disconnect() {
                        Ok(()) | Err(Error::NotReady) => Ok(()),
                        Err(e) => Err(e),
                    }
                }
            };
            if let Err(e) = result {
                flags.fail(&format!("device operation failed: {}", e));
            }
        }

        match device.poll() {
            Ok(()) | Err(Error::Timeout) => {}
            Err(e) if shutting_down => eprintln!("[e2e] poll error during shutdown: {}", e),
            Err(e) => flags.fail(&format!("poll failed: {}", e)),
        }

        if shutting_down && !device.is_connected() {
            break;
        }
    }
}

/// Match one inbound data message against the head of its interface's
/// expectation queue.
fn verify_data(idata: &Idata, flags: &Flags, event: DataEvent) {
    let Some(expected) = idata.pop(&event.interface_name) else {
        flags.fail(&format!(
            "unexpected message on {}{}",
            event.interface_name, event.path
        ));
        return;
    };

    let matched = match (&expected, &event.payload) {
        (
            Expected::Individual { path, data, .. },
            IncomingPayload::Individual { data: received, .. },
        ) => path == &event.path && data == received,
        (
            Expected::PropertySet { path, data },
            IncomingPayload::Individual { data: received, .. },
        ) => path == &event.path && data == received,
        (
            Expected::Object { path, entries, .. },
            IncomingPayload::Object {
                entries: received, ..
            },
        ) => path == &event.path && object_entries_equal(entries, received),
        _ => false,
    };

    if matched {
        eprintln!(
            "[e2e] matched message on {}{}",
            event.interface_name, event.path
        );
    } else {
        flags.fail(&format!(
            "message on {}{} does not match the expected {:?}",
            event.interface_name, event.path, expected
        ));
    }
}

/// Match one property unset against the head of its interface's queue.
fn verify_unset(idata: &Idata, flags: &Flags, event: UnsetEvent) {
    let Some(expected) = idata.pop(&event.interface_name) else {
        flags.fail(&format!(
            "unexpected unset on {}{}",
            event.interface_name, event.path
        ));
        return;
    };

    match expected {
        Expected::PropertyUnset { ref path } if path == &event.path => {
            eprintln!(
                "[e2e] matched unset on {}{}",
                event.interface_name, event.path
            );
        }
        other => {
            flags.fail(&format!(
                "unset on {}{} does not match the expected {:?}",
                event.interface_name, event.path, other
            ));
        }
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Inbound message dispatch.
//!
//! Topics under `<base>/control` are control messages; everything else is
//! `<base>/<interface>/<path>` data. Data payloads carry one document with
//! a `v` element (and optionally `t`); a zero-length payload on a property
//! path is an unset.

use super::{DataEvent, Device, Error, IncomingPayload, Result, UnsetEvent};
use crate::bson::BsonDocument;
use crate::interface::{Aggregation, InterfaceType};
use crate::value::{object, AstarteData};
use crate::{debug, error, warn};

impl Device {
    /// Decode one inbound publish and hand it to the user callbacks.
    pub(crate) fn dispatch_publish(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        let rest = topic
            .strip_prefix(self.base_topic.as_str())
            .and_then(|r| r.strip_prefix('/'))
            .ok_or_else(|| {
                Error::InvalidParam(format!(
                    "incoming message topic does not begin with the base topic: {}",
                    topic
                ))
            })?;

        if let Some(control) = rest.strip_prefix("control") {
            let control_path = control.strip_prefix('/').unwrap_or(control);
            return self.dispatch_control(control_path, payload);
        }

        let (interface_name, sub_path) = rest.split_once('/').ok_or_else(|| {
            Error::InvalidParam(format!("no path after the interface name: {}", topic))
        })?;
        let path = format!("/{}", sub_path);

        let interface = self.introspection.get(interface_name).ok_or_else(|| {
            Error::InvalidParam(format!(
                "message on undeclared interface {}",
                interface_name
            ))
        })?;

        if payload.is_empty() {
            if interface.interface_type() != InterfaceType::Property {
                return Err(Error::InvalidParam(format!(
                    "zero-length payload on datastream {}{}",
                    interface_name, path
                )));
            }
            if interface.mapping(&path).is_none() {
                return Err(Error::InvalidParam(format!(
                    "unset for unknown property path {}{}",
                    interface_name, path
                )));
            }
            let event = UnsetEvent {
                interface_name: interface_name.to_string(),
                path,
            };
            match self.callbacks.on_unset.as_mut() {
                Some(callback) => callback(event),
                None => error!("unset received for {}, but no unset callback is set", topic),
            }
            return Ok(());
        }

        let document = BsonDocument::parse(payload)?;
        let value = document.lookup("v")?.ok_or(Error::CodecMalformed)?;
        let timestamp = match document.lookup("t")? {
            Some(element) => Some(element.as_datetime()?),
            None => None,
        };

        let incoming = match interface.aggregation() {
            Aggregation::Object => IncomingPayload::Object {
                entries: object::deserialize_entries(&value, interface, &path)?,
                timestamp,
            },
            Aggregation::Individual => {
                let mapping = interface.mapping(&path).ok_or_else(|| {
                    Error::InvalidParam(format!(
                        "no mapping at path {} on interface {}",
                        path, interface_name
                    ))
                })?;
                let data = AstarteData::deserialize(&value, mapping.mapping_type())?;
                IncomingPayload::Individual { data, timestamp }
            }
        };

        let event = DataEvent {
            interface_name: interface_name.to_string(),
            path,
            payload: incoming,
        };
        match self.callbacks.on_data.as_mut() {
            Some(callback) => callback(event),
            None => error!("data received on {}, but no data callback is set", topic),
        }
        Ok(())
    }

    /// Control-plane messages. Only the consumer-properties purge list is
    /// recognized; it is reserved for future use.
    fn dispatch_control(&mut self, control_path: &str, payload: &[u8]) -> Result<()> {
        if control_path == "consumer/properties" {
            debug!(
                "received server properties control message ({} B), ignored",
                payload.len()
            );
        } else {
            warn!("unhandled control message on {}", control_path);
        }
        Ok(())
    }
}

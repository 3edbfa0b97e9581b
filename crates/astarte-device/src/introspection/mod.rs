// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The device's declared interface set.
//!
//! Held in insertion order: the order carries no protocol meaning, but the
//! canonical string derived from it is persisted and compared across
//! reconnects, so it must be stable.

use crate::device::Error;
use crate::interface::Interface;

/// Insertion-ordered set of interfaces, unique by name.
#[derive(Debug, Default)]
pub struct Introspection {
    interfaces: Vec<Interface>,
}

impl Introspection {
    /// Empty interface set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an interface.
    ///
    /// # Errors
    ///
    /// `InvalidParam` when an interface with the same name is already
    /// registered.
    pub fn add(&mut self, interface: Interface) -> Result<(), Error> {
        if self.get(interface.name()).is_some() {
            return Err(Error::InvalidParam(format!(
                "interface {} is already registered",
                interface.name()
            )));
        }
        self.interfaces.push(interface);
        Ok(())
    }

    /// Look an interface up by name.
    pub fn get(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name() == name)
    }

    /// Registered interfaces, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Interface> {
        self.interfaces.iter()
    }

    /// Number of registered interfaces.
    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    /// Whether no interface is registered.
    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    /// The canonical `name:major:minor;...` form sent to the platform on
    /// connect, in insertion order.
    pub fn canonical_string(&self) -> String {
        let parts: Vec<String> = self
            .interfaces
            .iter()
            .map(|i| format!("{}:{}:{}", i.name(), i.version_major(), i.version_minor()))
            .collect();
        parts.join(";")
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end verification harness for the Astarte device library.
//!
//! The harness runs a real [`astarte_device::Device`] on a poll thread and
//! reads a shell-like command stream on the main thread. `expect_*`
//! commands queue descriptors of the messages the server side is about to
//! send; every live inbound message is matched against the head of its
//! interface's queue. `send_*` commands forward data through the device.
//!
//! Commands and the verifier never share state beyond the per-interface
//! single-producer/single-consumer expectation queues, so the harness
//! itself stays observable and non-blocking.

pub mod command;
pub mod idata;
pub mod interfaces;
pub mod runner;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Convergence of desired objects into the cluster.
//!
//! - [`resources`] - Type-erased desired objects and the upsert/delete client
//! - [`resource_reconciler`] - The periodic, leader-elected convergence loop
//! - [`retry`] - Exponential backoff and jitter shared with the cleaner

pub mod resource_reconciler;
pub mod resources;
pub mod retry;

pub use resource_reconciler::ResourceReconciler;
pub use resources::{KubeObjectClient, ManagedObject, ObjectClient};

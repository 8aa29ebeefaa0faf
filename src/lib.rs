// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # App Routing Operator - ingress infrastructure for Kubernetes
//!
//! Core of an operator that provisions ingress infrastructure (NGINX ingress
//! controllers, Gateway resources, DNS records) on behalf of cluster users.
//!
//! ## Overview
//!
//! This library provides the two primitives every higher-level controller builds on:
//!
//! - **Cleaner** - removes, cluster-wide and once per leadership tenure, every object
//!   of the resource types the operator no longer claims
//! - **Resource reconciler** - keeps a fixed list of desired objects applied (or
//!   deleted) forever, with jittered intervals and fast retry after failure
//!
//! Both are leader-elected runnables hosted by [`runtime::Manager`].
//!
//! ## Modules
//!
//! - [`cleaner`] - The cleaner and its [`cleaner::retriever::CleanTypeRetriever`] algebra
//! - [`reconcilers`] - Resource reconciler, upsert and retry helpers
//! - [`runtime`] - Runnable hosting and leader election
//! - [`mapper`] - GroupKind to resource resolution
//! - [`selector`] - Label selector construction and matching
//! - [`operator`] - The operator's static resources and cleanup scope
//!
//! ## Example
//!
//! ```rust,no_run
//! use app_routing_operator::cleaner::retriever::{CleanTypeRetriever, RemoveOpts};
//! use app_routing_operator::gvk::GroupKind;
//! use app_routing_operator::labels::{OwnershipLabels, COMPONENT_STATIC};
//!
//! let old = OwnershipLabels::new("app-routing-operator", COMPONENT_STATIC).with_version("0.2.0");
//! let scope = CleanTypeRetriever::from_group_kinds(
//!     old.to_map(),
//!     [GroupKind::new("apps", "Deployment"), GroupKind::new("", "Service")],
//! )
//! .remove(CleanTypeRetriever::empty(), RemoveOpts::default());
//! ```

pub mod cleaner;
pub mod config;
pub mod constants;
pub mod errors;
pub mod gvk;
pub mod labels;
pub mod mapper;
pub mod metrics;
pub mod operator;
pub mod reconcilers;
pub mod runtime;
pub mod selector;

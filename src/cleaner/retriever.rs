// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Declarative description of the resource types the operator owns.
//!
//! A [`CleanTypeRetriever`] is a small expression tree describing "which resource
//! types, under which labels, are ours". It is built once while wiring the process and
//! is only evaluated (against a [`RestMapper`]) when a clean pass runs, because the
//! GroupKind → GroupVersionResource resolution needs a populated discovery cache.
//!
//! # Example
//!
//! ```rust
//! use app_routing_operator::cleaner::retriever::{CleanTypeRetriever, RemoveOpts};
//! use app_routing_operator::gvk::GroupKind;
//! use std::collections::BTreeMap;
//!
//! let old = BTreeMap::from([("app.kubernetes.io/version".to_string(), "0.2.0".to_string())]);
//! let current = BTreeMap::from([("app.kubernetes.io/version".to_string(), "0.3.0".to_string())]);
//!
//! let scope = CleanTypeRetriever::from_group_kinds(old, [GroupKind::new("apps", "Deployment")])
//!     .remove(
//!         CleanTypeRetriever::from_group_kinds(current, [GroupKind::new("apps", "Deployment")]),
//!         RemoveOpts::default(),
//!     );
//! println!("{scope}");
//! ```

use crate::errors::MappingError;
use crate::gvk::{GroupKind, GroupVersionKind, GroupVersionResource};
use crate::mapper::RestMapper;
use crate::reconcilers::resources::ManagedObject;
use futures::future::{BoxFuture, FutureExt};
use std::collections::BTreeMap;
use std::fmt;

/// One cleanup target: every object of `gvr` carrying all of `labels`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanType {
    /// Concrete resource collection
    pub gvr: GroupVersionResource,
    /// Labels an object must carry, all of them, to be deleted
    pub labels: BTreeMap<String, String>,
}

/// How two clean types are compared when subtracting one set from another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompareStrategy {
    /// Resource and label set must both match exactly
    #[default]
    Everything,
    /// Only the resource must match
    IgnoreLabels,
}

/// Options for [`CleanTypeRetriever::remove`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOpts {
    /// Comparison used to decide whether an entry is removed
    pub compare_strategy: CompareStrategy,
}

impl RemoveOpts {
    /// Options comparing with the given strategy.
    #[must_use]
    pub fn with_strategy(compare_strategy: CompareStrategy) -> Self {
        Self { compare_strategy }
    }
}

/// Compare two clean types under `strategy`.
#[must_use]
pub fn equal(a: &CleanType, b: &CleanType, strategy: CompareStrategy) -> bool {
    match strategy {
        CompareStrategy::Everything => a.gvr == b.gvr && a.labels == b.labels,
        CompareStrategy::IgnoreLabels => a.gvr == b.gvr,
    }
}

/// Pair every resource with the same label set.
#[must_use]
pub fn add_labels(
    gvrs: Vec<GroupVersionResource>,
    labels: &BTreeMap<String, String>,
) -> Vec<CleanType> {
    gvrs.into_iter()
        .map(|gvr| CleanType {
            gvr,
            labels: labels.clone(),
        })
        .collect()
}

/// Resolve a kind to every resource serving it.
///
/// # Errors
///
/// Propagates the mapper's error unchanged, an unknown kind included. Stale discovery
/// is not retried here; the caller's retry loop covers it.
pub async fn gvrs_from_gk(
    mapper: &dyn RestMapper,
    gk: &GroupKind,
) -> Result<Vec<GroupVersionResource>, MappingError> {
    Ok(mapper
        .rest_mappings(gk)
        .await?
        .into_iter()
        .map(|mapping| mapping.resource)
        .collect())
}

/// A deferred, composable set of [`CleanType`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanTypeRetriever {
    /// Resolves to nothing
    Empty,
    /// The kinds of a set of objects, each labelled with `labels`
    FromObjects {
        /// Kinds taken from the objects
        kinds: Vec<GroupVersionKind>,
        /// Labels attached to every resulting clean type
        labels: BTreeMap<String, String>,
    },
    /// A set of abstract kinds, each labelled with `labels`
    FromGroupKinds {
        /// Kinds to resolve
        group_kinds: Vec<GroupKind>,
        /// Labels attached to every resulting clean type
        labels: BTreeMap<String, String>,
    },
    /// Left entries followed by right entries
    Union(Box<CleanTypeRetriever>, Box<CleanTypeRetriever>),
    /// Entries of `base` not matched by any entry of `removed`
    Difference {
        /// Set being filtered
        base: Box<CleanTypeRetriever>,
        /// Entries to filter out
        removed: Box<CleanTypeRetriever>,
        /// Comparison used for matching
        opts: RemoveOpts,
    },
}

impl Default for CleanTypeRetriever {
    fn default() -> Self {
        Self::Empty
    }
}

impl CleanTypeRetriever {
    /// The identity element for [`add`](Self::add) and [`remove`](Self::remove).
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Clean types for the kinds of `objects`, all carrying `labels`.
    #[must_use]
    pub fn from_objects<'a>(
        objects: impl IntoIterator<Item = &'a ManagedObject>,
        labels: BTreeMap<String, String>,
    ) -> Self {
        Self::FromObjects {
            kinds: objects.into_iter().map(ManagedObject::gvk).collect(),
            labels,
        }
    }

    /// Clean types for `group_kinds`, all carrying `labels`.
    #[must_use]
    pub fn from_group_kinds(
        labels: BTreeMap<String, String>,
        group_kinds: impl IntoIterator<Item = GroupKind>,
    ) -> Self {
        Self::FromGroupKinds {
            group_kinds: group_kinds.into_iter().collect(),
            labels,
        }
    }

    /// Concatenate with `other`; entries of `self` come first and duplicates are kept.
    #[must_use]
    pub fn add(self, other: CleanTypeRetriever) -> Self {
        Self::Union(Box::new(self), Box::new(other))
    }

    /// Drop every entry matched by some entry of `other` under `opts`.
    #[must_use]
    pub fn remove(self, other: CleanTypeRetriever, opts: RemoveOpts) -> Self {
        Self::Difference {
            base: Box::new(self),
            removed: Box::new(other),
            opts,
        }
    }

    /// Evaluate the expression against `mapper`.
    ///
    /// Both sides of every composition are resolved against the same mapper.
    ///
    /// # Errors
    ///
    /// Returns the first [`MappingError`] raised while resolving a kind.
    pub fn retrieve<'a>(
        &'a self,
        mapper: &'a dyn RestMapper,
    ) -> BoxFuture<'a, Result<Vec<CleanType>, MappingError>> {
        async move {
            match self {
                Self::Empty => Ok(Vec::new()),
                Self::FromObjects { kinds, labels } => {
                    let mut clean_types = Vec::new();
                    for gvk in kinds {
                        let gvrs = gvrs_from_gk(mapper, &gvk.group_kind()).await?;
                        clean_types.extend(add_labels(gvrs, labels));
                    }
                    Ok(clean_types)
                }
                Self::FromGroupKinds {
                    group_kinds,
                    labels,
                } => {
                    let mut clean_types = Vec::new();
                    for gk in group_kinds {
                        let gvrs = gvrs_from_gk(mapper, gk).await?;
                        clean_types.extend(add_labels(gvrs, labels));
                    }
                    Ok(clean_types)
                }
                Self::Union(left, right) => {
                    let mut clean_types = left.retrieve(mapper).await?;
                    clean_types.extend(right.retrieve(mapper).await?);
                    Ok(clean_types)
                }
                Self::Difference {
                    base,
                    removed,
                    opts,
                } => {
                    let base = base.retrieve(mapper).await?;
                    let removed = removed.retrieve(mapper).await?;
                    // Quadratic; scopes hold dozens of entries.
                    Ok(base
                        .into_iter()
                        .filter(|entry| {
                            !removed
                                .iter()
                                .any(|other| equal(entry, other, opts.compare_strategy))
                        })
                        .collect())
                }
            }
        }
        .boxed()
    }
}

fn fmt_labels(f: &mut fmt::Formatter<'_>, labels: &BTreeMap<String, String>) -> fmt::Result {
    let rendered: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
    write!(f, "{{{}}}", rendered.join(","))
}

impl fmt::Display for CleanTypeRetriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::FromObjects { kinds, labels } => {
                let kinds: Vec<String> = kinds
                    .iter()
                    .map(|gvk| gvk.group_kind().to_string())
                    .collect();
                write!(f, "objs[{}]", kinds.join(","))?;
                fmt_labels(f, labels)
            }
            Self::FromGroupKinds {
                group_kinds,
                labels,
            } => {
                let kinds: Vec<String> = group_kinds.iter().map(ToString::to_string).collect();
                write!(f, "gk[{}]", kinds.join(","))?;
                fmt_labels(f, labels)
            }
            Self::Union(left, right) => write!(f, "({left} + {right})"),
            Self::Difference {
                base,
                removed,
                opts,
            } => match opts.compare_strategy {
                CompareStrategy::Everything => write!(f, "({base} - {removed})"),
                CompareStrategy::IgnoreLabels => write!(f, "({base} -kinds {removed})"),
            },
        }
    }
}

#[cfg(test)]
#[path = "retriever_tests.rs"]
mod retriever_tests;

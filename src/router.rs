//! # Event Router
//!
//! Decides which metric a task event updates, correlating events that omit the
//! task name through the [`TaskIdentityCache`].
//!
//! ## Routing Table
//!
//! ```text
//! task-received  --set(uuid, name)-->  task_received{name, hostname}
//! task-started   --get(uuid)------->   task_started{name, hostname}
//! task-succeeded --get(uuid)------->   task_succeeded{name, hostname}
//!                                      task_runtime{name, hostname}  (runtime)
//!                                      task_runtime_summary{name}    (runtime)
//! task-failed    --get(uuid)------->   task_failed{name, hostname}
//! task-retried   --get(uuid)------->   task_retried{name, hostname}
//! task-revoked   --get(uuid)------->   task_revoked{name}
//! task-rejected  --get(uuid)------->   task_rejected{name}
//! anything else  ------------------>   (dropped)
//! ```
//!
//! `task-received` is the only event Celery guarantees to carry the name, so it
//! is the only cache writer. Every other event is a reader; on a miss the update
//! is dropped rather than recorded under a placeholder name, keeping label
//! cardinality bounded by the set of real task names.
//!
//! Entries are never removed on terminal events. A duplicate `task-succeeded`
//! inside the TTL window counts twice.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::TaskIdentityCache;
use crate::events::{TaskEvent, TaskEventType};
use crate::metrics::MetricRegistry;

/// A single metric-update action
#[derive(Debug, Clone, PartialEq)]
pub enum MetricUpdate {
    Received { name: String, hostname: String },
    Started { name: String, hostname: String },
    Succeeded {
        name: String,
        hostname: String,
        runtime: Option<f64>,
    },
    Failed { name: String, hostname: String },
    Retried { name: String, hostname: String },
    Revoked { name: String },
    Rejected { name: String },
}

impl MetricUpdate {
    pub fn task_name(&self) -> &str {
        match self {
            Self::Received { name, .. }
            | Self::Started { name, .. }
            | Self::Succeeded { name, .. }
            | Self::Failed { name, .. }
            | Self::Retried { name, .. }
            | Self::Revoked { name }
            | Self::Rejected { name } => name,
        }
    }
}

/// Result of routing one task event
#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    Apply(MetricUpdate),
    /// No cached identity for the uuid (never received, or expired)
    CacheMiss,
    /// `task-received` without a task name; nothing to correlate on
    MissingName,
    /// Event type outside the routing table
    Unrecognized(String),
}

impl RouteDecision {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Apply(_))
    }
}

/// Pure routing decision for `event` given the cached name for its uuid.
///
/// For `task-received` the lookup is ignored: the event's own name is used.
pub fn decide(event: &TaskEvent, cached_name: Option<String>) -> RouteDecision {
    let hostname = || event.hostname.clone().unwrap_or_default();
    let cached = |build: fn(String, String) -> MetricUpdate| {
        cached_name
            .clone()
            .map(|name| build(name, hostname()))
            .ok_or(RouteDecision::CacheMiss)
    };

    let update = match &event.event_type {
        TaskEventType::Received => event
            .name
            .clone()
            .map(|name| MetricUpdate::Received {
                name,
                hostname: hostname(),
            })
            .ok_or(RouteDecision::MissingName),
        TaskEventType::Started => {
            cached(|name, hostname| MetricUpdate::Started { name, hostname })
        }
        TaskEventType::Succeeded => cached_name
            .clone()
            .map(|name| MetricUpdate::Succeeded {
                name,
                hostname: hostname(),
                runtime: event.runtime,
            })
            .ok_or(RouteDecision::CacheMiss),
        TaskEventType::Failed => cached(|name, hostname| MetricUpdate::Failed { name, hostname }),
        TaskEventType::Retried => {
            cached(|name, hostname| MetricUpdate::Retried { name, hostname })
        }
        TaskEventType::Revoked => cached(|name, _| MetricUpdate::Revoked { name }),
        TaskEventType::Rejected => cached(|name, _| MetricUpdate::Rejected { name }),
        TaskEventType::Unrecognized(raw) => Err(RouteDecision::Unrecognized(raw.clone())),
    };

    match update {
        Ok(update) => RouteDecision::Apply(update),
        Err(decision) => decision,
    }
}

/// Lock-free routing counters, read by the health endpoint
#[derive(Debug, Default)]
struct AtomicRouterStats {
    routed: AtomicU64,
    applied: AtomicU64,
    cache_misses: AtomicU64,
    missing_names: AtomicU64,
    unrecognized: AtomicU64,
}

impl AtomicRouterStats {
    fn record(&self, decision: &RouteDecision) {
        self.routed.fetch_add(1, Ordering::Relaxed);
        let counter = match decision {
            RouteDecision::Apply(_) => &self.applied,
            RouteDecision::CacheMiss => &self.cache_misses,
            RouteDecision::MissingName => &self.missing_names,
            RouteDecision::Unrecognized(_) => &self.unrecognized,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RouterStats {
        RouterStats {
            routed: self.routed.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            missing_names: self.missing_names.load(Ordering::Relaxed),
            unrecognized: self.unrecognized.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the router counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RouterStats {
    pub routed: u64,
    pub applied: u64,
    pub cache_misses: u64,
    pub missing_names: u64,
    pub unrecognized: u64,
}

/// Applies routing decisions to the cache and registry
#[derive(Debug)]
pub struct EventRouter {
    cache: TaskIdentityCache,
    registry: Arc<MetricRegistry>,
    stats: AtomicRouterStats,
}

impl EventRouter {
    pub fn new(cache: TaskIdentityCache, registry: Arc<MetricRegistry>) -> Self {
        Self {
            cache,
            registry,
            stats: AtomicRouterStats::default(),
        }
    }

    /// Route one task event: update the cache, then the registry.
    ///
    /// Never fails; the returned decision says what happened.
    pub fn route(&self, event: &TaskEvent) -> RouteDecision {
        let cached_name = match event.event_type {
            TaskEventType::Received => {
                if let Some(name) = &event.name {
                    self.cache.set(&event.uuid, name);
                }
                None
            }
            TaskEventType::Unrecognized(_) => None,
            _ => self.cache.get(&event.uuid),
        };

        let decision = decide(event, cached_name);
        self.stats.record(&decision);

        match &decision {
            RouteDecision::Apply(update) => {
                debug!(
                    uuid = %event.uuid,
                    event_type = %event.event_type,
                    task_name = %update.task_name(),
                    hostname = ?event.hostname,
                    "Applying task metric update"
                );
                self.registry.apply(update);
            }
            RouteDecision::CacheMiss => {
                debug!(
                    uuid = %event.uuid,
                    event_type = %event.event_type,
                    "No cached task identity, dropping update"
                );
            }
            RouteDecision::MissingName => {
                info!(
                    uuid = %event.uuid,
                    hostname = ?event.hostname,
                    "Received event without task name, dropping"
                );
            }
            RouteDecision::Unrecognized(event_type) => {
                info!(
                    uuid = %event.uuid,
                    event_type = %event_type,
                    "Unrecognized task event type, dropping"
                );
            }
        }

        decision
    }

    pub fn cache(&self) -> &TaskIdentityCache {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    pub fn get_statistics(&self) -> RouterStats {
        self.stats.snapshot()
    }
}

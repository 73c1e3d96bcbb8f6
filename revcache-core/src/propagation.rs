//! # Invalidation Propagation
//!
//! Delivery of invalidation events to the other nodes of the cluster.
//!
//! Propagation is best effort: there is no acknowledgement, no ordering across
//! keys and a lost event is tolerated. A node invalidates locally *before*
//! publishing, so delivery for a key is always causally after the write that
//! produced it.
//!
//! This module defines the [`InvalidationPropagator`] contract plus
//! [`ClusterBus`], an in-process synchronous bus used to wire several cache
//! managers together (embedded clusters, tests).

use crate::error::{CacheError, Result};
use crate::manager::CacheManager;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::{Arc, Weak};

/// Data center fan-out of a published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DcNotify {
    /// Every node in every site
    #[default]
    AllDcs,
    /// Only nodes in the sender's site
    LocalDcOnly,
    /// Only nodes outside the sender's site
    OnlyOtherDcs,
}

impl DcNotify {
    /// Whether an event published from `origin_site` reaches a node in `target_site`.
    pub fn reaches(self, origin_site: &str, target_site: &str) -> bool {
        match self {
            DcNotify::AllDcs => true,
            DcNotify::LocalDcOnly => origin_site == target_site,
            DcNotify::OnlyOtherDcs => origin_site != target_site,
        }
    }
}

/// Identity of a cluster node: its name and the site (data center) it runs in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeInfo {
    pub name: String,
    pub site: String,
}

impl NodeInfo {
    pub fn new(name: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            site: site.into(),
        }
    }

    /// Whether an event from `origin` published with the given flags must be
    /// delivered to this node.
    pub fn accepts(&self, origin: &NodeInfo, ignore_sender: bool, dc_notify: DcNotify) -> bool {
        if ignore_sender && self.name == origin.name {
            return false;
        }
        dc_notify.reaches(&origin.site, &self.site)
    }
}

impl std::fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.site)
    }
}

/// Publishes invalidation events to the rest of the cluster.
pub trait InvalidationPropagator<E>: Send + Sync {
    /// Publishes `event` on `channel`.
    ///
    /// `ignore_sender` suppresses delivery back to the publishing node.
    /// Errors are reported to the caller, which logs them and carries on.
    fn notify(&self, channel: &str, event: &E, ignore_sender: bool, dc_notify: DcNotify)
        -> Result<()>;
}

/// Propagator for single-node deployments: publishing is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPropagator;

impl<E> InvalidationPropagator<E> for NoopPropagator {
    fn notify(&self, _: &str, _: &E, _: bool, _: DcNotify) -> Result<()> {
        Ok(())
    }
}

/// Callback invoked for every event delivered to a subscription.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Subscription<E> {
    node: NodeInfo,
    channel: String,
    listener: Listener<E>,
}

/// In-process cluster bus delivering events synchronously to subscribed nodes.
///
/// Listeners run on the publishing thread, after the bus lock is released, so
/// a listener may itself publish.
///
/// # Examples
///
/// ```
/// use revcache_core::{ClusterBus, DcNotify, InvalidationPropagator};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let bus = ClusterBus::<String>::new();
/// let node1 = bus.join("node1", "dc1");
/// let node2 = bus.join("node2", "dc2");
///
/// let received = Arc::new(AtomicUsize::new(0));
/// let r = received.clone();
/// node2.subscribe("realms", move |_event: &String| {
///     r.fetch_add(1, Ordering::SeqCst);
/// });
///
/// node1.notify("realms", &"realm-1".to_string(), true, DcNotify::AllDcs).unwrap();
/// assert_eq!(received.load(Ordering::SeqCst), 1);
/// ```
pub struct ClusterBus<E> {
    subscriptions: RwLock<Vec<Subscription<E>>>,
    partitioned: RwLock<HashSet<String>>,
}

impl<E> ClusterBus<E> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            subscriptions: RwLock::new(Vec::new()),
            partitioned: RwLock::new(HashSet::new()),
        })
    }

    /// Adds a node to the bus and returns its handle.
    pub fn join(self: &Arc<Self>, name: impl Into<String>, site: impl Into<String>) -> ClusterNode<E> {
        ClusterNode {
            bus: Arc::clone(self),
            info: NodeInfo::new(name, site),
        }
    }

    /// Cuts a node off (or reconnects it). A partitioned node neither publishes nor receives.
    pub fn set_partitioned(&self, node_name: &str, partitioned: bool) {
        let mut nodes = self.partitioned.write();
        if partitioned {
            nodes.insert(node_name.to_string());
        } else {
            nodes.remove(node_name);
        }
    }

    /// Number of live subscriptions on the bus.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    fn is_partitioned(&self, node_name: &str) -> bool {
        self.partitioned.read().contains(node_name)
    }

    fn publish(
        &self,
        origin: &NodeInfo,
        channel: &str,
        event: &E,
        ignore_sender: bool,
        dc_notify: DcNotify,
    ) -> Result<usize> {
        if self.is_partitioned(&origin.name) {
            return Err(CacheError::Propagation {
                channel: channel.to_string(),
                reason: format!("node {origin} is partitioned from the cluster"),
            });
        }

        let listeners: Vec<Listener<E>> = {
            let partitioned = self.partitioned.read();
            self.subscriptions
                .read()
                .iter()
                .filter(|sub| sub.channel == channel)
                .filter(|sub| !partitioned.contains(&sub.node.name))
                .filter(|sub| sub.node.accepts(origin, ignore_sender, dc_notify))
                .map(|sub| Arc::clone(&sub.listener))
                .collect()
        };

        for listener in &listeners {
            listener(event);
        }
        Ok(listeners.len())
    }
}

/// Handle of one node on a [`ClusterBus`].
pub struct ClusterNode<E> {
    bus: Arc<ClusterBus<E>>,
    info: NodeInfo,
}

impl<E> ClusterNode<E> {
    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    /// Registers `listener` for events published on `channel`.
    pub fn subscribe<F>(&self, channel: &str, listener: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.bus.subscriptions.write().push(Subscription {
            node: self.info.clone(),
            channel: channel.to_string(),
            listener: Arc::new(listener),
        });
    }

    /// Removes every subscription of this node.
    pub fn leave(&self) {
        self.bus
            .subscriptions
            .write()
            .retain(|sub| sub.node != self.info);
    }
}

impl<E> ClusterNode<E>
where
    E: Debug + Send + Sync + 'static,
{
    /// Feeds events received on `channel` into `manager`.
    ///
    /// The subscription only holds a weak reference, so it does not keep the
    /// manager (and through it this node) alive.
    pub fn subscribe_manager(&self, channel: &str, manager: &Arc<CacheManager<E>>) {
        let manager: Weak<CacheManager<E>> = Arc::downgrade(manager);
        self.subscribe(channel, move |event: &E| {
            if let Some(manager) = manager.upgrade() {
                manager.invalidation_event_received(event);
            }
        });
    }
}

impl<E> InvalidationPropagator<E> for ClusterNode<E> {
    fn notify(
        &self,
        channel: &str,
        event: &E,
        ignore_sender: bool,
        dc_notify: DcNotify,
    ) -> Result<()> {
        self.bus
            .publish(&self.info, channel, event, ignore_sender, dc_notify)
            .map(|_| ())
    }
}

impl<E> std::fmt::Debug for ClusterNode<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterNode").field("info", &self.info).finish()
    }
}

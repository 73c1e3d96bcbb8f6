//! # Revcache Async
//!
//! Tokio transport for revcache invalidation events.
//!
//! All nodes of a cluster share one [`BroadcastTransport`]. Each node publishes
//! through a [`BroadcastPropagator`] and consumes through an
//! [`InvalidationListener`], a background task that feeds every event meant
//! for the node into its [`CacheManager`].
//!
//! ## How It Works
//!
//! ```text
//! node1: invalidate_object("u1") + send_invalidation_events(["u1"])
//!   ↓
//! broadcast channel: Envelope { channel, origin: node1, event: "u1", .. }
//!   ↓
//! node2 listener: accepted → invalidation_event_received("u1")
//! node1 listener: dropped (ignore_sender)
//! ```
//!
//! ## Delivery
//!
//! Delivery is best effort. A listener that falls more than the channel
//! capacity behind skips the missed events with a warning; the affected keys
//! stay cached on that node until their lifespan runs out or they are written
//! again.
//!
//! ## Example
//!
//! ```rust
//! use revcache_async::BroadcastTransport;
//! use revcache_core::{CacheConfig, KeyEventTranslator, Versioned};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = BroadcastTransport::<String>::new(64);
//!     let (node1, _) = transport
//!         .connect("node1", "dc1", "users", CacheConfig::new("users"), KeyEventTranslator)
//!         .unwrap();
//!     let (node2, _) = transport
//!         .connect("node2", "dc1", "users", CacheConfig::new("users"), KeyEventTranslator)
//!         .unwrap();
//!
//!     let start = node1.current_counter();
//!     node1
//!         .add_revisioned(Arc::new(Versioned::new("u1", start, ())), start)
//!         .unwrap();
//!
//!     node2.invalidate_object("u1").unwrap();
//!     node2.send_invalidation_events(&["u1".to_string()], "users", None);
//!
//!     tokio::time::sleep(Duration::from_millis(50)).await;
//!     assert!(node1.get_revisioned("u1").unwrap().is_none());
//! }
//! ```

use revcache_core::{
    CacheConfig, CacheManager, DcNotify, EventTranslator, InvalidationPropagator, NodeInfo,
    Result,
};
use std::fmt::Debug;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default number of in-flight events a listener may fall behind by.
pub const DEFAULT_CAPACITY: usize = 1024;

/// An invalidation event on the wire, with its routing metadata.
#[derive(Debug, Clone)]
pub struct Envelope<E> {
    pub channel: String,
    pub origin: NodeInfo,
    pub event: E,
    pub ignore_sender: bool,
    pub dc_notify: DcNotify,
}

/// Broadcast channel shared by every node of a cluster.
#[derive(Debug, Clone)]
pub struct BroadcastTransport<E> {
    tx: broadcast::Sender<Envelope<E>>,
}

impl<E> BroadcastTransport<E>
where
    E: Clone + Debug + Send + Sync + 'static,
{
    /// Creates a transport buffering up to `capacity` events per listener.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns a propagator publishing as node `name` in `site`.
    pub fn propagator(&self, name: impl Into<String>, site: impl Into<String>) -> BroadcastPropagator<E> {
        BroadcastPropagator {
            tx: self.tx.clone(),
            node: NodeInfo::new(name, site),
        }
    }

    /// Creates a listener for `node` that feeds `channel` into `manager`.
    ///
    /// The listener is subscribed immediately: events published after this
    /// call are buffered until [`InvalidationListener::start`] runs it.
    pub fn listener(
        &self,
        node: NodeInfo,
        channel: impl Into<String>,
        manager: &Arc<CacheManager<E>>,
    ) -> InvalidationListener<E> {
        InvalidationListener {
            node,
            channel: channel.into(),
            rx: self.tx.subscribe(),
            manager: Arc::downgrade(manager),
        }
    }

    /// Builds a cache manager for node `name` and starts its listener.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect<T>(
        &self,
        name: &str,
        site: &str,
        channel: &str,
        config: CacheConfig,
        translator: T,
    ) -> Result<(Arc<CacheManager<E>>, JoinHandle<()>)>
    where
        T: EventTranslator<E> + 'static,
    {
        let manager = Arc::new(CacheManager::local(
            config.with_node(name),
            translator,
            self.propagator(name, site),
        )?);
        let handle = self
            .listener(NodeInfo::new(name, site), channel, &manager)
            .start();
        Ok((manager, handle))
    }

    /// Number of listeners currently subscribed.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Publishes invalidation events on a [`BroadcastTransport`].
#[derive(Debug, Clone)]
pub struct BroadcastPropagator<E> {
    tx: broadcast::Sender<Envelope<E>>,
    node: NodeInfo,
}

impl<E> BroadcastPropagator<E> {
    pub fn node(&self) -> &NodeInfo {
        &self.node
    }
}

impl<E> InvalidationPropagator<E> for BroadcastPropagator<E>
where
    E: Clone + Debug + Send + Sync + 'static,
{
    fn notify(
        &self,
        channel: &str,
        event: &E,
        ignore_sender: bool,
        dc_notify: DcNotify,
    ) -> Result<()> {
        let envelope = Envelope {
            channel: channel.to_string(),
            origin: self.node.clone(),
            event: event.clone(),
            ignore_sender,
            dc_notify,
        };

        match self.tx.send(envelope) {
            Ok(receivers) => {
                debug!(node = %self.node, channel = %channel, receivers, "Broadcast invalidation event");
            }
            Err(_) => {
                // No listener running anywhere, nothing to invalidate
                debug!(node = %self.node, channel = %channel, "No receivers for invalidation event");
            }
        }
        Ok(())
    }
}

/// Background consumer of a node's invalidation events.
pub struct InvalidationListener<E> {
    node: NodeInfo,
    channel: String,
    rx: broadcast::Receiver<Envelope<E>>,
    manager: Weak<CacheManager<E>>,
}

impl<E> InvalidationListener<E>
where
    E: Clone + Debug + Send + Sync + 'static,
{
    /// Spawns the listener on the current Tokio runtime.
    ///
    /// The task ends when the transport is closed or the cache manager is
    /// dropped. Lagging behind the channel drops the missed events with a
    /// warning and keeps listening.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        info!(node = %self.node, channel = %self.channel, "Listening for invalidation events");

        loop {
            match self.rx.recv().await {
                Ok(envelope) => {
                    if !self.accepts(&envelope) {
                        continue;
                    }
                    let Some(manager) = self.manager.upgrade() else {
                        debug!(node = %self.node, "Cache manager dropped, stopping listener");
                        break;
                    };
                    manager.invalidation_event_received(&envelope.event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        node = %self.node,
                        channel = %self.channel,
                        skipped,
                        "Invalidation listener lagged, some events were dropped"
                    );
                }
                Err(RecvError::Closed) => {
                    info!(node = %self.node, channel = %self.channel, "Invalidation channel closed");
                    break;
                }
            }
        }
    }

    fn accepts(&self, envelope: &Envelope<E>) -> bool {
        envelope.channel == self.channel
            && self
                .node
                .accepts(&envelope.origin, envelope.ignore_sender, envelope.dc_notify)
    }
}

impl<E> Debug for InvalidationListener<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvalidationListener")
            .field("node", &self.node)
            .field("channel", &self.channel)
            .finish()
    }
}

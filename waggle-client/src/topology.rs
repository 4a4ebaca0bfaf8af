//! Client-side view of the cluster topology.
//!
//! The topology view is a cached directory from (topic, partition) to the
//! broker currently leading that partition. Reads are synchronous and may
//! be stale; correctness is restored by the controller's refresh-and-retry
//! loop. [`TopologyView::refresh_now`] is non-blocking and hands back a
//! [`RefreshHandle`] the controller polls.
//!
//! The discovery protocol that actually repopulates the directory lives
//! outside this crate; [`StaticTopology`] is the shipped reference
//! implementation with an instantly-successful refresh, suitable for fixed
//! clusters and tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use rand::seq::IndexedRandom;

use crate::addr::BrokerAddress;

/// Errors reported by a topology refresh.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    /// The refresh could not complete.
    #[error("{message}")]
    RefreshFailed {
        /// Details reported by the discovery mechanism.
        message: String,
    },
}

/// Directory from logical destination to broker address.
pub trait TopologyView {
    /// The broker currently leading `partition_id` of `topic`, if known.
    ///
    /// `None` means "unknown — refresh and retry".
    fn leader_for(&self, topic: &str, partition_id: u16) -> Option<BrokerAddress>;

    /// Any known broker, chosen arbitrarily. Used by requests that every
    /// node can answer (e.g. topology discovery itself).
    fn any_broker(&self) -> Option<BrokerAddress>;

    /// Schedule a topology refresh and return its completion handle.
    ///
    /// Must not block; completion is observed by polling the handle.
    fn refresh_now(&self) -> RefreshHandle;
}

type RefreshState = Rc<RefCell<Option<Result<(), TopologyError>>>>;

/// Completion handle for an in-flight topology refresh.
#[derive(Clone)]
pub struct RefreshHandle {
    state: RefreshState,
}

impl RefreshHandle {
    /// A handle that is already complete with `result`.
    pub fn ready(result: Result<(), TopologyError>) -> Self {
        Self {
            state: Rc::new(RefCell::new(Some(result))),
        }
    }

    /// A pending handle plus the completer that will resolve it.
    pub fn pending() -> (RefreshCompleter, RefreshHandle) {
        let state: RefreshState = Rc::new(RefCell::new(None));
        (
            RefreshCompleter {
                state: Rc::clone(&state),
            },
            RefreshHandle { state },
        )
    }

    /// Whether the refresh has completed (successfully or not).
    pub fn is_done(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// The refresh outcome, once done.
    pub fn result(&self) -> Option<Result<(), TopologyError>> {
        self.state.borrow().clone()
    }
}

/// Resolves the paired [`RefreshHandle`]. Consumed on completion.
pub struct RefreshCompleter {
    state: RefreshState,
}

impl RefreshCompleter {
    /// Complete the refresh with `result`.
    pub fn complete(self, result: Result<(), TopologyError>) {
        *self.state.borrow_mut() = Some(result);
    }
}

/// A fixed-membership topology with a hand-maintained leader table.
///
/// Refreshes complete immediately and successfully; the table only changes
/// through [`StaticTopology::set_leader`] / [`StaticTopology::clear_leader`].
/// This is the reference [`TopologyView`] for fixed clusters and the test
/// substrate for everything that consumes one.
pub struct StaticTopology {
    inner: RefCell<Table>,
}

struct Table {
    leaders: HashMap<(String, u16), BrokerAddress>,
    brokers: Vec<BrokerAddress>,
    refresh_count: u64,
}

impl StaticTopology {
    /// Create a topology over a fixed broker set with no known leaders.
    pub fn new(brokers: Vec<BrokerAddress>) -> Self {
        Self {
            inner: RefCell::new(Table {
                leaders: HashMap::new(),
                brokers,
                refresh_count: 0,
            }),
        }
    }

    /// Record `addr` as the leader of `partition_id` on `topic`.
    ///
    /// The broker is added to the member set if it is not known yet.
    pub fn set_leader(&self, topic: impl Into<String>, partition_id: u16, addr: BrokerAddress) {
        let mut table = self.inner.borrow_mut();
        if !table.brokers.contains(&addr) {
            table.brokers.push(addr.clone());
        }
        table.leaders.insert((topic.into(), partition_id), addr);
    }

    /// Forget the leader of `partition_id` on `topic`.
    pub fn clear_leader(&self, topic: &str, partition_id: u16) {
        self.inner
            .borrow_mut()
            .leaders
            .remove(&(topic.to_string(), partition_id));
    }

    /// Number of refreshes requested so far.
    pub fn refresh_count(&self) -> u64 {
        self.inner.borrow().refresh_count
    }
}

impl TopologyView for StaticTopology {
    fn leader_for(&self, topic: &str, partition_id: u16) -> Option<BrokerAddress> {
        self.inner
            .borrow()
            .leaders
            .get(&(topic.to_string(), partition_id))
            .cloned()
    }

    fn any_broker(&self) -> Option<BrokerAddress> {
        self.inner
            .borrow()
            .brokers
            .choose(&mut rand::rng())
            .cloned()
    }

    fn refresh_now(&self) -> RefreshHandle {
        self.inner.borrow_mut().refresh_count += 1;
        tracing::debug!("static topology refresh requested");
        RefreshHandle::ready(Ok(()))
    }
}

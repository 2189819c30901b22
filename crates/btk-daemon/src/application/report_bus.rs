//! ReportBus: fan-out of reports to every active session.
//!
//! Each session registers one bounded [`ReportQueue`].  The bus keeps the
//! queues it delivers to (membership); the session owns the receiving side
//! and the [`BusRegistration`] guard whose drop removes the queue again.  A
//! session is deregistered however it ends, cancellation included.
//!
//! `publish` never waits.  A report published while no session is active is
//! dropped; it is not buffered for future connections.
//!
//! # Overflow
//!
//! A host that stops reading its interrupt channel would make its queue grow
//! without limit, so queues are bounded.  What happens to a full queue is
//! chosen by [`OverflowPolicy`].  Every report is a complete snapshot of the
//! input state, so the newest report is never the one given up.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use btk_core::Report;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{watch, Notify};
use tracing::{trace, warn};
use uuid::Uuid;

/// Unique identifier of one client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first group is enough to tell sessions apart in logs.
        let s = self.0.simple().to_string();
        f.write_str(&s[..8])
    }
}

/// What `publish` does with a queue that is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the queue.  Its pending reports are discarded and the session
    /// is told to end at once, so the host sees the peripheral disconnect.
    #[default]
    Disconnect,
    /// Discard the oldest queued report to make room and keep the session.
    DropOldest,
}

/// Why [`ReportQueue::try_recv`] returned no report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TryRecvError {
    #[error("queue is empty")]
    Empty,
    #[error("queue was removed from the bus")]
    Closed,
    #[error("queue overflowed and was evicted")]
    Evicted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueStatus {
    Open,
    Closed,
    Evicted,
}

struct QueueState {
    reports: VecDeque<Report>,
    status: QueueStatus,
}

/// Outcome of offering one report to one queue.
enum Push {
    Delivered,
    DroppedOldest,
    Evicted,
    Detached,
}

struct SharedQueue {
    capacity: usize,
    state: Mutex<QueueState>,
    ready: Notify,
    evicted: watch::Sender<bool>,
}

impl SharedQueue {
    fn new(capacity: usize) -> Self {
        let (evicted, _) = watch::channel(false);
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(QueueState {
                reports: VecDeque::with_capacity(capacity.clamp(1, 1024)),
                status: QueueStatus::Open,
            }),
            ready: Notify::new(),
            evicted,
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, report: Report, policy: OverflowPolicy) -> Push {
        let mut state = self.state();
        if state.status != QueueStatus::Open {
            return Push::Detached;
        }

        let outcome = if state.reports.len() < self.capacity {
            state.reports.push_back(report);
            Push::Delivered
        } else {
            match policy {
                OverflowPolicy::Disconnect => {
                    state.status = QueueStatus::Evicted;
                    state.reports.clear();
                    Push::Evicted
                }
                OverflowPolicy::DropOldest => {
                    state.reports.pop_front();
                    state.reports.push_back(report);
                    Push::DroppedOldest
                }
            }
        };
        drop(state);

        self.ready.notify_one();
        if matches!(outcome, Push::Evicted) {
            self.evicted.send_replace(true);
        }
        outcome
    }

    fn close(&self) {
        let mut state = self.state();
        if state.status == QueueStatus::Open {
            state.status = QueueStatus::Closed;
        }
        drop(state);
        self.ready.notify_one();
    }
}

/// Receiving side of one session's queue.
///
/// Reports come out in publish order.  Once the queue is removed from the
/// bus the remaining reports are still handed out; once it is evicted for
/// overflowing, nothing more is.
pub struct ReportQueue {
    shared: Arc<SharedQueue>,
}

impl ReportQueue {
    /// Waits for the next report.  Returns `None` once the queue is
    /// closed and drained, or as soon as it is evicted.
    pub async fn recv(&mut self) -> Option<Report> {
        loop {
            match self.try_recv() {
                Ok(report) => return Some(report),
                Err(TryRecvError::Empty) => self.shared.ready.notified().await,
                Err(TryRecvError::Closed | TryRecvError::Evicted) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Result<Report, TryRecvError> {
        let mut state = self.shared.state();
        if state.status == QueueStatus::Evicted {
            return Err(TryRecvError::Evicted);
        }
        match state.reports.pop_front() {
            Some(report) => Ok(report),
            None if state.status == QueueStatus::Closed => Err(TryRecvError::Closed),
            None => Err(TryRecvError::Empty),
        }
    }

    /// Returns `true` if the bus evicted this queue for overflowing.
    pub fn is_evicted(&self) -> bool {
        self.shared.state().status == QueueStatus::Evicted
    }

    /// A handle that resolves when this queue is evicted.
    pub fn eviction(&self) -> Eviction {
        Eviction {
            rx: self.shared.evicted.subscribe(),
        }
    }
}

impl Drop for ReportQueue {
    fn drop(&mut self) {
        let mut state = self.shared.state();
        if state.status == QueueStatus::Open {
            state.status = QueueStatus::Closed;
        }
    }
}

/// Resolves when the bus evicts the queue it was taken from.
pub struct Eviction {
    rx: watch::Receiver<bool>,
}

impl Eviction {
    /// Waits for eviction.  Never resolves for a queue that is not evicted.
    pub async fn wait(mut self) {
        if self.rx.wait_for(|evicted| *evicted).await.is_ok() {
            return;
        }
        std::future::pending::<()>().await
    }
}

struct BusInner {
    queues: Mutex<HashMap<SessionId, Arc<SharedQueue>>>,
    policy: OverflowPolicy,
}

impl BusInner {
    fn queues(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<SharedQueue>>> {
        // Critical sections never panic, but recover rather than propagate.
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: SessionId) -> bool {
        match self.queues().remove(&id) {
            Some(queue) => {
                queue.close();
                true
            }
            None => false,
        }
    }
}

/// The set of active outbound queues.
///
/// Cloning is cheap; clones share the same set.
#[derive(Clone)]
pub struct ReportBus {
    inner: Arc<BusInner>,
}

impl ReportBus {
    /// Creates an empty bus.
    pub fn new(policy: OverflowPolicy) -> Self {
        Self {
            inner: Arc::new(BusInner {
                queues: Mutex::new(HashMap::new()),
                policy,
            }),
        }
    }

    /// Registers a new queue of `capacity` reports for session `id`.
    ///
    /// Returns the membership guard and the receiving half of the queue.
    /// Registering an id that is already present closes the old queue.
    pub fn register(&self, id: SessionId, capacity: usize) -> (BusRegistration, ReportQueue) {
        let shared = Arc::new(SharedQueue::new(capacity));
        if let Some(old) = self.inner.queues().insert(id, Arc::clone(&shared)) {
            old.close();
        }
        let registration = BusRegistration {
            id,
            bus: Arc::downgrade(&self.inner),
        };
        (registration, ReportQueue { shared })
    }

    /// Removes the queue of session `id`.  Returns `false` if it was not registered.
    pub fn deregister(&self, id: SessionId) -> bool {
        self.inner.remove(id)
    }

    /// Delivers `report` to the tail of every registered queue.
    ///
    /// Never blocks.  Returns the number of queues that now hold the report.
    pub fn publish(&self, report: Report) -> usize {
        let mut queues = self.inner.queues();
        if queues.is_empty() {
            trace!("no active sessions; report dropped");
            return 0;
        }

        let mut delivered = 0;
        let mut removed = Vec::new();
        for (id, queue) in queues.iter() {
            match queue.push(report, self.inner.policy) {
                Push::Delivered => delivered += 1,
                Push::DroppedOldest => {
                    warn!("session {id}: outbound queue full; oldest report dropped");
                    delivered += 1;
                }
                Push::Evicted => {
                    warn!("session {id}: outbound queue full; disconnecting");
                    removed.push(*id);
                }
                Push::Detached => removed.push(*id),
            }
        }
        for id in removed {
            queues.remove(&id);
        }
        delivered
    }

    /// Number of registered queues.
    pub fn len(&self) -> usize {
        self.inner.queues().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if session `id` currently has a queue on the bus.
    pub fn contains(&self, id: SessionId) -> bool {
        self.inner.queues().contains_key(&id)
    }
}

/// Membership of one queue in a [`ReportBus`]; deregisters on drop.
pub struct BusRegistration {
    id: SessionId,
    bus: Weak<BusInner>,
}

impl BusRegistration {
    pub fn id(&self) -> SessionId {
        self.id
    }
}

impl Drop for BusRegistration {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.remove(self.id);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use btk_core::{KeyboardReport, PointerReport};

    fn pointer(dx: i32) -> Report {
        PointerReport::new(0, dx, 0, 0).into()
    }

    #[test]
    fn test_publish_with_no_queues_drops_silently() {
        // Arrange
        let bus = ReportBus::new(OverflowPolicy::default());

        // Act
        let delivered = bus.publish(pointer(1));

        // Assert
        assert_eq!(delivered, 0);
        assert!(bus.is_empty());
    }

    #[test]
    fn test_publish_reaches_every_queue_in_order() {
        // Arrange
        let bus = ReportBus::new(OverflowPolicy::default());
        let (_reg_a, mut rx_a) = bus.register(SessionId::new(), 8);
        let (_reg_b, mut rx_b) = bus.register(SessionId::new(), 8);
        let (_reg_c, mut rx_c) = bus.register(SessionId::new(), 8);

        // Act
        for dx in 1..=3 {
            assert_eq!(bus.publish(pointer(dx)), 3);
        }

        // Assert
        for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
            for dx in 1..=3 {
                assert_eq!(rx.try_recv().unwrap(), pointer(dx));
            }
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn test_report_published_before_registration_is_not_replayed() {
        let bus = ReportBus::new(OverflowPolicy::default());
        bus.publish(pointer(9));

        let (_reg, mut rx) = bus.register(SessionId::new(), 8);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropping_registration_deregisters() {
        // Arrange
        let bus = ReportBus::new(OverflowPolicy::default());
        let id = SessionId::new();
        let (reg, _rx) = bus.register(id, 8);
        assert!(bus.contains(id));

        // Act
        drop(reg);

        // Assert
        assert!(!bus.contains(id));
        assert_eq!(bus.publish(pointer(1)), 0);
    }

    #[test]
    fn test_closing_one_queue_keeps_others_delivering() {
        // Arrange
        let bus = ReportBus::new(OverflowPolicy::default());
        let (reg_a, rx_a) = bus.register(SessionId::new(), 8);
        let (_reg_b, mut rx_b) = bus.register(SessionId::new(), 8);

        // Act
        drop(rx_a);
        drop(reg_a);
        let delivered = bus.publish(pointer(4));

        // Assert
        assert_eq!(delivered, 1);
        assert_eq!(rx_b.try_recv().unwrap(), pointer(4));
    }

    #[test]
    fn test_closed_receiver_is_evicted_on_publish() {
        let bus = ReportBus::new(OverflowPolicy::default());
        let id = SessionId::new();
        let (_reg, rx) = bus.register(id, 8);
        drop(rx);

        assert_eq!(bus.publish(pointer(1)), 0);
        assert!(!bus.contains(id));
    }

    #[test]
    fn test_full_queue_is_evicted_under_disconnect_policy() {
        // Arrange
        let bus = ReportBus::new(OverflowPolicy::Disconnect);
        let slow = SessionId::new();
        let (_reg_slow, mut rx_slow) = bus.register(slow, 2);
        let (_reg_fast, mut rx_fast) = bus.register(SessionId::new(), 16);
        let eviction = rx_slow.eviction();

        // Act – third report overflows the slow queue
        for dx in 1..=3 {
            bus.publish(pointer(dx));
        }

        // Assert
        assert!(!bus.contains(slow));
        assert_eq!(bus.len(), 1);
        assert!(rx_slow.is_evicted());
        // Pending reports are discarded, not drained.
        assert_eq!(rx_slow.try_recv(), Err(TryRecvError::Evicted));
        assert_eq!(rx_fast.try_recv().unwrap(), pointer(1));
        tokio_test::block_on(eviction.wait());
    }

    #[test]
    fn test_deregistered_queue_still_hands_out_pending_reports() {
        let bus = ReportBus::new(OverflowPolicy::Disconnect);
        let id = SessionId::new();
        let (_reg, mut rx) = bus.register(id, 4);
        bus.publish(pointer(1));

        assert!(bus.deregister(id));

        assert_eq!(rx.try_recv().unwrap(), pointer(1));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Closed));
        assert!(!rx.is_evicted());
    }

    #[test]
    fn test_full_queue_drops_oldest_under_drop_oldest_policy() {
        // Arrange
        let bus = ReportBus::new(OverflowPolicy::DropOldest);
        let id = SessionId::new();
        let (_reg, mut rx) = bus.register(id, 2);

        // Act
        for dx in 1..=4 {
            assert_eq!(bus.publish(pointer(dx)), 1);
        }

        // Assert – the newest reports survive, in order
        assert!(bus.contains(id));
        assert_eq!(rx.try_recv().unwrap(), pointer(3));
        assert_eq!(rx.try_recv().unwrap(), pointer(4));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn test_drop_oldest_keeps_final_key_release() {
        // Arrange – a queue with room for one report that is never read
        let bus = ReportBus::new(OverflowPolicy::DropOldest);
        let (_reg, mut rx) = bus.register(SessionId::new(), 1);
        let press: Report = KeyboardReport::new(0, &[0x04]).into();
        let release: Report = KeyboardReport::new(0, &[]).into();

        // Act
        bus.publish(press);
        bus.publish(release);

        // Assert – the host is never left holding the key
        assert_eq!(rx.try_recv().unwrap(), release);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_recv_wakes_on_publish() {
        let bus = ReportBus::new(OverflowPolicy::default());
        let (_reg, mut rx) = bus.register(SessionId::new(), 4);
        let waiter = tokio::spawn(async move { rx.recv().await });
        tokio::task::yield_now().await;

        bus.publish(pointer(7));

        assert_eq!(waiter.await.unwrap(), Some(pointer(7)));
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_registration_dropped() {
        let bus = ReportBus::new(OverflowPolicy::default());
        let (reg, mut rx) = bus.register(SessionId::new(), 4);
        let waiter = tokio::spawn(async move { rx.recv().await });
        tokio::task::yield_now().await;

        drop(reg);

        assert_eq!(waiter.await.unwrap(), None);
    }

    #[test]
    fn test_zero_capacity_is_clamped_to_one() {
        let bus = ReportBus::new(OverflowPolicy::default());
        let (_reg, mut rx) = bus.register(SessionId::new(), 0);
        let report: Report = KeyboardReport::new(0, &[]).into();
        assert_eq!(bus.publish(report), 1);
        assert_eq!(rx.try_recv().unwrap(), report);
    }

    #[test]
    fn test_registration_outliving_bus_is_harmless() {
        let bus = ReportBus::new(OverflowPolicy::default());
        let (reg, _rx) = bus.register(SessionId::new(), 1);
        drop(bus);
        drop(reg);
    }

    #[test]
    fn test_overflow_policy_deserializes_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: OverflowPolicy,
        }
        let w: Wrapper = toml::from_str("policy = \"drop_oldest\"").unwrap();
        assert_eq!(w.policy, OverflowPolicy::DropOldest);
    }
}

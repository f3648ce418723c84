use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::domain::entities::notification::Notification;

/// Per-recipient FIFO delivery queue. Producers enqueue without blocking;
/// the session task draining the receiver observes publish order.
pub struct UserQueue {
    tx: UnboundedSender<Notification>,
    rx: tokio::sync::Mutex<UnboundedReceiver<Notification>>,
}

impl UserQueue {
    fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
        })
    }

    pub async fn recv(&self) -> Option<Notification> {
        self.rx.lock().await.recv().await
    }

    /// Non-blocking drain step; `None` when the queue is currently empty
    /// or another consumer holds the receiver.
    pub fn try_recv(&self) -> Option<Notification> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}

/// Process-wide registry mapping a recipient id to their delivery queue.
/// Injected through `AppState`; the mutex guards registry mutation only,
/// enqueue/dequeue on an individual queue never take it.
#[derive(Default)]
pub struct NotificationHub {
    queues: Mutex<HashMap<Uuid, Arc<UserQueue>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: a recipient that already has a queue gets the same one
    /// back, so concurrent sessions of one user share a single FIFO.
    pub fn acquire(&self, user_id: Uuid) -> Arc<UserQueue> {
        self.queues
            .lock()
            .unwrap()
            .entry(user_id)
            .or_insert_with(UserQueue::new)
            .clone()
    }

    /// Session end. Publishes after removal are dropped, not buffered.
    pub fn remove(&self, user_id: Uuid) {
        self.queues.lock().unwrap().remove(&user_id);
    }

    /// Targeted notifications go to the recipient's queue if registered;
    /// global ones fan out to every registered queue; anything else is
    /// dropped. Never errors, never blocks on a slow consumer.
    pub fn publish(&self, notification: &Notification) {
        let targets: Vec<Arc<UserQueue>> = {
            let queues = self.queues.lock().unwrap();
            if let Some(user_id) = notification.user_id {
                queues.get(&user_id).cloned().into_iter().collect()
            } else if notification.global {
                queues.values().cloned().collect()
            } else {
                Vec::new()
            }
        };

        for queue in targets {
            // A receiver dropped between snapshot and send is a removed
            // session; dropping the message is the contract.
            let _ = queue.tx.send(notification.clone());
        }
    }

    pub fn registered_count(&self) -> usize {
        self.queues.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::notification::NotificationKind;

    fn info(user_id: Uuid) -> Notification {
        Notification::to_user(user_id, NotificationKind::Info, "title", "body")
    }

    #[tokio::test]
    async fn global_publish_reaches_every_registered_queue_once() {
        let hub = NotificationHub::new();
        let users: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let queues: Vec<_> = users.iter().map(|u| hub.acquire(*u)).collect();

        hub.publish(&Notification::broadcast(
            NotificationKind::Info,
            "maintenance",
            "tonight",
        ));

        for queue in &queues {
            assert_eq!(queue.try_recv().unwrap().title, "maintenance");
            assert!(queue.try_recv().is_none(), "exactly one message per queue");
        }

        // A queue registered only after the publish saw nothing.
        let late = hub.acquire(Uuid::new_v4());
        assert!(late.try_recv().is_none());
    }

    #[tokio::test]
    async fn targeted_publish_without_queue_is_dropped_silently() {
        let hub = NotificationHub::new();
        hub.publish(&info(Uuid::new_v4()));
        assert_eq!(hub.registered_count(), 0);
    }

    #[tokio::test]
    async fn publishes_after_remove_are_dropped() {
        let hub = NotificationHub::new();
        let user_id = Uuid::new_v4();
        let queue = hub.acquire(user_id);

        hub.publish(&info(user_id));
        assert!(queue.try_recv().is_some());

        hub.remove(user_id);
        hub.publish(&info(user_id));
        assert_eq!(hub.registered_count(), 0);

        // Re-acquiring creates a fresh queue with no buffered backlog.
        let fresh = hub.acquire(user_id);
        assert!(fresh.try_recv().is_none());
    }

    #[tokio::test]
    async fn acquire_is_idempotent() {
        let hub = NotificationHub::new();
        let user_id = Uuid::new_v4();
        let a = hub.acquire(user_id);
        let b = hub.acquire(user_id);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(hub.registered_count(), 1);
    }

    #[tokio::test]
    async fn consumption_order_matches_publish_order() {
        let hub = NotificationHub::new();
        let user_id = Uuid::new_v4();
        let queue = hub.acquire(user_id);

        for i in 0..5 {
            hub.publish(&Notification::to_user(
                user_id,
                NotificationKind::Info,
                &format!("n{i}"),
                "",
            ));
        }

        for i in 0..5 {
            assert_eq!(queue.recv().await.unwrap().title, format!("n{i}"));
        }
    }
}

//! Best-effort fan-out of [`EngineEvent`] to live observers.
//!
//! The engine publishes from inside a walk and never waits on observers:
//! delivery is `tokio::sync::broadcast`, so a slow subscriber lags rather
//! than stalling the walk, and events published with nobody listening are
//! dropped. Observers (the CLI spinner, log sinks) subscribe before kicking
//! off the walk they care about; a receiver only sees events published after
//! it subscribed.

use queryloom_types::event::EngineEvent;
use tokio::sync::broadcast;

/// Handle for publishing and subscribing to engine lifecycle events.
///
/// Clones share one channel, so the engine and any number of front-ends can
/// hold the same bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// A bus able to buffer `capacity` events per lagging subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Open a receiver for all events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Send `event` to every live subscriber; a no-op without any.
    pub fn publish(&self, event: EngineEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn started(thread_id: Uuid) -> EngineEvent {
        EngineEvent::ThreadStarted {
            thread_id,
            node: "gateway".to_string(),
        }
    }

    #[tokio::test]
    async fn delivers_to_every_subscriber() {
        let bus = EventBus::new(16);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        let thread_id = Uuid::now_v7();

        bus.publish(started(thread_id));

        for rx in [&mut first, &mut second] {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.thread_id(), thread_id);
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_dropped() {
        let bus = EventBus::new(16);
        bus.publish(started(Uuid::now_v7()));

        // Nothing buffered for later subscribers either.
        let mut late = bus.subscribe();
        assert!(matches!(
            late.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn subscriber_only_sees_events_after_subscribing() {
        let bus = EventBus::new(16);
        let mut early = bus.subscribe();
        bus.publish(started(Uuid::now_v7()));

        let mut late = bus.subscribe();
        let after = Uuid::now_v7();
        bus.publish(started(after));

        // Early receiver has both; late receiver starts at the second.
        early.recv().await.unwrap();
        early.recv().await.unwrap();
        assert_eq!(late.recv().await.unwrap().thread_id(), after);
    }

    #[tokio::test]
    async fn interleaved_walks_arrive_in_publish_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

        bus.publish(started(a));
        bus.publish(started(b));
        bus.publish(started(a));

        let order: Vec<Uuid> = [
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ]
        .iter()
        .map(EngineEvent::thread_id)
        .collect();
        assert_eq!(order, vec![a, b, a]);
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for _ in 0..8 {
            bus.publish(started(Uuid::now_v7()));
        }

        match rx.try_recv() {
            Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn clones_share_one_channel() {
        let bus = EventBus::new(16);
        let publisher = bus.clone();
        let mut rx = bus.subscribe();

        publisher.publish(started(Uuid::now_v7()));
        assert!(rx.try_recv().is_ok());
    }
}

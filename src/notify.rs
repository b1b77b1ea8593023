use tokio::sync::broadcast;

use crate::model::ScheduleEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for committed schedule changes. Calendar views refresh from
/// it; notification senders pick up bookings and cancellations. One channel
/// covers the whole warehouse.
pub struct NotifyHub {
    tx: broadcast::Sender<ScheduleEvent>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            tx: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScheduleEvent> {
        self.tx.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, event: &ScheduleEvent) {
        let _ = self.tx.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ulid::Ulid;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe();

        let event = ScheduleEvent::AppointmentCancelled {
            id: Ulid::new(),
            at: Utc::now(),
        };
        hub.send(&event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        // no subscriber, must not panic
        hub.send(&ScheduleEvent::ShiftDeleted { id: Ulid::new() });
    }
}

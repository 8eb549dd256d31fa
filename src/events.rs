use serde::Serialize;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 64;

/// Why the calendar should re-fetch its events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalendarRefresh {
    Saved { appointment_id: i64 },
    Scheduled { appointment_id: i64 },
    Deleted { appointment_id: i64 },
    /// Cascade: the client's appointments went with it.
    ClientRemoved { client_id: i64 },
    DogRemoved { dog_id: i64 },
}

/// Fan-out of calendar refresh signals to every open calendar stream.
#[derive(Clone)]
pub struct CalendarBus {
    sender: broadcast::Sender<CalendarRefresh>,
}

impl CalendarBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Dropped silently when no calendar is open.
    pub fn publish(&self, event: CalendarRefresh) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CalendarRefresh> {
        self.sender.subscribe()
    }
}

impl Default for CalendarBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_receive_published_events() {
        let bus = CalendarBus::default();
        let mut rx = bus.subscribe();
        bus.publish(CalendarRefresh::Scheduled { appointment_id: 7 });
        assert_eq!(rx.try_recv().unwrap(), CalendarRefresh::Scheduled { appointment_id: 7 });
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        CalendarBus::default().publish(CalendarRefresh::Deleted { appointment_id: 1 });
    }

    #[test]
    fn cascade_events_serialize() {
        let json = serde_json::to_value(CalendarRefresh::DogRemoved { dog_id: 4 }).unwrap();
        assert_eq!(json["kind"], "dog_removed");
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(CalendarRefresh::Saved { appointment_id: 3 }).unwrap();
        assert_eq!(json["kind"], "saved");
        assert_eq!(json["appointment_id"], 3);
    }
}

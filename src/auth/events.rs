use futures::stream::Stream;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

const CHANNEL_CAPACITY: usize = 256;

/// A change to someone's session or profile, pushed to their open clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    SignedIn { user_id: String },
    SignedOut { user_id: String },
    ProfileUpdated { user_id: String, username: String },
}

impl SessionEvent {
    pub fn user_id(&self) -> &str {
        match self {
            SessionEvent::SignedIn { user_id }
            | SessionEvent::SignedOut { user_id }
            | SessionEvent::ProfileUpdated { user_id, .. } => user_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::SignedIn { .. } => "signed_in",
            SessionEvent::SignedOut { .. } => "signed_out",
            SessionEvent::ProfileUpdated { .. } => "profile_updated",
        }
    }
}

#[derive(Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: SessionEvent) {
        tracing::debug!(event = event.name(), user_id = %event.user_id(), "Session event");
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    /// Events concerning `user_id`, from now on.
    pub fn subscribe(&self, user_id: String) -> impl Stream<Item = SessionEvent> {
        BroadcastStream::new(self.tx.subscribe()).filter_map(move |received| match received {
            Ok(event) if event.user_id() == user_id => Some(event),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Session event subscriber lagged");
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn subscribers_only_see_their_own_events() {
        let events = SessionEvents::new();
        let mut stream = Box::pin(events.subscribe("u1".into()));

        events.publish(SessionEvent::SignedIn {
            user_id: "u2".into(),
        });
        events.publish(SessionEvent::SignedOut {
            user_id: "u1".into(),
        });

        let next = stream.next().await.unwrap();
        assert_eq!(
            next,
            SessionEvent::SignedOut {
                user_id: "u1".into()
            }
        );
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let events = SessionEvents::new();
        events.publish(SessionEvent::SignedIn {
            user_id: "u1".into(),
        });
    }

    #[test]
    fn events_serialize_with_a_tag() {
        let event = SessionEvent::ProfileUpdated {
            user_id: "u1".into(),
            username: "alice".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "profile_updated");
        assert_eq!(json["username"], "alice");
        assert_eq!(event.name(), "profile_updated");
    }
}

//! Per-node deletion notifications for collaborators that chain further
//! cleanup onto preview removal.

use tokio::sync::mpsc::UnboundedSender;

use crate::model::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeletionKind {
    Folder,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionEvent {
    pub kind: DeletionKind,
    pub node_id: NodeId,
}

/// Receives one event per successfully deleted node. Called from the deletion
/// workers, so implementations must be cheap and must not block.
pub trait DeletionListener: Send + Sync {
    fn on_deleted(&self, event: DeletionEvent);
}

impl<F> DeletionListener for F
where
    F: Fn(DeletionEvent) + Send + Sync,
{
    fn on_deleted(&self, event: DeletionEvent) {
        self(event)
    }
}

impl DeletionListener for UnboundedSender<DeletionEvent> {
    fn on_deleted(&self, event: DeletionEvent) {
        // a dropped receiver only means nobody is listening anymore
        let _ = self.send(event);
    }
}

/// Listener used when nobody subscribed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl DeletionListener for NoopListener {
    fn on_deleted(&self, _event: DeletionEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_listener() {
        let seen = Mutex::new(Vec::new());
        let listener = |event: DeletionEvent| seen.lock().unwrap().push(event.node_id);

        listener.on_deleted(DeletionEvent {
            kind: DeletionKind::Folder,
            node_id: 7,
        });

        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn test_channel_listener() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let event = DeletionEvent {
            kind: DeletionKind::Image,
            node_id: 42,
        };

        tx.on_deleted(event);

        assert_eq!(rx.recv().await, Some(event));
    }

    #[test]
    fn test_channel_listener_tolerates_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);

        tx.on_deleted(DeletionEvent {
            kind: DeletionKind::Folder,
            node_id: 1,
        });
    }
}

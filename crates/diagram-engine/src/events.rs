//! Change notifications for document subscribers
//!
//! The document store publishes an event after every committed change so
//! a rendering surface (or any other consumer) can refresh without polling.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::{DocumentId, EdgeId, NodeId, Viewport};

/// Receives every change the store commits
///
/// The store never blocks on a subscriber. A delivery failure is logged by
/// the store and the edit still stands.
pub trait EventSink: Send + Sync {
    fn send(&self, event: DocumentEvent) -> Result<(), EventError>;
}

/// Why a change notification did not reach its subscriber
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// The receiving half was dropped; the subscriber has detached
    #[error("Subscriber detached before '{event}' was delivered")]
    SubscriberDetached { event: &'static str },
}

/// Events emitted by the document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DocumentEvent {
    /// A document was loaded or created
    #[serde(rename_all = "camelCase")]
    DocumentLoaded { document_id: DocumentId },

    /// The document was persisted
    #[serde(rename_all = "camelCase")]
    DocumentSaved {
        document_id: DocumentId,
        version: u64,
    },

    #[serde(rename_all = "camelCase")]
    NodeAdded { node_id: NodeId },

    #[serde(rename_all = "camelCase")]
    NodeUpdated { node_id: NodeId },

    #[serde(rename_all = "camelCase")]
    NodeRemoved { node_id: NodeId },

    #[serde(rename_all = "camelCase")]
    EdgeAdded { edge_id: EdgeId },

    #[serde(rename_all = "camelCase")]
    EdgeUpdated { edge_id: EdgeId },

    #[serde(rename_all = "camelCase")]
    EdgeRemoved { edge_id: EdgeId },

    /// Undo/redo availability or the document content changed through history
    #[serde(rename_all = "camelCase")]
    HistoryChanged {
        can_undo: bool,
        can_redo: bool,
        version: u64,
    },

    #[serde(rename_all = "camelCase")]
    SelectionChanged {
        node_ids: Vec<NodeId>,
        edge_ids: Vec<EdgeId>,
    },

    #[serde(rename_all = "camelCase")]
    ViewportChanged { viewport: Viewport },
}

impl DocumentEvent {
    /// The serialized `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DocumentLoaded { .. } => "documentLoaded",
            Self::DocumentSaved { .. } => "documentSaved",
            Self::NodeAdded { .. } => "nodeAdded",
            Self::NodeUpdated { .. } => "nodeUpdated",
            Self::NodeRemoved { .. } => "nodeRemoved",
            Self::EdgeAdded { .. } => "edgeAdded",
            Self::EdgeUpdated { .. } => "edgeUpdated",
            Self::EdgeRemoved { .. } => "edgeRemoved",
            Self::HistoryChanged { .. } => "historyChanged",
            Self::SelectionChanged { .. } => "selectionChanged",
            Self::ViewportChanged { .. } => "viewportChanged",
        }
    }
}

/// Store default when nobody is listening
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: DocumentEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// Records the change log of a store in memory
///
/// Tests read it back to check which edits were announced and in what order.
#[derive(Default)]
pub struct VecEventSink {
    events: parking_lot::Mutex<Vec<DocumentEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DocumentEvent> {
        self.events.lock().clone()
    }

    /// Type tags of the recorded events, oldest first
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(DocumentEvent::kind).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: DocumentEvent) -> Result<(), EventError> {
        self.events.lock().push(event);
        Ok(())
    }
}

/// Forwards events into an unbounded tokio channel
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<DocumentEvent>,
}

impl ChannelEventSink {
    /// Create a sink together with the receiving end for a subscriber
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DocumentEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, event: DocumentEvent) -> Result<(), EventError> {
        let kind = event.kind();
        self.sender
            .send(event)
            .map_err(|_| EventError::SubscriberDetached { event: kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_event_sink() {
        let sink = VecEventSink::new();

        sink.send(DocumentEvent::NodeAdded {
            node_id: "n1".to_string(),
        })
        .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);

        match &events[0] {
            DocumentEvent::NodeAdded { node_id } => assert_eq!(node_id, "n1"),
            _ => panic!("Expected NodeAdded event"),
        }

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = DocumentEvent::EdgeRemoved {
            edge_id: "e1".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "edgeRemoved");
        assert_eq!(json["type"], event.kind());
        assert_eq!(json["edgeId"], "e1");
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_and_detects_close() {
        let (sink, mut receiver) = ChannelEventSink::channel();
        sink.send(DocumentEvent::DocumentLoaded {
            document_id: "d1".to_string(),
        })
        .unwrap();

        assert_eq!(
            receiver.recv().await,
            Some(DocumentEvent::DocumentLoaded {
                document_id: "d1".to_string()
            })
        );

        drop(receiver);
        let result = sink.send(DocumentEvent::NodeRemoved {
            node_id: "n1".to_string(),
        });
        assert_eq!(
            result,
            Err(EventError::SubscriberDetached {
                event: "nodeRemoved"
            })
        );
    }
}

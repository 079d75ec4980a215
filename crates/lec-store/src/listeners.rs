//! Registry of live subscriptions.
//!
//! Each listener remembers the last snapshot it was sent so the gateway only
//! delivers when a re-query actually changed the result. The registry is
//! guarded by a std mutex that is never held across an await or a sink call.

use std::collections::BTreeMap;

use lec_core::documents::{Document, Filter, matches_all};
use lec_core::enums::Collection;
use lec_core::gateway::SnapshotSink;

struct Listener {
    collection: Collection,
    filters: Vec<Filter>,
    sink: SnapshotSink,
    last: Vec<Document>,
}

/// A listener that needs to be re-queried.
pub(crate) struct Requery {
    pub id: u64,
    pub collection: Collection,
    pub filters: Vec<Filter>,
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: u64,
    listeners: BTreeMap<u64, Listener>,
}

impl ListenerRegistry {
    pub fn register(
        &mut self,
        collection: Collection,
        filters: Vec<Filter>,
        sink: SnapshotSink,
        initial: Vec<Document>,
    ) -> u64 {
        self.next_id += 1;
        self.listeners.insert(
            self.next_id,
            Listener {
                collection,
                filters,
                sink,
                last: initial,
            },
        );
        self.next_id
    }

    pub fn remove(&mut self, id: u64) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Listeners whose result set a write to `written` may have changed: a
    /// written document now matches, or it was part of the last snapshot.
    pub fn affected(&self, collection: Collection, written: &[Document]) -> Vec<Requery> {
        self.listeners
            .iter()
            .filter(|(_, l)| l.collection == collection)
            .filter(|(_, l)| {
                written.iter().any(|doc| {
                    matches_all(&l.filters, doc) || l.last.iter().any(|prev| prev.id == doc.id)
                })
            })
            .map(|(id, l)| Requery {
                id: *id,
                collection: l.collection,
                filters: l.filters.clone(),
            })
            .collect()
    }

    /// Every registered listener, for a full refresh.
    pub fn all(&self) -> Vec<Requery> {
        self.listeners
            .iter()
            .map(|(id, l)| Requery {
                id: *id,
                collection: l.collection,
                filters: l.filters.clone(),
            })
            .collect()
    }

    /// Store a fresh snapshot. Returns the sink when the snapshot differs from
    /// the last one delivered; `None` if unchanged or the listener is gone.
    pub fn record(&mut self, id: u64, snapshot: &[Document]) -> Option<SnapshotSink> {
        let listener = self.listeners.get_mut(&id)?;
        if listener.last == snapshot {
            return None;
        }
        listener.last = snapshot.to_vec();
        Some(listener.sink.clone())
    }

    pub fn sink(&self, id: u64) -> Option<SnapshotSink> {
        self.listeners.get(&id).map(|l| l.sink.clone())
    }

    pub fn sinks(&self) -> Vec<SnapshotSink> {
        self.listeners.values().map(|l| l.sink.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn noop_sink() -> SnapshotSink {
        Arc::new(|_| {})
    }

    fn instance(id: &str, student: &str) -> Document {
        Document {
            id: id.into(),
            data: json!({"assignment_id": "asg-1", "student_id": student}),
        }
    }

    #[test]
    fn affected_matches_new_documents() {
        let mut reg = ListenerRegistry::default();
        let id = reg.register(
            Collection::AssignmentInstances,
            vec![Filter::eq("student_id", "stu-1")],
            noop_sink(),
            Vec::new(),
        );
        reg.register(
            Collection::AssignmentInstances,
            vec![Filter::eq("student_id", "stu-2")],
            noop_sink(),
            Vec::new(),
        );
        let hits = reg.affected(Collection::AssignmentInstances, &[instance("ins-1", "stu-1")]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
        assert!(reg.affected(Collection::Courses, &[instance("ins-1", "stu-1")]).is_empty());
    }

    #[test]
    fn affected_includes_documents_that_left_the_set() {
        let mut reg = ListenerRegistry::default();
        reg.register(
            Collection::AssignmentInstances,
            vec![Filter::eq("student_id", "stu-1")],
            noop_sink(),
            vec![instance("ins-1", "stu-1")],
        );
        let moved = instance("ins-1", "stu-9");
        assert_eq!(reg.affected(Collection::AssignmentInstances, &[moved]).len(), 1);
    }

    #[test]
    fn record_only_returns_sink_on_change() {
        let mut reg = ListenerRegistry::default();
        let id = reg.register(Collection::Courses, Vec::new(), noop_sink(), Vec::new());
        assert!(reg.record(id, &[]).is_none());
        assert!(reg.record(id, &[instance("ins-1", "stu-1")]).is_some());
        assert!(reg.record(id, &[instance("ins-1", "stu-1")]).is_none());
        assert!(reg.remove(id));
        assert!(reg.record(id, &[]).is_none());
        assert_eq!(reg.len(), 0);
    }
}

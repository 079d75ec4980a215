//! Shared helpers for controller scenario tests.
//!
//! [`GatedGateway`] wraps the in-memory libSQL gateway and lets a test hold a
//! batch write mid-flight, inject batch failures, and replay deliveries on
//! subscription sinks it has seen.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lec_core::documents::{Document, Entity, Filter, WriteOp};
use lec_core::entities::{Assignment, AssignmentInstance, Course};
use lec_core::enums::Collection;
use lec_core::gateway::{
    CollectionGateway, GatewayError, SnapshotEvent, SnapshotSink, SubscriptionHandle,
};
use lec_core::identity::SessionState;
use lec_core::responses::ActiveCourseView;
use lec_store::LibSqlGateway;
use lec_sync::{SyncController, SyncHandle, SyncSettings};
use tokio::sync::oneshot;

pub const TIMEOUT: Duration = Duration::from_secs(5);

struct Gate {
    entered: Option<oneshot::Sender<()>>,
    release: oneshot::Receiver<()>,
}

/// Test-side end of a held batch.
pub struct BatchGate {
    entered: Option<oneshot::Receiver<()>>,
    release: oneshot::Sender<()>,
}

impl BatchGate {
    /// Wait until the held batch has reached the gateway.
    pub async fn entered(&mut self) {
        if let Some(rx) = self.entered.take() {
            tokio::time::timeout(TIMEOUT, rx)
                .await
                .expect("batch never reached the gateway")
                .unwrap();
        }
    }

    pub fn release(self) {
        let _ = self.release.send(());
    }
}

pub struct RecordedSink {
    pub collection: Collection,
    pub filters: Vec<Filter>,
    pub sink: SnapshotSink,
}

pub struct GatedGateway {
    inner: LibSqlGateway,
    gate: Mutex<Option<Gate>>,
    fail_next: AtomicUsize,
    batches: AtomicUsize,
    outcomes: Mutex<Vec<Result<(), GatewayError>>>,
    sinks: Mutex<Vec<RecordedSink>>,
}

impl GatedGateway {
    pub async fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: LibSqlGateway::in_memory().await.unwrap(),
            gate: Mutex::new(None),
            fail_next: AtomicUsize::new(0),
            batches: AtomicUsize::new(0),
            outcomes: Mutex::new(Vec::new()),
            sinks: Mutex::new(Vec::new()),
        })
    }

    /// The wrapped store, for seeding and for writes from "another client".
    pub fn store(&self) -> &LibSqlGateway {
        &self.inner
    }

    /// Hold the next batch write until the returned gate is released.
    pub fn hold_next_batch(&self) -> BatchGate {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(Gate {
            entered: Some(entered_tx),
            release: release_rx,
        });
        BatchGate {
            entered: Some(entered_rx),
            release: release_tx,
        }
    }

    /// Reject the next `n` batch writes without applying them.
    pub fn fail_next_batches(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Batch writes issued through this wrapper.
    pub fn batch_count(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    pub fn outcomes(&self) -> Vec<Result<(), GatewayError>> {
        self.outcomes.lock().unwrap().clone()
    }

    /// Wait until `n` batch writes have resolved.
    pub async fn wait_for_outcomes(&self, n: usize) {
        tokio::time::timeout(TIMEOUT, async {
            while self.outcomes.lock().unwrap().len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("batch writes did not resolve");
    }

    /// Wait until the wrapped store has exactly `n` live subscriptions.
    pub async fn wait_for_listeners(&self, n: usize) {
        tokio::time::timeout(TIMEOUT, async {
            while self.inner.listener_count() != n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("listener count never settled");
    }

    /// Most recent sink registered for `collection` whose filters include `filter`.
    pub fn sink_for(&self, collection: Collection, filter: &Filter) -> SnapshotSink {
        self.sinks
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|s| s.collection == collection && s.filters.contains(filter))
            .map(|s| Arc::clone(&s.sink))
            .expect("no matching subscription recorded")
    }

    pub async fn stored_instances(&self, student_id: &str) -> Vec<AssignmentInstance> {
        let docs = self
            .inner
            .query(
                Collection::AssignmentInstances,
                &[Filter::eq("student_id", student_id)],
            )
            .await
            .unwrap();
        docs.iter()
            .map(|d| AssignmentInstance::from_document(d).unwrap())
            .collect()
    }
}

impl CollectionGateway for GatedGateway {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, GatewayError> {
        self.inner.get(collection, id).await
    }

    async fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> Result<Vec<Document>, GatewayError> {
        self.inner.query(collection, filters).await
    }

    async fn subscribe(
        &self,
        collection: Collection,
        filters: Vec<Filter>,
        sink: SnapshotSink,
    ) -> Result<SubscriptionHandle, GatewayError> {
        self.sinks.lock().unwrap().push(RecordedSink {
            collection,
            filters: filters.clone(),
            sink: Arc::clone(&sink),
        });
        self.inner.subscribe(collection, filters, sink).await
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<(), GatewayError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().take();
        if let Some(mut gate) = gate {
            if let Some(entered) = gate.entered.take() {
                let _ = entered.send(());
            }
            let _ = gate.release.await;
        }
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let result = if injected {
            Err(GatewayError::Rejected("injected failure".into()))
        } else {
            self.inner.batch_write(ops).await
        };
        self.outcomes.lock().unwrap().push(result.clone());
        result
    }
}

pub fn course(id: &str, students: &[&str], assignments: &[&str]) -> Course {
    Course {
        id: id.to_string(),
        name: format!("Course {id}"),
        student_ids: students.iter().map(ToString::to_string).collect(),
        assignment_ids: assignments.iter().map(ToString::to_string).collect(),
    }
}

pub fn assignment(id: &str, course_id: &str) -> Assignment {
    Assignment {
        id: id.to_string(),
        course_id: course_id.to_string(),
        title: format!("Assignment {id}"),
        description: None,
        requires_submission: true,
        due_at: None,
    }
}

pub fn instance(id: &str, assignment_id: &str, student_id: &str) -> AssignmentInstance {
    AssignmentInstance::unsubmitted(id.to_string(), assignment_id, student_id)
}

/// Two courses for `stu-1`: `crs-1` with `asg-1`/`asg-2`, `crs-2` with
/// `asg-3`/`asg-4`.
pub async fn seeded() -> Arc<GatedGateway> {
    let gw = GatedGateway::new().await;
    gw.store()
        .batch_write(vec![
            WriteOp::set(&course("crs-1", &["stu-1"], &["asg-1", "asg-2"])).unwrap(),
            WriteOp::set(&course("crs-2", &["stu-1"], &["asg-3", "asg-4"])).unwrap(),
            WriteOp::set(&assignment("asg-1", "crs-1")).unwrap(),
            WriteOp::set(&assignment("asg-2", "crs-1")).unwrap(),
            WriteOp::set(&assignment("asg-3", "crs-2")).unwrap(),
            WriteOp::set(&assignment("asg-4", "crs-2")).unwrap(),
        ])
        .await
        .unwrap();
    gw
}

pub fn start(gw: &Arc<GatedGateway>) -> SyncHandle {
    SyncController::start(Arc::clone(gw), SyncSettings::default())
}

pub async fn sign_in_and_select(handle: &SyncHandle, student: &str, course: &str) {
    handle
        .set_session(SessionState::signed_in(student))
        .await
        .unwrap();
    handle.select_course(Some(course.to_string())).await.unwrap();
}

pub async fn wait_view(
    handle: &SyncHandle,
    predicate: impl FnMut(&ActiveCourseView) -> bool,
) -> ActiveCourseView {
    tokio::time::timeout(TIMEOUT, handle.wait_for(predicate))
        .await
        .expect("view never matched")
        .unwrap()
}

pub async fn wait_settled(handle: &SyncHandle, course: &str) -> ActiveCourseView {
    wait_view(handle, |v| {
        v.course_id.as_deref() == Some(course) && v.is_settled()
    })
    .await
}

pub fn assignment_doc(id: &str, course_id: &str) -> Document {
    assignment(id, course_id).to_document().unwrap()
}

pub fn deliver(sink: &SnapshotSink, event: SnapshotEvent) {
    sink(event);
}

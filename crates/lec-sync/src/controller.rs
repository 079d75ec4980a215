//! The sync controller: one task that owns the subscription manager, the
//! derived cache, the selector, and the reconciliation scheduler.
//!
//! The controller task is the single logical thread of the core. Gateway
//! calls run in spawned tasks and report back over channels; every report
//! carries the slot generation or pass number it was started under, and
//! anything no longer current is dropped. The published
//! [`ActiveCourseView`] is the only thing presentation code sees.

use std::sync::Arc;

use chrono::Utc;
use lec_config::SyncConfig;
use lec_core::entities::AssignmentInstance;
use lec_core::enums::EngineState;
use lec_core::gateway::{
    CollectionGateway, GatewayError, SnapshotEvent, SnapshotSink, SubscriptionHandle,
};
use lec_core::identity::SessionState;
use lec_core::responses::ActiveCourseView;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::cache::{DerivedCache, InstanceStatus};
use crate::error::SyncError;
use crate::reconcile::{PassEvent, PassRequest, Reconciler};
use crate::selector::{ActiveSelection, ViewSelector};
use crate::submission;
use crate::subscriptions::{Ensure, SlotKey, SlotKind, SubscriptionManager};

/// Runtime settings for the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Capacity of the command channel and the error broadcast.
    pub event_buffer: usize,
    pub lookup_concurrency: usize,
    /// Follow-up passes allowed for one selection after swallowed conflicts.
    pub max_conflict_repasses: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            event_buffer: config.event_buffer.max(1),
            lookup_concurrency: config.lookup_concurrency.max(1),
            max_conflict_repasses: config.max_conflict_repasses,
        }
    }
}

enum Command {
    SetSession(SessionState),
    SelectCourse(Option<String>),
    Refresh,
    Submit {
        assignment_id: String,
        mark: Option<f64>,
        reply: oneshot::Sender<Result<AssignmentInstance, SyncError>>,
    },
    Dispose(oneshot::Sender<()>),
}

enum SlotEvent {
    Delivery {
        slot: SlotKind,
        generation: u64,
        event: SnapshotEvent,
    },
    Attached {
        slot: SlotKind,
        generation: u64,
        result: Result<SubscriptionHandle, GatewayError>,
    },
}

/// Client side of a running controller.
pub struct SyncHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<ActiveCourseView>,
    errors: broadcast::Sender<SyncError>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    async fn send(&self, command: Command) -> Result<(), SyncError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SyncError::Closed)
    }

    /// Report a new identity state. Signing out releases every subscription.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Closed` if the controller has stopped.
    pub async fn set_session(&self, session: SessionState) -> Result<(), SyncError> {
        self.send(Command::SetSession(session)).await
    }

    /// Change the active course. `None` clears the selection.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Closed` if the controller has stopped.
    pub async fn select_course(&self, course_id: Option<String>) -> Result<(), SyncError> {
        self.send(Command::SelectCourse(course_id)).await
    }

    /// Force one reconciliation pass for the current selection and re-open
    /// any subscription whose setup failed.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Closed` if the controller has stopped.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        self.send(Command::Refresh).await
    }

    /// Mark the current student's instance for `assignment_id` as submitted.
    /// The view reflects the change once the instance subscription delivers it.
    ///
    /// # Errors
    ///
    /// `NoSession` without a student, `NotFound` if the instance is not known
    /// yet, or the write error.
    pub async fn submit(
        &self,
        assignment_id: &str,
        mark: Option<f64>,
    ) -> Result<AssignmentInstance, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Submit {
            assignment_id: assignment_id.to_string(),
            mark,
            reply,
        })
        .await?;
        rx.await.map_err(|_| SyncError::Closed)?
    }

    /// Receiver of every published view.
    #[must_use]
    pub fn view(&self) -> watch::Receiver<ActiveCourseView> {
        self.view.clone()
    }

    /// The latest published view.
    #[must_use]
    pub fn active_course_assignments(&self) -> ActiveCourseView {
        self.view.borrow().clone()
    }

    /// Subscribe to surfaced errors.
    #[must_use]
    pub fn errors(&self) -> broadcast::Receiver<SyncError> {
        self.errors.subscribe()
    }

    /// Wait until a published view satisfies `predicate`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Closed` if the controller stops first.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&ActiveCourseView) -> bool,
    ) -> Result<ActiveCourseView, SyncError> {
        let mut view = self.view.clone();
        let matched = view
            .wait_for(predicate)
            .await
            .map_err(|_| SyncError::Closed)?
            .clone();
        Ok(matched)
    }

    /// Release every subscription and stop the controller. In-flight gateway
    /// calls are not aborted; their results are ignored.
    pub async fn dispose(self) {
        let (ack, done) = oneshot::channel();
        if self.commands.send(Command::Dispose(ack)).await.is_ok() {
            let _ = done.await;
        }
        if let Err(e) = self.task.await {
            warn!(error = %e, "sync controller task failed");
        }
    }
}

/// The trigger a pass was started for.
struct Trigger {
    student_id: String,
    selection: Arc<ActiveSelection>,
}

#[derive(Default)]
struct Scheduler {
    next_pass: u64,
    /// The only pass whose results may merge into the cache.
    current: Option<u64>,
    engine: EngineState,
    last_trigger: Option<Trigger>,
    repasses: u32,
    /// A swallowed conflict used up its follow-up passes.
    stalled: bool,
}

impl Scheduler {
    fn transition(&mut self, next: EngineState) {
        if self.engine == next {
            return;
        }
        debug_assert!(self.engine.can_transition_to(next), "engine: {} -> {next}", self.engine);
        trace!(from = %self.engine, to = %next, "engine transition");
        self.engine = next;
    }

    /// Claim the next pass number. Returns it with the pass it supersedes.
    fn begin_pass(&mut self) -> (u64, Option<u64>) {
        let previous = self.current.take();
        self.transition(EngineState::Idle);
        self.next_pass += 1;
        self.current = Some(self.next_pass);
        self.stalled = false;
        self.transition(EngineState::Reconciling);
        (self.next_pass, previous)
    }

    /// Drop the current pass and every follow-up bookkeeping.
    fn reset(&mut self) -> Option<u64> {
        let pass = self.current.take();
        self.transition(EngineState::Idle);
        self.last_trigger = None;
        self.repasses = 0;
        self.stalled = false;
        pass
    }
}

pub struct SyncController<G: CollectionGateway> {
    gateway: Arc<G>,
    reconciler: Reconciler<G>,
    settings: SyncSettings,
    subscriptions: SubscriptionManager,
    cache: DerivedCache,
    selector: ViewSelector,
    session: SessionState,
    course_id: Option<String>,
    scheduler: Scheduler,
    last_error: Option<String>,
    /// Slot whose read failure `last_error` holds.
    read_error: Option<SlotKind>,
    slot_tx: mpsc::UnboundedSender<SlotEvent>,
    pass_tx: mpsc::UnboundedSender<PassEvent>,
    view_tx: watch::Sender<ActiveCourseView>,
    errors_tx: broadcast::Sender<SyncError>,
}

impl<G: CollectionGateway> SyncController<G> {
    /// Spawn the controller task. Must be called inside a tokio runtime.
    pub fn start(gateway: Arc<G>, settings: SyncSettings) -> SyncHandle {
        let (commands, command_rx) = mpsc::channel(settings.event_buffer.max(1));
        let (slot_tx, slot_rx) = mpsc::unbounded_channel();
        let (pass_tx, pass_rx) = mpsc::unbounded_channel();
        let (view_tx, view) = watch::channel(ActiveCourseView::default());
        let (errors_tx, _) = broadcast::channel(settings.event_buffer.max(1));

        let controller = Self {
            reconciler: Reconciler::new(Arc::clone(&gateway), settings.lookup_concurrency),
            gateway,
            settings,
            subscriptions: SubscriptionManager::new(),
            cache: DerivedCache::new(),
            selector: ViewSelector::new(),
            session: SessionState::SignedOut,
            course_id: None,
            scheduler: Scheduler::default(),
            last_error: None,
            read_error: None,
            slot_tx,
            pass_tx,
            view_tx,
            errors_tx: errors_tx.clone(),
        };
        let task = tokio::spawn(controller.run(command_rx, slot_rx, pass_rx));
        debug!("sync controller started");

        SyncHandle {
            commands,
            view,
            errors: errors_tx,
            task,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut slots: mpsc::UnboundedReceiver<SlotEvent>,
        mut passes: mpsc::UnboundedReceiver<PassEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Dispose(ack)) => {
                        self.shutdown();
                        let _ = ack.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                Some(event) = slots.recv() => self.handle_slot_event(event),
                Some(event) = passes.recv() => self.handle_pass_event(event),
            }
            self.schedule();
            self.publish();
        }
        debug!("sync controller stopped");
    }

    fn shutdown(&mut self) {
        self.subscriptions.release_all();
        self.cache.clear_all();
        self.scheduler.current = None;
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SetSession(session) => self.set_session(session),
            Command::SelectCourse(course_id) => self.select_course(course_id),
            Command::Refresh => {
                debug!("refresh requested");
                self.scheduler.last_trigger = None;
                self.scheduler.repasses = 0;
                self.ensure_slots();
            }
            Command::Submit {
                assignment_id,
                mark,
                reply,
            } => self.submit(assignment_id, mark, reply),
            Command::Dispose(_) => {}
        }
    }

    fn set_session(&mut self, session: SessionState) {
        if session == self.session {
            return;
        }
        let student_changed = session.student_id() != self.session.student_id();
        self.session = session;
        if !student_changed {
            return;
        }
        self.invalidate_pass();
        self.last_error = None;
        self.read_error = None;
        match self.session.student_id() {
            Some(student_id) => {
                info!(%student_id, "student signed in");
                self.ensure_slots();
            }
            None => {
                info!("no student identity; releasing subscriptions");
                self.subscriptions.release_all();
                self.cache.clear_all();
            }
        }
    }

    fn select_course(&mut self, course_id: Option<String>) {
        if course_id == self.course_id {
            return;
        }
        debug!(from = ?self.course_id, to = ?course_id, "active course changed");
        self.course_id = course_id;
        self.invalidate_pass();
        match &self.course_id {
            Some(_) => self.ensure_slots(),
            None => {
                if self.subscriptions.release(SlotKind::Assignments) {
                    self.cache.clear(SlotKind::Assignments.collection());
                }
            }
        }
    }

    fn submit(
        &self,
        assignment_id: String,
        mark: Option<f64>,
        reply: oneshot::Sender<Result<AssignmentInstance, SyncError>>,
    ) {
        let Some(student_id) = self.session.student_id() else {
            let _ = reply.send(Err(SyncError::NoSession));
            return;
        };
        let known = self
            .cache
            .instance_for(&assignment_id, student_id)
            .filter(|(_, status)| *status != InstanceStatus::Pending);
        let Some((instance, _)) = known else {
            let _ = reply.send(Err(SyncError::NotFound {
                assignment_id,
                student_id: student_id.to_string(),
            }));
            return;
        };
        let updated = submission::mark_submitted(instance.clone(), Utc::now(), mark);
        let gateway = Arc::clone(&self.gateway);
        tokio::spawn(async move {
            let result = submission::write_instance(gateway.as_ref(), updated).await;
            let _ = reply.send(result);
        });
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    fn ensure_slots(&mut self) {
        let Some(student_id) = self.session.student_id().map(str::to_string) else {
            return;
        };
        self.ensure_slot(SlotKey::courses_for(&student_id));
        self.ensure_slot(SlotKey::instances_for(&student_id));
        if let Some(course_id) = self.course_id.clone() {
            self.ensure_slot(SlotKey::assignments_for(&course_id));
        }
    }

    fn ensure_slot(&mut self, key: SlotKey) {
        if let Ensure::Subscribe {
            key,
            generation,
            replaced,
        } = self.subscriptions.ensure(key)
        {
            if replaced {
                self.cache.clear(key.slot.collection());
            }
            self.spawn_subscribe(key, generation);
        }
    }

    fn spawn_subscribe(&self, key: SlotKey, generation: u64) {
        let slot = key.slot;
        let gateway = Arc::clone(&self.gateway);
        let deliveries = self.slot_tx.clone();
        let attach = self.slot_tx.clone();
        let sink: SnapshotSink = Arc::new(move |event| {
            let _ = deliveries.send(SlotEvent::Delivery {
                slot,
                generation,
                event,
            });
        });
        tokio::spawn(async move {
            let result = gateway
                .subscribe(slot.collection(), key.filters, sink)
                .await;
            // If the controller is gone the handle is dropped with the event.
            let _ = attach.send(SlotEvent::Attached {
                slot,
                generation,
                result,
            });
        });
    }

    fn handle_slot_event(&mut self, event: SlotEvent) {
        match event {
            SlotEvent::Delivery {
                slot,
                generation,
                event,
            } => {
                if !self.subscriptions.is_current(slot, generation) {
                    let stale = SyncError::StaleCallback { slot, generation };
                    trace!(%stale, "delivery dropped");
                    return;
                }
                match event {
                    Ok(docs) => {
                        if self.read_error == Some(slot) {
                            debug!(%slot, "subscription recovered");
                            self.read_error = None;
                            self.last_error = None;
                        }
                        for e in self.cache.apply(slot.collection(), &docs) {
                            self.surface(e.into());
                        }
                    }
                    Err(e) => {
                        self.surface(SyncError::from_read(format!("{slot} subscription"), e));
                        self.read_error = Some(slot);
                    }
                }
            }
            SlotEvent::Attached {
                slot,
                generation,
                result,
            } => match result {
                Ok(handle) => {
                    if self.subscriptions.attached(slot, generation, handle) {
                        debug!(%slot, generation, "subscription active");
                    }
                }
                Err(e) => {
                    if self.subscriptions.setup_failed(slot, generation) {
                        self.surface(SyncError::from_read(format!("{slot} subscribe"), e));
                        self.read_error = Some(slot);
                    }
                }
            },
        }
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Start a pass when the selection changed identity for a known student.
    fn schedule(&mut self) {
        let Some(student_id) = self.session.student_id().map(str::to_string) else {
            return;
        };
        let selection = self
            .selector
            .select(&self.cache, self.course_id.as_deref());
        if !selection.ready || selection.course.is_none() {
            return;
        }
        if let Some(last) = &self.scheduler.last_trigger {
            if last.student_id == student_id && Arc::ptr_eq(&last.selection, &selection) {
                return;
            }
            self.scheduler.repasses = 0;
        }
        self.start_pass(student_id, selection);
    }

    fn start_pass(&mut self, student_id: String, selection: Arc<ActiveSelection>) {
        let (pass, previous) = self.scheduler.begin_pass();
        if let Some(previous) = previous {
            let removed = self.cache.rollback(previous);
            debug!(pass = previous, removed, "pass superseded");
        }

        let request = PassRequest {
            pass,
            student_id: student_id.clone(),
            course_id: selection.course_id.clone().unwrap_or_default(),
            assignment_ids: selection.assignment_ids(),
        };
        self.scheduler.last_trigger = Some(Trigger {
            student_id,
            selection,
        });
        tokio::spawn(self.reconciler.clone().run_pass(request, self.pass_tx.clone()));
    }

    /// Make every in-flight pass stale and forget the last trigger.
    fn invalidate_pass(&mut self) {
        if let Some(pass) = self.scheduler.reset() {
            self.cache.rollback(pass);
            debug!(pass, "pass invalidated");
        }
    }

    fn handle_pass_event(&mut self, event: PassEvent) {
        let pass = event.pass();
        if self.scheduler.current != Some(pass) {
            if let PassEvent::Finished { .. } = event {
                self.cache.rollback(pass);
            }
            trace!(pass, "stale pass event dropped");
            return;
        }
        match event {
            PassEvent::Partitioned { found, planned, .. } => {
                self.cache.absorb(pass, found);
                if !planned.is_empty() {
                    self.cache.stage(pass, planned);
                    self.scheduler.transition(EngineState::Committing);
                }
            }
            PassEvent::Finished { outcome, .. } => {
                self.scheduler.current = None;
                self.scheduler.transition(EngineState::Idle);
                match outcome {
                    Ok(done) => {
                        self.cache.confirm(pass);
                        self.scheduler.repasses = 0;
                        self.last_error = None;
                        self.read_error = None;
                        debug!(pass, found = done.found, created = done.created.len(), "pass merged");
                    }
                    Err(e @ SyncError::Conflict { .. }) => {
                        self.cache.rollback(pass);
                        if self.scheduler.repasses < self.settings.max_conflict_repasses {
                            self.scheduler.repasses += 1;
                            self.scheduler.last_trigger = None;
                            debug!(pass, error = %e, repass = self.scheduler.repasses, "conflict swallowed; follow-up scheduled");
                        } else {
                            self.scheduler.stalled = true;
                            info!(pass, error = %e, "conflict swallowed; follow-up passes exhausted");
                        }
                    }
                    Err(e) => {
                        self.cache.rollback(pass);
                        self.surface(e);
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------------

    fn surface(&mut self, error: SyncError) {
        if !error.is_surfaced() {
            debug!(%error, "error swallowed");
            return;
        }
        warn!(%error, "sync error");
        self.last_error = Some(error.to_string());
        self.read_error = None;
        // No receivers is fine; the view still carries the error.
        let _ = self.errors_tx.send(error);
    }

    fn is_loading(&self) -> bool {
        if self.session.is_loading() {
            return true;
        }
        if self.session.student_id().is_none() {
            return false;
        }
        self.cache.courses().is_none()
            || self.cache.instances().is_none()
            || (self.course_id.is_some() && self.cache.assignments().is_none())
    }

    fn publish(&mut self) {
        let selection = self
            .selector
            .select(&self.cache, self.course_id.as_deref());
        let student_id = self.session.student_id();

        let mut instances = Vec::new();
        let mut pending = Vec::new();
        if let Some(student_id) = student_id {
            for assignment in &selection.assignments {
                match self.cache.instance_for(&assignment.id, student_id) {
                    Some((_, InstanceStatus::Pending)) => pending.push(assignment.id.clone()),
                    Some((instance, _)) => instances.push(instance.clone()),
                    None => {}
                }
            }
        }

        let mut view = ActiveCourseView {
            student_id: student_id.map(str::to_string),
            course_id: self.course_id.clone(),
            course: selection.course.clone(),
            assignments: selection.assignments.clone(),
            instances,
            pending,
            loading: self.is_loading(),
            error: self.last_error.clone(),
            engine: self.scheduler.engine,
            needs_refresh: self.scheduler.stalled,
            version: 0,
        };
        self.view_tx.send_if_modified(|current| {
            view.version = current.version;
            if *current == view {
                return false;
            }
            view.version += 1;
            *current = view;
            true
        });
    }
}

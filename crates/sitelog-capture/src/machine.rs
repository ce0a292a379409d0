//! The check-in capture state machine.
//!
//! ```text
//! Idle --start--> AwaitingPreconditions --ok--> Scanning
//! Scanning --scan--> Submitting --unreadable--> Scanning
//!                    Submitting --result--> Feedback --delay--> Scanning
//! ```
//!
//! Scans are accepted only in `Scanning`; anything arriving in another state
//! is dropped, never queued. The [`SubmissionGate`] backs that up so at most
//! one submission is in flight per machine. Every resolution after a
//! suspension point checks the machine's liveness token before touching
//! state, so a screen torn down mid-request is never updated. A scan whose
//! future is dropped or panics while `Submitting` is settled as error
//! feedback and re-armed like any failed submission.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use sitelog_core::{
    AttendanceSubmission, LoadingGuard, LoadingSignal, LocationFix, OPERATOR_ID_KEY, ScanEvent,
    ScanParseError, Selection, SelectionError, SessionStore,
};
use sitelog_sync::Transport;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::feedback::{FeedbackChannel, Outcome, OutcomeKind};
use crate::gate::{GatePass, SubmissionGate};
use crate::geolocation::GeolocationAcquirer;
use crate::permission::{Capability, Decision, PermissionNegotiator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    AwaitingPreconditions,
    Scanning,
    Submitting,
    Feedback(FeedbackKind),
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("select a project and sub-project before scanning: {0}")]
    Selection(#[from] SelectionError),
    #[error("no operator is signed in")]
    MissingOperator,
    #[error("camera permission denied")]
    CameraDenied,
    #[error("capture cannot start while {0:?}")]
    InvalidTransition(CaptureState),
    #[error("capture screen was closed")]
    Disposed,
}

/// What happened to one scan event.
#[derive(Debug)]
pub enum ScanDisposition {
    /// Not accepted: the machine was in the given state, or a submission was
    /// already in flight.
    Dropped(CaptureState),
    /// Payload was not a badge; scanning re-armed immediately.
    Discarded(ScanParseError),
    /// Selection or operator went missing; nothing was sent.
    Refused(CaptureError),
    /// Submitted; the backend's verdict was shown to the operator.
    Submitted(Outcome),
    /// The machine was disposed while the submission was in flight.
    Stale,
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// How long feedback stays up before scanning re-arms.
    pub re_arm_delay: Duration,
    /// Attendance endpoint, relative to the transport's base URL.
    pub submit_path: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            re_arm_delay: Duration::from_secs(2),
            submit_path: "/attendance/checkin".to_string(),
        }
    }
}

/// Collaborators injected into a [`CaptureStateMachine`].
pub struct CaptureDeps {
    pub permissions: Arc<PermissionNegotiator>,
    pub geolocation: Arc<GeolocationAcquirer>,
    pub feedback: Arc<FeedbackChannel>,
    pub transport: Arc<dyn Transport>,
    pub session: Arc<dyn SessionStore>,
    pub loading: Arc<dyn LoadingSignal>,
}

pub struct CaptureStateMachine {
    me: Weak<Self>,
    state: Mutex<CaptureState>,
    selection: Mutex<Selection>,
    operator_id: Mutex<Option<String>>,
    gate: SubmissionGate,
    deps: CaptureDeps,
    config: CaptureConfig,
    alive: CancellationToken,
}

fn transition(state: &mut CaptureState, next: CaptureState) {
    debug!(from = ?*state, to = ?next, "capture transition");
    *state = next;
}

/// One scan's hold on the gate. On drop, a machine still `Submitting` (the
/// scan was abandoned or faulted before settling) is moved to error
/// feedback first; the gate is left afterwards.
struct InFlight<'a> {
    machine: &'a CaptureStateMachine,
    _pass: GatePass<'a>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.machine.recover_interrupted();
    }
}

impl CaptureStateMachine {
    pub fn new(deps: CaptureDeps, config: CaptureConfig) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            state: Mutex::new(CaptureState::Idle),
            selection: Mutex::new(Selection::default()),
            operator_id: Mutex::new(None),
            gate: SubmissionGate::new(),
            deps,
            config,
            alive: CancellationToken::new(),
        })
    }

    pub fn state(&self) -> CaptureState {
        *self.state.lock()
    }

    pub fn selection(&self) -> Selection {
        *self.selection.lock()
    }

    pub fn set_selection(&self, selection: Selection) {
        debug!(?selection, "selection updated");
        *self.selection.lock() = selection;
    }

    pub fn operator_id(&self) -> Option<String> {
        self.operator_id.lock().clone()
    }

    pub fn latest_fix(&self) -> Option<LocationFix> {
        self.deps.geolocation.latest()
    }

    pub fn gate(&self) -> &SubmissionGate {
        &self.gate
    }

    pub fn is_disposed(&self) -> bool {
        self.alive.is_cancelled()
    }

    /// Load the operator identity from the session. Called when the screen
    /// gains focus.
    pub fn on_focus(&self) {
        let operator = self.deps.session.get(OPERATOR_ID_KEY);
        if operator.is_none() {
            warn!("no operator id in session");
        }
        *self.operator_id.lock() = operator;
    }

    /// Tear down: pending re-arms are cancelled and in-flight results are
    /// dropped when they land.
    pub fn dispose(&self) {
        if !self.alive.is_cancelled() {
            info!(state = ?self.state(), "capture disposed");
            self.alive.cancel();
        }
    }

    fn preconditions(&self) -> Result<(), CaptureError> {
        self.selection.lock().chosen()?;
        if self.operator_id.lock().is_none() {
            return Err(CaptureError::MissingOperator);
        }
        Ok(())
    }

    /// Move to `next` only if still in `expected` and alive.
    fn advance(&self, expected: CaptureState, next: CaptureState) -> bool {
        let mut state = self.state.lock();
        if self.alive.is_cancelled() || *state != expected {
            return false;
        }
        transition(&mut state, next);
        true
    }

    fn refuse(&self, err: &CaptureError) {
        transition(&mut self.state.lock(), CaptureState::Idle);
        self.deps.feedback.show(Outcome::error(err.to_string()));
    }

    /// Leave `Idle`: check selection and operator, obtain camera permission,
    /// then try for a location fix.
    ///
    /// Camera refusal returns the machine to `Idle`. Location refusal or a
    /// failed fix does not block scanning.
    pub async fn start(&self) -> Result<(), CaptureError> {
        let ready = self.preconditions();
        {
            let mut state = self.state.lock();
            if self.alive.is_cancelled() {
                return Err(CaptureError::Disposed);
            }
            if *state != CaptureState::Idle {
                return Err(CaptureError::InvalidTransition(*state));
            }
            if ready.is_ok() {
                transition(&mut state, CaptureState::AwaitingPreconditions);
            }
        }
        if let Err(e) = ready {
            warn!(error = %e, "capture start refused");
            self.deps.feedback.show(Outcome::error(e.to_string()));
            return Err(e);
        }

        let camera = self.deps.permissions.request(Capability::Camera).await;
        if self.alive.is_cancelled() {
            return Err(CaptureError::Disposed);
        }
        if camera == Decision::Denied {
            let err = CaptureError::CameraDenied;
            warn!("camera permission denied");
            self.advance(CaptureState::AwaitingPreconditions, CaptureState::Idle);
            self.deps.feedback.show(Outcome::error(err.to_string()));
            return Err(err);
        }

        match self.deps.permissions.request(Capability::Location).await {
            Decision::Granted => {
                if let Err(e) = self.deps.geolocation.acquire().await {
                    warn!(error = %e, "continuing without a fresh location fix");
                }
            }
            Decision::Denied => warn!("location permission denied; check-ins will carry no fix"),
        }

        if !self.advance(CaptureState::AwaitingPreconditions, CaptureState::Scanning) {
            return Err(CaptureError::Disposed);
        }
        info!("capture armed");
        Ok(())
    }

    /// Handle one raw scan from the camera.
    pub async fn on_scan(&self, raw: &str) -> ScanDisposition {
        let in_flight = {
            let mut state = self.state.lock();
            if self.alive.is_cancelled() || *state != CaptureState::Scanning {
                debug!(state = ?*state, "scan dropped");
                return ScanDisposition::Dropped(*state);
            }
            let Some(pass) = self.gate.pass() else {
                debug!("scan dropped: submission in flight");
                return ScanDisposition::Dropped(*state);
            };
            transition(&mut state, CaptureState::Submitting);
            InFlight {
                machine: self,
                _pass: pass,
            }
        };

        let scan = match ScanEvent::parse(raw) {
            Ok(scan) => scan,
            Err(e) => {
                debug!(error = %e, "discarding unreadable badge");
                self.advance(CaptureState::Submitting, CaptureState::Scanning);
                drop(in_flight);
                return ScanDisposition::Discarded(e);
            }
        };

        let chosen = self.selection.lock().chosen();
        let operator = self.operator_id.lock().clone();
        let submission = match (chosen, operator) {
            (Ok(site), Some(operator)) => {
                AttendanceSubmission::new(site, scan, self.latest_fix(), operator)
            }
            (Err(e), _) => {
                let err = CaptureError::from(e);
                self.refuse(&err);
                drop(in_flight);
                return ScanDisposition::Refused(err);
            }
            (Ok(_), None) => {
                let err = CaptureError::MissingOperator;
                self.refuse(&err);
                drop(in_flight);
                return ScanDisposition::Refused(err);
            }
        };

        let outcome = self.submit(&submission).await;

        if self.alive.is_cancelled() {
            debug!("submission resolved after teardown; dropping result");
            return ScanDisposition::Stale;
        }

        let kind = match outcome.kind {
            OutcomeKind::Error => FeedbackKind::Error,
            _ => FeedbackKind::Success,
        };
        self.advance(CaptureState::Submitting, CaptureState::Feedback(kind));
        self.deps.feedback.show(outcome.clone());
        self.schedule_re_arm();
        drop(in_flight);

        ScanDisposition::Submitted(outcome)
    }

    async fn submit(&self, submission: &AttendanceSubmission) -> Outcome {
        let body = match serde_json::to_value(submission.body()) {
            Ok(body) => body,
            Err(e) => return Outcome::error(format!("could not encode check-in: {e}")),
        };
        if !submission.has_location() {
            warn!(worker = submission.scan().worker_id(), "submitting without a location fix");
        }

        let _loading = LoadingGuard::show(self.deps.loading.as_ref());
        match self.deps.transport.post(&self.config.submit_path, &body).await {
            Ok(resp) if resp.success => {
                info!(
                    vendor = submission.scan().vendor_id(),
                    worker = submission.scan().worker_id(),
                    "check-in accepted"
                );
                let message = if resp.message.is_empty() {
                    "Attendance recorded".to_string()
                } else {
                    resp.message
                };
                Outcome::success(message)
            }
            Ok(resp) => {
                warn!(message = %resp.message, "check-in rejected");
                Outcome::error(resp.message)
            }
            Err(e) => {
                warn!(error = %e, "check-in failed");
                Outcome::error(e.to_string())
            }
        }
    }

    fn schedule_re_arm(&self) {
        let me = self.me.clone();
        self.deps.feedback.schedule_re_arm(
            self.config.re_arm_delay,
            self.alive.clone(),
            move || {
                if let Some(machine) = me.upgrade() {
                    machine.re_arm();
                }
            },
        );
    }

    /// Settle a scan that left `Submitting` without a result.
    fn recover_interrupted(&self) {
        {
            let mut state = self.state.lock();
            if self.alive.is_cancelled() || *state != CaptureState::Submitting {
                return;
            }
            if tokio::runtime::Handle::try_current().is_err() {
                warn!("scan interrupted outside a runtime; re-arming immediately");
                transition(&mut state, CaptureState::Scanning);
                return;
            }
            transition(&mut state, CaptureState::Feedback(FeedbackKind::Error));
        }
        warn!(
            panicking = std::thread::panicking(),
            "check-in interrupted before the backend answered"
        );
        self.deps
            .feedback
            .show(Outcome::error("Check-in interrupted, scan again"));
        self.schedule_re_arm();
    }

    fn re_arm(&self) {
        let mut state = self.state.lock();
        if self.alive.is_cancelled() {
            return;
        }
        if let CaptureState::Feedback(_) = *state {
            transition(&mut state, CaptureState::Scanning);
        }
    }

    /// Feed scan events from a push source until it closes or the machine is
    /// disposed. Each event is handled on its own task, so bursts contend for
    /// the gate rather than queueing behind each other. Returns once every
    /// dispatched scan has settled.
    pub async fn drive(self: Arc<Self>, mut scans: mpsc::Receiver<String>) {
        let tasks = TaskTracker::new();
        loop {
            tokio::select! {
                _ = self.alive.cancelled() => break,
                next = scans.recv() => match next {
                    Some(raw) => {
                        let machine = Arc::clone(&self);
                        tasks.spawn(async move {
                            match machine.on_scan(&raw).await {
                                ScanDisposition::Dropped(state) => {
                                    info!(?state, "scan ignored: capture not armed")
                                }
                                disposition => debug!(?disposition, "scan handled"),
                            }
                        });
                    }
                    None => break,
                },
            }
        }
        tasks.close();
        debug!(pending = tasks.len(), "scan source closed");
        tasks.wait().await;
    }
}

impl Drop for CaptureStateMachine {
    fn drop(&mut self) {
        self.alive.cancel();
    }
}

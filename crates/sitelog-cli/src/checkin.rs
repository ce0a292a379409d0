//! `sitelog checkin`: run the capture state machine with stdin as the scanner.
//!
//! Each stdin line is one raw badge payload. Device permissions and the
//! location fix come from flags, so the same pipeline the handset runs can be
//! exercised from a terminal. Scans are not queued: a line arriving while a
//! check-in is submitting or its feedback is showing is ignored and logged.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sitelog_capture::{
    Capability, CaptureConfig, CaptureDeps, CaptureStateMachine, FeedbackChannel,
    FeedbackHandle, GeolocationAcquirer, GeolocationConfig, LocationError, LocationProvider,
    Notifier, Outcome, OutcomeKind, PermissionNegotiator, PermissionPlatform, PermissionStatus,
};
use sitelog_core::{LoadingSignal, LocationFix, Selection};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

use crate::backend::BackendArgs;

#[derive(clap::Args, Debug)]
pub struct CheckinArgs {
    /// Project to check workers into.
    #[arg(long)]
    pub project: i64,

    /// Sub-project to check workers into.
    #[arg(long)]
    pub sub_project: i64,

    /// Device latitude. Without coordinates, check-ins carry no fix.
    #[arg(long, requires = "long", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Device longitude.
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub long: Option<f64>,

    /// Simulate the operator refusing camera access.
    #[arg(long)]
    pub deny_camera: bool,

    /// Milliseconds feedback stays up before the next scan is accepted.
    #[arg(long, default_value_t = 2000)]
    pub re_arm_ms: u64,

    /// Attendance endpoint.
    #[arg(long, default_value = "/attendance/checkin")]
    pub submit_path: String,
}

/// Permissions fixed by flags.
struct FlagPermissions {
    camera: bool,
    location: bool,
}

#[async_trait]
impl PermissionPlatform for FlagPermissions {
    async fn check(&self, capability: Capability) -> PermissionStatus {
        let granted = match capability {
            Capability::Camera => self.camera,
            Capability::Location => self.location,
        };
        if granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Undetermined
        }
    }

    async fn prompt(&self, capability: Capability) -> PermissionStatus {
        tracing::info!(?capability, "permission refused by flags");
        PermissionStatus::Denied
    }
}

struct FlagLocation(Option<(f64, f64)>);

#[async_trait]
impl LocationProvider for FlagLocation {
    async fn current_fix(&self) -> Result<LocationFix, LocationError> {
        self.0
            .map(|(lat, long)| LocationFix::new(lat, long))
            .ok_or_else(|| LocationError::Unavailable("no coordinates given".into()))
    }
}

struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, handle: FeedbackHandle, outcome: &Outcome) {
        let tag = match outcome.kind {
            OutcomeKind::Success => "ok",
            OutcomeKind::Error => "error",
            OutcomeKind::Info => "info",
        };
        println!("[{}] {tag}: {}", handle.id(), outcome.message);
    }
}

struct TracingLoading;

impl LoadingSignal for TracingLoading {
    fn show(&self) {
        tracing::debug!("loading");
    }
    fn hide(&self) {
        tracing::debug!("loaded");
    }
}

pub async fn run(backend: &BackendArgs, args: CheckinArgs) -> anyhow::Result<()> {
    let session = backend.session();
    let transport = backend.transport(session.clone())?;
    let coordinates = args.lat.zip(args.long);

    let deps = CaptureDeps {
        permissions: Arc::new(PermissionNegotiator::new(Arc::new(FlagPermissions {
            camera: !args.deny_camera,
            location: coordinates.is_some(),
        }))),
        geolocation: Arc::new(GeolocationAcquirer::new(
            Arc::new(FlagLocation(coordinates)),
            GeolocationConfig::default(),
        )),
        feedback: Arc::new(FeedbackChannel::new(Arc::new(TerminalNotifier))),
        transport,
        session,
        loading: Arc::new(TracingLoading),
    };
    let config = CaptureConfig {
        re_arm_delay: Duration::from_millis(args.re_arm_ms),
        submit_path: args.submit_path,
    };

    let machine = CaptureStateMachine::new(deps, config);
    machine.on_focus();
    machine.set_selection(Selection::new(args.project, args.sub_project));
    machine.start().await.context("starting capture")?;

    let (tx, rx) = mpsc::channel(16);
    let driver = tokio::spawn(machine.clone().drive(rx));

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading scans from stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        if tx.send(line).await.is_err() {
            break;
        }
    }
    drop(tx);
    driver.await.context("scan driver panicked")?;

    machine.dispose();
    Ok(())
}

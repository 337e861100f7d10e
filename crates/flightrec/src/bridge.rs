use std::ffi::OsStr;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use thiserror::Error;
use tracing::trace;
use tracing::warn;

use flightrec_dcmd::DiagnosticCommands;
use flightrec_dcmd::OperationInfo;
use flightrec_dcmd::ops;
use flightrec_dcmd::sync::lock_or_recover;

/// Extension flight recordings are written with.
pub const RECORDING_EXTENSION: &str = "jfr";

/// Fixed reply from [`Bridge::check_recordings`] when the facility cannot be
/// used; callers polling in a loop always get a printable string.
pub const UNAVAILABLE_MESSAGE: &str = "Unable to check recordings";

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Recording duration must be strictly positive (was {0})")]
    InvalidDuration(u32),

    #[error("Failed to resolve a default recording path: {0}")]
    DefaultPath(#[from] std::io::Error),

    #[error("System clock predates the UNIX epoch: {0}")]
    Clock(#[from] std::time::SystemTimeError),
}

/// The five resolved operations, looked up once and read-only afterwards.
struct CommandTable {
    unlock: OperationInfo,
    check: OperationInfo,
    start: OperationInfo,
    stop: OperationInfo,
    dump: OperationInfo,
}

enum LoadState {
    Uninitialized,
    Ready(CommandTable),
    Unavailable,
}

/// What one invocation came to after boundary errors were absorbed.
enum Invocation {
    Completed(Option<String>),
    Failed,
}

/// Typed recording operations over a generic diagnostic-command facility.
///
/// The bridge resolves the operations it needs from the facility's catalog
/// exactly once, on first use. Resolution ends in one of two terminal
/// states, ready or permanently unavailable; there is no re-resolution.
/// Failures at the facility boundary are logged and folded into the boolean
/// results. The only errors callers see are their own invalid arguments and
/// environment lookups.
pub struct Bridge<C> {
    commands: Option<C>,
    state: Mutex<LoadState>,
}

impl<C: DiagnosticCommands> Bridge<C> {
    pub fn new(commands: C) -> Self {
        Self::from_discovery(Some(commands))
    }

    /// Wraps the result of facility discovery; `None` produces a bridge
    /// that is permanently unavailable but still safe to call.
    pub fn from_discovery(commands: Option<C>) -> Self {
        Self {
            commands,
            state: Mutex::new(LoadState::Uninitialized),
        }
    }

    /// Resolves the recording operations if that has not happened yet.
    /// Returns whether the bridge is usable. Idempotent; concurrent first
    /// callers are serialized and the catalog is queried at most once.
    pub fn ensure_loaded(&self) -> bool {
        let mut state = lock_or_recover(&self.state);
        self.ensure_loaded_locked(&mut state)
    }

    /// Starts a recording of `duration_secs` seconds written to `output`,
    /// which gets the `.jfr` extension appended unless it already carries
    /// it. Returns whether the facility accepted the start command.
    pub fn record_for(
        &self,
        duration_secs: u32,
        output: impl AsRef<Path>,
    ) -> Result<bool, BridgeError> {
        if duration_secs == 0 {
            return Err(BridgeError::InvalidDuration(duration_secs));
        }
        let path = with_recording_extension(output.as_ref());

        let mut state = lock_or_recover(&self.state);
        if !self.ensure_loaded_locked(&mut state) {
            return Ok(false);
        }
        let LoadState::Ready(table) = &*state else {
            return Ok(false);
        };

        let argument = format!(
            "delay=0s compress=true duration={}s filename=\"{}\"",
            duration_secs,
            path.display()
        );
        Ok(matches!(
            self.invoke_command(&table.start, &[argument]),
            Invocation::Completed(_)
        ))
    }

    /// Starts a recording written to `record_<epoch millis>.jfr` in the
    /// working directory.
    pub fn record_for_default(&self, duration_secs: u32) -> Result<bool, BridgeError> {
        let millis = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis();
        let path = std::env::current_dir()?.join(format!("record_{millis}.{RECORDING_EXTENSION}"));
        self.record_for(duration_secs, path)
    }

    /// Reports the facility's view of current recordings. Always returns a
    /// printable string; any failure along the way yields
    /// [`UNAVAILABLE_MESSAGE`].
    pub fn check_recordings(&self) -> String {
        let mut state = lock_or_recover(&self.state);
        if !self.ensure_loaded_locked(&mut state) {
            return UNAVAILABLE_MESSAGE.to_string();
        }
        let LoadState::Ready(table) = &*state else {
            return UNAVAILABLE_MESSAGE.to_string();
        };

        match self.invoke_command(&table.check, &["verbose=false".to_string()]) {
            Invocation::Completed(Some(report)) => report,
            _ => UNAVAILABLE_MESSAGE.to_string(),
        }
    }

    /// Stops the named recording. Returns whether the facility accepted the
    /// stop command.
    pub fn stop_recording(&self, name: &str) -> bool {
        let mut state = lock_or_recover(&self.state);
        if !self.ensure_loaded_locked(&mut state) {
            return false;
        }
        let LoadState::Ready(table) = &*state else {
            return false;
        };

        let argument = format!("name=\"{name}\"");
        matches!(
            self.invoke_command(&table.stop, &[argument]),
            Invocation::Completed(_)
        )
    }

    /// Dumps the named recording to `output` (extended to `.jfr` like
    /// [`Bridge::record_for`]) without stopping it.
    pub fn dump_recording(&self, name: &str, output: impl AsRef<Path>) -> bool {
        let path = with_recording_extension(output.as_ref());

        let mut state = lock_or_recover(&self.state);
        if !self.ensure_loaded_locked(&mut state) {
            return false;
        }
        let LoadState::Ready(table) = &*state else {
            return false;
        };

        let argument = format!("name=\"{name}\" filename=\"{}\"", path.display());
        matches!(
            self.invoke_command(&table.dump, &[argument]),
            Invocation::Completed(_)
        )
    }

    fn ensure_loaded_locked(&self, state: &mut LoadState) -> bool {
        match state {
            LoadState::Ready(_) => true,
            LoadState::Unavailable => false,
            LoadState::Uninitialized => match self.resolve_table() {
                Some(table) => {
                    let unlock = table.unlock.clone();
                    *state = LoadState::Ready(table);
                    // Unlocking gated functionality is best-effort; a
                    // failure here does not make the bridge unusable.
                    let _ = self.invoke_simple(&unlock);
                    true
                }
                None => {
                    *state = LoadState::Unavailable;
                    false
                }
            },
        }
    }

    fn resolve_table(&self) -> Option<CommandTable> {
        let commands = self.commands.as_ref()?;
        let catalog = match commands.operations() {
            Ok(catalog) => catalog,
            Err(err) => {
                warn!("Unable to query the diagnostic command catalog");
                trace!(error = %err, "catalog query failed");
                return None;
            }
        };

        let mut unlock = None;
        let mut check = None;
        let mut start = None;
        let mut stop = None;
        let mut dump = None;
        for op in catalog {
            match op.name() {
                ops::UNLOCK => unlock = Some(op),
                ops::CHECK => check = Some(op),
                ops::START => start = Some(op),
                ops::STOP => stop = Some(op),
                ops::DUMP => dump = Some(op),
                _ => {}
            }
        }

        let unlock = require(unlock, "unlock");
        let check = require(check, "recording check");
        let start = require(start, "recording start");
        let stop = require(stop, "recording stop");
        let dump = require(dump, "recording dump");
        match (unlock, check, start, stop, dump) {
            (Some(unlock), Some(check), Some(start), Some(stop), Some(dump)) => {
                Some(CommandTable {
                    unlock,
                    check,
                    start,
                    stop,
                    dump,
                })
            }
            _ => None,
        }
    }

    /// The single point where calls cross into the facility. Errors raised
    /// there are logged and absorbed; they never propagate to callers.
    fn invoke_command(&self, op: &OperationInfo, args: &[String]) -> Invocation {
        let Some(commands) = self.commands.as_ref() else {
            return Invocation::Failed;
        };
        match commands.invoke(op.name(), args, op.signature()) {
            Ok(reply) => Invocation::Completed(reply),
            Err(err) => {
                warn!(
                    "Unable to invoke {} ({:?} / {:?})",
                    op.name(),
                    args,
                    op.signature()
                );
                trace!(error = %err, operation = op.name(), "invocation failed");
                Invocation::Failed
            }
        }
    }

    /// Zero-argument invocation form.
    fn invoke_simple(&self, op: &OperationInfo) -> Invocation {
        let Some(commands) = self.commands.as_ref() else {
            return Invocation::Failed;
        };
        match commands.invoke(op.name(), &[], &[]) {
            Ok(reply) => Invocation::Completed(reply),
            Err(err) => {
                warn!("Unable to invoke {}", op.name());
                trace!(error = %err, operation = op.name(), "invocation failed");
                Invocation::Failed
            }
        }
    }
}

fn require(op: Option<OperationInfo>, label: &str) -> Option<OperationInfo> {
    if op.is_none() {
        warn!("Unable to find the {label} command");
    }
    op
}

fn with_recording_extension(path: &Path) -> PathBuf {
    if path.extension() == Some(OsStr::new(RECORDING_EXTENSION)) {
        return path.to_path_buf();
    }
    let mut extended = path.as_os_str().to_os_string();
    extended.push(".");
    extended.push(RECORDING_EXTENSION);
    PathBuf::from(extended)
}

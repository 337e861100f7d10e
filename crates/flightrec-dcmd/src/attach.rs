use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::commands::DiagnosticCommands;
use crate::error::DcmdError;
use crate::sync::lock_or_recover;
use crate::types::OperationInfo;
use crate::types::operation_name;

const PROTOCOL_VERSION: &str = "1";
const ATTACH_COMMAND: &str = "jcmd";
const HELP_COMMAND: &str = "help";
const LISTENER_WAIT_ATTEMPTS: u32 = 50;
const LISTENER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Diagnostic-command facility of a HotSpot JVM, reached over its attach
/// socket.
///
/// Each invocation opens a fresh connection, writes the NUL-terminated
/// request frame (protocol version, `jcmd`, three argument slots), and reads
/// the status line plus textual payload back. The operation catalog is
/// fetched once via `help` and cached, keyed by the catalog-style operation
/// name each jcmd command maps to.
#[derive(Debug)]
pub struct AttachSocket {
    pid: u32,
    socket: PathBuf,
    catalog: Mutex<Option<HashMap<String, String>>>,
}

impl AttachSocket {
    /// Attaches to the JVM with the given pid, asking it to open its attach
    /// listener if it has not already.
    pub fn attach(pid: u32) -> Result<Self, DcmdError> {
        let socket = socket_path(pid);
        if !socket.exists() {
            // Never signal the current process: a non-JVM host terminates
            // on SIGQUIT.
            if pid == std::process::id() {
                return Err(DcmdError::NoListener { pid });
            }
            request_listener(pid)?;
            wait_for_listener(&socket, pid)?;
        }
        debug!(pid, socket = %socket.display(), "attached to diagnostic endpoint");
        Ok(Self {
            pid,
            socket,
            catalog: Mutex::new(None),
        })
    }

    /// Attaches to the current process, succeeding only when the host
    /// runtime already opened an attach listener.
    pub fn current_process() -> Result<Self, DcmdError> {
        Self::attach(std::process::id())
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    fn load_catalog(&self) -> Result<HashMap<String, String>, DcmdError> {
        let mut cached = lock_or_recover(&self.catalog);
        if let Some(catalog) = cached.as_ref() {
            return Ok(catalog.clone());
        }

        let listing = self.execute(HELP_COMMAND)?;
        let mut catalog = HashMap::new();
        for command in parse_help(&listing) {
            catalog.insert(operation_name(&command), command);
        }
        debug!(pid = self.pid, commands = catalog.len(), "loaded command catalog");
        *cached = Some(catalog.clone());
        Ok(catalog)
    }

    /// Runs one jcmd command line and returns its textual payload.
    fn execute(&self, command_line: &str) -> Result<String, DcmdError> {
        let mut stream = UnixStream::connect(&self.socket)?;

        let mut request = Vec::with_capacity(command_line.len() + 16);
        for part in [PROTOCOL_VERSION, ATTACH_COMMAND, command_line, "", ""] {
            request.extend_from_slice(part.as_bytes());
            request.push(0);
        }
        stream.write_all(&request)?;
        stream.flush()?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw)?;
        parse_reply(&raw)
    }
}

impl DiagnosticCommands for AttachSocket {
    fn operations(&self) -> Result<Vec<OperationInfo>, DcmdError> {
        let catalog = self.load_catalog()?;
        Ok(catalog
            .keys()
            .map(|name| OperationInfo::string_array(name.as_str()))
            .collect())
    }

    fn invoke(
        &self,
        name: &str,
        args: &[String],
        _signature: &[String],
    ) -> Result<Option<String>, DcmdError> {
        let catalog = self.load_catalog()?;
        let command = catalog
            .get(name)
            .ok_or_else(|| DcmdError::UnknownOperation(name.to_string()))?;

        let mut command_line = command.clone();
        for arg in args {
            command_line.push(' ');
            command_line.push_str(arg);
        }

        let payload = self.execute(&command_line)?;
        if payload.is_empty() {
            Ok(None)
        } else {
            Ok(Some(payload))
        }
    }
}

fn socket_path(pid: u32) -> PathBuf {
    PathBuf::from(format!("/tmp/.java_pid{pid}"))
}

/// Asks the target JVM to open its attach listener: drop the trigger file it
/// watches for, then send SIGQUIT.
fn request_listener(pid: u32) -> Result<(), DcmdError> {
    let trigger = attach_trigger(pid)?;
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGQUIT) };
    if rc != 0 {
        let _ = std::fs::remove_file(&trigger);
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

fn attach_trigger(pid: u32) -> Result<PathBuf, DcmdError> {
    let in_cwd = PathBuf::from(format!("/proc/{pid}/cwd/.attach_pid{pid}"));
    if File::create(&in_cwd).is_ok() {
        return Ok(in_cwd);
    }
    // The target's working directory may not be writable from here; the JVM
    // also watches its tmp directory.
    let in_tmp = PathBuf::from(format!("/tmp/.attach_pid{pid}"));
    File::create(&in_tmp)?;
    Ok(in_tmp)
}

fn wait_for_listener(socket: &Path, pid: u32) -> Result<(), DcmdError> {
    for _ in 0..LISTENER_WAIT_ATTEMPTS {
        if socket.exists() {
            cleanup_triggers(pid);
            return Ok(());
        }
        thread::sleep(LISTENER_POLL_INTERVAL);
    }
    cleanup_triggers(pid);
    Err(DcmdError::AttachTimeout { pid })
}

fn cleanup_triggers(pid: u32) {
    let _ = std::fs::remove_file(format!("/proc/{pid}/cwd/.attach_pid{pid}"));
    let _ = std::fs::remove_file(format!("/tmp/.attach_pid{pid}"));
}

/// Splits a reply frame into its status line and payload.
fn parse_reply(raw: &[u8]) -> Result<String, DcmdError> {
    let text = String::from_utf8_lossy(raw);
    let (status_line, payload) = match text.split_once('\n') {
        Some((status_line, payload)) => (status_line, payload),
        None => (text.as_ref(), ""),
    };

    let status: i32 = status_line
        .trim()
        .parse()
        .map_err(|_| DcmdError::Protocol(format!("unreadable status line {status_line:?}")))?;
    if status != 0 {
        return Err(DcmdError::CommandFailed {
            status,
            message: payload.trim().to_string(),
        });
    }
    Ok(payload.trim_end().to_string())
}

/// Extracts command names from `help` output: the command lines are the
/// single-token ones, between the banner and the trailing usage hint.
fn parse_help(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| is_command_name(line))
        .map(String::from)
        .collect()
}

fn is_command_name(line: &str) -> bool {
    !line.is_empty()
        && line
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::os::unix::net::UnixListener;

    const HELP_LISTING: &str = "The following commands are available:\n\
        Compiler.codecache\n\
        GC.class_histogram\n\
        JFR.check\n\
        JFR.dump\n\
        JFR.start\n\
        JFR.stop\n\
        Thread.print\n\
        VM.unlock_commercial_features\n\
        VM.version\n\
        help\n\
        \n\
        For more information about a specific command use 'help <command>'.\n";

    #[test]
    fn test_parse_reply_success_with_payload() {
        let reply = parse_reply(b"0\nNo recordings.\n").unwrap();
        assert_eq!(reply, "No recordings.");
    }

    #[test]
    fn test_parse_reply_success_without_payload() {
        let reply = parse_reply(b"0\n").unwrap();
        assert!(reply.is_empty());
    }

    #[test]
    fn test_parse_reply_nonzero_status() {
        let err = parse_reply(b"1\njava.lang.IllegalArgumentException\n").unwrap_err();
        match err {
            DcmdError::CommandFailed { status, message } => {
                assert_eq!(status, 1);
                assert_eq!(message, "java.lang.IllegalArgumentException");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_reply_garbage_status_line() {
        let err = parse_reply(b"ready\n").unwrap_err();
        assert!(matches!(err, DcmdError::Protocol(_)));
    }

    #[test]
    fn test_parse_reply_empty_frame() {
        assert!(parse_reply(b"").is_err());
    }

    #[test]
    fn test_parse_help_extracts_command_names() {
        let commands = parse_help(HELP_LISTING);
        assert!(commands.contains(&"JFR.start".to_string()));
        assert!(commands.contains(&"VM.unlock_commercial_features".to_string()));
        assert!(commands.contains(&"help".to_string()));
        assert!(!commands.iter().any(|c| c.contains(' ')));
    }

    #[test]
    fn test_parse_help_skips_banner_and_hint() {
        let commands = parse_help(HELP_LISTING);
        assert_eq!(commands.len(), 10);
    }

    #[test]
    fn test_socket_path_uses_tmp() {
        assert_eq!(socket_path(17), PathBuf::from("/tmp/.java_pid17"));
    }

    /// Accepts one connection, reads the full request frame (five
    /// NUL-terminated parts), replies, and hands the raw request back.
    fn serve_once(socket: &Path, reply: &'static [u8]) -> std::thread::JoinHandle<Vec<u8>> {
        let listener = UnixListener::bind(socket).unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 256];
            while request.iter().filter(|&&b| b == 0).count() < 5 {
                let n = stream.read(&mut chunk).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
            }
            stream.write_all(reply).unwrap();
            request
        })
    }

    #[test]
    fn test_invoke_round_trips_through_the_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("attach.sock");
        let server = serve_once(&socket, b"0\nNo recordings.\n");

        let mut catalog = HashMap::new();
        catalog.insert("jfrCheck".to_string(), "JFR.check".to_string());
        let client = AttachSocket {
            pid: 0,
            socket,
            catalog: Mutex::new(Some(catalog)),
        };

        let reply = client
            .invoke("jfrCheck", &["verbose=false".to_string()], &[])
            .unwrap();
        assert_eq!(reply.as_deref(), Some("No recordings."));

        let request = server.join().unwrap();
        let parts: Vec<&[u8]> = request.split(|&b| b == 0).collect();
        assert_eq!(parts[0], b"1");
        assert_eq!(parts[1], b"jcmd");
        assert_eq!(parts[2], b"JFR.check verbose=false");
        assert_eq!(parts[3], b"");
        assert_eq!(parts[4], b"");
    }

    #[test]
    fn test_invoke_rejects_operations_outside_the_catalog() {
        let client = AttachSocket {
            pid: 0,
            socket: PathBuf::from("/nonexistent"),
            catalog: Mutex::new(Some(HashMap::new())),
        };

        let err = client.invoke("jfrStart", &[], &[]).unwrap_err();
        assert!(matches!(err, DcmdError::UnknownOperation(_)));
    }

    #[test]
    fn test_attach_to_current_process_without_listener_fails_fast() {
        // The test runner is not a JVM, so there is no listener to find and
        // no nudge must be sent.
        let err = AttachSocket::current_process().unwrap_err();
        assert!(matches!(err, DcmdError::NoListener { .. }));
    }
}

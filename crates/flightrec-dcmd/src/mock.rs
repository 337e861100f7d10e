use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use crate::commands::DiagnosticCommands;
use crate::error::DcmdError;
use crate::sync::lock_or_recover;
use crate::types::OperationInfo;
use crate::types::ops;

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

/// One recorded invocation, exactly as the caller issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: String,
    pub args: Vec<String>,
    pub signature: Vec<String>,
}

/// A mock diagnostic-command facility for tests.
///
/// The catalog, per-operation replies, and injected failures are all
/// configurable, and every catalog query and invocation is recorded so tests
/// can assert what was (or was not) attempted. Clones share state.
///
/// # Example
///
/// ```
/// use flightrec_dcmd::{DiagnosticCommands, MockCommands, ops};
///
/// let mut mock = MockCommands::new();
/// mock.set_reply(ops::CHECK, "No recordings.");
///
/// let reply = mock.invoke(ops::CHECK, &[], &[]).unwrap();
/// assert_eq!(reply.as_deref(), Some("No recordings."));
/// assert_eq!(mock.call_count(ops::CHECK), 1);
/// ```
#[derive(Clone)]
pub struct MockCommands {
    operations: Arc<Mutex<Vec<OperationInfo>>>,
    replies: Arc<Mutex<HashMap<String, Reply>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    catalog_queries: Arc<AtomicUsize>,
    catalog_error: Arc<Mutex<Option<String>>>,
}

impl Default for MockCommands {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCommands {
    /// A facility exposing the full set of required recording operations.
    pub fn new() -> Self {
        Self::with_operations(Self::required_operations())
    }

    /// A facility exposing exactly the given catalog.
    pub fn with_operations(operations: Vec<OperationInfo>) -> Self {
        Self {
            operations: Arc::new(Mutex::new(operations)),
            replies: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            catalog_queries: Arc::new(AtomicUsize::new(0)),
            catalog_error: Arc::new(Mutex::new(None)),
        }
    }

    /// The full required catalog minus one operation.
    pub fn omitting(name: &str) -> Self {
        let operations = Self::required_operations()
            .into_iter()
            .filter(|op| op.name() != name)
            .collect();
        Self::with_operations(operations)
    }

    /// The five operations a flight-recorder capable facility exposes.
    pub fn required_operations() -> Vec<OperationInfo> {
        vec![
            OperationInfo::no_args(ops::UNLOCK),
            OperationInfo::string_array(ops::CHECK),
            OperationInfo::string_array(ops::START),
            OperationInfo::string_array(ops::STOP),
            OperationInfo::string_array(ops::DUMP),
        ]
    }

    /// Sets the textual reply for an operation. Unconfigured operations
    /// complete silently with no output.
    pub fn set_reply(&mut self, operation: &str, text: &str) {
        lock_or_recover(&self.replies)
            .insert(operation.to_string(), Reply::Text(text.to_string()));
    }

    /// Makes invocations of an operation fail.
    pub fn fail_with(&mut self, operation: &str, message: &str) {
        lock_or_recover(&self.replies)
            .insert(operation.to_string(), Reply::Fail(message.to_string()));
    }

    /// Makes catalog queries fail.
    pub fn fail_catalog(&mut self, message: &str) {
        *lock_or_recover(&self.catalog_error) = Some(message.to_string());
    }

    /// Returns all recorded invocations, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock_or_recover(&self.calls).clone()
    }

    /// Returns how many times an operation was invoked.
    pub fn call_count(&self, operation: &str) -> usize {
        lock_or_recover(&self.calls)
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    /// Returns the most recent invocation of an operation.
    pub fn last_call(&self, operation: &str) -> Option<RecordedCall> {
        lock_or_recover(&self.calls)
            .iter()
            .rev()
            .find(|call| call.operation == operation)
            .cloned()
    }

    /// Returns how many times the catalog was queried.
    pub fn catalog_queries(&self) -> usize {
        self.catalog_queries.load(Ordering::SeqCst)
    }
}

impl DiagnosticCommands for MockCommands {
    fn operations(&self) -> Result<Vec<OperationInfo>, DcmdError> {
        self.catalog_queries.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = lock_or_recover(&self.catalog_error).as_ref() {
            return Err(DcmdError::Protocol(message.clone()));
        }
        Ok(lock_or_recover(&self.operations).clone())
    }

    fn invoke(
        &self,
        name: &str,
        args: &[String],
        signature: &[String],
    ) -> Result<Option<String>, DcmdError> {
        lock_or_recover(&self.calls).push(RecordedCall {
            operation: name.to_string(),
            args: args.to_vec(),
            signature: signature.to_vec(),
        });

        match lock_or_recover(&self.replies).get(name) {
            Some(Reply::Text(text)) => Ok(Some(text.clone())),
            Some(Reply::Fail(message)) => Err(DcmdError::CommandFailed {
                status: 1,
                message: message.clone(),
            }),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_exposes_required_operations() {
        let mock = MockCommands::new();
        let catalog = mock.operations().unwrap();
        let names: Vec<&str> = catalog.iter().map(OperationInfo::name).collect();
        assert_eq!(
            names,
            [ops::UNLOCK, ops::CHECK, ops::START, ops::STOP, ops::DUMP]
        );
    }

    #[test]
    fn test_mock_omitting_drops_exactly_one_operation() {
        let mock = MockCommands::omitting(ops::START);
        let catalog = mock.operations().unwrap();
        assert_eq!(catalog.len(), 4);
        assert!(catalog.iter().all(|op| op.name() != ops::START));
    }

    #[test]
    fn test_mock_returns_configured_reply() {
        let mut mock = MockCommands::new();
        mock.set_reply(ops::CHECK, "Recording 1: running");

        let reply = mock.invoke(ops::CHECK, &[], &[]).unwrap();
        assert_eq!(reply.as_deref(), Some("Recording 1: running"));
    }

    #[test]
    fn test_mock_unconfigured_operation_completes_silently() {
        let mock = MockCommands::new();
        let reply = mock.invoke(ops::START, &[], &[]).unwrap();
        assert!(reply.is_none());
    }

    #[test]
    fn test_mock_injected_failure() {
        let mut mock = MockCommands::new();
        mock.fail_with(ops::CHECK, "not available");

        let err = mock.invoke(ops::CHECK, &[], &[]).unwrap_err();
        assert!(matches!(err, DcmdError::CommandFailed { status: 1, .. }));
    }

    #[test]
    fn test_mock_catalog_failure() {
        let mut mock = MockCommands::new();
        mock.fail_catalog("endpoint gone");

        assert!(mock.operations().is_err());
        assert_eq!(mock.catalog_queries(), 1);
    }

    #[test]
    fn test_mock_records_calls_in_order() {
        let mock = MockCommands::new();
        mock.invoke(ops::START, &["duration=3s".to_string()], &[])
            .unwrap();
        mock.invoke(ops::CHECK, &[], &[]).unwrap();
        mock.invoke(ops::START, &["duration=5s".to_string()], &[])
            .unwrap();

        assert_eq!(mock.call_count(ops::START), 2);
        assert_eq!(mock.call_count(ops::CHECK), 1);
        assert_eq!(mock.calls().len(), 3);
        let last = mock.last_call(ops::START).unwrap();
        assert_eq!(last.args, ["duration=5s".to_string()]);
    }

    #[test]
    fn test_mock_clones_share_state() {
        let mock = MockCommands::new();
        let clone = mock.clone();
        clone.invoke(ops::STOP, &[], &[]).unwrap();

        assert_eq!(mock.call_count(ops::STOP), 1);
    }
}

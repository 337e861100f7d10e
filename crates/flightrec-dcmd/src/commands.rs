use crate::error::DcmdError;
use crate::types::OperationInfo;

/// A platform facility exposing named diagnostic operations that can be
/// invoked generically with string-array arguments.
///
/// Implementations answer two questions: which operations exist (with their
/// declared signatures), and what a given invocation returned. Discovery of
/// the facility itself is the implementor's concern; callers hold a value of
/// this trait and never see how it was located.
pub trait DiagnosticCommands {
    /// The catalog of operations the facility currently exposes.
    fn operations(&self) -> Result<Vec<OperationInfo>, DcmdError>;

    /// Invokes a named operation. Returns the textual reply, or `None` for
    /// operations that complete without producing output.
    fn invoke(
        &self,
        name: &str,
        args: &[String],
        signature: &[String],
    ) -> Result<Option<String>, DcmdError>;
}

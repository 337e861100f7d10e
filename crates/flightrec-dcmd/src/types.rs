/// Parameter type name the JVM reports for the string-array argument every
/// diagnostic command accepts.
pub const STRING_ARRAY_TYPE: &str = "[Ljava.lang.String;";

/// Operation names a flight-recorder capable facility must expose.
pub mod ops {
    pub const UNLOCK: &str = "vmUnlockCommercialFeatures";
    pub const CHECK: &str = "jfrCheck";
    pub const START: &str = "jfrStart";
    pub const STOP: &str = "jfrStop";
    pub const DUMP: &str = "jfrDump";
}

/// Descriptor of one named diagnostic operation: its name and the ordered
/// parameter-type names of its signature. Immutable once obtained from the
/// facility's catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationInfo {
    name: String,
    signature: Vec<String>,
}

impl OperationInfo {
    pub fn new(name: impl Into<String>, signature: Vec<String>) -> Self {
        Self {
            name: name.into(),
            signature,
        }
    }

    /// An operation taking the usual single string-array argument.
    pub fn string_array(name: impl Into<String>) -> Self {
        Self::new(name, vec![STRING_ARRAY_TYPE.to_string()])
    }

    /// A zero-arity operation.
    pub fn no_args(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &[String] {
        &self.signature
    }
}

/// Derives the catalog operation name from a raw jcmd command name, the same
/// way the JVM names diagnostic operations on its management interface:
/// `JFR.start` becomes `jfrStart`, `VM.unlock_commercial_features` becomes
/// `vmUnlockCommercialFeatures`. Characters before the first separator are
/// lowercased, each separator uppercases the character that follows it, and
/// everything else passes through unchanged.
pub fn operation_name(command: &str) -> String {
    let mut name = String::with_capacity(command.len());
    let mut lower_prefix = true;
    let mut upper_next = false;
    for c in command.chars() {
        if c == '.' || c == '_' {
            lower_prefix = false;
            upper_next = true;
        } else if upper_next {
            upper_next = false;
            name.extend(c.to_uppercase());
        } else if lower_prefix {
            name.extend(c.to_lowercase());
        } else {
            name.push(c);
        }
    }
    name
}

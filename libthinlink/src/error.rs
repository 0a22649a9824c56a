pub use anyhow::Context;
pub use anyhow::Error;
use std::fmt::Display;

pub type Result<T = (), E = Error> = core::result::Result<T, E>;

/// What sort of mistake a planning failure represents. Callers use this to decide how to present
/// the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The target or its dependencies are declared in a way that can't be linked. Fixable by
    /// changing build declarations.
    Usage,

    /// The toolchain doesn't configure something that the link needs.
    Configuration,

    /// The caller drove the planner incorrectly, e.g. passed an input of the wrong file type. This
    /// is a bug in the calling code, not something a user can fix.
    Programming,
}

/// A typed planning failure. This is always transported inside an `anyhow::Error` so that context
/// about which target and artifact were being processed can be attached as it propagates. Use
/// [`error_kind`] to get the kind back out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanError {
    pub kind: ErrorKind,
    pub message: String,
}

impl PlanError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Returns the kind of the `PlanError` wrapped by `error`, looking through any context layers.
/// Returns `None` for errors that didn't originate in the planner, e.g. failing to read a request
/// file.
pub fn error_kind(error: &Error) -> Option<ErrorKind> {
    error.downcast_ref::<PlanError>().map(|e| e.kind)
}

/// Returns early with a `PlanError` of the given kind.
#[macro_export]
macro_rules! plan_bail {
    ($kind:ident, $($rest:tt)*) => {
        return Err($crate::error::PlanError::new(
            $crate::error::ErrorKind::$kind,
            format!($($rest)*),
        )
        .into())
    };
}

/// Like `anyhow::ensure`, but produces a `PlanError` of the given kind.
#[macro_export]
macro_rules! plan_ensure {
    ($cond:expr, $kind:ident, $($rest:tt)*) => {
        if !$cond {
            $crate::plan_bail!($kind, $($rest)*);
        }
    };
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Usage => write!(f, "usage error"),
            ErrorKind::Configuration => write!(f, "configuration error"),
            ErrorKind::Programming => write!(f, "internal error"),
        }
    }
}

impl Display for PlanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl core::error::Error for PlanError {}

/// Prints `error` with its full context chain and exits with a status that reflects its kind.
pub fn report_error_and_exit(error: &Error) -> ! {
    eprintln!("thinlink: error: {error:?}");
    let status = match error_kind(error) {
        Some(ErrorKind::Usage) => 2,
        Some(ErrorKind::Configuration) => 3,
        Some(ErrorKind::Programming) => 101,
        None => 1,
    };
    std::process::exit(status);
}

//! Error taxonomy for entry resolution and launching.
//!
//! Trap faults are deliberately absent: they never surface as values, the
//! relay either hands them to the runtime or terminates the process.

use thiserror::Error;

/// Status returned when the launch entry point cannot be reached.
pub const STATUS_ENTRY_UNAVAILABLE: i32 = -1;
/// Status returned when marshaling the argument vector ran out of memory.
pub const STATUS_ALLOCATION: i32 = -2;
/// Status returned when an argument cannot become a C string.
pub const STATUS_INVALID_ARGUMENT: i32 = -3;
/// Status returned for a null or empty argument list.
pub const STATUS_EMPTY_ARGUMENTS: i32 = -4;
/// Status returned when the argument count does not fit a C `int`.
pub const STATUS_TOO_MANY_ARGUMENTS: i32 = -5;

/// Failure to locate a library or a symbol inside it. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("library not found: {library}: {diagnostic}")]
    LibraryNotFound { library: String, diagnostic: String },
    #[error("symbol not found: {symbol} in {library}: {diagnostic}")]
    SymbolNotFound {
        library: String,
        symbol: String,
        diagnostic: String,
    },
    #[error("name contains an interior NUL byte: {name:?}")]
    InvalidName { name: String },
}

impl ResolutionError {
    /// Loader diagnostic carried by the error, if any.
    #[must_use]
    pub fn diagnostic(&self) -> &str {
        match self {
            Self::LibraryNotFound { diagnostic, .. } | Self::SymbolNotFound { diagnostic, .. } => {
                diagnostic
            }
            Self::InvalidName { .. } => "",
        }
    }
}

/// Failure of a launch before the runtime entry point was invoked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchError {
    #[error("argument list is null or empty")]
    EmptyArguments,
    #[error("{count} arguments do not fit a C int")]
    TooManyArguments { count: usize },
    #[error("allocation failure while marshaling argument {index}")]
    Allocation { index: usize },
    #[error("argument {index} contains an interior NUL byte")]
    InvalidArgument { index: usize },
    #[error("entry point unavailable: {0}")]
    EntryPointUnavailable(#[source] ResolutionError),
}

impl LaunchError {
    /// Negative status handed back across the managed boundary.
    #[must_use]
    pub const fn status(&self) -> i32 {
        match self {
            Self::EntryPointUnavailable(_) => STATUS_ENTRY_UNAVAILABLE,
            Self::Allocation { .. } => STATUS_ALLOCATION,
            Self::InvalidArgument { .. } => STATUS_INVALID_ARGUMENT,
            Self::EmptyArguments => STATUS_EMPTY_ARGUMENTS,
            Self::TooManyArguments { .. } => STATUS_TOO_MANY_ARGUMENTS,
        }
    }
}

impl From<ResolutionError> for LaunchError {
    fn from(err: ResolutionError) -> Self {
        Self::EntryPointUnavailable(err)
    }
}

//! Trap classification and relay planning.
//!
//! The relay itself runs in the ABI crate inside a signal handler; this module
//! holds the pieces of its decision that need no OS access, so they can be
//! tested as ordinary code.

/// One past the highest signal number (Linux and bionic `NSIG`).
pub const NSIG: usize = 65;

pub const SIGHUP: i32 = 1;
pub const SIGINT: i32 = 2;
pub const SIGQUIT: i32 = 3;
pub const SIGILL: i32 = 4;
pub const SIGTRAP: i32 = 5;
pub const SIGABRT: i32 = 6;
pub const SIGBUS: i32 = 7;
pub const SIGFPE: i32 = 8;
pub const SIGKILL: i32 = 9;
pub const SIGUSR1: i32 = 10;
pub const SIGSEGV: i32 = 11;
pub const SIGUSR2: i32 = 12;
pub const SIGPIPE: i32 = 13;
pub const SIGALRM: i32 = 14;
pub const SIGTERM: i32 = 15;
pub const SIGSTKFLT: i32 = 16;
pub const SIGCHLD: i32 = 17;
pub const SIGCONT: i32 = 18;
pub const SIGSTOP: i32 = 19;
pub const SIGTSTP: i32 = 20;
pub const SIGTTIN: i32 = 21;
pub const SIGTTOU: i32 = 22;
pub const SIGURG: i32 = 23;
pub const SIGXCPU: i32 = 24;
pub const SIGXFSZ: i32 = 25;
pub const SIGVTALRM: i32 = 26;
pub const SIGPROF: i32 = 27;
pub const SIGWINCH: i32 = 28;
pub const SIGIO: i32 = 29;
pub const SIGPWR: i32 = 30;
pub const SIGSYS: i32 = 31;

/// Returns `true` if `signum` names a signal at all.
#[inline]
pub fn valid_signal(signum: i32) -> bool {
    signum > 0 && (signum as usize) < NSIG
}

/// Returns `true` if a handler may be installed for `signum`.
///
/// The OS may still refuse individual numbers (glibc reserves two realtime
/// signals for its own threads); the installer records those as skipped.
#[inline]
pub fn catchable_signal(signum: i32) -> bool {
    valid_signal(signum) && signum != SIGKILL && signum != SIGSTOP
}

/// Returns `true` if the OS default action for `signum` stops the process
/// instead of ending it.
#[must_use]
pub const fn stops_by_default(signum: i32) -> bool {
    matches!(signum, SIGSTOP | SIGTSTP | SIGTTIN | SIGTTOU)
}

/// Short name for diagnostics.
#[must_use]
pub fn signal_name(signum: i32) -> &'static str {
    match signum {
        SIGHUP => "SIGHUP",
        SIGINT => "SIGINT",
        SIGQUIT => "SIGQUIT",
        SIGILL => "SIGILL",
        SIGTRAP => "SIGTRAP",
        SIGABRT => "SIGABRT",
        SIGBUS => "SIGBUS",
        SIGFPE => "SIGFPE",
        SIGKILL => "SIGKILL",
        SIGUSR1 => "SIGUSR1",
        SIGSEGV => "SIGSEGV",
        SIGUSR2 => "SIGUSR2",
        SIGPIPE => "SIGPIPE",
        SIGALRM => "SIGALRM",
        SIGTERM => "SIGTERM",
        SIGSTKFLT => "SIGSTKFLT",
        SIGCHLD => "SIGCHLD",
        SIGCONT => "SIGCONT",
        SIGSTOP => "SIGSTOP",
        SIGTSTP => "SIGTSTP",
        SIGTTIN => "SIGTTIN",
        SIGTTOU => "SIGTTOU",
        SIGURG => "SIGURG",
        SIGXCPU => "SIGXCPU",
        SIGXFSZ => "SIGXFSZ",
        SIGVTALRM => "SIGVTALRM",
        SIGPROF => "SIGPROF",
        SIGWINCH => "SIGWINCH",
        SIGIO => "SIGIO",
        SIGPWR => "SIGPWR",
        SIGSYS => "SIGSYS",
        n if valid_signal(n) => "SIGRT",
        _ => "invalid",
    }
}

/// Per-signal relay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrapState {
    /// The relay does not own this signal; the OS action applies.
    Unhandled,
    /// The relay owns the signal but no target handler is attached.
    Relayed,
    /// Traps are delegated to the runtime's fault handler.
    TargetActive,
}

impl TrapState {
    #[must_use]
    pub const fn from_parts(captured: bool, target_present: bool) -> Self {
        match (captured, target_present) {
            (false, _) => Self::Unhandled,
            (true, false) => Self::Relayed,
            (true, true) => Self::TargetActive,
        }
    }
}

/// What was registered for a signal before the relay took over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviousDisposition {
    /// `SIG_DFL`.
    Default,
    /// `SIG_IGN`.
    Ignore,
    /// Plain `void (*)(int)` handler.
    Handler,
    /// Three-argument `SA_SIGINFO` handler.
    SigInfoHandler,
}

impl PreviousDisposition {
    /// Classify a raw `sa_sigaction` value and `SA_SIGINFO` presence.
    #[must_use]
    pub const fn classify(handler: usize, sig_default: usize, sig_ignore: usize, siginfo: bool) -> Self {
        if handler == sig_default {
            Self::Default
        } else if handler == sig_ignore {
            Self::Ignore
        } else if siginfo {
            Self::SigInfoHandler
        } else {
            Self::Handler
        }
    }
}

/// Action the relay takes for one delivered trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayPlan {
    /// Hand the trap to the runtime's fault handler, preserving errno.
    DelegateToTarget,
    /// Invoke the previous disposition, then terminate with status 1.
    ChainThenExit(PreviousDisposition),
}

/// Exit status used when a trap had no handler able to interpret it.
pub const UNHANDLED_TRAP_STATUS: i32 = 1;

/// Decide the relay action.
#[must_use]
pub const fn plan(target_present: bool, previous: PreviousDisposition) -> RelayPlan {
    if target_present {
        RelayPlan::DelegateToTarget
    } else {
        RelayPlan::ChainThenExit(previous)
    }
}

/// Result of a relay installation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallOutcome {
    /// The relay took over `relayed` signals; the OS refused `skipped`.
    Installed { relayed: usize, skipped: usize },
    /// The relay was already installed; nothing was touched.
    AlreadyInstalled,
}

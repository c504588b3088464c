//! Trap relay: one process-wide handler in front of every catchable signal.
//!
//! [`install`] swaps the relay in for each catchable signal and records what
//! was registered before, per signal number, in a fixed table. From then on
//! every trap is either handed to the runtime's fault handler (when one has
//! been attached with [`attach_target`]) with errno preserved, or chained to
//! the recorded disposition followed by `_exit(1)`.
//!
//! Table discipline: a single writer fills the table while the install state
//! is `INSTALLING`; each slot is published by its `captured` flag (Release)
//! and read only after observing that flag (Acquire). Nothing is written once
//! the state reaches `INSTALLED`.

use std::cell::UnsafeCell;
use std::ffi::{c_int, c_void};
use std::fmt::Write as _;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use jrebridge_core::ResolutionError;
use jrebridge_core::config::FAULT_SYMBOL;
use jrebridge_core::signal::{
    self, InstallOutcome, NSIG, PreviousDisposition, RelayPlan, TrapState, UNHANDLED_TRAP_STATUS,
};
use log::{debug, warn};

use crate::errno_abi::ErrnoGuard;
use crate::loader::Library;

/// `int JVM_handle_linux_signal(int sig, siginfo_t *info, void *ucontext, int abort_if_unrecognized)`.
pub type TargetFaultHandler =
    unsafe extern "C" fn(c_int, *mut libc::siginfo_t, *mut c_void, c_int) -> c_int;

type SigInfoHandler = extern "C" fn(c_int, *mut libc::siginfo_t, *mut c_void);
type PlainHandler = extern "C" fn(c_int);

/// Passed as `abort_if_unrecognized`: the relay has nowhere better to send it.
const ABORT_IF_UNRECOGNIZED: c_int = 1;

const STATE_UNINSTALLED: u8 = 0;
const STATE_INSTALLING: u8 = 1;
const STATE_INSTALLED: u8 = 2;

struct HandlerTable {
    state: AtomicU8,
    captured: [AtomicBool; NSIG],
    previous: UnsafeCell<[MaybeUninit<libc::sigaction>; NSIG]>,
}

// SAFETY: see the module-level table discipline.
unsafe impl Sync for HandlerTable {}

impl HandlerTable {
    const fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_UNINSTALLED),
            captured: [const { AtomicBool::new(false) }; NSIG],
            previous: UnsafeCell::new([const { MaybeUninit::uninit() }; NSIG]),
        }
    }

    fn slot(&self, signum: usize) -> *mut libc::sigaction {
        debug_assert!(signum < NSIG);
        // SAFETY: in bounds; MaybeUninit<T> has the layout of T.
        unsafe { self.previous.get().cast::<libc::sigaction>().add(signum) }
    }

    fn previous(&self, signum: c_int) -> Option<&libc::sigaction> {
        if !signal::valid_signal(signum) {
            return None;
        }
        let idx = signum as usize;
        if !self.captured[idx].load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: the captured flag publishes a fully written, never rewritten slot.
        Some(unsafe { &*self.slot(idx) })
    }
}

static TABLE: HandlerTable = HandlerTable::new();
static TARGET: AtomicUsize = AtomicUsize::new(0);

// ---------------------------------------------------------------------------
// Installation
// ---------------------------------------------------------------------------

/// Take over every catchable signal.
///
/// Only the first call does anything. Later calls wait until that first
/// installation has finished, then return
/// [`InstallOutcome::AlreadyInstalled`]: re-running the takeover would record
/// the relay itself as the "previous" handler and lose the original one.
pub fn install() -> InstallOutcome {
    if TABLE
        .state
        .compare_exchange(
            STATE_UNINSTALLED,
            STATE_INSTALLING,
            Ordering::SeqCst,
            Ordering::Relaxed,
        )
        .is_err()
    {
        // A concurrent installer may still be filling the table; nothing may
        // run that could trap until it is complete.
        while TABLE.state.load(Ordering::Acquire) != STATE_INSTALLED {
            std::thread::yield_now();
        }
        warn!(target: "jrebridge", "trap relay already installed; keeping recorded handlers");
        return InstallOutcome::AlreadyInstalled;
    }

    // SAFETY: all-zero is a valid sigaction (SIG_DFL, no flags, empty mask).
    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    let handler: SigInfoHandler = relay;
    action.sa_sigaction = handler as libc::sighandler_t;
    action.sa_flags = libc::SA_SIGINFO | libc::SA_RESTART;
    // SAFETY: sa_mask is a valid sigset_t owned by `action`.
    unsafe { libc::sigemptyset(&mut action.sa_mask) };

    let mut relayed = 0usize;
    let mut skipped = 0usize;
    for signum in 1..NSIG as c_int {
        if !signal::catchable_signal(signum) {
            continue;
        }
        let idx = signum as usize;
        // SAFETY: `action` is initialized; the slot is writable and only this
        // thread writes it (state is INSTALLING).
        let rc = unsafe { libc::sigaction(signum, &action, TABLE.slot(idx)) };
        if rc == 0 {
            TABLE.captured[idx].store(true, Ordering::Release);
            relayed += 1;
        } else {
            skipped += 1;
        }
    }

    TABLE.state.store(STATE_INSTALLED, Ordering::Release);
    debug!(target: "jrebridge", "trap relay ready: {relayed} signals relayed, {skipped} refused");
    InstallOutcome::Installed { relayed, skipped }
}

#[must_use]
pub fn is_installed() -> bool {
    TABLE.state.load(Ordering::Acquire) == STATE_INSTALLED
}

// ---------------------------------------------------------------------------
// Target fault handler
// ---------------------------------------------------------------------------

/// Route subsequent traps to `handler`.
pub fn attach_target(handler: TargetFaultHandler) {
    TARGET.store(handler as usize, Ordering::Release);
    debug!(target: "jrebridge", "fault handler attached");
}

#[must_use]
pub fn target_handler() -> Option<TargetFaultHandler> {
    let raw = TARGET.load(Ordering::Acquire);
    if raw == 0 {
        return None;
    }
    // SAFETY: only `attach_target` stores non-zero values, always a TargetFaultHandler.
    Some(unsafe { std::mem::transmute::<usize, TargetFaultHandler>(raw) })
}

/// Look up the fault handler exported by `library`.
pub fn resolve_target(library: &Library) -> Result<TargetFaultHandler, ResolutionError> {
    // SAFETY: JVM_handle_linux_signal has had this signature since JDK 6.
    unsafe { library.function::<TargetFaultHandler>(FAULT_SYMBOL) }
}

/// Attach the fault handler from `library` if none is attached yet.
///
/// Returns whether a handler is attached afterwards.
pub fn attach_from(library: &Library) -> bool {
    if target_handler().is_some() {
        return true;
    }
    match resolve_target(library) {
        Ok(handler) => {
            attach_target(handler);
            true
        }
        Err(err) => {
            debug!(target: "jrebridge", "no fault handler in {}: {err}", library.name());
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Introspection
// ---------------------------------------------------------------------------

#[must_use]
pub fn trap_state(signum: c_int) -> TrapState {
    TrapState::from_parts(TABLE.previous(signum).is_some(), target_handler().is_some())
}

/// Disposition recorded for `signum`; `Default` when nothing was recorded.
#[must_use]
pub fn previous_disposition(signum: c_int) -> PreviousDisposition {
    match TABLE.previous(signum) {
        Some(old) => PreviousDisposition::classify(
            old.sa_sigaction,
            libc::SIG_DFL,
            libc::SIG_IGN,
            old.sa_flags & libc::SA_SIGINFO != 0,
        ),
        None => PreviousDisposition::Default,
    }
}

/// Raw handler address recorded for `signum`.
#[must_use]
pub fn previous_handler(signum: c_int) -> Option<usize> {
    TABLE.previous(signum).map(|old| old.sa_sigaction)
}

// ---------------------------------------------------------------------------
// Signal context
// ---------------------------------------------------------------------------

extern "C" fn relay(signum: c_int, info: *mut libc::siginfo_t, context: *mut c_void) {
    let target = target_handler();
    match signal::plan(target.is_some(), previous_disposition(signum)) {
        RelayPlan::DelegateToTarget => {
            if let Some(handler) = target {
                let _errno = ErrnoGuard::save();
                // SAFETY: handler came from the runtime and expects exactly
                // these kernel-provided arguments.
                unsafe { handler(signum, info, context, ABORT_IF_UNRECOGNIZED) };
            }
        }
        RelayPlan::ChainThenExit(previous) => {
            note_unhandled(signum, info);
            // SAFETY: called from the handler for `signum` with its own arguments.
            unsafe { chain_previous(signum, previous, info, context) };
            // SAFETY: _exit is async-signal-safe.
            unsafe { libc::_exit(UNHANDLED_TRAP_STATUS) };
        }
    }
}

unsafe fn chain_previous(
    signum: c_int,
    previous: PreviousDisposition,
    info: *mut libc::siginfo_t,
    context: *mut c_void,
) {
    let raw = previous_handler(signum).unwrap_or(libc::SIG_DFL);
    match previous {
        PreviousDisposition::Ignore => {}
        PreviousDisposition::Handler => {
            // SAFETY: recorded without SA_SIGINFO, so it is a one-argument handler.
            let handler = unsafe { std::mem::transmute::<usize, PlainHandler>(raw) };
            handler(signum);
        }
        PreviousDisposition::SigInfoHandler => {
            // SAFETY: recorded with SA_SIGINFO, so it is a three-argument handler.
            let handler = unsafe { std::mem::transmute::<usize, SigInfoHandler>(raw) };
            handler(signum, info, context);
        }
        // A stop would park the process until SIGCONT; the caller exits instead.
        PreviousDisposition::Default if signal::stops_by_default(signum) => {}
        // SAFETY: still inside the handler for `signum`.
        PreviousDisposition::Default => unsafe { reraise_default(signum) },
    }
}

/// Apply the OS default action for `signum` now.
unsafe fn reraise_default(signum: c_int) {
    // SAFETY: all-zero is SIG_DFL with an empty mask.
    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    action.sa_sigaction = libc::SIG_DFL;
    // SAFETY: sigset_t is plain data; sigemptyset below initializes it.
    let mut unblock: libc::sigset_t = unsafe { std::mem::zeroed() };
    // SAFETY: plain libc calls on locals; all async-signal-safe.
    unsafe {
        libc::sigemptyset(&mut action.sa_mask);
        libc::sigaction(signum, &action, ptr::null_mut());
        libc::sigemptyset(&mut unblock);
        libc::sigaddset(&mut unblock, signum);
        libc::raise(signum);
        // The signal is blocked while its handler runs; unblocking delivers it.
        libc::pthread_sigmask(libc::SIG_UNBLOCK, &unblock, ptr::null_mut());
    }
}

/// Fixed-capacity formatter for diagnostics written from signal context.
struct NoteBuf {
    buf: [u8; 160],
    len: usize,
}

impl NoteBuf {
    const fn new() -> Self {
        Self {
            buf: [0; 160],
            len: 0,
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl std::fmt::Write for NoteBuf {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        let room = self.buf.len() - self.len;
        let n = s.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        if n < s.len() {
            Err(std::fmt::Error)
        } else {
            Ok(())
        }
    }
}

/// Best-effort note on fd 2; never allocates.
fn note_unhandled(signum: c_int, info: *const libc::siginfo_t) {
    let (code, addr) = if info.is_null() {
        (0, ptr::null_mut())
    } else {
        // SAFETY: the kernel passes a valid siginfo_t for SA_SIGINFO handlers.
        unsafe { ((*info).si_code, (*info).si_addr()) }
    };
    let mut note = NoteBuf::new();
    let _ = writeln!(
        note,
        "jrebridge: process killed with signal {signum} ({}) code {code} addr {addr:p}",
        signal::signal_name(signum)
    );
    let bytes = note.as_bytes();
    // SAFETY: write(2) is async-signal-safe; the buffer outlives the call.
    unsafe { libc::write(libc::STDERR_FILENO, bytes.as_ptr().cast(), bytes.len()) };
}

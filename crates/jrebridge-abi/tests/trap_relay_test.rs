#![cfg(target_os = "linux")]
//! Trap relay scenarios.
//!
//! Each scenario replaces process-wide signal dispositions and most end the
//! process, so they run in a fresh copy of this test binary: the parent test
//! re-executes itself with `TRAP_SCENARIO_ENV` set and only
//! `trap_scenario_child` does any work there.

use std::ffi::{c_char, c_int, c_void};
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use jni::sys::{jboolean, jint};
use jrebridge::errno_abi::{errno, set_errno};
use jrebridge::launch::JliLaunchFn;
use jrebridge::trap::{self, TargetFaultHandler};
use jrebridge::{EntryResolver, Launcher};
use jrebridge_core::ResolutionError;
use jrebridge_core::signal::{InstallOutcome, PreviousDisposition, TrapState};

const TRAP_SCENARIO_ENV: &str = "JREBRIDGE_TRAP_SCENARIO";
const CHILD_TEST: &str = "trap_scenario_child";

fn mark(text: &str) {
    // SAFETY: plain write(2) of a live buffer.
    unsafe { libc::write(libc::STDOUT_FILENO, text.as_ptr().cast(), text.len()) };
}

extern "C" fn previous_usr2(_signum: c_int) {
    mark("previous-handler:SIGUSR2\n");
}

static TARGET_HITS: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn recovering_target(
    signum: c_int,
    _info: *mut libc::siginfo_t,
    _context: *mut c_void,
    abort_if_unrecognized: c_int,
) -> c_int {
    TARGET_HITS.fetch_add(1, Ordering::SeqCst);
    set_errno(99);
    if signum == libc::SIGUSR1 && abort_if_unrecognized == 1 {
        mark("target-handled:SIGUSR1\n");
    }
    1
}

fn set_plain_handler(signum: c_int, handler: extern "C" fn(c_int)) -> usize {
    let raw = handler as libc::sighandler_t;
    // SAFETY: installing a plain handler for a catchable signal.
    unsafe { libc::signal(signum, raw) };
    raw
}

fn raise(signum: c_int) {
    // SAFETY: raise has no preconditions.
    unsafe { libc::raise(signum) };
}

fn run_unhandled_chains_previous() {
    let previous = set_plain_handler(libc::SIGUSR2, previous_usr2);
    assert!(matches!(trap::install(), InstallOutcome::Installed { .. }));
    assert_eq!(trap::previous_handler(libc::SIGUSR2), Some(previous));
    assert_eq!(trap::trap_state(libc::SIGUSR2), TrapState::Relayed);
    mark("installed\n");
    raise(libc::SIGUSR2);
    mark("unreachable\n");
}

fn run_unhandled_default_reraises() {
    assert!(matches!(trap::install(), InstallOutcome::Installed { .. }));
    assert_eq!(
        trap::previous_disposition(libc::SIGUSR1),
        PreviousDisposition::Default
    );
    mark("installed\n");
    raise(libc::SIGUSR1);
    mark("unreachable\n");
}

fn run_target_preserves_errno() {
    assert!(matches!(trap::install(), InstallOutcome::Installed { .. }));
    trap::attach_target(recovering_target);
    assert_eq!(trap::trap_state(libc::SIGUSR1), TrapState::TargetActive);
    set_errno(7);
    raise(libc::SIGUSR1);
    let after = errno();
    mark(if after == 7 { "errno-preserved\n" } else { "errno-clobbered\n" });
}

fn run_reinstall_keeps_original() {
    let previous = set_plain_handler(libc::SIGUSR2, previous_usr2);
    assert!(matches!(trap::install(), InstallOutcome::Installed { .. }));
    assert_eq!(trap::install(), InstallOutcome::AlreadyInstalled);
    assert!(trap::is_installed());
    assert_eq!(trap::previous_handler(libc::SIGUSR2), Some(previous));
    mark("reinstalled\n");
    raise(libc::SIGUSR2);
    mark("unreachable\n");
}

fn run_unhandled_stop_signal_exits() {
    // SAFETY: restoring the default disposition of a catchable signal.
    unsafe { libc::signal(libc::SIGTSTP, libc::SIG_DFL) };
    assert!(matches!(trap::install(), InstallOutcome::Installed { .. }));
    assert_eq!(
        trap::previous_disposition(libc::SIGTSTP),
        PreviousDisposition::Default
    );
    mark("installed\n");
    raise(libc::SIGTSTP);
    mark("unreachable\n");
}

fn run_concurrent_install_waits() {
    const THREADS: usize = 8;
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                let outcome = trap::install();
                (outcome, trap::is_installed(), trap::trap_state(libc::SIGSEGV))
            })
        })
        .collect();
    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("installer thread"))
        .collect();

    let installed = results
        .iter()
        .filter(|(outcome, ..)| matches!(outcome, InstallOutcome::Installed { .. }))
        .count();
    assert_eq!(installed, 1, "{results:?}");
    for (outcome, ready, state) in &results {
        assert!(*ready, "{outcome:?} returned before the table was complete");
        assert_eq!(*state, TrapState::Relayed);
    }
    mark("installs-consistent\n");
}

/// Entry point that traps mid-run, the way a JVM does on a safepoint poll.
unsafe extern "C" fn trapping_entry(
    _argc: c_int,
    _argv: *mut *mut c_char,
    _jargc: c_int,
    _jargv: *const *const c_char,
    _appclassc: c_int,
    _appclassv: *const *const c_char,
    _fullversion: *const c_char,
    _dotversion: *const c_char,
    _pname: *const c_char,
    _lname: *const c_char,
    _javaargs: jboolean,
    _cpwildcard: jboolean,
    _javaw: jboolean,
    _ergo: jint,
) -> jint {
    set_errno(7);
    raise(libc::SIGUSR1);
    mark(if errno() == 7 { "errno-preserved\n" } else { "errno-clobbered\n" });
    7
}

/// Resolves the trapping entry and offers `recovering_target` as fault handler.
struct TrappingRuntime;

impl EntryResolver for TrappingRuntime {
    fn launch_entry(&self) -> Result<JliLaunchFn, ResolutionError> {
        Ok(trapping_entry as JliLaunchFn)
    }

    fn fault_handler(&self) -> Option<TargetFaultHandler> {
        Some(recovering_target as TargetFaultHandler)
    }
}

fn run_coordinator_attaches_fault_handler() {
    assert!(!trap::is_installed());
    assert!(trap::target_handler().is_none());

    let status = Launcher::new(TrappingRuntime)
        .launch(&["java", "-version"])
        .expect("launch through the coordinator");

    assert!(trap::is_installed());
    assert!(trap::target_handler().is_some());
    assert_eq!(trap::trap_state(libc::SIGUSR1), TrapState::TargetActive);
    let hits = TARGET_HITS.load(Ordering::SeqCst);
    mark(&format!("status={status} hits={hits}\n"));
}

#[test]
fn trap_scenario_child() {
    let Ok(scenario) = std::env::var(TRAP_SCENARIO_ENV) else {
        return;
    };
    match scenario.as_str() {
        "unhandled-chains-previous" => run_unhandled_chains_previous(),
        "unhandled-default-reraises" => run_unhandled_default_reraises(),
        "target-preserves-errno" => run_target_preserves_errno(),
        "reinstall-keeps-original" => run_reinstall_keeps_original(),
        "unhandled-stop-signal-exits" => run_unhandled_stop_signal_exits(),
        "concurrent-install-waits" => run_concurrent_install_waits(),
        "coordinator-attaches-fault-handler" => run_coordinator_attaches_fault_handler(),
        other => panic!("unknown trap scenario {other}"),
    }
}

fn run_scenario(name: &str) -> Output {
    let exe = std::env::current_exe().expect("test binary path");
    Command::new(exe)
        .args([CHILD_TEST, "--exact", "--nocapture", "--test-threads=1"])
        .env(TRAP_SCENARIO_ENV, name)
        .output()
        .expect("spawn scenario child")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn unhandled_trap_chains_previous_handler_then_exits() {
    let output = run_scenario("unhandled-chains-previous");
    let stdout = stdout_of(&output);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(stdout.contains("installed"), "{stdout}");
    assert!(stdout.contains("previous-handler:SIGUSR2"), "{stdout}");
    assert!(!stdout.contains("unreachable"), "{stdout}");
    assert_eq!(output.status.code(), Some(1), "{stdout}\n{stderr}");
    assert!(stderr.contains("killed with signal 12 (SIGUSR2)"), "{stderr}");
}

#[test]
fn unhandled_trap_with_default_disposition_terminates_by_signal() {
    let output = run_scenario("unhandled-default-reraises");
    let stdout = stdout_of(&output);

    assert!(stdout.contains("installed"), "{stdout}");
    assert!(!stdout.contains("unreachable"), "{stdout}");
    assert_eq!(output.status.signal(), Some(libc::SIGUSR1), "{stdout}");
}

#[test]
fn target_handler_sees_trap_and_errno_survives() {
    let output = run_scenario("target-preserves-errno");
    let stdout = stdout_of(&output);

    assert!(stdout.contains("target-handled:SIGUSR1"), "{stdout}");
    assert!(stdout.contains("errno-preserved"), "{stdout}");
    assert!(output.status.success(), "{stdout}");
}

#[test]
fn second_install_keeps_original_previous_handlers() {
    let output = run_scenario("reinstall-keeps-original");
    let stdout = stdout_of(&output);

    assert!(stdout.contains("reinstalled"), "{stdout}");
    assert!(stdout.contains("previous-handler:SIGUSR2"), "{stdout}");
    assert_eq!(output.status.code(), Some(1), "{stdout}");
}

#[test]
fn unhandled_stop_signal_exits_instead_of_stopping() {
    let output = run_scenario("unhandled-stop-signal-exits");
    let stdout = stdout_of(&output);

    assert!(stdout.contains("installed"), "{stdout}");
    assert!(!stdout.contains("unreachable"), "{stdout}");
    assert_eq!(output.status.code(), Some(1), "{stdout}");
}

#[test]
fn concurrent_installers_return_only_after_table_is_complete() {
    let output = run_scenario("concurrent-install-waits");
    let stdout = stdout_of(&output);

    assert!(stdout.contains("installs-consistent"), "{stdout}");
    assert!(output.status.success(), "{stdout}");
}

#[test]
fn coordinator_installs_relay_and_attaches_resolver_fault_handler() {
    let output = run_scenario("coordinator-attaches-fault-handler");
    let stdout = stdout_of(&output);

    assert!(stdout.contains("target-handled:SIGUSR1"), "{stdout}");
    assert!(stdout.contains("errno-preserved"), "{stdout}");
    assert!(stdout.contains("status=7 hits=1"), "{stdout}");
    assert!(output.status.success(), "{stdout}");
}

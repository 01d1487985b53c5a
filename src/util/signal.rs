//! User interruption (SIGINT) tracking.
//!
//! The first interrupt only raises a flag that long-running loops poll, so that
//! mounted bundles get released before the process exits. A second interrupt
//! terminates immediately.

use std::sync::atomic::{AtomicBool, Ordering};

/// Exit code used when the run was interrupted by the user.
pub const INTERRUPTED_EXIT_CODE: i32 = 2;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn handle_sigint(_signal: libc::c_int) {
    if INTERRUPTED.swap(true, Ordering::SeqCst) {
        // SAFETY: _exit is async-signal-safe.
        unsafe { libc::_exit(INTERRUPTED_EXIT_CODE) };
    }
}

/// Install the SIGINT handler.
#[cfg(unix)]
pub fn install_interrupt_handler() {
    let handler = handle_sigint as extern "C" fn(libc::c_int);

    // SAFETY: the handler only touches an atomic and calls _exit.
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
pub fn install_interrupt_handler() {}

/// Whether the user asked to stop.
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

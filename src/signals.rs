// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Process-wide signal state. The handler performs a single atomic bit
//! operation, which is async-signal-safe; everything that reacts to a
//! signal (cache flush, shutdown) runs on a regular thread that polls
//! these bits.

use std::sync::atomic::{AtomicU32, Ordering};

/// Set while the server should keep accepting and serving.
const ENABLED: u32 = 0x01;
/// A `SIGUSR1` arrived; the acceptor flushes the cache and clears the bit.
const FLUSH_REQUESTED: u32 = 0x02;
/// A `SIGTERM`/`SIGINT` arrived (or shutdown was requested in-process).
const TERMINATING: u32 = 0x04;

static STATE: AtomicU32 = AtomicU32::new(ENABLED);

extern "C" fn handle_signal(signal: libc::c_int) {
    match signal {
        libc::SIGUSR1 => {
            STATE.fetch_or(FLUSH_REQUESTED, Ordering::SeqCst);
        }
        libc::SIGTERM | libc::SIGINT => {
            STATE.fetch_and(!ENABLED, Ordering::SeqCst);
            STATE.fetch_or(TERMINATING, Ordering::SeqCst);
        }
        _ => {}
    }
}

/// Install the handler for `SIGUSR1`, `SIGTERM` and `SIGINT`. Idempotent.
pub fn install() {
    // SAFETY: the handler has a stable address and only performs atomic
    // stores, which are async-signal-safe per POSIX.
    unsafe {
        libc::signal(libc::SIGUSR1, handle_signal as *const () as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handle_signal as *const () as libc::sighandler_t);
        libc::signal(libc::SIGINT, handle_signal as *const () as libc::sighandler_t);
    }
}

pub fn enabled() -> bool {
    STATE.load(Ordering::SeqCst) & ENABLED != 0
}

/// Consume a pending flush request. Returns whether one was pending; at
/// most one caller observes each request.
pub fn take_flush_request() -> bool {
    STATE.fetch_and(!FLUSH_REQUESTED, Ordering::SeqCst) & FLUSH_REQUESTED != 0
}

/// Enter the terminating state, exactly as the `SIGTERM` handler would.
/// Used by [`crate::Digestcache::shutdown`] so tests drive the real
/// shutdown path without delivering a fatal signal.
pub fn request_termination() {
    STATE.fetch_and(!ENABLED, Ordering::SeqCst);
    STATE.fetch_or(TERMINATING, Ordering::SeqCst);
}

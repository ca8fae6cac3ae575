//! Fatal-event handling and the deregistration guard.

mod common;

use std::sync::atomic::Ordering;
use std::thread;

use common::{context, fakes, with_counted_logs, FAKE_FD};
use ibctx::{AccessFlags, AsyncEvent};

#[test]
fn deregistration_before_fatal_event_reaches_hardware() {
    let (verbs, dispatcher) = fakes();
    let ctx = context(&verbs, &dispatcher);

    let mr = ctx
        .mem_reg(0x1000, 4096, AccessFlags::LOCAL_WRITE)
        .expect("mem_reg");
    ctx.mem_dereg(mr);

    assert_eq!(verbs.dereg_mr_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn deregistration_after_fatal_event_is_a_no_op() {
    let (verbs, dispatcher) = fakes();
    let ctx = context(&verbs, &dispatcher);

    let mr = ctx
        .mem_reg(0x1000, 4096, AccessFlags::LOCAL_WRITE | AccessFlags::REMOTE_WRITE)
        .expect("mem_reg");

    dispatcher.deliver(FAKE_FD, AsyncEvent::DeviceFatal);
    assert!(ctx.is_removed());

    // The hardware resource is already gone; the native call is skipped.
    ctx.mem_dereg(mr);
    assert_eq!(verbs.dereg_mr_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn registration_still_succeeds_after_fatal_event() {
    // Only deregistration is guarded by the removal flag; registration
    // passes through to the hardware call regardless.
    let (verbs, dispatcher) = fakes();
    let ctx = context(&verbs, &dispatcher);

    dispatcher.deliver(FAKE_FD, AsyncEvent::DeviceFatal);

    let mr = ctx
        .mem_reg(0x2000, 4096, AccessFlags::LOCAL_WRITE | AccessFlags::REMOTE_WRITE)
        .expect("mem_reg");
    assert_eq!(verbs.reg_mr_calls.load(Ordering::SeqCst), 1);
    drop(mr);
    assert_eq!(verbs.dereg_mr_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn fatal_event_unregisters_from_dispatcher_once() {
    let (verbs, dispatcher) = fakes();
    let ctx = context(&verbs, &dispatcher);

    dispatcher.deliver(FAKE_FD, AsyncEvent::DeviceFatal);
    assert_eq!(dispatcher.unregistered.load(Ordering::SeqCst), 1);

    // A duplicate fatal event no longer reaches the monitor, and the
    // context's own teardown does not unregister a second time.
    dispatcher.deliver(FAKE_FD, AsyncEvent::DeviceFatal);
    drop(ctx);
    assert_eq!(dispatcher.unregistered.load(Ordering::SeqCst), 1);
    let _ = verbs;
}

#[test]
fn non_fatal_events_are_ignored() {
    let (verbs, dispatcher) = fakes();
    let ctx = context(&verbs, &dispatcher);

    dispatcher.deliver(FAKE_FD, AsyncEvent::PortActive(1));
    dispatcher.deliver(FAKE_FD, AsyncEvent::PortError(1));
    dispatcher.deliver(FAKE_FD, AsyncEvent::GidChange(1));
    dispatcher.deliver(FAKE_FD, AsyncEvent::Other(42));

    assert!(!ctx.is_removed());
    assert_eq!(dispatcher.unregistered.load(Ordering::SeqCst), 0);

    // Deregistration still takes the native path.
    let mr = ctx
        .mem_reg(0x1000, 4096, AccessFlags::LOCAL_WRITE)
        .expect("mem_reg");
    ctx.mem_dereg(mr);
    assert_eq!(verbs.dereg_mr_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn fatal_event_from_dispatcher_thread_is_visible() {
    let (verbs, dispatcher) = fakes();
    let ctx = context(&verbs, &dispatcher);

    let dispatcher2 = dispatcher.clone();
    thread::spawn(move || {
        dispatcher2.deliver(FAKE_FD, AsyncEvent::DeviceFatal);
    })
    .join()
    .expect("dispatcher thread");

    assert!(ctx.is_removed());
    let _ = verbs;
}

#[test]
fn dereg_failure_is_logged_not_escalated() {
    let (verbs, dispatcher) = fakes();
    let ctx = context(&verbs, &dispatcher);

    let mr = ctx
        .mem_reg(0x1000, 4096, AccessFlags::LOCAL_WRITE)
        .expect("mem_reg");

    verbs.fail_dereg_mr.store(true, Ordering::Relaxed);
    let ((), counts) = with_counted_logs(|| ctx.mem_dereg(mr));

    // The native call ran, failed, and was reported at error severity;
    // from the caller's perspective the registration is released.
    assert_eq!(verbs.dereg_mr_calls.load(Ordering::SeqCst), 1);
    assert_eq!(counts.errors.load(Ordering::SeqCst), 1);
}

#[test]
fn context_drop_after_fatal_event_is_clean() {
    let (verbs, dispatcher) = fakes();
    let ctx = context(&verbs, &dispatcher);

    dispatcher.deliver(FAKE_FD, AsyncEvent::DeviceFatal);
    drop(ctx);

    // PD release is still attempted at teardown; the dealloc error path
    // is the provider's to report.
    assert_eq!(verbs.dealloc_pd_calls.load(Ordering::SeqCst), 1);
}

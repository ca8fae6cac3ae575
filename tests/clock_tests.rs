//! Clock-mode selection through full context construction.

mod common;

use std::sync::atomic::Ordering;

use common::{fakes, with_counted_logs};
use ibctx::{ClockConverter, ClockMode, ContextConfig, DeviceContext};

fn construct(
    verbs: &std::sync::Arc<ibctx::test_utils::FakeVerbs>,
    dispatcher: &std::sync::Arc<ibctx::test_utils::FakeDispatcher>,
    mode: ClockMode,
) -> DeviceContext {
    DeviceContext::new(
        verbs.clone(),
        dispatcher.clone(),
        mode,
        ContextConfig::default(),
    )
    .expect("context construction")
}

#[test]
fn disabled_mode_issues_no_clock_queries() {
    let (verbs, dispatcher) = fakes();
    let ctx = construct(&verbs, &dispatcher, ClockMode::Disabled);

    assert_eq!(ctx.converter_mode(), ClockMode::Disabled);
    assert_eq!(verbs.core_clock_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn ptp_selected_when_device_supports_it() {
    let (verbs, dispatcher) = fakes();
    let ctx = construct(&verbs, &dispatcher, ClockMode::HardwarePtp);

    assert_eq!(ctx.converter_mode(), ClockMode::HardwarePtp);
}

#[test]
fn ptp_falls_back_to_software_sync_with_one_warning() {
    let (verbs, dispatcher) = fakes();
    *verbs.core_clock_hz.lock().unwrap() = Some(1_000_000_000);
    *verbs.clock_info.lock().unwrap() = None;

    let (ctx, counts) =
        with_counted_logs(|| construct(&verbs, &dispatcher, ClockMode::HardwarePtp));

    assert_eq!(
        *ctx.converter(),
        ClockConverter::SoftwareSync {
            core_clock_hz: 1_000_000_000
        }
    );
    assert_eq!(counts.warnings.load(Ordering::SeqCst), 1);
}

#[test]
fn missing_core_clock_disables_conversion_with_warning() {
    let (verbs, dispatcher) = fakes();
    *verbs.core_clock_hz.lock().unwrap() = None;

    let (ctx, counts) =
        with_counted_logs(|| construct(&verbs, &dispatcher, ClockMode::SoftwareSync));

    assert_eq!(*ctx.converter(), ClockConverter::Disabled);
    assert_eq!(counts.warnings.load(Ordering::SeqCst), 1);
}

#[test]
fn software_sync_uses_device_frequency() {
    let (verbs, dispatcher) = fakes();
    *verbs.core_clock_hz.lock().unwrap() = Some(156_250_000);

    let ctx = construct(&verbs, &dispatcher, ClockMode::SoftwareSync);
    assert_eq!(
        *ctx.converter(),
        ClockConverter::SoftwareSync {
            core_clock_hz: 156_250_000
        }
    );
}

#[test]
fn clock_degradation_never_aborts_construction() {
    // Neither clock query succeeding still yields a working context.
    let (verbs, dispatcher) = fakes();
    *verbs.core_clock_hz.lock().unwrap() = None;
    *verbs.clock_info.lock().unwrap() = None;

    let ctx = construct(&verbs, &dispatcher, ClockMode::HardwarePtp);
    assert_eq!(ctx.converter_mode(), ClockMode::Disabled);
    assert!(!ctx.is_removed());
}

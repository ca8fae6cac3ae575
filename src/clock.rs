//! Timestamp clock-mode selection.
//!
//! Packet timestamps can be converted to wall-clock time three ways:
//! not at all, by software synchronization against the device core clock,
//! or by the hardware PTP clock. The mode is chosen once at context
//! construction from a capability probe and a requested mode. Missing
//! clock support degrades the mode instead of failing construction, and
//! degradation is strictly one-way: PTP falls back to software sync,
//! software sync falls back to disabled, never the reverse.

use tracing::warn;

use crate::verbs::VerbsDevice;

/// Requested timestamp conversion mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    /// No timestamp conversion.
    Disabled,
    /// Software synchronization against the device core clock.
    SoftwareSync,
    /// Hardware PTP clock.
    HardwarePtp,
}

/// Hardware PTP clock parameters as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HwClockInfo {
    /// Wall-clock nanoseconds at the sample point.
    pub nsec: u64,
    /// Free-running cycle counter at the sample point.
    pub cycles: u64,
    /// Sub-nanosecond remainder at the sample point.
    pub frac: u64,
    /// Cycles-to-nanoseconds multiplier.
    pub mult: u32,
    /// Cycles-to-nanoseconds shift.
    pub shift: u16,
}

/// Clock capabilities probed from the device at construction time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockCaps {
    /// Core clock frequency in Hz, if the device supports querying it.
    pub core_clock_hz: Option<u64>,
    /// Hardware PTP clock parameters, if the query succeeded.
    pub clock_info: Option<HwClockInfo>,
}

/// The selected timestamp-conversion strategy.
///
/// Owned by the device context; selected once at construction and
/// immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockConverter {
    /// Timestamps are left raw.
    Disabled,
    /// Software synchronization using the device core clock frequency.
    SoftwareSync {
        /// Core clock frequency in Hz.
        core_clock_hz: u64,
    },
    /// Hardware PTP clock.
    HardwarePtp {
        /// Clock parameters at selection time.
        info: HwClockInfo,
    },
}

impl ClockConverter {
    /// The mode this converter operates in.
    pub fn mode(&self) -> ClockMode {
        match self {
            Self::Disabled => ClockMode::Disabled,
            Self::SoftwareSync { .. } => ClockMode::SoftwareSync,
            Self::HardwarePtp { .. } => ClockMode::HardwarePtp,
        }
    }
}

/// Probe the device clock capabilities needed for mode selection.
///
/// For `Disabled` no hardware queries are issued at all. The PTP clock
/// info is only probed when PTP was requested and the core clock is
/// available, mirroring the selection cascade: without a core clock the
/// mode degrades to `Disabled` regardless.
pub fn probe_clock_caps(verbs: &dyn VerbsDevice, requested: ClockMode) -> ClockCaps {
    if requested == ClockMode::Disabled {
        return ClockCaps::default();
    }
    let core_clock_hz = verbs.query_core_clock().ok();
    let clock_info = if requested == ClockMode::HardwarePtp && core_clock_hz.is_some() {
        verbs.query_clock_info().ok()
    } else {
        None
    };
    ClockCaps {
        core_clock_hz,
        clock_info,
    }
}

/// Select a clock converter from the requested mode and probed
/// capabilities.
///
/// Pure function of its inputs; the fallback cascade is:
/// 1. `Disabled` requested, or no core clock support: `Disabled`.
/// 2. `HardwarePtp` requested: `HardwarePtp` when the clock-info query
///    succeeded, otherwise `SoftwareSync` with the probed core clock
///    frequency (warning logged).
/// 3. Any other non-disabled mode: `SoftwareSync` with the probed
///    frequency.
pub fn select_converter(requested: ClockMode, caps: &ClockCaps) -> ClockConverter {
    if requested == ClockMode::Disabled {
        return ClockConverter::Disabled;
    }
    let Some(core_clock_hz) = caps.core_clock_hz else {
        warn!(
            ?requested,
            "device does not support core clock queries, timestamp conversion disabled"
        );
        return ClockConverter::Disabled;
    };
    match requested {
        ClockMode::HardwarePtp => match caps.clock_info {
            Some(info) => ClockConverter::HardwarePtp { info },
            None => {
                warn!(
                    core_clock_hz,
                    "hardware clock info query failed, reverting to software sync"
                );
                ClockConverter::SoftwareSync { core_clock_hz }
            }
        },
        _ => ClockConverter::SoftwareSync { core_clock_hz },
    }
}

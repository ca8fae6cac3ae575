//! Device context configuration.

use tracing::info;

/// Work-request queue depths and transmit tuning for one device context.
///
/// A read-only snapshot taken from the system configuration source at
/// context construction. [`effective()`](Self::effective) applies the
/// device-specific adjustment before the snapshot is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextConfig {
    /// Receive work-request queue depth.
    pub rx_num_wre: u32,
    /// Transmit work-request queue depth.
    pub tx_num_wre: u32,
    /// Maximum transmit payload sent inline in the WQE.
    pub tx_max_inline: u32,
    /// Number of transmit WRs between signaled completions.
    pub tx_num_to_signal: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            rx_num_wre: 16000,
            tx_num_wre: 2048,
            tx_max_inline: 220,
            tx_num_to_signal: 64,
        }
    }
}

impl ContextConfig {
    /// Compute the effective configuration for a device.
    ///
    /// The transmit queue must hold at least two full signal batches, or
    /// signal batching could overrun completion capacity; a smaller
    /// requested depth is raised to exactly `2 * tx_num_to_signal`.
    /// Idempotent: re-applying to an already-adjusted value is a no-op.
    pub fn effective(mut self) -> Self {
        let floor = self.tx_num_to_signal * 2;
        if self.tx_num_wre < floor {
            info!(
                requested = self.tx_num_wre,
                effective = floor,
                "raising tx work-request queue depth to hold two signal batches"
            );
            self.tx_num_wre = floor;
        }
        self
    }
}

//! Hardware capability surface for an opened RDMA device.
//!
//! Device discovery happens elsewhere: this crate receives an already
//! opened device as an implementation of [`VerbsDevice`] and never
//! enumerates hardware itself. Production providers wrap the native verbs
//! library; tests supply in-memory fakes.
//!
//! All methods are single synchronous calls with no timeout parameter.
//! The provider is expected to be thread-safe at the verbs-library level,
//! which is why resource calls take `&self`.

use std::io;

use bitflags::bitflags;

use crate::clock::HwClockInfo;
use crate::types::{DeviceAttr, PortAttr};

bitflags! {
    /// Memory access flags for Memory Region registration.
    ///
    /// These flags describe the desired memory protection attributes for
    /// an MR. Local read access is always enabled.
    ///
    /// # Important
    /// If `REMOTE_WRITE` or `REMOTE_ATOMIC` is set, then `LOCAL_WRITE`
    /// must also be set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: u32 {
        /// Enable local write access.
        const LOCAL_WRITE = 1 << 0;

        /// Enable remote write access.
        /// Requires `LOCAL_WRITE` to be set.
        const REMOTE_WRITE = 1 << 1;

        /// Enable remote read access.
        const REMOTE_READ = 1 << 2;

        /// Enable remote atomic operation access (if supported).
        /// Requires `LOCAL_WRITE` to be set.
        const REMOTE_ATOMIC = 1 << 3;

        /// Enable Memory Window binding.
        const MW_BIND = 1 << 4;

        /// Use byte offset from beginning of MR to access this MR,
        /// instead of a pointer address.
        const ZERO_BASED = 1 << 5;

        /// Create an on-demand paging MR.
        const ON_DEMAND = 1 << 6;

        /// Huge pages are guaranteed to be used for this MR.
        const HUGETLB = 1 << 7;

        /// Allow the NIC to relax the order of data transfer between the
        /// network and the target memory region.
        const RELAXED_ORDERING = 1 << 20;
    }
}

/// Opaque handle to an allocated protection domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PdToken(u64);

impl PdToken {
    /// Wrap a provider-chosen identifier.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The provider-chosen identifier.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Opaque handle to a hardware memory registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MrToken(u64);

impl MrToken {
    /// Wrap a provider-chosen identifier.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The provider-chosen identifier.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// An opened RDMA device, as handed over by the discovery layer.
///
/// The device-context manager holds this for the lifetime of the context
/// and issues every hardware call through it. Implementations must be
/// callable from multiple threads; the verbs library itself is assumed
/// thread-safe for resource calls.
pub trait VerbsDevice: Send + Sync {
    /// Device name, e.g. `mlx5_0`.
    fn name(&self) -> &str;

    /// File descriptor carrying asynchronous device events.
    ///
    /// Used as the registration key with the event dispatcher.
    fn async_event_fd(&self) -> i32;

    /// Allocate a protection domain on this device.
    ///
    /// # Errors
    /// Returns an error if the allocation fails.
    fn alloc_pd(&self) -> io::Result<PdToken>;

    /// Deallocate a protection domain.
    ///
    /// May fail if resources are still associated with the domain, or if
    /// the device has already been torn down underneath it.
    fn dealloc_pd(&self, pd: PdToken) -> io::Result<()>;

    /// Query device-wide capability attributes.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    fn query_device(&self) -> io::Result<DeviceAttr>;

    /// Query attributes of the given port (1-based).
    ///
    /// # Errors
    /// Returns an error if the query fails.
    fn query_port(&self, port_num: u8) -> io::Result<PortAttr>;

    /// Query the core clock frequency in Hz.
    ///
    /// # Errors
    /// Returns an error if the device does not support core-clock
    /// queries. Used only for clock-mode selection; failure degrades the
    /// timestamp mode rather than surfacing to callers.
    fn query_core_clock(&self) -> io::Result<u64>;

    /// Query the hardware PTP clock parameters.
    ///
    /// # Errors
    /// Returns an error if the device has no synchronized hardware
    /// clock. Failure degrades the timestamp mode.
    fn query_clock_info(&self) -> io::Result<HwClockInfo>;

    /// Register a memory range for DMA access under the given protection
    /// domain.
    ///
    /// The range described by `addr`/`len` must be valid and resident;
    /// no paging guarantees are made here and no bounds validation is
    /// performed beyond what the hardware call itself does.
    ///
    /// # Errors
    /// Returns an error if the registration fails.
    fn reg_mr(&self, pd: PdToken, addr: u64, len: usize, access: AccessFlags)
        -> io::Result<MrToken>;

    /// Deregister a memory registration.
    ///
    /// # Errors
    /// Returns an error if the deregistration fails, e.g. when it races
    /// against device removal.
    fn dereg_mr(&self, mr: MrToken) -> io::Result<()>;
}

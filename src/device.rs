//! Device context lifecycle and memory registration.
//!
//! [`DeviceContext`] owns one open RDMA device session: the device
//! handle, the device-wide protection domain, the capability snapshot,
//! and the selected clock converter. Upper layers register memory for
//! DMA against it and query port state through it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, error, trace};

use crate::clock::{probe_clock_caps, select_converter, ClockConverter, ClockMode};
use crate::config::ContextConfig;
use crate::error::{Error, Result};
use crate::event::{EventDispatcher, EventRegistration};
use crate::types::{DeviceAttr, PortAttr, PortState};
use crate::verbs::{AccessFlags, MrToken, PdToken, VerbsDevice};

/// Owned protection domain.
///
/// Deallocated on drop. Dealloc failure of an already-torn-down domain
/// is expected after device removal, so it is logged and swallowed.
struct Pd {
    verbs: Arc<dyn VerbsDevice>,
    token: PdToken,
}

impl Pd {
    fn alloc(verbs: Arc<dyn VerbsDevice>) -> std::io::Result<Self> {
        let token = verbs.alloc_pd()?;
        Ok(Self { verbs, token })
    }
}

impl Drop for Pd {
    fn drop(&mut self) {
        if let Err(e) = self.verbs.dealloc_pd(self.token) {
            debug!(device = self.verbs.name(), "pd deallocation failure: {}", e);
        }
    }
}

/// One DMA-capable mapping of a virtual address range.
///
/// Returned by [`DeviceContext::mem_reg`]. The caller owns the
/// registration and releases it by dropping it (or explicitly through
/// [`DeviceContext::mem_dereg`]). Release after the device has been
/// removed is a silent no-op: the hardware resource is already gone.
pub struct MemoryRegion {
    verbs: Arc<dyn VerbsDevice>,
    removed: Arc<AtomicBool>,
    token: MrToken,
    addr: u64,
    len: usize,
    access: AccessFlags,
}

impl std::fmt::Debug for MemoryRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRegion")
            .field("token", &self.token)
            .field("addr", &self.addr)
            .field("len", &self.len)
            .field("access", &self.access)
            .finish_non_exhaustive()
    }
}

impl MemoryRegion {
    /// The opaque hardware registration token.
    pub fn token(&self) -> MrToken {
        self.token
    }

    /// Base address of the registered range.
    pub fn addr(&self) -> u64 {
        self.addr
    }

    /// Length of the registered range in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the registered range is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Access permissions the range was registered with.
    pub fn access(&self) -> AccessFlags {
        self.access
    }
}

impl Drop for MemoryRegion {
    fn drop(&mut self) {
        // Acquire pairs with the Release store in the fatal-event
        // handler. A drop that loses the race against the event may
        // still issue the native call and see it fail; that failure is
        // logged, not escalated.
        if self.removed.load(Ordering::Acquire) {
            return;
        }
        if let Err(e) = self.verbs.dereg_mr(self.token) {
            error!("failed de-registering a memory region: {}", e);
        }
    }
}

/// One open RDMA device session.
///
/// Construction allocates the protection domain, snapshots device
/// capabilities, selects the clock converter, and registers for async
/// device events. The context transitions to a terminal removed state
/// when a fatal device event arrives; the in-memory object stays valid
/// until its owner drops it, but deregistrations become no-ops.
///
/// The owner must drop every [`MemoryRegion`] issued by this context
/// before dropping the context itself: the protection domain is released
/// at drop time and must not outlive its registrations.
pub struct DeviceContext {
    // Field order is teardown order: stop event delivery first, then
    // release the protection domain. Everything after is inert.
    events: EventRegistration,
    pd: Pd,
    converter: ClockConverter,
    verbs: Arc<dyn VerbsDevice>,
    device_attr: DeviceAttr,
    port_attr: Mutex<PortAttr>,
    config: ContextConfig,
    flow_tag_enabled: bool,
    removed: Arc<AtomicBool>,
}

impl std::fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("device_attr", &self.device_attr)
            .field("config", &self.config)
            .field("flow_tag_enabled", &self.flow_tag_enabled)
            .finish_non_exhaustive()
    }
}

impl DeviceContext {
    /// Open a device context over an already-opened device.
    ///
    /// `config` is the read-only configuration snapshot from the system
    /// configuration source; the transmit queue depth may be adjusted,
    /// see [`ContextConfig::effective`].
    ///
    /// # Errors
    /// - [`Error::PdAlloc`] when protection-domain allocation fails.
    ///   This is an unrecoverable setup error.
    /// - [`Error::DeviceQuery`] when the device attribute query fails.
    ///   The already-allocated protection domain is released before
    ///   returning.
    pub fn new(
        verbs: Arc<dyn VerbsDevice>,
        dispatcher: Arc<dyn EventDispatcher>,
        clock_mode: ClockMode,
        config: ContextConfig,
    ) -> Result<Self> {
        let caps = probe_clock_caps(&*verbs, clock_mode);
        let converter = select_converter(clock_mode, &caps);

        let pd = Pd::alloc(verbs.clone()).map_err(Error::PdAlloc)?;

        let device_attr = verbs.query_device().map_err(|e| {
            error!(device = verbs.name(), "device attribute query failed: {}", e);
            Error::DeviceQuery(e)
        })?;
        debug!(
            device = verbs.name(),
            ports = device_attr.phys_port_cnt,
            vendor_part_id = device_attr.vendor_part_id,
            fw_ver = %device_attr.fw_ver,
            max_qp_wr = device_attr.max_qp_wr,
            "device context opened"
        );

        let config = config.effective();

        let removed = Arc::new(AtomicBool::new(false));
        let events =
            EventRegistration::register(dispatcher, verbs.async_event_fd(), removed.clone());

        Ok(Self {
            events,
            pd,
            converter,
            verbs,
            device_attr,
            port_attr: Mutex::new(PortAttr::default()),
            config,
            flow_tag_enabled: false,
            removed,
        })
    }

    /// Device name, as reported by the provider.
    pub fn name(&self) -> &str {
        self.verbs.name()
    }

    /// Device capability snapshot taken at construction.
    pub fn device_attr(&self) -> &DeviceAttr {
        &self.device_attr
    }

    /// Effective configuration for this context.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// The selected clock converter.
    pub fn converter(&self) -> &ClockConverter {
        &self.converter
    }

    /// The mode the clock converter ended up in after the fallback
    /// cascade.
    pub fn converter_mode(&self) -> ClockMode {
        self.converter.mode()
    }

    /// Whether a fatal device event has been observed.
    ///
    /// Once true, the context is terminal; it never reverts.
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    /// Record whether flow-tag steering is usable on this device.
    pub fn set_flow_tag_capability(&mut self, enabled: bool) {
        self.flow_tag_enabled = enabled;
    }

    /// Whether flow-tag steering was marked usable.
    pub fn flow_tag_enabled(&self) -> bool {
        self.flow_tag_enabled
    }

    /// Refresh the cached attributes for `port_num` with a live query.
    ///
    /// Returns `false` and leaves the cache untouched when the query
    /// fails; the caller may retry or treat the port as unknown.
    pub fn update_port_attr(&self, port_num: u8) -> bool {
        match self.verbs.query_port(port_num) {
            Ok(attr) => {
                *self.port_attr.lock().unwrap() = attr;
                true
            }
            Err(e) => {
                debug!(
                    device = self.verbs.name(),
                    port = port_num,
                    "port attribute query failed: {}",
                    e
                );
                false
            }
        }
    }

    /// Current state of `port_num`.
    ///
    /// Performs a live query; on query failure the last successfully
    /// cached state is returned.
    pub fn port_state(&self, port_num: u8) -> PortState {
        self.update_port_attr(port_num);
        self.port_attr.lock().unwrap().state
    }

    /// Full attribute snapshot for `port_num`, refreshed on each call.
    ///
    /// No caching guarantee between calls; on query failure the last
    /// successfully cached attributes are returned.
    pub fn port_attr(&self, port_num: u8) -> PortAttr {
        self.update_port_attr(port_num);
        self.port_attr.lock().unwrap().clone()
    }

    /// Register a memory range for DMA access under this context's
    /// protection domain.
    ///
    /// The range must be valid and resident for the lifetime of the
    /// returned [`MemoryRegion`]; no bounds validation is performed
    /// beyond what the hardware call itself does. Hardware failures
    /// propagate unchanged, without retry.
    ///
    /// Registration is deliberately not guarded by the removal flag:
    /// a registration racing a fatal event may still succeed, and only
    /// deregistration is suppressed afterwards.
    pub fn mem_reg(&self, addr: u64, len: usize, access: AccessFlags) -> Result<MemoryRegion> {
        trace!(
            device = self.verbs.name(),
            addr,
            len,
            ?access,
            "registering memory region"
        );
        let token = self.verbs.reg_mr(self.pd.token, addr, len, access)?;
        Ok(MemoryRegion {
            verbs: self.verbs.clone(),
            removed: self.removed.clone(),
            token,
            addr,
            len,
            access,
        })
    }

    /// Release a memory registration.
    ///
    /// Equivalent to dropping `mr`. After device removal this is a
    /// silent no-op; the underlying hardware resource is already gone.
    /// Otherwise the native deregistration runs, and a failure there is
    /// logged but never escalated: from the caller's perspective the
    /// registration is released regardless.
    pub fn mem_dereg(&self, mr: MemoryRegion) {
        drop(mr);
    }
}

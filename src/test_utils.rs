//! In-memory test doubles for the verbs and event-dispatch capabilities.
//!
//! These fakes let the context lifecycle be exercised without RDMA
//! hardware: every hardware call is counted, individual calls can be made
//! to fail, and async events can be delivered synchronously from any
//! thread. Used by this crate's integration tests and available to
//! downstream crates for theirs.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::clock::HwClockInfo;
use crate::event::{AsyncEvent, AsyncEventHandler, EventDispatcher};
use crate::types::{DeviceAttr, PortAttr};
use crate::verbs::{AccessFlags, MrToken, PdToken, VerbsDevice};

/// Shared ordered log of fake operations, for asserting teardown order.
pub type OpLog = Arc<Mutex<Vec<&'static str>>>;

/// Create an empty operation log shared between fakes.
pub fn op_log() -> OpLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// A fake opened device.
///
/// Succeeds at everything by default. Failure toggles flip individual
/// calls to `io::Error`; counters record how often each native path ran.
pub struct FakeVerbs {
    /// Attributes returned by `query_device`.
    pub device_attr: DeviceAttr,
    /// Attributes returned by `query_port`.
    pub port_attr: Mutex<PortAttr>,
    /// Core clock frequency; `None` makes the query fail.
    pub core_clock_hz: Mutex<Option<u64>>,
    /// PTP clock info; `None` makes the query fail.
    pub clock_info: Mutex<Option<HwClockInfo>>,

    /// Fail the next and all further `alloc_pd` calls.
    pub fail_alloc_pd: AtomicBool,
    /// Fail the next and all further `query_device` calls.
    pub fail_query_device: AtomicBool,
    /// Fail the next and all further `query_port` calls.
    pub fail_query_port: AtomicBool,
    /// Fail the next and all further `reg_mr` calls.
    pub fail_reg_mr: AtomicBool,
    /// Fail the next and all further `dereg_mr` calls.
    pub fail_dereg_mr: AtomicBool,

    /// Number of `reg_mr` calls that reached the fake hardware.
    pub reg_mr_calls: AtomicUsize,
    /// Number of `dereg_mr` calls that reached the fake hardware.
    pub dereg_mr_calls: AtomicUsize,
    /// Number of `dealloc_pd` calls.
    pub dealloc_pd_calls: AtomicUsize,
    /// Number of `query_port` calls.
    pub query_port_calls: AtomicUsize,
    /// Number of `query_core_clock` calls.
    pub core_clock_calls: AtomicUsize,

    next_token: AtomicU64,
    ops: Option<OpLog>,
}

impl FakeVerbs {
    /// A fake device with sane defaults and no failure injection.
    pub fn new() -> Self {
        Self::with_op_log(None)
    }

    /// Like [`new`](Self::new), but records operations into `ops`.
    pub fn with_op_log(ops: Option<OpLog>) -> Self {
        Self {
            device_attr: DeviceAttr {
                fw_ver: "16.35.2000".to_string(),
                vendor_part_id: 4123,
                max_qp_wr: 32768,
                phys_port_cnt: 1,
                ..DeviceAttr::default()
            },
            port_attr: Mutex::new(PortAttr::default()),
            core_clock_hz: Mutex::new(Some(156_250_000)),
            clock_info: Mutex::new(Some(HwClockInfo::default())),
            fail_alloc_pd: AtomicBool::new(false),
            fail_query_device: AtomicBool::new(false),
            fail_query_port: AtomicBool::new(false),
            fail_reg_mr: AtomicBool::new(false),
            fail_dereg_mr: AtomicBool::new(false),
            reg_mr_calls: AtomicUsize::new(0),
            dereg_mr_calls: AtomicUsize::new(0),
            dealloc_pd_calls: AtomicUsize::new(0),
            query_port_calls: AtomicUsize::new(0),
            core_clock_calls: AtomicUsize::new(0),
            next_token: AtomicU64::new(1),
            ops,
        }
    }

    fn record(&self, op: &'static str) {
        if let Some(ops) = &self.ops {
            ops.lock().unwrap().push(op);
        }
    }

    fn fail(op: &str) -> io::Error {
        io::Error::new(io::ErrorKind::Other, format!("injected {op} failure"))
    }
}

impl Default for FakeVerbs {
    fn default() -> Self {
        Self::new()
    }
}

impl VerbsDevice for FakeVerbs {
    fn name(&self) -> &str {
        "fake0"
    }

    fn async_event_fd(&self) -> i32 {
        7
    }

    fn alloc_pd(&self) -> io::Result<PdToken> {
        if self.fail_alloc_pd.load(Ordering::Relaxed) {
            return Err(Self::fail("alloc_pd"));
        }
        self.record("alloc_pd");
        Ok(PdToken::new(self.next_token.fetch_add(1, Ordering::Relaxed)))
    }

    fn dealloc_pd(&self, _pd: PdToken) -> io::Result<()> {
        self.dealloc_pd_calls.fetch_add(1, Ordering::SeqCst);
        self.record("dealloc_pd");
        Ok(())
    }

    fn query_device(&self) -> io::Result<DeviceAttr> {
        if self.fail_query_device.load(Ordering::Relaxed) {
            return Err(Self::fail("query_device"));
        }
        Ok(self.device_attr.clone())
    }

    fn query_port(&self, _port_num: u8) -> io::Result<PortAttr> {
        self.query_port_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_query_port.load(Ordering::Relaxed) {
            return Err(Self::fail("query_port"));
        }
        Ok(self.port_attr.lock().unwrap().clone())
    }

    fn query_core_clock(&self) -> io::Result<u64> {
        self.core_clock_calls.fetch_add(1, Ordering::SeqCst);
        self.core_clock_hz
            .lock()
            .unwrap()
            .ok_or_else(|| Self::fail("query_core_clock"))
    }

    fn query_clock_info(&self) -> io::Result<HwClockInfo> {
        self.clock_info
            .lock()
            .unwrap()
            .ok_or_else(|| Self::fail("query_clock_info"))
    }

    fn reg_mr(
        &self,
        _pd: PdToken,
        _addr: u64,
        _len: usize,
        _access: AccessFlags,
    ) -> io::Result<MrToken> {
        if self.fail_reg_mr.load(Ordering::Relaxed) {
            return Err(Self::fail("reg_mr"));
        }
        self.reg_mr_calls.fetch_add(1, Ordering::SeqCst);
        Ok(MrToken::new(self.next_token.fetch_add(1, Ordering::Relaxed)))
    }

    fn dereg_mr(&self, _mr: MrToken) -> io::Result<()> {
        self.dereg_mr_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_dereg_mr.load(Ordering::Relaxed) {
            return Err(Self::fail("dereg_mr"));
        }
        Ok(())
    }
}

/// A fake event-dispatch facility.
///
/// Holds registered handlers keyed by fd and lets tests deliver events
/// synchronously on the calling thread, which stands in for the
/// dispatcher's own thread.
pub struct FakeDispatcher {
    handlers: Mutex<HashMap<i32, Arc<dyn AsyncEventHandler>>>,
    /// Number of `register` calls.
    pub registered: AtomicUsize,
    /// Number of `unregister` calls.
    pub unregistered: AtomicUsize,
    ops: Option<OpLog>,
}

impl FakeDispatcher {
    /// A fake dispatcher with no registrations.
    pub fn new() -> Self {
        Self::with_op_log(None)
    }

    /// Like [`new`](Self::new), but records operations into `ops`.
    pub fn with_op_log(ops: Option<OpLog>) -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
            registered: AtomicUsize::new(0),
            unregistered: AtomicUsize::new(0),
            ops,
        }
    }

    /// Deliver `event` to the handler registered for `fd`, if any.
    ///
    /// The handler runs on the calling thread. The handler map lock is
    /// released before the callback runs, so a handler unregistering
    /// itself does not deadlock.
    pub fn deliver(&self, fd: i32, event: AsyncEvent) {
        let handler = self.handlers.lock().unwrap().get(&fd).cloned();
        if let Some(handler) = handler {
            handler.handle_async_event(event);
        }
    }
}

impl Default for FakeDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher for FakeDispatcher {
    fn register(&self, fd: i32, handler: Arc<dyn AsyncEventHandler>) {
        self.registered.fetch_add(1, Ordering::SeqCst);
        self.handlers.lock().unwrap().insert(fd, handler);
    }

    fn unregister(&self, fd: i32) {
        self.unregistered.fetch_add(1, Ordering::SeqCst);
        if let Some(ops) = &self.ops {
            ops.lock().unwrap().push("unregister_events");
        }
        self.handlers.lock().unwrap().remove(&fd);
    }
}

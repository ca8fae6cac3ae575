//! # ibctx - RDMA device-context lifecycle
//!
//! This crate manages one open RDMA device session inside a kernel-bypass
//! networking stack. It owns the device handle and the device-wide
//! protection domain, exposes zero-copy memory registration to upper
//! layers, selects a packet-timestamp clock-conversion strategy, and
//! watches for fatal device removal delivered asynchronously.
//!
//! ## Design
//!
//! The hardware surface and the event-dispatch facility are injected
//! capabilities, not process-wide singletons:
//!
//! - [`VerbsDevice`] is the opened device, handed over by the discovery
//!   layer. Every hardware call goes through it, which keeps the whole
//!   lifecycle testable against in-memory fakes.
//! - [`EventDispatcher`] delivers async device events on a thread it
//!   owns. The context installs a minimal handler that flips the shared
//!   removal flag on a fatal event and nothing more.
//!
//! Resource teardown is ordering-sensitive: event delivery stops before
//! the protection domain is released, and the protection domain must not
//! be released while registrations against it are alive. Both orderings
//! are enforced structurally, by field order and by ownership.
//!
//! Timestamp support degrades instead of failing: a device without a
//! usable clock source still constructs, with conversion disabled. See
//! [`clock::select_converter`] for the cascade.
//!
//! ## Module Overview
//!
//! - [`device`]: device context, protection domain, memory registration
//! - [`clock`]: clock-mode selection and converter variants
//! - [`event`]: async event types and fatal-removal monitoring
//! - [`verbs`]: the injected hardware capability trait
//! - [`config`]: work-request queue configuration
//! - [`types`]: device and port attribute snapshots
//! - [`test_utils`]: in-memory fakes for tests

pub mod clock;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod test_utils;
pub mod types;
pub mod verbs;

pub use clock::{ClockCaps, ClockConverter, ClockMode, HwClockInfo};
pub use config::ContextConfig;
pub use device::{DeviceContext, MemoryRegion};
pub use error::{Error, Result};
pub use event::{AsyncEvent, AsyncEventHandler, EventDispatcher};
pub use types::{DeviceAttr, LinkLayer, Mtu, PortAttr, PortState};
pub use verbs::{AccessFlags, MrToken, PdToken, VerbsDevice};

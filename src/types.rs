//! RDMA attribute types.
//!
//! Plain-data snapshots of device and port attributes as reported by the
//! verbs provider. The provider fills these from its own query results;
//! nothing here touches hardware.

/// Logical port state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PortState {
    /// No state change.
    Nop = 0,
    /// Port is down.
    Down = 1,
    /// Port is initializing.
    Init = 2,
    /// Port is armed and ready to transition to active.
    Armed = 3,
    /// Port is active and fully operational.
    Active = 4,
    /// Port is active but deferred for link training.
    ActiveDefer = 5,
}

impl From<u32> for PortState {
    fn from(v: u32) -> Self {
        match v {
            0 => Self::Nop,
            1 => Self::Down,
            2 => Self::Init,
            3 => Self::Armed,
            4 => Self::Active,
            5 => Self::ActiveDefer,
            _ => Self::Nop,
        }
    }
}

/// MTU (Maximum Transmission Unit) size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Mtu {
    /// 256 bytes.
    Mtu256 = 1,
    /// 512 bytes.
    Mtu512 = 2,
    /// 1024 bytes.
    Mtu1024 = 3,
    /// 2048 bytes.
    Mtu2048 = 4,
    /// 4096 bytes.
    Mtu4096 = 5,
}

impl Mtu {
    /// Returns the MTU size in bytes.
    pub fn bytes(&self) -> usize {
        match self {
            Self::Mtu256 => 256,
            Self::Mtu512 => 512,
            Self::Mtu1024 => 1024,
            Self::Mtu2048 => 2048,
            Self::Mtu4096 => 4096,
        }
    }
}

/// Link layer protocol type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkLayer {
    /// Unspecified link layer.
    Unspecified = 0,
    /// InfiniBand link layer.
    InfiniBand = 1,
    /// Ethernet link layer (RoCE).
    Ethernet = 2,
}

impl From<u8> for LinkLayer {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::InfiniBand,
            2 => Self::Ethernet,
            _ => Self::Unspecified,
        }
    }
}

/// Device-wide capability attributes.
///
/// Snapshot taken once during context construction. The maximum values are
/// upper limits; actual available resources may be limited by machine
/// configuration and resources already in use.
#[derive(Debug, Clone)]
pub struct DeviceAttr {
    /// Firmware version string.
    pub fw_ver: String,
    /// Node GUID (in network byte order).
    pub node_guid: u64,
    /// Vendor ID, per IEEE.
    pub vendor_id: u32,
    /// Vendor supplied part ID.
    pub vendor_part_id: u32,
    /// Hardware version.
    pub hw_ver: u32,
    /// Largest contiguous block that can be registered.
    pub max_mr_size: u64,
    /// Maximum number of supported MRs.
    pub max_mr: i32,
    /// Maximum number of supported PDs.
    pub max_pd: i32,
    /// Maximum number of supported QPs.
    pub max_qp: i32,
    /// Maximum number of outstanding WRs on any work queue.
    pub max_qp_wr: i32,
    /// Number of physical ports.
    pub phys_port_cnt: u8,
}

impl Default for DeviceAttr {
    fn default() -> Self {
        Self {
            fw_ver: String::new(),
            node_guid: 0,
            vendor_id: 0,
            vendor_part_id: 0,
            hw_ver: 0,
            max_mr_size: 0,
            max_mr: 0,
            max_pd: 0,
            max_qp: 0,
            max_qp_wr: 0,
            phys_port_cnt: 0,
        }
    }
}

/// Per-port attributes.
///
/// Queried on demand via [`DeviceContext::port_attr`]; the context keeps
/// the last successfully queried value as a cache.
///
/// [`DeviceContext::port_attr`]: crate::device::DeviceContext::port_attr
#[derive(Debug, Clone)]
pub struct PortAttr {
    /// Logical port state.
    pub state: PortState,
    /// Maximum MTU supported by the port.
    pub max_mtu: Mtu,
    /// Currently active MTU.
    pub active_mtu: Mtu,
    /// Length of the source GID table.
    pub gid_tbl_len: i32,
    /// Base port LID (Local Identifier).
    pub lid: u16,
    /// Subnet Manager LID.
    pub sm_lid: u16,
    /// Currently active link width.
    pub active_width: u8,
    /// Currently active link speed.
    pub active_speed: u8,
    /// Link layer protocol (InfiniBand or Ethernet/RoCE).
    pub link_layer: LinkLayer,
}

impl Default for PortAttr {
    fn default() -> Self {
        Self {
            state: PortState::Nop,
            max_mtu: Mtu::Mtu256,
            active_mtu: Mtu::Mtu256,
            gid_tbl_len: 0,
            lid: 0,
            sm_lid: 0,
            active_width: 0,
            active_speed: 0,
            link_layer: LinkLayer::Unspecified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_state_from_u32() {
        assert_eq!(PortState::from(4), PortState::Active);
        assert_eq!(PortState::from(1), PortState::Down);
        // Out-of-range values map to Nop.
        assert_eq!(PortState::from(42), PortState::Nop);
    }

    #[test]
    fn mtu_bytes() {
        assert_eq!(Mtu::Mtu256.bytes(), 256);
        assert_eq!(Mtu::Mtu4096.bytes(), 4096);
    }

    #[test]
    fn link_layer_from_u8() {
        assert_eq!(LinkLayer::from(1), LinkLayer::InfiniBand);
        assert_eq!(LinkLayer::from(2), LinkLayer::Ethernet);
        assert_eq!(LinkLayer::from(0), LinkLayer::Unspecified);
    }
}

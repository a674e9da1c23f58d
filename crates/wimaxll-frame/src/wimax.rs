//! The WiMAX generic netlink family: commands, attributes and builders.

use std::fmt;

use bytes::Bytes;

use crate::codec::{Attribute, GenlMessage};
use crate::error::{FrameError, Result};

/// Family name registered by the kernel WiMAX stack.
pub const FAMILY_NAME: &str = "WiMAX";

/// Protocol version spoken by this library.
pub const GNL_VERSION: u8 = 1;

/// Name of the default multicast group backing the control pipe.
pub const MSG_PIPE_NAME: &str = "msg";

/// Generic netlink commands of the WiMAX family.
pub mod op {
    pub const MSG_FROM_USER: u8 = 0;
    pub const MSG_TO_USER: u8 = 1;
    pub const RFKILL: u8 = 2;
    pub const RESET: u8 = 3;
    pub const RE_STATE_CHANGE: u8 = 4;
    pub const STATE_GET: u8 = 5;
}

/// Attribute numbers. Each command has its own attribute space.
pub mod attr {
    pub const MSG_IFIDX: u16 = 1;
    pub const MSG_PIPE_NAME: u16 = 2;
    pub const MSG_DATA: u16 = 3;

    pub const RFKILL_IFIDX: u16 = 1;
    pub const RFKILL_STATE: u16 = 2;

    pub const RESET_IFIDX: u16 = 1;

    pub const STGET_IFIDX: u16 = 1;

    pub const STCH_IFIDX: u16 = 1;
    pub const STCH_STATE_OLD: u16 = 2;
    pub const STCH_STATE_NEW: u16 = 3;
}

/// Device state as reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DeviceState {
    Null = 0,
    Down = 1,
    Quiescing = 2,
    Uninitialized = 3,
    RadioOff = 4,
    Ready = 5,
    Scanning = 6,
    Connecting = 7,
    Connected = 8,
    Invalid = 9,
}

impl DeviceState {
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::Null,
            1 => Self::Down,
            2 => Self::Quiescing,
            3 => Self::Uninitialized,
            4 => Self::RadioOff,
            5 => Self::Ready,
            6 => Self::Scanning,
            7 => Self::Connecting,
            8 => Self::Connected,
            9 => Self::Invalid,
            _ => return None,
        })
    }

    pub fn as_raw(self) -> u32 {
        self as u32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Down => "down",
            Self::Quiescing => "quiescing",
            Self::Uninitialized => "uninitialized",
            Self::RadioOff => "radio-off",
            Self::Ready => "ready",
            Self::Scanning => "scanning",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Invalid => "invalid",
        }
    }

    /// Decode a state attribute; the kernel sends a u8, older stacks a u32.
    pub fn from_attr(attr: &Attribute) -> Result<Self> {
        let raw = match attr.payload.len() {
            4 => attr.as_u32()?,
            _ => u32::from(attr.as_u8()?),
        };
        Self::from_raw(raw).ok_or(FrameError::Malformed("unknown device state"))
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested radio state for [`rfkill_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum RfState {
    Off = 0,
    On = 1,
    /// Only report the current switch status.
    Query = 2,
}

impl RfState {
    pub fn as_raw(self) -> u32 {
        self as u32
    }
}

/// Hardware and software radio switch status returned by an rfkill request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RfStatus {
    pub hw_on: bool,
    pub sw_on: bool,
}

impl RfStatus {
    /// Bit 0: hardware switch on, bit 1: software switch on.
    pub fn from_bits(bits: i32) -> Self {
        Self {
            hw_on: bits & 0x1 != 0,
            sw_on: bits & 0x2 != 0,
        }
    }

    pub fn bits(self) -> i32 {
        i32::from(self.hw_on) | (i32::from(self.sw_on) << 1)
    }

    /// The radio transmits only when both switches are on.
    pub fn radio_on(self) -> bool {
        self.hw_on && self.sw_on
    }
}

impl fmt::Display for RfStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = |on: bool| if on { "on" } else { "off" };
        write!(f, "hw {} sw {}", word(self.hw_on), word(self.sw_on))
    }
}

/// A driver message from user space to the device.
pub fn msg_from_user(family: u16, ifindex: u32, data: &[u8]) -> GenlMessage {
    GenlMessage::request(family, op::MSG_FROM_USER, GNL_VERSION)
        .with_attr(Attribute::u32(attr::MSG_IFIDX, ifindex))
        .with_attr(Attribute::new(attr::MSG_DATA, Bytes::copy_from_slice(data)))
}

/// A driver message to user space, as broadcast by the kernel.
pub fn msg_to_user(family: u16, ifindex: u32, pipe_name: Option<&str>, data: &[u8]) -> GenlMessage {
    let mut msg = GenlMessage::new(family, op::MSG_TO_USER, GNL_VERSION)
        .with_attr(Attribute::u32(attr::MSG_IFIDX, ifindex));
    if let Some(name) = pipe_name {
        msg.push(Attribute::string(attr::MSG_PIPE_NAME, name));
    }
    msg.with_attr(Attribute::new(attr::MSG_DATA, Bytes::copy_from_slice(data)))
}

pub fn rfkill_request(family: u16, ifindex: u32, state: RfState) -> GenlMessage {
    GenlMessage::request(family, op::RFKILL, GNL_VERSION)
        .with_attr(Attribute::u32(attr::RFKILL_IFIDX, ifindex))
        .with_attr(Attribute::u32(attr::RFKILL_STATE, state.as_raw()))
}

pub fn reset_request(family: u16, ifindex: u32) -> GenlMessage {
    GenlMessage::request(family, op::RESET, GNL_VERSION)
        .with_attr(Attribute::u32(attr::RESET_IFIDX, ifindex))
}

pub fn state_get_request(family: u16, ifindex: u32) -> GenlMessage {
    GenlMessage::request(family, op::STATE_GET, GNL_VERSION)
        .with_attr(Attribute::u32(attr::STGET_IFIDX, ifindex))
}

/// A state change report, as broadcast by the kernel.
pub fn state_change_report(
    family: u16,
    ifindex: u32,
    old: DeviceState,
    new: DeviceState,
) -> GenlMessage {
    GenlMessage::new(family, op::RE_STATE_CHANGE, GNL_VERSION)
        .with_attr(Attribute::u32(attr::STCH_IFIDX, ifindex))
        .with_attr(Attribute::u8(attr::STCH_STATE_OLD, old.as_raw() as u8))
        .with_attr(Attribute::u8(attr::STCH_STATE_NEW, new.as_raw() as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_state_raw_values() {
        for raw in 0..=9 {
            let state = DeviceState::from_raw(raw).unwrap();
            assert_eq!(state.as_raw(), raw);
        }
        assert_eq!(DeviceState::from_raw(10), None);
        assert_eq!(DeviceState::RadioOff.to_string(), "radio-off");
    }

    #[test]
    fn test_device_state_from_u8_or_u32() {
        let narrow = Attribute::u8(attr::STCH_STATE_NEW, 8);
        let wide = Attribute::u32(attr::STCH_STATE_NEW, 5);
        assert_eq!(DeviceState::from_attr(&narrow).unwrap(), DeviceState::Connected);
        assert_eq!(DeviceState::from_attr(&wide).unwrap(), DeviceState::Ready);

        let bogus = Attribute::u8(attr::STCH_STATE_NEW, 42);
        assert!(DeviceState::from_attr(&bogus).is_err());
    }

    #[test]
    fn test_rf_status_bits() {
        assert_eq!(
            RfStatus::from_bits(0x3),
            RfStatus {
                hw_on: true,
                sw_on: true
            }
        );
        let hw_only = RfStatus::from_bits(0x1);
        assert!(hw_only.hw_on && !hw_only.sw_on);
        assert!(!hw_only.radio_on());
        assert_eq!(hw_only.bits(), 1);
        assert_eq!(hw_only.to_string(), "hw on sw off");
    }

    #[test]
    fn test_request_builders() {
        let req = rfkill_request(0x20, 3, RfState::Query);
        assert_eq!(req.cmd, op::RFKILL);
        assert_eq!(req.attr(attr::RFKILL_IFIDX).unwrap().as_u32().unwrap(), 3);
        assert_eq!(req.attr(attr::RFKILL_STATE).unwrap().as_u32().unwrap(), 2);

        let msg = msg_from_user(0x20, 3, b"hello");
        assert_eq!(&msg.attr(attr::MSG_DATA).unwrap().payload[..], b"hello");
        assert!(msg.attr(attr::MSG_PIPE_NAME).is_none());
    }
}

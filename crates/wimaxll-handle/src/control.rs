//! Device control requests: radio switch, reset and state query.

use tracing::debug;
use wimaxll_frame::wimax::{reset_request, rfkill_request, state_get_request};
use wimaxll_frame::{DeviceState, FrameError, RfState, RfStatus};

use crate::error::Result;
use crate::handle::Handle;

impl Handle {
    /// Switch the radio on or off, or with [`RfState::Query`] only report it.
    ///
    /// Returns the hardware and software switch status after the request.
    pub fn rfkill(&mut self, state: RfState) -> Result<RfStatus> {
        let seq = self.send_request(rfkill_request(self.family.id, self.device.ifindex, state))?;
        let bits = self.wait_for_ack(seq, self.config.request_timeout)?;
        let status = RfStatus::from_bits(bits);
        debug!(ifname = %self.device.name, ?state, %status, "rfkill");
        Ok(status)
    }

    /// Reset the device.
    pub fn reset(&mut self) -> Result<()> {
        let seq = self.send_request(reset_request(self.family.id, self.device.ifindex))?;
        self.wait_for_ack(seq, self.config.request_timeout)?;
        debug!(ifname = %self.device.name, "reset");
        Ok(())
    }

    /// Ask the kernel for the current device state.
    pub fn state_get(&mut self) -> Result<DeviceState> {
        let seq = self.send_request(state_get_request(self.family.id, self.device.ifindex))?;
        let raw = self.wait_for_ack(seq, self.config.request_timeout)?;
        Ok(DeviceState::from_raw(raw as u32)
            .ok_or(FrameError::Malformed("unknown device state"))?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::Error;
    use crate::handle::HandleConfig;
    use crate::loopback::LoopbackKernel;
    use wimaxll_frame::wimax::{attr, op};

    fn setup() -> (LoopbackKernel, Handle) {
        let kernel = LoopbackKernel::new().with_device("wmx0", 4);
        let config = HandleConfig {
            request_timeout: Some(Duration::from_millis(200)),
            ..HandleConfig::default()
        };
        let handle = Handle::open_with("wmx0", kernel.backend(), config).unwrap();
        (kernel, handle)
    }

    #[test]
    fn test_rfkill_query() {
        let (kernel, mut handle) = setup();
        kernel.ack(handle.last_seq() + 1, 0x3);
        let status = handle.rfkill(RfState::Query).unwrap();
        assert!(status.hw_on && status.sw_on);

        let request = kernel.recv_request().unwrap().unwrap();
        assert_eq!(request.cmd, op::RFKILL);
        assert_eq!(request.attr(attr::RFKILL_IFIDX).unwrap().as_u32().unwrap(), 4);
        assert_eq!(
            request.attr(attr::RFKILL_STATE).unwrap().as_u32().unwrap(),
            RfState::Query.as_raw()
        );
    }

    #[test]
    fn test_rfkill_off_reports_sw_off() {
        let (kernel, mut handle) = setup();
        kernel.ack(handle.last_seq() + 1, 0x1);
        let status = handle.rfkill(RfState::Off).unwrap();
        assert!(status.hw_on);
        assert!(!status.sw_on);
    }

    #[test]
    fn test_reset_error_from_kernel() {
        let (kernel, mut handle) = setup();
        kernel.ack(handle.last_seq() + 1, -libc::EOPNOTSUPP);
        let err = handle.reset().unwrap_err();
        assert_eq!(err.errno(), -libc::EOPNOTSUPP);
    }

    #[test]
    fn test_state_get() {
        let (kernel, mut handle) = setup();
        kernel.ack(handle.last_seq() + 1, DeviceState::Connected.as_raw() as i32);
        assert_eq!(handle.state_get().unwrap(), DeviceState::Connected);
        assert_eq!(kernel.recv_request().unwrap().unwrap().cmd, op::STATE_GET);
    }

    #[test]
    fn test_request_without_answer_times_out() {
        let (_kernel, mut handle) = setup();
        assert!(matches!(handle.reset(), Err(Error::Timeout(_))));
    }
}

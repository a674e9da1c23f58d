use std::fmt;
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

use tracing::{debug, trace, warn};
use wimaxll_frame::wimax::{self, GNL_VERSION, MSG_PIPE_NAME};
use wimaxll_frame::{FamilyInfo, FrameConfig, GenlMessage};

use crate::backend::Backend;
use crate::context::{Callback, DeviceInfo};
use crate::error::{Error, Result};
use crate::registry::{Pipe, PipeId, PipeKind, PipeRegistry, DEFAULT_MAX_PIPES, MSG_PIPE_ID};

/// Default deadline for device control requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle configuration.
#[derive(Debug, Clone)]
pub struct HandleConfig {
    /// Frame size ceiling and receive buffer size.
    pub frame: FrameConfig,
    /// Named pipes that may be open at once.
    pub max_pipes: usize,
    /// Generic netlink family to resolve. Default: `WiMAX`.
    pub family_name: String,
    /// Multicast group backing the control pipe. Default: `msg`.
    pub msg_pipe: String,
    /// Deadline for `rfkill`, `reset` and `state_get`. `None` waits forever.
    pub request_timeout: Option<Duration>,
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            max_pipes: DEFAULT_MAX_PIPES,
            family_name: wimax::FAMILY_NAME.to_string(),
            msg_pipe: MSG_PIPE_NAME.to_string(),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

/// An open session with one WiMAX device.
///
/// Every method takes the handle exclusively; the handle cannot leave the
/// thread that opened it. Once the kernel reports the device gone, every
/// operation fails with [`Error::DeviceGone`] until the handle is closed.
pub struct Handle {
    pub(crate) device: DeviceInfo,
    pub(crate) valid: bool,
    pub(crate) family: FamilyInfo,
    backend: Box<dyn Backend>,
    pub(crate) pipes: PipeRegistry,
    pub(crate) config: HandleConfig,
    seq: u32,
    pub(crate) rx_buf: Vec<u8>,
}

impl Handle {
    /// Open `ifname` through generic netlink with the default configuration.
    #[cfg(target_os = "linux")]
    pub fn open(ifname: &str) -> Result<Self> {
        let config = HandleConfig::default();
        let backend = crate::backend::GenlBackend::new(config.frame.clone());
        Self::open_with(ifname, backend, config)
    }

    /// Open `ifname` through `backend`.
    pub fn open_with(
        ifname: &str,
        backend: impl Backend + 'static,
        config: HandleConfig,
    ) -> Result<Self> {
        let mut backend: Box<dyn Backend> = Box::new(backend);
        let binding = backend.bind(ifname, &config.family_name)?;
        if binding.family.version < u32::from(GNL_VERSION) {
            warn!(
                family = %binding.family.name,
                version = binding.family.version,
                expected = GNL_VERSION,
                "kernel speaks an older WiMAX protocol"
            );
        }

        let group = binding
            .family
            .group(&config.msg_pipe)
            .cloned()
            .ok_or_else(|| Error::NoSuchPipe(config.msg_pipe.clone()))?;
        let socket = backend.open_socket(&group)?;

        debug!(
            ifname,
            ifindex = binding.ifindex,
            family = binding.family.id,
            backend = backend.name(),
            "opened WiMAX handle"
        );

        Ok(Self {
            device: DeviceInfo {
                name: ifname.to_string(),
                ifindex: binding.ifindex,
            },
            valid: true,
            family: binding.family,
            backend,
            pipes: PipeRegistry::new(group, socket, config.max_pipes),
            rx_buf: vec![0u8; config.frame.recv_buffer_size],
            config,
            seq: 0,
        })
    }

    /// Release every pipe and socket, the control pipe included.
    pub fn close(self) {
        let Handle { device, pipes, .. } = self;
        debug!(ifname = %device.name, pipes = pipes.ids().len(), "closing WiMAX handle");
        drop(pipes);
    }

    pub fn ifname(&self) -> &str {
        &self.device.name
    }

    pub fn ifindex(&self) -> u32 {
        self.device.ifindex
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// False once the kernel reported the device removed.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn family(&self) -> &FamilyInfo {
        &self.family
    }

    pub fn config(&self) -> &HandleConfig {
        &self.config
    }

    pub fn msg_pipe_id(&self) -> PipeId {
        MSG_PIPE_ID
    }

    /// Ids of the open pipes, control pipe first.
    pub fn pipe_ids(&self) -> Vec<PipeId> {
        self.pipes.ids()
    }

    pub fn pipe_name(&self, id: PipeId) -> Result<&str> {
        Ok(&self.pipes.get(id)?.name)
    }

    pub fn pipe_kind(&self, id: PipeId) -> Result<PipeKind> {
        Ok(self.pipes.get(id)?.kind)
    }

    pub(crate) fn ensure_valid(&self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(Error::DeviceGone(self.device.name.clone()))
        }
    }

    /// Open the pipe backed by the multicast group `name`.
    ///
    /// Nothing is registered unless every step succeeds.
    pub fn open_pipe(&mut self, name: &str) -> Result<PipeId> {
        self.ensure_valid()?;
        let group = self
            .family
            .group(name)
            .cloned()
            .ok_or_else(|| Error::NoSuchPipe(name.to_string()))?;
        self.pipes.free_slot()?;

        let socket = self.backend.open_socket(&group)?;
        let id = self
            .pipes
            .insert(Pipe::new(PipeKind::Multicast, group, socket))?;
        debug!(ifname = %self.device.name, pipe = name, id, "opened pipe");
        Ok(id)
    }

    /// Close a named pipe, releasing its socket.
    pub fn close_pipe(&mut self, id: PipeId) -> Result<()> {
        let pipe = self.pipes.remove(id)?;
        debug!(ifname = %self.device.name, pipe = %pipe.name, id, "closed pipe");
        Ok(())
    }

    /// Descriptor to poll for readiness of pipe `id`.
    ///
    /// Frames left in the pipe backlog by a stopped read do not make the
    /// descriptor readable; check [`Handle::has_pending`] as well.
    pub fn pipe_fd(&self, id: PipeId) -> Result<RawFd> {
        self.ensure_valid()?;
        Ok(self.pipes.get(id)?.socket.as_raw_fd())
    }

    /// Descriptor of the control pipe.
    pub fn msg_fd(&self) -> Result<RawFd> {
        self.pipe_fd(MSG_PIPE_ID)
    }

    /// Install (or with `None`, remove) the callback of pipe `id`.
    ///
    /// Returns the callback it replaces.
    pub fn set_callback(&mut self, id: PipeId, callback: Option<Callback>) -> Result<Option<Callback>> {
        let pipe = self.pipes.get_mut(id)?;
        Ok(std::mem::replace(&mut pipe.callback, callback))
    }

    pub fn callback(&self, id: PipeId) -> Result<Option<Callback>> {
        Ok(self.pipes.get(id)?.callback.clone())
    }

    /// Sequence number of the last request sent.
    pub fn last_seq(&self) -> u32 {
        self.seq
    }

    /// Send `msg` on the control pipe with the next sequence number.
    ///
    /// Does not wait for the acknowledgement; see [`Handle::wait_for_ack`].
    pub fn send_request(&mut self, msg: GenlMessage) -> Result<u32> {
        self.ensure_valid()?;
        let seq = match self.seq.wrapping_add(1) {
            0 => 1,
            seq => seq,
        };
        let wire = msg.with_seq(seq).encode(self.config.frame.max_frame_size)?;
        self.pipes.get(MSG_PIPE_ID)?.socket.send(&wire)?;
        self.seq = seq;
        trace!(ifname = %self.device.name, seq, len = wire.len(), "sent request");
        Ok(seq)
    }

    /// Send a driver message. Returns the payload length.
    pub fn msg_write(&mut self, data: &[u8]) -> Result<usize> {
        self.ensure_valid()?;
        let msg = wimax::msg_from_user(self.family.id, self.device.ifindex, data);
        self.send_request(msg)?;
        Ok(data.len())
    }

    /// Send a driver message on pipe `id`; only the control pipe accepts writes.
    pub fn pipe_msg_write(&mut self, id: PipeId, data: &[u8]) -> Result<usize> {
        self.ensure_valid()?;
        match self.pipes.get(id)?.kind {
            PipeKind::Control => self.msg_write(data),
            PipeKind::Multicast => Err(Error::NotWritable(id)),
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("device", &self.device)
            .field("valid", &self.valid)
            .field("family", &self.family.id)
            .field("backend", &self.backend.name())
            .field("pipes", &self.pipes.ids())
            .finish()
    }
}

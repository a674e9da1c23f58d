//! Draining pipes and delivering notifications to callbacks.

use tracing::{info, trace, warn};
use wimaxll_frame::Notification;

use crate::context::Flow;
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::registry::{PipeId, MSG_PIPE_ID};

impl Handle {
    /// Dispatch every frame pending on pipe `id`.
    ///
    /// Never blocks. Each frame is decoded and handed to the pipe's callback,
    /// if one is installed; frames for other devices, foreign families and
    /// malformed frames are consumed without a callback. A callback returning
    /// [`Flow::Stop`] ends the call; frames still queued are delivered by the
    /// next call.
    ///
    /// Returns the number of bytes consumed, or [`Error::WouldBlock`] if
    /// nothing was pending. A callback must not call back into this handle.
    pub fn pipe_read(&mut self, id: PipeId) -> Result<usize> {
        self.ensure_valid()?;
        let Handle {
            device,
            valid,
            family,
            pipes,
            rx_buf,
            ..
        } = self;
        let pipe = pipes.get_mut(id)?;

        let mut frames = 0usize;
        let mut consumed = 0usize;
        while let Some(raw) = pipe.next_frame(rx_buf)? {
            frames += 1;
            consumed += raw.len();

            let notification = match Notification::decode(&raw, family.id) {
                Ok(Some(notification)) => notification,
                Ok(None) => continue,
                Err(err) => {
                    warn!(pipe = %pipe.name, %err, "dropping malformed frame");
                    continue;
                }
            };

            let gone = matches!(notification, Notification::Ack { error, .. } if error == -libc::ENODEV);
            if gone {
                *valid = false;
                info!(ifname = %device.name, "device removed");
            }

            if !notification.concerns(device.ifindex) {
                trace!(pipe = %pipe.name, ifindex = ?notification.ifindex(), "frame for another device");
                continue;
            }

            let flow = match &pipe.callback {
                Some(callback) => match callback.invoke(device, &notification) {
                    Ok(flow) => flow,
                    Err(err) => {
                        pipe.backlog.push_front(raw);
                        return Err(err);
                    }
                },
                None => Flow::Continue,
            };

            if gone {
                return Err(Error::DeviceGone(device.name.clone()));
            }
            if flow == Flow::Stop {
                trace!(pipe = %pipe.name, left = pipe.backlog.len(), "callback stopped drain");
                break;
            }
        }

        if frames == 0 {
            return Err(Error::WouldBlock);
        }
        Ok(consumed)
    }

    /// Dispatch a receive-only named pipe.
    pub fn mc_rx_read(&mut self, id: PipeId) -> Result<usize> {
        if id == MSG_PIPE_ID {
            return Err(Error::BadPipeId(id));
        }
        self.pipe_read(id)
    }

    /// Whether pipe `id` holds frames already received but not dispatched.
    pub fn has_pending(&self, id: PipeId) -> Result<bool> {
        Ok(!self.pipes.get(id)?.backlog.is_empty())
    }
}

use std::io::ErrorKind;
use std::os::fd::RawFd;
use std::time::{Duration, Instant};

/// Block until `fd` is readable or `timeout` expires.
///
/// Returns `Ok(false)` on timeout. `None` waits indefinitely. Error and
/// hang-up conditions count as readable so the caller's next receive
/// surfaces them.
pub fn wait_readable(fd: RawFd, timeout: Option<Duration>) -> std::io::Result<bool> {
    Ok(!wait_any_readable(&[fd], timeout)?.is_empty())
}

/// Block until at least one of `fds` is readable or `timeout` expires.
///
/// Returns the indices (into `fds`) of the ready descriptors; empty on timeout.
pub fn wait_any_readable(fds: &[RawFd], timeout: Option<Duration>) -> std::io::Result<Vec<usize>> {
    let mut pollfds: Vec<libc::pollfd> = fds
        .iter()
        .map(|&fd| libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        })
        .collect();
    let deadline = timeout.map(|t| Instant::now() + t);

    loop {
        let timeout_ms = match deadline {
            None => -1,
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                // Round up so a sub-millisecond remainder still waits.
                let ms = remaining.as_micros().div_ceil(1000);
                ms.min(libc::c_int::MAX as u128) as libc::c_int
            }
        };

        // SAFETY: `pollfds` is a valid, exclusively borrowed array of
        // `pollfds.len()` initialized `pollfd` structs.
        let rc = unsafe {
            libc::poll(
                pollfds.as_mut_ptr(),
                pollfds.len() as libc::nfds_t,
                timeout_ms,
            )
        };

        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }

        let ready = (libc::POLLIN | libc::POLLERR | libc::POLLHUP) as libc::c_short;
        return Ok(pollfds
            .iter()
            .enumerate()
            .filter(|(_, p)| p.revents & ready != 0)
            .map(|(idx, _)| idx)
            .collect());
    }
}

use std::ffi::CString;

use crate::error::{Result, TransportError};

/// Resolve a network interface name (e.g. `wmx0`) to its kernel index.
pub fn interface_index(name: &str) -> Result<u32> {
    if name.is_empty() || name.len() >= libc::IF_NAMESIZE {
        return Err(TransportError::InvalidName(name.to_string()));
    }
    let c_name =
        CString::new(name).map_err(|_| TransportError::InvalidName(name.to_string()))?;

    // SAFETY: `c_name` is a valid NUL-terminated string that outlives the call.
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
    if index == 0 {
        return Err(TransportError::NoSuchDevice(name.to_string()));
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_interface_resolves() {
        let index = interface_index("lo").unwrap();
        assert!(index > 0);
    }

    #[test]
    fn missing_interface_is_reported() {
        let err = interface_index("wmxnope9").unwrap_err();
        assert!(matches!(err, TransportError::NoSuchDevice(name) if name == "wmxnope9"));
    }

    #[test]
    fn invalid_names_rejected() {
        assert!(matches!(
            interface_index(""),
            Err(TransportError::InvalidName(_))
        ));
        assert!(matches!(
            interface_index("wm\0x"),
            Err(TransportError::InvalidName(_))
        ));
        let long = "w".repeat(64);
        assert!(matches!(
            interface_index(&long),
            Err(TransportError::InvalidName(_))
        ));
    }
}

//! Crate-wide error type.
//!
//! Every public entry point into the hypervisor core returns [`HvResult`].
//! Variants mirror the POSIX-style codes the external configuration and
//! hypercall interfaces are specified against, so a [`HvError`] can be
//! turned directly into the negative errno the comm region or hypercall
//! return value expects.

use core::fmt;

/// Hypervisor-wide error code, one variant per errno the external
/// interfaces are allowed to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvError {
    /// Malformed or out-of-range argument (EINVAL).
    Invalid,
    /// Resource temporarily unavailable, e.g. reconfiguration in progress
    /// on another cell (EBUSY).
    Busy,
    /// Operation not permitted in the current cell/unit state (EPERM).
    Perm,
    /// Resource already exists (EEXIST).
    Exists,
    /// No such resource (ENOENT).
    NotFound,
    /// Out of memory, page pool exhausted (ENOMEM).
    NoMemory,
    /// Value out of representable range (ERANGE).
    Range,
    /// Argument list/structure too large (E2BIG).
    TooBig,
    /// I/O error from an underlying device (EIO).
    Io,
    /// No such device (ENODEV).
    NoDevice,
    /// Operation interrupted (EINTR).
    Interrupted,
}

impl HvError {
    /// Negative errno value as used on the hypercall/comm-region wire.
    pub const fn errno(self) -> i32 {
        match self {
            HvError::Invalid => -22,
            HvError::Busy => -16,
            HvError::Perm => -1,
            HvError::Exists => -17,
            HvError::NotFound => -2,
            HvError::NoMemory => -12,
            HvError::Range => -34,
            HvError::TooBig => -7,
            HvError::Io => -5,
            HvError::NoDevice => -19,
            HvError::Interrupted => -4,
        }
    }
}

impl fmt::Display for HvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HvError::Invalid => "EINVAL",
            HvError::Busy => "EBUSY",
            HvError::Perm => "EPERM",
            HvError::Exists => "EEXIST",
            HvError::NotFound => "ENOENT",
            HvError::NoMemory => "ENOMEM",
            HvError::Range => "ERANGE",
            HvError::TooBig => "E2BIG",
            HvError::Io => "EIO",
            HvError::NoDevice => "ENODEV",
            HvError::Interrupted => "EINTR",
        };
        f.write_str(s)
    }
}

/// Result alias used throughout the hypervisor core.
pub type HvResult<T> = Result<T, HvError>;

/// Log and return an error — mirrors the teacher's `trace_error` idiom of
/// reporting the call site before propagating.
#[macro_export]
macro_rules! trace_error {
    ($err:expr) => {{
        let e = $err;
        $crate::serial_println!("[ERROR] {}:{}: {}", file!(), line!(), e);
        e
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_matches_posix_values() {
        assert_eq!(HvError::Invalid.errno(), -22);
        assert_eq!(HvError::Busy.errno(), -16);
        assert_eq!(HvError::NotFound.errno(), -2);
        assert_eq!(HvError::NoMemory.errno(), -12);
    }

    #[test]
    fn display_matches_errno_name() {
        assert_eq!(alloc::format!("{}", HvError::Perm), "EPERM");
    }
}

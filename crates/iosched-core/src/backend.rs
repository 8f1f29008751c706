//! Blocking backend interfaces.
//!
//! A backend performs the actual blocking call (name lookup, stream read or
//! write) on whatever worker thread claimed an operation's blocking phase.
//! The engine never calls a backend while holding one of its own locks.
//!
//! **Contract for every backend method:**
//! - Check the cancellation token before starting and at any safe
//!   checkpoint; return `Err(IoError::Canceled)` when it is set.
//! - Return either a result or an error, never both, never neither.
//! - May block for as long as the external resource needs.
//!
//! # Implementors
//!
//! - `SystemResolver` (iosched-net): `getaddrinfo` / `getnameinfo`.
//! - Any `Read + Write + Send` type is a `StreamBackend`.
//! - Fake backends in `iosched-net::testing` for tests.

use std::io::{Read, Write};
use std::net::SocketAddr;
use std::ops::BitOr;

use crate::cancel::CancelToken;
use crate::error::{BackendError, IoError, IoResult};

/// Resolution flags (`AI_*` style hints).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ResolveFlags(u32);

impl ResolveFlags {
    pub const NONE: Self = Self(0);
    /// Results are meant for binding a listening socket.
    pub const PASSIVE: Self = Self(1 << 0);
    /// Ask for the canonical host name.
    pub const CANONICAL_NAME: Self = Self(1 << 1);
    /// Host is a numeric address; never query a name service.
    pub const NUMERIC_HOST: Self = Self(1 << 2);
    /// Service is a numeric port.
    pub const NUMERIC_SERVICE: Self = Self(1 << 3);
    /// Return IPv4-mapped IPv6 addresses when no IPv6 address exists.
    pub const V4_MAPPED: Self = Self(1 << 4);
    /// With `V4_MAPPED`, return mapped and native IPv6 addresses.
    pub const ALL_MATCHING: Self = Self(1 << 5);
    /// Only return families configured on this host.
    pub const ADDRESS_CONFIGURED: Self = Self(1 << 6);

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for ResolveFlags {
    fn default() -> Self {
        Self::ADDRESS_CONFIGURED | Self::V4_MAPPED
    }
}

impl BitOr for ResolveFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Address family filter for forward resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressFamily {
    #[default]
    Any,
    V4,
    V6,
}

impl AddressFamily {
    /// True if `addr` belongs to this family.
    pub fn matches(self, addr: &SocketAddr) -> bool {
        match self {
            AddressFamily::Any => true,
            AddressFamily::V4 => addr.is_ipv4(),
            AddressFamily::V6 => addr.is_ipv6(),
        }
    }
}

/// A forward resolution request: host and/or service to endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveQuery {
    pub host: String,
    pub service: String,
    pub flags: ResolveFlags,
    pub family: AddressFamily,
}

impl ResolveQuery {
    pub fn new(host: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            service: service.into(),
            flags: ResolveFlags::default(),
            family: AddressFamily::Any,
        }
    }

    pub fn flags(mut self, flags: ResolveFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn family(mut self, family: AddressFamily) -> Self {
        self.family = family;
        self
    }
}

/// Result of a reverse lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostInfo {
    pub host: String,
    pub service: String,
}

/// Blocking name resolution.
pub trait ResolveBackend: Send + Sync + 'static {
    /// Resolve a host/service pair to endpoints (`getaddrinfo`).
    fn resolve(&self, cancel: &CancelToken, query: &ResolveQuery) -> IoResult<Vec<SocketAddr>>;

    /// Resolve an endpoint to a host and service name (`getnameinfo`).
    fn reverse(&self, cancel: &CancelToken, endpoint: &SocketAddr) -> IoResult<HostInfo>;
}

/// Blocking stream I/O.
pub trait StreamBackend: Send + 'static {
    /// Read at least one byte into `buf`.
    ///
    /// A closed peer is `BackendError::Eof`, not `Ok(0)`, unless `buf` is empty.
    fn read_some(&mut self, cancel: &CancelToken, buf: &mut [u8]) -> IoResult<usize>;

    /// Write at least one byte of `buf`.
    fn write_some(&mut self, cancel: &CancelToken, buf: &[u8]) -> IoResult<usize>;
}

impl<T> StreamBackend for T
where
    T: Read + Write + Send + 'static,
{
    fn read_some(&mut self, cancel: &CancelToken, buf: &mut [u8]) -> IoResult<usize> {
        cancel.check()?;
        if buf.is_empty() {
            return Ok(0);
        }
        match self.read(buf)? {
            0 => Err(IoError::BackendFailure(BackendError::Eof)),
            n => Ok(n),
        }
    }

    fn write_some(&mut self, cancel: &CancelToken, buf: &[u8]) -> IoResult<usize> {
        cancel.check()?;
        Ok(self.write(buf)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelSource;
    use std::io::Cursor;

    #[test]
    fn test_flags() {
        let flags = ResolveFlags::default();
        assert!(flags.contains(ResolveFlags::V4_MAPPED));
        assert!(flags.contains(ResolveFlags::ADDRESS_CONFIGURED));
        assert!(!flags.contains(ResolveFlags::PASSIVE));

        let flags = ResolveFlags::PASSIVE | ResolveFlags::NUMERIC_SERVICE;
        assert_eq!(flags.bits(), 0b1001);
    }

    #[test]
    fn test_family_matches() {
        let v4: SocketAddr = "127.0.0.1:80".parse().unwrap();
        let v6: SocketAddr = "[::1]:80".parse().unwrap();
        assert!(AddressFamily::Any.matches(&v4));
        assert!(AddressFamily::V4.matches(&v4));
        assert!(!AddressFamily::V4.matches(&v6));
        assert!(AddressFamily::V6.matches(&v6));
    }

    #[test]
    fn test_query_builder() {
        let q = ResolveQuery::new("example", "http").family(AddressFamily::V4);
        assert_eq!(q.host, "example");
        assert_eq!(q.service, "http");
        assert_eq!(q.family, AddressFamily::V4);
        assert_eq!(q.flags, ResolveFlags::default());
    }

    #[test]
    fn test_read_write_stream_backend() {
        let source = CancelSource::new();
        let token = source.token();
        let mut stream = Cursor::new(b"abc".to_vec());

        let mut buf = [0u8; 8];
        assert_eq!(stream.read_some(&token, &mut buf), Ok(3));
        assert_eq!(&buf[..3], b"abc");

        // Exhausted cursor reads as end of file.
        assert_eq!(
            stream.read_some(&token, &mut buf),
            Err(IoError::BackendFailure(BackendError::Eof))
        );

        source.cancel();
        assert_eq!(stream.write_some(&token, b"x"), Err(IoError::Canceled));
    }
}

//! Operating system resolver backend
//!
//! Unix uses `getaddrinfo(3)` / `getnameinfo(3)` directly so resolution
//! flags and families reach the C library unchanged. Other platforms fall
//! back to `std::net::ToSocketAddrs`, without reverse lookups.

use iosched_core::{CancelToken, HostInfo, IoResult, ResolveBackend, ResolveQuery};

use std::net::SocketAddr;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod imp {
            use iosched_core::{AddressFamily, BackendError, HostInfo, IoError, IoResult, ResolveFlags, ResolveQuery};

            use std::ffi::{CStr, CString};
            use std::mem;
            use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
            use std::ptr;

            /// Host buffer for `getnameinfo` (NI_MAXHOST)
            const HOST_LEN: usize = 1025;
            /// Service buffer for `getnameinfo` (NI_MAXSERV)
            const SERV_LEN: usize = 32;

            fn gai_error(code: libc::c_int) -> IoError {
                let err = match code {
                    libc::EAI_AGAIN => BackendError::TryAgain,
                    libc::EAI_NONAME => BackendError::HostNotFound,
                    libc::EAI_SERVICE => BackendError::ServiceNotFound,
                    libc::EAI_MEMORY => BackendError::Os(libc::ENOMEM),
                    libc::EAI_BADFLAGS => BackendError::Os(libc::EINVAL),
                    libc::EAI_FAMILY => BackendError::Os(libc::EAFNOSUPPORT),
                    libc::EAI_SYSTEM => match std::io::Error::last_os_error().raw_os_error() {
                        Some(errno) => BackendError::Os(errno),
                        None => BackendError::Resolver(code),
                    },
                    other => BackendError::Resolver(other),
                };
                IoError::BackendFailure(err)
            }

            fn ai_flags(flags: ResolveFlags) -> libc::c_int {
                let table = [
                    (ResolveFlags::PASSIVE, libc::AI_PASSIVE),
                    (ResolveFlags::CANONICAL_NAME, libc::AI_CANONNAME),
                    (ResolveFlags::NUMERIC_HOST, libc::AI_NUMERICHOST),
                    (ResolveFlags::NUMERIC_SERVICE, libc::AI_NUMERICSERV),
                    (ResolveFlags::V4_MAPPED, libc::AI_V4MAPPED),
                    (ResolveFlags::ALL_MATCHING, libc::AI_ALL),
                    (ResolveFlags::ADDRESS_CONFIGURED, libc::AI_ADDRCONFIG),
                ];
                table
                    .iter()
                    .filter(|(ours, _)| flags.contains(*ours))
                    .fold(0, |acc, (_, theirs)| acc | theirs)
            }

            fn c_string(s: &str) -> IoResult<Option<CString>> {
                if s.is_empty() {
                    return Ok(None);
                }
                CString::new(s)
                    .map(Some)
                    .map_err(|_| IoError::BackendFailure(BackendError::HostNotFound))
            }

            /// Convert a C socket address, ignoring families other than v4/v6.
            ///
            /// # Safety
            /// `addr` must be null or point to `len` readable bytes.
            unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<SocketAddr> {
                if addr.is_null() {
                    return None;
                }
                let len = len as usize;
                match (*addr).sa_family as libc::c_int {
                    libc::AF_INET if len >= mem::size_of::<libc::sockaddr_in>() => {
                        let sin = &*(addr as *const libc::sockaddr_in);
                        let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
                        Some(SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(sin.sin_port))))
                    }
                    libc::AF_INET6 if len >= mem::size_of::<libc::sockaddr_in6>() => {
                        let sin6 = &*(addr as *const libc::sockaddr_in6);
                        let ip = Ipv6Addr::from(sin6.sin6_addr.s6_addr);
                        Some(SocketAddr::V6(SocketAddrV6::new(
                            ip,
                            u16::from_be(sin6.sin6_port),
                            sin6.sin6_flowinfo,
                            sin6.sin6_scope_id,
                        )))
                    }
                    _ => None,
                }
            }

            fn to_sockaddr(endpoint: &SocketAddr) -> (libc::sockaddr_storage, libc::socklen_t) {
                // SAFETY: sockaddr_storage is plain old data; all-zero is valid.
                let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
                let len = match endpoint {
                    SocketAddr::V4(a) => {
                        let len = mem::size_of::<libc::sockaddr_in>();
                        // SAFETY: sockaddr_storage is large and aligned enough for sockaddr_in.
                        let sin = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in) };
                        sin.sin_family = libc::AF_INET as libc::sa_family_t;
                        sin.sin_port = a.port().to_be();
                        sin.sin_addr = libc::in_addr {
                            s_addr: u32::from(*a.ip()).to_be(),
                        };
                        #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd", target_os = "openbsd", target_os = "netbsd"))]
                        {
                            sin.sin_len = len as u8;
                        }
                        len
                    }
                    SocketAddr::V6(a) => {
                        let len = mem::size_of::<libc::sockaddr_in6>();
                        // SAFETY: sockaddr_storage is large and aligned enough for sockaddr_in6.
                        let sin6 = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in6) };
                        sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
                        sin6.sin6_port = a.port().to_be();
                        sin6.sin6_addr.s6_addr = a.ip().octets();
                        sin6.sin6_flowinfo = a.flowinfo();
                        sin6.sin6_scope_id = a.scope_id();
                        #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd", target_os = "openbsd", target_os = "netbsd"))]
                        {
                            sin6.sin6_len = len as u8;
                        }
                        len
                    }
                };
                (storage, len as libc::socklen_t)
            }

            pub(super) fn getaddrinfo(query: &ResolveQuery) -> IoResult<Vec<SocketAddr>> {
                let host = c_string(&query.host)?;
                let service = c_string(&query.service)?;

                // SAFETY: addrinfo is plain old data; all-zero is the documented empty hint.
                let mut hints: libc::addrinfo = unsafe { mem::zeroed() };
                hints.ai_flags = ai_flags(query.flags);
                hints.ai_family = match query.family {
                    AddressFamily::Any => libc::AF_UNSPEC,
                    AddressFamily::V4 => libc::AF_INET,
                    AddressFamily::V6 => libc::AF_INET6,
                };
                hints.ai_socktype = libc::SOCK_STREAM;

                let mut list: *mut libc::addrinfo = ptr::null_mut();
                // SAFETY: all pointers are valid or null; `list` is freed below.
                let rc = unsafe {
                    libc::getaddrinfo(
                        host.as_ref().map_or(ptr::null(), |c| c.as_ptr()),
                        service.as_ref().map_or(ptr::null(), |c| c.as_ptr()),
                        &hints,
                        &mut list,
                    )
                };
                if rc != 0 {
                    return Err(gai_error(rc));
                }

                let mut endpoints = Vec::new();
                let mut cur = list;
                while !cur.is_null() {
                    // SAFETY: `cur` is a node of the list returned by getaddrinfo.
                    let node = unsafe { &*cur };
                    if let Some(ep) = unsafe { from_sockaddr(node.ai_addr, node.ai_addrlen) } {
                        endpoints.push(ep);
                    }
                    cur = node.ai_next;
                }
                // SAFETY: `list` came from a successful getaddrinfo call.
                unsafe { libc::freeaddrinfo(list) };

                Ok(endpoints)
            }

            pub(super) fn getnameinfo(endpoint: &SocketAddr) -> IoResult<HostInfo> {
                let (storage, len) = to_sockaddr(endpoint);
                let mut host = [0 as libc::c_char; HOST_LEN];
                let mut serv = [0 as libc::c_char; SERV_LEN];

                // SAFETY: buffers are writable for their stated lengths.
                let rc = unsafe {
                    libc::getnameinfo(
                        &storage as *const _ as *const libc::sockaddr,
                        len,
                        host.as_mut_ptr(),
                        HOST_LEN as libc::socklen_t,
                        serv.as_mut_ptr(),
                        SERV_LEN as libc::socklen_t,
                        0,
                    )
                };
                if rc != 0 {
                    return Err(gai_error(rc));
                }

                // SAFETY: getnameinfo NUL-terminates both buffers on success.
                let (host, service) = unsafe {
                    (
                        CStr::from_ptr(host.as_ptr()).to_string_lossy().into_owned(),
                        CStr::from_ptr(serv.as_ptr()).to_string_lossy().into_owned(),
                    )
                };
                Ok(HostInfo { host, service })
            }

            #[cfg(test)]
            mod tests {
                use super::*;

                #[test]
                fn test_sockaddr_conversion() {
                    for text in ["192.0.2.7:8080", "[2001:db8::7]:443"] {
                        let ep: SocketAddr = text.parse().unwrap();
                        let (storage, len) = to_sockaddr(&ep);
                        let back = unsafe { from_sockaddr(&storage as *const _ as *const libc::sockaddr, len) };
                        assert_eq!(back, Some(ep));
                    }
                }

                #[test]
                fn test_flag_mapping() {
                    assert_eq!(ai_flags(ResolveFlags::NONE), 0);
                    let flags = ai_flags(ResolveFlags::PASSIVE | ResolveFlags::NUMERIC_HOST);
                    assert_eq!(flags, libc::AI_PASSIVE | libc::AI_NUMERICHOST);
                }

                #[test]
                fn test_gai_error_mapping() {
                    assert_eq!(gai_error(libc::EAI_NONAME), IoError::BackendFailure(BackendError::HostNotFound));
                    assert_eq!(gai_error(libc::EAI_AGAIN), IoError::BackendFailure(BackendError::TryAgain));
                    assert_eq!(gai_error(libc::EAI_SERVICE), IoError::BackendFailure(BackendError::ServiceNotFound));
                }
            }
        }
    } else {
        mod imp {
            use iosched_core::{BackendError, HostInfo, IoError, IoResult, ResolveQuery};

            use std::net::{SocketAddr, ToSocketAddrs};

            pub(super) fn getaddrinfo(query: &ResolveQuery) -> IoResult<Vec<SocketAddr>> {
                let port: u16 = if query.service.is_empty() {
                    0
                } else {
                    query
                        .service
                        .parse()
                        .map_err(|_| IoError::BackendFailure(BackendError::ServiceNotFound))?
                };
                Ok((query.host.as_str(), port).to_socket_addrs()?.collect())
            }

            pub(super) fn getnameinfo(_endpoint: &SocketAddr) -> IoResult<HostInfo> {
                Err(IoError::BackendFailure(BackendError::Io(std::io::ErrorKind::Unsupported)))
            }
        }
    }
}

/// Resolver backed by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl SystemResolver {
    pub fn new() -> Self {
        Self
    }
}

impl ResolveBackend for SystemResolver {
    fn resolve(&self, cancel: &CancelToken, query: &ResolveQuery) -> IoResult<Vec<SocketAddr>> {
        cancel.check()?;
        let endpoints = imp::getaddrinfo(query)?;
        log::trace!("{}:{} -> {} endpoints", query.host, query.service, endpoints.len());
        Ok(endpoints.into_iter().filter(|ep| query.family.matches(ep)).collect())
    }

    fn reverse(&self, cancel: &CancelToken, endpoint: &SocketAddr) -> IoResult<HostInfo> {
        cancel.check()?;
        imp::getnameinfo(endpoint)
    }
}

//! Sockets that survive an upgrade by descriptor passing.

use std::net::{TcpListener, UdpSocket};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::os::unix::net::{SocketAddr as UnixAddr, UnixDatagram, UnixListener};

use anyhow::{Context, Result, bail};

/// `L` endpoints accept connections, `P` endpoints exchange datagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Listener,
    Packet,
}

impl EndpointKind {
    pub fn code(self) -> char {
        match self {
            Self::Listener => 'L',
            Self::Packet => 'P',
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "L" => Some(Self::Listener),
            "P" => Some(Self::Packet),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum Endpoint {
    Tcp(TcpListener),
    Unix(UnixListener),
    Udp(UdpSocket),
    UnixDatagram(UnixDatagram),
}

impl Endpoint {
    pub fn kind(&self) -> EndpointKind {
        match self {
            Self::Tcp(_) | Self::Unix(_) => EndpointKind::Listener,
            Self::Udp(_) | Self::UnixDatagram(_) => EndpointKind::Packet,
        }
    }

    pub fn network(&self) -> &'static str {
        match self {
            Self::Tcp(_) => "tcp",
            Self::Unix(_) => "unix",
            Self::Udp(_) => "udp",
            Self::UnixDatagram(_) => "unixgram",
        }
    }

    pub fn local_addr(&self) -> Result<String> {
        let addr = match self {
            Self::Tcp(l) => l.local_addr().map(|a| a.to_string()),
            Self::Udp(s) => s.local_addr().map(|a| a.to_string()),
            Self::Unix(l) => l.local_addr().map(|a| unix_addr_string(&a)),
            Self::UnixDatagram(s) => s.local_addr().map(|a| unix_addr_string(&a)),
        };
        addr.with_context(|| format!("failed to read local address of {} endpoint", self.network()))
    }

    /// Duplicates the descriptor; the copy refers to the same open socket.
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = match self {
            Self::Tcp(l) => l.try_clone().map(Self::Tcp),
            Self::Udp(s) => s.try_clone().map(Self::Udp),
            Self::Unix(l) => l.try_clone().map(Self::Unix),
            Self::UnixDatagram(s) => s.try_clone().map(Self::UnixDatagram),
        };
        cloned.with_context(|| format!("failed to duplicate {} endpoint", self.network()))
    }

    /// Rebuilds an endpoint from a received descriptor. The address family
    /// comes from `SO_DOMAIN`, the listener/packet split from the sender.
    pub fn from_fd(fd: OwnedFd, kind: EndpointKind) -> Result<Self> {
        let domain = socket_domain(fd.as_fd())?;
        let endpoint = match (kind, domain == libc::AF_UNIX) {
            (EndpointKind::Listener, true) => Self::Unix(UnixListener::from(fd)),
            (EndpointKind::Listener, false) => Self::Tcp(TcpListener::from(fd)),
            (EndpointKind::Packet, true) => Self::UnixDatagram(UnixDatagram::from(fd)),
            (EndpointKind::Packet, false) => Self::Udp(UdpSocket::from(fd)),
        };
        Ok(endpoint)
    }
}

impl AsFd for Endpoint {
    fn as_fd(&self) -> BorrowedFd<'_> {
        match self {
            Self::Tcp(l) => l.as_fd(),
            Self::Unix(l) => l.as_fd(),
            Self::Udp(s) => s.as_fd(),
            Self::UnixDatagram(s) => s.as_fd(),
        }
    }
}

impl From<TcpListener> for Endpoint {
    fn from(listener: TcpListener) -> Self {
        Self::Tcp(listener)
    }
}

impl From<UnixListener> for Endpoint {
    fn from(listener: UnixListener) -> Self {
        Self::Unix(listener)
    }
}

impl From<UdpSocket> for Endpoint {
    fn from(socket: UdpSocket) -> Self {
        Self::Udp(socket)
    }
}

impl From<UnixDatagram> for Endpoint {
    fn from(socket: UnixDatagram) -> Self {
        Self::UnixDatagram(socket)
    }
}

fn unix_addr_string(addr: &UnixAddr) -> String {
    match addr.as_pathname() {
        Some(path) => path.display().to_string(),
        None => "@".to_string(),
    }
}

fn socket_domain(fd: BorrowedFd<'_>) -> Result<libc::c_int> {
    let mut domain: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
    // SAFETY: `domain` and `len` are valid for writes and `len` matches the
    // size of `domain`; the descriptor is borrowed for the duration of the call.
    let rc = unsafe {
        libc::getsockopt(
            fd.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_DOMAIN,
            (&mut domain as *mut libc::c_int).cast(),
            &mut len,
        )
    };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        bail!("getsockopt(SO_DOMAIN) failed: {err}");
    }
    Ok(domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes() {
        assert_eq!(EndpointKind::Listener.code(), 'L');
        assert_eq!(EndpointKind::Packet.code(), 'P');
        assert_eq!(EndpointKind::from_code("P"), Some(EndpointKind::Packet));
        assert_eq!(EndpointKind::from_code("X"), None);
    }

    #[test]
    fn test_rebuild_from_duplicated_descriptor() -> Result<()> {
        let tcp = TcpListener::bind("127.0.0.1:0")?;
        let udp = UdpSocket::bind("127.0.0.1:0")?;
        let dir = tempfile::tempdir()?;
        let unix = UnixListener::bind(dir.path().join("api.sock"))?;
        let gram = UnixDatagram::bind(dir.path().join("log.sock"))?;

        let cases: Vec<(Endpoint, &str)> = vec![
            (tcp.into(), "tcp"),
            (udp.into(), "udp"),
            (unix.into(), "unix"),
            (gram.into(), "unixgram"),
        ];
        for (original, network) in cases {
            assert_eq!(original.network(), network);
            let fd = original.as_fd().try_clone_to_owned()?;
            let rebuilt = Endpoint::from_fd(fd, original.kind())?;
            assert_eq!(rebuilt.network(), network);
            assert_eq!(rebuilt.kind(), original.kind());
            assert_eq!(rebuilt.local_addr()?, original.local_addr()?);
        }
        Ok(())
    }

    #[test]
    fn test_unix_listener_address_is_its_path() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("ctl.sock");
        let endpoint = Endpoint::from(UnixListener::bind(&path)?);
        assert_eq!(endpoint.local_addr()?, path.display().to_string());
        assert_eq!(endpoint.try_clone()?.local_addr()?, endpoint.local_addr()?);
        Ok(())
    }
}

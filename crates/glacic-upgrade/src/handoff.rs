//! Phase-2 descriptor passing over the rendezvous socket.
//!
//! Each endpoint travels as one `sendmsg` carrying a single `SCM_RIGHTS`
//! descriptor and the payload `<name>|L` or `<name>|P`. The sender closes
//! the stream when done; end of stream ends the handoff.

use std::io;
use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;

use anyhow::{Context, Result, bail};

use crate::endpoint::{Endpoint, EndpointKind};

const PAYLOAD_BUF: usize = 1024;
const CONTROL_BUF_WORDS: usize = 64;

/// Sends every endpoint; the caller drops the stream afterwards.
pub fn send_endpoints(stream: &UnixStream, endpoints: &[(String, Endpoint)]) -> Result<()> {
    for (name, endpoint) in endpoints {
        let payload = format!("{name}|{}", endpoint.kind().code());
        send_fd(stream, payload.as_bytes(), endpoint.as_fd().as_raw_fd())
            .with_context(|| format!("failed to send endpoint {name}"))?;
        tracing::info!(name = %name, kind = %endpoint.kind().code(), "handed off endpoint");
    }
    Ok(())
}

/// Receives endpoints until the sender closes the stream.
///
/// A payload without `|` is taken as a listener name. Descriptors that
/// cannot be rebuilt are closed and skipped.
pub fn receive_endpoints(stream: &UnixStream) -> Result<Vec<(String, Endpoint)>> {
    let mut received = Vec::new();
    loop {
        let Some((payload, fds)) = recv_fds(stream).context("failed to read handoff message")?
        else {
            tracing::info!(count = received.len(), "endpoint handoff complete");
            return Ok(received);
        };
        let (name, kind) = match payload.split_once('|') {
            Some((name, code)) => match EndpointKind::from_code(code) {
                Some(kind) => (name.to_string(), kind),
                None => {
                    tracing::warn!(payload = %payload, "unknown endpoint type in handoff");
                    continue;
                }
            },
            None => (payload.clone(), EndpointKind::Listener),
        };
        if fds.is_empty() {
            tracing::warn!(name = %name, "handoff message carried no descriptor");
            continue;
        }
        for fd in fds {
            match Endpoint::from_fd(fd, kind) {
                Ok(endpoint) => {
                    tracing::info!(
                        name = %name,
                        kind = %kind.code(),
                        addr = %endpoint.local_addr().unwrap_or_default(),
                        "received endpoint"
                    );
                    received.push((name.clone(), endpoint));
                }
                Err(err) => {
                    tracing::warn!(name = %name, error = %err, "failed to rebuild endpoint");
                }
            }
        }
    }
}

fn send_fd(stream: &UnixStream, payload: &[u8], fd: RawFd) -> io::Result<()> {
    let mut control = [0u64; CONTROL_BUF_WORDS];
    let mut iov = libc::iovec {
        iov_base: payload.as_ptr() as *mut libc::c_void,
        iov_len: payload.len(),
    };

    // SAFETY: the msghdr points at `iov` and `control`, both alive for the
    // whole call; `control` is u64-aligned and larger than CMSG_SPACE for one
    // descriptor, so the header returned by CMSG_FIRSTHDR and its data area
    // lie inside it.
    let sent = unsafe {
        let space = libc::CMSG_SPACE(std::mem::size_of::<RawFd>() as libc::c_uint) as usize;
        let mut msg: libc::msghdr = std::mem::zeroed();
        msg.msg_iov = &mut iov;
        msg.msg_iovlen = 1;
        msg.msg_control = control.as_mut_ptr().cast();
        msg.msg_controllen = space as _;

        let cmsg = libc::CMSG_FIRSTHDR(&msg);
        if cmsg.is_null() {
            return Err(io::Error::other("control buffer too small"));
        }
        (*cmsg).cmsg_level = libc::SOL_SOCKET;
        (*cmsg).cmsg_type = libc::SCM_RIGHTS;
        (*cmsg).cmsg_len = libc::CMSG_LEN(std::mem::size_of::<RawFd>() as libc::c_uint) as _;
        std::ptr::write_unaligned(libc::CMSG_DATA(cmsg).cast::<RawFd>(), fd);

        libc::sendmsg(stream.as_raw_fd(), &msg, libc::MSG_NOSIGNAL)
    };
    if sent < 0 {
        return Err(io::Error::last_os_error());
    }
    if sent as usize != payload.len() {
        return Err(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("short handoff write: {sent} of {} bytes", payload.len()),
        ));
    }
    Ok(())
}

/// `None` once the peer has closed the stream.
fn recv_fds(stream: &UnixStream) -> io::Result<Option<(String, Vec<OwnedFd>)>> {
    let mut buf = [0u8; PAYLOAD_BUF];
    let mut control = [0u64; CONTROL_BUF_WORDS];
    let mut iov = libc::iovec {
        iov_base: buf.as_mut_ptr().cast(),
        iov_len: buf.len(),
    };
    // SAFETY: an all-zero msghdr is a valid empty header.
    let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.as_mut_ptr().cast();
    msg.msg_controllen = std::mem::size_of_val(&control) as _;

    let read = loop {
        // SAFETY: `msg` references `iov`/`buf` and `control`, which outlive the call.
        let n = unsafe { libc::recvmsg(stream.as_raw_fd(), &mut msg, libc::MSG_CMSG_CLOEXEC) };
        if n >= 0 {
            break n as usize;
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    };

    let mut fds = Vec::new();
    // SAFETY: the kernel filled `control` up to `msg_controllen`; the CMSG
    // macros only walk headers inside that range, and every SCM_RIGHTS
    // descriptor is freshly installed in this process, so taking ownership
    // of each exactly once is sound.
    unsafe {
        let mut cmsg = libc::CMSG_FIRSTHDR(&msg);
        while !cmsg.is_null() {
            if (*cmsg).cmsg_level == libc::SOL_SOCKET && (*cmsg).cmsg_type == libc::SCM_RIGHTS {
                let data = libc::CMSG_DATA(cmsg).cast::<RawFd>();
                let len = (*cmsg).cmsg_len as usize - libc::CMSG_LEN(0) as usize;
                for i in 0..len / std::mem::size_of::<RawFd>() {
                    let fd = std::ptr::read_unaligned(data.add(i));
                    fds.push(OwnedFd::from_raw_fd(fd));
                }
            }
            cmsg = libc::CMSG_NXTHDR(&msg, cmsg);
        }
    }
    if msg.msg_flags & libc::MSG_CTRUNC != 0 {
        tracing::warn!("handoff control data truncated; some descriptors were dropped");
    }

    if read == 0 && fds.is_empty() {
        return Ok(None);
    }
    Ok(Some((String::from_utf8_lossy(&buf[..read]).into_owned(), fds)))
}

/// Rejects names that would corrupt the `<name>|<kind>` payload.
pub fn check_endpoint_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("endpoint name must not be empty");
    }
    if name.contains('|') {
        bail!("endpoint name must not contain '|': {name}");
    }
    if name.len() >= PAYLOAD_BUF - 2 {
        bail!("endpoint name too long: {} bytes", name.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, TcpStream, UdpSocket};

    #[test]
    fn test_tcp_and_udp_survive_handoff() -> Result<()> {
        let tcp = TcpListener::bind("127.0.0.1:0")?;
        let udp = UdpSocket::bind("127.0.0.1:0")?;
        let tcp_addr = tcp.local_addr()?.to_string();
        let udp_addr = udp.local_addr()?.to_string();

        let endpoints = vec![
            ("test-tcp".to_string(), Endpoint::from(tcp)),
            ("test-udp".to_string(), Endpoint::from(udp)),
        ];

        let (sender, receiver) = UnixStream::pair()?;
        let reader = std::thread::spawn(move || receive_endpoints(&receiver));
        send_endpoints(&sender, &endpoints)?;
        drop(sender);
        let received = reader.join().expect("receiver thread")?;

        assert_eq!(received.len(), 2);
        let (name, endpoint) = &received[0];
        assert_eq!(name, "test-tcp");
        assert_eq!(endpoint.network(), "tcp");
        assert_eq!(endpoint.local_addr()?, tcp_addr);
        let (name, endpoint) = &received[1];
        assert_eq!(name, "test-udp");
        assert_eq!(endpoint.network(), "udp");
        assert_eq!(endpoint.local_addr()?, udp_addr);

        // The received listener shares the original bind.
        let Endpoint::Tcp(listener) = &received[0].1 else {
            panic!("expected tcp listener");
        };
        let _client = TcpStream::connect(&tcp_addr)?;
        let (_conn, _) = listener.accept()?;
        Ok(())
    }

    #[test]
    fn test_empty_handoff_ends_at_eof() -> Result<()> {
        let (sender, receiver) = UnixStream::pair()?;
        drop(sender);
        assert!(receive_endpoints(&receiver)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_message_without_descriptor_is_skipped() -> Result<()> {
        use std::io::Write;

        let (mut sender, receiver) = UnixStream::pair()?;
        sender.write_all(b"ghost|L")?;
        drop(sender);
        assert!(receive_endpoints(&receiver)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_endpoint_names() {
        assert!(check_endpoint_name("dns-udp").is_ok());
        assert!(check_endpoint_name("").is_err());
        assert!(check_endpoint_name("a|b").is_err());
    }
}

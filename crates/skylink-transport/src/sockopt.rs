//! Socket buffer sizing.
//!
//! The kernel may clamp or (on Linux) double the requested size; read it
//! back to see what was granted.

use std::io;
use std::net::UdpSocket;

pub fn set_send_buffer_size(socket: &UdpSocket, size: usize) -> io::Result<()> {
    set_buffer_size(socket, BufferKind::Send, size)
}

pub fn send_buffer_size(socket: &UdpSocket) -> io::Result<usize> {
    buffer_size(socket, BufferKind::Send)
}

pub fn set_recv_buffer_size(socket: &UdpSocket, size: usize) -> io::Result<()> {
    set_buffer_size(socket, BufferKind::Recv, size)
}

pub fn recv_buffer_size(socket: &UdpSocket) -> io::Result<usize> {
    buffer_size(socket, BufferKind::Recv)
}

#[derive(Debug, Clone, Copy)]
enum BufferKind {
    Send,
    Recv,
}

#[cfg(unix)]
impl BufferKind {
    fn optname(self) -> libc::c_int {
        match self {
            Self::Send => libc::SO_SNDBUF,
            Self::Recv => libc::SO_RCVBUF,
        }
    }
}

#[cfg(unix)]
fn set_buffer_size(socket: &UdpSocket, kind: BufferKind, size: usize) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    let value = libc::c_int::try_from(size)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "buffer size too large"))?;

    // SAFETY: `value` is a valid readable `c_int` for the given length, and the
    // descriptor belongs to `socket`, which outlives the call.
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            kind.optname(),
            (&value as *const libc::c_int).cast::<libc::c_void>(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(unix)]
fn buffer_size(socket: &UdpSocket, kind: BufferKind) -> io::Result<usize> {
    use std::os::fd::AsRawFd;

    let mut value: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;

    // SAFETY: `value` and `len` are valid writable pointers for the provided sizes,
    // and the descriptor belongs to `socket`, which outlives the call.
    let rc = unsafe {
        libc::getsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            kind.optname(),
            (&mut value as *mut libc::c_int).cast::<libc::c_void>(),
            &mut len,
        )
    };
    if rc == 0 {
        Ok(usize::try_from(value).unwrap_or(0))
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn set_buffer_size(_socket: &UdpSocket, _kind: BufferKind, _size: usize) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "socket buffer sizing is not supported on this platform",
    ))
}

#[cfg(not(unix))]
fn buffer_size(_socket: &UdpSocket, _kind: BufferKind) -> io::Result<usize> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "socket buffer sizing is not supported on this platform",
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_send_buffer_grows() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        set_send_buffer_size(&socket, 64 * 1024).unwrap();
        assert!(send_buffer_size(&socket).unwrap() >= 64 * 1024);
    }

    #[test]
    fn test_recv_buffer_readable() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        set_recv_buffer_size(&socket, 32 * 1024).unwrap();
        assert!(recv_buffer_size(&socket).unwrap() >= 32 * 1024);
    }
}

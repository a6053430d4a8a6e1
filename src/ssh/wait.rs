//! Socket readiness wait used whenever libssh2 reports "would block".
//!
//! libssh2 tells us which direction it is stuck on; this module only turns
//! that direction plus a deadline into a `poll(2)` and classifies the result.

use ssh2::BlockDirections;
use std::io;
use std::os::unix::io::RawFd;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub enum WaitOutcome {
    Ready,
    TimedOut,
    Failed(io::Error),
}

/// Absolute deadline for one public operation. Every wait inside the
/// operation draws from the same budget.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
    bound_ms: i64,
}

impl Deadline {
    /// Negative `timeout_ms` waits forever.
    pub fn from_ms(timeout_ms: i64) -> Self {
        let at = if timeout_ms < 0 {
            None
        } else {
            Some(Instant::now() + Duration::from_millis(timeout_ms as u64))
        };
        Self {
            at,
            bound_ms: timeout_ms,
        }
    }

    /// A deadline that is already due: would-block fails at the first wait.
    /// Used on teardown paths that must never stall.
    pub fn immediate() -> Self {
        Self::from_ms(0)
    }

    pub fn forever() -> Self {
        Self::from_ms(-1)
    }

    pub fn bound_ms(&self) -> i64 {
        self.bound_ms
    }

    pub fn is_forever(&self) -> bool {
        self.at.is_none()
    }

    /// `None` means no limit.
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn expired(&self) -> bool {
        matches!(self.remaining(), Some(left) if left.is_zero())
    }
}

fn poll_events(directions: BlockDirections) -> libc::c_short {
    match directions {
        BlockDirections::Inbound => libc::POLLIN,
        BlockDirections::Outbound => libc::POLLOUT,
        // libssh2 should always name a direction; waiting on both is the
        // conservative reading of "none".
        BlockDirections::Both | BlockDirections::None => libc::POLLIN | libc::POLLOUT,
    }
}

fn to_poll_timeout(remaining: Option<Duration>) -> libc::c_int {
    match remaining {
        None => -1,
        Some(left) => {
            let ms = left.as_millis();
            // round sub-millisecond remainders up so we do not spin
            let ms = if ms == 0 && !left.is_zero() { 1 } else { ms };
            ms.min(libc::c_int::MAX as u128) as libc::c_int
        }
    }
}

/// Blocks until `fd` is ready in `directions`, the deadline passes, or the
/// poll itself fails. Interrupted polls restart with the remaining budget.
pub fn wait_socket(fd: RawFd, directions: BlockDirections, deadline: &Deadline) -> WaitOutcome {
    let events = poll_events(directions);
    loop {
        let mut pfd = libc::pollfd {
            fd,
            events,
            revents: 0,
        };
        let timeout = to_poll_timeout(deadline.remaining());
        // SAFETY: `pfd` is a valid, initialised pollfd living on this stack
        // frame for the duration of the call, and nfds is 1.
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                if deadline.expired() {
                    return WaitOutcome::TimedOut;
                }
                continue;
            }
            return WaitOutcome::Failed(err);
        }
        if rc == 0 {
            return WaitOutcome::TimedOut;
        }
        if pfd.revents & libc::POLLNVAL != 0 {
            return WaitOutcome::Failed(io::Error::from_raw_os_error(libc::EBADF));
        }
        // POLLERR/POLLHUP count as ready: the retried libssh2 call reports
        // the actual socket failure with a proper error code.
        return WaitOutcome::Ready;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::os::unix::io::AsRawFd;

    fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn writable_socket_is_ready() {
        let (client, _server) = pair();
        let outcome = wait_socket(
            client.as_raw_fd(),
            BlockDirections::Outbound,
            &Deadline::from_ms(1_000),
        );
        assert!(matches!(outcome, WaitOutcome::Ready));
    }

    #[test]
    fn silent_peer_times_out() {
        let (client, _server) = pair();
        let started = Instant::now();
        let outcome = wait_socket(
            client.as_raw_fd(),
            BlockDirections::Inbound,
            &Deadline::from_ms(80),
        );
        assert!(matches!(outcome, WaitOutcome::TimedOut));
        assert!(started.elapsed() >= Duration::from_millis(70));
    }

    #[test]
    fn inbound_data_is_ready() {
        let (client, mut server) = pair();
        server.write_all(b"SSH-2.0-test\r\n").unwrap();
        let outcome = wait_socket(
            client.as_raw_fd(),
            BlockDirections::Inbound,
            &Deadline::from_ms(1_000),
        );
        assert!(matches!(outcome, WaitOutcome::Ready));
    }

    #[test]
    fn invalid_descriptor_fails() {
        let outcome = wait_socket(1 << 20, BlockDirections::Inbound, &Deadline::from_ms(50));
        match outcome {
            WaitOutcome::Failed(err) => assert_eq!(err.raw_os_error(), Some(libc::EBADF)),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn deadline_bookkeeping() {
        assert!(Deadline::forever().remaining().is_none());
        assert!(Deadline::forever().is_forever());
        assert!(Deadline::immediate().expired());
        assert_eq!(Deadline::from_ms(250).bound_ms(), 250);
        assert!(!Deadline::from_ms(10_000).expired());
    }
}

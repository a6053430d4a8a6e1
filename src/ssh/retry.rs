use super::wait::{wait_socket, Deadline, WaitOutcome};
use crate::constants::libssh2::{ERROR_EAGAIN, ERROR_TIMEOUT};
use crate::errors::SshError;
use ssh2::{BlockDirections, ErrorCode};
use std::io;
use std::os::unix::io::AsRawFd;

/// Something libssh2 can block on: it knows which way it is stuck and can
/// wait for that direction to clear.
pub trait Transport {
    fn pending_directions(&self) -> BlockDirections;
    fn wait_ready(&self, directions: BlockDirections, deadline: &Deadline) -> WaitOutcome;

    /// The library's record of the call that just failed, if it kept one.
    fn last_error(&self) -> Option<ssh2::Error> {
        None
    }
}

impl Transport for ssh2::Session {
    fn pending_directions(&self) -> BlockDirections {
        self.block_directions()
    }

    fn wait_ready(&self, directions: BlockDirections, deadline: &Deadline) -> WaitOutcome {
        wait_socket(self.as_raw_fd(), directions, deadline)
    }

    fn last_error(&self) -> Option<ssh2::Error> {
        ssh2::Error::last_session_error(self)
    }
}

/// Errors produced by libssh2 primitives, directly or through `std::io`.
pub trait LibraryFault: Sized {
    fn would_block(&self) -> bool;
    fn into_fault(self, op: &str) -> SshError;

    /// libssh2's own timer expired (blocking mode only).
    fn timed_out(&self) -> bool {
        false
    }

    /// Like `into_fault`, but may consult the transport for details the
    /// error value itself lost.
    fn into_fault_on<P: Transport + ?Sized>(self, _transport: &P, op: &str) -> SshError {
        self.into_fault(op)
    }
}

impl LibraryFault for ssh2::Error {
    fn would_block(&self) -> bool {
        matches!(self.code(), ErrorCode::Session(ERROR_EAGAIN))
    }

    fn into_fault(self, op: &str) -> SshError {
        SshError::from_ssh2(op, &self)
    }

    fn timed_out(&self) -> bool {
        matches!(self.code(), ErrorCode::Session(ERROR_TIMEOUT))
    }
}

impl LibraryFault for io::Error {
    fn would_block(&self) -> bool {
        self.kind() == io::ErrorKind::WouldBlock
    }

    /// ssh2 streams keep only the message when converting to `io::Error`.
    /// Without the session the code is gone, but the failure still came from
    /// the library, not from our socket wait.
    fn into_fault(self, op: &str) -> SshError {
        SshError::protocol(format!("{}: {}", op, self))
    }

    fn into_fault_on<P: Transport + ?Sized>(self, transport: &P, op: &str) -> SshError {
        match transport.last_error() {
            Some(inner) if !inner.would_block() => SshError::from_ssh2(op, &inner),
            _ => self.into_fault(op),
        }
    }
}

fn direction_label(directions: &BlockDirections) -> &'static str {
    match directions {
        BlockDirections::Inbound => "readable",
        BlockDirections::Outbound => "writable",
        BlockDirections::Both | BlockDirections::None => "readable or writable",
    }
}

/// One would-block round: wait for the direction libssh2 wants, then let
/// the caller retry. Timeouts and poll failures become faults; callers
/// holding a session must tear it down when they see one.
pub fn wait_once<P: Transport + ?Sized>(
    transport: &P,
    op: &str,
    deadline: &Deadline,
) -> Result<(), SshError> {
    let directions = transport.pending_directions();
    let label = direction_label(&directions);
    match transport.wait_ready(directions, deadline) {
        WaitOutcome::Ready => Ok(()),
        WaitOutcome::TimedOut => Err(SshError::timeout(format!(
            "{}: timed out after {} ms waiting for the socket to become {}",
            op,
            deadline.bound_ms(),
            label
        ))
        .with_details(serde_json::json!({
            "operation": op,
            "timeout_ms": deadline.bound_ms(),
        }))),
        WaitOutcome::Failed(err) => Err(SshError::io(format!(
            "{}: socket wait failed: {}",
            op, err
        ))
        .with_details(serde_json::json!({
            "operation": op,
            "os_error": err.raw_os_error(),
        }))),
    }
}

/// Repeats `call` until it stops reporting would-block.
pub fn retry<T, E, P>(
    transport: &P,
    op: &str,
    deadline: &Deadline,
    mut call: impl FnMut() -> Result<T, E>,
) -> Result<T, SshError>
where
    P: Transport + ?Sized,
    E: LibraryFault,
{
    loop {
        match call() {
            Ok(value) => return Ok(value),
            Err(err) if err.would_block() => wait_once(transport, op, deadline)?,
            Err(err) => return Err(err.into_fault_on(transport, op)),
        }
    }
}

pub trait BlockingMode {
    fn is_blocking(&self) -> bool;
    fn set_blocking(&self, blocking: bool);
}

impl BlockingMode for ssh2::Session {
    fn is_blocking(&self) -> bool {
        ssh2::Session::is_blocking(self)
    }

    fn set_blocking(&self, blocking: bool) {
        ssh2::Session::set_blocking(self, blocking)
    }
}

/// Switches a session to non-blocking for one scope and restores the
/// previous mode on every exit path.
pub struct NonBlockingGuard<'a, S: BlockingMode + ?Sized> {
    session: &'a S,
    restore: bool,
}

impl<'a, S: BlockingMode + ?Sized> NonBlockingGuard<'a, S> {
    pub fn new(session: &'a S) -> Self {
        let restore = session.is_blocking();
        if restore {
            session.set_blocking(false);
        }
        Self { session, restore }
    }
}

impl<S: BlockingMode + ?Sized> Drop for NonBlockingGuard<'_, S> {
    fn drop(&mut self) {
        if self.restore {
            self.session.set_blocking(true);
        }
    }
}

/// libssh2's own per-call timer, honoured only in blocking mode. Zero means
/// no limit.
pub trait LibraryTimer: BlockingMode {
    fn timer_ms(&self) -> u32;
    fn set_timer_ms(&self, timeout_ms: u32);
}

impl LibraryTimer for ssh2::Session {
    fn timer_ms(&self) -> u32 {
        self.timeout()
    }

    fn set_timer_ms(&self, timeout_ms: u32) {
        self.set_timeout(timeout_ms)
    }
}

fn timer_for(deadline: &Deadline) -> u32 {
    match deadline.remaining() {
        None => 0,
        // an expired budget still gets one millisecond: zero would mean forever
        Some(left) => left.as_millis().clamp(1, u32::MAX as u128) as u32,
    }
}

/// Blocking mode with the library timer bounded by a deadline; both are
/// restored on drop.
struct BoundedBlockingGuard<'a, S: LibraryTimer + ?Sized> {
    session: &'a S,
    was_blocking: bool,
    timer_ms: u32,
}

impl<'a, S: LibraryTimer + ?Sized> BoundedBlockingGuard<'a, S> {
    fn new(session: &'a S, deadline: &Deadline) -> Self {
        let guard = Self {
            session,
            was_blocking: session.is_blocking(),
            timer_ms: session.timer_ms(),
        };
        session.set_blocking(true);
        session.set_timer_ms(timer_for(deadline));
        guard
    }
}

impl<S: LibraryTimer + ?Sized> Drop for BoundedBlockingGuard<'_, S> {
    fn drop(&mut self) {
        self.session.set_timer_ms(self.timer_ms);
        self.session.set_blocking(self.was_blocking);
    }
}

/// Runs `call` exactly once in blocking mode, bounded by `deadline` through
/// the library timer. For primitives that consume their handle before they
/// can report would-block, so `retry` would hit a spent handle.
pub fn blocking_once<T, E, S>(
    session: &S,
    op: &str,
    deadline: &Deadline,
    call: impl FnOnce() -> Result<T, E>,
) -> Result<T, SshError>
where
    S: LibraryTimer + ?Sized,
    E: LibraryFault,
{
    let result = {
        let _blocking = BoundedBlockingGuard::new(session, deadline);
        call()
    };
    result.map_err(|err| {
        if err.timed_out() {
            SshError::timeout(format!(
                "{}: timed out after {} ms",
                op,
                deadline.bound_ms()
            ))
            .with_details(serde_json::json!({
                "operation": op,
                "timeout_ms": deadline.bound_ms(),
            }))
        } else {
            err.into_fault(op)
        }
    })
}

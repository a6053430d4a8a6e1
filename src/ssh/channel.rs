use super::encoding::TextEncoding;
use super::retry::{retry, wait_once, LibraryFault, NonBlockingGuard, Transport};
use super::session::{SessionCounters, SessionShared};
use super::wait::Deadline;
use crate::constants::buffers::CHANNEL_READ_CHUNK;
use crate::constants::limits::MAX_READ_BLOCK;
use crate::errors::SshError;
use serde::Serialize;
use ssh2::ExtendedData;
use std::io::{Read, Write};
use std::sync::atomic::Ordering;
use std::sync::Weak;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelKind {
    Session,
    DirectTcpip,
    Scp,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Session => "session",
            ChannelKind::DirectTcpip => "direct-tcpip",
            ChannelKind::Scp => "scp",
        }
    }
}

/// What happens to the extended (stderr) stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtendedDataMode {
    #[default]
    Normal,
    Merge,
    Ignore,
}

impl ExtendedDataMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(ExtendedDataMode::Normal),
            "merge" => Some(ExtendedDataMode::Merge),
            "ignore" => Some(ExtendedDataMode::Ignore),
            _ => None,
        }
    }

    fn to_library(self) -> ExtendedData {
        match self {
            ExtendedDataMode::Normal => ExtendedData::Normal,
            ExtendedDataMode::Merge => ExtendedData::Merge,
            ExtendedDataMode::Ignore => ExtendedData::Ignore,
        }
    }
}

/// Terminal geometry for `request_pty`, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtySize {
    pub cols: u32,
    pub rows: u32,
}

impl Default for PtySize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

struct ChannelCtx<'a> {
    session: &'a ssh2::Session,
    channel: &'a mut ssh2::Channel,
    deadline: &'a Deadline,
    op: &'a str,
    counters: &'a SessionCounters,
}

/// A multiplexed stream on an `SshSession`. The libssh2 handle lives in the
/// session's channel table; this value only names it. Every operation takes
/// the session lock.
pub struct Channel {
    id: u64,
    kind: ChannelKind,
    session: Weak<SessionShared>,
    encoding: TextEncoding,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl Channel {
    pub(crate) fn new(id: u64, kind: ChannelKind, session: Weak<SessionShared>) -> Self {
        Self {
            id,
            kind,
            session,
            encoding: TextEncoding::default(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn set_encoding(&mut self, encoding: TextEncoding) {
        self.encoding = encoding;
    }

    pub fn is_open(&self) -> bool {
        self.session
            .upgrade()
            .map(|shared| shared.lock().channels.contains_key(&self.id))
            .unwrap_or(false)
    }

    fn closed(&self, op: &str) -> SshError {
        SshError::channel_closed(format!("channel {}: {}: channel is closed", self.id, op))
    }

    fn run<T>(
        &self,
        op: &str,
        timeout_ms: i64,
        release: bool,
        body: impl FnOnce(ChannelCtx<'_>) -> Result<T, SshError>,
    ) -> Result<T, SshError> {
        let shared = self.session.upgrade().ok_or_else(|| self.closed(op))?;
        let deadline = Deadline::from_ms(timeout_ms);
        let mut guard = shared.lock();
        let label = format!("{}: channel {}: {}", guard.target(), self.id, op);
        let state = &mut *guard;
        let result = match (state.conn.as_ref(), state.channels.get_mut(&self.id)) {
            (Some(conn), Some(entry)) => {
                let _nonblocking = NonBlockingGuard::new(&conn.session);
                body(ChannelCtx {
                    session: &conn.session,
                    channel: &mut entry.channel,
                    deadline: &deadline,
                    op: &label,
                    counters: &shared.counters,
                })
            }
            _ => Err(self.closed(op)),
        };
        if release {
            state.discard_channel(self.id);
        }
        guard.settle(&shared.logger, result)
    }

    fn simple(
        &self,
        op: &str,
        timeout_ms: i64,
        mut call: impl FnMut(&mut ssh2::Channel) -> Result<(), ssh2::Error>,
    ) -> Result<(), SshError> {
        self.run(op, timeout_ms, false, |ctx| {
            let channel = ctx.channel;
            retry(ctx.session, ctx.op, ctx.deadline, || call(&mut *channel))
        })
    }

    pub fn setenv(&self, name: &str, value: &str, timeout_ms: i64) -> Result<(), SshError> {
        self.simple(&format!("setenv {}", name), timeout_ms, |c| c.setenv(name, value))
    }

    pub fn request_pty(&self, term: &str, size: PtySize, timeout_ms: i64) -> Result<(), SshError> {
        self.simple("request pty", timeout_ms, |c| {
            c.request_pty(term, None, Some((size.cols, size.rows, 0, 0)))
        })
    }

    pub fn shell(&self, timeout_ms: i64) -> Result<(), SshError> {
        self.simple("shell", timeout_ms, |c| c.shell())
    }

    pub fn exec(&self, command: &str, timeout_ms: i64) -> Result<(), SshError> {
        self.simple("exec", timeout_ms, |c| c.exec(command))
    }

    pub fn subsystem(&self, name: &str, timeout_ms: i64) -> Result<(), SshError> {
        self.simple(&format!("subsystem {}", name), timeout_ms, |c| c.subsystem(name))
    }

    pub fn send_eof(&self, timeout_ms: i64) -> Result<(), SshError> {
        self.simple("send eof", timeout_ms, |c| c.send_eof())
    }

    pub fn wait_eof(&self, timeout_ms: i64) -> Result<(), SshError> {
        self.simple("wait eof", timeout_ms, |c| c.wait_eof())
    }

    /// Waits for the remote side to close; requires remote EOF first.
    pub fn wait_closed(&self, timeout_ms: i64) -> Result<(), SshError> {
        self.simple("wait closed", timeout_ms, |c| c.wait_close())
    }

    pub fn set_extended_data(&self, mode: ExtendedDataMode, timeout_ms: i64) -> Result<(), SshError> {
        self.simple("extended data mode", timeout_ms, |c| {
            c.handle_extended_data(mode.to_library())
        })
    }

    /// Closes the channel and drops it from the session whatever the
    /// outcome. Later operations fail with a channel-closed error.
    pub fn close(&self, timeout_ms: i64) -> Result<(), SshError> {
        self.run("close", timeout_ms, true, |ctx| {
            let channel = ctx.channel;
            retry(ctx.session, ctx.op, ctx.deadline, || channel.close())
        })
    }

    pub fn eof(&self) -> Result<bool, SshError> {
        self.run("eof", 0, false, |ctx| Ok(ctx.channel.eof()))
    }

    pub fn exit_status(&self) -> Result<i32, SshError> {
        self.run("exit status", 0, false, |ctx| {
            ctx.channel
                .exit_status()
                .map_err(|err| err.into_fault(ctx.op))
        })
    }

    /// Returns whatever is available on `stream_id`. Waits only while
    /// nothing has arrived; an empty result means EOF.
    pub fn read(&self, stream_id: i32, timeout_ms: i64) -> Result<Vec<u8>, SshError> {
        self.run("read", timeout_ms, false, |ctx| {
            let mut stream = ctx.channel.stream(stream_id);
            let out = read_available(&mut stream, ctx.session, ctx.op, ctx.deadline)?;
            ctx.counters
                .bytes_read
                .fetch_add(out.len() as u64, Ordering::Relaxed);
            Ok(out)
        })
    }

    /// Reads exactly `size` bytes. EOF before that is a protocol error.
    pub fn read_block(&self, size: usize, stream_id: i32, timeout_ms: i64) -> Result<Vec<u8>, SshError> {
        if size > MAX_READ_BLOCK {
            return Err(SshError::parameter_range(format!(
                "channel {}: read block: size {} exceeds the {} byte limit",
                self.id, size, MAX_READ_BLOCK
            )));
        }
        self.run("read block", timeout_ms, false, |ctx| {
            let mut stream = ctx.channel.stream(stream_id);
            let out = read_exact_block(&mut stream, ctx.session, ctx.op, ctx.deadline, size)?;
            ctx.counters
                .bytes_read
                .fetch_add(size as u64, Ordering::Relaxed);
            Ok(out)
        })
    }

    pub fn read_string(&self, stream_id: i32, timeout_ms: i64) -> Result<String, SshError> {
        let bytes = self.read(stream_id, timeout_ms)?;
        Ok(self.encoding.decode(&bytes))
    }

    pub fn read_text_block(&self, size: usize, stream_id: i32, timeout_ms: i64) -> Result<String, SshError> {
        let bytes = self.read_block(size, stream_id, timeout_ms)?;
        Ok(self.encoding.decode(&bytes))
    }

    /// Writes all of `data`. An empty buffer is a no-op.
    pub fn write(&self, data: &[u8], stream_id: i32, timeout_ms: i64) -> Result<(), SshError> {
        if data.is_empty() {
            return Ok(());
        }
        self.run("write", timeout_ms, false, |ctx| {
            let mut stream = ctx.channel.stream(stream_id);
            write_all_stream(&mut stream, ctx.session, ctx.op, ctx.deadline, data)?;
            ctx.counters
                .bytes_written
                .fetch_add(data.len() as u64, Ordering::Relaxed);
            Ok(())
        })
    }

    pub fn write_text(&self, text: &str, stream_id: i32, timeout_ms: i64) -> Result<(), SshError> {
        let bytes = self.encoding.encode(text)?;
        self.write(&bytes, stream_id, timeout_ms)
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if let Some(shared) = self.session.upgrade() {
            shared.lock().discard_channel(self.id);
        }
    }
}

fn read_available<R, P>(
    stream: &mut R,
    transport: &P,
    op: &str,
    deadline: &Deadline,
) -> Result<Vec<u8>, SshError>
where
    R: Read + ?Sized,
    P: Transport + ?Sized,
{
    let mut out = Vec::new();
    let mut buf = [0u8; CHANNEL_READ_CHUNK];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(err) if err.would_block() => {
                if !out.is_empty() {
                    break;
                }
                wait_once(transport, op, deadline)?;
            }
            Err(err) => return Err(err.into_fault_on(transport, op)),
        }
    }
    Ok(out)
}

/// The buffer grows with the data actually received, not with `size`.
fn read_exact_block<R, P>(
    stream: &mut R,
    transport: &P,
    op: &str,
    deadline: &Deadline,
    size: usize,
) -> Result<Vec<u8>, SshError>
where
    R: Read + ?Sized,
    P: Transport + ?Sized,
{
    let mut out = Vec::with_capacity(size.min(CHANNEL_READ_CHUNK));
    let mut buf = [0u8; CHANNEL_READ_CHUNK];
    while out.len() < size {
        let want = (size - out.len()).min(buf.len());
        match stream.read(&mut buf[..want]) {
            Ok(0) => {
                return Err(SshError::protocol(format!(
                    "{}: end of stream after {} of {} bytes",
                    op,
                    out.len(),
                    size
                )))
            }
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(err) if err.would_block() => {
                let filled = out.len();
                wait_once(transport, op, deadline).map_err(|mut err| {
                    err.message = format!("{} ({} of {} bytes read)", err.message, filled, size);
                    err
                })?;
            }
            Err(err) => return Err(err.into_fault_on(transport, op)),
        }
    }
    Ok(out)
}

fn write_all_stream<W, P>(
    stream: &mut W,
    transport: &P,
    op: &str,
    deadline: &Deadline,
    data: &[u8],
) -> Result<(), SshError>
where
    W: Write + ?Sized,
    P: Transport + ?Sized,
{
    let mut offset = 0;
    while offset < data.len() {
        match stream.write(&data[offset..]) {
            Ok(0) => wait_once(transport, op, deadline)?,
            Ok(n) => offset += n,
            Err(err) if err.would_block() => wait_once(transport, op, deadline)?,
            Err(err) => return Err(err.into_fault_on(transport, op)),
        }
    }
    Ok(())
}

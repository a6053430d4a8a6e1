use crate::constants::libssh2::ERROR_FILE;
use crate::errors::SshError;
use crate::services::logger::Logger;
use crate::ssh::retry::{retry, wait_once, LibraryFault, Transport};
use crate::ssh::session::SessionCounters;
use crate::ssh::wait::Deadline;
use ssh2::{ErrorCode, FileStat};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::Ordering;

/// Something that can release a remote handle, possibly reporting
/// would-block.
pub(crate) trait Closable {
    type Error: LibraryFault;
    fn close_handle(&mut self) -> Result<(), Self::Error>;
}

impl Closable for ssh2::File {
    type Error = ssh2::Error;

    fn close_handle(&mut self) -> Result<(), ssh2::Error> {
        self.close()
    }
}

/// An open SFTP file or directory that is closed on every exit path.
///
/// `close` retries within the deadline and reports failures. Dropping an
/// unclosed handle tries once without waiting; if that would block the
/// handle is abandoned and counted in `leaked_handles`.
pub(crate) struct RemoteHandle<'a, H: Closable = ssh2::File> {
    handle: Option<H>,
    transport: &'a dyn Transport,
    counters: &'a SessionCounters,
    logger: &'a Logger,
    label: String,
}

impl<'a, H: Closable> RemoteHandle<'a, H> {
    pub fn new(
        handle: H,
        transport: &'a dyn Transport,
        counters: &'a SessionCounters,
        logger: &'a Logger,
        label: impl Into<String>,
    ) -> Self {
        Self {
            handle: Some(handle),
            transport,
            counters,
            logger,
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn inner(&mut self) -> Result<&mut H, SshError> {
        let label = &self.label;
        self.handle
            .as_mut()
            .ok_or_else(|| SshError::internal(format!("{}: handle already closed", label)))
    }

    pub fn close(mut self, deadline: &Deadline) -> Result<(), SshError> {
        let Some(mut handle) = self.handle.take() else {
            return Ok(());
        };
        let op = format!("{}: close", self.label);
        retry(self.transport, &op, deadline, || handle.close_handle())
    }
}

impl RemoteHandle<'_, ssh2::File> {
    /// Next directory entry, `None` at the end of the listing.
    pub fn next_entry(&mut self, deadline: &Deadline) -> Result<Option<(PathBuf, FileStat)>, SshError> {
        let op = format!("{}: readdir", self.label);
        let transport = self.transport;
        let dir = self.inner()?;
        loop {
            match dir.readdir() {
                Ok(entry) => return Ok(Some(entry)),
                Err(err) if err.would_block() => wait_once(transport, &op, deadline)?,
                Err(err) if matches!(err.code(), ErrorCode::Session(ERROR_FILE)) => return Ok(None),
                Err(err) => return Err(err.into_fault(&op)),
            }
        }
    }

    /// Reads up to `buf.len()` bytes; `0` means end of file.
    pub fn read_chunk(&mut self, buf: &mut [u8], deadline: &Deadline) -> Result<usize, SshError> {
        let op = format!("{}: read", self.label);
        let transport = self.transport;
        let file = self.inner()?;
        retry(transport, &op, deadline, || file.read(&mut *buf))
    }

    pub fn write_all(&mut self, data: &[u8], deadline: &Deadline) -> Result<(), SshError> {
        let op = format!("{}: write", self.label);
        let transport = self.transport;
        let file = self.inner()?;
        let mut offset = 0;
        while offset < data.len() {
            match file.write(&data[offset..]) {
                Ok(0) => wait_once(transport, &op, deadline)?,
                Ok(n) => offset += n,
                Err(err) if err.would_block() => wait_once(transport, &op, deadline)?,
                Err(err) => return Err(err.into_fault_on(transport, &op)),
            }
        }
        Ok(())
    }
}

impl<H: Closable> Drop for RemoteHandle<'_, H> {
    fn drop(&mut self) {
        let Some(mut handle) = self.handle.take() else {
            return;
        };
        match handle.close_handle() {
            Ok(()) => {}
            Err(err) if err.would_block() => {
                // The library's own drop would retry the close in blocking
                // mode; abandon the handle instead.
                std::mem::forget(handle);
                self.counters.leaked_handles.fetch_add(1, Ordering::Relaxed);
                self.logger.warn(
                    "remote handle leaked",
                    Some(&serde_json::json!({"handle": self.label})),
                );
            }
            Err(err) => {
                let fault = err.into_fault(&self.label);
                self.logger.debug(
                    "remote handle close failed",
                    Some(&serde_json::json!({"handle": self.label, "error": fault.message})),
                );
            }
        }
    }
}

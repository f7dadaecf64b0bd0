//! Tee of the process's stdout/stderr into a [`LogRingBuffer`].
//!
//! On unix the tee swaps file descriptors 1 and 2 for the write end of a pipe.
//! A reader thread drains the pipe, forwards every chunk to the original
//! stdout so console consumers still see it, and records the chunk in the
//! buffer. [`ConsoleTee::stop`] puts the original descriptors back.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use super::CaptureError;
use super::log_buffer::{LogRingBuffer, LogSource};

/// How long `stop` waits for the reader to drain what is left in the pipe.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

const READ_CHUNK: usize = 4096;

/// Scoped interception of the process console.
///
/// `start` installs the tee; `stop` (or drop) removes it exactly once. Only
/// one tee may be active per process; a second `start` elsewhere fails with
/// [`CaptureError::AlreadyActive`] until the first one stops.
pub struct ConsoleTee {
    buffer: Arc<LogRingBuffer>,
    active: Option<imp::ActiveTee>,
}

impl ConsoleTee {
    pub fn new(buffer: Arc<LogRingBuffer>) -> Self {
        Self {
            buffer,
            active: None,
        }
    }

    pub fn buffer(&self) -> &Arc<LogRingBuffer> {
        &self.buffer
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Begin duplicating console output. Calling it while already active is
    /// a no-op.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.active.is_some() {
            return Ok(());
        }
        self.active = Some(imp::ActiveTee::install(self.buffer.clone())?);
        Ok(())
    }

    /// Restore the original stream destinations. Safe to call when not active
    /// or when nothing was ever written.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.release();
        }
    }
}

impl Drop for ConsoleTee {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Turns raw pipe reads into log entries.
///
/// A multi-byte character split across two reads is held back and completed
/// by the next read. Chunks with genuinely invalid UTF-8 are dropped.
#[derive(Debug, Default)]
pub(crate) struct ChunkDecoder {
    pending: Vec<u8>,
}

impl ChunkDecoder {
    pub(crate) fn ingest(&mut self, buffer: &LogRingBuffer, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        let complete = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // Incomplete sequence at the end: keep it for the next read
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => {
                self.pending.clear();
                return;
            }
        };
        if complete == 0 {
            return;
        }
        if let Ok(text) = std::str::from_utf8(&self.pending[..complete]) {
            buffer.record_line(LogSource::Console, text);
        }
        self.pending.drain(..complete);
    }
}

/// Copy `pipe` to `original` chunk by chunk until end of input, recording
/// each chunk. Never logs: anything it wrote to stderr would come straight
/// back through the pipe.
fn pump<R: Read, W: Write>(mut pipe: R, mut original: W, buffer: &LogRingBuffer) {
    let mut chunk = [0u8; READ_CHUNK];
    let mut decoder = ChunkDecoder::default();
    loop {
        match pipe.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let _ = original.write_all(&chunk[..n]);
                let _ = original.flush();
                decoder.ingest(buffer, &chunk[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
}

fn flush_std_streams() {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
}

#[cfg(unix)]
mod imp {
    use std::fs::File;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
    use std::thread::JoinHandle;

    use tracing::warn;

    use super::{CaptureError, DRAIN_TIMEOUT, LogRingBuffer, flush_std_streams, pump};

    /// Set while fds 1 and 2 point at some tee's pipe.
    static INSTALLED: AtomicBool = AtomicBool::new(false);

    pub(super) struct ActiveTee {
        saved_stdout: OwnedFd,
        saved_stderr: OwnedFd,
        reader: JoinHandle<()>,
        drained: Receiver<()>,
    }

    fn os_call(ret: libc::c_int, op: &'static str) -> Result<libc::c_int, CaptureError> {
        if ret < 0 {
            Err(CaptureError::Os {
                op,
                source: std::io::Error::last_os_error(),
            })
        } else {
            Ok(ret)
        }
    }

    fn dup_owned(fd: RawFd, op: &'static str) -> Result<OwnedFd, CaptureError> {
        let dup = os_call(unsafe { libc::dup(fd) }, op)?;
        Ok(unsafe { OwnedFd::from_raw_fd(dup) })
    }

    impl ActiveTee {
        pub(super) fn install(buffer: Arc<LogRingBuffer>) -> Result<Self, CaptureError> {
            if INSTALLED
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return Err(CaptureError::AlreadyActive);
            }
            let installed = Self::redirect(buffer);
            if installed.is_err() {
                INSTALLED.store(false, Ordering::Release);
            }
            installed
        }

        fn redirect(buffer: Arc<LogRingBuffer>) -> Result<Self, CaptureError> {
            flush_std_streams();

            let mut fds = [0 as libc::c_int; 2];
            os_call(unsafe { libc::pipe(fds.as_mut_ptr()) }, "create pipe")?;
            let read_end = unsafe { OwnedFd::from_raw_fd(fds[0]) };
            let write_end = unsafe { OwnedFd::from_raw_fd(fds[1]) };

            let saved_stdout = dup_owned(libc::STDOUT_FILENO, "save stdout")?;
            let saved_stderr = dup_owned(libc::STDERR_FILENO, "save stderr")?;
            let forward = saved_stdout
                .try_clone()
                .map_err(|source| CaptureError::Os {
                    op: "duplicate stdout",
                    source,
                })?;

            let (drained_tx, drained) = mpsc::channel();
            let reader = std::thread::Builder::new()
                .name("console-tee".into())
                .spawn(move || {
                    pump(File::from(read_end), File::from(forward), &buffer);
                    let _ = drained_tx.send(());
                })
                .map_err(CaptureError::ReaderSpawn)?;

            let tee = Self {
                saved_stdout,
                saved_stderr,
                reader,
                drained,
            };

            let redirected = os_call(
                unsafe { libc::dup2(write_end.as_raw_fd(), libc::STDOUT_FILENO) },
                "redirect stdout",
            )
            .and_then(|_| {
                os_call(
                    unsafe { libc::dup2(write_end.as_raw_fd(), libc::STDERR_FILENO) },
                    "redirect stderr",
                )
            });
            // fds 1 and 2 now hold the only write ends
            drop(write_end);

            if let Err(e) = redirected {
                tee.release();
                return Err(e);
            }
            Ok(tee)
        }

        pub(super) fn release(self) {
            flush_std_streams();

            let restored_out = unsafe {
                libc::dup2(self.saved_stdout.as_raw_fd(), libc::STDOUT_FILENO)
            };
            let restored_err = unsafe {
                libc::dup2(self.saved_stderr.as_raw_fd(), libc::STDERR_FILENO)
            };
            if restored_out < 0 || restored_err < 0 {
                warn!(
                    error = %std::io::Error::last_os_error(),
                    "console tee: failed to restore original streams"
                );
            }
            drop(self.saved_stdout);
            drop(self.saved_stderr);
            INSTALLED.store(false, Ordering::Release);

            // A child process that inherited the pipe keeps it open; don't wait on it.
            match self.drained.recv_timeout(DRAIN_TIMEOUT) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    let _ = self.reader.join();
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!("console tee: reader still draining, detaching it");
                }
            }
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use std::sync::Arc;

    use super::{CaptureError, LogRingBuffer};

    pub(super) struct ActiveTee;

    impl ActiveTee {
        pub(super) fn install(_buffer: Arc<LogRingBuffer>) -> Result<Self, CaptureError> {
            Err(CaptureError::Unsupported)
        }

        pub(super) fn release(self) {}
    }
}

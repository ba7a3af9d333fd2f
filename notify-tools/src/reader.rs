//! Reassembly of raw records from the notification byte stream.
//!
//! The kernel writes whole records, but a read may still stop in the middle of one when the
//! caller's buffer is short. Bytes of an incomplete record stay buffered until the rest
//! arrives with a later read.

use std::{ffi::OsStr, io, os::unix::ffi::OsStrExt, thread, time::Duration};

use notify_tools_types::{EventMask, RawEvent};

use crate::{error::ProtocolError, Backend, Error, Result};

/// Size of the fixed record header: descriptor, mask, cookie and name length.
pub const HEADER_SIZE: usize = 16;

/// Upper bound for the batch size hint.
pub const MAX_EVENTS: usize = 4096;

/// Longest record the kernel emits: a header plus a file name of `NAME_MAX` bytes and its NUL.
pub const MAX_RECORD_SIZE: usize = HEADER_SIZE + NAME_MAX + 1;

const NAME_MAX: usize = 255;

/// Default stream buffer size.
pub const DEFAULT_BUFFER_CAPACITY: usize = HEADER_SIZE * MAX_EVENTS;

/// Turns the raw byte stream of a [`Backend`] into [`RawEvent`]s.
///
/// Holds a fixed-size buffer. Parsed bytes are consumed from the front, new bytes are
/// appended after the unparsed ones.
#[derive(Debug)]
pub struct EventReader {
    buf: Box<[u8]>,
    start: usize,
    end: usize,
}

impl Default for EventReader {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }
}

impl EventReader {
    /// Creates a reader with the default buffer size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reader with a buffer of `capacity` bytes, at least one header.
    pub fn with_capacity(capacity: usize) -> Self {
        EventReader {
            buf: vec![0; capacity.max(HEADER_SIZE)].into_boxed_slice(),
            start: 0,
            end: 0,
        }
    }

    /// Size of the stream buffer.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Whether bytes from an earlier read are still waiting to be parsed.
    pub fn is_draining(&self) -> bool {
        self.start < self.end
    }

    /// Drops every buffered byte.
    pub fn clear(&mut self) {
        self.start = 0;
        self.end = 0;
    }

    /// Returns the next record, reading from `backend` only when nothing complete is buffered.
    ///
    /// `timeout` bounds each wait for readiness; `None` blocks, `Some(Duration::ZERO)` polls.
    /// `hint` is the number of records the caller expects to consume soon: before reading,
    /// the reader briefly lets the kernel queue settle until that many headers' worth of
    /// bytes are available. Returns `Ok(None)` when the wait timed out.
    ///
    /// # Errors
    ///
    /// I/O failures of the backend, a stream that ends, and a record that can never fit in
    /// the buffer (whether its header says so or the backend refuses the read). All but the
    /// first are [`ErrorKind::Protocol`](crate::ErrorKind::Protocol).
    pub fn next_record<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        timeout: Option<Duration>,
        hint: usize,
    ) -> Result<Option<RawEvent>> {
        loop {
            if let Some(event) = self.parse_next()? {
                return Ok(Some(event));
            }
            if !self.fill(backend, timeout, hint)? {
                return Ok(None);
            }
        }
    }

    fn parse_next(&mut self) -> Result<Option<RawEvent>> {
        let pending = &self.buf[self.start..self.end];
        if pending.len() < HEADER_SIZE {
            return Ok(None);
        }

        let name_len = read_u32(pending, 12) as usize;
        let len = HEADER_SIZE.saturating_add(name_len);
        if len > self.buf.len() {
            return Err(Error::protocol(ProtocolError::RecordTooLarge {
                len,
                capacity: self.buf.len(),
            }));
        }
        if pending.len() < len {
            return Ok(None);
        }

        let name = match &pending[HEADER_SIZE..len] {
            [] => None,
            raw => {
                let nul = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
                Some(OsStr::from_bytes(&raw[..nul]).to_os_string())
            }
        };
        let event = RawEvent {
            wd: read_u32(pending, 0) as i32,
            mask: EventMask::from_bits_retain(read_u32(pending, 4)),
            cookie: read_u32(pending, 8),
            name,
        };

        self.start += len;
        if self.start == self.end {
            self.clear();
        }

        log::trace!("inotify record: {:?}", event);
        Ok(Some(event))
    }

    /// Appends one read's worth of bytes. Returns `false` on timeout.
    fn fill<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        timeout: Option<Duration>,
        hint: usize,
    ) -> Result<bool> {
        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        // a record longer than the buffer is rejected as soon as its header is parsed
        debug_assert!(self.end < self.buf.len());

        loop {
            if !backend.wait(timeout)? {
                return Ok(false);
            }
            settle(backend, hint)?;

            match backend.read(&mut self.buf[self.end..]) {
                Ok(0) => return Err(Error::protocol(ProtocolError::UnexpectedEof)),
                Ok(read) => {
                    self.end += read;
                    return Ok(true);
                }
                Err(err)
                    if err.kind() == io::ErrorKind::WouldBlock
                        || err.kind() == io::ErrorKind::Interrupted =>
                {
                    continue
                }
                // the kernel never splits a record, it fails reads too short for the next one
                Err(err)
                    if err.raw_os_error() == Some(libc::EINVAL)
                        && self.buf.len() - self.end < MAX_RECORD_SIZE =>
                {
                    return Err(Error::protocol(ProtocolError::RecordRefused {
                        available: self.buf.len() - self.end,
                    }));
                }
                Err(err) => return Err(Error::io(err)),
            }
        }
    }
}

/// Lets the queue grow until `hint` headers fit in it or it stops growing.
fn settle<B: Backend + ?Sized>(backend: &B, hint: usize) -> io::Result<()> {
    let wanted = hint.clamp(1, MAX_EVENTS) * HEADER_SIZE;
    let mut available = backend.available()?;
    while available < wanted {
        thread::yield_now();
        let now = backend.available()?;
        if now <= available {
            break;
        }
        available = now;
    }
    Ok(())
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_ne_bytes(word)
}

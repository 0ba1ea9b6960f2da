// Global logging for droidboot
//
// Records go to a fixed ring in RAM (read back by `fastboot oem log`) and,
// once a board installs one, to a byte sink such as the debug UART.

use alloc::vec::Vec;
use core::fmt::{self, Write};

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

/// Bytes kept in the ring
pub const LOG_BUFFER_SIZE: usize = 16 * 1024;

/// Byte sink for live output
pub type LogSink = fn(&[u8]);

struct Ring<const N: usize> {
    buf: [u8; N],
    head: usize,
    len: usize,
}

impl<const N: usize> Ring<N> {
    const fn new() -> Self {
        Self {
            buf: [0; N],
            head: 0,
            len: 0,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        for &b in bytes {
            let tail = (self.head + self.len) % N;
            self.buf[tail] = b;
            if self.len == N {
                self.head = (self.head + 1) % N;
            } else {
                self.len += 1;
            }
        }
    }

    fn contents(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        let first = (N - self.head).min(self.len);
        out.extend_from_slice(&self.buf[self.head..self.head + first]);
        out.extend_from_slice(&self.buf[..self.len - first]);
        out
    }
}

struct RingWriter<'a, const N: usize> {
    ring: &'a mut Ring<N>,
    sink: Option<LogSink>,
}

impl<const N: usize> Write for RingWriter<'_, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.ring.push(s.as_bytes());
        if let Some(sink) = self.sink {
            sink(s.as_bytes());
        }
        Ok(())
    }
}

/// `log` backend writing into a RAM ring
pub struct RingLogger<const N: usize = LOG_BUFFER_SIZE> {
    ring: Mutex<Ring<N>>,
    sink: Mutex<Option<LogSink>>,
}

impl<const N: usize> RingLogger<N> {
    pub const fn new() -> Self {
        Self {
            ring: Mutex::new(Ring::new()),
            sink: Mutex::new(None),
        }
    }

    pub fn set_sink(&self, sink: LogSink) {
        *self.sink.lock() = Some(sink);
    }

    /// Ring contents, oldest byte first
    pub fn contents(&self) -> Vec<u8> {
        self.ring.lock().contents()
    }

    pub fn clear(&self) {
        let mut ring = self.ring.lock();
        ring.head = 0;
        ring.len = 0;
    }
}

impl<const N: usize> Log for RingLogger<N> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let sink = *self.sink.lock();
        let mut ring = self.ring.lock();
        let mut w = RingWriter {
            ring: &mut *ring,
            sink,
        };
        let _ = writeln!(w, "[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

/// The boot loader's logger
pub static LOGGER: RingLogger = RingLogger::new();

/// Install [`LOGGER`] as the `log` backend
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}

/// Split the ring into lines of at most `width` bytes, the way `oem log`
/// streams it: newlines end a line and are dropped, all-NUL pieces too
pub fn lines(contents: &[u8], width: usize) -> impl Iterator<Item = &[u8]> {
    contents
        .split(|&b| b == b'\n')
        .filter(|l| !l.is_empty())
        .flat_map(move |l| l.chunks(width.max(1)))
        .filter(|l| l.iter().any(|&b| b != 0))
}

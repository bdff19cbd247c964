// src/serial.rs
//
// Line-oriented access to the device. The session only sees the two traits,
// so it can be driven by a real port or a scripted one.

use crate::error::AcquisitionError;
use serialport::{ClearBuffer, SerialPort};
use std::io::{self, Read};
use std::time::{Duration, Instant};

/// Source of device lines.
pub trait LineSource {
    /// Next line without its terminator. `Ok(None)` when the per-line timeout expired with nothing read.
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Throw away whatever the device sent before this call.
    fn discard_input(&mut self) -> io::Result<()>;
}

/// Opens a link to a named port. The link is closed when dropped.
pub trait Connector {
    type Link: LineSource;

    fn open(&self, port: &str) -> Result<Self::Link, AcquisitionError>;
}

#[derive(Debug, Clone)]
pub struct SerialConnector {
    pub baud_rate: u32,
    pub read_timeout: Duration,
}

impl Connector for SerialConnector {
    type Link = SerialLink;

    fn open(&self, port: &str) -> Result<SerialLink, AcquisitionError> {
        let handle = serialport::new(port, self.baud_rate)
            .timeout(self.read_timeout)
            .open()
            .map_err(|source| AcquisitionError::Open {
                port: port.to_string(),
                source,
            })?;
        log::info!("opened {} at {} baud", port, self.baud_rate);

        Ok(SerialLink {
            name: port.to_string(),
            lines: LineReader::new(handle, self.read_timeout),
        })
    }
}

/// Longest line kept before it is handed back unterminated.
pub const MAX_LINE_LEN: usize = 4096;

/// Splits a byte stream into lines. A call never runs longer than the read
/// timeout nor buffers more than `MAX_LINE_LEN` bytes, even if the device
/// keeps sending without a newline.
pub struct LineReader<R> {
    inner: R,
    read_timeout: Duration,
    // bytes read past the last newline
    pending: Vec<u8>,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R, read_timeout: Duration) -> Self {
        Self {
            inner,
            read_timeout,
            pending: Vec::new(),
        }
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Drop buffered bytes that have not formed a line yet.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Next line without `\n` / `\r\n`. A partial line comes back when the
    /// deadline passes or the buffer is full; `Ok(None)` when nothing arrived.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let deadline = Instant::now() + self.read_timeout;
        let mut buf = [0u8; 256];

        loop {
            if let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
                return Ok(Some(self.take_line(end)));
            }
            if self.pending.len() >= MAX_LINE_LEN {
                log::warn!("no newline in {} bytes, splitting", self.pending.len());
                return Ok(Some(self.take_partial(MAX_LINE_LEN)));
            }

            let timed_out = match self.inner.read(&mut buf) {
                Ok(0) => true,
                Ok(n) => {
                    self.pending.extend_from_slice(&buf[..n]);
                    false
                }
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => true,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => false,
                Err(e) => return Err(e),
            };

            if timed_out || Instant::now() >= deadline {
                if let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
                    return Ok(Some(self.take_line(end)));
                }
                if self.pending.is_empty() {
                    return Ok(None);
                }
                let len = self.pending.len().min(MAX_LINE_LEN);
                return Ok(Some(self.take_partial(len)));
            }
        }
    }

    fn take_line(&mut self, end: usize) -> String {
        let mut line: Vec<u8> = self.pending.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        String::from_utf8_lossy(&line).into_owned()
    }

    fn take_partial(&mut self, len: usize) -> String {
        let line: Vec<u8> = self.pending.drain(..len).collect();
        String::from_utf8_lossy(&line).trim_end().to_string()
    }
}

pub struct SerialLink {
    name: String,
    lines: LineReader<Box<dyn SerialPort>>,
}

impl LineSource for SerialLink {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        self.lines.read_line()
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.lines.clear();
        self.lines
            .get_mut()
            .clear(ClearBuffer::Input)
            .map_err(io::Error::from)
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        log::info!("closed {}", self.name);
    }
}

/// Port names for the port dropdown.
pub fn available_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            log::warn!("listing serial ports failed: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Byte source that replays chunks; an exhausted script reads as a timeout.
    struct Chunks(VecDeque<io::Result<Vec<u8>>>);

    impl Chunks {
        fn new(chunks: Vec<io::Result<&[u8]>>) -> Self {
            Self(chunks.into_iter().map(|c| c.map(|b| b.to_vec())).collect())
        }
    }

    impl Read for Chunks {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(Ok(bytes)) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    if n < bytes.len() {
                        self.0.push_front(Ok(bytes[n..].to_vec()));
                    }
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "timed out")),
            }
        }
    }

    /// A device that never stops sending and never sends a newline.
    struct Noise;

    impl Read for Noise {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            buf.fill(b'x');
            Ok(buf.len())
        }
    }

    fn reader(chunks: Vec<io::Result<&[u8]>>) -> LineReader<Chunks> {
        LineReader::new(Chunks::new(chunks), Duration::from_secs(5))
    }

    #[test]
    fn splits_lines_and_strips_carriage_return() {
        let mut r = reader(vec![Ok(b"Input Voltage: 4.8 V\r\n"), Ok(b"Current: 0.1 A\n")]);
        assert_eq!(r.read_line().unwrap().as_deref(), Some("Input Voltage: 4.8 V"));
        assert_eq!(r.read_line().unwrap().as_deref(), Some("Current: 0.1 A"));
        assert_eq!(r.read_line().unwrap(), None);
    }

    #[test]
    fn several_lines_in_one_read() {
        let mut r = reader(vec![Ok(b"one\r\ntwo\nthr"), Ok(b"ee\n")]);
        assert_eq!(r.read_line().unwrap().as_deref(), Some("one"));
        assert_eq!(r.read_line().unwrap().as_deref(), Some("two"));
        assert_eq!(r.read_line().unwrap().as_deref(), Some("three"));
    }

    #[test]
    fn line_split_across_reads() {
        let mut r = reader(vec![Ok(b"Calibrated Cur"), Ok(b"rent Sensor Offset: 2.5\r"), Ok(b"\n")]);
        assert_eq!(
            r.read_line().unwrap().as_deref(),
            Some("Calibrated Current Sensor Offset: 2.5")
        );
    }

    #[test]
    fn timeout_returns_partial_line() {
        let mut r = reader(vec![Ok(b"Current: 0.3 A  ")]);
        assert_eq!(r.read_line().unwrap().as_deref(), Some("Current: 0.3 A"));
        assert_eq!(r.read_line().unwrap(), None);
    }

    #[test]
    fn empty_timeout_is_none() {
        let mut r = reader(vec![]);
        assert_eq!(r.read_line().unwrap(), None);
    }

    #[test]
    fn other_errors_propagate() {
        let mut r = reader(vec![Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))]);
        assert_eq!(r.read_line().unwrap_err().kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn clear_drops_buffered_bytes() {
        let mut r = reader(vec![Ok(b"stale\nmore stale"), Ok(b"fresh\n")]);
        assert_eq!(r.read_line().unwrap().as_deref(), Some("stale"));
        r.clear();
        assert_eq!(r.read_line().unwrap().as_deref(), Some("fresh"));
    }

    #[test]
    fn endless_stream_without_newline_is_bounded() {
        let mut r = LineReader::new(Noise, Duration::from_secs(60));
        let started = Instant::now();

        let line = r.read_line().unwrap().unwrap();
        assert_eq!(line.len(), MAX_LINE_LEN);
        assert!(line.bytes().all(|b| b == b'x'));
        assert!(started.elapsed() < Duration::from_secs(5));

        // the next call is bounded the same way
        assert_eq!(r.read_line().unwrap().unwrap().len(), MAX_LINE_LEN);
    }

    #[test]
    fn endless_stream_stops_at_the_deadline() {
        let mut r = LineReader::new(Noise, Duration::ZERO);
        let line = r.read_line().unwrap().unwrap();
        assert!(!line.is_empty());
        assert!(line.len() <= MAX_LINE_LEN);
    }
}

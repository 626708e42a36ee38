//! Byte I/O capabilities consumed by `.` and `,`.
//!
//! The machine never touches stdin/stdout directly. A host hands it a
//! [`ByteSink`] and/or a [`ByteSource`]; when one is absent the matching
//! instruction does nothing.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

/// Destination for bytes produced by `.`.
pub trait ByteSink {
    /// Write one byte and flush it.
    fn write_byte(&mut self, byte: u8) -> io::Result<()>;
}

/// Origin of bytes consumed by `,`.
pub trait ByteSource {
    /// Return the next byte if one is ready, `None` otherwise. Must not block.
    fn poll_byte(&mut self) -> io::Result<Option<u8>>;
}

impl<T: ByteSink + ?Sized> ByteSink for &mut T {
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        (**self).write_byte(byte)
    }
}

impl<T: ByteSource + ?Sized> ByteSource for &mut T {
    fn poll_byte(&mut self) -> io::Result<Option<u8>> {
        (**self).poll_byte()
    }
}

/// Collects output in memory.
impl ByteSink for Vec<u8> {
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.push(byte);
        Ok(())
    }
}

/// Hands out queued bytes front to back; an empty queue means "not ready".
impl ByteSource for VecDeque<u8> {
    fn poll_byte(&mut self) -> io::Result<Option<u8>> {
        Ok(self.pop_front())
    }
}

/// Takes whatever has already arrived on the channel. A disconnected
/// channel behaves like an empty one.
impl ByteSource for Receiver<u8> {
    fn poll_byte(&mut self) -> io::Result<Option<u8>> {
        match self.try_recv() {
            Ok(b) => Ok(Some(b)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Ok(None),
        }
    }
}

/// Adapts any [`Write`] into a sink that flushes after every byte.
#[derive(Debug)]
pub struct WriteSink<W: Write> {
    inner: W,
}

impl<W: Write> WriteSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ByteSink for WriteSink<W> {
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.inner.write_all(&[byte])?;
        self.inner.flush()
    }
}

/// Non-blocking view of a blocking reader.
///
/// A background thread drains the reader into a channel one read at a
/// time; `poll_byte` only looks at what the thread has delivered so far.
/// A read error on the background thread is handed back on a later poll.
pub struct PollingSource {
    chunks: Receiver<io::Result<Vec<u8>>>,
    pending: VecDeque<u8>,
    deferred: Option<io::Error>,
    done: bool,
}

impl PollingSource {
    /// Spawn the reader thread for `reader`.
    pub fn spawn<R>(reader: R) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("bfvm-input".to_string())
            .spawn(move || {
                let mut reader = reader;
                let mut buf = [0u8; 4096];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            if tx.send(Ok(buf[..n].to_vec())).is_err() {
                                return;
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            let _ = tx.send(Err(e));
                            break;
                        }
                    }
                }
            })?;
        Ok(Self {
            chunks: rx,
            pending: VecDeque::new(),
            deferred: None,
            done: false,
        })
    }

    /// Poll stdin without blocking the interpreter.
    pub fn stdin() -> io::Result<Self> {
        Self::spawn(io::stdin())
    }

    /// Wait at most `timeout` for the first read (or end of input) to land.
    ///
    /// Meant to be called once before a run starts; `poll_byte` itself
    /// never waits. Returns true if bytes are ready.
    pub fn wait_ready(&mut self, timeout: Duration) -> bool {
        if self.pending.is_empty() && !self.done && self.deferred.is_none() {
            match self.chunks.recv_timeout(timeout) {
                Ok(Ok(chunk)) => self.pending.extend(chunk),
                Ok(Err(e)) => self.deferred = Some(e),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.done = true,
            }
        }
        !self.pending.is_empty()
    }
}

impl ByteSource for PollingSource {
    fn poll_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(b) = self.pending.pop_front() {
            return Ok(Some(b));
        }
        if let Some(e) = self.deferred.take() {
            self.done = true;
            return Err(e);
        }
        if self.done {
            return Ok(None);
        }
        match self.chunks.try_recv() {
            Ok(Ok(chunk)) => {
                self.pending.extend(chunk);
                Ok(self.pending.pop_front())
            }
            Ok(Err(e)) => {
                self.done = true;
                Err(e)
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                self.done = true;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn write_sink_writes_each_byte() {
        let mut sink = WriteSink::new(Vec::new());
        sink.write_byte(b'h').unwrap();
        sink.write_byte(b'i').unwrap();
        assert_eq!(sink.into_inner(), b"hi");
    }

    #[test]
    fn queue_source_reports_not_ready_when_empty() {
        let mut src: VecDeque<u8> = VecDeque::from(vec![1, 2]);
        assert_eq!(src.poll_byte().unwrap(), Some(1));
        assert_eq!(src.poll_byte().unwrap(), Some(2));
        assert_eq!(src.poll_byte().unwrap(), None);
    }

    #[test]
    fn channel_source_does_not_block() {
        let (tx, mut rx) = mpsc::channel::<u8>();
        assert_eq!(rx.poll_byte().unwrap(), None);
        tx.send(42).unwrap();
        assert_eq!(rx.poll_byte().unwrap(), Some(42));
        drop(tx);
        assert_eq!(rx.poll_byte().unwrap(), None);
    }

    #[test]
    fn polling_source_eventually_delivers_reader_bytes() {
        let mut src = PollingSource::spawn(io::Cursor::new(b"ab".to_vec())).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut got = Vec::new();
        while got.len() < 2 && Instant::now() < deadline {
            if let Some(b) = src.poll_byte().unwrap() {
                got.push(b);
            } else {
                thread::sleep(Duration::from_millis(1));
            }
        }
        assert_eq!(got, b"ab");
    }

    #[test]
    fn wait_ready_makes_a_whole_read_visible() {
        let mut src = PollingSource::spawn(io::Cursor::new(b"xyz".to_vec())).unwrap();
        assert!(src.wait_ready(Duration::from_secs(2)));
        assert_eq!(src.poll_byte().unwrap(), Some(b'x'));
        assert_eq!(src.poll_byte().unwrap(), Some(b'y'));
        assert_eq!(src.poll_byte().unwrap(), Some(b'z'));
    }

    #[test]
    fn wait_ready_gives_up_on_a_silent_reader() {
        let (_keep_open, reader) = silent_pipe();
        let mut src = PollingSource::spawn(reader).unwrap();
        let started = Instant::now();
        assert!(!src.wait_ready(Duration::from_millis(20)));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(src.poll_byte().unwrap(), None);
    }

    /// A reader that blocks until its sender is dropped.
    fn silent_pipe() -> (mpsc::Sender<u8>, ChannelReader) {
        let (tx, rx) = mpsc::channel();
        (tx, ChannelReader(rx))
    }

    struct ChannelReader(Receiver<u8>);

    impl Read for ChannelReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.recv() {
                Ok(b) => {
                    buf[0] = b;
                    Ok(1)
                }
                Err(_) => Ok(0),
            }
        }
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("boom"))
        }
    }

    #[test]
    fn polling_source_surfaces_reader_error_once() {
        let mut src = PollingSource::spawn(Broken).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        let err = loop {
            match src.poll_byte() {
                Err(e) => break e,
                Ok(_) if Instant::now() < deadline => thread::sleep(Duration::from_millis(1)),
                Ok(_) => panic!("reader error never surfaced"),
            }
        };
        assert_eq!(err.to_string(), "boom");
        assert_eq!(src.poll_byte().unwrap(), None);
    }
}

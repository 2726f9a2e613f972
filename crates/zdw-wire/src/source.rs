use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::bufread::MultiGzDecoder;
use tracing::trace;

use crate::error::WireError;

/// Leading bytes of a gzip member.
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Leading bytes of a zstd frame.
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Capacity of each buffering layer.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Compression wrapper detected around the ZDW byte stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zstd,
}

impl Compression {
    /// Sniff the wrapper from the first bytes of the stream.
    #[must_use]
    pub fn detect(prefix: &[u8]) -> Self {
        if prefix.starts_with(&ZSTD_MAGIC) {
            Self::Zstd
        } else if prefix.starts_with(&GZIP_MAGIC) {
            Self::Gzip
        } else {
            Self::None
        }
    }
}

/// Sequential buffered reader the decode engine pulls raw bytes from.
///
/// Wraps a file, stdin, or any `Read` and transparently removes a gzip or
/// zstd wrapper. The source only moves forward; it tracks the absolute
/// offset into the decompressed stream so errors can say where they
/// happened.
///
/// ```text
/// ┌──────────────┐   ┌───────────────────────┐   ┌──────────────┐
/// │ File / Read  │ → │ gzip | zstd | passthru │ → │ BufRead + LE │ → engine
/// └──────────────┘   └───────────────────────┘   └──────────────┘
/// ```
///
/// Short reads are only reported at end-of-stream. A mandatory field that
/// cannot be read in full is [`WireError::UnexpectedEof`].
pub struct ByteSource {
    reader: Box<dyn BufRead + Send>,
    compression: Compression,
    offset: u64,
}

impl ByteSource {
    /// Open a file on disk.
    ///
    /// # Errors
    ///
    /// Returns the `io::Error` from opening the file or from the initial
    /// read used to detect compression.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    /// Read from the process's standard input.
    ///
    /// # Errors
    ///
    /// Returns the `io::Error` from the initial read.
    pub fn stdin() -> io::Result<Self> {
        Self::from_reader(io::stdin())
    }

    /// Wrap any reader, detecting gzip or zstd from its first bytes.
    ///
    /// # Errors
    ///
    /// Returns the `io::Error` from the initial read or from setting up
    /// the zstd decoder.
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> io::Result<Self> {
        let mut buffered = BufReader::with_capacity(READ_BUFFER_SIZE, reader);
        let compression = Compression::detect(buffered.fill_buf()?);
        trace!(?compression, "detected input wrapper");

        let reader: Box<dyn BufRead + Send> = match compression {
            Compression::None => Box::new(buffered),
            Compression::Gzip => Box::new(BufReader::with_capacity(
                READ_BUFFER_SIZE,
                MultiGzDecoder::new(buffered),
            )),
            Compression::Zstd => Box::new(BufReader::with_capacity(
                READ_BUFFER_SIZE,
                zstd::stream::read::Decoder::with_buffer(buffered)?,
            )),
        };

        Ok(Self {
            reader,
            compression,
            offset: 0,
        })
    }

    /// The wrapper detected when the source was opened.
    #[must_use]
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Number of decompressed bytes consumed so far.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read up to `buf.len()` bytes, returning fewer only at end-of-stream.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Io`] if the reader fails.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, WireError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(WireError::Io(e)),
            }
        }
        Ok(filled)
    }

    /// Fill `buf` completely.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::UnexpectedEof`] if the stream ends first.
    pub fn read_exact_bytes(&mut self, buf: &mut [u8]) -> Result<(), WireError> {
        let n = self.read_bytes(buf)?;
        if n < buf.len() {
            return Err(WireError::UnexpectedEof {
                offset: self.offset,
            });
        }
        Ok(())
    }

    /// Read one byte.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::UnexpectedEof`] at end-of-stream.
    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        ReadBytesExt::read_u8(self).map_err(|e| self.map_read_error(e))
    }

    /// Read a little-endian `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::UnexpectedEof`] on a short read.
    pub fn read_u16(&mut self) -> Result<u16, WireError> {
        ReadBytesExt::read_u16::<LittleEndian>(self).map_err(|e| self.map_read_error(e))
    }

    /// Read a little-endian `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::UnexpectedEof`] on a short read.
    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        ReadBytesExt::read_u32::<LittleEndian>(self).map_err(|e| self.map_read_error(e))
    }

    /// Read a little-endian `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::UnexpectedEof`] on a short read.
    pub fn read_u64(&mut self) -> Result<u64, WireError> {
        ReadBytesExt::read_u64::<LittleEndian>(self).map_err(|e| self.map_read_error(e))
    }

    /// Read a little-endian IEEE-754 `f64`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::UnexpectedEof`] on a short read.
    pub fn read_f64(&mut self) -> Result<f64, WireError> {
        ReadBytesExt::read_f64::<LittleEndian>(self).map_err(|e| self.map_read_error(e))
    }

    /// Read an unsigned little-endian integer `width` bytes wide (0–8).
    ///
    /// A width of zero reads nothing and yields 0.
    ///
    /// # Errors
    ///
    /// - [`WireError::Corrupted`] if `width` exceeds 8.
    /// - [`WireError::UnexpectedEof`] on a short read.
    pub fn read_uint(&mut self, width: u8) -> Result<u64, WireError> {
        match width {
            0 => Ok(0),
            1..=8 => ReadBytesExt::read_uint::<LittleEndian>(self, usize::from(width))
                .map_err(|e| self.map_read_error(e)),
            other => Err(WireError::corrupted(
                self.offset,
                format!("value width {other} exceeds 8 bytes"),
            )),
        }
    }

    /// Read bytes up to and including a NUL terminator, returning them
    /// without the terminator.
    ///
    /// # Errors
    ///
    /// - [`WireError::UnexpectedEof`] if the stream ends before the NUL.
    /// - [`WireError::Corrupted`] if no NUL appears within `max_len` bytes.
    pub fn read_nul_terminated(&mut self, max_len: usize) -> Result<Vec<u8>, WireError> {
        let mut out = Vec::new();
        let limit = max_len as u64 + 1;
        let n = self.reader.by_ref().take(limit).read_until(0, &mut out)?;
        self.offset += n as u64;

        if out.last() == Some(&0) {
            out.pop();
            return Ok(out);
        }
        if (n as u64) < limit {
            return Err(WireError::UnexpectedEof {
                offset: self.offset,
            });
        }
        Err(WireError::corrupted(
            self.offset,
            format!("string longer than {max_len} bytes"),
        ))
    }

    /// Skip forward `len` bytes, returning how many were actually skipped.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Io`] if the reader fails.
    pub fn skip(&mut self, len: u64) -> Result<u64, WireError> {
        let skipped = io::copy(&mut self.by_ref().take(len), &mut io::sink())?;
        Ok(skipped)
    }

    /// Whether every byte of the stream has been consumed.
    ///
    /// Peeks the buffer without consuming anything.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Io`] if refilling the buffer fails.
    pub fn is_end_of_stream(&mut self) -> Result<bool, WireError> {
        Ok(self.reader.fill_buf()?.is_empty())
    }

    fn map_read_error(&self, e: io::Error) -> WireError {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            WireError::UnexpectedEof {
                offset: self.offset,
            }
        } else {
            WireError::Io(e)
        }
    }
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.offset += n as u64;
        Ok(n)
    }
}

impl std::fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteSource")
            .field("compression", &self.compression)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

//! Fixed-buffer chunked copying between byte streams.

use std::io::{ErrorKind, Read, Write};

use crate::error::{Error, Result};

/// Copy buffer size in bytes.
pub const BUFSIZE: usize = 4096;

/// Sequential byte-for-byte copier with a single reusable buffer.
///
/// The buffer is allocated once at construction and reused serially across
/// calls; concurrent dumps would each need their own copier.
pub struct ChunkedCopier {
    buf: Vec<u8>,
}

impl ChunkedCopier {
    /// Creates a copier with its buffer allocated.
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; BUFSIZE],
        }
    }

    /// Copies from `src` until a read returns zero bytes.
    ///
    /// Returns the number of bytes copied.
    pub fn copy_all<R, W>(&mut self, src: &mut R, dst: &mut W) -> Result<u64>
    where
        R: Read + ?Sized,
        W: Write + ?Sized,
    {
        let mut total = 0u64;
        loop {
            let n = src.read(&mut self.buf)?;
            if n == 0 {
                break;
            }
            dst.write_all(&self.buf[..n])?;
            total += n as u64;
        }
        Ok(total)
    }

    /// Copies exactly `length` bytes from `src` to `dst`.
    ///
    /// The streams are consumed from their current positions. A source that
    /// ends before `length` bytes are transferred is a transfer failure and
    /// fails with [`Error::ShortRead`].
    pub fn copy_range<R, W>(&mut self, src: &mut R, dst: &mut W, length: u64) -> Result<()>
    where
        R: Read + ?Sized,
        W: Write + ?Sized,
    {
        let mut left = length;
        while left > 0 {
            let want = left.min(BUFSIZE as u64) as usize;
            let chunk = &mut self.buf[..want];

            src.read_exact(chunk).map_err(|e| {
                if e.kind() == ErrorKind::UnexpectedEof {
                    Error::ShortRead {
                        expected: length,
                        copied: length - left,
                    }
                } else {
                    Error::Io(e)
                }
            })?;
            dst.write_all(chunk)?;
            left -= want as u64;
        }
        Ok(())
    }
}

impl Default for ChunkedCopier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_copy_all_reproduces_input() {
        // Larger than one buffer, not a multiple of it.
        let data: Vec<u8> = (0..BUFSIZE * 2 + 137).map(|i| (i % 251) as u8).collect();
        let mut src = Cursor::new(data.clone());
        let mut dst = Vec::new();

        let copied = ChunkedCopier::new()
            .copy_all(&mut src, &mut dst)
            .unwrap();
        assert_eq!(copied, data.len() as u64);
        assert_eq!(dst, data);
    }

    #[test]
    fn test_copy_range_exact_length() {
        let data: Vec<u8> = (0..BUFSIZE * 3).map(|i| (i % 256) as u8).collect();
        let mut src = Cursor::new(data.clone());
        let mut dst = Vec::new();

        let length = (BUFSIZE + 100) as u64;
        ChunkedCopier::new()
            .copy_range(&mut src, &mut dst, length)
            .unwrap();
        assert_eq!(dst.len() as u64, length);
        assert_eq!(dst, data[..length as usize]);
    }

    #[test]
    fn test_copy_range_short_source_fails() {
        let mut src = Cursor::new(vec![0u8; 100]);
        let mut dst = Vec::new();

        let err = ChunkedCopier::new()
            .copy_range(&mut src, &mut dst, 200)
            .unwrap_err();
        assert!(matches!(err, Error::ShortRead { expected: 200, .. }));
    }

    #[test]
    fn test_copy_range_zero_length() {
        let mut src = Cursor::new(vec![1u8, 2, 3]);
        let mut dst = Vec::new();

        ChunkedCopier::new()
            .copy_range(&mut src, &mut dst, 0)
            .unwrap();
        assert!(dst.is_empty());
    }
}

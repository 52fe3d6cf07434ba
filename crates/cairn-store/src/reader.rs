use std::io::{self, Read};

use cairn_crypto::StreamingHasher;
use cairn_types::ObjectId;

use crate::error::StoreError;
use crate::object::ObjectKind;

/// Reader over an object's content that re-derives its identifier.
///
/// Bytes are passed through unchanged. When the underlying reader reaches end
/// of stream, the reader fails with `UnexpectedEof` if fewer than the
/// recorded number of bytes arrived, and with `InvalidData` wrapping
/// [`StoreError::HashMismatch`] if the content does not hash back to `id`.
pub struct VerifyingReader<R> {
    inner: R,
    id: ObjectId,
    hasher: StreamingHasher,
    remaining: u64,
    finished: bool,
}

impl<R: Read> VerifyingReader<R> {
    pub fn new(inner: R, kind: ObjectKind, id: ObjectId, length: u64) -> Self {
        Self {
            inner,
            id,
            hasher: kind.hasher().streaming(),
            remaining: length,
            finished: false,
        }
    }

    fn finish(&mut self) -> io::Result<()> {
        self.finished = true;
        if self.remaining != 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("object {} ended {} bytes early", self.id, self.remaining),
            ));
        }
        let computed = self.hasher.finalize();
        if computed != self.id {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                StoreError::HashMismatch {
                    id: self.id,
                    computed,
                },
            ));
        }
        Ok(())
    }
}

impl<R: Read> Read for VerifyingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.finished || buf.is_empty() {
            return Ok(0);
        }
        let n = self.inner.read(buf)?;
        if n == 0 {
            self.finish()?;
            return Ok(0);
        }
        if n as u64 > self.remaining {
            self.finished = true;
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("object {} is longer than its recorded length", self.id),
            ));
        }
        self.remaining -= n as u64;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

//! Bounded byte-range views over seekable resources
//!
//! A [`FragmentWindow`] exposes `[offset, offset + length)` of a larger
//! resource as if it were a standalone stream. The uploader carves one window
//! per part, so a failed part can be resent by rewinding the window instead of
//! re-slicing the whole file.

use std::io::{self, Read, Seek, SeekFrom};

use md5::{Digest, Md5};

const DIGEST_BUF_SIZE: usize = 32 * 1024;

/// Computes MD5 of `data` and returns the lowercase hex digest.
pub fn md5_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Md5::digest(data.as_ref()))
}

/// Hashes an entire seekable resource from its start, then leaves it
/// positioned at offset 0.
pub fn md5_hex_from_start<R: Read + Seek>(reader: &mut R) -> io::Result<String> {
    reader.seek(SeekFrom::Start(0))?;
    let digest = md5_hex_reader(reader)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(digest)
}

fn md5_hex_reader<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; DIGEST_BUF_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// A window onto `[offset, offset + len)` of a base resource
///
/// The window keeps its own cursor and repositions the base before every
/// read, so other users of the base resource cannot shift the bytes it
/// yields.
#[derive(Debug)]
pub struct FragmentWindow<'a, R> {
    base: &'a mut R,
    offset: u64,
    len: u64,
    cursor: u64,
}

impl<'a, R: Read + Seek> FragmentWindow<'a, R> {
    /// Carve a window of at most `len` bytes starting at `offset`.
    ///
    /// Fails with `InvalidInput` when `offset` lies beyond the end of the
    /// base resource. A window that would run past the end is shortened to
    /// the bytes actually available.
    pub fn new(base: &'a mut R, offset: u64, len: u64) -> io::Result<Self> {
        let extent = base.seek(SeekFrom::End(0))?;
        if offset > extent {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("fragment offset {offset} exceeds resource size {extent}"),
            ));
        }

        let len = len.min(extent - offset);
        base.seek(SeekFrom::Start(offset))?;

        Ok(Self {
            base,
            offset,
            len,
            cursor: 0,
        })
    }

    /// Start of the window within the base resource
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of bytes the window covers
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current read position relative to the window start
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// Bytes left before end-of-window
    pub fn remaining(&self) -> u64 {
        self.len - self.cursor
    }

    /// Move the cursor back to the window start
    pub fn rewind(&mut self) -> io::Result<()> {
        self.cursor = 0;
        Ok(())
    }

    /// Digest of the whole window. The cursor is back at 0 afterwards, so a
    /// following read yields exactly the bytes that were hashed.
    pub fn md5_hex(&mut self) -> io::Result<String> {
        self.rewind()?;
        let digest = md5_hex_reader(self)?;
        self.rewind()?;
        Ok(digest)
    }

    /// Read everything from the cursor to the end of the window
    pub fn read_remaining(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.remaining() as usize);
        self.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Release the borrow on the base resource
    pub fn into_inner(self) -> &'a mut R {
        self.base
    }
}

impl<R: Read + Seek> Read for FragmentWindow<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining();
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let max = remaining.min(buf.len() as u64) as usize;
        self.base.seek(SeekFrom::Start(self.offset + self.cursor))?;
        let n = self.base.read(&mut buf[..max])?;
        self.cursor += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for FragmentWindow<'_, R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(delta) => self.cursor.checked_add_signed(delta),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
        };

        match target {
            Some(n) if n <= self.len => {
                self.cursor = n;
                Ok(n)
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek outside fragment window of {} bytes", self.len),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn sample(len: usize) -> Cursor<Vec<u8>> {
        Cursor::new((0..len).map(|i| (i % 251) as u8).collect())
    }

    #[test]
    fn test_window_reads_only_its_range() {
        let mut base = sample(100);
        let mut window = FragmentWindow::new(&mut base, 10, 20).unwrap();

        let data = window.read_remaining().unwrap();
        assert_eq!(data, (10u8..30).collect::<Vec<_>>());

        // End of window even though the base has more data
        let mut buf = [0u8; 8];
        assert_eq!(window.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_window_clamped_to_resource() {
        let mut base = sample(100);
        let window = FragmentWindow::new(&mut base, 90, 50).unwrap();
        assert_eq!(window.len(), 10);

        let mut base = sample(100);
        let window = FragmentWindow::new(&mut base, 100, 50).unwrap();
        assert!(window.is_empty());
    }

    #[test]
    fn test_offset_past_end_rejected() {
        let mut base = sample(100);
        let err = FragmentWindow::new(&mut base, 101, 10).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_seek_bounds() {
        let mut base = sample(100);
        let mut window = FragmentWindow::new(&mut base, 10, 20).unwrap();

        assert_eq!(window.seek(SeekFrom::Start(5)).unwrap(), 5);
        assert_eq!(window.seek(SeekFrom::Current(3)).unwrap(), 8);
        assert_eq!(window.seek(SeekFrom::End(-2)).unwrap(), 18);
        assert_eq!(window.seek(SeekFrom::End(0)).unwrap(), 20);

        assert!(window.seek(SeekFrom::Start(21)).is_err());
        assert!(window.seek(SeekFrom::Current(-100)).is_err());
        assert!(window.seek(SeekFrom::End(1)).is_err());
        // Failed seeks leave the cursor alone
        assert_eq!(window.position(), 20);

        window.seek(SeekFrom::Start(18)).unwrap();
        let mut buf = [0u8; 8];
        let n = window.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[28, 29]);
    }

    #[test]
    fn test_digest_restores_cursor() {
        let mut base = sample(100);
        let expected = {
            let mut untouched = FragmentWindow::new(&mut base, 30, 40).unwrap();
            untouched.read_remaining().unwrap()
        };

        let mut window = FragmentWindow::new(&mut base, 30, 40).unwrap();
        window.seek(SeekFrom::Start(7)).unwrap();
        let digest = window.md5_hex().unwrap();

        assert_eq!(window.position(), 0);
        assert_eq!(digest, md5_hex(&expected));
        assert_eq!(window.read_remaining().unwrap(), expected);
    }

    #[test]
    fn test_window_independent_of_base_position() {
        let mut base = sample(100);
        let mut window = FragmentWindow::new(&mut base, 50, 10).unwrap();

        let mut first = [0u8; 4];
        window.read_exact(&mut first).unwrap();
        window.base.seek(SeekFrom::Start(0)).unwrap();

        let mut rest = Vec::new();
        window.read_to_end(&mut rest).unwrap();
        assert_eq!(first, [50, 51, 52, 53]);
        assert_eq!(rest, (54u8..60).collect::<Vec<_>>());
    }

    #[test]
    fn test_whole_file_digest() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"hello upyun").unwrap();

        let digest = md5_hex_from_start(&mut file).unwrap();
        assert_eq!(digest, md5_hex(b"hello upyun"));
        assert_eq!(file.stream_position().unwrap(), 0);
    }

    #[test]
    fn test_md5_hex_known_value() {
        assert_eq!(md5_hex(""), "d41d8cd98f00b204e9800998ecf8427e");
    }
}

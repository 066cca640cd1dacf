use std::io::{self, Read, Write};

use tracing::trace;

/// Block size for chunked copies (64 KiB).
///
/// Bounds the interval between progress reports without making a syscall
/// for every disk block.
pub const BLOCK_SIZE: u64 = 64 * 1024;

/// Progress snapshot passed to the block callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockProgress {
    /// Declared total size of the copy.
    pub total: u64,
    /// Cumulative bytes copied so far.
    pub so_far: u64,
    /// Bytes copied by the block that just finished.
    pub since_last: u64,
}

/// Copy exactly `size` bytes from `src` to `dst` in [`BLOCK_SIZE`] blocks.
///
/// `on_block` runs after every block that moved at least one byte; pass
/// `None` to copy silently. Each
/// block asks for `min(BLOCK_SIZE, remaining)` bytes. If the source runs dry
/// during the final block the copy ends there and the bytes actually copied
/// are returned. Running dry on any earlier block is an
/// [`io::ErrorKind::UnexpectedEof`] error. Other I/O errors abort the copy
/// as-is; whatever was already written to `dst` is left for the caller.
pub fn copy_blocks<R, W>(
    size: u64,
    src: &mut R,
    dst: &mut W,
    mut on_block: Option<&mut dyn FnMut(BlockProgress)>,
) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut remaining = size;
    while remaining > 0 {
        let last_block = remaining <= BLOCK_SIZE;
        let want = remaining.min(BLOCK_SIZE);
        let mut block = (&mut *src).take(want);
        let got = io::copy(&mut block, dst)?;
        remaining -= got;

        let progress = BlockProgress {
            total: size,
            so_far: size - remaining,
            since_last: got,
        };
        trace!(so_far = progress.so_far, total = size, "block copied");
        if got > 0 {
            if let Some(cb) = on_block.as_deref_mut() {
                cb(progress);
            }
        }

        if got < want {
            if last_block {
                break;
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "source ended after {} of {} bytes",
                    size - remaining,
                    size
                ),
            ));
        }
    }
    Ok(size - remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn run(size: u64, data: &[u8]) -> (io::Result<u64>, Vec<u8>, Vec<BlockProgress>) {
        let mut src = Cursor::new(data.to_vec());
        let mut dst = Vec::new();
        let mut seen = Vec::new();
        let mut cb = |p: BlockProgress| seen.push(p);
        let result = copy_blocks(size, &mut src, &mut dst, Some(&mut cb));
        (result, dst, seen)
    }

    #[test]
    fn small_copy_is_one_block() {
        let data = pattern(650);
        let (result, dst, seen) = run(650, &data);
        assert_eq!(result.unwrap(), 650);
        assert_eq!(dst, data);
        assert_eq!(
            seen,
            vec![BlockProgress { total: 650, so_far: 650, since_last: 650 }]
        );
    }

    #[test]
    fn exact_multiple_of_block() {
        let size = (BLOCK_SIZE * 2) as usize;
        let data = pattern(size);
        let (result, dst, seen) = run(size as u64, &data);
        assert_eq!(result.unwrap(), size as u64);
        assert_eq!(dst, data);
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|p| p.since_last == BLOCK_SIZE));
    }

    #[test]
    fn remainder_block_is_short() {
        let size = (BLOCK_SIZE * 6 + 345) as usize;
        let data = pattern(size);
        let (result, dst, seen) = run(size as u64, &data);
        assert_eq!(result.unwrap(), size as u64);
        assert_eq!(dst, data);
        assert_eq!(seen.len(), 7);
        assert_eq!(seen.last().unwrap().since_last, 345);
    }

    #[test]
    fn zero_size_copies_nothing() {
        let (result, dst, seen) = run(0, b"ignored");
        assert_eq!(result.unwrap(), 0);
        assert!(dst.is_empty());
        assert!(seen.is_empty());
    }

    #[test]
    fn stops_at_declared_size() {
        let data = pattern(1000);
        let (result, dst, _) = run(600, &data);
        assert_eq!(result.unwrap(), 600);
        assert_eq!(dst, &data[..600]);
    }

    #[test]
    fn short_final_block_is_tolerated() {
        // Declared 2.5 blocks, source holds 2.25.
        let declared = BLOCK_SIZE * 2 + BLOCK_SIZE / 2;
        let actual = (BLOCK_SIZE * 2 + BLOCK_SIZE / 4) as usize;
        let data = pattern(actual);
        let (result, dst, seen) = run(declared, &data);
        assert_eq!(result.unwrap(), actual as u64);
        assert_eq!(dst, data);
        assert_eq!(seen.last().unwrap().so_far, actual as u64);
    }

    #[test]
    fn source_ending_on_block_boundary_reports_no_empty_block() {
        let data = pattern(BLOCK_SIZE as usize);
        let (result, dst, seen) = run(BLOCK_SIZE + 10, &data);
        assert_eq!(result.unwrap(), BLOCK_SIZE);
        assert_eq!(dst, data);
        assert_eq!(
            seen,
            vec![BlockProgress { total: BLOCK_SIZE + 10, so_far: BLOCK_SIZE, since_last: BLOCK_SIZE }]
        );
    }

    #[test]
    fn empty_source_reports_nothing() {
        let (result, dst, seen) = run(100, b"");
        assert_eq!(result.unwrap(), 0);
        assert!(dst.is_empty());
        assert!(seen.is_empty());
    }

    #[test]
    fn short_earlier_block_is_an_error() {
        let declared = BLOCK_SIZE * 3;
        let data = pattern((BLOCK_SIZE + 10) as usize);
        let (result, _, seen) = run(declared, &data);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn no_callback_is_fine() {
        let data = pattern(70_000);
        let mut src = Cursor::new(data.clone());
        let mut dst = Vec::new();
        let n = copy_blocks(70_000, &mut src, &mut dst, None).unwrap();
        assert_eq!(n, 70_000);
        assert_eq!(dst, data);
    }

    struct FailingWriter {
        accepted: usize,
        limit: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.accepted >= self.limit {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            let n = buf.len().min(self.limit - self.accepted);
            self.accepted += n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_error_aborts() {
        let data = pattern((BLOCK_SIZE * 3) as usize);
        let mut src = Cursor::new(data);
        let mut dst = FailingWriter { accepted: 0, limit: (BLOCK_SIZE + 5) as usize };
        let mut blocks = 0;
        let mut cb = |_: BlockProgress| blocks += 1;
        let err = copy_blocks(BLOCK_SIZE * 3, &mut src, &mut dst, Some(&mut cb)).unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        assert_eq!(blocks, 1);
    }

    proptest! {
        #[test]
        fn progress_accounts_for_every_byte(size in 0u64..(BLOCK_SIZE * 5)) {
            let data = pattern(size as usize);
            let (result, dst, seen) = run(size, &data);
            prop_assert_eq!(result.unwrap(), size);
            prop_assert_eq!(dst.len() as u64, size);
            let sum: u64 = seen.iter().map(|p| p.since_last).sum();
            prop_assert_eq!(sum, size);
            if let Some(last) = seen.last() {
                prop_assert_eq!(last.so_far, size);
            }
            prop_assert!(seen.windows(2).all(|w| w[0].so_far < w[1].so_far));
            prop_assert!(seen.iter().all(|p| p.total == size && p.since_last <= BLOCK_SIZE));
        }
    }
}

use bytes::BytesMut;
use std::ops::Range;

/// Insert/delete primitives for editing an encoded buffer in place.
///
/// Keeps the shifting of trailing bytes out of the code that decides what
/// to insert or delete.
pub trait RangeEdit {
    /// Inserts `data` at `at`, shifting everything from `at` onwards right.
    fn insert_range(&mut self, at: usize, data: &[u8]);

    /// Removes `range`, shifting everything after it left.
    fn delete_range(&mut self, range: Range<usize>);

    /// Replaces `range` with `data`, growing or shrinking as required.
    /// Equal lengths are overwritten in place; otherwise this is a delete
    /// followed by an insert.
    fn replace_range(&mut self, range: Range<usize>, data: &[u8]);
}

impl RangeEdit for BytesMut {
    fn insert_range(&mut self, at: usize, data: &[u8]) {
        let tail = self.split_off(at);
        self.extend_from_slice(data);
        self.unsplit(tail);
    }

    fn delete_range(&mut self, range: Range<usize>) {
        let tail = self.split_off(range.end);
        self.truncate(range.start);
        self.unsplit(tail);
    }

    fn replace_range(&mut self, range: Range<usize>, data: &[u8]) {
        let old = range.end - range.start;
        if old == data.len() {
            self[range].copy_from_slice(data);
            return;
        }
        let at = range.start;
        self.delete_range(range);
        self.insert_range(at, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_delete() {
        let mut buf = BytesMut::from(&b"abcdef"[..]);
        buf.insert_range(2, b"XY");
        assert_eq!(&buf[..], b"abXYcdef");
        buf.delete_range(0..3);
        assert_eq!(&buf[..], b"Ycdef");
        buf.insert_range(buf.len(), b"!");
        assert_eq!(&buf[..], b"Ycdef!");
    }

    #[test]
    fn test_replace_range() {
        let mut buf = BytesMut::from(&b"0123456789"[..]);
        buf.replace_range(2..4, b"ab");
        assert_eq!(&buf[..], b"01ab456789");
        buf.replace_range(2..4, b"wxyz");
        assert_eq!(&buf[..], b"01wxyz456789");
        buf.replace_range(2..6, b"-");
        assert_eq!(&buf[..], b"01-456789");
    }
}

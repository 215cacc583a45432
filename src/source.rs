//! Line source.

use std::io::{self, prelude::*};

/// A single line of text including its `\n` terminator.
/// Records are ordered byte-wise.
pub type Record = Vec<u8>;

const TERMINATOR: u8 = b'\n';

/// Pull-based line reader over a byte stream.
///
/// Every record returned ends with exactly one terminator: if the stream ends in the middle of a line
/// the terminator is appended.
pub struct LineSource<R: BufRead> {
    reader: R,
}

impl<R: BufRead> LineSource<R> {
    /// Creates a line source over a buffered reader.
    pub fn new(reader: R) -> Self {
        LineSource { reader }
    }

    /// Returns the next line, or [`None`] once the stream holds no more bytes.
    pub fn pop(&mut self) -> io::Result<Option<Record>> {
        let mut line = Vec::new();
        if self.reader.read_until(TERMINATOR, &mut line)? == 0 {
            return Ok(None);
        }

        if line.last() != Some(&TERMINATOR) {
            line.push(TERMINATOR);
        }

        return Ok(Some(line));
    }
}

impl<R: BufRead> Iterator for LineSource<R> {
    type Item = io::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pop().transpose()
    }
}

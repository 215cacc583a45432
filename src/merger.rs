//! Binary heap merger.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::error::Error;
use std::io::{self, prelude::*};

use crate::sort::SortError;

/// Binary heap merger implementation.
/// Merges multiple sorted inputs into a single sorted output.
/// Time complexity is *m* \* log(*n*) in worst case where *m* is the number of items,
/// *n* is the number of chunks (inputs).
///
/// Only the current top item of every input is held in memory. An input is dropped from consideration
/// as soon as it is exhausted. The first input error is returned and ends the merge.
pub struct BinaryHeapMerger<T, E, C>
where
    T: Ord,
    E: Error,
    C: IntoIterator<Item = Result<T, E>>,
{
    // binary heap is max-heap by default so we reverse it to convert it to min-heap
    items: BinaryHeap<(Reverse<T>, Reverse<usize>)>,
    chunks: Vec<C::IntoIter>,
    initiated: bool,
    failed: bool,
}

impl<T, E, C> BinaryHeapMerger<T, E, C>
where
    T: Ord,
    E: Error,
    C: IntoIterator<Item = Result<T, E>>,
{
    /// Creates an instance of a binary heap merger using chunks as inputs.
    /// Chunk items should be sorted in ascending order otherwise the result is undefined.
    ///
    /// # Arguments
    /// * `chunks` - Chunks to be merged in a single sorted one
    pub fn new<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
    {
        let chunks = Vec::from_iter(chunks.into_iter().map(|c| c.into_iter()));
        let items = BinaryHeap::with_capacity(chunks.len());

        return BinaryHeapMerger {
            chunks,
            items,
            initiated: false,
            failed: false,
        };
    }

    /// Number of inputs that still have unread items.
    pub fn active_chunks(&self) -> usize {
        self.items.len()
    }

    fn advance(&mut self, idx: usize) -> Result<(), E> {
        if let Some(item) = self.chunks[idx].next() {
            self.items.push((Reverse(item?), Reverse(idx)));
        }
        return Ok(());
    }

    fn init(&mut self) -> Result<(), E> {
        for idx in 0..self.chunks.len() {
            self.advance(idx)?;
        }
        return Ok(());
    }
}

impl<T, E, C> Iterator for BinaryHeapMerger<T, E, C>
where
    T: Ord,
    E: Error,
    C: IntoIterator<Item = Result<T, E>>,
{
    type Item = Result<T, E>;

    /// Returns the next item from the inputs in ascending order.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        if !self.initiated {
            self.initiated = true;
            if let Err(err) = self.init() {
                self.failed = true;
                return Some(Err(err));
            }
        }

        let (Reverse(result), Reverse(idx)) = self.items.pop()?;
        if let Err(err) = self.advance(idx) {
            self.failed = true;
            return Some(Err(err));
        }

        return Some(Ok(result));
    }
}

/// Merges sorted line sources into `writer`. Returns the number of bytes written.
///
/// Source failures are reported as [`SortError::Read`], writer failures as [`SortError::Write`].
/// The writer is flushed before returning.
pub fn merge_into<C, W>(sources: Vec<C>, writer: &mut W) -> Result<u64, SortError>
where
    C: IntoIterator<Item = io::Result<Vec<u8>>>,
    W: Write,
{
    let mut written = 0;

    for line in BinaryHeapMerger::new(sources) {
        let line = line.map_err(SortError::Read)?;
        writer.write_all(&line).map_err(SortError::Write)?;
        written += line.len() as u64;
    }
    writer.flush().map_err(SortError::Write)?;

    return Ok(written);
}

#[cfg(test)]
mod test {
    use rstest::*;
    use std::error::Error;
    use std::io::{self, ErrorKind};

    use super::{merge_into, BinaryHeapMerger};
    use crate::sort::SortError;
    use crate::source::LineSource;

    #[rstest]
    #[case(
        vec![],
        vec![],
    )]
    #[case(
        vec![
            vec![],
            vec![]
        ],
        vec![],
    )]
    #[case(
        vec![
            vec![Ok(4), Ok(5), Ok(7)],
            vec![Ok(1), Ok(6)],
            vec![Ok(3)],
            vec![],
        ],
        vec![Ok(1), Ok(3), Ok(4), Ok(5), Ok(6), Ok(7)],
    )]
    #[case(
        vec![
            vec![Ok(2), Ok(2)],
            vec![Ok(1), Ok(2)],
        ],
        vec![Ok(1), Ok(2), Ok(2), Ok(2)],
    )]
    #[case(
        vec![
            vec![Result::Err(io::Error::new(ErrorKind::Other, "test error"))]
        ],
        vec![
            Result::Err(io::Error::new(ErrorKind::Other, "test error"))
        ],
    )]
    #[case(
        vec![
            vec![Ok(3), Result::Err(io::Error::new(ErrorKind::Other, "test error"))],
            vec![Ok(1), Ok(2)],
        ],
        vec![
            Ok(1),
            Ok(2),
            Result::Err(io::Error::new(ErrorKind::Other, "test error")),
        ],
    )]
    fn test_merger(
        #[case] chunks: Vec<Vec<Result<i32, io::Error>>>,
        #[case] expected_result: Vec<Result<i32, io::Error>>,
    ) {
        let merger = BinaryHeapMerger::new(chunks);
        let actual_result = merger.collect();
        assert!(
            compare_vectors_of_result::<_, io::Error>(&actual_result, &expected_result),
            "actual={:?}, expected={:?}",
            actual_result,
            expected_result
        );
    }

    #[test]
    fn test_merger_stops_after_error() {
        let chunks: Vec<Vec<Result<i32, io::Error>>> = vec![
            vec![Ok(1), Err(io::Error::new(ErrorKind::Other, "test error")), Ok(5)],
            vec![Ok(2), Ok(3), Ok(4)],
        ];

        let actual: Vec<_> = BinaryHeapMerger::new(chunks).collect();

        assert_eq!(actual.len(), 2);
        assert_eq!(actual[0].as_ref().unwrap(), &1);
        assert!(actual[1].is_err());
    }

    #[test]
    fn test_exhausted_chunks_are_dropped() {
        let chunks: Vec<Vec<Result<i32, io::Error>>> = vec![vec![Ok(1)], vec![], vec![Ok(2), Ok(3)]];
        let mut merger = BinaryHeapMerger::new(chunks);

        assert_eq!(merger.next().unwrap().unwrap(), 1);
        assert_eq!(merger.active_chunks(), 1);
        assert_eq!(merger.next().unwrap().unwrap(), 2);
        assert_eq!(merger.next().unwrap().unwrap(), 3);
        assert_eq!(merger.active_chunks(), 0);
        assert!(merger.next().is_none());
    }

    #[test]
    fn test_merge_into() {
        let sources = vec![
            LineSource::new(&b"apple\nbanana\n"[..]),
            LineSource::new(&b"cherry"[..]),
            LineSource::new(&b"apple\n"[..]),
        ];
        let mut output = Vec::new();

        let written = merge_into(sources, &mut output).unwrap();

        assert_eq!(output, b"apple\napple\nbanana\ncherry\n");
        assert_eq!(written, output.len() as u64);
    }

    #[test]
    fn test_merge_into_read_error() {
        let sources: Vec<Vec<io::Result<Vec<u8>>>> = vec![vec![
            Ok(b"a\n".to_vec()),
            Err(io::Error::new(ErrorKind::Other, "test error")),
        ]];
        let mut output = Vec::new();

        let result = merge_into(sources, &mut output);
        assert!(matches!(result, Err(SortError::Read(_))));
    }

    #[test]
    fn test_merge_into_write_error() {
        let sources = vec![LineSource::new(&b"a\nb\n"[..])];
        let mut output = [0u8; 1];

        let result = merge_into(sources, &mut &mut output[..]);
        assert!(matches!(result, Err(SortError::Write(_))));
    }

    fn compare_vectors_of_result<T: PartialEq, E: Error + 'static>(
        actual: &Vec<Result<T, E>>,
        expected: &Vec<Result<T, E>>,
    ) -> bool {
        actual.len() == expected.len()
            && actual
                .into_iter()
                .zip(expected)
                .all(
                    |(actual_result, expected_result)| match (actual_result, expected_result) {
                        (Ok(actual_result), Ok(expected_result)) if actual_result == expected_result => true,
                        (Err(actual_err), Err(expected_err)) => actual_err.to_string() == expected_err.to_string(),
                        _ => false,
                    },
                )
    }
}

//! Chunk splitter.
//!
//! Reads the input in batches bounded by a chunk buffer, sorts each batch in memory and spills it to a
//! temporary chunk file.

use std::io::prelude::*;

use log;

use crate::buffer::{ChunkBuffer, ChunkBufferBuilder};
use crate::sort::SortError;
use crate::source::{LineSource, Record};
use crate::storage::{TempFile, TempKind, TempStorage};

/// Splits `source` into sorted chunk files.
///
/// Empty input produces no chunks, and an input whose length is a multiple of the buffer limit produces
/// no trailing empty chunk. On error the chunks written so far are deleted.
pub fn split<R, B>(source: &mut LineSource<R>, buffer_builder: &B, storage: &TempStorage) -> Result<Vec<TempFile>, SortError>
where
    R: BufRead,
    B: ChunkBufferBuilder<Record>,
{
    let mut chunks = Vec::new();

    loop {
        let mut buffer = buffer_builder.build();
        let mut exhausted = false;

        while !buffer.is_full() {
            match source.pop().map_err(SortError::Read)? {
                Some(line) => buffer.push(line),
                None => {
                    exhausted = true;
                    break;
                }
            }
        }

        if !buffer.is_empty() {
            chunks.push(create_chunk(storage, buffer)?);
        }

        if exhausted {
            break;
        }
    }

    log::debug!("input split into {} chunk(s)", chunks.len());

    return Ok(chunks);
}

/// Sorts the buffer and dumps it to a new temporary chunk file.
pub fn create_chunk(storage: &TempStorage, mut buffer: impl ChunkBuffer<Record>) -> Result<TempFile, SortError> {
    log::debug!("sorting chunk data ({} lines) ...", buffer.len());
    buffer.sort();

    log::debug!("saving chunk data");
    let (chunk, mut chunk_writer) = storage.create(TempKind::Chunk)?;
    for line in buffer {
        chunk_writer.write_all(&line).map_err(SortError::Write)?;
    }
    chunk_writer.flush().map_err(SortError::Write)?;

    return Ok(chunk);
}

//! External sorter.

use log;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};

use crate::chunk;
use crate::reducer::{MergeTreeReducer, MIN_FAN_IN};
use crate::source::{LineSource, Record};
use crate::storage::{TempFile, TempKind, TempStorage};
use crate::{ChunkBufferBuilder, LimitedBufferBuilder};

/// Lower bound of the default merge fan-in.
pub const MIN_MERGE_LIMIT: usize = 10;
/// Upper bound of the default merge fan-in.
pub const MAX_MERGE_LIMIT: usize = 100;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Temporary directory or file creation error.
    TempFile(io::Error),
    /// Input or temporary file read error.
    Read(io::Error),
    /// Temporary file or output write error.
    Write(io::Error),
    /// Temporary file opening error.
    Open(PathBuf, io::Error),
    /// Final result placement error.
    Rename(PathBuf, io::Error),
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(match &self {
            SortError::TempFile(err) => err,
            SortError::Read(err) => err,
            SortError::Write(err) => err,
            SortError::Open(_, err) => err,
            SortError::Rename(_, err) => err,
        })
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::TempFile(err) => write!(f, "temporary directory or file not created: {}", err),
            SortError::Read(err) => write!(f, "data reading error: {}", err),
            SortError::Write(err) => write!(f, "data writing error: {}", err),
            SortError::Open(path, err) => write!(f, "file {} not opened: {}", path.display(), err),
            SortError::Rename(path, err) => write!(f, "result not moved to {}: {}", path.display(), err),
        }
    }
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Clone)]
pub struct ExternalSorterBuilder<B = LimitedBufferBuilder>
where
    B: ChunkBufferBuilder<Record>,
{
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Maximum number of files merged at once.
    merge_limit: Option<usize>,
    /// Input and temporary file read/write buffer size.
    rw_buf_size: Option<usize>,
    /// Chunk buffer builder.
    buffer_builder: B,
}

impl<B> ExternalSorterBuilder<B>
where
    B: ChunkBufferBuilder<Record>,
{
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter<B>, SortError> {
        ExternalSorter::new(
            self.tmp_dir.as_deref(),
            self.buffer_builder,
            self.merge_limit,
            self.rw_buf_size,
        )
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder<B> {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets buffer builder.
    pub fn with_buffer(mut self, buffer_builder: B) -> ExternalSorterBuilder<B> {
        self.buffer_builder = buffer_builder;
        return self;
    }

    /// Sets maximum number of files merged at once.
    pub fn with_merge_limit(mut self, merge_limit: usize) -> ExternalSorterBuilder<B> {
        self.merge_limit = Some(merge_limit);
        return self;
    }

    /// Sets input and chunk read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder<B> {
        self.rw_buf_size = Some(buf_size);
        return self;
    }
}

impl<B> Default for ExternalSorterBuilder<B>
where
    B: ChunkBufferBuilder<Record>,
{
    fn default() -> Self {
        ExternalSorterBuilder {
            tmp_dir: None,
            merge_limit: None,
            rw_buf_size: None,
            buffer_builder: B::default(),
        }
    }
}

/// External sorter.
pub struct ExternalSorter<B = LimitedBufferBuilder>
where
    B: ChunkBufferBuilder<Record>,
{
    /// Temporary files manager.
    storage: TempStorage,
    /// Chunk buffer builder.
    buffer_builder: B,
    /// Maximum number of files merged at once.
    merge_limit: usize,
}

impl<B> ExternalSorter<B>
where
    B: ChunkBufferBuilder<Record>,
{
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `tmp_path` - Directory to be used to store temporary data. If paramater is [`None`] default OS temporary
    ///   directory will be used.
    /// * `buffer_builder` - An instance of a buffer builder that will be used for chunk buffer creation.
    /// * `merge_limit` - Maximum number of files merged at once, at least [`MIN_FAN_IN`]. If the parameter is
    ///   [`None`] the chunk item limit clamped to `[MIN_MERGE_LIMIT, MAX_MERGE_LIMIT]` is used.
    /// * `rw_buf_size` - Input and chunk files read/write buffer size.
    pub fn new(
        tmp_path: Option<&Path>,
        buffer_builder: B,
        merge_limit: Option<usize>,
        rw_buf_size: Option<usize>,
    ) -> Result<Self, SortError> {
        let merge_limit = merge_limit
            .unwrap_or_else(|| buffer_builder.item_limit().clamp(MIN_MERGE_LIMIT, MAX_MERGE_LIMIT))
            .max(MIN_FAN_IN);
        log::info!("merging at most {} files at once", merge_limit);

        return Ok(ExternalSorter {
            storage: TempStorage::new(tmp_path, rw_buf_size)?,
            buffer_builder,
            merge_limit,
        });
    }

    /// Returns the temporary storage used by the sorter.
    pub fn storage(&self) -> &TempStorage {
        &self.storage
    }

    /// Sorts lines from the input into a temporary file and returns it.
    /// The file is deleted when the returned handle is dropped unless it is persisted.
    ///
    /// # Arguments
    /// * `input` - Input stream data to be fetched from
    pub fn sort<R: Read>(&self, input: R) -> Result<TempFile, SortError> {
        let reader = match self.storage.rw_buf_size() {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, input),
            None => io::BufReader::new(input),
        };
        let mut source = LineSource::new(reader);

        let chunks = chunk::split(&mut source, &self.buffer_builder, &self.storage)?;
        log::debug!("external sort preparation done");

        if chunks.is_empty() {
            log::debug!("empty input");
            return self.storage.create_empty(TempKind::Merge);
        }

        let result = MergeTreeReducer::new(&self.storage, self.merge_limit).reduce(chunks)?;
        log::debug!("external sort done");

        return Ok(result);
    }

    /// Sorts lines from the input and moves the result to `output`.
    ///
    /// # Arguments
    /// * `input` - Input stream data to be fetched from
    /// * `output` - Destination file path. The temporary directory should reside on the same file system.
    pub fn sort_to_file<R: Read>(&self, input: R, output: &Path) -> Result<(), SortError> {
        let result = self.sort(input)?;
        return result.persist(output);
    }

    /// Sorts lines from the input and copies the result to `output`. Returns the number of bytes copied.
    ///
    /// # Arguments
    /// * `input` - Input stream data to be fetched from
    /// * `output` - Sink sorted data to be written to
    pub fn sort_to_writer<R: Read, W: Write>(&self, input: R, output: &mut W) -> Result<u64, SortError> {
        let result = self.sort(input)?;
        let mut reader = self.storage.open(&result)?;

        let mut copied = 0;
        loop {
            let buf = reader.fill_buf().map_err(SortError::Read)?;
            if buf.is_empty() {
                break;
            }
            output.write_all(buf).map_err(SortError::Write)?;

            let len = buf.len();
            reader.consume(len);
            copied += len as u64;
        }
        output.flush().map_err(SortError::Write)?;

        return Ok(copied);
    }
}

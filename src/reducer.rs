//! Merge-tree reducer.
//!
//! Reduces any number of sorted files to a single one while never opening more than `limit` of them at a
//! time. Files are split into contiguous groups of at most `limit` names, every group is merged into a new
//! file and the procedure repeats on the group outputs until one file remains. This takes
//! O(log<sub>limit</sub>(n)) passes over the data.

use log;

use crate::merger::merge_into;
use crate::sort::SortError;
use crate::source::LineSource;
use crate::storage::{TempFile, TempKind, TempStorage};

/// Smallest fan-in that still reduces the number of files on every pass.
pub const MIN_FAN_IN: usize = 2;

pub struct MergeTreeReducer<'a> {
    storage: &'a TempStorage,
    limit: usize,
}

impl<'a> MergeTreeReducer<'a> {
    /// Creates a reducer merging at most `limit` files at once. Limits below [`MIN_FAN_IN`] are raised.
    pub fn new(storage: &'a TempStorage, limit: usize) -> Self {
        MergeTreeReducer {
            storage,
            limit: limit.max(MIN_FAN_IN),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Merges sorted `files` into one sorted file. Consumes the inputs: every input is deleted once merged
    /// and, on error, every input still owned by this call is deleted as well.
    ///
    /// A single file is returned as is, without any I/O.
    ///
    /// # Panics
    /// Panics if `files` is empty.
    pub fn reduce(&self, mut files: Vec<TempFile>) -> Result<TempFile, SortError> {
        assert!(!files.is_empty(), "nothing to merge");

        if files.len() == 1 {
            return Ok(files.remove(0));
        }

        if files.len() <= self.limit {
            return self.merge_group(files);
        }

        let groups_number = (files.len() + self.limit - 1) / self.limit;
        log::debug!("reducing {} files in {} groups", files.len(), groups_number);

        let mut reduced = Vec::with_capacity(groups_number);
        while !files.is_empty() {
            let rest = files.split_off(files.len().min(self.limit));
            let group = std::mem::replace(&mut files, rest);
            reduced.push(self.reduce(group)?);
        }

        return self.reduce(reduced);
    }

    /// Merges all `files` at once into a new merge file.
    fn merge_group(&self, files: Vec<TempFile>) -> Result<TempFile, SortError> {
        log::debug!("merging {} files", files.len());

        let mut sources = Vec::with_capacity(files.len());
        for file in &files {
            sources.push(LineSource::new(self.storage.open(file)?));
        }

        let (output, mut writer) = self.storage.create(TempKind::Merge)?;
        let written = merge_into(sources, &mut writer)?;
        drop(writer);

        log::debug!("merge file {} written ({} bytes)", output.path().display(), written);

        for file in files {
            file.remove();
        }

        return Ok(output);
    }
}

//! Temporary storage.
//!
//! Chunks and merge outputs live in plain files inside a temporary directory. Each file is owned by
//! a [`TempFile`] guard which deletes it once it goes out of scope, so every exit path of the sorting
//! pipeline (success, early return or error) releases the files it still owns.

use std::cell::Cell;
use std::fs;
use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log;
use tempfile;

use crate::sort::SortError;

/// Purpose of a temporary file. Determines the file name prefix.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TempKind {
    /// Sorted chunk produced by the splitter.
    Chunk,
    /// Output of a merge step.
    Merge,
}

impl TempKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            TempKind::Chunk => "extsort_chunk_",
            TempKind::Merge => "extsort_merge_",
        }
    }
}

/// Owned temporary file. The file is deleted when the guard is dropped unless it has been persisted.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
    kind: TempKind,
    armed: bool,
}

impl TempFile {
    fn new(path: PathBuf, kind: TempKind) -> Self {
        TempFile { path, kind, armed: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> TempKind {
        self.kind
    }

    /// Deletes the file. Failures are logged and never reported to the caller.
    pub fn remove(mut self) {
        self.delete();
    }

    /// Moves the file to `dest`. On failure the temporary file is deleted.
    pub fn persist(mut self, dest: &Path) -> Result<(), SortError> {
        log::debug!("renaming temp file {} to {}", self.path.display(), dest.display());
        fs::rename(&self.path, dest).map_err(|err| SortError::Rename(dest.to_path_buf(), err))?;
        self.armed = false;

        return Ok(());
    }

    fn delete(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;

        log::debug!("erasing temp file {}", self.path.display());
        if let Err(err) = fs::remove_file(&self.path) {
            log::warn!("temp file {} not erased: {}", self.path.display(), err);
        }
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        self.delete();
    }
}

/// Buffered reader over a temporary file. Counted by the storage it was opened from while alive.
pub struct TempFileReader {
    reader: io::BufReader<fs::File>,
    open_readers: Rc<Cell<usize>>,
}

impl Read for TempFileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl BufRead for TempFileReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.reader.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.reader.consume(amt)
    }
}

impl Drop for TempFileReader {
    fn drop(&mut self) {
        self.open_readers.set(self.open_readers.get() - 1);
    }
}

/// Temporary storage manager.
pub struct TempStorage {
    /// Directory the temporary files are created in.
    dir: PathBuf,
    /// Temporary file read/write buffer size.
    rw_buf_size: Option<usize>,
    /// Number of currently open readers.
    open_readers: Rc<Cell<usize>>,
    /// Largest number of readers open at the same time.
    peak_readers: Cell<usize>,
}

impl TempStorage {
    /// Creates a storage manager.
    ///
    /// # Arguments
    /// * `dir` - Directory to be used to store temporary data. If the parameter is [`None`] default OS
    ///   temporary directory will be used.
    /// * `rw_buf_size` - Temporary files read/write buffer size.
    pub fn new(dir: Option<&Path>, rw_buf_size: Option<usize>) -> Result<Self, SortError> {
        let dir = match dir {
            Some(dir) => dir.to_path_buf(),
            None => std::env::temp_dir(),
        };

        let metadata = fs::metadata(&dir).map_err(SortError::TempFile)?;
        if !metadata.is_dir() {
            return Err(SortError::TempFile(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is not a directory", dir.display()),
            )));
        }

        log::info!("using {} as a temporary directory", dir.display());

        return Ok(TempStorage {
            dir,
            rw_buf_size,
            open_readers: Rc::new(Cell::new(0)),
            peak_readers: Cell::new(0),
        });
    }

    pub fn rw_buf_size(&self) -> Option<usize> {
        self.rw_buf_size
    }

    /// Allocates a new uniquely named temporary file and returns it with a buffered writer.
    pub fn create(&self, kind: TempKind) -> Result<(TempFile, io::BufWriter<fs::File>), SortError> {
        let (file, path) = tempfile::Builder::new()
            .prefix(kind.prefix())
            .tempfile_in(&self.dir)
            .map_err(SortError::TempFile)?
            .keep()
            .map_err(|err| SortError::TempFile(err.error))?;

        log::debug!("writing temp file {}", path.display());

        let writer = match self.rw_buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, file),
            None => io::BufWriter::new(file),
        };

        return Ok((TempFile::new(path, kind), writer));
    }

    /// Allocates a new empty temporary file.
    pub fn create_empty(&self, kind: TempKind) -> Result<TempFile, SortError> {
        let (temp_file, _) = self.create(kind)?;
        return Ok(temp_file);
    }

    /// Opens a temporary file for reading.
    pub fn open(&self, temp_file: &TempFile) -> Result<TempFileReader, SortError> {
        let file = fs::File::open(temp_file.path()).map_err(|err| SortError::Open(temp_file.path().to_path_buf(), err))?;

        let reader = match self.rw_buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, file),
            None => io::BufReader::new(file),
        };

        let open = self.open_readers.get() + 1;
        self.open_readers.set(open);
        self.peak_readers.set(self.peak_readers.get().max(open));

        return Ok(TempFileReader {
            reader,
            open_readers: Rc::clone(&self.open_readers),
        });
    }

    /// Returns the number of currently open temporary file readers.
    pub fn open_readers(&self) -> usize {
        self.open_readers.get()
    }

    /// Returns the largest number of temporary file readers that were open at the same time.
    pub fn peak_open_readers(&self) -> usize {
        self.peak_readers.get()
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::io::{prelude::*, ErrorKind};

    use rstest::*;

    use super::{TempKind, TempStorage};
    use crate::sort::SortError;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    fn dir_entries(dir: &tempfile::TempDir) -> usize {
        fs::read_dir(dir.path()).unwrap().count()
    }

    #[rstest]
    #[case(TempKind::Chunk)]
    #[case(TempKind::Merge)]
    fn test_create_and_drop(tmp_dir: tempfile::TempDir, #[case] kind: TempKind) {
        let storage = TempStorage::new(Some(tmp_dir.path()), None).unwrap();

        let (temp_file, mut writer) = storage.create(kind).unwrap();
        writer.write_all(b"data\n").unwrap();
        writer.flush().unwrap();
        drop(writer);

        let name = temp_file.path().file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with(kind.prefix()));
        assert_eq!(temp_file.path().parent().unwrap(), tmp_dir.path());
        assert_eq!(fs::read(temp_file.path()).unwrap(), b"data\n");

        drop(temp_file);
        assert_eq!(dir_entries(&tmp_dir), 0);
    }

    #[rstest]
    fn test_unique_names(tmp_dir: tempfile::TempDir) {
        let storage = TempStorage::new(Some(tmp_dir.path()), None).unwrap();

        let first = storage.create_empty(TempKind::Chunk).unwrap();
        let second = storage.create_empty(TempKind::Chunk).unwrap();

        assert_ne!(first.path(), second.path());
        assert_eq!(dir_entries(&tmp_dir), 2);
    }

    #[rstest]
    fn test_persist(tmp_dir: tempfile::TempDir) {
        let storage = TempStorage::new(Some(tmp_dir.path()), Some(16)).unwrap();
        let dest = tmp_dir.path().join("result.txt");

        let (temp_file, mut writer) = storage.create(TempKind::Merge).unwrap();
        writer.write_all(b"a\nb\n").unwrap();
        writer.flush().unwrap();
        let temp_path = temp_file.path().to_path_buf();

        temp_file.persist(&dest).unwrap();

        assert!(!temp_path.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"a\nb\n");
        assert_eq!(dir_entries(&tmp_dir), 1);
    }

    #[rstest]
    fn test_persist_failure_cleans_up(tmp_dir: tempfile::TempDir) {
        let storage = TempStorage::new(Some(tmp_dir.path()), None).unwrap();
        let dest = tmp_dir.path().join("missing").join("result.txt");

        let temp_file = storage.create_empty(TempKind::Merge).unwrap();
        let result = temp_file.persist(&dest);

        assert!(matches!(result, Err(SortError::Rename(path, _)) if path == dest));
        assert_eq!(dir_entries(&tmp_dir), 0);
    }

    #[rstest]
    fn test_remove_of_missing_file_is_not_fatal(tmp_dir: tempfile::TempDir) {
        let storage = TempStorage::new(Some(tmp_dir.path()), None).unwrap();

        let temp_file = storage.create_empty(TempKind::Chunk).unwrap();
        fs::remove_file(temp_file.path()).unwrap();

        temp_file.remove();
        assert_eq!(dir_entries(&tmp_dir), 0);
    }

    #[rstest]
    fn test_open_readers_are_counted(tmp_dir: tempfile::TempDir) {
        let storage = TempStorage::new(Some(tmp_dir.path()), None).unwrap();
        let files: Vec<_> = (0..3).map(|_| storage.create_empty(TempKind::Chunk).unwrap()).collect();

        let readers: Vec<_> = files.iter().map(|file| storage.open(file).unwrap()).collect();
        assert_eq!(storage.open_readers(), 3);
        drop(readers);

        let _reader = storage.open(&files[0]).unwrap();
        assert_eq!(storage.open_readers(), 1);
        assert_eq!(storage.peak_open_readers(), 3);
    }

    #[rstest]
    fn test_open_missing_file(tmp_dir: tempfile::TempDir) {
        let storage = TempStorage::new(Some(tmp_dir.path()), None).unwrap();

        let temp_file = storage.create_empty(TempKind::Chunk).unwrap();
        let path = temp_file.path().to_path_buf();
        fs::remove_file(&path).unwrap();

        match storage.open(&temp_file) {
            Err(SortError::Open(err_path, err)) => {
                assert_eq!(err_path, path);
                assert_eq!(err.kind(), ErrorKind::NotFound);
            }
            _ => panic!("open error expected"),
        }
        assert_eq!(storage.open_readers(), 0);
    }

    #[test]
    fn test_missing_directory() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let missing = tmp_dir.path().join("nope");

        assert!(matches!(TempStorage::new(Some(&missing), None), Err(SortError::TempFile(_))));
    }
}

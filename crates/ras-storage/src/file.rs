use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bytes::Bytes;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::event::{EventBus, EventKind, Listener, StorageEvent};
use crate::traits::{Completion, Storage};
use crate::types::{OpenOptions, Stat, StorageStatus};

/// Random-access storage over a single file.
///
/// The file is opened lazily on the first operation, so constructing a
/// `FileStorage` never touches the filesystem. Each operation seeks and then
/// reads or writes directly; nothing is buffered between operations.
pub struct FileStorage {
    path: PathBuf,
    options: OpenOptions,
    state: Mutex<FileState>,
    events: EventBus,
}

struct FileState {
    file: Option<File>,
    status: StorageStatus,
}

impl FileStorage {
    /// Create a storage for the file at `path`.
    pub fn new(path: impl Into<PathBuf>, options: &OpenOptions) -> Self {
        Self {
            path: path.into(),
            options: options.clone(),
            state: Mutex::new(FileState {
                file: None,
                status: StorageStatus::default(),
            }),
            events: EventBus::new(),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_file(&self) -> io::Result<File> {
        if self.options.writable {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = fs::OpenOptions::new()
            .read(true)
            .write(self.options.writable)
            .create(self.options.writable)
            .truncate(self.options.writable && self.options.truncate)
            .open(&self.path)?;
        if let (Some(size), true) = (self.options.size, self.options.writable) {
            file.set_len(size)?;
        }
        Ok(file)
    }

    /// Run `f` against the open file, opening it first if needed.
    ///
    /// A failed open is reported to `Error` listeners as well as returned.
    fn with_file<T>(&self, f: impl FnOnce(&mut File) -> StorageResult<T>) -> StorageResult<T> {
        let mut just_opened = false;
        let result = {
            let mut state = self.state.lock().expect("file lock poisoned");
            if state.status.destroyed {
                return Err(StorageError::Destroyed);
            }
            if state.status.closed {
                return Err(StorageError::Closed);
            }
            if state.file.is_none() {
                match self.open_file() {
                    Ok(file) => {
                        debug!(path = %self.path.display(), "file opened");
                        state.file = Some(file);
                        state.status.opened = true;
                        just_opened = true;
                    }
                    Err(e) => {
                        drop(state);
                        let err = StorageError::from(e);
                        self.events.emit(&StorageEvent::Error(err.clone()));
                        return Err(err);
                    }
                }
            }
            match state.file.as_mut() {
                Some(file) => f(file),
                None => Err(StorageError::Closed),
            }
        };
        if just_opened {
            self.events.emit(&StorageEvent::Open);
        }
        result
    }

    fn require(&self, readable: bool) -> StorageResult<()> {
        if readable && !self.options.readable {
            return Err(StorageError::AccessDenied("readable"));
        }
        if !readable && !self.options.writable {
            return Err(StorageError::AccessDenied("writable"));
        }
        Ok(())
    }

    /// Drop the file handle and mark closed. Returns `true` on the first call.
    fn release(&self) -> bool {
        let mut state = self.state.lock().expect("file lock poisoned");
        state.file = None;
        let first = !state.status.closed;
        state.status.closed = true;
        first
    }
}

impl Storage for FileStorage {
    fn write(&self, offset: u64, data: Bytes, cb: Completion<()>) -> StorageResult<()> {
        let outcome = self.require(false).and_then(|()| {
            self.with_file(|file| {
                file.seek(SeekFrom::Start(offset))?;
                file.write_all(&data)?;
                Ok(())
            })
        });
        cb.complete(outcome);
        Ok(())
    }

    fn read(&self, offset: u64, length: u64, cb: Completion<Bytes>) -> StorageResult<()> {
        let outcome = self.require(true).and_then(|()| {
            self.with_file(|file| {
                let size = file.metadata()?.len();
                let in_range = offset.checked_add(length).is_some_and(|end| end <= size);
                if !in_range {
                    return Err(StorageError::OutOfRange {
                        offset,
                        length,
                        size,
                    });
                }
                // Bounded by the file size checked above.
                let mut buf = vec![0u8; length as usize];
                file.seek(SeekFrom::Start(offset))?;
                file.read_exact(&mut buf)?;
                Ok(Bytes::from(buf))
            })
        });
        cb.complete(outcome);
        Ok(())
    }

    fn stat(&self, cb: Completion<Stat>) -> StorageResult<()> {
        let outcome = self.with_file(|file| {
            Ok(Stat {
                size: file.metadata()?.len(),
            })
        });
        cb.complete(outcome);
        Ok(())
    }

    fn del(&self, offset: u64, length: u64, cb: Completion<()>) -> StorageResult<()> {
        let outcome = self.require(false).and_then(|()| {
            self.with_file(|file| {
                let size = file.metadata()?.len();
                if offset >= size {
                    return Ok(());
                }
                let end = offset.saturating_add(length);
                if end >= size {
                    file.set_len(offset)?;
                } else {
                    file.seek(SeekFrom::Start(offset))?;
                    io::copy(&mut io::repeat(0).take(length), file)?;
                }
                Ok(())
            })
        });
        cb.complete(outcome);
        Ok(())
    }

    fn close(&self, cb: Completion<()>) -> StorageResult<()> {
        let destroyed = self.state.lock().expect("file lock poisoned").status.destroyed;
        if destroyed {
            cb.complete(Err(StorageError::Destroyed));
            return Ok(());
        }
        if self.release() {
            self.events.emit(&StorageEvent::Close);
        }
        cb.complete(Ok(()));
        Ok(())
    }

    fn destroy(&self, cb: Completion<()>) -> StorageResult<()> {
        let first_close = self.release();
        let first_destroy = {
            let mut state = self.state.lock().expect("file lock poisoned");
            let first = !state.status.destroyed;
            state.status.destroyed = true;
            first
        };
        if first_close {
            self.events.emit(&StorageEvent::Close);
        }
        let outcome = if first_destroy {
            match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StorageError::from(e)),
            }
        } else {
            Ok(())
        };
        if first_destroy {
            debug!(path = %self.path.display(), "file destroyed");
            self.events.emit(&StorageEvent::Destroy);
        }
        cb.complete(outcome);
        Ok(())
    }

    fn on(&self, event: EventKind, listener: Listener) -> StorageResult<()> {
        self.events.subscribe(event, listener);
        Ok(())
    }

    fn status(&self) -> StorageResult<StorageStatus> {
        Ok(self.state.lock().expect("file lock poisoned").status)
    }
}

impl std::fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStorage")
            .field("path", &self.path)
            .field("options", &self.options)
            .finish()
    }
}

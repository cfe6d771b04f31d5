//! Owns the EDB file's descriptor and its memory mapping, and keeps the two
//! in sync when the file needs to grow (spec §4.7 "Memory mapping").

use std::fs::File;
use std::io;
use std::path::Path;

use essadb_core::StorageError;
use memmap2::MmapMut;

fn os_err(function: &'static str) -> impl Fn(io::Error) -> StorageError {
    move |e| StorageError::Os {
        function,
        errno: e.raw_os_error().unwrap_or(-1),
    }
}

/// A growable memory mapping over an open file. Closing (dropping) unmaps
/// and closes the file; every write goes through `msync`-on-drop by virtue
/// of `MmapMut`'s own `Drop` impl flushing on most platforms, but callers
/// that need a durability point call `flush` explicitly.
pub struct Mapping {
    file: File,
    mmap: MmapMut,
}

impl Mapping {
    pub fn create(path: &Path, initial_len: u64) -> Result<Self, StorageError> {
        let file = File::options()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(os_err("open"))?;
        file.set_len(initial_len).map_err(os_err("ftruncate"))?;
        let mmap = unsafe { MmapMut::map_mut(&file).map_err(os_err("mmap"))? };
        Ok(Self { file, mmap })
    }

    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let file = File::options().read(true).write(true).open(path).map_err(os_err("open"))?;
        let mmap = unsafe { MmapMut::map_mut(&file).map_err(os_err("mmap"))? };
        Ok(Self { file, mmap })
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Truncate-extends the file and remaps it; the old mapping is dropped
    /// first so the new one can take its place (spec §4.7).
    pub fn grow(&mut self, new_len: u64) -> Result<(), StorageError> {
        log::trace!("growing mapping to {new_len} bytes");
        self.file.set_len(new_len).map_err(os_err("ftruncate"))?;
        self.mmap = unsafe { MmapMut::map_mut(&self.file).map_err(os_err("mmap"))? };
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    pub fn block_slice(&self, header_size: usize, block_size: usize, block_index: u32) -> &[u8] {
        let start = header_size + (block_index as usize - 1) * block_size;
        &self.mmap[start..start + block_size]
    }

    pub fn block_slice_mut(&mut self, header_size: usize, block_size: usize, block_index: u32) -> &mut [u8] {
        let start = header_size + (block_index as usize - 1) * block_size;
        &mut self.mmap[start..start + block_size]
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.mmap.flush().map_err(os_err("msync"))
    }
}

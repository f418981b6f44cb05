use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use fs4::fs_std::FileExt;
use tracing::{debug, info};

use crate::error::{PageDbError, Result};
use crate::storage::page::{Page, PageNum, PAGE_SIZE};

/// Maps page numbers to in-memory buffers and to their slot in the backing file.
///
/// Pages are materialized lazily into an arena indexed by page number. The
/// arena grows on demand, bounded by `max_pages`. Writes are explicit: a
/// caller mutates a buffer through `get_page` and then calls `flush`.
pub struct Pager {
    file: File,
    file_length: u64,
    pages: Vec<Option<Box<Page>>>,
    num_pages: u32,
    max_pages: u32,
}

impl Pager {
    /// Open (or create) the backing file and take an exclusive lock on it.
    pub fn open(path: &Path, max_pages: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        file.try_lock_exclusive().map_err(|e| {
            PageDbError::Locked(format!("{} is in use: {}", path.display(), e))
        })?;

        let file_length = file.metadata()?.len();
        if file_length % PAGE_SIZE as u64 != 0 {
            return Err(PageDbError::FormatViolation(format!(
                "file length {} is not a whole number of pages",
                file_length
            )));
        }

        let file_pages = file_length / PAGE_SIZE as u64;
        if file_pages > u64::from(max_pages) {
            return Err(PageDbError::CapacityExceeded { max_pages });
        }
        let num_pages = file_pages as u32;

        info!(path = %path.display(), num_pages, max_pages, "opened pager");

        Ok(Pager {
            file,
            file_length,
            pages: Vec::new(),
            num_pages,
            max_pages,
        })
    }

    /// Get a page buffer, reading it from disk on first reference.
    ///
    /// Only pages below `num_pages` exist. New pages come from
    /// `allocate_page`, so page numbers stay dense.
    pub fn get_page(&mut self, page_num: PageNum) -> Result<&mut Page> {
        if page_num >= self.num_pages {
            return Err(PageDbError::PageNotFound(page_num));
        }

        let idx = page_num as usize;
        if self.pages.len() <= idx {
            self.pages.resize_with(idx + 1, || None);
        }

        // Unloaded pages below `num_pages` are always in the file: allocated
        // pages stay materialized until the pager is dropped.
        if self.pages[idx].is_none() {
            let mut page = Box::new(Page::new());
            self.file
                .seek(SeekFrom::Start(u64::from(page_num) * PAGE_SIZE as u64))?;
            self.file.read_exact(&mut page.data)?;
            debug!(page_num, "loaded page from disk");
            self.pages[idx] = Some(page);
        }

        self.pages[idx]
            .as_deref_mut()
            .ok_or(PageDbError::PageNotFound(page_num))
    }

    /// Reserve the next unused page number and materialize a zeroed buffer for it.
    pub fn allocate_page(&mut self) -> Result<PageNum> {
        let page_num = self.num_pages;
        if page_num >= self.max_pages {
            return Err(PageDbError::CapacityExceeded {
                max_pages: self.max_pages,
            });
        }
        let idx = page_num as usize;
        if self.pages.len() <= idx {
            self.pages.resize_with(idx + 1, || None);
        }
        self.pages[idx] = Some(Box::new(Page::new()));
        self.num_pages += 1;
        debug!(page_num, "allocated page");
        Ok(page_num)
    }

    /// Write a materialized page to its offset in the file.
    pub fn flush(&mut self, page_num: PageNum) -> Result<()> {
        let page = self
            .pages
            .get(page_num as usize)
            .and_then(|p| p.as_deref())
            .ok_or(PageDbError::PageNotFound(page_num))?;

        let offset = u64::from(page_num) * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(page.as_bytes())?;

        let end = offset + PAGE_SIZE as u64;
        if end > self.file_length {
            self.file_length = end;
        }
        debug!(page_num, "flushed page");
        Ok(())
    }

    /// Write every materialized page and sync the file.
    pub fn flush_all(&mut self) -> Result<()> {
        for page_num in 0..self.num_pages {
            let loaded = matches!(self.pages.get(page_num as usize), Some(Some(_)));
            if loaded {
                self.flush(page_num)?;
            }
        }
        self.sync()
    }

    /// Sync file to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Number of pages materialized or present in the file.
    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// Number of whole pages currently backed by the file.
    pub fn file_pages(&self) -> u64 {
        self.file_length / PAGE_SIZE as u64
    }
}

#[cfg(test)]
mod tests;

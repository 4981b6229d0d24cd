use std::{
    collections::{HashMap, hash_map::Entry},
    fs::{File, OpenOptions},
    io::{ErrorKind, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::types::{
    PAGE_SIZE, PageId,
    error::DatabaseError,
    page::{Page, PageType},
};

/// Page-granular access to one `.tbl` or `.ndx` file.
///
/// Pages are numbered from 0 in file order. Writes go straight to disk and
/// refresh the cache, so every page is saved as soon as it is modified.
pub struct Pager {
    path: PathBuf,
    file: File,
    page_count: u32,
    page_cache: HashMap<PageId, Page>,
}

impl Pager {
    /// Create a new file holding one empty root page of `root_type`
    pub fn create<P: AsRef<Path>>(path: P, root_type: PageType) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|err| match err.kind() {
                ErrorKind::AlreadyExists => DatabaseError::SchemaViolation {
                    details: format!("{} already exists", path.display()),
                },
                _ => DatabaseError::Io(err),
            })?;
        let mut pager = Self {
            path: path.to_path_buf(),
            file,
            page_count: 0,
            page_cache: HashMap::new(),
        };
        pager.append_page(root_type, None, None)?;
        debug!(path = %path.display(), "created page file");
        Ok(pager)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let file_size = file.metadata()?.len();
        if file_size == 0 || file_size % PAGE_SIZE as u64 != 0 {
            return Err(DatabaseError::CorruptedPage {
                page_id: 0,
                reason: format!(
                    "{} has {} bytes, not a positive multiple of {}",
                    path.display(),
                    file_size,
                    PAGE_SIZE
                ),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            file,
            page_count: (file_size / PAGE_SIZE as u64) as u32,
            page_cache: HashMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    fn page_offset(page_id: PageId) -> u64 {
        page_id as u64 * PAGE_SIZE as u64
    }

    fn read_from_disk(file: &mut File, page_id: PageId) -> Result<Page, DatabaseError> {
        let mut buffer = vec![0u8; PAGE_SIZE];
        file.seek(SeekFrom::Start(Self::page_offset(page_id)))?;
        file.read_exact(&mut buffer)?;
        Page::from_bytes(page_id, &buffer)
    }

    pub fn load_page(&mut self, page_id: PageId) -> Result<&Page, DatabaseError> {
        if page_id >= self.page_count {
            return Err(DatabaseError::CorruptedPage {
                page_id,
                reason: format!("file has only {} pages", self.page_count),
            });
        }
        match self.page_cache.entry(page_id) {
            Entry::Occupied(entry) => Ok(&*entry.into_mut()),
            Entry::Vacant(entry) => {
                let page = Self::read_from_disk(&mut self.file, page_id)?;
                Ok(&*entry.insert(page))
            }
        }
    }

    /// Owned copy of a page, to be modified and handed back to `write_page`
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page, DatabaseError> {
        Ok(self.load_page(page_id)?.clone())
    }

    pub fn write_page(&mut self, page: &Page) -> Result<(), DatabaseError> {
        if page.page_id >= self.page_count {
            return Err(DatabaseError::CorruptedPage {
                page_id: page.page_id,
                reason: format!("cannot write past the last page {}", self.page_count),
            });
        }
        self.file.seek(SeekFrom::Start(Self::page_offset(page.page_id)))?;
        self.file.write_all(page.as_bytes())?;
        self.file.flush()?;
        let mut cached = page.clone();
        cached.is_dirty = false;
        self.page_cache.insert(page.page_id, cached);
        Ok(())
    }

    /// Append a zeroed page with its header set; returns the new page number
    pub fn append_page(
        &mut self,
        page_type: PageType,
        right_pointer: Option<PageId>,
        parent: Option<PageId>,
    ) -> Result<PageId, DatabaseError> {
        let page_id = self.page_count;
        let page = Page::new(page_id, page_type, right_pointer, parent);
        self.page_count += 1;
        self.write_page(&page)?;
        Ok(page_id)
    }

    pub fn load_all(&mut self) -> Result<Vec<Page>, DatabaseError> {
        (0..self.page_count).map(|id| self.read_page(id)).collect()
    }

    /// Replace the whole file with `pages`, which must be numbered 0..n
    pub fn rewrite(&mut self, pages: Vec<Page>) -> Result<(), DatabaseError> {
        for (expected, page) in pages.iter().enumerate() {
            if page.page_id as usize != expected {
                return Err(DatabaseError::CorruptedPage {
                    page_id: page.page_id,
                    reason: format!("rewrite expected page {} at this position", expected),
                });
            }
        }
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        for page in &pages {
            self.file.write_all(page.as_bytes())?;
        }
        self.file.flush()?;
        self.page_count = pages.len() as u32;
        self.page_cache = pages
            .into_iter()
            .map(|mut page| {
                page.is_dirty = false;
                (page.page_id, page)
            })
            .collect();
        debug!(path = %self.path.display(), pages = self.page_count, "rewrote page file");
        Ok(())
    }
}

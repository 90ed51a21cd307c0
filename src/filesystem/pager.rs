//! Line-based pagination over files of any size
//!
//! Files below the configured threshold are read whole and returned as a
//! single page. Larger files are streamed: one pass counts lines, a second
//! pass collects the requested page, so memory stays proportional to one page.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::protocol::{FilePage, FileSystemError};

use super::config::{FileSystemConfig, PaginationStrategy};
use super::scanner::{split_lines, LineScanner};
use super::security::ResolvedPath;
use super::{check_cancelled, scan_error};

#[derive(Clone)]
pub struct Pager {
    config: Arc<FileSystemConfig>,
}

/// Lines of the selected page plus the numbers needed to describe it
struct PageSlice {
    lines: Vec<String>,
    page_number: usize,
    total_pages: usize,
    total_lines: usize,
}

impl Pager {
    pub fn new(config: Arc<FileSystemConfig>) -> Self {
        Self { config }
    }

    /// Return page `requested` of the file at `path`.
    ///
    /// Out-of-range page numbers are clamped, never rejected.
    pub fn paginate(
        &self,
        path: &ResolvedPath,
        requested: i64,
        cancel: &CancellationToken,
    ) -> Result<FilePage, FileSystemError> {
        let logical = path.logical();
        let metadata = std::fs::metadata(path.absolute())
            .map_err(|e| FileSystemError::from_io(&logical, &e))?;
        if metadata.is_dir() {
            return Err(FileSystemError::IsADirectory { path: logical });
        }

        let size = metadata.len();
        let started = Instant::now();

        let (slice, is_partial) = if size < self.config.large_file_threshold {
            (self.read_whole(path, &logical, cancel)?, false)
        } else {
            let mut file =
                File::open(path.absolute()).map_err(|e| FileSystemError::from_io(&logical, &e))?;
            let slice = match self.config.pagination_strategy {
                PaginationStrategy::TwoPass => {
                    self.two_pass(&mut file, &logical, requested, cancel)?
                }
                PaginationStrategy::PageIndex => {
                    self.page_index(&mut file, &logical, requested, cancel)?
                }
            };
            (slice, true)
        };

        tracing::debug!(
            "Paged {} ({} bytes, {}): page {}/{}, {} total lines in {:?}",
            logical,
            size,
            if is_partial { "streamed" } else { "whole" },
            slice.page_number,
            slice.total_pages,
            slice.total_lines,
            started.elapsed()
        );

        Ok(FilePage {
            name: path.name(),
            path: logical,
            size,
            is_partial,
            total_lines: slice.total_lines,
            lines: slice.lines,
            page_number: slice.page_number,
            total_pages: slice.total_pages,
        })
    }

    fn read_whole(
        &self,
        path: &ResolvedPath,
        logical: &str,
        cancel: &CancellationToken,
    ) -> Result<PageSlice, FileSystemError> {
        check_cancelled(cancel)?;
        let content =
            std::fs::read(path.absolute()).map_err(|e| FileSystemError::from_io(logical, &e))?;
        let lines = split_lines(&content);
        Ok(PageSlice {
            total_lines: lines.len(),
            lines,
            page_number: 1,
            total_pages: 1,
        })
    }

    fn two_pass(
        &self,
        file: &mut File,
        logical: &str,
        requested: i64,
        cancel: &CancellationToken,
    ) -> Result<PageSlice, FileSystemError> {
        let total_lines = self.count_lines(&mut *file, logical, None, cancel)?;
        let total_pages = total_pages(total_lines, self.config.page_size);
        let page_number = clamp_page(requested, total_pages);

        rewind(file, logical, 0)?;
        let skip = (page_number - 1) * self.config.page_size;
        let lines = self.collect_page(&mut *file, logical, skip, cancel)?;

        Ok(PageSlice {
            lines,
            page_number,
            total_pages,
            total_lines,
        })
    }

    fn page_index(
        &self,
        file: &mut File,
        logical: &str,
        requested: i64,
        cancel: &CancellationToken,
    ) -> Result<PageSlice, FileSystemError> {
        let mut page_starts = Vec::new();
        let total_lines = self.count_lines(&mut *file, logical, Some(&mut page_starts), cancel)?;
        let total_pages = total_pages(total_lines, self.config.page_size);
        let page_number = clamp_page(requested, total_pages);

        let (offset, skip) = match page_starts.get(page_number - 1) {
            Some(&offset) => (offset, 0),
            None => (0, (page_number - 1) * self.config.page_size),
        };
        rewind(file, logical, offset)?;
        let lines = self.collect_page(&mut *file, logical, skip, cancel)?;

        Ok(PageSlice {
            lines,
            page_number,
            total_pages,
            total_lines,
        })
    }

    /// Count every line, optionally recording the byte offset each page starts at
    fn count_lines<R: Read>(
        &self,
        reader: R,
        logical: &str,
        mut page_starts: Option<&mut Vec<u64>>,
        cancel: &CancellationToken,
    ) -> Result<usize, FileSystemError> {
        let mut scanner = LineScanner::new(reader, self.config.scan_limits());
        loop {
            check_cancelled(cancel)?;
            let offset = scanner.bytes_consumed();
            if !scanner.advance().map_err(|e| scan_error(logical, e))? {
                break;
            }
            if let Some(starts) = page_starts.as_deref_mut() {
                if (scanner.lines_read() - 1) % self.config.page_size == 0 {
                    starts.push(offset);
                }
            }
        }
        Ok(scanner.lines_read())
    }

    /// Skip `skip` lines, then collect up to one page
    fn collect_page<R: Read>(
        &self,
        reader: R,
        logical: &str,
        skip: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, FileSystemError> {
        let page_size = self.config.page_size;
        let mut scanner = LineScanner::new(reader, self.config.scan_limits());
        let mut lines = Vec::with_capacity(page_size.min(4096));

        while lines.len() < page_size {
            check_cancelled(cancel)?;
            if !scanner.advance().map_err(|e| scan_error(logical, e))? {
                break;
            }
            if scanner.lines_read() > skip {
                lines.push(scanner.text().into_owned());
            }
        }
        Ok(lines)
    }
}

fn rewind(file: &mut File, logical: &str, offset: u64) -> Result<(), FileSystemError> {
    file.seek(SeekFrom::Start(offset))
        .map(|_| ())
        .map_err(|e| FileSystemError::from_io(logical, &e))
}

/// Number of pages needed for `total_lines`; never less than one
pub fn total_pages(total_lines: usize, page_size: usize) -> usize {
    total_lines.div_ceil(page_size).max(1)
}

/// Clamp a requested page number into `1..=total_pages`
pub fn clamp_page(requested: i64, total_pages: usize) -> usize {
    if requested < 1 {
        return 1;
    }
    usize::try_from(requested)
        .unwrap_or(usize::MAX)
        .min(total_pages.max(1))
}

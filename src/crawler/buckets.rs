//! Pagination within an enumeration bucket

/// Rounds `offset` down to a multiple of `page_size`
pub fn align_down(offset: u64, page_size: u32) -> u64 {
    let page_size = u64::from(page_size.max(1));
    offset - offset % page_size
}

/// The next search page to fetch inside a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub bucket_index: usize,
    pub offset: u64,
    pub page_size: u32,
}

impl PageCursor {
    /// Cursor on the page containing absolute position `position`
    pub fn containing(bucket_index: usize, position: u64, page_size: u32) -> Self {
        Self {
            bucket_index,
            offset: align_down(position, page_size),
            page_size,
        }
    }

    /// Absolute position of the `n`th item of the current page
    pub fn position_of(&self, n: usize) -> u64 {
        self.offset + n as u64
    }

    /// Moves to the next page
    pub fn advance(&mut self) {
        self.offset += u64::from(self.page_size);
    }

    /// True once the offset has passed the bucket's reported size
    pub fn is_past(&self, total_results: u64) -> bool {
        self.offset >= total_results
    }
}

//! Page arithmetic for record grids

/// Records shown per page in both grid and table layouts
pub const PAGE_SIZE: usize = 6;

/// Number of pages needed for `len` records; never less than one
pub fn total_pages(len: usize) -> usize {
    len.div_ceil(PAGE_SIZE).max(1)
}

/// 1-based page cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    current: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { current: 1 }
    }
}

impl Pagination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Clamp after the list length changed
    ///
    /// Only moves down, and only when the cursor is past the last page.
    /// Returns whether the cursor moved.
    pub fn sync(&mut self, len: usize) -> bool {
        let last = total_pages(len);
        if self.current > last {
            self.current = last;
            return true;
        }
        false
    }

    /// Jump to `page`, bounded to `1..=total_pages(len)`
    pub fn go_to(&mut self, page: usize, len: usize) -> usize {
        self.current = page.clamp(1, total_pages(len));
        self.current
    }

    /// Records on the current page
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = (self.current - 1) * PAGE_SIZE;
        if start >= items.len() {
            return &[];
        }
        let end = (start + PAGE_SIZE).min(items.len());
        &items[start..end]
    }
}

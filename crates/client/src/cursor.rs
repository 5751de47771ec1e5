//! Chunked result cursor.
//!
//! Large searches are never materialized in one response. `Chunked` pulls
//! fixed-size pages through a fetch function and hands out items one at a
//! time. The sequence is finite (a short page ends it) and can be restarted
//! from the first page with [`Chunked::rewind`].

use std::collections::VecDeque;

/// Lazy paged sequence over `fetch(offset, limit)`.
pub struct Chunked<T, F> {
    fetch: F,
    chunk_size: usize,
    offset: usize,
    buffer: VecDeque<T>,
    done: bool,
}

impl<T, E, F> Chunked<T, F>
where
    F: FnMut(usize, usize) -> Result<Vec<T>, E>,
{
    /// A `chunk_size` of zero is bumped to one.
    pub fn new(chunk_size: usize, fetch: F) -> Self {
        Self {
            fetch,
            chunk_size: chunk_size.max(1),
            offset: 0,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Restart from the first page. Buffered items are dropped.
    pub fn rewind(&mut self) {
        self.offset = 0;
        self.buffer.clear();
        self.done = false;
    }
}

impl<T, E, F> Iterator for Chunked<T, F>
where
    F: FnMut(usize, usize) -> Result<Vec<T>, E>,
{
    type Item = Result<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(item) = self.buffer.pop_front() {
            return Some(Ok(item));
        }
        if self.done {
            return None;
        }

        match (self.fetch)(self.offset, self.chunk_size) {
            Ok(page) => {
                if page.len() < self.chunk_size {
                    self.done = true;
                }
                self.offset += page.len();
                self.buffer.extend(page);
                self.buffer.pop_front().map(Ok)
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

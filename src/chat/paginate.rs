//! Splitting outbound text into size-bounded pages.

use std::iter::FusedIterator;

/// Lazy iterator over fixed-size pages of a string.
///
/// Pages are cut every `page_size` characters regardless of words or
/// lines; only the last page may be shorter. Empty input yields no pages.
#[derive(Debug, Clone)]
pub struct Paginator<'a> {
    remaining: &'a str,
    page_size: usize,
}

impl<'a> Paginator<'a> {
    /// A `page_size` of zero is treated as one.
    #[must_use]
    pub fn new(text: &'a str, page_size: usize) -> Self {
        Self {
            remaining: text,
            page_size: page_size.max(1),
        }
    }
}

impl<'a> Iterator for Paginator<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }

        let split = self
            .remaining
            .char_indices()
            .nth(self.page_size)
            .map_or(self.remaining.len(), |(offset, _)| offset);
        let (page, rest) = self.remaining.split_at(split);
        self.remaining = rest;
        Some(page)
    }
}

impl FusedIterator for Paginator<'_> {}

/// Paginate `text` into pages of at most `page_size` characters.
#[must_use]
pub fn paginate(text: &str, page_size: usize) -> Paginator<'_> {
    Paginator::new(text, page_size)
}

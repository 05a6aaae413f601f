use std::num::IntErrorKind;

use crate::content::Window;

/// Splits `count` items into fixed-size pages.
///
/// An empty sequence still has one (empty) page, so there is always a valid
/// page to fall back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    count: usize,
    per_page: usize,
}

impl Paginator {
    pub fn new(count: usize, per_page: usize) -> Self {
        Self {
            count,
            per_page: per_page.max(1),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn num_pages(&self) -> usize {
        if self.count == 0 {
            1
        } else {
            self.count.div_ceil(self.per_page)
        }
    }

    /// Resolve a raw `?page=` value to a page that exists.
    ///
    /// Missing or non-numeric values give the first page; numbers past the
    /// end, below 1, or too large to represent give the last page.
    pub fn resolve(&self, requested: Option<&str>) -> usize {
        let last = self.num_pages();
        let Some(raw) = requested else {
            return 1;
        };

        match raw.trim().parse::<i64>() {
            Ok(n) if n >= 1 && (n as u64) <= last as u64 => n as usize,
            Ok(_) => last,
            Err(e) => match e.kind() {
                IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => last,
                _ => 1,
            },
        }
    }

    /// Item range covered by page `number` (1-based, already resolved).
    pub fn window(&self, number: usize) -> Window {
        Window {
            offset: (number.max(1) - 1) * self.per_page,
            limit: self.per_page,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub number: usize,
    pub current: bool,
}

/// One resolved page of a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    /// Total items across every page.
    pub count: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, number: usize, paginator: &Paginator) -> Self {
        Self {
            items,
            number,
            num_pages: paginator.num_pages(),
            count: paginator.count(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn previous_number(&self) -> usize {
        self.number.saturating_sub(1).max(1)
    }

    pub fn next_number(&self) -> usize {
        (self.number + 1).min(self.num_pages)
    }

    pub fn has_other_pages(&self) -> bool {
        self.num_pages > 1
    }

    pub fn links(&self) -> Vec<PageLink> {
        (1..=self.num_pages)
            .map(|number| PageLink {
                number,
                current: number == self.number,
            })
            .collect()
    }
}

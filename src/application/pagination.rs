//! Page-number pagination with opaque cursors.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct PageCursorPayload {
    page: u32,
    page_size: u32,
}

/// Opaque pointer to a numbered page, handed out as `next`/`previous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    page: u32,
    page_size: u32,
}

impl PageCursor {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn encode(&self) -> String {
        let payload = PageCursorPayload {
            page: self.page,
            page_size: self.page_size,
        };
        let serialized =
            serde_json::to_vec(&payload).expect("serializing page cursor payload should succeed");
        URL_SAFE_NO_PAD.encode(serialized)
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        let payload: PageCursorPayload = serde_json::from_slice(&bytes)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        Ok(Self {
            page: payload.page,
            page_size: payload.page_size,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationLimits {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl PaginationLimits {
    /// Turn raw query values into a page request.
    ///
    /// A cursor takes precedence over `page`/`page_size`. Unusable page sizes
    /// fall back to the default and oversized ones are capped; unusable page
    /// numbers are rejected.
    pub fn resolve(
        &self,
        page: Option<&str>,
        page_size: Option<&str>,
        cursor: Option<&str>,
    ) -> Result<PageNumberRequest, PaginationError> {
        if let Some(cursor) = cursor {
            let cursor = PageCursor::decode(cursor)?;
            if cursor.page == 0 {
                return Err(PaginationError::InvalidPage(cursor.page.to_string()));
            }
            return Ok(PageNumberRequest {
                page: cursor.page,
                page_size: self.clamp_page_size(Some(cursor.page_size)),
            });
        }

        let page = match page.map(str::trim) {
            None | Some("") => 1,
            Some("last") => {
                return Ok(PageNumberRequest::last(
                    self.clamp_page_size(parse(page_size)),
                ));
            }
            Some(raw) => match raw.parse::<u32>() {
                Ok(value) if value > 0 => value,
                _ => return Err(PaginationError::InvalidPage(raw.to_string())),
            },
        };

        Ok(PageNumberRequest {
            page,
            page_size: self.clamp_page_size(parse(page_size)),
        })
    }

    fn clamp_page_size(&self, requested: Option<u32>) -> u32 {
        match requested {
            Some(size) if size > 0 => size.min(self.max_page_size),
            _ => self.default_page_size,
        }
    }
}

fn parse(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
}

/// One-based page number request. `page == 0` stands for "the last page".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageNumberRequest {
    page: u32,
    page_size: u32,
}

impl PageNumberRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    fn last(page_size: u32) -> Self {
        Self { page: 0, page_size }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Settle the page number against the total and reject pages past the end.
    ///
    /// An empty result set still has a valid first page.
    pub fn bind(self, count: u64) -> Result<BoundPage, PaginationError> {
        let page_size = u64::from(self.page_size);
        let pages = count.div_ceil(page_size).max(1);
        let page = if self.page == 0 {
            pages
        } else {
            u64::from(self.page)
        };

        if page > pages {
            return Err(PaginationError::InvalidPage(page.to_string()));
        }

        Ok(BoundPage {
            page,
            pages,
            page_size,
            count,
        })
    }
}

/// A page number known to exist for a given total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundPage {
    page: u64,
    pages: u64,
    page_size: u64,
    count: u64,
}

impl BoundPage {
    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn limit(&self) -> u32 {
        u32::try_from(self.page_size).unwrap_or(u32::MAX)
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.page_size
    }

    pub fn next_cursor(&self) -> Option<String> {
        (self.page < self.pages).then(|| self.cursor_for(self.page + 1))
    }

    pub fn previous_cursor(&self) -> Option<String> {
        (self.page > 1).then(|| self.cursor_for(self.page - 1))
    }

    fn cursor_for(&self, page: u64) -> String {
        let page = u32::try_from(page).unwrap_or(u32::MAX);
        PageCursor::new(page, self.limit()).encode()
    }
}

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("invalid page `{0}`")]
    InvalidPage(String),
}

//! Cursor-based pagination over an issues or pull requests connection.
//!
//! Pagination is a bounded state machine: a cursor, the number of pages
//! fetched so far, and a maximum. An API that keeps reporting
//! `hasNextPage = true` trips [`PaginationError::Overrun`] instead of looping
//! forever. Pages are always fetched one after another; the cursor model gives
//! no guarantee for parallel pagination.

use crate::executor::{ExecuteError, Executor};
use crate::github::{Item, Page, PageInfo, PageQuery};
use thiserror::Error;

/// Default maximum number of pages fetched in one pass.
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// Errors that can occur while paginating.
#[derive(Debug, Error)]
pub enum PaginationError {
    /// The API still reported more pages after the maximum was reached.
    #[error("Pagination did not finish after {max_pages} pages")]
    Overrun {
        /// The configured maximum.
        max_pages: usize,
    },

    /// A page query failed.
    #[error(transparent)]
    Execute(#[from] ExecuteError),
}

/// Outcome of advancing the paginator past one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Another page must be fetched from the new cursor.
    Continue,
    /// The last page has been seen.
    Finished,
}

/// Pagination state for one fetch.
#[derive(Debug, Clone)]
pub struct Paginator {
    cursor: Option<String>,
    pages: usize,
    max_pages: usize,
}

impl Paginator {
    /// Creates a paginator at the first page. At least one page is always allowed.
    #[must_use]
    pub fn new(max_pages: usize) -> Self {
        Self {
            cursor: None,
            pages: 0,
            max_pages: max_pages.max(1),
        }
    }

    /// Cursor to request the next page after.
    #[must_use]
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Number of pages consumed so far.
    #[must_use]
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Records one fetched page.
    ///
    /// # Errors
    ///
    /// Returns [`PaginationError::Overrun`] if the page announces a successor
    /// but the maximum number of pages has been consumed.
    pub fn advance(&mut self, info: &PageInfo) -> Result<Step, PaginationError> {
        self.pages += 1;

        if !info.has_next_page {
            return Ok(Step::Finished);
        }

        if self.pages >= self.max_pages {
            return Err(PaginationError::Overrun {
                max_pages: self.max_pages,
            });
        }

        self.cursor.clone_from(&info.end_cursor);
        Ok(Step::Continue)
    }
}

/// Fetches every page of `query`, returning all items in order.
///
/// Any failure aborts the whole fetch; partial results are discarded.
///
/// # Errors
///
/// Returns an error if a page query fails or pagination overruns `max_pages`.
pub async fn fetch_all(
    executor: &Executor,
    query: &PageQuery,
    max_pages: usize,
) -> Result<Vec<Item>, PaginationError> {
    let mut paginator = Paginator::new(max_pages);
    let mut items = Vec::new();

    loop {
        let page_query = query.after(paginator.cursor().map(str::to_string));
        let Page { nodes, page_info } = executor.execute(&page_query).await?.into_page();
        items.extend(nodes);

        match paginator.advance(&page_info)? {
            Step::Finished => {
                tracing::debug!(pages = paginator.pages(), fetched = items.len(), "Fetched all pages");
                return Ok(items);
            }
            Step::Continue => {
                tracing::debug!(page = paginator.pages(), fetched = items.len(), "Fetched page");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Target;
    use crate::executor::DEFAULT_QUERY_TIMEOUT;
    use crate::github::{Collection, ItemState, TransportError};
    use crate::testing::{page_json, FnTransport};
    use serde_json::Value;

    fn info(has_next_page: bool, cursor: &str) -> PageInfo {
        PageInfo {
            end_cursor: Some(cursor.to_string()),
            has_next_page,
        }
    }

    fn open_issues() -> PageQuery {
        PageQuery::new(
            Collection::Issues,
            &Target::new("grafana", "loki"),
            &[ItemState::Open],
        )
    }

    #[test]
    fn test_paginator_starts_without_cursor() {
        let paginator = Paginator::new(10);
        assert_eq!(paginator.cursor(), None);
        assert_eq!(paginator.pages(), 0);
    }

    #[test]
    fn test_paginator_advances_cursor() {
        let mut paginator = Paginator::new(10);
        assert_eq!(paginator.advance(&info(true, "a")).unwrap(), Step::Continue);
        assert_eq!(paginator.cursor(), Some("a"));
        assert_eq!(paginator.advance(&info(true, "b")).unwrap(), Step::Continue);
        assert_eq!(paginator.cursor(), Some("b"));
        assert_eq!(paginator.advance(&info(false, "c")).unwrap(), Step::Finished);
        assert_eq!(paginator.pages(), 3);
    }

    #[test]
    fn test_paginator_overrun_at_max() {
        let mut paginator = Paginator::new(3);
        assert_eq!(paginator.advance(&info(true, "a")).unwrap(), Step::Continue);
        assert_eq!(paginator.advance(&info(true, "b")).unwrap(), Step::Continue);

        let result = paginator.advance(&info(true, "c"));
        assert!(matches!(result, Err(PaginationError::Overrun { max_pages: 3 })));
    }

    #[test]
    fn test_paginator_last_page_at_max_finishes() {
        let mut paginator = Paginator::new(2);
        assert_eq!(paginator.advance(&info(true, "a")).unwrap(), Step::Continue);
        assert_eq!(paginator.advance(&info(false, "b")).unwrap(), Step::Finished);
    }

    #[test]
    fn test_paginator_allows_at_least_one_page() {
        let mut paginator = Paginator::new(0);
        assert_eq!(paginator.advance(&info(false, "a")).unwrap(), Step::Finished);
    }

    #[tokio::test]
    async fn test_fetch_all_accumulates_pages() {
        let transport = FnTransport::new(|call, _| {
            Ok(match call {
                0 => page_json(100, true, "p1", 1),
                1 => page_json(100, true, "p2", 1),
                _ => page_json(37, false, "p3", 1),
            })
        });
        let executor = Executor::new(transport.clone(), DEFAULT_QUERY_TIMEOUT).unwrap();

        let items = fetch_all(&executor, &open_issues(), DEFAULT_MAX_PAGES)
            .await
            .unwrap();

        assert_eq!(items.len(), 237);
        assert_eq!(transport.calls(), 3);
        assert_eq!(items[0].id, "p1-0");
        assert_eq!(items[236].id, "p3-36");
    }

    #[tokio::test]
    async fn test_fetch_all_follows_end_cursor() {
        let transport = FnTransport::new(|call, _| {
            Ok(match call {
                0 => page_json(1, true, "first", 1),
                _ => page_json(1, false, "second", 1),
            })
        });
        let executor = Executor::new(transport.clone(), DEFAULT_QUERY_TIMEOUT).unwrap();
        fetch_all(&executor, &open_issues(), DEFAULT_MAX_PAGES)
            .await
            .unwrap();

        let cursors: Vec<Value> = transport
            .variables()
            .into_iter()
            .map(|v| v["cursor"].clone())
            .collect();
        assert_eq!(cursors, vec![Value::Null, Value::from("first")]);
    }

    #[tokio::test]
    async fn test_fetch_all_safety_valve() {
        let transport = FnTransport::new(|call, _| Ok(page_json(100, true, &format!("c{call}"), 1)));
        let executor = Executor::new(transport.clone(), DEFAULT_QUERY_TIMEOUT).unwrap();

        let result = fetch_all(&executor, &open_issues(), 5).await;

        assert!(matches!(result, Err(PaginationError::Overrun { max_pages: 5 })));
        assert_eq!(transport.calls(), 5);
    }

    #[tokio::test]
    async fn test_fetch_all_aborts_on_page_failure() {
        let transport = FnTransport::new(|call, _| match call {
            0 => Ok(page_json(100, true, "p1", 1)),
            _ => Err(TransportError::MissingData),
        });
        let executor = Executor::new(transport.clone(), DEFAULT_QUERY_TIMEOUT).unwrap();

        let result = fetch_all(&executor, &open_issues(), DEFAULT_MAX_PAGES).await;

        assert!(matches!(
            result,
            Err(PaginationError::Execute(ExecuteError::Transport(_)))
        ));
        assert_eq!(transport.calls(), 2);
    }
}

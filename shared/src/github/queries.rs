//! GraphQL queries against a repository's issues and pull requests.
//!
//! Issues and pull requests are selected under the alias `collection`, so both
//! kinds deserialize into the same response types.

use crate::config::Target;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum page size accepted by the GitHub GraphQL API.
pub const PAGE_SIZE: u32 = 100;

const ISSUES_PAGE: &str = "query($owner: String!, $repo: String!, $states: [IssueState!], $cursor: String, $limit: Int!) {
  rateLimit { remaining }
  repository(owner: $owner, name: $repo) {
    collection: issues(states: $states, first: $limit, after: $cursor) {
      nodes { id createdAt closedAt }
      pageInfo { endCursor hasNextPage }
    }
  }
}";

const PULL_REQUESTS_PAGE: &str = "query($owner: String!, $repo: String!, $states: [PullRequestState!], $cursor: String, $limit: Int!) {
  rateLimit { remaining }
  repository(owner: $owner, name: $repo) {
    collection: pullRequests(states: $states, first: $limit, after: $cursor) {
      nodes { id createdAt closedAt }
      pageInfo { endCursor hasNextPage }
    }
  }
}";

const ISSUES_COUNT: &str = "query($owner: String!, $repo: String!, $states: [IssueState!]) {
  rateLimit { remaining }
  repository(owner: $owner, name: $repo) {
    collection: issues(states: $states) { totalCount }
  }
}";

const PULL_REQUESTS_COUNT: &str = "query($owner: String!, $repo: String!, $states: [PullRequestState!]) {
  rateLimit { remaining }
  repository(owner: $owner, name: $repo) {
    collection: pullRequests(states: $states) { totalCount }
  }
}";

/// Exposes the rate-limit budget left after a query.
///
/// Every query response implements this so the executor can inspect it
/// without knowing the response shape.
pub trait RateLimitRemaining {
    /// Remaining calls reported by the API.
    fn rate_limit_remaining(&self) -> i64;
}

/// A GraphQL query: its variables serialize from `self`.
pub trait Query: Serialize + Send + Sync {
    /// Shape of the `data` object returned for this query.
    type Response: DeserializeOwned + RateLimitRemaining + Send;

    /// The GraphQL document.
    fn document(&self) -> &'static str;
}

/// Which repository collection a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Issues.
    Issues,
    /// Pull requests.
    PullRequests,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Issues => write!(f, "issues"),
            Self::PullRequests => write!(f, "pull requests"),
        }
    }
}

/// State filter for issues and pull requests.
///
/// `Merged` only applies to pull requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemState {
    /// Open.
    Open,
    /// Closed (for pull requests: closed without merging).
    Closed,
    /// Merged pull request.
    Merged,
}

impl ItemState {
    /// Lowercase label value used in exported metrics.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Merged => "merged",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Rate-limit block returned with every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimit {
    /// Calls left in the current window.
    pub remaining: i64,
}

/// `repository { collection: ... }` wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct Repository<T> {
    /// The aliased issues or pull requests connection.
    pub collection: T,
}

/// An issue or pull request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Opaque node id.
    pub id: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Closing time, set once the item is closed.
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

/// Cursor information for one page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Cursor of the last item in the page.
    pub end_cursor: Option<String>,
    /// Whether another page follows.
    pub has_next_page: bool,
}

/// One page of items.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Items in this page.
    pub nodes: Vec<Item>,
    /// Pagination state.
    pub page_info: PageInfo,
}

/// Response to a [`PageQuery`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse {
    /// Rate-limit state after the call.
    pub rate_limit: RateLimit,
    /// The requested page.
    pub repository: Repository<Page>,
}

impl PageResponse {
    /// Consumes the response, returning the page.
    #[must_use]
    pub fn into_page(self) -> Page {
        self.repository.collection
    }
}

impl RateLimitRemaining for PageResponse {
    fn rate_limit_remaining(&self) -> i64 {
        self.rate_limit.remaining
    }
}

/// Fetches one page of issues or pull requests.
#[derive(Debug, Clone, Serialize)]
pub struct PageQuery {
    #[serde(skip)]
    collection: Collection,
    owner: String,
    repo: String,
    states: Vec<ItemState>,
    cursor: Option<String>,
    limit: u32,
}

impl PageQuery {
    /// Creates a query for the first page.
    #[must_use]
    pub fn new(collection: Collection, target: &Target, states: &[ItemState]) -> Self {
        Self {
            collection,
            owner: target.owner.clone(),
            repo: target.repo.clone(),
            states: states.to_vec(),
            cursor: None,
            limit: PAGE_SIZE,
        }
    }

    /// Returns a copy of this query starting after `cursor`.
    #[must_use]
    pub fn after(&self, cursor: Option<String>) -> Self {
        Self {
            cursor,
            ..self.clone()
        }
    }

    /// Returns the current cursor.
    #[must_use]
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }
}

impl Query for PageQuery {
    type Response = PageResponse;

    fn document(&self) -> &'static str {
        match self.collection {
            Collection::Issues => ISSUES_PAGE,
            Collection::PullRequests => PULL_REQUESTS_PAGE,
        }
    }
}

/// `totalCount` of a connection.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalCount {
    /// Number of matching items.
    pub total_count: u64,
}

/// Response to a [`CountQuery`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountResponse {
    /// Rate-limit state after the call.
    pub rate_limit: RateLimit,
    /// The requested count.
    pub repository: Repository<TotalCount>,
}

impl CountResponse {
    /// Returns the number of matching items.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.repository.collection.total_count
    }
}

impl RateLimitRemaining for CountResponse {
    fn rate_limit_remaining(&self) -> i64 {
        self.rate_limit.remaining
    }
}

/// Counts issues or pull requests in the given states.
#[derive(Debug, Clone, Serialize)]
pub struct CountQuery {
    #[serde(skip)]
    collection: Collection,
    owner: String,
    repo: String,
    states: Vec<ItemState>,
}

impl CountQuery {
    /// Creates a count query for a single state.
    #[must_use]
    pub fn new(collection: Collection, target: &Target, state: ItemState) -> Self {
        Self {
            collection,
            owner: target.owner.clone(),
            repo: target.repo.clone(),
            states: vec![state],
        }
    }
}

impl Query for CountQuery {
    type Response = CountResponse;

    fn document(&self) -> &'static str {
        match self.collection {
            Collection::Issues => ISSUES_COUNT,
            Collection::PullRequests => PULL_REQUESTS_COUNT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target() -> Target {
        Target::new("grafana", "loki")
    }

    #[test]
    fn test_page_query_variables() {
        let query = PageQuery::new(Collection::Issues, &target(), &[ItemState::Open]);
        let variables = serde_json::to_value(&query).unwrap();

        assert_eq!(
            variables,
            json!({
                "owner": "grafana",
                "repo": "loki",
                "states": ["OPEN"],
                "cursor": null,
                "limit": 100
            })
        );
    }

    #[test]
    fn test_page_query_after_cursor() {
        let query = PageQuery::new(Collection::PullRequests, &target(), &[ItemState::Open]);
        let next = query.after(Some("Y3Vyc29y".to_string()));

        assert_eq!(query.cursor(), None);
        assert_eq!(next.cursor(), Some("Y3Vyc29y"));
        assert_eq!(serde_json::to_value(&next).unwrap()["cursor"], "Y3Vyc29y");
    }

    #[test]
    fn test_documents_follow_collection() {
        let issues = PageQuery::new(Collection::Issues, &target(), &[ItemState::Open]);
        let pulls = PageQuery::new(Collection::PullRequests, &target(), &[ItemState::Open]);
        assert!(issues.document().contains("issues(states: $states"));
        assert!(pulls.document().contains("pullRequests(states: $states"));

        let count = CountQuery::new(Collection::PullRequests, &target(), ItemState::Merged);
        assert!(count.document().contains("totalCount"));
        assert!(count.document().contains("[PullRequestState!]"));
    }

    #[test]
    fn test_count_query_variables() {
        let query = CountQuery::new(Collection::Issues, &target(), ItemState::Closed);
        let variables = serde_json::to_value(&query).unwrap();
        assert_eq!(variables["states"], json!(["CLOSED"]));
        assert!(variables.get("cursor").is_none());
    }

    #[test]
    fn test_page_response_deserialization() {
        let response: PageResponse = serde_json::from_value(json!({
            "rateLimit": {"remaining": 4321},
            "repository": {
                "collection": {
                    "nodes": [
                        {"id": "I_1", "createdAt": "2024-01-01T00:00:00Z", "closedAt": null},
                        {"id": "I_2", "createdAt": "2024-01-02T00:00:00Z", "closedAt": "2024-01-03T12:00:00Z"}
                    ],
                    "pageInfo": {"endCursor": "abc", "hasNextPage": true}
                }
            }
        }))
        .unwrap();

        assert_eq!(response.rate_limit_remaining(), 4321);
        let page = response.into_page();
        assert_eq!(page.nodes.len(), 2);
        assert!(page.nodes[0].closed_at.is_none());
        assert!(page.nodes[1].closed_at.is_some());
        assert_eq!(page.page_info.end_cursor.as_deref(), Some("abc"));
        assert!(page.page_info.has_next_page);
    }

    #[test]
    fn test_count_response_deserialization() {
        let response: CountResponse = serde_json::from_value(json!({
            "rateLimit": {"remaining": 0},
            "repository": {"collection": {"totalCount": 1234}}
        }))
        .unwrap();

        assert_eq!(response.total_count(), 1234);
        assert_eq!(response.rate_limit_remaining(), 0);
    }

    #[test]
    fn test_item_state_labels() {
        assert_eq!(ItemState::Open.as_label(), "open");
        assert_eq!(ItemState::Closed.to_string(), "closed");
        assert_eq!(
            serde_json::to_value(ItemState::Merged).unwrap(),
            json!("MERGED")
        );
    }
}

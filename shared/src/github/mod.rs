//! GitHub GraphQL access: the transport and the queries beats issue.

pub mod client;
pub mod queries;

pub use client::{GithubClient, Transport, TransportError, DEFAULT_GITHUB_URL};
pub use queries::{
    Collection, CountQuery, CountResponse, Item, ItemState, Page, PageInfo, PageQuery,
    PageResponse, Query, RateLimit, RateLimitRemaining, PAGE_SIZE,
};

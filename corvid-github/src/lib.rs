//! Corvid GitHub - GitHub integration for the corvid pull-request reviewer
//!
//! Implements the core's platform adapter over the GitHub REST API:
//! change-set fetching, content access and comment publishing.

pub mod adapter;
pub mod client;
pub mod error;

pub use adapter::GitHubAdapter;
pub use client::{parse_repo, GitHubClient};
pub use error::{Error, Result};

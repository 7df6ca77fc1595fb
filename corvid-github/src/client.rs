//! GitHub API client using octocrab

use octocrab::Octocrab;
use tracing::{debug, info};

use crate::{Error, Result};

/// Environment variable holding the API token
const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// GitHub API client bound to one repository
pub struct GitHubClient {
    client: Octocrab,
    owner: String,
    repo: String,
}

impl GitHubClient {
    /// Create a client for `owner/repo`, reading the token from
    /// `GITHUB_TOKEN`
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Result<Self> {
        let owner = owner.into();
        let repo = repo.into();

        let token =
            std::env::var(TOKEN_ENV).map_err(|_| Error::MissingEnv(TOKEN_ENV.to_string()))?;

        let client = Octocrab::builder()
            .personal_token(token)
            .build()
            .map_err(|e| Error::Auth(format!("Failed to create GitHub client: {}", e)))?;

        info!(owner = %owner, repo = %repo, "Created GitHub client");

        Ok(Self {
            client,
            owner,
            repo,
        })
    }

    /// Create a client from a repository reference
    ///
    /// Supports `owner/repo`, `https://github.com/owner/repo` and
    /// `git@github.com:owner/repo.git`.
    pub fn from_repo(reference: &str) -> Result<Self> {
        let (owner, repo) = parse_repo(reference)?;
        Self::new(owner, repo)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// The underlying octocrab client
    pub fn client(&self) -> &Octocrab {
        &self.client
    }

    /// Verify credentials and repository access before a run
    pub async fn test_connection(&self) -> Result<()> {
        debug!(owner = %self.owner, repo = %self.repo, "Testing GitHub connection");

        self.client
            .repos(&self.owner, &self.repo)
            .get()
            .await
            .map_err(|e| match &e {
                octocrab::Error::GitHub { source, .. }
                    if source.message.contains("Bad credentials") =>
                {
                    Error::Auth("Invalid GitHub token".to_string())
                }
                octocrab::Error::GitHub { source, .. }
                    if source.message.contains("Not Found") =>
                {
                    Error::Other(format!(
                        "Repository {}/{} not found or not accessible",
                        self.owner, self.repo
                    ))
                }
                _ => Error::Api(e),
            })?;

        info!("GitHub connection successful");
        Ok(())
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

/// Parse a repository reference into owner and repo
pub fn parse_repo(reference: &str) -> Result<(String, String)> {
    // HTTPS URL
    if reference.starts_with("https://") || reference.starts_with("http://") {
        let parsed = url::Url::parse(reference).map_err(|e| Error::Parse(e.to_string()))?;
        let mut segments = parsed
            .path()
            .trim_matches('/')
            .trim_end_matches(".git")
            .split('/');
        if let (Some(owner), Some(repo)) = (segments.next(), segments.next()) {
            if !owner.is_empty() && !repo.is_empty() {
                return Ok((owner.to_string(), repo.to_string()));
            }
        }
        return Err(Error::Parse(format!("Invalid GitHub URL: {}", reference)));
    }

    // SSH URL: git@github.com:owner/repo.git
    if let Some(path) = reference.strip_prefix("git@").and_then(|r| r.split(':').nth(1)) {
        let path = path.trim_end_matches(".git");
        let mut segments = path.split('/');
        if let (Some(owner), Some(repo)) = (segments.next(), segments.next()) {
            if !owner.is_empty() && !repo.is_empty() {
                return Ok((owner.to_string(), repo.to_string()));
            }
        }
        return Err(Error::Parse(format!("Invalid SSH URL: {}", reference)));
    }

    // Shorthand: owner/repo
    let parts: Vec<&str> = reference.split('/').collect();
    if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
        return Ok((
            parts[0].to_string(),
            parts[1].trim_end_matches(".git").to_string(),
        ));
    }

    Err(Error::Parse(format!(
        "Invalid repository format: {}. Expected owner/repo",
        reference
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shorthand() {
        let (owner, repo) = parse_repo("corvid-review/corvid").unwrap();
        assert_eq!(owner, "corvid-review");
        assert_eq!(repo, "corvid");
    }

    #[test]
    fn test_parse_https_url() {
        let (owner, repo) = parse_repo("https://github.com/owner/repo").unwrap();
        assert_eq!((owner.as_str(), repo.as_str()), ("owner", "repo"));
    }

    #[test]
    fn test_parse_https_url_with_git_suffix() {
        let (_, repo) = parse_repo("https://github.com/owner/repo.git").unwrap();
        assert_eq!(repo, "repo");
    }

    #[test]
    fn test_parse_ssh_url() {
        let (owner, repo) = parse_repo("git@github.com:owner/repo.git").unwrap();
        assert_eq!((owner.as_str(), repo.as_str()), ("owner", "repo"));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_repo("plainword").is_err());
        assert!(parse_repo("too/many/parts").is_err());
        assert!(parse_repo("https://github.com/").is_err());
    }
}

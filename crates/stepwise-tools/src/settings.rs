//! Credentials and locations the built-in tools read at call time.

use std::path::PathBuf;

/// Settings shared by every tool instance of a worker process.
///
/// Missing credentials are not an error here; a tool that needs one reports
/// a permission failure when the runtime calls it.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSettings {
    /// Sandbox root of the file tools and attachment lookups
    pub resources_dir: PathBuf,
    /// Maildir root holding `inbox` and `outbox`
    pub maildir: PathBuf,
    /// Sender address of outgoing e-mail
    pub email_address: Option<String>,
    pub google_api_key: Option<String>,
    pub google_search_engine_id: Option<String>,
    pub google_base_url: String,
    pub jira_url: Option<String>,
    pub jira_user: Option<String>,
    pub jira_token: Option<String>,
    pub github_token: Option<String>,
    pub github_base_url: String,
    /// Per-request timeout of the network tools, in seconds
    pub http_timeout_secs: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            resources_dir: PathBuf::from("resources"),
            maildir: PathBuf::from("maildir"),
            email_address: None,
            google_api_key: None,
            google_search_engine_id: None,
            google_base_url: "https://www.googleapis.com".to_string(),
            jira_url: None,
            jira_user: None,
            jira_token: None,
            github_token: None,
            github_base_url: "https://api.github.com".to_string(),
            http_timeout_secs: 30,
        }
    }
}

impl ToolSettings {
    pub fn with_resources_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resources_dir = dir.into();
        self
    }

    pub fn with_maildir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.maildir = dir.into();
        self
    }

    pub fn with_email_address(mut self, address: impl Into<String>) -> Self {
        self.email_address = Some(address.into());
        self
    }

    pub fn with_google(mut self, api_key: impl Into<String>, search_engine_id: impl Into<String>) -> Self {
        self.google_api_key = Some(api_key.into());
        self.google_search_engine_id = Some(search_engine_id.into());
        self
    }

    pub fn with_jira(mut self, url: impl Into<String>, user: impl Into<String>, token: impl Into<String>) -> Self {
        self.jira_url = Some(url.into());
        self.jira_user = Some(user.into());
        self.jira_token = Some(token.into());
        self
    }

    pub fn with_github_token(mut self, token: impl Into<String>) -> Self {
        self.github_token = Some(token.into());
        self
    }
}

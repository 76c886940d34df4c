use std::fmt;
use std::time::Duration;

/// Which namespace path arguments are resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Root {
    /// The application's private folder.
    #[default]
    AppFolder,
    /// The user's whole drive.
    Kuaipan,
}

impl Root {
    pub fn as_str(&self) -> &'static str {
        match self {
            Root::AppFolder => "app_folder",
            Root::Kuaipan => "kuaipan",
        }
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the Kuaipan client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for metadata and file operations.
    pub api_endpoint: String,

    /// Base URL for downloads and upload location.
    pub content_endpoint: String,

    /// Base URL for thumbnails and document conversion.
    pub conv_endpoint: String,

    /// Base URL for the OAuth token exchange.
    pub auth_endpoint: String,

    /// Page the user visits to authorise a request token.
    pub authorize_url: String,

    /// Namespace path arguments refer to.
    pub root: Root,

    /// `User-Agent` sent with every request.
    pub user_agent: String,

    /// Transport deadline. `None` leaves the reqwest default in place.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_endpoint: "http://openapi.kuaipan.cn".to_string(),
            content_endpoint: "http://api-content.dfs.kuaipan.cn".to_string(),
            conv_endpoint: "http://conv.kuaipan.cn".to_string(),
            auth_endpoint: "https://openapi.kuaipan.cn".to_string(),
            authorize_url: "https://www.kuaipan.cn/api.php?ac=open&op=authorise".to_string(),
            root: Root::AppFolder,
            user_agent: concat!("kuaipan-rs/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: None,
        }
    }
}

impl ClientConfig {
    /// Points every service endpoint at one base URL.
    ///
    /// Useful for proxies and for tests against a local mock server.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.api_endpoint = endpoint.clone();
        self.content_endpoint = endpoint.clone();
        self.conv_endpoint = endpoint.clone();
        self.auth_endpoint = endpoint;
        self
    }

    pub fn with_api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api_endpoint = endpoint.into();
        self
    }

    pub fn with_content_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.content_endpoint = endpoint.into();
        self
    }

    pub fn with_conv_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.conv_endpoint = endpoint.into();
        self
    }

    pub fn with_auth_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.auth_endpoint = endpoint.into();
        self
    }

    /// Sets the namespace path arguments are resolved against.
    pub fn with_root(mut self, root: Root) -> Self {
        self.root = root;
        self
    }

    /// Sets the `User-Agent` header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets a transport-level deadline for every request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

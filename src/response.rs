use serde::{Deserialize, Deserializer};

/// Temporary token returned by the first handshake step.
///
/// The `Debug` implementation redacts `oauth_token_secret`.
#[derive(Clone, Deserialize)]
pub struct RequestTokenResponse {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    #[serde(default)]
    pub oauth_callback_confirmed: bool,
}

impl std::fmt::Debug for RequestTokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestTokenResponse")
            .field("oauth_token", &self.oauth_token)
            .field("oauth_token_secret", &"****")
            .field("oauth_callback_confirmed", &self.oauth_callback_confirmed)
            .finish()
    }
}

/// Final token returned by the access-token step.
///
/// The `Debug` implementation redacts `oauth_token_secret`.
#[derive(Clone, Deserialize)]
pub struct AccessTokenResponse {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    pub user_id: i64,
    pub charged_dir: String,
}

impl std::fmt::Debug for AccessTokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenResponse")
            .field("oauth_token", &self.oauth_token)
            .field("oauth_token_secret", &"****")
            .field("user_id", &self.user_id)
            .field("charged_dir", &self.charged_dir)
            .finish()
    }
}

/// Account owner and quota.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfo {
    pub user_id: i64,
    pub user_name: String,
    pub max_file_size: i64,
    pub quota_total: i64,
    pub quota_used: i64,
    /// `None` when the server omits it.
    #[serde(default)]
    pub quota_recycled: Option<i64>,
}

/// Metadata of a file or folder, with children when listed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirInfo {
    pub path: String,
    pub root: String,
    pub hash: String,
    pub file_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub size: Option<i64>,
    pub create_time: String,
    pub modify_time: String,
    pub name: String,
    pub rev: String,
    pub is_deleted: bool,
    pub files: Vec<FileInfo>,
}

/// One entry of a folder listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileInfo {
    pub file_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub size: i64,
    pub create_time: String,
    pub modify_time: String,
    pub name: String,
    pub is_deleted: bool,
    pub rev: String,
}

/// A public share link.
#[derive(Debug, Clone, Deserialize)]
pub struct ShareInfo {
    pub url: String,
    #[serde(default)]
    pub access_code: String,
}

/// Result of creating a folder.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateResult {
    pub file_id: String,
    pub path: String,
    pub root: String,
}

/// A copy reference usable with [`crate::Client::copy`].
#[derive(Debug, Clone, Deserialize)]
pub struct CopyRefResult {
    pub copy_ref: String,
    pub expires: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadLocate {
    pub url: String,
}

/// Result of a completed upload.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResult {
    pub file_id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub rev: String,
    /// Sent as a JSON string by the server; numbers are accepted too.
    #[serde(deserialize_with = "lenient_u64")]
    pub size: u64,
    #[serde(default)]
    pub create_time: String,
    #[serde(default)]
    pub modify_time: String,
    #[serde(default)]
    pub is_deleted: bool,
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(u64),
    }

    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Number(n) => Ok(n),
        StringOrNumber::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Kuaipan API error response body.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub msg: String,
}

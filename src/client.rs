use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::credential::{ChainProvider, Credential, CredentialProvider};
use crate::error::Result;
use crate::exec::{handle_empty_response, handle_response};
use crate::http::HttpInvoker;
use crate::response::{
    AccessTokenResponse, AccountInfo, CopyRefResult, CreateResult, DirInfo, RequestTokenResponse,
    ShareInfo, UploadLocate, UploadResult,
};
use crate::sign::{Params, Signer, percent_encode};
use crate::upload::{UploadBody, base_name, random_boundary};

/// Optional parameters for [`Client::metadata`].
#[derive(Debug, Clone, Default)]
pub struct MetadataOptions {
    /// Include the children of a folder.
    pub list: Option<bool>,
    /// Maximum number of children returned.
    pub file_limit: Option<u32>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    /// Only list files with these extensions, comma separated.
    pub filter_ext: Option<String>,
    /// One of `date`, `name`, `size`, optionally suffixed with `_rev`.
    pub sort_by: Option<String>,
}

impl MetadataOptions {
    pub(crate) fn to_params(&self) -> Params {
        let mut params = Params::new();
        if let Some(list) = self.list {
            params.insert("list".into(), list.to_string());
        }
        if let Some(limit) = self.file_limit {
            params.insert("file_limit".into(), limit.to_string());
        }
        if let Some(page) = self.page {
            params.insert("page".into(), page.to_string());
        }
        if let Some(size) = self.page_size {
            params.insert("page_size".into(), size.to_string());
        }
        if let Some(ref ext) = self.filter_ext {
            params.insert("filter_ext".into(), ext.clone());
        }
        if let Some(ref sort) = self.sort_by {
            params.insert("sort_by".into(), sort.clone());
        }
        params
    }
}

/// Joins a base URL and a path with exactly one `/` between them.
pub(crate) fn join_url(host: &str, path: &str) -> String {
    if host.is_empty() || path.is_empty() {
        return format!("{}{}", host, path);
    }
    match (host.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", host, &path[1..]),
        (false, false) => format!("{}/{}", host, path),
        _ => format!("{}{}", host, path),
    }
}

/// Resolves the destination name when copying `from` to `to`.
///
/// An empty `to` yields the base name of `from`; a `to` ending in `/` is
/// treated as a folder and gets the base name appended.
pub fn local_target_name(from: &str, to: &str) -> String {
    if to.is_empty() {
        base_name(from).to_string()
    } else if to.ends_with('/') {
        format!("{}{}", to, base_name(from))
    } else {
        to.to_string()
    }
}

fn param_map<const N: usize>(pairs: [(&str, String); N]) -> Params {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn title_case_bool(b: bool) -> &'static str {
    if b { "True" } else { "False" }
}

/// Blocking client for the Kuaipan open API.
///
/// Handshake methods take `&mut self`; everything else takes `&self`, so a
/// fully authorised client can be shared across threads.
pub struct Client {
    http: HttpInvoker,
    config: ClientConfig,
    credential: Credential,
    signer: Signer,
    upload_uri: Mutex<Option<String>>,
    user_id: Option<i64>,
    charged_dir: Option<String>,
}

impl Client {
    /// Creates a new client with an explicit credential.
    pub fn new(credential: Credential) -> Result<Self> {
        Self::with_config(credential, ClientConfig::default())
    }

    /// Creates a new client with an explicit credential and custom configuration.
    pub fn with_config(credential: Credential, config: ClientConfig) -> Result<Self> {
        let http = HttpInvoker::new(&config)?;
        Ok(Self {
            http,
            config,
            credential,
            signer: Signer::new(),
            upload_uri: Mutex::new(None),
            user_id: None,
            charged_dir: None,
        })
    }

    /// Creates a new client using the default credential chain (env vars → profile file).
    pub fn from_env() -> Result<Self> {
        let credential = ChainProvider::default_chain().resolve()?;
        Self::new(credential)
    }

    /// Replaces the signer, e.g. with one backed by a seeded generator.
    pub fn with_signer(mut self, signer: Signer) -> Self {
        self.signer = signer;
        self
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// User id reported by the access-token step.
    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    /// Charged directory reported by the access-token step.
    pub fn charged_dir(&self) -> Option<&str> {
        self.charged_dir.as_deref()
    }

    /// Step one of the handshake: obtains a temporary request token.
    ///
    /// The call is signed with the consumer pair only. On success the token
    /// replaces the access pair held by this client; on failure the client is
    /// left untouched. Send the user to [`Client::authorize_url`] afterwards.
    pub fn request_token(&mut self, callback: Option<&str>) -> Result<RequestTokenResponse> {
        let consumer = Credential::new(
            self.credential.consumer_key.clone(),
            self.credential.consumer_secret.clone(),
        );

        let mut params = Params::new();
        if let Some(callback) = callback.filter(|c| !c.is_empty()) {
            params.insert("oauth_callback".into(), callback.to_string());
        }
        let uri = join_url(&self.config.auth_endpoint, "/open/requestToken");
        let token: RequestTokenResponse = self.signed_get_with(&consumer, &uri, params)?;

        self.credential
            .set_access(token.oauth_token.clone(), token.oauth_token_secret.clone());
        Ok(token)
    }

    /// Page where the user authorises the current request token.
    pub fn authorize_url(&self) -> String {
        format!(
            "{}&oauth_token={}",
            self.config.authorize_url,
            percent_encode(&self.credential.access_key)
        )
    }

    /// Final handshake step: exchanges the authorised request token.
    ///
    /// `verifier` may be omitted when the application was already authorised.
    pub fn access_token(&mut self, verifier: Option<&str>) -> Result<AccessTokenResponse> {
        let mut params = Params::new();
        if let Some(verifier) = verifier.filter(|v| !v.is_empty()) {
            params.insert("oauth_verifier".into(), verifier.to_string());
        }
        let uri = join_url(&self.config.auth_endpoint, "/open/accessToken");
        let token: AccessTokenResponse = self.signed_get(&uri, params)?;

        self.credential
            .set_access(token.oauth_token.clone(), token.oauth_token_secret.clone());
        self.user_id = Some(token.user_id);
        self.charged_dir = Some(token.charged_dir.clone());
        Ok(token)
    }

    /// Signs `params` for `method uri` and renders the request URL.
    pub fn signed_url(&self, method: &str, uri: &str, params: Params) -> String {
        self.signer.signed_url(&self.credential, method, uri, params)
    }

    /// Signed GET decoding the JSON body into `T`.
    pub fn signed_get<T: DeserializeOwned>(&self, uri: &str, params: Params) -> Result<T> {
        self.signed_get_with(&self.credential, uri, params)
    }

    fn signed_get_with<T: DeserializeOwned>(
        &self,
        credential: &Credential,
        uri: &str,
        params: Params,
    ) -> Result<T> {
        let url = self.signer.signed_url(credential, "GET", uri, params);
        let response = self.http.get(&url)?;
        handle_response(response.status, &response.body)
    }

    /// Signed GET whose success body is discarded.
    pub fn signed_get_unit(&self, uri: &str, params: Params) -> Result<()> {
        let url = self.signed_url("GET", uri, params);
        let response = self.http.get(&url)?;
        handle_empty_response(response.status, &response.body)
    }

    /// Signed GET streaming the raw body into `writer`, with isolated cookies.
    pub fn signed_get_to<W: Write + ?Sized>(
        &self,
        uri: &str,
        params: Params,
        writer: &mut W,
    ) -> Result<u64> {
        let url = self.signed_url("GET", uri, params);
        self.http.download(&url, writer)
    }

    /// Signed GET returning the raw body, with isolated cookies.
    pub fn signed_get_bytes(&self, uri: &str, params: Params) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.signed_get_to(uri, params, &mut buf)?;
        Ok(buf)
    }

    /// Asks the service which host accepts uploads for this account.
    pub fn upload_locate(&self) -> Result<String> {
        let uri = join_url(&self.config.content_endpoint, "/1/fileops/upload_locate");
        let locate: UploadLocate = self.signed_get(&uri, Params::new())?;
        Ok(join_url(&locate.url, "/1/fileops/upload_file"))
    }

    /// Uploads `length` bytes from `payload` to `target` as `path`.
    ///
    /// `root`, `path` and `overwrite` travel as signed query parameters; the
    /// multipart body holds only the file.
    pub fn upload_to(
        &self,
        target: &str,
        path: &str,
        payload: impl Read + Send + 'static,
        length: u64,
        overwrite: bool,
    ) -> Result<UploadResult> {
        let body = UploadBody::new(path, payload, length, random_boundary(&self.signer))?;
        let params = param_map([
            ("overwrite", title_case_bool(overwrite).to_string()),
            ("root", self.config.root.to_string()),
            ("path", path.to_string()),
        ]);
        let url = self.signed_url("POST", target, params);
        let response = self.http.post_upload(&url, body)?;
        handle_response(response.status, &response.body)
    }

    /// The lock is held across the locate call, so concurrent first uploads
    /// wait for a single round trip instead of each locating the host.
    fn cached_upload_uri(&self) -> Result<String> {
        let mut slot = self.upload_uri.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(uri) = slot.as_ref() {
            return Ok(uri.clone());
        }
        let uri = self.upload_locate()?;
        *slot = Some(uri.clone());
        Ok(uri)
    }

    fn rooted(&self, base: &str, prefix: &str, path: &str) -> String {
        join_url(
            &join_url(base, &format!("{}/{}", prefix, self.config.root)),
            path,
        )
    }

    /// Queries the account owner and quota.
    pub fn account_info(&self) -> Result<AccountInfo> {
        let uri = join_url(&self.config.api_endpoint, "/1/account_info");
        self.signed_get(&uri, Params::new())
    }

    /// Fetches metadata of a file or folder.
    pub fn metadata(&self, path: &str, options: &MetadataOptions) -> Result<DirInfo> {
        let uri = self.rooted(&self.config.api_endpoint, "/1/metadata", path);
        self.signed_get(&uri, options.to_params())
    }

    /// Creates (or fetches) a share link for a file.
    pub fn share(
        &self,
        path: &str,
        display_name: Option<&str>,
        access_code: Option<&str>,
    ) -> Result<ShareInfo> {
        let mut params = Params::new();
        if let Some(name) = display_name.filter(|n| !n.is_empty()) {
            params.insert("name".into(), name.to_string());
        }
        if let Some(code) = access_code.filter(|c| !c.is_empty()) {
            params.insert("access_code".into(), code.to_string());
        }
        let uri = self.rooted(&self.config.api_endpoint, "/1/shares", path);
        self.signed_get(&uri, params)
    }

    pub fn create_folder(&self, path: &str) -> Result<CreateResult> {
        let uri = join_url(&self.config.api_endpoint, "/1/fileops/create_folder");
        let params = param_map([
            ("path", path.to_string()),
            ("root", self.config.root.to_string()),
        ]);
        self.signed_get(&uri, params)
    }

    /// Deletes a file or folder, optionally into the recycle bin.
    pub fn delete(&self, path: &str, to_recycle: bool) -> Result<()> {
        let uri = join_url(&self.config.api_endpoint, "/1/fileops/delete");
        let params = param_map([
            ("path", path.to_string()),
            ("root", self.config.root.to_string()),
            ("to_recycle", to_recycle.to_string()),
        ]);
        self.signed_get_unit(&uri, params)
    }

    pub fn move_item(&self, from_path: &str, to_path: &str) -> Result<()> {
        let uri = join_url(&self.config.api_endpoint, "/1/fileops/move");
        let params = param_map([
            ("from_path", from_path.to_string()),
            ("to_path", to_path.to_string()),
            ("root", self.config.root.to_string()),
        ]);
        self.signed_get_unit(&uri, params)
    }

    /// Copies from a path, or from a copy reference when `from_path` is `None`.
    pub fn copy(
        &self,
        from_path: Option<&str>,
        to_path: &str,
        copy_ref: Option<&str>,
    ) -> Result<()> {
        let uri = join_url(&self.config.api_endpoint, "/1/fileops/copy");
        let mut params = param_map([
            ("to_path", to_path.to_string()),
            ("root", self.config.root.to_string()),
        ]);
        if let Some(from) = from_path.filter(|f| !f.is_empty()) {
            params.insert("from_path".into(), from.to_string());
        }
        if let Some(reference) = copy_ref.filter(|r| !r.is_empty()) {
            params.insert("copy_ref".into(), reference.to_string());
        }
        self.signed_get_unit(&uri, params)
    }

    /// Creates a reference other accounts can copy from.
    pub fn copy_ref(&self, path: &str) -> Result<CopyRefResult> {
        let uri = self.rooted(&self.config.api_endpoint, "/1/copy_ref", path);
        self.signed_get(&uri, Params::new())
    }

    fn download_params(&self, path: &str) -> (String, Params) {
        let uri = join_url(&self.config.content_endpoint, "/1/fileops/download_file");
        let params = param_map([
            ("path", path.to_string()),
            ("root", self.config.root.to_string()),
        ]);
        (uri, params)
    }

    /// Downloads a file into memory.
    pub fn download(&self, path: &str) -> Result<Vec<u8>> {
        let (uri, params) = self.download_params(path);
        self.signed_get_bytes(&uri, params)
    }

    /// Streams a file into `writer`.
    pub fn download_to<W: Write + ?Sized>(&self, path: &str, writer: &mut W) -> Result<u64> {
        let (uri, params) = self.download_params(path);
        self.signed_get_to(&uri, params, writer)
    }

    /// Downloads `remote` to a local file named per [`local_target_name`].
    pub fn download_file(&self, remote: &str, local: &str) -> Result<PathBuf> {
        let target = PathBuf::from(local_target_name(remote, local));
        let mut file = File::create(&target)?;
        self.download_to(remote, &mut file)?;
        file.flush()?;
        Ok(target)
    }

    /// Fetches a thumbnail image of `path`.
    pub fn thumbnail(&self, path: &str, width: u32, height: u32) -> Result<Vec<u8>> {
        let uri = join_url(&self.config.conv_endpoint, "/1/fileops/thumbnail");
        let params = param_map([
            ("path", path.to_string()),
            ("root", self.config.root.to_string()),
            ("width", width.to_string()),
            ("height", height.to_string()),
        ]);
        self.signed_get_bytes(&uri, params)
    }

    /// Converts a document for preview.
    pub fn document_view(&self, path: &str, doc_type: &str, view: &str) -> Result<Vec<u8>> {
        let uri = join_url(&self.config.conv_endpoint, "/1/fileops/documentView");
        let params = param_map([
            ("path", path.to_string()),
            ("root", self.config.root.to_string()),
            ("type", doc_type.to_string()),
            ("view", view.to_string()),
        ]);
        self.signed_get_bytes(&uri, params)
    }

    /// Uploads from a reader of known length.
    ///
    /// The upload host is located once per client and reused.
    pub fn upload_from(
        &self,
        path: &str,
        payload: impl Read + Send + 'static,
        length: u64,
        overwrite: bool,
    ) -> Result<UploadResult> {
        let target = self.cached_upload_uri()?;
        self.upload_to(&target, path, payload, length, overwrite)
    }

    /// Uploads an in-memory buffer.
    pub fn upload(&self, path: &str, data: Vec<u8>, overwrite: bool) -> Result<UploadResult> {
        let length = data.len() as u64;
        self.upload_from(path, std::io::Cursor::new(data), length, overwrite)
    }

    /// Uploads a local file; see [`local_target_name`] for how `remote` is resolved.
    pub fn upload_file(&self, remote: &str, local: &str, overwrite: bool) -> Result<UploadResult> {
        let file = File::open(local)?;
        let length = file.metadata()?.len();
        let remote = local_target_name(local, remote);
        self.upload_from(&remote, file, length, overwrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn test_client() -> Client {
        Client::new(Credential::new("ck", "cs").with_access("tok", "ts"))
            .unwrap()
            .with_signer(Signer::with_rng(StepRng::new(84, 0)).with_time(1349150400))
    }

    #[test]
    fn join_url_cases() {
        assert_eq!(join_url("http://h", "/a"), "http://h/a");
        assert_eq!(join_url("http://h/", "/a"), "http://h/a");
        assert_eq!(join_url("http://h/", "a"), "http://h/a");
        assert_eq!(join_url("http://h", "a"), "http://h/a");
        assert_eq!(join_url("http://h", ""), "http://h");
        assert_eq!(join_url("", "/a"), "/a");
    }

    #[test]
    fn local_target_name_cases() {
        assert_eq!(local_target_name("/docs/a.txt", ""), "a.txt");
        assert_eq!(local_target_name("/docs/a.txt", "out/"), "out/a.txt");
        assert_eq!(local_target_name("/docs/a.txt", "b.txt"), "b.txt");
    }

    #[test]
    fn metadata_options_to_params() {
        let options = MetadataOptions {
            list: Some(true),
            page_size: Some(20),
            sort_by: Some("name".into()),
            ..Default::default()
        };
        let params = options.to_params();
        assert_eq!(params.len(), 3);
        assert_eq!(params["list"], "true");
        assert_eq!(params["page_size"], "20");
        assert_eq!(params["sort_by"], "name");
        assert!(MetadataOptions::default().to_params().is_empty());
    }

    #[test]
    fn rooted_paths() {
        let client = test_client();
        assert_eq!(
            client.rooted("http://openapi.kuaipan.cn", "/1/metadata", "/docs"),
            "http://openapi.kuaipan.cn/1/metadata/app_folder/docs"
        );
        assert_eq!(
            client.rooted("http://openapi.kuaipan.cn", "/1/shares", "a.txt"),
            "http://openapi.kuaipan.cn/1/shares/app_folder/a.txt"
        );
    }

    #[test]
    fn signed_url_uses_client_signer() {
        let client = test_client();
        let mut params = Params::new();
        params.insert("list".into(), "true".into());
        let url = client.signed_url(
            "GET",
            "http://openapi.kuaipan.cn/1/metadata/app_folder/docs",
            params,
        );
        assert!(url.ends_with("&oauth_signature=jOnrO65KnM3d%2F4Q1V2tTpJYTc%2F0%3D"));
    }

    #[test]
    fn authorize_url_carries_request_token() {
        let client = Client::new(Credential::new("ck", "cs").with_access("req tok", "s")).unwrap();
        assert_eq!(
            client.authorize_url(),
            "https://www.kuaipan.cn/api.php?ac=open&op=authorise&oauth_token=req%20tok"
        );
    }

    #[test]
    fn title_case_overwrite_flag() {
        assert_eq!(title_case_bool(true), "True");
        assert_eq!(title_case_bool(false), "False");
    }
}

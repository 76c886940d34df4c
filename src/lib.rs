//! Kuaipan cloud storage SDK for Rust.
//!
//! A blocking client for the Kuaipan open API. Every request is signed with
//! OAuth 1.0a (HMAC-SHA1) and uploads stream the file body with an exact
//! `Content-Length`, without buffering the payload.
//!
//! - [`Client::request_token`] / [`Client::access_token`]: OAuth handshake
//! - [`Client::metadata`], [`Client::account_info`]: queries
//! - [`Client::upload_from`], [`Client::download_to`]: file transfer
//! - [`Client::create_folder`], [`Client::move_item`], [`Client::copy`],
//!   [`Client::delete`], [`Client::share`]: file operations
//!
//! # Quick Start
//!
//! ```no_run
//! use kuaipan::{Client, Credential, MetadataOptions};
//!
//! # fn example() -> kuaipan::Result<()> {
//! let client = Client::new(
//!     Credential::new("consumer-key", "consumer-secret")
//!         .with_access("access-key", "access-secret"),
//! )?;
//!
//! let listing = client.metadata("/docs", &MetadataOptions {
//!     list: Some(true),
//!     ..Default::default()
//! })?;
//! for file in &listing.files {
//!     println!("{} ({} bytes)", file.name, file.size);
//! }
//!
//! let data = std::fs::File::open("report.pdf")?;
//! let len = data.metadata()?.len();
//! client.upload_from("/docs/report.pdf", data, len, true)?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod response;
pub mod sign;
pub mod upload;

mod exec;
mod http;

pub use client::{Client, MetadataOptions, local_target_name};
pub use config::{ClientConfig, Root};
pub use credential::Credential;
pub use error::{KuaipanError, Result};
pub use response::{
    AccessTokenResponse, AccountInfo, CopyRefResult, CreateResult, DirInfo, FileInfo,
    RequestTokenResponse, ShareInfo, UploadResult,
};
pub use sign::{Params, Signer};
pub use upload::UploadBody;

// Compile-time assertions: key types must be Send + Sync for use across threads.
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send_sync::<Client>;
    let _ = assert_send_sync::<KuaipanError>;
    let _ = assert_send_sync::<Credential>;
    let _ = assert_send_sync::<Signer>;
};

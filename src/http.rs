//! Blocking HTTP transport for signed requests.

use std::io::{self, Write};
use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::blocking::{Body, Client as HttpClient, ClientBuilder};
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_TYPE};

use crate::config::ClientConfig;
use crate::error::{KuaipanError, Result};
use crate::exec::parse_error_response;
use crate::upload::UploadBody;

/// Status and full body of a completed request.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Issues signed requests. Never retries.
pub(crate) struct HttpInvoker {
    shared: HttpClient,
    config: ClientConfig,
}

impl HttpInvoker {
    pub(crate) fn new(config: &ClientConfig) -> Result<Self> {
        let shared = builder(config)
            .build()
            .map_err(|e| KuaipanError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            shared,
            config: config.clone(),
        })
    }

    /// GET on the shared client, body fully read.
    pub(crate) fn get(&self, url: &str) -> Result<RawResponse> {
        let response = self.shared.get(url).send()?;
        let status = response.status();
        let body = response.bytes()?.to_vec();
        Ok(RawResponse { status, body })
    }

    /// GET that streams a 200 body into `writer`.
    ///
    /// Runs on a throwaway client whose cookie jar lives for this request
    /// and its redirects only, so session cookies set by the download host
    /// never reach later calls.
    pub(crate) fn download<W: Write + ?Sized>(&self, url: &str, writer: &mut W) -> Result<u64> {
        let jar = Arc::new(Jar::default());
        let client = builder(&self.config)
            .cookie_provider(jar)
            .build()
            .map_err(|e| KuaipanError::Config(format!("Failed to build download client: {}", e)))?;

        let mut response = client.get(url).send()?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.bytes()?;
            return Err(parse_error_response(status, &body));
        }

        let copied = io::copy(&mut response, writer)?;
        log::debug!("downloaded {} bytes", copied);
        Ok(copied)
    }

    /// POST a streaming multipart body.
    ///
    /// `Body::sized` sets `Content-Length` from the declared length.
    pub(crate) fn post_upload(&self, url: &str, body: UploadBody) -> Result<RawResponse> {
        let length = body.content_length();
        let content_type = body.content_type();
        let check = body.framing_check();
        log::debug!("uploading {} bytes as {}", length, content_type);

        let result = self
            .shared
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .header(ACCEPT_ENCODING, "identity")
            .body(Body::sized(body.into_reader(), length))
            .send();

        if let Some(message) = check.take() {
            return Err(KuaipanError::UploadFraming(message));
        }

        let response = result?;
        let status = response.status();
        let body = response.bytes()?.to_vec();
        Ok(RawResponse { status, body })
    }
}

fn builder(config: &ClientConfig) -> ClientBuilder {
    let builder = HttpClient::builder().user_agent(config.user_agent.clone());
    match config.timeout {
        Some(timeout) => builder.timeout(timeout),
        None => builder,
    }
}

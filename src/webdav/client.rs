//! Reqwest-backed WebDAV client.

use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{Client, Method, StatusCode};
use tracing::debug;

use super::paths::{self, normalize_watch_root};
use super::propfind;
use super::{DavError, DavFs, DavResult, FileEntry};

/// Per-request timeout applied to every PROPFIND.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Characters that must be escaped inside a URL path.
const URL_PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'%');

/// WebDAV client bound to one server and account.
///
/// The underlying `reqwest::Client` keeps connections alive and is shared by
/// every request this process makes.
pub struct DavClient {
    base_url: String,
    base_path: String,
    username: String,
    password: String,
    http: Client,
}

impl DavClient {
    pub fn new(base_url: &str, username: &str, password: &str) -> DavResult<Self> {
        Self::with_timeout(base_url, username, password, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> DavResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let base_path = url::Url::parse(&base_url)
            .map(|url| url.path().trim_end_matches('/').to_string())
            .unwrap_or_default();
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            base_path,
            username: username.to_string(),
            password: password.to_string(),
            http,
        })
    }

    /// Build the account-scoped WebDAV path for a normalized remote path.
    ///
    /// `/Notes` becomes `/files/<user>/Notes`; the root maps to the account
    /// collection itself.
    fn dav_path(&self, path: &str) -> String {
        let relative = path.trim_start_matches('/');
        if relative.is_empty() {
            format!("/files/{}/", self.username)
        } else {
            format!("/files/{}/{}", self.username, relative)
        }
    }

    async fn propfind(&self, path: &str, depth: &str) -> DavResult<Vec<FileEntry>> {
        let mut dav_path = self.dav_path(path);
        if depth == "1" && !dav_path.ends_with('/') {
            dav_path.push('/');
        }
        let url = format!(
            "{}{}",
            self.base_url,
            utf8_percent_encode(&dav_path, URL_PATH)
        );

        let method = Method::from_bytes(b"PROPFIND")
            .map_err(|e| DavError::Transport(format!("invalid method: {e}")))?;

        debug!(%url, depth, "PROPFIND");
        let response = self
            .http
            .request(method, &url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Depth", depth)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::MULTI_STATUS && status != StatusCode::OK {
            return Err(DavError::Transport(format!(
                "PROPFIND {path} failed with status {status}"
            )));
        }

        let body = response.text().await?;
        let entries = propfind::parse_multistatus(&body)?
            .into_iter()
            .map(|raw| FileEntry {
                path: paths::normalize_href(&raw.href, &self.base_path, &self.username),
                is_dir: raw.is_dir,
                size: if raw.is_dir { 0 } else { raw.size },
                mtime: raw.mtime,
                etag: raw.etag,
            })
            .collect();
        Ok(entries)
    }
}

#[async_trait]
impl DavFs for DavClient {
    async fn list_children(&self, path: &str, include_hidden: bool) -> DavResult<Vec<FileEntry>> {
        let requested = normalize_watch_root(path);
        let entries = self.propfind(&requested, "1").await?;

        let mut children = Vec::with_capacity(entries.len());
        for entry in entries {
            // the collection lists itself first
            if entry.path == requested {
                continue;
            }
            if !include_hidden && paths::is_hidden(&entry.path) {
                continue;
            }
            children.push(entry);
        }
        Ok(children)
    }

    async fn stat(&self, path: &str) -> DavResult<FileEntry> {
        let requested = normalize_watch_root(path);
        let mut entries = self.propfind(&requested, "0").await?;
        if entries.is_empty() {
            return Err(DavError::NotFound(requested));
        }
        Ok(entries.remove(0))
    }
}

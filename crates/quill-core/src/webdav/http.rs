//! WebDAV client over HTTP(S) with basic auth.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Method, StatusCode};

use crate::util::{compact_text, is_http_url, normalize_text_option};

use super::{normalize_path, WebDavClient, WebDavError, WebDavResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:"><d:prop><d:resourcetype/></d:prop></d:propfind>"#;

fn href_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)<(?:[a-z0-9]+:)?href>\s*([^<]+?)\s*</(?:[a-z0-9]+:)?href>")
            .expect("Invalid regex")
    })
}

/// `reqwest`-backed WebDAV client rooted at a server URL.
#[derive(Clone)]
pub struct HttpWebDavClient {
    base_url: String,
    base_path: String,
    username: String,
    password: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpWebDavClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpWebDavClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HttpWebDavClient {
    /// Build a client for the given server root.
    pub fn new(
        server_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> WebDavResult<Self> {
        let base_url = normalize_text_option(Some(server_url.to_string()))
            .filter(|url| is_http_url(url))
            .ok_or_else(|| WebDavError::InvalidUrl(server_url.to_string()))?
            .trim_end_matches('/')
            .to_string();
        let base_path = base_url
            .split_once("://")
            .and_then(|(_, rest)| rest.split_once('/'))
            .map_or_else(String::new, |(_, path)| normalize_path(path));

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| WebDavError::InvalidUrl(error.to_string()))?;

        Ok(Self {
            base_url,
            base_path,
            username: username.into(),
            password: password.into(),
            client,
        })
    }

    /// Server root this client was configured with.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        let encoded = normalize_path(path)
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{encoded}", self.base_url)
    }

    fn method(name: &str) -> WebDavResult<Method> {
        Method::from_bytes(name.as_bytes())
            .map_err(|error| WebDavError::InvalidUrl(format!("{name}: {error}")))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        configure: impl FnOnce(reqwest::RequestBuilder) -> reqwest::RequestBuilder,
    ) -> WebDavResult<reqwest::Response> {
        let request = self
            .client
            .request(method.clone(), self.url(path))
            .basic_auth(&self.username, Some(&self.password));

        let response = configure(request)
            .send()
            .await
            .map_err(|error| map_transport_error(&error))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!(%method, path, status = status.as_u16(), "WebDAV request failed");
        Err(map_status(&method, path, status, &body))
    }

    /// Turn an href from a multistatus response into an absolute remote path.
    fn href_to_path(&self, href: &str) -> String {
        let without_origin = href
            .split_once("://")
            .and_then(|(_, rest)| rest.find('/').map(|index| &rest[index..]))
            .unwrap_or(href);
        let decoded = urlencoding::decode(without_origin)
            .map_or_else(|_| without_origin.to_string(), |value| value.into_owned());
        let path = normalize_path(&decoded);

        if self.base_path.is_empty() || self.base_path == "/" {
            return path;
        }
        path.strip_prefix(&self.base_path)
            .map_or_else(|| path.clone(), normalize_path)
    }
}

fn map_transport_error(error: &reqwest::Error) -> WebDavError {
    if error.is_builder() {
        WebDavError::InvalidUrl(error.to_string())
    } else {
        WebDavError::Transient(error.to_string())
    }
}

fn map_status(method: &Method, path: &str, status: StatusCode, body: &str) -> WebDavError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => WebDavError::Unauthorized {
            status: status.as_u16(),
        },
        StatusCode::NOT_FOUND => WebDavError::NotFound(path.to_string()),
        StatusCode::METHOD_NOT_ALLOWED if method.as_str() == "MKCOL" => {
            WebDavError::AlreadyExists(path.to_string())
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            WebDavError::Transient(format!("HTTP {}", status.as_u16()))
        }
        status if status.is_server_error() => {
            WebDavError::Transient(format!("HTTP {}: {}", status.as_u16(), compact_text(body)))
        }
        status => WebDavError::Http {
            status: status.as_u16(),
            message: compact_text(body),
        },
    }
}

#[async_trait]
impl WebDavClient for HttpWebDavClient {
    async fn ping(&self) -> WebDavResult<()> {
        self.send(Self::method("PROPFIND")?, "/", |request| {
            request
                .header("Depth", "0")
                .header(reqwest::header::CONTENT_TYPE, "application/xml")
                .body(PROPFIND_BODY)
        })
        .await?;
        Ok(())
    }

    async fn mkdir(&self, path: &str) -> WebDavResult<()> {
        self.send(Self::method("MKCOL")?, path, |request| request)
            .await?;
        Ok(())
    }

    async fn read_dir(&self, path: &str) -> WebDavResult<Vec<String>> {
        let response = self
            .send(Self::method("PROPFIND")?, path, |request| {
                request
                    .header("Depth", "1")
                    .header(reqwest::header::CONTENT_TYPE, "application/xml")
                    .body(PROPFIND_BODY)
            })
            .await?;
        let body = response
            .text()
            .await
            .map_err(|error| map_transport_error(&error))?;

        let own_path = normalize_path(path);
        let mut children: Vec<String> = href_pattern()
            .captures_iter(&body)
            .filter_map(|captures| captures.get(1))
            .map(|href| self.href_to_path(href.as_str()))
            .filter(|child| *child != own_path)
            .collect();
        children.sort();
        children.dedup();
        Ok(children)
    }

    async fn read(&self, path: &str) -> WebDavResult<Vec<u8>> {
        let response = self.send(Method::GET, path, |request| request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|error| map_transport_error(&error))?;
        Ok(bytes.to_vec())
    }

    async fn write(&self, path: &str, bytes: Vec<u8>) -> WebDavResult<()> {
        self.send(Method::PUT, path, |request| request.body(bytes))
            .await?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> WebDavResult<()> {
        self.send(Method::DELETE, path, |request| request).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> WebDavResult<bool> {
        match self
            .send(Self::method("PROPFIND")?, path, |request| {
                request.header("Depth", "0")
            })
            .await
        {
            Ok(_) => Ok(true),
            Err(WebDavError::NotFound(_)) => Ok(false),
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> HttpWebDavClient {
        HttpWebDavClient::new(url, "alice", "secret").unwrap()
    }

    #[test]
    fn new_rejects_non_http_urls() {
        assert!(matches!(
            HttpWebDavClient::new("dav.example.com", "alice", "pw"),
            Err(WebDavError::InvalidUrl(_))
        ));
        assert!(HttpWebDavClient::new("   ", "alice", "pw").is_err());
    }

    #[test]
    fn url_encodes_segments() {
        let client = client("https://dav.example.com/remote.php/dav/");
        assert_eq!(client.base_url(), "https://dav.example.com/remote.php/dav");
        assert_eq!(
            client.url("/journal_app/attachments/a b.png"),
            "https://dav.example.com/remote.php/dav/journal_app/attachments/a%20b.png"
        );
    }

    #[test]
    fn href_to_path_strips_origin_and_base() {
        let client = client("https://dav.example.com/remote.php/dav");
        assert_eq!(
            client.href_to_path("/remote.php/dav/journal_app/journals/"),
            "/journal_app/journals"
        );
        assert_eq!(
            client.href_to_path("https://dav.example.com/remote.php/dav/journal_app/a%20b.json"),
            "/journal_app/a b.json"
        );
    }

    #[test]
    fn href_pattern_matches_prefixed_and_plain_tags() {
        let body = "<d:multistatus><d:response><d:href>/a/</d:href></d:response>\
                    <D:response><D:href>/a/b.json</D:href></D:response>\
                    <response><href>/a/c</href></response></d:multistatus>";
        let hrefs: Vec<&str> = href_pattern()
            .captures_iter(body)
            .filter_map(|captures| captures.get(1))
            .map(|m| m.as_str())
            .collect();
        assert_eq!(hrefs, vec!["/a/", "/a/b.json", "/a/c"]);
    }

    #[test]
    fn map_status_classifies_responses() {
        let get = Method::GET;
        let mkcol = Method::from_bytes(b"MKCOL").unwrap();

        assert!(map_status(&get, "/x", StatusCode::UNAUTHORIZED, "").is_auth());
        assert!(map_status(&get, "/x", StatusCode::FORBIDDEN, "").is_auth());
        assert!(map_status(&get, "/x", StatusCode::NOT_FOUND, "").is_not_found());
        assert!(map_status(&get, "/x", StatusCode::BAD_GATEWAY, "").is_transient());
        assert_eq!(
            map_status(&mkcol, "/x", StatusCode::METHOD_NOT_ALLOWED, ""),
            WebDavError::AlreadyExists("/x".to_string())
        );
        assert!(matches!(
            map_status(&get, "/x", StatusCode::CONFLICT, "missing parent"),
            WebDavError::Http { status: 409, .. }
        ));
    }

    #[test]
    fn debug_redacts_password() {
        let debug = format!("{:?}", client("https://dav.example.com"));
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}

//! WebDAV remote store
//!
//! A thin client over one WebDAV collection. Only the verbs the sync
//! pipeline needs are implemented: PROPFIND for the self check and listing,
//! GET/PUT/DELETE for the state file, MKCOL for directory creation.
//!
//! Transport failures (refused, DNS, timeout) surface as connectivity
//! errors; HTTP error statuses surface as remote errors. The orchestrator
//! relies on that split to tell "server unreachable" apart from "server
//! rejected the request".

use async_trait::async_trait;
use cookiesync_types::{Error, RemoteStore, Result};
use quick_xml::events::Event;
use reqwest::{Client, Method, StatusCode};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for one WebDAV server, authenticated with HTTP basic auth
#[derive(Debug, Clone)]
pub struct WebDavClient {
    http: Client,
    base: Url,
    username: String,
    password: String,
}

impl WebDavClient {
    /// Create a client for the given server URL
    pub fn new(url: &str, username: &str, password: &str) -> Result<Self> {
        let base = Url::parse(url)
            .map_err(|e| Error::config(format!("Invalid WebDAV URL '{url}': {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "WebDAV URL must be http or https, got '{url}'"
            )));
        }
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::other(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn url_for(&self, path: &str) -> Result<Url> {
        let joined = format!(
            "{}/{}",
            self.base.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut url = self.base.clone();
        url.set_path(&joined);
        Ok(url)
    }

    fn method(name: &str) -> Result<Method> {
        Method::from_bytes(name.as_bytes())
            .map_err(|e| Error::other(format!("Invalid HTTP method '{name}': {e}")))
    }

    fn transport_err(error: reqwest::Error) -> Error {
        if error.is_connect() || error.is_timeout() {
            Error::connectivity(format!("WebDAV server unreachable: {error}"))
        } else {
            Error::remote(format!("WebDAV request failed: {error}"))
        }
    }

    async fn propfind(&self, url: Url, depth: &str) -> Result<reqwest::Response> {
        self.http
            .request(Self::method("PROPFIND")?, url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Depth", depth)
            .send()
            .await
            .map_err(Self::transport_err)
    }

    /// Verify the server answers a PROPFIND on the base URL
    ///
    /// Run once at startup so a misconfigured URL or bad credentials fail
    /// before any state is read.
    pub async fn self_check(&self) -> Result<()> {
        let response = self.propfind(self.base.clone(), "0").await?;
        let status = response.status();
        if status == StatusCode::MULTI_STATUS || status.is_success() {
            info!("WebDAV self check passed against {}", self.base);
            Ok(())
        } else if status == StatusCode::UNAUTHORIZED {
            Err(Error::remote("WebDAV credentials rejected".to_string()))
        } else {
            Err(Error::remote(format!(
                "WebDAV self check failed with status {status}"
            )))
        }
    }
}

/// Pull the `href` values out of a PROPFIND multistatus body
fn extract_hrefs(xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut hrefs = Vec::new();
    let mut in_href = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"href" => in_href = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"href" => in_href = false,
            Ok(Event::Text(text)) if in_href => {
                let href = text
                    .unescape()
                    .map_err(|e| Error::remote(format!("Malformed multistatus body: {e}")))?
                    .trim()
                    .to_string();
                if !href.is_empty() {
                    hrefs.push(href);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::remote(format!("Malformed multistatus body: {e}")));
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(hrefs)
}

/// Path component of an href, which servers send absolute or relative
fn href_path(href: &str) -> String {
    match Url::parse(href) {
        Ok(url) => url.path().to_string(),
        Err(_) => href.to_string(),
    }
}

#[async_trait]
impl RemoteStore for WebDavClient {
    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let url = self.url_for(path)?;
        let collection_path = url.path().trim_end_matches('/').to_string();
        let response = self.propfind(url, "1").await?;
        let status = response.status();
        if status != StatusCode::MULTI_STATUS && !status.is_success() {
            return Err(Error::remote(format!(
                "PROPFIND on '{path}' failed with status {status}"
            )));
        }
        let body = response.bytes().await.map_err(Self::transport_err)?;

        let names = extract_hrefs(&body)?
            .iter()
            .filter_map(|href| {
                let entry = href_path(href);
                let entry = entry.trim_end_matches('/');
                if entry == collection_path {
                    // The collection lists itself first
                    None
                } else {
                    entry.rsplit('/').next().map(String::from)
                }
            })
            .collect();
        Ok(names)
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let response = self
            .http
            .get(self.url_for(path)?)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(Self::transport_err)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = response.bytes().await.map_err(Self::transport_err)?;
                debug!("Fetched {} ({} bytes)", path, bytes.len());
                Ok(Some(bytes.to_vec()))
            }
            status => Err(Error::remote(format!(
                "GET '{path}' failed with status {status}"
            ))),
        }
    }

    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let response = self
            .http
            .put(self.url_for(path)?)
            .basic_auth(&self.username, Some(&self.password))
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(Self::transport_err)?;
        let status = response.status();
        if status.is_success() {
            debug!("Uploaded {} ({} bytes)", path, bytes.len());
            Ok(())
        } else {
            Err(Error::remote(format!(
                "PUT '{path}' failed with status {status}"
            )))
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url_for(path)?)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(Self::transport_err)?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(Error::remote(format!(
                "DELETE '{path}' failed with status {status}"
            )))
        }
    }

    async fn ensure_directory(&self, path: &str) -> Result<()> {
        let response = self
            .http
            .request(Self::method("MKCOL")?, self.url_for(path)?)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(Self::transport_err)?;
        let status = response.status();
        match status {
            // 405 and 409 mean the collection (or a parent) already exists
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::CONFLICT => Ok(()),
            status if status.is_success() => {
                info!("Created remote directory {path}");
                Ok(())
            }
            status => Err(Error::remote(format!(
                "MKCOL '{path}' failed with status {status}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cookiesync_types::ErrorKind;

    const MULTISTATUS: &str = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/dav/cookie-exceptions/</d:href>
    <d:propstat><d:status>HTTP/1.1 200 OK</d:status></d:propstat>
  </d:response>
  <d:response>
    <d:href>/dav/cookie-exceptions/records.json</d:href>
    <d:propstat><d:status>HTTP/1.1 200 OK</d:status></d:propstat>
  </d:response>
</d:multistatus>"#;

    fn client(server: &mockito::ServerGuard) -> WebDavClient {
        WebDavClient::new(&format!("{}/dav", server.url()), "user", "secret").unwrap()
    }

    #[test]
    fn test_rejects_non_http_urls() {
        assert!(WebDavClient::new("ftp://dav.example", "u", "p").is_err());
        assert!(WebDavClient::new("not a url", "u", "p").is_err());
    }

    #[test]
    fn test_extract_hrefs_from_multistatus() {
        let hrefs = extract_hrefs(MULTISTATUS.as_bytes()).unwrap();
        assert_eq!(
            hrefs,
            vec![
                "/dav/cookie-exceptions/",
                "/dav/cookie-exceptions/records.json"
            ]
        );
    }

    #[tokio::test]
    async fn test_list_skips_the_collection_itself() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PROPFIND", "/dav/cookie-exceptions")
            .with_status(207)
            .with_body(MULTISTATUS)
            .create_async()
            .await;

        let names = client(&server).list("/cookie-exceptions").await.unwrap();
        assert_eq!(names, vec!["records.json"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_missing_file_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/dav/cookie-exceptions/records.json")
            .with_status(404)
            .create_async()
            .await;

        let result = client(&server)
            .get("/cookie-exceptions/records.json")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_get_returns_body_bytes() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/dav/cookie-exceptions/records.json")
            .with_status(200)
            .with_body(b"{\"records\": []}")
            .create_async()
            .await;

        let bytes = client(&server)
            .get("/cookie-exceptions/records.json")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bytes, b"{\"records\": []}");
    }

    #[tokio::test]
    async fn test_put_accepts_created_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/dav/cookie-exceptions/records.json")
            .match_body("payload")
            .with_status(201)
            .create_async()
            .await;

        client(&server)
            .put("/cookie-exceptions/records.json", b"payload")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_mkcol_tolerates_existing_collection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("MKCOL", "/dav/cookie-exceptions")
            .with_status(405)
            .create_async()
            .await;

        client(&server)
            .ensure_directory("/cookie-exceptions")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_self_check_rejects_bad_credentials() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PROPFIND", "/dav")
            .with_status(401)
            .create_async()
            .await;

        let err = client(&server).self_check().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Remote);
        assert!(err.to_string().contains("credentials"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_connectivity_error() {
        // Nothing listens on this port
        let client = WebDavClient::new("http://127.0.0.1:39999/dav", "u", "p").unwrap();
        let err = client.self_check().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connectivity);
    }
}

use std::{fmt, path::Path, sync::Arc};

use anyhow::{Context as _, Result, anyhow};
use async_trait::async_trait;
use reqwest::{
    Client, Response,
    header::{CONTENT_DISPOSITION, CONTENT_TYPE},
};
use reqwest_cookie_store::{CookieStore, CookieStoreMutex};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::Settings,
    dispatch::{BatchRequest, DEFAULT_DOWNLOAD_NAME, Download, Transport},
    models::{ListResponse, Pk, ScanRow, ScannerRow},
    outcome::CommandResult,
};

const CSRF_COOKIE: &str = "csrftoken";
const CSRF_HEADER: &str = "X-CSRFToken";
const CSRF_FIELD: &str = "csrfmiddlewaretoken";

pub struct NetworkClient {
    client: Client,
    cookies: Arc<CookieStoreMutex>,
    base_url: Url,
    csrf_token: Option<String>,
}

impl fmt::Debug for NetworkClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkClient")
            .field("base_url", &self.base_url.as_str())
            .field("csrf_token", &self.csrf_token.as_ref().map(|_| "<configured>"))
            .finish_non_exhaustive()
    }
}

impl NetworkClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let cookies = Arc::new(CookieStoreMutex::new(CookieStore::default()));
        let client = Client::builder()
            .cookie_provider(Arc::clone(&cookies))
            .build()?;
        Ok(Self {
            client,
            cookies,
            base_url: settings.server.clone(),
            csrf_token: settings.csrf_token.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid endpoint {path}"))
    }

    async fn list<R: DeserializeOwned>(&self, path: &str) -> Result<Vec<R>> {
        let resp = self
            .client
            .get(self.endpoint(path)?)
            .send()
            .await?
            .error_for_status()?;
        let list: ListResponse<R> = resp.json().await?;
        debug!("Fetched {} row(s) from {}", list.data.len(), path);
        Ok(list.data)
    }

    pub async fn scans(&self) -> Result<Vec<ScanRow>> {
        self.list("api/scan/").await
    }

    pub async fn child_scans(&self, scanner: Pk) -> Result<Vec<ScanRow>> {
        self.list(&format!("api/scanner/{scanner}/scan")).await
    }

    pub async fn scanners(&self) -> Result<Vec<ScannerRow>> {
        self.list("api/scanner/").await
    }

    fn cookie_token(&self) -> Option<String> {
        let store = match self.cookies.lock() {
            Ok(store) => store,
            Err(_) => {
                warn!("Cookie store lock poisoned");
                return None;
            }
        };
        store
            .iter_unexpired()
            .find(|c| c.name() == CSRF_COOKIE)
            .map(|c| c.value().to_string())
    }

    /// Anti-forgery token: configured value, else the server's cookie. The
    /// cookie is primed by loading the index page when it is missing.
    pub async fn csrf_token(&self) -> Result<String> {
        if let Some(token) = &self.csrf_token {
            return Ok(token.clone());
        }
        if let Some(token) = self.cookie_token() {
            return Ok(token);
        }
        debug!("Priming anti-forgery cookie from {}", self.base_url);
        self.client
            .get(self.base_url.clone())
            .send()
            .await?
            .error_for_status()?;
        self.cookie_token()
            .ok_or_else(|| anyhow!("server at {} did not issue an anti-forgery token", self.base_url))
    }
}

fn content_type(resp: &Response) -> &str {
    resp.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Extracts the file name from a `Content-Disposition` value. Directory
/// parts are dropped so the name can only land in the working directory.
pub fn disposition_filename(value: &str) -> Option<String> {
    value
        .split(';')
        .filter_map(|part| part.trim().strip_prefix("filename="))
        .map(|name| name.trim_matches('"').replace('\\', "/"))
        .find_map(|name| {
            Path::new(&name)
                .file_name()
                .and_then(|n| n.to_str())
                .map(String::from)
        })
}

#[async_trait]
impl Transport for NetworkClient {
    async fn batch_control(&self, request: &BatchRequest) -> Result<CommandResult> {
        let token = self.csrf_token().await?;
        let resp = self
            .client
            .post(self.endpoint("api/batch/")?)
            .header(CSRF_HEADER, token)
            .form(&request.form())
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn batch_download(&self, pks: &[Pk]) -> Result<Download> {
        let token = self.csrf_token().await?;
        let mut fields = vec![(CSRF_FIELD, token)];
        fields.extend(pks.iter().map(|pk| ("pk_list[]", pk.to_string())));

        let resp = self
            .client
            .post(self.endpoint("api/download/")?)
            .form(&fields)
            .send()
            .await?
            .error_for_status()?;
        // Failures come back as a rendered error page.
        if content_type(&resp).starts_with("text/html") {
            return Err(anyhow!("server refused the batch download"));
        }
        let filename = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_filename)
            .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string());
        let bytes = resp.bytes().await?.to_vec();
        Ok(Download { filename, bytes })
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        task::JoinHandle,
    };

    use super::*;
    use crate::{
        command::{Command, Target},
        outcome::Outcome,
    };

    fn http_reply(headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\n{headers}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = vec![];
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let head = text[..end].to_ascii_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .map(|v| v.trim().parse::<usize>().unwrap())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    break;
                }
            }
        }
        String::from_utf8(buf).unwrap()
    }

    /// Answers one connection per canned reply and hands back the raw requests.
    async fn serve(replies: Vec<String>) -> (SocketAddr, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut requests = vec![];
            for reply in replies {
                let (mut stream, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut stream).await);
                stream.write_all(reply.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }
            requests
        });
        (addr, handle)
    }

    fn client(addr: SocketAddr, extra: &str) -> NetworkClient {
        let settings: Settings = format!("SetServer http://{addr}/\n{extra}").parse().unwrap();
        NetworkClient::new(&settings).unwrap()
    }

    fn body(request: &str) -> &str {
        request.split_once("\r\n\r\n").map(|(_, b)| b).unwrap_or_default()
    }

    #[tokio::test]
    async fn batch_control_primes_cookie_and_posts_form() {
        let (addr, server) = serve(vec![
            http_reply("Set-Cookie: csrftoken=tok123; Path=/\r\n", ""),
            http_reply("Content-Type: application/json\r\n", r#"{"status": "success"}"#),
        ])
        .await;
        let client = client(addr, "");
        let request = BatchRequest {
            target: Target::Scan,
            command: Command::new("ST"),
            pks: vec![1, 2],
        };
        let result = client.batch_control(&request).await.unwrap();
        assert_eq!(result.classify(), Outcome::Success);

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET / HTTP/1.1"));
        assert!(requests[1].starts_with("POST /api/batch/ HTTP/1.1"));
        let head = requests[1].to_ascii_lowercase();
        assert!(head.contains("x-csrftoken: tok123"));
        assert!(head.contains("content-type: application/x-www-form-urlencoded"));
        assert_eq!(
            body(&requests[1]),
            "type=scan&command=ST&pk_list%5B%5D=1&pk_list%5B%5D=2"
        );
    }

    #[tokio::test]
    async fn batch_download_sends_token_field_and_names_archive() {
        let (addr, server) = serve(vec![
            http_reply("Content-Type: application/zip\r\n", "PK"),
            http_reply(
                "Content-Type: application/zip\r\nContent-Disposition: attachment; filename=\"../scans.zip\"\r\n",
                "PK",
            ),
        ])
        .await;
        let client = client(addr, "CsrfToken fixed\n");

        let download = client.batch_download(&[4, 5]).await.unwrap();
        assert_eq!(download.filename, DEFAULT_DOWNLOAD_NAME);
        assert_eq!(download.bytes, b"PK");

        let download = client.batch_download(&[4]).await.unwrap();
        assert_eq!(download.filename, "scans.zip");

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /api/download/ HTTP/1.1"));
        assert_eq!(
            body(&requests[0]),
            "csrfmiddlewaretoken=fixed&pk_list%5B%5D=4&pk_list%5B%5D=5"
        );
        assert!(!requests[0].to_ascii_lowercase().contains("x-csrftoken"));
    }

    #[tokio::test]
    async fn batch_download_rejects_error_page() {
        let (addr, server) = serve(vec![http_reply(
            "Content-Type: text/html; charset=utf-8\r\n",
            "<html>no</html>",
        )])
        .await;
        let client = client(addr, "CsrfToken fixed\n");
        assert!(client.batch_download(&[1]).await.is_err());
        server.await.unwrap();
    }

    #[test]
    fn filename_from_disposition() {
        assert_eq!(disposition_filename("filename=result.zip").as_deref(), Some("result.zip"));
        assert_eq!(
            disposition_filename("attachment; filename=\"scans.zip\"").as_deref(),
            Some("scans.zip")
        );
        assert_eq!(disposition_filename("inline"), None);
    }

    #[test]
    fn disposition_filename_stays_in_working_dir() {
        assert_eq!(
            disposition_filename("attachment; filename=\"../../home/user/.bashrc\"").as_deref(),
            Some(".bashrc")
        );
        assert_eq!(disposition_filename("filename=/etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(
            disposition_filename("filename=\"..\\..\\boot.ini\"").as_deref(),
            Some("boot.ini")
        );
        assert_eq!(disposition_filename("filename=\"..\""), None);
        assert_eq!(disposition_filename("filename=\"dir/\""), Some("dir".to_string()));
    }

    #[test]
    fn endpoints_join_under_base() {
        let settings: Settings = "SetServer http://h:8000/dd\n".parse().unwrap();
        let client = NetworkClient::new(&settings).unwrap();
        assert_eq!(
            client.endpoint("api/batch/").unwrap().as_str(),
            "http://h:8000/dd/api/batch/"
        );
        assert_eq!(
            client.endpoint(&format!("api/scanner/{}/scan", 3)).unwrap().as_str(),
            "http://h:8000/dd/api/scanner/3/scan"
        );
    }
}

//! HTTP client for the enrichment service

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use std::time::Duration;
use tracing::{debug, warn};

use super::parse::parse_response;
use super::{SerialLookup, SerialRecord};
use crate::config::LookupSettings;
use crate::error::{Result, ScanError};

/// Queries the enrichment service for a serial number
pub struct EnrichmentClient {
    http: reqwest::Client,
    settings: LookupSettings,
}

impl EnrichmentClient {
    /// Create a client with the configured request timeout
    pub fn new(settings: LookupSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ScanError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(settings, http))
    }

    /// Create a client around an existing `reqwest::Client`
    pub fn with_client(settings: LookupSettings, http: reqwest::Client) -> Self {
        if settings.api_key.is_empty() {
            warn!("No API key configured for the lookup service");
        }
        Self { http, settings }
    }

    /// Request timeout applied to every call
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.settings.timeout_secs)
    }

    async fn fetch(&self, serial_number: &str) -> reqwest::Result<String> {
        let service = self.settings.service.to_string();

        let response = self
            .http
            .get(&self.settings.endpoint)
            .query(&[
                ("imei", serial_number),
                ("service", service.as_str()),
                ("key", self.settings.api_key.as_str()),
                ("format", "JSON"),
            ])
            .header(USER_AGENT, self.settings.user_agent.as_str())
            .send()
            .await?
            .error_for_status()?;

        response.text().await
    }
}

#[async_trait]
impl SerialLookup for EnrichmentClient {
    async fn lookup(&self, serial_number: &str) -> SerialRecord {
        debug!("Looking up {}", serial_number);
        match self.fetch(serial_number).await {
            Ok(body) => parse_response(serial_number, &body),
            Err(e) => {
                warn!("Lookup for {} failed: {}", serial_number, e);
                SerialRecord::failed(serial_number)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::LookupStatus;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    const SUCCESS_BODY: &str = r#"{"status":"success","id":991,"result":"Model Desc : Foo<br>Model Name : Bar<br>Model Number : A1<br>Model iD : M1<br>Capacity : 64GB<br>Color : Red<br>Type : Phone<br>Year : 2020"}"#;

    /// Answer exactly one HTTP request, returning the raw request head
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (format!("http://{addr}/api.php"), handle)
    }

    fn test_client(endpoint: String) -> EnrichmentClient {
        let settings = LookupSettings {
            endpoint,
            service: 26,
            api_key: "k3y".to_string(),
            user_agent: "scanner-test/1.0".to_string(),
            timeout_secs: 5,
        };
        let http = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        EnrichmentClient::with_client(settings, http)
    }

    #[tokio::test]
    async fn test_lookup_success_roundtrip() {
        let (endpoint, server) = serve_once("HTTP/1.1 200 OK", SUCCESS_BODY);
        let client = test_client(endpoint);

        let record = client.lookup("ABCDEFGH").await;
        let request = server.join().unwrap();

        assert_eq!(record.status, LookupStatus::Success);
        assert_eq!(record.name, "Bar");
        assert_eq!(record.result_id, 991);

        let first_line = request.lines().next().unwrap();
        assert!(first_line.starts_with("GET /api.php?"), "{first_line}");
        for param in ["imei=ABCDEFGH", "service=26", "key=k3y", "format=JSON"] {
            assert!(first_line.contains(param), "missing {param} in {first_line}");
        }
        assert!(request.to_ascii_lowercase().contains("user-agent: scanner-test/1.0"));
    }

    #[tokio::test]
    async fn test_lookup_http_error_fails() {
        let (endpoint, server) = serve_once("HTTP/1.1 500 Internal Server Error", SUCCESS_BODY);
        let client = test_client(endpoint);

        let record = client.lookup("ABCDEFGH").await;
        server.join().unwrap();

        assert_eq!(record, SerialRecord::failed("ABCDEFGH"));
    }

    #[tokio::test]
    async fn test_lookup_connection_refused_fails() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let client = test_client(format!("http://{addr}/api.php"));

        let record = client.lookup("ABCDEFGH").await;
        assert_eq!(record.status, LookupStatus::Failed);
    }
}

//! Server directory: where candidate servers come from

use crate::{
    client::HttpUtils,
    error::{AppError, Result},
    logging::Logger,
    models::CandidateServer,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Source of candidate servers
#[async_trait]
pub trait ServerDirectory: Send + Sync {
    /// Candidate servers in directory order.
    ///
    /// Fails with `DirectoryUnavailable` when the list cannot be fetched.
    async fn list(&self) -> Result<Vec<CandidateServer>>;
}

/// Field that some directories encode as a JSON string and others as a number
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flexible {
    Text(String),
    Number(serde_json::Number),
}

impl Flexible {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Flexible::Text(s) => s.trim().parse().ok(),
            Flexible::Number(n) => n.as_f64(),
        }
    }

    fn into_string(self) -> String {
        match self {
            Flexible::Text(s) => s,
            Flexible::Number(n) => n.to_string(),
        }
    }
}

/// One entry of the speedtest.net style server list
#[derive(Debug, Deserialize)]
struct DirectoryEntry {
    url: String,
    lat: Flexible,
    lon: Flexible,
    #[serde(default)]
    name: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    sponsor: String,
    id: Flexible,
}

impl DirectoryEntry {
    fn into_candidate(self) -> std::result::Result<CandidateServer, String> {
        let lat = self.lat.as_f64().ok_or("unparseable latitude")?;
        let lon = self.lon.as_f64().ok_or("unparseable longitude")?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(format!("coordinates out of range ({}, {})", lat, lon));
        }

        Ok(CandidateServer::new(self.id.into_string(), HttpUtils::server_base_url(&self.url), lat, lon)
            .with_metadata(self.name, self.country, self.sponsor))
    }
}

/// Fetches the server list as JSON over HTTP
pub struct HttpServerDirectory {
    client: Client,
    url: String,
    logger: Logger,
}

impl HttpServerDirectory {
    pub fn new(client: Client, url: String, logger: Logger) -> Self {
        Self { client, url, logger }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Parse a directory document.
    ///
    /// Only a body that is not a JSON array fails; entries that are missing
    /// fields or carry bad coordinates are dropped one by one.
    pub async fn parse(&self, body: &str) -> Result<Vec<CandidateServer>> {
        let entries: Vec<serde_json::Value> = serde_json::from_str(body)
            .map_err(|e| AppError::directory_unavailable(format!("malformed server list: {}", e)))?;

        let mut servers = Vec::with_capacity(entries.len());
        for value in entries {
            let url = value.get("url").and_then(|url| url.as_str()).unwrap_or_default().to_string();
            let candidate = serde_json::from_value::<DirectoryEntry>(value)
                .map_err(|e| e.to_string())
                .and_then(DirectoryEntry::into_candidate);

            match candidate {
                Ok(server) => servers.push(server),
                Err(reason) => {
                    self.logger.debug("Dropping directory entry")
                        .field("url", url)
                        .field("reason", reason)
                        .log()
                        .await;
                }
            }
        }
        Ok(servers)
    }
}

#[async_trait]
impl ServerDirectory for HttpServerDirectory {
    async fn list(&self) -> Result<Vec<CandidateServer>> {
        let response = self.client.get(&self.url).send().await
            .map_err(|e| AppError::directory_unavailable(format!("{}: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::directory_unavailable(format!("{} returned {}", self.url, status)));
        }

        let body = response.text().await
            .map_err(|e| AppError::directory_unavailable(format!("reading {}: {}", self.url, e)))?;

        let servers = self.parse(&body).await?;
        crate::log_debug!(self.logger, "Directory returned {} servers", servers.len());
        Ok(servers)
    }
}

/// Fixed server list, for explicit configurations and tests
pub struct StaticServerDirectory {
    servers: Vec<CandidateServer>,
}

impl StaticServerDirectory {
    pub fn new(servers: Vec<CandidateServer>) -> Self {
        Self { servers }
    }
}

#[async_trait]
impl ServerDirectory for StaticServerDirectory {
    async fn list(&self) -> Result<Vec<CandidateServer>> {
        Ok(self.servers.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientFactory;
    use wiremock::{matchers::{method, path}, Mock, MockServer, ResponseTemplate};

    const SAMPLE: &str = r#"[
        {"url": "http://speed1.example.com:8080/speedtest/upload.php", "lat": "35.6895", "lon": "139.6917",
         "name": "Tokyo", "country": "Japan", "cc": "JP", "sponsor": "Example Net", "id": "21569", "host": "speed1.example.com:8080"},
        {"url": "speed2.example.com/speedtest/upload.php", "lat": 34.6937, "lon": 135.5023,
         "name": "Osaka", "country": "Japan", "sponsor": "Other Net", "id": 4321},
        {"url": "http://broken.example.com/speedtest/upload.php", "lat": "n/a", "lon": "0",
         "name": "Broken", "country": "Nowhere", "sponsor": "", "id": "1"}
    ]"#;

    fn directory(url: String) -> HttpServerDirectory {
        HttpServerDirectory::new(ClientFactory::default().api_client().unwrap(), url, Logger::quiet("DIR"))
    }

    #[tokio::test]
    async fn test_parse_drops_bad_entries() {
        let servers = directory("http://unused".to_string()).parse(SAMPLE).await.unwrap();
        assert_eq!(servers.len(), 2);

        assert_eq!(servers[0].id, "21569");
        assert_eq!(servers[0].base_url, "http://speed1.example.com:8080");
        assert_eq!(servers[0].name, "Tokyo");
        assert!((servers[0].lat - 35.6895).abs() < 1e-9);

        assert_eq!(servers[1].id, "4321");
        assert_eq!(servers[1].base_url, "http://speed2.example.com");
    }

    #[tokio::test]
    async fn test_incomplete_entries_are_dropped_individually() {
        let body = r#"[
            {"lat": "10.0", "lon": "20.0", "id": "1"},
            {"url": "http://no-id.example.com/speedtest/upload.php", "lat": "10.0", "lon": "20.0"},
            {"url": "http://null-lat.example.com/speedtest/upload.php", "lat": null, "lon": "20.0", "id": "3"},
            "not an object",
            {"url": "http://ok.example.com/speedtest/upload.php", "lat": "10.0", "lon": "20.0", "id": "5"}
        ]"#;

        let servers = directory("http://unused".to_string()).parse(body).await.unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].id, "5");
        assert_eq!(servers[0].base_url, "http://ok.example.com");
    }

    #[tokio::test]
    async fn test_malformed_document() {
        let err = directory("http://unused".to_string()).parse("{not json").await.unwrap_err();
        assert!(matches!(err, AppError::DirectoryUnavailable(_)));
    }

    #[tokio::test]
    async fn test_list_over_http() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/js/servers"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE))
            .mount(&mock)
            .await;

        let servers = directory(format!("{}/api/js/servers", mock.uri())).list().await.unwrap();
        assert_eq!(servers.len(), 2);
    }

    #[tokio::test]
    async fn test_error_status_is_unavailable() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock)
            .await;

        let err = directory(mock.uri()).list().await.unwrap_err();
        assert!(matches!(err, AppError::DirectoryUnavailable(_)));
    }

    #[tokio::test]
    async fn test_unreachable_is_unavailable() {
        let err = directory("http://127.0.0.1:9/servers".to_string()).list().await.unwrap_err();
        assert!(matches!(err, AppError::DirectoryUnavailable(_)));
    }

    #[tokio::test]
    async fn test_static_directory() {
        let dir = StaticServerDirectory::new(vec![CandidateServer::new("1", "http://a", 0.0, 0.0)]);
        assert_eq!(dir.list().await.unwrap().len(), 1);
    }
}

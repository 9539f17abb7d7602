// Cloud drive client. Wraps the three REST calls the CLI needs: create a
// folder, ask the drive to copy a remote URL into a path, and poll the
// resulting asynchronous operation.

use crate::api::{Reply, Request, Transport};
use crate::config::DiskConfig;
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiskError {
    /// The drive answered with an error document (`{"error": ...}`).
    #[error("{error}: {message}")]
    Api { error: String, message: String },
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Link to the asynchronous operation created by a remote upload.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct OperationLink {
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub templated: Option<bool>,
}

/// Error document returned by the drive API.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
    description: Option<String>,
}

impl ApiErrorBody {
    fn parse(reply: &Reply) -> Self {
        reply.json().unwrap_or_default()
    }

    fn text(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.description.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    status: String,
}

pub struct DiskClient<T: Transport> {
    http: T,
    config: DiskConfig,
    authorization: String,
}

impl<T: Transport> DiskClient<T> {
    pub fn new(http: T, config: DiskConfig, token: &str) -> Self {
        let authorization = format!("{} {}", config.auth_scheme, token.trim());
        DiskClient {
            http,
            config,
            authorization,
        }
    }

    fn resources_url(&self, suffix: &str, params: &[(&str, &str)]) -> Result<Url, DiskError> {
        let url = format!("{}/v1/disk/resources{}", self.config.base_url, suffix);
        Url::parse_with_params(&url, params).map_err(|e| DiskError::Malformed(format!("{}: {}", url, e)))
    }

    /// Create `path` on the drive. Returns true if the folder was created
    /// (201) or already exists (409).
    pub fn create_folder(&self, path: &str) -> bool {
        let url = match self.resources_url("", &[("path", path)]) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Cannot build folder URL for {:?}: {}", path, e);
                return false;
            }
        };
        let request = Request::put(url.as_str()).authorization(self.authorization.as_str());
        match self.http.send(request) {
            Ok(reply) if reply.status == 201 || reply.status == 409 => {
                log::debug!("Folder {:?} ready (HTTP {})", path, reply.status);
                true
            }
            Ok(reply) => {
                let body = ApiErrorBody::parse(&reply);
                log::warn!(
                    "Folder {:?} could not be created: HTTP {} {}",
                    path,
                    reply.status,
                    body.text()
                );
                false
            }
            Err(e) => {
                log::warn!("Folder {:?} could not be created: {:#}", path, e);
                false
            }
        }
    }

    /// Ask the drive to download `source_url` into `dest_path`.
    pub fn upload_from_url(&self, source_url: &str, dest_path: &str) -> Result<OperationLink, DiskError> {
        let url = self.resources_url("/upload", &[("url", source_url), ("path", dest_path)])?;
        let request = Request::post(url.as_str())
            .authorization(self.authorization.as_str())
            .timeout(self.config.upload_timeout);
        let reply = self
            .http
            .send(request)
            .map_err(|e| DiskError::Transport(format!("{:#}", e)))?;
        Self::accepted(&reply)
    }

    /// Current status of an operation returned by `upload_from_url`:
    /// `success`, `in-progress` or `failed`.
    pub fn operation_status(&self, link: &OperationLink) -> Result<String, DiskError> {
        if link.href.is_empty() {
            return Err(DiskError::Malformed("operation link has no href".into()));
        }
        let request = Request::get(link.href.as_str()).authorization(self.authorization.as_str());
        let reply = self
            .http
            .send(request)
            .map_err(|e| DiskError::Transport(format!("{:#}", e)))?;
        if let Some(err) = Self::api_error(&reply) {
            return Err(err);
        }
        if !reply.is_success() {
            return Err(DiskError::Status(reply.status));
        }
        let status: OperationStatus = reply
            .json()
            .map_err(|e| DiskError::Malformed(format!("{:#}", e)))?;
        Ok(status.status)
    }

    fn accepted(reply: &Reply) -> Result<OperationLink, DiskError> {
        if let Some(err) = Self::api_error(reply) {
            return Err(err);
        }
        if !reply.is_success() {
            return Err(DiskError::Status(reply.status));
        }
        if reply.body.trim().is_empty() {
            return Ok(OperationLink::default());
        }
        reply.json().map_err(|e| DiskError::Malformed(format!("{:#}", e)))
    }

    fn api_error(reply: &Reply) -> Option<DiskError> {
        let body = ApiErrorBody::parse(reply);
        let error = body.error.clone()?;
        Some(DiskError::Api {
            error,
            message: body.text(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockTransport;
    use reqwest::Method;
    use std::time::Duration;

    fn config() -> DiskConfig {
        DiskConfig {
            base_url: "https://disk.test".into(),
            auth_scheme: "OAuth".into(),
            upload_timeout: Duration::from_secs(30),
        }
    }

    fn reply(status: u16, body: &str) -> Reply {
        Reply {
            status,
            content_length: None,
            body: body.into(),
        }
    }

    fn client_answering(status: u16, body: &'static str) -> DiskClient<MockTransport> {
        let mut http = MockTransport::new();
        http.expect_send()
            .times(1)
            .returning(move |_| Ok(reply(status, body)));
        DiskClient::new(http, config(), "token")
    }

    #[test]
    fn test_create_folder_sends_put_with_auth() {
        let mut http = MockTransport::new();
        http.expect_send()
            .withf(|req| {
                req.method == Method::PUT
                    && req.url == "https://disk.test/v1/disk/resources?path=shiba"
                    && req.authorization.as_deref() == Some("OAuth secret")
            })
            .times(1)
            .returning(|_| Ok(reply(201, "")));
        let disk = DiskClient::new(http, config(), " secret\n");
        assert!(disk.create_folder("shiba"));
    }

    #[test]
    fn test_create_folder_already_exists_is_success() {
        let disk = client_answering(409, r#"{"error":"DiskPathPointsToExistentDirectoryError","message":"exists"}"#);
        assert!(disk.create_folder("cats"));
    }

    #[test]
    fn test_create_folder_rejected() {
        let disk = client_answering(401, r#"{"error":"UnauthorizedError","message":"Не авторизован."}"#);
        assert!(!disk.create_folder("cats"));

        let disk = client_answering(500, "oops");
        assert!(!disk.create_folder("cats"));
    }

    #[test]
    fn test_create_folder_transport_error() {
        let mut http = MockTransport::new();
        http.expect_send()
            .returning(|_| Err(anyhow::anyhow!("connection refused")));
        let disk = DiskClient::new(http, config(), "token");
        assert!(!disk.create_folder("cats"));
    }

    #[test]
    fn test_upload_from_url_accepted() {
        let mut http = MockTransport::new();
        http.expect_send()
            .withf(|req| {
                req.method == Method::POST
                    && req.url.starts_with("https://disk.test/v1/disk/resources/upload?")
                    && req.url.contains("url=https%3A%2F%2Fimages.test%2Fa.jpg")
                    && req.url.contains("path=cats%2Fa.jpg")
                    && req.timeout == Some(Duration::from_secs(30))
            })
            .times(1)
            .returning(|_| {
                Ok(reply(
                    202,
                    r#"{"href":"https://disk.test/v1/disk/operations/42","method":"GET","templated":false}"#,
                ))
            });
        let disk = DiskClient::new(http, config(), "token");
        let link = disk
            .upload_from_url("https://images.test/a.jpg", "cats/a.jpg")
            .unwrap();
        assert_eq!(link.href, "https://disk.test/v1/disk/operations/42");
        assert_eq!(link.method.as_deref(), Some("GET"));
    }

    #[test]
    fn test_upload_from_url_error_document() {
        let disk = client_answering(
            507,
            r#"{"error":"DiskNotEnoughSpaceError","message":"Not enough space","description":"no space"}"#,
        );
        match disk.upload_from_url("https://images.test/a.jpg", "cats/a.jpg") {
            Err(DiskError::Api { error, message }) => {
                assert_eq!(error, "DiskNotEnoughSpaceError");
                assert_eq!(message, "Not enough space");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_upload_from_url_bare_status() {
        let disk = client_answering(503, "");
        assert!(matches!(
            disk.upload_from_url("https://images.test/a.jpg", "cats/a.jpg"),
            Err(DiskError::Status(503))
        ));
    }

    #[test]
    fn test_upload_from_url_transport_error() {
        let mut http = MockTransport::new();
        http.expect_send()
            .returning(|_| Err(anyhow::anyhow!("timed out")));
        let disk = DiskClient::new(http, config(), "token");
        let err = disk
            .upload_from_url("https://images.test/a.jpg", "cats/a.jpg")
            .unwrap_err();
        assert!(matches!(err, DiskError::Transport(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_operation_status() {
        let mut http = MockTransport::new();
        http.expect_send()
            .withf(|req| req.method == Method::GET && req.url == "https://disk.test/v1/disk/operations/42")
            .times(1)
            .returning(|_| Ok(reply(200, r#"{"status":"in-progress"}"#)));
        let disk = DiskClient::new(http, config(), "token");
        let link = OperationLink {
            href: "https://disk.test/v1/disk/operations/42".into(),
            ..Default::default()
        };
        assert_eq!(disk.operation_status(&link).unwrap(), "in-progress");
    }

    #[test]
    fn test_operation_status_without_href() {
        let disk = DiskClient::new(MockTransport::new(), config(), "token");
        assert!(matches!(
            disk.operation_status(&OperationLink::default()),
            Err(DiskError::Malformed(_))
        ));
    }
}

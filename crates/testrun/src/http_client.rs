use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use testrun_protocol::{
    Device, EditDeviceRequest, ErrorResponse, HostInterfaces, Profile, StartRequest, SystemConfig,
    SystemVersion, TestrunStatus, PATH_DEVICE, PATH_DEVICES, PATH_DEVICE_DELETE, PATH_DEVICE_EDIT,
    PATH_PROFILES, PATH_SYSTEM_CONFIG, PATH_SYSTEM_INTERFACES, PATH_SYSTEM_START,
    PATH_SYSTEM_STATUS, PATH_SYSTEM_STOP, PATH_SYSTEM_VERSION,
};
use url::Url;

use crate::client::{ClientError, TestrunClient};

type Classify = fn(StatusCode, String) -> ClientError;

/// [`TestrunClient`] over the Testrun REST API.
#[derive(Debug, Clone)]
pub struct HttpTestrunClient {
    client: reqwest::Client,
    base: Url,
}

impl HttpTestrunClient {
    pub fn new(api_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut base =
            Url::parse(api_url.trim()).with_context(|| format!("parse api url: {api_url}"))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .user_agent(format!("trs/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("build reqwest client")?;

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|err| ClientError::Transport(format!("build url for {path}: {err}")))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        what: &'static str,
        classify: Classify,
    ) -> Result<T, ClientError> {
        let resp = self
            .client
            .get(self.url(path)?)
            .send()
            .await
            .map_err(transport)?;
        read_json(resp, what, classify).await
    }

    /// Sends `body` and only checks the status; the response body is not used.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
        classify: Classify,
    ) -> Result<(), ClientError> {
        let resp = self
            .client
            .request(method, self.url(path)?)
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        expect_success(resp, classify).await
    }
}

#[async_trait]
impl TestrunClient for HttpTestrunClient {
    async fn interfaces(&self) -> Result<HostInterfaces, ClientError> {
        self.get(PATH_SYSTEM_INTERFACES, "interfaces", classify_default)
            .await
    }

    async fn system_config(&self) -> Result<SystemConfig, ClientError> {
        self.get(PATH_SYSTEM_CONFIG, "system config", classify_config)
            .await
    }

    async fn system_status(&self) -> Result<TestrunStatus, ClientError> {
        self.get(PATH_SYSTEM_STATUS, "system status", classify_default)
            .await
    }

    async fn devices(&self) -> Result<Vec<Device>, ClientError> {
        self.get(PATH_DEVICES, "devices", classify_default).await
    }

    async fn risk_profiles(&self) -> Result<Vec<Profile>, ClientError> {
        self.get(PATH_PROFILES, "risk profiles", classify_default)
            .await
    }

    async fn version(&self) -> Result<SystemVersion, ClientError> {
        self.get(PATH_SYSTEM_VERSION, "system version", classify_default)
            .await
    }

    async fn start_testrun(&self, device: &Device) -> Result<TestrunStatus, ClientError> {
        let resp = self
            .client
            .post(self.url(PATH_SYSTEM_START)?)
            .json(&StartRequest::for_device(device))
            .send()
            .await
            .map_err(transport)?;
        read_json(resp, "start response", classify_start).await
    }

    async fn stop_testrun(&self) -> Result<(), ClientError> {
        let resp = self
            .client
            .post(self.url(PATH_SYSTEM_STOP)?)
            .send()
            .await
            .map_err(transport)?;
        expect_success(resp, classify_stop).await
    }

    async fn create_device(&self, device: &Device) -> Result<(), ClientError> {
        self.send(reqwest::Method::POST, PATH_DEVICE, device, classify_device)
            .await
    }

    async fn edit_device(&self, mac_addr: &str, device: &Device) -> Result<(), ClientError> {
        let body = EditDeviceRequest {
            mac_addr: mac_addr.to_owned(),
            device: device.clone(),
        };
        self.send(reqwest::Method::POST, PATH_DEVICE_EDIT, &body, classify_device)
            .await
    }

    async fn delete_device(&self, device: &Device) -> Result<(), ClientError> {
        self.send(
            reqwest::Method::DELETE,
            PATH_DEVICE_DELETE,
            device,
            classify_device,
        )
        .await
    }
}

async fn expect_success(resp: reqwest::Response, classify: Classify) -> Result<(), ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let text = resp.text().await.map_err(transport)?;
    Err(classify(status, error_message(&text)))
}

async fn read_json<T: DeserializeOwned>(
    resp: reqwest::Response,
    what: &'static str,
    classify: Classify,
) -> Result<T, ClientError> {
    let status = resp.status();
    let text = resp.text().await.map_err(transport)?;

    if !status.is_success() {
        return Err(classify(status, error_message(&text)));
    }

    serde_json::from_str(&text).map_err(|err| ClientError::Decode {
        what,
        message: err.to_string(),
    })
}

fn error_message(body: &str) -> String {
    if let Ok(resp) = serde_json::from_str::<ErrorResponse>(body) {
        return resp.error;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response".to_owned()
    } else {
        trimmed.to_owned()
    }
}

fn transport(err: reqwest::Error) -> ClientError {
    ClientError::Transport(err.to_string())
}

fn mentions_missing_config(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("not configured") || lower.contains("configuration missing")
}

fn classify_default(status: StatusCode, message: String) -> ClientError {
    if mentions_missing_config(&message) {
        ClientError::ConfigurationMissing(message)
    } else {
        ClientError::Backend {
            status: status.as_u16(),
            message,
        }
    }
}

fn classify_config(status: StatusCode, message: String) -> ClientError {
    if status == StatusCode::NOT_FOUND {
        ClientError::ConfigurationMissing(message)
    } else {
        classify_default(status, message)
    }
}

fn classify_start(status: StatusCode, message: String) -> ClientError {
    match status {
        StatusCode::INTERNAL_SERVER_ERROR => ClientError::ConfigurationMissing(message),
        StatusCode::CONFLICT | StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => {
            ClientError::Rejected {
                status: status.as_u16(),
                message,
            }
        }
        _ => classify_default(status, message),
    }
}

fn classify_stop(status: StatusCode, message: String) -> ClientError {
    if status == StatusCode::NOT_FOUND {
        ClientError::Rejected {
            status: status.as_u16(),
            message,
        }
    } else {
        classify_default(status, message)
    }
}

fn classify_device(status: StatusCode, message: String) -> ClientError {
    match status {
        StatusCode::CONFLICT
        | StatusCode::NOT_FOUND
        | StatusCode::BAD_REQUEST
        | StatusCode::FORBIDDEN => ClientError::Rejected {
            status: status.as_u16(),
            message,
        },
        _ => classify_default(status, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let client =
            HttpTestrunClient::new("http://127.0.0.1:8000/api", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url().as_str(), "http://127.0.0.1:8000/api/");
        assert_eq!(
            client.url(PATH_SYSTEM_STATUS).unwrap().as_str(),
            "http://127.0.0.1:8000/api/system/status"
        );
    }

    #[test]
    fn error_message_prefers_error_field() {
        assert_eq!(
            error_message(r#"{"error":"Testrun is not currently running"}"#),
            "Testrun is not currently running"
        );
        assert_eq!(error_message("  boom "), "boom");
        assert_eq!(error_message(""), "empty response");
    }

    #[test]
    fn start_status_codes_are_classified() {
        assert!(matches!(
            classify_start(StatusCode::INTERNAL_SERVER_ERROR, "x".to_owned()),
            ClientError::ConfigurationMissing(_)
        ));
        assert!(matches!(
            classify_start(StatusCode::CONFLICT, "x".to_owned()),
            ClientError::Rejected { status: 409, .. }
        ));
        assert!(matches!(
            classify_start(StatusCode::BAD_GATEWAY, "x".to_owned()),
            ClientError::Backend { status: 502, .. }
        ));
    }

    #[test]
    fn device_status_codes_are_rejections() {
        for code in [
            StatusCode::CONFLICT,
            StatusCode::NOT_FOUND,
            StatusCode::BAD_REQUEST,
            StatusCode::FORBIDDEN,
        ] {
            assert_eq!(
                classify_device(code, "x".to_owned()),
                ClientError::Rejected {
                    status: code.as_u16(),
                    message: "x".to_owned(),
                }
            );
        }
        assert!(matches!(
            classify_device(StatusCode::INTERNAL_SERVER_ERROR, "x".to_owned()),
            ClientError::Backend { status: 500, .. }
        ));
    }

    #[test]
    fn default_classifier_spots_missing_configuration() {
        assert!(matches!(
            classify_default(
                StatusCode::SERVICE_UNAVAILABLE,
                "System is not configured correctly".to_owned()
            ),
            ClientError::ConfigurationMissing(_)
        ));
    }
}

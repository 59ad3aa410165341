use async_trait::async_trait;
use testrun_protocol::{Device, HostInterfaces, Profile, SystemConfig, SystemVersion, TestrunStatus};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The backend has no usable system configuration yet.
    #[error("system configuration missing: {0}")]
    ConfigurationMissing(String),
    /// The backend understood the request and refused it.
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("backend error ({status}): {message}")]
    Backend { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("decode {what}: {message}")]
    Decode { what: &'static str, message: String },
}

/// Backend operations the store depends on.
#[async_trait]
pub trait TestrunClient: Send + Sync {
    async fn interfaces(&self) -> Result<HostInterfaces, ClientError>;
    async fn system_config(&self) -> Result<SystemConfig, ClientError>;
    async fn system_status(&self) -> Result<TestrunStatus, ClientError>;
    async fn devices(&self) -> Result<Vec<Device>, ClientError>;
    async fn risk_profiles(&self) -> Result<Vec<Profile>, ClientError>;
    async fn version(&self) -> Result<SystemVersion, ClientError>;
    async fn start_testrun(&self, device: &Device) -> Result<TestrunStatus, ClientError>;
    async fn stop_testrun(&self) -> Result<(), ClientError>;

    async fn create_device(&self, device: &Device) -> Result<(), ClientError>;
    /// Replaces the device registered under `mac_addr`.
    async fn edit_device(&self, mac_addr: &str, device: &Device) -> Result<(), ClientError>;
    async fn delete_device(&self, device: &Device) -> Result<(), ClientError>;
}

//! CloudStack provider error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudStackError {
    #[error("cmk not found. Please install CloudMonkey: https://github.com/apache/cloudstack-cloudmonkey")]
    CmkNotFound,

    #[error("cmk command failed: {0}")]
    CommandFailed(String),

    #[error("Virtual machine not found: {0}")]
    VirtualMachineNotFound(String),

    #[error("Unexpected cmk response: {0}")]
    UnexpectedResponse(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<CloudStackError> for infraflow_cloud::CloudError {
    fn from(err: CloudStackError) -> Self {
        use infraflow_cloud::CloudError;
        match err {
            CloudStackError::CmkNotFound => {
                CloudError::CommandFailed("cmk is not installed".to_string())
            }
            CloudStackError::CommandFailed(msg) => CloudError::ApiError(msg),
            CloudStackError::VirtualMachineNotFound(id) => CloudError::ResourceNotFound(id),
            CloudStackError::UnexpectedResponse(msg) => CloudError::InvalidResponse(msg),
            CloudStackError::JsonError(e) => CloudError::Json(e),
            CloudStackError::IoError(e) => CloudError::Io(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudStackError>;

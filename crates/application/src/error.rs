use std::time::Duration;

use domain::{DomainError, RepositoryError};
use thiserror::Error;

use crate::broadcaster::BroadcastError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    /// 存储调用超过配置的超时时间
    #[error("store call timed out after {0:?}")]
    StoreTimeout(Duration),
    #[error("broadcast error: {0}")]
    Broadcast(#[from] BroadcastError),
    /// 连接已断开，后续事件一律丢弃
    #[error("connection closed")]
    ConnectionClosed,
}

impl ApplicationError {
    /// 存储不可用：I/O 失败或超时。冲突与未找到不算。
    pub fn is_store_unavailable(&self) -> bool {
        matches!(
            self,
            ApplicationError::StoreTimeout(_)
                | ApplicationError::Repository(RepositoryError::Storage { .. })
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ApplicationError::Domain(err) if err.is_validation())
    }
}

//! 领域模型错误定义
//!
//! 区分业务校验失败（`DomainError`）与存储层失败（`RepositoryError`）。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 输入校验失败：空文本、超长文本、空房间名等
    #[error("invalid argument {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// 同名房间已存在（名称按去除首尾空白后比较）
    #[error("room already exists: {name}")]
    RoomAlreadyExists { name: String },

    /// 按 ID 查询的房间不存在
    #[error("room not found")]
    RoomNotFound,

    /// 连接没有在线记录或当前不在任何房间
    #[error("connection is not in a room")]
    NotInRoom,
}

impl DomainError {
    /// 创建输入校验错误
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// 创建房间重名错误
    pub fn room_already_exists(name: impl Into<String>) -> Self {
        Self::RoomAlreadyExists { name: name.into() }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}

/// 存储层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,

    /// 唯一约束冲突（例如房间名重复）
    #[error("unique constraint violated")]
    Conflict,

    #[error("storage failure: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

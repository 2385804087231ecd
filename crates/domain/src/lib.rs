//! 聊天室系统核心领域模型
//!
//! 包含房间、消息等持久化实体，连接/用户标识等值对象，
//! 以及客户端与服务器之间往来的实时事件。

pub mod errors;
pub mod events;
pub mod message;
pub mod room;
pub mod value_objects;

// 重新导出常用类型
pub use errors::*;
pub use events::*;
pub use message::*;
pub use room::*;
pub use value_objects::*;

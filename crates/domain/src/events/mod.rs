//! 实时事件定义
//!
//! 客户端与服务器之间通过 `{"event": ..., "data": ...}` 帧交换的事件。

pub mod realtime;

// 重新导出事件类型
pub use realtime::*;

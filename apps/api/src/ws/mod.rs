//! WebSocket surfaces

pub mod logs;

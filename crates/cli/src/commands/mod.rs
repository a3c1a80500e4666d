pub mod ask;
pub mod bootstrap;
pub mod chat;
pub mod config_cmd;

// src/core/mod.rs

pub mod comments;
pub mod completion;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod flags;
pub mod help;
pub mod registration;
pub mod registry;

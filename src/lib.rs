pub mod app;
pub mod auth;
pub mod fs_ops;
pub mod history;
pub mod transfer;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{}", .0)]
    Custom(String),

    #[error("IO::{:?}: {}", .0, .0)]
    Io(#[from] std::io::Error),

    #[error("Json::{}", .0)]
    Json(#[from] serde_json::Error),

    #[error("FlexiLogger::{:?}: {}", .0, .0)]
    FlexiLogger(#[from] flexi_logger::FlexiLoggerError),

    #[error("Config::{}", .0)]
    Config(#[from] isme_core::config::ConfigError),

    #[error("Auth::{}: {}", .0.kind(), .0)]
    Auth(#[from] isme_core::AuthError),

    #[error("Cipher::{}", .0)]
    Cipher(#[from] isme_core::auth::CipherError),

    #[error("Token::{}", .0)]
    Token(#[from] isme_core::auth::TokenError),
}

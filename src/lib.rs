#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod auth;
pub mod error;
pub mod mailmerge;
pub mod soap;

pub use auth::Credentials;
pub use error::{Error, Kind};
pub use mailmerge::Client;

pub type Result<T> = std::result::Result<T, Error>;

/// Public endpoint of the LiveDocx mail-merge service.
pub const DEFAULT_ENDPOINT: &str = "https://api.livedocx.com/1.2/mailmerge.asmx";

//! Session client for a SOAP mail-merge service.
//!
//! The flow the service expects is:
//! - log in
//! - pick a template (local upload or one stored on the service)
//! - assign field values and repeating blocks
//! - create the document
//! - retrieve it in one or more output formats
//!
//! The client does not enforce that order. Out-of-order calls reach the
//! service, which rejects them with a fault.

mod client;
mod config;
mod types;

pub use client::Client;
pub use config::{Config, DEFAULT_NAMESPACE, RawCredentials};
pub use types::{
    Block, DocumentFormat, FieldValues, ImageFormat, Pages, TemplateFormat, TemplateInfo, Zoom,
};

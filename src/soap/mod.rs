//! Transport seam between the session client and the remote service.
//!
//! The client never builds XML itself. It describes each remote operation as a
//! [`Call`] and hands it to a [`Transport`], which answers with the decoded
//! `<{Operation}Result>` element as a [`Reply`]. [`SoapTransport`] speaks
//! SOAP 1.1 over HTTP; tests substitute their own implementation.

mod envelope;
mod transport;

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::Result;
use crate::error::Error;

pub use transport::SoapTransport;

pub(crate) const STRING: &str = "string";
pub(crate) const ARRAY_OF_STRING: &str = "ArrayOfString";

/// Invokes a named remote operation and returns its result.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn invoke(&self, call: Call) -> Result<Reply>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for &T {
    async fn invoke(&self, call: Call) -> Result<Reply> {
        (**self).invoke(call).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn invoke(&self, call: Call) -> Result<Reply> {
        (**self).invoke(call).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn invoke(&self, call: Call) -> Result<Reply> {
        (**self).invoke(call).await
    }
}

/// A single typed parameter of a remote operation.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Param {
    Text(String),
    Int(i64),
    Bool(bool),
    /// Sent base64-encoded.
    Binary(Vec<u8>),
    /// Sent as `ArrayOfArrayOfString`.
    Table(Vec<Vec<String>>),
}

impl Param {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Param::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Param::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_table(&self) -> Option<&[Vec<String>]> {
        match self {
            Param::Table(rows) => Some(rows),
            _ => None,
        }
    }
}

/// A remote operation name with its parameters, in wire order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    operation: &'static str,
    params: Vec<(&'static str, Param)>,
}

impl Call {
    #[must_use]
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn param(mut self, name: &'static str, value: Param) -> Self {
        self.params.push((name, value));
        self
    }

    #[must_use]
    pub fn text<S: Into<String>>(self, name: &'static str, value: S) -> Self {
        self.param(name, Param::Text(value.into()))
    }

    #[must_use]
    pub fn int(self, name: &'static str, value: i64) -> Self {
        self.param(name, Param::Int(value))
    }

    #[must_use]
    pub fn bool(self, name: &'static str, value: bool) -> Self {
        self.param(name, Param::Bool(value))
    }

    #[must_use]
    pub fn binary(self, name: &'static str, value: Vec<u8>) -> Self {
        self.param(name, Param::Binary(value))
    }

    #[must_use]
    pub fn table(self, name: &'static str, rows: Vec<Vec<String>>) -> Self {
        self.param(name, Param::Table(rows))
    }

    #[must_use]
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    #[must_use]
    pub fn params(&self) -> &[(&'static str, Param)] {
        &self.params
    }

    /// Looks up a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Param> {
        self.params
            .iter()
            .find_map(|(key, value)| (*key == name).then_some(value))
    }
}

/// The decoded result element of a remote operation.
///
/// Mirrors the XML shape the service answers with: an element name, its text
/// content and its child elements. The typed accessors interpret that shape
/// the way the service's schema does (`string` items, `ArrayOfString` rows).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reply {
    name: String,
    text: String,
    children: Vec<Reply>,
    missing: bool,
}

impl Reply {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A response that carried no result element at all.
    ///
    /// Operations without a return value answer this way. Reading it as a
    /// boolean or as binary content fails instead of yielding a default.
    #[must_use]
    pub fn missing() -> Self {
        Self {
            missing: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn bool(value: bool) -> Self {
        Self::text(value.to_string())
    }

    #[must_use]
    pub fn binary(bytes: &[u8]) -> Self {
        Self::text(STANDARD.encode(bytes))
    }

    #[must_use]
    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            children: items
                .into_iter()
                .map(|item| Self::element(STRING, item.into()))
                .collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn table<R, I, S>(rows: R) -> Self
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            children: rows
                .into_iter()
                .map(|row| Self {
                    name: ARRAY_OF_STRING.to_owned(),
                    ..Self::strings(row)
                })
                .collect(),
            ..Self::default()
        }
    }

    pub(crate) fn element(name: &str, text: String) -> Self {
        Self {
            name: name.to_owned(),
            text,
            children: Vec::new(),
            missing: false,
        }
    }

    pub(crate) fn push_child(&mut self, child: Reply) {
        self.children.push(child);
    }

    pub(crate) fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn children(&self) -> &[Reply] {
        &self.children
    }

    /// Whether the response had no result element.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.missing
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.children.is_empty()
    }

    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }

    pub fn into_bool(self) -> Result<bool> {
        self.require("a boolean")?;
        match self.text.trim() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(Error::decode(format!(
                "expected a boolean result, got `{other}`"
            ))),
        }
    }

    pub fn into_binary(self) -> Result<Vec<u8>> {
        self.require("binary content")?;
        decode_base64(&self.text)
    }

    /// Text of every `string` child, in order.
    #[must_use]
    pub fn into_strings(self) -> Vec<String> {
        self.children
            .into_iter()
            .filter(|child| child.name == STRING)
            .map(|child| child.text)
            .collect()
    }

    /// Every `ArrayOfString` child as one row.
    #[must_use]
    pub fn into_table(self) -> Vec<Vec<String>> {
        self.children
            .into_iter()
            .filter(|child| child.name == ARRAY_OF_STRING)
            .map(Reply::into_strings)
            .collect()
    }

    /// Every `string` child decoded from base64.
    pub fn into_binaries(self) -> Result<Vec<Vec<u8>>> {
        self.require("a list of binary items")?;
        self.into_strings()
            .iter()
            .map(|item| decode_base64(item))
            .collect()
    }

    fn require(&self, expected: &str) -> Result<()> {
        if self.missing {
            return Err(Error::decode(format!(
                "expected {expected}, the response has no result"
            )));
        }
        Ok(())
    }
}

fn decode_base64(text: &str) -> Result<Vec<u8>> {
    // the service wraps long base64 payloads
    let compact: String = text.split_ascii_whitespace().collect();
    Ok(STANDARD.decode(compact)?)
}

use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

use reqwest::StatusCode;

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// The service rejected the supplied credentials
    Authentication,
    /// A local file could not be read
    Io,
    /// The service faulted, answered with a non-success status, or sent a reply we cannot read
    Remote,
    /// Input rejected before anything was sent to the service
    Validation,
    /// The request never produced a response (connection, TLS, timeout)
    Transport,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl Error {
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
            backtrace: Backtrace::capture(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    #[must_use]
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    #[must_use]
    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    #[must_use]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let e = self.source.as_deref()?;
        e.downcast_ref::<E>()
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Validation {
            reason: message.into(),
        }
        .into()
    }

    pub fn status<S: Into<String>>(status_code: StatusCode, operation: &str, message: S) -> Self {
        Status {
            status_code,
            operation: operation.to_owned(),
            message: message.into(),
        }
        .into()
    }

    pub fn fault<C: Into<String>, R: Into<String>>(operation: &str, code: C, reason: R) -> Self {
        Fault {
            operation: operation.to_owned(),
            code: code.into(),
            reason: reason.into(),
        }
        .into()
    }

    pub fn decode<S: Into<String>>(message: S) -> Self {
        Decode {
            reason: message.into(),
        }
        .into()
    }

    /// Re-labels a rejected login: a fault from the service, or credentials
    /// refused before they were sent. Transport and status errors keep their kind.
    pub(crate) fn into_authentication(self) -> Self {
        let fault = self.kind == Kind::Remote && self.downcast_ref::<Fault>().is_some();
        let refused = self.kind == Kind::Validation && self.downcast_ref::<Validation>().is_some();
        if !fault && !refused {
            return self;
        }

        Self { kind: Kind::Authentication, ..self }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{:?}: {}", self.kind, src),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// A `soap:Fault` returned by the service.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub operation: String,
    pub code: String,
    pub reason: String,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} faulted with {}: {}",
            self.operation, self.code, self.reason
        )
    }
}

impl StdError for Fault {}

/// A non-success HTTP response that did not carry a SOAP fault.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub status_code: StatusCode,
    pub operation: String,
    pub message: String,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error({}) calling {}: {}",
            self.status_code, self.operation, self.message
        )
    }
}

impl StdError for Status {}

/// A reply whose shape does not match what the operation returns.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decode {
    pub reason: String,
}

impl fmt::Display for Decode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unexpected reply: {}", self.reason)
    }
}

impl StdError for Decode {}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub reason: String,
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid: {}", self.reason)
    }
}

impl StdError for Validation {}

impl From<Fault> for Error {
    fn from(err: Fault) -> Self {
        Error::with_source(Kind::Remote, err)
    }
}

impl From<Status> for Error {
    fn from(err: Status) -> Self {
        Error::with_source(Kind::Remote, err)
    }
}

impl From<Decode> for Error {
    fn from(err: Decode) -> Self {
        Error::with_source(Kind::Remote, err)
    }
}

impl From<Validation> for Error {
    fn from(err: Validation) -> Self {
        Error::with_source(Kind::Validation, err)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::with_source(Kind::Io, e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::with_source(Kind::Transport, e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::with_source(Kind::Validation, e)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::with_source(Kind::Remote, e)
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::with_source(Kind::Remote, e)
    }
}

use std::time::Duration;

use bon::Builder;
use secrecy::SecretString;

use crate::Result;
use crate::auth::Credentials;

/// Target namespace of the LiveDocx mail-merge service.
pub const DEFAULT_NAMESPACE: &str = "http://api.livedocx.com/1.2/mailmerge/";

/// Raw login values typically read from app-level configuration.
#[derive(Clone, Debug)]
pub struct RawCredentials {
    pub username: String,
    pub password: SecretString,
}

impl TryFrom<RawCredentials> for Credentials {
    type Error = crate::error::Error;

    fn try_from(raw: RawCredentials) -> Result<Self> {
        Credentials::new(raw.username.trim(), raw.password)
    }
}

/// Transport settings for [`Client::new`](crate::mailmerge::Client::new).
///
/// No timeout is applied unless one is set; a call then waits as long as the
/// HTTP stack does.
#[non_exhaustive]
#[derive(Clone, Debug, Builder)]
pub struct Config {
    #[builder(into, default = DEFAULT_NAMESPACE.to_owned())]
    namespace: String,
    timeout: Option<Duration>,
    #[builder(into)]
    user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Config {
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }
}

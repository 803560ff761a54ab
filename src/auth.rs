use secrecy::{ExposeSecret as _, SecretString};

use crate::Result;
use crate::error::Error;

/// Login credentials for the service. The password never appears in `Debug` output.
#[derive(Clone, Debug)]
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    pub fn new<U: Into<String>>(username: U, password: SecretString) -> Result<Self> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(Error::validation("username cannot be empty"));
        }
        if password.expose_secret().is_empty() {
            return Err(Error::validation("password cannot be empty"));
        }

        Ok(Self { username, password })
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password(&self) -> &SecretString {
        &self.password
    }
}

pub mod state {
    /// The client has not logged in yet, or has logged out.
    #[non_exhaustive]
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Unauthenticated;

    /// The service accepted a login. The session token itself lives in the
    /// transport (a cookie for SOAP over HTTP).
    #[non_exhaustive]
    #[derive(Clone, Debug)]
    pub struct Authenticated {
        pub username: String,
    }

    pub trait State: sealed::Sealed {}

    impl State for Unauthenticated {}
    impl State for Authenticated {}

    mod sealed {
        pub trait Sealed {}

        impl Sealed for super::Unauthenticated {}
        impl Sealed for super::Authenticated {}
    }
}

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use url::Url;

use crate::Result;
use crate::error::Error;
use crate::mailmerge::Config;
use crate::soap::envelope::{self, Body};
use crate::soap::{Call, Reply, Transport};

const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";
const SOAP_ACTION: &str = "SOAPAction";

/// SOAP 1.1 over HTTP POST.
///
/// The service keeps its session in a cookie, so the underlying HTTP client
/// carries a cookie store and every call made through one `SoapTransport`
/// belongs to the same session.
#[derive(Clone, Debug)]
pub struct SoapTransport {
    endpoint: Url,
    namespace: String,
    client: ReqwestClient,
}

impl SoapTransport {
    pub fn new(endpoint: &str, config: &Config) -> Result<Self> {
        let mut builder = ReqwestClient::builder().cookie_store(true);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = config.user_agent() {
            let mut headers = HeaderMap::new();
            headers.insert(
                USER_AGENT,
                HeaderValue::from_str(user_agent)
                    .map_err(|e| Error::validation(format!("invalid user agent: {e}")))?,
            );
            builder = builder.default_headers(headers);
        }

        Self::with_client(endpoint, config, builder.build()?)
    }

    /// Uses a caller-supplied HTTP client. It must keep cookies for the
    /// session to survive between calls.
    pub fn with_client(endpoint: &str, config: &Config, client: ReqwestClient) -> Result<Self> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            namespace: config.namespace().to_owned(),
            client,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn soap_action(&self, operation: &str) -> Result<HeaderValue> {
        HeaderValue::from_str(&format!(r#""{}{operation}""#, self.namespace))
            .map_err(|e| Error::validation(format!("invalid SOAPAction for {operation}: {e}")))
    }
}

#[async_trait]
impl Transport for SoapTransport {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            level = "debug",
            skip(self, call),
            fields(operation = call.operation(), status_code = tracing::field::Empty)
        )
    )]
    async fn invoke(&self, call: Call) -> Result<Reply> {
        let operation = call.operation();
        let request = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .header(SOAP_ACTION, self.soap_action(operation)?)
            .body(envelope::encode(&self.namespace, &call))
            .build()?;

        let response = self.client.execute(request).await?;
        let status_code = response.status();

        #[cfg(feature = "tracing")]
        tracing::Span::current().record("status_code", status_code.as_u16());

        let text = response.text().await?;

        // faults usually come back as 500, so look at the body before the status
        match envelope::decode(operation, &text) {
            Ok(Body::Fault { code, reason }) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    status = %status_code,
                    operation,
                    code = %code,
                    reason = %reason,
                    "SOAP call faulted"
                );
                Err(Error::fault(operation, code, reason))
            }
            Ok(Body::Result(reply)) if status_code.is_success() => Ok(reply),
            Err(e) if status_code.is_success() => Err(e),
            _ => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    status = %status_code,
                    operation,
                    message = %text,
                    "SOAP call failed"
                );
                Err(Error::status(status_code, operation, text))
            }
        }
    }
}

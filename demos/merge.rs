//! Merges a local template and writes the result next to it.
//!
//! ```sh
//! LIVEDOCX_USERNAME=... LIVEDOCX_PASSWORD=... \
//!     cargo run --example merge --features tracing -- invoice.docx PDF
//! ```

use std::env;
use std::path::PathBuf;

use anyhow::Context as _;
use mailmerge_client::mailmerge::{Block, Config, DocumentFormat, RawCredentials};
use mailmerge_client::{Client, Credentials, DEFAULT_ENDPOINT};
use secrecy::SecretString;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = env::args().skip(1);
    let template = PathBuf::from(args.next().context("usage: merge <template> [format]")?);
    let format: DocumentFormat = args.next().as_deref().unwrap_or("PDF").parse()?;

    let credentials = Credentials::try_from(RawCredentials {
        username: env::var("LIVEDOCX_USERNAME").context("LIVEDOCX_USERNAME is not set")?,
        password: SecretString::from(
            env::var("LIVEDOCX_PASSWORD").context("LIVEDOCX_PASSWORD is not set")?,
        ),
    })?;
    let endpoint = env::var("LIVEDOCX_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_owned());

    let client = Client::new(&endpoint, &Config::default())?;
    let mut client = client.login_with(&credentials).await?;

    client.set_local_template(&template).await?;
    info!(fields = ?client.field_names().await?, blocks = ?client.block_names().await?, "template loaded");

    client.assign_values([
        ("customer", "Ann Example"),
        ("invoice_no", "2026-0042"),
        ("date", "18 October 2026"),
    ]);
    client.assign_block(
        "items",
        Block::from_records([
            [("item", "Widget"), ("qty", "2"), ("price", "9.90")],
            [("item", "Gadget"), ("qty", "5"), ("price", "4.50")],
        ])?,
    )?;

    client.create_document().await?;
    let document = client.retrieve_document(format).await?;

    let output = template.with_extension(format.to_string().to_lowercase());
    std::fs::write(&output, &document)
        .with_context(|| format!("cannot write {}", output.display()))?;
    info!(bytes = document.len(), path = %output.display(), "document written");

    client.logout().await?;
    Ok(())
}

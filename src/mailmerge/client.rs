use std::path::Path;

use secrecy::{ExposeSecret as _, SecretString};

use crate::Result;
use crate::auth::Credentials;
use crate::auth::state::{Authenticated, State, Unauthenticated};
use crate::error::Error;
use crate::mailmerge::{
    Block, Config, DocumentFormat, FieldValues, ImageFormat, Pages, TemplateFormat, TemplateInfo,
    Zoom,
};
use crate::soap::{Call, Reply, SoapTransport, Transport};

mod op {
    pub(super) const LOG_IN: &str = "LogIn";
    pub(super) const LOG_OUT: &str = "LogOut";
    pub(super) const SET_LOCAL_TEMPLATE: &str = "SetLocalTemplate";
    pub(super) const SET_REMOTE_TEMPLATE: &str = "SetRemoteTemplate";
    pub(super) const UPLOAD_TEMPLATE: &str = "UploadTemplate";
    pub(super) const DOWNLOAD_TEMPLATE: &str = "DownloadTemplate";
    pub(super) const DELETE_TEMPLATE: &str = "DeleteTemplate";
    pub(super) const TEMPLATE_EXISTS: &str = "TemplateExists";
    pub(super) const LIST_TEMPLATES: &str = "ListTemplates";
    pub(super) const SET_IGNORE_SUB_TEMPLATES: &str = "SetIgnoreSubTemplates";
    pub(super) const SET_FIELD_VALUES: &str = "SetFieldValues";
    pub(super) const SET_BLOCK_FIELD_VALUES: &str = "SetBlockFieldValues";
    pub(super) const CREATE_DOCUMENT: &str = "CreateDocument";
    pub(super) const RETRIEVE_DOCUMENT: &str = "RetrieveDocument";
    pub(super) const GET_FIELD_NAMES: &str = "GetFieldNames";
    pub(super) const GET_BLOCK_NAMES: &str = "GetBlockNames";
    pub(super) const GET_FONT_NAMES: &str = "GetFontNames";
    pub(super) const GET_BITMAPS: &str = "GetBitmaps";
    pub(super) const GET_ALL_BITMAPS: &str = "GetAllBitmaps";
    pub(super) const GET_METAFILES: &str = "GetMetafiles";
    pub(super) const GET_ALL_METAFILES: &str = "GetAllMetafiles";
}

/// Session client for the mail-merge service.
///
/// Starts [`Unauthenticated`]; [`Client::login`] turns it into an
/// [`Authenticated`] client, which carries every document operation. Field
/// and block assignments are kept locally and sent as part of
/// [`Client::create_document`].
#[derive(Clone, Debug)]
pub struct Client<S: State = Unauthenticated, T: Transport = SoapTransport> {
    transport: T,
    state: S,
    fields: FieldValues,
    blocks: Vec<(String, Block)>,
}

impl Client<Unauthenticated, SoapTransport> {
    /// Creates a client talking SOAP to `endpoint`.
    pub fn new(endpoint: &str, config: &Config) -> Result<Self> {
        Ok(Self::with_transport(SoapTransport::new(endpoint, config)?))
    }
}

impl<T: Transport> Client<Unauthenticated, T> {
    #[must_use]
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            state: Unauthenticated,
            fields: FieldValues::default(),
            blocks: Vec::new(),
        }
    }

    /// Opens a session. A fault from the service, and an empty username or
    /// password, are reported as
    /// [`Kind::Authentication`](crate::error::Kind::Authentication).
    ///
    /// The client is consumed either way. To retry after an error build a new
    /// one over the same transport; pass `&transport` or an `Arc` to
    /// [`Client::with_transport`] to keep it reusable.
    pub async fn login<U: Into<String>, P: Into<String>>(
        self,
        username: U,
        password: P,
    ) -> Result<Client<Authenticated, T>> {
        let credentials = Credentials::new(username, SecretString::from(password.into()))
            .map_err(Error::into_authentication)?;
        self.login_with(&credentials).await
    }

    /// Same as [`Client::login`] with credentials built ahead of time.
    pub async fn login_with(self, credentials: &Credentials) -> Result<Client<Authenticated, T>> {
        let call = Call::new(op::LOG_IN)
            .text("username", credentials.username())
            .text("password", credentials.password().expose_secret());
        self.transport
            .invoke(call)
            .await
            .map_err(Error::into_authentication)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(username = credentials.username(), "logged in");

        Ok(Client {
            transport: self.transport,
            state: Authenticated {
                username: credentials.username().to_owned(),
            },
            fields: FieldValues::default(),
            blocks: Vec::new(),
        })
    }
}

impl<S: State, T: Transport> Client<S, T> {
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub fn state(&self) -> &S {
        &self.state
    }
}

impl<T: Transport> Client<Authenticated, T> {
    #[must_use]
    pub fn username(&self) -> &str {
        &self.state.username
    }

    /// Ends the session. Pending assignments are discarded.
    ///
    /// If the service call fails the client is gone with it. Build a new one
    /// over the same transport and log in again; the old session expires on
    /// the service side.
    pub async fn logout(self) -> Result<Client<Unauthenticated, T>> {
        self.transport.invoke(Call::new(op::LOG_OUT)).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(username = %self.state.username, "logged out");

        Ok(Client::with_transport(self.transport))
    }

    /// Uploads a local template file and makes it the active template for
    /// this session only; it is not stored on the service.
    ///
    /// The extension must name a [`TemplateFormat`]. An unreadable file fails
    /// with [`Kind::Io`](crate::error::Kind::Io) before anything is sent.
    pub async fn set_local_template<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let format = TemplateFormat::from_path(path)?;
        let template = read_template(path)?;

        let call = Call::new(op::SET_LOCAL_TEMPLATE)
            .binary("template", template)
            .text("format", format.to_string());
        self.transport.invoke(call).await?;
        Ok(())
    }

    /// Makes a template already stored on the service the active one.
    pub async fn set_remote_template(&mut self, name: &str) -> Result<()> {
        self.ensure_template_exists(name).await?;

        let call = Call::new(op::SET_REMOTE_TEMPLATE).text("filename", name);
        self.transport.invoke(call).await?;
        Ok(())
    }

    /// Stores a local template on the service under `name`. Both must carry
    /// the same template extension.
    pub async fn upload_template<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<()> {
        let path = path.as_ref();
        let local = TemplateFormat::from_path(path)?;
        let remote = TemplateFormat::from_path(name)?;
        if local != remote {
            return Err(Error::validation(format!(
                "local template is {local} but remote name `{name}` is {remote}"
            )));
        }
        let template = read_template(path)?;

        let call = Call::new(op::UPLOAD_TEMPLATE)
            .binary("template", template)
            .text("filename", name);
        self.transport.invoke(call).await?;
        Ok(())
    }

    pub async fn download_template(&self, name: &str) -> Result<Vec<u8>> {
        self.ensure_template_exists(name).await?;

        let call = Call::new(op::DOWNLOAD_TEMPLATE).text("filename", name);
        self.transport.invoke(call).await?.into_binary()
    }

    pub async fn delete_template(&self, name: &str) -> Result<()> {
        self.ensure_template_exists(name).await?;

        let call = Call::new(op::DELETE_TEMPLATE).text("filename", name);
        self.transport.invoke(call).await?;
        Ok(())
    }

    pub async fn template_exists(&self, name: &str) -> Result<bool> {
        let call = Call::new(op::TEMPLATE_EXISTS).text("filename", name);
        self.transport.invoke(call).await?.into_bool()
    }

    pub async fn list_templates(&self) -> Result<Vec<TemplateInfo>> {
        self.transport
            .invoke(Call::new(op::LIST_TEMPLATES))
            .await?
            .into_table()
            .into_iter()
            .map(TemplateInfo::from_row)
            .collect()
    }

    /// Controls whether `INCLUDETEXT` sub-templates are merged.
    pub async fn set_ignore_sub_templates(&mut self, ignore: bool) -> Result<()> {
        let call = Call::new(op::SET_IGNORE_SUB_TEMPLATES).bool("ignoreSubTemplates", ignore);
        self.transport.invoke(call).await?;
        Ok(())
    }

    /// Records one field substitution for the next [`Client::create_document`].
    ///
    /// Re-assigning a field replaces its value. Field names are not checked
    /// locally.
    pub fn assign_value<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.fields.insert(name, value);
    }

    pub fn assign_values<I, N, V>(&mut self, values: I)
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        for (name, value) in values {
            self.fields.insert(name, value);
        }
    }

    /// Records the rows of a repeating region for the next
    /// [`Client::create_document`]. Re-assigning a block replaces it.
    pub fn assign_block<N: Into<String>>(&mut self, name: N, block: Block) -> Result<()> {
        let name = name.into();
        if block.columns().is_empty() {
            return Err(Error::validation(format!("block `{name}` has no columns")));
        }

        match self.blocks.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = block,
            None => self.blocks.push((name, block)),
        }
        Ok(())
    }

    /// Field values waiting for the next [`Client::create_document`].
    #[must_use]
    pub fn pending_values(&self) -> &FieldValues {
        &self.fields
    }

    /// Sends all pending assignments and renders the active template.
    ///
    /// Pending assignments are consumed even when a call fails, so values
    /// never carry over into the next document.
    pub async fn create_document(&mut self) -> Result<()> {
        let fields = std::mem::take(&mut self.fields);
        let blocks = std::mem::take(&mut self.blocks);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            fields = fields.len(),
            blocks = blocks.len(),
            "creating document"
        );

        if !fields.is_empty() {
            let call = Call::new(op::SET_FIELD_VALUES).table("fieldValues", fields.into_table());
            self.transport.invoke(call).await?;
        }
        for (name, block) in blocks {
            let call = Call::new(op::SET_BLOCK_FIELD_VALUES)
                .text("blockName", name)
                .table("blockFieldValues", block.into_table());
            self.transport.invoke(call).await?;
        }

        self.transport.invoke(Call::new(op::CREATE_DOCUMENT)).await?;
        Ok(())
    }

    /// Fetches the created document rendered as `format`, byte for byte.
    pub async fn retrieve_document(&self, format: DocumentFormat) -> Result<Vec<u8>> {
        let call = Call::new(op::RETRIEVE_DOCUMENT).text("format", format.to_string());
        self.transport.invoke(call).await?.into_binary()
    }

    pub async fn field_names(&self) -> Result<Vec<String>> {
        self.names(op::GET_FIELD_NAMES).await
    }

    pub async fn block_names(&self) -> Result<Vec<String>> {
        self.names(op::GET_BLOCK_NAMES).await
    }

    /// Fonts installed on the service that templates may use.
    pub async fn font_names(&self) -> Result<Vec<String>> {
        self.names(op::GET_FONT_NAMES).await
    }

    /// Renders pages of the created document as images, one per page.
    pub async fn bitmaps(
        &self,
        zoom: Zoom,
        format: ImageFormat,
        pages: Pages,
    ) -> Result<Vec<Vec<u8>>> {
        let call = match pages {
            Pages::All => Call::new(op::GET_ALL_BITMAPS).int("zoomFactor", zoom.percent().into()),
            Pages::Range { from, to } => Call::new(op::GET_BITMAPS)
                .int("zoomFactor", zoom.percent().into())
                .int("fromPage", from.into())
                .int("toPage", to.into()),
        }
        .text("format", format.to_string());

        self.transport.invoke(call).await?.into_binaries()
    }

    /// Renders pages of the created document as Windows metafiles, one per page.
    pub async fn metafiles(&self, pages: Pages) -> Result<Vec<Vec<u8>>> {
        let call = match pages {
            Pages::All => Call::new(op::GET_ALL_METAFILES),
            Pages::Range { from, to } => Call::new(op::GET_METAFILES)
                .int("fromPage", from.into())
                .int("toPage", to.into()),
        };

        self.transport.invoke(call).await?.into_binaries()
    }

    async fn names(&self, operation: &'static str) -> Result<Vec<String>> {
        self.transport
            .invoke(Call::new(operation))
            .await
            .map(Reply::into_strings)
    }

    async fn ensure_template_exists(&self, name: &str) -> Result<()> {
        if self.template_exists(name).await? {
            return Ok(());
        }

        Err(Error::validation(format!(
            "template `{name}` does not exist on the service"
        )))
    }
}

fn read_template(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        std::io::Error::new(
            e.kind(),
            format!("cannot read template `{}`: {e}", path.display()),
        )
        .into()
    })
}

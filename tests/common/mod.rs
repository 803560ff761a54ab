#![allow(dead_code, reason = "each test binary uses a different subset of the helpers")]

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use mailmerge_client::Result;
use mailmerge_client::error::Error;
use mailmerge_client::soap::{Call, Param, Reply, Transport};
use tempfile::TempDir;

pub const USERNAME: &str = "u";
pub const PASSWORD: &str = "p";
pub const DOCUMENT: &[u8] = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\nstub document\n";
pub const PAGES: u32 = 3;

/// In-memory stand-in for the mail-merge service.
///
/// Enforces the same sequencing the real service does (login first, a
/// template before `CreateDocument`, a created document before retrieval) and
/// records every call it receives.
#[derive(Debug, Default)]
pub struct StubService {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<Call>,
    logged_in: bool,
    template: Option<Vec<u8>>,
    created: bool,
    stored: Vec<(String, Vec<u8>)>,
    fail_on: Option<&'static str>,
}

impl StubService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stored_template(self, name: &str, bytes: &[u8]) -> Self {
        self.lock().stored.push((name.to_owned(), bytes.to_vec()));
        self
    }

    /// Makes every call to `operation` fault.
    pub fn fail_on(self, operation: &'static str) -> Self {
        self.lock().fail_on = Some(operation);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.lock().calls.iter().map(Call::operation).collect()
    }

    /// Calls to `operation`, in the order they were made.
    pub fn calls_to(&self, operation: &str) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .cloned()
            .collect()
    }

    pub fn active_template(&self) -> Option<Vec<u8>> {
        self.lock().template.clone()
    }

    pub fn stored_template(&self, name: &str) -> Option<Vec<u8>> {
        self.lock()
            .stored
            .iter()
            .find_map(|(key, bytes)| (key == name).then(|| bytes.clone()))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("stub lock poisoned")
    }
}

#[async_trait]
impl Transport for StubService {
    async fn invoke(&self, call: Call) -> Result<Reply> {
        let mut inner = self.lock();
        inner.calls.push(call.clone());
        inner.handle(&call)
    }
}

impl Inner {
    fn handle(&mut self, call: &Call) -> Result<Reply> {
        let operation = call.operation();
        let fault = |reason: &str| -> Result<Reply> {
            Err(Error::fault(operation, "soap:Server", reason))
        };

        if self.fail_on == Some(operation) {
            return fault("injected failure");
        }
        if operation == "LogIn" {
            return if text(call, "username") == USERNAME && text(call, "password") == PASSWORD {
                self.logged_in = true;
                Ok(Reply::empty())
            } else {
                Err(Error::fault(operation, "soap:Client", "Invalid username or password"))
            };
        }
        if !self.logged_in {
            return fault("Not logged in");
        }

        match operation {
            "LogOut" => {
                *self = Inner {
                    stored: std::mem::take(&mut self.stored),
                    calls: std::mem::take(&mut self.calls),
                    ..Inner::default()
                };
                Ok(Reply::empty())
            }
            "SetLocalTemplate" => {
                self.template = Some(binary(call, "template"));
                self.created = false;
                Ok(Reply::empty())
            }
            "SetRemoteTemplate" => match self.find(&text(call, "filename")) {
                Some(bytes) => {
                    self.template = Some(bytes);
                    self.created = false;
                    Ok(Reply::empty())
                }
                None => fault("Template not found"),
            },
            "TemplateExists" => Ok(Reply::bool(self.find(&text(call, "filename")).is_some())),
            "UploadTemplate" => {
                self.stored
                    .push((text(call, "filename"), binary(call, "template")));
                Ok(Reply::empty())
            }
            "DownloadTemplate" => match self.find(&text(call, "filename")) {
                Some(bytes) => Ok(Reply::binary(&bytes)),
                None => fault("Template not found"),
            },
            "DeleteTemplate" => {
                let name = text(call, "filename");
                self.stored.retain(|(key, _)| *key != name);
                Ok(Reply::empty())
            }
            "ListTemplates" => Ok(Reply::table(self.stored.iter().map(|(name, bytes)| {
                vec![
                    name.clone(),
                    bytes.len().to_string(),
                    "2026-01-01T09:00:00".to_owned(),
                    "2026-01-02T09:00:00".to_owned(),
                ]
            }))),
            "SetIgnoreSubTemplates" | "SetFieldValues" | "SetBlockFieldValues" => {
                Ok(Reply::empty())
            }
            "CreateDocument" => {
                if self.template.is_none() {
                    return fault("No template has been set");
                }
                self.created = true;
                Ok(Reply::empty())
            }
            "RetrieveDocument" => {
                if !self.created {
                    return fault("No document has been created");
                }
                match text(call, "format").as_str() {
                    "PDF" | "DOC" | "DOCX" => Ok(Reply::binary(DOCUMENT)),
                    _ => fault("Unsupported output format"),
                }
            }
            "GetFieldNames" => Ok(Reply::strings(["customer", "invoice_no"])),
            "GetBlockNames" => Ok(Reply::strings(["items"])),
            "GetFontNames" => Ok(Reply::strings(["Arial", "Courier New"])),
            "GetAllBitmaps" | "GetBitmaps" | "GetAllMetafiles" | "GetMetafiles" => {
                if !self.created {
                    return fault("No document has been created");
                }
                let (from, to) = match (int(call, "fromPage"), int(call, "toPage")) {
                    (Some(from), Some(to)) => (from, to.min(i64::from(PAGES))),
                    _ => (1, i64::from(PAGES)),
                };
                let label = call
                    .get("format")
                    .and_then(Param::as_text)
                    .unwrap_or("WMF")
                    .to_owned();
                Ok(Reply::strings(
                    (from..=to).map(|page| STANDARD.encode(format!("{label}:{page}"))),
                ))
            }
            _ => fault("Unknown operation"),
        }
    }

    fn find(&self, name: &str) -> Option<Vec<u8>> {
        self.stored
            .iter()
            .find_map(|(key, bytes)| (key == name).then(|| bytes.clone()))
    }
}

pub fn text(call: &Call, name: &str) -> String {
    call.get(name)
        .and_then(Param::as_text)
        .unwrap_or_default()
        .to_owned()
}

pub fn binary(call: &Call, name: &str) -> Vec<u8> {
    call.get(name)
        .and_then(Param::as_binary)
        .unwrap_or_default()
        .to_vec()
}

pub fn int(call: &Call, name: &str) -> Option<i64> {
    match call.get(name)? {
        Param::Int(value) => Some(*value),
        _ => None,
    }
}

/// A directory of template files for a test.
pub struct Templates {
    dir: TempDir,
}

impl Templates {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn write(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, bytes).expect("write template");
        path
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

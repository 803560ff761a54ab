use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::Result;
use crate::error::Error;

/// Output formats `RetrieveDocument` can render to.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum DocumentFormat {
    Doc,
    Docx,
    Html,
    Pdf,
    Txd,
    Txt,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 6] = [
        DocumentFormat::Doc,
        DocumentFormat::Docx,
        DocumentFormat::Html,
        DocumentFormat::Pdf,
        DocumentFormat::Txd,
        DocumentFormat::Txt,
    ];

    pub fn parse(value: &str) -> Result<DocumentFormat> {
        parse_upper(value, &Self::ALL, "document format")
    }
}

/// Formats accepted as merge templates.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum TemplateFormat {
    Doc,
    Docx,
    Rtf,
    Txd,
}

impl TemplateFormat {
    pub const ALL: [TemplateFormat; 4] = [
        TemplateFormat::Doc,
        TemplateFormat::Docx,
        TemplateFormat::Rtf,
        TemplateFormat::Txd,
    ];

    pub fn parse(value: &str) -> Result<TemplateFormat> {
        parse_upper(value, &Self::ALL, "template format")
    }

    /// Derives the format from a file name's extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<TemplateFormat> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                Error::validation(format!(
                    "template `{}` has no extension; expected one of: {}",
                    path.display(),
                    join(&Self::ALL)
                ))
            })?;

        Self::parse(extension)
    }
}

/// Formats `GetBitmaps` can rasterize pages to.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ImageFormat {
    Bmp,
    Gif,
    Jpg,
    Png,
    Tiff,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 5] = [
        ImageFormat::Bmp,
        ImageFormat::Gif,
        ImageFormat::Jpg,
        ImageFormat::Png,
        ImageFormat::Tiff,
    ];

    pub fn parse(value: &str) -> Result<ImageFormat> {
        parse_upper(value, &Self::ALL, "image format")
    }
}

impl FromStr for DocumentFormat {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        DocumentFormat::parse(s)
    }
}

impl FromStr for TemplateFormat {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        TemplateFormat::parse(s)
    }
}

impl FromStr for ImageFormat {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ImageFormat::parse(s)
    }
}

fn parse_upper<T: Copy + ToString>(value: &str, allowed: &[T], what: &str) -> Result<T> {
    let wanted = value.trim().to_ascii_uppercase();
    allowed
        .iter()
        .copied()
        .find(|candidate| candidate.to_string() == wanted)
        .ok_or_else(|| {
            Error::validation(format!(
                "invalid {what} `{}`; expected one of: {}",
                value.trim(),
                join(allowed)
            ))
        })
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("|")
}

/// Pending single-field substitutions, in first-assignment order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FieldValues {
    entries: Vec<(String, String)>,
}

impl FieldValues {
    /// Sets `name` to `value`, returning the value it replaces.
    pub fn insert<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) -> Option<String> {
        let name = name.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find_map(|(key, value)| (key == name).then_some(value.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// `[[names...], [values...]]`, the `ArrayOfArrayOfString` shape `SetFieldValues` takes.
    pub(crate) fn into_table(self) -> Vec<Vec<String>> {
        let (names, values) = self.entries.into_iter().unzip();
        vec![names, values]
    }
}

/// Rows for a repeating region of a template.
///
/// ```
/// # use mailmerge_client::mailmerge::Block;
/// let block = Block::new(["name", "qty"])
///     .row(["Widget", "2"])?
///     .row(["Gadget", "5"])?;
/// assert_eq!(block.rows().len(), 2);
/// # Ok::<(), mailmerge_client::error::Error>(())
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Block {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Block {
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a block from keyed records. The first record fixes the column
    /// order; every other record must carry exactly the same keys.
    pub fn from_records<R, I, K, V>(records: R) -> Result<Self>
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut block: Option<Block> = None;
        for record in records {
            let record: Vec<(String, String)> = record
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect();

            let current =
                block.get_or_insert_with(|| Block::new(record.iter().map(|(key, _)| key.clone())));
            let row = current
                .columns
                .iter()
                .map(|column| {
                    record
                        .iter()
                        .find_map(|(key, value)| (key == column).then(|| value.clone()))
                        .ok_or_else(|| Error::validation(format!("record is missing `{column}`")))
                })
                .collect::<Result<Vec<_>>>()?;
            if record.len() != current.columns.len() {
                return Err(Error::validation(format!(
                    "record has {} keys but the block has {} columns",
                    record.len(),
                    current.columns.len()
                )));
            }
            current.rows.push(row);
        }

        block.ok_or_else(|| Error::validation("a block needs at least one record"))
    }

    pub fn row<I, S>(mut self, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_row(values)?;
        Ok(self)
    }

    pub fn push_row<I, S>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let row: Vec<String> = values.into_iter().map(Into::into).collect();
        if row.len() != self.columns.len() {
            return Err(Error::validation(format!(
                "row has {} values but the block has {} columns",
                row.len(),
                self.columns.len()
            )));
        }

        self.rows.push(row);
        Ok(())
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// `[[columns...], [row...], ...]`, the shape `SetBlockFieldValues` takes.
    pub(crate) fn into_table(self) -> Vec<Vec<String>> {
        std::iter::once(self.columns).chain(self.rows).collect()
    }
}

/// Which pages of the created document to render.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Pages {
    #[default]
    All,
    #[non_exhaustive]
    Range { from: u32, to: u32 },
}

impl Pages {
    /// An inclusive, 1-based page range.
    pub fn range(from: u32, to: u32) -> Result<Pages> {
        if from == 0 {
            return Err(Error::validation("pages are numbered from 1"));
        }
        if from > to {
            return Err(Error::validation(format!(
                "page range {from}..={to} is empty"
            )));
        }

        Ok(Pages::Range { from, to })
    }
}

/// Zoom factor, in percent, for rendered bitmaps.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Zoom(u16);

impl Zoom {
    pub const MIN: u16 = 20;
    pub const MAX: u16 = 400;

    pub fn new(percent: u16) -> Result<Zoom> {
        if !(Self::MIN..=Self::MAX).contains(&percent) {
            return Err(Error::validation(format!(
                "zoom factor {percent} must be between {} and {}",
                Self::MIN,
                Self::MAX
            )));
        }

        Ok(Zoom(percent))
    }

    #[must_use]
    pub const fn percent(self) -> u16 {
        self.0
    }
}

impl Default for Zoom {
    fn default() -> Self {
        Zoom(100)
    }
}

impl TryFrom<u16> for Zoom {
    type Error = Error;

    fn try_from(percent: u16) -> Result<Self> {
        Zoom::new(percent)
    }
}

/// A template stored on the service, as reported by `ListTemplates`.
///
/// Every column is kept as the service sent it.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TemplateInfo {
    pub name: String,
    pub size: String,
    pub created_at: String,
    pub modified_at: String,
}

impl TemplateInfo {
    /// The size column as a byte count, when it is one.
    #[must_use]
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.trim().parse().ok()
    }

    pub(crate) fn from_row(row: Vec<String>) -> Result<Self> {
        let [name, size, created_at, modified_at]: [String; 4] =
            row.try_into().map_err(|row: Vec<String>| {
                Error::decode(format!(
                    "template listing rows have 4 columns, got {}",
                    row.len()
                ))
            })?;

        Ok(Self {
            name,
            size,
            created_at,
            modified_at,
        })
    }
}

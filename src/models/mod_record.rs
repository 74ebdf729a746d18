use super::files::{BinFile, ContentFile, Readme};
use super::settings::SettingsFragment;
use crate::error::{ModError, Result};
use crate::services::naming::format_mod_name;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Suffix the builder appends to ambiguous roots' filenames.
pub const UNDEFINED_SUFFIX: &str = "Udf";

/// Kind of installable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Mod,
    Dlc,
    Bin,
    Pat,
    /// Could not be told apart as mod or dlc; needs a user decision.
    Udf,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Mod => "mod",
            DataType::Dlc => "dlc",
            DataType::Bin => "bin",
            DataType::Pat => "pat",
            DataType::Udf => "udf",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mod" => Ok(DataType::Mod),
            "dlc" => Ok(DataType::Dlc),
            "bin" => Ok(DataType::Bin),
            "pat" => Ok(DataType::Pat),
            "udf" => Ok(DataType::Udf),
            other => Err(format!("unknown datatype: {other}")),
        }
    }
}

/// One installable unit produced by a scan.
///
/// Every relative path in `files`, `contents`, `settings` and `inputs`
/// resolves under `source`, except after an archive build where `source` is
/// rewritten to the archive itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mod {
    pub modname: String,
    pub filename: String,
    pub datatype: DataType,
    pub package: String,
    pub source: Utf8PathBuf,
    pub size: u64,
    pub files: Vec<BinFile>,
    pub contents: Vec<ContentFile>,
    pub settings: Vec<SettingsFragment>,
    pub inputs: Vec<SettingsFragment>,
    #[serde(default)]
    pub readmes: Vec<Readme>,

    // Bookkeeping, set by collaborators after classification
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub installed: bool,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub md5hash: String,
    #[serde(default)]
    pub installdate: Option<i64>,
    #[serde(default)]
    pub uploaddate: Option<i64>,
}

fn default_enabled() -> bool {
    true
}

impl Mod {
    /// A record with empty manifests and default bookkeeping.
    pub fn new(
        modname: impl Into<String>,
        filename: impl Into<String>,
        datatype: DataType,
        package: impl Into<String>,
        source: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            modname: modname.into(),
            filename: filename.into(),
            datatype,
            package: package.into(),
            source: source.into(),
            size: 0,
            files: Vec::new(),
            contents: Vec::new(),
            settings: Vec::new(),
            inputs: Vec::new(),
            readmes: Vec::new(),
            priority: None,
            enabled: true,
            installed: false,
            category: String::new(),
            version: String::new(),
            md5hash: String::new(),
            installdate: None,
            uploaddate: None,
        }
    }

    /// Content files that are not scripts.
    pub fn content_files(&self) -> Vec<&ContentFile> {
        self.contents.iter().filter(|c| !c.is_script()).collect()
    }

    pub fn script_files(&self) -> Vec<&ContentFile> {
        self.contents.iter().filter(|c| c.is_script()).collect()
    }

    /// Loose files not targeting the menu-config directory.
    pub fn bin_files(&self) -> Vec<&BinFile> {
        self.files.iter().filter(|f| !f.is_menu_file()).collect()
    }

    pub fn menu_files(&self) -> Vec<&BinFile> {
        self.files.iter().filter(|f| f.is_menu_file()).collect()
    }

    /// Identity within one scan.
    pub fn key(&self) -> (&str, DataType) {
        (&self.filename, self.datatype)
    }

    pub fn source(&self) -> &Utf8Path {
        &self.source
    }

    /// Turn an ambiguous record into a mod or dlc.
    pub fn resolve_ambiguous(mut self, datatype: DataType) -> Result<Self> {
        if self.datatype != DataType::Udf {
            return Ok(self);
        }
        if !matches!(datatype, DataType::Mod | DataType::Dlc) {
            return Err(ModError::Unresolved {
                filename: self.filename,
            });
        }

        let stem = self
            .filename
            .strip_suffix(UNDEFINED_SUFFIX)
            .unwrap_or(&self.filename)
            .to_string();
        self.filename = format_mod_name(&stem, datatype.as_str());
        self.datatype = datatype;
        Ok(self)
    }

    /// Serialize into the sidecar record format.
    pub fn to_record(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_record(record: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(record)
    }

    /// Typed access for column-style consumers.
    pub fn field(&self, field: ModField) -> FieldValue<'_> {
        match field {
            ModField::Modname => FieldValue::Text(&self.modname),
            ModField::Filename => FieldValue::Text(&self.filename),
            ModField::Datatype => FieldValue::Text(self.datatype.as_str()),
            ModField::Package => FieldValue::Text(&self.package),
            ModField::Source => FieldValue::Text(self.source.as_str()),
            ModField::Size => FieldValue::Size(self.size),
            ModField::Priority => FieldValue::Number(self.priority),
            ModField::Enabled => FieldValue::Flag(self.enabled),
            ModField::Installed => FieldValue::Flag(self.installed),
            ModField::Category => FieldValue::Text(&self.category),
            ModField::Version => FieldValue::Text(&self.version),
            ModField::Md5hash => FieldValue::Text(&self.md5hash),
            ModField::InstallDate => FieldValue::Timestamp(self.installdate),
            ModField::UploadDate => FieldValue::Timestamp(self.uploaddate),
        }
    }
}

/// Scalar fields of a [`Mod`] addressable by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModField {
    Modname,
    Filename,
    Datatype,
    Package,
    Source,
    Size,
    Priority,
    Enabled,
    Installed,
    Category,
    Version,
    Md5hash,
    InstallDate,
    UploadDate,
}

impl ModField {
    pub const ALL: [ModField; 14] = [
        ModField::Modname,
        ModField::Filename,
        ModField::Datatype,
        ModField::Package,
        ModField::Source,
        ModField::Size,
        ModField::Priority,
        ModField::Enabled,
        ModField::Installed,
        ModField::Category,
        ModField::Version,
        ModField::Md5hash,
        ModField::InstallDate,
        ModField::UploadDate,
    ];

    /// Record key of the field.
    pub fn key(&self) -> &'static str {
        match self {
            ModField::Modname => "modname",
            ModField::Filename => "filename",
            ModField::Datatype => "datatype",
            ModField::Package => "package",
            ModField::Source => "source",
            ModField::Size => "size",
            ModField::Priority => "priority",
            ModField::Enabled => "enabled",
            ModField::Installed => "installed",
            ModField::Category => "category",
            ModField::Version => "version",
            ModField::Md5hash => "md5hash",
            ModField::InstallDate => "installdate",
            ModField::UploadDate => "uploaddate",
        }
    }
}

impl FromStr for ModField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ModField::ALL
            .into_iter()
            .find(|field| field.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown mod field: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Size(u64),
    Number(Option<u32>),
    Flag(bool),
    Timestamp(Option<i64>),
}

impl fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Size(size) => write!(f, "{size}"),
            FieldValue::Number(Some(n)) => write!(f, "{n}"),
            FieldValue::Flag(flag) => write!(f, "{flag}"),
            FieldValue::Timestamp(Some(ts)) => write!(f, "{ts}"),
            FieldValue::Number(None) | FieldValue::Timestamp(None) => Ok(()),
        }
    }
}

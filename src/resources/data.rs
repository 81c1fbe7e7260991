//! Archive data products for an observation.

use super::{envelope_accessors, opt, Credentials, Observation, Resource};
use crate::domain::{ObsId, Status};
use crate::errors::ValidationError;
use crate::schema::{is_set, DefaultValue, FieldKind, FieldSpec, Rule, Schema, Verb, USERNAME};
use crate::utils::wildcard_regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::warn;

const HEASARC_FTP: &str = "https://heasarc.gsfc.nasa.gov/FTP/";
const HEASARC_S3: &str = "https://nasa-heasarc.s3.amazonaws.com/";

const PRODUCTS: [&str; 6] = ["auxil", "xrt", "log", "bat", "uvot", "subthresh"];

static GET: Schema = Schema::new(
    &[
        USERNAME,
        FieldSpec::required("obsid", FieldKind::ObsId),
        FieldSpec::optional("quicklook", FieldKind::Bool).default(DefaultValue::Bool(false)),
        FieldSpec::optional("auxil", FieldKind::Bool),
        FieldSpec::optional("bat", FieldKind::Bool),
        FieldSpec::optional("xrt", FieldKind::Bool),
        FieldSpec::optional("uvot", FieldKind::Bool),
        FieldSpec::optional("subthresh", FieldKind::Bool),
        FieldSpec::optional("log", FieldKind::Bool),
        FieldSpec::optional("tdrss", FieldKind::Bool),
        FieldSpec::optional("uksdc", FieldKind::Bool),
        FieldSpec::optional("itsdc", FieldKind::Bool),
    ],
    &[Rule::Check(check_products)],
);

fn check_products(f: &Map<String, Value>) -> Result<(), ValidationError> {
    if is_set(f, "uksdc") && is_set(f, "itsdc") {
        return Err(ValidationError::fields(
            ["uksdc", "itsdc"],
            "Cannot download from UK and Italian SDC",
        ));
    }
    if !PRODUCTS.iter().any(|p| is_set(f, p)) {
        return Err(ValidationError::fields(PRODUCTS, "No data products selected"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DataFile {
    pub filename: String,
    pub path: String,
    pub url: String,
    #[serde(default)]
    pub quicklook: Option<bool>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Where the file was written, once downloaded.
    #[serde(skip)]
    pub localpath: Option<PathBuf>,
}

impl DataFile {
    /// Bytes on disk, once downloaded.
    pub fn size(&self) -> Option<u64> {
        let path = self.localpath.as_ref()?;
        std::fs::metadata(path).ok().map(|m| m.len())
    }

    /// Archive path relative to the output directory.
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.path).join(&self.filename)
    }

    /// Where to fetch from. HEASARC archive files can be served from the
    /// public S3 mirror; quicklook files only exist on the archive itself.
    pub fn source_url(&self, aws: bool) -> String {
        let quicklook = self.quicklook.unwrap_or(false);
        if aws && !quicklook && self.url.contains("heasarc") {
            let key = self.url.strip_prefix(HEASARC_FTP).unwrap_or(&self.url);
            return format!("{}{}", HEASARC_S3, key);
        }
        self.url.clone()
    }
}

#[derive(Debug, Clone)]
pub struct Data {
    pub obsid: Option<ObsId>,
    pub quicklook: Option<bool>,
    pub auxil: Option<bool>,
    pub bat: Option<bool>,
    pub xrt: Option<bool>,
    pub uvot: Option<bool>,
    pub subthresh: Option<bool>,
    pub log: Option<bool>,
    pub tdrss: Option<bool>,
    pub uksdc: Option<bool>,
    pub itsdc: Option<bool>,
    /// Fetch HEASARC files from the public S3 mirror.
    pub aws: bool,
    pub clobber: bool,
    pub outdir: PathBuf,
    /// Shell style patterns matched against `path/filename`; empty keeps all.
    pub patterns: Vec<String>,
    pub entries: Vec<DataFile>,
    pub status: Status,
    pub credentials: Credentials,
}

impl Default for Data {
    fn default() -> Self {
        Self {
            obsid: None,
            quicklook: Some(false),
            auxil: Some(true),
            bat: None,
            xrt: None,
            uvot: None,
            subthresh: None,
            log: None,
            tdrss: None,
            uksdc: None,
            itsdc: None,
            aws: false,
            clobber: false,
            outdir: PathBuf::from("."),
            patterns: Vec::new(),
            entries: Vec::new(),
            status: Status::default(),
            credentials: Credentials::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DataResponse {
    #[serde(default)]
    pub entries: Option<Vec<DataFile>>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl Data {
    pub fn new(obsid: ObsId) -> Self {
        Self {
            obsid: Some(obsid),
            ..Self::default()
        }
    }

    /// Archive data for one as-flown observation.
    pub fn for_observation(observation: &Observation) -> Self {
        Self::new(observation.obsid)
    }

    pub fn all(&self) -> bool {
        [self.xrt, self.uvot, self.bat, self.log, self.auxil, self.tdrss]
            .iter()
            .all(|flag| *flag == Some(true))
    }

    pub fn set_all(&mut self, on: bool) {
        for flag in [
            &mut self.xrt,
            &mut self.uvot,
            &mut self.bat,
            &mut self.log,
            &mut self.auxil,
            &mut self.tdrss,
        ] {
            *flag = Some(on);
        }
    }

    pub fn matching(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    /// S3 is only used for files served by HEASARC, so not for the UK or
    /// Italian data centres.
    pub fn uses_aws(&self) -> bool {
        self.aws && self.uksdc != Some(true) && self.itsdc != Some(true)
    }

    pub fn local_path(&self, file: &DataFile) -> PathBuf {
        self.outdir.join(file.relative_path())
    }

    fn apply_patterns(&mut self) {
        if self.patterns.is_empty() {
            return;
        }
        let mut matchers = Vec::new();
        for pattern in &self.patterns {
            match wildcard_regex(pattern) {
                Ok(re) => matchers.push(re),
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "ignoring invalid file pattern");
                    self.status.warning(format!("Invalid file pattern {}", pattern));
                }
            }
        }
        self.entries.retain(|file| {
            let name = format!("{}/{}", file.path, file.filename);
            matchers.iter().any(|re| re.is_match(&name))
        });
    }
}

impl Resource for Data {
    type Response = DataResponse;

    fn api_name(&self) -> &'static str {
        "Data"
    }

    fn schema(&self, verb: Verb) -> Option<&'static Schema> {
        match verb {
            Verb::Get => Some(&GET),
            _ => None,
        }
    }

    fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("username".into(), Value::String(self.credentials.username.clone()));
        fields.insert(
            "obsid".into(),
            self.obsid
                .map(|id| Value::String(id.archive()))
                .unwrap_or(Value::Null),
        );
        for (name, flag) in [
            ("quicklook", self.quicklook),
            ("auxil", self.auxil),
            ("bat", self.bat),
            ("xrt", self.xrt),
            ("uvot", self.uvot),
            ("subthresh", self.subthresh),
            ("log", self.log),
            ("tdrss", self.tdrss),
            ("uksdc", self.uksdc),
            ("itsdc", self.itsdc),
        ] {
            fields.insert(name.into(), opt(flag));
        }
        fields
    }

    fn absorb(&mut self, response: DataResponse) {
        if let Some(entries) = response.entries {
            self.entries = entries;
            self.apply_patterns();
        }
        if let Some(status) = response.status {
            self.status = status;
        }
    }

    envelope_accessors!();
}

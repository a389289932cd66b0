//! Instance descriptors: per-site recipes telling the sequencer which pages to
//! expect and which fields to fill.

use std::{
    collections::BTreeMap,
    ffi::OsStr,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    str::FromStr,
};

use passupd_store::PolicyOverrides;
use serde::Deserialize;
use serde_yaml::Value;
use url::Url;

/// Page name standing for a two-factor step. It is never automated.
pub const TWO_FACTOR_PAGE: &str = "2fa";

pub const DESCRIPTOR_EXTENSIONS: &[&str] = &["yml", "yaml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum InputKind {
    Login,
    Password,
    NewPassword,
    Otp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub input: InputKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPage {
    pub name: String,
    pub title_contains: String,
    /// Never empty. The last field is the one used to submit the form.
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    TwoFactor,
    Form(FormPage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub name: String,
    pub url: Url,
    pub visit_path: String,
    pub password_policy: PolicyOverrides,
    pub pages: Vec<Page>,
}

#[derive(thiserror::Error, Debug)]
#[error("Invalid instance '{instance}': {kind}")]
pub struct InstanceError {
    pub instance: String,
    pub kind: InstanceErrorKind,
}

#[derive(thiserror::Error, Debug)]
pub enum InstanceErrorKind {
    #[error("no descriptor file found")]
    NotFound,

    #[error("{0}")]
    Read(fsutil::error::Error),

    #[error("malformed YAML ({0})")]
    Yaml(serde_yaml::Error),

    #[error("`{0}` must not be empty")]
    Missing(&'static str),

    #[error("instance name '{found}' does not match its file name")]
    NameMismatch { found: String },

    #[error("url '{0}' is not an absolute http(s) URL")]
    InvalidUrl(String),

    #[error("password length must be a positive integer")]
    ZeroLength,

    #[error("page '{0}' is listed but not described")]
    MissingPage(String),

    #[error("page '{page}' is malformed ({source})")]
    MalformedPage {
        page: String,
        source: serde_yaml::Error,
    },

    #[error("{0}['title'] must not be empty")]
    MissingTitle(String),

    #[error("page '{0}' has no field to fill")]
    NoFields(String),

    #[error("{page}['find'] has {find} entries but {page}['input'] has {input}")]
    FieldCountMismatch {
        page: String,
        find: usize,
        input: usize,
    },

    #[error("{page}: '{input}' is not a supported input")]
    UnknownInput { page: String, input: String },
}

#[derive(Debug, Deserialize)]
struct RawInstance {
    instance: Option<String>,
    url: Option<String>,
    visit: Option<String>,
    password: Option<RawPassword>,
    pages: Option<Vec<String>>,
    #[serde(flatten)]
    tables: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawPassword {
    #[serde(alias = "lenght")]
    length: Option<usize>,
    character_set: Option<String>,
    #[serde(default)]
    no_symbols: bool,
}

#[derive(Debug, Deserialize)]
struct RawPage {
    title: Option<String>,
    #[serde(default)]
    find: Vec<String>,
    #[serde(default)]
    input: Vec<String>,
}

/// `url` if it is an absolute http(s) URL with a host.
pub fn parse_base_url(url: &str) -> Option<Url> {
    let parsed = Url::parse(url).ok()?;
    match parsed.scheme() {
        "http" | "https" if parsed.has_host() => Some(parsed),
        _ => None,
    }
}

impl Instance {
    /// Parse and validate a descriptor. Every structural check runs here so a
    /// malformed descriptor never reaches a browser.
    pub fn from_yaml(expected_name: &str, yaml: &str) -> Result<Self, InstanceError> {
        Self::parse(expected_name, yaml).map_err(|kind| InstanceError {
            instance: expected_name.to_owned(),
            kind,
        })
    }

    fn parse(expected_name: &str, yaml: &str) -> Result<Self, InstanceErrorKind> {
        use InstanceErrorKind::*;

        let raw: RawInstance = serde_yaml::from_str(yaml).map_err(Yaml)?;

        let name = raw.instance.filter(|s| !s.is_empty()).ok_or(Missing("instance"))?;
        if name != expected_name {
            return Err(NameMismatch { found: name });
        }

        let url = raw.url.filter(|s| !s.is_empty()).ok_or(Missing("url"))?;
        let url = self::parse_base_url(&url).ok_or(InvalidUrl(url))?;

        let visit_path = raw.visit.ok_or(Missing("visit"))?;

        let password_policy = match raw.password {
            None => PolicyOverrides::default(),
            Some(p) => PolicyOverrides {
                length: match p.length {
                    None => None,
                    Some(n) => Some(NonZeroUsize::new(n).ok_or(ZeroLength)?),
                },
                character_set: p.character_set,
                no_symbols: p.no_symbols,
            },
        };

        let page_names = raw.pages.filter(|p| !p.is_empty()).ok_or(Missing("pages"))?;
        let mut pages = Vec::with_capacity(page_names.len());
        for page in page_names {
            if page == TWO_FACTOR_PAGE {
                pages.push(Page::TwoFactor);
                continue;
            }
            let table = raw
                .tables
                .get(&page)
                .cloned()
                .ok_or_else(|| MissingPage(page.clone()))?;
            let raw_page: RawPage = serde_yaml::from_value(table).map_err(|e| MalformedPage {
                page: page.clone(),
                source: e,
            })?;
            pages.push(Page::Form(Self::parse_page(page, raw_page)?));
        }

        Ok(Self {
            name,
            url,
            visit_path,
            password_policy,
            pages,
        })
    }

    fn parse_page(name: String, raw: RawPage) -> Result<FormPage, InstanceErrorKind> {
        use InstanceErrorKind::*;

        let title_contains = match raw.title {
            Some(t) if !t.is_empty() => t,
            _ => return Err(MissingTitle(name)),
        };
        if raw.find.len() != raw.input.len() {
            return Err(FieldCountMismatch {
                page: name,
                find: raw.find.len(),
                input: raw.input.len(),
            });
        }
        if raw.find.is_empty() {
            return Err(NoFields(name));
        }

        let mut fields = Vec::with_capacity(raw.find.len());
        for (field, input) in raw.find.into_iter().zip(raw.input) {
            let Ok(kind) = InputKind::from_str(&input) else {
                return Err(UnknownInput { page: name, input });
            };
            fields.push(Field {
                name: field,
                input: kind,
            });
        }

        Ok(FormPage {
            name,
            title_contains,
            fields,
        })
    }

    /// Where the flow starts: `base` (or the descriptor's own url) followed by
    /// the visit path.
    pub fn entry_url(&self, base: Option<&Url>) -> Result<Url, url::ParseError> {
        let base = base.unwrap_or(&self.url);
        let visit = self.visit_path.trim_start_matches('/');
        Url::parse(&format!("{}/{}", base.as_str().trim_end_matches('/'), visit))
    }

    pub fn form_pages(&self) -> impl Iterator<Item = &FormPage> {
        self.pages.iter().filter_map(|p| match p {
            Page::Form(f) => Some(f),
            Page::TwoFactor => None,
        })
    }
}

/// Descriptor files found under the instance directory, keyed by file stem.
#[derive(Debug, Clone, Default)]
pub struct InstanceCatalog {
    dir: PathBuf,
    files: BTreeMap<String, PathBuf>,
}

impl InstanceCatalog {
    /// Index descriptor files recursively. Hidden files and dirs are skipped.
    pub fn open(dir: impl AsRef<Path>) -> fsutil::error::Result<Self> {
        let dir = dir.as_ref();
        let mut files = BTreeMap::new();

        for rel in fsutil::visible_files(dir)? {
            let is_descriptor = rel
                .extension()
                .and_then(OsStr::to_str)
                .map_or(false, |ext| DESCRIPTOR_EXTENSIONS.contains(&ext));
            let Some(stem) = rel.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            if !is_descriptor {
                continue;
            }
            if let Some(prev) = files.get(&stem) {
                log::warn!(
                    "Instance '{}' is described twice, ignoring {:?} (using {:?})",
                    stem,
                    rel,
                    prev
                );
                continue;
            }
            files.insert(stem, dir.join(rel));
        }

        log::debug!("Found {} instance(s) in {:?}", files.len(), dir);
        Ok(Self {
            dir: dir.to_owned(),
            files,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// Instance names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn path_of(&self, name: &str) -> Option<&Path> {
        self.files.get(name).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn load(&self, name: &str) -> Result<Instance, InstanceError> {
        let err = |kind| InstanceError {
            instance: name.to_owned(),
            kind,
        };
        let path = self
            .files
            .get(name)
            .ok_or_else(|| err(InstanceErrorKind::NotFound))?;
        let yaml = fsutil::read_to_string(path).map_err(|e| err(InstanceErrorKind::Read(e)))?;
        Instance::from_yaml(name, &yaml)
    }
}

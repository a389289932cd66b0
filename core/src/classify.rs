//! Triage of candidate entries into automatic, manual and invalid updates.

use passupd_store::{normalize_entry_path, Entry, Metadata, Store, StoreIndex};
use serde_yaml::Value;
use url::Url;

use crate::instance::{self, Instance, InstanceCatalog, InstanceError};

/// A store entry, decrypted once.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub path: String,
    pub password: String,
    pub login: Option<String>,
    pub metadata: Metadata,
}

impl Credential {
    pub fn new(path: impl Into<String>, entry: Entry) -> Self {
        let Entry {
            password,
            login,
            metadata,
        } = entry;
        Self {
            path: path.into(),
            password,
            login,
            metadata,
        }
    }

    /// Last component of the path.
    pub fn basename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone)]
pub struct AutoCredential {
    pub credential: Credential,
    pub instance: Instance,
    /// Overrides the instance url when set.
    pub url: Option<Url>,
}

impl AutoCredential {
    pub fn path(&self) -> &str {
        &self.credential.path
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ManualReason {
    #[error("'{0}' is not a supported instance")]
    UnsupportedInstance(String),

    #[error("does not have an instance")]
    NoInstance,

    #[error("{0}")]
    BrokenInstance(InstanceError),
}

#[derive(Debug)]
pub struct ManualCredential {
    pub credential: Credential,
    pub reason: ManualReason,
}

impl ManualCredential {
    pub fn path(&self) -> &str {
        &self.credential.path
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InvalidReason {
    #[error("is not in the password store")]
    NotInStore,

    #[error("cannot be read ({0})")]
    Unreadable(passupd_store::Error),

    #[error("does not have a login")]
    NoLogin,
}

#[derive(Debug)]
pub struct InvalidCredential {
    pub path: String,
    pub reason: InvalidReason,
}

#[derive(Debug)]
pub enum Disposition {
    Automatic(AutoCredential),
    Manual(ManualCredential),
    Invalid(InvalidCredential),
}

impl Disposition {
    pub fn path(&self) -> &str {
        match self {
            Disposition::Automatic(a) => a.path(),
            Disposition::Manual(m) => m.path(),
            Disposition::Invalid(i) => &i.path,
        }
    }
}

/// Dispositions split into buckets, each keeping input order.
#[derive(Debug, Default)]
pub struct Classification {
    pub automatic: Vec<AutoCredential>,
    pub manual: Vec<ManualCredential>,
    pub invalid: Vec<InvalidCredential>,
}

impl Classification {
    pub fn push(&mut self, d: Disposition) {
        match d {
            Disposition::Automatic(a) => self.automatic.push(a),
            Disposition::Manual(m) => self.manual.push(m),
            Disposition::Invalid(i) => self.invalid.push(i),
        }
    }

    pub fn len(&self) -> usize {
        self.automatic.len() + self.manual.len() + self.invalid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<Disposition> for Classification {
    fn from_iter<T: IntoIterator<Item = Disposition>>(iter: T) -> Self {
        let mut c = Self::default();
        iter.into_iter().for_each(|d| c.push(d));
        c
    }
}

fn scalar_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => format!("{:?}", other),
    }
}

/// URL overriding the instance default: the path itself when it is an
/// absolute http(s) URL, else the `url` metadata field.
pub fn resolve_url(credential: &Credential) -> Option<Url> {
    if let Some(url) = instance::parse_base_url(&credential.path) {
        return Some(url);
    }
    let raw = credential.metadata.get_str("url")?;
    let url = instance::parse_base_url(raw);
    if url.is_none() {
        log::warn!(
            "{}: ignoring metadata url '{}' (not an absolute http(s) URL)",
            credential.path,
            raw
        );
    }
    url
}

pub struct Classifier<'a, S: Store + ?Sized> {
    store: &'a S,
    catalog: &'a InstanceCatalog,
}

impl<'a, S: Store + ?Sized> Classifier<'a, S> {
    pub fn new(store: &'a S, catalog: &'a InstanceCatalog) -> Self {
        Self { store, catalog }
    }

    /// Classify every path against a single snapshot of the store.
    pub async fn classify_all(&self, paths: &[String]) -> passupd_store::Result<Classification> {
        let index = self.store.index().await?;
        log::debug!("Store index: {} entries", index.len());

        let mut c = Classification::default();
        for path in paths {
            let d = self.classify(path, &index).await;
            log::debug!("{}: {:?}", d.path(), DispositionKind::of(&d));
            c.push(d);
        }
        Ok(c)
    }

    pub async fn classify(&self, path: &str, index: &StoreIndex) -> Disposition {
        let path = normalize_entry_path(path);
        let invalid = |reason| {
            Disposition::Invalid(InvalidCredential {
                path: path.to_owned(),
                reason,
            })
        };

        if !index.contains(path) {
            return invalid(InvalidReason::NotInStore);
        }
        let entry = match self.store.credential(path).await {
            Ok(entry) => entry,
            Err(e) => return invalid(InvalidReason::Unreadable(e)),
        };
        let credential = Credential::new(path, entry);
        if credential.login.is_none() {
            return invalid(InvalidReason::NoLogin);
        }

        let manual = |credential, reason| {
            Disposition::Manual(ManualCredential { credential, reason })
        };

        let instance_name = if self.catalog.contains(credential.basename()) {
            credential.basename().to_owned()
        } else {
            match credential.metadata.get("instance").map(self::scalar_to_string) {
                Some(name) if self.catalog.contains(&name) => name,
                Some(name) => return manual(credential, ManualReason::UnsupportedInstance(name)),
                None => return manual(credential, ManualReason::NoInstance),
            }
        };

        let instance = match self.catalog.load(&instance_name) {
            Ok(instance) => instance,
            Err(e) => return manual(credential, ManualReason::BrokenInstance(e)),
        };
        let url = self::resolve_url(&credential);

        Disposition::Automatic(AutoCredential {
            credential,
            instance,
            url,
        })
    }
}

/// Payload-free tag of a [`Disposition`], handy for logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum DispositionKind {
    Automatic,
    Manual,
    Invalid,
}

impl DispositionKind {
    pub fn of(d: &Disposition) -> Self {
        match d {
            Disposition::Automatic(_) => Self::Automatic,
            Disposition::Manual(_) => Self::Manual,
            Disposition::Invalid(_) => Self::Invalid,
        }
    }
}

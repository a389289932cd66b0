use std::collections::BTreeMap;

use serde_yaml::Value;

/// YAML metadata found after the login line of an entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata(BTreeMap<String, Value>);

impl Metadata {
    /// Parse the tail of an entry. Anything that is not a YAML mapping with
    /// string keys yields empty metadata.
    pub fn parse(tail: &str) -> Self {
        match serde_yaml::from_str::<Option<BTreeMap<String, Value>>>(tail) {
            Ok(Some(map)) => Self(map),
            Ok(None) => Self::default(),
            Err(e) => {
                log::debug!("Ignoring unparsable entry metadata: {}", e);
                Self::default()
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value of `key`. Non-string scalars are not coerced.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Decrypted content of a store entry, split the way `pass` users lay it out:
///
/// ```text
/// <password>
/// login: <login>
/// <yaml metadata...>
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entry {
    pub password: String,
    pub login: Option<String>,
    pub metadata: Metadata,
}

impl Entry {
    /// ```
    /// use passupd_store::Entry;
    ///
    /// let e = Entry::parse("hunter2\nlogin: bob\nurl: https://example.com\n");
    /// assert_eq!(e.password, "hunter2");
    /// assert_eq!(e.login.as_deref(), Some("bob"));
    /// assert_eq!(e.metadata.get_str("url"), Some("https://example.com"));
    /// ```
    pub fn parse(content: &str) -> Self {
        let mut lines = content.splitn(3, '\n');

        let password = lines
            .next()
            .map(|l| l.trim_end_matches('\r').to_owned())
            .unwrap_or_default();

        // The login is the 2nd token of the 2nd line ("login: bob", "user bob").
        let login = lines
            .next()
            .and_then(|l| l.split_whitespace().nth(1))
            .map(ToOwned::to_owned);

        let metadata = lines.next().map(Metadata::parse).unwrap_or_default();

        Self {
            password,
            login,
            metadata,
        }
    }
}

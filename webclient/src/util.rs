use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::*;

pub fn parse_url(url: impl AsRef<str>) -> Result<Url> {
    match Url::parse(url.as_ref()) {
        Ok(url) => Ok(url),
        Err(e) => Err(Error::InvalidSyntaxUrl {
            url: url.as_ref().to_owned(),
            source: e,
        }),
    }
}

/// Resolve `link` (absolute, or relative like a form `action`) against `base`.
pub fn complete_url(base: &Url, link: &str) -> Result<Url> {
    base.join(link.trim()).map_err(|e| Error::InvalidSyntaxUrl {
        url: link.to_owned(),
        source: e,
    })
}

pub fn selector_must_parsed(sel: &'static str) -> Selector {
    Selector::parse(sel).expect("Failed to parse  `&'static str`  selector")
}

/// CSS selector matching elements by their `name` attribute.
///
/// ```
/// use passupd_webclient::util::name_selector;
///
/// assert_eq!(name_selector("user"), r#"[name="user"]"#);
/// assert_eq!(name_selector(r#"a"b\c"#), r#"[name="a\"b\\c"]"#);
/// ```
pub fn name_selector(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
    format!("[name=\"{}\"]", escaped)
}

pub fn select_by_name(name: &str) -> Result<Selector> {
    Selector::parse(&self::name_selector(name)).map_err(|_| Error::NoSuchField(name.to_owned()))
}

pub trait DocExt {
    fn title_text(&self) -> String;
    fn select_first(&self, sel: &Selector) -> Option<ElementRef>;
}

impl DocExt for Html {
    fn title_text(&self) -> String {
        let sel = self::selector_must_parsed("title");
        self.select(&sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_owned())
            .unwrap_or_default()
    }

    fn select_first(&self, sel: &Selector) -> Option<ElementRef> {
        self.select(sel).next()
    }
}

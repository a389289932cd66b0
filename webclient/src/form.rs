//! Session that submits plain HTML forms over HTTP, keeping cookies between pages.
//! Pages relying on scripts to log in or to submit are out of its reach.

use async_trait::async_trait;
use scraper::{ElementRef, Html};
use url::Url;

use crate::{
    error::*,
    util::{self, DocExt as _},
    Session,
};

#[derive(Debug, Clone)]
struct Page {
    url: Url,
    // scraper::Html is !Send, so the document is re-parsed on demand
    html: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FormRequest {
    action: Url,
    method: Method,
    params: Vec<(String, String)>,
}

pub struct FormSession {
    http: reqwest::Client,
    page: Option<Page>,
    filled: Vec<(String, String)>,
}

impl FormSession {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .gzip(true)
            .build()?;
        Ok(Self {
            http,
            page: None,
            filled: Vec::new(),
        })
    }

    fn page(&self) -> Result<&Page> {
        self.page.as_ref().ok_or(Error::NoPageLoaded)
    }

    async fn load(&mut self, resp: reqwest::Response, requested_url: &Url) -> Result<()> {
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::UnexpectedResponseCode {
                got: status,
                requested_url: requested_url.to_string(),
            });
        }
        let url = resp.url().clone();
        let html = resp.text().await?;
        log::debug!("Loaded {} ({} bytes)", url, html.len());
        self.page = Some(Page { url, html });
        self.filled.clear();
        Ok(())
    }
}

fn has_field(html: &str, name: &str) -> Result<bool> {
    let doc = Html::parse_document(html);
    let sel = util::select_by_name(name)?;
    Ok(doc.select_first(&sel).is_some())
}

fn enclosing_form<'a>(el: ElementRef<'a>) -> Option<ElementRef<'a>> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "form")
}

/// Value a browser would send for `el`, or `None` when it is not submitted.
fn successful_value(el: ElementRef) -> Option<String> {
    let v = el.value();
    if v.attr("disabled").is_some() {
        return None;
    }
    match v.name() {
        "input" => {
            let ty = v.attr("type").unwrap_or("text").to_ascii_lowercase();
            match ty.as_str() {
                "submit" | "button" | "image" | "reset" | "file" => None,
                "checkbox" | "radio" => v
                    .attr("checked")
                    .map(|_| v.attr("value").unwrap_or("on").to_owned()),
                _ => Some(v.attr("value").unwrap_or_default().to_owned()),
            }
        }
        "textarea" => Some(el.text().collect()),
        "select" => {
            let sel = util::selector_must_parsed("option");
            let mut options = el.select(&sel);
            let chosen = el
                .select(&sel)
                .find(|o| o.value().attr("selected").is_some())
                .or_else(|| options.next())?;
            Some(
                chosen
                    .value()
                    .attr("value")
                    .map(str::to_owned)
                    .unwrap_or_else(|| chosen.text().collect::<String>().trim().to_owned()),
            )
        }
        _ => None,
    }
}

fn extract_form(page: &Page, field: &str, filled: &[(String, String)]) -> Result<FormRequest> {
    let doc = Html::parse_document(&page.html);
    let sel = util::select_by_name(field)?;
    let el = doc
        .select_first(&sel)
        .ok_or_else(|| Error::NoSuchField(field.to_owned()))?;
    let form = self::enclosing_form(el).ok_or_else(|| Error::NoEnclosingForm(field.to_owned()))?;

    let mut params: Vec<(String, String)> = Vec::new();
    let controls = util::selector_must_parsed("input[name], textarea[name], select[name]");
    for control in form.select(&controls) {
        let Some(name) = control.value().attr("name") else {
            continue;
        };
        if let Some(value) = self::successful_value(control) {
            params.push((name.to_owned(), value));
        }
    }

    for (name, value) in filled {
        match params.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value.clone(),
            None => params.push((name.clone(), value.clone())),
        }
    }

    let action = util::complete_url(&page.url, form.value().attr("action").unwrap_or(""))?;
    let method = match form.value().attr("method") {
        Some(m) if m.eq_ignore_ascii_case("post") => Method::Post,
        _ => Method::Get,
    };
    Ok(FormRequest {
        action,
        method,
        params,
    })
}

#[async_trait]
impl Session for FormSession {
    async fn navigate(&mut self, url: &Url) -> Result<()> {
        log::debug!("GET {}", url);
        let resp = self.http.get(url.clone()).send().await?;
        self.load(resp, url).await
    }

    async fn current_url(&mut self) -> Result<Url> {
        Ok(self.page()?.url.clone())
    }

    async fn title(&mut self) -> Result<String> {
        let doc = Html::parse_document(&self.page()?.html);
        Ok(doc.title_text())
    }

    async fn fill_field(&mut self, name: &str, value: &str) -> Result<()> {
        if !self::has_field(&self.page()?.html, name)? {
            return Err(Error::NoSuchField(name.to_owned()));
        }
        self.filled.retain(|(n, _)| n != name);
        self.filled.push((name.to_owned(), value.to_owned()));
        Ok(())
    }

    async fn submit(&mut self, name: &str) -> Result<()> {
        let req = self::extract_form(self.page()?, name, &self.filled)?;
        log::debug!("{:?} {}", req.method, req.action);

        let resp = match req.method {
            Method::Post => {
                self.http
                    .post(req.action.clone())
                    .form(&req.params)
                    .send()
                    .await?
            }
            Method::Get => {
                let mut url = req.action.clone();
                url.query_pairs_mut().clear().extend_pairs(&req.params);
                self.http.get(url).send().await?
            }
        };
        self.load(resp, &req.action).await
    }

    async fn close(&mut self) -> Result<()> {
        self.page = None;
        self.filled.clear();
        Ok(())
    }
}

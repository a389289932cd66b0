#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    io,
    process::ExitStatus,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use passupd_core::{
    instance::InstanceCatalog,
    interactive::Prompter,
    sequencer::SequencerOptions,
    style::Reporter,
};
use passupd_store::{
    Error as StoreError, GenerateOptions, GenerationPolicy, InsertOptions, PolicyOverrides,
    RemoveOptions, Result as StoreResult, Store, StoreEnv,
};
use passupd_webclient::{Error as WebError, Result as WebResult, Session, Url};
use tempfile::TempDir;

#[cfg(unix)]
fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    ExitStatus::from_raw(code as u32)
}

fn command_error(subcommand: &'static str, detail: &str) -> StoreError {
    StoreError::Command {
        subcommand,
        status: exit_status(1),
        detail: detail.to_owned(),
    }
}

/// In-memory store. Generated passwords are `generated-1`, `generated-2`, ...
#[derive(Default)]
pub struct MemoryStore {
    pub entries: Mutex<BTreeMap<String, String>>,
    pub unreadable: HashMap<String, String>,
    pub unremovable: HashSet<String>,
    pub uninsertable: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
    pub policies: Mutex<Vec<PolicyOverrides>>,
    counter: Mutex<usize>,
}

impl MemoryStore {
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    /// `show path` exits 1 with `detail`.
    pub fn unreadable(mut self, path: &str, detail: &str) -> Self {
        self.unreadable.insert(path.to_owned(), detail.to_owned());
        self
    }

    pub fn unremovable(mut self, path: &str) -> Self {
        self.unremovable.insert(path.to_owned());
        self
    }

    pub fn uninsertable(mut self, path: &str) -> Self {
        self.uninsertable.insert(path.to_owned());
        self
    }

    pub fn content(&self, path: &str) -> Option<String> {
        self.entries.lock().unwrap().get(path).cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than reads.
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("show ") && !c.starts_with("list"))
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_password(&self, prefix: &str) -> String {
        let mut n = self.counter.lock().unwrap();
        *n += 1;
        format!("{}-{}", prefix, n)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list(&self) -> StoreResult<Vec<String>> {
        self.record("list".to_owned());
        Ok(self.entries.lock().unwrap().keys().cloned().collect())
    }

    async fn show(&self, path: &str) -> StoreResult<String> {
        self.record(format!("show {}", path));
        if let Some(detail) = self.unreadable.get(path) {
            return Err(command_error("show", detail));
        }
        self.content(path)
            .ok_or_else(|| command_error("show", &format!("Error: {} is not in the password store.", path)))
    }

    fn generation_policy(&self, overrides: &PolicyOverrides) -> StoreResult<GenerationPolicy> {
        GenerationPolicy::resolve(&StoreEnv::default(), overrides)
    }

    async fn generate_password(&self, overrides: &PolicyOverrides) -> StoreResult<String> {
        self.policies.lock().unwrap().push(overrides.clone());
        Ok(self.next_password("generated"))
    }

    async fn generate(&self, path: &str, opts: GenerateOptions) -> StoreResult<String> {
        self.record(format!("generate {} in_place={}", path, opts.in_place));
        let password = self.next_password("regenerated");
        let mut entries = self.entries.lock().unwrap();
        let content = match entries.get(path) {
            Some(old) if opts.in_place => match old.split_once('\n') {
                Some((_, rest)) => format!("{}\n{}", password, rest),
                None => format!("{}\n", password),
            },
            _ => format!("{}\n", password),
        };
        entries.insert(path.to_owned(), content);
        Ok(password)
    }

    async fn remove(&self, path: &str, opts: RemoveOptions) -> StoreResult<()> {
        self.record(format!("rm {} force={}", path, opts.force));
        if self.unremovable.contains(path) {
            return Err(command_error("rm", "rm: cannot remove: Permission denied"));
        }
        match self.entries.lock().unwrap().remove(path) {
            Some(_) => Ok(()),
            None => Err(command_error("rm", "is not in the password store")),
        }
    }

    async fn insert(&self, path: &str, content: &str, opts: InsertOptions) -> StoreResult<()> {
        self.record(format!("insert {} multiline={}", path, opts.multiline));
        if self.uninsertable.contains(path) {
            return Err(command_error("insert", "gpg: encryption failed"));
        }
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(path) && !opts.force {
            return Err(command_error("insert", "An entry already exists"));
        }
        entries.insert(path.to_owned(), content.to_owned());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Navigate(String),
    Title(String),
    Fill(String, String),
    Submit(String),
    Close,
}

/// What a [`ScriptedSession`] did, shared with the test after the session
/// was boxed away.
#[derive(Debug, Default)]
pub struct SessionLog {
    pub events: Vec<Event>,
}

impl SessionLog {
    pub fn fills(&self) -> Vec<(String, String)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Fill(k, v) => Some((k.clone(), v.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

/// Fake browser: a site shows its first title after navigation and moves on
/// to the next one on each submit. Sites without their own script use the
/// default titles.
pub struct ScriptedSession {
    titles: Vec<String>,
    sites: HashMap<String, Vec<String>>,
    current: Vec<String>,
    cursor: usize,
    url: Option<Url>,
    missing_fields: HashSet<String>,
    pub log: Arc<Mutex<SessionLog>>,
}

impl ScriptedSession {
    pub fn new(titles: &[&str]) -> Self {
        Self {
            titles: titles.iter().map(|s| s.to_string()).collect(),
            sites: HashMap::new(),
            current: Vec::new(),
            cursor: 0,
            url: None,
            missing_fields: HashSet::new(),
            log: Arc::default(),
        }
    }

    pub fn site(mut self, host: &str, titles: &[&str]) -> Self {
        self.sites.insert(
            host.to_owned(),
            titles.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn without_field(mut self, name: &str) -> Self {
        self.missing_fields.insert(name.to_owned());
        self
    }

    fn push(&self, e: Event) {
        self.log.lock().unwrap().events.push(e);
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn navigate(&mut self, url: &Url) -> WebResult<()> {
        self.push(Event::Navigate(url.to_string()));
        self.url = Some(url.clone());
        self.current = url
            .host_str()
            .and_then(|h| self.sites.get(h))
            .unwrap_or(&self.titles)
            .clone();
        self.cursor = 0;
        Ok(())
    }

    async fn current_url(&mut self) -> WebResult<Url> {
        self.url.clone().ok_or(WebError::NoPageLoaded)
    }

    async fn title(&mut self) -> WebResult<String> {
        let title = self.current.get(self.cursor).cloned().unwrap_or_default();
        self.push(Event::Title(title.clone()));
        Ok(title)
    }

    async fn fill_field(&mut self, name: &str, value: &str) -> WebResult<()> {
        if self.missing_fields.contains(name) {
            return Err(WebError::NoSuchField(name.to_owned()));
        }
        self.push(Event::Fill(name.to_owned(), value.to_owned()));
        Ok(())
    }

    async fn submit(&mut self, name: &str) -> WebResult<()> {
        self.push(Event::Submit(name.to_owned()));
        self.cursor += 1;
        Ok(())
    }

    async fn close(&mut self) -> WebResult<()> {
        self.push(Event::Close);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Message,
    Success,
    Warning,
    Error,
    Listing,
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub lines: Mutex<Vec<(Level, String)>>,
}

impl RecordingReporter {
    pub fn lines_at(&self, level: Level) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, s)| s.clone())
            .collect()
    }

    fn push(&self, level: Level, msg: &str) {
        self.lines.lock().unwrap().push((level, msg.to_owned()));
    }
}

impl Reporter for RecordingReporter {
    fn message(&self, msg: &str) {
        self.push(Level::Message, msg)
    }

    fn success(&self, msg: &str) {
        self.push(Level::Success, msg)
    }

    fn warning(&self, msg: &str) {
        self.push(Level::Warning, msg)
    }

    fn error(&self, msg: &str) {
        self.push(Level::Error, msg)
    }

    fn listing(&self, items: &[String]) {
        self.push(Level::Listing, &items.join(", "))
    }
}

/// Answers questions from a queue, then "no".
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<io::Result<bool>>>,
    pub questions: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = io::Result<bool>>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            questions: Mutex::default(),
        }
    }

    pub fn asked(&self) -> usize {
        self.questions.lock().unwrap().len()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, question: &str) -> io::Result<bool> {
        self.questions.lock().unwrap().push(question.to_owned());
        self.answers.lock().unwrap().pop_front().unwrap_or(Ok(false))
    }
}

pub fn fast_options() -> SequencerOptions {
    SequencerOptions {
        title_timeout: Duration::from_millis(50),
        poll_interval: Duration::from_millis(1),
        settle_delay: Duration::ZERO,
    }
}

/// Instance directory holding the given `(file name, yaml)` descriptors.
pub fn catalog(files: &[(&str, &str)]) -> (TempDir, InstanceCatalog) {
    let dir = tempfile::tempdir().unwrap();
    for (name, yaml) in files {
        fsutil::write_with_mkdir(dir.path().join(name), yaml).unwrap();
    }
    let catalog = InstanceCatalog::open(dir.path()).unwrap();
    (dir, catalog)
}

pub const EXAMPLE_INSTANCE: &str = r#"
instance: example
url: https://example.com
visit: /account
password:
  length: 32
pages: [login, 2fa, change]
login:
  title: Sign in
  find: [user, pass]
  input: [login, password]
change:
  title: Change password
  find: [old, new, confirm]
  input: [password, new-password, new-password]
"#;

pub const SHOP_INSTANCE: &str = r#"
instance: shop
url: https://shop.example.org
visit: /password
pages: [change]
change:
  title: Password
  find: [current, fresh]
  input: [password, new-password]
"#;

/// Change page followed by a confirmation page.
pub const BANK_INSTANCE: &str = r#"
instance: bank
url: https://bank.example.net
visit: /security
pages: [login, change, done]
login:
  title: Sign in
  find: [user, pass]
  input: [login, password]
change:
  title: Change password
  find: [old, new]
  input: [password, new-password]
done:
  title: Password updated
  find: [account]
  input: [login]
"#;

/// Two pages, the second one with 3 fields but only 2 inputs.
pub const BROKEN_INSTANCE: &str = r#"
instance: broken
url: https://broken.example.net
visit: /
pages: [login, change]
login:
  title: Sign in
  find: [user, pass]
  input: [login, password]
change:
  title: Change
  find: [old, new, confirm]
  input: [password, new-password]
"#;

pub fn paths(ps: &[&str]) -> Vec<String> {
    ps.iter().map(|s| s.to_string()).collect()
}

//! Password generation the way `pass generate` does it:
//! `tr -dc "$PASSWORD_STORE_CHARACTER_SET" < /dev/urandom | head -c $length`.

use std::{collections::BTreeSet, num::NonZeroUsize};

use lazy_regex::regex;
use rand::{rngs::OsRng, Rng as _};

use crate::{error::*, StoreEnv};

pub const DIGITS: &str = "0123456789"; // [:digit:]
pub const ALPHA_UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ"; // [:upper:]
pub const ALPHA_LOWER: &str = "abcdefghijklmnopqrstuvwxyz"; // [:lower:]
pub const PUNCT: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~"; // [:punct:]

/// Per-instance tweaks on top of the store's own policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyOverrides {
    pub length: Option<NonZeroUsize>,
    pub character_set: Option<String>,
    pub no_symbols: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPolicy {
    pub length: NonZeroUsize,
    pub character_set: String,
}

impl GenerationPolicy {
    pub fn resolve(env: &StoreEnv, overrides: &PolicyOverrides) -> Result<Self> {
        let length = match overrides.length {
            Some(n) => n,
            None => NonZeroUsize::new(env.generated_length).ok_or(Error::ZeroLength)?,
        };

        let character_set = if overrides.no_symbols {
            env.character_set_no_symbols.clone()
        } else if let Some(set) = &overrides.character_set {
            set.clone()
        } else {
            env.character_set.clone()
        };

        Ok(Self {
            length,
            character_set,
        })
    }

    pub fn generate(&self) -> Result<String> {
        let alphabet = self::expand_character_set(&self.character_set)?;
        let mut rng = OsRng;
        Ok((0..self.length.get())
            .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
            .collect())
    }
}

fn class_chars(class: &str) -> Option<Vec<char>> {
    let ascii = |pred: fn(&u8) -> bool| (0u8..=127).filter(pred).map(char::from).collect();
    let v = match class {
        "alnum" => ascii(u8::is_ascii_alphanumeric),
        "alpha" => ascii(u8::is_ascii_alphabetic),
        "blank" => vec![' ', '\t'],
        "cntrl" => ascii(u8::is_ascii_control),
        "digit" => DIGITS.chars().collect(),
        "graph" => ascii(u8::is_ascii_graphic),
        "lower" => ALPHA_LOWER.chars().collect(),
        "print" => ascii(|b| b.is_ascii_graphic() || *b == b' '),
        "punct" => PUNCT.chars().collect(),
        "space" => vec![' ', '\t', '\n', '\x0b', '\x0c', '\r'],
        "upper" => ALPHA_UPPER.chars().collect(),
        "xdigit" => ascii(u8::is_ascii_hexdigit),
        _ => return None,
    };
    Some(v)
}

/// Reads one (possibly backslash-escaped) character.
fn next_literal(s: &str) -> Option<(char, &str)> {
    let mut it = s.chars();
    let c = it.next()?;
    if c != '\\' {
        return Some((c, it.as_str()));
    }
    let escaped = match it.next() {
        Some('n') => '\n',
        Some('t') => '\t',
        Some(other) => other,
        None => '\\',
    };
    Some((escaped, it.as_str()))
}

/// Expand a `tr(1)` style set such as `[:alnum:]_-` or `a-f0-9` into the
/// characters it denotes, deduplicated and sorted.
///
/// ```
/// use passupd_store::policy::expand_character_set;
///
/// let set = expand_character_set("a-c[:digit:]_").unwrap();
/// assert_eq!(set.iter().collect::<String>(), "0123456789_abc");
/// ```
pub fn expand_character_set(pattern: &str) -> Result<Vec<char>> {
    let re_class = regex!(r"^\[:([a-z]+):\]");

    let mut set = BTreeSet::new();
    let mut rest = pattern;

    while !rest.is_empty() {
        if let Some(caps) = re_class.captures(rest) {
            if let Some(chars) = self::class_chars(&caps[1]) {
                set.extend(chars);
                rest = &rest[caps[0].len()..];
                continue;
            }
        }

        let Some((lo, after)) = self::next_literal(rest) else {
            break
        };
        let range_end = after
            .strip_prefix('-')
            .filter(|tail| !tail.is_empty())
            .and_then(self::next_literal);

        match range_end {
            Some((hi, after_range)) if lo <= hi => {
                set.extend(lo..=hi);
                rest = after_range;
            }
            _ => {
                set.insert(lo);
                rest = after;
            }
        }
    }

    if set.is_empty() {
        return Err(Error::EmptyCharacterSet(pattern.to_owned()));
    }
    Ok(set.into_iter().collect())
}

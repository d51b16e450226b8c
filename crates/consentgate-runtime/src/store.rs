//! Consent store: the persisted record behind one cookie per site
//!
//! Reads try the current cookie, then the legacy one. Whatever is found is
//! run through an ordered list of decode strategies, since different layers
//! (browser, CMS, caching plugins) quote, slash or URL-encode the value
//! differently. Absence is the only thing that yields `None`.

use chrono::{Duration, Utc};
use consentgate_core::{
    normalize, now_millis, ConsentRecord, SiteConfig, SCHEMA_VERSION,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Cookie storage capability of the host page.
pub trait CookieJar {
    /// Raw cookie value as the host exposes it, without any decoding.
    fn get(&self, name: &str) -> Option<String>;

    /// Persist a cookie in one call.
    fn set(&mut self, cookie: SetCookie);
}

/// A cookie write, with every attribute the banner sets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SetCookie {
    pub name: String,
    /// URL-encoded value.
    pub value: String,
    pub max_age_secs: i64,
    /// RFC 1123 expiry date.
    pub expires: String,
    pub path: String,
    pub same_site: String,
    pub secure: bool,
}

impl SetCookie {
    pub fn new(name: &str, value: &str, retention_days: u32, secure: bool) -> Self {
        let expires = Utc::now() + Duration::days(i64::from(retention_days));
        Self {
            name: name.to_string(),
            value: urlencoding::encode(value).into_owned(),
            max_age_secs: i64::from(retention_days) * 24 * 60 * 60,
            expires: expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            path: "/".into(),
            same_site: "Lax".into(),
            secure,
        }
    }

    /// `Set-Cookie` / `document.cookie` assignment string.
    pub fn header(&self) -> String {
        let mut header = format!(
            "{}={}; expires={}; max-age={}; path={}; SameSite={}",
            self.name, self.value, self.expires, self.max_age_secs, self.path, self.same_site
        );
        if self.secure {
            header.push_str("; Secure");
        }
        header
    }
}

/// In-memory jar seeded from a `Cookie:` header.
#[derive(Clone, Debug, Default)]
pub struct MemoryCookieJar {
    values: HashMap<String, String>,
    written: Vec<SetCookie>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `a=1; b=2`. Pairs without `=` are skipped; the first duplicate wins.
    pub fn from_header(header: &str) -> Self {
        let mut jar = Self::new();
        for part in header.split(';') {
            let Some((name, value)) = part.trim().split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            jar.values
                .entry(name.to_string())
                .or_insert_with(|| value.to_string());
        }
        jar
    }

    pub fn insert(&mut self, name: impl Into<String>, raw: impl Into<String>) {
        self.values.insert(name.into(), raw.into());
    }

    /// Every write made through this jar, oldest first.
    pub fn written(&self) -> &[SetCookie] {
        &self.written
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }

    fn set(&mut self, cookie: SetCookie) {
        self.values.insert(cookie.name.clone(), cookie.value.clone());
        self.written.push(cookie);
    }
}

/// One way of turning raw cookie text into JSON text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeStrategy {
    AsIs,
    QuoteStripped,
    Unslashed,
    UrlDecoded,
    FormDecoded,
}

/// Upper bound on URL-decoding passes; some hosts encode the value twice.
pub const MAX_URL_DECODE_PASSES: usize = 3;

impl DecodeStrategy {
    /// Tried in this order; the first candidate that parses as an object wins.
    pub const ORDER: [DecodeStrategy; 5] = [
        DecodeStrategy::AsIs,
        DecodeStrategy::QuoteStripped,
        DecodeStrategy::Unslashed,
        DecodeStrategy::UrlDecoded,
        DecodeStrategy::FormDecoded,
    ];

    /// Candidate JSON texts for this strategy. URL strategies yield one
    /// candidate per decoding pass, stopping once the text no longer changes.
    pub fn candidates(&self, raw: &str) -> Vec<String> {
        let raw = raw.trim();
        let candidates = match self {
            DecodeStrategy::AsIs => vec![raw.to_string()],
            DecodeStrategy::QuoteStripped => vec![strip_outer_quotes(raw).to_string()],
            DecodeStrategy::Unslashed => vec![strip_outer_quotes(&unslash(raw)).to_string()],
            DecodeStrategy::UrlDecoded => url_decode_passes(raw, false),
            DecodeStrategy::FormDecoded => url_decode_passes(raw, true),
        };
        candidates.into_iter().filter(|c| !c.is_empty()).collect()
    }

    /// The first candidate that parses as a JSON object.
    pub fn decode(&self, raw: &str) -> Option<Value> {
        self.candidates(raw).into_iter().find_map(|candidate| {
            match serde_json::from_str::<Value>(&candidate) {
                Ok(value) if value.is_object() => Some(value),
                _ => None,
            }
        })
    }
}

fn url_decode_passes(raw: &str, plus_as_space: bool) -> Vec<String> {
    let mut passes = Vec::new();
    let mut current = raw.to_string();
    for _ in 0..MAX_URL_DECODE_PASSES {
        let input = if plus_as_space {
            current.replace('+', " ")
        } else {
            current.clone()
        };
        let decoded = match urlencoding::decode(&input) {
            Ok(decoded) => decoded.trim().to_string(),
            Err(_) => break,
        };
        if decoded == current {
            break;
        }
        current = strip_outer_quotes(&decoded).to_string();
        passes.push(current.clone());
    }
    passes
}

/// Remove one level of backslash escaping: `\"` becomes `"`, `\\` becomes `\`.
fn unslash(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn strip_outer_quotes(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Decode a raw cookie value into a JSON object, trying every strategy in order.
pub fn decode_blob(raw: &str) -> Option<Value> {
    DecodeStrategy::ORDER.iter().find_map(|strategy| {
        let value = strategy.decode(raw)?;
        debug!("consent cookie decoded via {:?}", strategy);
        Some(value)
    })
}

/// Consent record persistence over a [`CookieJar`].
pub struct ConsentStore<J> {
    jar: J,
    cookie_name: String,
    legacy_name: String,
    retention_days: u32,
    secure: bool,
}

impl<J: CookieJar> ConsentStore<J> {
    /// `secure` marks written cookies `Secure`; pass true when served over TLS.
    pub fn new(jar: J, config: &SiteConfig, secure: bool) -> Self {
        Self {
            jar,
            cookie_name: config.cookie.name.clone(),
            legacy_name: config.cookie.legacy_name.clone(),
            retention_days: config.retention_days(),
            secure,
        }
    }

    pub fn jar(&self) -> &J {
        &self.jar
    }

    /// Raw blob and the cookie it came from; empty values count as absent.
    fn raw(&self) -> Option<(&str, String)> {
        [self.cookie_name.as_str(), self.legacy_name.as_str()]
            .into_iter()
            .find_map(|name| {
                self.jar
                    .get(name)
                    .filter(|raw| !raw.trim().is_empty())
                    .map(|raw| (name, raw))
            })
    }

    /// Stored consent, or `None` when neither cookie exists.
    ///
    /// A present but undecodable value reads as an explicit all-denied choice.
    pub fn read(&self) -> Option<ConsentRecord> {
        let (name, raw) = self.raw()?;
        match decode_blob(&raw) {
            Some(value) => Some(normalize(&value)),
            None => {
                debug!("cookie {} present but undecodable, treating as denied", name);
                Some(ConsentRecord::denied())
            }
        }
    }

    /// Whether the stored blob carries a recognizable consent field.
    pub fn has_valid_consent(&self) -> bool {
        self.raw()
            .and_then(|(_, raw)| decode_blob(&raw))
            .is_some_and(|value| consentgate_core::has_valid_consent(&value))
    }

    /// Persist a record under the current cookie, restamped with the schema
    /// version and the current time. Returns what was written.
    pub fn write(&mut self, record: &ConsentRecord) -> ConsentRecord {
        let stored = ConsentRecord {
            version: SCHEMA_VERSION,
            timestamp: now_millis(),
            ..record.clone()
        };

        match serde_json::to_string(&stored) {
            Ok(json) => {
                let cookie = SetCookie::new(&self.cookie_name, &json, self.retention_days, self.secure);
                debug!("writing consent cookie: {}", cookie.header());
                self.jar.set(cookie);
            }
            Err(e) => warn!("failed to serialize consent record: {}", e),
        }

        stored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consentgate_core::Signal;

    #[test]
    fn header_parsing_skips_junk() {
        let jar = MemoryCookieJar::from_header("a=1; junk; =x; b = 2 ; a=3");
        assert_eq!(jar.get("a").as_deref(), Some("1"));
        assert_eq!(jar.get("b").as_deref(), Some(" 2"));
        assert!(jar.get("junk").is_none());
    }

    #[test]
    fn strategies_in_order() {
        assert!(DecodeStrategy::AsIs.decode(r#"{"a":1}"#).is_some());
        assert!(DecodeStrategy::AsIs.decode(r#""{"a":1}""#).is_none());
        assert!(DecodeStrategy::QuoteStripped.decode(r#"'{"a":1}'"#).is_some());
        assert!(DecodeStrategy::Unslashed.decode(r#"{\"a\":1}"#).is_some());
        assert!(DecodeStrategy::UrlDecoded.decode("%7B%22a%22%3A1%7D").is_some());
        assert!(DecodeStrategy::FormDecoded
            .decode("%7B%22a%22%3A+%22b+c%22%7D")
            .is_some_and(|v| v["a"] == "b c"));
    }

    #[test]
    fn unslash_removes_one_level() {
        assert_eq!(unslash(r#"{\"a\":\"b\\\\c\"}"#), r#"{"a":"b\\c"}"#);
        assert_eq!(unslash(r"trailing\"), "trailing");
        let value = DecodeStrategy::Unslashed
            .decode(r#"{\"path\":\"C:\\\\tmp\"}"#)
            .unwrap();
        assert_eq!(value["path"], r"C:\tmp");
    }

    #[test]
    fn url_decoding_repeats_until_stable() {
        let once = urlencoding::encode(r#"{"a":1}"#).into_owned();
        let twice = urlencoding::encode(&once).into_owned();
        assert!(DecodeStrategy::UrlDecoded.decode(&twice).is_some());
        assert_eq!(DecodeStrategy::UrlDecoded.candidates(&twice).len(), 2);
        assert!(DecodeStrategy::UrlDecoded.candidates("plain").is_empty());
    }

    #[test]
    fn json_string_is_not_an_object() {
        assert!(decode_blob(r#""granted""#).is_none());
        assert!(decode_blob("[1,2]").is_none());
    }

    #[test]
    fn set_cookie_attributes() {
        let cookie = SetCookie::new("c", r#"{"a":1}"#, 2, true);
        assert_eq!(cookie.value, "%7B%22a%22%3A1%7D");
        assert_eq!(cookie.max_age_secs, 172_800);
        let header = cookie.header();
        assert!(header.starts_with("c=%7B"));
        assert!(header.contains("path=/"));
        assert!(header.contains("SameSite=Lax"));
        assert!(header.ends_with("; Secure"));
        assert!(!SetCookie::new("c", "v", 1, false).header().contains("Secure"));
    }

    #[test]
    fn write_restamps_version() {
        let mut store = ConsentStore::new(MemoryCookieJar::new(), &SiteConfig::default(), false);
        let mut record = ConsentRecord::granted();
        record.version = 1;
        record.timestamp = 5;
        let stored = store.write(&record);
        assert_eq!(stored.version, SCHEMA_VERSION);
        assert!(stored.timestamp > 5);
        assert_eq!(stored.ad_personalization, Signal::Granted);
        assert_eq!(store.read(), Some(stored));
    }
}

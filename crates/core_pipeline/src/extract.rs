//! Name and student number extraction from OCR text
//!
//! Card layouts put labels ("STUDENT", the institution name, expiry months)
//! right next to the holder's name, and OCR happily glues them together.
//! Those keywords are removed first, then the first run of capitalized name
//! tokens followed by a 7-digit number is taken as the identity.
//!
//! Known limitations:
//! - single-letter initials never match (name tokens need two letters)
//! - keywords are removed as substrings, so `Mayer` loses its `May`

use crate::types::StudentIdentity;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// Removed from OCR text (case-insensitively) before matching
pub const EXCLUDED_KEYWORDS: &[&str] = &[
    "RMIT",
    "Student",
    "STUDENT",
    "UNIVERSITY",
    r"SINH\sVIEN",
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Name tokens, optional whitespace, then exactly seven digits
const IDENTITY_PATTERN: &str = r"([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)*)\s*([0-9]{7})(?:[^0-9]|$)";

static DEFAULT_EXTRACTOR: Lazy<IdExtractor> = Lazy::new(IdExtractor::default);

/// Extract an identity using the built-in keyword list
pub fn extract(raw_text: &str) -> Option<StudentIdentity> {
    DEFAULT_EXTRACTOR.extract(raw_text)
}

/// Compiled keyword and identity patterns
#[derive(Debug, Clone)]
pub struct IdExtractor {
    keywords: Regex,
    identity: Regex,
}

impl Default for IdExtractor {
    fn default() -> Self {
        Self::from_keyword_patterns(EXCLUDED_KEYWORDS.iter().map(|k| (*k).to_string()))
            .expect("built-in extraction patterns are valid")
    }
}

impl IdExtractor {
    /// Built-in keywords plus caller-supplied literal keywords
    ///
    /// Extra keywords are matched literally and case-insensitively; empty
    /// entries are ignored.
    pub fn with_extra_keywords<I, S>(extra: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extra = extra
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .map(|k| regex::escape(&k));
        let patterns = EXCLUDED_KEYWORDS
            .iter()
            .map(|k| (*k).to_string())
            .chain(extra);

        Self::from_keyword_patterns(patterns)
    }

    fn from_keyword_patterns<I>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = String>,
    {
        let alternation = patterns.into_iter().collect::<Vec<_>>().join("|");
        Ok(Self {
            keywords: Regex::new(&format!("(?i)(?:{alternation})"))?,
            identity: Regex::new(IDENTITY_PATTERN)?,
        })
    }

    /// Remove every excluded keyword occurrence
    pub fn strip_keywords<'a>(&self, text: &'a str) -> Cow<'a, str> {
        self.keywords.replace_all(text, "")
    }

    /// Find the first name + student number in the text
    ///
    /// Returns `None` when nothing matches; that is an expected outcome for
    /// blurry or non-card images, not a failure.
    pub fn extract(&self, raw_text: &str) -> Option<StudentIdentity> {
        let cleaned = self.strip_keywords(raw_text);
        let captures = self.identity.captures(&cleaned)?;

        let name = format_name(&captures[1]);
        let student_number = captures[2].trim().to_string();

        Some(StudentIdentity {
            name: name.trim().to_string(),
            student_number,
        })
    }
}

/// Normalize each whitespace-separated token and join with single spaces
pub fn format_name(raw_name: &str) -> String {
    raw_name
        .split_whitespace()
        .map(format_name_token)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Capitalize an all-uppercase token; leave mixed-case tokens alone
///
/// `SMITH` becomes `Smith` while `McDonald` stays as written.
pub fn format_name_token(token: &str) -> String {
    if is_all_uppercase(token) {
        capitalize(token)
    } else {
        token.to_string()
    }
}

fn is_all_uppercase(token: &str) -> bool {
    let mut cased = token.chars().filter(|c| c.is_lowercase() || c.is_uppercase()).peekable();
    cased.peek().is_some() && cased.all(char::is_uppercase)
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

//! Reading `.me3` profile files.
//!
//! Two parsers sit behind [`ProfileParser`]:
//! - [`StrictParser`] deserializes the file as TOML into typed raw shapes. It also
//!   accepts the legacy `[[natives]]` block layout, since that is valid TOML.
//! - [`LenientParser`] recovers what it can from files that are not valid TOML
//!   (duplicate keys, mixed layouts, unbalanced brackets) with pattern matching.
//!
//! [`ProfileStore`] chains them and never fails: the worst case is an empty
//! `v1` document.

use camino::Utf8Path;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use thiserror::Error;

use crate::models::{Dependency, Initializer, NativeEntry, PROFILE_VERSION, ProfileDocument};
use crate::profile::migrate::{package_from_fields, support_from_fields};

/// Errors a single parser can report. [`ProfileStore`] swallows these.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("TOML syntax error: {0}")]
    Syntax(#[from] toml::de::Error),

    #[error("Unsupported {section} entry: {reason}")]
    Shape {
        section: &'static str,
        reason: String,
    },
}

/// One way of turning profile text into a [`ProfileDocument`].
pub trait ProfileParser: Send + Sync {
    /// Short name used in log messages
    fn name(&self) -> &'static str;

    fn parse_str(&self, content: &str) -> Result<ProfileDocument, ParseError>;
}

/// Parses profiles with a strict-then-lenient fallback chain.
pub struct ProfileStore {
    parsers: Vec<Box<dyn ProfileParser>>,
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileStore {
    pub fn new() -> Self {
        Self {
            parsers: vec![Box::new(StrictParser), Box::new(LenientParser::new())],
        }
    }

    /// Parse the profile at `path`.
    ///
    /// A missing or unreadable file yields the empty skeleton.
    pub fn parse(&self, path: &Utf8Path) -> ProfileDocument {
        if !path.exists() {
            tracing::debug!("Profile {} does not exist, using empty skeleton", path);
            return ProfileDocument::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => self.parse_content(&content, path.as_str()),
            Err(e) => {
                tracing::warn!("Failed to read profile {}: {}", path, e);
                ProfileDocument::default()
            }
        }
    }

    pub fn parse_str(&self, content: &str) -> ProfileDocument {
        self.parse_content(content, "<memory>")
    }

    fn parse_content(&self, content: &str, origin: &str) -> ProfileDocument {
        for parser in &self.parsers {
            match parser.parse_str(content) {
                Ok(doc) => {
                    tracing::debug!(
                        "Parsed {} with {} parser: {} natives, {} packages",
                        origin,
                        parser.name(),
                        doc.natives.len(),
                        doc.packages.len()
                    );
                    return doc;
                }
                Err(e) => {
                    tracing::warn!("{} parser rejected {}: {}", parser.name(), origin, e);
                }
            }
        }

        tracing::warn!("No parser could read {}, using empty skeleton", origin);
        ProfileDocument::default()
    }
}

// ---------------------------------------------------------------------------
// Strict parser
// ---------------------------------------------------------------------------

/// TOML-backed parser. Unknown keys are ignored, wrongly-typed values are not.
pub struct StrictParser;

#[derive(Debug, Deserialize)]
struct RawProfile {
    #[serde(rename = "profileVersion", default)]
    profile_version: Option<String>,
    #[serde(default)]
    natives: Vec<RawNative>,
    #[serde(default)]
    supports: Vec<RawSupport>,
    #[serde(default)]
    packages: Vec<RawPackage>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNative {
    Bare(String),
    Table(RawNativeTable),
}

#[derive(Debug, Deserialize)]
struct RawNativeTable {
    path: String,
    #[serde(default)]
    optional: Option<bool>,
    #[serde(default)]
    initializer: Option<RawInitializer>,
    #[serde(default)]
    finalizer: Option<String>,
    #[serde(default)]
    load_before: Vec<RawDependency>,
    #[serde(default)]
    load_after: Vec<RawDependency>,
}

#[derive(Debug, Deserialize)]
struct RawInitializer {
    #[serde(default)]
    function: Option<String>,
    #[serde(default)]
    delay: Option<RawDelay>,
}

#[derive(Debug, Deserialize)]
struct RawDelay {
    #[serde(default = "default_delay_ms")]
    ms: u64,
}

fn default_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDependency {
    Bare(String),
    Table {
        id: String,
        #[serde(default)]
        optional: bool,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSupport {
    Bare(String),
    Table {
        #[serde(default)]
        game: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        id: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct RawPackage {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    load_before: Vec<RawDependency>,
    #[serde(default)]
    load_after: Vec<RawDependency>,
}

impl ProfileParser for StrictParser {
    fn name(&self) -> &'static str {
        "strict"
    }

    fn parse_str(&self, content: &str) -> Result<ProfileDocument, ParseError> {
        let raw: RawProfile = toml::from_str(content)?;

        let natives = raw
            .natives
            .into_iter()
            .map(convert_native)
            .collect::<Result<Vec<_>, _>>()?;

        let supports = raw
            .supports
            .into_iter()
            .map(|support| {
                let entry = match &support {
                    RawSupport::Bare(game) => support_from_fields(Some(game), None, None),
                    RawSupport::Table { game, name, id } => {
                        support_from_fields(game.as_deref(), name.as_deref(), id.as_deref())
                    }
                };
                entry.ok_or_else(|| ParseError::Shape {
                    section: "supports",
                    reason: format!("no game identifier in {:?}", support),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let packages = raw
            .packages
            .into_iter()
            .map(|raw_package| {
                let source = raw_package.source.or(raw_package.path);
                let mut entry = package_from_fields(raw_package.id, source).ok_or_else(|| {
                    ParseError::Shape {
                        section: "packages",
                        reason: "package has neither id nor source".to_string(),
                    }
                })?;
                entry.load_before = convert_dependencies(raw_package.load_before);
                entry.load_after = convert_dependencies(raw_package.load_after);
                Ok(entry)
            })
            .collect::<Result<Vec<_>, ParseError>>()?;

        Ok(ProfileDocument {
            profile_version: raw
                .profile_version
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| PROFILE_VERSION.to_string()),
            natives,
            supports,
            packages,
        })
    }
}

fn convert_native(raw: RawNative) -> Result<NativeEntry, ParseError> {
    let table = match raw {
        // Bare strings are upgraded to `{path = ...}`
        RawNative::Bare(path) => RawNativeTable {
            path,
            optional: None,
            initializer: None,
            finalizer: None,
            load_before: Vec::new(),
            load_after: Vec::new(),
        },
        RawNative::Table(table) => table,
    };

    if table.path.trim().is_empty() {
        return Err(ParseError::Shape {
            section: "natives",
            reason: "empty path".to_string(),
        });
    }

    let initializer = match table.initializer {
        None => None,
        Some(RawInitializer {
            function: Some(function),
            ..
        }) => Some(Initializer::Function(function)),
        Some(RawInitializer {
            delay: Some(delay), ..
        }) => Some(Initializer::Delay { ms: delay.ms }),
        Some(_) => {
            return Err(ParseError::Shape {
                section: "natives",
                reason: format!("initializer of {} has neither function nor delay", table.path),
            });
        }
    };

    Ok(NativeEntry {
        path: table.path,
        optional: table.optional,
        initializer,
        finalizer: table.finalizer,
        load_before: convert_dependencies(table.load_before),
        load_after: convert_dependencies(table.load_after),
    })
}

fn convert_dependencies(raw: Vec<RawDependency>) -> Vec<Dependency> {
    raw.into_iter()
        .map(|dep| match dep {
            RawDependency::Bare(id) => Dependency::new(id, false),
            RawDependency::Table { id, optional } => Dependency::new(id, optional),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Lenient parser
// ---------------------------------------------------------------------------

const TOP_LEVEL_KEYS: [&str; 4] = ["profileVersion", "natives", "supports", "packages"];

/// Pattern-based recovery for profiles that are not valid TOML.
///
/// Recovers `profileVersion`, native paths, supported games and package
/// id/source pairs. Load-order metadata is not recovered.
pub struct LenientParser {
    version: Regex,
    table_header: Regex,
    assignment: Regex,
    field: Regex,
}

impl Default for LenientParser {
    fn default() -> Self {
        Self::new()
    }
}

/// A run of text belonging to one top-level key or one `[[key]]` block.
#[derive(Debug)]
struct Section {
    name: String,
    block: bool,
    body: String,
}

/// A single array item: either a bare string or the text of a table.
#[derive(Debug, PartialEq)]
enum Unit {
    Bare(String),
    Table(String),
}

impl LenientParser {
    pub fn new() -> Self {
        Self {
            version: Regex::new(r#"(?m)^\s*profileVersion\s*=\s*["']([^"'\n]*)["']"#)
                .expect("Invalid version regex"),
            table_header: Regex::new(r"^(\[\[?)\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\]\]?\s*$")
                .expect("Invalid table header regex"),
            assignment: Regex::new(r"^([A-Za-z_][A-Za-z0-9_\-]*)\s*=\s*(.*)$")
                .expect("Invalid assignment regex"),
            field: Regex::new(
                r#"([A-Za-z_][A-Za-z0-9_\-]*)\s*=\s*(?:'([^'\n]*)'|"((?:[^"\\\n]|\\.)*)"|(true|false|-?\d+))"#,
            )
            .expect("Invalid field regex"),
        }
    }

    fn split_sections(&self, content: &str) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut current: Option<Section> = None;
        let mut depth: i32 = 0;

        for line in content.lines() {
            let stripped = strip_comment(line);
            let trimmed = stripped.trim();
            let unindented = !line.starts_with(char::is_whitespace);

            if depth <= 0 {
                if let Some(caps) = self.table_header.captures(trimmed) {
                    sections.extend(current.take());
                    // `[table]` headers are kept only so their keys are not misread
                    let block = &caps[1] == "[[";
                    current = Some(Section {
                        name: if block { caps[2].to_string() } else { String::new() },
                        block: true,
                        body: String::new(),
                    });
                    depth = 0;
                    continue;
                }
            }

            if let Some(caps) = self.assignment.captures(trimmed) {
                let key = &caps[1];
                let in_block = current.as_ref().is_some_and(|s| s.block);
                let top_level_key = TOP_LEVEL_KEYS.contains(&key);
                let starts_section = if depth <= 0 {
                    !in_block || top_level_key
                } else {
                    // An unbalanced array must not swallow the rest of the file
                    top_level_key && unindented
                };

                if starts_section {
                    sections.extend(current.take());
                    let rest = caps[2].to_string();
                    depth = bracket_delta(&rest);
                    current = Some(Section {
                        name: key.to_string(),
                        block: false,
                        body: rest,
                    });
                    continue;
                }
            }

            if let Some(section) = current.as_mut() {
                section.body.push('\n');
                section.body.push_str(&stripped);
                if !section.block {
                    depth += bracket_delta(&stripped);
                }
            }
        }

        sections.extend(current);
        sections
    }

    /// First occurrence of every `key = value` pair at the unit's top level.
    fn fields(&self, table: &str) -> Vec<(String, String)> {
        let flat = flatten_nested(table);
        let mut fields: Vec<(String, String)> = Vec::new();

        for caps in self.field.captures_iter(&flat) {
            let key = caps[1].to_string();
            if fields.iter().any(|(existing, _)| *existing == key) {
                continue;
            }
            let value = if let Some(literal) = caps.get(2) {
                literal.as_str().to_string()
            } else if let Some(basic) = caps.get(3) {
                unescape_basic(basic.as_str())
            } else {
                caps.get(4).map(|m| m.as_str().to_string()).unwrap_or_default()
            };
            fields.push((key, value));
        }

        fields
    }
}

impl ProfileParser for LenientParser {
    fn name(&self) -> &'static str {
        "lenient"
    }

    fn parse_str(&self, content: &str) -> Result<ProfileDocument, ParseError> {
        let mut doc = ProfileDocument::default();

        if let Some(caps) = self.version.captures(content) {
            let version = caps[1].trim();
            if !version.is_empty() {
                doc.profile_version = version.to_string();
            }
        }

        for section in self.split_sections(content) {
            let units = if section.block {
                vec![Unit::Table(section.body.clone())]
            } else {
                inline_units(&section.body)
            };

            for unit in units {
                match (section.name.as_str(), unit) {
                    ("natives", Unit::Bare(path)) if !path.trim().is_empty() => {
                        doc.natives.push(NativeEntry::new(path));
                    }
                    ("natives", Unit::Table(text)) => {
                        let fields = self.fields(&text);
                        if let Some(path) = lookup(&fields, "path").filter(|p| !p.trim().is_empty())
                        {
                            let mut native = NativeEntry::new(path);
                            native.optional = lookup(&fields, "optional").and_then(|v| v.parse().ok());
                            native.finalizer = lookup(&fields, "finalizer").map(str::to_string);
                            doc.natives.push(native);
                        }
                    }
                    ("supports", Unit::Bare(game)) => {
                        doc.supports.extend(support_from_fields(Some(&game), None, None));
                    }
                    ("supports", Unit::Table(text)) => {
                        let fields = self.fields(&text);
                        doc.supports.extend(support_from_fields(
                            lookup(&fields, "game"),
                            lookup(&fields, "name"),
                            lookup(&fields, "id"),
                        ));
                    }
                    ("packages", Unit::Table(text)) => {
                        let fields = self.fields(&text);
                        let source = lookup(&fields, "source")
                            .or_else(|| lookup(&fields, "path"))
                            .map(str::to_string);
                        doc.packages.extend(package_from_fields(
                            lookup(&fields, "id").map(str::to_string),
                            source,
                        ));
                    }
                    _ => {}
                }
            }
        }

        Ok(doc)
    }
}

fn lookup<'a>(fields: &'a [(String, String)], key: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Walks TOML-ish text tracking quotes so brackets inside strings are ignored.
struct QuoteTracker {
    quote: Option<char>,
    escaped: bool,
}

impl QuoteTracker {
    fn new() -> Self {
        Self {
            quote: None,
            escaped: false,
        }
    }

    /// Feed one character. Returns true while the character is part of a string
    /// (including its delimiters).
    fn feed(&mut self, c: char) -> bool {
        match self.quote {
            Some(q) => {
                if self.escaped {
                    self.escaped = false;
                } else if q == '"' && c == '\\' {
                    self.escaped = true;
                } else if c == q {
                    self.quote = None;
                }
                true
            }
            None if c == '\'' || c == '"' => {
                self.quote = Some(c);
                true
            }
            None => false,
        }
    }
}

fn strip_comment(line: &str) -> String {
    let mut tracker = QuoteTracker::new();
    for (i, c) in line.char_indices() {
        if !tracker.feed(c) && c == '#' {
            return line[..i].to_string();
        }
    }
    line.to_string()
}

fn bracket_delta(text: &str) -> i32 {
    let mut tracker = QuoteTracker::new();
    let mut delta = 0;
    for c in text.chars() {
        if tracker.feed(c) {
            continue;
        }
        match c {
            '[' | '{' => delta += 1,
            ']' | '}' => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// Split the right-hand side of `key = [ ... ]` into its items.
fn inline_units(body: &str) -> Vec<Unit> {
    let mut units = Vec::new();
    let mut depth = 0;
    let mut start: Option<usize> = None;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if q == '"' && c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
                if depth == 1 {
                    if let Some(s) = start.take() {
                        let raw = &body[s + 1..i];
                        let value = if q == '"' {
                            unescape_basic(raw)
                        } else {
                            raw.to_string()
                        };
                        units.push(Unit::Bare(value));
                    }
                }
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                if depth == 1 {
                    start = Some(i);
                }
            }
            '[' | '{' => {
                if depth == 1 && c == '{' {
                    start = Some(i);
                }
                depth += 1;
            }
            ']' | '}' => {
                depth -= 1;
                if depth == 1 && c == '}' {
                    if let Some(s) = start.take() {
                        units.push(Unit::Table(body[s..=i].to_string()));
                    }
                }
            }
            _ => {}
        }
    }

    units
}

/// Drop the outer braces of a table and blank out nested arrays/tables, so only
/// the table's own keys remain visible to the field regex.
fn flatten_nested(table: &str) -> String {
    let trimmed = table.trim();
    let inner = trimmed
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .unwrap_or(trimmed);

    let mut out = String::with_capacity(inner.len());
    let mut tracker = QuoteTracker::new();
    let mut depth = 0;
    for c in inner.chars() {
        let in_string = tracker.feed(c);
        if !in_string {
            match c {
                '[' | '{' => {
                    depth += 1;
                    continue;
                }
                ']' | '}' => {
                    depth -= 1;
                    continue;
                }
                _ => {}
            }
        }
        if depth <= 0 {
            out.push(c);
        } else if c == '\n' {
            out.push('\n');
        }
    }
    out
}

fn unescape_basic(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

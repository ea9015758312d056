//! Placeholder field extraction.
//!
//! Word splits a typed `{{customer.name}}` across several `<w:r>` runs whenever
//! formatting, spell-check or revision marks touch it, so the scanner works on
//! a tag-stripped, entity-decoded view of each text part. The passes below are
//! plain regular expressions; callers only see [`FieldSet`] and
//! [`extract_fields`], so a real tokenizer can replace them later.

use quick_xml::escape::{resolve_html5_entity, unescape};
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::BTreeSet;
use std::io::{Cursor, Read};
use std::sync::LazyLock;
use zip::ZipArchive;

use super::container::DOCUMENT_PART;

const HEADER_PARTS: [&str; 3] = ["word/header1.xml", "word/header2.xml", "word/header3.xml"];
const FOOTER_PARTS: [&str; 3] = ["word/footer1.xml", "word/footer2.xml", "word/footer3.xml"];

/// Directive names, compared case-insensitively.
const CONTROL_KEYWORDS: [&str; 10] = [
    "END-FOR", "END-IF", "ENDFOR", "ENDIF", "FOR", "IF", "ELSE", "IMAGE", "LINK", "HTML",
];

/// Implicit loop aliases, compared literally.
const LOOP_ALIASES: [&str; 3] = ["this", "$idx", "$index"];

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(?:#[0-9]+|#[xX][0-9A-Fa-f]+|[A-Za-z][A-Za-z0-9]*);").unwrap());

static SIMPLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*)\s*\}\}").unwrap()
});

static LOOP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{\{\s*FOR\s+([A-Za-z_$][\w$.]*)(?:\s+IN\s+([A-Za-z_$][\w$.]*))?\s*\}\}")
        .unwrap()
});

static IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{\s*IMAGE\s+([A-Za-z_$][\w$.]*)\s*\}\}").unwrap());

static IF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{\s*IF\s+([A-Za-z_$][\w$.]*)").unwrap());

pub fn is_control_keyword(name: &str) -> bool {
    LOOP_ALIASES.contains(&name)
        || CONTROL_KEYWORDS
            .iter()
            .any(|keyword| keyword.eq_ignore_ascii_case(name))
}

/// Distinct data-field names referenced by a template, kept in lexicographic
/// order. Control keywords are rejected on insert.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldSet {
    fields: BTreeSet<String>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str) -> bool {
        if name.is_empty() || is_control_keyword(name) {
            return false;
        }
        self.fields.insert(name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Scan one XML text part and add every field it references.
    pub fn scan_markup(&mut self, xml: &str) {
        let plain = plain_text(xml);

        for caps in SIMPLE_RE.captures_iter(&plain) {
            self.insert(&caps[1]);
        }

        for caps in LOOP_RE.captures_iter(&plain) {
            // `FOR x IN y` iterates y; bare `FOR x` names the collection itself.
            match caps.get(2) {
                Some(collection) => self.insert(collection.as_str()),
                None => self.insert(&caps[1]),
            };
        }

        for caps in IMAGE_RE.captures_iter(&plain) {
            self.insert(&caps[1]);
        }

        for caps in IF_RE.captures_iter(&plain) {
            self.insert(&caps[1]);
        }

        // Raw markup pass: a run can hold a whole `{{field}}` even when the
        // stripped view was mangled by entity decoding.
        // TODO: drop once split-run fixtures from real Word documents show the
        // stripped-view passes never miss a field this one finds.
        for caps in SIMPLE_RE.captures_iter(xml) {
            self.insert(&caps[1]);
        }
    }

    pub fn into_vec(self) -> Vec<String> {
        self.fields.into_iter().collect()
    }
}

/// Strip element tags, then decode entities one at a time: XML and numeric
/// references first, then HTML5 names. Unknown entities stay literal.
fn plain_text(xml: &str) -> String {
    let stripped = TAG_RE.replace_all(xml, "");
    ENTITY_RE
        .replace_all(&stripped, |caps: &Captures| decode_entity(&caps[0]))
        .into_owned()
}

fn decode_entity(entity: &str) -> String {
    if let Ok(decoded) = unescape(entity) {
        return decoded.into_owned();
    }
    let name = &entity[1..entity.len() - 1];
    resolve_html5_entity(name).unwrap_or(entity).to_string()
}

/// Extract every field referenced by the body, header and footer parts of a
/// DOCX buffer, sorted. Unreadable archives yield an empty list.
pub fn extract_fields(buffer: &[u8]) -> Vec<String> {
    let mut archive = match ZipArchive::new(Cursor::new(buffer)) {
        Ok(archive) => archive,
        Err(e) => {
            log::warn!("Field extraction skipped, archive unreadable: {}", e);
            return Vec::new();
        }
    };

    let mut fields = FieldSet::new();
    let parts = std::iter::once(DOCUMENT_PART)
        .chain(HEADER_PARTS)
        .chain(FOOTER_PARTS);

    for part in parts {
        let mut xml = String::new();
        match archive.by_name(part) {
            Ok(mut file) => {
                if let Err(e) = file.read_to_string(&mut xml) {
                    log::warn!("Could not read {} as text: {}", part, e);
                    continue;
                }
            }
            Err(_) => continue,
        }
        fields.scan_markup(&xml);
    }

    fields.into_vec()
}

/// Collect dotted key paths of a sample data tree. Arrays of objects
/// contribute the keys of their first element.
pub fn flatten_keys(value: &Value) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    collect_keys(value, "", &mut keys);
    keys
}

fn collect_keys(value: &Value, prefix: &str, keys: &mut BTreeSet<String>) {
    let Value::Object(map) = value else {
        return;
    };

    for (key, child) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match child {
            Value::Object(_) => collect_keys(child, &path, keys),
            Value::Array(items) => {
                if let Some(first @ Value::Object(_)) = items.first() {
                    collect_keys(first, &path, keys);
                }
            }
            _ => {}
        }

        keys.insert(path);
    }
}

/// Warnings for top-level template fields that the sample data lacks.
/// Dotted fields are not checked.
pub fn cross_check(fields: &[String], sample: &Value) -> Vec<String> {
    let keys = flatten_keys(sample);
    fields
        .iter()
        .filter(|field| !field.contains('.') && !keys.contains(field.as_str()))
        .map(|field| format!("Field '{field}' is used in the template but missing from the sample data"))
        .collect()
}

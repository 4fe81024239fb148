//! Matroska chapter XML reading and writing.

use std::fmt::Display;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::time::{format_timestamp, parse_timestamp};

/// Language written for a display that does not name one.
pub const DEFAULT_CHAPTER_LANGUAGE: &str = "eng";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterEdition {
    #[serde(default)]
    pub uid: Option<u64>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub is_ordered: bool,
    #[serde(default)]
    pub chapters: Vec<ChapterAtom>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterAtom {
    #[serde(default)]
    pub uid: Option<u64>,
    /// Start time in nanoseconds.
    pub time_start: u64,
    #[serde(default)]
    pub time_end: Option<u64>,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default = "enabled_by_default")]
    pub is_enabled: bool,
    #[serde(default)]
    pub displays: Vec<ChapterDisplay>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterDisplay {
    pub text: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn enabled_by_default() -> bool {
    true
}

fn default_language() -> String {
    DEFAULT_CHAPTER_LANGUAGE.to_string()
}

impl ChapterAtom {
    /// Enabled, visible chapter starting at `time_start` nanoseconds.
    pub fn new(time_start: u64) -> Self {
        Self {
            uid: None,
            time_start,
            time_end: None,
            is_hidden: false,
            is_enabled: true,
            displays: Vec::new(),
        }
    }
}

impl ChapterDisplay {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: default_language(),
        }
    }
}

/// Parses a Matroska chapter XML document.
///
/// Only direct `EditionEntry` children of `Chapters` and direct `ChapterAtom`
/// children of an edition are read; nested atoms are ignored.
///
/// # Example
/// ```
/// use engine::parse_chapters;
///
/// let xml = "<Chapters><EditionEntry><ChapterAtom>\
///     <ChapterTimeStart>00:00:10.000</ChapterTimeStart>\
///     <ChapterDisplay><ChapterString>Intro</ChapterString></ChapterDisplay>\
///     </ChapterAtom></EditionEntry></Chapters>";
/// let editions = parse_chapters(xml).expect("valid chapters");
/// let atom = &editions[0].chapters[0];
/// assert_eq!(atom.time_start, 10_000_000_000);
/// assert_eq!(atom.displays[0].language, "eng");
/// ```
pub fn parse_chapters(xml: &str) -> Result<Vec<ChapterEdition>> {
    let root = read_tree(xml)?.ok_or(EngineError::InvalidChapterDocument)?;
    if root.name != "Chapters" {
        return Err(EngineError::InvalidChapterDocument);
    }

    root.children_named("EditionEntry")
        .map(parse_edition)
        .collect()
}

fn parse_edition(node: &Element) -> Result<ChapterEdition> {
    Ok(ChapterEdition {
        uid: node.child_uid("EditionUID"),
        is_default: node.child_flag("EditionFlagDefault", false),
        is_hidden: node.child_flag("EditionFlagHidden", false),
        is_ordered: node.child_flag("EditionFlagOrdered", false),
        chapters: node
            .children_named("ChapterAtom")
            .map(parse_atom)
            .collect::<Result<_>>()?,
    })
}

fn parse_atom(node: &Element) -> Result<ChapterAtom> {
    let start = node
        .child("ChapterTimeStart")
        .ok_or(EngineError::MissingRequiredTimestamp {
            element: "ChapterTimeStart",
        })?;
    let time_end = node
        .child("ChapterTimeEnd")
        .map(|end| parse_timestamp(end.text.trim()))
        .transpose()?;

    let displays = node
        .children_named("ChapterDisplay")
        .map(|display| ChapterDisplay {
            text: display
                .child("ChapterString")
                .map(|string| string.text.clone())
                .unwrap_or_default(),
            language: display
                .child("ChapterLanguage")
                .map(|language| language.text.clone())
                .unwrap_or_else(default_language),
        })
        .collect();

    Ok(ChapterAtom {
        uid: node.child_uid("ChapterUID"),
        time_start: parse_timestamp(start.text.trim())?,
        time_end,
        is_hidden: node.child_flag("ChapterFlagHidden", false),
        is_enabled: node.child_flag("ChapterFlagEnabled", true),
        displays,
    })
}

/// Writes editions as a Matroska chapter XML document.
///
/// Every edition and atom flag is written, including those at their default.
pub fn generate_chapters(editions: &[ChapterEdition]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Chapters>\n");
    for edition in editions {
        open(&mut out, 1, "EditionEntry");
        if let Some(uid) = edition.uid {
            leaf(&mut out, 2, "EditionUID", &uid.to_string());
        }
        leaf(&mut out, 2, "EditionFlagDefault", flag(edition.is_default));
        leaf(&mut out, 2, "EditionFlagHidden", flag(edition.is_hidden));
        leaf(&mut out, 2, "EditionFlagOrdered", flag(edition.is_ordered));

        for atom in &edition.chapters {
            open(&mut out, 2, "ChapterAtom");
            if let Some(uid) = atom.uid {
                leaf(&mut out, 3, "ChapterUID", &uid.to_string());
            }
            leaf(&mut out, 3, "ChapterTimeStart", &format_timestamp(atom.time_start));
            if let Some(end) = atom.time_end {
                leaf(&mut out, 3, "ChapterTimeEnd", &format_timestamp(end));
            }
            leaf(&mut out, 3, "ChapterFlagHidden", flag(atom.is_hidden));
            leaf(&mut out, 3, "ChapterFlagEnabled", flag(atom.is_enabled));
            for display in &atom.displays {
                open(&mut out, 3, "ChapterDisplay");
                leaf(&mut out, 4, "ChapterString", &display.text);
                leaf(&mut out, 4, "ChapterLanguage", &display.language);
                close(&mut out, 3, "ChapterDisplay");
            }
            close(&mut out, 2, "ChapterAtom");
        }
        close(&mut out, 1, "EditionEntry");
    }
    out.push_str("</Chapters>\n");
    out
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

fn indent(out: &mut String, depth: usize) {
    out.extend(std::iter::repeat_n("  ", depth));
}

fn open(out: &mut String, depth: usize, name: &str) {
    indent(out, depth);
    out.push('<');
    out.push_str(name);
    out.push_str(">\n");
}

fn close(out: &mut String, depth: usize, name: &str) {
    indent(out, depth);
    out.push_str("</");
    out.push_str(name);
    out.push_str(">\n");
}

fn leaf(out: &mut String, depth: usize, name: &str, value: &str) {
    indent(out, depth);
    out.push('<');
    out.push_str(name);
    out.push('>');
    out.push_str(&escape(value));
    out.push_str("</");
    out.push_str(name);
    out.push_str(">\n");
}

/// Minimal element tree; chapter documents are small.
#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn named(start: &BytesStart<'_>) -> Self {
        Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            ..Self::default()
        }
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    fn child<'a>(&'a self, name: &'a str) -> Option<&'a Element> {
        self.children_named(name).next()
    }

    fn child_uid(&self, name: &str) -> Option<u64> {
        self.child(name)?.text.trim().parse().ok()
    }

    /// `"1"` sets and `"0"` clears a flag; anything else keeps `default`.
    fn child_flag(&self, name: &str, default: bool) -> bool {
        match self.child(name).map(|child| child.text.trim()) {
            Some("1") => true,
            Some("0") => false,
            _ => default,
        }
    }
}

fn read_tree(xml: &str) -> Result<Option<Element>> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(start) => stack.push(Element::named(&start)),
            Event::Empty(start) => attach(&mut stack, &mut root, Element::named(&start)),
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape().map_err(malformed)?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(EngineError::ChapterXml {
            reason: format!("element <{}> is never closed", open.name),
        });
    }
    Ok(root)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn malformed(err: impl Display) -> EngineError {
    EngineError::ChapterXml {
        reason: err.to_string(),
    }
}

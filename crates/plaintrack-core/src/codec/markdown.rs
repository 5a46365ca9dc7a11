//! Markdown scanning shared by the index and task codecs.
//!
//! Headings and front matter are split line by line so description text keeps
//! its exact layout. List bodies go through `pulldown-cmark`.

use std::ops::Range;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use serde::Serialize;
use serde_yaml::{Mapping, Value};

use super::{CodecError, CodecResult};

const FRONT_MATTER_DELIMITER: &str = "---";

/// Outcome of looking for a front matter block.
pub(super) enum FrontMatter<'a> {
    /// The text does not open with a delimiter.
    Absent,
    /// Raw YAML between the delimiters.
    Present(&'a str),
    /// An opening delimiter without a closing one.
    Unterminated,
}

/// Split a leading `---` block from the rest of the text.
pub(super) fn split_front_matter(text: &str) -> (FrontMatter<'_>, &str) {
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    let Some((first, rest)) = trimmed.split_once('\n') else {
        return if trimmed.trim_end() == FRONT_MATTER_DELIMITER {
            (FrontMatter::Unterminated, text)
        } else {
            (FrontMatter::Absent, text)
        };
    };
    if first.trim_end() != FRONT_MATTER_DELIMITER {
        return (FrontMatter::Absent, text);
    }

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FRONT_MATTER_DELIMITER {
            return (FrontMatter::Present(&rest[..offset]), &rest[offset + line.len()..]);
        }
        offset += line.len();
    }
    (FrontMatter::Unterminated, text)
}

/// A level-2 section: heading text and the raw lines below it.
pub(super) struct Section<'a> {
    pub heading: &'a str,
    pub lines: Vec<&'a str>,
}

/// Body of a document after its level-1 heading.
pub(super) struct Document<'a> {
    pub name: &'a str,
    pub intro: Vec<&'a str>,
    pub sections: Vec<Section<'a>>,
}

/// Scan for the name heading and split the remainder into level-2 sections.
///
/// Headings inside fenced code blocks are ignored. Returns `None` when there
/// is no non-empty level-1 heading.
pub(super) fn parse_document(body: &str) -> Option<Document<'_>> {
    let mut lines = body.lines();
    let name = lines.by_ref().find_map(|line| heading(line, "# "))?;

    let mut intro = Vec::new();
    let mut sections: Vec<Section<'_>> = Vec::new();
    let mut in_fence = false;
    for line in lines {
        if is_fence(line) {
            in_fence = !in_fence;
        } else if !in_fence
            && let Some(title) = heading(line, "## ")
        {
            sections.push(Section {
                heading: title,
                lines: Vec::new(),
            });
            continue;
        }
        match sections.last_mut() {
            Some(section) => section.lines.push(line),
            None => intro.push(line),
        }
    }

    Some(Document {
        name,
        intro,
        sections,
    })
}

fn heading<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let title = line.strip_prefix(marker)?.trim();
    (!title.is_empty()).then_some(title)
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Section key with case, spaces and hyphens folded away (`Sub-tasks` → `subtasks`).
pub(super) fn section_key(heading: &str) -> String {
    heading
        .chars()
        .filter(|ch| !matches!(ch, '-' | ' ' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Join lines and trim surrounding whitespace.
pub(super) fn join_block(lines: &[&str]) -> String {
    lines.join("\n").trim().to_owned()
}

/// YAML text of a section body, unwrapping a fenced code block if present.
pub(super) fn section_yaml(lines: &[&str]) -> String {
    let mut content = lines.iter().skip_while(|line| line.trim().is_empty());
    match content.next() {
        Some(first) if is_fence(first) => content
            .take_while(|line| !is_fence(line))
            .copied()
            .collect::<Vec<_>>()
            .join("\n"),
        Some(_) => lines.join("\n"),
        None => String::new(),
    }
}

/// Parse YAML that must be a mapping. Empty input is an empty mapping.
pub(super) fn parse_mapping(yaml: &str) -> Option<Mapping> {
    if yaml.trim().is_empty() {
        return Some(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(yaml).ok()? {
        Value::Mapping(mapping) => Some(mapping),
        Value::Null => Some(Mapping::new()),
        _ => None,
    }
}

/// Render a value as a `---` delimited front matter block.
pub(super) fn front_matter<T: Serialize>(value: &T, what: &'static str) -> CodecResult<String> {
    let yaml = serde_yaml::to_string(value).map_err(|err| CodecError::Encode {
        what,
        message: err.to_string(),
    })?;
    Ok(format!("{FRONT_MATTER_DELIMITER}\n{yaml}{FRONT_MATTER_DELIMITER}"))
}

/// One top-level item of a Markdown list.
#[derive(Debug, Default, PartialEq, Eq)]
pub(super) struct ListItem {
    /// Item source with the marker and any checkbox removed.
    pub text: String,
    /// Text of the first link in the item.
    pub link_text: Option<String>,
    /// Checkbox state of a task list item.
    pub checked: Option<bool>,
}

impl ListItem {
    /// Link text when the item links somewhere, otherwise the whole item.
    pub fn label(&self) -> &str {
        self.link_text.as_deref().unwrap_or(&self.text)
    }
}

/// Top-level list items of a section body.
pub(super) struct ListBlock {
    pub items: Vec<ListItem>,
    /// False when the body holds anything besides lists.
    pub only_lists: bool,
}

/// Tokenize a section body and collect its top-level list items.
///
/// Every CommonMark list form counts (`-`, `*`, `+` and ordered markers).
/// Nested lists stay out of the item text.
pub(super) fn list_block(lines: &[&str]) -> ListBlock {
    let source = lines.join("\n");
    let mut items = Vec::new();
    let mut only_lists = true;
    let mut depth = 0_usize;
    let mut current: Option<ItemSpans> = None;

    for (event, range) in Parser::new_ext(&source, Options::ENABLE_TASKLISTS).into_offset_iter() {
        match event {
            Event::Start(Tag::List(_)) => depth += 1,
            Event::End(TagEnd::List(_)) => depth = depth.saturating_sub(1),
            Event::Start(Tag::Item) if depth == 1 => current = Some(ItemSpans::default()),
            Event::End(TagEnd::Item) if depth == 1 => {
                if let Some(spans) = current.take() {
                    items.push(spans.finish(&source));
                }
            }
            Event::TaskListMarker(checked) if depth == 1 => {
                if let Some(spans) = current.as_mut() {
                    spans.checked = Some(checked);
                }
            }
            _ if depth == 0 => only_lists = false,
            _ if depth == 1 => {
                if let Some(spans) = current.as_mut() {
                    spans.record(&source, &event, &range);
                }
            }
            _ => {}
        }
    }

    ListBlock { items, only_lists }
}

#[derive(Default)]
struct ItemSpans {
    text: Option<Range<usize>>,
    link: Option<Range<usize>>,
    in_link: bool,
    link_text: Option<String>,
    checked: Option<bool>,
}

impl ItemSpans {
    fn record(&mut self, source: &str, event: &Event<'_>, range: &Range<usize>) {
        match event {
            Event::Start(Tag::Paragraph) | Event::End(TagEnd::Paragraph) => return,
            Event::Start(Tag::Link { .. }) if self.link_text.is_none() && !self.in_link => {
                self.in_link = true;
            }
            Event::End(TagEnd::Link) if self.in_link => {
                self.in_link = false;
                self.link_text = Some(slice(source, self.link.take()));
            }
            _ if self.in_link => self.link = Some(widen(self.link.take(), range)),
            _ => {}
        }
        self.text = Some(widen(self.text.take(), range));
    }

    fn finish(self, source: &str) -> ListItem {
        ListItem {
            text: slice(source, self.text),
            link_text: self.link_text,
            checked: self.checked,
        }
    }
}

fn widen(span: Option<Range<usize>>, range: &Range<usize>) -> Range<usize> {
    span.map_or_else(
        || range.clone(),
        |span| span.start.min(range.start)..span.end.max(range.end),
    )
}

fn slice(source: &str, span: Option<Range<usize>>) -> String {
    span.and_then(|span| source.get(span))
        .map(|text| text.trim().to_owned())
        .unwrap_or_default()
}

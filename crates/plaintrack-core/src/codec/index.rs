use serde_yaml::{Mapping, Value};

use super::markdown::{
    FrontMatter, ListItem, Section, front_matter, join_block, list_block, parse_document,
    parse_mapping, section_key, section_yaml, split_front_matter,
};
use super::{CodecError, CodecResult, text_from_bytes};
use crate::model::{Column, Index, IndexOptions};

const OPTIONS_SECTION: &str = "options";

/// Decode index text into an [`Index`].
///
/// # Errors
/// Returns a [`CodecError`] describing the first grammar violation found.
pub fn decode_index(data: &str) -> CodecResult<Index> {
    if data.trim().is_empty() {
        return Err(CodecError::Empty);
    }

    let (front, body) = split_front_matter(data);
    let mut merged = match front {
        FrontMatter::Absent => Mapping::new(),
        FrontMatter::Present(yaml) => {
            let mapping = parse_mapping(yaml).ok_or(CodecError::InvalidFrontMatter)?;
            typed_options(&mapping).ok_or(CodecError::InvalidFrontMatter)?;
            mapping
        }
        FrontMatter::Unterminated => return Err(CodecError::InvalidFrontMatter),
    };

    let document = parse_document(body).ok_or(CodecError::MissingName)?;

    let mut columns = Vec::new();
    for section in &document.sections {
        if section_key(section.heading) == OPTIONS_SECTION {
            let mapping =
                parse_mapping(&section_yaml(&section.lines)).ok_or(CodecError::InvalidOptions)?;
            typed_options(&mapping).ok_or(CodecError::InvalidOptions)?;
            for (key, value) in mapping {
                merged.insert(key, value);
            }
        } else {
            columns.push(Column {
                name: section.heading.to_owned(),
                tasks: column_tasks(section)?,
            });
        }
    }

    let options = typed_options(&merged).ok_or(CodecError::InvalidOptions)?;

    Ok(Index {
        name: document.name.to_owned(),
        description: join_block(&document.intro),
        options,
        columns,
    })
}

/// Decode raw bytes, rejecting input that is not UTF-8 text.
///
/// # Errors
/// Same as [`decode_index`], plus [`CodecError::NotText`].
pub fn decode_index_bytes(data: &[u8]) -> CodecResult<Index> {
    decode_index(text_from_bytes(data)?)
}

/// Encode an [`Index`] as Markdown.
///
/// Options go to front matter unless they are empty or `suppress_options` is
/// set (used when a separate configuration file owns them).
///
/// # Errors
/// Returns [`CodecError::Encode`] if the options cannot be serialized.
pub fn encode_index(index: &Index, suppress_options: bool) -> CodecResult<String> {
    let mut parts = Vec::with_capacity(index.columns.len() + 3);
    if !suppress_options && !index.options.is_empty() {
        parts.push(front_matter(&index.options, "index options")?);
    }
    parts.push(format!("# {}", index.name));
    if !index.description.trim().is_empty() {
        parts.push(index.description.clone());
    }
    for column in &index.columns {
        let mut block = format!("## {}", column.name);
        if !column.tasks.is_empty() {
            block.push_str("\n\n");
            block.push_str(
                &column
                    .tasks
                    .iter()
                    .map(|id| format!("- [{id}](tasks/{id}.md)"))
                    .collect::<Vec<_>>()
                    .join("\n"),
            );
        }
        parts.push(block);
    }

    let mut text = parts.join("\n\n");
    text.push('\n');
    Ok(text)
}

fn typed_options(mapping: &Mapping) -> Option<IndexOptions> {
    serde_yaml::from_value(Value::Mapping(mapping.clone())).ok()
}

fn column_tasks(section: &Section<'_>) -> CodecResult<Vec<String>> {
    let block = list_block(&section.lines);
    if !block.only_lists {
        return Err(CodecError::ColumnNotList(section.heading.to_owned()));
    }
    Ok(block
        .items
        .iter()
        .map(ListItem::label)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .collect())
}

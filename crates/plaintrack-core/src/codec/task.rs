use serde_yaml::{Mapping, Value};

use super::markdown::{
    FrontMatter, ListItem, front_matter, join_block, list_block, parse_document, parse_mapping,
    section_key, section_yaml, split_front_matter,
};
use super::{CodecError, CodecResult, text_from_bytes};
use crate::id::task_id;
use crate::model::{
    Comment, CustomField, CustomFieldType, CustomValue, Relation, SubTask, Task, TaskMetadata,
};
use crate::timestamp::{format_timestamp, parse_timestamp};

const BUILTIN_DATES: [&str; 5] = ["created", "updated", "started", "completed", "due"];

/// Task decoder aware of the project's custom field declarations.
///
/// Declared fields are coerced to their declared type. Undeclared extra
/// metadata keys take the YAML scalar type as written, so strings stay
/// strings even when they look like dates.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskCodec<'a> {
    fields: &'a [CustomField],
}

impl<'a> TaskCodec<'a> {
    /// Codec using the given declarations.
    #[must_use]
    pub const fn new(fields: &'a [CustomField]) -> Self {
        Self { fields }
    }

    /// Decode task text into a [`Task`].
    ///
    /// # Errors
    /// Returns a [`CodecError`] for empty input, a missing name heading, or
    /// metadata that is not a well-typed mapping.
    pub fn decode(&self, data: &str) -> CodecResult<Task> {
        if data.trim().is_empty() {
            return Err(CodecError::Empty);
        }

        let (front, body) = split_front_matter(data);
        let mut raw_metadata = match front {
            FrontMatter::Absent => Mapping::new(),
            FrontMatter::Present(yaml) => parse_mapping(yaml).ok_or(CodecError::InvalidMetadata)?,
            FrontMatter::Unterminated => return Err(CodecError::InvalidMetadata),
        };

        let document = parse_document(body).ok_or(CodecError::MissingName)?;

        let mut description = document.intro.join("\n");
        let mut sub_tasks = Vec::new();
        let mut relations = Vec::new();
        let mut comments = Vec::new();
        for section in &document.sections {
            match section_key(section.heading).as_str() {
                "metadata" => {
                    let mapping = parse_mapping(&section_yaml(&section.lines))
                        .ok_or(CodecError::InvalidMetadata)?;
                    for (key, value) in mapping {
                        raw_metadata.insert(key, value);
                    }
                }
                "subtasks" => sub_tasks.extend(parse_sub_tasks(&section.lines)),
                "relations" => relations.extend(parse_relations(&section.lines)),
                "comments" => comments.extend(parse_comments(&section.lines)),
                _ => {
                    description.push_str("\n## ");
                    description.push_str(section.heading);
                    for line in &section.lines {
                        description.push('\n');
                        description.push_str(line);
                    }
                }
            }
        }

        Ok(Task {
            id: task_id(document.name),
            name: document.name.to_owned(),
            description: description.trim().to_owned(),
            metadata: self.metadata(raw_metadata)?,
            sub_tasks,
            relations,
            comments,
        })
    }

    /// Decode raw bytes, rejecting input that is not UTF-8 text.
    ///
    /// # Errors
    /// Same as [`TaskCodec::decode`], plus [`CodecError::NotText`].
    pub fn decode_bytes(&self, data: &[u8]) -> CodecResult<Task> {
        self.decode(text_from_bytes(data)?)
    }

    fn declared_type(&self, name: &str) -> Option<CustomFieldType> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.field_type)
    }

    fn metadata(&self, raw: Mapping) -> CodecResult<TaskMetadata> {
        let mut metadata = TaskMetadata::default();
        for (key, value) in raw {
            let Value::String(key) = key else {
                return Err(CodecError::InvalidMetadata);
            };
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                builtin if BUILTIN_DATES.contains(&builtin) => {
                    metadata.set_date(builtin, timestamp_value(&value)?);
                }
                "assigned" => {
                    metadata.assigned = Some(scalar_text(&value).ok_or(CodecError::InvalidMetadata)?);
                }
                "progress" => {
                    metadata.progress = Some(value.as_f64().ok_or(CodecError::InvalidMetadata)?);
                }
                "tags" => metadata.tags = tag_list(&value)?,
                _ => {
                    let typed = match self.declared_type(&key) {
                        Some(field_type) => coerce(&value, field_type)?,
                        None => infer(&value)?,
                    };
                    metadata.custom.insert(key, typed);
                }
            }
        }
        Ok(metadata)
    }
}

/// Decode task text without custom field declarations.
///
/// # Errors
/// See [`TaskCodec::decode`].
pub fn decode_task(data: &str) -> CodecResult<Task> {
    TaskCodec::default().decode(data)
}

/// Decode raw task bytes without custom field declarations.
///
/// # Errors
/// See [`TaskCodec::decode_bytes`].
pub fn decode_task_bytes(data: &[u8]) -> CodecResult<Task> {
    TaskCodec::default().decode_bytes(data)
}

/// Encode a [`Task`] as Markdown with its metadata in front matter.
///
/// # Errors
/// Returns [`CodecError::Encode`] if the metadata cannot be serialized.
pub fn encode_task(task: &Task) -> CodecResult<String> {
    let mut parts = Vec::new();

    let metadata = metadata_mapping(&task.metadata);
    if !metadata.is_empty() {
        parts.push(front_matter(&Value::Mapping(metadata), "task metadata")?);
    }
    parts.push(format!("# {}", task.name));
    if !task.description.trim().is_empty() {
        parts.push(task.description.clone());
    }

    if !task.sub_tasks.is_empty() {
        let items: Vec<String> = task
            .sub_tasks
            .iter()
            .map(|sub| format!("- [{}] {}", if sub.completed { 'x' } else { ' ' }, sub.text))
            .collect();
        parts.push(format!("## Sub-tasks\n\n{}", items.join("\n")));
    }

    if !task.relations.is_empty() {
        let items: Vec<String> = task
            .relations
            .iter()
            .map(|relation| {
                let label = if relation.relation_type.is_empty() {
                    relation.task.clone()
                } else {
                    format!("{} {}", relation.relation_type, relation.task)
                };
                format!("- [{label}]({}.md)", relation.task)
            })
            .collect();
        parts.push(format!("## Relations\n\n{}", items.join("\n")));
    }

    if !task.comments.is_empty() {
        let items: Vec<String> = task.comments.iter().map(comment_block).collect();
        parts.push(format!("## Comments\n\n{}", items.join("\n")));
    }

    let mut text = parts.join("\n\n");
    text.push('\n');
    Ok(text)
}

fn metadata_mapping(metadata: &TaskMetadata) -> Mapping {
    let mut mapping = Mapping::new();
    for field in BUILTIN_DATES {
        if let Some(ts) = metadata.date(field) {
            mapping.insert(Value::from(field), Value::String(format_timestamp(ts)));
        }
    }
    if let Some(assigned) = &metadata.assigned {
        mapping.insert(Value::from("assigned"), Value::String(assigned.clone()));
    }
    if let Some(progress) = metadata.progress {
        mapping.insert(Value::from("progress"), Value::from(progress));
    }
    if !metadata.tags.is_empty() {
        mapping.insert(
            Value::from("tags"),
            Value::Sequence(metadata.tags.iter().cloned().map(Value::String).collect()),
        );
    }
    for (key, value) in &metadata.custom {
        let encoded = match value {
            CustomValue::String(text) => Value::String(text.clone()),
            CustomValue::Number(number) => Value::from(*number),
            CustomValue::Boolean(flag) => Value::Bool(*flag),
            CustomValue::Date(ts) => Value::String(format_timestamp(*ts)),
        };
        mapping.insert(Value::String(key.clone()), encoded);
    }
    mapping
}

fn comment_block(comment: &Comment) -> String {
    let mut lines = vec![format!("- author: {}", comment.author)];
    if let Some(date) = comment.date {
        lines.push(format!("  date: {}", format_timestamp(date)));
    }
    for line in comment.text.lines() {
        if line.trim().is_empty() {
            lines.push(String::new());
        } else {
            lines.push(format!("  {line}"));
        }
    }
    lines.join("\n")
}

fn parse_sub_tasks(lines: &[&str]) -> Vec<SubTask> {
    list_block(lines)
        .items
        .into_iter()
        .filter(|item| !item.text.is_empty())
        .map(|item| SubTask {
            completed: item.checked.unwrap_or(false),
            text: item.text,
        })
        .collect()
}

fn parse_relations(lines: &[&str]) -> Vec<Relation> {
    list_block(lines)
        .items
        .iter()
        .map(ListItem::label)
        .filter(|label| !label.is_empty())
        .map(|label| match label.rsplit_once(char::is_whitespace) {
            Some((relation_type, task)) => Relation {
                task: task.trim().to_owned(),
                relation_type: relation_type.trim().to_owned(),
            },
            None => Relation {
                task: label.to_owned(),
                relation_type: String::new(),
            },
        })
        .collect()
}

fn parse_comments(lines: &[&str]) -> Vec<Comment> {
    let mut items: Vec<Vec<&str>> = Vec::new();
    for line in lines {
        let opener = line
            .strip_prefix("- ")
            .or_else(|| (line.trim_end() == "-").then_some(""));
        if let Some(first) = opener {
            items.push(vec![first]);
        } else if let Some(item) = items.last_mut() {
            item.push(line.strip_prefix("  ").unwrap_or_else(|| line.trim_start()));
        }
    }
    items.iter().map(|item| comment_from_lines(item)).collect()
}

fn comment_from_lines(lines: &[&str]) -> Comment {
    let mut author = String::new();
    let mut date = None;
    let mut body_start = 0;
    for (idx, line) in lines.iter().enumerate() {
        if let Some(value) = line.strip_prefix("author:") {
            value.trim().clone_into(&mut author);
        } else if let Some(value) = line.strip_prefix("date:") {
            date = parse_timestamp(value).ok();
        } else {
            break;
        }
        body_start = idx + 1;
    }
    Comment {
        author,
        date,
        text: join_block(&lines[body_start..]),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn timestamp_value(value: &Value) -> CodecResult<time::OffsetDateTime> {
    value
        .as_str()
        .and_then(|text| parse_timestamp(text).ok())
        .ok_or(CodecError::InvalidMetadata)
}

fn tag_list(value: &Value) -> CodecResult<Vec<String>> {
    match value {
        Value::Sequence(items) => items
            .iter()
            .map(|item| scalar_text(item).ok_or(CodecError::InvalidMetadata))
            .collect(),
        other => Ok(vec![scalar_text(other).ok_or(CodecError::InvalidMetadata)?]),
    }
}

fn coerce(value: &Value, field_type: CustomFieldType) -> CodecResult<CustomValue> {
    let coerced = match field_type {
        CustomFieldType::String => scalar_text(value).map(CustomValue::String),
        CustomFieldType::Number => value
            .as_f64()
            .or_else(|| value.as_str().and_then(|text| text.trim().parse().ok()))
            .map(CustomValue::Number),
        CustomFieldType::Boolean => value
            .as_bool()
            .or_else(|| match value.as_str().map(str::trim) {
                Some("true") => Some(true),
                Some("false") => Some(false),
                _ => None,
            })
            .map(CustomValue::Boolean),
        CustomFieldType::Date => value
            .as_str()
            .and_then(|text| parse_timestamp(text).ok())
            .map(CustomValue::Date),
    };
    coerced.ok_or(CodecError::InvalidMetadata)
}

fn infer(value: &Value) -> CodecResult<CustomValue> {
    match value {
        Value::Bool(flag) => Ok(CustomValue::Boolean(*flag)),
        Value::Number(number) => number
            .as_f64()
            .map(CustomValue::Number)
            .ok_or(CodecError::InvalidMetadata),
        Value::String(text) => Ok(CustomValue::String(text.clone())),
        _ => Err(CodecError::InvalidMetadata),
    }
}

/// Derive the identifier of a task from its name.
///
/// The name is split into words at any character that is not alphanumeric,
/// at lower-case or digit to upper-case transitions (`myTask`), and at the
/// end of an upper-case run followed by a lower-case letter (`XMLParser`).
/// Words are lower-cased and joined with `-`. Two names that normalize to the
/// same identifier collide.
#[must_use]
pub fn task_id(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (idx, &ch) in chars.iter().enumerate() {
        if !ch.is_alphanumeric() {
            flush(&mut words, &mut current);
            continue;
        }
        if ch.is_uppercase() && !current.is_empty() && idx > 0 {
            let prev = chars[idx - 1];
            let next_is_lower = chars.get(idx + 1).is_some_and(|next| next.is_lowercase());
            if prev.is_lowercase() || prev.is_numeric() || (prev.is_uppercase() && next_is_lower) {
                flush(&mut words, &mut current);
            }
        }
        current.extend(ch.to_lowercase());
    }
    flush(&mut words, &mut current);

    words.join("-")
}

/// A task name from which no identifier can be derived.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("task name {0:?} has no letters or digits to derive an id from")]
pub struct InvalidTaskName(pub String);

/// [`task_id`] for names that must yield a usable identifier.
///
/// # Errors
/// Returns [`InvalidTaskName`] when the derived identifier is empty, as for a
/// blank or punctuation-only name.
pub fn checked_task_id(name: &str) -> Result<String, InvalidTaskName> {
    let id = task_id(name);
    if id.is_empty() {
        return Err(InvalidTaskName(name.to_owned()));
    }
    Ok(id)
}

fn flush(words: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        words.push(std::mem::take(current));
    }
}

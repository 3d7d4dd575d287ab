//! JSON-path parsing for the path-addressing API.
//!
//! Paths are dot separated names, each optionally followed by one or more
//! bracketed array indices: `a.b[2].c`, `matrix[1][2]`. Every bracket group
//! becomes its own fragment, so `items[0].name` parses to
//! `["items", "0", "name"]`. The empty path addresses the root.

use crate::error::{Result, SchemaError};

/// Split a path string into its name and index fragments.
///
/// # Errors
///
/// Returns [`SchemaError::InvalidJsonPath`] for empty fragments (`a..b`),
/// unbalanced or empty brackets, non-numeric indices and trailing text
/// after a bracket group.
pub fn parse_json_path(path: &str) -> Result<Vec<String>> {
    let mut fragments = Vec::new();
    if path.is_empty() {
        return Ok(fragments);
    }

    for segment in path.split('.') {
        parse_segment(path, segment, &mut fragments)?;
    }
    trace!("parsed path {path:?} into {fragments:?}");
    Ok(fragments)
}

fn parse_segment(path: &str, segment: &str, fragments: &mut Vec<String>) -> Result<()> {
    let name_end = segment.find('[').unwrap_or(segment.len());
    let (name, mut rest) = segment.split_at(name_end);
    if name.is_empty() {
        return Err(SchemaError::invalid_json_path(path, "empty name fragment"));
    }
    if name.contains(']') {
        return Err(SchemaError::invalid_json_path(
            path,
            format!("unexpected `]` in `{name}`"),
        ));
    }
    fragments.push(name.to_string());

    while !rest.is_empty() {
        let Some(body) = rest.strip_prefix('[') else {
            return Err(SchemaError::invalid_json_path(
                path,
                format!("unexpected text `{rest}` after index"),
            ));
        };
        let close = body
            .find(']')
            .ok_or_else(|| SchemaError::invalid_json_path(path, "unclosed `[`"))?;
        let index = &body[..close];
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SchemaError::invalid_json_path(
                path,
                format!("index `{index}` is not a non-negative integer"),
            ));
        }
        fragments.push(index.to_string());
        rest = &body[close + 1..];
    }
    Ok(())
}

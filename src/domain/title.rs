//! Category title normalization.

use crate::domain::error::DomainError;

pub const MAX_TITLE_CHARS: usize = 100;

/// Trim, title-case, and validate a user supplied category title.
///
/// The length limit applies to the cased result, since case mapping can
/// expand a character (`ß` becomes `SS`).
pub fn normalize_title(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("title", "title must not be empty"));
    }

    let title = title_case(trimmed);
    let length = title.chars().count();
    if length > MAX_TITLE_CHARS {
        return Err(DomainError::validation(
            "title",
            format!("title must be at most {MAX_TITLE_CHARS} characters (got {length})"),
        ));
    }

    Ok(title)
}

/// Upper-case every letter that follows a non-letter and lower-case the rest.
///
/// Digits and punctuation both count as word boundaries, so `2nd` becomes `2Nd`
/// and `rust's` becomes `Rust'S`.
pub fn title_case(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut previous_is_letter = false;

    for ch in input.chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                output.extend(ch.to_lowercase());
            } else {
                output.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            output.push(ch);
            previous_is_letter = false;
        }
    }

    output
}

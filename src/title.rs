//! Quick-add syntax in task titles: `#tag` and `@tag` add tags, `!N` sets the priority.

use crate::task::Task;

/// The result of parsing a title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTitle {
    /// The title with the recognized tokens removed.
    pub title: String,
    pub tags: Vec<String>,
    pub priority: Option<i32>,
}

fn is_tag_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

/// Parse the quick-add tokens out of a title.  Tokens that are not well-formed stay in the title.
/// A title without tokens is only trimmed.  If removing the tokens would leave the title empty,
/// the title is kept as-is.
pub fn parse(title: &str) -> ParsedTitle {
    let mut tags: Vec<String> = vec![];
    let mut priority = None;
    let mut words = vec![];
    let mut removed = false;

    for word in title.split_whitespace() {
        let mut chars = word.chars();
        match chars.next() {
            Some('#') | Some('@') => {
                let tag = chars.as_str();
                if !tag.is_empty() && tag.chars().all(is_tag_char) {
                    if !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                        tags.push(tag.to_string());
                    }
                    removed = true;
                    continue;
                }
            }
            Some('!') => {
                if let Ok(p) = chars.as_str().parse::<i32>() {
                    if (Task::PRIORITY_HIGH..=Task::PRIORITY_NONE).contains(&p) {
                        priority = Some(p);
                        removed = true;
                        continue;
                    }
                }
            }
            _ => {}
        }
        words.push(word);
    }

    let stripped = words.join(" ");
    ParsedTitle {
        title: if !removed || stripped.is_empty() {
            title.trim().to_string()
        } else {
            stripped
        },
        tags,
        priority,
    }
}

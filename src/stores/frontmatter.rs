//! Header block of file notes.
//!
//! A note file starts with a `---` line, a YAML mapping, and a closing `---`
//! line; everything after is the body, kept byte for byte. Files without a
//! complete header are all body. Keys other than the five recognised ones are
//! carried through updates untouched.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_yaml::{Mapping, Value};

use crate::{helper, MerlionError, Note, Result};

pub const KEY_TAGS: &str = "tags";
pub const KEY_FAVORITE: &str = "favorite";
pub const KEY_WORKLOG: &str = "worklog";
pub const KEY_CREATED_AT: &str = "createdAt";
pub const KEY_UPDATED_AT: &str = "updatedAt";

/// Emission order of the recognised keys.
const KNOWN_KEYS: [&str; 5] = [KEY_TAGS, KEY_FAVORITE, KEY_WORKLOG, KEY_CREATED_AT, KEY_UPDATED_AT];

const DELIMITER: &str = "---";

/// A note file split into its header mapping and body text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub header: Mapping,
    pub body: String,
}

/// Splits file text into header and body.
pub fn split(text: &str) -> Result<Document> {
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() < 2 || lines[0].trim() != DELIMITER {
        return Ok(Document {
            header: Mapping::new(),
            body: text.to_string(),
        });
    }

    let Some(end) = lines.iter().skip(1).position(|l| l.trim() == DELIMITER) else {
        // Unterminated header: the whole file is body.
        return Ok(Document {
            header: Mapping::new(),
            body: text.to_string(),
        });
    };
    let end = end + 1;

    let header_text = lines[1..end].join("\n");
    let header = parse_header(&header_text)?;
    let body = lines[end + 1..].join("\n");
    Ok(Document { header, body })
}

fn parse_header(text: &str) -> Result<Mapping> {
    if text.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(text)? {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        other => Err(MerlionError::InvalidFormat {
            message: format!("header is not a mapping: {:?}", other),
        }),
    }
}

/// Serialises a document back to file text.
pub fn render(doc: &Document) -> Result<String> {
    let yaml = serde_yaml::to_string(&Value::Mapping(doc.header.clone()))?;
    let mut out = String::with_capacity(yaml.len() + doc.body.len() + 8);
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(&yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(&doc.body);
    Ok(out)
}

/// Builds the header for `note`: recognised keys first in a fixed order,
/// then any unrecognised keys from `previous` in their original order.
pub fn header_for(note: &Note, previous: Option<&Mapping>) -> Mapping {
    let mut header = Mapping::new();
    header.insert(
        KEY_TAGS.into(),
        Value::Sequence(note.tags.iter().cloned().map(Value::String).collect()),
    );
    header.insert(KEY_FAVORITE.into(), Value::Bool(note.is_favorite));
    header.insert(KEY_WORKLOG.into(), Value::Bool(note.is_work_log));
    header.insert(KEY_CREATED_AT.into(), Value::String(format_time(&note.created_at)));
    header.insert(KEY_UPDATED_AT.into(), Value::String(format_time(&note.updated_at)));

    if let Some(previous) = previous {
        for (key, value) in previous {
            let known = key.as_str().is_some_and(|k| KNOWN_KEYS.contains(&k));
            if !known {
                header.insert(key.clone(), value.clone());
            }
        }
    }
    header
}

pub fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// String items of a list value; anything else yields no tags.
pub fn get_tags(header: &Mapping) -> Vec<String> {
    match header.get(KEY_TAGS) {
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

pub fn get_bool(header: &Mapping, key: &str, default: bool) -> bool {
    header.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub fn get_time(header: &Mapping, key: &str) -> Option<DateTime<Utc>> {
    header
        .get(key)
        .and_then(Value::as_str)
        .and_then(helper::parse_timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_note() -> Note {
        Note {
            note_id: "Note One".into(),
            title: "Note One".into(),
            content: Some("body\n".into()),
            tags: vec!["x".into(), "y".into()],
            is_favorite: true,
            is_work_log: false,
            is_trash: false,
            created_at: "2024-01-02T03:04:05Z".parse().unwrap(),
            updated_at: "2024-01-03T03:04:05Z".parse().unwrap(),
        }
    }

    #[test]
    fn no_header_means_all_body() {
        let doc = split("just text\nmore\n").unwrap();
        assert!(doc.header.is_empty());
        assert_eq!(doc.body, "just text\nmore\n");
    }

    #[test]
    fn unterminated_header_is_body() {
        let text = "---\ntags: [a]\nno closing line\n";
        let doc = split(text).unwrap();
        assert!(doc.header.is_empty());
        assert_eq!(doc.body, text);
    }

    #[test]
    fn header_without_body_gives_empty_body() {
        let doc = split("---\nfavorite: true\n---\n").unwrap();
        assert!(get_bool(&doc.header, KEY_FAVORITE, false));
        assert_eq!(doc.body, "");

        let doc = split("---\nfavorite: true\n---").unwrap();
        assert_eq!(doc.body, "");
    }

    #[test]
    fn body_is_preserved_exactly() {
        let doc = split("---\ntags: []\n---\n\n  indented\n---\ntrailing").unwrap();
        assert_eq!(doc.body, "\n  indented\n---\ntrailing");
    }

    #[test]
    fn non_list_tags_are_empty() {
        let doc = split("---\ntags: work\n---\n").unwrap();
        assert!(get_tags(&doc.header).is_empty());
        let doc = split("---\nfavorite: false\n---\n").unwrap();
        assert!(get_tags(&doc.header).is_empty());
    }

    #[test]
    fn timestamps_accept_several_layouts() {
        let doc = split("---\ncreatedAt: 2024-01-02\nupdatedAt: 2024-01-02 10:11:12\n---\n").unwrap();
        assert_eq!(
            get_time(&doc.header, KEY_CREATED_AT).unwrap(),
            "2024-01-02T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(
            get_time(&doc.header, KEY_UPDATED_AT).unwrap(),
            "2024-01-02T10:11:12Z".parse::<DateTime<Utc>>().unwrap()
        );
        let doc = split("---\ncreatedAt: someday\n---\n").unwrap();
        assert!(get_time(&doc.header, KEY_CREATED_AT).is_none());
    }

    #[test]
    fn render_then_split_round_trips() {
        let note = sample_note();
        let doc = Document {
            header: header_for(&note, None),
            body: note.content.clone().unwrap(),
        };
        let text = render(&doc).unwrap();
        assert!(text.starts_with("---\n"));
        assert!(text.ends_with("\n---\nbody\n"));

        let back = split(&text).unwrap();
        assert_eq!(back, doc);
        assert_eq!(get_tags(&back.header), note.tags);
        assert_eq!(get_time(&back.header, KEY_CREATED_AT), Some(note.created_at));
    }

    #[test]
    fn unknown_keys_survive_and_follow_known_ones() {
        let previous = split("---\naliases: [one]\nfavorite: false\ncolor: blue\n---\n")
            .unwrap()
            .header;
        let header = header_for(&sample_note(), Some(&previous));
        let keys: Vec<&str> = header.keys().filter_map(Value::as_str).collect();
        assert_eq!(
            keys,
            vec!["tags", "favorite", "worklog", "createdAt", "updatedAt", "aliases", "color"]
        );
        assert!(get_bool(&header, KEY_FAVORITE, false));
    }

    #[test]
    fn rendering_is_deterministic() {
        let note = sample_note();
        let doc = Document {
            header: header_for(&note, None),
            body: String::new(),
        };
        assert_eq!(render(&doc).unwrap(), render(&doc).unwrap());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(split("---\ntags: [unclosed\n---\n").is_err());
        assert!(split("---\n- just\n- a list\n---\n").is_err());
    }
}

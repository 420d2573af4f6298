//! Study deep links.
//!
//! A study is launched from a fragment of the form
//! `#/study?participantId=<id>&data=<base64 task json>`. The payload
//! decodes into one of three distinct states so a broken link blocks the
//! session instead of running it against partial data.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::Rng;

use crate::task::{parse_tasks, serialize_tasks, Task, TaskError};

/// Route prefix of a study link.
pub const STUDY_ROUTE: &str = "#/study";

/// Outcome of decoding the task payload of a link.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskPayload {
    /// The link carries no `data` parameter.
    Missing,
    /// The payload is present but unusable.
    Corrupt { reason: String },
    /// A valid, non-empty task list.
    Loaded(Vec<Task>),
}

impl TaskPayload {
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }

    pub fn tasks(&self) -> Option<&[Task]> {
        match self {
            Self::Loaded(tasks) => Some(tasks),
            _ => None,
        }
    }
}

/// A decoded study link.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyLink {
    pub participant_id: Option<String>,
    pub payload: TaskPayload,
}

impl StudyLink {
    /// Participant id from the link, or a freshly generated one.
    pub fn participant_or_generated(&self) -> String {
        match &self.participant_id {
            Some(id) if !id.trim().is_empty() => id.clone(),
            _ => generate_participant_id(),
        }
    }
}

/// Build a study link fragment for a task list.
pub fn encode_study_link(participant_id: Option<&str>, tasks: &[Task]) -> Result<String, TaskError> {
    let json = serialize_tasks(tasks)?;
    let data = STANDARD.encode(json.as_bytes());
    let mut link = format!("{STUDY_ROUTE}?");
    if let Some(id) = participant_id {
        link.push_str("participantId=");
        link.push_str(&urlencoding::encode(id));
        link.push('&');
    }
    link.push_str("data=");
    link.push_str(&urlencoding::encode(&data));
    Ok(link)
}

/// Decode a study link fragment (or a full URL containing one).
pub fn decode_study_link(link: &str) -> StudyLink {
    let query = link.split_once('?').map(|(_, q)| q).unwrap_or("");

    let mut participant_id = None;
    let mut data = None;
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = decode_component(value);
        match key {
            "participantId" => participant_id = Some(value).filter(|v| !v.is_empty()),
            // Form decoding turns an unescaped '+' of the payload into a space.
            "data" => data = Some(value.replace(' ', "+")),
            _ => {}
        }
    }

    let payload = match data {
        None => TaskPayload::Missing,
        Some(encoded) => match decode_payload(&encoded) {
            Ok(tasks) => TaskPayload::Loaded(tasks),
            Err(e) => TaskPayload::Corrupt {
                reason: e.to_string(),
            },
        },
    };

    StudyLink {
        participant_id,
        payload,
    }
}

/// Decode a base64 task payload. Standard and URL-safe alphabets are
/// accepted, with or without padding.
pub fn decode_payload(encoded: &str) -> Result<Vec<Task>, TaskError> {
    let trimmed = encoded.trim();
    let bytes = [STANDARD, URL_SAFE, STANDARD_NO_PAD, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(trimmed).ok())
        .ok_or_else(|| TaskError::Encoding(format!("{} bytes of input", trimmed.len())))?;
    let json = String::from_utf8(bytes).map_err(|e| TaskError::Encoding(e.to_string()))?;
    parse_tasks(&json)
}

/// `P-` followed by five lowercase hex characters.
pub fn generate_participant_id() -> String {
    format!("P-{:05x}", rand::thread_rng().gen_range(0..0x10_0000u32))
}

fn decode_component(value: &str) -> String {
    urlencoding::decode(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::MmPosition;
    use crate::task::{TaskDefaults, TaskKind};

    fn tasks() -> Vec<Task> {
        let mut task = Task::from_defaults("reach", &TaskDefaults::default());
        task.markers = vec![MmPosition::new(-20.0, 0.0), MmPosition::new(20.0, 0.0)];
        let hold = Task::from_defaults(
            "hold",
            &TaskDefaults {
                kind: TaskKind::Hold,
                ..Default::default()
            },
        );
        vec![task, hold]
    }

    #[test]
    fn test_link_roundtrip() {
        let link = encode_study_link(Some("P 01"), &tasks()).unwrap();
        assert!(link.starts_with("#/study?participantId=P%2001&data="));
        let decoded = decode_study_link(&link);
        assert_eq!(decoded.participant_id.as_deref(), Some("P 01"));
        assert_eq!(decoded.payload, TaskPayload::Loaded(tasks()));
    }

    #[test]
    fn test_missing_payload() {
        let decoded = decode_study_link("#/study?participantId=abc");
        assert_eq!(decoded.payload, TaskPayload::Missing);
        assert!(!decoded.payload.is_corrupt());
    }

    #[test]
    fn test_corrupt_payloads() {
        let decoded = decode_study_link("#/study?data=%%%not-base64");
        assert!(decoded.payload.is_corrupt());

        let not_json = STANDARD.encode("hello");
        let decoded = decode_study_link(&format!("#/study?data={not_json}"));
        assert!(decoded.payload.is_corrupt());

        let empty = STANDARD.encode("[]");
        let decoded = decode_study_link(&format!("#/study?data={empty}"));
        assert!(decoded.payload.is_corrupt());
    }

    #[test]
    fn test_unescaped_plus_survives() {
        let json = serialize_tasks(&tasks()).unwrap();
        let raw = STANDARD.encode(json.as_bytes());
        let decoded = decode_study_link(&format!("https://host/#/study?data={raw}"));
        assert!(decoded.payload.tasks().is_some());
    }

    #[test]
    fn test_url_safe_alphabet_accepted() {
        let json = serialize_tasks(&tasks()).unwrap();
        let raw = URL_SAFE_NO_PAD.encode(json.as_bytes());
        assert_eq!(decode_payload(&raw).unwrap(), tasks());
    }

    #[test]
    fn test_generated_participant_id() {
        let id = generate_participant_id();
        assert_eq!(id.len(), 7);
        assert!(id.starts_with("P-"));
        assert!(id[2..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));

        let ids: std::collections::HashSet<String> =
            (0..64).map(|_| generate_participant_id()).collect();
        assert!(ids.len() > 1);

        let link = decode_study_link("#/study?data=");
        assert!(link.participant_or_generated().starts_with("P-"));
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TabSeekError};
use crate::models::{IndexSnapshot, TabId};

/// Minimal tab reference carried by `moveToTab`; any extra descriptor fields are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabRef {
    pub id: TabId,
}

/// Content to background requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum BackgroundRequest {
    /// Index entries for the tabs open in the requester's window.
    #[serde(rename = "getAllTabsFromLocalStorage")]
    GetAllTabsFromLocalStorage,
    #[serde(rename = "moveToTab")]
    MoveToTab { tab: TabRef },
}

impl BackgroundRequest {
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::GetAllTabsFromLocalStorage => "getAllTabsFromLocalStorage",
            Self::MoveToTab { .. } => "moveToTab",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundResponse {
    Tabs(IndexSnapshot),
    Ack,
}

impl BackgroundResponse {
    pub fn into_value(self) -> Result<Value> {
        match self {
            Self::Tabs(snapshot) => Ok(serde_json::to_value(snapshot)?),
            Self::Ack => Ok(Value::Null),
        }
    }
}

/// Background to content push commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ContentCommand {
    /// Toggle the search overlay.
    #[serde(rename = "search-handler")]
    SearchHandler,
}

/// Named accelerators delivered by the host command capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutCommand {
    Search,
}

impl ShortcutCommand {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "search" => Some(Self::Search),
            _ => None,
        }
    }
}

fn action_name(payload: &Value) -> String {
    payload
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or("<missing>")
        .to_string()
}

pub fn decode_request(payload: &Value) -> Result<BackgroundRequest> {
    serde_json::from_value(payload.clone())
        .map_err(|_| TabSeekError::UnroutableAction(action_name(payload)))
}

pub fn decode_content_command(payload: &Value) -> Result<ContentCommand> {
    serde_json::from_value(payload.clone())
        .map_err(|_| TabSeekError::UnroutableAction(action_name(payload)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::TabEntry;

    #[test]
    fn decodes_get_all_tabs_request() {
        let request = decode_request(&json!({"action": "getAllTabsFromLocalStorage"}))
            .expect("decode");
        assert_eq!(request, BackgroundRequest::GetAllTabsFromLocalStorage);
    }

    #[test]
    fn move_to_tab_tolerates_full_tab_payload() {
        let request = decode_request(&json!({
            "action": "moveToTab",
            "tab": {"id": 4, "url": "http://a", "title": "A", "tabText": "x"}
        }))
        .expect("decode");
        assert_eq!(
            request,
            BackgroundRequest::MoveToTab {
                tab: TabRef { id: TabId::new(4) }
            }
        );
    }

    #[test]
    fn unknown_action_is_unroutable() {
        let err = decode_request(&json!({"action": "closeEverything"})).expect_err("unroutable");
        assert!(matches!(err, TabSeekError::UnroutableAction(ref action) if action == "closeEverything"));
    }

    #[test]
    fn move_to_tab_without_id_is_unroutable() {
        let err = decode_request(&json!({"action": "moveToTab", "tab": {}})).expect_err("bad");
        assert_eq!(err.code(), "UNROUTABLE_ACTION");
    }

    #[test]
    fn missing_action_is_reported() {
        let err = decode_request(&json!({"tab": {"id": 1}})).expect_err("missing");
        assert!(err.to_string().contains("<missing>"));
    }

    #[test]
    fn request_serializes_with_action_tag() {
        let value = serde_json::to_value(BackgroundRequest::MoveToTab {
            tab: TabRef { id: TabId::new(2) },
        })
        .expect("serialize");
        assert_eq!(value, json!({"action": "moveToTab", "tab": {"id": 2}}));
    }

    #[test]
    fn content_command_uses_kebab_action() {
        let value = serde_json::to_value(ContentCommand::SearchHandler).expect("serialize");
        assert_eq!(value, json!({"action": "search-handler"}));
        assert_eq!(
            decode_content_command(&value).expect("decode"),
            ContentCommand::SearchHandler
        );
    }

    #[test]
    fn tabs_response_is_id_keyed_object() {
        let entry = TabEntry {
            id: TabId::new(1),
            url: "http://a".to_string(),
            title: "Rust Book".to_string(),
            fav_icon_url: String::new(),
            tab_text: None,
        };
        let snapshot = IndexSnapshot::from([(entry.id, entry)]);
        let value = BackgroundResponse::Tabs(snapshot).into_value().expect("value");
        assert_eq!(value["1"]["title"], "Rust Book");
        assert_eq!(BackgroundResponse::Ack.into_value().expect("value"), Value::Null);
    }

    #[test]
    fn shortcut_parse_recognizes_search_only() {
        assert_eq!(ShortcutCommand::parse("search"), Some(ShortcutCommand::Search));
        assert_eq!(ShortcutCommand::parse("reload"), None);
    }
}

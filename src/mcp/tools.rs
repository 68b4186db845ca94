//! Tool definitions advertised by `tools/list`.

use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

pub fn definitions() -> Vec<Tool> {
    vec![
        Tool {
            name: "list_conversations",
            description: "List job search conversations with optional filters. Returns conversations sorted by last activity.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "status": {
                        "type": "string",
                        "enum": ["waiting_on_me", "waiting_on_them", "stale", "active", "closed", "all"],
                        "description": "Filter by conversation status. Use 'all' or omit for no filter.",
                    },
                    "company": {
                        "type": "string",
                        "description": "Filter by company name (case-insensitive partial match)",
                    },
                    "since_days": {
                        "type": "integer",
                        "description": "Only show conversations with activity in the last N days",
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of results to return (default: 20)",
                    },
                    "include_archived": {
                        "type": "boolean",
                        "description": "Include archived conversations (default: false)",
                    },
                },
            }),
        },
        Tool {
            name: "get_conversation",
            description: "Get detailed information about a specific conversation including its email timeline.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "identifier": {
                        "type": "string",
                        "description": "Company name (case-insensitive) or conversation ID",
                    },
                },
                "required": ["identifier"],
            }),
        },
        Tool {
            name: "get_pending_actions",
            description: "Get conversations that need your attention - either waiting for your response or stale.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "include_stale": {
                        "type": "boolean",
                        "description": "Include stale conversations that may need follow-up (default: true)",
                    },
                },
            }),
        },
        Tool {
            name: "search_conversations",
            description: "Search across all conversations by company name, recruiter, position, or email subject.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query text",
                    },
                },
                "required": ["query"],
            }),
        },
        Tool {
            name: "get_stats",
            description: "Get aggregate statistics about your job search including conversation counts and response rates.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "since_days": {
                        "type": "integer",
                        "description": "Calculate stats for the last N days only",
                    },
                    "detailed": {
                        "type": "boolean",
                        "description": "Include a per-day classification breakdown (default: false)",
                    },
                },
            }),
        },
        Tool {
            name: "merge_conversations",
            description: "Merge two conversations into one. All emails from the source conversation are moved to the target.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "target": {
                        "type": "string",
                        "description": "Target conversation (company name or ID) - emails are merged into this",
                    },
                    "source": {
                        "type": "string",
                        "description": "Source conversation (company name or ID) - deleted after the merge",
                    },
                },
                "required": ["target", "source"],
            }),
        },
        Tool {
            name: "archive_conversation",
            description: "Archive or unarchive a conversation. Archived conversations are hidden from default list output.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "identifier": {
                        "type": "string",
                        "description": "Company name (case-insensitive) or conversation ID",
                    },
                    "unarchive": {
                        "type": "boolean",
                        "description": "Unarchive instead of archive (default: false)",
                    },
                },
                "required": ["identifier"],
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tool_has_an_object_schema() {
        for tool in definitions() {
            assert_eq!(tool.input_schema["type"], "object", "tool {}", tool.name);
            assert!(!tool.description.is_empty());
        }
    }

    #[test]
    fn serializes_with_camel_case_schema_key() {
        let tools = definitions();
        let text = serde_json::to_string(&tools[0]).unwrap();
        assert!(text.contains("\"inputSchema\""));
    }
}

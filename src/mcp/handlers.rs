//! Tool call dispatch and implementations.

use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use super::server::Server;
use crate::db::models::{ConversationStatus, ListOptions};
use crate::error::JobError;

#[derive(Debug, Default, Deserialize)]
struct ListConversationsParams {
    #[serde(default)]
    status: String,
    #[serde(default)]
    company: String,
    #[serde(default)]
    since_days: i64,
    #[serde(default)]
    limit: usize,
    #[serde(default)]
    include_archived: bool,
}

#[derive(Debug, Deserialize)]
struct IdentifierParams {
    identifier: String,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
}

#[derive(Debug, Default, Deserialize)]
struct StatsParams {
    #[serde(default)]
    since_days: i64,
    #[serde(default)]
    detailed: bool,
}

#[derive(Debug, Deserialize)]
struct MergeParams {
    target: String,
    source: String,
}

#[derive(Debug, Deserialize)]
struct ArchiveParams {
    identifier: String,
    #[serde(default)]
    unarchive: bool,
}

#[derive(Debug, Default, Deserialize)]
struct PendingParams {
    include_stale: Option<bool>,
}

impl Server {
    pub(super) fn call_tool(&self, name: &str, args: Value) -> Result<Value, JobError> {
        match name {
            "list_conversations" => self.tool_list_conversations(args),
            "get_conversation" => self.tool_get_conversation(args),
            "get_pending_actions" => self.tool_get_pending_actions(args),
            "search_conversations" => self.tool_search_conversations(args),
            "get_stats" => self.tool_get_stats(args),
            "merge_conversations" => self.tool_merge_conversations(args),
            "archive_conversation" => self.tool_archive_conversation(args),
            _ => Err(JobError::NotFound(format!("tool: {}", name))),
        }
    }

    fn tool_list_conversations(&self, args: Value) -> Result<Value, JobError> {
        let p: ListConversationsParams =
            serde_json::from_value(args).map_err(|e| JobError::Other(format!("invalid parameters: {}", e)))?;

        let mut opts = ListOptions {
            include_archived: p.include_archived,
            limit: if p.limit > 0 { p.limit } else { 20 },
            ..Default::default()
        };

        if !p.status.is_empty() && p.status != "all" {
            opts.status = Some(ConversationStatus::from_str(&p.status));
        }
        if !p.company.is_empty() {
            opts.company = Some(p.company);
        }
        if p.since_days > 0 {
            opts.since = Some(Utc::now() - Duration::days(p.since_days));
        }

        let convs = self.db.list_conversations(&opts)?;
        Ok(serde_json::to_value(convs)?)
    }

    fn tool_get_conversation(&self, args: Value) -> Result<Value, JobError> {
        let p: IdentifierParams =
            serde_json::from_value(args).map_err(|e| JobError::Other(format!("invalid parameters: {}", e)))?;

        let conv = self
            .db
            .find_conversation(&p.identifier)?
            .ok_or_else(|| JobError::NotFound(format!("conversation: {}", p.identifier)))?;
        let emails = self.db.list_emails_for_conversation(&conv.id)?;

        Ok(json!({ "conversation": conv, "emails": emails }))
    }

    fn tool_get_pending_actions(&self, args: Value) -> Result<Value, JobError> {
        let p: PendingParams = serde_json::from_value(args).unwrap_or_default();
        let include_stale = p.include_stale.unwrap_or(true);

        let waiting = self.db.list_conversations(&ListOptions {
            status: Some(ConversationStatus::WaitingOnMe),
            ..Default::default()
        })?;

        let stale = if include_stale {
            self.db.list_conversations(&ListOptions {
                status: Some(ConversationStatus::Stale),
                ..Default::default()
            })?
        } else {
            Vec::new()
        };

        let summary = format!(
            "{} conversation(s) waiting on you, {} gone stale",
            waiting.len(),
            stale.len()
        );

        Ok(json!({
            "waiting_on_me": waiting,
            "stale": stale,
            "summary": summary,
        }))
    }

    fn tool_search_conversations(&self, args: Value) -> Result<Value, JobError> {
        let p: SearchParams =
            serde_json::from_value(args).map_err(|e| JobError::Other(format!("invalid parameters: {}", e)))?;
        if p.query.is_empty() {
            return Err(JobError::Other("query is required".into()));
        }

        let convs = self.db.search_conversations(&p.query)?;
        Ok(serde_json::to_value(convs)?)
    }

    fn tool_get_stats(&self, args: Value) -> Result<Value, JobError> {
        let p: StatsParams = serde_json::from_value(args).unwrap_or_default();

        let since = if p.since_days > 0 {
            Some(Utc::now() - Duration::days(p.since_days))
        } else {
            None
        };

        let stats = self.db.stats(since)?;
        if !p.detailed {
            return Ok(serde_json::to_value(stats)?);
        }

        let metrics = self.db.list_metrics(30)?;
        Ok(json!({ "stats": stats, "classification_metrics": metrics }))
    }

    fn tool_merge_conversations(&self, args: Value) -> Result<Value, JobError> {
        let p: MergeParams =
            serde_json::from_value(args).map_err(|e| JobError::Other(format!("invalid parameters: {}", e)))?;

        let target = self
            .db
            .find_conversation(&p.target)?
            .ok_or_else(|| JobError::NotFound(format!("conversation: {}", p.target)))?;
        let source = self
            .db
            .find_conversation(&p.source)?
            .ok_or_else(|| JobError::NotFound(format!("conversation: {}", p.source)))?;

        let result = self.db.merge_conversations(&target.id, &source.id)?;
        Ok(serde_json::to_value(result)?)
    }

    fn tool_archive_conversation(&self, args: Value) -> Result<Value, JobError> {
        let p: ArchiveParams =
            serde_json::from_value(args).map_err(|e| JobError::Other(format!("invalid parameters: {}", e)))?;

        let conv = self
            .db
            .find_conversation(&p.identifier)?
            .ok_or_else(|| JobError::NotFound(format!("conversation: {}", p.identifier)))?;

        let result = if p.unarchive {
            self.db.unarchive_conversation(&conv.id)?
        } else {
            self.db.archive_conversation(&conv.id)?
        };
        Ok(serde_json::to_value(result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::Database;

    fn seeded_server() -> Server {
        let db = Database::in_memory().unwrap();
        let acme = db.insert_test_conversation("Acme");
        db.insert_test_email(&acme, "a1", Utc::now());
        db.insert_test_email(&acme, "a2", Utc::now());
        let globex = db.insert_test_conversation("Globex");
        db.insert_test_email(&globex, "g1", Utc::now());
        Server::new(db, Config::default())
    }

    #[test]
    fn get_conversation_returns_timeline() {
        let server = seeded_server();
        let result = server
            .call_tool("get_conversation", json!({ "identifier": "Acme" }))
            .unwrap();

        assert_eq!(result["conversation"]["company"], "Acme");
        assert_eq!(result["emails"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn merge_via_tool_deletes_source() {
        let server = seeded_server();
        let result = server
            .call_tool(
                "merge_conversations",
                json!({ "target": "Acme", "source": "Globex" }),
            )
            .unwrap();

        assert_eq!(result["emails_moved"], 1);
        assert_eq!(result["total_emails"], 3);
        assert!(server.db.get_conversation_by_company("Globex").unwrap().is_none());
    }

    #[test]
    fn archive_tool_roundtrip() {
        let server = seeded_server();
        let result = server
            .call_tool("archive_conversation", json!({ "identifier": "Acme" }))
            .unwrap();
        assert_eq!(result["archived"], true);

        let result = server
            .call_tool(
                "archive_conversation",
                json!({ "identifier": "Acme", "unarchive": true }),
            )
            .unwrap();
        assert_eq!(result["archived"], false);
    }

    #[test]
    fn missing_conversation_is_not_found() {
        let server = seeded_server();
        let err = server
            .call_tool("get_conversation", json!({ "identifier": "Nowhere" }))
            .unwrap_err();
        assert!(matches!(err, JobError::NotFound(_)));
    }
}

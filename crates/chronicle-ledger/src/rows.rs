//! Decoding store records into domain types

use crate::error::LedgerError;
use chronicle_domain::{
    Action, ActionStatus, AuthorType, Commit, EdgeFact, EntityVersion, Record, RecordExt,
};

fn required_str(record: &Record, key: &str) -> Result<String, LedgerError> {
    record
        .str_field(key)
        .map(str::to_string)
        .ok_or_else(|| LedgerError::InvalidData(format!("missing column {}", key)))
}

fn required_i64(record: &Record, key: &str) -> Result<i64, LedgerError> {
    record
        .i64_field(key)
        .ok_or_else(|| LedgerError::InvalidData(format!("missing column {}", key)))
}

fn optional_str(record: &Record, key: &str) -> Option<String> {
    record.str_field(key).map(str::to_string)
}

pub(crate) fn commit_from_record(record: &Record) -> Result<Commit, LedgerError> {
    let author_type = required_str(record, "author_type")?;
    Ok(Commit {
        id: required_str(record, "id")?,
        org_id: required_str(record, "org_id")?,
        message: required_str(record, "message")?,
        author: required_str(record, "author")?,
        author_type: AuthorType::parse(&author_type)
            .ok_or_else(|| LedgerError::InvalidData(format!("author_type {}", author_type)))?,
        created_at: required_i64(record, "created_at")?,
        parent_commit_id: optional_str(record, "parent_commit_id"),
        branch_name: required_str(record, "branch_name")?,
        signature: optional_str(record, "signature"),
        metadata: record.json_field("metadata"),
    })
}

pub(crate) fn action_from_record(record: &Record) -> Result<Action, LedgerError> {
    let status = required_str(record, "status")?;
    Ok(Action {
        id: required_str(record, "id")?,
        commit_id: required_str(record, "commit_id")?,
        action_type: required_str(record, "action_type")?,
        tool: required_str(record, "tool")?,
        entity_type: required_str(record, "entity_type")?,
        entity_id: required_str(record, "entity_id")?,
        inputs: record.json_field("inputs"),
        outputs: record.json_field("outputs"),
        status: ActionStatus::parse(&status)
            .ok_or_else(|| LedgerError::InvalidData(format!("status {}", status)))?,
        error_message: optional_str(record, "error_message"),
        created_at: required_i64(record, "created_at")?,
    })
}

pub(crate) fn version_from_record(record: &Record) -> Result<EntityVersion, LedgerError> {
    Ok(EntityVersion {
        id: required_str(record, "id")?,
        entity_id: required_str(record, "entity_id")?,
        entity_type: required_str(record, "entity_type")?,
        properties: record.json_field("properties"),
        valid_from: required_i64(record, "valid_from")?,
        valid_to: record.i64_field("valid_to"),
        created_by_commit: required_str(record, "created_by_commit")?,
        ended_by_commit: optional_str(record, "ended_by_commit"),
        org_id: required_str(record, "org_id")?,
        content_hash: required_str(record, "content_hash")?,
    })
}

pub(crate) fn edge_fact_from_record(record: &Record) -> Result<EdgeFact, LedgerError> {
    Ok(EdgeFact {
        id: required_str(record, "id")?,
        edge_type: required_str(record, "type")?,
        from_id: required_str(record, "from_id")?,
        to_id: required_str(record, "to_id")?,
        from_type: optional_str(record, "from_type"),
        to_type: optional_str(record, "to_type"),
        valid_from: required_i64(record, "valid_from")?,
        valid_to: record.i64_field("valid_to"),
        created_by_commit: required_str(record, "created_by_commit")?,
        ended_by_commit: optional_str(record, "ended_by_commit"),
        org_id: required_str(record, "org_id")?,
        props: record.json_field("props"),
    })
}

/// First column named `id` in each row
pub(crate) fn ids(records: &chronicle_domain::RecordSet) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.str_field("id").map(str::to_string))
        .collect()
}

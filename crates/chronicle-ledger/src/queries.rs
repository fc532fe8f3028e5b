//! SQL used by the ledger
//!
//! Every query references `:org_id` explicitly; the store merges the tenant id
//! into the parameters but never rewrites query text.

pub(crate) const INSERT_COMMIT: &str = "INSERT INTO commits
    (id, org_id, message, author, author_type, created_at, parent_commit_id, branch_name, metadata)
    VALUES (:id, :org_id, :message, :author, :author_type, :created_at, :parent_commit_id, :branch_name, :metadata)";

pub(crate) const ATTACH_SIGNATURE: &str = "UPDATE commits SET signature = :signature
    WHERE id = :id AND org_id = :org_id AND signature IS NULL
    RETURNING id";

pub(crate) const SELECT_COMMIT: &str = "SELECT id, org_id, message, author, author_type, created_at,
    parent_commit_id, branch_name, signature, metadata
    FROM commits WHERE id = :id";

pub(crate) const SELECT_BRANCH_HEAD: &str = "SELECT id, org_id, message, author, author_type, created_at,
    parent_commit_id, branch_name, signature, metadata
    FROM commits WHERE org_id = :org_id AND branch_name = :branch_name
    ORDER BY created_at DESC, rowid DESC LIMIT 1";

pub(crate) const SELECT_ORG_COMMITS: &str = "SELECT id FROM commits WHERE org_id = :org_id
    ORDER BY created_at DESC, rowid DESC LIMIT :limit";

// The match on commits makes a missing commit yield zero rows
pub(crate) const INSERT_ACTION: &str = "INSERT INTO actions
    (id, commit_id, org_id, action_type, tool, entity_type, entity_id, inputs, outputs, status, error_message, created_at)
    SELECT :id, c.id, c.org_id, :action_type, :tool, :entity_type, :entity_id, :inputs, :outputs, :status, :error_message, :created_at
    FROM commits c WHERE c.id = :commit_id AND c.org_id = :org_id
    RETURNING id";

pub(crate) const SELECT_COMMIT_ACTIONS: &str = "SELECT id, commit_id, action_type, tool, entity_type, entity_id,
    inputs, outputs, status, error_message, created_at
    FROM actions WHERE commit_id = :commit_id ORDER BY created_at, rowid";

pub(crate) const SELECT_VERSION_BY_HASH: &str = "SELECT id FROM entity_versions
    WHERE org_id = :org_id AND entity_id = :entity_id AND content_hash = :content_hash
    ORDER BY valid_from DESC LIMIT 1";

pub(crate) const SELECT_OPEN_VERSION_ID: &str = "SELECT id FROM entity_versions
    WHERE org_id = :org_id AND entity_id = :entity_id AND valid_to IS NULL";

// Compare-and-swap: only the version the caller saw as current may be closed
pub(crate) const CLOSE_VERSION: &str = "UPDATE entity_versions
    SET valid_to = :now, ended_by_commit = :commit_id
    WHERE id = :prior_id AND org_id = :org_id AND valid_to IS NULL
    RETURNING id";

pub(crate) const INSERT_VERSION_IF_NONE_OPEN: &str = "INSERT INTO entity_versions
    (id, entity_id, entity_type, properties, valid_from, valid_to, created_by_commit, org_id, content_hash)
    SELECT :id, :entity_id, :entity_type, :properties, :now, NULL, :commit_id, :org_id, :content_hash
    WHERE NOT EXISTS (
        SELECT 1 FROM entity_versions
        WHERE org_id = :org_id AND entity_id = :entity_id AND valid_to IS NULL
    )
    RETURNING id";

pub(crate) const SELECT_VERSION_AT: &str = "SELECT properties FROM entity_versions
    WHERE org_id = :org_id AND entity_id = :entity_id
      AND valid_from <= :ts AND (valid_to IS NULL OR valid_to > :ts)
    ORDER BY valid_from DESC LIMIT 1";

// The match on commits makes a missing commit yield zero rows
pub(crate) const INSERT_EDGE_FACT: &str = "INSERT INTO edge_facts
    (id, type, from_id, to_id, from_type, to_type, valid_from, valid_to, created_by_commit, org_id, props)
    SELECT :id, :type, :from_id, :to_id, :from_type, :to_type, :now, NULL, c.id, c.org_id, :props
    FROM commits c WHERE c.id = :commit_id AND c.org_id = :org_id
    RETURNING id";

pub(crate) const CLOSE_OPEN_EDGE_FACTS: &str = "UPDATE edge_facts
    SET valid_to = :now, ended_by_commit = :commit_id
    WHERE org_id = :org_id AND from_id = :from_id AND type = :type AND valid_to IS NULL
    RETURNING id";

pub(crate) const END_EDGE_FACT: &str = "UPDATE edge_facts
    SET valid_to = :now, ended_by_commit = :commit_id
    WHERE id = :id AND org_id = :org_id AND valid_to IS NULL
    RETURNING id";

pub(crate) const SELECT_CURRENT_VERSION: &str = "SELECT id, entity_id, entity_type, properties, valid_from, valid_to,
    created_by_commit, ended_by_commit, org_id, content_hash
    FROM entity_versions
    WHERE org_id = :org_id AND entity_id = :entity_id AND valid_to IS NULL";

pub(crate) const SELECT_ENTITY_HISTORY: &str = "SELECT id, entity_id, entity_type, properties, valid_from, valid_to,
    created_by_commit, ended_by_commit, org_id, content_hash
    FROM entity_versions
    WHERE org_id = :org_id AND entity_id = :entity_id
    ORDER BY valid_from, rowid";

pub(crate) const SELECT_EDGE_FACT: &str = "SELECT id, type, from_id, to_id, from_type, to_type, valid_from, valid_to,
    created_by_commit, ended_by_commit, org_id, props
    FROM edge_facts WHERE id = :id AND org_id = :org_id";

// A null :type matches every relationship type
pub(crate) const SELECT_ACTIVE_EDGE_FACTS: &str = "SELECT id, type, from_id, to_id, from_type, to_type, valid_from, valid_to,
    created_by_commit, ended_by_commit, org_id, props
    FROM edge_facts
    WHERE org_id = :org_id AND from_id = :from_id AND (:type IS NULL OR type = :type)
      AND valid_to IS NULL
    ORDER BY valid_from, rowid";

pub(crate) const SELECT_EDGE_FACTS_AT: &str = "SELECT id, type, from_id, to_id, from_type, to_type, valid_from, valid_to,
    created_by_commit, ended_by_commit, org_id, props
    FROM edge_facts
    WHERE org_id = :org_id AND from_id = :from_id AND type = :type
      AND valid_from <= :ts AND (valid_to IS NULL OR valid_to > :ts)
    ORDER BY valid_from, rowid";

pub(crate) const SELECT_EDGE_FACT_HISTORY: &str = "SELECT id, type, from_id, to_id, from_type, to_type, valid_from, valid_to,
    created_by_commit, ended_by_commit, org_id, props
    FROM edge_facts
    WHERE org_id = :org_id AND from_id = :from_id AND type = :type
    ORDER BY valid_from, rowid";

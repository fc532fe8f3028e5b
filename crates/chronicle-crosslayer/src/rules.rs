//! Built-in cross-layer rules
//!
//! Validation queries project `entity_id`, `entity_type`, `org_id`,
//! `violation_type` and `description`. They consider both plain edges and open
//! edge facts, so a link made either way satisfies the rule.

use chronicle_domain::{Cardinality, CrossLayerRule, Layer, RepairPlan};

/// Every file belongs to a content cluster
pub const FILE_CLUSTER: &str = "file-cluster";
/// Every shot is linked to a scene
pub const SHOT_SCENE: &str = "shot-scene";
/// Every asset has a current version
pub const ASSET_VERSION: &str = "asset-version";

const FILE_WITHOUT_CLUSTER: &str = "SELECT f.id AS entity_id, f.label AS entity_type, f.org_id AS org_id,
        'MISSING_CLUSTER' AS violation_type,
        'File ' || f.id || ' does not belong to a content cluster' AS description
    FROM nodes f
    WHERE f.label = 'File'
      AND NOT EXISTS (
          SELECT 1 FROM edges e
          WHERE e.from_id = f.id AND e.type = 'BELONGS_TO_CLUSTER' AND e.org_id = f.org_id
      )
      AND NOT EXISTS (
          SELECT 1 FROM edge_facts ef
          WHERE ef.from_id = f.id AND ef.type = 'BELONGS_TO_CLUSTER'
            AND ef.org_id = f.org_id AND ef.valid_to IS NULL
      )";

const CREATE_CLUSTER: &str = "INSERT INTO nodes (id, label, org_id, properties, created_at)
    SELECT :repair_id, 'ContentCluster', f.org_id,
           json_object('name', 'Auto cluster for ' || f.id, 'auto_created', json('true'), 'rule_id', :rule_id,
                       'created_by_commit', :commit_id),
           :now
    FROM nodes f
    WHERE f.id = :entity_id AND f.org_id = :org_id";

const LINK_FILE_TO_CLUSTER: &str = "INSERT INTO edges (id, type, from_id, to_id, org_id, properties, created_by_commit, created_at)
    SELECT :link_id, 'BELONGS_TO_CLUSTER', :entity_id, c.id, c.org_id,
           json_object('rule_id', :rule_id, 'method', 'auto_repair'), :commit_id, :now
    FROM nodes c
    WHERE c.id = :repair_id AND c.org_id = :org_id
    RETURNING 'created_cluster' AS repair_action, to_id AS cluster_id";

const SHOT_WITHOUT_SCENE: &str = "SELECT s.id AS entity_id, s.label AS entity_type, s.org_id AS org_id,
        'MISSING_SCENE' AS violation_type,
        'Shot ' || s.id || ' is not linked to a scene' AS description
    FROM nodes s
    WHERE s.label = 'Shot'
      AND NOT EXISTS (
          SELECT 1 FROM edges e
          WHERE e.from_id = s.id AND e.type = 'FOR_SCENE' AND e.org_id = s.org_id
      )
      AND NOT EXISTS (
          SELECT 1 FROM edge_facts ef
          WHERE ef.from_id = s.id AND ef.type = 'FOR_SCENE'
            AND ef.org_id = s.org_id AND ef.valid_to IS NULL
      )";

const ASSET_WITHOUT_VERSION: &str = "SELECT a.id AS entity_id, a.label AS entity_type, a.org_id AS org_id,
        'MISSING_VERSION' AS violation_type,
        'Asset ' || a.id || ' has no current version' AS description
    FROM nodes a
    WHERE a.label = 'Asset'
      AND NOT EXISTS (
          SELECT 1 FROM entity_versions v
          WHERE v.entity_id = a.id AND v.org_id = a.org_id AND v.valid_to IS NULL
      )";

/// The rules every deployment starts with, in evaluation order
///
/// Only the file rule can repair itself: a missing scene or version needs a
/// human decision.
pub fn builtin_rules() -> Vec<CrossLayerRule> {
    vec![
        CrossLayerRule {
            id: FILE_CLUSTER.to_string(),
            name: "Files belong to a content cluster".to_string(),
            from_layer: Layer::Operations,
            from_entity_type: "File".to_string(),
            to_layer: Layer::Creative,
            to_entity_type: "ContentCluster".to_string(),
            relationship_type: "BELONGS_TO_CLUSTER".to_string(),
            required: true,
            cardinality: Cardinality::ManyToOne,
            validation_query: FILE_WITHOUT_CLUSTER.to_string(),
            repair: Some(RepairPlan::new(vec![
                CREATE_CLUSTER.to_string(),
                LINK_FILE_TO_CLUSTER.to_string(),
            ])),
            enabled: true,
        },
        CrossLayerRule {
            id: SHOT_SCENE.to_string(),
            name: "Shots are linked to a scene".to_string(),
            from_layer: Layer::Reality,
            from_entity_type: "Shot".to_string(),
            to_layer: Layer::Creative,
            to_entity_type: "Scene".to_string(),
            relationship_type: "FOR_SCENE".to_string(),
            required: true,
            cardinality: Cardinality::ManyToOne,
            validation_query: SHOT_WITHOUT_SCENE.to_string(),
            repair: None,
            enabled: true,
        },
        CrossLayerRule {
            id: ASSET_VERSION.to_string(),
            name: "Assets have a current version".to_string(),
            from_layer: Layer::Operations,
            from_entity_type: "Asset".to_string(),
            to_layer: Layer::Provenance,
            to_entity_type: "EntityVersion".to_string(),
            relationship_type: "HAS_VERSION".to_string(),
            required: true,
            cardinality: Cardinality::OneToMany,
            validation_query: ASSET_WITHOUT_VERSION.to_string(),
            repair: None,
            enabled: true,
        },
    ]
}

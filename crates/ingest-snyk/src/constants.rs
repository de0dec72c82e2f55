//! Step ids, handoff slot names and the type metadata of everything the
//! integration writes.

use ingest_core::{EntitySchema, MappedRelationshipSchema, RelationshipClass, RelationshipDirection,
                  RelationshipSchema};

pub mod step_ids {
    pub const FETCH_ACCOUNT: &str = "fetch-account";
    pub const FETCH_GROUP: &str = "fetch-group";
    pub const FETCH_ORGANIZATIONS: &str = "fetch-organizations";
    pub const FETCH_ROLES: &str = "fetch-roles";
    pub const FETCH_USERS: &str = "fetch-users";
    pub const BUILD_USER_ROLE: &str = "build-user-role-relationship";
    pub const FETCH_PROJECTS: &str = "fetch-projects";
    pub const FETCH_FINDINGS: &str = "fetch-findings";
}

pub mod set_data_keys {
    pub const ACCOUNT_ENTITY: &str = "ACCOUNT_ENTITY";
    pub const GROUP_ENTITY: &str = "GROUP_ENTITY";
}

pub mod entities {
    use super::EntitySchema;

    pub const ACCOUNT: EntitySchema = EntitySchema { resource_name: "Snyk Account",
                                                     entity_type: "snyk_account",
                                                     class: &["Service", "Account"] };
    pub const GROUP: EntitySchema = EntitySchema { resource_name: "Snyk Group",
                                                   entity_type: "snyk_group",
                                                   class: &["Group"] };
    pub const ORGANIZATION: EntitySchema = EntitySchema { resource_name: "Snyk Organization",
                                                          entity_type: "snyk_organization",
                                                          class: &["Organization"] };
    pub const PROJECT: EntitySchema = EntitySchema { resource_name: "Snyk Project",
                                                     entity_type: "snyk_project",
                                                     class: &["Project"] };
    pub const USER: EntitySchema = EntitySchema { resource_name: "Snyk User",
                                                  entity_type: "snyk_user",
                                                  class: &["User"] };
    pub const ROLE: EntitySchema = EntitySchema { resource_name: "Snyk Role",
                                                  entity_type: "snyk_role",
                                                  class: &["AccessRole"] };
    pub const FINDING: EntitySchema = EntitySchema { resource_name: "Snyk Issue",
                                                     entity_type: "snyk_finding",
                                                     class: &["Finding"] };
    pub const CVE: EntitySchema = EntitySchema { resource_name: "CVE",
                                                 entity_type: "cve",
                                                 class: &["Vulnerability"] };
    pub const CWE: EntitySchema = EntitySchema { resource_name: "CWE",
                                                 entity_type: "cwe",
                                                 class: &["Weakness"] };
    pub const CODE_REPO_TYPE: &str = "CodeRepo";
}

pub mod relationships {
    use super::entities::*;
    use super::{RelationshipClass, RelationshipSchema};

    pub const GROUP_ORGANIZATION: RelationshipSchema =
        RelationshipSchema { relationship_type: "snyk_group_has_organization",
                             source_type: GROUP.entity_type,
                             class: RelationshipClass::Has,
                             target_type: ORGANIZATION.entity_type };
    pub const GROUP_ROLE: RelationshipSchema = RelationshipSchema { relationship_type: "snyk_group_has_role",
                                                                    source_type: GROUP.entity_type,
                                                                    class: RelationshipClass::Has,
                                                                    target_type: ROLE.entity_type };
    pub const ORGANIZATION_USER: RelationshipSchema =
        RelationshipSchema { relationship_type: "snyk_organization_has_user",
                             source_type: ORGANIZATION.entity_type,
                             class: RelationshipClass::Has,
                             target_type: USER.entity_type };
    pub const USER_ROLE: RelationshipSchema = RelationshipSchema { relationship_type: "snyk_user_assigned_role",
                                                                   source_type: USER.entity_type,
                                                                   class: RelationshipClass::Assigned,
                                                                   target_type: ROLE.entity_type };
    pub const ORGANIZATION_PROJECT: RelationshipSchema =
        RelationshipSchema { relationship_type: "snyk_organization_has_project",
                             source_type: ORGANIZATION.entity_type,
                             class: RelationshipClass::Has,
                             target_type: PROJECT.entity_type };
    pub const ACCOUNT_PROJECT: RelationshipSchema =
        RelationshipSchema { relationship_type: "snyk_account_scans_snyk_project",
                             source_type: ACCOUNT.entity_type,
                             class: RelationshipClass::Scans,
                             target_type: PROJECT.entity_type };
    pub const PROJECT_FINDING: RelationshipSchema =
        RelationshipSchema { relationship_type: "snyk_project_has_finding",
                             source_type: PROJECT.entity_type,
                             class: RelationshipClass::Has,
                             target_type: FINDING.entity_type };
    pub const ORGANIZATION_IDENTIFIED_FINDING: RelationshipSchema =
        RelationshipSchema { relationship_type: "snyk_organization_identified_snyk_finding",
                             source_type: ORGANIZATION.entity_type,
                             class: RelationshipClass::Identified,
                             target_type: FINDING.entity_type };
}

/// CVE/CWE targets are not known locally when a finding is emitted, so the
/// finding edges toward them are always mapped.
pub mod mapped_relationships {
    use super::entities::*;
    use super::{MappedRelationshipSchema, RelationshipClass, RelationshipDirection};

    pub const PROJECT_REPO: MappedRelationshipSchema =
        MappedRelationshipSchema { relationship_type: "snyk_project_scans_coderepo",
                                   source_type: PROJECT.entity_type,
                                   class: RelationshipClass::Scans,
                                   target_type: CODE_REPO_TYPE,
                                   direction: RelationshipDirection::Forward };
    pub const FINDING_IS_CVE: MappedRelationshipSchema =
        MappedRelationshipSchema { relationship_type: "snyk_finding_is_cve",
                                   source_type: FINDING.entity_type,
                                   class: RelationshipClass::Is,
                                   target_type: CVE.entity_type,
                                   direction: RelationshipDirection::Forward };
    pub const FINDING_EXPLOITS_CWE: MappedRelationshipSchema =
        MappedRelationshipSchema { relationship_type: "snyk_finding_exploits_cwe",
                                   source_type: FINDING.entity_type,
                                   class: RelationshipClass::Exploits,
                                   target_type: CWE.entity_type,
                                   direction: RelationshipDirection::Forward };
}

/// Project origins backed by a source-code repository.
pub const SCM_ORIGINS: &[&str] =
    &["github", "github-enterprise", "gitlab", "bitbucket-cloud", "bitbucket-server", "azure-repos"];

pub const CVE_URL_BASE: &str = "https://nvd.nist.gov/vuln/detail/";
pub const CWE_URL_BASE: &str = "https://cwe.mitre.org/data/definitions/";

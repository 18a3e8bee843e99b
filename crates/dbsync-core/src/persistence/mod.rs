// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Person store interface and backends.
//!
//! The store owns the registry's people graph:
//!
//! ```text
//! CoPerson ─┬─ Identifier (accessid)
//!           ├─ Name (primary, official)
//!           ├─ EmailAddress (official)
//!           ├─ CoPersonRole (affiliate, organization)
//!           └─ CoOrgIdentityLink ── OrgIdentity ─┬─ Name (primary, official)
//!                                                ├─ EmailAddress
//!                                                └─ Identifier (eppn, login)
//! ```
//!
//! Multi-entity writes ([`PersonStore::create_person_graph`] and
//! [`PersonStore::create_org_identity_with_login`]) run in one transaction;
//! every other write touches a single row.

pub mod sqlite;

pub use self::sqlite::SqlitePersonStore;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::mapper::{MappedProfile, ProfileName};

/// Identifier type holding the ACCESS ID on a CoPerson.
pub const IDENTIFIER_TYPE_ACCESS_ID: &str = "accessid";
/// Identifier type of the login ePPN on an OrgIdentity.
pub const IDENTIFIER_TYPE_EPPN: &str = "eppn";
/// Name type written by the sync.
pub const NAME_TYPE_OFFICIAL: &str = "official";
/// Email type written by the sync.
pub const EMAIL_TYPE_OFFICIAL: &str = "official";
/// Role affiliation written by the sync.
pub const AFFILIATION_AFFILIATE: &str = "affiliate";
/// Status of newly created people, roles and identifiers.
pub const STATUS_ACTIVE: &str = "active";
/// Description attached to email addresses created by the sync.
pub const EMAIL_DESCRIPTION: &str = "Synched from central User Database";

/// Name row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct NameRecord {
    /// Database primary key.
    pub id: i64,
    /// Given name.
    pub given: String,
    /// Middle name.
    pub middle: Option<String>,
    /// Family name.
    pub family: String,
    /// Name type (official, preferred, ...).
    #[sqlx(rename = "type")]
    pub name_type: String,
    /// Whether this is the owner's primary name.
    #[sqlx(rename = "primary_name")]
    pub primary: bool,
}

/// Email address row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct EmailRecord {
    /// Database primary key.
    pub id: i64,
    /// The address.
    pub mail: String,
    /// Email type (official, personal, ...).
    #[sqlx(rename = "type")]
    pub email_type: String,
    /// Whether the address is verified.
    pub verified: bool,
}

/// CoPersonRole row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RoleRecord {
    /// Database primary key.
    pub id: i64,
    /// Affiliation (affiliate, member, ...).
    pub affiliation: String,
    /// Organization as stored (normalized).
    #[sqlx(rename = "o")]
    pub organization: Option<String>,
    /// Role status.
    pub status: String,
}

/// Identifier row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct IdentifierRecord {
    /// Database primary key.
    pub id: i64,
    /// Identifier value.
    pub identifier: String,
    /// Identifier type (accessid, eppn, ...).
    #[sqlx(rename = "type")]
    pub identifier_type: String,
    /// Whether this identifier may be used to log in.
    pub login: bool,
    /// Identifier status.
    pub status: String,
}

/// An OrgIdentity with its names, emails and identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgIdentityRecord {
    /// Database primary key.
    pub id: i64,
    /// Names attached to the OrgIdentity.
    pub names: Vec<NameRecord>,
    /// Email addresses attached to the OrgIdentity.
    pub emails: Vec<EmailRecord>,
    /// Identifiers attached to the OrgIdentity.
    pub identifiers: Vec<IdentifierRecord>,
}

/// A CoOrgIdentityLink with the OrgIdentity it points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgIdentityLinkRecord {
    /// Database primary key of the link.
    pub id: i64,
    /// Linked OrgIdentity.
    pub org_identity: OrgIdentityRecord,
}

/// A CoPerson with every collection reconciliation looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonRecord {
    /// Database primary key.
    pub id: i64,
    /// CO the person belongs to.
    pub co_id: i64,
    /// Person status.
    pub status: String,
    /// Names attached to the person.
    pub names: Vec<NameRecord>,
    /// Email addresses attached to the person.
    pub emails: Vec<EmailRecord>,
    /// Roles held by the person.
    pub roles: Vec<RoleRecord>,
    /// Identifiers attached to the person.
    pub identifiers: Vec<IdentifierRecord>,
    /// Links to OrgIdentities.
    pub org_identity_links: Vec<OrgIdentityLinkRecord>,
}

/// Entity a name is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameOwner {
    /// A CoPerson.
    Person(i64),
    /// An OrgIdentity.
    OrgIdentity(i64),
}

impl std::fmt::Display for NameOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Person(id) => write!(f, "CoPerson {}", id),
            Self::OrgIdentity(id) => write!(f, "OrgIdentity {}", id),
        }
    }
}

/// Person store used by reconciliation.
#[async_trait]
pub trait PersonStore: Send + Sync {
    /// Find the person holding the given ACCESS ID, fully populated.
    async fn find_by_external_key(
        &self,
        external_key: &str,
    ) -> Result<Option<PersonRecord>, SyncError>;

    /// Create the full person graph for a profile in one transaction.
    ///
    /// Returns the new CoPerson id. On failure nothing is left behind.
    async fn create_person_graph(
        &self,
        co_id: i64,
        profile: &MappedProfile,
    ) -> Result<i64, SyncError>;

    /// Write `name` as the owner's primary official name.
    ///
    /// With `existing_name_id` the row is updated in place, otherwise a new
    /// primary name is inserted.
    async fn update_primary_name(
        &self,
        owner: NameOwner,
        name: &ProfileName,
        existing_name_id: Option<i64>,
    ) -> Result<(), SyncError>;

    /// Add an official, verified email address to a person.
    async fn add_official_email(&self, person_id: i64, mail: &str) -> Result<(), SyncError>;

    /// Add an active Affiliate role. The organization is normalized on write.
    async fn add_affiliate_role(&self, person_id: i64, organization: &str)
    -> Result<(), SyncError>;

    /// Create OrgIdentity + link + Name + login Identifier in one transaction.
    ///
    /// Returns the new OrgIdentity id.
    async fn create_org_identity_with_login(
        &self,
        co_id: i64,
        person_id: i64,
        profile: &MappedProfile,
    ) -> Result<i64, SyncError>;

    /// Make sure an extended identifier type exists for the CO.
    ///
    /// Returns `true` if it was created by this call.
    async fn ensure_identifier_type(
        &self,
        co_id: i64,
        name: &str,
        display_name: &str,
    ) -> Result<bool, SyncError>;
}

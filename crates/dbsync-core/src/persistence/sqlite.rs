// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed person store.

use std::path::Path;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::SyncError;
use crate::mapper::{MappedProfile, ProfileName, normalize_organization};
use crate::migrations;

use super::{
    AFFILIATION_AFFILIATE, EMAIL_DESCRIPTION, EMAIL_TYPE_OFFICIAL, EmailRecord,
    IDENTIFIER_TYPE_ACCESS_ID, IDENTIFIER_TYPE_EPPN, IdentifierRecord, NAME_TYPE_OFFICIAL,
    NameOwner, NameRecord, OrgIdentityLinkRecord, OrgIdentityRecord, PersonRecord, PersonStore,
    RoleRecord, STATUS_ACTIVE,
};

/// Maximum length of given, middle and family names.
const NAME_MAX_LEN: usize = 128;
/// Maximum length of an email address.
const EMAIL_MAX_LEN: usize = 256;
/// Maximum length of a role organization.
const ORGANIZATION_MAX_LEN: usize = 256;
/// Maximum length of an identifier value.
const IDENTIFIER_MAX_LEN: usize = 256;

/// Extended type attribute for identifier types.
const IDENTIFIER_TYPE_ATTRIBUTE: &str = "Identifier.type";

impl NameOwner {
    fn column(self) -> &'static str {
        match self {
            Self::Person(_) => "co_person_id",
            Self::OrgIdentity(_) => "org_identity_id",
        }
    }

    fn id(self) -> i64 {
        match self {
            Self::Person(id) | Self::OrgIdentity(id) => id,
        }
    }

    fn person_id(self) -> Option<i64> {
        match self {
            Self::Person(id) => Some(id),
            Self::OrgIdentity(_) => None,
        }
    }

    fn org_identity_id(self) -> Option<i64> {
        match self {
            Self::Person(_) => None,
            Self::OrgIdentity(id) => Some(id),
        }
    }
}

/// SQLite-backed person store.
#[derive(Clone)]
pub struct SqlitePersonStore {
    pool: SqlitePool,
}

impl SqlitePersonStore {
    /// Create a new store from an existing, migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database file at `path` and run migrations.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let store = SqlitePersonStore::from_path(".data/registry.db").await?;
    /// ```
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                SyncError::persistence(
                    "create database directory",
                    format!("{:?}: {}", parent, e),
                )
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
        Self::connect(&url).await
    }

    /// Connect to a database URL and run migrations.
    pub async fn connect(url: &str) -> Result<Self, SyncError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| SyncError::persistence("connect to the registry database", e.to_string()))?;

        migrations::run_sqlite(&pool).await?;

        Ok(Self { pool })
    }

    /// The underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// ============================================================================
// Validation
// ============================================================================

fn check_required(field: &str, value: &str, max_len: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{}: must not be empty", field));
    }
    check_length(field, value, max_len)
}

fn check_length(field: &str, value: &str, max_len: usize) -> Result<(), String> {
    if value.chars().count() > max_len {
        return Err(format!(
            "{}: must be at most {} characters long",
            field, max_len
        ));
    }
    Ok(())
}

fn validate_name(name: &ProfileName) -> Result<(), String> {
    check_required("given", &name.given, NAME_MAX_LEN)?;
    check_required("family", &name.family, NAME_MAX_LEN)?;
    if let Some(middle) = &name.middle {
        check_length("middle", middle, NAME_MAX_LEN)?;
    }
    Ok(())
}

fn db_error(operation: String) -> impl FnOnce(sqlx::Error) -> SyncError {
    move |e| SyncError::Persistence {
        operation,
        details: e.to_string(),
    }
}

// ============================================================================
// Row writers. Each takes a connection so it can run inside a transaction.
// ============================================================================

async fn insert_person(conn: &mut SqliteConnection, co_id: i64) -> Result<i64, SyncError> {
    let result = sqlx::query("INSERT INTO co_people (co_id, status) VALUES (?, ?)")
        .bind(co_id)
        .bind(STATUS_ACTIVE)
        .execute(&mut *conn)
        .await
        .map_err(db_error("create CoPerson".to_string()))?;

    Ok(result.last_insert_rowid())
}

async fn insert_identifier(
    conn: &mut SqliteConnection,
    owner: NameOwner,
    identifier: &str,
    identifier_type: &str,
    login: bool,
) -> Result<(), SyncError> {
    let operation = format!("create Identifier for {}", owner);
    check_required("identifier", identifier, IDENTIFIER_MAX_LEN)
        .map_err(|details| SyncError::persistence(operation.clone(), details))?;

    sqlx::query(
        r#"
        INSERT INTO identifiers (co_person_id, org_identity_id, identifier, type, login, status)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(owner.person_id())
    .bind(owner.org_identity_id())
    .bind(identifier)
    .bind(identifier_type)
    .bind(login)
    .bind(STATUS_ACTIVE)
    .execute(&mut *conn)
    .await
    .map_err(db_error(operation))?;

    Ok(())
}

async fn insert_primary_name(
    conn: &mut SqliteConnection,
    owner: NameOwner,
    name: &ProfileName,
) -> Result<(), SyncError> {
    let operation = format!("create Name for {}", owner);
    validate_name(name).map_err(|details| SyncError::persistence(operation.clone(), details))?;

    sqlx::query(
        r#"
        INSERT INTO names (co_person_id, org_identity_id, given, middle, family, type, primary_name)
        VALUES (?, ?, ?, ?, ?, ?, TRUE)
        "#,
    )
    .bind(owner.person_id())
    .bind(owner.org_identity_id())
    .bind(&name.given)
    .bind(&name.middle)
    .bind(&name.family)
    .bind(NAME_TYPE_OFFICIAL)
    .execute(&mut *conn)
    .await
    .map_err(db_error(operation))?;

    Ok(())
}

async fn insert_official_email(
    conn: &mut SqliteConnection,
    person_id: i64,
    mail: &str,
) -> Result<(), SyncError> {
    let operation = format!("create EmailAddress for CoPerson {}", person_id);
    check_required("mail", mail, EMAIL_MAX_LEN)
        .map_err(|details| SyncError::persistence(operation.clone(), details))?;

    sqlx::query(
        r#"
        INSERT INTO email_addresses (co_person_id, mail, type, description, verified)
        VALUES (?, ?, ?, ?, TRUE)
        "#,
    )
    .bind(person_id)
    .bind(mail)
    .bind(EMAIL_TYPE_OFFICIAL)
    .bind(EMAIL_DESCRIPTION)
    .execute(&mut *conn)
    .await
    .map_err(db_error(operation))?;

    Ok(())
}

async fn insert_affiliate_role(
    conn: &mut SqliteConnection,
    person_id: i64,
    organization: &str,
) -> Result<(), SyncError> {
    let operation = format!("create CoPersonRole for CoPerson {}", person_id);
    let organization = normalize_organization(organization);
    check_length("o", &organization, ORGANIZATION_MAX_LEN)
        .map_err(|details| SyncError::persistence(operation.clone(), details))?;

    sqlx::query(
        r#"
        INSERT INTO co_person_roles (co_person_id, affiliation, o, status)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(person_id)
    .bind(AFFILIATION_AFFILIATE)
    .bind(&organization)
    .bind(STATUS_ACTIVE)
    .execute(&mut *conn)
    .await
    .map_err(db_error(operation))?;

    Ok(())
}

/// OrgIdentity + link + primary Name + login Identifier.
async fn insert_login_org_identity(
    conn: &mut SqliteConnection,
    co_id: i64,
    person_id: i64,
    profile: &MappedProfile,
) -> Result<i64, SyncError> {
    let result = sqlx::query("INSERT INTO org_identities (co_id) VALUES (?)")
        .bind(co_id)
        .execute(&mut *conn)
        .await
        .map_err(db_error(format!("create OrgIdentity for CoPerson {}", person_id)))?;
    let org_identity_id = result.last_insert_rowid();

    sqlx::query(
        "INSERT INTO co_org_identity_links (co_person_id, org_identity_id) VALUES (?, ?)",
    )
    .bind(person_id)
    .bind(org_identity_id)
    .execute(&mut *conn)
    .await
    .map_err(db_error(format!(
        "link OrgIdentity {} to CoPerson {}",
        org_identity_id, person_id
    )))?;

    let owner = NameOwner::OrgIdentity(org_identity_id);
    insert_primary_name(conn, owner, &profile.name).await?;
    insert_identifier(conn, owner, &profile.login_eppn(), IDENTIFIER_TYPE_EPPN, true).await?;

    Ok(org_identity_id)
}

// ============================================================================
// Row readers
// ============================================================================

async fn load_names(
    conn: &mut SqliteConnection,
    owner: NameOwner,
) -> Result<Vec<NameRecord>, SyncError> {
    let sql = format!(
        "SELECT id, given, middle, family, type, primary_name FROM names WHERE {} = ? ORDER BY id",
        owner.column()
    );
    let names = sqlx::query_as::<_, NameRecord>(&sql)
        .bind(owner.id())
        .fetch_all(&mut *conn)
        .await?;
    Ok(names)
}

async fn load_emails(
    conn: &mut SqliteConnection,
    owner: NameOwner,
) -> Result<Vec<EmailRecord>, SyncError> {
    let sql = format!(
        "SELECT id, mail, type, verified FROM email_addresses WHERE {} = ? ORDER BY id",
        owner.column()
    );
    let emails = sqlx::query_as::<_, EmailRecord>(&sql)
        .bind(owner.id())
        .fetch_all(&mut *conn)
        .await?;
    Ok(emails)
}

async fn load_identifiers(
    conn: &mut SqliteConnection,
    owner: NameOwner,
) -> Result<Vec<IdentifierRecord>, SyncError> {
    let sql = format!(
        "SELECT id, identifier, type, login, status FROM identifiers WHERE {} = ? ORDER BY id",
        owner.column()
    );
    let identifiers = sqlx::query_as::<_, IdentifierRecord>(&sql)
        .bind(owner.id())
        .fetch_all(&mut *conn)
        .await?;
    Ok(identifiers)
}

#[async_trait::async_trait]
impl PersonStore for SqlitePersonStore {
    async fn find_by_external_key(
        &self,
        external_key: &str,
    ) -> Result<Option<PersonRecord>, SyncError> {
        let mut conn = self.pool.acquire().await?;

        let person: Option<(i64, i64, String)> = sqlx::query_as(
            r#"
            SELECT p.id, p.co_id, p.status
            FROM co_people p
            JOIN identifiers i ON i.co_person_id = p.id
            WHERE i.type = ? AND i.identifier = ?
            "#,
        )
        .bind(IDENTIFIER_TYPE_ACCESS_ID)
        .bind(external_key)
        .fetch_optional(&mut *conn)
        .await?;

        let Some((id, co_id, status)) = person else {
            return Ok(None);
        };

        let owner = NameOwner::Person(id);
        let names = load_names(&mut conn, owner).await?;
        let emails = load_emails(&mut conn, owner).await?;
        let identifiers = load_identifiers(&mut conn, owner).await?;

        let roles = sqlx::query_as::<_, RoleRecord>(
            r#"
            SELECT id, affiliation, o, status
            FROM co_person_roles
            WHERE co_person_id = ?
            ORDER BY id
            "#,
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        let links: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT id, org_identity_id
            FROM co_org_identity_links
            WHERE co_person_id = ?
            ORDER BY id
            "#,
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        let mut org_identity_links = Vec::with_capacity(links.len());
        for (link_id, org_identity_id) in links {
            let org_owner = NameOwner::OrgIdentity(org_identity_id);
            org_identity_links.push(OrgIdentityLinkRecord {
                id: link_id,
                org_identity: OrgIdentityRecord {
                    id: org_identity_id,
                    names: load_names(&mut conn, org_owner).await?,
                    emails: load_emails(&mut conn, org_owner).await?,
                    identifiers: load_identifiers(&mut conn, org_owner).await?,
                },
            });
        }

        Ok(Some(PersonRecord {
            id,
            co_id,
            status,
            names,
            emails,
            roles,
            identifiers,
            org_identity_links,
        }))
    }

    async fn create_person_graph(
        &self,
        co_id: i64,
        profile: &MappedProfile,
    ) -> Result<i64, SyncError> {
        let mut tx = self.pool.begin().await?;

        let person_id = insert_person(&mut tx, co_id).await?;
        let owner = NameOwner::Person(person_id);
        insert_identifier(
            &mut tx,
            owner,
            &profile.external_key,
            IDENTIFIER_TYPE_ACCESS_ID,
            false,
        )
        .await?;
        insert_primary_name(&mut tx, owner, &profile.name).await?;
        insert_official_email(&mut tx, person_id, &profile.email).await?;
        insert_affiliate_role(&mut tx, person_id, &profile.organization).await?;
        let org_identity_id = insert_login_org_identity(&mut tx, co_id, person_id, profile).await?;

        tx.commit().await?;

        debug!(
            person_id = person_id,
            org_identity_id = org_identity_id,
            access_id = %profile.external_key,
            "Created person graph"
        );
        Ok(person_id)
    }

    async fn update_primary_name(
        &self,
        owner: NameOwner,
        name: &ProfileName,
        existing_name_id: Option<i64>,
    ) -> Result<(), SyncError> {
        let mut conn = self.pool.acquire().await?;

        let Some(name_id) = existing_name_id else {
            return insert_primary_name(&mut conn, owner, name).await;
        };

        let operation = format!("update Name {} for {}", name_id, owner);
        validate_name(name).map_err(|details| SyncError::persistence(operation.clone(), details))?;

        let sql = format!(
            r#"
            UPDATE names
            SET given = ?, middle = ?, family = ?, type = ?, primary_name = TRUE,
                modified_at = CURRENT_TIMESTAMP
            WHERE id = ? AND {} = ?
            "#,
            owner.column()
        );
        let result = sqlx::query(&sql)
            .bind(&name.given)
            .bind(&name.middle)
            .bind(&name.family)
            .bind(NAME_TYPE_OFFICIAL)
            .bind(name_id)
            .bind(owner.id())
            .execute(&mut *conn)
            .await
            .map_err(db_error(operation.clone()))?;

        if result.rows_affected() == 0 {
            return Err(SyncError::persistence(operation, "name not found"));
        }

        Ok(())
    }

    async fn add_official_email(&self, person_id: i64, mail: &str) -> Result<(), SyncError> {
        let mut conn = self.pool.acquire().await?;
        insert_official_email(&mut conn, person_id, mail).await
    }

    async fn add_affiliate_role(
        &self,
        person_id: i64,
        organization: &str,
    ) -> Result<(), SyncError> {
        let mut conn = self.pool.acquire().await?;
        insert_affiliate_role(&mut conn, person_id, organization).await
    }

    async fn create_org_identity_with_login(
        &self,
        co_id: i64,
        person_id: i64,
        profile: &MappedProfile,
    ) -> Result<i64, SyncError> {
        let mut tx = self.pool.begin().await?;
        let org_identity_id = insert_login_org_identity(&mut tx, co_id, person_id, profile).await?;
        tx.commit().await?;

        Ok(org_identity_id)
    }

    async fn ensure_identifier_type(
        &self,
        co_id: i64,
        name: &str,
        display_name: &str,
    ) -> Result<bool, SyncError> {
        let result = sqlx::query(
            r#"
            INSERT INTO co_extended_types (co_id, attribute, name, display_name, status)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (co_id, attribute, name) DO NOTHING
            "#,
        )
        .bind(co_id)
        .bind(IDENTIFIER_TYPE_ATTRIBUTE)
        .bind(name)
        .bind(display_name)
        .bind(STATUS_ACTIVE)
        .execute(&self.pool)
        .await
        .map_err(db_error(format!("create extended type {}", name)))?;

        Ok(result.rows_affected() == 1)
    }
}

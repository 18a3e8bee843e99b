// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Create-or-update decisions for a single profile.
//!
//! A profile without a registry record gets the full person graph. For an
//! existing record four independent checks run in order (primary name,
//! official email, affiliate role, login OrgIdentity), each issuing at most one
//! write. The first failing write aborts the remaining checks; writes already
//! committed stay in place.

use dbsync_client::ExternalProfile;
use tracing::{debug, info};

use crate::error::Result;
use crate::mapper::{self, MappedProfile, ProfileName, normalize_organization};
use crate::persistence::{
    AFFILIATION_AFFILIATE, EMAIL_TYPE_OFFICIAL, EmailRecord, IDENTIFIER_TYPE_EPPN, NameOwner,
    NameRecord, OrgIdentityRecord, PersonRecord, PersonStore, RoleRecord,
};

/// A single write performed while reconciling an existing person.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// The person's primary name was updated in place.
    NameUpdated,
    /// The person had no primary name and one was created.
    NameCreated,
    /// A new official email address was added.
    EmailAdded,
    /// A new affiliate role was added.
    RoleAdded,
    /// The login OrgIdentity was missing and has been created.
    OrgIdentityCreated {
        /// Id of the new OrgIdentity.
        org_identity_id: i64,
    },
    /// The login OrgIdentity's primary name was updated in place.
    OrgIdentityNameUpdated,
    /// The login OrgIdentity had no primary name and one was created.
    OrgIdentityNameCreated,
}

/// What reconciliation did with a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The catch-all account; nothing was looked up or written.
    Skipped,
    /// A new person graph was created.
    Created {
        /// Id of the new CoPerson.
        person_id: i64,
    },
    /// An existing person was brought up to date.
    Updated {
        /// Id of the CoPerson.
        person_id: i64,
        /// Writes performed, in order.
        changes: Vec<Change>,
    },
    /// An existing person already matched the profile.
    Unchanged {
        /// Id of the CoPerson.
        person_id: i64,
    },
}

impl ReconcileOutcome {
    /// Whether this outcome counts as a synchronized record.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Skipped)
    }
}

enum NameAction {
    Keep,
    Update(i64),
    Create,
}

/// The primary name among `names`.
pub fn find_primary_name(names: &[NameRecord]) -> Option<&NameRecord> {
    names.iter().find(|n| n.primary)
}

/// Whether a stored name differs from the wanted one.
///
/// An empty stored middle name counts as absent, so a middle name present on
/// only one side is a difference regardless of which side has it.
pub fn name_differs(existing: &NameRecord, wanted: &ProfileName) -> bool {
    let existing_middle = existing.middle.as_deref().filter(|m| !m.is_empty());

    existing.given != wanted.given
        || existing.family != wanted.family
        || existing_middle != wanted.middle.as_deref()
}

/// Whether `emails` contains an official address equal to `mail`.
pub fn has_official_email(emails: &[EmailRecord], mail: &str) -> bool {
    emails
        .iter()
        .any(|e| e.email_type == EMAIL_TYPE_OFFICIAL && e.mail == mail)
}

/// Whether `roles` contains an affiliate role for `organization`.
///
/// Stored organizations are normalized on write, so both the literal value
/// and its normalized form are accepted.
pub fn has_affiliate_role(roles: &[RoleRecord], organization: &str) -> bool {
    let normalized = normalize_organization(organization);
    roles.iter().any(|r| {
        r.affiliation == AFFILIATION_AFFILIATE
            && r
                .organization
                .as_deref()
                .is_some_and(|o| o == organization || o == normalized)
    })
}

/// The linked OrgIdentity carrying the login ePPN for `external_key`.
///
/// A person can collect duplicate login OrgIdentities; the earliest link
/// (lowest link id, the store's load order) is treated as canonical.
pub fn find_login_org_identity<'a>(
    person: &'a PersonRecord,
    external_key: &str,
) -> Option<&'a OrgIdentityRecord> {
    let eppn = mapper::login_eppn(external_key);
    person
        .org_identity_links
        .iter()
        .map(|link| &link.org_identity)
        .find(|org| {
            org.identifiers
                .iter()
                .any(|i| i.identifier_type == IDENTIFIER_TYPE_EPPN && i.identifier == eppn)
        })
}

fn plan_name(names: &[NameRecord], wanted: &ProfileName) -> NameAction {
    match find_primary_name(names) {
        None => NameAction::Create,
        Some(existing) if name_differs(existing, wanted) => NameAction::Update(existing.id),
        Some(_) => NameAction::Keep,
    }
}

/// Apply a planned name action. Returns `Some(true)` for an in-place update,
/// `Some(false)` for a new name and `None` when nothing was written.
async fn apply_name(
    store: &dyn PersonStore,
    owner: NameOwner,
    names: &[NameRecord],
    wanted: &ProfileName,
) -> Result<Option<bool>> {
    match plan_name(names, wanted) {
        NameAction::Keep => Ok(None),
        NameAction::Update(name_id) => {
            store.update_primary_name(owner, wanted, Some(name_id)).await?;
            Ok(Some(true))
        }
        NameAction::Create => {
            store.update_primary_name(owner, wanted, None).await?;
            Ok(Some(false))
        }
    }
}

/// Reconcile one profile against the registry.
///
/// Fails with `MissingKey` when the profile carries no ACCESS ID, or with
/// `Persistence` when a write is rejected.
pub async fn reconcile(
    store: &dyn PersonStore,
    co_id: i64,
    profile: &ExternalProfile,
) -> Result<ReconcileOutcome> {
    let mapped = mapper::map_profile(profile)?;

    if mapped.is_sentinel() {
        debug!(access_id = %mapped.external_key, "Skipping catch-all profile");
        return Ok(ReconcileOutcome::Skipped);
    }

    match store.find_by_external_key(&mapped.external_key).await? {
        None => {
            let person_id = store.create_person_graph(co_id, &mapped).await?;
            info!(
                access_id = %mapped.external_key,
                person_id = person_id,
                "Created new person"
            );
            Ok(ReconcileOutcome::Created { person_id })
        }
        Some(person) => update_existing(store, co_id, &person, &mapped).await,
    }
}

async fn update_existing(
    store: &dyn PersonStore,
    co_id: i64,
    person: &PersonRecord,
    mapped: &MappedProfile,
) -> Result<ReconcileOutcome> {
    let mut changes = Vec::new();

    match apply_name(store, NameOwner::Person(person.id), &person.names, &mapped.name).await? {
        Some(true) => changes.push(Change::NameUpdated),
        Some(false) => changes.push(Change::NameCreated),
        None => {}
    }

    if !has_official_email(&person.emails, &mapped.email) {
        store.add_official_email(person.id, &mapped.email).await?;
        changes.push(Change::EmailAdded);
    }

    if !has_affiliate_role(&person.roles, &mapped.organization) {
        store
            .add_affiliate_role(person.id, &mapped.organization)
            .await?;
        changes.push(Change::RoleAdded);
    }

    match find_login_org_identity(person, &mapped.external_key) {
        Some(org) => {
            let owner = NameOwner::OrgIdentity(org.id);
            match apply_name(store, owner, &org.names, &mapped.name).await? {
                Some(true) => changes.push(Change::OrgIdentityNameUpdated),
                Some(false) => changes.push(Change::OrgIdentityNameCreated),
                None => {}
            }
        }
        None => {
            let org_identity_id = store
                .create_org_identity_with_login(co_id, person.id, mapped)
                .await?;
            changes.push(Change::OrgIdentityCreated { org_identity_id });
        }
    }

    if changes.is_empty() {
        debug!(access_id = %mapped.external_key, person_id = person.id, "Person up to date");
        return Ok(ReconcileOutcome::Unchanged {
            person_id: person.id,
        });
    }

    info!(
        access_id = %mapped.external_key,
        person_id = person.id,
        changes = ?changes,
        "Updated existing person"
    );
    Ok(ReconcileOutcome::Updated {
        person_id: person.id,
        changes,
    })
}

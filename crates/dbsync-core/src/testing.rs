// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory mocks shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use dbsync_client::{ExternalProfile, PageEntry, PageRequest};

use crate::error::{Result, SyncError};
use crate::job::{HistoryEntry, JobHost, JobStatus};
use crate::mapper::{MappedProfile, ProfileName, normalize_organization};
use crate::persistence::{
    AFFILIATION_AFFILIATE, EMAIL_TYPE_OFFICIAL, EmailRecord, IDENTIFIER_TYPE_ACCESS_ID,
    IDENTIFIER_TYPE_EPPN, IdentifierRecord, NAME_TYPE_OFFICIAL, NameOwner, NameRecord,
    OrgIdentityLinkRecord, OrgIdentityRecord, PersonRecord, PersonStore, RoleRecord,
    STATUS_ACTIVE,
};
use crate::source::ProfileSource;

/// A fully populated profile for `key`.
pub fn profile(key: &str) -> ExternalProfile {
    ExternalProfile {
        username: Some(key.to_string()),
        first_name: Some("First".to_string()),
        middle_name: None,
        last_name: Some(key.to_string()),
        email: Some(format!("{}@example.org", key)),
        organization_name: Some("Example University".to_string()),
    }
}

/// Scripted profile source.
pub struct MockProfileSource {
    pages: Mutex<VecDeque<Result<Vec<PageEntry>>>>,
    records: Mutex<HashMap<String, ExternalProfile>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl MockProfileSource {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(VecDeque::new()),
            records: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue the response for the next `fetch_page` call. Once the queue is
    /// drained every page is empty.
    pub fn with_page(self, page: Result<Vec<ExternalProfile>>) -> Self {
        let page = page.map(|profiles| profiles.into_iter().map(Ok).collect());
        self.pages.lock().unwrap().push_back(page);
        self
    }

    /// Queue a page whose elements were decoded individually.
    pub fn with_entries(self, entries: Vec<PageEntry>) -> Self {
        self.pages.lock().unwrap().push_back(Ok(entries));
        self
    }

    /// Make a profile available to `fetch_one`. Unknown keys answer 404.
    pub fn with_record(self, profile: ExternalProfile) -> Self {
        let key = profile.username.clone().unwrap_or_default();
        self.records.lock().unwrap().insert(key, profile);
        self
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileSource for MockProfileSource {
    async fn fetch_page(&self, page: PageRequest) -> Result<Vec<PageEntry>> {
        self.requests.lock().unwrap().push(page);
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn fetch_one(&self, external_key: &str) -> Result<ExternalProfile> {
        self.records
            .lock()
            .unwrap()
            .get(external_key)
            .cloned()
            .ok_or(SyncError::UnexpectedStatus { status: 404 })
    }
}

/// Person store keeping records in a map and logging every write.
pub struct MockPersonStore {
    people: Mutex<HashMap<String, PersonRecord>>,
    writes: Mutex<Vec<String>>,
    lookups: Mutex<usize>,
    next_id: Mutex<i64>,
    identifier_types: Mutex<Vec<String>>,
    fail_create_for: Mutex<Vec<String>>,
    fail_add_role: Mutex<bool>,
    fail_bootstrap: Mutex<bool>,
}

impl MockPersonStore {
    pub fn new() -> Self {
        Self {
            people: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
            lookups: Mutex::new(0),
            next_id: Mutex::new(1),
            identifier_types: Mutex::new(Vec::new()),
            fail_create_for: Mutex::new(Vec::new()),
            fail_add_role: Mutex::new(false),
            fail_bootstrap: Mutex::new(false),
        }
    }

    pub fn person(&self, key: &str) -> Option<PersonRecord> {
        self.people.lock().unwrap().get(key).cloned()
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn lookups(&self) -> usize {
        *self.lookups.lock().unwrap()
    }

    pub fn identifier_types(&self) -> Vec<String> {
        self.identifier_types.lock().unwrap().clone()
    }

    pub fn fail_create_for(&self, key: &str) {
        self.fail_create_for.lock().unwrap().push(key.to_string());
    }

    pub fn set_fail_add_role(&self) {
        *self.fail_add_role.lock().unwrap() = true;
    }

    pub fn set_fail_bootstrap(&self) {
        *self.fail_bootstrap.lock().unwrap() = true;
    }

    pub fn drop_org_identities(&self, key: &str) {
        if let Some(person) = self.people.lock().unwrap().get_mut(key) {
            person.org_identity_links.clear();
        }
    }

    fn id(&self) -> i64 {
        let mut next = self.next_id.lock().unwrap();
        let id = *next;
        *next += 1;
        id
    }

    fn log(&self, write: String) {
        self.writes.lock().unwrap().push(write);
    }

    fn name(&self, name: &ProfileName) -> NameRecord {
        NameRecord {
            id: self.id(),
            given: name.given.clone(),
            middle: name.middle.clone(),
            family: name.family.clone(),
            name_type: NAME_TYPE_OFFICIAL.to_string(),
            primary: true,
        }
    }

    fn identifier(&self, value: String, identifier_type: &str, login: bool) -> IdentifierRecord {
        IdentifierRecord {
            id: self.id(),
            identifier: value,
            identifier_type: identifier_type.to_string(),
            login,
            status: STATUS_ACTIVE.to_string(),
        }
    }

    fn email(&self, mail: &str) -> EmailRecord {
        EmailRecord {
            id: self.id(),
            mail: mail.to_string(),
            email_type: EMAIL_TYPE_OFFICIAL.to_string(),
            verified: true,
        }
    }

    fn role(&self, organization: &str) -> RoleRecord {
        RoleRecord {
            id: self.id(),
            affiliation: AFFILIATION_AFFILIATE.to_string(),
            organization: Some(normalize_organization(organization)),
            status: STATUS_ACTIVE.to_string(),
        }
    }

    fn org_identity_link(&self, profile: &MappedProfile) -> OrgIdentityLinkRecord {
        OrgIdentityLinkRecord {
            id: self.id(),
            org_identity: OrgIdentityRecord {
                id: self.id(),
                names: vec![self.name(&profile.name)],
                emails: Vec::new(),
                identifiers: vec![self.identifier(
                    profile.login_eppn(),
                    IDENTIFIER_TYPE_EPPN,
                    true,
                )],
            },
        }
    }

    fn with_person<T>(
        &self,
        person_id: i64,
        f: impl FnOnce(&mut PersonRecord) -> T,
    ) -> Result<T> {
        let mut people = self.people.lock().unwrap();
        people
            .values_mut()
            .find(|p| p.id == person_id)
            .map(f)
            .ok_or_else(|| SyncError::persistence("find CoPerson", "no such person"))
    }
}

#[async_trait]
impl PersonStore for MockPersonStore {
    async fn find_by_external_key(&self, external_key: &str) -> Result<Option<PersonRecord>> {
        *self.lookups.lock().unwrap() += 1;
        Ok(self.person(external_key))
    }

    async fn create_person_graph(&self, co_id: i64, profile: &MappedProfile) -> Result<i64> {
        if self
            .fail_create_for
            .lock()
            .unwrap()
            .contains(&profile.external_key)
        {
            return Err(SyncError::persistence(
                "create Name for CoPerson 0",
                "given: must not be empty",
            ));
        }

        let id = self.id();
        let person = PersonRecord {
            id,
            co_id,
            status: STATUS_ACTIVE.to_string(),
            names: vec![self.name(&profile.name)],
            emails: vec![self.email(&profile.email)],
            roles: vec![self.role(&profile.organization)],
            identifiers: vec![self.identifier(
                profile.external_key.clone(),
                IDENTIFIER_TYPE_ACCESS_ID,
                false,
            )],
            org_identity_links: vec![self.org_identity_link(profile)],
        };
        self.people
            .lock()
            .unwrap()
            .insert(profile.external_key.clone(), person);
        self.log(format!("create_person_graph {}", profile.external_key));
        Ok(id)
    }

    async fn update_primary_name(
        &self,
        owner: NameOwner,
        name: &ProfileName,
        existing_name_id: Option<i64>,
    ) -> Result<()> {
        let record = self.name(name);
        let mut people = self.people.lock().unwrap();
        let names = people.values_mut().find_map(|p| match owner {
            NameOwner::Person(id) if p.id == id => Some(&mut p.names),
            NameOwner::OrgIdentity(id) => p
                .org_identity_links
                .iter_mut()
                .find(|l| l.org_identity.id == id)
                .map(|l| &mut l.org_identity.names),
            NameOwner::Person(_) => None,
        });
        let names = names.ok_or_else(|| SyncError::persistence("find name owner", "no such owner"))?;

        match existing_name_id {
            Some(name_id) => {
                let existing = names
                    .iter_mut()
                    .find(|n| n.id == name_id)
                    .ok_or_else(|| SyncError::persistence("update Name", "name not found"))?;
                *existing = NameRecord { id: name_id, ..record };
            }
            None => names.push(record),
        }
        drop(people);

        self.log(format!("update_primary_name {}", owner));
        Ok(())
    }

    async fn add_official_email(&self, person_id: i64, mail: &str) -> Result<()> {
        let email = self.email(mail);
        self.with_person(person_id, |p| p.emails.push(email))?;
        self.log(format!("add_official_email {}", person_id));
        Ok(())
    }

    async fn add_affiliate_role(&self, person_id: i64, organization: &str) -> Result<()> {
        if *self.fail_add_role.lock().unwrap() {
            return Err(SyncError::persistence(
                format!("create CoPersonRole for CoPerson {}", person_id),
                "o: must be at most 256 characters long",
            ));
        }
        let role = self.role(organization);
        self.with_person(person_id, |p| p.roles.push(role))?;
        self.log(format!("add_affiliate_role {}", person_id));
        Ok(())
    }

    async fn create_org_identity_with_login(
        &self,
        _co_id: i64,
        person_id: i64,
        profile: &MappedProfile,
    ) -> Result<i64> {
        let link = self.org_identity_link(profile);
        let org_identity_id = link.org_identity.id;
        self.with_person(person_id, |p| p.org_identity_links.push(link))?;
        self.log(format!("create_org_identity_with_login {}", person_id));
        Ok(org_identity_id)
    }

    async fn ensure_identifier_type(
        &self,
        _co_id: i64,
        name: &str,
        _display_name: &str,
    ) -> Result<bool> {
        if *self.fail_bootstrap.lock().unwrap() {
            return Err(SyncError::persistence("create extended type", "database is locked"));
        }
        let mut types = self.identifier_types.lock().unwrap();
        if types.iter().any(|t| t == name) {
            return Ok(false);
        }
        types.push(name.to_string());
        Ok(true)
    }
}

/// Job host recording everything in memory.
pub struct MockJobHost {
    history: Mutex<Vec<HistoryEntry>>,
    finished: Mutex<Option<(String, JobStatus)>>,
    polls: Mutex<usize>,
    cancel_after: Mutex<Option<usize>>,
    fail_finish: Mutex<bool>,
}

impl MockJobHost {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(Vec::new()),
            finished: Mutex::new(None),
            polls: Mutex::new(0),
            cancel_after: Mutex::new(None),
            fail_finish: Mutex::new(false),
        }
    }

    pub fn set_fail_finish(&self) {
        *self.fail_finish.lock().unwrap() = true;
    }

    /// Report cancellation once `polls` checks have answered `false`.
    pub fn cancel_after_polls(&self, polls: usize) {
        *self.cancel_after.lock().unwrap() = Some(polls);
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().unwrap().clone()
    }

    pub fn finished(&self) -> Option<(String, JobStatus)> {
        self.finished.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobHost for MockJobHost {
    async fn is_canceled(&self) -> Result<bool> {
        let mut polls = self.polls.lock().unwrap();
        let canceled = self
            .cancel_after
            .lock()
            .unwrap()
            .is_some_and(|after| *polls >= after);
        *polls += 1;
        Ok(canceled)
    }

    async fn record_history(&self, entry: HistoryEntry) -> Result<()> {
        self.history.lock().unwrap().push(entry);
        Ok(())
    }

    async fn finish(&self, summary: &str, status: JobStatus) -> Result<()> {
        if *self.fail_finish.lock().unwrap() {
            return Err(SyncError::Persistence {
                operation: "finish job".to_string(),
                details: "database is locked".to_string(),
            });
        }
        *self.finished.lock().unwrap() = Some((summary.to_string(), status));
        Ok(())
    }
}

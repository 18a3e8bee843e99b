// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mapping of User Database profiles onto registry fields.
//!
//! Everything here is pure. Absent values fall back to [`PLACEHOLDER`] so that
//! the registry's required fields are always populated.

use dbsync_client::ExternalProfile;

use crate::error::{Result, SyncError};

/// Value stored when the profile leaves a required field empty.
pub const PLACEHOLDER: &str = "placeholder";

/// ACCESS ID of the User Database's catch-all account. Never synchronized.
pub const UNKNOWN_USER: &str = "unknown-user";

/// Scope appended to the ACCESS ID to form the login ePPN.
pub const EPPN_SCOPE: &str = "access-ci.org";

/// Name derived from a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileName {
    /// Given name.
    pub given: String,
    /// Family name.
    pub family: String,
    /// Middle name, only when the profile supplies a non-empty one.
    pub middle: Option<String>,
}

/// The canonical fields reconciliation works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedProfile {
    /// ACCESS ID.
    pub external_key: String,
    /// Official name.
    pub name: ProfileName,
    /// Official email address.
    pub email: String,
    /// Organization, as supplied (not normalized).
    pub organization: String,
}

impl MappedProfile {
    /// Login ePPN for this profile, `<key>@access-ci.org`.
    pub fn login_eppn(&self) -> String {
        login_eppn(&self.external_key)
    }

    /// Whether this profile is the catch-all account that must be skipped.
    pub fn is_sentinel(&self) -> bool {
        self.external_key == UNKNOWN_USER
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

/// ACCESS ID of the profile, or [`SyncError::MissingKey`].
pub fn external_key(profile: &ExternalProfile) -> Result<String> {
    non_empty(profile.username.as_ref())
        .map(str::to_string)
        .ok_or(SyncError::MissingKey)
}

/// Name of the profile with placeholders for missing given/family values.
pub fn derive_name(profile: &ExternalProfile) -> ProfileName {
    ProfileName {
        given: non_empty(profile.first_name.as_ref())
            .unwrap_or(PLACEHOLDER)
            .to_string(),
        family: non_empty(profile.last_name.as_ref())
            .unwrap_or(PLACEHOLDER)
            .to_string(),
        middle: non_empty(profile.middle_name.as_ref()).map(str::to_string),
    }
}

/// Email of the profile, or the placeholder.
pub fn derive_email(profile: &ExternalProfile) -> String {
    non_empty(profile.email.as_ref())
        .unwrap_or(PLACEHOLDER)
        .to_string()
}

/// Organization of the profile, or the placeholder.
pub fn derive_organization(profile: &ExternalProfile) -> String {
    non_empty(profile.organization_name.as_ref())
        .unwrap_or(PLACEHOLDER)
        .to_string()
}

/// Map a profile onto its canonical fields.
pub fn map_profile(profile: &ExternalProfile) -> Result<MappedProfile> {
    Ok(MappedProfile {
        external_key: external_key(profile)?,
        name: derive_name(profile),
        email: derive_email(profile),
        organization: derive_organization(profile),
    })
}

/// Login ePPN for an ACCESS ID.
pub fn login_eppn(external_key: &str) -> String {
    format!("{}@{}", external_key, EPPN_SCOPE)
}

/// Normalize an organization the way the registry does on write.
///
/// Surrounding whitespace is trimmed. A value written entirely in lower or
/// upper case is converted to title case word by word; mixed-case values are
/// kept as they are.
pub fn normalize_organization(value: &str) -> String {
    let trimmed = value.trim();
    let has_lower = trimmed.chars().any(char::is_lowercase);
    let has_upper = trimmed.chars().any(char::is_uppercase);

    if has_lower && has_upper {
        return trimmed.to_string();
    }

    trimmed
        .split(' ')
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

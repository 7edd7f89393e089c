//! Creator point ledgers and the reconciliation built on top of them.
//!
//! Two databases carry point ledgers with different shapes:
//! Korea keeps `point_transactions` (withdrawals included as negative rows),
//! Biz keeps `creator_points` for Japan/US creators (withdrawals tracked
//! separately in `creator_withdrawal_requests`).

pub mod audit;
pub mod bonus;
pub mod history;
pub mod unpaid;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::user_profiles;

pub const UNKNOWN_CREATOR: &str = "알 수 없음";

/// Which ledger a row was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SourceDb {
    Korea,
    Biz,
}

impl SourceDb {
    pub fn label(&self) -> &'static str {
        match self {
            SourceDb::Korea => "한국",
            SourceDb::Biz => "BIZ",
        }
    }
}

/// Distinct non-null ids in first-seen order.
pub(crate) fn unique_ids<I>(ids: I) -> Vec<Uuid>
where
    I: IntoIterator<Item = Option<Uuid>>,
{
    let mut seen = HashSet::new();
    ids.into_iter()
        .flatten()
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Profiles indexed by both `id` and `user_id`, since ledger rows use either.
#[derive(Debug, Default, Clone)]
pub struct ProfileIndex {
    by_key: HashMap<Uuid, user_profiles::Model>,
}

impl ProfileIndex {
    pub fn build(profiles: impl IntoIterator<Item = user_profiles::Model>) -> Self {
        let mut by_key = HashMap::new();
        for profile in profiles {
            if let Some(user_id) = profile.user_id {
                by_key.insert(user_id, profile.clone());
            }
            by_key.insert(profile.id, profile);
        }
        Self { by_key }
    }

    pub fn get(&self, key: &Uuid) -> Option<&user_profiles::Model> {
        self.by_key.get(key)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// `1234567` -> `1,234,567`
pub fn group_digits(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Case-insensitive substring match over optional fields.
pub(crate) fn matches_search<'a>(needle: &str, fields: impl IntoIterator<Item = Option<&'a str>>) -> bool {
    let needle = needle.to_lowercase();
    fields
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: Uuid, user_id: Option<Uuid>, name: &str) -> user_profiles::Model {
        user_profiles::Model {
            id,
            user_id,
            name: Some(name.to_string()),
            channel_name: None,
            email: None,
            phone: None,
            points: None,
        }
    }

    #[test]
    fn unique_ids_skips_nulls_and_repeats() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(unique_ids([Some(a), None, Some(b), Some(a)]), vec![a, b]);
    }

    #[test]
    fn profile_index_resolves_both_keys() {
        let id = Uuid::new_v4();
        let auth_id = Uuid::new_v4();
        let index = ProfileIndex::build([profile(id, Some(auth_id), "민지")]);

        assert_eq!(index.get(&id).and_then(|p| p.name.as_deref()), Some("민지"));
        assert_eq!(index.get(&auth_id).and_then(|p| p.name.as_deref()), Some("민지"));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn groups_thousands() {
        assert_eq!(group_digits(0), "0");
        assert_eq!(group_digits(950), "950");
        assert_eq!(group_digits(1_000), "1,000");
        assert_eq!(group_digits(-1_234_567), "-1,234,567");
    }

    #[test]
    fn search_is_case_insensitive() {
        assert!(matches_search("BEAUTY", [Some("daily beauty log"), None]));
        assert!(!matches_search("food", [Some("daily beauty log"), None]));
    }
}

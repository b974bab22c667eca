//! The path scheme: pure functions from record coordinates to tree paths.
//!
//! Every structure the engine maintains lives in one of these namespaces:
//!
//! ```text
//! data/{type}/{key}[/{field}]
//! owners/{type}/{key}/{uid}
//! userOwnedLists/{uid}/{type}/{key}
//! publicLists/{type}/{key}
//! connectionGraph/{type}/{key}/{connectionType}/{connectionKey}
//! usernames/{username}   admins/{uid}   users/{uid}
//! unverifiedUsers/{uid}  tracking/{key}
//! ```
//!
//! Segment rules: non-empty, no `/ . # $ [ ]`, no ASCII control characters.

use crate::error::{TypeError, TypeResult};
use crate::ids::{DataKey, DataType, Uid};

pub const DATA: &str = "data";
pub const OWNERS: &str = "owners";
pub const USER_OWNED_LISTS: &str = "userOwnedLists";
pub const PUBLIC_LISTS: &str = "publicLists";
pub const CONNECTION_GRAPH: &str = "connectionGraph";
pub const USERNAMES: &str = "usernames";
pub const ADMINS: &str = "admins";
pub const USERS: &str = "users";
pub const UNVERIFIED_USERS: &str = "unverifiedUsers";
pub const TRACKING: &str = "tracking";

/// Delimiter for composite database keys.
pub const DB_DELIMITER: &str = "||";

/// Characters the tree store refuses inside a single segment.
const FORBIDDEN_CHARS: &[char] = &['/', '.', '#', '$', '[', ']'];

/// Validate one path segment, returning `Ok(())` if it is storable.
///
/// ```
/// use soil_types::paths::validate_segment;
///
/// assert!(validate_segment("widget", "data type").is_ok());
/// assert!(validate_segment("", "data key").is_err());
/// assert!(validate_segment("a/b", "data key").is_err());
/// ```
pub fn validate_segment(segment: &str, kind: &'static str) -> TypeResult<()> {
    let invalid = |reason: String| TypeError::InvalidSegment {
        kind,
        segment: segment.to_string(),
        reason,
    };

    if segment.is_empty() {
        return Err(invalid("must not be empty".into()));
    }
    if let Some(ch) = segment.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(invalid(format!("contains forbidden character: {ch:?}")));
    }
    if segment.chars().any(|c| c.is_ascii_control()) {
        return Err(invalid("contains a control character".into()));
    }
    Ok(())
}

/// Validate a field path below a record: one or more storable segments
/// joined by single slashes, with no leading or trailing slash.
pub fn validate_field(field: &str) -> TypeResult<()> {
    for segment in field.split('/') {
        validate_segment(segment, "field")?;
    }
    Ok(())
}

/// Returns `true` for the tree root (`""` or `"/"`, with any slashes).
pub fn is_root(path: &str) -> bool {
    path.trim_matches('/').is_empty()
}

/// Strip leading and trailing slashes.
pub fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

/// Split a path into its non-empty segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Join segments with `/`.
pub fn join<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for part in parts {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(part.as_ref());
    }
    out
}

// ---------------------------------------------------------------------------
// data
// ---------------------------------------------------------------------------

pub fn data_type(t: &DataType) -> String {
    join([DATA, t.as_str()])
}

pub fn data_key(t: &DataType, k: &DataKey) -> String {
    join([DATA, t.as_str(), k.as_str()])
}

/// Field path under a record. `field` may itself be a nested `a/b` path.
pub fn data_field(t: &DataType, k: &DataKey, field: &str) -> String {
    join([DATA, t.as_str(), k.as_str(), field])
}

// ---------------------------------------------------------------------------
// ownership
// ---------------------------------------------------------------------------

pub fn owners_type(t: &DataType) -> String {
    join([OWNERS, t.as_str()])
}

pub fn owners_key(t: &DataType, k: &DataKey) -> String {
    join([OWNERS, t.as_str(), k.as_str()])
}

pub fn owner(t: &DataType, k: &DataKey, uid: &Uid) -> String {
    join([OWNERS, t.as_str(), k.as_str(), uid.as_str()])
}

pub fn user_lists(uid: &Uid) -> String {
    join([USER_OWNED_LISTS, uid.as_str()])
}

pub fn user_type_list(uid: &Uid, t: &DataType) -> String {
    join([USER_OWNED_LISTS, uid.as_str(), t.as_str()])
}

pub fn user_list_entry(uid: &Uid, t: &DataType, k: &DataKey) -> String {
    join([USER_OWNED_LISTS, uid.as_str(), t.as_str(), k.as_str()])
}

// ---------------------------------------------------------------------------
// public listing
// ---------------------------------------------------------------------------

pub fn public_type_list(t: &DataType) -> String {
    join([PUBLIC_LISTS, t.as_str()])
}

pub fn public_entry(t: &DataType, k: &DataKey) -> String {
    join([PUBLIC_LISTS, t.as_str(), k.as_str()])
}

// ---------------------------------------------------------------------------
// connection graph
// ---------------------------------------------------------------------------

pub fn connection_type(t: &DataType) -> String {
    join([CONNECTION_GRAPH, t.as_str()])
}

pub fn connection_key(t: &DataType, k: &DataKey) -> String {
    join([CONNECTION_GRAPH, t.as_str(), k.as_str()])
}

pub fn connection_list(t: &DataType, k: &DataKey, ct: &DataType) -> String {
    join([CONNECTION_GRAPH, t.as_str(), k.as_str(), ct.as_str()])
}

pub fn connection_entry(t: &DataType, k: &DataKey, ct: &DataType, ck: &DataKey) -> String {
    join([
        CONNECTION_GRAPH,
        t.as_str(),
        k.as_str(),
        ct.as_str(),
        ck.as_str(),
    ])
}

// ---------------------------------------------------------------------------
// flat namespaces
// ---------------------------------------------------------------------------

pub fn username(name: &str) -> String {
    join([USERNAMES, name])
}

pub fn admin(uid: &Uid) -> String {
    join([ADMINS, uid.as_str()])
}

pub fn user(uid: &Uid) -> String {
    join([USERS, uid.as_str()])
}

pub fn unverified_user(uid: &Uid) -> String {
    join([UNVERIFIED_USERS, uid.as_str()])
}

pub fn tracking() -> String {
    TRACKING.to_string()
}

pub fn tracking_entry(key: &str) -> String {
    join([TRACKING, key])
}

/// Locator of the out-of-tree blob that backs a file record.
pub fn blob_locator(file_type: &DataType, uid: &Uid, k: &DataKey) -> String {
    join([file_type.as_str(), uid.as_str(), k.as_str()])
}

/// Returns `true` if `path` lives under the admin-flag namespace.
pub fn is_admin_path(path: &str) -> bool {
    segments(path).next() == Some(ADMINS)
}

// ---------------------------------------------------------------------------
// composite keys
// ---------------------------------------------------------------------------

/// Join several keys into one composite key.
pub fn generate_db_key<S: AsRef<str>>(keys: &[S]) -> String {
    keys.iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(DB_DELIMITER)
}

/// Like [`generate_db_key`] but order-independent: `(a, b)` and `(b, a)`
/// produce the same key.
pub fn generate_sorted_db_key<S: AsRef<str>>(keys: &[S]) -> String {
    let mut sorted: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    sorted.join(DB_DELIMITER)
}

pub fn parse_db_key(key: &str) -> Vec<&str> {
    key.split(DB_DELIMITER).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> DataType {
        DataType::new(s).unwrap()
    }

    fn k(s: &str) -> DataKey {
        DataKey::new(s).unwrap()
    }

    fn u(s: &str) -> Uid {
        Uid::new(s).unwrap()
    }

    #[test]
    fn record_paths() {
        assert_eq!(data_type(&t("widget")), "data/widget");
        assert_eq!(data_key(&t("widget"), &k("w1")), "data/widget/w1");
        assert_eq!(
            data_field(&t("widget"), &k("w1"), "ownershipAccess/read"),
            "data/widget/w1/ownershipAccess/read"
        );
    }

    #[test]
    fn index_paths() {
        assert_eq!(owner(&t("widget"), &k("w1"), &u("u1")), "owners/widget/w1/u1");
        assert_eq!(
            user_list_entry(&u("u1"), &t("widget"), &k("w1")),
            "userOwnedLists/u1/widget/w1"
        );
        assert_eq!(public_entry(&t("widget"), &k("w1")), "publicLists/widget/w1");
        assert_eq!(
            connection_entry(&t("widget"), &k("w1"), &t("tag"), &k("t1")),
            "connectionGraph/widget/w1/tag/t1"
        );
    }

    #[test]
    fn segment_validation() {
        assert!(validate_segment("w1", "data key").is_ok());
        assert!(validate_segment("user@example", "data key").is_ok());

        for bad in ["", "a/b", "a.b", "a#b", "a$b", "a[b", "a]b", "a\nb"] {
            assert!(validate_segment(bad, "data key").is_err(), "{bad:?}");
        }
    }

    #[test]
    fn field_paths_may_nest_but_not_escape() {
        assert!(validate_field("title").is_ok());
        assert!(validate_field("settings/theme").is_ok());

        for bad in ["", "/createdAt", "title/", "a//b", "a.b", "a/b$"] {
            assert!(validate_field(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn root_detection() {
        assert!(is_root(""));
        assert!(is_root("/"));
        assert!(is_root("//"));
        assert!(!is_root("data"));
        assert_eq!(normalize("/data/widget/"), "data/widget");
    }

    #[test]
    fn admin_path_detection() {
        assert!(is_admin_path("admins/u1"));
        assert!(is_admin_path("/admins"));
        assert!(!is_admin_path("data/admins/u1"));
    }

    #[test]
    fn composite_keys() {
        assert_eq!(generate_db_key(&["a", "b", "c"]), "a||b||c");
        assert_eq!(parse_db_key("a||b||c"), vec!["a", "b", "c"]);
        assert_eq!(
            generate_sorted_db_key(&["u2", "u1"]),
            generate_sorted_db_key(&["u1", "u2"])
        );
    }

    // ---- composite key properties ----

    mod props {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_inverts_generate(keys in proptest::collection::vec("[a-z0-9]{1,8}", 1..5)) {
                let key = generate_db_key(&keys);
                let parsed: Vec<String> = parse_db_key(&key).into_iter().map(String::from).collect();
                prop_assert_eq!(parsed, keys);
            }

            #[test]
            fn sorted_key_ignores_order(mut keys in proptest::collection::vec("[a-z0-9]{1,8}", 1..5)) {
                let forward = generate_sorted_db_key(&keys);
                keys.reverse();
                prop_assert_eq!(forward, generate_sorted_db_key(&keys));
            }
        }
    }
}

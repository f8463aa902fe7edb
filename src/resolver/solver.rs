// src/resolver/solver.rs

//! Dependency solver.
//!
//! Checks every `requires` carried by a header being added against the set
//! of capabilities available once the transaction applies: the record
//! store's installed provides, plus whatever the other added headers
//! provide, minus whatever the erased troves used to provide. An
//! unsatisfied require becomes a `Requires` problem against that header.

use crate::db::models::ProvideEntry;
use crate::error::Result;
use crate::header::{Header, TagValue, WellKnownTag};
use crate::problem::{Problem, ProblemKind};
use crate::version::SenseFlags;
use rusqlite::Connection;

/// One `requires` or `provides` entry read off a header: a capability name
/// paired with an optional sense/version constraint.
#[derive(Debug, Clone)]
pub struct Capability {
    pub name: String,
    pub sense: SenseFlags,
    pub version: String,
}

fn string_array(header: &Header, tag: WellKnownTag) -> Vec<String> {
    match header.get(tag.id()) {
        Some(TagValue::StringArray(v)) => v.clone(),
        Some(TagValue::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn int32_array(header: &Header, tag: WellKnownTag) -> Vec<i32> {
    match header.get(tag.id()) {
        Some(TagValue::Int32(v)) => v.clone(),
        _ => Vec::new(),
    }
}

/// Read the `RequireName`/`RequireVersion`/`RequireFlags` tags off `header`,
/// zipped by index. A header with fewer version/flags entries than names
/// treats the missing ones as "any version".
pub fn requires_of(header: &Header) -> Vec<Capability> {
    zip_capabilities(
        string_array(header, WellKnownTag::RequireName),
        string_array(header, WellKnownTag::RequireVersion),
        int32_array(header, WellKnownTag::RequireFlags),
    )
}

/// Read the `ProvideName`/`ProvideVersion`/`ProvideFlags` tags off `header`.
pub fn provides_of(header: &Header) -> Vec<Capability> {
    zip_capabilities(
        string_array(header, WellKnownTag::ProvideName),
        string_array(header, WellKnownTag::ProvideVersion),
        int32_array(header, WellKnownTag::ProvideFlags),
    )
}

fn zip_capabilities(names: Vec<String>, versions: Vec<String>, flags: Vec<i32>) -> Vec<Capability> {
    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let version = versions.get(i).cloned().unwrap_or_default();
            let sense = SenseFlags(flags.get(i).copied().unwrap_or(0) as u32);
            Capability {
                name,
                sense,
                version,
            }
        })
        .collect()
}

fn capability_satisfied_by(require: &Capability, provide: &Capability) -> Result<bool> {
    if require.name != provide.name {
        return Ok(false);
    }
    let constraint = require.sense.to_constraint(&require.version)?;
    if provide.version.is_empty() {
        return Ok(matches!(constraint, crate::version::VersionConstraint::Any));
    }
    let provided = crate::version::RpmVersion::parse(&provide.version)?;
    Ok(constraint.satisfies(&provided))
}

fn nevr(header: &Header) -> String {
    let name = match header.get(WellKnownTag::Name.id()) {
        Some(TagValue::String(s)) => s.clone(),
        _ => "(unknown)".to_string(),
    };
    let version = match header.get(WellKnownTag::Version.id()) {
        Some(TagValue::String(s)) => s.clone(),
        _ => String::new(),
    };
    let release = match header.get(WellKnownTag::Release.id()) {
        Some(TagValue::String(s)) => s.clone(),
        _ => String::new(),
    };
    if version.is_empty() {
        name
    } else if release.is_empty() {
        format!("{}-{}", name, version)
    } else {
        format!("{}-{}-{}", name, version, release)
    }
}

/// Check every `added` header's requires against (installed ∪ added) \
/// erased. `erased_trove_ids` are record-store rows whose provides must be
/// treated as gone even though the row has not been deleted yet.
pub fn check_requires(
    conn: &Connection,
    added: &[Header],
    erased_trove_ids: &[i64],
) -> Result<Vec<Problem>> {
    let added_provides: Vec<Vec<Capability>> = added.iter().map(provides_of).collect();
    let mut problems = Vec::new();

    for header in added {
        for require in requires_of(header) {
            if satisfied_within_added(&require, &added_provides)? {
                continue;
            }
            if satisfied_in_record_store(conn, &require, erased_trove_ids)? {
                continue;
            }
            problems.push(
                Problem::new(ProblemKind::Requires, nevr(header))
                    .with_str(require.name.clone())
                    .with_alternate(if require.version.is_empty() {
                        require.name.clone()
                    } else {
                        format!("{} {}", require.name, require.version)
                    }),
            );
        }
    }

    Ok(problems)
}

fn satisfied_within_added(require: &Capability, added_provides: &[Vec<Capability>]) -> Result<bool> {
    for provides in added_provides {
        for provide in provides {
            if capability_satisfied_by(require, provide)? {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn satisfied_in_record_store(
    conn: &Connection,
    require: &Capability,
    erased_trove_ids: &[i64],
) -> Result<bool> {
    for entry in ProvideEntry::find_all_by_capability(conn, &require.name)? {
        if erased_trove_ids.contains(&entry.trove_id) {
            continue;
        }
        let provide = Capability {
            name: entry.capability.clone(),
            sense: SenseFlags(SenseFlags::EQUAL),
            version: entry.version.clone().unwrap_or_default(),
        };
        if capability_satisfied_by(require, &provide)? {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use crate::header::TagId;
    use tempfile::NamedTempFile;

    fn test_conn() -> (NamedTempFile, Connection) {
        let temp = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        schema::migrate(&conn).unwrap();
        (temp, conn)
    }

    fn header_with(name: &str, version: &str, release: &str) -> Header {
        let mut h = Header::new();
        h.put(WellKnownTag::Name.id(), TagValue::String(name.to_string())).unwrap();
        h.put(WellKnownTag::Version.id(), TagValue::String(version.to_string())).unwrap();
        h.put(WellKnownTag::Release.id(), TagValue::String(release.to_string())).unwrap();
        h
    }

    fn add_require(h: &mut Header, name: &str, sense: u32, version: &str) {
        push_tag(h, WellKnownTag::RequireName, name.to_string());
        push_str_tag(h, WellKnownTag::RequireVersion, version.to_string());
        push_int_tag(h, WellKnownTag::RequireFlags, sense as i32);
    }

    fn add_provide(h: &mut Header, name: &str, sense: u32, version: &str) {
        push_tag(h, WellKnownTag::ProvideName, name.to_string());
        push_str_tag(h, WellKnownTag::ProvideVersion, version.to_string());
        push_int_tag(h, WellKnownTag::ProvideFlags, sense as i32);
    }

    fn push_tag(h: &mut Header, tag: WellKnownTag, value: String) {
        let id: TagId = tag.id();
        let mut current = match h.del(id) {
            Some(TagValue::StringArray(v)) => v,
            _ => Vec::new(),
        };
        current.push(value);
        h.put(id, TagValue::StringArray(current)).unwrap();
    }

    fn push_str_tag(h: &mut Header, tag: WellKnownTag, value: String) {
        push_tag(h, tag, value);
    }

    fn push_int_tag(h: &mut Header, tag: WellKnownTag, value: i32) {
        let id: TagId = tag.id();
        let mut current = match h.del(id) {
            Some(TagValue::Int32(v)) => v,
            _ => Vec::new(),
        };
        current.push(value);
        h.put(id, TagValue::Int32(current)).unwrap();
    }

    #[test]
    fn unsatisfied_require_against_empty_store_is_a_problem() {
        let (_temp, conn) = test_conn();
        let mut h = header_with("app", "1.0", "1");
        add_require(&mut h, "libfoo.so.1", 0, "");

        let problems = check_requires(&conn, &[h], &[]).unwrap();
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].kind, ProblemKind::Requires);
        assert_eq!(problems[0].primary_nevr, "app-1.0-1");
    }

    #[test]
    fn require_satisfied_by_another_added_header() {
        let mut consumer = header_with("app", "1.0", "1");
        add_require(&mut consumer, "libfoo.so.1", 0, "");

        let mut provider = header_with("libfoo", "1.0", "1");
        add_provide(&mut provider, "libfoo.so.1", 0, "");

        let (_temp, conn) = test_conn();
        let problems = check_requires(&conn, &[consumer, provider], &[]).unwrap();
        assert!(problems.is_empty());
    }

    #[test]
    fn require_satisfied_by_installed_provide() {
        let (_temp, conn) = test_conn();
        conn.execute(
            "INSERT INTO troves (name, version, type) VALUES ('libfoo', '1.0', 'package')",
            [],
        )
        .unwrap();
        let trove_id = conn.last_insert_rowid();
        let mut entry = ProvideEntry::new(trove_id, "libfoo.so.1".to_string(), Some("1.0".to_string()));
        entry.insert(&conn).unwrap();

        let mut consumer = header_with("app", "1.0", "1");
        add_require(&mut consumer, "libfoo.so.1", SenseFlags::GREATER | SenseFlags::EQUAL, "0.9");

        let problems = check_requires(&conn, &[consumer], &[]).unwrap();
        assert!(problems.is_empty());
    }

    #[test]
    fn erased_trove_no_longer_counts_as_a_provider() {
        let (_temp, conn) = test_conn();
        conn.execute(
            "INSERT INTO troves (name, version, type) VALUES ('libfoo', '1.0', 'package')",
            [],
        )
        .unwrap();
        let trove_id = conn.last_insert_rowid();
        let mut entry = ProvideEntry::new(trove_id, "libfoo.so.1".to_string(), Some("1.0".to_string()));
        entry.insert(&conn).unwrap();

        let mut consumer = header_with("app", "1.0", "1");
        add_require(&mut consumer, "libfoo.so.1", 0, "");

        let problems = check_requires(&conn, &[consumer], &[trove_id]).unwrap();
        assert_eq!(problems.len(), 1);
    }
}

// src/transaction/engine.rs

//! Transaction-set façade: the element-by-element front end the rest of the
//! crate drives (`add_install`/`add_erase`/`check`/`order`/`run`) rather than
//! the journal/CAS machinery in `transaction::mod`, which this wraps for the
//! actual filesystem and record-store work once a set has been ordered.

use crate::db::models::{InstallReason, InstallSource, ProvideEntry, Trove, TroveType};
use crate::error::{Error, Result};
use crate::filesystem::FileDeployer;
use crate::fsm::{FileAction, Fsm, FsmConfig, FsmFileEntry};
use crate::header::{Header, TagValue, WellKnownTag};
use crate::problem::{apply_filter, Problem, ProblemFilter};
use crate::resolver::orderer::{order_elements, ElementEdge, ElementKind, TransactionElement};
use crate::resolver::solver;
use rusqlite::Connection;

/// `add_install` return codes, matching the original engine's 0/1/2 triad:
/// added cleanly, header was empty, or the package is already present and
/// this isn't an upgrade.
pub const ADD_OK: i32 = 0;
pub const ADD_NO_HEADER: i32 = 1;
pub const ADD_ALREADY_INSTALLED: i32 = 2;

/// A package queued for install, alongside the opaque retrieval key the
/// caller associated with it and whether it replaces an existing version.
pub struct AddedElement {
    pub header: Header,
    pub key: Option<String>,
    pub is_upgrade: bool,
}

/// A package queued for erasure, identified by its record-store row.
pub struct ErasedElement {
    pub header: Header,
    pub trove_id: i64,
}

fn header_name(header: &Header) -> Option<String> {
    match header.get(WellKnownTag::Name.id()) {
        Some(TagValue::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn header_string(header: &Header, tag: WellKnownTag) -> Option<String> {
    match header.get(tag.id()) {
        Some(TagValue::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn nevr(header: &Header) -> String {
    let name = header_name(header).unwrap_or_else(|| "(unknown)".to_string());
    let version = header_string(header, WellKnownTag::Version).unwrap_or_default();
    let release = header_string(header, WellKnownTag::Release).unwrap_or_default();
    match (version.is_empty(), release.is_empty()) {
        (true, _) => name,
        (false, true) => format!("{}-{}", name, version),
        (false, false) => format!("{}-{}-{}", name, version, release),
    }
}

/// Build the per-file FSM entries for a header's file manifest from its
/// `BaseNames`/`DirNames`/`DirIndexes`/`FileModes`/`FileDigests`/
/// `FileLinkTos` tags. Content must already live in the CAS under the
/// digests this header carries; this only drives deployment, not staging.
fn files_of(header: &Header, action: FileAction) -> Vec<FsmFileEntry> {
    let base_names = match header.get(WellKnownTag::BaseNames.id()) {
        Some(TagValue::StringArray(v)) => v.clone(),
        _ => return Vec::new(),
    };
    let dir_names = match header.get(WellKnownTag::DirNames.id()) {
        Some(TagValue::StringArray(v)) => v.clone(),
        _ => Vec::new(),
    };
    let dir_indexes = match header.get(WellKnownTag::DirIndexes.id()) {
        Some(TagValue::Int32(v)) => v.clone(),
        _ => Vec::new(),
    };
    let modes = match header.get(WellKnownTag::FileModes.id()) {
        Some(TagValue::Int32(v)) => v.clone(),
        _ => Vec::new(),
    };
    let digests = match header.get(WellKnownTag::FileDigests.id()) {
        Some(TagValue::StringArray(v)) => v.clone(),
        _ => Vec::new(),
    };
    let link_tos = match header.get(WellKnownTag::FileLinkTos.id()) {
        Some(TagValue::StringArray(v)) => v.clone(),
        _ => Vec::new(),
    };

    base_names
        .iter()
        .enumerate()
        .map(|(i, base)| {
            let dir_index = dir_indexes.get(i).copied().unwrap_or(0) as usize;
            let dir = dir_names.get(dir_index).cloned().unwrap_or_default();
            let path = std::path::PathBuf::from(format!("{}{}", dir, base));
            let symlink_target = link_tos.get(i).filter(|s| !s.is_empty()).cloned();
            let hash = digests.get(i).filter(|s| !s.is_empty()).cloned();
            FsmFileEntry {
                path,
                action,
                mode: modes.get(i).copied().unwrap_or(0o644) as u32,
                hash,
                symlink_target,
                security_context: None,
                device: 0,
                inode: 0,
                nlink: 1,
            }
        })
        .collect()
}

/// Front end driving a set of package operations: install/erase headers are
/// queued, checked against the record store's requires, ordered into an
/// install/erase sequence, and run against the filesystem and database in
/// that order.
#[derive(Default)]
pub struct TransactionEngine {
    added: Vec<AddedElement>,
    erased: Vec<ErasedElement>,
    problems: Vec<Problem>,
    order: Vec<TransactionElement>,
}

enum Queued<'a> {
    Add(&'a AddedElement),
    Erase(&'a ErasedElement),
}

impl TransactionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a header for install. Returns 0 on success, 1 if the header is
    /// empty, 2 if the package is already installed and this is not an
    /// upgrade.
    pub fn add_install(
        &mut self,
        conn: &Connection,
        header: Header,
        key: Option<String>,
        is_upgrade: bool,
    ) -> Result<i32> {
        if header.is_empty() {
            return Ok(ADD_NO_HEADER);
        }
        if !is_upgrade {
            if let Some(name) = header_name(&header) {
                let version = header_string(&header, WellKnownTag::Version).unwrap_or_default();
                if !Trove::find_by_name(conn, &name)?
                    .into_iter()
                    .filter(|t| t.version == version)
                    .collect::<Vec<_>>()
                    .is_empty()
                {
                    return Ok(ADD_ALREADY_INSTALLED);
                }
            }
        }
        self.added.push(AddedElement {
            header,
            key,
            is_upgrade,
        });
        Ok(ADD_OK)
    }

    /// Queue a record-store row for erasure.
    pub fn add_erase(&mut self, header: Header, trove_id: i64) {
        self.erased.push(ErasedElement { header, trove_id });
    }

    /// Run the dependency solver over the queued set, appending any
    /// `Requires` problems found. Returns the number of unignored problems.
    pub fn check(&mut self, conn: &Connection) -> Result<usize> {
        let headers: Vec<Header> = self.added.iter().map(|a| a.header.clone()).collect();
        let erased_ids: Vec<i64> = self.erased.iter().map(|e| e.trove_id).collect();
        let mut found = solver::check_requires(conn, &headers, &erased_ids)?;
        self.problems.append(&mut found);
        Ok(self.problems.iter().filter(|p| !p.ignored).count())
    }

    /// Topologically order the queued installs and erasures. Returns the
    /// number of elements the orderer could not place (cycle remnants).
    pub fn order(&mut self) -> usize {
        let mut elements = Vec::with_capacity(self.added.len() + self.erased.len());
        for (i, added) in self.added.iter().enumerate() {
            let name = header_name(&added.header).unwrap_or_default();
            elements.push(TransactionElement::new(i, name, ElementKind::Install));
        }
        for (i, erased) in self.erased.iter().enumerate() {
            let name = header_name(&erased.header).unwrap_or_default();
            elements.push(TransactionElement::new(
                self.added.len() + i,
                name,
                ElementKind::Erase,
            ));
        }

        let edges = self.requires_edges();
        let result = order_elements(elements, edges);
        let unordered = result.unordered;
        self.order = result.ordered;
        unordered
    }

    /// Edges from a provider (install) to each added consumer that requires
    /// it, so the orderer installs providers before their dependents.
    fn requires_edges(&self) -> Vec<ElementEdge> {
        let provides: Vec<Vec<String>> = self
            .added
            .iter()
            .map(|a| solver::provides_of(&a.header).into_iter().map(|c| c.name).collect())
            .collect();

        let mut edges = Vec::new();
        for (consumer_idx, consumer) in self.added.iter().enumerate() {
            for require in solver::requires_of(&consumer.header) {
                for (provider_idx, names) in provides.iter().enumerate() {
                    if provider_idx != consumer_idx && names.contains(&require.name) {
                        edges.push(ElementEdge {
                            from: provider_idx,
                            to: consumer_idx,
                            breakable: true,
                        });
                    }
                }
            }
        }
        edges
    }

    fn queued_at(&self, id: usize) -> Queued<'_> {
        if id < self.added.len() {
            Queued::Add(&self.added[id])
        } else {
            Queued::Erase(&self.erased[id - self.added.len()])
        }
    }

    /// Run the ordered set: install headers land in the record store and on
    /// disk via the FSM, erased headers are removed the same way. Stops at
    /// the first unignored problem once `ok_probs` has been applied.
    pub fn run(
        &mut self,
        conn: &Connection,
        deployer: &FileDeployer,
        ok_probs: &ProblemFilter,
    ) -> Result<Vec<Problem>> {
        let unignored = apply_filter(&mut self.problems, ok_probs);
        if unignored > 0 {
            return Ok(self.problems.clone());
        }

        let fsm = Fsm::new(deployer, FsmConfig::default());

        for element in &self.order {
            match self.queued_at(element.id) {
                Queued::Add(added) => {
                    let entries = files_of(&added.header, FileAction::Create);
                    fsm.install(&entries)?;
                    self.record_install(conn, added)?;
                }
                Queued::Erase(erased) => {
                    let entries = files_of(&erased.header, FileAction::Erase);
                    fsm.erase(&entries)?;
                    Trove::delete(conn, erased.trove_id)?;
                }
            }
        }

        Ok(self.problems.clone())
    }

    fn record_install(&self, conn: &Connection, added: &AddedElement) -> Result<()> {
        let name = header_name(&added.header)
            .ok_or_else(|| Error::Header("header has no name tag".to_string()))?;
        let version = header_string(&added.header, WellKnownTag::Version).unwrap_or_default();

        let mut trove = Trove::new(name, version, TroveType::Package);
        trove.architecture = header_string(&added.header, WellKnownTag::Arch);
        trove.description = header_string(&added.header, WellKnownTag::Description);
        trove.install_source = InstallSource::File;
        trove.install_reason = InstallReason::Explicit;
        let trove_id = trove.insert(conn)?;

        for provide in solver::provides_of(&added.header) {
            let mut entry = ProvideEntry::new(
                trove_id,
                provide.name,
                if provide.version.is_empty() {
                    None
                } else {
                    Some(provide.version)
                },
            );
            entry.insert_or_ignore(conn)?;
        }

        Ok(())
    }

    /// Undo a partially-run transaction: erase record-store rows the run
    /// already inserted for elements at or before `failed_index`, then
    /// re-deploy erased packages' files from their headers so the
    /// filesystem matches what it held before the run started.
    pub fn rollback(&self, conn: &Connection, deployer: &FileDeployer, failed_index: usize) -> Result<()> {
        let fsm = Fsm::new(deployer, FsmConfig::default());

        for element in self.order.iter().take(failed_index + 1).rev() {
            match self.queued_at(element.id) {
                Queued::Add(added) => {
                    let entries = files_of(&added.header, FileAction::Erase);
                    let _ = fsm.erase(&entries);
                    if let Some(name) = header_name(&added.header) {
                        for trove in Trove::find_by_name(conn, &name)? {
                            if let Some(id) = trove.id {
                                Trove::delete(conn, id)?;
                            }
                        }
                    }
                }
                Queued::Erase(erased) => {
                    let entries = files_of(&erased.header, FileAction::Create);
                    let _ = fsm.install(&entries);
                }
            }
        }
        Ok(())
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn nevr_of_added(&self, index: usize) -> Option<String> {
        self.added.get(index).map(|a| nevr(&a.header))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use tempfile::NamedTempFile;

    fn test_conn() -> (NamedTempFile, Connection) {
        let temp = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        schema::migrate(&conn).unwrap();
        (temp, conn)
    }

    fn header_with(name: &str, version: &str) -> Header {
        let mut h = Header::new();
        h.put(WellKnownTag::Name.id(), TagValue::String(name.to_string()))
            .unwrap();
        h.put(
            WellKnownTag::Version.id(),
            TagValue::String(version.to_string()),
        )
        .unwrap();
        h
    }

    #[test]
    fn add_install_rejects_empty_header() {
        let (_temp, conn) = test_conn();
        let mut engine = TransactionEngine::new();
        let code = engine
            .add_install(&conn, Header::new(), None, false)
            .unwrap();
        assert_eq!(code, ADD_NO_HEADER);
    }

    #[test]
    fn check_reports_unsatisfied_requires() {
        let (_temp, conn) = test_conn();
        let mut engine = TransactionEngine::new();
        let mut h = header_with("app", "1.0");
        h.put(
            WellKnownTag::RequireName.id(),
            TagValue::StringArray(vec!["libfoo.so.1".to_string()]),
        )
        .unwrap();
        engine.add_install(&conn, h, None, false).unwrap();

        let unresolved = engine.check(&conn).unwrap();
        assert_eq!(unresolved, 1);
    }

    #[test]
    fn order_places_provider_before_consumer() {
        let (_temp, conn) = test_conn();
        let mut engine = TransactionEngine::new();

        let mut consumer = header_with("app", "1.0");
        consumer
            .put(
                WellKnownTag::RequireName.id(),
                TagValue::StringArray(vec!["libfoo.so.1".to_string()]),
            )
            .unwrap();

        let mut provider = header_with("libfoo", "1.0");
        provider
            .put(
                WellKnownTag::ProvideName.id(),
                TagValue::StringArray(vec!["libfoo.so.1".to_string()]),
            )
            .unwrap();

        engine.add_install(&conn, consumer, None, false).unwrap();
        engine.add_install(&conn, provider, None, false).unwrap();

        let unordered = engine.order();
        assert_eq!(unordered, 0);
        assert_eq!(engine.order.len(), 2);
        assert_eq!(engine.order[0].name, "libfoo");
        assert_eq!(engine.order[1].name, "app");
    }
}

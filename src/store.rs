//! In-memory session/version store.
//!
//! Sessions are append-only version lists plus a movable "current" pointer.
//! Version records are immutable once saved; rollback only repoints. The map
//! is internally synchronized so the store can be shared across request
//! tasks without external locking.

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;

use crate::errors::StoreError;
use crate::types::{
    new_prefixed_id, Mode, Plan, PlannerSource, Session, SessionId, UiTree, VersionRecord,
};

/// Payload for a new version; the store stamps id, timestamp, and parent.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub intent: String,
    pub mode: Mode,
    pub planner_source: PlannerSource,
    pub plan: Plan,
    pub ui_tree: Value,
    pub ui_ast: UiTree,
    pub code: String,
    pub explanation: String,
}

#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<SessionId, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn create_session(&self) -> Session {
        let session = Session::new();
        self.sessions.insert(session.id.clone(), session.clone());
        session
    }

    pub fn get_session(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).map(|entry| entry.clone())
    }

    /// The session when the id is known, otherwise a fresh one. An unknown
    /// id yields a session with a new id, same as first contact.
    pub fn ensure_session(&self, id: Option<&str>) -> Session {
        if let Some(id) = id {
            if let Some(session) = self.get_session(id) {
                return session;
            }
        }
        self.create_session()
    }

    /// Append a version and repoint the session's current pointer to it.
    pub fn save_version(
        &self,
        session_id: &str,
        payload: NewVersion,
    ) -> Result<VersionRecord, StoreError> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or(StoreError::SessionNotFound)?;

        let record = VersionRecord {
            id: new_prefixed_id("ver"),
            created_at: Utc::now(),
            parent_version_id: session.current_version_id.clone(),
            intent: payload.intent,
            mode: payload.mode,
            planner_source: payload.planner_source,
            plan: payload.plan,
            ui_tree: payload.ui_tree,
            ui_ast: payload.ui_ast,
            code: payload.code,
            explanation: payload.explanation,
        };

        session.current_version_id = Some(record.id.clone());
        session.updated_at = Utc::now();
        session.versions.push(record.clone());
        Ok(record)
    }

    pub fn current_version(&self, session_id: &str) -> Option<VersionRecord> {
        let session = self.sessions.get(session_id)?;
        session.current_version().cloned()
    }

    /// The current version's canonical tree; `None` before the first
    /// accepted generation.
    pub fn latest_tree(&self, session_id: &str) -> Option<UiTree> {
        self.current_version(session_id)
            .map(|record| record.ui_ast)
    }

    /// All versions, most recent first.
    pub fn list_versions(&self, session_id: &str) -> Vec<VersionRecord> {
        self.sessions
            .get(session_id)
            .map(|session| session.versions.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    pub fn version_by_id(&self, session_id: &str, version_id: &str) -> Option<VersionRecord> {
        let session = self.sessions.get(session_id)?;
        session
            .versions
            .iter()
            .find(|record| record.id == version_id)
            .cloned()
    }

    /// Repoint the current pointer to a historical version. Never creates
    /// or deletes records.
    pub fn rollback(
        &self,
        session_id: &str,
        version_id: &str,
    ) -> Result<VersionRecord, StoreError> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or(StoreError::SessionNotFound)?;

        let target = session
            .versions
            .iter()
            .find(|record| record.id == version_id)
            .cloned()
            .ok_or(StoreError::VersionNotFound)?;

        session.current_version_id = Some(target.id.clone());
        session.updated_at = Utc::now();
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::default_ui_tree;
    use pretty_assertions::assert_eq;

    fn sample_payload(intent: &str) -> NewVersion {
        let ast = default_ui_tree();
        NewVersion {
            intent: intent.to_string(),
            mode: Mode::Generate,
            planner_source: PlannerSource::Heuristic,
            plan: Plan::default(),
            ui_tree: ast.to_legacy_value(),
            ui_ast: ast,
            code: "function renderGeneratedUI(React, components) { return null; }".to_string(),
            explanation: "initial".to_string(),
        }
    }

    #[test]
    fn sessions_round_trip() {
        let store = SessionStore::new();
        let session = store.create_session();
        assert!(session.id.starts_with("sess_"));
        assert_eq!(store.get_session(&session.id).unwrap().id, session.id);
        assert!(store.get_session("sess_missing").is_none());
    }

    #[test]
    fn ensure_session_mints_a_fresh_id_for_unknown_ids() {
        let store = SessionStore::new();
        let session = store.ensure_session(Some("sess_unknown"));
        assert_ne!(session.id, "sess_unknown");
        let again = store.ensure_session(Some(&session.id));
        assert_eq!(again.id, session.id);
    }

    #[test]
    fn save_version_repoints_and_links_parent() {
        let store = SessionStore::new();
        let session = store.create_session();

        let first = store.save_version(&session.id, sample_payload("one")).unwrap();
        assert_eq!(first.parent_version_id, None);

        let second = store.save_version(&session.id, sample_payload("two")).unwrap();
        assert_eq!(second.parent_version_id.as_deref(), Some(first.id.as_str()));

        let current = store.current_version(&session.id).unwrap();
        assert_eq!(current.id, second.id);
    }

    #[test]
    fn list_versions_is_most_recent_first() {
        let store = SessionStore::new();
        let session = store.create_session();
        let first = store.save_version(&session.id, sample_payload("one")).unwrap();
        let second = store.save_version(&session.id, sample_payload("two")).unwrap();

        let listed = store.list_versions(&session.id);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[test]
    fn rollback_repoints_without_new_records() {
        let store = SessionStore::new();
        let session = store.create_session();
        let first = store.save_version(&session.id, sample_payload("one")).unwrap();
        let _second = store.save_version(&session.id, sample_payload("two")).unwrap();

        let rolled = store.rollback(&session.id, &first.id).unwrap();
        assert_eq!(rolled.id, first.id);
        assert_eq!(store.list_versions(&session.id).len(), 2);
        assert_eq!(store.current_version(&session.id).unwrap().id, first.id);
    }

    #[test]
    fn rollback_errors_are_specific() {
        let store = SessionStore::new();
        let session = store.create_session();

        let err = store.rollback("sess_missing", "ver_x").unwrap_err();
        assert_eq!(err, StoreError::SessionNotFound);

        let err = store.rollback(&session.id, "ver_missing").unwrap_err();
        assert_eq!(err, StoreError::VersionNotFound);
    }

    #[test]
    fn latest_tree_is_absent_before_first_version() {
        let store = SessionStore::new();
        let session = store.create_session();
        assert!(store.latest_tree(&session.id).is_none());

        store.save_version(&session.id, sample_payload("one")).unwrap();
        let tree = store.latest_tree(&session.id).unwrap();
        assert_eq!(tree.root.id, "page_root");
    }
}

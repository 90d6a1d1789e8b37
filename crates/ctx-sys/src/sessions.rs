//! Thin convenience wrappers over the `Store` trait's session/message/
//! decision methods, for the CLI and transports to share without each
//! re-deriving the "start a session, then append turns" dance.

use std::sync::Arc;

use ctx_sys_core::error::Result;
use ctx_sys_core::models::{Decision, Message, MessageRole, Session};
use ctx_sys_core::project::ProjectHandle;
use ctx_sys_core::store::Store;
use uuid::Uuid;

pub struct SessionManager {
    store: Arc<dyn Store>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn start_session(&self, project: &ProjectHandle, title: Option<&str>) -> Result<Session> {
        self.store.create_session(project, title).await
    }

    pub async fn record_turn(
        &self,
        project: &ProjectHandle,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<Message> {
        self.store.append_message(project, session_id, role, content).await
    }

    pub async fn transcript(&self, project: &ProjectHandle, session_id: Uuid) -> Result<Vec<Message>> {
        self.store.list_messages(project, session_id).await
    }

    pub async fn record_decision(&self, project: &ProjectHandle, decision: Decision) -> Result<Decision> {
        self.store.upsert_decision(project, decision).await
    }

    pub async fn find_decisions(
        &self,
        project: &ProjectHandle,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Decision>> {
        self.store.search_decisions(project, query, limit).await
    }

    pub async fn find_messages(
        &self,
        project: &ProjectHandle,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Message>> {
        self.store.search_messages(project, query, limit).await
    }
}

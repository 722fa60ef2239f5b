//! Read-side queries over the session store.

use super::SessionRegistry;
use crate::error::Result;
use crate::store::SessionQuery;
use crate::types::{ClassId, MemberId, Registration, Session, SessionId, SessionStatus};
use chrono::NaiveDate;

impl SessionRegistry {
    /// Scheduled sessions from today onwards, by date then start time.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn upcoming(&self, limit: Option<usize>) -> Result<Vec<Session>> {
        let mut query = SessionQuery::all()
            .starting(self.env.today())
            .with_status(SessionStatus::Scheduled);
        query.limit = limit;
        self.find(query).await
    }

    /// All of today's sessions, whatever their status.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn today(&self) -> Result<Vec<Session>> {
        let today = self.env.today();
        self.find(SessionQuery::all().between(today, today)).await
    }

    /// Sessions dated between `from` and `to`, both inclusive.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn in_range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Session>> {
        self.find(SessionQuery::all().between(from, to)).await
    }

    /// Sessions created from a class.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn by_class(&self, class_id: ClassId) -> Result<Vec<Session>> {
        self.find(SessionQuery::all().for_class(class_id)).await
    }

    /// Sessions taught by an instructor. Matches the name snapshotted at creation time.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn by_instructor(&self, instructor: &str) -> Result<Vec<Session>> {
        self.find(SessionQuery::all().for_instructor(instructor)).await
    }

    /// Sessions in which the member holds a non-cancelled registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn member_active_sessions(&self, member_id: MemberId) -> Result<Vec<Session>> {
        self.find(SessionQuery::all().for_member(member_id)).await
    }

    /// Registrations holding a seat in a session, in registration order.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such session
    pub async fn session_roster(&self, session_id: SessionId) -> Result<Vec<Registration>> {
        let session = self.get_session(session_id).await?;
        Ok(session.roster().cloned().collect())
    }

    /// Run an arbitrary query.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn find(&self, query: SessionQuery) -> Result<Vec<Session>> {
        Ok(self.env.sessions.find(query).await?)
    }
}

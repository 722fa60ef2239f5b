//! Bulk session generation.
//!
//! A template is expanded over every combination of date and time range (cartesian product,
//! dates in the outer loop). Each slot is created independently, so one bad slot never drops
//! the others: the outcome lists every created session and every slot that failed with its
//! reason.

use super::{NewSession, SessionRegistry};
use crate::error::{BookingError, EntityKind, Result};
use crate::store::SessionQuery;
use crate::types::{ClassId, Session, TimeRange};
use chrono::NaiveDate;

/// Fields shared by every session of a bulk run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionTemplate {
    /// Class to schedule
    pub class_id: ClassId,
    /// Capacity override for every session
    pub capacity: Option<u32>,
    /// Notes copied to every session
    pub notes: Option<String>,
}

/// A slot that could not be created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BulkFailure {
    /// Requested date
    pub date: NaiveDate,
    /// Requested times
    pub times: TimeRange,
    /// Why it was not created
    pub error: BookingError,
}

/// Per-slot result of [`SessionRegistry::create_sessions_bulk`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Sessions created, in expansion order
    pub created: Vec<Session>,
    /// Slots that failed, in expansion order
    pub failed: Vec<BulkFailure>,
}

impl BulkOutcome {
    /// Whether every slot was created
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of slots attempted
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.created.len() + self.failed.len()
    }
}

impl SessionRegistry {
    /// Create one session per `(date, time range)` combination.
    ///
    /// A slot that already has a session of the same class starting at the same date and time
    /// is reported as failed rather than duplicated. The store holds the final say: when two
    /// runs race for a slot, the one whose insert loses gets a `Duplicate` store error for it.
    ///
    /// # Errors
    ///
    /// Fails as a whole, before anything is created, when the template itself is unusable:
    ///
    /// - `NotFound`: the class does not exist
    /// - `Validation`: zero capacity
    ///
    /// Per-slot problems (invalid times, existing session, storage failures) are reported in
    /// [`BulkOutcome::failed`].
    #[tracing::instrument(
        skip(self, template, dates, time_ranges),
        fields(class_id = %template.class_id, dates = dates.len(), ranges = time_ranges.len())
    )]
    pub async fn create_sessions_bulk(
        &self,
        template: SessionTemplate,
        dates: &[NaiveDate],
        time_ranges: &[TimeRange],
    ) -> Result<BulkOutcome> {
        if template.capacity == Some(0) {
            return Err(BookingError::Validation(
                "capacity must be at least 1".to_string(),
            ));
        }
        if self.env.classes.get_class(template.class_id).await?.is_none() {
            return Err(BookingError::not_found(EntityKind::Class, template.class_id));
        }

        let mut outcome = BulkOutcome::default();

        for &date in dates {
            let mut taken = self
                .env
                .sessions
                .find(
                    SessionQuery::all()
                        .between(date, date)
                        .for_class(template.class_id),
                )
                .await
                .map(|sessions| sessions.iter().map(|s| s.start_time).collect::<Vec<_>>())
                .map_err(BookingError::from);

            for &times in time_ranges {
                let slot = match &mut taken {
                    Ok(starts) if starts.contains(&times.start) => {
                        Err(BookingError::Validation(format!(
                            "class {} already has a session on {date} at {}",
                            template.class_id, times.start
                        )))
                    },
                    Ok(starts) => {
                        let created = self.create_slot(&template, date, times).await;
                        if created.is_ok() {
                            starts.push(times.start);
                        }
                        created
                    },
                    Err(err) => Err(err.clone()),
                };

                match slot {
                    Ok(session) => outcome.created.push(session),
                    Err(error) => {
                        tracing::warn!(%date, start = %times.start, %error, "Bulk slot failed");
                        outcome.failed.push(BulkFailure { date, times, error });
                    },
                }
            }
        }

        tracing::info!(
            created = outcome.created.len(),
            failed = outcome.failed.len(),
            "Bulk session creation finished"
        );
        Ok(outcome)
    }

    async fn create_slot(
        &self,
        template: &SessionTemplate,
        date: NaiveDate,
        times: TimeRange,
    ) -> Result<Session> {
        self.create_session(NewSession {
            class_id: template.class_id,
            date,
            times,
            capacity: template.capacity,
            notes: template.notes.clone(),
        })
        .await
    }
}

//! Calendar provider capability set.
//!
//! The sync engine never talks to a platform calendar directly; it goes through
//! [`CalendarProvider`]. Hosts inject the platform implementation at startup and
//! fall back to [`UnsupportedCalendarProvider`] where no calendar store exists.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Kind of account a calendar source belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Local,
    Exchange,
    CalDav,
    Subscribed,
    Birthdays,
    Other,
}

/// Account/source a calendar lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSource {
    pub id: Option<String>,
    pub name: String,
    pub source_type: Option<SourceType>,
    pub is_local_account: bool,
}

impl CalendarSource {
    /// Synthetic local source used when no existing source can be found.
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            source_type: Some(SourceType::Local),
            is_local_account: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    pub id: String,
    pub title: String,
    pub allows_modifications: bool,
    pub source: Option<CalendarSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarAccessLevel {
    Owner,
    Contributor,
    Read,
}

/// Payload for creating a dedicated calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDescriptor {
    pub title: String,
    pub name: String,
    pub color: String,
    pub source: CalendarSource,
    /// Id of the source when it already exists on the device.
    pub source_id: Option<String>,
    pub owner_account: String,
    pub access_level: CalendarAccessLevel,
}

/// External-facing event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEventDetails {
    pub title: String,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

#[async_trait]
pub trait CalendarProvider: Send + Sync + 'static {
    /// Whether a calendar store exists on this platform at all.
    fn is_supported(&self) -> bool;

    async fn has_permission(&self) -> AppResult<bool>;

    async fn request_permission(&self) -> AppResult<bool>;

    async fn list_calendars(&self) -> AppResult<Vec<Calendar>>;

    async fn default_calendar(&self) -> AppResult<Option<Calendar>>;

    /// Create a calendar and return its id.
    async fn create_calendar(&self, descriptor: &CalendarDescriptor) -> AppResult<String>;

    /// Create an event on `calendar_id` and return the new event's id.
    async fn create_event(
        &self,
        calendar_id: &str,
        details: &CalendarEventDetails,
    ) -> AppResult<String>;

    /// Fails with [`AppError::EventNotFound`] when the event no longer exists.
    async fn update_event(&self, event_id: &str, details: &CalendarEventDetails) -> AppResult<()>;

    async fn delete_event(&self, event_id: &str) -> AppResult<()>;
}

/// Null-object provider for platforms without a calendar store.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedCalendarProvider;

#[async_trait]
impl CalendarProvider for UnsupportedCalendarProvider {
    fn is_supported(&self) -> bool {
        false
    }

    async fn has_permission(&self) -> AppResult<bool> {
        Ok(false)
    }

    async fn request_permission(&self) -> AppResult<bool> {
        Ok(false)
    }

    async fn list_calendars(&self) -> AppResult<Vec<Calendar>> {
        Ok(Vec::new())
    }

    async fn default_calendar(&self) -> AppResult<Option<Calendar>> {
        Ok(None)
    }

    async fn create_calendar(&self, _descriptor: &CalendarDescriptor) -> AppResult<String> {
        Err(AppError::Unsupported)
    }

    async fn create_event(
        &self,
        _calendar_id: &str,
        _details: &CalendarEventDetails,
    ) -> AppResult<String> {
        Err(AppError::Unsupported)
    }

    async fn update_event(
        &self,
        _event_id: &str,
        _details: &CalendarEventDetails,
    ) -> AppResult<()> {
        Err(AppError::Unsupported)
    }

    async fn delete_event(&self, _event_id: &str) -> AppResult<()> {
        Err(AppError::Unsupported)
    }
}

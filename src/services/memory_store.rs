//! In-process calendar store.
//!
//! Implements [`CalendarProvider`] entirely in memory. Headless hosts use it as
//! a local calendar, and tests use its knobs to simulate permission prompts,
//! read-only calendars, and events deleted behind the app's back.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::provider::{
    Calendar, CalendarDescriptor, CalendarEventDetails, CalendarProvider,
};

/// How the store answers permission checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionPolicy {
    /// Permission already granted.
    Granted,
    /// Not yet granted; the prompt is accepted.
    GrantOnRequest,
    /// Not granted and the prompt is refused.
    Denied,
}

#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub id: String,
    pub calendar_id: String,
    pub details: CalendarEventDetails,
}

/// Call counters, for asserting on provider traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub permission_requests: usize,
    pub calendars_created: usize,
    pub events_created: usize,
    pub events_updated: usize,
    pub delete_attempts: usize,
}

#[derive(Debug)]
struct Inner {
    supported: bool,
    permission: PermissionPolicy,
    calendars: Vec<Calendar>,
    default_calendar_id: Option<String>,
    default_lookup_fails: bool,
    calendar_creation_fails: bool,
    deletes_fail: bool,
    suspends: bool,
    events: HashMap<String, StoredEvent>,
    created_descriptors: Vec<CalendarDescriptor>,
    counts: CallCounts,
}

#[derive(Debug)]
pub struct MemoryCalendarStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryCalendarStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCalendarStore {
    /// Supported store with permission granted and no calendars.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                supported: true,
                permission: PermissionPolicy::Granted,
                calendars: Vec::new(),
                default_calendar_id: None,
                default_lookup_fails: false,
                calendar_creation_fails: false,
                deletes_fail: false,
                suspends: false,
                events: HashMap::new(),
                created_descriptors: Vec::new(),
                counts: CallCounts::default(),
            }),
        }
    }

    /// Supported store with one writable default calendar.
    pub fn with_default_calendar() -> Self {
        let store = Self::new();
        store.add_calendar(
            Calendar {
                id: "default".to_string(),
                title: "Calendar".to_string(),
                allows_modifications: true,
                source: None,
            },
            true,
        );
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_supported(&self, supported: bool) {
        self.lock().supported = supported;
    }

    pub fn set_permission(&self, permission: PermissionPolicy) {
        self.lock().permission = permission;
    }

    pub fn add_calendar(&self, calendar: Calendar, is_default: bool) {
        let mut inner = self.lock();
        if is_default {
            inner.default_calendar_id = Some(calendar.id.clone());
        }
        inner.calendars.push(calendar);
    }

    pub fn set_default_lookup_fails(&self, fails: bool) {
        self.lock().default_lookup_fails = fails;
    }

    pub fn set_calendar_creation_fails(&self, fails: bool) {
        self.lock().calendar_creation_fails = fails;
    }

    pub fn set_deletes_fail(&self, fails: bool) {
        self.lock().deletes_fail = fails;
    }

    /// Yield to the scheduler at the start of every provider call, the way a
    /// real platform bridge suspends.
    pub fn set_suspends(&self, suspends: bool) {
        self.lock().suspends = suspends;
    }

    async fn pause(&self) {
        let suspends = self.lock().suspends;
        if suspends {
            tokio::task::yield_now().await;
        }
    }

    /// Drop an event as if the user deleted it in their calendar app.
    pub fn remove_externally(&self, event_id: &str) -> bool {
        self.lock().events.remove(event_id).is_some()
    }

    pub fn event(&self, event_id: &str) -> Option<StoredEvent> {
        self.lock().events.get(event_id).cloned()
    }

    pub fn events(&self) -> Vec<StoredEvent> {
        self.lock().events.values().cloned().collect()
    }

    pub fn calendars(&self) -> Vec<Calendar> {
        self.lock().calendars.clone()
    }

    pub fn created_descriptors(&self) -> Vec<CalendarDescriptor> {
        self.lock().created_descriptors.clone()
    }

    pub fn counts(&self) -> CallCounts {
        self.lock().counts
    }
}

#[async_trait]
impl CalendarProvider for MemoryCalendarStore {
    fn is_supported(&self) -> bool {
        self.lock().supported
    }

    async fn has_permission(&self) -> AppResult<bool> {
        self.pause().await;
        Ok(self.lock().permission == PermissionPolicy::Granted)
    }

    async fn request_permission(&self) -> AppResult<bool> {
        self.pause().await;
        let mut inner = self.lock();
        inner.counts.permission_requests += 1;
        match inner.permission {
            PermissionPolicy::Denied => Ok(false),
            PermissionPolicy::Granted | PermissionPolicy::GrantOnRequest => {
                inner.permission = PermissionPolicy::Granted;
                Ok(true)
            }
        }
    }

    async fn list_calendars(&self) -> AppResult<Vec<Calendar>> {
        self.pause().await;
        Ok(self.lock().calendars.clone())
    }

    async fn default_calendar(&self) -> AppResult<Option<Calendar>> {
        self.pause().await;
        let inner = self.lock();
        if inner.default_lookup_fails {
            return Err(AppError::Provider("default calendar lookup failed".to_string()));
        }
        let Some(default_id) = inner.default_calendar_id.as_deref() else {
            return Ok(None);
        };
        Ok(inner.calendars.iter().find(|c| c.id == default_id).cloned())
    }

    async fn create_calendar(&self, descriptor: &CalendarDescriptor) -> AppResult<String> {
        self.pause().await;
        let mut inner = self.lock();
        if inner.calendar_creation_fails {
            return Err(AppError::Provider("calendar creation refused".to_string()));
        }

        let id = format!("cal-{}", Uuid::new_v4());
        inner.calendars.push(Calendar {
            id: id.clone(),
            title: descriptor.title.clone(),
            allows_modifications: true,
            source: Some(descriptor.source.clone()),
        });
        inner.created_descriptors.push(descriptor.clone());
        inner.counts.calendars_created += 1;
        Ok(id)
    }

    async fn create_event(
        &self,
        calendar_id: &str,
        details: &CalendarEventDetails,
    ) -> AppResult<String> {
        self.pause().await;
        let mut inner = self.lock();
        let writable = inner
            .calendars
            .iter()
            .any(|c| c.id == calendar_id && c.allows_modifications);
        if !writable {
            return Err(AppError::Provider(format!(
                "calendar {} is missing or read-only",
                calendar_id
            )));
        }

        let id = format!("ev-{}", Uuid::new_v4());
        inner.events.insert(
            id.clone(),
            StoredEvent {
                id: id.clone(),
                calendar_id: calendar_id.to_string(),
                details: details.clone(),
            },
        );
        inner.counts.events_created += 1;
        Ok(id)
    }

    async fn update_event(&self, event_id: &str, details: &CalendarEventDetails) -> AppResult<()> {
        self.pause().await;
        let mut inner = self.lock();
        let event = inner
            .events
            .get_mut(event_id)
            .ok_or_else(|| AppError::EventNotFound(event_id.to_string()))?;
        event.details = details.clone();
        inner.counts.events_updated += 1;
        Ok(())
    }

    async fn delete_event(&self, event_id: &str) -> AppResult<()> {
        self.pause().await;
        let mut inner = self.lock();
        inner.counts.delete_attempts += 1;
        if inner.deletes_fail {
            return Err(AppError::Provider("calendar store unreachable".to_string()));
        }
        inner
            .events
            .remove(event_id)
            .map(|_| ())
            .ok_or_else(|| AppError::EventNotFound(event_id.to_string()))
    }
}

//! Calendar sync for ChallengeU.
//!
//! Mirrors liked pickup-sport meetups and joined intramural team games into the
//! user's calendar, keeping a persisted mapping so repeated syncs update events
//! in place and leaving a team or unliking a meetup removes them.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use services::calendar::{CalendarSync, JoinedTeam, MeetupSyncInput, TeamGame};

use services::health::HealthConnection;
use services::session::SessionState;

/// Root application context handed to the feature screens.
pub struct AppContext {
    pub config: Config,
    pub session: SessionState,
    pub calendar: CalendarSync,
    pub health: HealthConnection,
}

use std::sync::Arc;

use chrono::Duration;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::CalendarConfig;
use crate::db::{KeyValueStore, SyncedCalendarRepository};
use crate::error::{AppError, AppResult};
use crate::services::provider::{
    CalendarAccessLevel, CalendarDescriptor, CalendarEventDetails, CalendarProvider,
    CalendarSource, SourceType,
};
use crate::services::schedule::{build_meetup_date, build_team_game_date, event_end};

/// One scheduled intramural game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamGame {
    pub opponent: String,
    /// Weekday abbreviation and 12-hour time, e.g. `"Mon 7:00 PM"`.
    pub date: String,
    pub location: String,
    /// Day-of-month hint; when present it wins over the weekday.
    pub day: Option<u32>,
}

/// A liked meetup post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetupSyncInput {
    pub post_id: i64,
    pub sport: String,
    pub location: String,
    /// 12-hour time, e.g. `"4:15 PM"`.
    pub time: String,
    /// `YYYY-MM-DD`.
    pub date_key: String,
}

/// A team the user has joined, with its game list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedTeam {
    pub name: String,
    pub sport: String,
    pub games: Vec<TeamGame>,
}

pub fn meetup_mapping_key(post_id: i64) -> String {
    format!("meetup-{}", post_id)
}

/// The index keeps two games with identical opponent/date text apart.
pub fn team_game_mapping_key(team_name: &str, game: &TeamGame, index: usize) -> String {
    format!("team-{}-{}-{}-{}", team_name, game.opponent, game.date, index)
}

/// Calendar sync engine:
///
/// - Mirrors liked meetups and joined-team games into the user's calendar.
/// - Keeps a mapping key -> external event id table so repeated syncs update
///   the same event instead of duplicating it.
/// - Removes the event and its mapping when the user unlikes or leaves.
///
/// Public entry points never return errors: calendar sync is an enhancement on
/// top of the join/like action, so failures are logged and reported as `false`
/// or swallowed.
pub struct CalendarSync {
    provider: Arc<dyn CalendarProvider>,
    events: SyncedCalendarRepository,
    clock: Arc<dyn Clock>,
    config: CalendarConfig,
}

impl CalendarSync {
    pub fn new(
        provider: Arc<dyn CalendarProvider>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: CalendarConfig,
    ) -> Self {
        let events = SyncedCalendarRepository::new(store, config.event_map_key.clone());
        Self {
            provider,
            events,
            clock,
            config,
        }
    }

    pub fn repository(&self) -> &SyncedCalendarRepository {
        &self.events
    }

    /// Add or refresh the calendar event for a liked meetup.
    pub async fn sync_liked_meetup(&self, input: &MeetupSyncInput) {
        let Some(start) = build_meetup_date(&input.date_key, &input.time) else {
            debug!(
                "Skipping meetup {}: unparseable date '{}' / time '{}'",
                input.post_id, input.date_key, input.time
            );
            return;
        };

        let details = CalendarEventDetails {
            title: format!("Meetup: {}", input.sport),
            location: Some(input.location.clone()),
            notes: Some(format!(
                "Added from {} Meetup likes",
                self.config.calendar_name
            )),
            start,
            end: event_end(start, self.event_duration()),
        };
        let mapping_key = meetup_mapping_key(input.post_id);

        let result = async {
            let calendar_id = self.resolve_calendar().await?;
            self.upsert_event(&calendar_id, &mapping_key, &details).await
        }
        .await;

        match result {
            Ok(()) => info!("Synced liked meetup {} to calendar", input.post_id),
            Err(e) if e.is_unavailable() => info!(
                code = e.code(),
                "Calendar unavailable; meetup {} not synced: {}", input.post_id, e
            ),
            Err(e) => warn!(
                code = e.code(),
                "Failed to sync liked meetup {} to calendar: {}", input.post_id, e
            ),
        }
    }

    /// Remove the calendar event of an unliked meetup.
    pub async fn remove_liked_meetup(&self, post_id: i64) {
        if let Err(e) = self.remove_event(&meetup_mapping_key(post_id)).await {
            warn!(
                code = e.code(),
                "Failed to remove meetup {} from calendar: {}", post_id, e
            );
        }
    }

    /// Upsert every game of a joined team concurrently.
    ///
    /// Returns `true` when at least one game was synced. Games whose date
    /// cannot be parsed are skipped without affecting the others.
    pub async fn sync_joined_team_games(
        &self,
        team_name: &str,
        sport: &str,
        games: &[TeamGame],
    ) -> bool {
        let planned = self.plan_team_games(team_name, sport, games);
        if planned.is_empty() {
            return false;
        }

        let calendar_id = match self.resolve_calendar().await {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    code = e.code(),
                    "Calendar unavailable for team {}: {}", team_name, e
                );
                return false;
            }
        };

        self.write_team_games(team_name, games.len(), &planned, &calendar_id)
            .await
    }

    /// Remove every game event of a team the user left.
    pub async fn remove_joined_team_games(&self, team_name: &str, games: &[TeamGame]) {
        let keys: Vec<String> = games
            .iter()
            .enumerate()
            .map(|(index, game)| team_game_mapping_key(team_name, game, index))
            .collect();

        let results = join_all(keys.iter().map(|key| self.remove_event(key))).await;
        for (key, result) in keys.iter().zip(results) {
            if let Err(e) = result {
                warn!(code = e.code(), "Failed to remove game {}: {}", key, e);
            }
        }
    }

    /// Re-sync every joined team, e.g. when the Teams screen regains focus.
    ///
    /// The target calendar is resolved once for all teams, so at most one
    /// dedicated calendar gets created. Returns `true` only if every team
    /// synced; callers show a single alert otherwise.
    pub async fn sync_joined_teams(&self, teams: &[JoinedTeam]) -> bool {
        let planned: Vec<Vec<(String, CalendarEventDetails)>> = teams
            .iter()
            .map(|team| self.plan_team_games(&team.name, &team.sport, &team.games))
            .collect();

        let calendar_id = if planned.iter().any(|games| !games.is_empty()) {
            match self.resolve_calendar().await {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(code = e.code(), "Calendar unavailable for joined teams: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let results = join_all(teams.iter().zip(&planned).map(|(team, games)| {
            let calendar_id = calendar_id.as_deref();
            async move {
                match calendar_id {
                    Some(id) if !games.is_empty() => {
                        self.write_team_games(&team.name, team.games.len(), games, id)
                            .await
                    }
                    _ => false,
                }
            }
        }))
        .await;

        let failed = results.iter().filter(|synced| !**synced).count();
        if failed > 0 {
            warn!(
                "{} of {} joined teams could not be synced to calendar",
                failed,
                teams.len()
            );
        }
        failed == 0
    }

    /// Mapping keys and event payloads for the games of one team whose date
    /// can be computed.
    fn plan_team_games(
        &self,
        team_name: &str,
        sport: &str,
        games: &[TeamGame],
    ) -> Vec<(String, CalendarEventDetails)> {
        let now = self.clock.now();

        games
            .iter()
            .enumerate()
            .filter_map(|(index, game)| {
                let Some(start) = build_team_game_date(&game.date, game.day, now) else {
                    debug!(
                        "Skipping game {} vs {}: unparseable date '{}'",
                        team_name, game.opponent, game.date
                    );
                    return None;
                };
                let details = CalendarEventDetails {
                    title: format!("{} vs {}", team_name, game.opponent),
                    location: Some(game.location.clone()),
                    notes: Some(format!(
                        "Sport: {} (added from {} Teams)",
                        sport, self.config.calendar_name
                    )),
                    start,
                    end: event_end(start, self.event_duration()),
                };
                Some((team_game_mapping_key(team_name, game, index), details))
            })
            .collect()
    }

    /// Upsert planned games into `calendar_id` concurrently. `true` when at
    /// least one landed.
    async fn write_team_games(
        &self,
        team_name: &str,
        total: usize,
        planned: &[(String, CalendarEventDetails)],
        calendar_id: &str,
    ) -> bool {
        let results = join_all(
            planned
                .iter()
                .map(|(key, details)| self.upsert_event(calendar_id, key, details)),
        )
        .await;

        let mut synced = 0usize;
        for ((key, _), result) in planned.iter().zip(results) {
            match result {
                Ok(()) => synced += 1,
                Err(e) => warn!(code = e.code(), "Failed to sync game {}: {}", key, e),
            }
        }

        info!(
            "Synced {}/{} games for team {} to calendar",
            synced, total, team_name
        );
        synced > 0
    }

    fn event_duration(&self) -> Duration {
        Duration::minutes(self.config.event_duration_minutes)
    }

    /// Check permission and pick a calendar to write into, creating a
    /// dedicated one when nothing writable exists. Runs on every sync call.
    async fn resolve_calendar(&self) -> AppResult<String> {
        if !self.provider.is_supported() {
            return Err(AppError::Unsupported);
        }

        if !self.provider.has_permission().await? && !self.provider.request_permission().await? {
            return Err(AppError::PermissionDenied);
        }

        let calendars = self.provider.list_calendars().await?;

        match self.provider.default_calendar().await {
            Ok(Some(calendar)) if !calendar.id.is_empty() && calendar.allows_modifications => {
                return Ok(calendar.id);
            }
            Ok(_) => {}
            Err(e) => debug!("Default calendar lookup failed, scanning calendars: {}", e),
        }

        if let Some(calendar) = calendars
            .iter()
            .find(|c| c.allows_modifications && !c.id.is_empty())
        {
            return Ok(calendar.id.clone());
        }

        let source = calendars
            .iter()
            .filter_map(|c| c.source.as_ref())
            .find(|s| s.source_type == Some(SourceType::Local))
            .or_else(|| calendars.iter().find_map(|c| c.source.as_ref()))
            .cloned()
            .unwrap_or_else(|| CalendarSource::local(self.config.calendar_name.clone()));

        let descriptor = CalendarDescriptor {
            title: self.config.calendar_name.clone(),
            name: self.config.calendar_name.clone(),
            color: self.config.calendar_color.clone(),
            source_id: source.id.clone(),
            source,
            owner_account: "personal".to_string(),
            access_level: CalendarAccessLevel::Owner,
        };

        info!(
            "No writable calendar found; creating '{}'",
            descriptor.name
        );
        self.provider
            .create_calendar(&descriptor)
            .await
            .map_err(|e| AppError::NoWritableCalendar(e.to_string()))
    }

    /// Update the mapped event in place, or create it when there is no
    /// mapping or the mapped event is gone.
    async fn upsert_event(
        &self,
        calendar_id: &str,
        mapping_key: &str,
        details: &CalendarEventDetails,
    ) -> AppResult<()> {
        if let Some(event_id) = self.events.find_event_id(mapping_key).await? {
            match self.provider.update_event(&event_id, details).await {
                Ok(()) => {
                    debug!("Updated calendar event {} for {}", event_id, mapping_key);
                    return Ok(());
                }
                Err(e) => debug!(
                    "Update of event {} for {} failed ({}); recreating",
                    event_id, mapping_key, e
                ),
            }
        }

        let event_id = self.provider.create_event(calendar_id, details).await?;
        self.events.upsert(mapping_key, &event_id).await?;
        debug!("Created calendar event {} for {}", event_id, mapping_key);
        Ok(())
    }

    /// Delete the mapped event (best effort) and always drop the mapping.
    async fn remove_event(&self, mapping_key: &str) -> AppResult<()> {
        let Some(event_id) = self.events.find_event_id(mapping_key).await? else {
            return Ok(());
        };

        if let Err(e) = self.provider.delete_event(&event_id).await {
            debug!(
                "Delete of calendar event {} for {} failed ({}); clearing mapping anyway",
                event_id, mapping_key, e
            );
        }

        self.events.delete(mapping_key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::db::repository::kv_store::YieldingKeyValueStore;
    use crate::db::MemoryKeyValueStore;
    use crate::services::memory_store::{MemoryCalendarStore, PermissionPolicy};
    use crate::services::provider::{Calendar, UnsupportedCalendarProvider};
    use chrono::{NaiveDate, NaiveDateTime};

    const MAP_KEY: &str = "challengeu_apple_calendar_event_map";

    fn tuesday_morning() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    struct Harness {
        store: Arc<MemoryCalendarStore>,
        kv: Arc<MemoryKeyValueStore>,
        clock: Arc<FixedClock>,
        sync: CalendarSync,
    }

    fn harness(store: MemoryCalendarStore) -> Harness {
        let store = Arc::new(store);
        let kv = Arc::new(MemoryKeyValueStore::new());
        let clock = Arc::new(FixedClock::new(tuesday_morning()));
        let sync = CalendarSync::new(
            store.clone(),
            kv.clone(),
            clock.clone(),
            CalendarConfig::default(),
        );
        Harness {
            store,
            kv,
            clock,
            sync,
        }
    }

    fn team(name: &str, games: Vec<TeamGame>) -> JoinedTeam {
        JoinedTeam {
            name: name.to_string(),
            sport: "Basketball".to_string(),
            games,
        }
    }

    fn meetup(post_id: i64, time: &str) -> MeetupSyncInput {
        MeetupSyncInput {
            post_id,
            sport: "Basketball".to_string(),
            location: "Campus Rec Center".to_string(),
            time: time.to_string(),
            date_key: "2026-03-14".to_string(),
        }
    }

    fn game(opponent: &str, date: &str, day: Option<u32>) -> TeamGame {
        TeamGame {
            opponent: opponent.to_string(),
            date: date.to_string(),
            location: "HSSV Courts".to_string(),
            day,
        }
    }

    #[test]
    fn mapping_keys_are_deterministic() {
        assert_eq!(meetup_mapping_key(42), "meetup-42");
        let g = game("Union FC", "Sat 4:30 PM", Some(7));
        assert_eq!(
            team_game_mapping_key("Hoop Dreams", &g, 1),
            "team-Hoop Dreams-Union FC-Sat 4:30 PM-1"
        );
    }

    #[tokio::test]
    async fn meetup_upsert_is_idempotent() {
        let h = harness(MemoryCalendarStore::with_default_calendar());

        h.sync.sync_liked_meetup(&meetup(7, "4:15 PM")).await;
        h.sync.sync_liked_meetup(&meetup(7, "6:00 PM")).await;

        let events = h.store.events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.details.title, "Meetup: Basketball");
        assert_eq!(
            event.details.start,
            NaiveDate::from_ymd_opt(2026, 3, 14)
                .unwrap()
                .and_hms_opt(18, 0, 0)
                .unwrap()
        );
        assert_eq!(
            (event.details.end - event.details.start).num_milliseconds(),
            3_600_000
        );

        let counts = h.store.counts();
        assert_eq!(counts.events_created, 1);
        assert_eq!(counts.events_updated, 1);

        let map = h.sync.repository().load().await.unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("meetup-7"), Some(event.id.as_str()));
    }

    #[tokio::test]
    async fn removal_deletes_event_and_mapping() {
        let h = harness(MemoryCalendarStore::with_default_calendar());

        h.sync.sync_liked_meetup(&meetup(3, "4:15 PM")).await;
        let created_id = h
            .sync
            .repository()
            .find_event_id("meetup-3")
            .await
            .unwrap()
            .unwrap();

        h.sync.remove_liked_meetup(3).await;

        assert!(h.store.event(&created_id).is_none());
        assert_eq!(h.store.counts().delete_attempts, 1);
        assert!(!h
            .sync
            .repository()
            .load()
            .await
            .unwrap()
            .contains_key("meetup-3"));
    }

    #[tokio::test]
    async fn removal_of_unknown_key_is_noop() {
        let h = harness(MemoryCalendarStore::with_default_calendar());
        h.sync.remove_liked_meetup(99).await;
        assert_eq!(h.store.counts().delete_attempts, 0);
        assert_eq!(h.kv.snapshot(MAP_KEY), None);
    }

    #[tokio::test]
    async fn failed_delete_still_clears_mapping() {
        let h = harness(MemoryCalendarStore::with_default_calendar());
        h.sync.sync_liked_meetup(&meetup(5, "4:15 PM")).await;
        h.sync.sync_liked_meetup(&meetup(6, "5:15 PM")).await;

        h.store.set_deletes_fail(true);
        h.sync.remove_liked_meetup(5).await;

        let map = h.sync.repository().load().await.unwrap();
        assert!(!map.contains_key("meetup-5"));
        assert!(map.contains_key("meetup-6"));
    }

    #[tokio::test]
    async fn stale_event_is_recreated() {
        let h = harness(MemoryCalendarStore::with_default_calendar());
        h.sync.sync_liked_meetup(&meetup(8, "4:15 PM")).await;
        let first_id = h
            .sync
            .repository()
            .find_event_id("meetup-8")
            .await
            .unwrap()
            .unwrap();

        assert!(h.store.remove_externally(&first_id));
        h.sync.sync_liked_meetup(&meetup(8, "4:15 PM")).await;

        let second_id = h
            .sync
            .repository()
            .find_event_id("meetup-8")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(first_id, second_id);
        assert_eq!(h.store.events().len(), 1);
        assert_eq!(h.store.counts().events_created, 2);
    }

    #[tokio::test]
    async fn unparseable_meetup_is_skipped_without_prompt() {
        let store = MemoryCalendarStore::with_default_calendar();
        store.set_permission(PermissionPolicy::GrantOnRequest);
        let h = harness(store);

        h.sync.sync_liked_meetup(&meetup(1, "4:15")).await;

        assert!(h.store.events().is_empty());
        assert_eq!(h.store.counts().permission_requests, 0);
        assert_eq!(h.kv.snapshot(MAP_KEY), None);
    }

    #[tokio::test]
    async fn team_batch_partial_success() {
        let h = harness(MemoryCalendarStore::with_default_calendar());
        let games = vec![
            game("Nebraska Ballers", "Mon 7:00 PM", None),
            game("Late Night Legends", "TBD", None),
            game("Scarlet Hoops", "Thu 8:15 PM", Some(5)),
        ];

        let synced = h
            .sync
            .sync_joined_team_games("Hoop Dreams", "Basketball", &games)
            .await;

        assert!(synced);
        let map = h.sync.repository().load().await.unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("team-Hoop Dreams-Nebraska Ballers-Mon 7:00 PM-0"));
        assert!(map.contains_key("team-Hoop Dreams-Scarlet Hoops-Thu 8:15 PM-2"));

        let mut titles: Vec<String> = h
            .store
            .events()
            .into_iter()
            .map(|e| e.details.title)
            .collect();
        titles.sort();
        assert_eq!(
            titles,
            vec![
                "Hoop Dreams vs Nebraska Ballers".to_string(),
                "Hoop Dreams vs Scarlet Hoops".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn team_games_with_same_text_stay_distinct() {
        let h = harness(MemoryCalendarStore::with_default_calendar());
        let games = vec![
            game("Net Ninjas", "Sat 2:00 PM", None),
            game("Net Ninjas", "Sat 2:00 PM", None),
        ];

        assert!(
            h.sync
                .sync_joined_team_games("Pickle Pals", "Pickleball", &games)
                .await
        );
        assert!(
            h.sync
                .sync_joined_team_games("Pickle Pals", "Pickleball", &games)
                .await
        );

        assert_eq!(h.store.events().len(), 2);
        assert_eq!(h.sync.repository().load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn team_batch_all_unparseable_is_failure() {
        let h = harness(MemoryCalendarStore::with_default_calendar());
        let games = vec![game("A", "TBD", None), game("B", "Mon", None)];

        assert!(!h.sync.sync_joined_team_games("Team", "Soccer", &games).await);
        assert!(!h.sync.sync_joined_team_games("Team", "Soccer", &[]).await);
    }

    #[tokio::test]
    async fn leaving_team_removes_only_its_games() {
        let h = harness(MemoryCalendarStore::with_default_calendar());
        let hoops = vec![
            game("Nebraska Ballers", "Mon 7:00 PM", Some(2)),
            game("Late Night Legends", "Thu 8:15 PM", Some(5)),
        ];
        let volley = vec![game("Serve Aces", "Wed 7:30 PM", Some(4))];

        assert!(h.sync.sync_joined_team_games("Hoops", "Basketball", &hoops).await);
        assert!(h.sync.sync_joined_team_games("Spikers", "Volleyball", &volley).await);
        h.sync.sync_liked_meetup(&meetup(11, "4:15 PM")).await;

        h.sync.remove_joined_team_games("Hoops", &hoops).await;

        let map = h.sync.repository().load().await.unwrap();
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(
            keys,
            vec!["meetup-11", "team-Spikers-Serve Aces-Wed 7:30 PM-0"]
        );
        assert_eq!(h.store.events().len(), 2);
    }

    #[tokio::test]
    async fn permission_denied_is_silent_and_leaves_table_untouched() {
        let store = MemoryCalendarStore::with_default_calendar();
        store.set_permission(PermissionPolicy::Denied);
        let h = harness(store);
        let games = vec![game("Union FC", "Sat 4:30 PM", Some(7))];

        h.sync.sync_liked_meetup(&meetup(1, "4:15 PM")).await;
        h.sync.remove_liked_meetup(1).await;
        assert!(!h.sync.sync_joined_team_games("FC", "Soccer", &games).await);
        h.sync.remove_joined_team_games("FC", &games).await;
        assert!(
            !h.sync
                .sync_joined_teams(&[JoinedTeam {
                    name: "FC".to_string(),
                    sport: "Soccer".to_string(),
                    games: games.clone(),
                }])
                .await
        );

        assert_eq!(h.kv.snapshot(MAP_KEY), None);
        assert!(h.store.events().is_empty());
        assert!(h.store.counts().permission_requests > 0);
    }

    #[tokio::test]
    async fn unsupported_platform_reports_false() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let sync = CalendarSync::new(
            Arc::new(UnsupportedCalendarProvider),
            kv.clone(),
            Arc::new(FixedClock::new(tuesday_morning())),
            CalendarConfig::default(),
        );

        sync.sync_liked_meetup(&meetup(1, "4:15 PM")).await;
        assert!(
            !sync
                .sync_joined_team_games("FC", "Soccer", &[game("X", "Mon 7:00 PM", None)])
                .await
        );
        assert_eq!(kv.snapshot(MAP_KEY), None);
    }

    #[tokio::test]
    async fn permission_prompt_accepted_proceeds() {
        let store = MemoryCalendarStore::with_default_calendar();
        store.set_permission(PermissionPolicy::GrantOnRequest);
        let h = harness(store);

        h.sync.sync_liked_meetup(&meetup(2, "4:15 PM")).await;

        assert_eq!(h.store.counts().permission_requests, 1);
        assert_eq!(h.store.events().len(), 1);
    }

    #[tokio::test]
    async fn falls_back_to_first_writable_calendar() {
        let store = MemoryCalendarStore::new();
        store.add_calendar(
            Calendar {
                id: "holidays".to_string(),
                title: "Holidays".to_string(),
                allows_modifications: false,
                source: None,
            },
            true,
        );
        store.add_calendar(
            Calendar {
                id: "work".to_string(),
                title: "Work".to_string(),
                allows_modifications: true,
                source: None,
            },
            false,
        );
        store.set_default_lookup_fails(true);
        let h = harness(store);

        h.sync.sync_liked_meetup(&meetup(4, "4:15 PM")).await;

        let events = h.store.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].calendar_id, "work");
        assert_eq!(h.store.counts().calendars_created, 0);
    }

    #[tokio::test]
    async fn creates_dedicated_calendar_on_local_source() {
        let store = MemoryCalendarStore::new();
        store.add_calendar(
            Calendar {
                id: "subscribed".to_string(),
                title: "Sports".to_string(),
                allows_modifications: false,
                source: Some(CalendarSource {
                    id: Some("src-sub".to_string()),
                    name: "Subscribed".to_string(),
                    source_type: Some(SourceType::Subscribed),
                    is_local_account: false,
                }),
            },
            false,
        );
        store.add_calendar(
            Calendar {
                id: "birthdays".to_string(),
                title: "Birthdays".to_string(),
                allows_modifications: false,
                source: Some(CalendarSource {
                    id: Some("src-local".to_string()),
                    name: "On My iPhone".to_string(),
                    source_type: Some(SourceType::Local),
                    is_local_account: true,
                }),
            },
            false,
        );
        let h = harness(store);

        let games = vec![
            game("Field Kings", "Tue 6:45 PM", Some(3)),
            game("Nebraska Ballers", "Sat 4:30 PM", Some(7)),
        ];
        assert!(h.sync.sync_joined_team_games("Kickers", "Soccer", &games).await);

        let descriptors = h.store.created_descriptors();
        assert_eq!(descriptors.len(), 1);
        let descriptor = &descriptors[0];
        assert_eq!(descriptor.name, "ChallengeU");
        assert_eq!(descriptor.color, "#e80e0e");
        assert_eq!(descriptor.source_id.as_deref(), Some("src-local"));
        assert_eq!(descriptor.access_level, CalendarAccessLevel::Owner);
        assert_eq!(h.store.events().len(), 2);
    }

    #[tokio::test]
    async fn creates_dedicated_calendar_on_synthetic_source() {
        let h = harness(MemoryCalendarStore::new());

        h.sync.sync_liked_meetup(&meetup(9, "4:15 PM")).await;

        let descriptors = h.store.created_descriptors();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].source, CalendarSource::local("ChallengeU"));
        assert_eq!(descriptors[0].source_id, None);
        assert_eq!(h.store.events().len(), 1);
    }

    #[tokio::test]
    async fn calendar_creation_failure_is_unavailable() {
        let store = MemoryCalendarStore::new();
        store.set_calendar_creation_fails(true);
        let h = harness(store);

        assert!(
            !h.sync
                .sync_joined_team_games("FC", "Soccer", &[game("X", "Mon 7:00 PM", None)])
                .await
        );
        assert_eq!(h.kv.snapshot(MAP_KEY), None);
    }

    #[tokio::test]
    async fn sync_joined_teams_requires_every_team() {
        let h = harness(MemoryCalendarStore::with_default_calendar());
        let good = JoinedTeam {
            name: "Hoops".to_string(),
            sport: "Basketball".to_string(),
            games: vec![game("Scarlet Hoops", "Mon 7:00 PM", Some(2))],
        };
        let empty = JoinedTeam {
            name: "Ghosts".to_string(),
            sport: "Soccer".to_string(),
            games: Vec::new(),
        };

        assert!(h.sync.sync_joined_teams(&[]).await);
        assert!(h.sync.sync_joined_teams(&[good.clone()]).await);
        assert!(!h.sync.sync_joined_teams(&[good, empty]).await);
    }

    #[tokio::test]
    async fn configured_duration_applies() {
        let store = Arc::new(MemoryCalendarStore::with_default_calendar());
        let sync = CalendarSync::new(
            store.clone(),
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(FixedClock::new(tuesday_morning())),
            CalendarConfig {
                event_duration_minutes: 90,
                ..CalendarConfig::default()
            },
        );

        sync.sync_liked_meetup(&meetup(1, "4:15 PM")).await;

        let event = &store.events()[0];
        assert_eq!(
            event.details.end - event.details.start,
            Duration::minutes(90)
        );
    }

    #[tokio::test]
    async fn team_games_survive_concurrent_mapping_writes() {
        let store = Arc::new(MemoryCalendarStore::with_default_calendar());
        store.set_suspends(true);
        let sync = CalendarSync::new(
            store.clone(),
            Arc::new(YieldingKeyValueStore::default()),
            Arc::new(FixedClock::new(tuesday_morning())),
            CalendarConfig::default(),
        );
        let games: Vec<TeamGame> = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat"]
            .iter()
            .map(|day| game("Union FC", &format!("{day} 6:00 PM"), None))
            .collect();

        assert!(sync.sync_joined_team_games("Kickers", "Soccer", &games).await);

        let map = sync.repository().load().await.unwrap();
        assert_eq!(map.len(), 6);
        assert_eq!(store.events().len(), 6);
    }

    #[tokio::test]
    async fn joined_teams_share_one_dedicated_calendar() {
        let store = MemoryCalendarStore::new();
        store.set_suspends(true);
        let h = harness(store);
        let teams = vec![
            team("Hoops", vec![game("Scarlet Hoops", "Mon 7:00 PM", None)]),
            team("Dunkers", vec![game("Rim Rockers", "Wed 8:00 PM", None)]),
            team("Ballers", vec![game("Net Ninjas", "Fri 6:30 PM", None)]),
        ];

        assert!(h.sync.sync_joined_teams(&teams).await);

        assert_eq!(h.store.counts().calendars_created, 1);
        let calendars = h.store.calendars();
        assert_eq!(calendars.len(), 1);
        assert_eq!(calendars[0].title, "ChallengeU");
        assert!(calendars[0].allows_modifications);

        let events = h.store.events();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.calendar_id == calendars[0].id));
    }

    #[tokio::test]
    async fn unsupported_store_is_never_prompted() {
        let store = MemoryCalendarStore::with_default_calendar();
        store.set_supported(false);
        store.set_permission(PermissionPolicy::GrantOnRequest);
        let h = harness(store);

        h.sync.sync_liked_meetup(&meetup(1, "4:15 PM")).await;
        assert!(
            !h.sync
                .sync_joined_teams(&[team("Hoops", vec![game("X", "Mon 7:00 PM", None)])])
                .await
        );

        assert_eq!(h.store.counts(), Default::default());
        assert_eq!(h.kv.snapshot(MAP_KEY), None);
    }

    #[tokio::test]
    async fn resync_after_game_day_moves_event_to_next_week() {
        let h = harness(MemoryCalendarStore::with_default_calendar());
        let games = vec![game("Scarlet Hoops", "Mon 7:00 PM", None)];

        assert!(h.sync.sync_joined_team_games("Hoops", "Basketball", &games).await);
        let first = h.store.events()[0].clone();
        assert_eq!(
            first.details.start,
            NaiveDate::from_ymd_opt(2026, 3, 16)
                .unwrap()
                .and_hms_opt(19, 0, 0)
                .unwrap()
        );

        h.clock.set(
            NaiveDate::from_ymd_opt(2026, 3, 17)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        );
        assert!(h.sync.sync_joined_team_games("Hoops", "Basketball", &games).await);

        let events = h.store.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, first.id);
        assert_eq!(
            events[0].details.start,
            NaiveDate::from_ymd_opt(2026, 3, 23)
                .unwrap()
                .and_hms_opt(19, 0, 0)
                .unwrap()
        );
        assert_eq!(h.store.counts().events_updated, 1);
    }
}

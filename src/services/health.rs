//! Health data integration for the account screen.
//!
//! The platform health store is injected as a [`HealthProvider`]; hosts where
//! no such store can be located pass [`UnavailableHealthProvider`].
//! [`HealthConnection`] tracks whether the user is connected and caches the
//! metrics fetched on connect.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthMetric {
    StepCount,
    DistanceWalkingRunning,
    ActiveEnergyBurned,
}

impl HealthMetric {
    pub const ALL: [HealthMetric; 3] = [
        HealthMetric::StepCount,
        HealthMetric::DistanceWalkingRunning,
        HealthMetric::ActiveEnergyBurned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthMetric::StepCount => "StepCount",
            HealthMetric::DistanceWalkingRunning => "DistanceWalkingRunning",
            HealthMetric::ActiveEnergyBurned => "ActiveEnergyBurned",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailySample {
    pub date: NaiveDate,
    pub value: f64,
}

#[async_trait]
pub trait HealthProvider: Send + Sync + 'static {
    fn is_available(&self) -> bool;

    /// Ask for read access to `metrics`. Fails when the user refuses.
    async fn request_read_access(&self, metrics: &[HealthMetric]) -> AppResult<()>;

    /// Total of `metric` between `start` and `end`, if the store has any data.
    async fn total(
        &self,
        metric: HealthMetric,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> AppResult<Option<f64>>;

    /// Per-day totals of `metric` between `start` and `end`, oldest first.
    async fn daily_samples(
        &self,
        metric: HealthMetric,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> AppResult<Vec<DailySample>>;
}

/// Null-object provider used when no health store is present.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableHealthProvider;

#[async_trait]
impl HealthProvider for UnavailableHealthProvider {
    fn is_available(&self) -> bool {
        false
    }

    async fn request_read_access(&self, _metrics: &[HealthMetric]) -> AppResult<()> {
        Err(AppError::Health("health store unavailable".to_string()))
    }

    async fn total(
        &self,
        _metric: HealthMetric,
        _start: NaiveDateTime,
        _end: NaiveDateTime,
    ) -> AppResult<Option<f64>> {
        Ok(None)
    }

    async fn daily_samples(
        &self,
        _metric: HealthMetric,
        _start: NaiveDateTime,
        _end: NaiveDateTime,
    ) -> AppResult<Vec<DailySample>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    NotConnected,
    Unavailable,
    PermissionDenied,
    Connected,
}

impl HealthStatus {
    /// Label shown next to "Health:" on the account screen.
    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::NotConnected => "Not connected",
            HealthStatus::Unavailable => "Health data not available on this device",
            HealthStatus::PermissionDenied => "Permission denied or init error",
            HealthStatus::Connected => "Connected (read permissions granted)",
        }
    }
}

/// Metrics fetched when connecting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub steps_today: Option<f64>,
    pub distance_today: Option<f64>,
    pub calories_today: Option<f64>,
    pub daily_steps: Vec<f64>,
    pub daily_distance: Vec<f64>,
    pub daily_calories: Vec<f64>,
}

struct ConnectionState {
    status: HealthStatus,
    snapshot: Option<HealthSnapshot>,
}

pub struct HealthConnection {
    provider: Arc<dyn HealthProvider>,
    clock: Arc<dyn Clock>,
    state: RwLock<ConnectionState>,
}

impl HealthConnection {
    pub fn new(provider: Arc<dyn HealthProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            provider,
            clock,
            state: RwLock::new(ConnectionState {
                status: HealthStatus::NotConnected,
                snapshot: None,
            }),
        }
    }

    pub async fn status(&self) -> HealthStatus {
        self.state.read().await.status
    }

    pub async fn snapshot(&self) -> Option<HealthSnapshot> {
        self.state.read().await.snapshot.clone()
    }

    /// Request read access and load today's totals plus the last week of
    /// daily totals. Metrics that fail to load are left empty.
    pub async fn connect(&self) -> HealthStatus {
        if !self.provider.is_available() {
            return self.set(HealthStatus::Unavailable, None).await;
        }

        if let Err(e) = self.provider.request_read_access(&HealthMetric::ALL).await {
            warn!("Health read access refused: {}", e);
            return self.set(HealthStatus::PermissionDenied, None).await;
        }

        let now = self.clock.now();
        let midnight = now.date().and_hms_opt(0, 0, 0).unwrap_or(now);
        let week_ago = now - Duration::days(7);

        let snapshot = HealthSnapshot {
            steps_today: self.total(HealthMetric::StepCount, midnight, now).await,
            distance_today: self
                .total(HealthMetric::DistanceWalkingRunning, midnight, now)
                .await,
            calories_today: self
                .total(HealthMetric::ActiveEnergyBurned, midnight, now)
                .await,
            daily_steps: self.daily(HealthMetric::StepCount, week_ago, now).await,
            daily_distance: self
                .daily(HealthMetric::DistanceWalkingRunning, week_ago, now)
                .await,
            daily_calories: self
                .daily(HealthMetric::ActiveEnergyBurned, week_ago, now)
                .await,
        };

        info!("Connected to health store");
        self.set(HealthStatus::Connected, Some(snapshot)).await
    }

    /// Forget all fetched metrics.
    pub async fn disconnect(&self) {
        self.set(HealthStatus::NotConnected, None).await;
    }

    async fn set(&self, status: HealthStatus, snapshot: Option<HealthSnapshot>) -> HealthStatus {
        let mut state = self.state.write().await;
        state.status = status;
        state.snapshot = snapshot;
        status
    }

    async fn total(
        &self,
        metric: HealthMetric,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Option<f64> {
        match self.provider.total(metric, start, end).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read {}: {}", metric.as_str(), e);
                None
            }
        }
    }

    async fn daily(&self, metric: HealthMetric, start: NaiveDateTime, end: NaiveDateTime) -> Vec<f64> {
        match self.provider.daily_samples(metric, start, end).await {
            Ok(samples) => samples.into_iter().map(|s| s.value).collect(),
            Err(e) => {
                warn!("Failed to read daily {}: {}", metric.as_str(), e);
                Vec::new()
            }
        }
    }
}

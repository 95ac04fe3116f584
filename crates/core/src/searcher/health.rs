//! Per-adapter health tracking (circuit breaker).
//!
//! State machine per adapter name:
//!
//! ```text
//! healthy --failure--> degraded --N consecutive failures--> down
//!    ^                    |                                  |
//!    +------success-------+<------cooldown elapses-----------+ (as degraded)
//! ```
//!
//! Any success returns the adapter to `healthy` immediately. A `down` adapter
//! is re-admitted as `degraded` (not `healthy`) once the cooldown has elapsed
//! since its last recorded outcome, so it has to prove recovery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Health classification of one adapter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Down,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Down => "down",
        }
    }
}

/// Tunables for the health monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Consecutive failures before an adapter is marked down.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// How long a down adapter is skipped before being retried.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Interval of the background cooldown sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_cooldown_secs() -> u64 {
    30 * 60
}

fn default_sweep_interval_secs() -> u64 {
    10 * 60
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Public snapshot of one adapter's health.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealthRecord {
    pub name: String,
    pub status: HealthStatus,
    pub consecutive_failures: u32,
    pub success_count: u64,
    pub failure_count: u64,
    /// Fraction in 0.0..=1.0.
    pub success_rate: f64,
    pub avg_response_time_ms: f64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_checked_at: DateTime<Utc>,
}

/// Internal mutable record; `last_outcome` drives the cooldown.
#[derive(Debug, Clone)]
struct HealthEntry {
    record: ProviderHealthRecord,
    last_outcome: Instant,
}

impl HealthEntry {
    fn new(name: &str) -> Self {
        Self {
            record: ProviderHealthRecord {
                name: name.to_string(),
                status: HealthStatus::Healthy,
                consecutive_failures: 0,
                success_count: 0,
                failure_count: 0,
                success_rate: 1.0,
                avg_response_time_ms: 0.0,
                last_success_at: None,
                last_checked_at: Utc::now(),
            },
            last_outcome: Instant::now(),
        }
    }

    /// Re-admit a down adapter as degraded once the cooldown has passed.
    fn apply_cooldown(&mut self, cooldown: Duration, now: Instant) -> bool {
        if self.record.status == HealthStatus::Down
            && now.duration_since(self.last_outcome) >= cooldown
        {
            self.record.status = HealthStatus::Degraded;
            self.record.consecutive_failures = 0;
            true
        } else {
            false
        }
    }
}

/// Aggregate view for dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct HealthDashboard {
    pub total: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub down: usize,
    /// Sorted by success rate, best first.
    pub providers: Vec<ProviderHealthRecord>,
}

/// Tracks rolling success/failure per adapter.
///
/// Status only changes through [`record_success`](Self::record_success),
/// [`record_failure`](Self::record_failure), the cooldown, or an explicit
/// [`reset`](Self::reset).
pub struct ProviderHealthMonitor {
    config: HealthConfig,
    entries: RwLock<HashMap<String, HealthEntry>>,
}

impl Default for ProviderHealthMonitor {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}

impl ProviderHealthMonitor {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn cooldown(&self) -> Duration {
        Duration::from_secs(self.config.cooldown_secs)
    }

    /// Record a successful call (zero results still count as success).
    pub async fn record_success(&self, name: &str, elapsed: Duration) {
        let latest_ms = elapsed.as_secs_f64() * 1000.0;
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(name.to_string())
            .or_insert_with(|| HealthEntry::new(name));

        let record = &mut entry.record;
        let previous = record.status;

        record.avg_response_time_ms = if record.success_count == 0 {
            latest_ms
        } else {
            record.avg_response_time_ms * 0.7 + latest_ms * 0.3
        };
        record.success_count += 1;
        record.consecutive_failures = 0;
        record.status = HealthStatus::Healthy;
        record.last_success_at = Some(Utc::now());
        record.last_checked_at = Utc::now();
        record.success_rate = success_rate(record.success_count, record.failure_count);
        entry.last_outcome = Instant::now();

        if previous != HealthStatus::Healthy {
            info!(adapter = %name, from = previous.as_str(), "Adapter recovered");
        }
    }

    /// Record a failed call (error, panic, or deadline exceeded).
    pub async fn record_failure(&self, name: &str) {
        let threshold = self.config.failure_threshold.max(1);
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(name.to_string())
            .or_insert_with(|| HealthEntry::new(name));

        let record = &mut entry.record;
        record.failure_count += 1;
        record.consecutive_failures += 1;
        record.last_checked_at = Utc::now();
        record.success_rate = success_rate(record.success_count, record.failure_count);
        entry.last_outcome = Instant::now();

        let next = if record.consecutive_failures >= threshold {
            HealthStatus::Down
        } else {
            HealthStatus::Degraded
        };

        if next == HealthStatus::Down && record.status != HealthStatus::Down {
            warn!(
                adapter = %name,
                failures = record.consecutive_failures,
                "Adapter marked as down"
            );
        } else {
            debug!(
                adapter = %name,
                failures = record.consecutive_failures,
                status = next.as_str(),
                "Adapter failure recorded"
            );
        }
        record.status = next;
    }

    /// Current status; unknown adapters are healthy.
    pub async fn status(&self, name: &str) -> HealthStatus {
        self.get(name)
            .await
            .map(|r| r.status)
            .unwrap_or(HealthStatus::Healthy)
    }

    /// Advisory: false only while the adapter is down.
    pub async fn should_use(&self, name: &str) -> bool {
        self.status(name).await != HealthStatus::Down
    }

    /// Snapshot of one adapter, applying a due cooldown first.
    pub async fn get(&self, name: &str) -> Option<ProviderHealthRecord> {
        let cooldown = self.cooldown();
        let now = Instant::now();

        {
            let entries = self.entries.read().await;
            match entries.get(name) {
                None => return None,
                Some(entry) if entry.record.status != HealthStatus::Down => {
                    return Some(entry.record.clone())
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(name)?;
        if entry.apply_cooldown(cooldown, now) {
            info!(adapter = %name, "Cooldown elapsed, retrying adapter as degraded");
        }
        Some(entry.record.clone())
    }

    /// Snapshot of every tracked adapter.
    pub async fn all(&self) -> Vec<ProviderHealthRecord> {
        self.sweep().await;
        let entries = self.entries.read().await;
        let mut records: Vec<_> = entries.values().map(|e| e.record.clone()).collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    /// Names of adapters currently classified healthy.
    pub async fn healthy_providers(&self) -> Vec<String> {
        self.all()
            .await
            .into_iter()
            .filter(|r| r.status == HealthStatus::Healthy)
            .map(|r| r.name)
            .collect()
    }

    pub async fn dashboard(&self) -> HealthDashboard {
        let mut providers = self.all().await;
        providers.sort_by(|a, b| {
            b.success_rate
                .total_cmp(&a.success_rate)
                .then_with(|| a.name.cmp(&b.name))
        });
        let count = |s: HealthStatus| providers.iter().filter(|p| p.status == s).count();

        HealthDashboard {
            total: providers.len(),
            healthy: count(HealthStatus::Healthy),
            degraded: count(HealthStatus::Degraded),
            down: count(HealthStatus::Down),
            providers,
        }
    }

    /// Manual recovery. Returns false for unknown adapters.
    pub async fn reset(&self, name: &str) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(name) {
            Some(entry) => {
                entry.record.status = HealthStatus::Healthy;
                entry.record.consecutive_failures = 0;
                info!(adapter = %name, "Adapter health reset");
                true
            }
            None => false,
        }
    }

    /// Apply due cooldowns to every down adapter. Returns how many recovered.
    pub async fn sweep(&self) -> usize {
        let cooldown = self.cooldown();
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let mut retried = 0;
        for (name, entry) in entries.iter_mut() {
            if entry.apply_cooldown(cooldown, now) {
                info!(adapter = %name, "Cooldown elapsed, retrying adapter as degraded");
                retried += 1;
            }
        }
        retried
    }

    /// Spawn the periodic cooldown sweep. Ends once the monitor is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let interval = Duration::from_secs(self.config.sweep_interval_secs.max(1));
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(monitor) => {
                        monitor.sweep().await;
                    }
                    None => break,
                }
            }
        })
    }
}

fn success_rate(successes: u64, failures: u64) -> f64 {
    let total = successes + failures;
    if total == 0 {
        1.0
    } else {
        successes as f64 / total as f64
    }
}

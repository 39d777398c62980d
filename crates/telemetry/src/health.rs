//! Component health for the harvester's collaborators.
//!
//! Each collaborator (store, connectors, analysis provider) holds its last
//! observed state. Workers update it as calls succeed or fail; the health
//! endpoints read it.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Health status for the service as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Last observed state of one collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ComponentState {
    /// No call has completed yet
    Unknown,
    Healthy,
    Unhealthy { message: String },
    /// Not configured; left out of reports
    Disabled { reason: String },
}

#[derive(Debug)]
struct Observed {
    state: ComponentState,
    since: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct ComponentHealth {
    name: &'static str,
    observed: RwLock<Observed>,
}

impl ComponentHealth {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            observed: RwLock::new(Observed {
                state: ComponentState::Unknown,
                since: None,
            }),
        }
    }

    /// Records `state`; `since` moves only when the state actually changes.
    fn observe(&self, state: ComponentState) {
        let mut observed = self.observed.write();
        if matches!(observed.state, ComponentState::Disabled { .. }) {
            return;
        }
        if observed.state != state {
            observed.state = state;
            observed.since = Some(Utc::now());
        }
    }

    pub fn set_healthy(&self) {
        self.observe(ComponentState::Healthy);
    }

    pub fn set_unhealthy(&self, msg: impl Into<String>) {
        self.observe(ComponentState::Unhealthy {
            message: msg.into(),
        });
    }

    /// Marks the component as unconfigured. Disabling is permanent.
    pub fn disable(&self, reason: impl Into<String>) {
        let mut observed = self.observed.write();
        observed.state = ComponentState::Disabled {
            reason: reason.into(),
        };
        observed.since = Some(Utc::now());
    }

    pub fn state(&self) -> ComponentState {
        self.observed.read().state.clone()
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.observed.read().state, ComponentState::Disabled { .. })
    }

    pub fn is_healthy(&self) -> bool {
        self.observed.read().state == ComponentState::Healthy
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn report(&self) -> ComponentHealthReport {
        let observed = self.observed.read();
        let message = match &observed.state {
            ComponentState::Unhealthy { message } => Some(message.clone()),
            ComponentState::Disabled { reason } => Some(reason.clone()),
            ComponentState::Unknown | ComponentState::Healthy => None,
        };
        ComponentHealthReport {
            name: self.name.to_string(),
            healthy: observed.state == ComponentState::Healthy,
            message,
            since: observed.since,
        }
    }
}

/// Aggregated health status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealthReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealthReport {
    pub name: String,
    pub healthy: bool,
    pub message: Option<String>,
    /// When the current state was first observed
    pub since: Option<DateTime<Utc>>,
}

pub struct HealthRegistry {
    pub clickhouse: ComponentHealth,
    pub reddit: ComponentHealth,
    pub twitter: ComponentHealth,
    pub analysis: ComponentHealth,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            clickhouse: ComponentHealth::new("clickhouse"),
            reddit: ComponentHealth::new("reddit"),
            twitter: ComponentHealth::new("twitter"),
            analysis: ComponentHealth::new("analysis"),
        }
    }

    /// Overall status over the configured components.
    ///
    /// The store is required; any other unhealthy component only degrades.
    pub fn report(&self) -> HealthReport {
        let components: Vec<ComponentHealthReport> = [
            &self.clickhouse,
            &self.reddit,
            &self.twitter,
            &self.analysis,
        ]
        .into_iter()
        .filter(|c| c.is_enabled())
        .map(ComponentHealth::report)
        .collect();

        let status = match (
            self.clickhouse.is_healthy(),
            components.iter().all(|c| c.healthy),
        ) {
            (false, _) => HealthStatus::Unhealthy,
            (true, true) => HealthStatus::Healthy,
            (true, false) => HealthStatus::Degraded,
        };

        HealthReport { status, components }
    }

    /// Ready once the store answers.
    pub fn is_ready(&self) -> bool {
        self.clickhouse.is_healthy()
    }

    pub fn is_alive(&self) -> bool {
        true
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub static HEALTH: std::sync::LazyLock<HealthRegistry> =
    std::sync::LazyLock::new(HealthRegistry::new);

pub fn health() -> &'static HealthRegistry {
    &HEALTH
}

use std::time::Duration;

use serde::Deserialize;

use crate::{heartbeat::HeartbeatPolicy, supervisor::PoolSettings, worker::WorkerSettings};

/// Startup configuration, read from `SWARM_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_owner_id")]
    pub owner_id: String,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_heartbeat_tick_budget")]
    pub heartbeat_tick_budget: u32,
    #[serde(default = "default_heartbeat_error_threshold")]
    pub heartbeat_error_threshold: u32,
    #[serde(default = "default_target_population")]
    pub target_population: u32,
    #[serde(default = "default_spawn_delay_min_secs")]
    pub spawn_delay_min_secs: u64,
    #[serde(default = "default_spawn_delay_max_secs")]
    pub spawn_delay_max_secs: u64,
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub log_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            base_url: default_base_url(),
            owner_id: default_owner_id(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            heartbeat_tick_budget: default_heartbeat_tick_budget(),
            heartbeat_error_threshold: default_heartbeat_error_threshold(),
            target_population: default_target_population(),
            spawn_delay_min_secs: default_spawn_delay_min_secs(),
            spawn_delay_max_secs: default_spawn_delay_max_secs(),
            restart_delay_ms: default_restart_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            log_path: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::load(
            config::Config::builder().add_source(
                config::Environment::with_prefix("SWARM").try_parsing(true),
            ),
        )
    }

    /// Falls back to defaults when the sources cannot be deserialised.
    pub fn load(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Self {
        builder
            .build()
            .and_then(|c| c.try_deserialize::<AppConfig>())
            .unwrap_or_default()
            .normalize()
    }

    fn normalize(mut self) -> Self {
        self.base_url = self.base_url.trim().to_string();
        if self.base_url.is_empty() {
            self.base_url = default_base_url();
        }
        self.owner_id = self.owner_id.trim().to_string();
        if self.owner_id.is_empty() {
            self.owner_id = default_owner_id();
        }
        if self.spawn_delay_min_secs > self.spawn_delay_max_secs {
            std::mem::swap(&mut self.spawn_delay_min_secs, &mut self.spawn_delay_max_secs);
        }
        self.heartbeat_error_threshold = self.heartbeat_error_threshold.max(1);
        self.log_path = self.log_path.take().and_then(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        });
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn heartbeat_policy(&self) -> HeartbeatPolicy {
        HeartbeatPolicy {
            interval: Duration::from_secs(self.heartbeat_interval_secs),
            tick_budget: self.heartbeat_tick_budget,
            error_threshold: self.heartbeat_error_threshold,
        }
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            heartbeat: self.heartbeat_policy(),
            restart_delay: Duration::from_millis(self.restart_delay_ms),
        }
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            target_population: self.target_population,
            spawn_delay_secs: self.spawn_delay_min_secs..=self.spawn_delay_max_secs,
            worker: self.worker_settings(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_owner_id() -> String {
    "demo".to_string()
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_heartbeat_tick_budget() -> u32 {
    30
}

fn default_heartbeat_error_threshold() -> u32 {
    5
}

fn default_target_population() -> u32 {
    200
}

fn default_spawn_delay_min_secs() -> u64 {
    3
}

fn default_spawn_delay_max_secs() -> u64 {
    5
}

fn default_restart_delay_ms() -> u64 {
    1_000
}

fn default_request_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sources_yield_defaults() {
        let cfg = AppConfig::load(config::Config::builder());
        assert_eq!(cfg.base_url, "http://127.0.0.1:8080");
        assert_eq!(cfg.target_population, 200);
        assert_eq!(cfg.pool_settings().spawn_delay_secs, 3..=5);
        let policy = cfg.heartbeat_policy();
        assert_eq!(policy.interval, Duration::from_secs(30));
        assert_eq!(policy.tick_budget, 30);
        assert_eq!(policy.error_threshold, 5);
        assert_eq!(cfg.worker_settings().restart_delay, Duration::from_secs(1));
        assert!(cfg.log_path.is_none());
    }

    #[test]
    fn overrides_are_applied_and_normalized() {
        let builder = config::Config::builder()
            .set_override("target_population", 12)
            .and_then(|b| b.set_override("spawn_delay_min_secs", 9))
            .and_then(|b| b.set_override("spawn_delay_max_secs", 2))
            .and_then(|b| b.set_override("heartbeat_error_threshold", 0))
            .and_then(|b| b.set_override("base_url", "  http://presence.test/api  "))
            .and_then(|b| b.set_override("log_path", "   "))
            .expect("overrides");
        let cfg = AppConfig::load(builder);

        assert_eq!(cfg.target_population, 12);
        assert_eq!(cfg.pool_settings().spawn_delay_secs, 2..=9);
        assert_eq!(cfg.heartbeat_error_threshold, 1);
        assert_eq!(cfg.base_url, "http://presence.test/api");
        assert!(cfg.log_path.is_none());
    }

    #[test]
    fn undecodable_values_fall_back_to_defaults() {
        let builder = config::Config::builder()
            .set_override("target_population", "lots")
            .expect("override");
        let cfg = AppConfig::load(builder);
        assert_eq!(cfg.target_population, 200);
    }
}

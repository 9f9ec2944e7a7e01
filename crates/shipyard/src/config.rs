//! Orchestrator configuration.
//!
//! Every field is optional; anything left out keeps the component default.
//! Durations are strings such as `"500ms"`, `"10s"`, `"10m"` or `"1h"`, and a
//! bare number means seconds.
//!
//! ```toml
//! [node_pool]
//! poll_interval = "10s"
//! registration_timeout = "15m"
//!
//! [service]
//! ack_timeout = "90s"
//!
//! [inventory]
//! max_concurrent_introspections = 16
//! introspection_timeout = "3s"
//!
//! [revision]
//! timeout = "20m"
//! max_attempts = 120
//! deployment_config = "OneAtATime"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use shipyard_inventory::{CollectorConfig, HttpIntrospector, INTROSPECTION_PATH, INTROSPECTION_PORT};
use shipyard_nodepool::ProvisionerConfig;
use shipyard_revision::RevisionConfig;
use shipyard_service::ScalerConfig;

const DEFAULT_INTROSPECTION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{field}: cannot parse duration {value:?}")]
    InvalidDuration { field: &'static str, value: String },

    #[error("{field}: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub node_pool: NodePoolSection,
    pub service: ServiceSection,
    pub inventory: InventorySection,
    pub revision: RevisionSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodePoolSection {
    pub poll_interval: Option<String>,
    pub lifecycle_timeout: Option<String>,
    pub registration_timeout: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub poll_interval: Option<String>,
    pub ack_poll_interval: Option<String>,
    pub ack_timeout: Option<String>,
    pub running_timeout: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventorySection {
    pub max_concurrent_introspections: Option<usize>,
    pub introspection_port: Option<u16>,
    pub introspection_path: Option<String>,
    pub introspection_timeout: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevisionSection {
    pub poll_interval: Option<String>,
    pub timeout: Option<String>,
    pub max_attempts: Option<u32>,
    pub deployment_config: Option<String>,
    pub description: Option<String>,
}

/// Per-component settings resolved from an `OrchestratorConfig`.
#[derive(Debug, Clone)]
pub struct ComponentConfigs {
    pub provisioner: ProvisionerConfig,
    pub scaler: ScalerConfig,
    pub collector: CollectorConfig,
    pub introspector: HttpIntrospector,
    pub revision: RevisionConfig,
}

impl Default for ComponentConfigs {
    fn default() -> Self {
        Self {
            provisioner: ProvisionerConfig::default(),
            scaler: ScalerConfig::default(),
            collector: CollectorConfig::default(),
            introspector: HttpIntrospector::default(),
            revision: RevisionConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Parse every duration and fill the gaps with component defaults.
    pub fn resolve(&self) -> Result<ComponentConfigs, ConfigError> {
        Ok(ComponentConfigs {
            provisioner: self.provisioner()?,
            scaler: self.scaler()?,
            collector: self.collector()?,
            introspector: self.introspector()?,
            revision: self.revision()?,
        })
    }

    pub fn provisioner(&self) -> Result<ProvisionerConfig, ConfigError> {
        let section = &self.node_pool;
        let defaults = ProvisionerConfig::default();
        Ok(ProvisionerConfig {
            poll_interval: duration_or(
                "node_pool.poll_interval",
                &section.poll_interval,
                defaults.poll_interval,
            )?,
            lifecycle_timeout: duration_or(
                "node_pool.lifecycle_timeout",
                &section.lifecycle_timeout,
                defaults.lifecycle_timeout,
            )?,
            registration_timeout: duration_or(
                "node_pool.registration_timeout",
                &section.registration_timeout,
                defaults.registration_timeout,
            )?,
        })
    }

    pub fn scaler(&self) -> Result<ScalerConfig, ConfigError> {
        let section = &self.service;
        let defaults = ScalerConfig::default();
        Ok(ScalerConfig {
            poll_interval: duration_or(
                "service.poll_interval",
                &section.poll_interval,
                defaults.poll_interval,
            )?,
            ack_poll_interval: duration_or(
                "service.ack_poll_interval",
                &section.ack_poll_interval,
                defaults.ack_poll_interval,
            )?,
            ack_timeout: duration_or(
                "service.ack_timeout",
                &section.ack_timeout,
                defaults.ack_timeout,
            )?,
            running_timeout: duration_or(
                "service.running_timeout",
                &section.running_timeout,
                defaults.running_timeout,
            )?,
        })
    }

    pub fn collector(&self) -> Result<CollectorConfig, ConfigError> {
        let defaults = CollectorConfig::default();
        let fan_out = self
            .inventory
            .max_concurrent_introspections
            .unwrap_or(defaults.max_concurrent_introspections);
        if fan_out == 0 {
            return Err(ConfigError::OutOfRange {
                field: "inventory.max_concurrent_introspections",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(CollectorConfig {
            max_concurrent_introspections: fan_out,
        })
    }

    pub fn introspector(&self) -> Result<HttpIntrospector, ConfigError> {
        let section = &self.inventory;
        let timeout = duration_or(
            "inventory.introspection_timeout",
            &section.introspection_timeout,
            DEFAULT_INTROSPECTION_TIMEOUT,
        )?;
        let path = section.introspection_path.as_deref().unwrap_or(INTROSPECTION_PATH);
        if !path.starts_with('/') {
            return Err(ConfigError::OutOfRange {
                field: "inventory.introspection_path",
                reason: format!("{path:?} must start with '/'"),
            });
        }
        Ok(HttpIntrospector::new(
            section.introspection_port.unwrap_or(INTROSPECTION_PORT),
            path,
            timeout,
        ))
    }

    pub fn revision(&self) -> Result<RevisionConfig, ConfigError> {
        let section = &self.revision;
        let defaults = RevisionConfig::default();
        Ok(RevisionConfig {
            poll_interval: duration_or(
                "revision.poll_interval",
                &section.poll_interval,
                defaults.poll_interval,
            )?,
            timeout: duration_or("revision.timeout", &section.timeout, defaults.timeout)?,
            max_attempts: section.max_attempts.unwrap_or(defaults.max_attempts),
            deployment_config: section.deployment_config.clone(),
            description: section.description.clone(),
        })
    }
}

fn duration_or(
    field: &'static str,
    value: &Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => parse_duration(raw).ok_or_else(|| ConfigError::InvalidDuration {
            field,
            value: raw.clone(),
        }),
    }
}

/// Parse `"500ms"`, `"30s"`, `"10m"`, `"1h"` or a bare number of seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else if let Some(hours) = s.strip_suffix('h') {
        hours
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|h| h.checked_mul(3600))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("10m"), Some(Duration::from_secs(600)));
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration(" 45 "), Some(Duration::from_secs(45)));
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert_eq!(parse_duration("ten seconds"), None);
        assert_eq!(parse_duration("-5s"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn empty_config_resolves_to_defaults() {
        let config = OrchestratorConfig::from_toml_str("").unwrap();
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.provisioner, ProvisionerConfig::default());
        assert_eq!(resolved.scaler, ScalerConfig::default());
        assert_eq!(resolved.collector, CollectorConfig::default());
        assert_eq!(resolved.revision, RevisionConfig::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = OrchestratorConfig::from_toml_str(
            r#"
            [node_pool]
            registration_timeout = "15m"

            [service]
            ack_timeout = "90s"

            [inventory]
            max_concurrent_introspections = 16

            [revision]
            timeout = "20m"
            max_attempts = 120
            deployment_config = "OneAtATime"
            "#,
        )
        .unwrap();
        let resolved = config.resolve().unwrap();

        assert_eq!(resolved.provisioner.registration_timeout, Duration::from_secs(900));
        assert_eq!(resolved.provisioner.lifecycle_timeout, Duration::from_secs(600));
        assert_eq!(resolved.scaler.ack_timeout, Duration::from_secs(90));
        assert_eq!(resolved.scaler.ack_poll_interval, Duration::from_secs(5));
        assert_eq!(resolved.collector.max_concurrent_introspections, 16);
        assert_eq!(resolved.revision.timeout, Duration::from_secs(1200));
        assert_eq!(resolved.revision.max_attempts, 120);
        assert_eq!(resolved.revision.deployment_config.as_deref(), Some("OneAtATime"));
    }

    #[test]
    fn bad_duration_names_the_field() {
        let config = OrchestratorConfig::from_toml_str(
            r#"
            [service]
            running_timeout = "forever"
            "#,
        )
        .unwrap();
        let err = config.resolve().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidDuration { field: "service.running_timeout", .. }
        ));
    }

    #[test]
    fn zero_fan_out_is_rejected() {
        let config = OrchestratorConfig {
            inventory: InventorySection {
                max_concurrent_introspections: Some(0),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            config.collector(),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn relative_introspection_path_is_rejected() {
        let config = OrchestratorConfig::from_toml_str(
            r#"
            [inventory]
            introspection_path = "v1/tasks"
            "#,
        )
        .unwrap();
        assert!(config.introspector().is_err());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = OrchestratorConfig::from_toml_str("[service\nack_timeout = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}

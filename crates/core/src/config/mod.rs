use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{EventMask, Result, SceneError};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scene: SceneConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.scene.validate()?;
        Ok(config)
    }
}

/// Configuration of the presentation surface and its event queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub width: u32,
    pub height: u32,
    /// Period of the tick source in milliseconds.
    pub tick_interval_ms: u64,
    /// Event classes delivered by `Scene::receive`, by name.
    pub mask: Vec<String>,
    /// Advance time only through `Scene::advance`.
    pub lock_step: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            tick_interval_ms: 1000,
            mask: vec!["all".to_string()],
            lock_step: false,
        }
    }
}

impl SceneConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_lock_step(mut self, lock_step: bool) -> Self {
        self.lock_step = lock_step;
        self
    }

    pub fn with_mask(mut self, mask: EventMask) -> Self {
        self.mask = mask.names().into_iter().map(str::to_string).collect();
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Parses the configured class names into a mask.
    pub fn event_mask(&self) -> Result<EventMask> {
        self.mask.iter().try_fold(EventMask::NONE, |mask, name| {
            EventMask::from_name(name)
                .map(|bit| mask | bit)
                .ok_or_else(|| SceneError::msg(format!("unknown event class `{name}`")))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SceneError::InvalidConfig("scene size must be non-zero"));
        }
        if self.tick_interval_ms == 0 {
            return Err(SceneError::InvalidConfig("tick interval must be non-zero"));
        }
        self.event_mask().map(|_| ())
    }
}

/// Timing knobs of the threaded [`SimulatedEngine`](crate::SimulatedEngine).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Delay before a freshly linked terminal reports data flow.
    pub link_latency_ms: u64,
    /// Delay between a request and the matching terminal signal.
    pub signal_latency_ms: u64,
    /// Whether the scene renders to a video sink in addition to audio.
    pub video_sink: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            link_latency_ms: 5,
            signal_latency_ms: 1,
            video_sink: true,
        }
    }
}

impl EngineConfig {
    pub fn link_latency(&self) -> Duration {
        Duration::from_millis(self.link_latency_ms)
    }

    pub fn signal_latency(&self) -> Duration {
        Duration::from_millis(self.signal_latency_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config = AppConfig::from_json_str(r#"{ "scene": { "width": 320 } }"#).unwrap();
        assert_eq!(config.scene.width, 320);
        assert_eq!(config.scene.height, 600);
        assert!(!config.scene.lock_step);
        assert_eq!(config.scene.event_mask().unwrap(), EventMask::ALL);
    }

    #[test]
    fn rejects_zero_tick_interval() {
        let err = AppConfig::from_json_str(r#"{ "scene": { "tick_interval_ms": 0 } }"#)
            .unwrap_err();
        assert!(format!("{err}").contains("tick interval"));
    }

    #[test]
    fn rejects_unknown_mask_class() {
        let config = SceneConfig {
            mask: vec!["tick".into(), "bogus".into()],
            ..SceneConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(format!("{err}").contains("bogus"));
    }

    #[test]
    fn oversized_tick_interval_saturates() {
        let config = SceneConfig::default().with_tick_interval(Duration::MAX);
        assert_eq!(config.tick_interval_ms, u64::MAX);

        let config = SceneConfig::default().with_tick_interval(Duration::from_millis(40));
        assert_eq!(config.tick_interval(), Duration::from_millis(40));
    }

    #[test]
    fn mask_round_trips_through_names() {
        let config = SceneConfig::default().with_mask(EventMask::TICK | EventMask::ERROR);
        assert_eq!(
            config.event_mask().unwrap(),
            EventMask::TICK | EventMask::ERROR
        );
    }
}

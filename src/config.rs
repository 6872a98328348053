//! Runtime tunables gathered in one place.

use std::str::FromStr;
use std::time::Duration;

use crate::debounce::DebounceConfig;
use crate::interaction::InteractionConfig;
use crate::layout::LayoutConfig;

/// Everything the application context can be tuned with.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Config {
    pub layout: LayoutConfig,
    pub interaction: InteractionConfig,
    pub debounce: DebounceConfig,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_millis_or(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

impl Config {
    /// Parses configuration from environment variables.
    ///
    /// Falls back to defaults when env vars are not set or invalid.
    ///
    /// # Environment Variables
    ///
    /// - `TAGMAP_REPULSION` (f64, default 1000)
    /// - `TAGMAP_ATTRACTION` (f64, default 0.0001)
    /// - `TAGMAP_INITIAL_TEMPERATURE` (f64, default 1000)
    /// - `TAGMAP_REHEAT_TEMPERATURE` (f64, default 500)
    /// - `TAGMAP_COOLING_STEP` (f64, default 0.01)
    /// - `TAGMAP_REATTACH_RADIUS` (f64, default 300): world distance within which a
    ///   released tag finds a new parent
    /// - `TAGMAP_DOUBLE_CLICK_MS` (u64, default 300)
    /// - `TAGMAP_QUERY_DEBOUNCE_MS` (u64, default 300)
    /// - `TAGMAP_EDIT_DEBOUNCE_MS` (u64, default 300)
    /// - `TAGMAP_RENAME_DEBOUNCE_MS` (u64, default 500)
    ///
    /// # Examples
    ///
    /// ```
    /// use tagmap::Config;
    ///
    /// let config = Config::from_env();
    /// assert_eq!(config.interaction.reattach_radius, 300.0); // default when env var not set
    /// ```
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let layout = LayoutConfig {
            repulsion: env_or("TAGMAP_REPULSION", defaults.layout.repulsion),
            attraction: env_or("TAGMAP_ATTRACTION", defaults.layout.attraction),
            initial_temperature: env_or(
                "TAGMAP_INITIAL_TEMPERATURE",
                defaults.layout.initial_temperature,
            ),
            reheat_temperature: env_or(
                "TAGMAP_REHEAT_TEMPERATURE",
                defaults.layout.reheat_temperature,
            ),
            cooling_step: env_or("TAGMAP_COOLING_STEP", defaults.layout.cooling_step),
            ..defaults.layout
        };

        let interaction = InteractionConfig {
            reattach_radius: env_or(
                "TAGMAP_REATTACH_RADIUS",
                defaults.interaction.reattach_radius,
            ),
            double_click: env_millis_or(
                "TAGMAP_DOUBLE_CLICK_MS",
                defaults.interaction.double_click,
            ),
            ..defaults.interaction
        };

        let debounce = DebounceConfig {
            query: env_millis_or("TAGMAP_QUERY_DEBOUNCE_MS", defaults.debounce.query),
            entry: env_millis_or("TAGMAP_EDIT_DEBOUNCE_MS", defaults.debounce.entry),
            rename: env_millis_or("TAGMAP_RENAME_DEBOUNCE_MS", defaults.debounce.rename),
        };

        Self {
            layout,
            interaction,
            debounce,
        }
    }
}

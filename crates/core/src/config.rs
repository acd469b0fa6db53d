use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::FarmError;
use crate::geometry::{Geometry, Orientation};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Profiled key lookup: tries `{PROFILE}_{KEY}` first, falls back to `{KEY}`.
struct Profiled<'a, F> {
    profile: &'a str,
    lookup: F,
}

impl<F> Profiled<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn opt(&self, key: &str) -> Option<String> {
        if !self.profile.is_empty() {
            if let Some(v) = (self.lookup)(&format!("{}_{}", self.profile, key)) {
                return Some(v);
            }
        }
        (self.lookup)(key)
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.opt(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        match self.opt(key) {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(key, value = %raw, "unparseable value, using default");
                default
            }),
            None => default,
        }
    }
}

// ── Top-level config ──────────────────────────────────────────

/// Default grid, matching the classic 800x600 render.
pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 600;
pub const DEFAULT_MAX_ITER: u32 = 8 * 65536;
pub const DEFAULT_OUTPUT: &str = "mandelbrot.ppm";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub render: RenderConfig,
    pub local: LocalConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `MANDELFARM_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_opt("MANDELFARM_PROFILE").unwrap_or_default();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        Self::from_lookup(profile, env_opt)
    }

    /// Build config from an arbitrary key lookup instead of the process environment.
    pub fn from_lookup<F>(profile: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let p = profile.to_uppercase();
        let source = Profiled {
            profile: &p,
            lookup,
        };
        Self {
            profile: p.clone(),
            render: RenderConfig::from_source(&source),
            local: LocalConfig::from_source(&source),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  render:  {}x{} K={} orientation={}",
            self.render.width,
            self.render.height,
            self.render.max_iter,
            self.render.orientation
        );
        tracing::info!("  output:  {}", self.render.output.display());
        tracing::info!("  local:   threads={}", self.local.threads);
    }

    /// JSON view for metrics dumps.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "render": {
                "width": self.render.width,
                "height": self.render.height,
                "max_iter": self.render.max_iter,
                "orientation": self.render.orientation.to_string(),
                "output": self.render.output,
            },
            "local": { "threads": self.local.threads },
        })
    }
}

// ── Render ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub max_iter: u32,
    pub output: PathBuf,
    pub orientation: Orientation,
}

impl RenderConfig {
    fn from_source<F: Fn(&str) -> Option<String>>(s: &Profiled<'_, F>) -> Self {
        Self {
            width: s.parsed("MANDELFARM_WIDTH", DEFAULT_WIDTH),
            height: s.parsed("MANDELFARM_HEIGHT", DEFAULT_HEIGHT),
            max_iter: s.parsed("MANDELFARM_MAX_ITER", DEFAULT_MAX_ITER),
            output: PathBuf::from(s.or("MANDELFARM_OUTPUT", DEFAULT_OUTPUT)),
            orientation: s.parsed("MANDELFARM_ORIENTATION", Orientation::default()),
        }
    }

    /// Validate the configured grid.
    pub fn geometry(&self) -> Result<Geometry, FarmError> {
        Geometry::new(self.width, self.height, self.max_iter)
    }
}

// ── Local execution ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Threads used when the coordinator renders alone. 0 = one per core.
    pub threads: usize,
}

impl LocalConfig {
    fn from_source<F: Fn(&str) -> Option<String>>(s: &Profiled<'_, F>) -> Self {
        Self {
            threads: s.parsed("MANDELFARM_LOCAL_THREADS", 0),
        }
    }
}

// backend/src/context.rs

use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::config::CoreConfig;

/// Where "today" comes from. Bonus evaluation reads it instead of the wall
/// clock so runs can be pinned to a date.
#[derive(Clone)]
pub enum TodaySource {
    System,
    Fixed(NaiveDate),
    Custom(Arc<dyn Fn() -> NaiveDate + Send + Sync>),
}

impl TodaySource {
    pub fn today(&self) -> NaiveDate {
        match self {
            Self::System => Local::now().date_naive(),
            Self::Fixed(d) => *d,
            Self::Custom(f) => f(),
        }
    }
}

impl std::fmt::Debug for TodaySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => f.write_str("System"),
            Self::Fixed(d) => write!(f, "Fixed({d})"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Explicit context handed to every service in place of process globals.
#[derive(Debug, Clone)]
pub struct CoreContext {
    pub config: CoreConfig,
    pub today: TodaySource,
}

impl CoreContext {
    pub fn new(config: CoreConfig) -> Self {
        let today = match config.bonus_today {
            Some(d) => TodaySource::Fixed(d),
            None => TodaySource::System,
        };
        Self { config, today }
    }

    pub fn with_today(mut self, today: TodaySource) -> Self {
        self.today = today;
        self
    }
}

impl Default for CoreContext {
    fn default() -> Self {
        Self::new(CoreConfig::default())
    }
}

// backend/src/lib.rs

use std::sync::Arc;

use sqlx::{Pool, Postgres};

pub mod bonus;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod planner;
pub mod report;
pub mod routes;
pub mod schedule;
pub mod scope;
pub mod store;

use bonus::BonusEvaluator;
use context::CoreContext;
use planner::RosterPlanner;
use report::ReportService;
use schedule::ScheduleValidator;
use store::{PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub store: Arc<dyn Store>,
    pub reports: ReportService,
    pub planner: RosterPlanner,
    pub bonus: BonusEvaluator,
    pub schedule: ScheduleValidator,
}

impl AppState {
    pub fn new(pool: Pool<Postgres>, ctx: CoreContext) -> Self {
        let store: Arc<dyn Store> = Arc::new(PgStore::new(pool.clone()));
        Self {
            pool,
            reports: ReportService::new(store.clone(), ctx.clone()),
            planner: RosterPlanner::new(store.clone(), ctx.clone()),
            bonus: BonusEvaluator::new(store.clone(), ctx),
            schedule: ScheduleValidator::new(store.clone()),
            store,
        }
    }
}

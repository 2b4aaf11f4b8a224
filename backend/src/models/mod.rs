// backend/src/models/mod.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub mod identity;

// ───────────────────────────────────────
// Organisation
// ───────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Area {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Agent {
    pub id: i64,
    pub apellido: String,
    pub nombre: String,
    pub dni: Option<String>,
    pub cuil: Option<String>,
    pub legajo: Option<String>,
    pub area_id: Option<i64>,
    pub supervisor_id: Option<i64>,
    pub active: bool,
    pub default_entry: Option<NaiveTime>,
    pub default_exit: Option<NaiveTime>,
}

impl Agent {
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.apellido, self.nombre)
    }
}

// ───────────────────────────────────────
// Roles (closed set, ordered by authority)
// ───────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Agente,
    AgenteAvanzado,
    Jefatura,
    Director,
    Administrator,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Agente => "agente",
            Self::AgenteAvanzado => "agente_avanzado",
            Self::Jefatura => "jefatura",
            Self::Director => "director",
            Self::Administrator => "administrator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace([' ', '-'], "_");
        match key.as_str() {
            "agente" | "agent" => Ok(Self::Agente),
            "agente_avanzado" | "advanced_agent" => Ok(Self::AgenteAvanzado),
            "jefatura" | "jefe" => Ok(Self::Jefatura),
            "director" => Ok(Self::Director),
            "administrator" | "administrador" | "admin" => Ok(Self::Administrator),
            _ => Err(format!("unknown role '{s}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRole {
    pub id: i64,
    pub agent_id: i64,
    pub role: Role,
    pub area_id: Option<i64>,
}

// ───────────────────────────────────────
// Rosters & guards
// ───────────────────────────────────────
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self { $(Self::$variant => $text),+ }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterState {
    Draft,
    Generated,
    PendingApproval,
    Approved,
    Published,
}

text_enum!(RosterState {
    Draft => "draft",
    Generated => "generated",
    PendingApproval => "pending_approval",
    Approved => "approved",
    Published => "published",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub id: i64,
    pub area_id: i64,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub kind: String, // "monthly" for planner output
    pub state: RosterState,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub created_by: i64,
    pub approved_by: Option<i64>,
    pub payload_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    Draft,
    Programmed,
    Completed,
    Cancelled,
}

text_enum!(GuardState {
    Draft => "draft",
    Programmed => "programmed",
    Completed => "completed",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guard {
    pub id: i64,
    pub roster_id: i64,
    pub agent_id: i64,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub planned_hours: Decimal,
    pub effective_hours: Option<Decimal>,
    pub guard_type: String,
    pub state: GuardState,
    pub active: bool,
    pub observations: Option<String>,
}

impl Guard {
    /// A guard starting later than it ends runs into the following day.
    pub fn crosses_midnight(&self) -> bool {
        matches!((self.start_time, self.end_time), (Some(s), Some(e)) if s > e)
    }

    /// Hours a report shows for this guard.
    pub fn reported_hours(&self) -> Decimal {
        self.effective_hours.unwrap_or(self.planned_hours)
    }
}

/// A guard joined with the bits of its agent and roster the reports need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedGuard {
    pub guard: Guard,
    pub agent_area_id: Option<i64>,
    pub roster_area_id: i64,
    pub roster_state: RosterState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AttendanceRecord {
    pub agent_id: i64,
    pub date: NaiveDate,
    pub state: String,
}

// ───────────────────────────────────────
// Calendar: holidays & leaves
// ───────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Holiday {
    pub id: i64,
    pub name: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub area_id: Option<i64>, // None = national
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveState {
    Requested,
    Approved,
    Rejected,
}

text_enum!(LeaveState {
    Requested => "requested",
    Approved => "approved",
    Rejected => "rejected",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LeaveType {
    pub id: i64,
    pub code: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leave {
    pub id: i64,
    pub agent_id: i64,
    pub leave_type_id: i64,
    pub type_code: Option<String>, // joined from leave_types.code
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub state: LeaveState,
}

impl Leave {
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.date_from <= day && day <= self.date_to
    }
}

// ───────────────────────────────────────
// Bonus (plus) & time parameters
// ───────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct BonusRule {
    pub id: i64,
    pub active: bool,
    pub vigente_desde: NaiveDate,
    pub vigente_hasta: Option<NaiveDate>,
    pub monthly_minimum_hours: Decimal,
    pub bonus_percentage: Decimal,
    pub area_id: Option<i64>,
}

impl BonusRule {
    pub fn is_vigente(&self, today: NaiveDate) -> bool {
        self.active && self.vigente_desde <= today && self.vigente_hasta.map_or(true, |h| h >= today)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct BonusAssignment {
    pub agent_id: i64,
    pub year: i32,
    pub month: i32,
    pub effective_hours: Decimal,
    pub percentage: Decimal,
    pub version: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AreaTimeParameters {
    pub id: i64,
    pub area_id: i64,
    pub vigente_desde: NaiveDate,
    pub vigente_hasta: Option<NaiveDate>,
    pub entry_start: NaiveTime,
    pub entry_end: NaiveTime,
    pub exit_start: NaiveTime,
    pub exit_end: NaiveTime,
    pub entry_tolerance_min: i32,
    pub exit_tolerance_min: i32,
}

impl AreaTimeParameters {
    pub fn is_vigente(&self, day: NaiveDate) -> bool {
        self.vigente_desde <= day && self.vigente_hasta.map_or(true, |h| h >= day)
    }
}

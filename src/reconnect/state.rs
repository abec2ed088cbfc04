//! Reconnection state machine.
//!
//! [`transition`] is pure: it maps a state, an event and the current time
//! to the next state, including the log lines the event produces. Timers,
//! I/O and the `tracing` mirror of the feed live in
//! [`AutoReconnector`](super::AutoReconnector), which only feeds events in.
//!
//! Every log entry records the status it left the machine in, so observers
//! reading coalesced snapshots can still replay each status change in order.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

/// Default bound of the log feed.
pub const DEFAULT_LOG_CAPACITY: usize = 50;

/// Where the recovery loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconnectStatus {
    Idle,
    CheckingNetwork,
    CheckingHealth,
    RunningDiscovery,
    Connected,
    NoWifi,
    Failed,
}

impl ReconnectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconnectStatus::Idle => "idle",
            ReconnectStatus::CheckingNetwork => "checking-network",
            ReconnectStatus::CheckingHealth => "checking-health",
            ReconnectStatus::RunningDiscovery => "running-discovery",
            ReconnectStatus::Connected => "connected",
            ReconnectStatus::NoWifi => "no-wifi",
            ReconnectStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ReconnectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Error,
    Success,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Error => "ERROR",
            LogLevel::Success => "SUCCESS",
        }
    }
}

/// One line of the user-facing log feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Monotonic per feed; lets observers tell new entries from old ones
    pub seq: u64,
    /// Local wall clock, `HH:MM:SS`
    pub timestamp: String,
    /// Status right after the event that wrote this entry
    pub status: ReconnectStatus,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.timestamp, self.level.as_str(), self.message)
    }
}

/// Full snapshot published on every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectState {
    pub status: ReconnectStatus,
    pub is_reconnecting: bool,
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Newest first, bounded by the feed capacity
    pub logs: VecDeque<LogEntry>,
    #[serde(skip)]
    next_seq: u64,
    #[serde(skip)]
    capacity: usize,
}

impl ReconnectState {
    pub fn new(capacity: usize) -> Self {
        Self {
            status: ReconnectStatus::Idle,
            is_reconnecting: false,
            attempts: 0,
            last_error: None,
            logs: VecDeque::with_capacity(capacity),
            next_seq: 1,
            capacity: capacity.max(1),
        }
    }

    /// Prepend an entry stamped with the current time, dropping the oldest
    /// past capacity.
    pub fn push_log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.push_log_at(Local::now(), level, message);
    }

    /// Like [`push_log`](Self::push_log) with an explicit timestamp.
    pub fn push_log_at(
        &mut self,
        at: DateTime<Local>,
        level: LogLevel,
        message: impl Into<String>,
    ) {
        self.logs.push_front(LogEntry {
            seq: self.next_seq,
            timestamp: at.format("%H:%M:%S").to_string(),
            status: self.status,
            level,
            message: message.into(),
        });
        self.next_seq += 1;
        self.logs.truncate(self.capacity);
    }

    /// Newest entry, if any.
    pub fn latest_log(&self) -> Option<&LogEntry> {
        self.logs.front()
    }

    /// Entries with `seq` greater than `after`, oldest first.
    pub fn logs_since(&self, after: u64) -> impl Iterator<Item = &LogEntry> {
        self.logs.iter().rev().filter(move |entry| entry.seq > after)
    }
}

impl Default for ReconnectState {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectEvent {
    Started,
    CycleBegan,
    NetworkUnavailable,
    NetworkAvailable,
    HealthProbe { attempt: u32, total: u32 },
    HealthConfirmed,
    HealthExhausted,
    DiscoveryFound { url: String },
    DiscoveryFailed { reason: String },
    VerificationFailed,
    Waiting { delay_secs: u64 },
    DiscoveryLog { line: String },
    Stopped,
}

/// Compute the state after `event`, stamping new log entries with `now`.
///
/// The machine only moves along
/// `idle -> checking-network -> {no-wifi | checking-health} -> {connected | running-discovery} -> {connected | failed}`;
/// probes and discovery results inside a phase are logged without a
/// status change.
pub fn transition(
    state: &ReconnectState,
    event: &ReconnectEvent,
    now: DateTime<Local>,
) -> ReconnectState {
    use ReconnectEvent as E;
    use ReconnectStatus as S;

    let mut next = state.clone();
    match event {
        E::Started => {
            next.status = S::CheckingNetwork;
            next.is_reconnecting = true;
            next.attempts = 0;
            next.last_error = None;
            next.push_log_at(now, LogLevel::Info, "Iniciando reconexión automática");
        }
        E::CycleBegan => {
            next.attempts += 1;
            next.status = S::CheckingNetwork;
            let message = format!("Intento #{}: verificando red", next.attempts);
            next.push_log_at(now, LogLevel::Info, message);
        }
        E::NetworkUnavailable => {
            next.status = S::NoWifi;
            next.last_error = Some("Sin conexión WiFi".to_string());
            next.push_log_at(now, LogLevel::Error, "Sin conexión WiFi");
        }
        E::NetworkAvailable => {
            next.status = S::CheckingHealth;
            next.push_log_at(now, LogLevel::Info, "Red WiFi disponible");
        }
        E::HealthProbe { attempt, total } => {
            next.push_log_at(
                now,
                LogLevel::Info,
                format!("Verificando servidor ({}/{})", attempt, total),
            );
        }
        E::HealthConfirmed => {
            next.status = S::Connected;
            next.is_reconnecting = false;
            next.last_error = None;
            next.push_log_at(now, LogLevel::Success, "Servidor disponible");
            next.push_log_at(now, LogLevel::Success, "Conexión restablecida");
        }
        E::HealthExhausted => {
            next.status = S::RunningDiscovery;
            next.push_log_at(
                now,
                LogLevel::Error,
                "Servidor no responde, buscando en la red",
            );
        }
        E::DiscoveryFound { url } => {
            next.push_log_at(now, LogLevel::Info, format!("Servidor encontrado en {}", url));
        }
        E::DiscoveryFailed { reason } => {
            next.status = S::Failed;
            next.last_error = Some(reason.clone());
            next.push_log_at(
                now,
                LogLevel::Error,
                format!("No se encontró el servidor: {}", reason),
            );
        }
        E::VerificationFailed => {
            next.status = S::Failed;
            next.last_error = Some("El servidor encontrado no responde".to_string());
            next.push_log_at(now, LogLevel::Error, "El servidor encontrado no responde");
        }
        E::Waiting { delay_secs } => {
            next.push_log_at(now, LogLevel::Info, format!("Reintentando en {}s", delay_secs));
        }
        E::DiscoveryLog { line } => {
            next.push_log_at(now, LogLevel::Info, format!("[Discovery] {}", line));
        }
        E::Stopped => {
            next.status = S::Idle;
            next.is_reconnecting = false;
            next.push_log_at(now, LogLevel::Info, "Reconexión detenida");
        }
    }
    next
}

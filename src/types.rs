// src/types.rs

//! Small vocabulary types shared across the crate.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Identifier correlating a pipeline stage or pool member with its output
/// callbacks and its entry in a results map.
pub type Key = String;

/// Which standard stream a chunk or line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

/// Scheduling priority of a pool member.
///
/// Variants are declared in ascending order, so the derived `Ord` matches
/// the numeric weights returned by [`Priority::weight`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    pub fn weight(self) -> u16 {
        match self {
            Priority::Low => 100,
            Priority::Normal => 200,
            Priority::High => 300,
            Priority::Critical => 400,
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!(
                "invalid priority: {other} (expected low, normal, high or critical)"
            )),
        }
    }
}

/// Portable signal set.
///
/// On Unix each variant maps to the POSIX signal of the same meaning. On
/// Windows only `Interrupt` has a native counterpart (`CTRL_BREAK_EVENT`);
/// everything else degrades to a hard kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Interrupt,
    Terminate,
    Kill,
    Hangup,
    Quit,
    User1,
    User2,
}

impl Signal {
    /// Signal number as numbered on Linux. Delivery never goes through this
    /// number; the platform layer maps variants to native signals directly.
    pub fn number(self) -> i32 {
        match self {
            Signal::Hangup => 1,
            Signal::Interrupt => 2,
            Signal::Quit => 3,
            Signal::Kill => 9,
            Signal::User1 => 10,
            Signal::User2 => 12,
            Signal::Terminate => 15,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
            Signal::Kill => "SIGKILL",
            Signal::Hangup => "SIGHUP",
            Signal::Quit => "SIGQUIT",
            Signal::User1 => "SIGUSR1",
            Signal::User2 => "SIGUSR2",
        };
        f.write_str(name)
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(num) = trimmed.parse::<i32>() {
            return match num {
                1 => Ok(Signal::Hangup),
                2 => Ok(Signal::Interrupt),
                3 => Ok(Signal::Quit),
                9 => Ok(Signal::Kill),
                10 => Ok(Signal::User1),
                12 => Ok(Signal::User2),
                15 => Ok(Signal::Terminate),
                other => Err(format!("unsupported signal number: {other}")),
            };
        }

        let upper = trimmed.to_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        match name {
            "INT" => Ok(Signal::Interrupt),
            "TERM" => Ok(Signal::Terminate),
            "KILL" => Ok(Signal::Kill),
            "HUP" => Ok(Signal::Hangup),
            "QUIT" => Ok(Signal::Quit),
            "USR1" => Ok(Signal::User1),
            "USR2" => Ok(Signal::User2),
            _ => Err(format!("unknown signal: {trimmed}")),
        }
    }
}

/// What a configuration file asks `procflow` to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Independent commands under bounded concurrency.
    #[default]
    Pool,
    /// Commands chained stdout → stdin, in declaration order.
    Pipeline,
}

/// Built-in pool scheduling strategies selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    #[default]
    Priority,
    ShortestTimeout,
    Fifo,
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "priority" => Ok(StrategyKind::Priority),
            "shortest-timeout" => Ok(StrategyKind::ShortestTimeout),
            "fifo" => Ok(StrategyKind::Fifo),
            other => Err(format!(
                "invalid strategy: {other} (expected \"priority\", \"shortest-timeout\" or \"fifo\")"
            )),
        }
    }
}

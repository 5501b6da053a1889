//! Command queue messages and their decoding into table commands.

use core::fmt;

use serde::{Deserialize, Serialize};

use prefixd_core::{PerfEvents, PrefixEntry, PrefixType};

/// Operation named by a queued [`PrefixUpdateRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrefixUpdateCommand {
    AddPrefixes,
    WithdrawPrefixes,
    WithdrawPrefixesByType,
    SyncPrefixesByType,
}

impl PrefixUpdateCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            PrefixUpdateCommand::AddPrefixes => "ADD_PREFIXES",
            PrefixUpdateCommand::WithdrawPrefixes => "WITHDRAW_PREFIXES",
            PrefixUpdateCommand::WithdrawPrefixesByType => "WITHDRAW_PREFIXES_BY_TYPE",
            PrefixUpdateCommand::SyncPrefixesByType => "SYNC_PREFIXES_BY_TYPE",
        }
    }
}

impl fmt::Display for PrefixUpdateCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a queued request cannot be turned into a command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("{0} requires a prefix type")]
    MissingPrefixType(PrefixUpdateCommand),
}

/// A message on the ordered command queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixUpdateRequest {
    pub cmd: PrefixUpdateCommand,
    #[serde(default)]
    pub prefixes: Vec<PrefixEntry>,
    #[serde(default)]
    pub prefix_type: Option<PrefixType>,
    #[serde(default)]
    pub perf_events: Option<PerfEvents>,
}

impl PrefixUpdateRequest {
    pub fn add(prefixes: Vec<PrefixEntry>) -> Self {
        Self::new(PrefixUpdateCommand::AddPrefixes, prefixes, None)
    }

    pub fn withdraw(prefixes: Vec<PrefixEntry>) -> Self {
        Self::new(PrefixUpdateCommand::WithdrawPrefixes, prefixes, None)
    }

    pub fn withdraw_by_type(prefix_type: PrefixType) -> Self {
        Self::new(
            PrefixUpdateCommand::WithdrawPrefixesByType,
            Vec::new(),
            Some(prefix_type),
        )
    }

    pub fn sync_by_type(prefix_type: PrefixType, prefixes: Vec<PrefixEntry>) -> Self {
        Self::new(
            PrefixUpdateCommand::SyncPrefixesByType,
            prefixes,
            Some(prefix_type),
        )
    }

    fn new(
        cmd: PrefixUpdateCommand,
        prefixes: Vec<PrefixEntry>,
        prefix_type: Option<PrefixType>,
    ) -> Self {
        Self {
            cmd,
            prefixes,
            prefix_type,
            perf_events: None,
        }
    }

    #[must_use]
    pub fn with_perf_events(mut self, perf_events: PerfEvents) -> Self {
        self.perf_events = Some(perf_events);
        self
    }

    /// Validate the request and split off its trace.
    pub fn into_command(self) -> Result<(PrefixCommand, Option<PerfEvents>), CommandError> {
        let command = match self.cmd {
            PrefixUpdateCommand::AddPrefixes => PrefixCommand::Advertise(self.prefixes),
            PrefixUpdateCommand::WithdrawPrefixes => PrefixCommand::Withdraw(self.prefixes),
            PrefixUpdateCommand::WithdrawPrefixesByType => PrefixCommand::WithdrawByType(
                self.prefix_type
                    .ok_or(CommandError::MissingPrefixType(self.cmd))?,
            ),
            PrefixUpdateCommand::SyncPrefixesByType => PrefixCommand::SyncByType(
                self.prefix_type
                    .ok_or(CommandError::MissingPrefixType(self.cmd))?,
                self.prefixes,
            ),
        };
        Ok((command, self.perf_events))
    }
}

/// A validated mutation of the prefix table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixCommand {
    Advertise(Vec<PrefixEntry>),
    Withdraw(Vec<PrefixEntry>),
    WithdrawByType(PrefixType),
    SyncByType(PrefixType, Vec<PrefixEntry>),
}

impl PrefixCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PrefixCommand::Advertise(_) => "advertise",
            PrefixCommand::Withdraw(_) => "withdraw",
            PrefixCommand::WithdrawByType(_) => "withdraw_by_type",
            PrefixCommand::SyncByType(..) => "sync_by_type",
        }
    }
}

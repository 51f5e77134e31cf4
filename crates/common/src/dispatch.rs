//! Batch command dispatch.
//!
//! Every batch action has the same shape: read the grid's selection, ask the
//! user to confirm, send one request, then settle the reply into an optional
//! alert and an optional grid refresh. [`Batch::prepare`], [`Pending::send`]
//! and [`Reply::settle`] are those steps; [`confirm_and_dispatch`] chains them
//! for front ends that can confirm synchronously.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    command::{Command, Target},
    grid::{Record, Table},
    models::Pk,
    outcome::{CommandResult, Outcome},
};

/// File name used when the server does not name the archive.
pub const DEFAULT_DOWNLOAD_NAME: &str = "result.zip";

/// The grid as seen by the dispatcher.
pub trait Grid {
    /// Currently selected PKs, read fresh on every call.
    fn selection(&self) -> Vec<Pk>;
    /// Requests a re-fetch that keeps paging and sort.
    fn refresh(&mut self);
}

impl<R: Record> Grid for Table<R> {
    fn selection(&self) -> Vec<Pk> {
        self.selected_pks()
    }

    fn refresh(&mut self) {
        Table::refresh(self);
    }
}

/// User-facing prompts.
pub trait Confirm {
    fn confirm(&mut self, message: &str) -> bool;
    fn alert(&mut self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub target: Target,
    pub command: Command,
    pub pks: Vec<Pk>,
}

impl BatchRequest {
    /// Form fields in the order the server reads them.
    pub fn form(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("type", self.target.to_string()),
            ("command", self.command.code().to_string()),
        ];
        fields.extend(self.pks.iter().map(|pk| ("pk_list[]", pk.to_string())));
        fields
    }
}

/// An archive returned by the batch download endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn batch_control(&self, request: &BatchRequest) -> Result<CommandResult>;
    async fn batch_download(&self, pks: &[Pk]) -> Result<Download>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Batch {
    /// Fetch the result files of the selected scans.
    Download,
    Command { target: Target, command: Command },
}

impl Batch {
    pub fn scan(command: Command) -> Self {
        Batch::Command {
            target: Target::Scan,
            command,
        }
    }

    pub fn scanner(command: Command) -> Self {
        Batch::Command {
            target: Target::Scanner,
            command,
        }
    }

    pub fn confirmation(&self, count: usize) -> String {
        match self {
            Batch::Download => {
                format!("You are about to batch-download {count} scan(s). Are you sure?")
            }
            Batch::Command { target, command } => format!(
                "You are about to batch-{} {} {}(s). Are you sure?",
                target.label(command),
                count,
                target.noun()
            ),
        }
    }

    /// `None` when nothing is selected.
    pub fn prepare(self, selection: Vec<Pk>) -> Option<Pending> {
        if selection.is_empty() {
            return None;
        }
        Some(Pending {
            prompt: self.confirmation(selection.len()),
            batch: self,
            pks: selection,
        })
    }
}

/// A batch waiting on confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending {
    batch: Batch,
    pks: Vec<Pk>,
    prompt: String,
}

impl Pending {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    /// Compares the confirmed selection with `selection`, read again right
    /// before sending. A changed selection yields a fresh prompt instead.
    pub fn recheck(self, selection: Vec<Pk>) -> Recheck {
        if selection == self.pks {
            Recheck::Unchanged(self)
        } else {
            debug!("Selection changed while awaiting confirmation");
            Recheck::Changed(self.batch.prepare(selection))
        }
    }

    pub async fn send<T: Transport + ?Sized>(self, transport: &T) -> Result<Reply> {
        match self.batch {
            Batch::Download => {
                info!("Batch download of {} scan(s)", self.pks.len());
                let download = transport.batch_download(&self.pks).await?;
                Ok(Reply::Download(download))
            }
            Batch::Command { target, command } => {
                info!(
                    "Batch {} on {} {}(s)",
                    command,
                    self.pks.len(),
                    target.noun()
                );
                let request = BatchRequest {
                    target,
                    command,
                    pks: self.pks,
                };
                let result = transport.batch_control(&request).await?;
                debug!("Batch reply: {:?}", result);
                Ok(Reply::Command {
                    target,
                    outcome: result.classify(),
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recheck {
    /// Safe to send.
    Unchanged(Pending),
    /// Must be confirmed again; `None` when the selection is now empty.
    Changed(Option<Pending>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Download(Download),
    Command { target: Target, outcome: Outcome },
}

impl Reply {
    /// Whether the grid must be re-fetched. Scan commands always refresh so
    /// partial state changes show up; scanner commands never do.
    pub fn refreshes(&self) -> bool {
        matches!(
            self,
            Reply::Command {
                target: Target::Scan,
                ..
            }
        )
    }

    pub fn message(&self) -> Option<String> {
        match self {
            Reply::Download(_) => None,
            Reply::Command { target, outcome } => outcome.message(*target),
        }
    }

    /// Applies the reply to the grid and returns the alert to show, if any.
    pub fn settle<G: Grid + ?Sized>(&self, grid: &mut G) -> Option<String> {
        if self.refreshes() {
            grid.refresh();
        }
        self.message()
    }
}

/// Reads the selection, confirms, sends and settles. `Ok(None)` means the
/// batch was abandoned: nothing selected, or the user declined.
pub async fn confirm_and_dispatch<G, C, T>(
    grid: &mut G,
    ui: &mut C,
    transport: &T,
    batch: Batch,
) -> Result<Option<Reply>>
where
    G: Grid + ?Sized,
    C: Confirm + ?Sized,
    T: Transport + ?Sized,
{
    let Some(pending) = batch.prepare(grid.selection()) else {
        return Ok(None);
    };
    if !ui.confirm(pending.prompt()) {
        debug!("Batch declined");
        return Ok(None);
    }
    let reply = pending.send(transport).await?;
    if let Some(message) = reply.settle(grid) {
        ui.alert(&message);
    }
    Ok(Some(reply))
}

pub async fn trigger_batch_download<G, C, T>(grid: &mut G, ui: &mut C, transport: &T) -> Result<Option<Download>>
where
    G: Grid + ?Sized,
    C: Confirm + ?Sized,
    T: Transport + ?Sized,
{
    Ok(
        match confirm_and_dispatch(grid, ui, transport, Batch::Download).await? {
            Some(Reply::Download(download)) => Some(download),
            _ => None,
        },
    )
}

pub async fn dispatch_scan_command<G, C, T>(
    grid: &mut G,
    ui: &mut C,
    transport: &T,
    command: Command,
) -> Result<Option<Outcome>>
where
    G: Grid + ?Sized,
    C: Confirm + ?Sized,
    T: Transport + ?Sized,
{
    Ok(outcome(confirm_and_dispatch(grid, ui, transport, Batch::scan(command)).await?))
}

pub async fn dispatch_scanner_command<G, C, T>(
    grid: &mut G,
    ui: &mut C,
    transport: &T,
    command: Command,
) -> Result<Option<Outcome>>
where
    G: Grid + ?Sized,
    C: Confirm + ?Sized,
    T: Transport + ?Sized,
{
    Ok(outcome(confirm_and_dispatch(grid, ui, transport, Batch::scanner(command)).await?))
}

fn outcome(reply: Option<Reply>) -> Option<Outcome> {
    match reply {
        Some(Reply::Command { outcome, .. }) => Some(outcome),
        _ => None,
    }
}

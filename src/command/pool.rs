//! Fixed-capacity command pool
//!
//! Slots are allocated once at start-up and addressed by index. Each slot
//! carries an explicit membership tag so the scheduler can tell, without
//! walking any list, whether a command is free, detached or queued.

use std::collections::VecDeque;

use tokio::sync::oneshot;
use tokio::time::Instant;
use wlan_sme_shared::{Defect, QueueId, SchedulerError};

use super::request::{Command, CommandHandle, CommandOutcome};

/// Where a slot currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// On the free list
    Free,
    /// Handed out but not linked into a queue yet
    Detached,
    /// Linked into one of the four queues
    Queued(QueueId),
}

/// Contents of an occupied slot
#[derive(Debug)]
pub struct CommandEntry {
    pub(crate) command: Command,
    pub(crate) responder: Option<oneshot::Sender<CommandOutcome>>,
    pub(crate) enqueued_at: Instant,
}

impl CommandEntry {
    pub fn new(command: Command, responder: Option<oneshot::Sender<CommandOutcome>>) -> Self {
        Self {
            command,
            responder,
            enqueued_at: Instant::now(),
        }
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    membership: Membership,
    entry: Option<CommandEntry>,
    /// Set when the current use was ended by an abort
    aborted: bool,
}

/// Arena of reusable command slots
#[derive(Debug)]
pub struct CommandPool {
    slots: Vec<Slot>,
    free: VecDeque<usize>,
}

impl CommandPool {
    /// Allocate `capacity` slots, all free
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                generation: 0,
                membership: Membership::Free,
                entry: None,
                aborted: false,
            })
            .collect();

        Self {
            slots,
            free: (0..capacity).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Take an empty slot off the free list
    pub fn acquire(&mut self) -> Result<CommandHandle, SchedulerError> {
        let slot = self.free.pop_front().ok_or(SchedulerError::PoolExhausted {
            capacity: self.slots.len(),
        })?;

        let entry = &mut self.slots[slot];
        entry.generation += 1;
        entry.membership = Membership::Detached;
        entry.entry = None;
        entry.aborted = false;

        Ok(CommandHandle {
            slot,
            generation: entry.generation,
        })
    }

    /// Fill a detached slot
    pub fn install(&mut self, handle: CommandHandle, entry: CommandEntry) -> Result<(), SchedulerError> {
        self.validate(handle)?;
        self.slots[handle.slot].entry = Some(entry);
        Ok(())
    }

    /// Return a slot to the free list
    ///
    /// The slot must already be unlinked from every queue.
    pub fn release(&mut self, handle: CommandHandle) -> Result<Option<CommandEntry>, SchedulerError> {
        let slot = self
            .slots
            .get_mut(handle.slot)
            .ok_or(SchedulerError::StaleHandle {
                slot: handle.slot,
                generation: handle.generation,
            })?;

        match slot.membership {
            Membership::Free => {
                return Err(Defect::DoubleRelease { slot: handle.slot }.into());
            }
            Membership::Queued(queue) => {
                return Err(Defect::StillLinked {
                    slot: handle.slot,
                    queue,
                }
                .into());
            }
            Membership::Detached => {}
        }

        if slot.generation != handle.generation {
            return Err(SchedulerError::StaleHandle {
                slot: handle.slot,
                generation: handle.generation,
            });
        }

        slot.membership = Membership::Free;
        let entry = slot.entry.take();
        self.free.push_back(handle.slot);
        Ok(entry)
    }

    /// Check that `handle` still names a live (non-free) slot use
    pub fn validate(&self, handle: CommandHandle) -> Result<(), SchedulerError> {
        match self.slots.get(handle.slot) {
            Some(slot)
                if slot.generation == handle.generation
                    && slot.membership != Membership::Free =>
            {
                Ok(())
            }
            _ => Err(SchedulerError::StaleHandle {
                slot: handle.slot,
                generation: handle.generation,
            }),
        }
    }

    pub fn is_current(&self, handle: CommandHandle) -> bool {
        self.validate(handle).is_ok()
    }

    pub fn membership(&self, slot: usize) -> Option<Membership> {
        self.slots.get(slot).map(|s| s.membership)
    }

    /// Remember that the current use of `slot` ended in an abort
    pub(crate) fn mark_aborted(&mut self, slot: usize) {
        if let Some(slot) = self.slots.get_mut(slot) {
            slot.aborted = true;
        }
    }

    /// Whether the current use of `slot` ended in an abort
    pub fn was_aborted(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(|s| s.aborted)
    }

    pub(crate) fn set_membership(&mut self, slot: usize, membership: Membership) {
        self.slots[slot].membership = membership;
    }

    /// Current handle for an occupied slot
    pub fn handle_of(&self, slot: usize) -> CommandHandle {
        CommandHandle {
            slot,
            generation: self.slots[slot].generation,
        }
    }

    pub fn entry(&self, slot: usize) -> Option<&CommandEntry> {
        self.slots.get(slot).and_then(|s| s.entry.as_ref())
    }

    pub fn entry_mut(&mut self, slot: usize) -> Option<&mut CommandEntry> {
        self.slots.get_mut(slot).and_then(|s| s.entry.as_mut())
    }

    pub fn command(&self, slot: usize) -> Option<&Command> {
        self.entry(slot).map(|e| &e.command)
    }

    /// Slots currently on the free list, in reuse order
    pub(crate) fn free_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.free.iter().copied()
    }
}

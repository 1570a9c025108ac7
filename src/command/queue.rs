//! Command queues
//!
//! The four queues hold slot indices, never commands: the command itself
//! stays in its pool slot and the slot's membership tag records which queue
//! owns it. `QueueSet` is the only place that changes either, so the two
//! views cannot drift apart.

use std::collections::VecDeque;

use wlan_sme_shared::{Defect, QueueId, SchedulerError};

use super::pool::{CommandPool, Membership};
use super::request::{Command, CommandHandle};

/// Ordered sequence of slot indices
#[derive(Debug)]
pub struct CommandQueue {
    id: QueueId,
    items: VecDeque<usize>,
}

impl CommandQueue {
    pub fn new(id: QueueId) -> Self {
        Self {
            id,
            items: VecDeque::new(),
        }
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn head(&self) -> Option<usize> {
        self.items.front().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.items.iter().copied()
    }

    fn push_back(&mut self, slot: usize) {
        self.items.push_back(slot);
    }

    fn push_front(&mut self, slot: usize) {
        self.items.push_front(slot);
    }

    fn remove(&mut self, slot: usize) -> bool {
        match self.items.iter().position(|s| *s == slot) {
            Some(pos) => {
                self.items.remove(pos);
                true
            }
            None => false,
        }
    }
}

/// The command pool together with the four queues that borrow its slots
#[derive(Debug)]
pub struct QueueSet {
    pool: CommandPool,
    general_pending: CommandQueue,
    general_active: CommandQueue,
    scan_pending: CommandQueue,
    scan_active: CommandQueue,
}

impl QueueSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            pool: CommandPool::new(capacity),
            general_pending: CommandQueue::new(QueueId::GeneralPending),
            general_active: CommandQueue::new(QueueId::GeneralActive),
            scan_pending: CommandQueue::new(QueueId::ScanPending),
            scan_active: CommandQueue::new(QueueId::ScanActive),
        }
    }

    pub fn pool(&self) -> &CommandPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut CommandPool {
        &mut self.pool
    }

    pub fn queue(&self, id: QueueId) -> &CommandQueue {
        match id {
            QueueId::GeneralPending => &self.general_pending,
            QueueId::GeneralActive => &self.general_active,
            QueueId::ScanPending => &self.scan_pending,
            QueueId::ScanActive => &self.scan_active,
        }
    }

    fn queue_mut(&mut self, id: QueueId) -> &mut CommandQueue {
        match id {
            QueueId::GeneralPending => &mut self.general_pending,
            QueueId::GeneralActive => &mut self.general_active,
            QueueId::ScanPending => &mut self.scan_pending,
            QueueId::ScanActive => &mut self.scan_active,
        }
    }

    pub fn len(&self, id: QueueId) -> usize {
        self.queue(id).len()
    }

    pub fn is_empty(&self, id: QueueId) -> bool {
        self.queue(id).is_empty()
    }

    pub fn head(&self, id: QueueId) -> Option<usize> {
        self.queue(id).head()
    }

    pub fn command(&self, slot: usize) -> Option<&Command> {
        self.pool.command(slot)
    }

    /// Commands in `id`, head first
    pub fn commands(&self, id: QueueId) -> impl Iterator<Item = (usize, &Command)> + '_ {
        self.queue(id)
            .iter()
            .filter_map(move |slot| self.pool.command(slot).map(|c| (slot, c)))
    }

    /// First slot in `id` whose command satisfies `pred`
    pub fn find(&self, id: QueueId, pred: impl Fn(&Command) -> bool) -> Option<usize> {
        self.commands(id).find(|(_, c)| pred(*c)).map(|(slot, _)| slot)
    }

    /// Append a detached command to the tail of `id`
    pub fn link_tail(&mut self, handle: CommandHandle, id: QueueId) -> Result<(), SchedulerError> {
        self.check_detached(handle)?;
        self.queue_mut(id).push_back(handle.slot);
        self.pool.set_membership(handle.slot, Membership::Queued(id));
        Ok(())
    }

    /// Insert a detached command at the head of `id`
    pub fn link_head(&mut self, handle: CommandHandle, id: QueueId) -> Result<(), SchedulerError> {
        self.check_detached(handle)?;
        self.queue_mut(id).push_front(handle.slot);
        self.pool.set_membership(handle.slot, Membership::Queued(id));
        Ok(())
    }

    /// Remove a command from whichever queue holds it
    pub fn unlink(&mut self, handle: CommandHandle) -> Result<QueueId, SchedulerError> {
        self.pool.validate(handle)?;

        let Some(Membership::Queued(id)) = self.pool.membership(handle.slot) else {
            return Err(Defect::NotLinked { slot: handle.slot }.into());
        };

        if !self.queue_mut(id).remove(handle.slot) {
            return Err(Defect::Corrupted(format!(
                "slot {} tagged {} but missing from it",
                handle.slot, id
            ))
            .into());
        }

        self.pool.set_membership(handle.slot, Membership::Detached);
        Ok(id)
    }

    /// Move a queued command to the tail of another queue
    pub fn move_to(&mut self, handle: CommandHandle, id: QueueId) -> Result<(), SchedulerError> {
        self.unlink(handle)?;
        self.link_tail(handle, id)
    }

    /// Queue currently holding `handle`, if it is still live and linked
    pub fn locate(&self, handle: CommandHandle) -> Option<QueueId> {
        if !self.pool.is_current(handle) {
            return None;
        }
        match self.pool.membership(handle.slot) {
            Some(Membership::Queued(id)) => Some(id),
            _ => None,
        }
    }

    fn check_detached(&self, handle: CommandHandle) -> Result<(), SchedulerError> {
        self.pool.validate(handle)?;
        match self.pool.membership(handle.slot) {
            Some(Membership::Detached) => Ok(()),
            Some(Membership::Queued(queue)) => Err(Defect::Corrupted(format!(
                "slot {} linked into {} twice",
                handle.slot, queue
            ))
            .into()),
            _ => Err(Defect::Corrupted(format!("slot {} is free", handle.slot)).into()),
        }
    }

    /// Verify every slot sits in exactly one of the free list and the queues
    pub fn audit(&self) -> Result<(), Defect> {
        let mut seen = vec![0u8; self.pool.capacity()];

        for slot in self.pool.free_slots() {
            seen[slot] += 1;
            if self.pool.membership(slot) != Some(Membership::Free) {
                return Err(Defect::Corrupted(format!(
                    "slot {slot} on free list but not tagged free"
                )));
            }
        }

        for id in QueueId::ALL {
            for slot in self.queue(id).iter() {
                seen[slot] += 1;
                if self.pool.membership(slot) != Some(Membership::Queued(id)) {
                    return Err(Defect::Corrupted(format!(
                        "slot {slot} in {id} but tagged {:?}",
                        self.pool.membership(slot)
                    )));
                }
            }
        }

        match seen.iter().position(|count| *count != 1) {
            Some(slot) => Err(Defect::Corrupted(format!(
                "slot {slot} appears {} times",
                seen[slot]
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::pool::CommandEntry;
    use crate::command::request::CommandPayload;
    use wlan_sme_shared::{CommandKind, SessionId};

    fn add(set: &mut QueueSet, session: u8, id: QueueId, head: bool) -> CommandHandle {
        let handle = set.pool_mut().acquire().unwrap();
        let command = Command::new(SessionId(session), CommandPayload::DeleteSession);
        set.pool_mut()
            .install(handle, CommandEntry::new(command, None))
            .unwrap();
        if head {
            set.link_head(handle, id).unwrap();
        } else {
            set.link_tail(handle, id).unwrap();
        }
        handle
    }

    #[test]
    fn test_fifo_and_head_insert() {
        let mut set = QueueSet::new(4);
        let a = add(&mut set, 1, QueueId::GeneralPending, false);
        let b = add(&mut set, 2, QueueId::GeneralPending, false);
        let c = add(&mut set, 3, QueueId::GeneralPending, true);

        let order: Vec<usize> = set.queue(QueueId::GeneralPending).iter().collect();
        assert_eq!(order, vec![c.slot, a.slot, b.slot]);
        assert!(set.audit().is_ok());
    }

    #[test]
    fn test_unlink_arbitrary_member() {
        let mut set = QueueSet::new(4);
        let a = add(&mut set, 1, QueueId::GeneralPending, false);
        let b = add(&mut set, 2, QueueId::GeneralPending, false);
        let c = add(&mut set, 3, QueueId::GeneralPending, false);

        assert_eq!(set.unlink(b).unwrap(), QueueId::GeneralPending);
        let order: Vec<usize> = set.queue(QueueId::GeneralPending).iter().collect();
        assert_eq!(order, vec![a.slot, c.slot]);

        // Detached slot is in no queue and not free
        assert!(set.audit().is_err());
        set.pool_mut().release(b).unwrap();
        assert!(set.audit().is_ok());
    }

    #[test]
    fn test_move_to_active() {
        let mut set = QueueSet::new(2);
        let a = add(&mut set, 1, QueueId::ScanPending, false);

        set.move_to(a, QueueId::ScanActive).unwrap();
        assert_eq!(set.locate(a), Some(QueueId::ScanActive));
        assert!(set.is_empty(QueueId::ScanPending));
        assert_eq!(set.head(QueueId::ScanActive), Some(a.slot));
    }

    #[test]
    fn test_double_link_rejected() {
        let mut set = QueueSet::new(2);
        let a = add(&mut set, 1, QueueId::GeneralPending, false);
        assert!(matches!(
            set.link_tail(a, QueueId::GeneralActive),
            Err(SchedulerError::Defect(Defect::Corrupted(_)))
        ));
        assert!(set.audit().is_ok());
    }

    #[test]
    fn test_unlink_detached_is_defect() {
        let mut set = QueueSet::new(1);
        let handle = set.pool_mut().acquire().unwrap();
        assert_eq!(
            set.unlink(handle),
            Err(SchedulerError::Defect(Defect::NotLinked { slot: handle.slot }))
        );
    }

    #[test]
    fn test_find_and_commands() {
        let mut set = QueueSet::new(3);
        add(&mut set, 1, QueueId::GeneralPending, false);
        let b = add(&mut set, 2, QueueId::GeneralPending, false);

        let found = set.find(QueueId::GeneralPending, |c| c.session == SessionId(2));
        assert_eq!(found, Some(b.slot));
        assert!(set
            .commands(QueueId::GeneralPending)
            .all(|(_, c)| c.kind == CommandKind::DeleteSession));
    }
}

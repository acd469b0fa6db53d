use std::collections::HashMap;

use mandelfarm_relay::PeerId;

use crate::error::ClusterError;

/// Where one worker stands from the coordinator's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Assigned(u32),
    Terminated,
}

/// Worker identity -> current assignment.
///
/// Workers keep the order they were added in, which is the order initial
/// rows are handed out.
#[derive(Debug, Default)]
pub struct AssignmentTable {
    order: Vec<PeerId>,
    slots: HashMap<PeerId, SlotState>,
}

impl AssignmentTable {
    pub fn new<I: IntoIterator<Item = PeerId>>(peers: I) -> Self {
        let mut table = Self::default();
        for peer in peers {
            if table.slots.insert(peer.clone(), SlotState::Idle).is_none() {
                table.order.push(peer);
            }
        }
        table
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn peers(&self) -> &[PeerId] {
        &self.order
    }

    pub fn state(&self, peer: &PeerId) -> Option<SlotState> {
        self.slots.get(peer).copied()
    }

    /// Workers currently holding a row.
    pub fn outstanding(&self) -> usize {
        self.slots
            .values()
            .filter(|s| matches!(s, SlotState::Assigned(_)))
            .count()
    }

    /// Idle -> Assigned(row).
    pub fn assign(&mut self, peer: &PeerId, row: u32) -> Result<(), ClusterError> {
        let slot = self.slot_mut(peer)?;
        match *slot {
            SlotState::Idle => {
                *slot = SlotState::Assigned(row);
                Ok(())
            }
            SlotState::Assigned(current) => Err(ClusterError::AlreadyAssigned {
                peer: peer.clone(),
                current,
                row,
            }),
            SlotState::Terminated => Err(ClusterError::AssignAfterTerminate {
                peer: peer.clone(),
                row,
            }),
        }
    }

    /// Assigned(row) -> Idle. Fails unless `row` is exactly what `peer` holds.
    pub fn complete(&mut self, peer: &PeerId, row: u32) -> Result<(), ClusterError> {
        let slot = self.slot_mut(peer)?;
        match *slot {
            SlotState::Assigned(current) if current == row => {
                *slot = SlotState::Idle;
                Ok(())
            }
            _ => Err(ClusterError::UnassignedRow {
                row,
                peer: peer.clone(),
            }),
        }
    }

    /// Idle -> Terminated. A worker still holding a row cannot be terminated.
    pub fn terminate(&mut self, peer: &PeerId) -> Result<bool, ClusterError> {
        let slot = self.slot_mut(peer)?;
        match *slot {
            SlotState::Idle => {
                *slot = SlotState::Terminated;
                Ok(true)
            }
            SlotState::Terminated => Ok(false),
            SlotState::Assigned(row) => Err(ClusterError::TerminateWhileAssigned {
                peer: peer.clone(),
                row,
            }),
        }
    }

    fn slot_mut(&mut self, peer: &PeerId) -> Result<&mut SlotState, ClusterError> {
        self.slots
            .get_mut(peer)
            .ok_or_else(|| ClusterError::UnknownPeer(peer.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(name: &str) -> PeerId {
        PeerId::new(name)
    }

    #[test]
    fn lifecycle() {
        let mut t = AssignmentTable::new([peer("a"), peer("b")]);
        assert_eq!(t.len(), 2);
        t.assign(&peer("a"), 0).unwrap();
        assert_eq!(t.outstanding(), 1);
        t.complete(&peer("a"), 0).unwrap();
        assert_eq!(t.state(&peer("a")), Some(SlotState::Idle));
        assert!(t.terminate(&peer("a")).unwrap());
        assert!(!t.terminate(&peer("a")).unwrap());
        assert_eq!(t.state(&peer("a")), Some(SlotState::Terminated));
    }

    #[test]
    fn completion_must_match_the_held_row() {
        let mut t = AssignmentTable::new([peer("a")]);
        t.assign(&peer("a"), 3).unwrap();
        assert!(matches!(
            t.complete(&peer("a"), 4),
            Err(ClusterError::UnassignedRow { row: 4, .. })
        ));
        assert_eq!(t.state(&peer("a")), Some(SlotState::Assigned(3)));
    }

    #[test]
    fn cannot_terminate_an_assigned_worker() {
        let mut t = AssignmentTable::new([peer("a")]);
        t.assign(&peer("a"), 1).unwrap();
        assert!(matches!(
            t.terminate(&peer("a")),
            Err(ClusterError::TerminateWhileAssigned { row: 1, .. })
        ));
    }

    #[test]
    fn one_row_per_worker() {
        let mut t = AssignmentTable::new([peer("a")]);
        t.assign(&peer("a"), 0).unwrap();
        assert!(matches!(
            t.assign(&peer("a"), 1),
            Err(ClusterError::AlreadyAssigned { current: 0, row: 1, .. })
        ));
    }

    #[test]
    fn nothing_is_assigned_after_termination() {
        let mut t = AssignmentTable::new([peer("a")]);
        t.terminate(&peer("a")).unwrap();
        assert!(matches!(
            t.assign(&peer("a"), 0),
            Err(ClusterError::AssignAfterTerminate { row: 0, .. })
        ));
    }

    #[test]
    fn unknown_peers_are_rejected() {
        let mut t = AssignmentTable::new([peer("a")]);
        assert!(matches!(
            t.assign(&peer("z"), 0),
            Err(ClusterError::UnknownPeer(_))
        ));
    }

    #[test]
    fn duplicate_peers_collapse() {
        let t = AssignmentTable::new([peer("a"), peer("a"), peer("b")]);
        assert_eq!(t.peers(), &[peer("a"), peer("b")]);
    }
}

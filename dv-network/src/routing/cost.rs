use crate::address::NodeId;
use std::collections::HashSet;
use thiserror::Error;

/// A directly connected neighbor, reachable through one of the router's interfaces
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Neighbor {
    pub id: NodeId,
    pub interface: usize,
    pub cost: u32,
}

impl Neighbor {
    pub fn new(id: NodeId, interface: usize, cost: u32) -> Self {
        Self {
            id,
            interface,
            cost,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterConfigError {
    #[error("router {0} lists itself as a neighbor")]
    SelfNeighbor(NodeId),
    #[error("neighbor {0} is listed more than once")]
    DuplicateNeighbor(NodeId),
    #[error("interface {0} is assigned to more than one neighbor")]
    DuplicateInterface(usize),
    #[error("interfaces must be numbered 0..{count}, but interface {interface} was found")]
    InterfaceOutOfRange { interface: usize, count: usize },
    #[error("link cost to neighbor {0} must be greater than zero")]
    ZeroCost(NodeId),
}

/// Static link costs towards the router's neighbors, indexed by interface
#[derive(Clone, Debug)]
pub struct CostTable {
    neighbors: Vec<Neighbor>,
}

impl CostTable {
    pub fn new(owner: &NodeId, mut neighbors: Vec<Neighbor>) -> Result<Self, RouterConfigError> {
        let count = neighbors.len();
        let mut seen_ids = HashSet::new();
        let mut seen_interfaces = HashSet::new();
        for neighbor in &neighbors {
            if &neighbor.id == owner {
                return Err(RouterConfigError::SelfNeighbor(owner.clone()));
            }
            if !seen_ids.insert(&neighbor.id) {
                return Err(RouterConfigError::DuplicateNeighbor(neighbor.id.clone()));
            }
            if !seen_interfaces.insert(neighbor.interface) {
                return Err(RouterConfigError::DuplicateInterface(neighbor.interface));
            }
            if neighbor.interface >= count {
                return Err(RouterConfigError::InterfaceOutOfRange {
                    interface: neighbor.interface,
                    count,
                });
            }
            if neighbor.cost == 0 {
                return Err(RouterConfigError::ZeroCost(neighbor.id.clone()));
            }
        }

        // Unique indices below `count` means every interface is present exactly once
        neighbors.sort_by_key(|n| n.interface);
        Ok(Self { neighbors })
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Neighbor> {
        self.neighbors.iter()
    }

    pub fn neighbor_on(&self, interface: usize) -> Option<&Neighbor> {
        self.neighbors.get(interface)
    }

    pub fn neighbor(&self, id: &NodeId) -> Option<&Neighbor> {
        self.neighbors.iter().find(|n| &n.id == id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn id(s: &str) -> NodeId {
        s.parse().unwrap()
    }

    #[test]
    fn test_neighbors_are_indexed_by_interface() {
        let table = CostTable::new(
            &id("RA"),
            vec![
                Neighbor::new(id("RB"), 1, 3),
                Neighbor::new(id("H1"), 0, 1),
            ],
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.neighbor_on(0).unwrap().id, id("H1"));
        assert_eq!(table.neighbor_on(1).unwrap().cost, 3);
        assert_eq!(table.neighbor(&id("RB")).unwrap().interface, 1);
        assert!(table.neighbor_on(2).is_none());
    }

    #[test]
    fn test_empty_cost_table_is_valid() {
        let table = CostTable::new(&id("RA"), Vec::new()).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_invalid_cost_tables() {
        let cases = [
            (
                vec![Neighbor::new(id("RA"), 0, 1)],
                RouterConfigError::SelfNeighbor(id("RA")),
            ),
            (
                vec![
                    Neighbor::new(id("RB"), 0, 1),
                    Neighbor::new(id("RB"), 1, 1),
                ],
                RouterConfigError::DuplicateNeighbor(id("RB")),
            ),
            (
                vec![
                    Neighbor::new(id("RB"), 0, 1),
                    Neighbor::new(id("RC"), 0, 1),
                ],
                RouterConfigError::DuplicateInterface(0),
            ),
            (
                vec![
                    Neighbor::new(id("RB"), 0, 1),
                    Neighbor::new(id("RC"), 2, 1),
                ],
                RouterConfigError::InterfaceOutOfRange {
                    interface: 2,
                    count: 2,
                },
            ),
            (
                vec![Neighbor::new(id("RB"), 0, 0)],
                RouterConfigError::ZeroCost(id("RB")),
            ),
        ];

        for (neighbors, expected) in cases {
            assert_eq!(CostTable::new(&id("RA"), neighbors).unwrap_err(), expected);
        }
    }
}

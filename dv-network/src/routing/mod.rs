//! Distance-vector routing state
//!
//! Every router keeps, for each known destination, the cheapest cost it has heard of and the
//! neighbor that offers it. Tables are relaxed Bellman-Ford style whenever a neighbor advertises
//! its own table, and only ever improve: routes are never withdrawn.

pub mod advertisement;
pub mod cost;

use crate::address::NodeId;
use crate::routing::advertisement::{AdvertisedRoute, RoutingAdvertisement};
use crate::routing::cost::CostTable;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// The best known way to reach a destination
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    /// The neighbor to hand packets to, or the router itself for its own entry
    pub via: NodeId,
    pub cost: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingTable {
    owner: NodeId,
    routes: BTreeMap<NodeId, Route>,
}

impl RoutingTable {
    /// Creates a table that knows about the owner itself (at cost 0) and its direct neighbors
    pub fn new(owner: NodeId, costs: &CostTable) -> Self {
        let mut routes = BTreeMap::new();
        routes.insert(
            owner.clone(),
            Route {
                via: owner.clone(),
                cost: 0,
            },
        );

        for neighbor in costs.iter() {
            routes.insert(
                neighbor.id.clone(),
                Route {
                    via: neighbor.id.clone(),
                    cost: neighbor.cost,
                },
            );
        }

        Self { owner, routes }
    }

    pub fn route(&self, destination: &NodeId) -> Option<&Route> {
        self.routes.get(destination)
    }

    pub fn cost(&self, destination: &NodeId) -> Option<u32> {
        self.route(destination).map(|r| r.cost)
    }

    pub fn next_hop(&self, destination: &NodeId) -> Option<&NodeId> {
        self.route(destination).map(|r| &r.via)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Iterates over the routes, sorted by destination
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Route)> {
        self.routes.iter()
    }

    /// Relaxes the table with the routes advertised by `neighbor`, reachable at `link_cost`
    ///
    /// A route is accepted if its destination is new or if going through the neighbor is strictly
    /// cheaper than the current route. Returns the destinations whose route changed.
    pub fn relax(
        &mut self,
        neighbor: &NodeId,
        link_cost: u32,
        advertised: &[AdvertisedRoute],
    ) -> Vec<NodeId> {
        let mut updated = Vec::new();
        for advertised in advertised {
            let candidate = advertised.cost.saturating_add(link_cost);
            let improves = self
                .routes
                .get(&advertised.destination)
                .is_none_or(|current| candidate < current.cost);

            if improves {
                self.routes.insert(
                    advertised.destination.clone(),
                    Route {
                        via: neighbor.clone(),
                        cost: candidate,
                    },
                );
                updated.push(advertised.destination.clone());
            }
        }

        updated
    }

    /// Describes the whole table as an advertisement from its owner
    pub fn to_advertisement(&self) -> RoutingAdvertisement {
        RoutingAdvertisement {
            origin: self.owner.clone(),
            routes: self
                .routes
                .iter()
                .map(|(destination, route)| AdvertisedRoute {
                    destination: destination.clone(),
                    via: route.via.clone(),
                    cost: route.cost,
                })
                .collect(),
        }
    }
}

impl Display for RoutingTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:<11} {:<8} {:>6}", self.owner, "via", "cost")?;
        for (destination, route) in &self.routes {
            writeln!(f, "{:<11} {:<8} {:>6}", destination, route.via, route.cost)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::routing::cost::Neighbor;

    fn id(s: &str) -> NodeId {
        s.parse().unwrap()
    }

    fn advertised(destination: &str, via: &str, cost: u32) -> AdvertisedRoute {
        AdvertisedRoute {
            destination: id(destination),
            via: id(via),
            cost,
        }
    }

    fn table_for_ra() -> RoutingTable {
        let costs = CostTable::new(
            &id("RA"),
            vec![
                Neighbor::new(id("H1"), 0, 1),
                Neighbor::new(id("RB"), 1, 5),
            ],
        )
        .unwrap();
        RoutingTable::new(id("RA"), &costs)
    }

    #[test]
    fn test_table_is_seeded_with_self_and_neighbors() {
        let table = table_for_ra();
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.route(&id("RA")),
            Some(&Route {
                via: id("RA"),
                cost: 0
            })
        );
        assert_eq!(table.cost(&id("H1")), Some(1));
        assert_eq!(table.next_hop(&id("RB")), Some(&id("RB")));
        assert_eq!(table.cost(&id("H2")), None);
    }

    #[test]
    fn test_relax_adds_new_destinations() {
        let mut table = table_for_ra();
        let updated = table.relax(
            &id("RB"),
            5,
            &[advertised("RB", "RB", 0), advertised("H2", "H2", 2)],
        );

        assert_eq!(updated, vec![id("H2")]);
        assert_eq!(table.cost(&id("H2")), Some(7));
        assert_eq!(table.next_hop(&id("H2")), Some(&id("RB")));
    }

    #[test]
    fn test_relax_only_accepts_strictly_cheaper_routes() {
        let mut table = table_for_ra();
        table.relax(&id("RB"), 5, &[advertised("H2", "H2", 2)]);

        // Same cost through another neighbor is not an improvement
        let updated = table.relax(&id("H1"), 1, &[advertised("H2", "RC", 6)]);
        assert!(updated.is_empty());
        assert_eq!(table.next_hop(&id("H2")), Some(&id("RB")));

        // A cheaper path is adopted
        let updated = table.relax(&id("H1"), 1, &[advertised("H2", "RC", 3)]);
        assert_eq!(updated, vec![id("H2")]);
        assert_eq!(table.cost(&id("H2")), Some(4));
        assert_eq!(table.next_hop(&id("H2")), Some(&id("H1")));
    }

    #[test]
    fn test_relax_never_replaces_own_entry() {
        let mut table = table_for_ra();
        let updated = table.relax(&id("RB"), 5, &[advertised("RA", "RA", 0)]);
        assert!(updated.is_empty());
        assert_eq!(table.cost(&id("RA")), Some(0));
    }

    #[test]
    fn test_relax_saturates_costs() {
        let mut table = table_for_ra();
        table.relax(&id("RB"), 5, &[advertised("H9", "RC", u32::MAX)]);
        assert_eq!(table.cost(&id("H9")), Some(u32::MAX));
    }

    #[test]
    fn test_to_advertisement_contains_every_route() {
        let table = table_for_ra();
        let advertisement = table.to_advertisement();
        assert_eq!(advertisement.origin, id("RA"));
        assert_eq!(
            advertisement.routes,
            vec![
                advertised("H1", "H1", 1),
                advertised("RA", "RA", 0),
                advertised("RB", "RB", 5),
            ]
        );
    }

    #[test]
    fn test_display_aligns_columns() {
        let table = table_for_ra();
        let expected = "\
RA          via        cost
H1          H1            1
RA          RA            0
RB          RB            5
";
        assert_eq!(table.to_string(), expected);
    }
}

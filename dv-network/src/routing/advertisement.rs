//! Payload of control packets
//!
//! An advertisement is encoded as text: the origin router, followed by one record per route, e.g.
//! `RA;RA|RA|0;H1|H1|1;RB|RB|3`. Records are separated by `;` and their fields by `|`.

use crate::address::NodeId;
use crate::packet::DecodingError;
use std::fmt::Write;

const RECORD_SEPARATOR: char = ';';
const FIELD_SEPARATOR: char = '|';

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdvertisedRoute {
    pub destination: NodeId,
    pub via: NodeId,
    pub cost: u32,
}

/// The routing table of `origin`, as announced to one of its neighbors
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingAdvertisement {
    pub origin: NodeId,
    pub routes: Vec<AdvertisedRoute>,
}

impl RoutingAdvertisement {
    pub fn encode(&self) -> String {
        let mut payload = self.origin.to_string();
        for route in &self.routes {
            // Writing to a `String` is infallible
            let _ = write!(
                payload,
                "{RECORD_SEPARATOR}{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}",
                route.destination, route.via, route.cost
            );
        }

        payload
    }

    pub fn decode(payload: &[u8]) -> Result<Self, DecodingError> {
        let payload = std::str::from_utf8(payload)
            .map_err(|_| malformed("payload is not valid UTF-8".to_string()))?;

        let mut records = payload.split(RECORD_SEPARATOR);
        let origin = records.next().unwrap_or_default();
        let origin = origin
            .parse::<NodeId>()
            .map_err(|e| malformed(format!("invalid origin: {e}")))?;

        let routes = records
            .map(parse_record)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { origin, routes })
    }

    /// Splits the advertisement in parts of at most `max_routes` routes each
    ///
    /// Each part carries the origin, so it can be processed on its own. An advertisement without
    /// routes results in a single empty part.
    pub fn split(self, max_routes: usize) -> Vec<RoutingAdvertisement> {
        let max_routes = max_routes.max(1);
        if self.routes.len() <= max_routes {
            return vec![self];
        }

        self.routes
            .chunks(max_routes)
            .map(|routes| RoutingAdvertisement {
                origin: self.origin.clone(),
                routes: routes.to_vec(),
            })
            .collect()
    }
}

fn parse_record(record: &str) -> Result<AdvertisedRoute, DecodingError> {
    let mut fields = record.split(FIELD_SEPARATOR);
    let (Some(destination), Some(via), Some(cost), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(malformed(format!(
            "record `{record}` does not have exactly three fields"
        )));
    };

    Ok(AdvertisedRoute {
        destination: destination
            .parse::<NodeId>()
            .map_err(|e| malformed(format!("invalid destination in `{record}`: {e}")))?,
        via: via
            .parse::<NodeId>()
            .map_err(|e| malformed(format!("invalid next hop in `{record}`: {e}")))?,
        cost: cost
            .parse::<u32>()
            .map_err(|e| malformed(format!("invalid cost in `{record}`: {e}")))?,
    })
}

fn malformed(reason: String) -> DecodingError {
    DecodingError::MalformedAdvertisement(reason)
}

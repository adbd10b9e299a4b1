//! Siren documents served by the coordination service and their mapping
//! onto swap snapshots

use crate::error::{TrackerError, TrackerResult};
use crate::swap::{ActionKind, ActionOffer, Event, EventSet, ProtocolOrdering, Role};

use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct Entity {
    #[serde(default)]
    pub properties: Option<serde_json::Value>,
    #[serde(default)]
    pub entities: Vec<SubEntity>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubEntity {
    #[serde(default)]
    pub href: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Action {
    pub name: String,
    pub href: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SwapProperties {
    role: String,
    alpha: LegProperties,
    beta: LegProperties,
    #[serde(default)]
    events: Vec<SwapEvent>,
}

#[derive(Debug, Clone, Deserialize)]
struct LegProperties {
    protocol: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SwapEvent {
    name: String,
}

/// One polled view of a swap resource
#[derive(Debug, Clone, PartialEq)]
pub struct SwapSnapshot {
    pub href: String,
    pub ordering: ProtocolOrdering,
    pub role: Role,
    pub events: EventSet,
    pub offer: Option<ActionOffer>,
}

/// Hrefs of the swaps listed in a `/swaps` collection
pub fn swap_hrefs(collection: &Entity) -> Vec<String> {
    collection
        .entities
        .iter()
        .filter_map(|entity| entity.href.clone())
        .collect()
}

/// Map a swap entity onto a snapshot.
///
/// Events and actions this tracker has no step for are skipped; only the
/// first action is considered.
pub fn parse_swap(href: &str, entity: Entity) -> TrackerResult<SwapSnapshot> {
    let properties = entity
        .properties
        .ok_or_else(|| TrackerError::Payload(format!("swap {} has no properties", href)))?;
    let properties: SwapProperties = serde_json::from_value(properties)
        .map_err(|e| TrackerError::Payload(format!("swap {}: {}", href, e)))?;

    let ordering = ProtocolOrdering::from_alpha_protocol(&properties.alpha.protocol)?;
    if properties.beta.protocol != ordering.beta_leg().as_str() {
        return Err(TrackerError::UnsupportedProtocol(format!(
            "{}-{}",
            properties.alpha.protocol, properties.beta.protocol
        )));
    }

    let role: Role = properties.role.parse()?;

    let mut events = EventSet::new();
    for event in &properties.events {
        match event.name.parse::<Event>() {
            Ok(parsed) => {
                events.insert(parsed);
            }
            Err(e) => debug!(%href, event = %event.name, "Ignoring event: {}", e),
        }
    }

    let offer = entity.actions.first().and_then(|action| {
        match action.name.parse::<ActionKind>() {
            Ok(kind) => Some(ActionOffer::new(kind, action.href.clone())),
            Err(e) => {
                debug!(%href, action = %action.name, "Ignoring action: {}", e);
                None
            }
        }
    });

    Ok(SwapSnapshot {
        href: href.to_string(),
        ordering,
        role,
        events,
        offer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swap::{EventKind, Leg};

    fn entity(json: &str) -> Entity {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_swap_entity() {
        let swap = entity(
            r#"{
                "class": ["swap"],
                "properties": {
                    "role": "Alice",
                    "alpha": { "protocol": "herc20", "asset": "5000000000000000000" },
                    "beta": { "protocol": "hbit", "asset": "50000000" },
                    "events": [
                        { "name": "herc20_deployed", "seen_at": "2020-06-01T10:00:00Z" },
                        { "name": "herc20_deployed" },
                        { "name": "herc20_refunded" }
                    ]
                },
                "actions": [
                    { "name": "fund", "href": "/swaps/abc/fund", "method": "GET" },
                    { "name": "refund", "href": "/swaps/abc/refund" }
                ]
            }"#,
        );

        let snapshot = parse_swap("/swaps/abc", swap).unwrap();
        assert_eq!(snapshot.ordering, ProtocolOrdering::AlphaFirst);
        assert_eq!(snapshot.role, Role::Alice);
        assert_eq!(snapshot.events.len(), 1);
        assert!(snapshot.events.contains(Leg::Herc20, EventKind::Deployed));
        assert_eq!(
            snapshot.offer,
            Some(ActionOffer::new(ActionKind::Fund, "/swaps/abc/fund"))
        );
    }

    #[test]
    fn test_unknown_action_yields_no_offer() {
        let swap = entity(
            r#"{
                "properties": {
                    "role": "Bob",
                    "alpha": { "protocol": "hbit" },
                    "beta": { "protocol": "herc20" }
                },
                "actions": [{ "name": "refund", "href": "/swaps/abc/refund" }]
            }"#,
        );

        let snapshot = parse_swap("/swaps/abc", swap).unwrap();
        assert_eq!(snapshot.ordering, ProtocolOrdering::BetaFirst);
        assert_eq!(snapshot.role, Role::Bob);
        assert!(snapshot.events.is_empty());
        assert!(snapshot.offer.is_none());
    }

    #[test]
    fn test_unsupported_protocol_pair() {
        let swap = entity(
            r#"{
                "properties": {
                    "role": "Alice",
                    "alpha": { "protocol": "herc20" },
                    "beta": { "protocol": "halight" }
                }
            }"#,
        );

        assert!(matches!(
            parse_swap("/swaps/abc", swap),
            Err(TrackerError::UnsupportedProtocol(_))
        ));
    }

    #[test]
    fn test_missing_properties() {
        let swap = entity(r#"{ "actions": [] }"#);
        assert!(matches!(
            parse_swap("/swaps/abc", swap),
            Err(TrackerError::Payload(_))
        ));
    }

    #[test]
    fn test_swap_hrefs() {
        let collection = entity(
            r#"{
                "entities": [
                    { "rel": ["item"], "class": ["swap"], "href": "/swaps/a" },
                    { "rel": ["item"], "class": ["swap"] },
                    { "rel": ["item"], "class": ["swap"], "href": "/swaps/b" }
                ]
            }"#,
        );

        assert_eq!(swap_hrefs(&collection), vec!["/swaps/a", "/swaps/b"]);
    }
}

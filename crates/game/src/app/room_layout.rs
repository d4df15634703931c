use std::collections::BTreeMap;

use plaza_engine::{
    CollisionMap, EntityClass, EntityId, HarvestNode, NodeId, Rect, SeatedTable, Teleporter,
    Vec2, Vendor, WorldError,
};
use serde::Deserialize;
use thiserror::Error;

const BUILTIN_LAYOUT: &str = include_str!("../../assets/plaza_room.json");

#[derive(Debug, Error)]
pub(crate) enum LayoutError {
    #[error("parse room layout: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("parse room layout at {path}: {source}")]
    ParseAt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid room geometry: {0}")]
    World(#[from] WorldError),
    #[error("teleporter {teleporter} leads to '{destination}', which has no arrival point")]
    MissingArrival {
        teleporter: u32,
        destination: String,
    },
    #[error("bot {0} has no waypoints")]
    EmptyPatrol(u64),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Economy {
    pub(crate) starting_balance: u64,
    pub(crate) pickup_value: u64,
    pub(crate) harvest_reward: u64,
    pub(crate) node_cooldown_ms: f64,
    pub(crate) pickup_respawn_ms: f64,
    pub(crate) profile_latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct BotLayout {
    pub(crate) id: EntityId,
    pub(crate) class: EntityClass,
    pub(crate) speed: f32,
    pub(crate) waypoints: Vec<Vec2>,
    /// A bot parked on a node keeps it occupied.
    #[serde(default)]
    pub(crate) harvests: Option<NodeId>,
}

/// Static description of the offline plaza, loaded from JSON.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RoomLayout {
    pub(crate) room: String,
    pub(crate) bounds: Rect,
    #[serde(default)]
    pub(crate) solids: Vec<Rect>,
    pub(crate) spawn: Vec2,
    #[serde(default)]
    pub(crate) arrivals: BTreeMap<String, Vec2>,
    pub(crate) economy: Economy,
    #[serde(default)]
    pub(crate) nodes: Vec<HarvestNode>,
    #[serde(default)]
    pub(crate) vendors: Vec<Vendor>,
    #[serde(default)]
    pub(crate) teleporters: Vec<Teleporter>,
    #[serde(default)]
    pub(crate) tables: Vec<SeatedTable>,
    #[serde(default)]
    pub(crate) pickups: Vec<Vec2>,
    #[serde(default)]
    pub(crate) bots: Vec<BotLayout>,
}

impl RoomLayout {
    pub(crate) fn builtin() -> Result<Self, LayoutError> {
        Self::from_json_str(BUILTIN_LAYOUT)
    }

    pub(crate) fn from_json_str(raw: &str) -> Result<Self, LayoutError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let layout = match serde_path_to_error::deserialize::<_, RoomLayout>(&mut deserializer) {
            Ok(layout) => layout,
            Err(error) => {
                let path = error.path().to_string();
                let source = error.into_inner();
                if path.is_empty() || path == "." {
                    return Err(LayoutError::Parse(source));
                }
                return Err(LayoutError::ParseAt { path, source });
            }
        };
        layout.validate()?;
        Ok(layout)
    }

    pub(crate) fn collision_map(&self) -> Result<CollisionMap, WorldError> {
        CollisionMap::new(self.bounds, self.solids.clone())
    }

    /// Arrival point for a teleporter destination; the home room arrives at
    /// the spawn.
    pub(crate) fn arrival(&self, destination: &str) -> Option<Vec2> {
        if destination == self.room {
            return Some(self.spawn);
        }
        self.arrivals.get(destination).copied()
    }

    fn validate(&self) -> Result<(), LayoutError> {
        self.collision_map()?;
        for teleporter in &self.teleporters {
            if self.arrival(&teleporter.destination).is_none() {
                return Err(LayoutError::MissingArrival {
                    teleporter: teleporter.id.0,
                    destination: teleporter.destination.clone(),
                });
            }
        }
        if let Some(bot) = self.bots.iter().find(|bot| bot.waypoints.is_empty()) {
            return Err(LayoutError::EmptyPatrol(bot.id.0));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_layout_parses_and_validates() {
        let layout = RoomLayout::builtin().expect("builtin layout");
        assert!(!layout.nodes.is_empty());
        assert!(!layout.vendors.is_empty());
        assert!(layout
            .teleporters
            .iter()
            .any(|teleporter| teleporter.required_balance.is_some()));
        assert!(layout.bounds.contains(layout.spawn));
    }

    #[test]
    fn unknown_destination_is_rejected() {
        let raw = r#"{
            "room": "plaza",
            "bounds": {"x": 0, "y": 0, "w": 100, "h": 100},
            "spawn": {"x": 50, "y": 50},
            "economy": {
                "starting_balance": 0, "pickup_value": 1, "harvest_reward": 1,
                "node_cooldown_ms": 1000, "pickup_respawn_ms": 1000, "profile_latency_ms": 0
            },
            "teleporters": [{
                "id": 4, "anchor": {"x": 10, "y": 10},
                "pad": {"x": 5, "y": 5, "w": 10, "h": 10},
                "destination": "nowhere"
            }]
        }"#;
        let error = RoomLayout::from_json_str(raw).expect_err("should fail");
        assert!(matches!(
            error,
            LayoutError::MissingArrival { teleporter: 4, .. }
        ));
    }

    #[test]
    fn unknown_field_is_a_parse_error() {
        let raw = r#"{"room": "plaza", "colour": "red"}"#;
        assert!(matches!(
            RoomLayout::from_json_str(raw),
            Err(LayoutError::Parse(_) | LayoutError::ParseAt { .. })
        ));
    }

    #[test]
    fn parse_error_names_the_offending_path() {
        let raw = r#"{
            "room": "plaza",
            "bounds": {"x": 0, "y": 0, "w": 100, "h": 100},
            "spawn": {"x": 50, "y": "middle"}
        }"#;
        let error = RoomLayout::from_json_str(raw).expect_err("should fail");
        match error {
            LayoutError::ParseAt { path, .. } => assert_eq!(path, "spawn.y"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn home_room_arrives_at_spawn() {
        let layout = RoomLayout::builtin().expect("builtin layout");
        assert_eq!(layout.arrival(&layout.room), Some(layout.spawn));
    }
}

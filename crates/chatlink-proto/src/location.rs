//! Player positions and the `location_change` payload layout.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::StatusValue;

/// A player position on a specific backend and world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLocation {
    /// Backend server name.
    pub server: String,
    /// World name on that backend.
    pub world: String,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
    /// Yaw in degrees.
    #[serde(default)]
    pub yaw: f32,
    /// Pitch in degrees.
    #[serde(default)]
    pub pitch: f32,
}

impl PlayerLocation {
    /// A location with zero rotation.
    pub fn new(server: impl Into<String>, world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            server: server.into(),
            world: world.into(),
            x,
            y,
            z,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// Euclidean distance, or `-1.0` when the two locations are on
    /// different servers or worlds.
    pub fn distance(&self, other: &PlayerLocation) -> f64 {
        if self.world != other.world || self.server != other.server {
            return -1.0;
        }
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Chunk coordinates formatted as `"cx,cz"` (16-block chunks).
    pub fn chunk_coordinates(&self) -> String {
        let cx = (self.x.floor() as i64) >> 4;
        let cz = (self.z.floor() as i64) >> 4;
        format!("{cx},{cz}")
    }

    /// Region identifier `server:world:cx,cz`, used for region-scoped channels.
    pub fn region_id(&self) -> String {
        format!("{}:{}:{}", self.server, self.world, self.chunk_coordinates())
    }

    /// Write this location into a payload under `prefix` (`from` / `to`).
    pub(crate) fn write_prefixed(&self, prefix: &str, data: &mut BTreeMap<String, StatusValue>) {
        data.insert(format!("{prefix}_world"), StatusValue::from(self.world.as_str()));
        data.insert(format!("{prefix}_x"), StatusValue::Float(self.x));
        data.insert(format!("{prefix}_y"), StatusValue::Float(self.y));
        data.insert(format!("{prefix}_z"), StatusValue::Float(self.z));
    }

    /// Read a location written by [`write_prefixed`](Self::write_prefixed).
    /// The server is not on the wire; the envelope's sender supplies it.
    pub(crate) fn read_prefixed(
        prefix: &str,
        server: &str,
        data: &BTreeMap<String, StatusValue>,
    ) -> Option<Self> {
        let world = data.get(&format!("{prefix}_world"))?.as_str()?;
        let x = data.get(&format!("{prefix}_x"))?.as_f64()?;
        let y = data.get(&format!("{prefix}_y"))?.as_f64()?;
        let z = data.get(&format!("{prefix}_z"))?.as_f64()?;
        Some(Self::new(server, world, x, y, z))
    }
}

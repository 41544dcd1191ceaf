//! User-defined detection zones and their persistent store image.
//!
//! A [`ZoneStore`] is what the config store persists and what the zone
//! engine reads a snapshot of. The on-flash representation is a flat
//! little-endian byte image with a CRC16-CCITT trailer so that a partially
//! written or bit-rotted record is always detectable.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

pub const MAX_ZONES: usize = 16;
pub const MIN_VERTICES_PER_ZONE: usize = 3;
pub const MAX_VERTICES_PER_ZONE: usize = 8;
pub const ZONE_ID_MAX_LEN: usize = 16;
pub const ZONE_NAME_MAX_LEN: usize = 32;

/// Radar coverage used for out-of-range vertex warnings, in mm.
pub const RADAR_X_RANGE_MM: (i16, i16) = (-6000, 6000);
pub const RADAR_Y_RANGE_MM: (i16, i16) = (0, 6000);

// One serialized zone slot:
// id[16] | name[32] | kind u8 | sensitivity u8 | vertex_count u8 | 8 x (i16,i16)
const ZONE_SLOT_LEN: usize = ZONE_ID_MAX_LEN + ZONE_NAME_MAX_LEN + 3 + MAX_VERTICES_PER_ZONE * 4;

/// Full store image:
/// version u32 | updated_at u32 | zone_count u8 | 16 zone slots | checksum u16
pub const ZONE_STORE_IMAGE_LEN: usize = 9 + MAX_ZONES * ZONE_SLOT_LEN + 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneKind {
    /// Interior asserts occupancy.
    Include,
    /// Interior suppresses occupancy of overlapping include zones.
    Exclude,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Short stable identifier, `[a-zA-Z0-9_]{1,16}`.
    pub id: String,
    pub name: String,
    pub kind: ZoneKind,
    /// Simple polygon, 3..=8 vertices, mm coordinates.
    pub vertices: Vec<(i16, i16)>,
    /// 0..=100; higher holds occupancy for less time.
    pub sensitivity: u8,
}

/// Ordered set of up to [`MAX_ZONES`] zones plus versioning metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneStore {
    /// Strictly increasing across accepted writes.
    pub version: u32,
    /// Wall-clock seconds if known at write time, else monotonic seconds.
    pub updated_at: u32,
    pub zones: Vec<Zone>,
}

/// Per-zone result of one zone-engine pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneOccupancy {
    pub raw_occupied: bool,
    pub target_count: u8,
}

/// Per-zone debounced occupancy, published to consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmoothedOccupancy {
    pub stable: bool,
    pub target_count: u8,
    pub last_changed_ms: u32,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ZoneValidationError {
    #[error("store has {0} zones, limit is {MAX_ZONES}")]
    TooManyZones(usize),
    #[error("zone {id}: {count} vertices, require {MIN_VERTICES_PER_ZONE}..={MAX_VERTICES_PER_ZONE}")]
    VertexCount { id: String, count: usize },
    #[error("zone {id}: sensitivity {sensitivity} out of 0..=100")]
    Sensitivity { id: String, sensitivity: u8 },
    #[error("zone id {0:?} must match [a-zA-Z0-9_]{{1,16}}")]
    BadId(String),
    #[error("duplicate zone id {0:?}")]
    DuplicateId(String),
    #[error("zone {0}: name is empty")]
    EmptyName(String),
    #[error("zone {0}: name longer than {ZONE_NAME_MAX_LEN} bytes")]
    NameTooLong(String),
    #[error("zone {0}: polygon is self-intersecting")]
    SelfIntersecting(String),
}

/// Non-fatal findings from [`ZoneStore::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneWarning {
    /// A vertex lies outside the radar's nominal coverage.
    VertexOutOfRange { id: String, vertex: (i16, i16) },
}

fn id_is_well_formed(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= ZONE_ID_MAX_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl ZoneStore {
    /// Check every structural invariant required before persisting.
    ///
    /// Returns the (possibly empty) warning list on success. Warnings never
    /// block a write.
    pub fn validate(&self) -> Result<Vec<ZoneWarning>, ZoneValidationError> {
        if self.zones.len() > MAX_ZONES {
            return Err(ZoneValidationError::TooManyZones(self.zones.len()));
        }
        let mut warnings = Vec::new();
        for (i, zone) in self.zones.iter().enumerate() {
            if !id_is_well_formed(&zone.id) {
                return Err(ZoneValidationError::BadId(zone.id.clone()));
            }
            if self.zones[..i].iter().any(|z| z.id == zone.id) {
                return Err(ZoneValidationError::DuplicateId(zone.id.clone()));
            }
            if zone.name.is_empty() {
                return Err(ZoneValidationError::EmptyName(zone.id.clone()));
            }
            if zone.name.len() > ZONE_NAME_MAX_LEN {
                return Err(ZoneValidationError::NameTooLong(zone.id.clone()));
            }
            if zone.vertices.len() < MIN_VERTICES_PER_ZONE
                || zone.vertices.len() > MAX_VERTICES_PER_ZONE
            {
                return Err(ZoneValidationError::VertexCount {
                    id: zone.id.clone(),
                    count: zone.vertices.len(),
                });
            }
            if zone.sensitivity > 100 {
                return Err(ZoneValidationError::Sensitivity {
                    id: zone.id.clone(),
                    sensitivity: zone.sensitivity,
                });
            }
            if !polygon_is_simple(&zone.vertices) {
                return Err(ZoneValidationError::SelfIntersecting(zone.id.clone()));
            }
            for &v in &zone.vertices {
                if v.0 < RADAR_X_RANGE_MM.0
                    || v.0 > RADAR_X_RANGE_MM.1
                    || v.1 < RADAR_Y_RANGE_MM.0
                    || v.1 > RADAR_Y_RANGE_MM.1
                {
                    warnings.push(ZoneWarning::VertexOutOfRange {
                        id: zone.id.clone(),
                        vertex: v,
                    });
                }
            }
        }
        Ok(warnings)
    }

    pub fn get(&self, id: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.id == id)
    }

    /// Serialize to the fixed-size flat image, checksum included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ZONE_STORE_IMAGE_LEN);
        buf.write_u32::<LittleEndian>(self.version).unwrap();
        buf.write_u32::<LittleEndian>(self.updated_at).unwrap();
        buf.write_u8(self.zones.len() as u8).unwrap();
        for slot in 0..MAX_ZONES {
            match self.zones.get(slot) {
                Some(zone) => write_zone_slot(&mut buf, zone),
                None => buf.extend_from_slice(&[0u8; ZONE_SLOT_LEN]),
            }
        }
        let checksum = crc16::State::<crc16::CCITT_FALSE>::calculate(&buf);
        buf.write_u16::<LittleEndian>(checksum).unwrap();
        debug_assert_eq!(buf.len(), ZONE_STORE_IMAGE_LEN);
        buf
    }

    /// Parse an image, verifying length and checksum.
    pub fn from_bytes(bytes: &[u8]) -> Result<ZoneStore, ZoneImageError> {
        if bytes.len() != ZONE_STORE_IMAGE_LEN {
            return Err(ZoneImageError::Length(bytes.len()));
        }
        let body = &bytes[..ZONE_STORE_IMAGE_LEN - 2];
        let expected = crc16::State::<crc16::CCITT_FALSE>::calculate(body);
        let stored = u16::from_le_bytes([
            bytes[ZONE_STORE_IMAGE_LEN - 2],
            bytes[ZONE_STORE_IMAGE_LEN - 1],
        ]);
        if expected != stored {
            return Err(ZoneImageError::Checksum { expected, stored });
        }
        let mut rdr = std::io::Cursor::new(body);
        let version = rdr.read_u32::<LittleEndian>().unwrap();
        let updated_at = rdr.read_u32::<LittleEndian>().unwrap();
        let zone_count = rdr.read_u8().unwrap() as usize;
        if zone_count > MAX_ZONES {
            return Err(ZoneImageError::ZoneCount(zone_count));
        }
        let mut zones = Vec::with_capacity(zone_count);
        for slot in 0..MAX_ZONES {
            let offset = 9 + slot * ZONE_SLOT_LEN;
            if slot < zone_count {
                zones.push(read_zone_slot(&body[offset..offset + ZONE_SLOT_LEN])?);
            }
        }
        Ok(ZoneStore {
            version,
            updated_at,
            zones,
        })
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ZoneImageError {
    #[error("zone store image has {0} bytes, expected {ZONE_STORE_IMAGE_LEN}")]
    Length(usize),
    #[error("zone store checksum mismatch: computed {expected:#06x}, stored {stored:#06x}")]
    Checksum { expected: u16, stored: u16 },
    #[error("zone count {0} exceeds {MAX_ZONES}")]
    ZoneCount(usize),
    #[error("zone slot field is not valid UTF-8")]
    BadString,
    #[error("zone slot has unknown kind byte {0:#04x}")]
    BadKind(u8),
    #[error("zone slot vertex count {0} out of range")]
    BadVertexCount(u8),
}

fn write_zone_slot(buf: &mut Vec<u8>, zone: &Zone) {
    let mut id_bytes = [0u8; ZONE_ID_MAX_LEN];
    let n = zone.id.len().min(ZONE_ID_MAX_LEN);
    id_bytes[..n].copy_from_slice(&zone.id.as_bytes()[..n]);
    buf.extend_from_slice(&id_bytes);
    let mut name_bytes = [0u8; ZONE_NAME_MAX_LEN];
    let n = zone.name.len().min(ZONE_NAME_MAX_LEN);
    name_bytes[..n].copy_from_slice(&zone.name.as_bytes()[..n]);
    buf.extend_from_slice(&name_bytes);
    buf.push(match zone.kind {
        ZoneKind::Include => 0,
        ZoneKind::Exclude => 1,
    });
    buf.push(zone.sensitivity);
    buf.push(zone.vertices.len() as u8);
    for slot in 0..MAX_VERTICES_PER_ZONE {
        let (x, y) = zone.vertices.get(slot).copied().unwrap_or((0, 0));
        buf.write_i16::<LittleEndian>(x).unwrap();
        buf.write_i16::<LittleEndian>(y).unwrap();
    }
}

fn read_padded_str(bytes: &[u8]) -> Result<String, ZoneImageError> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end])
        .map(|s| s.to_string())
        .map_err(|_| ZoneImageError::BadString)
}

fn read_zone_slot(slot: &[u8]) -> Result<Zone, ZoneImageError> {
    let id = read_padded_str(&slot[..ZONE_ID_MAX_LEN])?;
    let name = read_padded_str(&slot[ZONE_ID_MAX_LEN..ZONE_ID_MAX_LEN + ZONE_NAME_MAX_LEN])?;
    let mut rdr = std::io::Cursor::new(&slot[ZONE_ID_MAX_LEN + ZONE_NAME_MAX_LEN..]);
    let kind = match rdr.read_u8().unwrap() {
        0 => ZoneKind::Include,
        1 => ZoneKind::Exclude,
        other => return Err(ZoneImageError::BadKind(other)),
    };
    let sensitivity = rdr.read_u8().unwrap();
    let vertex_count = rdr.read_u8().unwrap();
    if !(MIN_VERTICES_PER_ZONE..=MAX_VERTICES_PER_ZONE).contains(&(vertex_count as usize)) {
        return Err(ZoneImageError::BadVertexCount(vertex_count));
    }
    let mut vertices = Vec::with_capacity(vertex_count as usize);
    for _ in 0..vertex_count {
        let x = rdr.read_i16::<LittleEndian>().unwrap();
        let y = rdr.read_i16::<LittleEndian>().unwrap();
        vertices.push((x, y));
    }
    Ok(Zone {
        id,
        name,
        kind,
        vertices,
        sensitivity,
    })
}

/// True when no two non-adjacent edges of the closed polygon intersect.
pub fn polygon_is_simple(vertices: &[(i16, i16)]) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }
    for i in 0..n {
        let a1 = vertices[i];
        let a2 = vertices[(i + 1) % n];
        for j in (i + 1)..n {
            // Skip the shared-endpoint neighbours of edge i.
            if j == i || (j + 1) % n == i || (i + 1) % n == j {
                continue;
            }
            let b1 = vertices[j];
            let b2 = vertices[(j + 1) % n];
            if segments_intersect(a1, a2, b1, b2) {
                return false;
            }
        }
    }
    true
}

fn cross(o: (i16, i16), a: (i16, i16), b: (i16, i16)) -> i64 {
    let (ox, oy) = (o.0 as i64, o.1 as i64);
    (a.0 as i64 - ox) * (b.1 as i64 - oy) - (a.1 as i64 - oy) * (b.0 as i64 - ox)
}

fn on_segment(p: (i16, i16), q: (i16, i16), r: (i16, i16)) -> bool {
    q.0 >= p.0.min(r.0) && q.0 <= p.0.max(r.0) && q.1 >= p.1.min(r.1) && q.1 <= p.1.max(r.1)
}

fn segments_intersect(p1: (i16, i16), p2: (i16, i16), q1: (i16, i16), q2: (i16, i16)) -> bool {
    let d1 = cross(q1, q2, p1);
    let d2 = cross(q1, q2, p2);
    let d3 = cross(p1, p2, q1);
    let d4 = cross(p1, p2, q2);
    if ((d1 > 0 && d2 < 0) || (d1 < 0 && d2 > 0)) && ((d3 > 0 && d4 < 0) || (d3 < 0 && d4 > 0)) {
        return true;
    }
    (d1 == 0 && on_segment(q1, p1, q2))
        || (d2 == 0 && on_segment(q1, p2, q2))
        || (d3 == 0 && on_segment(p1, q1, p2))
        || (d4 == 0 && on_segment(p1, q2, p2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(id: &str, vertices: Vec<(i16, i16)>) -> Zone {
        Zone {
            id: id.to_string(),
            name: format!("{id} zone"),
            kind: ZoneKind::Include,
            vertices,
            sensitivity: 50,
        }
    }

    fn square(x0: i16, y0: i16, side: i16) -> Vec<(i16, i16)> {
        vec![(x0, y0), (x0 + side, y0), (x0 + side, y0 + side), (x0, y0 + side)]
    }

    #[test]
    fn roundtrip_preserves_store() {
        let store = ZoneStore {
            version: 7,
            updated_at: 1234,
            zones: vec![
                zone("desk", square(0, 1000, 1500)),
                zone("door_a", vec![(-2000, 0), (-1000, 0), (-1500, 900)]),
            ],
        };
        let bytes = store.to_bytes();
        assert_eq!(bytes.len(), ZONE_STORE_IMAGE_LEN);
        let parsed = ZoneStore::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, store);
    }

    #[test]
    fn corrupted_image_fails_checksum() {
        let store = ZoneStore {
            version: 1,
            updated_at: 0,
            zones: vec![zone("a", square(0, 0, 100))],
        };
        let mut bytes = store.to_bytes();
        bytes[20] ^= 0x40;
        match ZoneStore::from_bytes(&bytes) {
            Err(ZoneImageError::Checksum { .. }) => {}
            other => panic!("expected checksum error, got {other:?}"),
        }
    }

    #[test]
    fn validation_rejects_bad_ids() {
        let mut store = ZoneStore {
            version: 1,
            updated_at: 0,
            zones: vec![zone("has space", square(0, 0, 100))],
        };
        store.zones[0].id = "has space".to_string();
        assert_eq!(
            store.validate(),
            Err(ZoneValidationError::BadId("has space".to_string()))
        );
    }

    #[test]
    fn validation_rejects_duplicates_and_self_intersection() {
        let store = ZoneStore {
            version: 1,
            updated_at: 0,
            zones: vec![zone("a", square(0, 0, 100)), zone("a", square(200, 0, 100))],
        };
        assert_eq!(
            store.validate(),
            Err(ZoneValidationError::DuplicateId("a".to_string()))
        );

        // Bowtie: edges cross in the middle.
        let bowtie = zone("bow", vec![(0, 0), (100, 100), (100, 0), (0, 100)]);
        let store = ZoneStore {
            version: 1,
            updated_at: 0,
            zones: vec![bowtie],
        };
        assert_eq!(
            store.validate(),
            Err(ZoneValidationError::SelfIntersecting("bow".to_string()))
        );
    }

    #[test]
    fn validation_warns_on_out_of_range_vertex() {
        let store = ZoneStore {
            version: 1,
            updated_at: 0,
            zones: vec![zone("far", vec![(0, 0), (1000, 0), (500, 6500)])],
        };
        let warnings = store.validate().unwrap();
        assert_eq!(warnings.len(), 1);
        match &warnings[0] {
            ZoneWarning::VertexOutOfRange { id, vertex } => {
                assert_eq!(id, "far");
                assert_eq!(*vertex, (500, 6500));
            }
        }
    }

    #[test]
    fn zone_count_limit_enforced() {
        let zones = (0..17)
            .map(|i| zone(&format!("z{i}"), square(0, 0, 100)))
            .collect();
        let store = ZoneStore {
            version: 1,
            updated_at: 0,
            zones,
        };
        assert_eq!(store.validate(), Err(ZoneValidationError::TooManyZones(17)));
    }
}

//! Well-known binary geometries.
//!
//! Decodes OGC WKB, ISO WKB with Z/M ordinates and PostGIS EWKB (SRID flag)
//! into a small geometry tree. The tree renders to GeoJSON geometry objects
//! and to WKT. Z ordinates are kept; M ordinates are read and dropped, since
//! GeoJSON has no place for them.

use serde::{Serialize, Serializer};
use serde_json::{json, Value as JsonValue};
use thiserror::Error;

/// A position. Serializes as a GeoJSON position, `[x, y]` or `[x, y, z]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Coord {
    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }
}

impl From<[f64; 2]> for Coord {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y, z: None }
    }
}

impl Serialize for Coord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.z {
            Some(z) => [self.x, self.y, z].serialize(serializer),
            None => [self.x, self.y].serialize(serializer),
        }
    }
}

/// Decoding failure.
#[derive(Debug, Error, PartialEq)]
pub enum WkbError {
    #[error("unexpected end of WKB at byte {0}")]
    UnexpectedEof(usize),

    #[error("invalid WKB byte order marker {0:#04x}")]
    InvalidByteOrder(u8),

    #[error("unsupported WKB geometry type {0}")]
    UnsupportedType(u32),

    #[error("{0} trailing bytes after WKB geometry")]
    TrailingBytes(usize),

    #[error("WKB nesting deeper than {MAX_DEPTH} levels")]
    TooDeep,

    #[error("invalid hex-encoded WKB")]
    InvalidHex,
}

const MAX_DEPTH: usize = 32;

const EWKB_Z: u32 = 0x8000_0000;
const EWKB_M: u32 = 0x4000_0000;
const EWKB_SRID: u32 = 0x2000_0000;

/// A decoded geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// `None` is the empty point (NaN ordinates in WKB).
    Point(Option<Coord>),
    LineString(Vec<Coord>),
    Polygon(Vec<Vec<Coord>>),
    MultiPoint(Vec<Coord>),
    MultiLineString(Vec<Vec<Coord>>),
    MultiPolygon(Vec<Vec<Vec<Coord>>>),
    GeometryCollection(Vec<Geometry>),
}

impl Geometry {
    /// Decode a complete WKB buffer.
    pub fn from_wkb(bytes: &[u8]) -> Result<Self, WkbError> {
        let mut reader = Reader { bytes, pos: 0 };
        let geometry = reader.geometry(0)?;
        match bytes.len() - reader.pos {
            0 => Ok(geometry),
            n => Err(WkbError::TrailingBytes(n)),
        }
    }

    /// Decode hex-encoded WKB, as PostGIS renders geometries in text mode.
    pub fn from_hex(hex: &str) -> Result<Self, WkbError> {
        Self::from_wkb(&decode_hex(hex)?)
    }

    fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::LineString(_) => "LineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::MultiPolygon(_) => "MultiPolygon",
            Geometry::GeometryCollection(_) => "GeometryCollection",
        }
    }

    /// GeoJSON geometry object.
    pub fn to_geojson(&self) -> JsonValue {
        let ty = self.type_name();
        match self {
            Geometry::Point(Some(c)) => json!({ "type": ty, "coordinates": c }),
            Geometry::Point(None) => json!({ "type": ty, "coordinates": [] }),
            Geometry::LineString(cs) | Geometry::MultiPoint(cs) => {
                json!({ "type": ty, "coordinates": cs })
            }
            Geometry::Polygon(rings) | Geometry::MultiLineString(rings) => {
                json!({ "type": ty, "coordinates": rings })
            }
            Geometry::MultiPolygon(polys) => json!({ "type": ty, "coordinates": polys }),
            Geometry::GeometryCollection(items) => json!({
                "type": ty,
                "geometries": items.iter().map(Geometry::to_geojson).collect::<Vec<_>>(),
            }),
        }
    }

    /// Whether any position carries a Z ordinate.
    pub fn has_z(&self) -> bool {
        fn any_z(cs: &[Coord]) -> bool {
            cs.iter().any(|c| c.z.is_some())
        }
        match self {
            Geometry::Point(c) => c.is_some_and(|c| c.z.is_some()),
            Geometry::LineString(cs) | Geometry::MultiPoint(cs) => any_z(cs),
            Geometry::Polygon(rings) | Geometry::MultiLineString(rings) => {
                rings.iter().any(|r| any_z(r))
            }
            Geometry::MultiPolygon(polys) => polys.iter().flatten().any(|r| any_z(r)),
            Geometry::GeometryCollection(items) => items.iter().any(Geometry::has_z),
        }
    }

    /// Well-known text, `POINT Z (...)` style when Z is present.
    pub fn to_wkt(&self) -> String {
        let mut tag = self.type_name().to_uppercase();
        if self.has_z() && !matches!(self, Geometry::GeometryCollection(_)) {
            tag.push_str(" Z");
        }
        let body = match self {
            Geometry::Point(Some(c)) => Some(format!("({})", wkt_coord(c))),
            Geometry::Point(None) => None,
            Geometry::LineString(cs) => non_empty(cs, wkt_coords),
            Geometry::Polygon(rings) => non_empty(rings, wkt_rings),
            Geometry::MultiPoint(cs) => non_empty(cs, |cs| {
                let points: Vec<_> = cs.iter().map(|c| format!("({})", wkt_coord(c))).collect();
                format!("({})", points.join(", "))
            }),
            Geometry::MultiLineString(lines) => non_empty(lines, wkt_rings),
            Geometry::MultiPolygon(polys) => non_empty(polys, |polys| {
                let parts: Vec<_> = polys.iter().map(|p| wkt_rings(p)).collect();
                format!("({})", parts.join(", "))
            }),
            Geometry::GeometryCollection(items) => non_empty(items, |items| {
                let parts: Vec<_> = items.iter().map(Geometry::to_wkt).collect();
                format!("({})", parts.join(", "))
            }),
        };
        match body {
            Some(body) => format!("{tag} {body}"),
            None => format!("{tag} EMPTY"),
        }
    }

    /// Little-endian ISO WKB; XYZ types when any position carries Z.
    pub fn to_wkb(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_wkb(&mut out, self.has_z());
        out
    }

    fn write_wkb(&self, out: &mut Vec<u8>, z: bool) {
        let base: u32 = match self {
            Geometry::Point(_) => 1,
            Geometry::LineString(_) => 2,
            Geometry::Polygon(_) => 3,
            Geometry::MultiPoint(_) => 4,
            Geometry::MultiLineString(_) => 5,
            Geometry::MultiPolygon(_) => 6,
            Geometry::GeometryCollection(_) => 7,
        };
        let type_code = if z { base + 1000 } else { base };
        out.push(1);
        out.extend_from_slice(&type_code.to_le_bytes());

        let write_coords = |out: &mut Vec<u8>, cs: &[Coord]| {
            out.extend_from_slice(&(cs.len() as u32).to_le_bytes());
            for c in cs {
                write_coord(out, c, z);
            }
        };
        let write_rings = |out: &mut Vec<u8>, rings: &[Vec<Coord>]| {
            out.extend_from_slice(&(rings.len() as u32).to_le_bytes());
            for ring in rings {
                write_coords(out, ring);
            }
        };

        match self {
            Geometry::Point(c) => write_coord(out, &c.unwrap_or([f64::NAN, f64::NAN].into()), z),
            Geometry::LineString(cs) => write_coords(out, cs),
            Geometry::Polygon(rings) => write_rings(out, rings),
            Geometry::MultiPoint(cs) => {
                out.extend_from_slice(&(cs.len() as u32).to_le_bytes());
                for c in cs {
                    Geometry::Point(Some(*c)).write_wkb(out, z);
                }
            }
            Geometry::MultiLineString(lines) => {
                out.extend_from_slice(&(lines.len() as u32).to_le_bytes());
                for line in lines {
                    Geometry::LineString(line.clone()).write_wkb(out, z);
                }
            }
            Geometry::MultiPolygon(polys) => {
                out.extend_from_slice(&(polys.len() as u32).to_le_bytes());
                for poly in polys {
                    Geometry::Polygon(poly.clone()).write_wkb(out, z);
                }
            }
            Geometry::GeometryCollection(items) => {
                out.extend_from_slice(&(items.len() as u32).to_le_bytes());
                for item in items {
                    item.write_wkb(out, item.has_z());
                }
            }
        }
    }
}

pub fn decode_hex(hex: &str) -> Result<Vec<u8>, WkbError> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return Err(WkbError::InvalidHex);
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or(WkbError::InvalidHex)
        })
        .collect()
}

fn write_coord(out: &mut Vec<u8>, c: &Coord, z: bool) {
    out.extend_from_slice(&c.x.to_le_bytes());
    out.extend_from_slice(&c.y.to_le_bytes());
    if z {
        out.extend_from_slice(&c.z.unwrap_or(f64::NAN).to_le_bytes());
    }
}

fn non_empty<T>(items: &[T], render: impl Fn(&[T]) -> String) -> Option<String> {
    (!items.is_empty()).then(|| render(items))
}

fn wkt_coord(c: &Coord) -> String {
    match c.z {
        Some(z) => format!("{} {} {}", c.x, c.y, z),
        None => format!("{} {}", c.x, c.y),
    }
}

fn wkt_coords(cs: &[Coord]) -> String {
    let parts: Vec<_> = cs.iter().map(wkt_coord).collect();
    format!("({})", parts.join(", "))
}

fn wkt_rings(rings: &[Vec<Coord>]) -> String {
    let parts: Vec<_> = rings.iter().map(|r| wkt_coords(r)).collect();
    format!("({})", parts.join(", "))
}

// =============================================================================
// Reader
// =============================================================================

#[derive(Clone, Copy)]
enum ByteOrder {
    Big,
    Little,
}

/// Extra ordinates after x and y.
#[derive(Clone, Copy)]
struct Dims {
    z: bool,
    m: bool,
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], WkbError> {
        let end = self.pos + N;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(WkbError::UnexpectedEof(self.pos))?;
        self.pos = end;
        let mut buf = [0u8; N];
        buf.copy_from_slice(slice);
        Ok(buf)
    }

    fn u32(&mut self, order: ByteOrder) -> Result<u32, WkbError> {
        let raw = self.take::<4>()?;
        Ok(match order {
            ByteOrder::Big => u32::from_be_bytes(raw),
            ByteOrder::Little => u32::from_le_bytes(raw),
        })
    }

    fn f64(&mut self, order: ByteOrder) -> Result<f64, WkbError> {
        let raw = self.take::<8>()?;
        Ok(match order {
            ByteOrder::Big => f64::from_be_bytes(raw),
            ByteOrder::Little => f64::from_le_bytes(raw),
        })
    }

    fn coord(&mut self, order: ByteOrder, dims: Dims) -> Result<Coord, WkbError> {
        let x = self.f64(order)?;
        let y = self.f64(order)?;
        let z = if dims.z { Some(self.f64(order)?) } else { None };
        if dims.m {
            self.f64(order)?;
        }
        Ok(Coord { x, y, z })
    }

    fn coords(&mut self, order: ByteOrder, dims: Dims) -> Result<Vec<Coord>, WkbError> {
        let n = self.u32(order)? as usize;
        // Every coordinate needs at least 16 bytes; reject impossible counts early.
        if n.saturating_mul(16) > self.bytes.len() - self.pos {
            return Err(WkbError::UnexpectedEof(self.bytes.len()));
        }
        (0..n).map(|_| self.coord(order, dims)).collect()
    }

    fn rings(&mut self, order: ByteOrder, dims: Dims) -> Result<Vec<Vec<Coord>>, WkbError> {
        let n = self.u32(order)?;
        (0..n).map(|_| self.coords(order, dims)).collect()
    }

    fn geometry(&mut self, depth: usize) -> Result<Geometry, WkbError> {
        if depth > MAX_DEPTH {
            return Err(WkbError::TooDeep);
        }

        let order = match self.take::<1>()?[0] {
            0 => ByteOrder::Big,
            1 => ByteOrder::Little,
            other => return Err(WkbError::InvalidByteOrder(other)),
        };

        let raw_type = self.u32(order)?;
        if raw_type & EWKB_SRID != 0 {
            self.u32(order)?;
        }
        let iso = raw_type & 0x0FFF_FFFF;
        let (iso_z, iso_m) = match iso / 1000 {
            0 => (false, false),
            1 => (true, false),
            2 => (false, true),
            3 => (true, true),
            _ => return Err(WkbError::UnsupportedType(raw_type)),
        };
        let dims = Dims {
            z: iso_z || raw_type & EWKB_Z != 0,
            m: iso_m || raw_type & EWKB_M != 0,
        };

        let geometry = match iso % 1000 {
            1 => {
                let c = self.coord(order, dims)?;
                Geometry::Point((!c.x.is_nan() || !c.y.is_nan()).then_some(c))
            }
            2 => Geometry::LineString(self.coords(order, dims)?),
            3 => Geometry::Polygon(self.rings(order, dims)?),
            4 => Geometry::MultiPoint(
                self.members(order, depth)?
                    .into_iter()
                    .filter_map(|g| match g {
                        Geometry::Point(c) => c,
                        _ => None,
                    })
                    .collect(),
            ),
            5 => Geometry::MultiLineString(
                self.members(order, depth)?
                    .into_iter()
                    .filter_map(|g| match g {
                        Geometry::LineString(cs) => Some(cs),
                        _ => None,
                    })
                    .collect(),
            ),
            6 => Geometry::MultiPolygon(
                self.members(order, depth)?
                    .into_iter()
                    .filter_map(|g| match g {
                        Geometry::Polygon(rings) => Some(rings),
                        _ => None,
                    })
                    .collect(),
            ),
            7 => Geometry::GeometryCollection(self.members(order, depth)?),
            _ => return Err(WkbError::UnsupportedType(raw_type)),
        };

        Ok(geometry)
    }

    /// Child geometries of a multi-geometry or collection; each carries its
    /// own byte order header.
    fn members(&mut self, order: ByteOrder, depth: usize) -> Result<Vec<Geometry>, WkbError> {
        let n = self.u32(order)?;
        (0..n).map(|_| self.geometry(depth + 1)).collect()
    }
}

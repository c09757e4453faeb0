//! Geographic levels, hierarchy joins, geometry selection and WKB decoding.

pub mod geometry;
pub mod hierarchy;
pub mod level;
pub mod wkb;

pub use geometry::{select_geometry, GeoTableKind, GeometryMode, GEOMETRY_ALIAS};
pub use hierarchy::{geo_meta_columns, join_chain, JoinStep, FACT_ALIAS};
pub use level::{GeoDimension, GeoLevel};
pub use wkb::{decode_hex, Coord, Geometry, WkbError};

use std::fmt;
use std::str::FromStr;

use geo::Coord;
use geodesy::prelude::*;
use geodesy::Coor4D;

use crate::{Error, Result};

/// A coordinate reference frame that geometries in a `GeoCollection` are expressed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Crs {
    /// Longitude and latitude in degrees (EPSG:4326)
    Wgs84,
    /// Spherical web mercator in metres (EPSG:3857)
    WebMercator,
    /// Universal Transverse Mercator on WGS84, in metres. `zone` is 1 through 60.
    Utm { zone: u8, north: bool },
    /// A local Cartesian frame with no geodetic definition. It can't be reprojected.
    Planar,
}

impl Crs {
    pub fn from_epsg(code: u32) -> Option<Self> {
        match code {
            4326 => Some(Crs::Wgs84),
            3857 => Some(Crs::WebMercator),
            32601..=32660 => Some(Crs::Utm {
                zone: (code - 32600) as u8,
                north: true,
            }),
            32701..=32760 => Some(Crs::Utm {
                zone: (code - 32700) as u8,
                north: false,
            }),
            _ => None,
        }
    }

    pub fn epsg(&self) -> Option<u32> {
        match self {
            Crs::Wgs84 => Some(4326),
            Crs::WebMercator => Some(3857),
            Crs::Utm { zone, north: true } => Some(32600 + *zone as u32),
            Crs::Utm { zone, north: false } => Some(32700 + *zone as u32),
            Crs::Planar => None,
        }
    }

    /// True for every frame measured in linear units, i.e. everything but `Wgs84`.
    pub fn is_projected(&self) -> bool {
        !matches!(self, Crs::Wgs84)
    }

    /// The UTM zone containing a WGS84 position.
    pub fn utm_for(lon: f64, lat: f64) -> Self {
        let zone = ((lon + 180.0) / 6.0).floor() as i64 + 1;
        Crs::Utm {
            zone: zone.clamp(1, 60) as u8,
            north: lat >= 0.0,
        }
    }

    /// The geodesy operator taking WGS84 (radians) into this frame. `None` for frames that are
    /// WGS84 itself or have no geodetic definition.
    fn geodesy_definition(&self) -> Option<String> {
        match self {
            Crs::Wgs84 | Crs::Planar => None,
            Crs::WebMercator => Some("webmerc".to_string()),
            Crs::Utm { zone, north: true } => Some(format!("utm zone={zone}")),
            Crs::Utm { zone, north: false } => Some(format!("utm zone={zone} south")),
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.epsg() {
            Some(code) => write!(f, "EPSG:{code}"),
            None => write!(f, "LOCAL"),
        }
    }
}

impl FromStr for Crs {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("local") {
            return Ok(Crs::Planar);
        }
        let code = s
            .get(..5)
            .filter(|prefix| prefix.eq_ignore_ascii_case("epsg:"))
            .map(|_| &s[5..])
            .ok_or_else(|| Error::InvalidInput(format!("{s} isn't an EPSG:<code> identifier")))?;
        let code: u32 = code
            .parse()
            .map_err(|_| Error::InvalidInput(format!("{s} has a non-numeric EPSG code")))?;
        Crs::from_epsg(code).ok_or_else(|| Error::InvalidInput(format!("unsupported frame {s}")))
    }
}

/// Moves single coordinates from one frame to another, going through WGS84.
pub(crate) struct Transformer {
    from: Crs,
    to: Crs,
    context: Minimal,
    // Inverse of this takes `from` into WGS84 radians
    source: Option<OpHandle>,
    // Forward takes WGS84 radians into `to`
    target: Option<OpHandle>,
}

impl Transformer {
    pub fn new(from: Crs, to: Crs) -> Result<Self> {
        if from != to && (from == Crs::Planar || to == Crs::Planar) {
            return Err(Error::reproject(
                from,
                to,
                "a local planar frame has no geodetic definition",
            ));
        }

        let mut context = Minimal::new();
        let mut op = |crs: Crs| -> Result<Option<OpHandle>> {
            match crs.geodesy_definition() {
                Some(definition) => context
                    .op(&definition)
                    .map(Some)
                    .map_err(|err| Error::reproject(from, to, err)),
                None => Ok(None),
            }
        };
        let source = op(from)?;
        let target = op(to)?;

        Ok(Self {
            from,
            to,
            context,
            source,
            target,
        })
    }

    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    pub fn transform(&self, coord: Coord) -> Result<Coord> {
        if self.is_identity() {
            return Ok(coord);
        }

        let mut buffer = [coord];
        let mut data = CoordBuffer(&mut buffer);
        match self.source {
            Some(op) => {
                self.context
                    .apply(op, Inv, &mut data)
                    .map_err(|err| Error::reproject(self.from, self.to, err))?;
            }
            None => {
                data.0[0] = Coord {
                    x: coord.x.to_radians(),
                    y: coord.y.to_radians(),
                };
            }
        }
        match self.target {
            Some(op) => {
                self.context
                    .apply(op, Fwd, &mut data)
                    .map_err(|err| Error::reproject(self.from, self.to, err))?;
            }
            None => {
                let c = data.0[0];
                data.0[0] = Coord {
                    x: c.x.to_degrees(),
                    y: c.y.to_degrees(),
                };
            }
        }

        let result = data.0[0];
        if !result.x.is_finite() || !result.y.is_finite() {
            return Err(Error::reproject(
                self.from,
                self.to,
                format!("({}, {}) has no finite image", coord.x, coord.y),
            ));
        }
        Ok(result)
    }
}

/// Lets geodesy operate in place on geo coordinates
struct CoordBuffer<'a>(&'a mut [Coord]);

impl CoordinateSet for CoordBuffer<'_> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn dim(&self) -> usize {
        2
    }

    fn get_coord(&self, index: usize) -> Coor4D {
        Coor4D([self.0[index].x, self.0[index].y, 0., 0.])
    }

    fn set_coord(&mut self, index: usize, value: &Coor4D) {
        self.0[index] = Coord {
            x: value[0],
            y: value[1],
        };
    }
}

use geo::{BoundingRect, Coord, Geometry, MapCoords, Rect};
use log::debug;

use crate::crs::Transformer;
use crate::{Crs, Error, Result};

/// An ordered list of geometries sharing one reference frame. `crs` is `None` when the frame is
/// unknown; operations needing a frame reject such collections.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoCollection<G = Geometry> {
    pub geometries: Vec<G>,
    pub crs: Option<Crs>,
}

impl<G> GeoCollection<G> {
    pub fn new(geometries: Vec<G>, crs: Crs) -> Self {
        Self {
            geometries,
            crs: Some(crs),
        }
    }

    pub fn without_crs(geometries: Vec<G>) -> Self {
        Self {
            geometries,
            crs: None,
        }
    }

    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, G> {
        self.geometries.iter()
    }

    /// Widen every member to a `Geometry`, keeping order and frame.
    pub fn into_geometries(self) -> GeoCollection<Geometry>
    where
        G: Into<Geometry>,
    {
        GeoCollection {
            geometries: self.geometries.into_iter().map(Into::into).collect(),
            crs: self.crs,
        }
    }
}

impl<G> GeoCollection<G>
where
    G: BoundingRect<f64>,
    G::Output: Into<Option<Rect>>,
{
    /// The bounding box of every member, in the collection's own frame. `None` when there's
    /// nothing with coordinates.
    pub fn bounds(&self) -> Option<Rect> {
        self.iter()
            .filter_map(|g| g.bounding_rect().into())
            .reduce(|a, b| {
                Rect::new(
                    Coord {
                        x: a.min().x.min(b.min().x),
                        y: a.min().y.min(b.min().y),
                    },
                    Coord {
                        x: a.max().x.max(b.max().x),
                        y: a.max().y.max(b.max().y),
                    },
                )
            })
    }
}

impl<G> GeoCollection<G>
where
    G: BoundingRect<f64> + MapCoords<f64, f64, Output = G> + Clone,
    <G as BoundingRect<f64>>::Output: Into<Option<Rect>>,
{
    /// Reproject every coordinate into `target`.
    pub fn to_crs(&self, target: Crs) -> Result<Self> {
        let from = self.crs.ok_or(Error::MissingCrs)?;
        let transformer = Transformer::new(from, target)?;
        if transformer.is_identity() {
            return Ok(self.clone());
        }

        let geometries = self
            .iter()
            .map(|g| g.try_map_coords(|c| transformer.transform(c)))
            .collect::<Result<Vec<_>>>()?;
        Ok(GeoCollection::new(geometries, target))
    }

    /// Pick the UTM zone around the centre of this collection.
    pub fn estimate_utm_crs(&self) -> Result<Crs> {
        let bounds = match self.crs {
            Some(Crs::Wgs84) => self.bounds(),
            Some(_) => self.to_crs(Crs::Wgs84)?.bounds(),
            None => return Err(Error::MissingCrs),
        };
        let bounds = bounds.ok_or(Error::EmptyInput)?;
        let center = bounds.center();
        Ok(Crs::utm_for(center.x, center.y))
    }

    /// The frame distance-based operations should run in: the collection's own frame when it's
    /// projected or unknown, otherwise an estimated UTM zone.
    pub fn working_frame(&self) -> Result<Option<Crs>> {
        match self.crs {
            Some(crs) if !crs.is_projected() => {
                let utm = self.estimate_utm_crs()?;
                debug!("Working in {utm} instead of geographic {crs}");
                Ok(Some(utm))
            }
            other => Ok(other),
        }
    }

    /// Reproject into `frame`, if there is one.
    pub(crate) fn in_frame(&self, frame: Option<Crs>) -> Result<Self> {
        match frame {
            Some(crs) => self.to_crs(crs),
            None => Ok(self.clone()),
        }
    }
}

//! Named regions in normalized frame coordinates.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Marker that tags a region as inclusion under the naming convention.
pub const INCLUSION_MARKER: &str = "roi";

/// Marker that tags a region as exclusion under the naming convention.
pub const EXCLUSION_MARKER: &str = "roni";

/// How a region takes part in gating and drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    /// Detections are kept only inside inclusion regions.
    Inclusion,
    /// Drawn for reference, never filters.
    Exclusion,
    /// Drawn only if the renderer has a color for its name.
    DisplayOnly,
}

impl RegionKind {
    /// Classify a region name with the `roi` / `roni` convention.
    /// The inclusion marker wins when a name carries both.
    pub fn from_name(name: &str) -> Self {
        if name.contains(INCLUSION_MARKER) {
            RegionKind::Inclusion
        } else if name.contains(EXCLUSION_MARKER) {
            RegionKind::Exclusion
        } else {
            RegionKind::DisplayOnly
        }
    }
}

/// A named polygon with vertices in normalized `[0, 1] x [0, 1]` coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    name: String,
    kind: RegionKind,
    vertices: Vec<[f64; 2]>,
}

impl Region {
    /// Create a region, rejecting polygons with fewer than three vertices or
    /// non-finite coordinates.
    pub fn new(name: impl Into<String>, kind: RegionKind, vertices: Vec<[f64; 2]>) -> Result<Self> {
        let name = name.into();

        if vertices.len() < 3 {
            return Err(Error::InvalidRegion {
                name,
                reason: format!("expected at least 3 vertices, got {}", vertices.len()),
            });
        }

        if vertices.iter().flatten().any(|v| !v.is_finite()) {
            return Err(Error::InvalidRegion {
                name,
                reason: "vertices must be finite".to_string(),
            });
        }

        Ok(Self { name, kind, vertices })
    }

    /// Create a region whose kind follows the `roi` / `roni` naming convention.
    pub fn from_name(name: impl Into<String>, vertices: Vec<[f64; 2]>) -> Result<Self> {
        let name = name.into();
        let kind = RegionKind::from_name(&name);
        Self::new(name, kind, vertices)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RegionKind {
        self.kind
    }

    pub fn vertices(&self) -> &[[f64; 2]] {
        &self.vertices
    }

    pub fn is_inclusion(&self) -> bool {
        self.kind == RegionKind::Inclusion
    }

    /// Vertices scaled to pixel coordinates of a `width` x `height` frame.
    pub fn to_pixels(&self, width: f64, height: f64) -> Vec<[f64; 2]> {
        self.vertices
            .iter()
            .map(|&[x, y]| [x * width, y * height])
            .collect()
    }
}

/// Insertion-ordered set of regions keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionSet {
    regions: Vec<Region>,
}

impl RegionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from regions; a later region replaces an earlier one with
    /// the same name.
    pub fn from_regions(regions: impl IntoIterator<Item = Region>) -> Self {
        let mut set = Self::new();
        for region in regions {
            set.insert(region);
        }
        set
    }

    /// Build a set from `name -> vertices` pairs using the naming convention.
    pub fn from_named<N, I>(named: I) -> Result<Self>
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Vec<[f64; 2]>)>,
    {
        let regions = named
            .into_iter()
            .map(|(name, vertices)| Region::from_name(name, vertices))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_regions(regions))
    }

    /// Insert a region, replacing (in place) any region with the same name.
    /// Returns the replaced region.
    pub fn insert(&mut self, region: Region) -> Option<Region> {
        match self.regions.iter_mut().find(|r| r.name == region.name) {
            Some(existing) => Some(std::mem::replace(existing, region)),
            None => {
                self.regions.push(region);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    /// Regions that gate detections.
    pub fn inclusion(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(|r| r.is_inclusion())
    }

    pub fn has_inclusion(&self) -> bool {
        self.regions.iter().any(Region::is_inclusion)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl<'a> IntoIterator for &'a RegionSet {
    type Item = &'a Region;
    type IntoIter = std::slice::Iter<'a, Region>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}

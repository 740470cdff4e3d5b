//! Overlay renderer for regions and tracker snapshots.

use std::fmt;
use std::path::Path;

use ab_glyph::FontArc;
use image::{Rgb, RgbImage};
use imageproc::point::Point;
use tracing::warn;

use super::color::{Palette, GREEN, RED, WHITE};
use super::primitives;
use crate::detection::to_row_major_vec;
use crate::geometry::{representative_point, FrameSize};
use crate::region::{Region, RegionKind, RegionSet, EXCLUSION_MARKER, INCLUSION_MARKER};
use crate::snapshot::Snapshot;
use crate::{Error, Result};

/// Per-track hook run after the built-in drawing of that track, with the
/// frame drawn so far, the snapshot and the track's row index.
pub type DrawHook<'a> = dyn FnMut(&mut RgbImage, &Snapshot, usize) + 'a;

/// Which overlay layers to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawOptions {
    pub regions: bool,
    pub ids: bool,
    pub points: bool,
    pub boxes: bool,
    /// Distance-threshold circles around coasting tracks.
    pub search_circles: bool,
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            regions: true,
            ids: true,
            points: true,
            boxes: true,
            search_circles: true,
        }
    }
}

/// Visual parameters. Unset sizes scale with the frame.
#[derive(Clone)]
pub struct OverlayStyle {
    pub thickness: Option<u32>,
    pub font_scale: Option<f32>,
    pub marker_radius: Option<i32>,
    /// Opacity of region fills.
    pub fill_alpha: f32,
    pub region_outline_thickness: u32,
    pub region_label_scale: f32,
    pub region_label_color: Rgb<u8>,
    /// Font for ids and region names; no text is drawn without one.
    pub font: Option<FontArc>,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            thickness: None,
            font_scale: None,
            marker_radius: None,
            fill_alpha: 0.3,
            region_outline_thickness: 2,
            region_label_scale: 1.0,
            region_label_color: WHITE,
            font: None,
        }
    }
}

impl fmt::Debug for OverlayStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayStyle")
            .field("thickness", &self.thickness)
            .field("font_scale", &self.font_scale)
            .field("marker_radius", &self.marker_radius)
            .field("fill_alpha", &self.fill_alpha)
            .field("region_outline_thickness", &self.region_outline_thickness)
            .field("region_label_scale", &self.region_label_scale)
            .field("region_label_color", &self.region_label_color)
            .field("font", &self.font.as_ref().map(|_| "<Font>"))
            .finish()
    }
}

impl OverlayStyle {
    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    /// Load a TrueType/OpenType font from disk.
    pub fn with_font_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let font = FontArc::try_from_vec(bytes).map_err(|e| {
            Error::InvalidConfig(format!("invalid font {}: {}", path.as_ref().display(), e))
        })?;
        Ok(self.with_font(font))
    }

    /// Line thickness: explicit, or one pixel per 500 of the largest dimension.
    pub fn thickness_for(&self, frame: FrameSize) -> u32 {
        self.thickness.unwrap_or(frame.max_dim() / 500).max(1)
    }

    /// Font scale: explicit, or the largest dimension / 2000, at least 0.5.
    pub fn font_scale_for(&self, frame: FrameSize) -> f32 {
        self.font_scale
            .unwrap_or_else(|| (frame.max_dim() as f32 / 2000.0).max(0.5))
    }

    /// Point marker radius: explicit, or 0.3% of the frame height.
    pub fn marker_radius_for(&self, frame: FrameSize) -> i32 {
        self.marker_radius
            .unwrap_or((frame.height as f64 / 100.0 * 0.3) as i32)
            .max(1)
    }
}

/// Sizes resolved for one frame.
#[derive(Debug, Clone, Copy)]
struct Scale {
    thickness: u32,
    font_scale: f32,
    marker_radius: i32,
}

/// Draws regions and per-track annotations onto copies of frames.
pub struct OverlayRenderer {
    regions: RegionSet,
    region_colors: Vec<(String, Rgb<u8>)>,
    palette: Palette,
    style: OverlayStyle,
    last_snapshot: Option<Snapshot>,
    hook: Option<Box<DrawHook<'static>>>,
    warned_missing_font: bool,
}

impl fmt::Debug for OverlayRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayRenderer")
            .field("regions", &self.regions)
            .field("region_colors", &self.region_colors)
            .field("palette", &self.palette)
            .field("style", &self.style)
            .field("hook", &self.hook.as_ref().map(|_| "<DrawHook>"))
            .finish()
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(RegionSet::new())
    }
}

/// Default region colors keyed by name marker.
pub fn default_region_colors() -> Vec<(String, Rgb<u8>)> {
    vec![
        (INCLUSION_MARKER.to_string(), GREEN),
        (EXCLUSION_MARKER.to_string(), RED),
    ]
}

impl OverlayRenderer {
    pub fn new(regions: RegionSet) -> Self {
        Self {
            regions,
            region_colors: default_region_colors(),
            palette: Palette::default(),
            style: OverlayStyle::default(),
            last_snapshot: None,
            hook: None,
            warned_missing_font: false,
        }
    }

    pub fn with_style(mut self, style: OverlayStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Replace the name → color mapping used for regions.
    pub fn with_region_colors<S: Into<String>>(mut self, colors: impl IntoIterator<Item = (S, Rgb<u8>)>) -> Self {
        self.region_colors = colors.into_iter().map(|(k, c)| (k.into(), c)).collect();
        self
    }

    pub fn set_regions(&mut self, regions: RegionSet) {
        self.regions = regions;
    }

    pub fn set_hook(&mut self, hook: impl FnMut(&mut RgbImage, &Snapshot, usize) + 'static) {
        self.hook = Some(Box::new(hook));
    }

    pub fn clear_hook(&mut self) {
        self.hook = None;
    }

    pub fn regions(&self) -> &RegionSet {
        &self.regions
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    pub fn style_mut(&mut self) -> &mut OverlayStyle {
        &mut self.style
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Last snapshot passed to [`OverlayRenderer::draw`].
    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.last_snapshot.as_ref()
    }

    /// Color for a region: an exact name key, then the first key contained in
    /// the name, then the region's kind. Display-only regions without a
    /// matching key are not drawn.
    pub fn region_color(&self, region: &Region) -> Option<Rgb<u8>> {
        let name = region.name();
        self.region_colors
            .iter()
            .find(|(key, _)| key == name)
            .or_else(|| self.region_colors.iter().find(|(key, _)| name.contains(key.as_str())))
            .map(|&(_, color)| color)
            .or(match region.kind() {
                RegionKind::Inclusion => Some(GREEN),
                RegionKind::Exclusion => Some(RED),
                RegionKind::DisplayOnly => None,
            })
    }

    /// Draw `snapshot`, or the last snapshot drawn when `None`, onto a copy of
    /// `frame`.
    pub fn draw(&mut self, frame: &RgbImage, snapshot: Option<&Snapshot>, opts: &DrawOptions) -> Result<RgbImage> {
        if let Some(snapshot) = snapshot {
            self.last_snapshot = Some(snapshot.clone());
        }

        let current = self.last_snapshot.take().unwrap_or_default();
        let result = self.render(frame, &current, opts);
        self.last_snapshot = Some(current);
        result
    }

    /// Draw `snapshot` onto a copy of `frame` without remembering it.
    pub fn render(&mut self, frame: &RgbImage, snapshot: &Snapshot, opts: &DrawOptions) -> Result<RgbImage> {
        let mut canvas = frame.clone();
        let size = FrameSize::from(frame);
        let scale = Scale {
            thickness: self.style.thickness_for(size),
            font_scale: self.style.font_scale_for(size),
            marker_radius: self.style.marker_radius_for(size),
        };

        let wants_text = (opts.ids && !snapshot.is_empty()) || (opts.regions && !self.regions.is_empty());
        if wants_text && self.style.font.is_none() && !self.warned_missing_font {
            warn!("no font configured for overlay renderer, ids and region names are not drawn");
            self.warned_missing_font = true;
        }

        if opts.regions {
            self.draw_regions(&mut canvas);
        }

        for index in 0..snapshot.len() {
            self.draw_track(&mut canvas, snapshot, index, scale, opts)?;
            if let Some(hook) = self.hook.as_mut() {
                hook(&mut canvas, snapshot, index);
            }
        }

        Ok(canvas)
    }

    /// Translucent region fills, then opaque outlines and names on top.
    fn draw_regions(&self, canvas: &mut RgbImage) {
        let (w, h) = (canvas.width() as f64, canvas.height() as f64);
        let mut overlay = canvas.clone();
        let mut outlines = Vec::new();

        for region in &self.regions {
            let Some(color) = self.region_color(region) else {
                continue;
            };
            let vertices: Vec<Point<i32>> = region
                .to_pixels(w, h)
                .into_iter()
                .map(|[x, y]| Point::new(x as i32, y as i32))
                .collect();

            primitives::filled_polygon(&mut overlay, &vertices, color);
            outlines.push((region.name(), vertices, color));
        }

        if outlines.is_empty() {
            return;
        }

        primitives::blend(canvas, &overlay, self.style.fill_alpha);

        for (name, vertices, color) in outlines {
            primitives::polygon_outline(canvas, &vertices, color, self.style.region_outline_thickness);
            if let (Some(font), Some(center)) = (&self.style.font, primitives::polygon_centroid(&vertices)) {
                primitives::text(
                    canvas,
                    name,
                    center,
                    font,
                    self.style.region_label_scale,
                    self.style.region_label_color,
                );
            }
        }
    }

    fn draw_track(
        &self,
        canvas: &mut RgbImage,
        snapshot: &Snapshot,
        index: usize,
        scale: Scale,
        opts: &DrawOptions,
    ) -> Result<()> {
        let Some(row) = snapshot.row(index) else {
            return Ok(());
        };
        let color = self.palette.choose_color(row.id);
        let point = to_row_major_vec(row.last_det_points.unwrap_or(row.estimate));

        if opts.search_circles && !row.is_fresh {
            let estimate = to_row_major_vec(row.estimate);
            self.draw_search_area(canvas, &estimate, index, snapshot.distance_threshold(), color, scale)?;
        }

        if opts.points {
            self.draw_marker(canvas, &point, index, color, scale)?;
        }

        if opts.ids {
            if let Some(font) = &self.style.font {
                let [x, y] = pixel_center(&point, index)?;
                primitives::text(canvas, &row.id.to_string(), (x, y), font, scale.font_scale, color);
            }
        }

        if opts.boxes {
            if let Some([x1, y1, x2, y2]) = row.last_det_box {
                primitives::rectangle(
                    canvas,
                    (x1 as i32, y1 as i32),
                    (x2 as i32, y2 as i32),
                    color,
                    scale.thickness,
                );
            }
        }

        Ok(())
    }

    /// Circle marker for a point, rectangle for a box.
    fn draw_marker(&self, canvas: &mut RgbImage, coords: &[f64], index: usize, color: Rgb<u8>, scale: Scale) -> Result<()> {
        match *coords {
            [x, y] => primitives::circle(canvas, (x as i32, y as i32), scale.marker_radius, color, scale.thickness),
            [x1, y1, x2, y2] => primitives::rectangle(
                canvas,
                (x1 as i32, y1 as i32),
                (x2 as i32, y2 as i32),
                color,
                scale.thickness,
            ),
            _ => return Err(Error::MalformedPoint { index, len: coords.len() }),
        }
        Ok(())
    }

    /// Search neighborhood of a coasting track: a distance-threshold circle
    /// around the predicted point, or around the center of the predicted box.
    fn draw_search_area(
        &self,
        canvas: &mut RgbImage,
        estimate: &[f64],
        index: usize,
        distance_threshold: f64,
        color: Rgb<u8>,
        scale: Scale,
    ) -> Result<()> {
        // nothing beyond the frame diagonal is visible
        let diagonal = (canvas.width() as f64).hypot(canvas.height() as f64).ceil();
        let radius = distance_threshold.clamp(0.0, diagonal) as i32;
        let center = pixel_center(estimate, index)?;

        if estimate.len() == 2 {
            primitives::circle(canvas, (center[0], center[1]), 2, color, scale.thickness);
        }
        primitives::circle(canvas, (center[0], center[1]), radius, color, scale.thickness);
        self.draw_marker(canvas, estimate, index, color, scale)
    }
}

/// Integer representative point; box centers use integer halving.
fn pixel_center(coords: &[f64], index: usize) -> Result<[i32; 2]> {
    let truncated: Vec<f64> = coords.iter().map(|v| v.trunc()).collect();
    let [x, y] = representative_point(&truncated, index)?;
    Ok([x.floor() as i32, y.floor() as i32])
}

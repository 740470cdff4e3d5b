//! Colors and palettes.

use image::Rgb;

pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// matplotlib's tab10, in RGB.
const TAB10: [Rgb<u8>; 10] = [
    Rgb([31, 119, 180]),
    Rgb([255, 127, 14]),
    Rgb([44, 160, 44]),
    Rgb([214, 39, 40]),
    Rgb([148, 103, 189]),
    Rgb([140, 86, 75]),
    Rgb([227, 119, 194]),
    Rgb([127, 127, 127]),
    Rgb([188, 189, 34]),
    Rgb([23, 190, 207]),
];

/// Deterministic color choice for track ids.
///
/// The same id always maps to the same color, so a track keeps its color
/// for as long as it lives.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    colors: Vec<Rgb<u8>>,
    default_color: Rgb<u8>,
}

impl Palette {
    pub fn tab10() -> Self {
        Self::new(TAB10.to_vec())
    }

    /// A palette cycling through `colors`. An empty palette always yields
    /// the default color.
    pub fn new(colors: Vec<Rgb<u8>>) -> Self {
        Self {
            colors,
            default_color: BLACK,
        }
    }

    pub fn with_default_color(mut self, color: Rgb<u8>) -> Self {
        self.default_color = color;
        self
    }

    pub fn choose_color(&self, id: i32) -> Rgb<u8> {
        if self.colors.is_empty() {
            return self.default_color;
        }
        self.colors[id.unsigned_abs() as usize % self.colors.len()]
    }

    /// Like [`Palette::choose_color`], with the default color for `None`.
    pub fn choose_color_opt(&self, id: Option<i32>) -> Rgb<u8> {
        id.map_or(self.default_color, |id| self.choose_color(id))
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::tab10()
    }
}

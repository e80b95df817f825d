//! Named colormaps and colour parsing.

use anyhow::{Result, anyhow};
use plotters::style::RGBColor;

/// Cells with no finite value.
pub const MISSING: RGBColor = RGBColor(191, 191, 191);

const VIRIDIS: &[u32] = &[
    0x440154, 0x482878, 0x3E4A89, 0x31688E, 0x26828E, 0x1F9E89, 0x35B779, 0x6DCD59, 0xFDE725,
];
const MAGMA: &[u32] = &[
    0x000004, 0x1C1044, 0x4F127B, 0x812581, 0xB5367A, 0xE55064, 0xFB8761, 0xFEC287, 0xFCFDBF,
];
const INFERNO: &[u32] = &[
    0x000004, 0x1F0C48, 0x550F6D, 0x88226A, 0xBA3655, 0xE35933, 0xF98C0A, 0xF9C932, 0xFCFFA4,
];
const PLASMA: &[u32] = &[
    0x0D0887, 0x4C02A1, 0x7E03A8, 0xA92395, 0xCC4778, 0xE66C5C, 0xF89540, 0xFDC527, 0xF0F921,
];
const CIVIDIS: &[u32] = &[0x00224E, 0x414D6B, 0x7C7B78, 0xBCAF6F, 0xFEE838];
const GRAY: &[u32] = &[0x000000, 0xFFFFFF];

/// Piecewise-linear colormap over evenly spaced stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Colormap {
    stops: &'static [u32],
    reversed: bool,
}

impl Colormap {
    /// Look up `viridis`, `magma`, `inferno`, `plasma`, `cividis` or `gray`,
    /// optionally suffixed with `_r` for the reversed map.
    pub fn from_name(name: &str) -> Result<Self> {
        let (base, reversed) = match name.strip_suffix("_r") {
            Some(base) => (base, true),
            None => (name, false),
        };
        let stops = match base {
            "viridis" => VIRIDIS,
            "magma" => MAGMA,
            "inferno" => INFERNO,
            "plasma" => PLASMA,
            "cividis" => CIVIDIS,
            "gray" | "grey" => GRAY,
            _ => return Err(anyhow!("unknown colormap {name:?}")),
        };
        Ok(Self { stops, reversed })
    }

    /// Colour at position `t` in `[0, 1]`; out-of-range positions clamp.
    pub fn at(&self, t: f64) -> RGBColor {
        if !t.is_finite() {
            return MISSING;
        }
        let t = t.clamp(0.0, 1.0);
        let t = if self.reversed { 1.0 - t } else { t };
        let scaled = t * (self.stops.len() - 1) as f64;
        let lower = (scaled.floor() as usize).min(self.stops.len() - 2);
        let frac = scaled - lower as f64;
        let (r0, g0, b0) = channels(self.stops[lower]);
        let (r1, g1, b1) = channels(self.stops[lower + 1]);
        RGBColor(lerp(r0, r1, frac), lerp(g0, g1, frac), lerp(b0, b1, frac))
    }

    /// Colour for `value` with `[lo, hi]` spanning the map.
    pub fn map(&self, value: f64, lo: f64, hi: f64) -> RGBColor {
        if !value.is_finite() {
            return MISSING;
        }
        self.at((value - lo) / (hi - lo))
    }
}

fn channels(hex: u32) -> (u8, u8, u8) {
    ((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

fn lerp(a: u8, b: u8, frac: f64) -> u8 {
    (f64::from(a) + (f64::from(b) - f64::from(a)) * frac).round() as u8
}

/// Parse `#rrggbb`, `#rgb` or a basic colour name.
pub fn parse_color(spec: &str) -> Result<RGBColor> {
    let spec = spec.trim();
    if let Some(hex) = spec.strip_prefix('#') {
        let digits = match hex.len() {
            6 => hex.to_string(),
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            _ => return Err(anyhow!("invalid colour {spec:?}")),
        };
        let value =
            u32::from_str_radix(&digits, 16).map_err(|_| anyhow!("invalid colour {spec:?}"))?;
        let (r, g, b) = channels(value);
        return Ok(RGBColor(r, g, b));
    }
    let rgb = match spec.to_ascii_lowercase().as_str() {
        "black" | "k" => (0, 0, 0),
        "white" | "w" => (255, 255, 255),
        "red" | "r" => (255, 0, 0),
        "green" | "g" => (0, 128, 0),
        "blue" | "b" => (0, 0, 255),
        "gray" | "grey" => (128, 128, 128),
        "lightgray" | "lightgrey" => (211, 211, 211),
        "darkgray" | "darkgrey" => (169, 169, 169),
        "orange" => (255, 165, 0),
        "purple" => (128, 0, 128),
        _ => return Err(anyhow!("invalid colour {spec:?}")),
    };
    Ok(RGBColor(rgb.0, rgb.1, rgb.2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb(color: RGBColor) -> (u8, u8, u8) {
        (color.0, color.1, color.2)
    }

    #[test]
    fn endpoints_match_first_and_last_stops() {
        let viridis = Colormap::from_name("viridis").expect("viridis");
        assert_eq!(rgb(viridis.at(0.0)), (0x44, 0x01, 0x54));
        assert_eq!(rgb(viridis.at(1.0)), (0xFD, 0xE7, 0x25));
    }

    #[test]
    fn reversed_map_swaps_ends() {
        let magma = Colormap::from_name("magma").expect("magma");
        let magma_r = Colormap::from_name("magma_r").expect("magma_r");
        assert_eq!(rgb(magma.at(0.0)), rgb(magma_r.at(1.0)));
        assert_eq!(rgb(magma.at(0.25)), rgb(magma_r.at(0.75)));
    }

    #[test]
    fn out_of_bounds_values_clamp_and_nan_is_grey() {
        let gray = Colormap::from_name("gray").expect("gray");
        assert_eq!(rgb(gray.map(-5.0, 0.0, 1.0)), (0, 0, 0));
        assert_eq!(rgb(gray.map(9.0, 0.0, 1.0)), (255, 255, 255));
        assert_eq!(rgb(gray.map(0.5, 0.0, 1.0)), (128, 128, 128));
        assert_eq!(rgb(gray.map(f64::NAN, 0.0, 1.0)), rgb(MISSING));
    }

    #[test]
    fn unknown_colormap_is_rejected() {
        assert!(Colormap::from_name("jet").is_err());
    }

    #[test]
    fn parses_hex_and_named_colours() {
        assert_eq!(rgb(parse_color("#1f77b4").expect("hex")), (0x1F, 0x77, 0xB4));
        assert_eq!(rgb(parse_color("#fff").expect("short hex")), (255, 255, 255));
        assert_eq!(rgb(parse_color("Black").expect("name")), (0, 0, 0));
        assert!(parse_color("#12345").is_err());
        assert!(parse_color("chartreuse-ish").is_err());
    }
}

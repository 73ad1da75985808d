//! Deterministic colors for calendar sources.
//!
//! The color of a source is normally carried in the page URL. Sources without a usable color get
//! one derived from their id: the CRC-32 of the id is spread over the hue circle with the golden
//! ratio, saturation stays between 75% and 100%, lightness is fixed at 50%.

static GOLDEN_RATIO: f64 = 0.618033988749895;
static LIGHTNESS: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    /// Degrees in `[0, 360)`.
    pub hue: f64,
    /// In `[0.75, 1.0)`.
    pub saturation: f64,
    pub lightness: f64,
}

impl Hsl {
    pub fn to_rgb(self) -> [u8; 3] {
        let chroma = (1.0 - (2.0 * self.lightness - 1.0).abs()) * self.saturation;
        let sector = self.hue.rem_euclid(360.0) / 60.0;
        let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
        let (r, g, b) = match sector as u8 {
            0 => (chroma, x, 0.0),
            1 => (x, chroma, 0.0),
            2 => (0.0, chroma, x),
            3 => (0.0, x, chroma),
            4 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };
        let m = self.lightness - chroma / 2.0;
        let channel = |value: f64| ((value + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        [channel(r), channel(g), channel(b)]
    }

    pub fn to_hex(self) -> String {
        let [r, g, b] = self.to_rgb();
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

/// The hash-derived HSL color of an id.
pub fn hsl_for(id: &str) -> Hsl {
    let checksum = f64::from(crc32fast::hash(id.as_bytes()));
    let hue = (GOLDEN_RATIO * checksum) % 1.0;
    let saturation = ((GOLDEN_RATIO * checksum * 2.0) % 0.25) + 0.75;
    Hsl {
        hue: hue * 360.0,
        saturation,
        lightness: LIGHTNESS,
    }
}

/// The hash-derived `#rrggbb` color of an id.
pub fn color_for(id: &str) -> String {
    hsl_for(id).to_hex()
}

/// Whether `value` is a `#rgb` or `#rrggbb` color.
pub fn is_hex_color(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

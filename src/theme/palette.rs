//! Ambient background colours picked from cover art.

use image::imageops::FilterType;
use image::DynamicImage;
use std::fmt;
use std::path::Path;

const GRID: u32 = 40;
/// Sample every Nth pixel of the resized grid.
const SAMPLE_STRIDE: usize = 4;
const MIN_BRIGHTNESS: f64 = 30.0;
const MAX_BRIGHTNESS: f64 = 230.0;
const CLUSTER_THRESHOLD: f64 = 40.0;
const SATURATION_BAND: (f64, f64) = (20.0, 40.0);
const LIGHTNESS_BAND: (f64, f64) = (80.0, 95.0);

pub const FALLBACK: [ThemeColor; 4] = [
    ThemeColor::Rgb(0x5b, 0x21, 0xb6),
    ThemeColor::Rgb(0x7c, 0x3a, 0xed),
    ThemeColor::Rgb(0xa7, 0x8b, 0xfa),
    ThemeColor::Rgb(0x4c, 0x1d, 0x95),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThemeColor {
    Rgb(u8, u8, u8),
    /// Hue in degrees, saturation and lightness in percent.
    Hsl(u16, u8, u8),
}

impl fmt::Display for ThemeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThemeColor::Rgb(r, g, b) => write!(f, "#{r:02x}{g:02x}{b:02x}"),
            ThemeColor::Hsl(h, s, l) => write!(f, "hsl({h}, {s}%, {l}%)"),
        }
    }
}

/// The fallback palette cycled to `count` entries.
pub fn fallback(count: usize) -> Vec<ThemeColor> {
    FALLBACK.iter().copied().cycle().take(count).collect()
}

/// Decode `path` and extract `count` colours. Never fails: unreadable
/// images give the fallback palette.
pub fn extract_from_path(path: &Path, count: usize) -> Vec<ThemeColor> {
    match image::open(path) {
        Ok(img) => extract_from_image(&img, count),
        Err(e) => {
            tracing::debug!("cover {} not decodable: {e}", path.display());
            fallback(count)
        }
    }
}

struct Cluster {
    r: u8,
    g: u8,
    b: u8,
    count: usize,
}

impl Cluster {
    fn distance(&self, r: u8, g: u8, b: u8) -> f64 {
        let dr = f64::from(self.r) - f64::from(r);
        let dg = f64::from(self.g) - f64::from(g);
        let db = f64::from(self.b) - f64::from(b);
        (dr * dr + dg * dg + db * db).sqrt()
    }
}

pub fn extract_from_image(img: &DynamicImage, count: usize) -> Vec<ThemeColor> {
    if count == 0 {
        return Vec::new();
    }
    let small = img.resize_exact(GRID, GRID, FilterType::Triangle).to_rgb8();

    let mut clusters: Vec<Cluster> = Vec::new();
    for px in small.pixels().step_by(SAMPLE_STRIDE) {
        let [r, g, b] = px.0;
        let brightness = (299.0 * f64::from(r) + 587.0 * f64::from(g) + 114.0 * f64::from(b)) / 1000.0;
        if !(MIN_BRIGHTNESS..=MAX_BRIGHTNESS).contains(&brightness) {
            continue;
        }
        match clusters.iter_mut().find(|c| c.distance(r, g, b) < CLUSTER_THRESHOLD) {
            Some(c) => c.count += 1,
            None => clusters.push(Cluster { r, g, b, count: 1 }),
        }
    }

    if clusters.is_empty() {
        return fallback(count);
    }
    // Stable: equal counts keep first-seen order.
    clusters.sort_by(|a, b| b.count.cmp(&a.count));

    let mut out: Vec<ThemeColor> = clusters.iter().take(count).map(|c| pastel(c.r, c.g, c.b)).collect();
    let base = &clusters[0];
    while out.len() < count {
        let shift = (out.len() as i32 + 1) * 30;
        let r = (i32::from(base.r) - shift).clamp(0, 255) as u8;
        let g = (i32::from(base.g) + shift).clamp(0, 255) as u8;
        let b = (i32::from(base.b) + 20).clamp(0, 255) as u8;
        out.push(pastel(r, g, b));
    }
    out
}

/// Convert to HSL and force into the pale, washed-out band.
fn pastel(r: u8, g: u8, b: u8) -> ThemeColor {
    let (h, s, l) = rgb_to_hsl(r, g, b);
    let s = (s * 100.0).clamp(SATURATION_BAND.0, SATURATION_BAND.1).round();
    let l = (l * 100.0).clamp(LIGHTNESS_BAND.0, LIGHTNESS_BAND.1).round();
    ThemeColor::Hsl((h * 360.0).round() as u16 % 360, s as u8, l as u8)
}

/// Components in `[0, 1]`.
fn rgb_to_hsl(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let r = f64::from(r) / 255.0;
    let g = f64::from(g) / 255.0;
    let b = f64::from(b) / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    if max == min {
        return (0.0, 0.0, l);
    }
    let d = max - min;
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    (h / 6.0, s, l)
}

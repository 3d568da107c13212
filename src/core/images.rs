//! # Image Summaries
//!
//! Avatars are reduced to two dominant colours, stretched into a gradient
//! as wide as the user's `@handle`. The renderer tints username
//! glyphs with it. Nothing else about the image is kept.

use std::collections::HashMap;

use image::imageops::FilterType;

use crate::core::post::UserId;

pub type Rgb = [u8; 3];

/// Saturation multiplier applied before clustering, so the two picked
/// colours read as colours rather than greys.
const SATURATION_BOOST: f32 = 10.0;

/// Avatars are shrunk to this edge length before clustering.
const SAMPLE_EDGE: u32 = 24;

const CLUSTER_ROUNDS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSummary {
    /// The avatar URL this summary was computed from
    pub source_url: String,
    /// Most frequent colour first
    pub palette: [Rgb; 2],
    /// One colour per cell, `palette[0]` fading into `palette[1]`
    pub gradient: Vec<Rgb>,
}

impl ImageSummary {
    pub fn from_palette(source_url: impl Into<String>, palette: [Rgb; 2], width: usize) -> Self {
        Self {
            source_url: source_url.into(),
            palette,
            gradient: gradient(palette, width),
        }
    }

    /// Colour for cell `index`, holding the last colour past the end.
    pub fn color_at(&self, index: usize) -> Rgb {
        self.gradient
            .get(index)
            .or(self.gradient.last())
            .copied()
            .unwrap_or(self.palette[0])
    }
}

/// Decodes an avatar and reduces it to a summary `width` cells wide.
pub fn summarize(
    source_url: &str,
    bytes: &[u8],
    width: usize,
) -> Result<ImageSummary, image::ImageError> {
    let decoded = image::load_from_memory(bytes)?;
    let sample = decoded
        .resize_exact(SAMPLE_EDGE, SAMPLE_EDGE, FilterType::Triangle)
        .to_rgb8();
    let pixels: Vec<Rgb> = sample.pixels().map(|p| saturate(p.0)).collect();
    Ok(ImageSummary::from_palette(
        source_url,
        dominant_pair(&pixels),
        width,
    ))
}

fn saturate(rgb: Rgb) -> Rgb {
    let mean = rgb.iter().map(|c| *c as f32).sum::<f32>() / 3.0;
    rgb.map(|c| (mean + (c as f32 - mean) * SATURATION_BOOST).clamp(0.0, 255.0) as u8)
}

fn distance(a: [f32; 3], b: Rgb) -> f32 {
    (0..3).map(|i| (a[i] - b[i] as f32).powi(2)).sum()
}

/// Two-means clustering seeded with the darkest and brightest pixels.
/// Returns the centres, larger cluster first. A single-colour image
/// yields the same colour twice.
fn dominant_pair(pixels: &[Rgb]) -> [Rgb; 2] {
    let luma = |p: &&Rgb| p.iter().map(|c| *c as u32).sum::<u32>();
    let (Some(dark), Some(bright)) = (pixels.iter().min_by_key(luma), pixels.iter().max_by_key(luma))
    else {
        return [[0; 3]; 2];
    };
    let mut centres = [dark.map(f32::from), bright.map(f32::from)];
    let mut counts = [0usize; 2];

    for _ in 0..CLUSTER_ROUNDS {
        let mut sums = [[0f32; 3]; 2];
        counts = [0; 2];
        for p in pixels {
            let k = usize::from(distance(centres[1], *p) < distance(centres[0], *p));
            counts[k] += 1;
            for (sum, c) in sums[k].iter_mut().zip(p) {
                *sum += *c as f32;
            }
        }
        for k in 0..2 {
            if counts[k] > 0 {
                centres[k] = sums[k].map(|s| s / counts[k] as f32);
            }
        }
    }

    let to_rgb = |c: [f32; 3]| c.map(|v| v.round().clamp(0.0, 255.0) as u8);
    let (first, second) = if counts[1] > counts[0] { (1, 0) } else { (0, 1) };
    let major = to_rgb(centres[first]);
    let minor = if counts[second] == 0 {
        major
    } else {
        to_rgb(centres[second])
    };
    [major, minor]
}

fn gradient(palette: [Rgb; 2], width: usize) -> Vec<Rgb> {
    match width {
        0 => Vec::new(),
        1 => vec![palette[0]],
        _ => (0..width)
            .map(|i| {
                let t = i as f32 / (width - 1) as f32;
                std::array::from_fn(|c| {
                    let (a, b) = (palette[0][c] as f32, palette[1][c] as f32);
                    (a + (b - a) * t).round() as u8
                })
            })
            .collect(),
    }
}

/// A freshly computed summary, sent from the worker to the UI thread.
#[derive(Debug, Clone)]
pub struct ImageResult {
    pub user_id: UserId,
    pub summary: ImageSummary,
}

/// Per-user summaries plus a generation counter per user, so renderers
/// can tell a summary changed without comparing pixels.
#[derive(Debug, Default)]
pub struct ImageCache {
    entries: HashMap<UserId, (ImageSummary, u64)>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user: UserId) -> Option<&ImageSummary> {
        self.entries.get(&user).map(|(s, _)| s)
    }

    /// Zero until the first summary for `user` lands.
    pub fn generation(&self, user: UserId) -> u64 {
        self.entries.get(&user).map_or(0, |(_, g)| *g)
    }

    /// True when nothing is cached for `url`.
    pub fn is_stale(&self, user: UserId, url: &str) -> bool {
        self.get(user).is_none_or(|s| s.source_url != url)
    }

    pub fn publish(&mut self, result: ImageResult) {
        let entry = self
            .entries
            .entry(result.user_id)
            .or_insert_with(|| (result.summary.clone(), 0));
        entry.0 = result.summary;
        entry.1 += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb as Pixel};
    use std::io::Cursor;

    fn png(width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 3]) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| Pixel(f(x, y)));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn gradient_spans_the_requested_width() {
        let s = ImageSummary::from_palette("u", [[0, 0, 0], [200, 100, 50]], 5);
        assert_eq!(s.gradient.len(), 5);
        assert_eq!(s.gradient[0], [0, 0, 0]);
        assert_eq!(s.gradient[4], [200, 100, 50]);
        assert_eq!(s.gradient[2], [100, 50, 25]);
        assert_eq!(s.color_at(99), [200, 100, 50]);
    }

    #[test]
    fn solid_image_yields_one_colour_twice() {
        let bytes = png(8, 8, |_, _| [255, 0, 0]);
        let s = summarize("u", &bytes, 4).unwrap();
        assert_eq!(s.palette[0], s.palette[1]);
        assert_eq!(s.palette[0], [255, 0, 0]);
    }

    #[test]
    fn majority_colour_comes_first() {
        // Three quarters blue, one quarter red.
        let bytes = png(16, 16, |x, _| if x < 4 { [255, 0, 0] } else { [0, 0, 255] });
        let s = summarize("u", &bytes, 6).unwrap();
        assert!(s.palette[0][2] > 200 && s.palette[0][0] < 60);
        assert!(s.palette[1][0] > 150);
        assert_eq!(s.gradient.len(), 6);
    }

    #[test]
    fn undecodable_bytes_are_an_error() {
        assert!(summarize("u", b"not an image", 3).is_err());
    }

    #[test]
    fn cache_generations_and_staleness() {
        let mut cache = ImageCache::new();
        assert_eq!(cache.generation(1), 0);
        assert!(cache.is_stale(1, "a"));

        let summary = ImageSummary::from_palette("a", [[1, 1, 1]; 2], 2);
        cache.publish(ImageResult {
            user_id: 1,
            summary: summary.clone(),
        });
        assert_eq!(cache.generation(1), 1);
        assert!(!cache.is_stale(1, "a"));
        assert!(cache.is_stale(1, "b"));

        cache.publish(ImageResult {
            user_id: 1,
            summary,
        });
        assert_eq!(cache.generation(1), 2);
    }
}

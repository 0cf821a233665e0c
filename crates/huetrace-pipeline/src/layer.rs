//! Binary mask construction.
//!
//! Color mode builds one mask per palette entry with [`LayerBuilder`];
//! black mode derives a single mask with [`monochrome_mask`].  The
//! K-means sample collection lives here as well since it applies the
//! same background test as the layer masks.

use std::collections::HashMap;

use crate::bitmap::Bitmap;
use crate::color::{ColorSpace, Rgb, Sample};
use crate::config::{BitmapType, PipelineConfig};
use crate::palette::Palette;
use crate::source::PixelSource;

/// Gather clustering samples from every non-background pixel.
///
/// Pixels are visited column by column (x outer, y inner).
#[must_use]
pub fn collect_samples<S: PixelSource + ?Sized>(
    source: &S,
    background: Rgb,
    bg_distance: f64,
    space: ColorSpace,
) -> Vec<Sample> {
    let dims = source.dimensions();
    let mut samples = Vec::new();
    for x in 0..dims.width {
        for y in 0..dims.height {
            let color = source.color(x, y);
            if color.distance(background) <= bg_distance {
                continue;
            }
            samples.push(space.sample(color));
        }
    }
    samples
}

/// Builds palette layer masks on demand.
///
/// Each call to [`build`](Self::build) produces one fresh mask; nothing
/// is retained between layers except the memoized remap lookups.
#[derive(Debug)]
pub struct LayerBuilder<'a, S: PixelSource + ?Sized> {
    source: &'a S,
    palette: &'a Palette,
    live: Vec<Rgb>,
    background: Rgb,
    bg_distance: f64,
    match_threshold: f64,
    similar_distance: f64,
    resolved: HashMap<Rgb, Option<Rgb>>,
}

impl<'a, S: PixelSource + ?Sized> LayerBuilder<'a, S> {
    /// Prepare a builder for `palette` over `source`.
    #[must_use]
    pub fn new(source: &'a S, palette: &'a Palette, background: Rgb, config: &PipelineConfig) -> Self {
        Self {
            source,
            palette,
            live: palette.colors(),
            background,
            bg_distance: config.bg_color_distance,
            match_threshold: config.similar_color_distance + config.kmeans_gap_fix_value,
            similar_distance: config.similar_color_distance,
            resolved: HashMap::new(),
        }
    }

    /// Number of layers the palette yields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether the palette is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Build the mask for palette entry `index`, or `None` if out of range.
    #[must_use]
    pub fn build(&mut self, index: usize) -> Option<Bitmap> {
        let target = *self.live.get(index)?;
        let single = self.live.len() == 1;
        let dims = self.source.dimensions();
        let (width, height) = (dims.width as usize, dims.height as usize);

        #[allow(clippy::cast_possible_truncation)]
        let mask = Bitmap::from_fn(width, height, |x, y| {
            let color = self.source.color(x as u32, y as u32);
            if color.distance(self.background) <= self.bg_distance {
                return false;
            }
            if single || color.distance(target) <= self.match_threshold {
                return true;
            }
            self.remapped(color) == Some(target)
        });
        Some(mask)
    }

    /// Live palette color a near-miss pixel color belongs to, if any.
    fn remapped(&mut self, color: Rgb) -> Option<Rgb> {
        if self.palette.remap.is_empty() {
            return None;
        }
        if let Some(&hit) = self.resolved.get(&color) {
            return hit;
        }
        let remap = &self.palette.remap;
        let key = if remap.get(color).is_some() {
            Some(color)
        } else {
            remap.nearest_key(color, self.similar_distance)
        };
        let result = key.and_then(|k| remap.resolve(k, &self.live));
        self.resolved.insert(color, result);
        result
    }
}

/// Derive the single black-mode mask.
#[must_use]
pub fn monochrome_mask<S: PixelSource + ?Sized>(
    source: &S,
    background: Rgb,
    config: &PipelineConfig,
) -> Bitmap {
    let dims = source.dimensions();
    let dark = |c: Rgb| c.luma() < config.black_level;

    #[allow(clippy::cast_possible_truncation)]
    Bitmap::from_fn(dims.width as usize, dims.height as usize, |x, y| {
        let color = source.color(x as u32, y as u32);
        match config.bitmap_type {
            BitmapType::BlackLevel => dark(color),
            BitmapType::BgColor => color.distance(background) > config.bgcolor_level,
            BitmapType::Balance => {
                dark(color) || color.distance(background) > config.balance_level
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::palette::{ColorRemap, PaletteEntry};

    const RED: Rgb = Rgb::new(255, 0, 0);
    const BLUE: Rgb = Rgb::new(0, 0, 255);

    fn config() -> PipelineConfig {
        PipelineConfig::default().normalized().unwrap()
    }

    fn palette(colors: &[Rgb], remap: ColorRemap) -> Palette {
        #[allow(clippy::cast_precision_loss)]
        let share = 100.0 / colors.len() as f64;
        Palette {
            entries: colors.iter().map(|&c| PaletteEntry::new(c, share)).collect(),
            remap,
            all_grayscale: false,
        }
    }

    /// White image with a red left half and a blue right half in row 1.
    fn stripes() -> RgbaImage {
        RgbaImage::from_fn(4, 3, |x, y| match (x, y) {
            (0 | 1, 1) => Rgba([255, 0, 0, 255]),
            (2 | 3, 1) => Rgba([0, 0, 255, 255]),
            _ => Rgba([255, 255, 255, 255]),
        })
    }

    #[test]
    fn samples_skip_background_and_run_column_major() {
        let img = stripes();
        let samples = collect_samples(&img, Rgb::WHITE, 35.0, ColorSpace::Rgb);
        assert_eq!(
            samples,
            vec![
                [255.0, 0.0, 0.0],
                [255.0, 0.0, 0.0],
                [0.0, 0.0, 255.0],
                [0.0, 0.0, 255.0],
            ]
        );
    }

    #[test]
    fn layers_split_by_color() {
        let img = stripes();
        let palette = palette(&[RED, BLUE], ColorRemap::default());
        let mut builder = LayerBuilder::new(&img, &palette, Rgb::WHITE, &config());
        assert_eq!(builder.len(), 2);

        let red = builder.build(0).unwrap();
        assert_eq!(red.count_ones(), 2);
        assert!(red.get(0, 1) && red.get(1, 1));

        let blue = builder.build(1).unwrap();
        assert_eq!(blue.count_ones(), 2);
        assert!(blue.get(2, 1) && blue.get(3, 1));

        assert!(builder.build(2).is_none());
    }

    #[test]
    fn single_entry_takes_every_foreground_pixel() {
        let img = stripes();
        let palette = palette(&[RED], ColorRemap::default());
        let mut builder = LayerBuilder::new(&img, &palette, Rgb::WHITE, &config());
        assert_eq!(builder.build(0).unwrap().count_ones(), 4);
    }

    #[test]
    fn remapped_color_joins_target_layer() {
        let img = stripes();
        let mut remap = ColorRemap::default();
        remap.insert(BLUE, RED);
        let palette = palette(&[RED, Rgb::new(0, 255, 0)], remap);
        let mut builder = LayerBuilder::new(&img, &palette, Rgb::WHITE, &config());
        assert_eq!(builder.build(0).unwrap().count_ones(), 4);
        assert_eq!(builder.build(1).unwrap().count_ones(), 0);
    }

    #[test]
    fn near_miss_uses_nearest_remap_key() {
        let img = stripes();
        let mut remap = ColorRemap::default();
        remap.insert(Rgb::new(0, 0, 230), RED);
        let palette = palette(&[RED, Rgb::new(0, 255, 0)], remap);
        let mut builder = LayerBuilder::new(&img, &palette, Rgb::WHITE, &config());
        // Blue (0,0,255) is 25 away from the key (0,0,230), within 40.
        assert_eq!(builder.build(0).unwrap().count_ones(), 4);
    }

    #[test]
    fn unmatched_pixels_stay_clear() {
        let img = stripes();
        let palette = palette(&[RED, Rgb::new(0, 255, 0)], ColorRemap::default());
        let mut builder = LayerBuilder::new(&img, &palette, Rgb::WHITE, &config());
        assert_eq!(builder.build(1).unwrap().count_ones(), 0);
    }

    #[test]
    fn gap_fix_widens_the_match() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 40, 255]));
        let palette = palette(&[RED, BLUE], ColorRemap::default());
        // Distance 40 from red: within 40 + gap fix.
        let mut builder = LayerBuilder::new(&img, &palette, Rgb::WHITE, &config());
        assert_eq!(builder.build(0).unwrap().count_ones(), 4);

        let strict = PipelineConfig {
            similar_color_distance: 30.0,
            kmeans_gap_fix_value: 0.0,
            ..config()
        };
        let mut builder = LayerBuilder::new(&img, &palette, Rgb::WHITE, &strict);
        assert_eq!(builder.build(0).unwrap().count_ones(), 0);
    }

    #[test]
    fn monochrome_strategies() {
        // dark gray, mid red, near white
        let img = RgbaImage::from_fn(3, 1, |x, _| match x {
            0 => Rgba([40, 40, 40, 255]),
            1 => Rgba([220, 60, 60, 255]),
            _ => Rgba([250, 250, 250, 255]),
        });
        let with = |bitmap_type| PipelineConfig {
            bitmap_type,
            ..config()
        };

        let black = monochrome_mask(&img, Rgb::WHITE, &with(BitmapType::BlackLevel));
        // red luma = 0.2126*220 + 0.7153*60 + 0.0721*60 ~ 94 < 128
        assert!(black.get(0, 0) && black.get(1, 0) && !black.get(2, 0));

        let bg = monochrome_mask(&img, Rgb::WHITE, &with(BitmapType::BgColor));
        assert!(bg.get(0, 0) && bg.get(1, 0) && !bg.get(2, 0));

        let balance = monochrome_mask(&img, Rgb::WHITE, &with(BitmapType::Balance));
        assert_eq!(balance.count_ones(), 2);
    }

    #[test]
    fn balance_catches_light_colors_far_from_background() {
        // Light yellow: luma ~ 237, far from a black background.
        let img = RgbaImage::from_pixel(1, 1, Rgba([255, 240, 120, 255]));
        let black_level = PipelineConfig {
            bitmap_type: BitmapType::BlackLevel,
            ..config()
        };
        assert!(!monochrome_mask(&img, Rgb::BLACK, &black_level).any());
        assert!(monochrome_mask(&img, Rgb::BLACK, &config()).any());
    }
}

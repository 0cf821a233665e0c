//! Palette post-processing.
//!
//! Raw K-means clusters are noisy: anti-aliased edges produce thin
//! gray-ish clusters, scanned artwork yields several shades of one hue,
//! and the clusterer is asked for more centers than the final palette
//! allows.  [`build_palette`] turns the clusters into the final palette
//! in five passes:
//!
//! 1. convert counts to percentage shares and sort, most common first;
//! 2. drop background-like and negligible entries and consolidate
//!    grayscale entries;
//! 3. fold small entries into a hue neighbour;
//! 4. cut the palette down to `color_size`, remapping the rest;
//! 5. when the background is removed, swap white-like entries for a
//!    visible color.
//!
//! Every color that disappears along the way (other than pure noise) is
//! recorded in the [`ColorRemap`] so the layer builder can still assign
//! its pixels to the entry that absorbed it.

use serde::{Deserialize, Serialize};

use crate::color::{ColorSpace, Hsl, Rgb};
use crate::config::PipelineConfig;
use crate::kmeans::KMeansRun;

/// Entries at or above this share (percent) are never hue-merged.
const HUE_MERGE_SHARE_MAX: f64 = 5.0;

/// A secondary grayscale entry counts as noise when the dominant gray
/// outweighs it by more than this factor...
const GRAY_NOISE_RATIO: f64 = 5.0;

/// ...and its own share (percent) is below this.
const GRAY_NOISE_SHARE_MAX: f64 = 10.0;

/// One color of the final palette.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaletteEntry {
    /// Representative color.
    pub color: Rgb,
    /// Share of foreground pixels, in percent.
    pub share: f64,
    /// HSL form of `color`.
    pub hsl: Hsl,
}

impl PaletteEntry {
    /// Create an entry, deriving its HSL form.
    #[must_use]
    pub fn new(color: Rgb, share: f64) -> Self {
        Self {
            color,
            share,
            hsl: color.to_hsl(),
        }
    }

    /// `#rrggbb` form of the color.
    #[must_use]
    pub fn hex(&self) -> String {
        self.color.to_hex()
    }

    /// Near-white, near-black, or desaturated.
    #[must_use]
    pub const fn is_grayscale(&self) -> bool {
        self.hsl.is_grayscale()
    }

    fn set_color(&mut self, color: Rgb) {
        self.color = color;
        self.hsl = color.to_hsl();
    }
}

/// Where colors removed from the palette should be drawn instead.
///
/// The first mapping recorded for a color wins; later attempts to remap
/// the same color are ignored.  When a target itself leaves the palette,
/// [`retarget`](Self::retarget) moves its incoming mappings along so every
/// target stays a live palette color.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColorRemap {
    entries: Vec<(Rgb, Rgb)>,
}

impl ColorRemap {
    /// Record that `from` should be drawn as `to`.
    ///
    /// Returns `false` if `from` already had a mapping or equals `to`.
    pub fn insert(&mut self, from: Rgb, to: Rgb) -> bool {
        if from == to || self.get(from).is_some() {
            return false;
        }
        self.entries.push((from, to));
        true
    }

    /// Point every mapping that targets `old` at `new` instead.
    ///
    /// Mappings that would become `new -> new` are dropped.
    pub fn retarget(&mut self, old: Rgb, new: Rgb) {
        for entry in &mut self.entries {
            if entry.1 == old {
                entry.1 = new;
            }
        }
        self.entries.retain(|&(from, to)| from != to);
    }

    /// Direct replacement for `color`, if one was recorded.
    #[must_use]
    pub fn get(&self, color: Rgb) -> Option<Rgb> {
        self.entries
            .iter()
            .find(|(from, _)| *from == color)
            .map(|&(_, to)| to)
    }

    /// The recorded color closest to `color`, if closer than `within`.
    #[must_use]
    pub fn nearest_key(&self, color: Rgb, within: f64) -> Option<Rgb> {
        let mut best = None;
        let mut best_distance = within;
        for &(from, _) in &self.entries {
            let d = from.distance(color);
            if d < best_distance {
                best = Some(from);
                best_distance = d;
            }
        }
        best
    }

    /// Follow mappings from `color` until reaching a member of `live`.
    ///
    /// Returns `None` if the chain leaves the table without reaching a
    /// live color.  Chains are bounded by the table size, so this
    /// terminates even on malformed input.
    #[must_use]
    pub fn resolve(&self, color: Rgb, live: &[Rgb]) -> Option<Rgb> {
        let mut current = color;
        for _ in 0..=self.entries.len() {
            if live.contains(&current) {
                return Some(current);
            }
            current = self.get(current)?;
        }
        None
    }

    /// Number of recorded mappings.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no mappings were recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recorded `(from, to)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Rgb, Rgb)> + '_ {
        self.entries.iter().copied()
    }
}

/// The final palette with its remap table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Palette {
    /// Entries in layer order.
    pub entries: Vec<PaletteEntry>,
    /// Replacements for colors that were merged away.
    pub remap: ColorRemap,
    /// Every cluster was grayscale; such images trace best with the
    /// `white` turn policy.
    pub all_grayscale: bool,
}

impl Palette {
    /// Entry colors in layer order.
    #[must_use]
    pub fn colors(&self) -> Vec<Rgb> {
        self.entries.iter().map(|e| e.color).collect()
    }

    /// Entry colors as `#rrggbb` strings.
    #[must_use]
    pub fn hex_colors(&self) -> Vec<String> {
        self.entries.iter().map(PaletteEntry::hex).collect()
    }

    /// Number of entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether post-processing left nothing to draw.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Convert clusters to `(color, count)` pairs, merging centers that
/// land on the same RGB value.
#[must_use]
pub fn cluster_colors(run: &KMeansRun, space: ColorSpace) -> Vec<(Rgb, usize)> {
    let mut colors: Vec<(Rgb, usize)> = Vec::with_capacity(run.clusters.len());
    for cluster in &run.clusters {
        let color = space.to_rgb(&cluster.center);
        match colors.iter_mut().find(|(c, _)| *c == color) {
            Some((_, count)) => *count += cluster.count,
            None => colors.push((color, cluster.count)),
        }
    }
    colors
}

/// Run every post-processing pass over `clusters`.
///
/// `config` should already be normalized.
#[must_use]
pub fn build_palette(clusters: &[(Rgb, usize)], background: Rgb, config: &PipelineConfig) -> Palette {
    let mut remap = ColorRemap::default();

    let entries = to_shares(clusters);
    let all_grayscale = !entries.is_empty() && entries.iter().all(PaletteEntry::is_grayscale);

    let mut entries = if all_grayscale {
        consolidate_grayscale(entries, background, config, &mut remap)
    } else {
        drop_noise(entries, background, config)
    };

    if config.merge_color_hue {
        entries = merge_hues(entries, config, &mut remap);
    }
    reduce(&mut entries, config.color_size, &mut remap);
    if config.remove_background {
        make_visible(&mut entries, background, &mut remap);
    }
    renormalize(&mut entries);

    log::debug!(
        "palette: {} entries, {} remaps, all grayscale: {all_grayscale}",
        entries.len(),
        remap.len()
    );

    Palette {
        entries,
        remap,
        all_grayscale,
    }
}

fn to_shares(clusters: &[(Rgb, usize)]) -> Vec<PaletteEntry> {
    let total: usize = clusters.iter().map(|&(_, n)| n).sum();
    if total == 0 {
        return Vec::new();
    }
    #[allow(clippy::cast_precision_loss)]
    let mut entries: Vec<PaletteEntry> = clusters
        .iter()
        .map(|&(color, n)| PaletteEntry::new(color, n as f64 / total as f64 * 100.0))
        .collect();
    sort_by_share(&mut entries);
    entries
}

fn sort_by_share(entries: &mut [PaletteEntry]) {
    entries.sort_by(|a, b| b.share.total_cmp(&a.share));
}

fn is_background_like(entry: &PaletteEntry, background: Rgb, config: &PipelineConfig) -> bool {
    entry.color.distance(background) <= config.bg_color_distance
}

/// Collapse an all-grayscale palette onto its dominant visible entry.
fn consolidate_grayscale(
    entries: Vec<PaletteEntry>,
    background: Rgb,
    config: &PipelineConfig,
    remap: &mut ColorRemap,
) -> Vec<PaletteEntry> {
    let Some(main) = entries
        .iter()
        .position(|e| !is_background_like(e, background, config))
    else {
        return Vec::new();
    };

    let mut kept = entries[main].clone();
    for (i, entry) in entries.iter().enumerate() {
        if i == main
            || is_background_like(entry, background, config)
            || entry.share < config.keep_color_rate_min
        {
            continue;
        }
        remap.insert(entry.color, kept.color);
        kept.share += entry.share;
    }
    vec![kept]
}

/// Drop background-like and negligible entries, and grayscale entries
/// that look like edge noise next to the dominant gray.
fn drop_noise(
    entries: Vec<PaletteEntry>,
    background: Rgb,
    config: &PipelineConfig,
) -> Vec<PaletteEntry> {
    let mut kept: Vec<PaletteEntry> = Vec::with_capacity(entries.len());
    let mut dominant_gray: Option<f64> = None;

    for entry in entries {
        if is_background_like(&entry, background, config)
            || entry.share < config.keep_color_rate_min
        {
            continue;
        }
        if entry.is_grayscale() {
            match dominant_gray {
                None => dominant_gray = Some(entry.share),
                Some(dominant) => {
                    if dominant / entry.share > GRAY_NOISE_RATIO
                        && entry.share < GRAY_NOISE_SHARE_MAX
                    {
                        continue;
                    }
                }
            }
        }
        kept.push(entry);
    }
    kept
}

/// Fold small chromatic entries into a kept entry of nearly the same hue.
fn merge_hues(
    entries: Vec<PaletteEntry>,
    config: &PipelineConfig,
    remap: &mut ColorRemap,
) -> Vec<PaletteEntry> {
    let mut merged: Vec<PaletteEntry> = Vec::with_capacity(entries.len());

    for mut entry in entries {
        if entry.share >= HUE_MERGE_SHARE_MAX {
            merged.push(entry);
            continue;
        }

        let partner = merged.iter().position(|existing| {
            !existing.is_grayscale()
                && !entry.is_grayscale()
                && f64::from(existing.hsl.hue_difference(entry.hsl)) <= config.merge_color_hue_min
                && existing.color.distance(entry.color) <= config.similar_color_distance
        });

        match partner {
            Some(i) if entry.share > merged[i].share => {
                remap.insert(merged[i].color, entry.color);
                remap.retarget(merged[i].color, entry.color);
                entry.share += merged[i].share;
                merged[i] = entry;
            }
            Some(i) => {
                remap.insert(entry.color, merged[i].color);
                merged[i].share += entry.share;
            }
            None => merged.push(entry),
        }
    }
    merged
}

/// Keep the `color_size` largest entries; remap the rest to their
/// nearest survivor, which also takes over their share.
fn reduce(entries: &mut Vec<PaletteEntry>, color_size: usize, remap: &mut ColorRemap) {
    if entries.len() <= color_size || color_size == 0 {
        return;
    }

    sort_by_share(entries);
    let dropped = entries.split_off(color_size);
    for entry in dropped {
        let mut nearest = 0;
        let mut nearest_distance = f64::INFINITY;
        for (i, kept) in entries.iter().enumerate() {
            let d = kept.color.distance(entry.color);
            if d < nearest_distance {
                nearest = i;
                nearest_distance = d;
            }
        }
        remap.insert(entry.color, entries[nearest].color);
        remap.retarget(entry.color, entries[nearest].color);
        entries[nearest].share += entry.share;
    }
}

/// Without a background rectangle, white layers would vanish against the
/// page.  Swap them for black, or for the background color when that is
/// itself visible.
fn make_visible(entries: &mut Vec<PaletteEntry>, background: Rgb, remap: &mut ColorRemap) {
    let replacement = if background.is_white_like() {
        Rgb::BLACK
    } else {
        background
    };

    let mut i = 0;
    while i < entries.len() {
        if !entries[i].color.is_white_like() {
            i += 1;
            continue;
        }
        let original = entries[i].color;
        remap.insert(original, replacement);
        remap.retarget(original, replacement);
        if let Some(j) = entries.iter().position(|e| e.color == replacement) {
            let share = entries[i].share;
            entries[j].share += share;
            entries.remove(i);
        } else {
            entries[i].set_color(replacement);
            i += 1;
        }
    }
}

fn renormalize(entries: &mut [PaletteEntry]) {
    let total: f64 = entries.iter().map(|e| e.share).sum();
    if total > 0.0 {
        for entry in entries {
            entry.share = entry.share / total * 100.0;
        }
    }
}

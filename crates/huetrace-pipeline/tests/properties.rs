//! Property tests for the quantization and tracing invariants.

#![allow(clippy::unwrap_used)]

use huetrace_pipeline::bitmap::Bitmap;
use huetrace_pipeline::color::Sample;
use huetrace_pipeline::kmeans::kmeans;
use huetrace_pipeline::palette::build_palette;
use huetrace_pipeline::trace::decompose::{PathSign, decompose};
use huetrace_pipeline::trace::{TraceParams, path_to_curve, trace_bitmap};
use huetrace_pipeline::{CancelToken, PipelineConfig, Rgb, TurnPolicy};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn clusters() -> impl Strategy<Value = Vec<(Rgb, usize)>> {
    proptest::collection::vec((any::<[u8; 3]>(), 1usize..1000), 1..12).prop_map(|raw| {
        let mut out: Vec<(Rgb, usize)> = Vec::new();
        for ([r, g, b], n) in raw {
            let color = Rgb::new(r, g, b);
            if !out.iter().any(|(c, _)| *c == color) {
                out.push((color, n));
            }
        }
        out
    })
}

fn bitmaps() -> impl Strategy<Value = Bitmap> {
    (1usize..20, 1usize..20).prop_flat_map(|(w, h)| {
        proptest::collection::vec(any::<bool>(), w * h)
            .prop_map(move |bits| Bitmap::from_fn(w, h, |x, y| bits[y * w + x]))
    })
}

fn samples() -> impl Strategy<Value = Vec<Sample>> {
    proptest::collection::vec(
        (0.0f64..255.0, 0.0f64..255.0, 0.0f64..255.0).prop_map(|(a, b, c)| [a, b, c]),
        1..200,
    )
}

proptest! {
    /// Palette shares always add up to 100 and never exceed `color_size`.
    #[test]
    fn palette_shares_sum_to_100(
        clusters in clusters(),
        color_size in 1usize..8,
        remove_background in any::<bool>(),
    ) {
        let config = PipelineConfig {
            color_size,
            remove_background,
            ..PipelineConfig::default()
        }
        .normalized()
        .unwrap();
        let palette = build_palette(&clusters, Rgb::WHITE, &config);
        if !palette.is_empty() {
            let total: f64 = palette.entries.iter().map(|e| e.share).sum();
            prop_assert!((total - 100.0).abs() < 1e-6, "total {total}");
            prop_assert!(palette.len() <= color_size);
        }
    }

    /// Every remapped color leads to a live palette color.
    #[test]
    fn remap_keys_resolve_to_live_colors(
        clusters in clusters(),
        color_size in 1usize..6,
        remove_background in any::<bool>(),
    ) {
        let config = PipelineConfig {
            color_size,
            remove_background,
            ..PipelineConfig::default()
        }
        .normalized()
        .unwrap();
        let palette = build_palette(&clusters, Rgb::WHITE, &config);
        let live = palette.colors();
        for (from, to) in palette.remap.iter() {
            prop_assert!(live.contains(&to), "{from} maps to dropped {to}");
            let resolved = palette.remap.resolve(from, &live);
            prop_assert!(resolved.is_some(), "{from} does not resolve");
            prop_assert!(live.contains(&resolved.unwrap()));

            let mut hops = 0;
            let mut color = from;
            while !live.contains(&color) {
                color = palette.remap.get(color).unwrap();
                hops += 1;
                prop_assert!(hops <= palette.len(), "{from} chain exceeds palette size");
            }
        }
    }

    /// Outer paths minus holes cover exactly the set pixels, whichever
    /// way diagonal corners are resolved.
    #[test]
    fn net_path_area_matches_set_pixels(bitmap in bitmaps()) {
        let expected = i64::try_from(bitmap.count_ones()).unwrap();
        for policy in [
            TurnPolicy::Black,
            TurnPolicy::White,
            TurnPolicy::Left,
            TurnPolicy::Right,
            TurnPolicy::Minority,
            TurnPolicy::Majority,
        ] {
            let paths = decompose(&bitmap, policy, 0, &CancelToken::new()).unwrap();
            let net: i64 = paths
                .iter()
                .map(|p| match p.sign {
                    PathSign::Positive => p.area,
                    PathSign::Negative => -p.area,
                })
                .sum();
            prop_assert_eq!(net, expected, "policy {}", policy);
        }
    }

    /// Seeded clustering accounts for every sample and ends converged.
    #[test]
    fn kmeans_converges_and_counts_every_sample(
        samples in samples(),
        k in 1usize..12,
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let run = kmeans(&samples, k, 5.0, &mut rng, &CancelToken::new()).unwrap();
        let counted: usize = run.clusters.iter().map(|c| c.count).sum();
        prop_assert_eq!(counted, samples.len());
        prop_assert!(!run.clusters.is_empty());
        prop_assert!(run.clusters.len() <= k);
        let last = *run.displacements.last().unwrap();
        prop_assert!(last < 5.0);
        prop_assert!(last <= run.displacements[0]);
    }

    /// Tracing the same bitmap twice yields identical, finite curves.
    #[test]
    fn retracing_is_idempotent(bitmap in bitmaps()) {
        let params = TraceParams::default();
        let a = trace_bitmap(&bitmap, &params, &CancelToken::new()).unwrap();
        let b = trace_bitmap(&bitmap, &params, &CancelToken::new()).unwrap();
        prop_assert!(a.iter().all(huetrace_pipeline::Curve::is_finite));
        prop_assert_eq!(a, b);
    }

    /// Merging Bezier runs never adds segments.
    #[test]
    fn merging_never_adds_segments(bitmap in bitmaps(), tolerance in 0.0f64..1.0) {
        let raw = TraceParams {
            opt_curve: false,
            turd_size: 0,
            ..TraceParams::default()
        };
        let merged = TraceParams {
            opt_curve: true,
            opt_tolerance: tolerance,
            ..raw
        };
        let paths = decompose(&bitmap, raw.turn_policy, raw.turd_size, &CancelToken::new()).unwrap();
        for path in &paths {
            let before = path_to_curve(path, &raw);
            let after = path_to_curve(path, &merged);
            prop_assert!(after.len() <= before.len());
            prop_assert!(after.is_finite());
        }
    }
}

//! SVG export serializer.
//!
//! Turns a traced [`ProcessResult`] into an SVG document string: an
//! optional background rectangle followed by one `<path>` element per
//! non-empty layer.  The [`svg`] crate builds the document tree and
//! escapes text; path data is formatted here so every coordinate carries
//! exactly three decimals.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use std::fmt::Write;

use svg::Document;
use svg::node::Text;
use svg::node::element::{Description, Group, Path, Rectangle, Title};

use huetrace_pipeline::{Curve, Mode, ProcessResult, SegmentKind};

/// XLink namespace, declared for consumers that still expect it.
const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";

/// How each layer's outline is painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathType {
    /// Filled shapes with the even-odd rule, no stroke.
    #[default]
    Fill,
    /// Outlines only: stroked in the layer color, no fill.
    Stroke,
}

/// Export settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SvgOptions {
    /// Output size as a multiple of the source image size.
    pub scale: f64,

    /// Fill or stroke rendering.
    pub path_type: PathType,

    /// Paint for layers that carry no color of their own (monochrome
    /// mode).  Any SVG paint string: `"black"`, `"#ff0000"`,
    /// `"rgb(255,0,255)"`.
    pub fill_color: String,

    /// Document title, emitted as `<title>`.
    pub title: Option<String>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<String>,
}

impl SvgOptions {
    /// Default paint for monochrome output.
    pub const DEFAULT_FILL_COLOR: &str = "black";
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            path_type: PathType::Fill,
            fill_color: Self::DEFAULT_FILL_COLOR.to_owned(),
            title: None,
            description: None,
        }
    }
}

/// Invalid export options.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The scale factor is zero, negative, or not finite.
    #[error("scale must be a positive finite number, got {0}")]
    InvalidScale(f64),

    /// The fill color is empty.
    #[error("fill color must not be empty")]
    EmptyFillColor,
}

/// Build the `d` attribute for one closed curve.
///
/// Drawing starts at the end of the last segment.  A Bezier segment
/// emits `C`; a corner emits a line to its vertex and another to its end
/// point.  Every coordinate is multiplied by `factor` and printed with
/// three decimals.  Returns an empty string for an empty curve.
///
/// # Examples
///
/// ```
/// use huetrace_pipeline::{Curve, Point, Segment, SegmentKind};
/// use huetrace_export::build_path_data;
///
/// let corner = |vx: f64, vy: f64, ex: f64, ey: f64| Segment {
///     kind: SegmentKind::Corner,
///     controls: [Point::new(vx, vy), Point::new(vx, vy), Point::new(ex, ey)],
///     vertex: Point::new(vx, vy),
///     alpha: 4.0 / 3.0,
///     alpha0: 4.0 / 3.0,
///     beta: 0.5,
/// };
/// let curve = Curve::new(vec![corner(1.0, 0.0, 1.0, 1.0), corner(0.0, 1.0, 0.0, 0.0)]);
/// assert_eq!(
///     build_path_data(&curve, 2.0),
///     "M0.000 0.000 L2.000 0.000 L2.000 2.000 L0.000 2.000 L0.000 0.000 Z",
/// );
/// ```
#[must_use]
pub fn build_path_data(curve: &Curve, factor: f64) -> String {
    let mut d = String::new();
    write_curve(&mut d, curve, factor);
    d.truncate(d.trim_end().len());
    d
}

fn write_curve(out: &mut String, curve: &Curve, factor: f64) {
    let Some(start) = curve.start() else {
        return;
    };
    let _ = write!(
        out,
        "M{} {} ",
        coord(start.x, factor),
        coord(start.y, factor)
    );
    for segment in curve.segments() {
        let [c0, c1, end] = segment.controls;
        match segment.kind {
            SegmentKind::Curve => {
                let _ = write!(
                    out,
                    "C{} {} {} {} {} {} ",
                    coord(c0.x, factor),
                    coord(c0.y, factor),
                    coord(c1.x, factor),
                    coord(c1.y, factor),
                    coord(end.x, factor),
                    coord(end.y, factor),
                );
            }
            SegmentKind::Corner => {
                let _ = write!(
                    out,
                    "L{} {} L{} {} ",
                    coord(segment.vertex.x, factor),
                    coord(segment.vertex.y, factor),
                    coord(end.x, factor),
                    coord(end.y, factor),
                );
            }
        }
    }
    out.push_str("Z ");
}

/// Three-decimal coordinate; `-0.000` is printed as `0.000`.
fn coord(value: f64, factor: f64) -> String {
    let scaled = value * factor;
    let rounded = (scaled * 1000.0).round() / 1000.0;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded:.3}")
}

/// Serialize a traced result into an SVG document string.
///
/// The document is `source width × scale` by `source height × scale`
/// (rounded), so traces made on a downsampled working image are scaled
/// back to the size of the original input.  In color mode a
/// `<g id="background">` rectangle in the background color comes first
/// unless the result asked for background removal.  Each layer with at
/// least one curve then becomes a single `<path>` whose subpaths are the
/// layer's curves; colorless layers (monochrome mode) use
/// [`SvgOptions::fill_color`].
///
/// # Errors
///
/// Returns [`ExportError::InvalidScale`] if `options.scale` is not a
/// positive finite number and [`ExportError::EmptyFillColor`] if
/// `options.fill_color` is blank.
pub fn to_svg(result: &ProcessResult, options: &SvgOptions) -> Result<String, ExportError> {
    if !options.scale.is_finite() || options.scale <= 0.0 {
        return Err(ExportError::InvalidScale(options.scale));
    }
    let fill_color = options.fill_color.trim();
    if fill_color.is_empty() {
        return Err(ExportError::EmptyFillColor);
    }

    let width = (f64::from(result.source_dimensions.width) * options.scale).round();
    let height = (f64::from(result.source_dimensions.height) * options.scale).round();
    let factor = options.scale * result.restore_scale();

    let mut doc = Document::new()
        .set("version", "1.1")
        .set("xmlns:xlink", XLINK_NAMESPACE)
        .set("width", width)
        .set("height", height)
        .set("viewBox", (0, 0, width, height));

    if let Some(title) = &options.title {
        doc = doc.add(Title::new(title.as_str()));
    }
    if let Some(description) = &options.description {
        doc = doc.add(Description::new().add(Text::new(description.as_str())));
    }

    if result.mode == Mode::Color && !result.remove_background {
        let rect = Rectangle::new()
            .set("x", 0)
            .set("y", 0)
            .set("width", width)
            .set("height", height)
            .set("fill", result.background.to_hex());
        doc = doc.add(Group::new().set("id", "background").add(rect));
    }

    for layer in &result.layers {
        let mut d = String::new();
        for curve in &layer.curves {
            write_curve(&mut d, curve, factor);
        }
        if d.is_empty() {
            log::debug!("skipping empty layer {:?}", layer.color);
            continue;
        }
        d.truncate(d.trim_end().len());

        let paint = layer
            .color
            .map_or_else(|| fill_color.to_owned(), |c| c.to_hex());
        let path = match options.path_type {
            PathType::Fill => Path::new()
                .set("d", d)
                .set("stroke", "none")
                .set("fill", paint)
                .set("fill-rule", "evenodd"),
            PathType::Stroke => Path::new()
                .set("d", d)
                .set("stroke", paint)
                .set("fill", "none"),
        };
        doc = doc.add(path);
    }

    // The svg crate omits the XML declaration, so we prepend it.
    Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use huetrace_pipeline::{Dimensions, Layer, Point, Rgb, Segment};

    fn corner(v: (f64, f64), end: (f64, f64)) -> Segment {
        let vertex = Point::new(v.0, v.1);
        Segment {
            kind: SegmentKind::Corner,
            controls: [vertex, vertex, Point::new(end.0, end.1)],
            vertex,
            alpha: 4.0 / 3.0,
            alpha0: 4.0 / 3.0,
            beta: 0.5,
        }
    }

    /// The unit square at `(x, y)` as four corners.
    fn square(x: f64, y: f64) -> Curve {
        Curve::new(vec![
            corner((x + 1.0, y), (x + 1.0, y + 1.0)),
            corner((x + 1.0, y + 1.0), (x, y + 1.0)),
            corner((x, y + 1.0), (x, y)),
            corner((x, y), (x + 1.0, y)),
        ])
    }

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    fn color_result(layers: Vec<Layer>) -> ProcessResult {
        ProcessResult {
            mode: Mode::Color,
            dimensions: dims(10, 5),
            source_dimensions: dims(10, 5),
            background: Rgb::WHITE,
            remove_background: false,
            palette: None,
            layers,
        }
    }

    fn layer(color: Option<Rgb>, curves: Vec<Curve>) -> Layer {
        Layer {
            color,
            share: 100.0,
            curves,
        }
    }

    fn path_count(svg: &str) -> usize {
        svg.matches("<path").count()
    }

    #[test]
    fn build_path_data_empty_curve() {
        assert_eq!(build_path_data(&Curve::default(), 1.0), "");
    }

    #[test]
    fn build_path_data_starts_at_last_endpoint() {
        let d = build_path_data(&square(2.0, 3.0), 1.0);
        assert!(d.starts_with("M3.000 3.000 L3.000 3.000 L3.000 4.000"), "{d}");
        assert!(d.ends_with('Z'));
    }

    #[test]
    fn build_path_data_curve_segment() {
        let segment = Segment {
            kind: SegmentKind::Curve,
            controls: [
                Point::new(0.5, 0.25),
                Point::new(1.0 / 3.0, 2.0),
                Point::new(4.0, 4.0),
            ],
            vertex: Point::new(1.0, 1.0),
            alpha: 1.0,
            alpha0: 1.0,
            beta: 0.5,
        };
        let d = build_path_data(&Curve::new(vec![segment]), 1.0);
        assert_eq!(d, "M4.000 4.000 C0.500 0.250 0.333 2.000 4.000 4.000 Z");
    }

    #[test]
    fn build_path_data_applies_factor() {
        let d = build_path_data(&square(0.0, 0.0), 2.5);
        assert!(d.contains("L2.500 2.500"), "{d}");
    }

    #[test]
    fn negative_zero_prints_as_zero() {
        assert_eq!(coord(-0.0, 1.0), "0.000");
        assert_eq!(coord(-0.0001, 1.0), "0.000");
    }

    #[test]
    fn document_has_declaration_namespace_and_size() {
        let svg = to_svg(&color_result(Vec::new()), &SvgOptions::default()).unwrap();
        assert!(svg.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(svg.contains(r#"xmlns="http://www.w3.org/2000/svg""#));
        assert!(svg.contains(r#"width="10""#));
        assert!(svg.contains(r#"height="5""#));
        assert!(svg.contains(r#"viewBox="0 0 10 5""#));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn scale_multiplies_document_size() {
        let options = SvgOptions {
            scale: 2.0,
            ..SvgOptions::default()
        };
        let svg = to_svg(&color_result(Vec::new()), &options).unwrap();
        assert!(svg.contains(r#"viewBox="0 0 20 10""#));
    }

    #[test]
    fn color_mode_emits_background_rect() {
        let svg = to_svg(&color_result(Vec::new()), &SvgOptions::default()).unwrap();
        assert!(svg.contains(r#"id="background""#));
        assert!(svg.contains("<rect"));
        assert!(svg.contains(r##"fill="#ffffff""##));
    }

    #[test]
    fn removed_background_emits_no_rect() {
        let mut result = color_result(Vec::new());
        result.remove_background = true;
        let svg = to_svg(&result, &SvgOptions::default()).unwrap();
        assert!(!svg.contains("<rect"));
    }

    #[test]
    fn one_path_per_non_empty_layer() {
        let red = Rgb::new(255, 0, 0);
        let blue = Rgb::new(0, 0, 255);
        let result = color_result(vec![
            layer(Some(red), vec![square(0.0, 0.0), square(3.0, 0.0)]),
            layer(Some(Rgb::new(0, 255, 0)), Vec::new()),
            layer(Some(blue), vec![square(5.0, 2.0)]),
        ]);
        let svg = to_svg(&result, &SvgOptions::default()).unwrap();
        assert_eq!(path_count(&svg), 2);
        assert!(svg.contains(r##"fill="#ff0000""##));
        assert!(svg.contains(r##"fill="#0000ff""##));
        assert!(!svg.contains("#00ff00"));
        // Both curves of the red layer share one path.
        assert_eq!(svg.matches('M').count(), 3);
    }

    #[test]
    fn layers_keep_palette_order() {
        let result = color_result(vec![
            layer(Some(Rgb::new(0, 0, 255)), vec![square(0.0, 0.0)]),
            layer(Some(Rgb::new(255, 0, 0)), vec![square(2.0, 2.0)]),
        ]);
        let svg = to_svg(&result, &SvgOptions::default()).unwrap();
        let blue = svg.find("#0000ff").unwrap();
        let red = svg.find("#ff0000").unwrap();
        assert!(blue < red);
    }

    #[test]
    fn fill_mode_attributes() {
        let result = color_result(vec![layer(Some(Rgb::new(1, 2, 3)), vec![square(0.0, 0.0)])]);
        let svg = to_svg(&result, &SvgOptions::default()).unwrap();
        assert!(svg.contains(r#"stroke="none""#));
        assert!(svg.contains(r#"fill-rule="evenodd""#));
        assert!(svg.contains(r##"fill="#010203""##));
    }

    #[test]
    fn stroke_mode_attributes() {
        let result = color_result(vec![layer(Some(Rgb::new(1, 2, 3)), vec![square(0.0, 0.0)])]);
        let options = SvgOptions {
            path_type: PathType::Stroke,
            ..SvgOptions::default()
        };
        let svg = to_svg(&result, &options).unwrap();
        assert!(svg.contains(r##"stroke="#010203""##));
        assert!(svg.contains(r#"fill="none""#));
        assert!(!svg.contains("fill-rule"));
    }

    #[test]
    fn black_mode_uses_fill_color_and_no_background() {
        let result = ProcessResult {
            mode: Mode::Black,
            layers: vec![layer(None, vec![square(0.0, 0.0)])],
            ..color_result(Vec::new())
        };
        let options = SvgOptions {
            fill_color: "rgb(255,0,255)".to_owned(),
            ..SvgOptions::default()
        };
        let svg = to_svg(&result, &options).unwrap();
        assert_eq!(path_count(&svg), 1);
        assert!(!svg.contains("<rect"));
        assert!(svg.contains(r#"fill="rgb(255,0,255)""#));
    }

    #[test]
    fn downsampled_trace_is_restored_to_source_size() {
        let result = ProcessResult {
            dimensions: dims(5, 5),
            source_dimensions: dims(10, 10),
            layers: vec![layer(Some(Rgb::BLACK), vec![square(1.0, 1.0)])],
            ..color_result(Vec::new())
        };
        let svg = to_svg(&result, &SvgOptions::default()).unwrap();
        assert!(svg.contains(r#"viewBox="0 0 10 10""#));
        assert!(svg.contains("M4.000 2.000"), "{svg}");
    }

    #[test]
    fn title_and_desc_emitted_when_present() {
        let options = SvgOptions {
            title: Some("Tom & Jerry".to_owned()),
            description: Some("seed 7".to_owned()),
            ..SvgOptions::default()
        };
        let svg = to_svg(&color_result(Vec::new()), &options).unwrap();
        assert!(svg.contains("<title>Tom &amp; Jerry</title>"));
        assert!(svg.contains("<desc>seed 7</desc>"));
    }

    #[test]
    fn invalid_scale_is_rejected() {
        for scale in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let options = SvgOptions {
                scale,
                ..SvgOptions::default()
            };
            let result = to_svg(&color_result(Vec::new()), &options);
            assert!(matches!(result, Err(ExportError::InvalidScale(_))));
        }
    }

    #[test]
    fn blank_fill_color_is_rejected() {
        let options = SvgOptions {
            fill_color: "  ".to_owned(),
            ..SvgOptions::default()
        };
        let result = to_svg(&color_result(Vec::new()), &options);
        assert!(matches!(result, Err(ExportError::EmptyFillColor)));
    }
}

//! SVG render surface and serializer.
//!
//! [`SvgSurface`] collects tagged elements in draw order: overlay paths
//! handed over by [`OverlayManager::update`] plus plain chart elements
//! (data-point markers, labels) added by the caller. Tags become the
//! element's `class` attribute, so a serialized document can be styled
//! or queried the same way a live chart would be.
//!
//! Document construction, XML escaping and path data formatting are done
//! by the [`svg`] crate. Each ring becomes one `<path>` using `M` (move
//! to) and `L` (line to) commands, with `Z` appended for closed rings.
//!
//! This is pure and has no I/O -- serialization returns a `String`.
//!
//! [`OverlayManager::update`]: bubbleset_core::OverlayManager::update

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Circle, Description, Element, Path, Title};
use svg::node::{Node, Text, Value};

use bubbleset_core::{Dimensions, OverlayPath, Point, RenderSurface, Ring};

/// Namespace of the `<bubbleset:config>` metadata element.
const METADATA_NAMESPACE: &str = "https://bubbleset.dev/ns/1";

/// Metadata to embed in the SVG document.
///
/// All fields are optional. When present, `<title>`, `<desc>` and
/// `<metadata>` elements are emitted immediately after the opening
/// `<svg>` tag, in that order.
///
/// Text values are XML-escaped automatically by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized overlay configuration, emitted inside a `<metadata>`
    /// element wrapped in a namespaced `<bubbleset:config>` element so
    /// exported charts carry machine-parseable settings.
    pub config_json: Option<&'a str>,
}

/// Build an SVG path `d` attribute string from a ring.
///
/// Uses `M` for the first point and `L` for subsequent points. Closed
/// rings drop their repeated last point and end with `Z`. Returns an
/// empty string for rings with fewer than 2 distinct points.
///
/// # Examples
///
/// ```
/// use bubbleset_core::{Point, Polyline, Ring};
/// use bubbleset_export::build_path_data;
///
/// let ring = Ring::new(
///     Polyline::new(vec![Point::new(10.0, 20.0), Point::new(30.0, 40.0)]),
///     false,
/// );
/// assert_eq!(build_path_data(&ring), "M10,20 L30,40");
/// ```
#[must_use]
pub fn build_path_data(ring: &Ring) -> String {
    let mut points = ring.points();
    if ring.closed && points.len() > 1 && points.first() == points.last() {
        points = &points[..points.len() - 1];
    }
    if points.len() < 2 {
        return String::new();
    }

    let first = &points[0];
    let mut data = Data::new().move_to((first.x, first.y));
    for p in &points[1..] {
        data = data.line_to((p.x, p.y));
    }
    let mut d = String::from(Value::from(data));
    if ring.closed {
        d.push_str(" Z");
    }
    d
}

/// A caller-drawn element that is not an overlay path.
#[derive(Debug, Clone, PartialEq)]
enum Shape {
    /// A filled circle, e.g. one data point.
    Marker {
        center: Point,
        radius: f64,
        fill: String,
        opacity: f64,
    },
    /// A text label anchored at its middle.
    Label {
        position: Point,
        text: String,
        font_size: f64,
        fill: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Content {
    Overlay(OverlayPath),
    Shape(Shape),
}

#[derive(Debug, Clone, PartialEq)]
struct Tagged {
    tags: Vec<String>,
    content: Content,
}

/// In-memory SVG scene implementing [`RenderSurface`].
///
/// Elements are kept in insertion order; later elements draw on top.
#[derive(Debug, Clone)]
pub struct SvgSurface {
    dimensions: Dimensions,
    elements: Vec<Tagged>,
}

impl SvgSurface {
    /// An empty surface of the given size.
    #[must_use]
    pub const fn new(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            elements: Vec::new(),
        }
    }

    /// Surface size in pixels.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Number of elements currently on the surface.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if nothing is drawn.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Number of elements carrying `tag`.
    #[must_use]
    pub fn count_tagged(&self, tag: &str) -> usize {
        self.elements
            .iter()
            .filter(|e| e.tags.iter().any(|t| t == tag))
            .count()
    }

    /// Overlay paths currently on the surface, in draw order.
    pub fn overlay_paths(&self) -> impl Iterator<Item = &OverlayPath> {
        self.elements.iter().filter_map(|e| match &e.content {
            Content::Overlay(path) => Some(path),
            Content::Shape(_) => None,
        })
    }

    /// Add a filled circle marker.
    pub fn add_marker(
        &mut self,
        tags: &[&str],
        center: Point,
        radius: f64,
        fill: &str,
        opacity: f64,
    ) {
        self.push_shape(
            tags,
            Shape::Marker {
                center,
                radius,
                fill: fill.to_string(),
                opacity,
            },
        );
    }

    /// Add a text label centered on `position`.
    pub fn add_label(
        &mut self,
        tags: &[&str],
        position: Point,
        text: &str,
        font_size: f64,
        fill: &str,
    ) {
        self.push_shape(
            tags,
            Shape::Label {
                position,
                text: text.to_string(),
                font_size,
                fill: fill.to_string(),
            },
        );
    }

    fn push_shape(&mut self, tags: &[&str], shape: Shape) {
        self.elements.push(Tagged {
            tags: tags.iter().map(ToString::to_string).collect(),
            content: Content::Shape(shape),
        });
    }

    /// Serialize the surface into an SVG document string.
    ///
    /// The `viewBox` is `0 0 width height`, so element coordinates are
    /// chart pixels. Overlay paths whose ring has fewer than 2 distinct
    /// points are skipped.
    #[must_use]
    pub fn to_document(&self, metadata: &SvgMetadata<'_>) -> String {
        let w = self.dimensions.width;
        let h = self.dimensions.height;
        let mut doc = Document::new()
            .set("width", w)
            .set("height", h)
            .set("viewBox", (0, 0, w, h));

        if let Some(title) = metadata.title {
            doc = doc.add(Title::new(title));
        }
        if let Some(description) = metadata.description {
            doc = doc.add(Description::new().add(Text::new(description)));
        }
        if let Some(config_json) = metadata.config_json {
            let mut config_el = Element::new("bubbleset:config");
            config_el.assign("xmlns:bubbleset", METADATA_NAMESPACE);
            config_el.append(Text::new(config_json));
            let mut metadata_el = Element::new("metadata");
            metadata_el.append(config_el);
            doc = doc.add(metadata_el);
        }

        for element in &self.elements {
            let class = element.tags.join(" ");
            match &element.content {
                Content::Overlay(path) => {
                    let d = build_path_data(&path.ring);
                    if d.is_empty() {
                        continue;
                    }
                    doc = doc.add(
                        Path::new()
                            .set("class", class)
                            .set("d", d)
                            .set("fill", path.fill.as_str())
                            .set("fill-opacity", path.fill_opacity)
                            .set("stroke", path.stroke.as_str())
                            .set("stroke-width", path.stroke_width),
                    );
                }
                Content::Shape(Shape::Marker {
                    center,
                    radius,
                    fill,
                    opacity,
                }) => {
                    doc = doc.add(
                        Circle::new()
                            .set("class", class)
                            .set("cx", center.x)
                            .set("cy", center.y)
                            .set("r", *radius)
                            .set("fill", fill.as_str())
                            .set("opacity", *opacity),
                    );
                }
                Content::Shape(Shape::Label {
                    position,
                    text,
                    font_size,
                    fill,
                }) => {
                    let mut label = Element::new("text");
                    label.assign("class", class);
                    label.assign("x", position.x);
                    label.assign("y", position.y);
                    label.assign("text-anchor", "middle");
                    label.assign("font-size", *font_size);
                    label.assign("fill", fill.as_str());
                    label.append(Text::new(text.as_str()));
                    doc = doc.add(label);
                }
            }
        }

        // The svg crate omits the XML declaration, so we prepend it.
        format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
    }
}

impl RenderSurface for SvgSurface {
    fn add_path(&mut self, path: OverlayPath) {
        self.elements.push(Tagged {
            tags: path.tags.clone(),
            content: Content::Overlay(path),
        });
    }

    fn remove_tagged(&mut self, tag: &str) -> usize {
        let before = self.elements.len();
        self.elements.retain(|e| !e.tags.iter().any(|t| t == tag));
        before - self.elements.len()
    }
}

/// Serialize overlay paths alone into an SVG document string.
///
/// Shorthand for adding every path to a fresh [`SvgSurface`] and calling
/// [`SvgSurface::to_document`].
#[must_use]
pub fn to_svg(paths: &[OverlayPath], dimensions: Dimensions, metadata: &SvgMetadata<'_>) -> String {
    let mut surface = SvgSurface::new(dimensions);
    for path in paths {
        surface.add_path(path.clone());
    }
    surface.to_document(metadata)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bubbleset_core::{OVERLAY_TAG, Polyline};

    use super::*;

    const DIMS: Dimensions = Dimensions {
        width: 800,
        height: 600,
    };

    fn ring(coords: &[(f64, f64)], closed: bool) -> Ring {
        Ring::new(
            Polyline::new(coords.iter().map(|&(x, y)| Point::new(x, y)).collect()),
            closed,
        )
    }

    fn overlay_path(group_tag: &str, ring: Ring) -> OverlayPath {
        OverlayPath {
            tags: vec![OVERLAY_TAG.to_string(), group_tag.to_string()],
            group_key: group_tag.to_string(),
            ring,
            fill: "#1f77b4".to_string(),
            fill_opacity: 0.3,
            stroke: "#1f77b4".to_string(),
            stroke_width: 2.0,
        }
    }

    fn triangle() -> Ring {
        ring(&[(10.0, 10.0), (50.0, 10.0), (30.0, 40.0), (10.0, 10.0)], true)
    }

    // --- build_path_data ---

    #[test]
    fn open_ring_has_no_close_command() {
        let d = build_path_data(&ring(&[(0.0, 5.0), (10.0, 5.0), (10.0, 0.0)], false));
        assert_eq!(d, "M0,5 L10,5 L10,0");
    }

    #[test]
    fn closed_ring_ends_with_z_and_drops_repeated_point() {
        assert_eq!(build_path_data(&triangle()), "M10,10 L50,10 L30,40 Z");
    }

    #[test]
    fn fractional_coordinates() {
        let d = build_path_data(&ring(&[(1.5, 2.7), (3.25, 4.1)], false));
        assert_eq!(d, "M1.5,2.7 L3.25,4.1");
    }

    #[test]
    fn degenerate_rings_give_empty_data() {
        assert!(build_path_data(&ring(&[], false)).is_empty());
        assert!(build_path_data(&ring(&[(1.0, 1.0)], false)).is_empty());
        assert!(build_path_data(&ring(&[(1.0, 1.0), (1.0, 1.0)], true)).is_empty());
    }

    // --- SvgSurface ---

    #[test]
    fn remove_tagged_only_touches_matching_elements() {
        let mut surface = SvgSurface::new(DIMS);
        surface.add_marker(&["dot"], Point::new(5.0, 5.0), 3.0, "red", 0.7);
        surface.add_path(overlay_path("bubble-overlay-a", triangle()));
        surface.add_path(overlay_path("bubble-overlay-b", triangle()));

        assert_eq!(surface.len(), 3);
        assert_eq!(surface.count_tagged(OVERLAY_TAG), 2);

        assert_eq!(surface.remove_tagged("bubble-overlay-a"), 1);
        assert_eq!(surface.count_tagged(OVERLAY_TAG), 1);
        assert_eq!(surface.remove_tagged(OVERLAY_TAG), 1);
        assert_eq!(surface.remove_tagged(OVERLAY_TAG), 0);
        assert_eq!(surface.len(), 1);
        assert_eq!(surface.count_tagged("dot"), 1);
    }

    #[test]
    fn overlay_paths_skip_plain_elements() {
        let mut surface = SvgSurface::new(DIMS);
        surface.add_label(&["year-label"], Point::new(400.0, 350.0), "2023", 180.0, "#f0f0f0");
        surface.add_path(overlay_path("bubble-overlay-a", triangle()));
        let paths: Vec<_> = surface.overlay_paths().collect();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].group_key, "bubble-overlay-a");
    }

    #[test]
    fn document_has_viewbox_and_xml_declaration() {
        let svg = SvgSurface::new(DIMS).to_document(&SvgMetadata::default());
        assert!(svg.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
        assert!(svg.contains("viewBox=\"0 0 800 600\""));
        assert!(svg.contains("width=\"800\""));
        assert!(svg.contains("height=\"600\""));
        assert!(!svg.contains("<path"));
        assert!(!svg.contains("<title>"));
        assert!(!svg.contains("<metadata>"));
    }

    #[test]
    fn overlay_path_attributes_are_serialized() {
        let svg = to_svg(
            &[overlay_path("bubble-overlay-compiled-manual", triangle())],
            DIMS,
            &SvgMetadata::default(),
        );
        assert!(svg.contains("class=\"bubble-overlay bubble-overlay-compiled-manual\""));
        assert!(svg.contains("d=\"M10,10 L50,10 L30,40 Z\""));
        assert!(svg.contains("fill=\"#1f77b4\""));
        assert!(svg.contains("fill-opacity=\"0.3\""));
        assert!(svg.contains("stroke-width=\"2\""));
    }

    #[test]
    fn elements_keep_draw_order() {
        let mut surface = SvgSurface::new(DIMS);
        surface.add_path(overlay_path("bubble-overlay-a", triangle()));
        surface.add_marker(&["dot"], Point::new(5.0, 5.0), 3.0, "red", 0.7);
        let svg = surface.to_document(&SvgMetadata::default());
        let path_pos = svg.find("<path").unwrap();
        let circle_pos = svg.find("<circle").unwrap();
        assert!(path_pos < circle_pos);
        assert!(svg.contains("class=\"dot\""));
        assert!(svg.contains("r=\"3\""));
    }

    #[test]
    fn degenerate_overlay_paths_are_skipped() {
        let svg = to_svg(
            &[overlay_path("bubble-overlay-a", ring(&[(1.0, 1.0)], false))],
            DIMS,
            &SvgMetadata::default(),
        );
        assert!(!svg.contains("<path"));
    }

    #[test]
    fn label_text_is_escaped() {
        let mut surface = SvgSurface::new(DIMS);
        surface.add_label(&["note"], Point::new(1.0, 2.0), "a < b & c", 12.0, "black");
        let svg = surface.to_document(&SvgMetadata::default());
        assert!(svg.contains("a &lt; b &amp; c"));
        assert!(svg.contains("text-anchor=\"middle\""));
    }

    // --- metadata ---

    #[test]
    fn title_description_and_config_are_embedded() {
        let config = bubbleset_core::OverlayConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let metadata = SvgMetadata {
            title: Some("languages-2023"),
            description: Some("Exported by bubbleset-bench"),
            config_json: Some(&json),
        };
        let svg = SvgSurface::new(DIMS).to_document(&metadata);

        assert!(svg.contains("<title>languages-2023</title>"));
        assert!(svg.contains("<desc>Exported by bubbleset-bench</desc>"));
        assert!(svg.contains("<metadata>"));
        assert!(svg.contains(&format!("xmlns:bubbleset=\"{METADATA_NAMESPACE}\"")));
        assert!(svg.contains("grid_resolution"));
        assert!(svg.contains("MarchingSquares"));

        let title_pos = svg.find("<title>").unwrap();
        let desc_pos = svg.find("<desc>").unwrap();
        let meta_pos = svg.find("<metadata>").unwrap();
        assert!(title_pos < desc_pos && desc_pos < meta_pos);
    }

    #[test]
    fn title_special_characters_are_escaped() {
        let metadata = SvgMetadata {
            title: Some("a<b>&c"),
            ..SvgMetadata::default()
        };
        let svg = SvgSurface::new(DIMS).to_document(&metadata);
        assert!(svg.contains("<title>a&lt;b&gt;&amp;c</title>"));
    }
}

//! Geometry source parsing.
//!
//! A route geometry resource is either a KML document, in which case the
//! vertex list is the text of its first `<coordinates>` element, or a bare
//! whitespace-separated list of `lon,lat[,elev]` tokens.

use roxmltree::{Document, ParsingOptions};

use crate::error::{LoadError, Result};

/// Extract the raw coordinate text from a geometry source.
///
/// KML namespaces are ignored; only the local tag name is matched. The
/// element's text is the concatenation of all its text descendants, so
/// comments and CDATA sections inside a vertex list do not cut it short.
/// Documents with a `<!DOCTYPE>` declaration are accepted.
///
/// # Example
/// ```
/// use route_locator::kml::coordinate_text;
///
/// let kml = r#"<kml xmlns="http://www.opengis.net/kml/2.2">
///   <Placemark><LineString>
///     <coordinates>-74.07,4.71,0 -74.07,4.72,0</coordinates>
///   </LineString></Placemark>
/// </kml>"#;
///
/// assert_eq!(coordinate_text(kml).unwrap(), "-74.07,4.71,0 -74.07,4.72,0");
/// assert_eq!(coordinate_text("-74.07,4.71").unwrap(), "-74.07,4.71");
/// ```
pub fn coordinate_text(source: &str) -> Result<String> {
    let trimmed = source.trim_start_matches('\u{feff}').trim();
    if !trimmed.starts_with('<') {
        return Ok(trimmed.to_string());
    }

    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(trimmed, options)?;
    let node = doc
        .descendants()
        .find(|n| n.has_tag_name("coordinates"))
        .ok_or(LoadError::NoCoordinates)?;

    let text: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();

    Ok(text.trim().to_string())
}

/// Split coordinate text into raw vertex tokens, in source order.
pub fn coordinate_tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace()
}

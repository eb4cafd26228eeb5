//! # Reference-Post Table
//!
//! Per-route lookup from along-route distance to the nearest preceding
//! reference post ("PR" in the field data, analogous to a milepost).
//!
//! The table is read from delimited text with a header row. Three columns are
//! required (route id, post label, distance); everything else is ignored.
//! Distances accept either `.` or `,` as the decimal separator.
//!
//! ```text
//! TRAMO,PR,DISTANCIA
//! 4503,PR0,0
//! 4503,PR1,"1000,0"
//! 4503,PR2,2500
//! ```
//!
//! Entries for one route are kept sorted by distance with a stable sort, so
//! posts sharing a distance stay in input order and the last of them wins
//! resolution.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use log::{debug, info};

use crate::error::{LoadError, Result};

/// Label reported when no reference post can be resolved.
pub const UNKNOWN_LABEL: &str = "?";

/// One surveyed reference post.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReferencePostEntry {
    pub route_id: String,
    /// Distance from the start of the route, in meters
    pub distance_meters: f64,
    pub label: String,
}

/// Result of resolving a distance to a reference post.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReferencePostMatch {
    /// Post label, or `"?"` when unresolved
    pub label: String,
    /// Meters past the post, rounded and never negative
    pub offset_meters: u32,
}

impl ReferencePostMatch {
    /// The canonical "unresolved" result: `?` with a zero offset.
    pub fn unknown() -> Self {
        Self {
            label: UNKNOWN_LABEL.to_string(),
            offset_meters: 0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }
}

/// Column names and delimiter of the reference-post table.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReferenceTableConfig {
    /// Header of the route identifier column. Default: "TRAMO"
    pub route_column: String,
    /// Header of the reference-post label column. Default: "PR"
    pub label_column: String,
    /// Header of the distance column (meters). Default: "DISTANCIA"
    pub distance_column: String,
    /// Field delimiter. Default: b','
    pub delimiter: u8,
}

impl Default for ReferenceTableConfig {
    fn default() -> Self {
        Self {
            route_column: "TRAMO".to_string(),
            label_column: "PR".to_string(),
            distance_column: "DISTANCIA".to_string(),
            delimiter: b',',
        }
    }
}

/// Reference posts grouped by route, each group sorted ascending by distance.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    routes: HashMap<String, Vec<ReferencePostEntry>>,
}

impl ReferenceTable {
    /// An empty table; every lookup resolves to [`ReferencePostMatch::unknown`].
    pub fn empty() -> Self {
        Self::default()
    }

    /// Group entries by route and sort each group by distance.
    ///
    /// Entries with a non-finite distance or an empty route id or label are
    /// dropped.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = ReferencePostEntry>,
    {
        let mut routes: HashMap<String, Vec<ReferencePostEntry>> = HashMap::new();
        for entry in entries {
            if entry.route_id.is_empty() || entry.label.is_empty() || !entry.distance_meters.is_finite() {
                continue;
            }
            routes.entry(entry.route_id.clone()).or_default().push(entry);
        }

        // Stable: equal distances keep input order
        for list in routes.values_mut() {
            list.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
        }

        Self { routes }
    }

    /// Parse a delimited table.
    ///
    /// Fails as a whole with [`LoadError::MissingColumns`] when the header
    /// lacks any of the configured columns (including empty input). Rows that
    /// are shorter than the header, have an empty route id or label, or carry
    /// an unparsable distance are skipped.
    pub fn from_reader<R: Read>(reader: R, config: &ReferenceTableConfig) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(config.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let column = |name: &str| {
            headers.iter().position(|h| {
                h.trim_start_matches('\u{feff}').trim().eq_ignore_ascii_case(name)
            })
        };

        let (idx_route, idx_label, idx_dist) = match (
            column(&config.route_column),
            column(&config.label_column),
            column(&config.distance_column),
        ) {
            (Some(r), Some(l), Some(d)) => (r, l, d),
            (r, l, d) => {
                let missing = [
                    (r, &config.route_column),
                    (l, &config.label_column),
                    (d, &config.distance_column),
                ]
                .into_iter()
                .filter(|(idx, _)| idx.is_none())
                .map(|(_, name)| name.clone())
                .collect();
                return Err(LoadError::MissingColumns { missing });
            }
        };

        let mut entries = Vec::new();
        let mut skipped = 0usize;

        for record in rdr.records() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    debug!("Skipping unreadable reference row: {}", e);
                    skipped += 1;
                    continue;
                }
            };

            if record.len() < headers.len() {
                skipped += 1;
                continue;
            }

            let route_id = record[idx_route].trim();
            let label = record[idx_label].trim();
            let distance = parse_distance(&record[idx_dist]);

            match distance {
                Some(distance_meters) if !route_id.is_empty() && !label.is_empty() => {
                    entries.push(ReferencePostEntry {
                        route_id: route_id.to_string(),
                        distance_meters,
                        label: label.to_string(),
                    });
                }
                _ => skipped += 1,
            }
        }

        let accepted = entries.len();
        let table = Self::from_entries(entries);
        info!(
            "Reference posts loaded for {} routes ({} rows, {} skipped)",
            table.routes.len(),
            accepted,
            skipped
        );

        Ok(table)
    }

    pub fn from_csv_str(text: &str, config: &ReferenceTableConfig) -> Result<Self> {
        Self::from_reader(text.as_bytes(), config)
    }

    pub fn from_path(path: impl AsRef<Path>, config: &ReferenceTableConfig) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file), config)
    }

    /// Resolve a distance along `route_id` to the greatest post at or before it.
    ///
    /// A distance before the first post resolves to the first post with a
    /// zero offset. Unknown routes and non-finite distances resolve to
    /// [`ReferencePostMatch::unknown`].
    ///
    /// # Example
    /// ```
    /// use route_locator::{ReferenceTable, ReferenceTableConfig};
    ///
    /// let csv = "TRAMO,PR,DISTANCIA\n4503,PR0,0\n4503,PR1,1000\n4503,PR2,2500\n";
    /// let table = ReferenceTable::from_csv_str(csv, &ReferenceTableConfig::default()).unwrap();
    ///
    /// let m = table.resolve("4503", 1500.0);
    /// assert_eq!((m.label.as_str(), m.offset_meters), ("PR1", 500));
    /// assert!(table.resolve("9999", 10.0).is_unknown());
    /// ```
    pub fn resolve(&self, route_id: &str, distance_meters: f64) -> ReferencePostMatch {
        let entries = self.entries(route_id);
        if entries.is_empty() || !distance_meters.is_finite() {
            return ReferencePostMatch::unknown();
        }

        // First index whose distance is > target; the entry before it is the
        // last one at or below the target.
        let upper = entries.partition_point(|e| e.distance_meters <= distance_meters);
        let entry = &entries[upper.saturating_sub(1)];

        let offset = (distance_meters - entry.distance_meters).round().max(0.0);

        ReferencePostMatch {
            label: entry.label.clone(),
            offset_meters: offset as u32,
        }
    }

    /// Sorted entries for a route; empty if the route has none.
    pub fn entries(&self, route_id: &str) -> &[ReferencePostEntry] {
        self.routes.get(route_id).map_or(&[], Vec::as_slice)
    }

    pub fn route_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.routes.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Total number of entries across all routes.
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse a distance that may use `,` as its decimal separator.
///
/// Only the first comma is replaced, so thousands separators are rejected
/// rather than misread. A blank cell is not a distance: rows without one are
/// skipped instead of being placed at 0 m.
pub fn parse_distance(raw: &str) -> Option<f64> {
    let normalized = raw.trim().replacen(',', ".", 1);
    normalized.parse::<f64>().ok().filter(|d| d.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> ReferenceTable {
        ReferenceTable::from_csv_str(csv, &ReferenceTableConfig::default()).unwrap()
    }

    fn sample() -> ReferenceTable {
        table("TRAMO,PR,DISTANCIA\n4503,PR0,0\n4503,PR1,1000\n4503,PR2,2500\n")
    }

    fn resolved(t: &ReferenceTable, route: &str, d: f64) -> (String, u32) {
        let m = t.resolve(route, d);
        (m.label, m.offset_meters)
    }

    #[test]
    fn test_resolve_examples() {
        let t = sample();
        assert_eq!(resolved(&t, "4503", 1500.0), ("PR1".to_string(), 500));
        assert_eq!(resolved(&t, "4503", 50.0), ("PR0".to_string(), 50));
        assert_eq!(resolved(&t, "4503", 0.0), ("PR0".to_string(), 0));
        assert_eq!(resolved(&t, "4503", 1000.0), ("PR1".to_string(), 0));
        assert_eq!(resolved(&t, "4503", 9000.4), ("PR2".to_string(), 6500));
    }

    #[test]
    fn test_before_first_post_clamps_to_zero() {
        let t = table("TRAMO,PR,DISTANCIA\nA,K1,100\nA,K2,200\n");
        assert_eq!(resolved(&t, "A", 20.0), ("K1".to_string(), 0));
        assert_eq!(resolved(&t, "A", -5.0), ("K1".to_string(), 0));
    }

    #[test]
    fn test_offset_rounds() {
        let t = sample();
        assert_eq!(t.resolve("4503", 1000.49).offset_meters, 0);
        assert_eq!(t.resolve("4503", 1000.5).offset_meters, 1);
        assert_eq!(t.resolve("4503", 1200.7).offset_meters, 201);
    }

    #[test]
    fn test_unknown_route_and_non_finite_distance() {
        let t = sample();
        assert!(t.resolve("4505", 10.0).is_unknown());
        assert!(t.resolve("4503", f64::NAN).is_unknown());
        assert!(t.resolve("4503", f64::INFINITY).is_unknown());
        assert_eq!(t.resolve("4503", f64::NAN), ReferencePostMatch::unknown());
        assert_eq!(ReferencePostMatch::unknown().offset_meters, 0);
    }

    #[test]
    fn test_monotonic_label_distance() {
        let t = table("TRAMO,PR,DISTANCIA\nA,K0,0\nA,K1,250\nA,K2,700\nA,K3,1300\n");
        let mut last = f64::NEG_INFINITY;
        for step in 0..300 {
            let d = step as f64 * 5.0;
            let m = t.resolve("A", d);
            let base = t
                .entries("A")
                .iter()
                .find(|e| e.label == m.label)
                .map(|e| e.distance_meters)
                .unwrap();
            assert!(base >= last);
            last = base;
        }
    }

    #[test]
    fn test_rows_sorted_regardless_of_input_order() {
        let t = table("TRAMO,PR,DISTANCIA\nA,K2,2000\nB,X0,0\nA,K0,0\nA,K1,1000\n");
        let labels: Vec<&str> = t.entries("A").iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["K0", "K1", "K2"]);
        assert_eq!(t.route_ids(), vec!["A".to_string(), "B".to_string()]);
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn test_duplicate_distance_last_inserted_wins() {
        let t = table("TRAMO,PR,DISTANCIA\nA,FIRST,500\nA,K0,0\nA,SECOND,500\n");
        let labels: Vec<&str> = t.entries("A").iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["K0", "FIRST", "SECOND"]);
        assert_eq!(resolved(&t, "A", 600.0), ("SECOND".to_string(), 100));
    }

    #[test]
    fn test_comma_decimal_separator() {
        let t = table("TRAMO,PR,DISTANCIA\nA,K0,\"0,0\"\nA,K1,\"1234,5\"\n");
        assert_eq!(t.entries("A")[1].distance_meters, 1234.5);

        let semicolon = ReferenceTableConfig { delimiter: b';', ..Default::default() };
        let t = ReferenceTable::from_csv_str("TRAMO;PR;DISTANCIA\nA;K1;99,5\n", &semicolon).unwrap();
        assert_eq!(t.entries("A")[0].distance_meters, 99.5);
    }

    #[test]
    fn test_invalid_rows_skipped() {
        let t = table(
            "TRAMO,PR,DISTANCIA\n\
             A,K0,0\n\
             ,K1,100\n\
             A,,200\n\
             A,K3,abc\n\
             A,K4,NaN\n\
             A,K5\n\
             \n\
             A,K6,600\n",
        );
        let labels: Vec<&str> = t.entries("A").iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["K0", "K6"]);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_blank_distance_row_is_not_placed_at_zero() {
        let t = table("TRAMO,PR,DISTANCIA\nA,K0,0\nA,K1,  \nA,K2,500\n");
        assert_eq!(t.len(), 2);
        // A blank K1 read as 0 m would win the tie with K0
        assert_eq!(t.resolve("A", 10.0).label, "K0");
    }

    #[test]
    fn test_fields_are_trimmed_and_extra_columns_ignored() {
        let t = table("ID, TRAMO ,pr,Distancia,NOTES\n1, 4503 , PR7 , 700 ,x\n");
        assert_eq!(
            t.entries("4503"),
            &[ReferencePostEntry {
                route_id: "4503".to_string(),
                distance_meters: 700.0,
                label: "PR7".to_string(),
            }]
        );
    }

    #[test]
    fn test_missing_distance_column_fails_whole_table() {
        let result = ReferenceTable::from_csv_str(
            "TRAMO,PR,KM\n4503,PR0,0\n",
            &ReferenceTableConfig::default(),
        );
        match result {
            Err(LoadError::MissingColumns { missing }) => {
                assert_eq!(missing, vec!["DISTANCIA".to_string()])
            }
            other => panic!("expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input_fails() {
        let result = ReferenceTable::from_csv_str("", &ReferenceTableConfig::default());
        assert!(matches!(result, Err(LoadError::MissingColumns { missing }) if missing.len() == 3));
    }

    #[test]
    fn test_empty_table_resolves_unknown() {
        assert!(ReferenceTable::empty().resolve("4503", 100.0).is_unknown());
        assert!(ReferenceTable::empty().is_empty());
    }

    #[test]
    fn test_from_entries_drops_invalid() {
        let t = ReferenceTable::from_entries(vec![
            ReferencePostEntry { route_id: "A".into(), distance_meters: f64::NAN, label: "X".into() },
            ReferencePostEntry { route_id: "".into(), distance_meters: 1.0, label: "X".into() },
            ReferencePostEntry { route_id: "A".into(), distance_meters: 1.0, label: "K".into() },
        ]);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_parse_distance() {
        assert_eq!(parse_distance(" 12,5 "), Some(12.5));
        assert_eq!(parse_distance("12.5"), Some(12.5));
        assert_eq!(parse_distance("1,234,5"), None);
        assert_eq!(parse_distance(""), None);
        assert_eq!(parse_distance("inf"), None);
    }
}

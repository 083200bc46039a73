//! Coordinates from stored map links

use serde::Serialize;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    /// Embeddable map view centred on these coordinates
    pub fn map_embed_url(&self) -> String {
        format!(
            "https://maps.google.com/maps?q={},{}&z=15&output=embed",
            self.lat, self.lng
        )
    }
}

/// Parse the `q=lat,lng` query of a map link
///
/// Returns `None` for links that are not absolute URLs, have no `q`
/// parameter, non-numeric parts or out-of-range values. The query value is
/// percent-decoded first.
pub fn parse_coordinates(location_url: &str) -> Option<Coordinates> {
    let url = Url::parse(location_url.trim()).ok()?;
    let (_, value) = url.query_pairs().find(|(key, _)| key == "q")?;
    let (lat, lng) = value.split_once(',')?;

    let lat: f64 = lat.trim().parse().ok()?;
    let lng: f64 = lng.trim().parse().ok()?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return None;
    }
    Some(Coordinates { lat, lng })
}

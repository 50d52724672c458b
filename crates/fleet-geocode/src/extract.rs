//! Coordinate extraction from heterogeneous geocoder features
//!
//! Providers (and provider versions) disagree on where a point lives in a
//! feature. Each known shape is a small extractor; they are tried in order
//! and the first hit wins.

use serde::Serialize;
use serde_json::Value;

/// A validated WGS84 point
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    /// Build a point, rejecting non-finite or out-of-range values
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        valid.then_some(Self { lat, lng })
    }
}

/// One extraction strategy
pub type Extractor = fn(&Value) -> Option<Coordinates>;

/// Extractors in the order they are tried
pub const EXTRACTORS: &[(&str, Extractor)] = &[
    ("geojson", geojson_point),
    ("latitude_longitude", latitude_longitude),
    ("flat_lat_lng", flat_lat_lng),
];

/// GeoJSON `geometry.coordinates`, which is `[lng, lat]`
pub fn geojson_point(feature: &Value) -> Option<Coordinates> {
    let coords = feature.get("geometry")?.get("coordinates")?.as_array()?;
    let lng = coords.first()?.as_f64()?;
    let lat = coords.get(1)?.as_f64()?;
    Coordinates::new(lat, lng)
}

/// `{latitude, longitude}` on the feature itself, under `coordinates`, or
/// under `properties.coordinates`
pub fn latitude_longitude(feature: &Value) -> Option<Coordinates> {
    let candidates = [
        Some(feature),
        feature.get("coordinates"),
        feature.get("properties").and_then(|p| p.get("coordinates")),
    ];

    candidates.into_iter().flatten().find_map(|obj| {
        let lat = obj.get("latitude")?.as_f64()?;
        let lng = obj.get("longitude")?.as_f64()?;
        Coordinates::new(lat, lng)
    })
}

/// Flat `{lat, lng}`
pub fn flat_lat_lng(feature: &Value) -> Option<Coordinates> {
    let lat = feature.get("lat")?.as_f64()?;
    let lng = feature.get("lng")?.as_f64()?;
    Coordinates::new(lat, lng)
}

/// Run the extractors in order
///
/// Returns a readable reason when no extractor recognises the feature.
pub fn extract_coordinates(feature: &Value) -> Result<Coordinates, String> {
    EXTRACTORS
        .iter()
        .find_map(|(_, extractor)| extractor(feature))
        .ok_or_else(|| "Geocoder result did not contain usable coordinates".to_string())
}

/// Pick the best feature out of one provider answer
///
/// Handles a FeatureCollection (first feature wins), a bare feature, and an
/// empty answer.
pub fn first_feature(answer: &Value) -> Option<Value> {
    match answer.get("features") {
        Some(Value::Array(features)) => features.first().cloned(),
        Some(_) => None,
        None if answer.is_object() && !answer.as_object()?.is_empty() => Some(answer.clone()),
        None => None,
    }
}

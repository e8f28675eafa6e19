//! Delivery fee estimation from the great-circle distance between the
//! warehouse and a geocoded customer address.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::error::ServiceError;
use crate::models::DeliveryRequest;

pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const FREE_RADIUS_KM: f64 = 40.0;
pub const REGIONAL_RADIUS_KM: f64 = 150.0;
pub const REGIONAL_FEE: u32 = 100;
pub const LONG_DISTANCE_FEE: u32 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeliveryQuote {
    pub fee: u32,
    pub distance: f64,
}

pub fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + from.latitude.to_radians().cos() * to.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

pub fn fee_for_distance(distance_km: f64) -> u32 {
    if distance_km > REGIONAL_RADIUS_KM {
        LONG_DISTANCE_FEE
    } else if distance_km > FREE_RADIUS_KM {
        REGIONAL_FEE
    } else {
        0
    }
}

/// Street, city and zip must be present before any lookup is attempted.
pub fn geocode_query(request: &DeliveryRequest) -> Result<String, ServiceError> {
    let missing: Vec<&str> = [
        ("street", &request.street),
        ("city", &request.city),
        ("zipcode", &request.zipcode),
    ]
    .iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| *name)
    .collect();

    if !missing.is_empty() {
        return Err(ServiceError::Validation(format!("{} required", missing.join(", "))));
    }

    Ok([&request.street, &request.city, &request.state, &request.zipcode, &request.country]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", "))
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct ReverseHit {
    display_name: Option<String>,
    error: Option<String>,
}

/// Client for a Nominatim-compatible geocoding service.
#[derive(Clone)]
pub struct Geocoder {
    http: reqwest::Client,
    base_url: String,
}

impl Geocoder {
    pub fn new(base_url: &str, user_agent: &str) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServiceError::Internal(format!("geocoder client: {}", e)))?;
        Ok(Geocoder {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// First match only; `None` when the service knows no such place.
    pub async fn locate(&self, query: &str) -> Result<Option<Coordinates>, ServiceError> {
        debug!("Geocoding address: {}", query);

        let hits: Vec<SearchHit> = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[("format", "json"), ("limit", "1"), ("q", query)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                error!("Geocoding request failed: {}", e);
                ServiceError::Upstream("Unable to look up address, please try again".to_string())
            })?
            .json()
            .await
            .map_err(|e| {
                error!("Unexpected geocoder response: {}", e);
                ServiceError::Upstream("Unable to look up address, please try again".to_string())
            })?;

        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };
        match (hit.lat.parse::<f64>(), hit.lon.parse::<f64>()) {
            (Ok(latitude), Ok(longitude)) => Ok(Some(Coordinates { latitude, longitude })),
            _ => {
                error!("Geocoder returned unparsable coordinates: {:?}", hit);
                Err(ServiceError::Upstream("Unable to look up address, please try again".to_string()))
            }
        }
    }

    pub async fn describe(&self, point: Coordinates) -> Result<String, ServiceError> {
        debug!("Reverse geocoding {}, {}", point.latitude, point.longitude);

        let hit: ReverseHit = self
            .http
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("format", "json".to_string()),
                ("lat", point.latitude.to_string()),
                ("lon", point.longitude.to_string()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                error!("Reverse geocoding request failed: {}", e);
                ServiceError::Upstream("Unable to look up location, please try again".to_string())
            })?
            .json()
            .await
            .map_err(|e| {
                error!("Unexpected reverse geocoder response: {}", e);
                ServiceError::Upstream("Unable to look up location, please try again".to_string())
            })?;

        match (hit.display_name, hit.error) {
            (Some(name), _) => Ok(name),
            (None, reason) => {
                debug!("No address for location: {:?}", reason);
                Err(ServiceError::NotFound("Address not found".to_string()))
            }
        }
    }
}

/// Geocoder plus the fixed warehouse point all distances are measured from.
#[derive(Clone)]
pub struct DeliveryEstimator {
    geocoder: Geocoder,
    warehouse: Coordinates,
}

impl DeliveryEstimator {
    pub fn new(geocoder: Geocoder, warehouse: Coordinates) -> Self {
        DeliveryEstimator { geocoder, warehouse }
    }

    pub async fn quote(&self, request: &DeliveryRequest) -> Result<DeliveryQuote, ServiceError> {
        let query = geocode_query(request)?;
        let destination = self
            .geocoder
            .locate(&query)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Address not found".to_string()))?;

        let distance = haversine_km(self.warehouse, destination);
        Ok(DeliveryQuote {
            fee: fee_for_distance(distance),
            distance,
        })
    }

    pub async fn describe(&self, point: Coordinates) -> Result<String, ServiceError> {
        self.geocoder.describe(point).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn request(street: &str, city: &str, zipcode: &str) -> DeliveryRequest {
        DeliveryRequest {
            street: street.to_string(),
            city: city.to_string(),
            state: "West Bengal".to_string(),
            zipcode: zipcode.to_string(),
            country: "India".to_string(),
        }
    }

    #[rstest]
    #[case(0.0, 0)]
    #[case(40.0, 0)]
    #[case(41.0, 100)]
    #[case(150.0, 100)]
    #[case(151.0, 150)]
    #[case(2000.0, 150)]
    fn fee_tiers(#[case] distance: f64, #[case] fee: u32) {
        assert_eq!(fee_for_distance(distance), fee);
    }

    #[test]
    fn haversine_known_distance() {
        let kolkata = Coordinates { latitude: 22.5726, longitude: 88.3639 };
        let delhi = Coordinates { latitude: 28.7041, longitude: 77.1025 };
        let d = haversine_km(kolkata, delhi);
        assert!((d - 1318.0).abs() < 5.0, "got {}", d);
        assert!(haversine_km(kolkata, kolkata).abs() < 1e-9);
    }

    #[test]
    fn query_joins_non_empty_parts() {
        let mut req = request("123 Main St", "City", "700001");
        req.state = " ".to_string();
        assert_eq!(geocode_query(&req).unwrap(), "123 Main St, City, 700001, India");
    }

    #[rstest]
    #[case(request("", "City", "700001"), "street required")]
    #[case(request("1 Rd", "", ""), "city, zipcode required")]
    fn missing_fields_fail_fast(#[case] req: DeliveryRequest, #[case] message: &str) {
        assert_eq!(geocode_query(&req).unwrap_err().to_string(), message);
    }

    proptest! {
        #[test]
        fn fee_is_monotonic_and_bounded(a in 0.0f64..20_000.0, b in 0.0f64..20_000.0) {
            let (near, far) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(fee_for_distance(near) <= fee_for_distance(far));
            prop_assert!(fee_for_distance(far) <= LONG_DISTANCE_FEE);
        }
    }
}

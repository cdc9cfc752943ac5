use proj4rs::proj::Proj;
use proj4rs::transform::transform;

/// Get PROJ4 string for an EPSG code using the crs-definitions database
#[inline]
pub fn get_proj_string(epsg: i32) -> Option<&'static str> {
    u16::try_from(epsg).ok()
        .and_then(crs_definitions::from_code)
        .map(|def| def.proj4)
}

/// Check whether a PROJ4 string describes a geographic (lon/lat) system
#[inline]
pub fn is_geographic_proj(proj_str: &str) -> bool {
    proj_str.contains("+proj=longlat") || proj_str.contains("+proj=latlong")
}

/// Parse a PROJ4 string with proj4rs.
pub fn parse_proj(proj_str: &str) -> Result<Proj, String> {
    if proj_str.trim().is_empty() {
        return Err("empty projection definition".to_string());
    }
    Proj::from_proj_string(proj_str).map_err(|e| format!("{:?}", e))
}

/// A parsed projection plus whether it works in degrees.
pub struct Projection {
    proj: Proj,
    geographic: bool,
}

impl Projection {
    pub fn from_proj_string(proj_str: &str) -> Result<Self, String> {
        Ok(Self {
            proj: parse_proj(proj_str)?,
            geographic: is_geographic_proj(proj_str),
        })
    }

    pub fn is_geographic(&self) -> bool {
        self.geographic
    }
}

/// Project a coordinate triple between two parsed projections.
///
/// Geographic inputs and outputs are in degrees; proj4rs works in radians
/// for those, so conversion happens on both sides.
pub fn project(source: &Projection, target: &Projection, x: f64, y: f64, z: f64) -> Result<(f64, f64, f64), String> {
    let (x_in, y_in) = if source.geographic {
        (x.to_radians(), y.to_radians())
    } else {
        (x, y)
    };

    let mut point = (x_in, y_in, z);
    transform(&source.proj, &target.proj, &mut point)
        .map_err(|e| format!("{:?}", e))?;

    let (out_x, out_y) = if target.geographic {
        (point.0.to_degrees(), point.1.to_degrees())
    } else {
        (point.0, point.1)
    };

    Ok((out_x, out_y, point.2))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    fn epsg(code: i32) -> Projection {
        Projection::from_proj_string(get_proj_string(code).unwrap()).unwrap()
    }

    #[test]
    fn test_roundtrip_4326_3857() {
        let (wgs84, merc) = (epsg(4326), epsg(3857));
        let test_points = [
            (0.0, 0.0),
            (10.0, 51.5),
            (-122.4, 37.8),
            (139.7, 35.7),
        ];

        for (lon, lat) in test_points {
            let (x, y, _) = project(&wgs84, &merc, lon, lat, 0.0).unwrap();
            let (lon2, lat2, _) = project(&merc, &wgs84, x, y, 0.0).unwrap();
            assert!(approx_eq(lon, lon2), "lon: {} != {}", lon, lon2);
            assert!(approx_eq(lat, lat2), "lat: {} != {}", lat, lat2);
        }
    }

    #[test]
    fn test_roundtrip_utm() {
        let (wgs84, utm) = (epsg(4326), epsg(32633));
        let (x, y, _) = project(&wgs84, &utm, 15.0, 52.0, 0.0).unwrap();
        assert!(x > 400000.0 && x < 600000.0, "UTM easting: {}", x);
        assert!(y > 5000000.0 && y < 6000000.0, "UTM northing: {}", y);

        let (lon2, lat2, _) = project(&utm, &wgs84, x, y, 0.0).unwrap();
        assert!((15.0 - lon2).abs() < 1e-5);
        assert!((52.0 - lat2).abs() < 1e-5);
    }

    #[test]
    fn test_is_geographic() {
        assert!(epsg(4326).is_geographic());
        assert!(!epsg(3857).is_geographic());
        assert!(is_geographic_proj("+proj=longlat +datum=WGS84 +no_defs"));
        assert!(!is_geographic_proj("+proj=somerc +lat_0=46.95 +units=m"));
    }

    #[test]
    fn test_parse_proj_rejects_garbage() {
        assert!(parse_proj("").is_err());
        assert!(parse_proj("   ").is_err());
        assert!(parse_proj("+proj=doesnotexist +units=m").is_err());
    }

    #[test]
    fn test_unknown_epsg_code() {
        assert!(get_proj_string(999999).is_none());
        assert!(get_proj_string(-1).is_none());
    }

    #[test]
    fn test_out_of_range_latitude_is_rejected() {
        assert!(project(&epsg(4326), &epsg(3857), 0.0, 95.0, 0.0).is_err());
    }
}

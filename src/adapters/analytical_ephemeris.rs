//! Analytical ephemeris from mean orbital elements.
//!
//! Keplerian elements referred to the equinox of date, plus the largest lunar,
//! Jupiter and Saturn perturbation terms. Accuracy is a few arc-minutes for the
//! planets and Moon, well inside any practical orb. Lunar nodes are mean nodes.
//!
//! Time resolution is one minute: seconds are truncated before conversion.

use chrono::{Datelike, NaiveDateTime};

use crate::domain::astro_time::{civil_to_ut, day_number, ut_hours};
use crate::domain::body::{Body, normalize_degrees};
use crate::domain::error::SignalError;
use crate::domain::observer::{Frame, Observer, Zodiac};
use crate::ports::ephemeris_port::EphemerisPort;

/// Calendar years (UT) the element set is trusted for.
pub const SUPPORTED_YEARS: std::ops::RangeInclusive<i32> = 1000..=3000;

/// Lahiri ayanamsa at day 0 and its daily drift.
const AYANAMSA_EPOCH: f64 = 23.853;
const AYANAMSA_RATE: f64 = 3.8246e-5;

fn sind(x: f64) -> f64 {
    x.to_radians().sin()
}

fn cosd(x: f64) -> f64 {
    x.to_radians().cos()
}

fn atan2d(y: f64, x: f64) -> f64 {
    y.atan2(x).to_degrees()
}

/// Mean orbital elements, angles in degrees.
#[derive(Debug, Clone, Copy)]
struct Elements {
    /// Longitude of ascending node.
    node: f64,
    inclination: f64,
    /// Argument of perihelion.
    perihelion: f64,
    semi_major: f64,
    eccentricity: f64,
    mean_anomaly: f64,
}

fn elements(body: Body, d: f64) -> Option<Elements> {
    let e = match body {
        Body::Sun => Elements {
            node: 0.0,
            inclination: 0.0,
            perihelion: 282.9404 + 4.70935e-5 * d,
            semi_major: 1.0,
            eccentricity: 0.016709 - 1.151e-9 * d,
            mean_anomaly: 356.0470 + 0.9856002585 * d,
        },
        Body::Moon => Elements {
            node: 125.1228 - 0.0529538083 * d,
            inclination: 5.1454,
            perihelion: 318.0634 + 0.1643573223 * d,
            semi_major: 60.2666,
            eccentricity: 0.054900,
            mean_anomaly: 115.3654 + 13.0649929509 * d,
        },
        Body::Mercury => Elements {
            node: 48.3313 + 3.24587e-5 * d,
            inclination: 7.0047 + 5.00e-8 * d,
            perihelion: 29.1241 + 1.01444e-5 * d,
            semi_major: 0.387098,
            eccentricity: 0.205635 + 5.59e-10 * d,
            mean_anomaly: 168.6562 + 4.0923344368 * d,
        },
        Body::Venus => Elements {
            node: 76.6799 + 2.46590e-5 * d,
            inclination: 3.3946 + 2.75e-8 * d,
            perihelion: 54.8910 + 1.38374e-5 * d,
            semi_major: 0.723330,
            eccentricity: 0.006773 - 1.302e-9 * d,
            mean_anomaly: 48.0052 + 1.6021302244 * d,
        },
        Body::Mars => Elements {
            node: 49.5574 + 2.11081e-5 * d,
            inclination: 1.8497 - 1.78e-8 * d,
            perihelion: 286.5016 + 2.92961e-5 * d,
            semi_major: 1.523688,
            eccentricity: 0.093405 + 2.516e-9 * d,
            mean_anomaly: 18.6021 + 0.5240207766 * d,
        },
        Body::Jupiter => Elements {
            node: 100.4542 + 2.76854e-5 * d,
            inclination: 1.3030 - 1.557e-7 * d,
            perihelion: 273.8777 + 1.64505e-5 * d,
            semi_major: 5.20256,
            eccentricity: 0.048498 + 4.469e-9 * d,
            mean_anomaly: 19.8950 + 0.0830853001 * d,
        },
        Body::Saturn => Elements {
            node: 113.6634 + 2.38980e-5 * d,
            inclination: 2.4886 - 1.081e-7 * d,
            perihelion: 339.3939 + 2.97661e-5 * d,
            semi_major: 9.55475,
            eccentricity: 0.055546 - 9.499e-9 * d,
            mean_anomaly: 316.9670 + 0.0334442282 * d,
        },
        Body::Rahu | Body::Ketu => return None,
    };
    Some(e)
}

/// Solve Kepler's equation for the eccentric anomaly, degrees.
fn eccentric_anomaly(mean_anomaly: f64, e: f64) -> f64 {
    let m = normalize_degrees(mean_anomaly);
    let mut ecc = m + (e * sind(m) * (1.0 + e * cosd(m))).to_degrees();
    for _ in 0..20 {
        let next = ecc - (ecc - (e * sind(ecc)).to_degrees() - m) / (1.0 - e * cosd(ecc));
        let done = (next - ecc).abs() < 1e-7;
        ecc = next;
        if done {
            break;
        }
    }
    ecc
}

/// Spherical ecliptic coordinates: longitude, latitude (degrees), distance.
#[derive(Debug, Clone, Copy)]
struct Spherical {
    lon: f64,
    lat: f64,
    dist: f64,
}

/// Position in the orbit's own reference frame, rotated into ecliptic
/// coordinates about the central body.
fn orbital_position(el: &Elements) -> Spherical {
    let ecc = eccentric_anomaly(el.mean_anomaly, el.eccentricity);
    let xv = el.semi_major * (cosd(ecc) - el.eccentricity);
    let yv = el.semi_major * (1.0 - el.eccentricity * el.eccentricity).sqrt() * sind(ecc);
    let v = atan2d(yv, xv);
    let r = xv.hypot(yv);

    let arg = v + el.perihelion;
    let x = r * (cosd(el.node) * cosd(arg) - sind(el.node) * sind(arg) * cosd(el.inclination));
    let y = r * (sind(el.node) * cosd(arg) + cosd(el.node) * sind(arg) * cosd(el.inclination));
    let z = r * sind(arg) * sind(el.inclination);

    Spherical {
        lon: normalize_degrees(atan2d(y, x)),
        lat: atan2d(z, x.hypot(y)),
        dist: r,
    }
}

fn mean_anomaly(body: Body, d: f64) -> f64 {
    elements(body, d).map(|e| e.mean_anomaly).unwrap_or_default()
}

/// Geocentric Sun: longitude and distance (AU).
fn sun(d: f64) -> Spherical {
    match elements(Body::Sun, d) {
        Some(el) => orbital_position(&el),
        None => Spherical {
            lon: 0.0,
            lat: 0.0,
            dist: 1.0,
        },
    }
}

/// Sun's mean longitude, degrees.
fn sun_mean_longitude(d: f64) -> f64 {
    elements(Body::Sun, d)
        .map(|el| el.mean_anomaly + el.perihelion)
        .unwrap_or_default()
}

/// Geocentric Moon, distance in Earth radii.
fn moon(d: f64) -> Spherical {
    let Some(el) = elements(Body::Moon, d) else {
        return Spherical {
            lon: 0.0,
            lat: 0.0,
            dist: 60.0,
        };
    };
    let mut pos = orbital_position(&el);

    let ms = mean_anomaly(Body::Sun, d);
    let mm = el.mean_anomaly;
    let ls = sun_mean_longitude(d);
    let lm = el.mean_anomaly + el.perihelion + el.node;
    let dd = lm - ls;
    let f = lm - el.node;

    pos.lon += -1.274 * sind(mm - 2.0 * dd)
        + 0.658 * sind(2.0 * dd)
        - 0.186 * sind(ms)
        - 0.059 * sind(2.0 * mm - 2.0 * dd)
        - 0.057 * sind(mm - 2.0 * dd + ms)
        + 0.053 * sind(mm + 2.0 * dd)
        + 0.046 * sind(2.0 * dd - ms)
        + 0.041 * sind(mm - ms)
        - 0.035 * sind(dd)
        - 0.031 * sind(mm + ms)
        - 0.015 * sind(2.0 * f - 2.0 * dd)
        + 0.011 * sind(mm - 4.0 * dd);
    pos.lat += -0.173 * sind(f - 2.0 * dd)
        - 0.055 * sind(mm - f - 2.0 * dd)
        - 0.046 * sind(mm + f - 2.0 * dd)
        + 0.033 * sind(f + 2.0 * dd)
        + 0.017 * sind(2.0 * mm + f);
    pos.dist += -0.58 * cosd(mm - 2.0 * dd) - 0.46 * cosd(2.0 * dd);
    pos.lon = normalize_degrees(pos.lon);
    pos
}

/// Heliocentric longitude corrections from the Jupiter/Saturn great inequality.
fn giant_planet_perturbation(body: Body, d: f64) -> f64 {
    let mj = mean_anomaly(Body::Jupiter, d);
    let ms = mean_anomaly(Body::Saturn, d);
    match body {
        Body::Jupiter => {
            -0.332 * sind(2.0 * mj - 5.0 * ms - 67.6)
                - 0.056 * sind(2.0 * mj - 2.0 * ms + 21.0)
                + 0.042 * sind(3.0 * mj - 5.0 * ms + 21.0)
                - 0.036 * sind(mj - 2.0 * ms)
                + 0.022 * cosd(mj - ms)
                + 0.023 * sind(2.0 * mj - 3.0 * ms + 52.0)
                - 0.016 * sind(mj - 5.0 * ms - 69.0)
        }
        Body::Saturn => {
            0.812 * sind(2.0 * mj - 5.0 * ms - 67.6)
                - 0.229 * cosd(2.0 * mj - 4.0 * ms - 2.0)
                + 0.119 * sind(mj - 2.0 * ms - 3.0)
                + 0.046 * sind(2.0 * mj - 6.0 * ms - 69.0)
                + 0.014 * sind(mj - 3.0 * ms + 32.0)
        }
        _ => 0.0,
    }
}

/// Geocentric longitude of a planet from its heliocentric orbit.
fn planet_longitude(body: Body, d: f64) -> Option<f64> {
    let el = elements(body, d)?;
    let mut helio = orbital_position(&el);
    helio.lon += giant_planet_perturbation(body, d);

    let xh = helio.dist * cosd(helio.lon) * cosd(helio.lat);
    let yh = helio.dist * sind(helio.lon) * cosd(helio.lat);
    let s = sun(d);
    let xg = xh + s.dist * cosd(s.lon);
    let yg = yh + s.dist * sind(s.lon);
    Some(normalize_degrees(atan2d(yg, xg)))
}

/// Moon longitude corrected for parallax at the observer's site.
fn topocentric_moon_longitude(d: f64, ut_hour: f64, observer: &Observer) -> f64 {
    let m = moon(d);
    let ecl = 23.4393 - 3.563e-7 * d;

    let x = m.dist * cosd(m.lon) * cosd(m.lat);
    let y = m.dist * sind(m.lon) * cosd(m.lat);
    let z = m.dist * sind(m.lat);
    let ye = y * cosd(ecl) - z * sind(ecl);
    let ze = y * sind(ecl) + z * cosd(ecl);
    let ra = atan2d(ye, x);
    let dec = atan2d(ze, x.hypot(ye));

    let parallax = (1.0 / m.dist).asin().to_degrees();
    let lat = observer.location.latitude;
    let gclat = lat - 0.1924 * sind(2.0 * lat);
    let rho = 0.99833 + 0.00167 * cosd(2.0 * lat);
    let lst = sun_mean_longitude(d) + 180.0 + ut_hour * 15.0 + observer.location.longitude;
    let ha = lst - ra;

    let top_ra = ra - parallax * rho * cosd(gclat) * sind(ha) / cosd(dec);
    let top_dec = if gclat.abs() < 1e-9 {
        dec - parallax * rho * sind(-dec) * cosd(ha)
    } else {
        let g = (gclat.to_radians().tan() / cosd(ha)).atan().to_degrees();
        dec - parallax * rho * sind(gclat) * sind(g - dec) / sind(g)
    };

    let xt = cosd(top_ra) * cosd(top_dec);
    let yt = sind(top_ra) * cosd(top_dec);
    let zt = sind(top_dec);
    normalize_degrees(atan2d(yt * cosd(ecl) + zt * sind(ecl), xt))
}

pub fn lahiri_ayanamsa(d: f64) -> f64 {
    AYANAMSA_EPOCH + AYANAMSA_RATE * d
}

/// Stateless ephemeris; safe to share across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticalEphemeris {
    observer: Observer,
}

impl AnalyticalEphemeris {
    pub fn new(observer: Observer) -> Self {
        Self { observer }
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    fn tropical_longitude(&self, body: Body, d: f64, ut_hour: f64) -> Option<f64> {
        match body {
            Body::Sun => Some(sun(d).lon),
            Body::Moon => match self.observer.frame {
                Frame::Geocentric => Some(moon(d).lon),
                Frame::Topocentric => Some(topocentric_moon_longitude(d, ut_hour, &self.observer)),
            },
            Body::Rahu => elements(Body::Moon, d).map(|el| normalize_degrees(el.node)),
            Body::Ketu => elements(Body::Moon, d).map(|el| normalize_degrees(el.node + 180.0)),
            planet => planet_longitude(planet, d),
        }
    }
}

impl EphemerisPort for AnalyticalEphemeris {
    fn longitude(&self, at: NaiveDateTime, body: Body) -> Result<f64, SignalError> {
        let ut = civil_to_ut(at, self.observer.offset).ok_or_else(|| {
            SignalError::PositionUnavailable {
                timestamp: at,
                body,
                reason: "instant outside the representable calendar".to_string(),
            }
        })?;
        if !SUPPORTED_YEARS.contains(&ut.year()) {
            return Err(SignalError::PositionUnavailable {
                timestamp: at,
                body,
                reason: format!(
                    "year {} outside supported range {}..={}",
                    ut.year(),
                    SUPPORTED_YEARS.start(),
                    SUPPORTED_YEARS.end()
                ),
            });
        }

        let d = day_number(ut);
        let tropical = self
            .tropical_longitude(body, d, ut_hours(ut))
            .filter(|lon| lon.is_finite())
            .ok_or_else(|| SignalError::PositionUnavailable {
                timestamp: at,
                body,
                reason: "orbital model did not converge".to_string(),
            })?;

        Ok(match self.observer.zodiac {
            Zodiac::Tropical => tropical,
            Zodiac::Sidereal => normalize_degrees(tropical - lahiri_ayanamsa(d)),
        })
    }
}

//! Geohash codec.
//!
//! A geohash interleaves longitude/latitude bisection decisions (longitude
//! first) and packs every 5 bits into one symbol of a fixed base-32 alphabet.
//! Encoding is total for finite coordinates; decoding rejects any symbol
//! outside the alphabet.

/// Base-32 geohash alphabet (no `a`, `i`, `l`, `o`).
pub const ALPHABET: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Deepest precision that still narrows an `f64` bisection meaningfully.
pub const MAX_PRECISION: usize = 12;

const BITS_PER_CHAR: usize = 5;

/// Latitude/longitude ranges left after walking a hash.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    fn world() -> Self {
        Self {
            min_lat: -90.0,
            max_lat: 90.0,
            min_lon: -180.0,
            max_lon: 180.0,
        }
    }

    /// Midpoint `(latitude, longitude)` of the cell.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// Whether the point lies inside the cell (edges inclusive).
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&latitude)
            && (self.min_lon..=self.max_lon).contains(&longitude)
    }
}

/// Encode a coordinate into exactly `precision` geohash symbols.
///
/// Values on a bisection midpoint go to the upper half. `precision == 0`
/// yields an empty string.
pub fn encode(latitude: f64, longitude: f64, precision: usize) -> String {
    let mut lat = (-90.0_f64, 90.0_f64);
    let mut lon = (-180.0_f64, 180.0_f64);
    let mut even = true;
    let mut hash = String::with_capacity(precision);

    for _ in 0..precision {
        let mut idx = 0usize;
        for _ in 0..BITS_PER_CHAR {
            let (range, value) = if even {
                (&mut lon, longitude)
            } else {
                (&mut lat, latitude)
            };
            let mid = (range.0 + range.1) / 2.0;
            idx <<= 1;
            if value >= mid {
                idx |= 1;
                range.0 = mid;
            } else {
                range.1 = mid;
            }
            even = !even;
        }
        hash.push(char::from(ALPHABET[idx]));
    }

    hash
}

/// Walk `hash` and return the cell it names. Case-insensitive.
///
/// Returns `None` if any symbol is outside [`ALPHABET`].
pub fn decode_bounds(hash: &str) -> Option<Bounds> {
    let mut b = Bounds::world();
    let mut even = true;

    for c in hash.chars() {
        let c = c.to_ascii_lowercase();
        let idx = ALPHABET.iter().position(|&s| char::from(s) == c)?;

        for shift in (0..BITS_PER_CHAR).rev() {
            let upper = (idx >> shift) & 1 == 1;
            if even {
                let mid = (b.min_lon + b.max_lon) / 2.0;
                if upper {
                    b.min_lon = mid;
                } else {
                    b.max_lon = mid;
                }
            } else {
                let mid = (b.min_lat + b.max_lat) / 2.0;
                if upper {
                    b.min_lat = mid;
                } else {
                    b.max_lat = mid;
                }
            }
            even = !even;
        }
    }

    Some(b)
}

/// Decode to the cell midpoint `(latitude, longitude)`.
pub fn decode(hash: &str) -> Option<(f64, f64)> {
    decode_bounds(hash).map(|b| b.center())
}

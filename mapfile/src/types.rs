use serde::{Deserialize, Serialize};

/// Coordinates are stored as degrees multiplied by this factor.
pub const MICRO_DEGREES: f64 = 1_000_000.0;

pub const MAX_LATITUDE: i32 = 90_000_000;
pub const MAX_LONGITUDE: i32 = 180_000_000;

/// Geographic position in micro-degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: i32,
    pub longitude: i32,
}

impl GeoPoint {
    pub const fn new(latitude: i32, longitude: i32) -> Self {
        Self { latitude, longitude }
    }

    pub fn from_degrees(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: (latitude * MICRO_DEGREES) as i32,
            longitude: (longitude * MICRO_DEGREES) as i32,
        }
    }

    pub fn latitude_degrees(&self) -> f64 {
        f64::from(self.latitude) / MICRO_DEGREES
    }

    pub fn longitude_degrees(&self) -> f64 {
        f64::from(self.longitude) / MICRO_DEGREES
    }

    pub fn offset(&self, latitude: i32, longitude: i32) -> Self {
        Self {
            latitude: self.latitude.wrapping_add(latitude),
            longitude: self.longitude.wrapping_add(longitude),
        }
    }

    pub fn is_valid(&self) -> bool {
        (-MAX_LATITUDE..=MAX_LATITUDE).contains(&self.latitude)
            && (-MAX_LONGITUDE..=MAX_LONGITUDE).contains(&self.longitude)
    }
}

/// `x` is the longitude, `y` the latitude, both in degrees.
impl From<GeoPoint> for geo::Coord {
    fn from(point: GeoPoint) -> Self {
        geo::coord! { x: point.longitude_degrees(), y: point.latitude_degrees() }
    }
}

/// Geographic rectangle in micro-degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_latitude: i32,
    pub min_longitude: i32,
    pub max_latitude: i32,
    pub max_longitude: i32,
}

impl BoundingBox {
    pub fn is_valid(&self) -> bool {
        GeoPoint::new(self.min_latitude, self.min_longitude).is_valid()
            && GeoPoint::new(self.max_latitude, self.max_longitude).is_valid()
            && self.min_latitude <= self.max_latitude
            && self.min_longitude <= self.max_longitude
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&point.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&point.longitude)
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            ((i64::from(self.min_latitude) + i64::from(self.max_latitude)) / 2) as i32,
            ((i64::from(self.min_longitude) + i64::from(self.max_longitude)) / 2) as i32,
        )
    }
}

/// Set of tag ids, one bit per id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    words: Vec<u64>,
}

impl TagSet {
    pub fn with_capacity(ids: usize) -> Self {
        Self {
            words: vec![0; (ids + 63) / 64],
        }
    }

    pub fn insert(&mut self, id: u16) {
        let (word, bit) = (usize::from(id) / 64, usize::from(id) % 64);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << bit;
    }

    pub fn contains(&self, id: u16) -> bool {
        let (word, bit) = (usize::from(id) / 64, usize::from(id) % 64);
        self.words
            .get(word)
            .map_or(false, |word| word & (1 << bit) != 0)
    }

    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|word| *word = 0);
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.words.iter().enumerate().flat_map(|(index, &word)| {
            (0..64)
                .filter(move |bit| word & (1 << bit) != 0)
                .map(move |bit| (index * 64 + bit) as u16)
        })
    }
}

impl FromIterator<u16> for TagSet {
    fn from_iter<T: IntoIterator<Item = u16>>(iter: T) -> Self {
        let mut set = TagSet::default();
        iter.into_iter().for_each(|id| set.insert(id));
        set
    }
}

#[test]
fn tag_set_operations() {
    let mut set = TagSet::with_capacity(100);
    assert!(set.is_empty());
    set.insert(3);
    set.insert(64);
    set.insert(99);
    set.insert(8191);
    assert!(set.contains(64));
    assert!(!set.contains(65));
    assert_eq!(set.iter().collect::<Vec<_>>(), vec![3, 64, 99, 8191]);
    assert_eq!(set.len(), 4);
    set.clear();
    assert!(set.is_empty());
    assert!(!set.contains(8191));
}

#[test]
fn bounding_box_checks() {
    let bbox = BoundingBox {
        min_latitude: 52_000_000,
        min_longitude: 13_000_000,
        max_latitude: 53_000_000,
        max_longitude: 14_000_000,
    };
    assert!(bbox.is_valid());
    assert!(bbox.contains(GeoPoint::from_degrees(52.5, 13.4)));
    assert_eq!(bbox.center(), GeoPoint::new(52_500_000, 13_500_000));

    let flipped = BoundingBox {
        min_latitude: 53_000_000,
        ..bbox
    };
    assert!(!flipped.is_valid());
    let outside = BoundingBox {
        max_longitude: 181_000_000,
        ..bbox
    };
    assert!(!outside.is_valid());
}

use std::collections::HashMap;

/// Highest tag id a map file may declare.
pub const MAX_TAG_ID: u16 = 8192;

pub const COASTLINE: &str = "natural=coastline";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    #[error("tag id {id} of {name:?} exceeds {}", MAX_TAG_ID)]
    IdTooLarge { name: String, id: u16 },
    #[error("tag {0:?} declared twice")]
    DuplicateName(String),
    #[error("tag id {0} declared twice")]
    DuplicateId(u16),
}

/// Bidirectional `key=value` <-> id mapping declared in the map header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDictionary {
    by_name: HashMap<String, u16>,
    by_id: Vec<Option<String>>,
}

impl TagDictionary {
    pub fn insert(&mut self, name: impl Into<String>, id: u16) -> Result<(), TagError> {
        let name = name.into();
        if id > MAX_TAG_ID {
            return Err(TagError::IdTooLarge { name, id });
        }
        if self.by_name.contains_key(&name) {
            return Err(TagError::DuplicateName(name));
        }
        if self.name(id).is_some() {
            return Err(TagError::DuplicateId(id));
        }

        let index = usize::from(id);
        if index >= self.by_id.len() {
            self.by_id.resize(index + 1, None);
        }
        self.by_id[index] = Some(name.clone());
        self.by_name.insert(name, id);
        Ok(())
    }

    pub fn id(&self, name: &str) -> Option<u16> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: u16) -> Option<&str> {
        self.by_id.get(usize::from(id))?.as_deref()
    }

    pub fn contains_id(&self, id: u16) -> bool {
        self.name(id).is_some()
    }

    /// One more than the highest declared id; the size of a tag bitset.
    pub fn capacity(&self) -> usize {
        self.by_id.len()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &str)> + '_ {
        self.by_id
            .iter()
            .enumerate()
            .filter_map(|(id, name)| Some((id as u16, name.as_deref()?)))
    }
}

#[test]
fn dictionary_lookups() {
    let mut tags = TagDictionary::default();
    tags.insert("natural=coastline", 4).unwrap();
    tags.insert("highway=primary", 0).unwrap();
    assert_eq!(tags.id(COASTLINE), Some(4));
    assert_eq!(tags.name(0), Some("highway=primary"));
    assert_eq!(tags.name(2), None);
    assert_eq!(tags.capacity(), 5);
    assert_eq!(
        tags.iter().collect::<Vec<_>>(),
        vec![(0, "highway=primary"), (4, "natural=coastline")]
    );
}

#[test]
fn dictionary_rejects_bad_entries() {
    let mut tags = TagDictionary::default();
    tags.insert("a=b", 1).unwrap();
    assert_eq!(tags.insert("a=b", 2), Err(TagError::DuplicateName("a=b".into())));
    assert_eq!(tags.insert("c=d", 1), Err(TagError::DuplicateId(1)));
    assert!(matches!(
        tags.insert("e=f", MAX_TAG_ID + 1),
        Err(TagError::IdTooLarge { .. })
    ));
    assert!(tags.insert("e=f", MAX_TAG_ID).is_ok());
    assert_eq!(tags.len(), 2);
}

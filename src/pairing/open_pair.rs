// Open track pairs
//
// An open pair records that two identity keys came close and that their tracks
// should be paired once both are known. The slot state is an explicit enum so
// "position already filled" and "position empty" cannot be confused.

use std::fmt;
use std::sync::Arc;

use crate::track::{Track, TrackPair};

/// Canonical (sorted) pair of distinct identity keys
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPair {
    first: String,
    second: String,
}

impl KeyPair {
    /// Sort the keys; `None` for a self-pair.
    pub fn new(a: &str, b: &str) -> Option<Self> {
        match a.cmp(b) {
            std::cmp::Ordering::Less => Some(KeyPair {
                first: a.to_string(),
                second: b.to_string(),
            }),
            std::cmp::Ordering::Greater => Some(KeyPair {
                first: b.to_string(),
                second: a.to_string(),
            }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn second(&self) -> &str {
        &self.second
    }

    pub fn contains(&self, key: &str) -> bool {
        self.first == key || self.second == key
    }

    /// The key paired with `key`, if `key` is part of this pair
    pub fn other(&self, key: &str) -> Option<&str> {
        if self.first == key {
            Some(&self.second)
        } else if self.second == key {
            Some(&self.first)
        } else {
            None
        }
    }
}

impl fmt::Display for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.first, self.second)
    }
}

/// How many of the two tracks are known
#[derive(Debug, Clone, PartialEq)]
pub enum SlotState {
    Empty,
    OneTrack(Arc<Track>),
    Two(Arc<Track>, Arc<Track>),
}

/// Promise that the tracks of two keys will be paired
#[derive(Debug, Clone, PartialEq)]
pub struct OpenTrackPair {
    keys: KeyPair,
    state: SlotState,
}

impl OpenTrackPair {
    pub fn new(keys: KeyPair) -> Self {
        OpenTrackPair {
            keys,
            state: SlotState::Empty,
        }
    }

    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    pub fn state(&self) -> &SlotState {
        &self.state
    }

    /// Key whose track is still missing, once exactly one track is known
    pub fn missing_key(&self) -> Option<&str> {
        match &self.state {
            SlotState::OneTrack(track) => self.keys.other(track.key()),
            _ => None,
        }
    }

    pub fn is_closeable(&self) -> bool {
        matches!(self.state, SlotState::Two(..))
    }

    /// Offer a track to the slot.
    ///
    /// The track is taken only if its key belongs to the pair and that
    /// position is still open; a filled position is never overwritten. On
    /// rejection the slot and the track are handed back unchanged.
    pub fn offer(self, track: Arc<Track>) -> Result<Self, (Self, Arc<Track>)> {
        if !self.keys.contains(track.key()) {
            return Err((self, track));
        }
        match self.state {
            SlotState::Empty => Ok(OpenTrackPair {
                keys: self.keys,
                state: SlotState::OneTrack(track),
            }),
            SlotState::OneTrack(known) if known.key() != track.key() => Ok(OpenTrackPair {
                keys: self.keys,
                state: SlotState::Two(known, track),
            }),
            state => Err((
                OpenTrackPair {
                    keys: self.keys,
                    state,
                },
                track,
            )),
        }
    }

    /// Finish a closeable slot into a track pair
    pub fn into_track_pair(self) -> Option<TrackPair> {
        match self.state {
            SlotState::Two(a, b) => TrackPair::new(a, b),
            _ => None,
        }
    }
}

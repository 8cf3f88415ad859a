use crate::model::{Direction, RepeatMode, Track};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;

/// Ordered tracks plus the navigation policy applied to them.
#[derive(Debug)]
pub struct PlaylistNavigator {
    tracks: Vec<Track>,
    current_index: Option<usize>,
    pub shuffle_enabled: bool,
    pub repeat_mode: RepeatMode,
    shuffle_rng: SmallRng,
}

impl PlaylistNavigator {
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_os_rng())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }

    fn with_rng(shuffle_rng: SmallRng) -> Self {
        Self {
            tracks: Vec::new(),
            current_index: None,
            shuffle_enabled: false,
            repeat_mode: RepeatMode::None,
            shuffle_rng,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.current_index?)
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn locations(&self) -> Vec<String> {
        self.tracks
            .iter()
            .map(|track| track.location.clone())
            .collect()
    }

    /// Returns false and leaves the selection alone when `index` is out of range.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.tracks.len() {
            return false;
        }
        self.current_index = Some(index);
        true
    }

    pub fn add(&mut self, track: Track) {
        self.tracks.push(track);
    }

    pub fn extend(&mut self, tracks: impl IntoIterator<Item = Track>) {
        self.tracks.extend(tracks);
    }

    pub fn remove(&mut self, index: usize) -> Option<Track> {
        if index >= self.tracks.len() {
            return None;
        }
        let removed = self.tracks.remove(index);
        self.current_index = match self.current_index {
            Some(current) if current == index => None,
            Some(current) if current > index => Some(current - 1),
            other => other,
        };
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current_index = None;
    }

    pub fn replace(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        self.current_index = None;
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle_enabled = !self.shuffle_enabled;
        self.shuffle_enabled
    }

    pub fn cycle_repeat(&mut self) -> RepeatMode {
        self.repeat_mode = self.repeat_mode.next();
        self.repeat_mode
    }

    /// Picks the index to move to without changing the selection.
    ///
    /// Shuffle only applies to `Next`; `Previous` always steps back linearly.
    /// A random pick may land on the current track again.
    pub fn advance(&mut self, direction: Direction) -> Option<usize> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }

        match direction {
            Direction::Next if self.shuffle_enabled => Some(self.random_index()),
            Direction::Next => {
                let candidate = self.current_index.map_or(0, |current| current + 1);
                if candidate < len {
                    Some(candidate)
                } else if self.repeat_mode == RepeatMode::All {
                    Some(0)
                } else {
                    None
                }
            }
            Direction::Previous => match self.current_index {
                Some(current) if current > 0 => Some(current - 1),
                _ if self.repeat_mode == RepeatMode::All => Some(len - 1),
                _ => None,
            },
        }
    }

    fn random_index(&mut self) -> usize {
        let mut order: Vec<usize> = (0..self.tracks.len()).collect();
        order.shuffle(&mut self.shuffle_rng);
        order[0]
    }
}

impl Default for PlaylistNavigator {
    fn default() -> Self {
        Self::new()
    }
}

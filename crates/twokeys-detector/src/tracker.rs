//! Key-state tracking
//!
//! The tracker keeps, for one logical keyboard, which key codes are held and
//! every key combination string the held keys could spell.
//!
//! A key with several alternative symbols (e.g. left shift is either `<+` or
//! `+`) makes the combination ambiguous, so every candidate combination is
//! multiplied by the number of alternatives:
//!
//! ```text
//! down A       ["A"]
//! down LSHIFT  ["A<+", "A+"]
//! up A         ["<+", "+"]
//! up LSHIFT    [""]
//! ```
//!
//! Each token in a candidate remembers which key code put it there, so a
//! release removes exactly that key's token even when tokens overlap
//! (`+` is a substring of `<+`).
//!
//! Key codes without a symbol are still tracked as held, but never change
//! the candidates.

use crate::event::KeyValue;
use crate::keymap::{KeyCodeMap, MAX_KEY_MAPS};

/// One possible reading of the held keys, in press order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Candidate {
    parts: Vec<(u16, String)>,
}

impl Candidate {
    fn combo(&self) -> String {
        self.parts.iter().map(|(_, token)| token.as_str()).collect()
    }

    fn with(&self, code: u16, token: &str) -> Self {
        let mut parts = self.parts.clone();
        parts.push((code, token.to_string()));
        Self { parts }
    }

    fn without(&self, code: u16) -> Self {
        let mut parts = self.parts.clone();
        if let Some(index) = parts.iter().position(|(part_code, _)| *part_code == code) {
            parts.remove(index);
        }
        Self { parts }
    }
}

/// Ordered set of candidate combinations. Never empty: the idle state is the
/// single empty combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
}

impl Default for CandidateSet {
    fn default() -> Self {
        Self::idle()
    }
}

impl CandidateSet {
    pub fn idle() -> Self {
        Self {
            candidates: vec![Candidate::default()],
        }
    }

    pub fn is_idle(&self) -> bool {
        self.candidates.len() == 1 && self.candidates[0].parts.is_empty()
    }

    /// Candidate combination strings, in order.
    pub fn combos(&self) -> Vec<String> {
        self.candidates.iter().map(Candidate::combo).collect()
    }

    /// Append one of `tokens` to every candidate (cartesian expansion).
    fn expand(&mut self, code: u16, tokens: &[String]) {
        self.candidates = self
            .candidates
            .iter()
            .flat_map(|candidate| tokens.iter().map(move |token| candidate.with(code, token)))
            .collect();
    }

    /// Remove the token contributed by `code` from every candidate.
    ///
    /// Candidates that only differed in which alternative `code` stood for
    /// collapse into one.
    fn remove(&mut self, code: u16) {
        let mut remaining: Vec<Candidate> = Vec::with_capacity(self.candidates.len());
        for candidate in &self.candidates {
            let reduced = candidate.without(code);
            if !remaining.contains(&reduced) {
                remaining.push(reduced);
            }
        }
        if remaining.is_empty() {
            remaining.push(Candidate::default());
        }
        self.candidates = remaining;
    }
}

/// Whether applying an event changed the candidate combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Changed,
    Unchanged,
}

/// Pressed-key bookkeeping and candidate combinations for one keyboard.
#[derive(Debug, Clone)]
pub struct KeyTracker {
    keymap: KeyCodeMap,
    pressed: Vec<bool>,
    candidates: CandidateSet,
}

impl KeyTracker {
    pub fn new(keymap: KeyCodeMap) -> Self {
        Self {
            keymap,
            pressed: vec![false; MAX_KEY_MAPS as usize],
            candidates: CandidateSet::idle(),
        }
    }

    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    pub fn keymap(&self) -> &KeyCodeMap {
        &self.keymap
    }

    pub fn is_pressed(&self, code: u16) -> bool {
        self.pressed.get(code as usize).copied().unwrap_or(false)
    }

    /// True if no key is held and the candidates are back to idle.
    pub fn is_idle(&self) -> bool {
        self.candidates.is_idle() && !self.pressed.iter().any(|pressed| *pressed)
    }

    /// Whether releasing `code` now would remove tokens from the candidates.
    pub fn contributes(&self, code: u16) -> bool {
        self.is_pressed(code) && self.keymap.get(code).is_some()
    }

    /// Apply a key event to the tracked state.
    ///
    /// - `Down` marks the key held and expands the candidates with its
    ///   symbol(s). A repeated `Down` for a held key (auto-repeat, or the same
    ///   key on a second device) changes nothing.
    /// - `Up` marks the key released and removes its token from every
    ///   candidate.
    /// - `Hold` changes nothing.
    ///
    /// Codes outside the table are ignored.
    pub fn apply(&mut self, code: u16, value: KeyValue) -> Transition {
        let Some(pressed) = self.pressed.get_mut(code as usize) else {
            return Transition::Unchanged;
        };

        match value {
            KeyValue::Down => {
                if *pressed {
                    return Transition::Unchanged;
                }
                *pressed = true;
                match self.keymap.get(code) {
                    Some(symbol) => {
                        self.candidates.expand(code, symbol.tokens());
                        Transition::Changed
                    }
                    None => Transition::Unchanged,
                }
            }
            KeyValue::Up => {
                if !*pressed {
                    return Transition::Unchanged;
                }
                *pressed = false;
                if self.keymap.get(code).is_none() {
                    return Transition::Unchanged;
                }
                self.candidates.remove(code);
                Transition::Changed
            }
            KeyValue::Hold => Transition::Unchanged,
        }
    }
}

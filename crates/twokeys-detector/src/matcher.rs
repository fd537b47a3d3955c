//! Hotkey matching
//!
//! A candidate combination matches a hotkey when both strings have the same
//! length and the characters of one are a subset of the characters of the
//! other. Matching therefore ignores press order and repeated characters:
//! `"AB"` matches `"BA"`, and `"AAB"` matches `"ABB"`.
//!
//! Candidates are checked in order, and for each candidate the hotkeys are
//! checked in configuration file order. The first hit wins.

use std::collections::HashSet;

use twokeys_config::{HotkeyEntry, HotkeyType};

use crate::event::KeyValue;
use crate::tracker::CandidateSet;

/// Character-set comparison of a candidate combination and a hotkey string.
pub fn combo_matches(candidate: &str, hotkey: &str) -> bool {
    if candidate.chars().count() != hotkey.chars().count() {
        return false;
    }
    let candidate_chars: HashSet<char> = candidate.chars().collect();
    let hotkey_chars: HashSet<char> = hotkey.chars().collect();
    hotkey_chars.is_subset(&candidate_chars) || candidate_chars.is_subset(&hotkey_chars)
}

/// Outcome of checking a matched hotkey against the triggering event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireDecision {
    Fire,
    /// The hotkey's type does not fire on this event value
    Skip,
    /// The hotkey has a type the detector does not know
    Unsupported,
}

/// Decide whether a hotkey of `kind` fires for an event of `value`.
pub fn fire_decision(kind: &HotkeyType, value: KeyValue) -> FireDecision {
    match (kind, value) {
        (HotkeyType::Down, KeyValue::Down)
        | (HotkeyType::Up, KeyValue::Up)
        | (HotkeyType::Multi, KeyValue::Down | KeyValue::Up) => FireDecision::Fire,
        (HotkeyType::Unknown(_), _) => FireDecision::Unsupported,
        _ => FireDecision::Skip,
    }
}

/// Read-only hotkey table for one keyboard.
#[derive(Debug, Clone, Default)]
pub struct HotkeyTable {
    entries: Vec<(String, HotkeyEntry)>,
}

impl HotkeyTable {
    pub fn new(entries: Vec<(String, HotkeyEntry)>) -> Self {
        Self { entries }
    }

    /// First hotkey matching any of the candidate combinations.
    pub fn find_match(&self, candidates: &CandidateSet) -> Option<(&str, &HotkeyEntry)> {
        for combo in candidates.combos() {
            tracing::trace!("Checking candidate combo {:?}", combo);
            for (key, entry) in &self.entries {
                if combo_matches(&combo, key) {
                    return Some((key.as_str(), entry));
                }
            }
        }
        None
    }
}

impl FromIterator<(String, HotkeyEntry)> for HotkeyTable {
    fn from_iter<I: IntoIterator<Item = (String, HotkeyEntry)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::keymap::KeyCodeMap;
    use crate::tracker::KeyTracker;

    fn table(entries: &[(&str, HotkeyEntry)]) -> HotkeyTable {
        entries
            .iter()
            .map(|(key, entry)| (key.to_string(), entry.clone()))
            .collect()
    }

    fn candidates_for(codes: &[u16]) -> CandidateSet {
        let mut tracker = KeyTracker::new(KeyCodeMap::default());
        for code in codes {
            tracker.apply(*code, KeyValue::Down);
        }
        tracker.candidates().clone()
    }

    #[test]
    fn test_exact_match() {
        assert!(combo_matches("AB", "AB"));
    }

    #[test]
    fn test_order_insensitive() {
        assert!(combo_matches("BA", "AB"));
    }

    #[test]
    fn test_length_prefilter() {
        assert!(!combo_matches("A", "AB"));
        assert!(!combo_matches("AB", "A"));
        assert!(!combo_matches("", "A"));
    }

    #[test]
    fn test_candidate_subset_of_hotkey() {
        // {A, B} is a subset of {A, B, C}
        assert!(combo_matches("AAB", "ABC"));
    }

    #[test]
    fn test_hotkey_subset_of_candidate() {
        // {A, B} is a subset of {A, B, C}
        assert!(combo_matches("ABC", "AAB"));
    }

    #[test]
    fn test_disjoint_sets_do_not_match() {
        assert!(!combo_matches("AB", "CD"));
        assert!(!combo_matches("ABC", "ABD"));
    }

    #[test]
    fn test_fire_decision_matrix() {
        use FireDecision::*;

        assert_eq!(fire_decision(&HotkeyType::Down, KeyValue::Down), Fire);
        assert_eq!(fire_decision(&HotkeyType::Down, KeyValue::Up), Skip);
        assert_eq!(fire_decision(&HotkeyType::Up, KeyValue::Up), Fire);
        assert_eq!(fire_decision(&HotkeyType::Up, KeyValue::Down), Skip);
        assert_eq!(fire_decision(&HotkeyType::Multi, KeyValue::Down), Fire);
        assert_eq!(fire_decision(&HotkeyType::Multi, KeyValue::Up), Fire);
        assert_eq!(fire_decision(&HotkeyType::Multi, KeyValue::Hold), Skip);
        assert_eq!(fire_decision(&HotkeyType::Down, KeyValue::Hold), Skip);
        assert_eq!(
            fire_decision(&HotkeyType::Unknown("sideways".into()), KeyValue::Down),
            Unsupported
        );
    }

    #[test]
    fn test_find_match_uses_file_order() {
        // Both hotkeys match "AB"; the first one listed wins.
        let hotkeys = table(&[
            ("BA", HotkeyEntry::down("second")),
            ("AB", HotkeyEntry::down("first")),
        ]);

        let (key, entry) = hotkeys.find_match(&candidates_for(&[30, 48])).unwrap();
        assert_eq!(key, "BA");
        assert_eq!(entry, &HotkeyEntry::down("second"));
    }

    #[test]
    fn test_find_match_over_ambiguous_candidates() {
        // Left shift + A produces "<+A" and "+A"; "+A" matches.
        let hotkeys = table(&[("+A", HotkeyEntry::down("shifted"))]);
        let (key, _) = hotkeys.find_match(&candidates_for(&[42, 30])).unwrap();
        assert_eq!(key, "+A");

        // "<+A" only matches the left shift reading.
        let hotkeys = table(&[("<+A", HotkeyEntry::down("left"))]);
        assert!(hotkeys.find_match(&candidates_for(&[42, 30])).is_some());
        assert!(hotkeys.find_match(&candidates_for(&[54, 30])).is_none());
    }

    #[test]
    fn test_idle_never_matches() {
        let hotkeys = table(&[("A", HotkeyEntry::down("a"))]);
        assert!(hotkeys.find_match(&CandidateSet::idle()).is_none());
    }
}

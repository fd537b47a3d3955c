//! Hotkey detection pipeline for one logical keyboard
//!
//! Feeds each key event through the [`KeyTracker`] and the [`HotkeyTable`]
//! in the order that makes every hotkey type see the right state:
//!
//! - press: update the tracker, then match (the new key is part of the combo)
//! - release: match, then update the tracker (the released key is still part
//!   of the combo, so `up` hotkeys can fire)
//! - hold: ignored
//!
//! Matching only runs when the event actually changes the combination, so
//! auto-repeat, the same key arriving from a second device, or keys without a
//! symbol never fire a hotkey twice.

use twokeys_config::KeyboardConfig;

use crate::event::{KeyValue, RawEvent};
use crate::keymap::{KeyCodeMap, KeymapError};
use crate::matcher::{fire_decision, FireDecision, HotkeyTable};
use crate::report::HotkeyReport;
use crate::tracker::{KeyTracker, Transition};

pub struct HotkeyDetector {
    keyboard: String,
    tracker: KeyTracker,
    hotkeys: HotkeyTable,
}

impl HotkeyDetector {
    pub fn new(keyboard: impl Into<String>, keymap: KeyCodeMap, hotkeys: HotkeyTable) -> Self {
        Self {
            keyboard: keyboard.into(),
            tracker: KeyTracker::new(keymap),
            hotkeys,
        }
    }

    /// Build a detector from a keyboard's config block, applying its custom
    /// key mappings to a private copy of the default key table.
    pub fn from_config(config: &KeyboardConfig) -> Result<Self, KeymapError> {
        let mut keymap = KeyCodeMap::default();
        keymap.apply_overrides(&config.map)?;
        Ok(Self::new(
            config.name.clone(),
            keymap,
            config.hotkeys.iter().cloned().collect(),
        ))
    }

    pub fn keyboard(&self) -> &str {
        &self.keyboard
    }

    pub fn tracker(&self) -> &KeyTracker {
        &self.tracker
    }

    /// Process one raw event. Returns the report to send if a hotkey fired.
    pub fn process(&mut self, event: RawEvent) -> Option<HotkeyReport> {
        if !event.is_key() {
            tracing::trace!("Discarding non-key event {:?}", event);
            return None;
        }

        let Some(value) = KeyValue::from_raw(event.value) else {
            tracing::debug!("Ignoring key event with unknown value {}", event.value);
            return None;
        };

        tracing::debug!(
            "Key event on {}: code {}, value {}, symbol {:?}",
            self.keyboard,
            event.code,
            event.value,
            self.tracker.keymap().get(event.code)
        );

        match value {
            KeyValue::Hold => None,
            KeyValue::Down => {
                if self.tracker.apply(event.code, value) == Transition::Unchanged {
                    return None;
                }
                tracing::debug!("Candidates: {:?}", self.tracker.candidates().combos());
                self.check_hotkeys(value)
            }
            KeyValue::Up => {
                let fired = if self.tracker.contributes(event.code) {
                    self.check_hotkeys(value)
                } else {
                    None
                };
                self.tracker.apply(event.code, value);
                tracing::debug!("Candidates: {:?}", self.tracker.candidates().combos());
                fired
            }
        }
    }

    fn check_hotkeys(&self, value: KeyValue) -> Option<HotkeyReport> {
        let (combo, entry) = self.hotkeys.find_match(self.tracker.candidates())?;

        match fire_decision(&entry.kind, value) {
            FireDecision::Fire => {
                tracing::info!(
                    "Hotkey {} on {} fired ({} hotkey, {:?})",
                    combo,
                    self.keyboard,
                    entry.kind,
                    entry.action
                );
                Some(HotkeyReport {
                    keyboard: self.keyboard.clone(),
                    hotkey: combo.to_string(),
                    value: value.as_raw(),
                })
            }
            FireDecision::Skip => {
                tracing::debug!(
                    "Hotkey {} matched but is a {} hotkey; not firing on {:?}",
                    combo,
                    entry.kind,
                    value
                );
                None
            }
            FireDecision::Unsupported => {
                tracing::warn!("Hotkey {} not sent as its type is {}", combo, entry.kind);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use twokeys_config::{HotkeyAction, HotkeyEntry, HotkeyType};

    use super::*;
    use crate::event::EV_SYN;

    const KEY_A: u16 = 30;
    const KEY_B: u16 = 48;
    const KEY_Z: u16 = 44;
    const KEY_LEFTSHIFT: u16 = 42;
    const KEY_POWER: u16 = 116;

    fn down(code: u16) -> RawEvent {
        RawEvent::key(code, KeyValue::Down)
    }

    fn up(code: u16) -> RawEvent {
        RawEvent::key(code, KeyValue::Up)
    }

    fn hold(code: u16) -> RawEvent {
        RawEvent::key(code, KeyValue::Hold)
    }

    fn detector(hotkeys: Vec<(&str, HotkeyEntry)>) -> HotkeyDetector {
        let config = KeyboardConfig {
            name: "keyboard_1".to_string(),
            paths: vec![PathBuf::from("/dev/input/event3")],
            map: Vec::new(),
            hotkeys: hotkeys
                .into_iter()
                .map(|(combo, entry)| (combo.to_string(), entry))
                .collect(),
        };
        HotkeyDetector::from_config(&config).unwrap()
    }

    fn typed(kind: HotkeyType, function: &str) -> HotkeyEntry {
        HotkeyEntry {
            kind,
            action: HotkeyAction::Function(function.to_string()),
        }
    }

    fn report(hotkey: &str, value: i32) -> HotkeyReport {
        HotkeyReport {
            keyboard: "keyboard_1".to_string(),
            hotkey: hotkey.to_string(),
            value,
        }
    }

    #[test]
    fn test_end_to_end_down_hotkey() {
        let mut detector = detector(vec![("AB", HotkeyEntry::down("doThing"))]);

        assert_eq!(detector.process(down(KEY_A)), None);
        assert_eq!(detector.process(down(KEY_B)), Some(report("AB", 1)));
        assert_eq!(detector.tracker().candidates().combos(), vec!["AB"]);

        // Releases never fire a "down" hotkey
        assert_eq!(detector.process(up(KEY_A)), None);
        assert_eq!(detector.process(up(KEY_B)), None);
        assert!(detector.tracker().is_idle());
    }

    #[test]
    fn test_press_order_does_not_matter() {
        let mut detector = detector(vec![("AB", HotkeyEntry::down("doThing"))]);

        assert_eq!(detector.process(down(KEY_B)), None);
        assert_eq!(detector.process(down(KEY_A)), Some(report("AB", 1)));
    }

    #[test]
    fn test_up_hotkey_fires_on_release() {
        let mut detector = detector(vec![("Z", typed(HotkeyType::Up, "x"))]);

        assert_eq!(detector.process(down(KEY_Z)), None);
        assert_eq!(detector.tracker().candidates().combos(), vec!["Z"]);

        // Matched against the state before the release clears it
        assert_eq!(detector.process(up(KEY_Z)), Some(report("Z", 0)));
        assert!(detector.tracker().is_idle());
    }

    #[test]
    fn test_multi_hotkey_fires_both_ways() {
        let mut detector = detector(vec![("Z", typed(HotkeyType::Multi, "x"))]);

        assert_eq!(detector.process(down(KEY_Z)), Some(report("Z", 1)));
        assert_eq!(detector.process(hold(KEY_Z)), None);
        assert_eq!(detector.process(up(KEY_Z)), Some(report("Z", 0)));
    }

    #[test]
    fn test_no_double_fire_on_hold() {
        let mut detector = detector(vec![("A", HotkeyEntry::down("a"))]);

        let fired: Vec<_> = [down(KEY_A), hold(KEY_A), hold(KEY_A), hold(KEY_A)]
            .into_iter()
            .filter_map(|event| detector.process(event))
            .collect();
        assert_eq!(fired, vec![report("A", 1)]);
    }

    #[test]
    fn test_no_double_fire_on_repeated_down() {
        // The same key reported by two device files of one keyboard
        let mut detector = detector(vec![("A", HotkeyEntry::down("a"))]);

        assert_eq!(detector.process(down(KEY_A)), Some(report("A", 1)));
        assert_eq!(detector.process(down(KEY_A)), None);
    }

    #[test]
    fn test_unknown_type_never_fires() {
        let mut detector = detector(vec![(
            "A",
            typed(HotkeyType::Unknown("sideways".to_string()), "a"),
        )]);

        assert_eq!(detector.process(down(KEY_A)), None);
        assert_eq!(detector.process(up(KEY_A)), None);
    }

    #[test]
    fn test_null_key_does_not_refire_held_hotkey() {
        let mut detector = detector(vec![("A", HotkeyEntry::down("a"))]);

        assert_eq!(detector.process(down(KEY_A)), Some(report("A", 1)));
        assert_eq!(detector.process(down(KEY_POWER)), None);
        assert_eq!(detector.process(up(KEY_POWER)), None);
        assert!(detector.tracker().is_pressed(KEY_A));
    }

    #[test]
    fn test_release_of_unpressed_key_does_not_fire() {
        let mut detector = detector(vec![("A", typed(HotkeyType::Up, "a"))]);

        // Key went down before the session started watching
        assert_eq!(detector.process(up(KEY_A)), None);
    }

    #[test]
    fn test_non_key_events_discarded() {
        let mut detector = detector(vec![("A", HotkeyEntry::down("a"))]);

        assert_eq!(detector.process(RawEvent::new(EV_SYN, 0, 0)), None);
        assert_eq!(detector.process(RawEvent::new(0x04, 4, KEY_A as i32)), None);
        assert!(detector.tracker().is_idle());
    }

    #[test]
    fn test_shifted_hotkey_either_shift() {
        let mut detector = detector(vec![("+A", HotkeyEntry::down("shifted"))]);

        assert_eq!(detector.process(down(KEY_LEFTSHIFT)), None);
        assert_eq!(detector.process(down(KEY_A)), Some(report("+A", 1)));
    }

    #[test]
    fn test_custom_mapping_hotkey() {
        let config = KeyboardConfig {
            name: "keyboard_1".to_string(),
            paths: vec![PathBuf::from("/dev/input/event3")],
            map: vec![("MACRO1".to_string(), 183)],
            hotkeys: vec![("(MACRO1)".to_string(), HotkeyEntry::down("macro"))],
        };
        let mut detector = HotkeyDetector::from_config(&config).unwrap();

        assert_eq!(detector.process(down(183)), Some(report("(MACRO1)", 1)));
    }

    #[test]
    fn test_custom_mapping_out_of_range() {
        let config = KeyboardConfig {
            name: "keyboard_1".to_string(),
            paths: vec![PathBuf::from("/dev/input/event3")],
            map: vec![("MACRO1".to_string(), 400)],
            hotkeys: Vec::new(),
        };
        assert!(HotkeyDetector::from_config(&config).is_err());
    }
}

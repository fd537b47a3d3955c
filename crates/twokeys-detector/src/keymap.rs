//! Key code to symbol table
//!
//! Every Linux key code below [`MAX_KEY_MAPS`] maps to the symbol used for it
//! in hotkey strings, or to nothing. Letters, digits and punctuation stand for
//! themselves, named keys are wrapped in `$...$`, and left/right modifier keys
//! carry several alternatives so `+A` matches either shift while `<+A` only
//! matches the left one.
//!
//! Codes follow `include/uapi/linux/input-event-codes.h`.

use std::sync::OnceLock;

use thiserror::Error;

pub use twokeys_config::MAX_KEY_MAPS;

/// Symbol(s) a key code contributes to a key combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySymbol {
    /// The key always contributes this token
    Single(String),
    /// The key may stand for any one of these tokens
    Alternatives(Vec<String>),
}

impl KeySymbol {
    /// All tokens this symbol can contribute.
    pub fn tokens(&self) -> &[String] {
        match self {
            KeySymbol::Single(token) => std::slice::from_ref(token),
            KeySymbol::Alternatives(tokens) => tokens,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KeymapError {
    #[error("key code {code} for custom mapping '{token}' is outside 1..{max}", max = MAX_KEY_MAPS)]
    CodeOutOfRange { token: String, code: u16 },
}

/// Per-session key code table.
///
/// Built by cloning the shared default table, so custom mappings applied to
/// one keyboard never leak into another.
#[derive(Debug, Clone)]
pub struct KeyCodeMap {
    symbols: Vec<Option<KeySymbol>>,
}

impl Default for KeyCodeMap {
    fn default() -> Self {
        default_map().clone()
    }
}

impl KeyCodeMap {
    /// Symbol for a key code; `None` for codes with no meaning in hotkeys.
    pub fn get(&self, code: u16) -> Option<&KeySymbol> {
        self.symbols.get(code as usize).and_then(|symbol| symbol.as_ref())
    }

    /// Override `code` with the custom token `(token)`.
    pub fn set_custom(&mut self, token: &str, code: u16) -> Result<(), KeymapError> {
        if code == 0 || code >= MAX_KEY_MAPS {
            return Err(KeymapError::CodeOutOfRange {
                token: token.to_string(),
                code,
            });
        }
        tracing::debug!("Mapped custom key ({}) to code {}", token, code);
        self.symbols[code as usize] = Some(KeySymbol::Single(format!("({})", token)));
        Ok(())
    }

    /// Apply a keyboard's custom mappings in order.
    pub fn apply_overrides<'a>(
        &mut self,
        overrides: impl IntoIterator<Item = &'a (String, u16)>,
    ) -> Result<(), KeymapError> {
        for (token, code) in overrides {
            self.set_custom(token, *code)?;
        }
        Ok(())
    }
}

fn default_map() -> &'static KeyCodeMap {
    static DEFAULT: OnceLock<KeyCodeMap> = OnceLock::new();
    DEFAULT.get_or_init(|| {
        let mut symbols = vec![None; MAX_KEY_MAPS as usize];
        for (code, tokens) in DEFAULT_SYMBOLS {
            let symbol = match tokens {
                [single] => KeySymbol::Single(single.to_string()),
                many => KeySymbol::Alternatives(many.iter().map(|t| t.to_string()).collect()),
            };
            symbols[*code as usize] = Some(symbol);
        }
        KeyCodeMap { symbols }
    })
}

// Unlisted codes have no symbol. 0 (RESERVED) and 116 (POWER) are left out on
// purpose so they can never be part of a hotkey.
const DEFAULT_SYMBOLS: &[(u16, &[&str])] = &[
    (1, &["$ESC$"]),
    (2, &["1"]),
    (3, &["2"]),
    (4, &["3"]),
    (5, &["4"]),
    (6, &["5"]),
    (7, &["6"]),
    (8, &["7"]),
    (9, &["8"]),
    (10, &["9"]),
    (11, &["0"]),
    (12, &["-"]),
    (13, &["="]),
    (14, &["$BACKSPACE$"]),
    (15, &["$TAB$"]),
    (16, &["Q"]),
    (17, &["W"]),
    (18, &["E"]),
    (19, &["R"]),
    (20, &["T"]),
    (21, &["Y"]),
    (22, &["U"]),
    (23, &["I"]),
    (24, &["O"]),
    (25, &["P"]),
    (26, &["[", "{"]),
    (27, &["]", "}"]),
    (28, &["$ENTER$"]),
    (29, &["<^", "^"]),
    (30, &["A"]),
    (31, &["S"]),
    (32, &["D"]),
    (33, &["F"]),
    (34, &["G"]),
    (35, &["H"]),
    (36, &["J"]),
    (37, &["K"]),
    (38, &["L"]),
    (39, &[";"]),
    (40, &["'"]),
    (41, &["`"]),
    (42, &["<+", "+"]),
    (43, &["\\"]),
    (44, &["Z"]),
    (45, &["X"]),
    (46, &["C"]),
    (47, &["V"]),
    (48, &["B"]),
    (49, &["N"]),
    (50, &["M"]),
    (51, &[","]),
    (52, &["."]),
    (53, &["/"]),
    (54, &["+>", "+"]),
    (55, &["$NUM_*$"]),
    (56, &["<!", "!"]),
    (57, &["$SPACE$"]),
    (58, &["$CAPS$"]),
    (59, &["F1"]),
    (60, &["F2"]),
    (61, &["F3"]),
    (62, &["F4"]),
    (63, &["F5"]),
    (64, &["F6"]),
    (65, &["F7"]),
    (66, &["F8"]),
    (67, &["F9"]),
    (68, &["F10"]),
    (69, &["$NUMLOCK$"]),
    (70, &["$SCROLLLOCK$"]),
    (71, &["NUM7"]),
    (72, &["NUM8"]),
    (73, &["NUM9"]),
    (74, &["$NUM_-$"]),
    (75, &["NUM4"]),
    (76, &["NUM5"]),
    (77, &["NUM6"]),
    (78, &["$NUM_+$"]),
    (79, &["NUM1"]),
    (80, &["NUM2"]),
    (81, &["NUM3"]),
    (82, &["NUM0"]),
    (83, &["$NUM_.$"]),
    // 102ND, the extra key on UK layouts
    (86, &["$#$"]),
    (87, &["F11"]),
    (88, &["F12"]),
    (96, &["$NUM_ENTER$"]),
    (97, &["^>", "^"]),
    (98, &["$NUM_/$"]),
    (99, &["$PRINT_SCR$"]),
    (100, &["!>", "!"]),
    (101, &["$LINE_FEED$"]),
    (102, &["$HOME$"]),
    (103, &["$UP$"]),
    (104, &["$PAGE_UP$"]),
    (105, &["$LEFT$"]),
    (106, &["$RIGHT$"]),
    (107, &["$END$"]),
    (108, &["$DOWN$"]),
    (109, &["$PAGE_DOWN$"]),
    (110, &["$INSERT$"]),
    (111, &["$DELETE$"]),
    (112, &["$MACRO$"]),
    (113, &["$MUTE$"]),
    (114, &["$VOL_DOWN$"]),
    (115, &["$VOL_UP$"]),
    (117, &["$NUM_=$"]),
    (118, &["$NUM_+-$"]),
    (119, &["$PAUSE$"]),
    (120, &["$SCALE$"]),
    (121, &["$NUM_,$"]),
    (123, &["HANJA"]),
    (124, &["YEN"]),
    (125, &["$LEFTMETA$", "#", "<#"]),
    (126, &["$RIGHTMETA$", "#", "#>"]),
    (127, &["$COMPOSE$", "$CONTEXT_MENU$"]),
    (128, &["$STOP$"]),
    (129, &["$AGAIN$"]),
    (130, &["$PROPS$"]),
    (131, &["$UNDO$"]),
    (132, &["$FRONT$"]),
    (133, &["$COPY$"]),
    (134, &["$OPEN$"]),
    (135, &["$PASTE$"]),
    (136, &["$FIND$"]),
    (137, &["$CUT$"]),
    (138, &["$HELP$"]),
    (139, &["$MENU$"]),
    (140, &["$CALC$"]),
    (141, &["$SETUP$"]),
    (142, &["$SLEEP$"]),
    (143, &["$WAKEUP$"]),
    (144, &["$FILE$"]),
    (145, &["$SENDFILE$"]),
    (146, &["$DELETEFILE$"]),
    (147, &["$XFER$"]),
    (148, &["$PROG1$"]),
    (149, &["$PROG2$"]),
    (150, &["$WWW$"]),
    (151, &["$MSDOS$"]),
    (152, &["$COFFEE$", "$SCREEN_LOCK$"]),
    (153, &["$ROTATE_DISPLAY$"]),
    (154, &["$CYCLE_WINDOWS$"]),
    (155, &["$MAIL$"]),
    (156, &["$BOOKMARKS$"]),
    (157, &["$COMPUTER$"]),
    (158, &["$BACK$"]),
    (159, &["$FORWARD$"]),
    (160, &["$CLOSE_CD$"]),
    (161, &["$EJECT_CD$"]),
    (162, &["$EJECT_CLOSE_CD$"]),
    (163, &["$MEDIA_NEXT$"]),
    (164, &["$MEDIA_PLAY_PAUSE$"]),
    (165, &["$MEDIA_PREVIOUS$"]),
    (166, &["$MEDIA_STOP$"]),
    (167, &["$MEDIA_RECORD$"]),
    (168, &["$MEDIA_REWIND$"]),
    (169, &["$PHONE$"]),
    (170, &["$ISO$"]),
    (171, &["$CONFIG$"]),
    (172, &["$APP_HOMEPAGE$"]),
    (173, &["$APP_REFRESH$"]),
    (174, &["$APP_EXIT$"]),
    (175, &["$MOVE$"]),
    (176, &["$EDIT$"]),
    (177, &["$SCROLL_UP$"]),
    (178, &["$SCROLL_DOWN$"]),
    (181, &["$APP_NEW$"]),
    (182, &["$APP_REDO$"]),
    (183, &["F13"]),
    (184, &["F14"]),
    (185, &["F15"]),
    (186, &["F16"]),
    (187, &["F17"]),
    (188, &["F18"]),
    (189, &["F19"]),
    (190, &["F20"]),
    (191, &["F21"]),
    (192, &["F22"]),
    (193, &["F23"]),
    (194, &["F24"]),
    (200, &["$MEDIA_PLAY$"]),
    (201, &["$MEDIA_PAUSE$"]),
    (204, &["$DASHBOARD$"]),
    (205, &["$SUSPEND$"]),
    (206, &["$CLOSE$"]),
    (207, &["$PLAY$"]),
    (208, &["$MEDIA_FASTFORWARD$"]),
    (209, &["$SOUND_BASSBOOST$"]),
    (210, &["$PRINT$"]),
    (211, &["$HP$"]),
    (212, &["$CAMERA$"]),
    (213, &["$SOUND$"]),
    (214, &["$QUESTION$"]),
    (215, &["$EMAIL$"]),
    (216, &["$CHAT$"]),
    (217, &["$SEARCH$"]),
    (218, &["$CONNECT$"]),
    (219, &["$FINANCE$"]),
    (220, &["$SPORT$"]),
    (221, &["$SHOP$"]),
    (222, &["$ALTERASE$"]),
    (223, &["$CANCEL$"]),
    (224, &["$BRIGHTNESS_DOWN$"]),
    (225, &["$BRIGHTNESS_UP$"]),
    (226, &["$MEDIA$"]),
    (227, &["$SWITCHVIDEOMODE$"]),
    (231, &["$APP_SEND$"]),
    (232, &["$APP_REPLY$"]),
    (233, &["$APP_FORWARDMAIL$"]),
    (234, &["$APP_SAVE$"]),
    (235, &["$DOCUMENTS$"]),
    (236, &["$BATTERY$"]),
    (237, &["$SET_BLUETOOTH$"]),
    (238, &["$SET_WLAN$"]),
    (239, &["$SET_UWB$"]),
    (240, &["$UNKNOWN$"]),
    (241, &["$VIDEO_SOURCE_NEXT$"]),
    (242, &["$VIDEO_SOURCE_PREV$"]),
    (243, &["$BRIGHTNESS_CYCLE$"]),
    (244, &["$BRIGHTNESS_AUTO$"]),
    (245, &["$DISPLAY_OFF$"]),
    (246, &["$SET_WWAN$"]),
    (247, &["$RFKILL$"]),
    (248, &["$MICMUTE$"]),
];

//! KDL configuration parser

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::model::*;

/// Parse a configuration file from the given path
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl depends on an older miette, so rebuild the span by hand
        let offset = e.span.offset();
        let len = e.span.len();
        let span = miette::SourceSpan::from((offset, len));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "global" => {
                config.global = parse_global(node)?;
            }
            "keyboard" => {
                let keyboard = parse_keyboard(node)?;
                if config.keyboard(&keyboard.name).is_some() {
                    return Err(ConfigError::Invalid {
                        message: format!("Keyboard '{}' is defined more than once", keyboard.name),
                    });
                }
                config.keyboards.push(keyboard);
            }
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    Ok(config)
}

/// Positional (unnamed) arguments of a node
fn arguments(node: &kdl::KdlNode) -> impl Iterator<Item = &kdl::KdlEntry> {
    node.entries().iter().filter(|entry| entry.name().is_none())
}

/// Named property of a node, e.g. `type="up"`
fn property<'a>(node: &'a kdl::KdlNode, key: &str) -> Option<&'a kdl::KdlEntry> {
    node.entries()
        .iter()
        .find(|entry| entry.name().map(|name| name.value() == key).unwrap_or(false))
}

fn first_string_argument(node: &kdl::KdlNode) -> Option<&str> {
    arguments(node).next().and_then(|entry| entry.value().as_string())
}

fn parse_global(node: &kdl::KdlNode) -> Result<GlobalConfig, ConfigError> {
    let mut global = GlobalConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "server" => {
                    if let Some(host) = first_string_argument(child) {
                        global.server.host = host.to_string();
                    }
                    if let Some(entry) = property(child, "port") {
                        global.server.port = entry
                            .value()
                            .as_i64()
                            .and_then(|port| u16::try_from(port).ok())
                            .filter(|port| *port != 0)
                            .ok_or_else(|| ConfigError::Invalid {
                                message: format!("Invalid server port: {}", entry.value()),
                            })?;
                    }
                }
                "lock-keyboards" => {
                    if let Some(entry) = arguments(child).next() {
                        global.lock_keyboards =
                            entry.value().as_bool().ok_or_else(|| ConfigError::Invalid {
                                message: format!(
                                    "lock-keyboards expects true or false, got {}",
                                    entry.value()
                                ),
                            })?;
                    }
                }
                name => {
                    tracing::warn!("Unknown global config option: {}", name);
                }
            }
        }
    }

    Ok(global)
}

fn parse_keyboard(node: &kdl::KdlNode) -> Result<KeyboardConfig, ConfigError> {
    let name = first_string_argument(node)
        .map(|s| s.to_string())
        .ok_or_else(|| ConfigError::MissingField {
            field: "keyboard name (e.g., `keyboard \"keyboard_1\" { ... }`)".to_string(),
        })?;

    let mut paths = Vec::new();
    let mut map = Vec::new();
    let mut hotkeys = None;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "paths" | "path" => {
                    for entry in arguments(child) {
                        if let Some(path) = entry.value().as_string() {
                            paths.push(PathBuf::from(shellexpand::tilde(path).into_owned()));
                        }
                    }
                }
                "map" => {
                    map = parse_map_block(child, &name)?;
                }
                "hotkeys" => {
                    hotkeys = Some(parse_hotkeys_block(child, &name)?);
                }
                option => {
                    tracing::warn!("Unknown keyboard config option: {}", option);
                }
            }
        }
    }

    if paths.is_empty() {
        return Err(ConfigError::MissingField {
            field: format!("paths for keyboard '{}'", name),
        });
    }

    let hotkeys = hotkeys.ok_or_else(|| ConfigError::MissingField {
        field: format!("hotkeys block for keyboard '{}'", name),
    })?;

    if hotkeys.is_empty() {
        tracing::warn!("Keyboard '{}' has no hotkeys; nothing will be reported", name);
    }

    Ok(KeyboardConfig {
        name,
        paths,
        map,
        hotkeys,
    })
}

fn parse_map_block(node: &kdl::KdlNode, keyboard: &str) -> Result<Vec<(String, u16)>, ConfigError> {
    let mut map = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let token = child.name().value().to_string();
            let value = arguments(child).next().map(|entry| entry.value());

            let code = value
                .and_then(|v| v.as_i64())
                .and_then(|code| u16::try_from(code).ok())
                .filter(|code| (1..MAX_KEY_MAPS).contains(code))
                .ok_or_else(|| ConfigError::Invalid {
                    message: format!(
                        "Custom mapping '{}' on keyboard '{}' must be a key code between 1 and {}",
                        token,
                        keyboard,
                        MAX_KEY_MAPS - 1
                    ),
                })?;

            tracing::debug!("Keyboard '{}': mapped ({}) to code {}", keyboard, token, code);
            map.push((token, code));
        }
    }

    Ok(map)
}

fn parse_hotkeys_block(
    node: &kdl::KdlNode,
    keyboard: &str,
) -> Result<Vec<(String, HotkeyEntry)>, ConfigError> {
    let mut hotkeys: Vec<(String, HotkeyEntry)> = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let combo = child.name().value().to_string();
            if combo.is_empty() {
                return Err(ConfigError::Invalid {
                    message: format!("Keyboard '{}' has a hotkey with an empty key combination", keyboard),
                });
            }

            let entry = parse_hotkey(child, &combo)?;

            if let HotkeyType::Unknown(kind) = &entry.kind {
                tracing::warn!(
                    "Hotkey '{}' on keyboard '{}' has unknown type '{}' and will never fire",
                    combo,
                    keyboard,
                    kind
                );
            }

            match hotkeys.iter_mut().find(|(existing, _)| *existing == combo) {
                Some(slot) => {
                    tracing::warn!("Hotkey '{}' defined twice; the last definition wins", combo);
                    slot.1 = entry;
                }
                None => hotkeys.push((combo, entry)),
            }
        }
    }

    Ok(hotkeys)
}

/// Normalize one hotkey node into the canonical `{type, action}` shape.
///
/// Accepted forms:
/// - `"AB" "doThing"` (shorthand, fires on press)
/// - `"AB" type="up" func="doThing"`
/// - `"AB" { down "a"; up "b"; }` (defaults to `multi`)
fn parse_hotkey(node: &kdl::KdlNode, combo: &str) -> Result<HotkeyEntry, ConfigError> {
    let kind = property(node, "type")
        .map(|entry| {
            entry
                .value()
                .as_string()
                .map(HotkeyType::from_name)
                .ok_or_else(|| ConfigError::Invalid {
                    message: format!("Hotkey '{}' has a non-string type", combo),
                })
        })
        .transpose()?;

    let function = property(node, "func")
        .or_else(|| arguments(node).next())
        .and_then(|entry| entry.value().as_string())
        .map(|s| s.to_string());

    if let Some(function) = function {
        return Ok(HotkeyEntry {
            kind: kind.unwrap_or(HotkeyType::Down),
            action: HotkeyAction::Function(function),
        });
    }

    if let Some(children) = node.children() {
        let mut down = None;
        let mut up = None;
        for child in children.nodes() {
            let function = first_string_argument(child).map(|s| s.to_string());
            match child.name().value() {
                "down" => down = function,
                "up" => up = function,
                name => tracing::warn!("Unknown function slot '{}' in hotkey '{}'", name, combo),
            }
        }

        if down.is_some() || up.is_some() {
            return Ok(HotkeyEntry {
                kind: kind.unwrap_or(HotkeyType::Multi),
                action: HotkeyAction::PerEvent { down, up },
            });
        }
    }

    Err(ConfigError::MissingField {
        field: format!("function for hotkey '{}'", combo),
    })
}

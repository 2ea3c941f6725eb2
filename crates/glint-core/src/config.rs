//! Configuration: global init options, per-call overrides, the declarative
//! attribute surface, and the resolved per-block [`BlockConfig`].

use serde::Deserialize;
use smol_str::SmolStr;

use crate::tables::language_for_filename;

/// Colour scheme applied to a block container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    Auto,
}

impl Theme {
    /// Parse a theme name; unknown names are `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            "auto" => Some(Theme::Auto),
            _ => None,
        }
    }

    pub fn class(&self) -> &'static str {
        match self {
            Theme::Light => "glint-theme-light",
            Theme::Dark => "glint-theme-dark",
            Theme::Auto => "glint-theme-auto",
        }
    }
}

/// Attributes read from source elements.
pub mod attrs {
    pub const LANGUAGE: &str = "data-language";
    pub const FILENAME: &str = "data-filename";
    pub const THEME: &str = "data-theme";
    pub const LINE_NUMBERS: &str = "data-line-numbers";
    pub const LINE_START: &str = "data-line-start";
    pub const NO_HEADER: &str = "data-no-header";
    pub const NO_COPY: &str = "data-no-copy";
    pub const LIVE: &str = "data-live";
    pub const SHARE: &str = "data-share";
    pub const DOWNLOAD: &str = "data-download";

    /// Every attribute that carries configuration, migrated to the container
    /// during normalization.
    pub const ALL: &[&str] = &[
        LANGUAGE,
        FILENAME,
        THEME,
        LINE_NUMBERS,
        LINE_START,
        NO_HEADER,
        NO_COPY,
        LIVE,
        SHARE,
        DOWNLOAD,
    ];
}

fn default_selector() -> String {
    "pre code, .glint".to_string()
}

fn default_true() -> bool {
    true
}

fn default_line_start() -> i64 {
    1
}

fn default_debounce_ms() -> u32 {
    50
}

fn default_batch_size() -> usize {
    16
}

/// Options for bulk initialization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitOptions {
    pub selector: String,
    pub auto_detect: bool,
    pub show_header: bool,
    pub show_copy_button: bool,
    pub show_language_label: bool,
    pub show_line_numbers: bool,
    pub line_number_start: i64,
    pub shareable: bool,
    pub downloadable: bool,
    pub live_update: bool,
    pub theme: Theme,
    /// Quiet period before a live block re-highlights.
    pub debounce_ms: u32,
    /// Elements processed per frame during bulk initialization.
    pub batch_size: usize,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            selector: default_selector(),
            auto_detect: default_true(),
            show_header: default_true(),
            show_copy_button: default_true(),
            show_language_label: default_true(),
            show_line_numbers: false,
            line_number_start: default_line_start(),
            shareable: false,
            downloadable: false,
            live_update: false,
            theme: Theme::Auto,
            debounce_ms: default_debounce_ms(),
            batch_size: default_batch_size(),
        }
    }
}

/// Per-call overrides for single-element highlighting.
///
/// `None` leaves the element attribute or init default in charge.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HighlightOptions {
    pub auto_detect: Option<bool>,
    pub show_header: Option<bool>,
    pub show_copy_button: Option<bool>,
    pub show_language_label: Option<bool>,
    pub show_line_numbers: Option<bool>,
    pub shareable: Option<bool>,
    pub downloadable: Option<bool>,
    pub live_update: Option<bool>,
    pub filename: Option<String>,
    pub language: Option<String>,
    pub theme: Option<String>,
    pub line_start: Option<i64>,
}

/// Resolved, immutable configuration of one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockConfig {
    pub auto_detect: bool,
    pub show_header: bool,
    pub show_copy_button: bool,
    pub show_language_label: bool,
    pub show_line_numbers: bool,
    pub line_number_start: i64,
    pub shareable: bool,
    pub downloadable: bool,
    pub live_update: bool,
    pub theme: Theme,
    /// Explicit language, from a hint or the filename extension.
    pub language: Option<SmolStr>,
    pub filename: Option<String>,
}

/// Parse a boolean attribute. Presence alone means `true`.
pub fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}

/// Parse a leading signed integer the way `parseInt` does (`"10px"` → 10).
pub fn parse_leading_int(value: &str) -> Option<i64> {
    let value = value.trim();
    let (sign, digits) = match value.as_bytes().first() {
        Some(b'-') => (-1, &value[1..]),
        Some(b'+') => (1, &value[1..]),
        _ => (1, value),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Language named by a `language-xxx` or `lang-xxx` class.
pub fn language_from_classes<'a>(classes: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    classes.into_iter().find_map(|c| {
        c.strip_prefix("language-")
            .or_else(|| c.strip_prefix("lang-"))
            .filter(|l| !l.is_empty())
    })
}

impl BlockConfig {
    /// Resolve a block's configuration.
    ///
    /// Precedence is call overrides, then element attributes (looked up
    /// through `attr`), then init options. Malformed values fall back
    /// silently: a bad line start keeps the default, an unknown theme is
    /// `auto`.
    pub fn resolve(
        init: &InitOptions,
        overrides: &HighlightOptions,
        attr: impl Fn(&str) -> Option<String>,
        class_language: Option<&str>,
    ) -> Self {
        let flag = |name: &str| attr(name).map(|v| parse_flag(&v));
        let negated = |name: &str| flag(name).map(|v| !v);

        let filename = overrides
            .filename
            .clone()
            .or_else(|| attr(attrs::FILENAME))
            .filter(|f| !f.trim().is_empty());
        let language = overrides
            .language
            .clone()
            .or_else(|| attr(attrs::LANGUAGE))
            .or_else(|| class_language.map(str::to_string))
            .map(|l| l.trim().to_ascii_lowercase())
            .filter(|l| !l.is_empty())
            .map(SmolStr::from)
            .or_else(|| {
                filename
                    .as_deref()
                    .and_then(language_for_filename)
                    .map(SmolStr::new_static)
            });

        let theme = overrides
            .theme
            .clone()
            .or_else(|| attr(attrs::THEME))
            .map(|t| Theme::parse(&t).unwrap_or_default())
            .unwrap_or(init.theme);

        let line_number_start = overrides
            .line_start
            .or_else(|| attr(attrs::LINE_START).and_then(|v| parse_leading_int(&v)))
            .unwrap_or(init.line_number_start);

        Self {
            auto_detect: overrides.auto_detect.unwrap_or(init.auto_detect),
            show_header: overrides
                .show_header
                .or_else(|| negated(attrs::NO_HEADER))
                .unwrap_or(init.show_header),
            show_copy_button: overrides
                .show_copy_button
                .or_else(|| negated(attrs::NO_COPY))
                .unwrap_or(init.show_copy_button),
            show_language_label: overrides
                .show_language_label
                .unwrap_or(init.show_language_label),
            show_line_numbers: overrides
                .show_line_numbers
                .or_else(|| flag(attrs::LINE_NUMBERS))
                .unwrap_or(init.show_line_numbers),
            line_number_start,
            shareable: overrides
                .shareable
                .or_else(|| flag(attrs::SHARE))
                .unwrap_or(init.shareable),
            downloadable: overrides
                .downloadable
                .or_else(|| flag(attrs::DOWNLOAD))
                .unwrap_or(init.downloadable),
            live_update: overrides
                .live_update
                .or_else(|| flag(attrs::LIVE))
                .unwrap_or(init.live_update),
            theme,
            language,
            filename,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn attrs_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BlockConfig::resolve(
            &InitOptions::default(),
            &HighlightOptions::default(),
            attrs_from(&[]),
            None,
        );
        assert!(config.auto_detect);
        assert!(config.show_header);
        assert!(!config.show_line_numbers);
        assert_eq!(config.line_number_start, 1);
        assert_eq!(config.theme, Theme::Auto);
        assert_eq!(config.language, None);
    }

    #[test]
    fn test_attributes_override_init_options() {
        let config = BlockConfig::resolve(
            &InitOptions::default(),
            &HighlightOptions::default(),
            attrs_from(&[
                (attrs::NO_HEADER, ""),
                (attrs::LINE_NUMBERS, "true"),
                (attrs::LINE_START, "10"),
                (attrs::THEME, "dark"),
                (attrs::LIVE, ""),
            ]),
            None,
        );
        assert!(!config.show_header);
        assert!(config.show_line_numbers);
        assert_eq!(config.line_number_start, 10);
        assert_eq!(config.theme, Theme::Dark);
        assert!(config.live_update);
    }

    #[test]
    fn test_overrides_beat_attributes() {
        let overrides = HighlightOptions {
            show_line_numbers: Some(false),
            theme: Some("light".into()),
            line_start: Some(-3),
            ..Default::default()
        };
        let config = BlockConfig::resolve(
            &InitOptions::default(),
            &overrides,
            attrs_from(&[(attrs::LINE_NUMBERS, "true"), (attrs::LINE_START, "10")]),
            None,
        );
        assert!(!config.show_line_numbers);
        assert_eq!(config.line_number_start, -3);
        assert_eq!(config.theme, Theme::Light);
    }

    #[test]
    fn test_malformed_values_are_permissive() {
        let init = InitOptions {
            theme: Theme::Dark,
            ..Default::default()
        };
        let config = BlockConfig::resolve(
            &init,
            &HighlightOptions::default(),
            attrs_from(&[(attrs::LINE_START, "abc"), (attrs::THEME, "neon")]),
            None,
        );
        assert_eq!(config.line_number_start, 1);
        // An invalid theme name is ignored in favour of auto.
        assert_eq!(config.theme, Theme::Auto);
    }

    #[test]
    fn test_filename_implies_language() {
        let config = BlockConfig::resolve(
            &InitOptions::default(),
            &HighlightOptions::default(),
            attrs_from(&[(attrs::FILENAME, "app.ts")]),
            None,
        );
        assert_eq!(config.language.as_deref(), Some("typescript"));
        assert_eq!(config.filename.as_deref(), Some("app.ts"));
    }

    #[test]
    fn test_explicit_language_beats_filename_and_class() {
        let config = BlockConfig::resolve(
            &InitOptions::default(),
            &HighlightOptions::default(),
            attrs_from(&[(attrs::FILENAME, "app.ts"), (attrs::LANGUAGE, "JavaScript")]),
            Some("rust"),
        );
        assert_eq!(config.language.as_deref(), Some("javascript"));

        let from_class = BlockConfig::resolve(
            &InitOptions::default(),
            &HighlightOptions::default(),
            attrs_from(&[]),
            Some("rust"),
        );
        assert_eq!(from_class.language.as_deref(), Some("rust"));
    }

    #[test]
    fn test_parse_leading_int() {
        assert_eq!(parse_leading_int("10"), Some(10));
        assert_eq!(parse_leading_int(" -4 "), Some(-4));
        assert_eq!(parse_leading_int("12px"), Some(12));
        assert_eq!(parse_leading_int("+0"), Some(0));
        assert_eq!(parse_leading_int("x1"), None);
        assert_eq!(parse_leading_int(""), None);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(""));
        assert!(parse_flag("true"));
        assert!(parse_flag("yes"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("0"));
    }

    #[test]
    fn test_language_from_classes() {
        assert_eq!(language_from_classes(["hljs", "language-python"]), Some("python"));
        assert_eq!(language_from_classes(["lang-go"]), Some("go"));
        assert_eq!(language_from_classes(["language-"]), None);
    }

    #[test]
    fn test_init_options_deserialize_camel_case() {
        let options: InitOptions = serde_json::from_str(
            r#"{"selector": ".snippet", "showLineNumbers": true, "theme": "dark", "debounceMs": 120}"#,
        )
        .unwrap();
        assert_eq!(options.selector, ".snippet");
        assert!(options.show_line_numbers);
        assert_eq!(options.theme, Theme::Dark);
        assert_eq!(options.debounce_ms, 120);
        assert!(options.auto_detect);
    }
}

//! Name formatting for packages, mod filenames and dlc filenames.
//!
//! Archive and folder names are chosen by mod authors and carry version
//! numbers, extensions, decorations and mixed casing. Each formatter is a
//! fixed, ordered list of regex rewrite [`Step`]s; later steps rely on the
//! partial output of earlier ones, so the order is part of the contract.
//!
//! # Examples
//!
//! ```
//! use w3modkit::services::naming::{format_dlc_name, format_mod_name, format_package_name};
//!
//! assert_eq!(format_package_name("mod-with-dlc"), "with dlc");
//! assert_eq!(format_mod_name("mod-dlc", "mod"), "modDlc");
//! assert_eq!(format_dlc_name("mod-dlc"), "mod-dlc");
//! ```

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

/// How a step rewrites its matches.
#[derive(Debug, Clone, Copy)]
pub enum Rewrite {
    /// Replace every match with an expansion template.
    With(&'static str),
    /// Replace every match with its first group uppercased.
    UpperFirstGroup,
    /// Like `With`, re-applied until the text stops changing (matches may overlap).
    UntilStable(&'static str),
}

/// One rewrite rule in a formatting pipeline.
#[derive(Debug)]
pub struct Step {
    pub name: &'static str,
    pattern: Regex,
    rewrite: Rewrite,
}

impl Step {
    fn new(name: &'static str, pattern: &str, rewrite: Rewrite) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("Invalid name formatting regex"),
            rewrite,
        }
    }

    pub fn apply(&self, input: &str) -> String {
        match self.rewrite {
            Rewrite::With(template) => self.pattern.replace_all(input, template).into_owned(),
            Rewrite::UpperFirstGroup => self
                .pattern
                .replace_all(input, |caps: &Captures| caps[1].to_uppercase())
                .into_owned(),
            Rewrite::UntilStable(template) => {
                let mut current = input.to_string();
                loop {
                    let next = self.pattern.replace_all(&current, template);
                    if let Cow::Borrowed(_) = next {
                        return current;
                    }
                    current = next.into_owned();
                }
            }
        }
    }
}

const TRIM_EDGES: &str = r"^[^a-zA-Z0-9]+|[^a-zA-Z0-9]+$";
const NEXUS_VERSION: &str = r"-\d+-.*$";
const COPY_SUFFIX: &str = r"(?i)(?:[\s_\-]+copy|\s*\(\d+\))+$";

/// Pipeline behind [`format_package_name`].
pub static PACKAGE_STEPS: LazyLock<Vec<Step>> = LazyLock::new(|| {
    vec![
        Step::new(
            "archive-extension",
            r"(?i)\.(?:zip|rar|7z|tar|gz|tgz|bz2|xz)$",
            Rewrite::With(""),
        ),
        Step::new("nexus-version", NEXUS_VERSION, Rewrite::With("")),
        Step::new("trim", TRIM_EDGES, Rewrite::With("")),
        Step::new("mod-prefix", r"(?i)^mod(.{4,})$", Rewrite::With("${1}")),
        Step::new("trim", TRIM_EDGES, Rewrite::With("")),
        Step::new(
            "plus",
            r"([a-zA-Z0-9])\+([a-zA-Z0-9])",
            Rewrite::UntilStable("${1} ${2}"),
        ),
        Step::new("camel-case", r"([a-z])([A-Z])", Rewrite::With("${1} ${2}")),
        Step::new("letter-digit", r"([a-zA-Z])([0-9])", Rewrite::With("${1} ${2}")),
        Step::new("separators", r"[_\-]+", Rewrite::With(" ")),
        Step::new("whitespace", r"\s+", Rewrite::With(" ")),
        Step::new("trim-space", r"^\s+|\s+$", Rewrite::With("")),
    ]
});

/// Pipeline behind [`format_mod_name`], before the prefix rule.
pub static MOD_STEPS: LazyLock<Vec<Step>> = LazyLock::new(|| {
    vec![
        Step::new("copy-suffix", COPY_SUFFIX, Rewrite::With("")),
        Step::new("symbols", r"[^a-zA-Z0-9_\- ]", Rewrite::With("")),
        Step::new("nexus-version", NEXUS_VERSION, Rewrite::With("")),
        Step::new(
            "version-token",
            r"(?i)[\s_\-]+[a-z]?\d+[\s_\-]+",
            Rewrite::UntilStable(" "),
        ),
        Step::new("camel-join", r"[\s_\-]+([a-zA-Z0-9])", Rewrite::UpperFirstGroup),
        Step::new("trailing-version", r"(?i)v?\d+$", Rewrite::With("")),
        Step::new("trim", TRIM_EDGES, Rewrite::With("")),
    ]
});

/// Pipeline behind [`format_dlc_name`].
pub static DLC_STEPS: LazyLock<Vec<Step>> = LazyLock::new(|| {
    vec![
        Step::new("copy-suffix", COPY_SUFFIX, Rewrite::With("")),
        Step::new("symbols", r"[^a-zA-Z0-9_\-]", Rewrite::With("")),
    ]
});

fn run(steps: &[Step], input: &str) -> String {
    steps
        .iter()
        .fold(input.to_string(), |text, step| step.apply(&text))
}

/// Formatting may shorten a name but must never destroy a usable one.
fn keep_usable(formatted: String, original: &str, min_len: usize) -> String {
    if formatted.chars().count() < min_len && original.chars().count() >= min_len {
        original.to_string()
    } else {
        formatted
    }
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Human-readable package name from an archive or directory name.
pub fn format_package_name(name: &str) -> String {
    keep_usable(run(&PACKAGE_STEPS, name), name, 2)
}

/// Canonical filename with `prefix` (`"mod"` or `"dlc"`).
pub fn format_mod_name(name: &str, prefix: &str) -> String {
    let formatted = run(&MOD_STEPS, name);
    let prefixed = apply_prefix(&formatted, prefix);
    keep_usable(prefixed, name, 4)
}

fn apply_prefix(name: &str, prefix: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let prefix_lower = prefix.to_ascii_lowercase();

    if lower.starts_with(&prefix_lower) {
        // Steps leave only ASCII, so the byte split is on a char boundary.
        return format!("{prefix}{}", capitalize_first(&name[prefix.len()..]));
    }

    let rest = if lower.starts_with("mod") && name.len() > 4 {
        &name[3..]
    } else {
        name
    };
    format!("{prefix}{}", capitalize_first(rest))
}

/// Canonical dlc directory name.
pub fn format_dlc_name(name: &str) -> String {
    keep_usable(run(&DLC_STEPS, name), name, 4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn step<'a>(steps: &'a [Step], name: &str) -> &'a Step {
        steps
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("no step {name}"))
    }

    #[test]
    fn test_package_step_archive_extension() {
        let s = step(&PACKAGE_STEPS, "archive-extension");
        assert_eq!(s.apply("Better Combat.ZIP"), "Better Combat");
        assert_eq!(s.apply("thing.7z"), "thing");
        assert_eq!(s.apply("thing.zipper"), "thing.zipper");
    }

    #[test]
    fn test_package_step_nexus_version() {
        let s = step(&PACKAGE_STEPS, "nexus-version");
        assert_eq!(s.apply("Brothers in Arms-5041-1-2-1602343532"), "Brothers in Arms");
        assert_eq!(s.apply("mod-with-dlc"), "mod-with-dlc");
    }

    #[test]
    fn test_package_step_mod_prefix() {
        let s = step(&PACKAGE_STEPS, "mod-prefix");
        assert_eq!(s.apply("modFancyHUD"), "FancyHUD");
        assert_eq!(s.apply("modHUD"), "modHUD");
        assert_eq!(s.apply("ModAbcd"), "Abcd");
    }

    #[test]
    fn test_package_step_plus_overlapping() {
        let s = step(&PACKAGE_STEPS, "plus");
        assert_eq!(s.apply("a+b+c"), "a b c");
        assert_eq!(s.apply("C++"), "C++");
    }

    #[test]
    fn test_package_step_camel_and_digits() {
        assert_eq!(step(&PACKAGE_STEPS, "camel-case").apply("FancyHud"), "Fancy Hud");
        assert_eq!(step(&PACKAGE_STEPS, "letter-digit").apply("Hud2"), "Hud 2");
    }

    #[test]
    fn test_format_package_name() {
        assert_eq!(format_package_name("mod-with-dlc"), "with dlc");
        assert_eq!(format_package_name("modFancyHUD-1234-2-0-1600000000.zip"), "Fancy HUD");
        assert_eq!(format_package_name("__Better_Torches__"), "Better Torches");
        assert_eq!(format_package_name("normal"), "normal");
        assert_eq!(format_package_name("HD+Reworked+Project"), "HD Reworked Project");
        assert_eq!(format_package_name("BetterTorches2"), "Better Torches 2");
    }

    #[test]
    fn test_format_package_name_keeps_usable_original() {
        assert_eq!(format_package_name("--"), "--");
        assert_eq!(format_package_name("~!"), "~!");
        assert_eq!(format_package_name("x"), "x");
    }

    #[test]
    fn test_mod_step_copy_suffix() {
        let s = step(&MOD_STEPS, "copy-suffix");
        assert_eq!(s.apply("modFoo - Copy"), "modFoo");
        assert_eq!(s.apply("modFoo (2)"), "modFoo");
        assert_eq!(s.apply("modFoo - Copy (3)"), "modFoo");
        assert_eq!(s.apply("modFoocopy"), "modFoocopy");
    }

    #[test]
    fn test_mod_step_version_token() {
        let s = step(&MOD_STEPS, "version-token");
        assert_eq!(s.apply("mod Foo v12 final"), "mod Foo final");
        assert_eq!(s.apply("Better X3 Combat"), "Better Combat");
        assert_eq!(s.apply("mod 1 2 Foo"), "mod Foo");
        assert_eq!(s.apply("Ultimate 4K Textures"), "Ultimate 4K Textures");
    }

    #[test]
    fn test_mod_step_camel_join() {
        let s = step(&MOD_STEPS, "camel-join");
        assert_eq!(s.apply("mod-dlc"), "modDlc");
        assert_eq!(s.apply("my cool_mod"), "myCoolMod");
    }

    #[test]
    fn test_mod_step_trailing_version() {
        let s = step(&MOD_STEPS, "trailing-version");
        assert_eq!(s.apply("modFooV2"), "modFoo");
        assert_eq!(s.apply("modFoo123"), "modFoo");
        assert_eq!(s.apply("modNav"), "modNav");
    }

    #[test]
    fn test_format_mod_name_keeps_existing_prefix() {
        assert_eq!(format_mod_name("modWithoutDlc", "mod"), "modWithoutDlc");
        assert_eq!(format_mod_name("modNormal", "mod"), "modNormal");
        assert_eq!(format_mod_name("ModNormal", "mod"), "modNormal");
        assert_eq!(format_mod_name("mod-dlc", "mod"), "modDlc");
        assert_eq!(format_mod_name("mod0000_MergedFiles", "mod"), "mod0000MergedFiles");
    }

    #[test]
    fn test_format_mod_name_applies_prefix() {
        assert_eq!(format_mod_name("My Cool Mod", "mod"), "modMyCoolMod");
        assert_eq!(format_mod_name("Mod Dlc", "dlc"), "dlcDlc");
        assert_eq!(format_mod_name("dlc_extra", "dlc"), "dlcExtra");
        assert_eq!(format_mod_name("~modDisabled", "mod"), "modDisabled");
    }

    #[test]
    fn test_format_mod_name_strips_versions_and_copies() {
        assert_eq!(format_mod_name("modFriendlyHUD v1.2 - Copy", "mod"), "modFriendlyHUD");
        assert_eq!(
            format_mod_name("Friendly HUD-365-12-1-1600000000", "mod"),
            "modFriendlyHUD"
        );
    }

    #[test]
    fn test_format_mod_name_keeps_usable_original() {
        assert_eq!(format_mod_name("mod2", "mod"), "mod2");
        assert_eq!(format_mod_name("", "mod"), "mod");
    }

    #[test]
    fn test_format_dlc_name() {
        assert_eq!(format_dlc_name("mod-dlc"), "mod-dlc");
        assert_eq!(format_dlc_name("modDlc"), "modDlc");
        assert_eq!(format_dlc_name("dlc Extra!"), "dlcExtra");
        assert_eq!(format_dlc_name("dlcExtra - Copy"), "dlcExtra");
        assert_eq!(format_dlc_name("DLC (2)"), "DLC (2)");
    }

    proptest! {
        #[test]
        fn prop_formatters_never_panic(name in "\\PC{0,40}") {
            let _ = format_package_name(&name);
            let _ = format_mod_name(&name, "mod");
            let _ = format_dlc_name(&name);
        }

        #[test]
        fn prop_mod_name_has_prefix_or_is_original(name in "[a-zA-Z0-9 _\\-.~()]{4,30}") {
            let formatted = format_mod_name(&name, "mod");
            prop_assert!(formatted.starts_with("mod") || formatted == name);
        }

        #[test]
        fn prop_dlc_name_uses_allowed_chars(name in "[a-zA-Z0-9 _\\-!?]{4,30}") {
            let formatted = format_dlc_name(&name);
            let clean = formatted
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            prop_assert!(clean || formatted == name);
        }
    }
}

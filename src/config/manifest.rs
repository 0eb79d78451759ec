//! Link manifest: the declarative list of symlinks and generated files.
//!
//! A manifest looks like this (TOML shown, JSON has the same shape):
//!
//! ```toml
//! [variables]
//! XDG_CONFIG = "$HOME/.config"
//!
//! [[links]]
//! local = "nvim"
//! link = ["$XDG_CONFIG", "nvim"]
//! exclude = [".*\\.swp$"]
//!
//! [[links]]
//! local = "ssh/config"
//! link = ["~", ".ssh", "config"]
//! chmod = "600"
//! post_link = ["chmod", "go-w", "$TARGET"]
//!
//! [[files]]
//! content = "export EDITOR=nvim\n"
//! target = ["~", ".profile.local"]
//! chmod = "644"
//! ```
//!
//! All three top-level keys are required (they may be empty). Regexes,
//! modes and command templates are validated while deserializing, so a
//! loaded [`LinkManifest`] is always well-formed.
use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;

use super::expand::{Variables, normalize};
use super::loader::load_document;
use crate::error::ConfigError;

/// Placeholder element in a [`CommandTemplate`] that is replaced with the
/// link target path.
pub const TARGET_PLACEHOLDER: &str = "$TARGET";

/// Upper bound for permission bits (setuid, setgid, sticky, rwx × 3).
const MAX_MODE: u32 = 0o7777;

/// A permission mode parsed from an octal string such as `"600"` or
/// `"0o755"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct FileMode(u32);

impl FileMode {
    /// The raw permission bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl TryFrom<String> for FileMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let digits = value.strip_prefix("0o").unwrap_or(&value);
        let mode = u32::from_str_radix(digits, 8)
            .map_err(|_| format!("invalid octal mode '{value}'"))?;
        if mode > MAX_MODE {
            return Err(format!("mode '{value}' exceeds {MAX_MODE:o}"));
        }
        Ok(Self(mode))
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:o}", self.0)
    }
}

/// A compiled exclusion pattern.
///
/// Patterns are anchored at the start of the path, as a prefix match, and
/// are not searched for anywhere inside it. Candidate paths are absolute,
/// so a suffix test needs a leading `.*`: `".*\\.bak$"` excludes any path
/// ending in `.bak`, while `"\\.bak$"` alone never matches.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct ExcludePattern {
    text: String,
    anchored: Regex,
}

impl ExcludePattern {
    /// Whether the pattern matches at the start of `path`.
    #[must_use]
    pub fn is_match(&self, path: &Path) -> bool {
        self.anchored.is_match(&path.to_string_lossy())
    }

    /// The source text of the pattern, as written in the manifest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl TryFrom<String> for ExcludePattern {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        // Validate the pattern alone so a stray `)` cannot close the anchor group.
        Regex::new(&value).map_err(|e| format!("invalid exclude pattern '{value}': {e}"))?;
        let anchored = Regex::new(&format!("^(?:{value})"))
            .map_err(|e| format!("invalid exclude pattern '{value}': {e}"))?;
        Ok(Self {
            text: value,
            anchored,
        })
    }
}

/// An argument vector run after a link is created, without a shell.
///
/// An element exactly equal to [`TARGET_PLACEHOLDER`] is replaced with the
/// link target. At most one such element is allowed, and the placeholder
/// may not appear inside a larger argument.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct CommandTemplate(Vec<String>);

impl TryFrom<Vec<String>> for CommandTemplate {
    type Error = String;

    fn try_from(argv: Vec<String>) -> Result<Self, Self::Error> {
        if argv.first().is_none_or(String::is_empty) {
            return Err("post_link command must start with a program name".to_string());
        }
        let slots = argv.iter().filter(|a| *a == TARGET_PLACEHOLDER).count();
        if slots > 1 {
            return Err(format!(
                "post_link may contain {TARGET_PLACEHOLDER} at most once, found {slots}"
            ));
        }
        if let Some(arg) = argv
            .iter()
            .find(|a| *a != TARGET_PLACEHOLDER && a.contains(TARGET_PLACEHOLDER))
        {
            return Err(format!(
                "{TARGET_PLACEHOLDER} must be a whole argument, not part of '{arg}'"
            ));
        }
        Ok(Self(argv))
    }
}

impl CommandTemplate {
    /// Produce the concrete argument vector for `target`.
    ///
    /// The first element is the program.
    #[must_use]
    pub fn render(&self, target: &Path) -> Vec<String> {
        self.0
            .iter()
            .map(|arg| {
                if arg == TARGET_PLACEHOLDER {
                    target.to_string_lossy().into_owned()
                } else {
                    arg.clone()
                }
            })
            .collect()
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

/// A symlink to create: `link` (expanded) → `base_dir/local`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkEntry {
    /// Source path relative to the manifest's directory.
    pub local: PathBuf,
    /// Target path template.
    pub link: Vec<String>,
    /// Patterns that, when matched by the source or target, skip the entry.
    #[serde(default)]
    pub exclude: Vec<ExcludePattern>,
    /// Mode applied after linking.
    #[serde(default)]
    pub chmod: Option<FileMode>,
    /// Command run after linking.
    #[serde(default)]
    pub post_link: Option<CommandTemplate>,
}

/// A file to write with literal content.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileEntry {
    /// Literal file content.
    pub content: String,
    /// Target path template.
    pub target: Vec<String>,
    /// Mode applied after writing.
    #[serde(default)]
    pub chmod: Option<FileMode>,
}

/// On-disk shape of a manifest.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestDocument {
    variables: Variables,
    links: Vec<LinkEntry>,
    files: Vec<FileEntry>,
}

/// A fully validated manifest.
#[derive(Debug, Clone)]
pub struct LinkManifest {
    /// Absolute directory containing the manifest file.
    pub base_dir: PathBuf,
    /// Manifest-level variables.
    pub variables: Variables,
    /// Link entries in declaration order.
    pub links: Vec<LinkEntry>,
    /// File entries in declaration order.
    pub files: Vec<FileEntry>,
}

impl LinkManifest {
    /// Load and validate a manifest. `.toml` files are read as TOML,
    /// anything else as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, unreadable or invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let doc: ManifestDocument = load_document(path)?;

        let absolute = std::path::absolute(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = absolute
            .parent()
            .map_or_else(|| PathBuf::from("/"), normalize);

        Ok(Self {
            base_dir,
            variables: doc.variables,
            links: doc.links,
            files: doc.files,
        })
    }

    /// Absolute path of a link entry's source.
    #[must_use]
    pub fn source_path(&self, entry: &LinkEntry) -> PathBuf {
        normalize(&self.base_dir.join(&entry.local))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::test_helpers::write_temp;

    const TOML_MANIFEST: &str = r#"
[variables]
XDG_CONFIG = "$HOME/.config"

[[links]]
local = "nvim"
link = ["$XDG_CONFIG", "nvim"]
exclude = ["\\.swp$"]

[[links]]
local = "ssh/config"
link = ["~", ".ssh", "config"]
chmod = "600"
post_link = ["chmod", "go-w", "$TARGET"]

[[files]]
content = "hello\n"
target = ["~", ".hello"]
chmod = "0o644"
"#;

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    #[test]
    fn load_toml_manifest() {
        let (dir, path) = write_temp("links.toml", TOML_MANIFEST);
        let manifest = LinkManifest::load(&path).unwrap();

        assert_eq!(manifest.base_dir, dir.path());
        assert_eq!(manifest.variables.get("XDG_CONFIG"), Some("$HOME/.config"));
        assert_eq!(manifest.links.len(), 2);
        assert_eq!(manifest.links[0].local, PathBuf::from("nvim"));
        assert_eq!(manifest.links[0].exclude[0].as_str(), "\\.swp$");
        assert_eq!(manifest.links[1].chmod, Some(FileMode(0o600)));
        assert_eq!(manifest.files.len(), 1);
        assert_eq!(manifest.files[0].chmod.map(FileMode::bits), Some(0o644));
    }

    #[test]
    fn load_json_manifest() {
        let (_dir, path) = write_temp(
            "metadata.json",
            r#"{
                "variables": {},
                "links": [{"local": "zshrc", "link": ["~", ".zshrc"]}],
                "files": []
            }"#,
        );
        let manifest = LinkManifest::load(&path).unwrap();
        assert_eq!(manifest.links.len(), 1);
        assert!(manifest.links[0].exclude.is_empty());
        assert!(manifest.links[0].post_link.is_none());
    }

    #[test]
    fn source_path_is_absolute_under_base_dir() {
        let (dir, path) = write_temp("links.toml", TOML_MANIFEST);
        let manifest = LinkManifest::load(&path).unwrap();
        assert_eq!(
            manifest.source_path(&manifest.links[1]),
            dir.path().join("ssh/config")
        );
    }

    #[test]
    fn missing_required_key_is_rejected() {
        let (_dir, path) = write_temp("links.json", r#"{"variables": {}, "links": []}"#);
        let err = LinkManifest::load(&path).unwrap_err();
        assert!(
            matches!(&err, ConfigError::InvalidSyntax { message, .. } if message.contains("files")),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn unknown_entry_field_is_rejected() {
        let (_dir, path) = write_temp(
            "links.json",
            r#"{"variables": {}, "files": [],
                "links": [{"local": "a", "link": ["b"], "mode": "600"}]}"#,
        );
        let err = LinkManifest::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSyntax { .. }));
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let (_dir, path) = write_temp(
            "links.json",
            r#"{"variables": {}, "files": [],
                "links": [{"local": "a", "link": ["b"], "exclude": ["("]}]}"#,
        );
        let err = LinkManifest::load(&path).unwrap_err();
        assert!(
            matches!(&err, ConfigError::InvalidSyntax { message, .. } if message.contains("invalid exclude pattern")),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn missing_manifest_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = LinkManifest::load(&dir.path().join("links.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    // -----------------------------------------------------------------------
    // FileMode
    // -----------------------------------------------------------------------

    #[test]
    fn file_mode_parses_octal() {
        assert_eq!(FileMode::try_from("755".to_string()).unwrap().bits(), 0o755);
        assert_eq!(FileMode::try_from("0600".to_string()).unwrap().bits(), 0o600);
        assert_eq!(FileMode::try_from("0o4755".to_string()).unwrap().bits(), 0o4755);
    }

    #[test]
    fn file_mode_rejects_invalid() {
        assert!(FileMode::try_from("rwx".to_string()).is_err());
        assert!(FileMode::try_from("888".to_string()).is_err());
        assert!(FileMode::try_from("17777".to_string()).is_err());
        assert!(FileMode::try_from(String::new()).is_err());
    }

    #[test]
    fn file_mode_display_is_octal() {
        assert_eq!(FileMode(0o640).to_string(), "640");
    }

    // -----------------------------------------------------------------------
    // ExcludePattern
    // -----------------------------------------------------------------------

    #[test]
    fn exclude_pattern_matches_from_path_start() {
        let pattern = ExcludePattern::try_from("/home/u/.cache".to_string()).unwrap();
        assert!(pattern.is_match(Path::new("/home/u/.cache/x")));
        assert!(!pattern.is_match(Path::new("/home/u/.config/x")));
    }

    #[test]
    fn exclude_pattern_does_not_match_mid_path() {
        let pattern = ExcludePattern::try_from("cache".to_string()).unwrap();
        assert!(!pattern.is_match(Path::new("/home/u/.cache/x")));
        assert!(pattern.is_match(Path::new("cache/x")));
    }

    #[test]
    fn exclude_pattern_suffix_needs_leading_wildcard() {
        let bare = ExcludePattern::try_from(r"\.bak$".to_string()).unwrap();
        let wild = ExcludePattern::try_from(r".*\.bak$".to_string()).unwrap();
        let path = Path::new("/repo/vimrc.bak");
        assert!(!bare.is_match(path));
        assert!(wild.is_match(path));
        assert_eq!(wild.as_str(), r".*\.bak$");
    }

    #[test]
    fn exclude_pattern_alternation_is_anchored_as_a_whole() {
        let pattern = ExcludePattern::try_from("/tmp|/var".to_string()).unwrap();
        assert!(pattern.is_match(Path::new("/var/log")));
        assert!(!pattern.is_match(Path::new("/home/var")));
    }

    #[test]
    fn exclude_pattern_cannot_escape_anchor_group() {
        assert!(ExcludePattern::try_from("a)|(b".to_string()).is_err());
    }

    // -----------------------------------------------------------------------
    // CommandTemplate
    // -----------------------------------------------------------------------

    fn template(argv: &[&str]) -> Result<CommandTemplate, String> {
        CommandTemplate::try_from(argv.iter().map(ToString::to_string).collect::<Vec<_>>())
    }

    #[test]
    fn command_template_substitutes_target_slot() {
        let cmd = template(&["chmod", "-R", "go-w", "$TARGET"]).unwrap();
        assert_eq!(
            cmd.render(Path::new("/home/u/.ssh")),
            vec!["chmod", "-R", "go-w", "/home/u/.ssh"]
        );
    }

    #[test]
    fn command_template_without_slot_is_allowed() {
        let cmd = template(&["fc-cache", "-f"]).unwrap();
        assert_eq!(cmd.render(Path::new("/x")), vec!["fc-cache", "-f"]);
    }

    #[test]
    fn command_template_keeps_spaces_in_target() {
        let cmd = template(&["touch", "$TARGET"]).unwrap();
        assert_eq!(
            cmd.render(Path::new("/home/u/My Files")),
            vec!["touch", "/home/u/My Files"]
        );
    }

    #[test]
    fn command_template_rejects_two_slots() {
        assert!(template(&["cp", "$TARGET", "$TARGET"]).is_err());
    }

    #[test]
    fn command_template_rejects_embedded_slot() {
        assert!(template(&["tool", "--path=$TARGET"]).is_err());
    }

    #[test]
    fn command_template_rejects_empty() {
        assert!(template(&[]).is_err());
        assert!(template(&[""]).is_err());
    }
}

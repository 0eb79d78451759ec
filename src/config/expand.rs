//! Path template expansion.
//!
//! A path template is a list of components. Each component is expanded in
//! three passes:
//!
//! 1. manifest variables (`$NAME` / `${NAME}`), longest name first
//! 2. process environment variables, where an unset variable is an error
//! 3. `~` to the home directory, first component only
//!
//! The components are then joined, anchored to the current directory when
//! relative, and normalized lexically. Symlinks are never followed.
use std::collections::BTreeMap;
use std::env::VarError;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::error::PathResolutionError;

/// Named string variables declared by a manifest.
///
/// Stored longest-name-first so that `$HOME_DIR` is substituted before
/// `$HOME` can match a prefix of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "BTreeMap<String, String>")]
pub struct Variables {
    entries: Vec<(String, String)>,
}

impl From<BTreeMap<String, String>> for Variables {
    fn from(map: BTreeMap<String, String>) -> Self {
        let mut entries: Vec<(String, String)> = map.into_iter().collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { entries }
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Variables {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>()
            .into()
    }
}

impl Variables {
    /// Look up a variable by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Number of declared variables.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no variables are declared.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Substitute every declared variable in `component`.
    ///
    /// Values may reference other manifest variables regardless of name
    /// length. Passes repeat until nothing changes, at most once per
    /// variable plus one, so a self-referencing definition stops with its
    /// reference left in place.
    #[must_use]
    pub fn substitute(&self, component: &str) -> String {
        let mut current = component.to_string();
        for _ in 0..=self.entries.len() {
            let next = self.substitute_once(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    fn substitute_once(&self, input: &str) -> String {
        self.entries
            .iter()
            .fold(input.to_string(), |acc, (name, value)| {
                replace_var(&acc, name, value)
            })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Replace `${name}` anywhere and `$name` where it is not followed by
/// another identifier character.
fn replace_var(input: &str, name: &str, value: &str) -> String {
    let braced = format!("${{{name}}}");
    let bare = format!("${name}");
    let replaced = input.replace(&braced, value);

    let mut out = String::with_capacity(replaced.len());
    let mut rest = replaced.as_str();
    while let Some((head, after)) = rest.split_once(bare.as_str()) {
        out.push_str(head);
        if after.starts_with(is_ident_char) {
            out.push_str(&bare);
        } else {
            out.push_str(value);
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

/// Source of process-level facts used during expansion.
#[cfg_attr(test, mockall::automock)]
pub trait Environment: Send + Sync {
    /// Value of environment variable `name`, if set and valid Unicode.
    fn var(&self, name: &str) -> Option<String>;

    /// The user's home directory.
    fn home_dir(&self) -> Option<PathBuf>;

    /// Current working directory, used to anchor relative templates.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    fn current_dir(&self) -> io::Result<PathBuf>;
}

/// [`Environment`] backed by the real process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    fn current_dir(&self) -> io::Result<PathBuf> {
        std::env::current_dir()
    }
}

/// Expand a path template into an absolute, normalized path.
///
/// # Errors
///
/// Returns [`PathResolutionError`] when the template is empty, a variable is
/// left unresolved, `~` is used without a known home directory, or a relative
/// result cannot be anchored to the current directory.
pub fn expand(
    components: &[String],
    vars: &Variables,
    env: &dyn Environment,
) -> Result<PathBuf, PathResolutionError> {
    if components.is_empty() {
        return Err(PathResolutionError::EmptyTemplate);
    }

    let mut joined = PathBuf::new();
    for (i, component) in components.iter().enumerate() {
        let expanded = expand_component(component, vars, env, i == 0)?;
        joined.push(expanded);
    }

    if joined.is_relative() {
        let cwd = env
            .current_dir()
            .map_err(PathResolutionError::CurrentDir)?;
        joined = cwd.join(joined);
    }
    Ok(normalize(&joined))
}

fn expand_component(
    component: &str,
    vars: &Variables,
    env: &dyn Environment,
    first: bool,
) -> Result<String, PathResolutionError> {
    let substituted = vars.substitute(component);

    let expanded = shellexpand::env_with_context(&substituted, |name: &str| {
        env.var(name).map(Some).ok_or(VarError::NotPresent)
    })
    .map_err(|e| PathResolutionError::UnresolvedVariable {
        name: e.var_name,
        component: component.to_string(),
    })?
    .into_owned();

    let wants_home = first && (expanded == "~" || expanded.starts_with("~/"));
    if !wants_home {
        return Ok(expanded);
    }

    let home = env
        .home_dir()
        .ok_or_else(|| PathResolutionError::NoHomeDirectory {
            component: component.to_string(),
        })?;
    let home = home.to_string_lossy().into_owned();
    Ok(shellexpand::tilde_with_context(&expanded, || Some(home.as_str())).into_owned())
}

/// Resolve `.` and `..` components without touching the filesystem.
///
/// `..` at the root stays at the root.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push(component.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn components(parts: &[&str]) -> Vec<String> {
        parts.iter().map(ToString::to_string).collect()
    }

    /// Mock environment with `HOME=/home/u`, cwd `/work`, and no other
    /// variables set.
    fn home_env() -> MockEnvironment {
        let mut env = MockEnvironment::new();
        env.expect_var()
            .returning(|name| (name == "HOME").then(|| "/home/u".to_string()));
        env.expect_home_dir()
            .returning(|| Some(PathBuf::from("/home/u")));
        env.expect_current_dir()
            .returning(|| Ok(PathBuf::from("/work")));
        env
    }

    // -----------------------------------------------------------------------
    // Variables
    // -----------------------------------------------------------------------

    #[test]
    fn variables_sorted_longest_first() {
        let vars = Variables::from([("A", "1"), ("ABC", "3"), ("AB", "2")]);
        let names: Vec<&str> = vars.entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["ABC", "AB", "A"]);
    }

    #[test]
    fn substitute_longest_name_wins() {
        let vars = Variables::from([("CONF", "/short"), ("CONF_DIR", "/long")]);
        assert_eq!(vars.substitute("$CONF_DIR/x"), "/long/x");
        assert_eq!(vars.substitute("$CONF/x"), "/short/x");
    }

    #[test]
    fn substitute_braced_form() {
        let vars = Variables::from([("NAME", "app")]);
        assert_eq!(vars.substitute("${NAME}rc"), "apprc");
    }

    #[test]
    fn substitute_leaves_longer_identifiers_alone() {
        let vars = Variables::from([("CONF", "/c")]);
        assert_eq!(vars.substitute("$CONFIG"), "$CONFIG");
    }

    #[test]
    fn substitute_resolves_reference_to_longer_name() {
        let vars = Variables::from([("DOTFILES_ROOT", "/srv/dots"), ("CFG", "$DOTFILES_ROOT/cfg")]);
        assert_eq!(vars.substitute("$CFG"), "/srv/dots/cfg");
    }

    #[test]
    fn substitute_follows_chains() {
        let vars = Variables::from([("A", "$BB/a"), ("BB", "$CCC/b"), ("CCC", "/c")]);
        assert_eq!(vars.substitute("$A"), "/c/b/a");
    }

    #[test]
    fn substitute_stops_on_cycles() {
        let vars = Variables::from([("LOOP", "$LOOP/x")]);
        assert!(vars.substitute("$LOOP").contains("$LOOP"));
    }

    #[test]
    fn variables_get() {
        let vars = Variables::from([("XDG", "/x")]);
        assert_eq!(vars.get("XDG"), Some("/x"));
        assert_eq!(vars.get("NOPE"), None);
        assert_eq!(vars.len(), 1);
        assert!(!vars.is_empty());
    }

    // -----------------------------------------------------------------------
    // expand
    // -----------------------------------------------------------------------

    #[test]
    fn expands_home_variable_from_environment() {
        let env = home_env();
        let path = expand(
            &components(&["$HOME", ".config", "app"]),
            &Variables::default(),
            &env,
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/home/u/.config/app"));
    }

    #[test]
    fn manifest_variables_take_precedence_over_environment() {
        let env = home_env();
        let vars = Variables::from([("HOME", "/override")]);
        let path = expand(&components(&["$HOME", "x"]), &vars, &env).unwrap();
        assert_eq!(path, PathBuf::from("/override/x"));
    }

    #[test]
    fn manifest_variable_may_reference_environment() {
        let env = home_env();
        let vars = Variables::from([("CONFIG", "$HOME/.config")]);
        let path = expand(&components(&["$CONFIG", "nvim"]), &vars, &env).unwrap();
        assert_eq!(path, PathBuf::from("/home/u/.config/nvim"));
    }

    #[test]
    fn tilde_expands_in_first_component() {
        let env = home_env();
        let path = expand(&components(&["~", ".vimrc"]), &Variables::default(), &env).unwrap();
        assert_eq!(path, PathBuf::from("/home/u/.vimrc"));

        let path = expand(&components(&["~/.config"]), &Variables::default(), &env).unwrap();
        assert_eq!(path, PathBuf::from("/home/u/.config"));
    }

    #[test]
    fn tilde_in_later_component_is_literal() {
        let env = home_env();
        let path = expand(&components(&["/tmp", "~"]), &Variables::default(), &env).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/~"));
    }

    #[test]
    fn unset_variable_is_error() {
        let env = home_env();
        let err = expand(
            &components(&["$XDG_NOPE", "app"]),
            &Variables::default(),
            &env,
        )
        .unwrap_err();
        assert!(
            matches!(&err, PathResolutionError::UnresolvedVariable { name, .. } if name == "XDG_NOPE"),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn empty_template_is_error() {
        let env = MockEnvironment::new();
        let err = expand(&[], &Variables::default(), &env).unwrap_err();
        assert!(matches!(err, PathResolutionError::EmptyTemplate));
    }

    #[test]
    fn tilde_without_home_is_error() {
        let mut env = MockEnvironment::new();
        env.expect_var().returning(|_| None);
        env.expect_home_dir().returning(|| None);
        let err = expand(&components(&["~", "x"]), &Variables::default(), &env).unwrap_err();
        assert!(matches!(err, PathResolutionError::NoHomeDirectory { .. }));
    }

    #[test]
    fn relative_template_is_anchored_to_current_dir() {
        let env = home_env();
        let path = expand(&components(&["build", "out"]), &Variables::default(), &env).unwrap();
        assert_eq!(path, PathBuf::from("/work/build/out"));
    }

    #[test]
    fn current_dir_failure_is_error() {
        let mut env = MockEnvironment::new();
        env.expect_var().returning(|_| None);
        env.expect_current_dir()
            .returning(|| Err(io::Error::from(io::ErrorKind::NotFound)));
        let err = expand(&components(&["rel"]), &Variables::default(), &env).unwrap_err();
        assert!(matches!(err, PathResolutionError::CurrentDir(_)));
    }

    #[test]
    fn dot_and_dotdot_are_normalized() {
        let env = home_env();
        let path = expand(
            &components(&["$HOME", ".", "a", "..", "b"]),
            &Variables::default(),
            &env,
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/home/u/b"));
    }

    // -----------------------------------------------------------------------
    // normalize
    // -----------------------------------------------------------------------

    #[test]
    fn normalize_stops_at_root() {
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
    }

    #[test]
    fn normalize_keeps_plain_path() {
        assert_eq!(normalize(Path::new("/a/b/c")), PathBuf::from("/a/b/c"));
    }
}

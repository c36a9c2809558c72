use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Environment variables exported by the snap runtime that become
/// path-template tokens, keyed by their lowercased name.
pub const SNAP_ENV: [&str; 11] = [
    "SNAP_NAME",
    "SNAP_VERSION",
    "SNAP_REVISION",
    "SNAP_ARCH",
    "SNAP_LIBRARY_PATH",
    "SNAP",
    "SNAP_DATA",
    "SNAP_COMMON",
    "SNAP_USER_DATA",
    "SNAP_USER_COMMON",
    "TMPDIR",
];

/// Runtime identity values available to path templates and config templates.
///
/// Built once per invocation. Tokens whose variable is unset are simply
/// absent, so templates referring to them are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SnapContext {
    vars: BTreeMap<String, String>,
}

impl SnapContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the [`SNAP_ENV`] variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let vars = SNAP_ENV
            .iter()
            .filter_map(|key| lookup(key).map(|value| (key.to_lowercase(), value)))
            .collect();
        Self { vars }
    }

    #[must_use]
    pub fn with(mut self, token: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(token, value);
        self
    }

    pub fn insert(&mut self, token: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(token.into(), value.into());
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.vars.get(token).map(String::as_str)
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// The read-only install root (`{snap}`).
    pub fn install_root(&self) -> Option<&Path> {
        self.get("snap").map(Path::new)
    }

    /// The mutable data root shared across revisions (`{snap_common}`).
    pub fn common_root(&self) -> Option<&Path> {
        self.get("snap_common").map(Path::new)
    }

    /// Every mutable data root known to this context: `{snap_common}` and
    /// the per-revision `{snap_data}`.
    pub fn data_roots(&self) -> Vec<&Path> {
        ["snap_common", "snap_data"]
            .iter()
            .filter_map(|token| self.get(token))
            .filter(|value| !value.is_empty())
            .map(Path::new)
            .collect()
    }

    /// Replace every `{token}` present in this context with its value.
    ///
    /// Tokens not present in the context, and braces that do not enclose a
    /// token name, are copied through verbatim.
    pub fn resolve(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if is_token(&after[..close]) => {
                    let token = &after[..close];
                    match self.vars.get(token) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push('{');
                            out.push_str(token);
                            out.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

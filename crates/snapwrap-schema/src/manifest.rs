use crate::types::{EntryPointName, PathTemplate};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File names probed, in order, when looking for a manifest in the install root.
pub const MANIFEST_CANDIDATES: [&str; 4] = [
    "snapwrap.yaml",
    "snapwrap.yml",
    "snapwrap.json",
    "snapwrap.toml",
];

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no manifest found in {0}")]
    NotFound(PathBuf),
    #[error("failed to parse manifest: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("failed to parse manifest: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("failed to parse manifest: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("manifest is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("unsupported manifest format: '{0}', expected .yaml, .yml, .json or .toml")]
    UnsupportedFormat(String),
    #[error("manifest declares no entry points")]
    NoEntryPoints,
    #[error("invalid entry point name '{0}': must be non-empty and contain no path separators")]
    InvalidEntryPointName(String),
    #[error("entry point '{0}' does not declare a binary")]
    MissingBinary(String),
    #[error("invalid setup user '{0}', expected '<user>:<group>'")]
    InvalidUser(String),
}

/// Structured-data encodings a manifest may be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Yaml,
    Json,
    Toml,
}

impl ManifestFormat {
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            _ => Err(ManifestError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Root of the declarative manifest: optional one-time setup plus the named
/// entry points the wrapper exposes.
///
/// Only constructed through [`decode`], [`decode_as`] or
/// [`parse_manifest_file`], all of which validate before returning.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Manifest {
    #[serde(default)]
    pub setup: Option<SetupSpec>,
    #[serde(
        default,
        alias = "entry_points",
        deserialize_with = "crate::unique::deserialize"
    )]
    pub entry_points: IndexMap<EntryPointName, EntryPoint>,
}

/// Environment preparation performed before any entry point launches.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SetupSpec {
    /// Account that owns everything setup creates, and that the launched
    /// process runs as.
    #[serde(default)]
    pub user: Option<Account>,
    #[serde(default)]
    pub dirs: Vec<PathTemplate>,
    /// Link target → link path.
    #[serde(default, deserialize_with = "crate::unique::deserialize")]
    pub symlinks: IndexMap<PathTemplate, PathTemplate>,
    /// Source template name → destination path.
    #[serde(default, deserialize_with = "crate::unique::deserialize")]
    pub templates: IndexMap<String, PathTemplate>,
    /// Source directory → destination directory.
    #[serde(default, deserialize_with = "crate::unique::deserialize")]
    pub copyfiles: IndexMap<PathTemplate, PathTemplate>,
}

impl SetupSpec {
    pub fn is_empty(&self) -> bool {
        self.user.is_none()
            && self.dirs.is_empty()
            && self.symlinks.is_empty()
            && self.templates.is_empty()
            && self.copyfiles.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryPointKind {
    /// Run `binary` with `--config-file`/`--config-dir`/`--log-file` flags.
    #[default]
    Simple,
    /// Run a uWSGI emperor over `uwsgi-dir`.
    Uwsgi,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct EntryPoint {
    #[serde(default, rename = "type")]
    pub kind: EntryPointKind,
    #[serde(default)]
    pub binary: Option<String>,
    #[serde(default, alias = "config_files")]
    pub config_files: Vec<PathTemplate>,
    #[serde(default, alias = "config_dirs")]
    pub config_dirs: Vec<PathTemplate>,
    #[serde(default, alias = "log_file")]
    pub log_file: Option<PathTemplate>,
    #[serde(default, alias = "uwsgi_dir")]
    pub uwsgi_dir: Option<PathTemplate>,
    /// Locate the binary on the standard search path instead of under the
    /// install root.
    #[serde(default)]
    pub classic: bool,
}

impl EntryPoint {
    pub const UWSGI_BINARY: &'static str = "uwsgi";

    /// The executable to launch. uWSGI entry points default to `uwsgi`.
    pub fn binary(&self) -> &str {
        match (&self.binary, self.kind) {
            (Some(binary), _) => binary,
            (None, EntryPointKind::Uwsgi) => Self::UWSGI_BINARY,
            (None, EntryPointKind::Simple) => "",
        }
    }
}

/// A `user:group` pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Account {
    pub user: String,
    pub group: String,
}

impl TryFrom<String> for Account {
    type Error = ManifestError;

    fn try_from(spec: String) -> Result<Self, Self::Error> {
        match spec.split_once(':') {
            Some((user, group))
                if !user.trim().is_empty()
                    && !group.trim().is_empty()
                    && !group.contains(':') =>
            {
                Ok(Self {
                    user: user.trim().to_owned(),
                    group: group.trim().to_owned(),
                })
            }
            _ => Err(ManifestError::InvalidUser(spec)),
        }
    }
}

impl From<Account> for String {
    fn from(account: Account) -> Self {
        account.to_string()
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user, self.group)
    }
}

impl Manifest {
    /// Shape checks serde cannot express.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.entry_points.is_empty() {
            return Err(ManifestError::NoEntryPoints);
        }
        for (name, entry) in &self.entry_points {
            if !name.is_valid() {
                return Err(ManifestError::InvalidEntryPointName(name.to_string()));
            }
            if entry.binary().trim().is_empty() {
                return Err(ManifestError::MissingBinary(name.to_string()));
            }
        }
        Ok(())
    }

    pub fn entry_point(&self, name: &str) -> Option<&EntryPoint> {
        self.entry_points.get(name)
    }
}

/// Decode a YAML manifest (JSON documents are accepted too, being valid YAML).
pub fn decode(bytes: &[u8]) -> Result<Manifest, ManifestError> {
    decode_as(bytes, ManifestFormat::Yaml)
}

pub fn decode_as(bytes: &[u8], format: ManifestFormat) -> Result<Manifest, ManifestError> {
    let manifest: Manifest = match format {
        ManifestFormat::Yaml => serde_yaml::from_slice(bytes)?,
        ManifestFormat::Json => serde_json::from_slice(bytes)?,
        ManifestFormat::Toml => toml::from_str(std::str::from_utf8(bytes)?)?,
    };
    manifest.validate()?;
    Ok(manifest)
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<Manifest, ManifestError> {
    let path = path.as_ref();
    let format = ManifestFormat::from_path(path)?;
    let bytes = fs::read(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_as(&bytes, format)
}

/// Return the first of [`MANIFEST_CANDIDATES`] that exists in `dir`.
pub fn find_manifest(dir: &Path) -> Result<PathBuf, ManifestError> {
    MANIFEST_CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| ManifestError::NotFound(dir.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOVA: &str = r#"
setup:
  user: "nova:nova"
  dirs:
    - "{snap_common}/etc/nova.conf.d"
    - "{snap_common}/logs"
  symlinks:
    "{snap}/etc/nova/api-paste.ini": "{snap_common}/etc/nova/api-paste.ini"
  templates:
    nova-snap.conf.j2: "{snap_common}/etc/nova.conf.d/nova-snap.conf"
    db.conf.j2: "{snap_common}/etc/nova.conf.d/database.conf"
  copyfiles:
    "{snap}/etc/nova/rootwrap.d": "{snap_common}/etc/nova/rootwrap.d"
entry-points:
  nova-manage:
    binary: nova-manage
    config-files:
      - "{snap}/etc/nova/nova.conf"
      - "{snap_common}/etc/nova/nova.conf"
    config-dirs:
      - "{snap_common}/etc/nova.conf.d"
    log-file: "{snap_common}/logs/nova-manage.log"
  nova-uwsgi:
    type: uwsgi
    uwsgi-dir: "{snap_common}/etc/uwsgi"
    log-file: "{snap_common}/logs/nova-api.log"
"#;

    #[test]
    fn parses_full_manifest() {
        let manifest = decode(NOVA.as_bytes()).expect("should parse");
        let setup = manifest.setup.as_ref().unwrap();
        assert_eq!(
            setup.user,
            Some(Account {
                user: "nova".to_owned(),
                group: "nova".to_owned()
            })
        );
        assert_eq!(setup.dirs.len(), 2);
        assert_eq!(setup.symlinks.len(), 1);
        assert_eq!(setup.copyfiles.len(), 1);

        let ep = manifest.entry_point("nova-manage").unwrap();
        assert_eq!(ep.kind, EntryPointKind::Simple);
        assert_eq!(ep.binary(), "nova-manage");
        assert_eq!(ep.config_files.len(), 2);
        assert_eq!(ep.config_files[0], "{snap}/etc/nova/nova.conf");
        assert_eq!(ep.config_dirs[0], "{snap_common}/etc/nova.conf.d");
        assert!(!ep.classic);

        let uwsgi = manifest.entry_point("nova-uwsgi").unwrap();
        assert_eq!(uwsgi.kind, EntryPointKind::Uwsgi);
        assert_eq!(uwsgi.binary(), "uwsgi");
    }

    #[test]
    fn preserves_declaration_order() {
        let manifest = decode(NOVA.as_bytes()).unwrap();
        let names: Vec<&str> = manifest.entry_points.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, ["nova-manage", "nova-uwsgi"]);
        let setup = manifest.setup.unwrap();
        let templates: Vec<&str> = setup.templates.keys().map(String::as_str).collect();
        assert_eq!(templates, ["nova-snap.conf.j2", "db.conf.j2"]);
    }

    #[test]
    fn accepts_snake_case_keys() {
        let input = r"
entry_points:
  keystone-manage:
    binary: keystone-manage
    config_files: [/etc/keystone.conf]
    config_dirs: [/etc/keystone.conf.d]
    log_file: /var/log/keystone.log
    classic: true
";
        let manifest = decode(input.as_bytes()).unwrap();
        let ep = manifest.entry_point("keystone-manage").unwrap();
        assert_eq!(ep.config_files[0], "/etc/keystone.conf");
        assert_eq!(ep.log_file.as_ref().unwrap(), "/var/log/keystone.log");
        assert!(ep.classic);
    }

    #[test]
    fn setup_is_optional() {
        let manifest = decode(b"entry-points:\n  a:\n    binary: a\n").unwrap();
        assert!(manifest.setup.is_none());
    }

    #[test]
    fn rejects_missing_entry_points() {
        let err = decode(b"setup:\n  dirs: [/tmp/x]\n").unwrap_err();
        assert!(matches!(err, ManifestError::NoEntryPoints));
    }

    #[test]
    fn rejects_empty_entry_points() {
        let err = decode(b"entry-points: {}\n").unwrap_err();
        assert!(matches!(err, ManifestError::NoEntryPoints));
    }

    #[test]
    fn rejects_missing_binary() {
        let err = decode(b"entry-points:\n  nova-api:\n    config-files: [/a]\n").unwrap_err();
        assert!(matches!(err, ManifestError::MissingBinary(ref n) if n == "nova-api"));
    }

    #[test]
    fn rejects_blank_binary() {
        let err = decode(b"entry-points:\n  nova-api:\n    binary: '  '\n").unwrap_err();
        assert!(matches!(err, ManifestError::MissingBinary(_)));
    }

    #[test]
    fn rejects_entry_point_name_with_separator() {
        let err = decode(b"entry-points:\n  bin/nova:\n    binary: nova\n").unwrap_err();
        assert!(matches!(err, ManifestError::InvalidEntryPointName(_)));
    }

    #[test]
    fn rejects_unknown_fields() {
        let input = "entry-points:\n  a:\n    binary: a\n    config-file: /typo\n";
        assert!(matches!(
            decode(input.as_bytes()),
            Err(ManifestError::ParseYaml(_))
        ));
    }

    #[test]
    fn rejects_duplicate_entry_points() {
        let input = "entry-points:\n  a:\n    binary: one\n  a:\n    binary: two\n";
        let err = decode(input.as_bytes()).unwrap_err();
        assert!(matches!(err, ManifestError::ParseYaml(_)));
        assert!(err.to_string().contains("duplicate key 'a'"), "{err}");

        let json = r#"{"entry-points": {"a": {"binary": "one"}, "a": {"binary": "two"}}}"#;
        let err = decode_as(json.as_bytes(), ManifestFormat::Json).unwrap_err();
        assert!(err.to_string().contains("duplicate key 'a'"), "{err}");
    }

    #[test]
    fn rejects_duplicate_setup_keys() {
        let input = r#"
setup:
  templates:
    nova.conf.j2: "{snap_common}/etc/a.conf"
    nova.conf.j2: "{snap_common}/etc/b.conf"
entry-points:
  a:
    binary: a
"#;
        let err = decode(input.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("duplicate key 'nova.conf.j2'"), "{err}");

        let input = r#"
setup:
  copyfiles:
    "{snap}/etc/x": "{snap_common}/x"
    "{snap}/etc/x": "{snap_common}/y"
entry-points:
  a:
    binary: a
"#;
        assert!(decode(input.as_bytes()).is_err());
    }

    #[test]
    fn rejects_unknown_entry_point_type() {
        let input = "entry-points:\n  a:\n    type: wsgi\n    binary: a\n";
        assert!(decode(input.as_bytes()).is_err());
    }

    #[test]
    fn rejects_malformed_user() {
        let input = "setup:\n  user: nova\nentry-points:\n  a:\n    binary: a\n";
        assert!(decode(input.as_bytes()).is_err());
    }

    #[test]
    fn rejects_malformed_document() {
        assert!(decode(b"entry-points: [unterminated").is_err());
        assert!(decode(b"- just\n- a list\n").is_err());
    }

    #[test]
    fn decodes_json() {
        let input = r#"{"entry-points": {"glance-api": {"binary": "glance-api", "config-files": ["{snap}/etc/glance.conf"]}}}"#;
        let manifest = decode_as(input.as_bytes(), ManifestFormat::Json).unwrap();
        assert_eq!(
            manifest.entry_point("glance-api").unwrap().config_files[0],
            "{snap}/etc/glance.conf"
        );
        // JSON is also valid YAML.
        assert_eq!(decode(input.as_bytes()).unwrap(), manifest);
    }

    #[test]
    fn decodes_toml() {
        let input = r#"
[setup]
dirs = ["{snap_common}/logs"]

[entry-points.neutron-server]
binary = "neutron-server"
config-dirs = ["{snap_common}/etc/neutron.conf.d"]
"#;
        let manifest = decode_as(input.as_bytes(), ManifestFormat::Toml).unwrap();
        assert_eq!(manifest.setup.as_ref().unwrap().dirs[0], "{snap_common}/logs");
        assert_eq!(
            manifest.entry_point("neutron-server").unwrap().config_dirs.len(),
            1
        );
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(
            ManifestFormat::from_path(Path::new("a/snapwrap.YML")).unwrap(),
            ManifestFormat::Yaml
        );
        assert_eq!(
            ManifestFormat::from_path(Path::new("snapwrap.json")).unwrap(),
            ManifestFormat::Json
        );
        assert!(ManifestFormat::from_path(Path::new("snapwrap.ini")).is_err());
        assert!(ManifestFormat::from_path(Path::new("snapwrap")).is_err());
    }

    #[test]
    fn parse_file_and_find_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            find_manifest(dir.path()),
            Err(ManifestError::NotFound(_))
        ));

        let path = dir.path().join("snapwrap.yaml");
        std::fs::write(&path, NOVA).unwrap();
        assert_eq!(find_manifest(dir.path()).unwrap(), path);
        let manifest = parse_manifest_file(&path).unwrap();
        assert_eq!(manifest.entry_points.len(), 2);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = parse_manifest_file("/nonexistent/snapwrap.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/snapwrap.yaml"));
    }

    #[test]
    fn account_roundtrip() {
        let account = Account::try_from("nova:nova".to_owned()).unwrap();
        assert_eq!(account.to_string(), "nova:nova");
        assert!(Account::try_from(":nova".to_owned()).is_err());
        assert!(Account::try_from("a:b:c".to_owned()).is_err());
    }
}

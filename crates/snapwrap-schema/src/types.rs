//! Newtype wrappers for manifest strings, providing compile-time type safety.
//!
//! All newtypes serialize/deserialize as plain strings so manifests stay
//! ordinary YAML/JSON/TOML documents.

use crate::context::SnapContext;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::path::PathBuf;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Name under which an entry point is exposed on the wrapper command line.
    EntryPointName
);

string_newtype!(
    /// A path containing zero or more `{token}` placeholders, resolved
    /// against a [`SnapContext`] at invocation time.
    PathTemplate
);

impl EntryPointName {
    /// A usable name is non-empty and contains no path separators or NULs.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && !self.0.contains(['/', '\\', '\0'])
    }
}

impl PathTemplate {
    /// Substitute every known token; unknown tokens stay verbatim.
    pub fn resolve(&self, context: &SnapContext) -> String {
        context.resolve(&self.0)
    }

    pub fn resolve_path(&self, context: &SnapContext) -> PathBuf {
        PathBuf::from(self.resolve(context))
    }
}

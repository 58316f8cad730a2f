// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UUID-backed identifier newtypes.

/// Define a `Copy` newtype around [`uuid::Uuid`].
///
/// Generates `new()` (random v4), `parse()`, `as_uuid()`, `short()`,
/// `Display`, `FromStr` and `From<Uuid>`. Serializes as the plain
/// hyphenated UUID string.
///
/// ```ignore
/// define_id! {
///     /// Doc comment for the ID type.
///     pub struct JobId;
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $crate::uuid::Uuid);

        impl $name {
            /// Generate a new random ID
            pub fn new() -> Self {
                Self($crate::uuid::Uuid::new_v4())
            }

            pub fn parse(s: &str) -> Result<Self, $crate::uuid::Error> {
                $crate::uuid::Uuid::parse_str(s).map(Self)
            }

            pub fn as_uuid(&self) -> &$crate::uuid::Uuid {
                &self.0
            }

            /// First `n` characters of the hyphenated form, for log lines.
            pub fn short(&self, n: usize) -> String {
                self.0.to_string().chars().take(n).collect()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<$crate::uuid::Uuid> for $name {
            fn from(id: $crate::uuid::Uuid) -> Self {
                Self(id)
            }
        }
    };
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;

//! Permission flags attached to tools.

use serde::{Deserialize, Serialize};

/// Four independent, descriptive permission flags.
///
/// The flags label what a tool does so callers can filter toolkits. Nothing
/// in this workspace enforces them.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct Permissions {
    /// Tool reads state.
    pub read: bool,
    /// Tool modifies state.
    pub write: bool,
    /// Tool executes code.
    pub execute: bool,
    /// Tool deletes state.
    pub delete: bool,
}

impl Permissions {
    /// No flags set.
    pub const NONE: Self = Self::new(false, false, false, false);

    /// Every flag set.
    pub const ALL: Self = Self::new(true, true, true, true);

    /// Builds a flag set from the four booleans, in `read, write, execute,
    /// delete` order.
    #[must_use]
    #[allow(clippy::fn_params_excessive_bools)]
    pub const fn new(read: bool, write: bool, execute: bool, delete: bool) -> Self {
        Self {
            read,
            write,
            execute,
            delete,
        }
    }

    /// Returns a copy with `read` set.
    #[must_use]
    pub const fn with_read(mut self) -> Self {
        self.read = true;
        self
    }

    /// Returns a copy with `write` set.
    #[must_use]
    pub const fn with_write(mut self) -> Self {
        self.write = true;
        self
    }

    /// Returns a copy with `execute` set.
    #[must_use]
    pub const fn with_execute(mut self) -> Self {
        self.execute = true;
        self
    }

    /// Returns a copy with `delete` set.
    #[must_use]
    pub const fn with_delete(mut self) -> Self {
        self.delete = true;
        self
    }

    /// Returns `true` when all four flags equal the query's flags.
    ///
    /// This is an equality test, not a capability subset test: a query for
    /// `read` alone does not match a tool flagged `read` and `write`.
    #[must_use]
    pub const fn matches_exactly(self, query: Self) -> bool {
        self.read == query.read
            && self.write == query.write
            && self.execute == query.execute
            && self.delete == query.delete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_set_single_flags() {
        let flags = Permissions::NONE.with_read().with_delete();
        assert_eq!(flags, Permissions::new(true, false, false, true));
        assert_eq!(Permissions::default(), Permissions::NONE);
    }

    #[test]
    fn exact_match_is_equality() {
        let read_write = Permissions::NONE.with_read().with_write();
        assert!(read_write.matches_exactly(read_write));
        assert!(!read_write.matches_exactly(Permissions::NONE.with_read()));
        assert!(!Permissions::ALL.matches_exactly(Permissions::NONE));
    }

    #[test]
    fn missing_flags_deserialize_false() {
        let flags: Permissions = serde_json::from_str(r#"{"execute": true}"#).expect("parse");
        assert_eq!(flags, Permissions::NONE.with_execute());
    }
}

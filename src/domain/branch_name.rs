//! Branch name validation

use crate::error::{Error, Result};

/// Name of the branch created implicitly with every repository
pub const DEFAULT_BRANCH: &str = "main";

/// Pattern matching names that are not acceptable as branch names
const INVALID_BRANCH_NAME_REGEX: &str =
    r"^\.|\/\.|\.\.|^\/|\/$|\.lock$|@\{|[\x00-\x20\*:\?\[\\~\^\x7f]";

/// Validated branch name
///
/// Hierarchical names (`feature/login`) are allowed; names that would be
/// ambiguous or unsafe as ref paths are rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct BranchName(String);

impl BranchName {
    pub fn try_parse(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Validation("branch name cannot be empty".to_string()));
        }

        let re = regex::Regex::new(INVALID_BRANCH_NAME_REGEX)
            .expect("invalid branch name pattern is a constant");

        if re.is_match(&name) {
            return Err(Error::Validation(format!("invalid branch name: {}", name)));
        }
        Ok(Self(name))
    }

    pub fn default_branch() -> Self {
        Self(DEFAULT_BRANCH.to_string())
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::proptest;

    proptest! {
        #[test]
        fn accepts_plain_names(name in "[a-zA-Z0-9_-]+") {
            assert!(BranchName::try_parse(name).is_ok());
        }

        #[test]
        fn accepts_hierarchical_names(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+"
        ) {
            assert!(BranchName::try_parse(format!("{}/{}", prefix, suffix)).is_ok());
        }

        #[test]
        fn rejects_leading_dot(suffix in "[a-zA-Z0-9_-]+") {
            assert!(BranchName::try_parse(format!(".{}", suffix)).is_err());
        }

        #[test]
        fn rejects_lock_suffix(prefix in "[a-zA-Z0-9_-]+") {
            assert!(BranchName::try_parse(format!("{}.lock", prefix)).is_err());
        }

        #[test]
        fn rejects_consecutive_dots(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+"
        ) {
            assert!(BranchName::try_parse(format!("{}..{}", prefix, suffix)).is_err());
        }

        #[test]
        fn rejects_special_characters(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+",
            special in r"[\*:\?\[\\^~]"
        ) {
            assert!(BranchName::try_parse(format!("{}{}{}", prefix, special, suffix)).is_err());
        }
    }

    #[test]
    fn rejects_empty_name() {
        assert!(BranchName::try_parse("").is_err());
    }

    #[test]
    fn default_branch_is_main() {
        assert_eq!(BranchName::default_branch().as_ref(), DEFAULT_BRANCH);
    }
}

//! # Utility Functions Module
//!
//! Helpers for building external decoder command lines.

use std::ffi::OsString;
use std::path::Path;

/// One command-line argument: a literal flag or a filesystem path
#[derive(Debug, Clone, Copy)]
pub enum ToolArg<'a> {
    Flag(&'a str),
    Path(&'a Path),
}

/// Builds an argument vector for an external tool, keeping non-UTF-8 paths
/// intact.
///
/// ```rust,ignore
/// let args = tool_args([ToolArg::Path(input), ToolArg::Flag("-alpha"), ToolArg::Flag("remove")]);
/// ```
pub fn tool_args<'a, I>(parts: I) -> Vec<OsString>
where
    I: IntoIterator<Item = ToolArg<'a>>,
{
    parts
        .into_iter()
        .map(|part| match part {
            ToolArg::Flag(flag) => OsString::from(flag),
            ToolArg::Path(path) => path.as_os_str().to_os_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_args_keeps_order() {
        let input = Path::new("/in/a.cr2");
        let result = tool_args([ToolArg::Path(input), ToolArg::Flag("-alpha"), ToolArg::Flag("remove")]);
        assert_eq!(
            result,
            vec![OsString::from("/in/a.cr2"), OsString::from("-alpha"), OsString::from("remove")]
        );
    }

    #[test]
    fn test_tool_args_empty() {
        assert!(tool_args(Vec::<ToolArg>::new()).is_empty());
    }
}

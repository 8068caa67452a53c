//! # Utility Functions Module
//!
//! Small helpers for building external command lines.

use std::ffi::{OsStr, OsString};

/// Converts an iterable of string-like or path-like items to `Vec<OsString>`.
///
/// Paths are passed through untouched, so file names that are not valid
/// UTF-8 still reach ffmpeg intact.
///
/// # Example
/// ```rust,ignore
/// let args = to_os_string_vec(["-i".as_ref(), input.as_os_str(), "-y".as_ref()]);
/// ```
pub fn to_os_string_vec<'a, I>(items: I) -> Vec<OsString>
where
    I: IntoIterator<Item = &'a OsStr>,
{
    items.into_iter().map(OsStr::to_os_string).collect()
}

/// Macro for building argument vectors out of mixed `&str`, `String` and `&Path`.
///
/// # Example
/// ```rust,ignore
/// let threads = 8;
/// let args = args!["-threads", threads.to_string(), "-i", input_path];
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        $crate::utils::to_os_string_vec([$(::std::convert::AsRef::<::std::ffi::OsStr>::as_ref(&$item)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_to_os_string_vec() {
        let result = to_os_string_vec([OsStr::new("hello"), OsStr::new("world")]);
        assert_eq!(result, vec![OsString::from("hello"), OsString::from("world")]);
    }

    #[test]
    fn test_to_os_string_vec_empty() {
        let result = to_os_string_vec(Vec::<&OsStr>::new());
        assert!(result.is_empty());
    }

    #[test]
    fn test_args_macro_mixed() {
        let threads = 8;
        let input = Path::new("/tmp/in put.mov");
        let result = crate::args!["-threads", threads.to_string(), "-i", input];
        assert_eq!(
            result,
            vec![
                OsString::from("-threads"),
                OsString::from("8"),
                OsString::from("-i"),
                OsString::from("/tmp/in put.mov"),
            ]
        );
    }
}

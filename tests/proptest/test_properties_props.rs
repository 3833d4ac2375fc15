//! Property-based tests for the property file parser

use propctl::PropertyFile;
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_parse_doesnt_panic(s in "\\PC*") {
        let _ = PropertyFile::parse(&s);
    }

    #[test]
    fn test_parse_handles_escape_soup(s in r"([a-z=:#! \\tnrfu0-9]|\\\\){0,64}") {
        // Backslash-heavy input exercises the escape decoder and the
        // continuation joiner; none of it may panic.
        let _ = PropertyFile::parse(&s);
    }

    #[test]
    fn test_render_parse_render_is_stable(s in "\\PC{0,200}") {
        // One parse/render pass normalizes separators; after that the
        // representation must be a fixed point.
        let once = PropertyFile::parse(&s).to_string();
        let twice = PropertyFile::parse(&once).to_string();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn test_set_get_agree(
        key in "[a-z][a-z0-9._]{0,20}",
        value in "[ -~]{0,40}",
    ) {
        let mut file = PropertyFile::new();
        file.set(&key, &value);
        prop_assert_eq!(file.get(&key), Some(value.as_str()));

        let rendered = file.to_string();
        let reparsed = PropertyFile::parse(&rendered);
        prop_assert_eq!(reparsed.get(&key), Some(value.as_str()));
    }
}

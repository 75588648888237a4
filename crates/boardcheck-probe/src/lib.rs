/// The page-side probe. Backends evaluate this string in every document
/// before issuing queries; it installs `window.__boardcheck`.
pub const PROBE_JS: &str = include_str!("probe.js");

/// Name of the attribute the probe stores element handles in.
pub const HANDLE_ATTR: &str = "data-boardcheck-handle";

/// Expression that is true once the probe is installed.
pub const PROBE_LOADED_CHECK: &str =
    "typeof window.__boardcheck !== 'undefined' && window.__boardcheck.version === 1";

/// CSS selector addressing the element with `handle`.
pub fn handle_selector(handle: u32) -> String {
    format!("[{}=\"{}\"]", HANDLE_ATTR, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::const_is_empty)]
    fn it_works() {
        assert!(!PROBE_JS.is_empty());
        assert!(PROBE_JS.contains("window.__boardcheck"));
        assert!(PROBE_JS.contains(HANDLE_ATTR));
    }

    #[test]
    fn test_probe_knows_every_selector_kind() {
        for kind in ["'css'", "'css_text'", "'text'", "'own_text'"] {
            assert!(PROBE_JS.contains(kind), "probe does not handle {kind}");
        }
    }

    #[test]
    fn test_handle_selector() {
        assert_eq!(handle_selector(12), "[data-boardcheck-handle=\"12\"]");
    }
}

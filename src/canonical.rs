use url::Url;

/// Strips the query string and fragment from an absolute job URL.
///
/// Anything that is not an absolute URL with both a scheme and a host is
/// returned untouched; malformed input is treated as already canonical.
pub fn canonicalize(url: &str) -> String {
    let trimmed = url.trim();
    match Url::parse(trimmed) {
        Ok(parsed) if parsed.has_host() && !parsed.host_str().unwrap_or("").is_empty() => {
            let end = trimmed.find(['?', '#']).unwrap_or(trimmed.len());
            trimmed[..end].to_string()
        }
        _ => url.to_string(),
    }
}

/// Stable listing id: lowercase hex MD5 of the canonical URL bytes.
pub fn derive_id(canonical_url: &str) -> String {
    format!("{:x}", md5::compute(canonical_url.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_strips_query_and_fragment() {
        assert_eq!(
            canonicalize("https://www.linkedin.com/jobs/view/123?refId=abc&trackingId=xyz"),
            "https://www.linkedin.com/jobs/view/123"
        );
        assert_eq!(
            canonicalize("https://www.linkedin.com/jobs/view/123#top"),
            "https://www.linkedin.com/jobs/view/123"
        );
        assert_eq!(
            canonicalize("https://example.com/job?id=123#section"),
            "https://example.com/job"
        );
    }

    #[test]
    fn test_canonicalize_leaves_clean_urls_alone() {
        let url = "https://jobs.example.com/posting/12345";
        assert_eq!(canonicalize(url), url);
    }

    #[test]
    fn test_canonicalize_passes_through_non_absolute_input() {
        assert_eq!(canonicalize("/jobs/view/123?x=1"), "/jobs/view/123?x=1");
        assert_eq!(canonicalize("not a url"), "not a url");
        assert_eq!(canonicalize(""), "");
        assert_eq!(canonicalize("mailto:jobs@example.com?subject=hi"), "mailto:jobs@example.com?subject=hi");
    }

    #[test]
    fn test_variants_collapse_to_same_id() {
        let a = canonicalize("https://www.linkedin.com/jobs/view/123?refId=1");
        let b = canonicalize("https://www.linkedin.com/jobs/view/123?refId=2#apply");
        assert_eq!(a, b);
        assert_eq!(derive_id(&a), derive_id(&b));
    }

    #[test]
    fn test_derive_id_is_md5_hex() {
        assert_eq!(
            derive_id("https://www.linkedin.com/jobs/view/123"),
            "7f48f612522680bc9c98a5145973bc10"
        );
        assert_eq!(
            derive_id("https://example.com/jobs/1"),
            "c3b98c04e3882235c75c05617c5725ee"
        );
        let id = derive_id("");
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

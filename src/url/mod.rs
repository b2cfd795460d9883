//! URL canonicalization
//!
//! Identity URLs observed on listing pages arrive in many spellings of
//! the same resource. Before an observed reference is used as an identity
//! key, it is rewritten to one canonical form; references that cannot be
//! canonicalized are excluded from reconciliation entirely.

use url::{Host, Url};

/// Canonicalizes a raw URL into its identity form
///
/// Pure and deterministic. Returns `None` for references that must be
/// excluded from reconciliation:
/// - non-HTTP(S) schemes (`mailto:`, `javascript:`, `ftp:`, ...)
/// - relative or otherwise unparseable URLs
/// - URLs without a registrable domain host (IP literals, `localhost`,
///   single-label intranet names)
///
/// # Canonical form
///
/// - host lowercased, `www.` prefix removed
/// - default port, query string and fragment stripped
/// - trailing slash removed (except for the root path)
///
/// # Examples
///
/// ```
/// use skimmer::canonicalize;
///
/// assert_eq!(
///     canonicalize("HTTPS://WWW.Example.COM/repo/?tab=readme#top"),
///     Some("https://example.com/repo".to_string())
/// );
/// assert_eq!(canonicalize("mailto:admin@example.com"), None);
/// assert_eq!(canonicalize("https://192.168.0.1/repo"), None);
/// ```
pub fn canonicalize(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    let host = match url.host()? {
        Host::Domain(d) => d.to_lowercase(),
        // IP literals have no stable identity across hosts
        Host::Ipv4(_) | Host::Ipv6(_) => return None,
    };

    if !is_public_host(&host) {
        return None;
    }

    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host)).ok()?;

    // Dropping the port fails for non-special schemes only; http(s) is fine
    url.set_port(None).ok()?;
    url.set_query(None);
    url.set_fragment(None);

    let path = url.path().trim_end_matches('/').to_string();
    if path.is_empty() {
        url.set_path("/");
    } else {
        url.set_path(&path);
    }

    Some(url.to_string())
}

/// Whether a host looks like a public registrable domain
///
/// Single-label hosts (`localhost`, bare intranet names) are ambiguous
/// outside their own network and are excluded.
fn is_public_host(host: &str) -> bool {
    host.contains('.') && !host.ends_with(".local") && host != "localhost"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_url_passes_through() {
        assert_eq!(
            canonicalize("https://example.com/repo"),
            Some("https://example.com/repo".to_string())
        );
    }

    #[test]
    fn test_host_is_lowercased() {
        assert_eq!(
            canonicalize("https://EXAMPLE.com/Repo"),
            Some("https://example.com/Repo".to_string())
        );
    }

    #[test]
    fn test_www_prefix_removed() {
        assert_eq!(
            canonicalize("https://www.example.com/repo"),
            Some("https://example.com/repo".to_string())
        );
    }

    #[test]
    fn test_query_and_fragment_stripped() {
        assert_eq!(
            canonicalize("https://example.com/repo?tab=readme&ref=home#install"),
            Some("https://example.com/repo".to_string())
        );
    }

    #[test]
    fn test_trailing_slash_removed() {
        assert_eq!(
            canonicalize("https://example.com/repo/"),
            Some("https://example.com/repo".to_string())
        );
    }

    #[test]
    fn test_root_path_keeps_slash() {
        assert_eq!(
            canonicalize("https://example.com/"),
            Some("https://example.com/".to_string())
        );
    }

    #[test]
    fn test_default_port_stripped() {
        assert_eq!(
            canonicalize("https://example.com:443/repo"),
            Some("https://example.com/repo".to_string())
        );
    }

    #[test]
    fn test_non_http_scheme_excluded() {
        assert_eq!(canonicalize("mailto:admin@example.com"), None);
        assert_eq!(canonicalize("javascript:void(0)"), None);
        assert_eq!(canonicalize("ftp://example.com/file"), None);
    }

    #[test]
    fn test_relative_url_excluded() {
        assert_eq!(canonicalize("/repo/thing"), None);
        assert_eq!(canonicalize("repo"), None);
    }

    #[test]
    fn test_private_hosts_excluded() {
        assert_eq!(canonicalize("http://localhost/repo"), None);
        assert_eq!(canonicalize("http://127.0.0.1/repo"), None);
        assert_eq!(canonicalize("http://intranet/repo"), None);
        assert_eq!(canonicalize("http://nas.local/repo"), None);
    }

    #[test]
    fn test_deterministic() {
        let a = canonicalize("https://WWW.Example.com/repo/?x=1");
        let b = canonicalize("https://WWW.Example.com/repo/?x=1");
        assert_eq!(a, b);
    }
}

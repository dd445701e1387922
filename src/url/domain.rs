use url::Url;

/// Reduces a host to the form used for same-site comparison
///
/// Lowercases and drops a leading `www.`, so `www.example.com` and
/// `example.com` are treated as one site.
pub fn site_host(host: &str) -> String {
    let host = host.to_lowercase();
    match host.strip_prefix("www.") {
        Some(stripped) => stripped.to_string(),
        None => host,
    }
}

/// Returns true if `url` is hosted on `site` (a host already passed through [`site_host`])
pub fn is_same_site(url: &Url, site: &str) -> bool {
    url.host_str().map_or(false, |host| site_host(host) == site)
}

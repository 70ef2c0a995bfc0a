//! Remote URL → web viewer links.

/// Web root of a hosted repository, from an origin remote URL.
///
/// Understands scp-like (`git@host:owner/repo.git`), `ssh://`, `git://` and
/// `http(s)://` remotes; local paths give `None`.
pub fn web_root_url(remote_url: &str) -> Option<String> {
    let remote_url = remote_url.trim();

    let (host, path) = if let Some(rest) = remote_url
        .strip_prefix("https://")
        .or_else(|| remote_url.strip_prefix("http://"))
        .or_else(|| remote_url.strip_prefix("ssh://"))
        .or_else(|| remote_url.strip_prefix("git://"))
    {
        let (authority, path) = rest.split_once('/')?;
        let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
        // ssh ports do not carry over to the web host
        let host = if remote_url.starts_with("http") {
            host
        } else {
            host.split_once(':').map_or(host, |(name, _)| name)
        };
        (host, path)
    } else if !remote_url.contains("://") {
        let (authority, path) = remote_url.split_once(':')?;
        if authority.contains('/') || path.starts_with('/') {
            return None;
        }
        let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
        (host, path)
    } else {
        return None;
    };

    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    if host.is_empty() || path.is_empty() {
        return None;
    }
    Some(format!("https://{}/{}", host, path))
}

pub fn commit_url(web_root: &str, commit_id: &str) -> String {
    format!("{}/commit/{}", web_root.trim_end_matches('/'), commit_id)
}

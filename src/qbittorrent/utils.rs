use super::error::ParseError;

const INFO_HASH_MARKER: &str = "btih:";

/// Extract the info hash from a magnet URI
///
/// The hash is whatever follows `btih:` up to the next `&`. Case is kept as
/// written; callers lower-case it where the engine expects that.
///
/// # Errors
///
/// [`ParseError::MissingInfoHash`] when there is no `btih:` marker and
/// [`ParseError::EmptyInfoHash`] when nothing follows it.
pub fn get_torrent_hash(magnet_uri: &str) -> Result<&str, ParseError> {
    let start = magnet_uri
        .find(INFO_HASH_MARKER)
        .ok_or(ParseError::MissingInfoHash)?
        + INFO_HASH_MARKER.len();
    let rest = &magnet_uri[start..];
    let hash = rest.split('&').next().unwrap_or_default();
    if hash.is_empty() {
        return Err(ParseError::EmptyInfoHash);
    }
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_up_to_next_parameter() {
        assert_eq!(
            get_torrent_hash("magnet:?xt=urn:btih:ABCD&dn=x"),
            Ok("ABCD")
        );
    }

    #[test]
    fn test_hash_at_end_of_uri() {
        assert_eq!(
            get_torrent_hash("magnet:?dn=x&xt=urn:btih:3b245504cf5f11bbdbe1201cea6a6bf45aee1bc0"),
            Ok("3b245504cf5f11bbdbe1201cea6a6bf45aee1bc0")
        );
    }

    #[test]
    fn test_missing_marker() {
        assert_eq!(
            get_torrent_hash("magnet:?dn=nothing-here"),
            Err(ParseError::MissingInfoHash)
        );
        assert_eq!(get_torrent_hash(""), Err(ParseError::MissingInfoHash));
    }

    #[test]
    fn test_marker_without_hash() {
        assert_eq!(
            get_torrent_hash("magnet:?xt=urn:btih:"),
            Err(ParseError::EmptyInfoHash)
        );
        assert_eq!(
            get_torrent_hash("magnet:?xt=urn:btih:&dn=x"),
            Err(ParseError::EmptyInfoHash)
        );
    }
}

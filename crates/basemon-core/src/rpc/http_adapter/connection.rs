use std::path::Path;

use reqwest::Url;

use crate::error::CoreError;

/// Pick HTTP credentials: an explicit user/pass pair wins, then the daemon's
/// cookie file, otherwise the request goes out unauthenticated.
pub(super) fn resolve_auth(
    user: Option<&str>,
    pass: Option<&str>,
    cookie_file: Option<&Path>,
) -> Result<Option<(String, String)>, CoreError> {
    match (user, pass, cookie_file) {
        (Some(user), Some(pass), _) => Ok(Some((user.to_owned(), pass.to_owned()))),
        (Some(_), None, _) | (None, Some(_), _) => Err(CoreError::Config(
            "rpc user and rpc pass must be given together".to_owned(),
        )),
        (None, None, Some(path)) => read_cookie(path).map(Some),
        (None, None, None) => Ok(None),
    }
}

/// bitcoind writes `__cookie__:<hex>` on a single line.
fn read_cookie(path: &Path) -> Result<(String, String), CoreError> {
    let config_err =
        |detail: String| CoreError::Config(format!("rpc cookie file {}: {detail}", path.display()));

    let content = std::fs::read_to_string(path).map_err(|e| config_err(e.to_string()))?;
    let line = content.lines().next().unwrap_or_default().trim();
    match line.split_once(':') {
        Some((user, pass)) if !user.is_empty() && !pass.is_empty() => {
            Ok((user.to_owned(), pass.to_owned()))
        }
        _ => Err(config_err("expected `user:password`".to_owned())),
    }
}

pub(super) fn parse_connection(connection: &str) -> Result<Url, CoreError> {
    let url = Url::parse(connection)
        .map_err(|e| CoreError::Config(format!("rpc url `{connection}`: {e}")))?;
    if matches!(url.scheme(), "http" | "https") {
        Ok(url)
    } else {
        Err(CoreError::Config(format!(
            "rpc url `{connection}`: scheme must be http or https"
        )))
    }
}

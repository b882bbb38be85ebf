use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use texting_robots::Robot;
use url::Url;

pub fn robots_url(base: &Url) -> Result<Url> {
    base.join("/robots.txt")
        .with_context(|| format!("Failed to build robots.txt URL for {}", base))
}

/// Product token to match against `User-agent` lines: the first `Name/version`
/// that is not the `Mozilla` compatibility prefix, otherwise the first word.
pub fn product_token(user_agent: &str) -> &str {
    let words = || {
        user_agent
            .split(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | ';' | ','))
            .filter(|w| !w.is_empty())
    };
    words()
        .filter_map(|w| w.split_once('/').map(|(name, _)| name))
        .find(|name| !name.is_empty() && !name.eq_ignore_ascii_case("mozilla"))
        .or_else(|| words().next().map(|w| w.split('/').next().unwrap_or(w)))
        .unwrap_or(user_agent)
}

/// Evaluates a robots.txt body for the given agent and path.
pub fn is_allowed(robots_txt: &str, agent: &str, path: &str) -> bool {
    match Robot::new(agent, robots_txt.as_bytes()) {
        Ok(robot) => robot.allowed(path),
        Err(e) => {
            // Unparseable file carries no rules.
            warn!("Ignoring unparseable robots.txt: {}", e);
            true
        }
    }
}

/// Decision for a robots.txt response status when there is no body to parse.
fn allowed_for_status(status: StatusCode) -> bool {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => false,
        s if s.is_client_error() => true,
        _ => false,
    }
}

/// Fetches robots.txt for `base` and checks `path`. Any failure to get an
/// answer from the site counts as a disallow.
pub fn check_allowed(client: &Client, base: &Url, agent: &str, path: &str) -> bool {
    let url = match robots_url(base) {
        Ok(url) => url,
        Err(e) => {
            warn!("{:#}", e);
            return false;
        }
    };

    let response = match client.get(url.clone()).send() {
        Ok(response) => response,
        Err(e) => {
            warn!("Could not fetch {}: {}", url, e);
            return false;
        }
    };

    let status = response.status();
    if !status.is_success() {
        debug!("{} answered {}", url, status);
        return allowed_for_status(status);
    }

    match response.text() {
        Ok(body) => is_allowed(&body, agent, path),
        Err(e) => {
            warn!("Could not read {}: {}", url, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_USER_AGENT;

    const AGENT: &str = "ApplierBot";

    #[test]
    fn test_robots_url_uses_origin() {
        let base = Url::parse("https://www.hellowork.com/fr-fr/recherche-emploi/").unwrap();
        assert_eq!(
            robots_url(&base).unwrap().as_str(),
            "https://www.hellowork.com/robots.txt"
        );
    }

    #[test]
    fn test_empty_robots_allows_everything() {
        assert!(is_allowed("", AGENT, "/fr-fr/recherche-emploi/"));
    }

    #[test]
    fn test_disallowed_search_path() {
        let txt = "User-agent: *\nDisallow: /fr-fr/recherche-emploi/\n";
        assert!(!is_allowed(txt, AGENT, "/fr-fr/recherche-emploi/"));
        assert!(is_allowed(txt, AGENT, "/fr-fr/entreprises/"));
    }

    #[test]
    fn test_agent_specific_group() {
        let txt = "User-agent: ApplierBot\nDisallow: /\n\nUser-agent: *\nAllow: /\n";
        assert!(!is_allowed(txt, AGENT, "/fr-fr/recherche-emploi/"));
        assert!(is_allowed(txt, "OtherBot", "/fr-fr/recherche-emploi/"));
    }

    #[test]
    fn test_product_token() {
        assert_eq!(product_token(DEFAULT_USER_AGENT), "ApplierBot");
        assert_eq!(product_token("OfferWatch/2.1 (+https://example.com/bot)"), "OfferWatch");
        assert_eq!(product_token("Mozilla/5.0"), "Mozilla");
        assert_eq!(product_token("plainbot"), "plainbot");
    }

    #[test]
    fn test_bot_group_applies_to_default_user_agent() {
        let txt = "User-agent: ApplierBot\nDisallow: /\n\nUser-agent: *\nAllow: /\n";
        assert!(!is_allowed(txt, product_token(DEFAULT_USER_AGENT), "/fr-fr/recherche-emploi/"));
    }

    #[test]
    fn test_status_without_body() {
        assert!(allowed_for_status(StatusCode::NOT_FOUND));
        assert!(!allowed_for_status(StatusCode::FORBIDDEN));
        assert!(!allowed_for_status(StatusCode::UNAUTHORIZED));
        assert!(!allowed_for_status(StatusCode::INTERNAL_SERVER_ERROR));
    }
}

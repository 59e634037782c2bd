use regex::Regex;

use crate::model::DomainConfig;

/// Whether a stored domain pattern matches a visited hostname.
///
/// An exact string match always wins. Otherwise `*` in the pattern matches
/// any run of characters (including none) and every other character is
/// literal. Matching is case-sensitive; hostnames arrive normalized.
pub fn matches(pattern: &str, hostname: &str) -> bool {
    if pattern == hostname {
        return true;
    }
    if !pattern.contains('*') {
        return false;
    }
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    match Regex::new(&format!("^{body}$")) {
        Ok(re) => re.is_match(hostname),
        Err(_) => false,
    }
}

/// First config, in storage order, whose pattern matches `hostname`.
pub fn find_by_domain<'a>(configs: &'a [DomainConfig], hostname: &str) -> Option<&'a DomainConfig> {
    configs.iter().find(|c| matches(&c.domain, hostname))
}

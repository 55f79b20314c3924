//! Platform resolution from the page address.

use crate::types::Platform;
use tracing::trace;
use url::Url;

/// Host substrings and the platform they identify, checked in order
const PLATFORM_HOSTS: &[(&str, Platform)] = &[
    ("chatgpt.com", Platform::ChatGpt),
    ("chat.openai.com", Platform::ChatGpt),
    ("claude.ai", Platform::Claude),
    ("gemini.google.com", Platform::Gemini),
    ("perplexity.ai", Platform::Perplexity),
];

/// Classify a page address.
///
/// Pure function of the host name; anything unparsable or unknown is `None`.
pub fn resolve(address: &str) -> Option<Platform> {
    let url = Url::parse(address).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let platform = PLATFORM_HOSTS
        .iter()
        .find(|(pattern, _)| host.contains(pattern))
        .map(|(_, platform)| *platform);
    trace!("Resolved {} -> {:?}", host, platform);
    platform
}

//! Provider subsystem for model inference backends.
//!
//! Each provider implements the [`Provider`] trait defined in [`traits`], and is
//! registered in the factory function [`create_provider`] by its canonical
//! string key.
//!
//! # Extension
//!
//! To add a new provider, implement [`Provider`] in a new submodule and register
//! it in [`create_provider`] and [`list_providers`].

pub mod compatible;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use compatible::{AuthStyle, OpenAiCompatibleProvider};
pub use traits::{ChatMessage, Provider};

const MAX_API_ERROR_CHARS: usize = 200;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

fn token_end(input: &str, from: usize) -> usize {
    let mut end = from;
    for (i, c) in input[from..].char_indices() {
        if is_secret_char(c) {
            end = from + i + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

/// Scrub known secret-like token prefixes from provider error strings.
///
/// Redacts tokens with prefixes like `sk-`, `sk-proj-` and `Bearer `.
pub fn scrub_secret_patterns(input: &str) -> String {
    const PREFIXES: [&str; 3] = ["sk-", "Bearer ", "org-"];

    let mut scrubbed = input.to_string();

    for prefix in PREFIXES {
        let mut search_from = 0;
        loop {
            let Some(rel) = scrubbed[search_from..].find(prefix) else {
                break;
            };

            let start = search_from + rel;
            let content_start = start + prefix.len();
            let end = token_end(&scrubbed, content_start);

            if end == content_start {
                search_from = content_start;
                continue;
            }

            scrubbed.replace_range(start..end, "[REDACTED]");
            search_from = start + "[REDACTED]".len();
        }
    }

    scrubbed
}

/// Sanitize API error text by scrubbing secrets and truncating length.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);

    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed;
    }

    let mut end = MAX_API_ERROR_CHARS;
    while end > 0 && !scrubbed.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &scrubbed[..end])
}

/// Build a sanitized provider error from a failed HTTP response.
pub async fn api_error(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
    let sanitized = sanitize_api_error(&body);
    anyhow::anyhow!("{provider} API error ({status}): {sanitized}")
}

/// Factory: create the right provider from config with optional custom base URL.
pub fn create_provider(
    name: &str,
    api_key: Option<&str>,
    api_url: Option<&str>,
) -> anyhow::Result<Box<dyn Provider>> {
    let key = api_key.map(str::trim).filter(|k| !k.is_empty());
    let base_url = api_url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(OPENAI_BASE_URL);

    match name.trim().to_ascii_lowercase().as_str() {
        "openai" => Ok(Box::new(OpenAiCompatibleProvider::new(
            "openai",
            base_url,
            key,
            AuthStyle::Bearer,
        ))),
        "custom" => Ok(Box::new(OpenAiCompatibleProvider::new(
            "custom",
            base_url,
            key,
            AuthStyle::XApiKey,
        ))),
        _ => anyhow::bail!(
            "Unknown provider: {name}. Supported providers: openai, custom."
        ),
    }
}

/// Information about a supported provider for display purposes.
pub struct ProviderInfo {
    /// Canonical name used in config (e.g. `"openai"`)
    pub name: &'static str,
    /// Human-readable display name
    pub display_name: &'static str,
}

/// Return the list of all known providers for `stockchat status`.
pub fn list_providers() -> Vec<ProviderInfo> {
    vec![
        ProviderInfo {
            name: "openai",
            display_name: "OpenAI",
        },
        ProviderInfo {
            name: "custom",
            display_name: "OpenAI-compatible endpoint (x-api-key auth)",
        },
    ]
}

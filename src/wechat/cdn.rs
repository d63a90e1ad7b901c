//! Post-processing of uploaded URLs.

use reqwest::Url;
use tracing::{info, warn};

use crate::core::UploadItem;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("cannot apply CDN prefix to {url:?}: {reason}")]
pub struct PostProcessingWarning {
    pub url: String,
    pub reason: String,
}

/// Swap the scheme and host of `url` for `cdn_prefix`, keeping path and query.
pub fn rewrite_url(url: &str, cdn_prefix: &str) -> Result<String, PostProcessingWarning> {
    let warning = |reason: String| PostProcessingWarning {
        url: url.to_owned(),
        reason,
    };

    let parsed = Url::parse(url).map_err(|err| warning(err.to_string()))?;
    if parsed.cannot_be_a_base() {
        return Err(warning("url has no path".to_owned()));
    }

    let query = parsed
        .query()
        .map(|query| format!("?{}", query))
        .unwrap_or_default();
    Ok(format!("{}{}{}", cdn_prefix, parsed.path(), query))
}

pub fn markdown(url: &str) -> String {
    format!("![]({})", url)
}

/// Best-effort: a URL that cannot be rewritten is kept as is.
pub fn finalize(items: &mut [UploadItem], cdn_prefix: Option<&str>) {
    for item in items.iter_mut() {
        let url = match &item.remote_url {
            Some(url) => url,
            None => continue,
        };

        let final_url = match cdn_prefix {
            Some(prefix) => rewrite_url(url, prefix).unwrap_or_else(|warning| {
                warn!(message = "CDN prefix not applied, keeping original url", %warning);
                url.clone()
            }),
            None => url.clone(),
        };

        item.display_markup = Some(markdown(&final_url));
        item.remote_url = Some(final_url);
    }
    info!(message = "Post-processing finished", items = items.len());
}

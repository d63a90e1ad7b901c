//! WeChat Official Account image host.

use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use tracing::{error, info, warn};

use self::{
    auth::Token,
    utils::{check_status, ServerError},
};
use crate::{
    config::{AppCredentials, Config, ConfigurationError},
    core::{ConfigField, FieldKind, Notification, NotificationSink, UploadItem},
};

pub mod auth;
pub mod cdn;
mod utils;

pub const UPLOADER_KEY: &str = "picgo-plugin-wxmp";
pub const DISPLAY_NAME: &str = "WeChat Official Account";

const NOTIFICATION_TITLE: &str = "WeChat image host error";
const MEDIA_FIELD: &str = "media";
const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Upload rejections meaning the access token itself is no longer accepted.
const TOKEN_REJECTED_CODES: [i64; 3] = [40001, 40014, 42001];

pub struct Provider<AuthTokenProvider> {
    pub client: reqwest::Client,
    pub config: Config,
    pub auth_token_provider: AuthTokenProvider,
    pub notifications: Arc<dyn NotificationSink>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error<AuthError> {
    #[error("configuration: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("auth: {0}")]
    Auth(#[source] AuthError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("reqwest: {0}")]
    Reqwest(#[source] reqwest::Error),
    #[error("server: {0}")]
    Server(#[from] ServerError),
}

/// Upload URLs carry the access token, so it never reaches the error text.
impl<AuthError> From<reqwest::Error> for Error<AuthError> {
    fn from(err: reqwest::Error) -> Self {
        Self::Reqwest(err.without_url())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("image {file_name} is {size_mb:.2}MB, over the {limit_mb}MB limit")]
pub struct ValidationError {
    pub file_name: String,
    pub size_mb: f64,
    pub limit_mb: f64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("upload failed: {errmsg} ({errcode})")]
    Api { errcode: i64, errmsg: String },
    #[error("upload failed: empty url")]
    EmptyUrl,
}

/// Configuration entries the orchestrator prompts the operator for.
pub fn config_schema() -> Vec<ConfigField> {
    vec![
        ConfigField {
            name: "appId",
            kind: FieldKind::Input,
            message: "Official Account AppID",
            required: true,
            default: None,
        },
        ConfigField {
            name: "appSecret",
            kind: FieldKind::Password,
            message: "Official Account AppSecret",
            required: true,
            default: None,
        },
        ConfigField {
            name: "imageMaxSize",
            kind: FieldKind::Input,
            message: "Image size limit in MB (WeChat accepts at most 10MB)",
            required: false,
            default: Some("5"),
        },
        ConfigField {
            name: "cdnPrefix",
            kind: FieldKind::Input,
            message: "CDN origin used to work around hotlink protection, e.g. https://your-cdn.com",
            required: false,
            default: Some(""),
        },
    ]
}

/// `image/<ext>` for the extension hint, `image/jpeg` without one.
pub fn content_type(extension: Option<&str>) -> String {
    match extension.map(|ext| ext.trim_start_matches('.')) {
        Some(ext) if !ext.is_empty() => format!("image/{}", ext.to_ascii_lowercase()),
        _ => DEFAULT_CONTENT_TYPE.to_owned(),
    }
}

impl<AuthTokenProvider> Provider<AuthTokenProvider>
where
    AuthTokenProvider: auth::TokenProvider,
{
    fn upload_url(&self) -> String {
        format!(
            "{}/cgi-bin/media/uploadimg",
            self.config.api_base.trim_end_matches('/')
        )
    }

    fn validate(&self, items: &[UploadItem]) -> Result<(), ValidationError> {
        let limit_mb = self.config.image_max_size;
        for item in items {
            let size_mb = item.size_mb();
            if size_mb > limit_mb {
                return Err(ValidationError {
                    file_name: item.file_name.clone(),
                    size_mb,
                    limit_mb,
                });
            }
        }
        Ok(())
    }

    async fn get_auth_token(
        &self,
        app: &AppCredentials,
    ) -> Result<String, Error<AuthTokenProvider::Error>> {
        let token = self
            .auth_token_provider
            .get_auth_token(app)
            .await
            .map_err(Error::Auth)?;
        Ok(token.access_token().to_owned())
    }

    async fn upload_item(
        &self,
        auth_token: &str,
        item: &mut UploadItem,
    ) -> Result<(), Error<AuthTokenProvider::Error>> {
        let media_part = |content_type: &str| {
            Part::bytes(item.bytes.clone())
                .file_name(item.file_name.clone())
                .mime_str(content_type)
        };

        let mut content_type = content_type(item.extension.as_deref());
        let part = match media_part(&content_type) {
            Ok(part) => part,
            Err(_) => {
                warn!(
                    message = "Unusable content type, sending as jpeg",
                    content_type = %content_type,
                );
                content_type = DEFAULT_CONTENT_TYPE.to_owned();
                media_part(&content_type)?
            }
        };
        info!(
            message = "Uploading image",
            file_name = %item.file_name,
            content_type = %content_type,
            bytes = item.bytes.len(),
        );
        let form = Form::new().part(MEDIA_FIELD, part).text("type", "image");

        let req = self
            .client
            .post(self.upload_url())
            .query(&[("access_token", auth_token)])
            .multipart(form)
            .build()?;

        let res = self.client.execute(req).await?;
        check_status(&res)?;
        let raw: serde_json::Value = res.json().await?;
        let response: model::UploadResponse = serde_json::from_value(raw.clone())
            .map_err(|_| UploadError::EmptyUrl)?;

        if let Some((errcode, errmsg)) = response.status.failure() {
            if TOKEN_REJECTED_CODES.contains(&errcode) {
                warn!(message = "Access token rejected by media endpoint", errcode);
                self.auth_token_provider.invalidate().await;
            }
            return Err(UploadError::Api { errcode, errmsg }.into());
        }
        let url = match response.url {
            Some(url) if !url.is_empty() => url,
            _ => return Err(UploadError::EmptyUrl.into()),
        };

        info!(message = "Image uploaded", file_name = %item.file_name, url = %url);
        item.remote_url = Some(url);
        item.raw_response = Some(raw);
        Ok(())
    }

    /// Upload every item in order, stopping at the first failure.
    ///
    /// Items uploaded before a failure keep their `remote_url`.
    pub async fn upload(
        &self,
        items: &mut [UploadItem],
    ) -> Result<(), Error<AuthTokenProvider::Error>> {
        let app = self.config.app_credentials()?;
        self.validate(items)?;

        for item in items.iter_mut() {
            let auth_token = self.get_auth_token(&app).await?;
            self.upload_item(&auth_token, item).await?;
        }
        Ok(())
    }

    /// Rewrite uploaded URLs onto the CDN and render their embed markup.
    pub fn finalize(&self, items: &mut [UploadItem]) {
        cdn::finalize(items, self.config.cdn_prefix());
    }
}

mod model {
    use serde::Deserialize;

    use super::utils::ApiStatus;

    #[derive(Debug, Deserialize)]
    pub struct UploadResponse {
        #[serde(default)]
        pub url: Option<String>,
        #[serde(flatten)]
        pub status: ApiStatus,
    }
}

#[async_trait::async_trait]
impl<AuthTokenProvider> crate::core::Uploader for Provider<AuthTokenProvider>
where
    AuthTokenProvider: auth::TokenProvider,
    <AuthTokenProvider as auth::TokenProvider>::Error: std::error::Error + 'static,
{
    fn display_name(&self) -> &str {
        DISPLAY_NAME
    }

    fn config_schema(&self) -> Vec<ConfigField> {
        config_schema()
    }

    async fn handle(&self, items: &mut [UploadItem]) -> bool {
        match self.upload(items).await {
            Ok(()) => true,
            Err(err) => {
                error!(message = "Upload failed", error = %err);
                self.notifications.notify(Notification {
                    title: NOTIFICATION_TITLE.to_owned(),
                    body: err.to_string(),
                });
                false
            }
        }
    }

    async fn after_upload(&self, items: &mut [UploadItem]) {
        self.finalize(items);
    }
}

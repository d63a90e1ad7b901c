use std::{ffi::OsStr, io::Read, path::Path, sync::Arc};

use async_graphql::{Context, Enum, Object, Result, SimpleObject, Upload, ID};

use crate::core::{Core, UploadItem};

fn load_core<'a>(ctx: &'a Context<'_>) -> &'a Arc<Core> {
    ctx.data_unchecked::<Arc<Core>>()
}

#[derive(Debug, Enum, Clone, Copy, PartialEq, Eq)]
#[graphql(remote = "crate::core::FieldKind")]
pub enum FieldKind {
    Input,
    Password,
}

#[derive(SimpleObject)]
pub struct ConfigField {
    pub name: String,
    pub kind: FieldKind,
    pub message: String,
    pub required: bool,
    pub default: Option<String>,
}

impl From<crate::core::ConfigField> for ConfigField {
    fn from(val: crate::core::ConfigField) -> Self {
        Self {
            name: val.name.to_owned(),
            kind: val.kind.into(),
            message: val.message.to_owned(),
            required: val.required,
            default: val.default.map(str::to_owned),
        }
    }
}

#[derive(SimpleObject)]
pub struct Uploader {
    pub key: ID,
    pub name: String,
    pub config: Vec<ConfigField>,
}

impl Uploader {
    fn new(key: &str, uploader: &dyn crate::core::Uploader) -> Self {
        Self {
            key: key.into(),
            name: uploader.display_name().to_owned(),
            config: uploader
                .config_schema()
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }
}

#[derive(SimpleObject)]
pub struct Image {
    pub file_name: String,
    pub extension: Option<String>,
    pub url: Option<String>,
    pub markdown: Option<String>,
}

impl From<UploadItem> for Image {
    fn from(val: UploadItem) -> Self {
        Self {
            file_name: val.file_name,
            extension: val.extension,
            url: val.remote_url,
            markdown: val.display_markup,
        }
    }
}

#[derive(SimpleObject)]
pub struct UploadResult {
    pub success: bool,
    pub items: Vec<Image>,
}

/// Blocking: spooled uploads are read from disk.
fn read_upload(filename: String, mut content: impl Read) -> std::io::Result<UploadItem> {
    let extension = Path::new(&filename)
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_owned);

    let mut bytes = Vec::new();
    content.read_to_end(&mut bytes)?;

    Ok(UploadItem::new(filename, extension, bytes))
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn uploaders(&self, ctx: &Context<'_>) -> Result<Vec<Uploader>> {
        let core = load_core(ctx);
        let mut uploaders: Vec<_> = core
            .uploaders
            .iter()
            .map(|(key, uploader)| Uploader::new(key, uploader.as_ref()))
            .collect();
        uploaders.sort_by(|a, b| a.key.0.cmp(&b.key.0));
        Ok(uploaders)
    }

    async fn uploader(&self, ctx: &Context<'_>, key: ID) -> Result<Option<Uploader>> {
        let core = load_core(ctx);
        Ok(core.uploader(&key).map(|uploader| Uploader::new(&key, uploader)))
    }
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Upload a batch of images through the given uploader.
    async fn upload(
        &self,
        ctx: &Context<'_>,
        uploader: ID,
        files: Vec<Upload>,
    ) -> Result<UploadResult> {
        let core = load_core(ctx);
        let values = files
            .iter()
            .map(|file| file.value(ctx))
            .collect::<std::io::Result<Vec<_>>>()?;
        let mut items = tokio::task::spawn_blocking(move || {
            values
                .into_iter()
                .map(|value| read_upload(value.filename, value.content))
                .collect::<std::io::Result<Vec<_>>>()
        })
        .await??;

        let success = core.run_batch(&uploader, &mut items).await?;

        Ok(UploadResult {
            success,
            items: items.into_iter().map(Into::into).collect(),
        })
    }
}

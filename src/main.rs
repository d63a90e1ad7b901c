use std::sync::Arc;

use axum::{Router, Server};
use tracing::info;
use wxmp_uploader::{
    api::http::{axum as http, graphql},
    config::Config,
    core::{Core, LogNotificationSink},
    wechat::{
        self,
        auth::{client_credentials::ClientCredentials, token_manager::TokenManager},
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let listen = config.listen;

    let reqwest_client = reqwest::Client::builder().build()?;

    let auth_token_provider = ClientCredentials::new(reqwest_client.clone(), &config.api_base);
    let auth_token_provider = TokenManager::new(auth_token_provider);

    let wechat_provider = wechat::Provider {
        client: reqwest_client,
        config,
        auth_token_provider,
        notifications: Arc::new(LogNotificationSink),
    };

    let uploaders = vec![(
        wechat::UPLOADER_KEY.to_owned(),
        Box::new(wechat_provider) as _,
    )]
    .into_iter()
    .collect();
    let core = Arc::new(Core { uploaders });
    let schema = graphql::schema(core);

    let app = http::routes(Router::new(), schema);

    info!("Playground: http://{}", listen);

    Server::bind(&listen)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

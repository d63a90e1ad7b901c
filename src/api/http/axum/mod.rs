use async_graphql::http::{playground_source, GraphQLPlaygroundConfig};
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    extract,
    response::{self, IntoResponse},
    routing::get,
    AddExtensionLayer, Router,
};

use super::graphql::Schema;

async fn handler(schema: extract::Extension<Schema>, req: GraphQLRequest) -> GraphQLResponse {
    schema.execute(req.into_inner()).await.into()
}

async fn playground() -> impl IntoResponse {
    response::Html(playground_source(GraphQLPlaygroundConfig::new("/")))
}

/// Serve the schema at `/`: the playground on GET, queries and multipart uploads on POST.
pub fn routes(router: Router, schema: Schema) -> Router {
    router
        .route("/", get(playground).post(handler))
        .layer(AddExtensionLayer::new(schema))
}

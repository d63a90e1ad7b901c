mod model;

use std::sync::Arc;

use async_graphql::EmptySubscription;

use self::model::{MutationRoot, QueryRoot};
use crate::core::Core;

pub type Schema = async_graphql::Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn schema(core: Arc<Core>) -> Schema {
    async_graphql::Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(core)
        .finish()
}

use std::collections::HashSet;

use async_trait::async_trait;

use crate::model::Id;
use crate::store::StoreError;

/// The one capability question the engine asks.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn is_system_admin(&self, user_id: Id) -> Result<bool, StoreError>;
}

/// Fixed set of administrator user ids.
#[derive(Debug, Default)]
pub struct StaticAdmins {
    admins: HashSet<Id>,
}

impl StaticAdmins {
    pub fn new(admins: impl IntoIterator<Item = Id>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Authorizer for StaticAdmins {
    async fn is_system_admin(&self, user_id: Id) -> Result<bool, StoreError> {
        Ok(self.admins.contains(&user_id))
    }
}

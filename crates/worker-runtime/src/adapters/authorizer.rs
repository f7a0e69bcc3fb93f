//! # Policy Authorizer
//!
//! Static authorization policy: root may do anything, the configured uids
//! may perform every action under the worker's prefix, everyone else is
//! denied.

use std::collections::HashSet;

use async_trait::async_trait;
use pw_01_transaction_queue::Authorizer;
use shared_types::{CallerIdentity, Uid};
use tracing::debug;

use crate::config::AuthorizationConfig;

pub struct PolicyAuthorizer {
    allowed: HashSet<Uid>,
    action_prefix: String,
}

impl PolicyAuthorizer {
    pub fn new(allowed: impl IntoIterator<Item = Uid>, action_prefix: impl Into<String>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            action_prefix: action_prefix.into(),
        }
    }

    pub fn from_config(config: &AuthorizationConfig) -> Self {
        Self::new(
            config.authorized_uids.iter().copied(),
            config.action_prefix.clone(),
        )
    }

    fn in_scope(&self, action: &str) -> bool {
        action
            .strip_prefix(self.action_prefix.as_str())
            .is_some_and(|rest| rest.starts_with('.'))
    }
}

#[async_trait]
impl Authorizer for PolicyAuthorizer {
    async fn authorize(&self, caller: &CallerIdentity, action: &str) -> bool {
        let allowed =
            caller.is_root() || (self.allowed.contains(&caller.uid) && self.in_scope(action));
        debug!(
            uid = caller.uid,
            session = %caller.session,
            action,
            allowed,
            "Authorization decision"
        );
        allowed
    }
}

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::warn;

use crate::api::UserDirectory;

pub const UNKNOWN_STUDENT: &str = "Unknown student";

/// Display names for the users referenced by a list of appointments.
#[derive(Debug, Clone, Default)]
pub struct StudentNames {
    names: HashMap<i64, String>,
}

impl StudentNames {
    /// The resolved name, or a placeholder when the lookup failed.
    pub fn get(&self, user_id: i64) -> &str {
        self.names
            .get(&user_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_STUDENT)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Look every distinct id up in parallel. Individual failures are logged and
/// left unresolved; this never fails as a whole.
pub async fn resolve_names(
    directory: Arc<dyn UserDirectory>,
    user_ids: impl IntoIterator<Item = i64>,
) -> StudentNames {
    let ids: BTreeSet<i64> = user_ids.into_iter().collect();
    let mut set = JoinSet::new();
    for id in ids {
        let directory = directory.clone();
        set.spawn(async move { (id, directory.get_user(id).await) });
    }

    let mut names = HashMap::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((id, Ok(user))) => {
                let name = user.display_name();
                if !name.is_empty() {
                    names.insert(id, name);
                }
            }
            Ok((id, Err(e))) => warn!(user_id = id, "name lookup failed: {e}"),
            Err(e) => warn!("name lookup task failed: {e}"),
        }
    }
    StudentNames { names }
}

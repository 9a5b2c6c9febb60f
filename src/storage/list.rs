//! Key enumeration
//!
//! The backend only lists one level at a time, reporting nested groups as
//! `name/`. Recursive listing walks the tree with an explicit stack of
//! partially consumed groups so results come out depth first, each group's
//! contents directly after the group's position among its siblings.

use std::vec::IntoIter;

use tracing::debug;

use crate::client::Method;
use crate::error::{Result, StorageError};
use crate::storage::VaultStorage;
use crate::wire::ListResponse;

const SEPARATOR: char = '/';

/// Join a listed entry onto the prefix it was listed under
fn join_key(prefix: &str, entry: &str) -> String {
    if prefix.is_empty() || prefix.ends_with(SEPARATOR) {
        format!("{}{}", prefix, entry)
    } else {
        format!("{}{}{}", prefix, SEPARATOR, entry)
    }
}

fn is_group(key: &str) -> bool {
    key.ends_with(SEPARATOR)
}

impl VaultStorage {
    /// Direct children of `prefix` as reported by the backend.
    ///
    /// A 404 means there is nothing under `prefix` and yields no entries.
    async fn list_children(&self, prefix: &str) -> Result<Vec<String>> {
        let path = self.paths().metadata(prefix);
        let response = self.send(Method::List, &path, None, "list keys").await?;

        if response.is_not_found() {
            return Ok(Vec::new());
        }

        if !response.is_success() {
            self.log_failure("list keys", &path, &response);
            return Err(StorageError::Backend(response.error_message()));
        }

        let list: ListResponse = response.json()?;
        Ok(list.data.keys)
    }

    pub(crate) async fn list_keys(&self, prefix: &str, recursive: bool) -> Result<Vec<String>> {
        let root = self.list_children(prefix).await?;
        if root.is_empty() {
            return Err(StorageError::NotFound(prefix.to_string()));
        }

        let mut keys = Vec::new();
        let mut pending: Vec<(String, IntoIter<String>)> = vec![(prefix.to_string(), root.into_iter())];

        while let Some((group, entries)) = pending.last_mut() {
            let Some(entry) = entries.next() else {
                pending.pop();
                continue;
            };

            let key = join_key(group, &entry);
            if !is_group(&key) {
                keys.push(key);
                continue;
            }

            if recursive {
                let children = self.list_children(&key).await?;
                debug!("list: group={} entries={}", key, children.len());
                pending.push((key, children.into_iter()));
            }
        }

        Ok(keys)
    }
}

//! Paginated listing and bulk delete.

use super::apply::Reconciler;
use crate::error::{Error, Result};
use crate::gcp::client::{resource_url, with_query};
use crate::gcp::transport::{call, Method};
use crate::resource::{Parent, Resource, ResourceKind};
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value as Json;
use std::collections::VecDeque;

/// Forward-only cursor over one collection.
///
/// Holds the current page; [`next`](Self::next) replaces it with the
/// following one.
pub struct ResourceList<'a, K: ResourceKind> {
    reconciler: &'a Reconciler,
    parent: Parent,
    page_size: Option<u32>,
    items: Vec<Resource<K>>,
    next_page_token: Option<String>,
}

impl<'a, K: ResourceKind> ResourceList<'a, K> {
    /// Fetch the first page. `page_size` of `None` lets the server choose.
    pub async fn first(
        reconciler: &'a Reconciler,
        parent: Parent,
        page_size: Option<u32>,
    ) -> Result<Self> {
        parent.validate::<K>()?;
        let mut list = Self {
            reconciler,
            parent,
            page_size,
            items: Vec::new(),
            next_page_token: None,
        };
        list.fetch(None).await?;
        Ok(list)
    }

    /// Items of the current page
    pub fn items(&self) -> &[Resource<K>] {
        &self.items
    }

    pub fn has_next(&self) -> bool {
        self.next_page_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Advance to the next page. Returns false, leaving the current page in
    /// place, when there is none.
    pub async fn next(&mut self) -> Result<bool> {
        let Some(token) = self.next_page_token.clone().filter(|t| !t.is_empty()) else {
            return Ok(false);
        };
        self.fetch(Some(&token)).await?;
        Ok(true)
    }

    /// Go back to the first page
    pub async fn restart(&mut self) -> Result<()> {
        self.fetch(None).await
    }

    async fn fetch(&mut self, page_token: Option<&str>) -> Result<()> {
        let collection = self.parent.collection_path::<K>();
        let page_size = self.page_size.map(|n| n.to_string());

        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(size) = &page_size {
            params.push(("pageSize", size.as_str()));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        let url = with_query(&resource_url(self.reconciler.base_path(), &collection), &params);

        let body = call(self.reconciler.transport(), Method::Get, &url, None, &collection).await?;
        self.items = parse_page::<K>(&body)?;
        self.next_page_token = body
            .get("nextPageToken")
            .and_then(Json::as_str)
            .map(str::to_string);

        tracing::debug!(
            "Listed {} {} item(s) under {}, more: {}",
            self.items.len(),
            K::KIND,
            collection,
            self.has_next()
        );
        Ok(())
    }

    /// Every item from the current page onwards, fetching pages lazily. A
    /// page fetch failure is yielded once and ends the stream.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<Resource<K>>> + 'a {
        let buffered: VecDeque<Resource<K>> = std::mem::take(&mut self.items).into();
        stream::unfold(Some((self, buffered)), |state| async move {
            let (mut list, mut buffered) = state?;
            loop {
                if let Some(item) = buffered.pop_front() {
                    return Some((Ok(item), Some((list, buffered))));
                }
                match list.next().await {
                    Ok(true) => buffered.extend(std::mem::take(&mut list.items)),
                    Ok(false) => return None,
                    Err(e) => return Some((Err(e), None)),
                }
            }
        })
    }
}

fn parse_page<K: ResourceKind>(body: &Json) -> Result<Vec<Resource<K>>> {
    match body.get(K::LIST_KEY) {
        None | Some(Json::Null) => Ok(Vec::new()),
        Some(Json::Array(items)) => items
            .iter()
            .map(|item| Resource::from_wire(item, None))
            .collect(),
        Some(other) => Err(Error::codec(
            K::LIST_KEY,
            format!("expected an array, got {}", other),
        )),
    }
}

impl Reconciler {
    /// Start listing resources of kind `K` under `parent`
    pub async fn list<K: ResourceKind>(
        &self,
        parent: Parent,
        page_size: Option<u32>,
    ) -> Result<ResourceList<'_, K>> {
        ResourceList::first(self, parent, page_size).await
    }

    /// Delete every resource under `parent` matching `predicate`.
    ///
    /// Individual failures do not stop the sweep; they are collected into
    /// [`Error::DeleteAll`]. A failure to list is returned as is.
    pub async fn delete_all<K, P>(&self, parent: Parent, predicate: P) -> Result<usize>
    where
        K: ResourceKind,
        P: Fn(&Resource<K>) -> bool,
    {
        let list = self.list::<K>(parent, self.settings().page_size).await?;
        let mut resources = Box::pin(list.into_stream());
        let mut deleted = 0;
        let mut failures = Vec::new();

        while let Some(resource) = resources.next().await {
            let resource = resource?;
            if !predicate(&resource) {
                continue;
            }
            match self.delete::<K>(&resource.name).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    tracing::warn!("Failed to delete {}: {}", resource.describe(), e);
                    failures.push(format!("{}: {}", resource.path(), e));
                }
            }
        }

        if failures.is_empty() {
            Ok(deleted)
        } else {
            Err(Error::DeleteAll { failures })
        }
    }
}

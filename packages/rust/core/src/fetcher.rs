//! Post fetcher: the orchestrator between the document API and the
//! normalized model.
//!
//! Listing favors availability (bad pages are skipped), detail favors
//! correctness (metadata and root block failures are fatal, nested failures
//! are recorded on the block).

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use notepress_content::{AssetStrategy, blocks_to_markdown, generate_toc, parse};
use notepress_notion::{DocumentApi, RawBlock, RawPage, SearchResult};
use notepress_shared::{
    ChildrenStatus, FetchOptions, NormalizedBlock, NotepressError, Post, PostDetail, Result,
    Taxon,
};

use crate::slug::{identity_for, resolve_page_id, slugify};

/// Category given to posts without one.
pub const DEFAULT_CATEGORY: &str = "기타";

/// Page property names read from each post.
mod props {
    pub const PUBLISHED: &str = "published";
    pub const SLUG: &str = "slug";
    pub const CATEGORY: &str = "category";
    pub const TAGS: &str = "tags";
    pub const EXCERPT: &str = "excerpt";
    pub const COVER_IMAGE: &str = "coverImage";
    pub const READING_TIME: &str = "readingTime";
    pub const PUBLISHED_AT: &str = "publishedAt";
}

/// Fetches posts and their block trees through an injected [`DocumentApi`].
pub struct PostFetcher<A> {
    api: A,
    assets: AssetStrategy,
    options: FetchOptions,
}

impl<A: DocumentApi> PostFetcher<A> {
    pub fn new(api: A, assets: AssetStrategy, options: FetchOptions) -> Self {
        Self {
            api,
            assets,
            options,
        }
    }

    // -----------------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------------

    /// All published posts, newest first.
    #[instrument(skip_all)]
    pub async fn list_posts(&self) -> Result<Vec<Post>> {
        let hits = self.search_pages().await?;
        let mut posts = Vec::with_capacity(hits.len());

        for hit in &hits {
            match self.api.retrieve_page(&hit.id).await {
                Ok(page) => match self.to_post(&page) {
                    Some(post) => posts.push(post),
                    None => debug!(page_id = %hit.id, "skipping unpublished or untitled page"),
                },
                Err(e) if e.is_not_found() => {
                    debug!(page_id = %hit.id, "skipping inaccessible page");
                }
                Err(e) => {
                    warn!(page_id = %hit.id, error = %e, "failed to load page, skipping");
                }
            }
        }

        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        info!(candidates = hits.len(), posts = posts.len(), "listed posts");
        Ok(posts)
    }

    /// Distinct categories of published posts, in listing order.
    ///
    /// Each name comes with its URL slug; callers wanting names only can map
    /// over [`Taxon::name`].
    pub async fn get_categories(&self) -> Result<Vec<Taxon>> {
        let posts = self.list_posts().await?;
        let mut categories: Vec<Taxon> = Vec::new();
        for post in &posts {
            if !categories.iter().any(|c| c.name == post.category) {
                categories.push(taxon(&post.category));
            }
        }
        Ok(categories)
    }

    /// Full details of every post in `category`.
    pub async fn get_posts_by_category(&self, category: &str) -> Result<Vec<PostDetail>> {
        let posts = self.list_posts().await?;
        let selected: Vec<&Post> = posts.iter().filter(|p| p.category == category).collect();
        self.details_for(&selected).await
    }

    /// Full details of every post tagged `tag`.
    pub async fn get_posts_by_tag(&self, tag: &str) -> Result<Vec<PostDetail>> {
        let posts = self.list_posts().await?;
        let selected: Vec<&Post> = posts
            .iter()
            .filter(|p| p.tags.iter().any(|t| t == tag))
            .collect();
        self.details_for(&selected).await
    }

    async fn details_for(&self, posts: &[&Post]) -> Result<Vec<PostDetail>> {
        let mut details = Vec::with_capacity(posts.len());
        for post in posts {
            match self.get_post_by_page_id(&post.id).await {
                Ok(detail) => details.push(detail),
                Err(NotepressError::PostNotFound { key }) => {
                    warn!(%key, "post disappeared after listing, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(details)
    }

    async fn search_pages(&self) -> Result<Vec<SearchResult>> {
        let mut cursor: Option<String> = None;
        let mut hits = Vec::new();

        loop {
            let batch = self
                .api
                .search("", self.options.page_size, cursor.as_deref())
                .await?;
            hits.extend(batch.results.into_iter().filter(|r| r.object == "page"));

            match (batch.has_more, batch.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        debug!(pages = hits.len(), "search complete");
        Ok(hits)
    }

    // -----------------------------------------------------------------------
    // Detail
    // -----------------------------------------------------------------------

    /// Resolve a composite slug and fetch the post.
    #[instrument(skip_all, fields(slug = %slug))]
    pub async fn get_post_by_slug(&self, slug: &str) -> Result<PostDetail> {
        let page_id = resolve_page_id(slug)?;
        self.get_post_by_page_id(&page_id).await
    }

    /// Fetch page metadata and the block tree concurrently.
    #[instrument(skip_all, fields(page_id = %page_id))]
    pub async fn get_post_by_page_id(&self, page_id: &str) -> Result<PostDetail> {
        let (page, blocks) = tokio::join!(
            self.api.retrieve_page(page_id),
            self.load_blocks(page_id, 0),
        );

        let page = page.map_err(|e| not_found_as_post(e, page_id))?;
        let post = self
            .to_post(&page)
            .ok_or_else(|| NotepressError::post_not_found(page_id))?;
        let blocks = blocks.map_err(|e| not_found_as_post(e, page_id))?;

        let toc = generate_toc(&blocks);
        let partial_content = blocks.iter().any(NormalizedBlock::has_partial_content);
        if partial_content {
            warn!(slug = %post.slug(), "post has partially loaded content");
        }

        info!(
            slug = %post.slug(),
            blocks = blocks.len(),
            toc_entries = toc.len(),
            "fetched post"
        );

        Ok(PostDetail {
            category: taxon(&post.category),
            tags: post.tags.iter().map(|t| taxon(t)).collect(),
            post,
            blocks,
            toc,
            partial_content,
        })
    }

    /// Normalized block tree of a page.
    #[instrument(skip_all, fields(page_id = %page_id))]
    pub async fn get_blocks_for_page(&self, page_id: &str) -> Result<Vec<NormalizedBlock>> {
        self.load_blocks(page_id, 0)
            .await
            .map_err(|e| not_found_as_post(e, page_id))
    }

    /// A post rendered as Markdown.
    pub async fn get_post_markdown(&self, slug: &str) -> Result<String> {
        let detail = self.get_post_by_slug(slug).await?;
        Ok(blocks_to_markdown(&detail.blocks))
    }

    // -----------------------------------------------------------------------
    // Block tree
    // -----------------------------------------------------------------------

    /// Children of `parent_id`, which sit at nesting `depth`.
    async fn load_blocks(&self, parent_id: &str, depth: usize) -> Result<Vec<NormalizedBlock>> {
        let raw_blocks = self.list_all_children(parent_id).await?;
        let mut blocks = Vec::with_capacity(raw_blocks.len());

        for raw in raw_blocks {
            let mut block = NormalizedBlock::leaf(raw.id.clone(), parse(&raw, &self.assets));

            if raw.has_children {
                let child_depth = depth + 1;
                if child_depth > self.options.max_depth {
                    warn!(block_id = %raw.id, depth = child_depth, "block nesting too deep, truncating");
                    block.children_status = ChildrenStatus::Truncated { depth: child_depth };
                } else {
                    match self.load_children_with_retry(&raw, child_depth).await {
                        Ok(children) => {
                            block.children = children;
                            block.children_status = ChildrenStatus::Loaded;
                        }
                        Err(e) => {
                            warn!(block_id = %raw.id, error = %e, "failed to load nested blocks");
                            block.children_status = ChildrenStatus::Failed {
                                reason: e.to_string(),
                            };
                        }
                    }
                }
            }

            blocks.push(block);
        }

        Ok(blocks)
    }

    async fn load_children_with_retry(
        &self,
        parent: &RawBlock,
        depth: usize,
    ) -> Result<Vec<NormalizedBlock>> {
        let mut attempt = 0;
        loop {
            match Box::pin(self.load_blocks(&parent.id, depth)).await {
                Ok(children) => return Ok(children),
                Err(e) if attempt < self.options.child_fetch_retries && !e.is_not_found() => {
                    let backoff = self.options.retry_backoff_ms.saturating_mul(1u64 << attempt.min(16));
                    attempt += 1;
                    debug!(block_id = %parent.id, attempt, backoff_ms = backoff, error = %e, "retrying nested blocks");
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn list_all_children(&self, block_id: &str) -> Result<Vec<RawBlock>> {
        let mut cursor: Option<String> = None;
        let mut blocks = Vec::new();

        loop {
            let batch = self
                .api
                .list_block_children(block_id, self.options.page_size, cursor.as_deref())
                .await?;
            blocks.extend(batch.results);

            match (batch.has_more, batch.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(blocks)
    }

    // -----------------------------------------------------------------------
    // Page properties
    // -----------------------------------------------------------------------

    /// Listing metadata for a page; `None` unless published with a title.
    fn to_post(&self, page: &RawPage) -> Option<Post> {
        if !page.checkbox(props::PUBLISHED) {
            return None;
        }
        let title = page.title()?;

        let identity = identity_for(&page.id, page.text_property(props::SLUG).as_deref(), &title);
        let now = Utc::now();
        let created_at = page.created_at().unwrap_or(now);

        Some(Post {
            id: page.id.clone(),
            identity,
            title,
            published: true,
            created_at,
            published_at: page.date(props::PUBLISHED_AT).unwrap_or(created_at),
            updated_at: page.last_edited_at().unwrap_or(now),
            category: page
                .text_property(props::CATEGORY)
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            tags: page.multi_select(props::TAGS),
            excerpt: page.text_property(props::EXCERPT),
            cover_image: page
                .url_property(props::COVER_IMAGE)
                .map(|url| self.assets.resolve(&url, &page.id)),
            reading_time: page
                .number(props::READING_TIME)
                .filter(|n| n.is_finite() && *n > 0.0)
                .map(|n| n.round() as u32)
                .unwrap_or(0),
        })
    }
}

fn taxon(name: &str) -> Taxon {
    Taxon {
        name: name.to_string(),
        slug: slugify(name),
    }
}

fn not_found_as_post(err: NotepressError, page_id: &str) -> NotepressError {
    if err.is_not_found() {
        NotepressError::post_not_found(page_id)
    } else {
        err
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use notepress_notion::PaginatedList;
    use notepress_shared::{BlockKind, OBJECT_NOT_FOUND_CODE};
    use serde_json::{Value, json};

    /// In-memory document source. Ids are compared without hyphens.
    #[derive(Default)]
    pub(crate) struct FakeApi {
        pages: Vec<(String, Value)>,
        extra_hits: Vec<Value>,
        children: HashMap<String, Vec<Value>>,
        failures: Mutex<HashMap<String, u32>>,
        broken_pages: Vec<String>,
        pub(crate) child_calls: AtomicUsize,
    }

    fn norm(id: &str) -> String {
        id.replace('-', "")
    }

    fn not_found(id: &str) -> NotepressError {
        NotepressError::ExternalApi {
            status: Some(404),
            code: Some(OBJECT_NOT_FOUND_CODE.into()),
            message: format!("Could not find {id}"),
        }
    }

    fn paginate<T: Clone>(items: &[T], page_size: u32, cursor: Option<&str>) -> PaginatedList<T> {
        let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (start + page_size as usize).min(items.len());
        let has_more = end < items.len();
        PaginatedList {
            results: items[start..end].to_vec(),
            has_more,
            next_cursor: has_more.then(|| end.to_string()),
        }
    }

    impl FakeApi {
        pub(crate) fn with_page(mut self, page: Value) -> Self {
            let id = page["id"].as_str().expect("page id").to_string();
            self.pages.push((norm(&id), page));
            self
        }

        /// A search hit with no retrievable page behind it.
        pub(crate) fn with_dangling_hit(mut self, object: &str, id: &str) -> Self {
            self.extra_hits.push(json!({ "object": object, "id": id }));
            self
        }

        pub(crate) fn with_children(mut self, parent: &str, blocks: Vec<Value>) -> Self {
            self.children.insert(norm(parent), blocks);
            self
        }

        /// Make every retrieval of page `id` fail with a server error.
        pub(crate) fn broken_page(mut self, id: &str) -> Self {
            self.broken_pages.push(norm(id));
            self
        }

        /// Make the next `times` child listings of `block` fail.
        pub(crate) fn failing(self, block: &str, times: u32) -> Self {
            self.failures
                .lock()
                .expect("lock")
                .insert(norm(block), times);
            self
        }
    }

    #[async_trait]
    impl DocumentApi for FakeApi {
        async fn search(
            &self,
            _query: &str,
            page_size: u32,
            cursor: Option<&str>,
        ) -> Result<PaginatedList<SearchResult>> {
            let mut hits: Vec<SearchResult> = self
                .pages
                .iter()
                .map(|(_, page)| serde_json::from_value(page.clone()).expect("hit"))
                .collect();
            hits.extend(
                self.extra_hits
                    .iter()
                    .map(|hit| serde_json::from_value(hit.clone()).expect("hit")),
            );
            Ok(paginate(&hits, page_size, cursor))
        }

        async fn retrieve_page(&self, page_id: &str) -> Result<RawPage> {
            let key = norm(page_id);
            if self.broken_pages.contains(&key) {
                return Err(NotepressError::ExternalApi {
                    status: Some(500),
                    code: Some("internal_server_error".into()),
                    message: "upstream failure".into(),
                });
            }
            self.pages
                .iter()
                .find(|(id, _)| *id == key)
                .map(|(_, page)| serde_json::from_value(page.clone()).expect("page"))
                .ok_or_else(|| not_found(page_id))
        }

        async fn list_block_children(
            &self,
            block_id: &str,
            page_size: u32,
            cursor: Option<&str>,
        ) -> Result<PaginatedList<RawBlock>> {
            self.child_calls.fetch_add(1, Ordering::SeqCst);
            let key = norm(block_id);

            {
                let mut failures = self.failures.lock().expect("lock");
                if let Some(remaining) = failures.get_mut(&key) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(NotepressError::ExternalApi {
                            status: Some(502),
                            code: None,
                            message: "bad gateway".into(),
                        });
                    }
                }
            }

            let blocks: Vec<RawBlock> = self
                .children
                .get(&key)
                .map(|values| {
                    values
                        .iter()
                        .map(|v| serde_json::from_value(v.clone()).expect("block"))
                        .collect()
                })
                .unwrap_or_default();
            Ok(paginate(&blocks, page_size, cursor))
        }
    }

    pub(crate) fn page(id: &str, title: &str, published: bool, created: &str) -> Value {
        json!({
            "object": "page",
            "id": id,
            "created_time": created,
            "last_edited_time": created,
            "properties": {
                "title": { "type": "title", "title": [{ "plain_text": title }] },
                "published": { "type": "checkbox", "checkbox": published },
                "category": { "type": "select", "select": { "name": "Rust" } },
                "tags": { "type": "multi_select", "multi_select": [{ "name": "async" }] }
            }
        })
    }

    pub(crate) fn text_block(id: &str, kind: &str, text: &str, has_children: bool) -> Value {
        json!({
            "object": "block",
            "id": id,
            "type": kind,
            "has_children": has_children,
            kind: { "rich_text": [{ "plain_text": text }] }
        })
    }

    fn options() -> FetchOptions {
        FetchOptions {
            page_size: 100,
            max_depth: 32,
            child_fetch_retries: 2,
            retry_backoff_ms: 0,
        }
    }

    fn fetcher(api: FakeApi) -> PostFetcher<FakeApi> {
        PostFetcher::new(api, AssetStrategy::default(), options())
    }

    const KOREAN_ID: &str = "8618d667-c89b-3708-a1b2-c3d4e5f6g7h8";

    #[tokio::test]
    async fn single_published_post_end_to_end() {
        let api = FakeApi::default()
            .with_page(page(KOREAN_ID, "첫 번째 포스트", true, "2024-01-01T00:00:00.000Z"))
            .with_children(
                KOREAN_ID,
                vec![
                    text_block("h1", "heading_1", "소개", false),
                    text_block("p1", "paragraph", "본문", false),
                ],
            );
        let fetcher = fetcher(api);

        let posts = fetcher.list_posts().await.expect("list");
        assert_eq!(posts.len(), 1);
        let slug = posts[0].slug().to_string();
        assert!(slug.ends_with("8618d667c89b3708a1b2c3d4e5f6g7h8"));
        assert!(slug.starts_with("첫-번째-포스트-"));

        let detail = fetcher.get_post_by_slug(&slug).await.expect("detail");
        assert_eq!(detail.post.title, "첫 번째 포스트");
        assert_eq!(detail.blocks.len(), 2);
        assert_eq!(detail.toc.len(), 1);
        assert_eq!(detail.toc[0].title, "소개");
        assert_eq!(detail.category.name, "Rust");
        assert_eq!(detail.tags[0].slug, "async");
        assert!(!detail.partial_content);
    }

    #[tokio::test]
    async fn listing_filters_and_sorts() {
        let api = FakeApi::default()
            .with_page(page("00000000-0000-0000-0000-000000000001", "Old", true, "2023-01-01T00:00:00Z"))
            .with_page(page("00000000-0000-0000-0000-000000000002", "Draft", false, "2024-06-01T00:00:00Z"))
            .with_page(page("00000000-0000-0000-0000-000000000003", "  ", true, "2024-06-01T00:00:00Z"))
            .with_page(page("00000000-0000-0000-0000-000000000004", "New", true, "2024-05-01T00:00:00Z"))
            .with_dangling_hit("page", "00000000-0000-0000-0000-0000000000ff")
            .with_dangling_hit("database", "00000000-0000-0000-0000-0000000000ee");

        let posts = fetcher(api).list_posts().await.expect("list");
        let titles: Vec<_> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["New", "Old"]);
        assert!(posts.iter().all(|p| p.published));
    }

    #[tokio::test]
    async fn listing_skips_failed_pages() {
        let broken = "00000000-0000-0000-0000-000000000001";
        let api = FakeApi::default()
            .with_page(page(broken, "Broken", true, "2024-01-01T00:00:00Z"))
            .with_page(page("00000000-0000-0000-0000-000000000002", "Good", true, "2024-02-01T00:00:00Z"))
            .broken_page(broken);

        let posts = fetcher(api).list_posts().await.expect("listing survives page errors");
        let titles: Vec<_> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["Good"]);
    }

    #[tokio::test]
    async fn property_defaults() {
        let api = FakeApi::default().with_page(json!({
            "object": "page",
            "id": "00000000-0000-0000-0000-000000000009",
            "properties": {
                "title": { "type": "title", "title": [{ "plain_text": "Bare" }] },
                "published": { "type": "checkbox", "checkbox": true },
                "readingTime": { "type": "number", "number": null }
            }
        }));

        let posts = fetcher(api).list_posts().await.expect("list");
        let post = &posts[0];
        assert_eq!(post.category, DEFAULT_CATEGORY);
        assert!(post.tags.is_empty());
        assert_eq!(post.reading_time, 0);
        assert!(post.excerpt.is_none());
        assert!(post.cover_image.is_none());
    }

    #[tokio::test]
    async fn search_and_children_paginate() {
        let mut api = FakeApi::default();
        for i in 0..5 {
            api = api.with_page(page(
                &format!("00000000-0000-0000-0000-00000000000{i}"),
                &format!("Post {i}"),
                true,
                "2024-01-01T00:00:00Z",
            ));
        }
        let blocks = (0..5)
            .map(|i| text_block(&format!("b{i}"), "paragraph", "x", false))
            .collect();
        api = api.with_children("00000000-0000-0000-0000-000000000000", blocks);

        let fetcher = PostFetcher::new(
            api,
            AssetStrategy::default(),
            FetchOptions {
                page_size: 2,
                ..options()
            },
        );

        assert_eq!(fetcher.list_posts().await.expect("list").len(), 5);
        let tree = fetcher
            .get_blocks_for_page("00000000-0000-0000-0000-000000000000")
            .await
            .expect("blocks");
        assert_eq!(tree.len(), 5);
        assert_eq!(tree[4].id, "b4");
    }

    #[tokio::test]
    async fn nested_children_are_loaded_depth_first() {
        let api = FakeApi::default()
            .with_children(
                "root",
                vec![
                    text_block("li", "bulleted_list_item", "parent", true),
                    text_block("p", "paragraph", "after", false),
                ],
            )
            .with_children("li", vec![text_block("li2", "bulleted_list_item", "child", true)])
            .with_children("li2", vec![text_block("p3", "paragraph", "grandchild", false)]);

        let tree = fetcher(api).get_blocks_for_page("root").await.expect("blocks");

        assert_eq!(tree[0].children_status, ChildrenStatus::Loaded);
        assert_eq!(tree[0].children[0].children[0].id, "p3");
        assert_eq!(tree[1].children_status, ChildrenStatus::Leaf);
        assert_eq!(tree[0].kind(), BlockKind::BulletedItem);
    }

    #[tokio::test]
    async fn transient_child_failure_is_retried() {
        let api = FakeApi::default()
            .with_children("root", vec![text_block("t", "toggle", "details", true)])
            .with_children("t", vec![text_block("p", "paragraph", "inside", false)])
            .failing("t", 2);

        let fetcher = fetcher(api);
        let tree = fetcher.get_blocks_for_page("root").await.expect("blocks");

        assert_eq!(tree[0].children_status, ChildrenStatus::Loaded);
        assert_eq!(tree[0].children.len(), 1);
        // root + two failures + success
        assert_eq!(fetcher.api.child_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn persistent_child_failure_is_recorded() {
        let api = FakeApi::default()
            .with_page(page(KOREAN_ID, "Partial", true, "2024-01-01T00:00:00Z"))
            .with_children(
                KOREAN_ID,
                vec![
                    text_block("t", "toggle", "details", true),
                    text_block("p", "paragraph", "still here", false),
                ],
            )
            .failing("t", u32::MAX);

        let detail = fetcher(api)
            .get_post_by_page_id(KOREAN_ID)
            .await
            .expect("detail despite failure");

        assert!(detail.partial_content);
        assert!(detail.blocks[0].children.is_empty());
        assert!(matches!(
            &detail.blocks[0].children_status,
            ChildrenStatus::Failed { reason } if reason.contains("502")
        ));
        assert_eq!(detail.blocks[1].block.plain_text(), "still here");
    }

    #[tokio::test]
    async fn depth_guard_truncates() {
        let api = FakeApi::default()
            .with_children("root", vec![text_block("a", "paragraph", "a", true)])
            .with_children("a", vec![text_block("b", "paragraph", "b", true)])
            .with_children("b", vec![text_block("c", "paragraph", "c", false)]);

        let fetcher = PostFetcher::new(
            api,
            AssetStrategy::default(),
            FetchOptions {
                max_depth: 1,
                ..options()
            },
        );
        let tree = fetcher.get_blocks_for_page("root").await.expect("blocks");

        assert_eq!(tree[0].children_status, ChildrenStatus::Loaded);
        assert_eq!(
            tree[0].children[0].children_status,
            ChildrenStatus::Truncated { depth: 2 }
        );
        assert!(tree[0].has_partial_content());
    }

    #[tokio::test]
    async fn detail_errors() {
        let draft = "00000000-0000-0000-0000-000000000002";
        let api = FakeApi::default().with_page(page(draft, "Draft", false, "2024-01-01T00:00:00Z"));
        let fetcher = fetcher(api);

        let unpublished = fetcher
            .get_post_by_slug(&format!("draft-{}", draft.replace('-', "")))
            .await
            .expect_err("unpublished");
        assert!(matches!(unpublished, NotepressError::PostNotFound { .. }));

        let missing = fetcher
            .get_post_by_slug(&format!("gone-{:0>32}", "dead"))
            .await
            .expect_err("missing");
        assert!(matches!(missing, NotepressError::PostNotFound { .. }));

        let invalid = fetcher.get_post_by_slug("my-post-abc").await.expect_err("invalid");
        assert!(matches!(invalid, NotepressError::InvalidSlugFormat { .. }));
    }

    #[tokio::test]
    async fn root_block_failure_is_fatal() {
        let api = FakeApi::default()
            .with_page(page(KOREAN_ID, "Broken", true, "2024-01-01T00:00:00Z"))
            .failing(KOREAN_ID, u32::MAX);

        let err = fetcher(api)
            .get_post_by_page_id(KOREAN_ID)
            .await
            .expect_err("root failure");
        assert!(matches!(err, NotepressError::ExternalApi { status: Some(502), .. }));
    }

    #[tokio::test]
    async fn categories_tags_and_markdown() {
        let mut other = page("00000000-0000-0000-0000-000000000002", "Second", true, "2024-02-01T00:00:00Z");
        other["properties"]["category"] = json!({ "type": "select", "select": { "name": "Life" } });
        other["properties"]["tags"] = json!({ "type": "multi_select", "multi_select": [] });

        let api = FakeApi::default()
            .with_page(page(KOREAN_ID, "First", true, "2024-01-01T00:00:00Z"))
            .with_page(other)
            .with_children(KOREAN_ID, vec![text_block("h", "heading_2", "Intro", false)]);
        let fetcher = fetcher(api);

        let categories = fetcher.get_categories().await.expect("categories");
        let names: Vec<_> = categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Life", "Rust"]);
        let slugs: Vec<_> = categories.iter().map(|c| c.slug.as_str()).collect();
        assert_eq!(slugs, ["life", "rust"]);

        let by_tag = fetcher.get_posts_by_tag("async").await.expect("by tag");
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].post.title, "First");

        let by_category = fetcher.get_posts_by_category("Life").await.expect("by category");
        assert_eq!(by_category.len(), 1);
        assert!(by_category[0].blocks.is_empty());

        let slug = by_tag[0].post.slug().to_string();
        let markdown = fetcher.get_post_markdown(&slug).await.expect("markdown");
        assert_eq!(markdown, "## Intro");
    }

    #[tokio::test]
    async fn cover_image_is_stabilized() {
        let mut p = page(KOREAN_ID, "Covered", true, "2024-01-01T00:00:00Z");
        p["properties"]["coverImage"] = json!({
            "type": "files",
            "files": [{ "type": "file", "file": {
                "url": "https://prod-files-secure.s3.us-west-2.amazonaws.com/ws/f/cover.png?sig=x"
            } }]
        });
        let posts = fetcher(FakeApi::default().with_page(p))
            .list_posts()
            .await
            .expect("list");

        let cover = posts[0].cover_image.as_deref().expect("cover");
        assert!(cover.starts_with("https://www.notion.so/image/"));
        assert!(cover.contains(&format!("id={KOREAN_ID}")));
    }

    #[test]
    fn taxon_slugs() {
        assert_eq!(taxon("Web Dev").slug, "web-dev");
        assert_eq!(taxon(DEFAULT_CATEGORY).slug, DEFAULT_CATEGORY);
    }
}

//! Cache lookup among the children of the current image

use super::Builder;
use crate::cache::CacheKey;
use crate::error::BoxerResult;
use crate::orchestration::ImageSummary;
use crate::ui;
use tracing::{debug, info};

impl Builder {
    /// Look for an image committed from the current image with `key` as its
    /// comment. On a hit the build state adopts the image and its
    /// configuration, and the caller skips the step.
    ///
    /// Children are visited in id order. When several children carry the
    /// same key any of them is an equivalent result, so the choice only
    /// needs to be stable, not meaningful.
    pub async fn consult_cache(&mut self, key: &CacheKey) -> BoxerResult<bool> {
        if self.settings.no_cache || key.is_empty() {
            return Ok(false);
        }
        let Some(current) = self.state.current_image().map(str::to_string) else {
            return Ok(false);
        };

        let mut children: Vec<ImageSummary> = self
            .interruptible("cache lookup", self.runtime.list_images())
            .await?
            .into_iter()
            .filter(|image| image.parent_id == current)
            .collect();
        children.sort_by(|a, b| a.id.cmp(&b.id));
        debug!(parent = %current, candidates = children.len(), key = %key, "Consulting cache");

        for child in children {
            let details = self
                .interruptible("cache lookup", self.runtime.inspect_image(&child.id))
                .await?;
            if details.comment == key.as_str() {
                info!(image = %details.id, key = %key, "Cache hit");
                ui::cache_hit(&details.id);
                self.state.adopt(details.id, &details.config);
                return Ok(true);
            }
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::fake::FakeRuntime;
    use crate::builder::{BuildSettings, CommitRequest};
    use crate::orchestration::ImageConfig;
    use std::sync::Arc;

    fn builder(runtime: &Arc<FakeRuntime>, no_cache: bool) -> Builder {
        let settings = BuildSettings {
            no_cache,
            ..BuildSettings::default()
        };
        Builder::new(runtime.clone(), settings)
    }

    fn base_config() -> ImageConfig {
        ImageConfig {
            working_dir: "/".to_string(),
            cmd: vec!["bash".to_string()],
            ..ImageConfig::default()
        }
    }

    #[tokio::test]
    async fn miss_without_current_image() {
        let runtime = Arc::new(FakeRuntime::new());
        let mut b = builder(&runtime, false);

        let hit = b.consult_cache(&CacheKey::for_step("run", "ls")).await.unwrap();
        assert!(!hit);
        assert_eq!(runtime.count("images"), 0);
    }

    #[tokio::test]
    async fn empty_key_never_hits() {
        let runtime = Arc::new(FakeRuntime::new().with_image("debian", base_config()));
        let mut b = builder(&runtime, false);
        b.state_mut().set_base("debian", "base-debian".to_string(), &base_config());
        b.commit(CommitRequest::new(CacheKey::empty())).await.unwrap();
        b.state_mut().set_image("base-debian".to_string());

        assert!(!b.consult_cache(&CacheKey::empty()).await.unwrap());
        assert_eq!(runtime.count("images"), 0);
    }

    #[tokio::test]
    async fn hit_adopts_child_and_config() {
        let runtime = Arc::new(FakeRuntime::new().with_image("debian", base_config()));
        let mut b = builder(&runtime, false);
        b.state_mut().set_base("debian", "base-debian".to_string(), &base_config());

        b.state_mut().config.user = "app".to_string();
        let committed = b
            .commit(CommitRequest::new(CacheKey::for_step("user", "app")))
            .await
            .unwrap();

        let mut fresh = builder(&runtime, false);
        fresh
            .state_mut()
            .set_base("debian", "base-debian".to_string(), &base_config());

        let hit = fresh
            .consult_cache(&CacheKey::for_step("user", "app"))
            .await
            .unwrap();
        assert!(hit);
        assert_eq!(fresh.state().current_image(), Some(committed.as_str()));
        assert_eq!(fresh.state().config.user, "app");
    }

    #[tokio::test]
    async fn different_key_misses() {
        let runtime = Arc::new(FakeRuntime::new().with_image("debian", base_config()));
        let mut b = builder(&runtime, false);
        b.state_mut().set_base("debian", "base-debian".to_string(), &base_config());
        b.commit(CommitRequest::new(CacheKey::for_step("run", "ls")))
            .await
            .unwrap();
        b.state_mut().set_image("base-debian".to_string());

        let hit = b
            .consult_cache(&CacheKey::for_step("run", "ls -l"))
            .await
            .unwrap();
        assert!(!hit);
        assert_eq!(b.state().current_image(), Some("base-debian"));
    }

    #[tokio::test]
    async fn only_children_of_current_image_are_candidates() {
        let runtime = Arc::new(FakeRuntime::new().with_image("debian", base_config()));
        let mut b = builder(&runtime, false);
        b.state_mut().set_base("debian", "base-debian".to_string(), &base_config());
        let first = b
            .commit(CommitRequest::new(CacheKey::for_step("run", "a")))
            .await
            .unwrap();
        b.commit(CommitRequest::new(CacheKey::for_step("run", "b")))
            .await
            .unwrap();

        // "run b" is a grandchild of the base, not a child
        b.state_mut().set_image("base-debian".to_string());
        assert!(!b.consult_cache(&CacheKey::for_step("run", "b")).await.unwrap());

        b.state_mut().set_image(first);
        assert!(b.consult_cache(&CacheKey::for_step("run", "b")).await.unwrap());
    }

    #[tokio::test]
    async fn cancelled_lookup_stops_before_listing() {
        let runtime = Arc::new(FakeRuntime::new().with_image("debian", base_config()));
        let cancel = tokio_util::sync::CancellationToken::new();
        let mut b = builder(&runtime, false).with_cancel(cancel.clone());
        b.state_mut().set_base("debian", "base-debian".to_string(), &base_config());
        cancel.cancel();

        let err = b
            .consult_cache(&CacheKey::for_step("run", "ls"))
            .await
            .unwrap_err();

        assert!(
            matches!(err, crate::error::BoxerError::Cancelled { ref operation } if operation == "cache lookup")
        );
        assert_eq!(runtime.count("images"), 0);
        assert_eq!(b.state().current_image(), Some("base-debian"));
    }

    #[tokio::test]
    async fn no_cache_never_hits() {
        let runtime = Arc::new(FakeRuntime::new().with_image("debian", base_config()));
        let mut cached = builder(&runtime, false);
        cached
            .state_mut()
            .set_base("debian", "base-debian".to_string(), &base_config());
        cached
            .commit(CommitRequest::new(CacheKey::for_step("run", "ls")))
            .await
            .unwrap();

        let mut b = builder(&runtime, true);
        b.state_mut().set_base("debian", "base-debian".to_string(), &base_config());

        assert!(!b.consult_cache(&CacheKey::for_step("run", "ls")).await.unwrap());
        assert_eq!(runtime.count("images"), 0);
    }
}

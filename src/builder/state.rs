//! Build state threaded through every step

use crate::orchestration::ImageConfig;
use std::ops::{Deref, DerefMut};

/// Fields a scoped step can override for its nested block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopedField {
    User,
    WorkingDir,
}

/// Mutable record of the image being built
///
/// `config` holds the canonical configuration committed into every image.
/// Scoped overrides only shape the ephemeral containers created inside a
/// scope and never reach a committed image.
#[derive(Debug, Clone, Default)]
pub struct BuildState {
    base_image: Option<String>,
    /// Canonical image configuration
    pub config: ImageConfig,
    image: Option<String>,
    tracked_image: Option<String>,
    scoped_user: Option<String>,
    scoped_workdir: Option<String>,
}

impl BuildState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Image reference named by the first `from` step
    pub fn base_image(&self) -> Option<&str> {
        self.base_image.as_deref()
    }

    /// Current image id; always an image that exists on the runtime
    pub fn current_image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// Image produced by the most recent step, cleared when a scope exits
    pub fn tracked_image(&self) -> Option<&str> {
        self.tracked_image.as_deref()
    }

    /// Record the base image. The reference is kept from the first call on;
    /// later calls only move the current image.
    pub fn set_base(&mut self, reference: &str, image_id: String, config: &ImageConfig) {
        if self.base_image.is_none() {
            self.base_image = Some(reference.to_string());
        }
        self.adopt(image_id, config);
    }

    /// Point the state at a freshly committed image
    pub fn set_image(&mut self, image_id: String) {
        self.tracked_image = Some(image_id.clone());
        self.image = Some(image_id);
    }

    /// Take over an existing image and its configuration
    pub fn adopt(&mut self, image_id: String, config: &ImageConfig) {
        self.config.user = config.user.clone();
        self.config.working_dir = config.working_dir.clone();
        self.config.cmd = config.cmd.clone();
        self.config.entrypoint = config.entrypoint.clone();
        self.set_image(image_id);
    }

    /// Current scoped override for a field
    pub fn scoped(&self, field: ScopedField) -> Option<&str> {
        match field {
            ScopedField::User => self.scoped_user.as_deref(),
            ScopedField::WorkingDir => self.scoped_workdir.as_deref(),
        }
    }

    fn replace_scoped(&mut self, field: ScopedField, value: Option<String>) -> Option<String> {
        let slot = match field {
            ScopedField::User => &mut self.scoped_user,
            ScopedField::WorkingDir => &mut self.scoped_workdir,
        };
        std::mem::replace(slot, value)
    }

    /// Configuration for the next ephemeral container: canonical fields with
    /// scoped overrides applied on top
    pub fn effective_config(&self) -> ImageConfig {
        let mut config = self.config.clone();
        if let Some(user) = self.scoped(ScopedField::User) {
            config.user = user.to_string();
        }
        if let Some(workdir) = self.scoped(ScopedField::WorkingDir) {
            config.working_dir = workdir.to_string();
        }
        config
    }
}

/// Anything that owns a [`BuildState`] a scope can be opened on
pub trait HasBuildState {
    fn build_state(&mut self) -> &mut BuildState;
}

impl HasBuildState for BuildState {
    fn build_state(&mut self) -> &mut BuildState {
        self
    }
}

/// Scoped override of a user or working directory
///
/// While the guard lives the field is set for every nested step. Dropping it,
/// on success or error, restores the prior value and clears the tracked image
/// so the next sibling step re-resolves against the outer configuration.
pub struct ScopeGuard<'a, S: HasBuildState> {
    owner: &'a mut S,
    field: ScopedField,
    prior: Option<String>,
}

impl<'a, S: HasBuildState> ScopeGuard<'a, S> {
    pub fn enter(owner: &'a mut S, field: ScopedField, value: impl Into<String>) -> Self {
        let prior = owner
            .build_state()
            .replace_scoped(field, Some(value.into()));
        Self {
            owner,
            field,
            prior,
        }
    }
}

impl<S: HasBuildState> Deref for ScopeGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.owner
    }
}

impl<S: HasBuildState> DerefMut for ScopeGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.owner
    }
}

impl<S: HasBuildState> Drop for ScopeGuard<'_, S> {
    fn drop(&mut self) {
        let prior = self.prior.take();
        let state = self.owner.build_state();
        state.replace_scoped(self.field, prior);
        state.tracked_image = None;
    }
}

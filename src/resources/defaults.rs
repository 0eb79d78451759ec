//! macOS preference resources backed by `defaults` and `duti`.
use anyhow::Result;

use super::{Resource, ResourceChange, ResourceState};
use crate::config::macos::DefaultsValue;
use crate::exec::Executor;

/// One preference key in one domain.
#[derive(Debug)]
pub struct DefaultsResource<'a> {
    /// Preference domain, e.g. `com.apple.dock`.
    pub domain: String,
    /// Preference key.
    pub key: String,
    /// Desired value.
    pub value: DefaultsValue,
    /// Whether writes go through `sudo`.
    pub sudo: bool,
    executor: &'a dyn Executor,
}

impl<'a> DefaultsResource<'a> {
    /// Create a new preference resource.
    #[must_use]
    pub const fn new(
        domain: String,
        key: String,
        value: DefaultsValue,
        sudo: bool,
        executor: &'a dyn Executor,
    ) -> Self {
        Self {
            domain,
            key,
            value,
            sudo,
            executor,
        }
    }
}

impl Resource for DefaultsResource<'_> {
    type Error = anyhow::Error;

    fn description(&self) -> String {
        format!("{} {} = {}", self.domain, self.key, self.value)
    }

    fn current_state(&self) -> Result<ResourceState> {
        let result = self
            .executor
            .run_unchecked("defaults", &["read", &self.domain, &self.key])?;
        if !result.success {
            return Ok(ResourceState::Missing);
        }
        if self.value.matches_read(&result.stdout) {
            Ok(ResourceState::Correct)
        } else {
            Ok(ResourceState::Incorrect {
                current: result.stdout.trim().to_string(),
            })
        }
    }

    fn apply(&self) -> Result<ResourceChange> {
        let value = self.value.to_string();
        let args = [
            "write",
            self.domain.as_str(),
            self.key.as_str(),
            self.value.type_flag(),
            value.as_str(),
        ];
        if self.sudo {
            let mut sudo_args = vec!["defaults"];
            sudo_args.extend(args);
            self.executor.run("sudo", &sudo_args)?;
        } else {
            self.executor.run("defaults", &args)?;
        }
        Ok(ResourceChange::Applied)
    }
}

/// The default handler application for one file type or UTI.
#[derive(Debug)]
pub struct DefaultAppResource<'a> {
    /// Application bundle id.
    pub bundle_id: String,
    /// File extension (with leading dot) or UTI.
    pub file_type: String,
    executor: &'a dyn Executor,
}

impl<'a> DefaultAppResource<'a> {
    /// Create a new default-application resource.
    #[must_use]
    pub const fn new(bundle_id: String, file_type: String, executor: &'a dyn Executor) -> Self {
        Self {
            bundle_id,
            file_type,
            executor,
        }
    }
}

impl Resource for DefaultAppResource<'_> {
    type Error = anyhow::Error;

    fn description(&self) -> String {
        format!("{} → {}", self.file_type, self.bundle_id)
    }

    /// Only extensions can be queried (`duti -x`); UTIs always report
    /// [`ResourceState::Missing`] and are re-applied every run.
    fn current_state(&self) -> Result<ResourceState> {
        let Some(ext) = self.file_type.strip_prefix('.') else {
            return Ok(ResourceState::Missing);
        };
        let result = self.executor.run_unchecked("duti", &["-x", ext])?;
        if !result.success {
            return Ok(ResourceState::Missing);
        }
        // Output is: application name, bundle path, bundle id.
        match result.stdout.lines().nth(2).map(str::trim) {
            Some(id) if id.eq_ignore_ascii_case(&self.bundle_id) => Ok(ResourceState::Correct),
            Some(id) => Ok(ResourceState::Incorrect {
                current: id.to_string(),
            }),
            None => Ok(ResourceState::Missing),
        }
    }

    fn apply(&self) -> Result<ResourceChange> {
        self.executor
            .run("duti", &["-s", &self.bundle_id, &self.file_type, "all"])?;
        Ok(ResourceChange::Applied)
    }
}

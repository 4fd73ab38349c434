//! Display templates
//!
//! A display template describes how to bring up a display of a given type
//! (typically the command line of an X server or greeter) without naming the
//! session it will serve. Templates live as `<name>.display` files in a
//! well-known directory and consist of a leading `[Display]` group carrying
//! the `Type=` key, followed by a `[<Type>]` group whose keys become the
//! template's parameters:
//!
//! ```text
//! [Display]
//! Type=X11
//!
//! [X11]
//! Exec=/usr/bin/Xorg $display vt$vt
//! ```
//!
//! Parameters may contain `$variable` placeholders; see [`substitution`].
//! Templates are immutable once loaded and are shared as
//! [`Arc<DisplayTemplate>`]. The [`TemplateRegistry`] memoizes them by name;
//! lookups that fail (missing file, malformed file, missing `Type=`) are not
//! cached, so a template added on disk later becomes visible.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use tracing::warn;

use crate::utils::keyfile::{KeyFile, KeyFileError};

pub mod substitution;

/// Directory the process-wide registry loads templates from.
pub const DISPLAY_TEMPLATES_DIR: &str = "/etc/seatsmith/displays.d";

/// A named, parameterized description of how to start a display.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayTemplate {
    name: String,
    display_type: String,
    parameters: IndexMap<String, String>,
}

/// Errors produced while loading a display template file.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// The file could not be read or parsed.
    #[error(transparent)]
    KeyFile(#[from] KeyFileError),
    /// The file does not start with a `[Display]` group.
    #[error("not a display template file")]
    NotATemplate,
    /// The `[Display]` group lacks the `Type=` key.
    #[error("display template lacks a Type")]
    MissingType,
}

impl DisplayTemplate {
    /// Creates a template directly, without touching the filesystem.
    ///
    /// Embedders use this for built-in defaults; template files go through
    /// [`DisplayTemplate::load`] or a [`TemplateRegistry`].
    pub fn new(
        name: impl Into<String>,
        display_type: impl Into<String>,
        parameters: IndexMap<String, String>,
    ) -> DisplayTemplate {
        DisplayTemplate {
            name: name.into(),
            display_type: display_type.into(),
            parameters,
        }
    }

    /// Loads the template named `name` from `dir`.
    pub fn load(name: &str, dir: &Path) -> Result<DisplayTemplate, TemplateError> {
        let path = dir.join(format!("{name}.display"));
        let file = KeyFile::load(&path)?;

        if file.start_group() != Some("Display") {
            return Err(TemplateError::NotATemplate);
        }

        let display_type = file
            .get("Display", "Type")
            .filter(|ty| !ty.is_empty())
            .ok_or(TemplateError::MissingType)?
            .to_owned();

        // The Hidden flag is accepted but has no meaning for templates.
        let _ = file.get_bool("Display", "Hidden");

        let parameters = file
            .keys(&display_type)
            .into_iter()
            .filter_map(|key| {
                file.get(&display_type, &key)
                    .map(|value| (key.clone(), value.to_owned()))
            })
            .collect();

        Ok(DisplayTemplate {
            name: name.to_owned(),
            display_type,
            parameters,
        })
    }

    /// The template's name (its file basename).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The display type, e.g. `X11`.
    pub fn display_type(&self) -> &str {
        &self.display_type
    }

    /// The template's parameters, in file order, placeholders unexpanded.
    pub fn parameters(&self) -> &IndexMap<String, String> {
        &self.parameters
    }
}

/// A memoizing, by-name store of display templates.
///
/// The registry is a value so that tests and embedders can point it at any
/// directory; [`TemplateRegistry::system`] is the shared process-wide
/// instance rooted at [`DISPLAY_TEMPLATES_DIR`].
#[derive(Debug)]
pub struct TemplateRegistry {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Arc<DisplayTemplate>>>,
}

static SYSTEM_REGISTRY: Lazy<TemplateRegistry> =
    Lazy::new(|| TemplateRegistry::new(PathBuf::from(DISPLAY_TEMPLATES_DIR)));

impl TemplateRegistry {
    /// Creates a registry loading from `dir`.
    pub fn new(dir: PathBuf) -> TemplateRegistry {
        TemplateRegistry {
            dir,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide registry over [`DISPLAY_TEMPLATES_DIR`].
    pub fn system() -> &'static TemplateRegistry {
        &SYSTEM_REGISTRY
    }

    /// Looks up the template named `name`, loading and caching it on a miss.
    ///
    /// Returns `None` (and logs) if the template cannot be loaded; negative
    /// results are not cached.
    pub fn get(&self, name: &str) -> Option<Arc<DisplayTemplate>> {
        if name.is_empty() {
            return None;
        }

        let mut cache = self.cache.lock().unwrap();
        if let Some(template) = cache.get(name) {
            return Some(template.clone());
        }

        match DisplayTemplate::load(name, &self.dir) {
            Ok(template) => {
                let template = Arc::new(template);
                cache.insert(name.to_owned(), template.clone());
                Some(template)
            }
            Err(err) => {
                warn!("unable to load display template '{}': {}", name, err);
                None
            }
        }
    }
}

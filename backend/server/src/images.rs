//! # Image Resolution
//!
//! Every slot of the quiz grid resolves to exactly one URL, first match wins:
//!
//! 1. The caller's override for that slot.
//! 2. `images/{slot}.jpg` under the static root.
//! 3. `images/{slot}.png` under the static root.
//! 4. `images/placeholder.png`.
//!
//! Defaults never change while the server runs, so the filesystem is probed once into
//! [`DefaultAssets`] and only probed again on an explicit reload.
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{
    database::{Store, StoreResult},
    error::AppError,
    identity::Identity,
};

pub const SLOT_COUNT: u8 = 100;
pub const STATIC_URL: &str = "/static";
pub const IMAGES_FOLDER: &str = "images";
pub const PLACEHOLDER: &str = "images/placeholder.png";

const DEFAULT_EXTENSIONS: [&str; 2] = ["jpg", "png"];

/// One of the numbered grid positions, always below [`SLOT_COUNT`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(u8);

impl Slot {
    pub fn new(value: u8) -> Option<Self> {
        (value < SLOT_COUNT).then_some(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Slot> {
        (0..SLOT_COUNT).map(Slot)
    }
}

impl FromStr for Slot {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(Slot::new)
            .ok_or(AppError::MalformedSlotNumber)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub fn static_url(relative_path: &str) -> String {
    format!("{STATIC_URL}/{}", relative_path.trim_start_matches('/'))
}

/// Precomputed default asset per slot, relative to the static root.
pub struct DefaultAssets {
    static_dir: PathBuf,
    entries: RwLock<Vec<Option<String>>>,
}

impl DefaultAssets {
    pub fn scan(static_dir: &Path) -> Self {
        let assets = Self {
            static_dir: static_dir.to_path_buf(),
            entries: RwLock::new(Vec::new()),
        };
        assets.reload();

        assets
    }

    /// Probes the filesystem again and returns how many slots have a default.
    pub fn reload(&self) -> usize {
        let entries: Vec<Option<String>> = Slot::all().map(|slot| self.probe(slot)).collect();
        let found = entries.iter().flatten().count();

        *self.entries.write() = entries;
        info!("Default assets indexed: {found}/{SLOT_COUNT} slots");

        found
    }

    fn probe(&self, slot: Slot) -> Option<String> {
        DEFAULT_EXTENSIONS
            .iter()
            .map(|extension| format!("{IMAGES_FOLDER}/{slot}.{extension}"))
            .find(|relative| self.static_dir.join(relative).is_file())
    }

    pub fn get(&self, slot: Slot) -> Option<String> {
        self.entries
            .read()
            .get(usize::from(slot.get()))
            .cloned()
            .flatten()
    }

    /// Steps 2 through 4 of the resolution order.
    pub fn fallback_url(&self, slot: Slot) -> String {
        match self.get(slot) {
            Some(relative) => static_url(&relative),
            None => static_url(PLACEHOLDER),
        }
    }

    pub fn url_for(&self, slot: Slot, override_path: Option<&str>) -> String {
        match override_path {
            Some(path) => {
                debug!("[Override] {slot} -> {path}");

                static_url(path)
            }
            None => self.fallback_url(slot),
        }
    }
}

pub async fn resolve_image(
    store: &dyn Store,
    defaults: &DefaultAssets,
    identity: &Identity,
    slot: Slot,
) -> StoreResult<String> {
    let stored = store.get_override(&identity.key(), slot).await?;

    Ok(defaults.url_for(slot, stored.as_deref()))
}

/// Resolves every slot in order with one store round trip.
pub async fn quiz_grid(
    store: &dyn Store,
    defaults: &DefaultAssets,
    identity: &Identity,
) -> StoreResult<Vec<(Slot, String)>> {
    let overrides = store.overrides(&identity.key()).await?;

    Ok(Slot::all()
        .map(|slot| {
            let url = defaults.url_for(slot, overrides.get(&slot).map(String::as_str));

            (slot, url)
        })
        .collect())
}

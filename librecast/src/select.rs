//! Content selection for an account's publish slot

use rand::Rng;

use crate::error::SlotError;
use crate::types::{Caption, Library, LibraryItem};

/// A chosen item plus the caption text to publish with it. An empty caption
/// is a valid selection; downstream adapters fall back to the item title.
#[derive(Debug, Clone)]
pub struct Selection {
    pub item: LibraryItem,
    pub caption: String,
}

/// Pick the library to draw from.
///
/// Always the first library in the supplied ordered sequence. Multi-library
/// rotation is a known future extension, deliberately not implemented here.
pub fn choose_library(libraries: &[Library]) -> Option<&Library> {
    libraries.first()
}

/// Uniformly random item among those belonging to `library_id`.
pub fn pick_item<'a, R: Rng>(
    items: &'a [LibraryItem],
    library_id: &str,
    rng: &mut R,
) -> Result<&'a LibraryItem, SlotError> {
    let candidates: Vec<&LibraryItem> =
        items.iter().filter(|i| i.library_id == library_id).collect();
    if candidates.is_empty() {
        return Err(SlotError::NoItemsAvailable(library_id.to_string()));
    }
    Ok(candidates[rng.gen_range(0..candidates.len())])
}

/// Uniformly random caption body among those tied to `item_id` and tagged
/// with `platform`. Returns the empty string when none match; that is the
/// documented fallback, not an error.
pub fn pick_caption<R: Rng>(
    captions: &[Caption],
    item_id: &str,
    platform: &str,
    rng: &mut R,
) -> String {
    let matching: Vec<&Caption> = captions
        .iter()
        .filter(|c| c.library_item_id == item_id && c.platform == platform)
        .collect();
    if matching.is_empty() {
        return String::new();
    }
    matching[rng.gen_range(0..matching.len())].body.clone()
}

/// Select an item and caption for one slot of an account on `platform`.
pub fn select_post<R: Rng>(
    libraries: &[Library],
    items: &[LibraryItem],
    captions: &[Caption],
    platform: &str,
    rng: &mut R,
) -> Result<Selection, SlotError> {
    let library = choose_library(libraries)
        .ok_or_else(|| SlotError::NoItemsAvailable("no libraries defined".to_string()))?;
    let item = pick_item(items, &library.id, rng)?;
    let caption = pick_caption(captions, &item.id, platform, rng);
    Ok(Selection {
        item: item.clone(),
        caption,
    })
}

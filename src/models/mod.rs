pub mod layout;
pub mod slide;

pub use layout::{Layout, ResolvedLayout};
pub use slide::{Deck, DeckMetadata, SlideRecord};

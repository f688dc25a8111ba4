mod listing;

pub use listing::{draw_listing, ListingProps};

// Hard caps on caller-supplied input. Exceeding any of them is an invalid request.

pub const MAX_NOTES_LEN: usize = 2_000;
pub const MAX_NOTE_BODY_LEN: usize = 4_000;
pub const MAX_REASON_LEN: usize = 256;
pub const MAX_PRODUCT_NAME_LEN: usize = 256;
pub const MAX_URL_LEN: usize = 2_048;

pub const MAX_CART_ITEMS: usize = 50;
pub const MAX_OPTIONS_PER_ITEM: usize = 20;
pub const MAX_QUANTITY: u32 = 20;

/// Widest date range accepted by admin listings.
pub const MAX_LISTING_RANGE_DAYS: i64 = 366;

pub const MAX_BUFFER_MINUTES: i64 = 240;

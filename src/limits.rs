//! Hard caps on input sizes and per-process resources.

pub const MAX_ID_LEN: usize = 128;
pub const MAX_LEAGUE_ID_LEN: usize = 128;
pub const MAX_LEAGUES: usize = 1024;
pub const MAX_NOTES_LEN: usize = 2000;
pub const MAX_GAME_TYPE_LEN: usize = 64;
pub const MAX_CONTACT_FIELD_LEN: usize = 256;
pub const MAX_FIELD_KEY_LEN: usize = 256;

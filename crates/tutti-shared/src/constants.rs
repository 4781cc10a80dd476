/// Application name
pub const APP_NAME: &str = "Tutti";

/// Group used when no group id is configured
pub const DEFAULT_GROUP_ID: &str = "main";

/// Instrument role forced into first position on director profiles
pub const CONDUCTOR_ROLE: &str = "Conductor";

/// Maximum number of instrument roles on a regular profile
pub const MAX_INSTRUMENTS: usize = 3;

/// Maximum number of instrument roles on a director profile (conductor included)
pub const MAX_DIRECTOR_INSTRUMENTS: usize = 2;

/// Maximum notification length in characters
pub const MAX_NOTIFICATION_LEN: usize = 500;

/// Wire formats for event dates and times
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// Realtime collection names
pub const EVENTS: &str = "events";
pub const REPERTOIRE: &str = "repertoire";
pub const NOTIFICATIONS: &str = "notifications";
pub const USERS: &str = "users";

/// Object storage prefix for profile pictures
pub const AVATARS: &str = "avatars";

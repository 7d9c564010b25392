// Follow graph and profile pages
pub mod follows;
pub mod profiles;

pub use follows::{follow, followed_author_ids, list_following, unfollow};
pub use profiles::{profile_stats, update_profile, ProfileError};

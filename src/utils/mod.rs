pub mod feature_flags;
pub mod suggest;
pub mod user_paths;

//! Portal content: ministries, news, amendments and leadership

mod desk;
mod types;

pub use desk::{ContentDesk, ContentFilter};
pub use types::{
    Amendment, ContentBody, ContentEntry, ContentKind, Deputy, Leader, Minister, Ministry,
    NewsItem, DEFAULT_AMENDMENT_STATUS,
};

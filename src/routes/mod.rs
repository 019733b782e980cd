//! HTTP handlers, grouped by resource:
//! - `/users` - registration and login
//! - `/documents` - PDF upload, listing and deletion
//! - `/chat` - chats over a document and their messages

pub mod chat;
pub mod documents;
pub mod users;

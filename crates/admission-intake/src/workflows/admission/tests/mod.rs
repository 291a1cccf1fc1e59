mod attachments;
mod common;
mod resolver;

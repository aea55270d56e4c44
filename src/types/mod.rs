//! Type definitions for the Postal API.

mod message;
mod result;

pub use message::{Attachment, Message, RawMessage};
pub use result::{SendResult, SUCCESS_STATUS};

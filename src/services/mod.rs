//! Service layer for the grade synchronizer.
//!
//! This module contains the business logic for:
//! - HTTP access (`PageTransport`, `ReqwestTransport`)
//! - Session handling (`SessionFetcher`, `LoginFormLocator`)
//! - Page extraction (`GradeExtractor`, `MoodleExtractor`)

mod extractor;
mod session;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use extractor::{GradeExtractor, MoodleExtractor};
pub use session::{
    Credentials, LoginForm, LoginFormLocator, SessionFetcher, SessionState,
    evaluate_login_response, response_indicates_session_loss,
};
pub use transport::{PageResponse, PageTransport, ReqwestTransport};

//! Social network session clients and HTML extractors.
//!
//! Only the Facebook mobile-lite pipeline exists today: credential login on
//! top of an [`avalon_http::HttpSession`], plus scrapers for the group list
//! and the account's own profile posts.
pub mod facebook;

// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod app;
pub mod common;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Shorthand paths used throughout the crate.
pub use infrastructure::network;
pub use services::portfolio;

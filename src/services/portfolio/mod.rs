// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

pub mod engine;
pub mod registry;
pub mod service;
pub mod swaps;
pub mod valuation;

pub use engine::PortfolioEngine;
pub use registry::AllocationRegistry;
pub use service::PortfolioService;
pub use swaps::SwapExecutor;
pub use valuation::PriceBook;

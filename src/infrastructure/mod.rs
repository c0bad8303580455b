// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod data;
pub mod exchange;
pub mod network;
pub mod pricing;

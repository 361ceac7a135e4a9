// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Lexer, parser, diff, and migration engine for the `.perm` permission
//! schema DSL.
//!
//! A `.perm` source file is tokenised ([`lexer`]), parsed into a
//! [`permix_core::model::Model`] ([`parser`]), compared against the
//! catalog's currently-applied model ([`diff`]), and applied atomically
//! ([`migrator`]).

pub mod diff;
pub mod lexer;
pub mod migrator;
pub mod parser;

pub use diff::{diff as diff_models, ModelDiff};
pub use migrator::{apply, MigrateOutcome};
pub use parser::{parse_file, Diagnostic};

//! **patchup** - Transactional batch find-and-replace for text files
//!
//! Applies a batch of literal edits to one or more files with
//! all-or-nothing semantics: every edit is validated in memory first, and
//! disk is only ever touched through backup-then-atomic-rename. Either
//! the whole request lands durably or the files are left exactly as found.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Core engine - matching, simulation, transactions
pub mod core {
    /// Literal substring matching with optional case folding
    pub mod matcher;
    pub use matcher::{find_positions, line_number_at, replace};

    /// Sequential in-memory simulation of an edit batch
    pub mod simulate;
    pub use simulate::{EditOp, EditOutcome, MatchFailure, simulate};

    /// Single-file lifecycle: read, backup, simulate, atomic write
    pub mod transaction;
    pub use transaction::{ApplyOptions, EditFailure, FileReport, apply_edits};

    /// Multi-file all-or-nothing batches with rollback
    pub mod coordinator;
    pub use coordinator::{BatchReport, FileEdits, Violation, apply_across_files};

    /// Request parsing, validation, and report rendering
    pub mod apply;
    pub use apply::run as apply_run;
}

/// Infrastructure - Configuration and durable I/O
pub mod infra {
    /// Configuration management with TOML support
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Strict UTF-8 reads and temp-then-rename atomic writes
    pub mod io;
    pub use io::{FsCause, backup_path_for, read_text, write_atomic};
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use core::{apply_across_files, apply_edits, apply_run, simulate};
pub use infra::{Config, load_config};

// Core types for external consumers
pub use core::{
    ApplyOptions, BatchReport, EditFailure, EditOp, EditOutcome, FileEdits, FileReport,
};

//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Command          | Meaning                                        |
//! |------|------------------|------------------------------------------------|
//! | 0    | all              | Success                                        |
//! | 2    | all              | Usage error (bad args, refused overwrite)      |
//! | 3    | run, validate    | Config failed to parse or a carton won't resolve |
//! | 4    | all              | Runtime / IO error (unreadable file, bad CSV)  |
//! | 5    | run              | One or more cartons failed                     |
//! | 6    | run `--strict`   | Outliers or ambiguous matches present          |
//! | 7    | check            | Listed cartons missing from the catalog        |
//!
//! clap reports its own argument errors with code 2, which matches `EXIT_USAGE`.

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Config is not valid TOML, fails structural validation, or (validate only)
/// a carton fails to resolve.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Cannot read or write a file, or an input file is malformed.
pub const EXIT_RUNTIME: u8 = 4;

/// The run finished but at least one carton hit a fatal error.
pub const EXIT_CARTON_FAILURES: u8 = 5;

/// `--strict` and at least one outlier or ambiguous entry was recorded.
pub const EXIT_STRICT_FLAGS: u8 = 6;

/// At least one listed (carton, plan, category) is not in the catalog.
pub const EXIT_MISSING_CARTONS: u8 = 7;

//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: cron jobs and scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, no match)     |
//! | 3       | Universal        | Configuration error                      |
//! | 10-19   | icat             | Session, transport and server errors     |
//! | 20-29   | check-sizes      | Size reconciliation preconditions        |
//!
//! A check-sizes pass that finds mismatches still exits 0: it is a
//! reporting tool, not a gate.
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `CliError`'s conversions in main.rs

// =============================================================================
// Universal (0-3)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure, including responses the client
/// cannot make sense of.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, selector matched nothing.
pub const EXIT_USAGE: u8 = 2;

/// Configuration error - unreadable config file, unknown section,
/// missing URL or credentials.
pub const EXIT_CONFIG: u8 = 3;

// =============================================================================
// ICAT (10-19)
// =============================================================================

/// Login rejected or session invalid.
pub const EXIT_ICAT_AUTH: u8 = 10;

/// Network or HTTP error talking to ICAT or IDS.
pub const EXIT_ICAT_NETWORK: u8 = 11;

/// Server reported an ICAT error (`{"code": ..., "message": ...}`).
pub const EXIT_ICAT_SERVER: u8 = 12;

// =============================================================================
// check-sizes (20-29)
// =============================================================================

/// Server schema lacks fileCount/fileSize on Dataset or Investigation.
pub const EXIT_CHECK_UNSUPPORTED: u8 = 20;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_CONFIG,
            EXIT_ICAT_AUTH,
            EXIT_ICAT_NETWORK,
            EXIT_ICAT_SERVER,
            EXIT_CHECK_UNSUPPORTED,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }
}

//! Hash-code command handler.

use std::io::Write;

use chatrelay_core::hash_access_code;

use crate::error::CliError;

/// Write `<hash>  <code>` for each code, one per line.
///
/// Blank codes are skipped the same way the `CODE` list skips them.
pub fn execute(codes: &[String], out: &mut impl Write) -> Result<(), CliError> {
    for code in codes.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
        writeln!(out, "{}  {code}", hash_access_code(code))?;
    }
    Ok(())
}

use crate::application::engine::AccountAudit;
use crate::error::Result;
use std::io::Write;

/// Writes the final per-user balances as CSV:
/// `username,role,balance,history_total`.
pub struct BalanceWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BalanceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_audits(&mut self, audits: Vec<AccountAudit>) -> Result<()> {
        for audit in audits {
            self.writer.serialize(audit)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

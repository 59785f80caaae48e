use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Register,
    Earn,
    Adjust,
    Product,
    Update,
    Delete,
    Purchase,
    Settings,
    Wait,
}

/// One row of a replay file: `op, user, target, amount, stock, note`.
///
/// Which columns matter depends on `op`; the rest may be left empty.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
pub struct Command {
    pub op: CommandKind,
    #[serde(default)]
    pub user: Option<String>,
    /// Product name for catalog and purchase commands.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub stock: Option<u64>,
    #[serde(default)]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_deserialization_with_empty_columns() {
        let csv = "op, user, target, amount, stock, note\nadjust, alice, , -100, , penalty";
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(csv.as_bytes());
        let mut iter = reader.deserialize();

        let result: Command = iter
            .next()
            .unwrap()
            .expect("Failed to deserialize command");

        assert_eq!(result.op, CommandKind::Adjust);
        assert_eq!(result.user.as_deref(), Some("alice"));
        assert_eq!(result.target, None);
        assert_eq!(result.amount, Some(-100));
        assert_eq!(result.note.as_deref(), Some("penalty"));
    }
}

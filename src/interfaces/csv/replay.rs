use super::command::{Command, CommandKind};
use crate::application::engine::EconomyEngine;
use crate::domain::clock::ManualClock;
use crate::domain::product::{NewProduct, ProductPatch};
use crate::domain::settings::SettingsPatch;
use crate::domain::user::{NewUser, Principal};
use crate::error::{LedgerError, Result};
use std::sync::Arc;

/// Drives an `EconomyEngine` from parsed commands.
///
/// Users and products are addressed by name. Admin commands run as the
/// bootstrap admin. Time only moves on `wait`, so a replay produces the same
/// result no matter how fast it runs.
pub struct Replayer {
    engine: EconomyEngine,
    clock: Arc<ManualClock>,
    admin: Principal,
}

fn required<T>(value: Option<T>, column: &str, op: CommandKind) -> Result<T> {
    value.ok_or_else(|| LedgerError::Validation(format!("{op:?} needs the `{column}` column")))
}

fn non_negative(value: i64, column: &str) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| LedgerError::Validation(format!("`{column}` must not be negative")))
}

impl Replayer {
    pub fn new(engine: EconomyEngine, clock: Arc<ManualClock>, admin: Principal) -> Self {
        Self {
            engine,
            clock,
            admin,
        }
    }

    pub fn engine(&self) -> &EconomyEngine {
        &self.engine
    }

    pub async fn apply(&self, command: Command) -> Result<()> {
        let op = command.op;
        let ledger = self.engine.ledger();
        let catalog = self.engine.catalog();
        match op {
            CommandKind::Register => {
                let username = required(command.user, "user", op)?;
                let email = command
                    .note
                    .unwrap_or_else(|| format!("{username}@localhost"));
                ledger.register(NewUser::new(username, email)).await?;
            }
            CommandKind::Earn => {
                let user = ledger
                    .user_by_username(&required(command.user, "user", op)?)
                    .await?;
                ledger.earn(&user.id).await?;
            }
            CommandKind::Adjust => {
                let user = ledger
                    .user_by_username(&required(command.user, "user", op)?)
                    .await?;
                let delta = required(command.amount, "amount", op)?;
                let reason = command.note.unwrap_or_default();
                ledger
                    .admin_adjust(&self.admin, &user.id, delta, &reason)
                    .await?;
            }
            CommandKind::Product => {
                let input = NewProduct {
                    name: required(command.target, "target", op)?,
                    description: command.note.unwrap_or_default(),
                    price: non_negative(required(command.amount, "amount", op)?, "amount")?,
                    stock: command.stock.unwrap_or(0),
                };
                catalog.create_product(&self.admin, input).await?;
            }
            CommandKind::Update => {
                let product = catalog
                    .product_by_name(&required(command.target, "target", op)?)
                    .await?;
                let patch = ProductPatch {
                    name: None,
                    description: command.note,
                    price: command
                        .amount
                        .map(|price| non_negative(price, "amount"))
                        .transpose()?,
                    stock: command.stock,
                };
                catalog
                    .update_product(&self.admin, &product.id, patch)
                    .await?;
            }
            CommandKind::Delete => {
                let product = catalog
                    .product_by_name(&required(command.target, "target", op)?)
                    .await?;
                catalog.delete_product(&self.admin, &product.id).await?;
            }
            CommandKind::Purchase => {
                let user = ledger
                    .user_by_username(&required(command.user, "user", op)?)
                    .await?;
                let product = catalog
                    .product_by_name(&required(command.target, "target", op)?)
                    .await?;
                catalog.purchase(&user.id, &product.id).await?;
            }
            CommandKind::Settings => {
                let patch: SettingsPatch = required(command.note, "note", op)?.parse()?;
                self.engine.settings().update(&self.admin, patch).await?;
            }
            CommandKind::Wait => {
                let secs = required(command.amount, "amount", op)?;
                non_negative(secs, "amount")?;
                self.clock.advance_secs(secs)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::domain::clock::Clock;
    use crate::domain::user::Credits;
    use crate::infrastructure::in_memory::InMemoryStore;
    use crate::interfaces::csv::command_reader::CommandReader;
    use chrono::{DateTime, Utc};

    async fn replayer() -> Replayer {
        replayer_at(DateTime::UNIX_EPOCH).await
    }

    async fn replayer_at(start: DateTime<Utc>) -> Replayer {
        let clock = Arc::new(ManualClock::new(start));
        let engine = EconomyEngine::new(
            Arc::new(InMemoryStore::new()),
            clock.clone(),
            LedgerConfig::default(),
        );
        let admin = engine.bootstrap().await.unwrap().principal();
        Replayer::new(engine, clock, admin)
    }

    async fn run(replayer: &Replayer, csv: &str) -> Vec<Result<()>> {
        let mut results = Vec::new();
        for command in CommandReader::new(csv.as_bytes()).commands() {
            results.push(match command {
                Ok(command) => replayer.apply(command).await,
                Err(e) => Err(e),
            });
        }
        results
    }

    #[tokio::test]
    async fn test_replay_shop_session() {
        let replayer = replayer().await;
        let csv = "\
op,user,target,amount,stock,note
register,alice,,,,
earn,alice,,,,
earn,alice,,,,
wait,,,300,,
earn,alice,,,,
adjust,alice,,50,,welcome
product,,Hat,50,1,A hat
purchase,alice,Hat,,,
purchase,alice,Hat,,,
";
        let results = run(&replayer, csv).await;
        assert!(results[0].is_ok());
        assert!(matches!(
            results[2],
            Err(LedgerError::RateLimited {
                remaining_seconds: 300
            })
        ));
        assert!(results[7].is_ok());
        assert!(matches!(results[8], Err(LedgerError::OutOfStock(_))));

        let alice = replayer
            .engine()
            .ledger()
            .user_by_username("alice")
            .await
            .unwrap();
        assert_eq!(alice.balance, Credits::new(4));
    }

    #[tokio::test]
    async fn test_replay_settings_and_validation() {
        let replayer = replayer().await;
        let csv = r#"op,user,target,amount,stock,note
settings,,,,,"{""credit_amount"": 10}"
register,bob,,,,
earn,bob,,,,
earn,nobody,,,,
product,,Broken,-5,1,
wait,,,-1,,
wait,,,9223372036854775807,,
"#;
        let results = run(&replayer, csv).await;
        assert!(results[0].is_ok());
        assert!(matches!(results[3], Err(LedgerError::UnknownUser(_))));
        assert!(matches!(results[4], Err(LedgerError::Validation(_))));
        assert!(matches!(results[5], Err(LedgerError::Validation(_))));
        assert!(matches!(results[6], Err(LedgerError::Validation(_))));

        let bob = replayer
            .engine()
            .ledger()
            .user_by_username("bob")
            .await
            .unwrap();
        assert_eq!(bob.balance, Credits::new(10));
    }

    #[tokio::test]
    async fn test_replay_wait_beyond_date_range_keeps_clock() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let replayer = replayer_at(start).await;
        let csv = "\
op,user,target,amount,stock,note
register,alice,,,,
earn,alice,,,,
wait,,,100000000000000,,
earn,alice,,,,
wait,,,300,,
earn,alice,,,,
";
        let results = run(&replayer, csv).await;
        assert!(matches!(results[2], Err(LedgerError::Validation(_))));
        assert!(matches!(
            results[3],
            Err(LedgerError::RateLimited {
                remaining_seconds: 300
            })
        ));
        assert!(results[5].is_ok());
        assert_eq!(replayer.clock.now(), start + chrono::Duration::seconds(300));
    }
}

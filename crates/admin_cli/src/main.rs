use std::{error::Error, io::Write, time::Duration};

use clap::{Args, Parser, Subcommand};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
    terminal::ClearType,
};
use engine::{
    Account, Engine, Fund, FundCategory, Money, RiskTier, Transfer,
    commands::{ExecuteTransferCmd, NewFundCmd, OpenAccountCmd, UpdateFundCmd},
};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "isa_admin")]
#[command(about = "Admin utilities for the ISA service (accounts, funds, investments)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:./isa.db?mode=rwc")]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Account(AccountArgs),
    Fund(FundArgs),
    /// Attach a fund to an account that has none yet.
    Associate(AssociateArgs),
    /// Move cash from an account into its fund.
    Invest(InvestArgs),
    /// List the transfers of an account, oldest first.
    Transfers(TransfersArgs),
}

#[derive(Args, Debug)]
struct AccountArgs {
    #[command(subcommand)]
    command: AccountCommand,
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    Open(AccountOpenArgs),
    Show(AccountShowArgs),
}

#[derive(Args, Debug)]
struct AccountOpenArgs {
    #[arg(long)]
    owner: String,
    #[arg(long, default_value = "0", value_parser = parse_money)]
    cash: Money,
}

#[derive(Args, Debug)]
struct AccountShowArgs {
    #[arg(long)]
    id: Uuid,
}

#[derive(Args, Debug)]
struct FundArgs {
    #[command(subcommand)]
    command: FundCommand,
}

#[derive(Subcommand, Debug)]
enum FundCommand {
    Create(FundCreateArgs),
    List,
    Update(FundUpdateArgs),
}

#[derive(Args, Debug)]
struct FundCreateArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    description: String,
    /// Equity, Bond, Index or Mixed.
    #[arg(long, value_parser = parse_category)]
    category: FundCategory,
    /// Low, Medium or High.
    #[arg(long, value_parser = parse_risk)]
    risk: RiskTier,
    #[arg(long, default_value = "0", value_parser = parse_money)]
    performance: Money,
    /// Opening aggregate total.
    #[arg(long, default_value = "0", value_parser = parse_money)]
    total: Money,
}

#[derive(Args, Debug)]
struct FundUpdateArgs {
    #[arg(long)]
    id: Uuid,
    #[arg(long)]
    name: String,
    #[arg(long)]
    description: String,
}

#[derive(Args, Debug)]
struct AssociateArgs {
    #[arg(long)]
    account: Uuid,
    #[arg(long)]
    fund: Uuid,
}

#[derive(Args, Debug)]
struct InvestArgs {
    #[arg(long)]
    account: Uuid,
    #[arg(long)]
    fund: Uuid,
    #[arg(long, value_parser = parse_money)]
    amount: Money,
    /// Reusing a key returns the first transfer instead of debiting again.
    #[arg(long)]
    key: Option<String>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Skip the confirmation prompt.
    #[arg(long, short)]
    yes: bool,
}

#[derive(Args, Debug)]
struct TransfersArgs {
    #[arg(long)]
    account: Uuid,
}

fn parse_money(raw: &str) -> Result<Money, String> {
    raw.parse().map_err(|err: engine::EngineError| err.to_string())
}

fn parse_category(raw: &str) -> Result<FundCategory, String> {
    FundCategory::try_from(raw).map_err(|err| err.to_string())
}

fn parse_risk(raw: &str) -> Result<RiskTier, String> {
    RiskTier::try_from(raw).map_err(|err| err.to_string())
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> Result<Self, Box<dyn Error + Send + Sync>> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Single-key yes/no prompt. Anything but `y` declines.
fn confirm(prompt: &str) -> Result<bool, Box<dyn Error + Send + Sync>> {
    let _raw = RawModeGuard::enter()?;

    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt),
        Print(" [y/N] ")
    )?;
    out.flush()?;

    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        let answer = match code {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                return Err("interrupted".into());
            }
            KeyCode::Char('y') | KeyCode::Char('Y') => true,
            KeyCode::Char(_) | KeyCode::Enter | KeyCode::Esc => false,
            _ => continue,
        };

        execute!(out, Print(if answer { "y\r\n" } else { "n\r\n" }))?;
        out.flush()?;
        return Ok(answer);
    }
}

fn print_account(account: &Account) {
    let fund = account
        .fund_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}  owner={}  fund={}  cash={}  invested={}  rev={}",
        account.id,
        account.owner_id,
        fund,
        account.cash_balance,
        account.invested_total,
        account.revision
    );
}

fn print_fund(fund: &Fund) {
    println!(
        "{}  {}  [{} / {}]  total={}  performance={}",
        fund.id,
        fund.name,
        fund.category.as_str(),
        fund.risk.as_str(),
        fund.total,
        fund.performance
    );
}

fn print_transfer(transfer: &Transfer) {
    println!(
        "{}  {}  {} -> {}  amount={}  key={}",
        transfer.id,
        transfer.executed_at.to_rfc3339(),
        transfer.account_id,
        transfer.fund_id,
        transfer.amount,
        transfer.idempotency_key.as_deref().unwrap_or("-")
    );
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Account(AccountArgs {
            command: AccountCommand::Open(args),
        }) => {
            let account = engine
                .open_account(OpenAccountCmd::new(args.owner, args.cash))
                .await?;
            println!("opened account: {}", account.id);
        }
        Command::Account(AccountArgs {
            command: AccountCommand::Show(args),
        }) => {
            print_account(&engine.account(args.id).await?);
        }
        Command::Fund(FundArgs {
            command: FundCommand::Create(args),
        }) => {
            let cmd = NewFundCmd::new(args.name, args.description, args.category, args.risk)
                .performance(args.performance)
                .total(args.total);
            let fund = engine.create_fund(cmd).await?;
            println!("created fund: {} ({})", fund.name, fund.id);
        }
        Command::Fund(FundArgs {
            command: FundCommand::List,
        }) => {
            for fund in engine.funds().await? {
                print_fund(&fund);
            }
        }
        Command::Fund(FundArgs {
            command: FundCommand::Update(args),
        }) => {
            let fund = engine
                .update_fund(UpdateFundCmd::new(args.id, args.name, args.description))
                .await?;
            print_fund(&fund);
        }
        Command::Associate(args) => {
            let account = engine.associate_fund(args.account, args.fund).await?;
            print_account(&account);
        }
        Command::Invest(args) => {
            if !args.yes
                && !confirm(&format!(
                    "Invest {} from account {} into fund {}?",
                    args.amount, args.account, args.fund
                ))?
            {
                eprintln!("aborted");
                std::process::exit(1);
            }

            let mut cmd = ExecuteTransferCmd::new(args.account, args.fund, args.amount);
            if let Some(key) = args.key {
                cmd = cmd.idempotency_key(key);
            }
            if let Some(timeout_ms) = args.timeout_ms {
                cmd = cmd.timeout(Duration::from_millis(timeout_ms));
            }

            let executed = engine.execute_transfer(cmd).await?;
            if executed.replayed {
                println!("already executed:");
            }
            print_transfer(&executed.transfer);
        }
        Command::Transfers(args) => {
            for transfer in engine.transfers(args.account).await? {
                print_transfer(&transfer);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn invest_parses_decimal_amount() {
        let cli = Cli::try_parse_from([
            "isa_admin",
            "--database-url",
            "sqlite::memory:",
            "invest",
            "--account",
            "6f9c2a4e-8d0b-4c55-9a43-0f3e1b7c2d10",
            "--fund",
            "0b7d3e21-5a6f-4f1e-8c2b-9d4e7a1c3f22",
            "--amount",
            "250.50",
            "--key",
            "monthly-2026-10",
            "-y",
        ])
        .unwrap();

        let Command::Invest(args) = cli.command else {
            panic!("expected invest");
        };
        assert_eq!(args.amount, "250.50".parse::<Money>().unwrap());
        assert_eq!(args.key.as_deref(), Some("monthly-2026-10"));
        assert!(args.yes);
    }

    #[test]
    fn unknown_category_is_rejected() {
        let err = Cli::try_parse_from([
            "isa_admin",
            "fund",
            "create",
            "--name",
            "Gold",
            "--description",
            "Bullion",
            "--category",
            "Commodity",
            "--risk",
            "High",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
